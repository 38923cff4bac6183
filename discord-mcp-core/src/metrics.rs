// ABOUTME: Counters for bridge and tool activity via the metrics facade
// ABOUTME: No-ops unless the host installs a recorder (e.g. the Prometheus exporter)

use crate::filter::FilterReason;

pub const EVENTS_FILTERED: &str = "bridge_events_filtered";
pub const EVENTS_THROTTLED: &str = "bridge_events_throttled";
pub const SAMPLING_REQUESTS: &str = "bridge_sampling_requests";
pub const SAMPLING_FAILURES: &str = "bridge_sampling_failures";
pub const CHUNKS_SENT: &str = "bridge_chunks_sent";
pub const REACTIONS: &str = "bridge_reactions";
pub const TOOL_CALLS: &str = "mcp_tool_calls";

pub fn record_filtered(reason: FilterReason) {
    metrics::counter!(EVENTS_FILTERED, "reason" => reason.as_str()).increment(1);
}

pub fn record_throttled() {
    metrics::counter!(EVENTS_THROTTLED).increment(1);
}

/// `kind` is "message" or "reaction"
pub fn record_sampling_request(kind: &'static str) {
    metrics::counter!(SAMPLING_REQUESTS, "kind" => kind).increment(1);
}

pub fn record_sampling_failure(kind: &'static str, error: &'static str) {
    metrics::counter!(SAMPLING_FAILURES, "kind" => kind, "error" => error).increment(1);
}

pub fn record_chunks_sent(count: usize) {
    metrics::counter!(CHUNKS_SENT).increment(count as u64);
}

/// `source` is "sampled" or "fallback"
pub fn record_reaction(source: &'static str) {
    metrics::counter!(REACTIONS, "source" => source).increment(1);
}

pub fn record_tool_call(tool: &str, ok: bool) {
    let status = if ok { "ok" } else { "error" };
    metrics::counter!(TOOL_CALLS, "tool" => tool.to_string(), "status" => status).increment(1);
}
