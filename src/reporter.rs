use crate::types::FeedEvent;

/// Emit a snapshot report as a single JSON line to stdout.
pub fn report_event(event: &FeedEvent) {
    if let Ok(json) = serde_json::to_string(event) {
        println!("{json}");
    }
}
