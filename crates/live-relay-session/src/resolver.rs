//! Broadcast start resolution.

use live_relay_core::{MonitorApi, extract_broadcast_start};

/// Scrape the broadcast start from the monitor page.
///
/// Single attempt. Any failure reads as "unknown".
pub async fn resolve_broadcast_start<A>(api: &A, subject_id: &str, channel_id: &str) -> Option<String>
where
    A: MonitorApi + ?Sized,
{
    match api.fetch_monitor_page(subject_id, channel_id).await {
        Ok(html) => {
            let start = extract_broadcast_start(&html);
            match &start {
                Some(start) => tracing::info!(broadcast_start = %start, "Resolved broadcast start"),
                None => tracing::debug!("No broadcast start on monitor page"),
            }
            start
        }
        Err(e) => {
            tracing::warn!("Failed to resolve broadcast start: {e}");
            None
        }
    }
}
