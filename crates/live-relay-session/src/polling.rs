//! Polling fallback: fetch the listing on a fixed interval and forward deltas.

use std::convert::Infallible;

use live_relay_core::{
    Downstream, MonitorApi, PageRequest, RelayMessage, Session, traits::UpstreamError,
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::RelayConfig,
    relay::{EndReason, emit, until_cancelled},
};

/// Run the polling fallback until the client leaves or an internal fault.
pub(crate) async fn poll<A, D>(
    api: &A,
    config: &RelayConfig,
    session: &mut Session,
    downstream: &mut D,
    cancel: &CancellationToken,
) -> EndReason
where
    A: MonitorApi,
    D: Downstream,
{
    let Err(end) = poll_inner(api, config, session, downstream, cancel).await;
    end
}

async fn poll_inner<A, D>(
    api: &A,
    config: &RelayConfig,
    session: &mut Session,
    downstream: &mut D,
    cancel: &CancellationToken,
) -> Result<Infallible, EndReason>
where
    A: MonitorApi,
    D: Downstream,
{
    let first = until_cancelled(
        cancel,
        api.fetch_listing(
            session.subject_id(),
            session.channel_id(),
            PageRequest::first(config.initial_page_size),
            config.initial_fetch_timeout,
        ),
    )
    .await
    .ok_or(EndReason::Cancelled)?;

    match first {
        Ok(items) if !items.is_empty() => {
            let broadcast_start = session.accept_initial(&items);
            let count = items.len();
            emit(
                downstream,
                cancel,
                RelayMessage::Initial {
                    data: items,
                    broadcast_start,
                },
            )
            .await?;
            tracing::info!(count, "Sent initial batch");
        }
        Ok(_) => tracing::debug!("Initial listing is empty"),
        Err(e) => return Err(abort(e, downstream, cancel).await),
    }

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(EndReason::Cancelled),
            () = tokio::time::sleep(config.poll_interval) => {}
        }
        if cancel.is_cancelled() {
            return Err(EndReason::Cancelled);
        }
        if downstream.is_closed() {
            return Err(EndReason::DownstreamClosed);
        }

        let result = until_cancelled(
            cancel,
            api.fetch_listing(
                session.subject_id(),
                session.channel_id(),
                PageRequest::first(config.poll_page_size),
                config.poll_fetch_timeout,
            ),
        )
        .await
        .ok_or(EndReason::Cancelled)?;

        match result {
            Ok(items) => {
                if let Some(delta) = session.take_delta(items) {
                    let count = delta.len();
                    emit(downstream, cancel, RelayMessage::Update { data: delta }).await?;
                    tracing::info!(count, "Sent new items");
                }
            }
            Err(e) => report_fetch_error(e, downstream, cancel).await?,
        }
    }
}

/// Surface a loop fetch failure to the client.
///
/// Transient failures leave the loop running; anything else is reported once
/// and ends the session.
async fn report_fetch_error<D: Downstream>(
    e: UpstreamError,
    downstream: &mut D,
    cancel: &CancellationToken,
) -> Result<(), EndReason> {
    if !e.is_transient() {
        return Err(abort(e, downstream, cancel).await);
    }
    tracing::warn!("Listing fetch failed: {e}");
    emit(
        downstream,
        cancel,
        RelayMessage::error(format!("data fetch failed: {e}")),
    )
    .await
}

/// Report `e` once and end the session.
async fn abort<D: Downstream>(
    e: UpstreamError,
    downstream: &mut D,
    cancel: &CancellationToken,
) -> EndReason {
    tracing::error!("Polling aborted: {e}");
    match emit(downstream, cancel, RelayMessage::error(format!("relay error: {e}"))).await {
        Ok(()) => EndReason::Fault(e.to_string()),
        Err(end) => end,
    }
}
