//! Channel-backed downstream.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    DownstreamFrame,
    traits::{Downstream, DownstreamError},
};

/// Downstream that hands frames to a writer task over a bounded channel.
///
/// The writer owns the actual socket; once it stops receiving, every send
/// fails with [`DownstreamError::Closed`].
#[derive(Debug, Clone)]
pub struct ChannelDownstream {
    tx: mpsc::Sender<DownstreamFrame>,
}

impl ChannelDownstream {
    /// Create a downstream and the receiver its writer drains.
    #[must_use]
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<DownstreamFrame>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Downstream for ChannelDownstream {
    async fn send(&mut self, frame: DownstreamFrame) -> Result<(), DownstreamError> {
        self.tx.send(frame).await.map_err(|_| DownstreamError::Closed)
    }

    fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
