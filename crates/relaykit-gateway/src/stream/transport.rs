use std::sync::Arc;

use async_trait::async_trait;

use relaykit_core::Result;

use crate::failure::{Deliver, DeliveryKind, RoutedFailure};

/// Push-side transport owned by one stream session.
#[async_trait]
pub trait StreamTransport: Send + Sync + 'static {
    /// Send one JSON text frame.
    async fn write(&self, frame: String) -> Result<()>;

    /// Close the connection. Best-effort; called once by the session.
    async fn close(&self) -> Result<()>;

    /// Resolves once the peer closed the connection or it failed.
    /// Must be safe to call repeatedly.
    async fn closed(&self);
}

/// Socket sink for failures that happen before a session exists
/// (e.g. the session could not be opened after an upgrade).
pub struct CloseTransport(pub Arc<dyn StreamTransport>);

#[async_trait]
impl Deliver for CloseTransport {
    type Output = ();

    fn kind(&self) -> DeliveryKind {
        DeliveryKind::Stream
    }

    async fn deliver(self, routed: RoutedFailure) {
        tracing::debug!(code = %routed.envelope().code(), "closing transport without a session");
        if let Err(e) = self.0.close().await {
            tracing::warn!(error = %e, "transport close failed");
        }
    }
}
