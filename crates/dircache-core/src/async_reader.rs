//! Reader for messages pushed by the server
//!
//! Runs one task that waits on the session's async port and republishes each
//! message on the event bus. A shutdown message ends the loop after
//! publishing `ForcedDisconnect`.

use crate::event::{DataEvent, EventBus};
use crate::session::AsyncPort;
use dircache_types::AsyncMessage;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Why the reader loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    /// The server closed the channel
    Closed,
    /// The server forced this client off
    ForcedDisconnect(String),
    /// Reading from the port failed
    Failed(String),
    /// `stop()` was called
    Stopped,
}

/// Handle to a running async reader
pub struct AsyncReader {
    shutdown: CancellationToken,
    handle: JoinHandle<ReaderExit>,
}

impl AsyncReader {
    /// Spawn the reader loop on the current tokio runtime
    pub fn start(port: Arc<dyn AsyncPort>, event_bus: EventBus) -> Self {
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();

        info!("Async reader started");
        let handle = tokio::spawn(async move {
            let exit = read_loop(port.as_ref(), &event_bus, &token).await;
            debug!(?exit, "Async reader finished");
            exit
        });

        Self { shutdown, handle }
    }

    /// Ask the loop to stop; a pending read is abandoned
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the loop to end and report why
    pub async fn join(self) -> ReaderExit {
        match self.handle.await {
            Ok(exit) => exit,
            Err(e) => {
                error!(error = %e, "Async reader task panicked");
                ReaderExit::Failed(e.to_string())
            }
        }
    }
}

async fn read_loop(port: &dyn AsyncPort, event_bus: &EventBus, token: &CancellationToken) -> ReaderExit {
    loop {
        let next = tokio::select! {
            _ = token.cancelled() => return ReaderExit::Stopped,
            next = port.next_message() => next,
        };

        match next {
            Ok(Some(AsyncMessage::Shutdown { reason })) => {
                warn!(reason = %reason, "Server forced disconnect");
                event_bus.publish(DataEvent::ForcedDisconnect(reason.clone()));
                return ReaderExit::ForcedDisconnect(reason);
            }
            Ok(Some(AsyncMessage::Message { kind, text })) => {
                debug!(%kind, "Server message received");
                event_bus.publish(DataEvent::ServerMessage { kind, text });
                // Give subscribers on this worker a turn before the next read.
                tokio::task::yield_now().await;
            }
            Ok(None) => {
                debug!("Server closed the async channel");
                return ReaderExit::Closed;
            }
            Err(e) => {
                error!(error = %e, "Async reader error");
                event_bus.publish(DataEvent::ReaderError(e.to_string()));
                return ReaderExit::Failed(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RemoteError;
    use crate::snapshot::SnapshotPort;
    use async_trait::async_trait;
    use dircache_types::MessageKind;

    fn status(text: &str) -> AsyncMessage {
        AsyncMessage::Message {
            kind: MessageKind::BuildStatus,
            text: text.to_string(),
        }
    }

    struct FailingPort;

    #[async_trait]
    impl AsyncPort for FailingPort {
        async fn next_message(&self) -> Result<Option<AsyncMessage>, RemoteError> {
            Err(RemoteError::new("socket closed"))
        }
    }

    struct SilentPort;

    #[async_trait]
    impl AsyncPort for SilentPort {
        async fn next_message(&self) -> Result<Option<AsyncMessage>, RemoteError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_messages_published_in_order() {
        let bus = EventBus::default_capacity();
        let mut rx = bus.subscribe();
        let port = Arc::new(SnapshotPort::new(vec![status("building"), status("idle")]));

        let reader = AsyncReader::start(port, bus);
        assert_eq!(reader.join().await, ReaderExit::Closed);

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, DataEvent::ServerMessage { text, .. } if text == "building"));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, DataEvent::ServerMessage { text, .. } if text == "idle"));
    }

    #[tokio::test]
    async fn test_shutdown_message_ends_loop() {
        let bus = EventBus::default_capacity();
        let mut rx = bus.subscribe();
        let port = Arc::new(SnapshotPort::new(vec![
            AsyncMessage::Shutdown {
                reason: "server restarting".to_string(),
            },
            status("never read"),
        ]));

        let reader = AsyncReader::start(port, bus);
        assert_eq!(
            reader.join().await,
            ReaderExit::ForcedDisconnect("server restarting".to_string())
        );

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, DataEvent::ForcedDisconnect(reason) if reason == "server restarting"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_port_error_reported() {
        let bus = EventBus::default_capacity();
        let mut rx = bus.subscribe();

        let reader = AsyncReader::start(Arc::new(FailingPort), bus);
        assert!(matches!(reader.join().await, ReaderExit::Failed(_)));
        assert!(matches!(rx.recv().await.unwrap(), DataEvent::ReaderError(_)));
    }

    #[tokio::test]
    async fn test_stop_abandons_pending_read() {
        let reader = AsyncReader::start(Arc::new(SilentPort), EventBus::default_capacity());
        tokio::task::yield_now().await;
        assert!(!reader.is_finished());

        reader.stop();
        assert_eq!(reader.join().await, ReaderExit::Stopped);
    }
}
