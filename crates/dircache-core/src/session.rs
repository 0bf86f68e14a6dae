//! Remote boundary to the directory server
//!
//! The client only needs a handful of calls from the server session: the
//! type list, per-type field templates, object listings, and the optional
//! server-push channel.

use crate::error::{CoreError, RemoteError};
use async_trait::async_trait;
use dircache_types::{AsyncMessage, FieldDescriptor, ObjectHandle, ObjectQuery, TypeDescriptor, TypeId};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Logged-in session on the directory server
#[async_trait]
pub trait DirectorySession: Send + Sync {
    /// All object types visible to this session, in server order
    async fn type_list(&self) -> Result<Vec<TypeDescriptor>, RemoteError>;

    /// Field templates for one object type
    async fn field_templates(&self, type_id: TypeId) -> Result<Vec<FieldDescriptor>, RemoteError>;

    /// Object handles of one type, sorted by label
    async fn query_objects(&self, query: &ObjectQuery) -> Result<Vec<ObjectHandle>, RemoteError>;

    /// Server-push channel, if the server offers one
    fn async_port(&self) -> Option<Arc<dyn AsyncPort>> {
        None
    }
}

/// Blocking-read channel of messages pushed by the server
#[async_trait]
pub trait AsyncPort: Send + Sync {
    /// Next message, or `None` once the server has closed the channel
    async fn next_message(&self) -> Result<Option<AsyncMessage>, RemoteError>;
}

/// Run one remote call under a timeout, naming it in any error
pub(crate) async fn remote_call<T, F>(
    operation: &str,
    timeout: Duration,
    call: F,
) -> Result<T, CoreError>
where
    F: Future<Output = Result<T, RemoteError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(CoreError::remote(operation, source)),
        Err(_) => Err(CoreError::Timeout {
            operation: operation.to_string(),
            timeout_secs: timeout.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_remote_call_maps_failure() {
        let result: Result<(), _> = remote_call("type_list", Duration::from_secs(1), async {
            Err(RemoteError::new("server down"))
        })
        .await;

        assert!(matches!(
            result,
            Err(CoreError::Remote { ref operation, .. }) if operation == "type_list"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_call_times_out() {
        let result: Result<(), _> = remote_call("query_objects", Duration::from_secs(5), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;

        assert!(matches!(
            result,
            Err(CoreError::Timeout { timeout_secs: 5, .. })
        ));
    }
}
