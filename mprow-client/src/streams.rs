//! Server-push stream subscriptions
//!
//! A stream is a long-lived id registration whose handler may run many
//! times, once per inbound frame carrying that id. Streams are deliberately
//! not pending requests: they have no timeout, never count toward the
//! request stats, and a server that never sends a first frame surfaces
//! nothing at this layer. Callers who need liveness arrange it above.
//!
//! Closing is one-way. After `StreamController::close()` returns, the
//! handler will not be invoked again; frames that still arrive under the id
//! are dropped silently by the dispatcher.

use mprow_core::{Error, Id, Response, Result};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Type of a registered stream handler.
pub(crate) type StreamHandlerFn =
    Arc<dyn Fn(Response) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

struct StreamEntry {
    handler: StreamHandlerFn,
    closed: Arc<AtomicBool>,
}

/// Registry of open streams, keyed by id.
#[derive(Clone, Default)]
pub(crate) struct StreamRegistry {
    inner: Arc<Mutex<HashMap<Id, StreamEntry>>>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `id` and hand back its controller.
    pub async fn register<F, Fut>(&self, id: Id, handler: F) -> Result<StreamController>
    where
        F: Fn(Response) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut streams = self.inner.lock().await;
        if streams.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }
        let closed = Arc::new(AtomicBool::new(false));
        let handler: StreamHandlerFn = Arc::new(move |response| Box::pin(handler(response)));
        streams.insert(
            id.clone(),
            StreamEntry {
                handler,
                closed: Arc::clone(&closed),
            },
        );
        Ok(StreamController {
            id,
            closed,
            registry: self.clone(),
        })
    }

    /// Handler for `id`, if the stream exists and is still open.
    pub async fn handler(&self, id: &Id) -> Option<StreamHandlerFn> {
        let streams = self.inner.lock().await;
        streams
            .get(id)
            .filter(|entry| !entry.closed.load(Ordering::SeqCst))
            .map(|entry| Arc::clone(&entry.handler))
    }

    /// Remove one stream, marking it closed.
    pub async fn remove(&self, id: &Id) {
        if let Some(entry) = self.inner.lock().await.remove(id) {
            entry.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Remove every stream, marking each closed (final shutdown).
    pub async fn close_all(&self) {
        let mut streams = self.inner.lock().await;
        for (_, entry) in streams.drain() {
            entry.closed.store(true, Ordering::SeqCst);
        }
    }

    /// Number of open streams.
    #[allow(dead_code)]
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

/// Handle to one stream subscription.
pub struct StreamController {
    id: Id,
    closed: Arc<AtomicBool>,
    registry: StreamRegistry,
}

impl std::fmt::Debug for StreamController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamController")
            .field("id", &self.id)
            .field("closed", &self.closed)
            .finish()
    }
}

impl StreamController {
    /// The id the stream is registered under.
    pub fn id(&self) -> &Id {
        &self.id
    }

    /// Whether the stream has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the stream. Idempotent; once this returns, the handler will
    /// not be invoked again. The server is not notified.
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.registry.remove(&self.id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mprow_core::Value;
    use std::sync::atomic::AtomicU32;

    #[tokio::test]
    async fn register_dispatch_and_close() {
        let registry = StreamRegistry::new();
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = Arc::clone(&calls);

        let controller = registry
            .register(Id::Str("s1".into()), move |_response| {
                let calls3 = Arc::clone(&calls2);
                async move {
                    calls3.fetch_add(1, Ordering::SeqCst);
                }
            })
            .await
            .unwrap();

        let response = Response::success(Value::Int(1), Id::Str("s1".into()));
        for _ in 0..3 {
            if let Some(handler) = registry.handler(controller.id()).await {
                handler(response.clone()).await;
            }
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        controller.close().await;
        assert!(controller.is_closed());
        assert!(registry.handler(controller.id()).await.is_none());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let registry = StreamRegistry::new();
        let controller = registry
            .register(Id::Num(1), |_| async {})
            .await
            .unwrap();
        controller.close().await;
        controller.close().await;
        assert!(controller.is_closed());
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn duplicate_stream_id_is_rejected() {
        let registry = StreamRegistry::new();
        let _controller = registry.register(Id::Num(5), |_| async {}).await.unwrap();
        assert!(matches!(
            registry.register(Id::Num(5), |_| async {}).await,
            Err(Error::DuplicateId(_))
        ));
    }

    #[tokio::test]
    async fn close_all_marks_controllers_closed() {
        let registry = StreamRegistry::new();
        let controller = registry.register(Id::Num(9), |_| async {}).await.unwrap();
        registry.close_all().await;
        assert!(controller.is_closed());
        assert_eq!(registry.len().await, 0);
    }
}
