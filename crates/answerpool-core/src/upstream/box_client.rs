//! BoxUpstreamClient -- object-safe dynamic dispatch wrapper for UpstreamClient.
//!
//! 1. `UpstreamClientDyn` is the object-safe trait with boxed futures
//! 2. Blanket-impl `UpstreamClientDyn` for all `T: UpstreamClient`
//! 3. `BoxUpstreamClient` wraps `Box<dyn UpstreamClientDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use answerpool_types::upstream::{ChatCompletion, ChatRequest, UpstreamError};

use super::client::{UpstreamClient, UpstreamTarget};

/// Object-safe version of [`UpstreamClient`] with boxed futures.
pub trait UpstreamClientDyn: Send + Sync {
    fn complete_boxed<'a>(
        &'a self,
        target: UpstreamTarget<'a>,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChatCompletion, UpstreamError>> + Send + 'a>>;
}

impl<T: UpstreamClient> UpstreamClientDyn for T {
    fn complete_boxed<'a>(
        &'a self,
        target: UpstreamTarget<'a>,
        request: &'a ChatRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ChatCompletion, UpstreamError>> + Send + 'a>> {
        Box::pin(self.complete(target, request))
    }
}

/// Type-erased upstream client, so the dispatcher can be built over the
/// real HTTP adapter or a test double without being generic.
pub struct BoxUpstreamClient {
    inner: Box<dyn UpstreamClientDyn>,
}

impl BoxUpstreamClient {
    pub fn new<T: UpstreamClient + 'static>(client: T) -> Self {
        Self {
            inner: Box::new(client),
        }
    }

    pub async fn complete(
        &self,
        target: UpstreamTarget<'_>,
        request: &ChatRequest,
    ) -> Result<ChatCompletion, UpstreamError> {
        self.inner.complete_boxed(target, request).await
    }
}
