// ── Remote data source seam ──
//
// The controller talks to the backend through this trait so tests can
// substitute a scripted source. `AssetClient` is the production impl.

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde_json::Value;

use ecolearn_api::{AssetClient, CardUpload, Endpoint, OneShotResponse};

use crate::error::CoreError;

/// Read and write access to the admin API.
///
/// Futures are `'static` so a fetch can outlive the caller that started it.
pub trait RemoteSource: Send + Sync {
    fn fetch(&self, endpoint: Endpoint) -> BoxFuture<'static, Result<Value, CoreError>>;

    fn submit(&self, upload: CardUpload) -> BoxFuture<'static, Result<OneShotResponse, CoreError>>;
}

impl RemoteSource for AssetClient {
    fn fetch(&self, endpoint: Endpoint) -> BoxFuture<'static, Result<Value, CoreError>> {
        let client = self.clone();
        async move { client.fetch(endpoint).await.map_err(CoreError::from) }.boxed()
    }

    fn submit(&self, upload: CardUpload) -> BoxFuture<'static, Result<OneShotResponse, CoreError>> {
        let client = self.clone();
        async move {
            client
                .one_shot_learn(upload)
                .await
                .map_err(CoreError::from)
        }
        .boxed()
    }
}
