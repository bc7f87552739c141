//! Fetching replacement pages.

use futures_util::future::{select, Either};
use once_cell::sync::Lazy;
use reqwest::header::ACCEPT;
use reqwest::Url;
use std::future::Future;
use std::pin::pin;
use std::time::Duration;
use thiserror::Error;

static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("no response within {0:?}")]
    Timeout(Duration),
}

/// Source of replacement HTML documents.
#[allow(async_fn_in_trait)]
pub trait PageFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// Fetches pages from the content server as raw HTML.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpPageFetcher;

impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let response = HTTP_CLIENT
            .get(url.clone())
            .header(ACCEPT, "text/html")
            .header("X-PJAX", "true")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        Ok(response.text().await?)
    }
}

/// Race `request` against a timer. The request is dropped when the timer
/// wins.
pub async fn with_timeout<T, F>(request: F, limit: Duration) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    let request = pin!(request);
    let timer = pin!(sleep(limit));
    match select(request, timer).await {
        Either::Left((result, _)) => result,
        Either::Right(_) => Err(FetchError::Timeout(limit)),
    }
}

#[cfg(target_arch = "wasm32")]
pub(crate) async fn sleep(duration: Duration) {
    gloo_timers::future::sleep(duration).await;
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}
