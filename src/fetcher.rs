//! Transport used to reach the remote config evaluation endpoint.
use std::future::Future;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};

use crate::{EvaluateRequest, EvaluateResponse, Error, Result};

/// Performs the batch evaluation call. This is the only part of the SDK that crosses the process
/// boundary.
///
/// Implementations are responsible for bounding their own latency: the client neither retries nor
/// times out a fetch.
///
/// Any async closure taking the URL and the request body is a `RemoteFetcher`:
///
/// ```
/// # use tweakship::{Client, EvaluateRequest, EvaluateResponse};
/// let client = Client::new(|_url: String, _body: EvaluateRequest| async {
///     Ok::<_, tweakship::Error>(EvaluateResponse::default())
/// });
/// ```
#[async_trait]
pub trait RemoteFetcher {
    /// POST `body` to `url` and return the decoded response.
    async fn fetch(&self, url: &str, body: &EvaluateRequest) -> Result<EvaluateResponse>;
}

#[async_trait]
impl<F, Fut> RemoteFetcher for F
where
    F: Fn(String, EvaluateRequest) -> Fut + Send + Sync,
    Fut: Future<Output = Result<EvaluateResponse>> + Send,
{
    async fn fetch(&self, url: &str, body: &EvaluateRequest) -> Result<EvaluateResponse> {
        self(url.to_owned(), body.clone()).await
    }
}

/// Default [`RemoteFetcher`] sending requests over HTTP with `reqwest`.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a default `reqwest` client.
    pub fn new() -> HttpFetcher {
        HttpFetcher::default()
    }

    /// Create a fetcher reusing an existing `reqwest` client, e.g. one with custom timeouts.
    pub fn with_client(client: reqwest::Client) -> HttpFetcher {
        HttpFetcher { client }
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, body: &EvaluateRequest) -> Result<EvaluateResponse> {
        let url = Url::parse(url).map_err(Error::InvalidHost)?;

        let response = self.client.post(url).json(body).send().await.map_err(|err| {
            log::warn!(target: "tweakship", "failed to send remote config request: {:?}", err);
            Error::from(err)
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            log::warn!(target: "tweakship", "received non-200 response while evaluating remote configs: {}", status);
            return Err(Error::UnexpectedStatus(status));
        }

        let response = response.json().await?;

        log::debug!(target: "tweakship", "successfully fetched remote configs");

        Ok(response)
    }
}
