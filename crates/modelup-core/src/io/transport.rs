//! Resilient byte fetching over HTTP(S).
//!
//! One primitive, [`Transport::fetch_to_sink`], streams a response body into a
//! [`ByteSink`] and reports progress after every chunk. Fetching a small
//! document into memory is the same operation with a `Vec<u8>` sink.
//!
//! Redirects are followed here rather than by the HTTP client so that the
//! depth cap, relative `Location` resolution and logging are under our
//! control.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::LOCATION;
use reqwest::{Client, Response};
use tracing::debug;

use crate::config::UpdaterConfig;
use crate::error::{UpdateError, UpdateResult};

/// Bytes received so far and the declared total (`0` when unknown).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferProgress {
    /// Bytes received so far.
    pub received: u64,
    /// Declared content length, `0` when the server did not send one.
    pub total: u64,
}

/// Progress callback invoked after every chunk. Must be cheap.
pub type ProgressFn<'a> = dyn Fn(TransferProgress) + Send + Sync + 'a;

/// Destination for a streamed response body.
#[async_trait]
pub trait ByteSink: Send {
    /// Called once the response headers are in, before the first chunk.
    ///
    /// `total` is the declared content length, if any. Returning an error
    /// aborts the transfer before any body bytes are read.
    async fn begin(&mut self, total: Option<u64>) -> UpdateResult<()> {
        let _ = total;
        Ok(())
    }

    /// Consume one chunk of the body.
    async fn write(&mut self, chunk: &[u8]) -> UpdateResult<()>;
}

/// Largest up-front reservation an in-memory sink will make.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

#[async_trait]
impl ByteSink for Vec<u8> {
    async fn begin(&mut self, total: Option<u64>) -> UpdateResult<()> {
        if let Some(total) = total {
            self.reserve(total.min(MAX_PREALLOC) as usize);
        }
        Ok(())
    }

    async fn write(&mut self, chunk: &[u8]) -> UpdateResult<()> {
        self.extend_from_slice(chunk);
        Ok(())
    }
}

/// Something that can fetch URLs.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Stream `url` into `sink`, calling `on_progress` after every chunk.
    ///
    /// Returns the number of body bytes received.
    async fn fetch_to_sink(
        &self,
        url: &str,
        sink: &mut dyn ByteSink,
        on_progress: &ProgressFn<'_>,
    ) -> UpdateResult<u64>;

    /// Fetch a small document fully into memory.
    async fn fetch_bytes(&self, url: &str) -> UpdateResult<Vec<u8>> {
        let mut buf = Vec::new();
        self.fetch_to_sink(url, &mut buf, &|_| {}).await?;
        Ok(buf)
    }
}

/// `reqwest`-backed transport with manual redirect handling.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    max_redirects: usize,
}

impl HttpTransport {
    /// Build a transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the TLS backend cannot be initialised.
    pub fn new(cfg: &UpdaterConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(cfg.connect_timeout)
            .timeout(cfg.request_timeout)
            .build()?;

        Ok(Self {
            client,
            max_redirects: cfg.max_redirects,
        })
    }

    /// Issue a GET, following redirects until a terminal response.
    ///
    /// The returned response always has a 2xx status.
    async fn open(&self, url: &str) -> UpdateResult<Response> {
        let mut current = url.to_string();

        for hop in 0..=self.max_redirects {
            let response = self
                .client
                .get(&current)
                .send()
                .await
                .map_err(|source| UpdateError::Network {
                    url: current.clone(),
                    source,
                })?;

            let status = response.status();

            if status.is_redirection() {
                let next = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|loc| response.url().join(loc).ok());

                if let Some(next) = next {
                    debug!(hop, from = %current, to = %next, status = status.as_u16(), "following redirect");
                    current = next.to_string();
                    continue;
                }
            }

            if !status.is_success() {
                return Err(UpdateError::Transport {
                    status: status.as_u16(),
                    url: current,
                });
            }

            return Ok(response);
        }

        Err(UpdateError::TooManyRedirects {
            url: url.to_string(),
            limit: self.max_redirects,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_to_sink(
        &self,
        url: &str,
        sink: &mut dyn ByteSink,
        on_progress: &ProgressFn<'_>,
    ) -> UpdateResult<u64> {
        let response = self.open(url).await?;
        let final_url = response.url().to_string();
        let declared = response.content_length();

        sink.begin(declared).await?;

        let total = declared.unwrap_or(0);
        let mut received: u64 = 0;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|source| UpdateError::Network {
                url: final_url.clone(),
                source,
            })?;
            sink.write(&chunk).await?;
            received += chunk.len() as u64;
            on_progress(TransferProgress { received, total });
        }

        debug!(url = %final_url, received, total, "transfer complete");
        Ok(received)
    }
}
