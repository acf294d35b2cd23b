use crate::error::{FormatterError, Result};

use reqwest::header::CONTENT_TYPE;
use tokio::runtime::Handle;
use tracing::{debug, warn};

/// Called once by a transport with `(status, type, content)`.
pub type CompletionHandler = Box<dyn FnOnce(u16, String, String) + Send + 'static>;

/// Something able to perform a request for a fully formatted URL.
///
/// `start_request` either fails right away (the request never started) or
/// takes ownership of `on_complete` and calls it at most once, possibly from
/// another task. Dropping the handler without calling it leaves the request
/// unresolved forever.
pub trait Transport {
    /// Start a request for `url`.
    ///
    /// # Errors
    /// Returns an error if the request could not be started.
    fn start_request(&self, url: &str, on_complete: CompletionHandler) -> Result<()>;
}

impl<F> Transport for F
where
    F: Fn(&str, CompletionHandler) -> Result<()>,
{
    fn start_request(&self, url: &str, on_complete: CompletionHandler) -> Result<()> {
        self(url, on_complete)
    }
}

/// `GET` requests over HTTP with reqwest.
///
/// Must be used from within a tokio runtime. Network failures after the
/// request started are reported through the handler with status `0`, type
/// `"error"` and the error text as content.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        HttpTransport { client }
    }
}

impl Transport for HttpTransport {
    fn start_request(&self, url: &str, on_complete: CompletionHandler) -> Result<()> {
        let url = url::Url::parse(url)?;
        let runtime =
            Handle::try_current().map_err(|e| FormatterError::TransportSetup(e.to_string()))?;

        let client = self.client.clone();
        runtime.spawn(async move {
            match fetch(&client, url).await {
                Ok((status, kind, content)) => {
                    debug!(status, kind = %kind, "http response received");
                    on_complete(status, kind, content);
                }
                Err(e) => {
                    warn!(error = %e, "http request failed");
                    on_complete(0, "error".to_string(), e.to_string());
                }
            }
        });

        Ok(())
    }
}

/// Perform the `GET` and collect status, content type and body.
async fn fetch(client: &reqwest::Client, url: url::Url) -> Result<(u16, String, String)> {
    let response = client.get(url).send().await?;

    let status = response.status().as_u16();
    let kind = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let content = response.text().await?;

    Ok((status, kind, content))
}
