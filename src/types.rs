use crate::error::Result;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Result of a completed request, as handed to the transport's completion handler.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Response {
    #[serde(rename = "Status")]
    pub status: u16,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Content")]
    pub content: String,
}

impl Response {
    pub fn new(status: u16, kind: impl Into<String>, content: impl Into<String>) -> Self {
        Response {
            status,
            kind: kind.into(),
            content: content.into(),
        }
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    /// Returns `FormatterError::Parse` if the content is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.content)?)
    }
}

/// Lifecycle of a dispatched request.
///
/// A request that has not been sent has no handle, so there is no idle state here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Pending,
    Resolved,
}
