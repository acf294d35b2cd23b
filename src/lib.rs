#[path = "config.rs"]
pub mod config;

#[path = "error.rs"]
pub mod error;

#[path = "formatter.rs"]
pub mod formatter;

#[path = "transport.rs"]
pub mod transport;

#[path = "types.rs"]
pub mod types;

#[path = "url_builder.rs"]
pub mod url_builder;

pub use error::{FormatterError, Result};
pub use formatter::{PendingRequest, RequestFormatter};
pub use transport::{CompletionHandler, HttpTransport, Transport};
pub use types::{RequestState, Response};
