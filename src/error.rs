use std::fmt;

#[derive(Debug)]
pub enum FormatterError {
    /// An argument with this name is already present
    DuplicateArgument(String),
    /// No argument with this name is present
    ArgumentNotFound(String),
    /// The transport refused to start the request
    TransportSetup(String),
    /// Represents HTTP/network errors
    Http(reqwest::Error),
    /// Represents JSON parsing errors
    Parse(serde_json::Error),
    /// Represents missing environment variable errors
    MissingEnvVar(String),
    /// Represents other errors
    Other(String),
}

impl std::error::Error for FormatterError {}

impl fmt::Display for FormatterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatterError::DuplicateArgument(name) => {
                write!(f, "Argument already exists: {name}")
            }
            FormatterError::ArgumentNotFound(name) => {
                write!(f, "Argument does not exist: {name}")
            }
            FormatterError::TransportSetup(e) => write!(f, "Could not start request: {e}"),
            FormatterError::Http(e) => write!(f, "HTTP error: {e}"),
            FormatterError::Parse(e) => write!(f, "Parse error: {e}"),
            FormatterError::MissingEnvVar(var) => write!(
                f,
                "Missing required environment variable: {var}\n\
                 Please set it in your environment or .env file"
            ),
            FormatterError::Other(e) => write!(f, "Error: {e}"),
        }
    }
}

impl From<reqwest::Error> for FormatterError {
    fn from(err: reqwest::Error) -> Self {
        FormatterError::Http(err)
    }
}

impl From<serde_json::Error> for FormatterError {
    fn from(err: serde_json::Error) -> Self {
        FormatterError::Parse(err)
    }
}

impl From<url::ParseError> for FormatterError {
    fn from(err: url::ParseError) -> Self {
        FormatterError::TransportSetup(err.to_string())
    }
}

/// Helper type for Result with `FormatterError`
pub type Result<T> = std::result::Result<T, FormatterError>;
