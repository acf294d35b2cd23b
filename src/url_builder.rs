use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::collections::HashMap;

/// Argument name to argument value.
pub type QueryParams = HashMap<String, String>;

/// Bytes left as-is when escaping a single query value.
/// Unreserved characters of RFC 3986 plus `! * ' ( )`.
const COMPONENT_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode `text` so it can be used as one query value.
///
/// The input is always encoded exactly once, so an already encoded `%20`
/// comes out as `%2520`.
#[must_use]
pub fn fix_text(text: &str) -> String {
    utf8_percent_encode(text, COMPONENT_SET).to_string()
}

/// Serialize `params` as `name=value&` pairs.
///
/// Names are written verbatim, values are escaped with [`fix_text`]. Every
/// pair, including the last one, is followed by `&`.
#[must_use]
pub fn compile_query(params: &QueryParams) -> String {
    params
        .iter()
        .map(|(name, value)| format!("{name}={}&", fix_text(value)))
        .collect()
}

/// Base URL that compiled query strings are appended to.
#[derive(Debug, Clone)]
pub struct Url {
    base: String,
}

impl Url {
    /// Creates a new `Url` for `base`, taken verbatim.
    pub fn new(base: &str) -> Self {
        Url {
            base: base.to_string(),
        }
    }

    /// The base as given to [`Url::new`].
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Join the base and an already compiled query string.
    ///
    /// The `?` separator is always written, even for an empty query.
    ///
    /// # Returns
    /// * `String` - `base?query`.
    pub fn build(&self, query: &str) -> String {
        format!("{}?{}", self.base, query)
    }
}
