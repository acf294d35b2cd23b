use crate::error::{FormatterError, Result};
use crate::transport::{CompletionHandler, Transport};
use crate::types::{RequestState, Response};
use crate::url_builder::{self, QueryParams, Url};

use futures::channel::oneshot;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Builds query strings for a fixed base URL and sends the resulting request.
///
/// `argument_string` and `formatted_url` are caches: they only change when
/// [`compile_arguments`](Self::compile_arguments) and
/// [`compile_url`](Self::compile_url) are called.
#[derive(Debug, Clone)]
pub struct RequestFormatter {
    url: Url,
    argument_string: String,
    formatted_url: String,
    args: QueryParams,
}

impl RequestFormatter {
    /// Creates a new `RequestFormatter` with no arguments.
    ///
    /// # Arguments
    /// * `base_url` - Scheme, authority and path of every request, e.g. `https://example.com/search`.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        RequestFormatter {
            url: Url::new(base_url),
            argument_string: String::new(),
            formatted_url: String::new(),
            args: QueryParams::new(),
        }
    }

    /// The base URL given at construction.
    pub fn base_url(&self) -> &str {
        self.url.base()
    }

    /// Add a new argument.
    ///
    /// # Errors
    /// Returns `FormatterError::DuplicateArgument` if `name` is already set.
    /// The existing value is left untouched.
    ///
    /// # Returns
    /// * `Result<String>` - A status message naming the argument and its value.
    pub fn add_argument(&mut self, name: &str, value: &str) -> Result<String> {
        if self.args.contains_key(name) {
            return Err(FormatterError::DuplicateArgument(name.to_string()));
        }

        self.args.insert(name.to_string(), value.to_string());
        debug!(name, value, "argument added");
        Ok(format!("Added: {name} With value: {value}"))
    }

    /// Remove an argument.
    ///
    /// # Errors
    /// Returns `FormatterError::ArgumentNotFound` if `name` is not set.
    pub fn remove_argument(&mut self, name: &str) -> Result<String> {
        if self.args.remove(name).is_none() {
            return Err(FormatterError::ArgumentNotFound(name.to_string()));
        }

        debug!(name, "argument removed");
        Ok(format!("Removed: {name}"))
    }

    /// Replace the value of an existing argument.
    ///
    /// # Errors
    /// Returns `FormatterError::ArgumentNotFound` if `name` is not set.
    pub fn edit_argument(&mut self, name: &str, value: &str) -> Result<String> {
        let Some(current) = self.args.get_mut(name) else {
            return Err(FormatterError::ArgumentNotFound(name.to_string()));
        };

        *current = value.to_string();
        debug!(name, value, "argument edited");
        Ok(format!("Edited: {name} With value: {value}"))
    }

    /// Remove every argument. Never fails.
    ///
    /// # Returns
    /// * `String` - A status message.
    pub fn clear_arguments(&mut self) -> String {
        self.args.clear();
        debug!("arguments cleared");
        "Cleared Arguments".to_string()
    }

    /// Snapshot of the current arguments. Changing it does not affect the formatter.
    #[must_use]
    pub fn return_args(&self) -> QueryParams {
        self.args.clone()
    }

    /// See [`url_builder::fix_text`].
    #[must_use]
    pub fn fix_text(&self, text: &str) -> String {
        url_builder::fix_text(text)
    }

    /// Serialize the current arguments into `argument_string`.
    ///
    /// Always reads the live argument map. Pair order follows the map and is
    /// not meaningful; every pair ends with `&`.
    pub fn compile_arguments(&mut self) -> String {
        self.argument_string = url_builder::compile_query(&self.args);
        debug!(query = %self.argument_string, "arguments compiled");
        self.argument_string.clone()
    }

    /// Join the base URL with the last compiled argument string into `formatted_url`.
    ///
    /// Does not recompile. Before the first `compile_arguments` this yields `base?`.
    pub fn compile_url(&mut self) -> String {
        self.formatted_url = self.url.build(&self.argument_string);
        debug!(url = %self.formatted_url, "url compiled");
        self.formatted_url.clone()
    }

    /// The URL produced by the last [`compile_url`](Self::compile_url).
    pub fn formatted_url(&self) -> &str {
        &self.formatted_url
    }

    /// Send the last compiled URL through `transport` and run `callback` with the response.
    ///
    /// `callback` runs exactly once, on a tokio task, after the transport has
    /// reported completion. There is no timeout: if the transport never
    /// answers, the callback never runs.
    ///
    /// # Arguments
    /// * `transport` - Performs the request.
    /// * `callback` - Receives the response.
    ///
    /// # Errors
    /// Returns `FormatterError::TransportSetup` if there is no tokio runtime or the
    /// transport fails to start the request. `callback` is not called in that case.
    ///
    /// # Returns
    /// * `Result<PendingRequest>` - Handle to observe the request. Dropping it does not cancel anything.
    pub fn send_request<T, F>(&self, transport: &T, callback: F) -> Result<PendingRequest>
    where
        T: Transport + ?Sized,
        F: FnOnce(Response) + Send + 'static,
    {
        let url = self.formatted_url.clone();
        let runtime =
            Handle::try_current().map_err(|e| FormatterError::TransportSetup(e.to_string()))?;

        let (tx, rx) = oneshot::channel::<Response>();
        let on_complete: CompletionHandler = Box::new(move |status, kind, content| {
            // The receiver only goes away if the waiting task was aborted.
            let _ = tx.send(Response::new(status, kind, content));
        });

        if let Err(e) = transport.start_request(&url, on_complete) {
            warn!(url = %url, error = %e, "transport could not start request");
            return Err(match e {
                FormatterError::TransportSetup(_) => e,
                other => FormatterError::TransportSetup(other.to_string()),
            });
        }
        info!(url = %url, "request sent");

        let resolved = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&resolved);
        let task = runtime.spawn(async move {
            match rx.await {
                Ok(response) => {
                    debug!(status = response.status, "request resolved");
                    callback(response);
                    flag.store(true, Ordering::Release);
                }
                Err(oneshot::Canceled) => {
                    debug!("completion handler dropped without a response");
                }
            }
        });

        Ok(PendingRequest {
            url,
            resolved,
            task,
        })
    }
}

/// Handle to a request started by [`RequestFormatter::send_request`].
#[derive(Debug)]
pub struct PendingRequest {
    url: String,
    resolved: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PendingRequest {
    /// The URL the request was sent to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// `Resolved` once the callback has returned, `Pending` before.
    pub fn state(&self) -> RequestState {
        if self.resolved.load(Ordering::Acquire) {
            RequestState::Resolved
        } else {
            RequestState::Pending
        }
    }

    /// Wait until the callback has run.
    ///
    /// Also returns if the transport dropped its handler, in which case the
    /// state is still `Pending`.
    ///
    /// # Errors
    /// Returns `FormatterError::Other` if the callback panicked.
    pub async fn wait(self) -> Result<RequestState> {
        let resolved = self.resolved;
        self.task
            .await
            .map_err(|e| FormatterError::Other(e.to_string()))?;

        Ok(if resolved.load(Ordering::Acquire) {
            RequestState::Resolved
        } else {
            RequestState::Pending
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use std::time::Duration;

    fn formatter_with(args: &[(&str, &str)]) -> RequestFormatter {
        let mut formatter = RequestFormatter::new("https://example.com/search");
        for (name, value) in args {
            formatter.add_argument(name, value).unwrap();
        }
        formatter
    }

    fn immediate_ok(url: &str, on_complete: CompletionHandler) -> Result<()> {
        assert!(url.starts_with("https://example.com/search?"));
        on_complete(200, "json".to_string(), "{}".to_string());
        Ok(())
    }

    fn failing(_url: &str, _on_complete: CompletionHandler) -> Result<()> {
        Err(FormatterError::Other("malformed url".to_string()))
    }

    #[test]
    fn test_add_argument_reports_value() {
        let mut formatter = RequestFormatter::new("https://example.com/search");
        let status = formatter.add_argument("q", "rust").unwrap();
        assert_eq!(status, "Added: q With value: rust");
        assert_eq!(formatter.return_args().get("q").map(String::as_str), Some("rust"));
    }

    #[test]
    fn test_add_duplicate_keeps_first_value() {
        let mut formatter = formatter_with(&[("q", "first")]);

        let result = formatter.add_argument("q", "second");
        assert!(matches!(result, Err(FormatterError::DuplicateArgument(ref name)) if name == "q"));
        assert_eq!(formatter.return_args()["q"], "first");
    }

    #[test]
    fn test_add_duplicate_with_empty_value_is_rejected() {
        let mut formatter = formatter_with(&[("q", "")]);
        assert!(formatter.add_argument("q", "x").is_err());
        assert_eq!(formatter.return_args()["q"], "");
    }

    #[test]
    fn test_remove_argument() {
        let mut formatter = formatter_with(&[("q", "x"), ("page", "2")]);

        assert_eq!(formatter.remove_argument("page").unwrap(), "Removed: page");
        assert!(!formatter.return_args().contains_key("page"));

        let result = formatter.remove_argument("page");
        assert!(matches!(result, Err(FormatterError::ArgumentNotFound(_))));
        assert_eq!(formatter.return_args().len(), 1);
    }

    #[test]
    fn test_edit_argument() {
        let mut formatter = formatter_with(&[("q", "x")]);

        assert_eq!(
            formatter.edit_argument("q", "y").unwrap(),
            "Edited: q With value: y"
        );
        assert_eq!(formatter.return_args()["q"], "y");

        let before = formatter.return_args();
        let result = formatter.edit_argument("missing", "z");
        assert!(matches!(result, Err(FormatterError::ArgumentNotFound(ref name)) if name == "missing"));
        assert_eq!(formatter.return_args(), before);
    }

    #[test]
    fn test_clear_arguments() {
        let mut formatter = formatter_with(&[("q", "x"), ("page", "2")]);
        assert_eq!(formatter.clear_arguments(), "Cleared Arguments");
        assert!(formatter.return_args().is_empty());

        // Clearing an empty formatter also succeeds.
        assert_eq!(formatter.clear_arguments(), "Cleared Arguments");
    }

    #[test]
    fn test_return_args_is_a_copy() {
        let formatter = formatter_with(&[("q", "x")]);

        let mut snapshot = formatter.return_args();
        snapshot.insert("q".to_string(), "changed".to_string());
        snapshot.insert("extra".to_string(), "1".to_string());

        assert_eq!(formatter.return_args().len(), 1);
        assert_eq!(formatter.return_args()["q"], "x");
    }

    #[test]
    fn test_compile_arguments() {
        let mut formatter = formatter_with(&[("q", "hello world"), ("page", "2")]);

        let query = formatter.compile_arguments();
        assert!(query.contains("q=hello%20world&"));
        assert!(query.contains("page=2&"));
        assert!(query.ends_with('&'));
        assert_eq!(query.len(), "q=hello%20world&page=2&".len());
    }

    #[test]
    fn test_compile_url() {
        let mut formatter = formatter_with(&[("q", "x")]);
        formatter.compile_arguments();

        assert_eq!(formatter.compile_url(), "https://example.com/search?q=x&");
        assert_eq!(formatter.formatted_url(), "https://example.com/search?q=x&");
    }

    #[test]
    fn test_compile_url_before_compile_arguments() {
        let mut formatter = formatter_with(&[("q", "x")]);
        assert_eq!(formatter.compile_url(), "https://example.com/search?");
    }

    #[test]
    fn test_caches_are_stale_until_recompiled() {
        let mut formatter = formatter_with(&[("q", "x")]);
        formatter.compile_arguments();
        formatter.compile_url();

        formatter.edit_argument("q", "y").unwrap();
        assert_eq!(formatter.formatted_url(), "https://example.com/search?q=x&");

        // compile_url alone still uses the old argument string.
        assert_eq!(formatter.compile_url(), "https://example.com/search?q=x&");

        formatter.compile_arguments();
        assert_eq!(formatter.compile_url(), "https://example.com/search?q=y&");
    }

    #[tokio::test]
    async fn test_send_request_invokes_callback_once() {
        let mut formatter = formatter_with(&[("q", "x")]);
        formatter.compile_arguments();
        formatter.compile_url();

        let calls = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(Mutex::new(None));

        let counter = Arc::clone(&calls);
        let slot = Arc::clone(&received);
        let pending = formatter
            .send_request(&immediate_ok, move |response| {
                counter.fetch_add(1, Ordering::SeqCst);
                *slot.lock().unwrap() = Some(response);
            })
            .unwrap();

        assert_eq!(pending.url(), "https://example.com/search?q=x&");
        assert_eq!(pending.wait().await.unwrap(), RequestState::Resolved);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            received.lock().unwrap().clone(),
            Some(Response::new(200, "json", "{}"))
        );
    }

    #[tokio::test]
    async fn test_send_request_setup_failure_skips_callback() {
        let formatter = formatter_with(&[("q", "x")]);
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let result = formatter.send_request(&failing, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(matches!(result, Err(FormatterError::TransportSetup(_))));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_send_request_waits_for_late_completion() {
        let mut formatter = formatter_with(&[("q", "x")]);
        formatter.compile_arguments();
        formatter.compile_url();

        let (release_tx, release_rx) = oneshot::channel::<()>();
        let release_rx = Mutex::new(Some(release_rx));
        let deferred = move |_url: &str, on_complete: CompletionHandler| -> Result<()> {
            let release = release_rx.lock().unwrap().take();
            tokio::spawn(async move {
                if let Some(release) = release {
                    let _ = release.await;
                }
                on_complete(201, "text/plain".to_string(), "done".to_string());
            });
            Ok(())
        };

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let pending = formatter
            .send_request(&deferred, move |response| {
                assert_eq!(response.status, 201);
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(pending.state(), RequestState::Pending);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        release_tx.send(()).unwrap();
        assert_eq!(pending.wait().await.unwrap(), RequestState::Resolved);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_state_moves_from_pending_to_resolved() {
        let formatter = formatter_with(&[("q", "x")]);

        let handler = Arc::new(Mutex::new(None::<CompletionHandler>));
        let stash = Arc::clone(&handler);
        let holding = move |_url: &str, on_complete: CompletionHandler| -> Result<()> {
            *stash.lock().unwrap() = Some(on_complete);
            Ok(())
        };

        let pending = formatter.send_request(&holding, |_| {}).unwrap();
        assert_eq!(pending.state(), RequestState::Pending);

        let on_complete = handler.lock().unwrap().take().unwrap();
        on_complete(200, "json".to_string(), "{}".to_string());

        for _ in 0..100 {
            if pending.state() == RequestState::Resolved {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(pending.state(), RequestState::Resolved);
    }

    #[tokio::test]
    async fn test_send_request_dropped_handler_never_resolves() {
        let formatter = formatter_with(&[]);
        let dropping = |_url: &str, on_complete: CompletionHandler| -> Result<()> {
            drop(on_complete);
            Ok(())
        };

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let pending = formatter
            .send_request(&dropping, move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(pending.wait().await.unwrap(), RequestState::Pending);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_send_request_without_runtime() {
        let formatter = formatter_with(&[]);
        let result = formatter.send_request(&immediate_ok, |_| {});
        assert!(matches!(result, Err(FormatterError::TransportSetup(_))));
    }
}
