use dotenv::dotenv;
use request_formatter::config::{self, BASE_URL_VAR};
use request_formatter::{FormatterError, HttpTransport, RequestFormatter, RequestState};
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run().await {
        error!("{e}");
        std::process::exit(1);
    }
}

/// Build the URL from `key=value` command line arguments and send it.
async fn run() -> Result<(), FormatterError> {
    config::validate_env_vars()?;
    let base_url = config::get_required_env_var(BASE_URL_VAR)?;

    let mut formatter = RequestFormatter::new(&base_url);
    for arg in env::args().skip(1) {
        let (name, value) = arg
            .split_once('=')
            .ok_or_else(|| FormatterError::Other(format!("expected key=value, got {arg}")))?;
        info!("{}", formatter.add_argument(name, value)?);
    }

    formatter.compile_arguments();
    let url = formatter.compile_url();
    info!("Sending request to {url}");

    let pending = formatter.send_request(&HttpTransport::new(), |response| {
        match serde_json::to_string_pretty(&response) {
            Ok(json) => println!("{json}"),
            Err(e) => error!("Could not print response: {e}"),
        }
    })?;

    match pending.wait().await? {
        RequestState::Resolved => Ok(()),
        state => Err(FormatterError::Other(format!(
            "request ended in state {state:?}"
        ))),
    }
}
