use crate::error::{FormatterError, Result};
use std::env;

/// Base URL the command line tool sends its requests to
pub const BASE_URL_VAR: &str = "REQUEST_FORMATTER_BASE_URL";

/// Required environment variables for the application
const REQUIRED_ENV_VARS: &[&str] = &[BASE_URL_VAR];

/// Validates that all required environment variables are set
///
/// # Errors
/// Returns `FormatterError::MissingEnvVar` if any required environment variable is missing
///
/// # Returns
/// * `Result<()>` - Ok if all required environment variables are present
pub fn validate_env_vars() -> Result<()> {
    let missing_vars: Vec<&str> = REQUIRED_ENV_VARS
        .iter()
        .copied()
        .filter(|var_name| env::var(var_name).is_err())
        .collect();

    if !missing_vars.is_empty() {
        return Err(FormatterError::MissingEnvVar(missing_vars.join(", ")));
    }

    Ok(())
}

/// Gets a required environment variable
///
/// # Arguments
/// * `var_name` - The name of the environment variable to retrieve
///
/// # Errors
/// Returns `FormatterError::MissingEnvVar` if the environment variable is not set
pub fn get_required_env_var(var_name: &str) -> Result<String> {
    env::var(var_name).map_err(|_| FormatterError::MissingEnvVar(var_name.to_string()))
}
