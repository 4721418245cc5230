use crate::config::Config;

/// Shared HTTP client for the provider wrappers.  Every request is bounded by the configured
/// timeout; nothing in the pipeline retries.
pub fn http_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
}

/// Phone number with everything but the last four digits hidden, for logs.
pub fn mask_number(number: &str) -> String {
    let digits = number.chars().count();
    if digits <= 4 {
        return "*".repeat(digits);
    }
    let tail: String = number.chars().skip(digits - 4).collect();
    format!("{}{tail}", "*".repeat(digits - 4))
}

/// First `max` chars of a provider error body, for error messages.
pub fn truncate_body(body: String, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => body[..idx].to_string(),
        None => body,
    }
}
