//! Host environment helpers

/// The calling process's environment as `KEY=VALUE` entries.
///
/// Variables whose name or value is not valid unicode are skipped.
pub fn host_environment() -> Vec<String> {
    std::env::vars_os()
        .filter_map(|(key, value)| {
            let key = key.into_string().ok()?;
            let value = value.into_string().ok()?;
            Some(env_entry(&key, &value))
        })
        .collect()
}

/// Format a single `KEY=VALUE` entry
pub fn env_entry(key: &str, value: &str) -> String {
    format!("{}={}", key, value)
}

/// Split a `KEY=VALUE` entry on the first `=`.
///
/// Returns `None` when there is no `=` or the key is empty.
pub fn split_env_entry(entry: &str) -> Option<(&str, &str)> {
    match entry.split_once('=') {
        Some((key, value)) if !key.is_empty() => Some((key, value)),
        _ => None,
    }
}
