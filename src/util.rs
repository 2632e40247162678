use std::path::PathBuf;

/// Root of all client-side files (`~/.bobavim`).
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".bobavim"))
}

/// Strips trailing slashes so endpoint paths can be appended with `format!`.
pub fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Get current Unix timestamp in seconds.
pub fn unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(normalize_base_url("http://localhost:5000/"), "http://localhost:5000");
        assert_eq!(normalize_base_url("  http://a//  "), "http://a");
        assert_eq!(normalize_base_url("http://a"), "http://a");
    }
}
