//! Upgrade path matching for WebSocket listeners.

/// Case-insensitive prefix match of a request target against the configured
/// path prefix. Query and fragment are stripped first. A prefix of `/` or
/// shorter matches every target; otherwise the target must equal the prefix
/// or be a `/`-delimited descendant of it.
pub fn check_path(prefix: &str, target: &str) -> bool {
    if prefix.len() <= 1 {
        return true;
    }
    let path = if target.is_empty() {
        "/".to_string()
    } else {
        let trimmed = target.trim().to_ascii_lowercase();
        if trimmed.is_empty() {
            return false;
        }
        trimmed
    };
    let path = match path.find(['?', '#']) {
        Some(cut) => &path[..cut],
        None => &path[..],
    };
    let prefix = prefix.to_ascii_lowercase();
    if path.len() < prefix.len() {
        return false;
    }
    if path == prefix {
        return true;
    }
    path.starts_with(&prefix) && path.as_bytes()[prefix.len()] == b'/'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_prefix_matches_everything() {
        assert!(check_path("/", "/anything"));
        assert!(check_path("/", "/"));
        assert!(check_path("", "/x/y"));
        assert!(check_path("/", ""));
    }

    #[test]
    fn descendants_match() {
        assert!(check_path("/api", "/api"));
        assert!(check_path("/api", "/api/v1"));
        assert!(check_path("/api", "/api/v1?x=1#frag"));
        assert!(check_path("/api", "/API/V1"));
    }

    #[test]
    fn siblings_do_not_match() {
        assert!(!check_path("/api", "/apiv2"));
        assert!(!check_path("/api", "/ap"));
        assert!(!check_path("/api", "/"));
        assert!(!check_path("/api", "/other/api"));
    }

    #[test]
    fn query_and_fragment_are_stripped() {
        assert!(check_path("/api", "/api?token=abc"));
        assert!(check_path("/api", "/api#section"));
        assert!(!check_path("/api", "/apiv2?path=/api"));
    }
}
