//! Correlation-id generation and extraction
//!
//! Every request carries an opaque per-request identifier, propagated to the
//! server in two headers and, ideally, echoed back so client- and server-side
//! logs can be linked for one logical request.

use std::collections::HashMap;

use rand::Rng;

/// Header carrying the correlation id on outgoing requests
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Second header carrying the identical value, for hosts that only read one
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Response header names checked for a server-echoed id, in preference order
const RESPONSE_ID_HEADERS: [&str; 3] = ["x-request-id", "x-correlation-id", "x-trace-id"];

/// Generate a new correlation id.
///
/// Combines the current epoch millisecond with 64 bits of thread-local
/// randomness, so collisions among requests issued concurrently within one
/// process lifetime are negligible.
pub fn generate() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let entropy: u64 = rand::thread_rng().gen();
    format!("req-{millis:x}-{entropy:016x}")
}

/// Extract a server-echoed correlation id from response headers.
///
/// Header names are matched case-insensitively against a fixed preference
/// order. Absence is not an error.
pub fn extract_from_response(headers: &HashMap<String, String>) -> Option<String> {
    for name in RESPONSE_ID_HEADERS {
        let hit = headers
            .iter()
            .find(|(key, value)| key.eq_ignore_ascii_case(name) && !value.trim().is_empty());
        if let Some((_, value)) = hit {
            return Some(value.trim().to_string());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(generate()));
        }
    }

    #[test]
    fn test_generated_id_shape() {
        let id = generate();
        assert!(id.starts_with("req-"));
        assert!(!id.is_empty());
    }

    #[test]
    fn test_extract_prefers_request_id() {
        let mut headers = HashMap::new();
        headers.insert("x-trace-id".to_string(), "trace".to_string());
        headers.insert("x-request-id".to_string(), "req".to_string());
        assert_eq!(extract_from_response(&headers), Some("req".to_string()));
    }

    #[test]
    fn test_extract_is_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("X-Correlation-ID".to_string(), "corr".to_string());
        assert_eq!(extract_from_response(&headers), Some("corr".to_string()));
    }

    #[test]
    fn test_extract_absent() {
        let headers = HashMap::new();
        assert_eq!(extract_from_response(&headers), None);
    }

    #[test]
    fn test_extract_skips_blank_values() {
        let mut headers = HashMap::new();
        headers.insert("x-request-id".to_string(), "  ".to_string());
        headers.insert("x-trace-id".to_string(), "trace".to_string());
        assert_eq!(extract_from_response(&headers), Some("trace".to_string()));
    }
}
