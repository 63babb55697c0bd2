use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// Records request count and latency for every HTTP request
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = normalize_path(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[&method, &path, &status])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[&method, &path])
        .observe(duration);

    response
}

/// Normalize URL path to avoid cardinality explosion in the path label.
/// ObjectId hex strings, calendar dates and numeric segments are collapsed
/// into placeholders.
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if is_object_id_like(segment) || is_numeric_id(segment) {
                "{id}"
            } else if is_date_like(segment) {
                "{date}"
            } else {
                segment
            }
        })
        .collect::<Vec<&str>>()
        .join("/")
}

/// MongoDB ObjectId rendered as hex: exactly 24 hex characters
fn is_object_id_like(s: &str) -> bool {
    s.len() == 24 && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// ISO calendar date: YYYY-MM-DD
fn is_date_like(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && s.chars()
            .enumerate()
            .all(|(i, c)| matches!(i, 4 | 7) || c.is_ascii_digit())
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("/api/v1/lessons/64b1f0a2c3d4e5f601234567/progress"),
            "/api/v1/lessons/{id}/progress"
        );
        assert_eq!(
            normalize_path("/api/v1/quizzes/123/attempts"),
            "/api/v1/quizzes/{id}/attempts"
        );
        assert_eq!(
            normalize_path("/api/v1/progress/goals/2026-08-06"),
            "/api/v1/progress/goals/{date}"
        );
        assert_eq!(normalize_path("/health"), "/health");
        assert_eq!(normalize_path("/metrics"), "/metrics");
    }

    #[test]
    fn test_is_object_id_like() {
        assert!(is_object_id_like("64b1f0a2c3d4e5f601234567"));
        assert!(!is_object_id_like("64b1f0a2c3d4e5f60123456"));
        assert!(!is_object_id_like("not-an-object-id-at-all!"));
    }

    #[test]
    fn test_is_date_like() {
        assert!(is_date_like("2026-08-06"));
        assert!(!is_date_like("2026-8-6"));
        assert!(!is_date_like("abcd-ef-gh"));
    }

    #[test]
    fn test_is_numeric_id() {
        assert!(is_numeric_id("123"));
        assert!(!is_numeric_id("abc"));
        assert!(!is_numeric_id(""));
    }
}
