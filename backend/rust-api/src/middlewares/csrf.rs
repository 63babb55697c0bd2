use axum::{
    extract::Request,
    http::{header, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use base64::{engine::general_purpose, Engine as _};
use rand::Rng;

pub const CSRF_COOKIE_NAME: &str = "csrf_token";
pub const CSRF_HEADER_NAME: &str = "x-csrf-token";

/// Double-submit cookie CSRF protection: state-changing requests must
/// carry the token both as a cookie and as the X-CSRF-Token header, and
/// the two must match. Safe methods pass through.
pub async fn csrf_middleware(
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let method = request.method();
    if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
        return Ok(next.run(request).await);
    }

    let cookie_token = jar.get(CSRF_COOKIE_NAME).map(|c| c.value().to_string());

    let header_token = request
        .headers()
        .get(CSRF_HEADER_NAME)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let (Some(cookie), Some(header)) = (cookie_token, header_token) else {
        tracing::warn!("CSRF validation failed: token missing");
        return Err(StatusCode::FORBIDDEN);
    };

    if cookie != header {
        tracing::warn!("CSRF validation failed: token mismatch");
        return Err(StatusCode::FORBIDDEN);
    }

    tracing::debug!("CSRF validation passed");
    Ok(next.run(request).await)
}

/// Generate a new CSRF token
pub fn generate_csrf_token() -> String {
    let random_bytes: [u8; 32] = rand::rng().random();
    general_purpose::URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Create a response with CSRF cookie set
pub fn set_csrf_cookie(mut response: Response, token: &str) -> Response {
    let cookie_value = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Secure",
        CSRF_COOKIE_NAME, token
    );

    response
        .headers_mut()
        .insert(header::SET_COOKIE, cookie_value.parse().unwrap());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_csrf_token() {
        let token1 = generate_csrf_token();
        let token2 = generate_csrf_token();

        assert!(!token1.is_empty());
        assert_ne!(token1, token2);
        assert!(general_purpose::URL_SAFE_NO_PAD.decode(&token1).is_ok());
    }
}
