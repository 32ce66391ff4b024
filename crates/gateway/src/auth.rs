//! Bearer-secret check for the agent endpoint.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use mission_protocol::constants::BEARER_PREFIX;

/// Returns `true` if `headers` carry `Authorization: Bearer <secret>`.
///
/// An empty `secret` disables authentication.
pub fn authorize(headers: &HeaderMap, secret: &str) -> bool {
    if secret.is_empty() {
        return true;
    }
    let Some(received) = headers.get(AUTHORIZATION) else {
        return false;
    };
    let expected = format!("{BEARER_PREFIX}{secret}");
    constant_time_eq(received.as_bytes(), expected.as_bytes())
}

fn constant_time_eq(received: &[u8], expected: &[u8]) -> bool {
    if received.len() != expected.len() {
        return false;
    }
    let mut diff = 0u8;
    for (a, b) in received.iter().zip(expected) {
        diff |= a ^ b;
    }
    diff == 0
}
