use std::{fmt::Display, sync::Arc};

use axum::{
    body::Bytes,
    extract::{FromRef, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use octocrab::models::webhook_events::WebhookEvent;
use pullcheck_core::config::Config;
use sha2::Sha256;

/// Check a `X-Hub-Signature-256` header against the request body.
///
/// Recomputes the HMAC-SHA256 of `body` keyed by `secret` and compares
/// it to the header's `sha256=<hex>` value in constant time. An
/// absent, empty, or malformed header is a plain `false`, never an
/// error.
pub fn verify_signature(body: &[u8], signature_header: &str, secret: &str) -> bool {
    let Some(hex_signature) = signature_header.strip_prefix("sha256=") else {
        return false;
    };
    let Ok(signature) = hex::decode(hex_signature) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

/// Verify and extract a GitHub event payload. Signature verification
/// happens before the body is parsed; a missing or mismatched
/// signature rejects the request with 401 and no job is created.
#[derive(Clone)]
#[must_use]
pub struct GitHubEvent {
    pub event: WebhookEvent,
}

impl<S> FromRequest<S> for GitHubEvent
where
    Arc<Config>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        fn err(status: StatusCode, m: impl Display) -> Response {
            tracing::error!("{m}");
            (status, m.to_string()).into_response()
        }
        let event = req
            .headers()
            .get("X-GitHub-Event")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| err(StatusCode::BAD_REQUEST, "X-GitHub-Event header missing"))?
            .to_string();
        let signature = req
            .headers()
            .get("X-Hub-Signature-256")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let config = <Arc<Config>>::from_ref(state);
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|_| err(StatusCode::BAD_REQUEST, "error reading body"))?;
        if let Some(secret) = &config.github.webhook_secret {
            let Some(signature) = signature else {
                return Err(err(StatusCode::UNAUTHORIZED, "X-Hub-Signature-256 missing"));
            };
            if !verify_signature(&body, &signature, secret) {
                return Err(err(StatusCode::UNAUTHORIZED, "signature mismatch"));
            }
        } else {
            tracing::warn!("No webhook secret configured, accepting event unverified");
        }
        let value = WebhookEvent::try_from_header_and_body(&event, &body)
            .map_err(|_| err(StatusCode::BAD_REQUEST, "error parsing body"))?;
        Ok(GitHubEvent { event: value })
    }
}

#[cfg(test)]
mod tests {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    use super::verify_signature;

    fn sign(body: &[u8], secret: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn test_valid_signature_verifies() {
        let body = b"{\"action\":\"opened\"}";
        let header = sign(body, "s3cret");
        assert!(verify_signature(body, &header, "s3cret"));
    }

    #[test]
    fn test_mutated_body_or_secret_fails() {
        let body = b"{\"action\":\"opened\"}";
        let header = sign(body, "s3cret");
        assert!(!verify_signature(b"{\"action\":\"opened\" }", &header, "s3cret"));
        assert!(!verify_signature(body, &header, "s3cres"));
    }

    #[test]
    fn test_malformed_headers_fail() {
        let body = b"payload";
        assert!(!verify_signature(body, "", "s3cret"));
        assert!(!verify_signature(body, "sha256=", "s3cret"));
        assert!(!verify_signature(body, "sha256=zz", "s3cret"));
        let without_prefix = sign(body, "s3cret").replace("sha256=", "");
        assert!(!verify_signature(body, &without_prefix, "s3cret"));
    }
}
