//! Bearer-token authentication middleware for the render API.

use crate::config::AuthConfig;
use crate::server::AppContext;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeader,
};

/// Check the presented bearer token against the configured API key.
fn check_auth(
    auth_config: &AuthConfig,
    bearer_token: Option<&str>,
) -> Result<(), (StatusCode, &'static str)> {
    if !auth_config.enabled {
        return Ok(());
    }

    if let (Some(token), Some(api_key)) = (bearer_token, auth_config.api_key.as_deref()) {
        if token == api_key {
            return Ok(());
        }
    }

    Err((StatusCode::UNAUTHORIZED, "Authentication required"))
}

/// Middleware for API key authentication
pub async fn api_auth_middleware(
    State(ctx): State<AppContext>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let bearer_token = bearer.as_ref().map(|b| b.token());
    check_auth(&ctx.config.server.auth, bearer_token)?;
    Ok(next.run(request).await)
}

/// Generate a random API key
pub fn generate_api_key() -> String {
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    URL_SAFE_NO_PAD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth_config(enabled: bool, key: Option<&str>) -> AuthConfig {
        AuthConfig {
            enabled,
            api_key: key.map(str::to_string),
        }
    }

    #[test]
    fn test_disabled_auth_allows_everything() {
        assert!(check_auth(&auth_config(false, None), None).is_ok());
        assert!(check_auth(&auth_config(false, None), Some("anything")).is_ok());
    }

    #[test]
    fn test_enabled_auth_requires_matching_key() {
        let cfg = auth_config(true, Some("secret"));
        assert!(check_auth(&cfg, Some("secret")).is_ok());
        assert!(check_auth(&cfg, Some("wrong")).is_err());
        assert!(check_auth(&cfg, None).is_err());
    }

    #[test]
    fn test_generated_keys_are_distinct() {
        let a = generate_api_key();
        let b = generate_api_key();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
    }
}
