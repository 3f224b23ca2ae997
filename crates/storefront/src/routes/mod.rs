//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                      - Health check
//! GET  /health/ready                - Readiness check (database)
//!
//! # Gigya login
//! GET  /customer/account/login      - Login screen-set data (JSON)
//! POST /customer/gigya/login        - Complete a Gigya login (UID + signature)
//! POST /customer/account/logout     - Logout
//!
//! # Account (requires auth)
//! GET  /customer/account            - Account overview (JSON)
//! GET  /customer/account/edit       - Account data for the edit screen (JSON)
//! POST /customer/account/edit       - Save account edit
//! ```

pub mod account;
pub mod gigya_auth;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create the customer account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::index))
        .route("/edit", get(account::edit).post(account::edit_post))
        .route("/login", get(gigya_auth::login_page))
        .route("/logout", post(gigya_auth::logout))
}

/// Create the Gigya callback routes router.
pub fn gigya_routes() -> Router<AppState> {
    Router::new().route("/login", post(gigya_auth::login))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/customer/account", account_routes())
        .nest("/customer/gigya", gigya_routes())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use secrecy::SecretString;
    use tower::ServiceExt;

    use super::*;
    use crate::config::{GigyaConfig, StorefrontConfig};
    use crate::gigya::GigyaClient;
    use crate::middleware::auth::LOGIN_PATH;
    use crate::services::Credentials;

    fn app() -> Router {
        let gigya = GigyaConfig {
            api_key: "3_test-api-key".to_string(),
            domain: "us1.gigya.com".to_string(),
            app_key: "app-key".to_string(),
            key_file_location: None,
            debug_mode: false,
            request_timeout: Duration::from_secs(5),
            platform_name: "Storefront".to_string(),
            platform_version: "1.0".to_string(),
        };
        let config = StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/gim_test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            session_secret: SecretString::from("x".repeat(64)),
            gigya: gigya.clone(),
            sentry_dsn: None,
            sentry_environment: None,
        };
        let credentials = Arc::new(Credentials::new(
            gigya.api_key.clone(),
            SecretString::from("secret"),
            gigya.app_key.clone(),
            gigya.domain.clone(),
        ));
        let client = GigyaClient::new(credentials, &gigya).unwrap();
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/gim_test")
            .unwrap();

        routes().with_state(AppState::new(config, pool, client))
    }

    #[tokio::test]
    async fn test_account_redirects_to_login_without_customer() {
        let response = app()
            .oneshot(
                Request::get("/customer/account")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], LOGIN_PATH);
    }

    #[tokio::test]
    async fn test_account_json_request_is_unauthorized() {
        let response = app()
            .oneshot(
                Request::get("/customer/account/edit")
                    .header(header::ACCEPT, "application/json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_page_exposes_public_gigya_settings() {
        let response = app()
            .oneshot(
                Request::get("/customer/account/login?error=Invalid%20input")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["api_key"], "3_test-api-key");
        assert_eq!(json["login_action"], "/customer/gigya/login");
        assert_eq!(json["errors"][0], "Invalid input");
        assert!(json.get("app_key").is_none());
    }
}
