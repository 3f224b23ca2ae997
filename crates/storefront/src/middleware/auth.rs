//! Customer authentication extractors.
//!
//! Customers log in through Gigya (`POST /customer/gigya/login`); the
//! resulting [`CurrentCustomer`] is kept in the session.

use axum::{
    extract::FromRequestParts,
    http::{StatusCode, header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::models::{CurrentCustomer, session_keys};

/// Where customers without a session are sent.
pub const LOGIN_PATH: &str = "/customer/account/login";

/// Extractor that requires a logged-in customer.
///
/// Browser requests without a customer are redirected to the login page;
/// requests that accept JSON get `401 Unauthorized`.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireCustomer(customer): RequireCustomer,
/// ) -> impl IntoResponse {
///     format!("Hello, {}!", customer.email)
/// }
/// ```
pub struct RequireCustomer(pub CurrentCustomer);

/// Rejection for [`RequireCustomer`].
pub enum AuthRejection {
    /// Redirect to the login page.
    RedirectToLogin,
    /// Plain `401 Unauthorized`.
    Unauthorized,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
        }
    }
}

fn wants_json(parts: &Parts) -> bool {
    parts
        .headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"))
}

async fn session_customer(parts: &Parts) -> Option<CurrentCustomer> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await
        .ok()
        .flatten()
}

impl<S> FromRequestParts<S> for RequireCustomer
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match session_customer(parts).await {
            Some(customer) => Ok(Self(customer)),
            None if wants_json(parts) => Err(AuthRejection::Unauthorized),
            None => Err(AuthRejection::RedirectToLogin),
        }
    }
}

/// Extractor that optionally gets the current customer.
pub struct OptionalCustomer(pub Option<CurrentCustomer>);

impl<S> FromRequestParts<S> for OptionalCustomer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_customer(parts).await))
    }
}

/// Store the logged-in customer in the session.
///
/// The session ID is cycled first to prevent session fixation.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_customer(
    session: &Session,
    customer: &CurrentCustomer,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .insert(session_keys::CURRENT_CUSTOMER, customer)
        .await
}

/// Clear the logged-in customer from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_customer(
    session: &Session,
) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentCustomer>(session_keys::CURRENT_CUSTOMER)
        .await?;
    Ok(())
}
