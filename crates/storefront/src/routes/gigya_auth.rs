//! Gigya login and logout handlers.
//!
//! The login screen is a Gigya screen-set rendered in the browser. After a
//! successful Gigya login it posts the account UID with its signature here,
//! and the local customer is linked (or created) and logged in.

use axum::{
    Form, Json,
    extract::{Query, State},
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::db::PgCustomerStore;
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::middleware::auth::{LOGIN_PATH, clear_current_customer, set_current_customer};
use crate::models::CurrentCustomer;
use crate::routes::account::{ACCOUNT_PATH, MessageQuery, redirect_with};
use crate::services::{ProfileError, ProfileService};
use crate::state::AppState;

/// Where the Gigya screen-set posts after login.
pub const GIGYA_LOGIN_PATH: &str = "/customer/gigya/login";

/// Shown when the Gigya signature cannot be verified.
pub const LOGIN_NOT_VERIFIED: &str = "Login could not be verified. Please try again.";
/// Shown when the linked customer was deleted.
pub const ACCOUNT_UNAVAILABLE: &str = "This account is no longer available.";

/// Data the browser needs to render the Gigya login screen-set.
#[derive(Debug, Serialize)]
pub struct LoginView {
    pub api_key: String,
    pub domain: String,
    pub login_action: &'static str,
    pub errors: Vec<String>,
}

/// Form posted by the Gigya screen-set after login.
#[derive(Debug, Deserialize)]
pub struct GigyaLoginForm {
    #[serde(rename = "UID")]
    pub uid: String,
    #[serde(rename = "UIDSignature")]
    pub uid_signature: String,
    #[serde(rename = "signatureTimestamp")]
    pub signature_timestamp: String,
}

/// Login page data.
pub async fn login_page(
    State(state): State<AppState>,
    Query(query): Query<MessageQuery>,
) -> Json<LoginView> {
    let gigya = &state.config().gigya;
    Json(LoginView {
        api_key: gigya.api_key.clone(),
        domain: gigya.domain.clone(),
        login_action: GIGYA_LOGIN_PATH,
        errors: query.errors(),
    })
}

/// Complete a Gigya login.
///
/// Customer-facing failures redirect back to the login page with a message;
/// anything else is an application error.
#[tracing::instrument(skip(state, session, form), fields(uid = %form.uid))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<GigyaLoginForm>,
) -> Result<Redirect> {
    let store = PgCustomerStore::new(state.pool());
    let service = ProfileService::new(
        &store,
        state.gigya(),
        state.mapper(),
        state.events(),
        state.diagnostics(),
    );

    let result = service
        .login_federated(&form.uid, &form.uid_signature, &form.signature_timestamp)
        .await;

    let customer = match result {
        Ok(customer) => customer,
        Err(ProfileError::InvalidSignature) => {
            return Ok(redirect_with(LOGIN_PATH, "error", &[LOGIN_NOT_VERIFIED.to_string()]));
        }
        Err(ProfileError::MissingFields(errors)) => {
            return Ok(redirect_with(LOGIN_PATH, "error", errors.messages()));
        }
        Err(ProfileError::AccountDeleted) => {
            return Ok(redirect_with(LOGIN_PATH, "error", &[ACCOUNT_UNAVAILABLE.to_string()]));
        }
        Err(e) => return Err(e.into()),
    };

    let Some(current) = CurrentCustomer::from_record(&customer) else {
        return Err(AppError::Internal("saved customer has no id".to_string()));
    };

    set_current_customer(&session, &current)
        .await
        .map_err(|e| AppError::Internal(format!("session error: {e}")))?;
    set_sentry_user(&current.id, Some(current.email.as_str()));

    tracing::info!(customer_id = %current.id, "Customer logged in through Gigya");
    Ok(Redirect::to(ACCOUNT_PATH))
}

/// Log the customer out locally.
///
/// The Gigya session is ended by the browser SDK.
pub async fn logout(session: Session) -> Redirect {
    if let Err(e) = clear_current_customer(&session).await {
        tracing::error!(error = %e, "Failed to clear session customer");
    }
    clear_sentry_user();
    Redirect::to(LOGIN_PATH)
}
