//! Account route handlers.
//!
//! These routes require a logged-in customer. Pages are rendered client-side,
//! so the GET handlers answer with JSON and the POST handlers with redirects
//! carrying their messages in the query string.

use axum::{
    Form, Json,
    extract::{Query, State},
    response::Redirect,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use gigya_im_core::{CustomerAddress, LocalCustomerRecord};

use crate::db::{CustomerStore, PgCustomerStore};
use crate::error::{AppError, Result};
use crate::middleware::auth::{RequireCustomer, set_current_customer};
use crate::models::CurrentCustomer;
use crate::services::{ProfileEditForm, ProfileService};
use crate::services::profile::{INVALID_INPUT, SAVED};
use crate::state::AppState;

/// Account overview path.
pub const ACCOUNT_PATH: &str = "/customer/account";
/// Account edit path.
pub const EDIT_PATH: &str = "/customer/account/edit";

/// Separator between messages in a redirect query.
const MESSAGE_SEPARATOR: char = '\n';

/// Flash messages carried in the query string.
#[derive(Debug, Default, Deserialize)]
pub struct MessageQuery {
    pub success: Option<String>,
    pub error: Option<String>,
}

impl MessageQuery {
    /// Error messages, split on the separator.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        self.error
            .as_deref()
            .map(|e| {
                e.split(MESSAGE_SEPARATOR)
                    .filter(|m| !m.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Customer data returned by the account endpoints.
#[derive(Debug, Serialize)]
pub struct AccountView {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gigya_uid: Option<String>,
    pub is_synchronized_to_gigya: bool,
    pub addresses: Vec<CustomerAddress>,
    pub success: Option<String>,
    pub errors: Vec<String>,
}

impl AccountView {
    fn new(customer: LocalCustomerRecord, query: &MessageQuery) -> Self {
        Self {
            email: customer.email.into_inner(),
            first_name: customer.first_name,
            last_name: customer.last_name,
            gigya_uid: customer.gigya_uid,
            is_synchronized_to_gigya: customer.is_synchronized_to_gigya,
            addresses: customer.addresses,
            success: query.success.clone(),
            errors: query.errors(),
        }
    }
}

/// Account edit form.
///
/// `gigya_user` is the account JSON posted by the Gigya profile screen-set;
/// `addresses` is a JSON array of addresses and may be omitted.
#[derive(Debug, Deserialize)]
pub struct EditAccountForm {
    pub email: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub change_password: Option<String>,
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password_confirmation: String,
    pub gigya_user: Option<String>,
    pub addresses: Option<String>,
}

impl EditAccountForm {
    /// Parse the embedded JSON fields.
    fn into_profile_form(self) -> std::result::Result<ProfileEditForm, serde_json::Error> {
        let gigya_user = match self.gigya_user.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(serde_json::from_str(raw)?),
            _ => None,
        };
        let addresses = match self.addresses.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
            _ => Vec::new(),
        };

        Ok(ProfileEditForm {
            email: self.email,
            first_name: self.firstname,
            last_name: self.lastname,
            addresses,
            change_password: self
                .change_password
                .as_deref()
                .is_some_and(|v| matches!(v, "1" | "true" | "on")),
            current_password: self.current_password,
            new_password: self.password,
            password_confirmation: self.password_confirmation,
            gigya_user,
        })
    }
}

/// Build a redirect carrying messages in the query string.
#[must_use]
pub fn redirect_with(path: &str, key: &str, messages: &[String]) -> Redirect {
    let joined = messages.join(&MESSAGE_SEPARATOR.to_string());
    Redirect::to(&format!("{path}?{key}={}", urlencoding::encode(&joined)))
}

async fn load_customer(state: &AppState, current: &CurrentCustomer) -> Result<LocalCustomerRecord> {
    PgCustomerStore::new(state.pool())
        .find_by_id(current.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("customer {}", current.id)))
}

/// Display account overview.
pub async fn index(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    Query(query): Query<MessageQuery>,
) -> Result<Json<AccountView>> {
    let customer = load_customer(&state, &current).await?;
    Ok(Json(AccountView::new(customer, &query)))
}

/// Display account data for editing, with the messages of the last attempt.
pub async fn edit(
    State(state): State<AppState>,
    RequireCustomer(current): RequireCustomer,
    Query(query): Query<MessageQuery>,
) -> Result<Json<AccountView>> {
    let customer = load_customer(&state, &current).await?;
    Ok(Json(AccountView::new(customer, &query)))
}

/// Save an account edit.
///
/// Redirects to the account page on success, or back to the edit page with
/// the messages to show.
#[tracing::instrument(skip(state, session, current, form), fields(customer_id = %current.id))]
pub async fn edit_post(
    State(state): State<AppState>,
    session: Session,
    RequireCustomer(current): RequireCustomer,
    Form(form): Form<EditAccountForm>,
) -> Result<Redirect> {
    let form = match form.into_profile_form() {
        Ok(form) => form,
        Err(e) => {
            tracing::warn!(error = %e, "Malformed account edit form");
            return Ok(redirect_with(EDIT_PATH, "error", &[INVALID_INPUT.to_string()]));
        }
    };

    let store = PgCustomerStore::new(state.pool());
    let service = ProfileService::new(
        &store,
        state.gigya(),
        state.mapper(),
        state.events(),
        state.diagnostics(),
    );
    let report = service.edit_profile(current.id, form).await?;

    if let Some(customer) = &report.customer
        && let Some(updated) = CurrentCustomer::from_record(customer)
        && updated != current
        && let Err(e) = set_current_customer(&session, &updated).await
    {
        tracing::error!(error = %e, "Failed to refresh session customer");
    }

    if report.is_success() {
        Ok(redirect_with(ACCOUNT_PATH, "success", &[SAVED.to_string()]))
    } else {
        Ok(redirect_with(EDIT_PATH, "error", &report.messages))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn form() -> EditAccountForm {
        EditAccountForm {
            email: "a@b.com".to_string(),
            firstname: Some("A".to_string()),
            lastname: Some("B".to_string()),
            change_password: None,
            current_password: String::new(),
            password: String::new(),
            password_confirmation: String::new(),
            gigya_user: None,
            addresses: None,
        }
    }

    #[test]
    fn test_into_profile_form_defaults() {
        let profile = form().into_profile_form().unwrap();
        assert!(!profile.change_password);
        assert!(profile.addresses.is_empty());
        assert!(profile.gigya_user.is_none());
    }

    #[test]
    fn test_into_profile_form_parses_json_fields() {
        let mut form = form();
        form.change_password = Some("1".to_string());
        form.gigya_user = Some(r#"{"UID": "uid-1"}"#.to_string());
        form.addresses = Some(
            r#"[{"id": null, "first_name": "A", "last_name": "B", "street": "1 Main St",
                "city": "Springfield", "postcode": "12345", "country_code": "US",
                "telephone": null, "is_default_billing": true, "is_default_shipping": false}]"#
                .to_string(),
        );

        let profile = form.into_profile_form().unwrap();
        assert!(profile.change_password);
        assert_eq!(profile.addresses.len(), 1);
        assert_eq!(profile.addresses[0].city, "Springfield");
        assert_eq!(profile.gigya_user.unwrap()["UID"], "uid-1");
    }

    #[test]
    fn test_into_profile_form_rejects_bad_json() {
        let mut form = form();
        form.gigya_user = Some("{not json".to_string());
        assert!(form.into_profile_form().is_err());
    }

    #[test]
    fn test_redirect_with_messages() {
        let query = MessageQuery {
            success: None,
            error: Some("Confirm your new password.\nInvalid input".to_string()),
        };
        assert_eq!(
            query.errors(),
            vec!["Confirm your new password.", "Invalid input"]
        );

        let response = axum::response::IntoResponse::into_response(redirect_with(
            EDIT_PATH,
            "error",
            &["Invalid input".to_string()],
        ));
        assert_eq!(
            response.headers()["location"],
            "/customer/account/edit?error=Invalid%20input"
        );
    }
}
