use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    app_error::{AppError, StdResponse},
    models::is_staff_role,
};

/// Account record as the identity service reports it. The storefront keeps
/// no user table of its own; sessions and orders reference these ids.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct UserProfile {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub birth_date: Option<NaiveDate>,
    pub role: String,
}

impl UserProfile {
    pub fn display_name(&self) -> &str {
        if self.full_name.is_empty() {
            &self.username
        } else {
            &self.full_name
        }
    }

    pub fn is_staff(&self) -> bool {
        is_staff_role(&self.role)
    }
}

/// Registration payload forwarded to the identity service. The username is
/// the normalized phone number.
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CreateUserReq {
    pub username: String,
    pub full_name: String,
    pub birth_date: Option<NaiveDate>,
    pub phone: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

/// Checks an identifier/password pair. `None` means the credentials were
/// rejected; transport failures are errors.
pub async fn verify_credentials(
    client: Client,
    base_url: &str,
    identifier: &str,
    password: &str,
) -> Result<Option<UserProfile>> {
    let res: StdResponse<UserProfile, String> = client
        .post(format!("{}/auth/verify", base_url))
        .json(&serde_json::json!({ "identifier": identifier, "password": password }))
        .send()
        .await
        .map_err(|_| AppError::ServiceUnreachable("IdentityService".into()))?
        .json()
        .await
        .context("Failed to parse JSON")?;

    Ok(res.data)
}

/// Creates an account. The full envelope comes back so callers can forward
/// the service's own message when registration is refused.
pub async fn register_user(
    client: Client,
    base_url: &str,
    body: &CreateUserReq,
) -> Result<StdResponse<UserProfile, String>> {
    let res: StdResponse<UserProfile, String> = client
        .post(format!("{}/users", base_url))
        .json(body)
        .send()
        .await
        .map_err(|_| AppError::ServiceUnreachable("IdentityService".into()))?
        .json()
        .await
        .context("Failed to parse JSON")?;

    Ok(res)
}

pub async fn get_user_profile(
    client: Client,
    base_url: &str,
    user_id: i32,
) -> Result<Option<UserProfile>> {
    let res: StdResponse<UserProfile, String> = client
        .get(format!("{}/users/{}", base_url, user_id))
        .send()
        .await
        .map_err(|_| AppError::ServiceUnreachable("IdentityService".into()))?
        .json()
        .await
        .context("Failed to parse JSON")?;

    Ok(res.data)
}

/// All customer accounts, for the dashboard listing.
pub async fn get_customers(client: Client, base_url: &str) -> Result<Vec<UserProfile>> {
    let res: StdResponse<Vec<UserProfile>, String> = client
        .get(format!("{}/users", base_url))
        .query(&[("role", "customer")])
        .send()
        .await
        .map_err(|_| AppError::ServiceUnreachable("IdentityService".into()))?
        .json()
        .await
        .context("Failed to parse JSON")?;

    Ok(res.data.unwrap_or_default())
}
