//! Glue to the external chat/video provider.
//!
//! The provider owns message transport and calling; the server only mirrors
//! user profiles into it and hands out per-user access tokens. A user's 1:1
//! channel and a group's channel are addressed by the user/group id, so no
//! channel state is kept here. Provider failures never roll back the
//! operation that triggered them.

use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use lingolink_common::{ChatTokenResponse, UserId};

use crate::auth::AuthUser;
use crate::config::Config;
use crate::error::{ApiError, ApiResult};
use crate::store::UserDoc;
use crate::AppState;

#[derive(Clone)]
pub struct ChatProvider {
    http: reqwest::Client,
    credentials: Option<Credentials>,
}

#[derive(Clone)]
struct Credentials {
    base_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Deserialize)]
struct TokenBody {
    token: String,
}

impl ChatProvider {
    pub fn new(config: &Config) -> Self {
        let credentials = match (&config.chat_api_key, &config.chat_api_secret) {
            (Some(api_key), Some(api_secret)) => Some(Credentials {
                base_url: config.chat_base_url.trim_end_matches('/').to_owned(),
                api_key: api_key.clone(),
                api_secret: api_secret.clone(),
            }),
            _ => {
                tracing::warn!("CHAT_API_KEY / CHAT_API_SECRET not set, chat features disabled");
                None
            }
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self { http, credentials }
    }

    /// Mirrors a user's profile into the provider. Best effort: a failure is
    /// logged and the caller's operation proceeds.
    pub async fn sync_profile(&self, user: &UserDoc) {
        if let Err(err) = self.upsert_user(user).await {
            tracing::warn!("chat profile sync failed for {}: {err}", user.id);
        }
    }

    async fn upsert_user(&self, user: &UserDoc) -> ApiResult<()> {
        let credentials = self.require_credentials()?;
        self.http
            .post(format!("{}/users", credentials.base_url))
            .query(&[("api_key", credentials.api_key.as_str())])
            .bearer_auth(&credentials.api_secret)
            .json(&json!({
                "id": user.id,
                "name": user.full_name,
                "image": user.profile_picture,
            }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| ApiError::Dependency(format!("chat provider upsert failed: {err}")))?;
        Ok(())
    }

    /// Asks the provider for a messaging token scoped to `user_id`.
    pub async fn issue_token(&self, user_id: UserId) -> ApiResult<String> {
        let credentials = self.require_credentials()?;
        let body: TokenBody = self
            .http
            .post(format!("{}/tokens", credentials.base_url))
            .query(&[("api_key", credentials.api_key.as_str())])
            .bearer_auth(&credentials.api_secret)
            .json(&json!({ "user_id": user_id }))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|err| ApiError::Dependency(format!("chat provider token failed: {err}")))?
            .json()
            .await
            .map_err(|err| ApiError::Dependency(format!("chat provider token failed: {err}")))?;
        Ok(body.token)
    }

    fn require_credentials(&self) -> ApiResult<&Credentials> {
        self.credentials
            .as_ref()
            .ok_or_else(|| ApiError::Dependency("chat provider is not configured".to_owned()))
    }
}

// ---- handlers ----

pub(crate) async fn token(
    Extension(app): Extension<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<ChatTokenResponse>> {
    let token = app.chat.issue_token(caller).await?;
    Ok(Json(ChatTokenResponse { token }))
}
