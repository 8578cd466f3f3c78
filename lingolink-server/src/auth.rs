//! Accounts and caller identity: signup, login, onboarding, and the
//! bearer-token sessions every protected route resolves the caller from.

use std::sync::OnceLock;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use lingolink_common::{
    AccountView, AuthResponse, LoginRequest, OnboardingRequest, SignupRequest, UserId,
};
use rand::Rng;
use regex::Regex;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::store::{unix_now, SessionDoc, Store, UserDoc};
use crate::AppState;

const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// The authenticated caller, resolved from the `Authorization: Bearer` header.
#[derive(Debug)]
pub struct AuthUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Extension(app) = Extension::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::Internal(anyhow::anyhow!("app state not installed")))?;
        let token = bearer_token(&parts.headers).ok_or(ApiError::Unauthorized)?;
        authenticate(&app.store, &token)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_owned)
}

/// Resolves a session token to the caller it belongs to. Expired sessions are
/// dropped on sight.
pub fn authenticate(store: &Store, token: &str) -> ApiResult<AuthUser> {
    let Some(session) = store.session(token)? else {
        return Err(ApiError::Unauthorized);
    };
    if session.expires_at < unix_now() {
        store.remove_session(token)?;
        return Err(ApiError::Unauthorized);
    }
    Ok(AuthUser(session.user_id))
}

pub fn open_session(store: &Store, user_id: UserId) -> ApiResult<String> {
    let token = Uuid::now_v7().simple().to_string();
    let session = SessionDoc {
        user_id,
        expires_at: unix_now() + SESSION_TTL_SECS,
    };
    store.put_session(&token, &session)?;
    Ok(token)
}

/// Validates the signup payload and inserts the new account. Duplicate email
/// is a conflict (the email index insert is the authority under races).
pub fn register(store: &Store, body: SignupRequest) -> ApiResult<UserDoc> {
    let full_name = body.full_name.trim();
    let email = body.email.trim().to_lowercase();
    if full_name.is_empty() || email.is_empty() || body.password.is_empty() {
        return Err(ApiError::Validation("all fields are required".to_owned()));
    }
    if body.password.chars().count() < 8 {
        return Err(ApiError::Validation(
            "password must be at least 8 characters long".to_owned(),
        ));
    }
    if !valid_email(&email) {
        return Err(ApiError::Validation("invalid email format".to_owned()));
    }

    let user = UserDoc::new(
        full_name.to_owned(),
        email,
        hash_password(&body.password)?,
        random_avatar(),
    );
    store.create_user(&user)?;
    Ok(user)
}

/// Checks credentials; unknown email and wrong password are indistinguishable.
pub fn verify_login(store: &Store, body: &LoginRequest) -> ApiResult<UserDoc> {
    let email = body.email.trim().to_lowercase();
    if email.is_empty() || body.password.is_empty() {
        return Err(ApiError::Validation("all fields are required".to_owned()));
    }
    let Some(user) = store.user_by_email(&email)? else {
        return Err(ApiError::Unauthorized);
    };
    if !verify_password(&user.password_hash, &body.password) {
        return Err(ApiError::Unauthorized);
    }
    Ok(user)
}

/// Fills in the profile and marks the account onboarded. Every field is
/// required; the error names the ones that are missing.
pub fn onboard(
    store: &Store,
    caller: UserId,
    body: &OnboardingRequest,
) -> ApiResult<UserDoc> {
    let missing: Vec<&str> = [
        ("fullName", body.full_name.trim()),
        ("nativeLanguage", body.native_language.trim()),
        ("learningLanguage", body.learning_language.trim()),
        ("location", body.location.trim()),
        ("bio", body.bio.trim()),
    ]
    .iter()
    .filter(|(_, value)| value.is_empty())
    .map(|(field, _)| *field)
    .collect();
    if !missing.is_empty() {
        return Err(ApiError::Validation(format!(
            "all fields are required, missing: {}",
            missing.join(", ")
        )));
    }

    store.update_user(&caller, |user| {
        user.full_name = body.full_name.trim().to_owned();
        user.native_language = body.native_language.trim().to_owned();
        user.learning_language = body.learning_language.trim().to_owned();
        user.location = body.location.trim().to_owned();
        user.bio = body.bio.trim().to_owned();
        user.is_onboarded = true;
        Ok(())
    })
}

fn valid_email(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"))
        .is_match(email)
}

fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow::anyhow!("hashing password: {err}"))?;
    Ok(hash.to_string())
}

fn verify_password(hash: &str, password: &str) -> bool {
    PasswordHash::new(hash)
        .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
        .is_ok()
}

fn random_avatar() -> String {
    let idx = rand::rng().random_range(1..=100);
    format!("https://avatar.iran.liara.run/public/{idx}.png")
}

// ---- handlers ----

pub(crate) async fn signup(
    Extension(app): Extension<AppState>,
    Json(body): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let user = register(&app.store, body)?;
    tracing::info!("new account {} ({})", user.id, user.email);
    app.chat.sync_profile(&user).await;
    let token = open_session(&app.store, user.id)?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: user.account(),
        }),
    ))
}

pub(crate) async fn login(
    Extension(app): Extension<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    let user = verify_login(&app.store, &body)?;
    let token = open_session(&app.store, user.id)?;
    Ok(Json(AuthResponse {
        token,
        user: user.account(),
    }))
}

pub(crate) async fn logout(
    Extension(app): Extension<AppState>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    if let Some(token) = bearer_token(&headers) {
        app.store.remove_session(&token)?;
    }
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn onboarding(
    Extension(app): Extension<AppState>,
    AuthUser(caller): AuthUser,
    Json(body): Json<OnboardingRequest>,
) -> ApiResult<Json<AccountView>> {
    let user = onboard(&app.store, caller, &body)?;
    app.chat.sync_profile(&user).await;
    Ok(Json(user.account()))
}

pub(crate) async fn me(
    Extension(app): Extension<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<AccountView>> {
    let user = app.store.require_user(&caller)?;
    Ok(Json(user.account()))
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn open_store(dir: &TempDir) -> Store {
        Store::open(dir.path().join("db")).unwrap()
    }

    fn signup_body(name: &str, email: &str) -> SignupRequest {
        SignupRequest {
            full_name: name.to_owned(),
            email: email.to_owned(),
            password: "hunter2hunter2".to_owned(),
        }
    }

    #[test]
    fn email_format() {
        assert!(valid_email("mira@example.com"));
        assert!(valid_email("a.b+c@mail.co.uk"));
        assert!(!valid_email("mira@example"));
        assert!(!valid_email("mira example@x.com"));
        assert!(!valid_email("@example.com"));
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password(&hash, "correct horse"));
        assert!(!verify_password(&hash, "wrong horse"));
    }

    #[test]
    fn register_rejects_short_password_and_bad_email() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let mut body = signup_body("Mira", "mira@example.com");
        body.password = "short".to_owned();
        assert!(matches!(
            register(&store, body).unwrap_err(),
            ApiError::Validation(_)
        ));

        let body = signup_body("Mira", "not-an-email");
        assert!(matches!(
            register(&store, body).unwrap_err(),
            ApiError::Validation(_)
        ));
    }

    #[test]
    fn duplicate_email_conflicts() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        register(&store, signup_body("Mira", "mira@example.com")).unwrap();
        // same address, different case
        let err = register(&store, signup_body("Imposter", "MIRA@example.com")).unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn login_and_session_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let user = register(&store, signup_body("Mira", "mira@example.com")).unwrap();
        let login = LoginRequest {
            email: "mira@example.com".to_owned(),
            password: "hunter2hunter2".to_owned(),
        };
        let logged_in = verify_login(&store, &login).unwrap();
        assert_eq!(logged_in.id, user.id);

        let token = open_session(&store, user.id).unwrap();
        let AuthUser(caller) = authenticate(&store, &token).unwrap();
        assert_eq!(caller, user.id);

        store.remove_session(&token).unwrap();
        assert!(matches!(
            authenticate(&store, &token).unwrap_err(),
            ApiError::Unauthorized
        ));
    }

    #[test]
    fn wrong_credentials_are_unauthorized() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        register(&store, signup_body("Mira", "mira@example.com")).unwrap();
        let bad_password = LoginRequest {
            email: "mira@example.com".to_owned(),
            password: "not-the-password".to_owned(),
        };
        assert!(matches!(
            verify_login(&store, &bad_password).unwrap_err(),
            ApiError::Unauthorized
        ));
        let unknown_email = LoginRequest {
            email: "ghost@example.com".to_owned(),
            password: "hunter2hunter2".to_owned(),
        };
        assert!(matches!(
            verify_login(&store, &unknown_email).unwrap_err(),
            ApiError::Unauthorized
        ));
    }

    #[test]
    fn expired_session_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let session = SessionDoc {
            user_id: UserId::new(),
            expires_at: unix_now() - 1,
        };
        store.put_session("stale", &session).unwrap();
        assert!(matches!(
            authenticate(&store, "stale").unwrap_err(),
            ApiError::Unauthorized
        ));
    }

    #[test]
    fn onboarding_requires_every_field() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        let user = register(&store, signup_body("Mira", "mira@example.com")).unwrap();

        let body = OnboardingRequest {
            full_name: "Mira Valdez".to_owned(),
            native_language: "Spanish".to_owned(),
            learning_language: "Japanese".to_owned(),
            location: "".to_owned(),
            bio: "".to_owned(),
        };
        let err = onboard(&store, user.id, &body).unwrap_err();
        match err {
            ApiError::Validation(message) => {
                assert!(message.contains("location"));
                assert!(message.contains("bio"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }

        let body = OnboardingRequest {
            location: "Osaka".to_owned(),
            bio: "learning while travelling".to_owned(),
            ..body
        };
        let onboarded = onboard(&store, user.id, &body).unwrap();
        assert!(onboarded.is_onboarded);
        assert_eq!(onboarded.native_language, "Spanish");
    }
}
