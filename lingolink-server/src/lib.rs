pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod friends;
pub mod groups;
pub mod store;

use axum::routing::{delete, get, post, put};
use axum::{Extension, Router};

use chat::ChatProvider;
use store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub chat: ChatProvider,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/onboarding", post(auth::onboarding))
        .route("/auth/me", get(auth::me))
        .route("/users", get(friends::recommended))
        .route("/users/friends", get(friends::friends))
        .route("/users/friend-request/:id", post(friends::send))
        .route("/users/friend-request/:id/accept", put(friends::accept))
        .route("/users/friend-requests", get(friends::requests))
        .route("/users/friend-requests/outgoing", get(friends::outgoing))
        .route("/chat/token", get(chat::token))
        .route("/groups", post(groups::create).get(groups::list))
        .route(
            "/groups/:id",
            get(groups::get_one).put(groups::update).delete(groups::remove),
        )
        .route("/groups/:id/join", post(groups::join))
        .route("/groups/:id/leave", post(groups::leave))
        .route("/groups/:id/member/:user_id", delete(groups::remove_one_member))
        .layer(Extension(state))
}
