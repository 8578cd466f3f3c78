//! Typed client for the lingolink HTTP API.
//!
//! One method per server operation. `signup`/`login` capture the session
//! token and every later call sends it as a bearer header; API errors come
//! back as `anyhow` errors carrying the status and the server's message.

use anyhow::{anyhow, Result};
use lingolink_common::{
    AccountView, AuthResponse, ChatTokenResponse, CreateGroupRequest, ErrorBody,
    FriendRequestView, FriendRequestsResponse, FriendsResponse, GroupId, GroupView,
    GroupsResponse, LoginRequest, OnboardingRequest, OutgoingRequestsResponse,
    RecommendedUsersResponse, RequestId, SentRequest, SignupRequest, UpdateGroupRequest,
    UserCard, UserId, UserProfile,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            http: Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            token: None,
        }
    }

    /// Use an existing session token instead of logging in.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub async fn signup(&mut self, body: &SignupRequest) -> Result<AuthResponse> {
        let auth: AuthResponse = expect_json(
            self.request(Method::POST, "/auth/signup").json(body).send().await?,
        )
        .await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    pub async fn login(&mut self, body: &LoginRequest) -> Result<AuthResponse> {
        let auth: AuthResponse = expect_json(
            self.request(Method::POST, "/auth/login").json(body).send().await?,
        )
        .await?;
        self.token = Some(auth.token.clone());
        Ok(auth)
    }

    pub async fn logout(&mut self) -> Result<()> {
        expect_ok(self.request(Method::POST, "/auth/logout").send().await?).await?;
        self.token = None;
        Ok(())
    }

    pub async fn me(&self) -> Result<AccountView> {
        expect_json(self.request(Method::GET, "/auth/me").send().await?).await
    }

    pub async fn complete_onboarding(&self, body: &OnboardingRequest) -> Result<AccountView> {
        expect_json(
            self.request(Method::POST, "/auth/onboarding").json(body).send().await?,
        )
        .await
    }

    pub async fn recommended_users(&self) -> Result<Vec<UserProfile>> {
        let body: RecommendedUsersResponse =
            expect_json(self.request(Method::GET, "/users").send().await?).await?;
        Ok(body.recommended_users)
    }

    pub async fn friends(&self) -> Result<Vec<UserCard>> {
        let body: FriendsResponse =
            expect_json(self.request(Method::GET, "/users/friends").send().await?).await?;
        Ok(body.friends)
    }

    pub async fn send_friend_request(&self, recipient: UserId) -> Result<FriendRequestView> {
        expect_json(
            self.request(Method::POST, &format!("/users/friend-request/{recipient}"))
                .send()
                .await?,
        )
        .await
    }

    pub async fn accept_friend_request(&self, request: RequestId) -> Result<FriendRequestView> {
        expect_json(
            self.request(Method::PUT, &format!("/users/friend-request/{request}/accept"))
                .send()
                .await?,
        )
        .await
    }

    pub async fn friend_requests(&self) -> Result<FriendRequestsResponse> {
        expect_json(self.request(Method::GET, "/users/friend-requests").send().await?).await
    }

    pub async fn outgoing_friend_requests(&self) -> Result<Vec<SentRequest>> {
        let body: OutgoingRequestsResponse = expect_json(
            self.request(Method::GET, "/users/friend-requests/outgoing").send().await?,
        )
        .await?;
        Ok(body.outgoing_friend_requests)
    }

    pub async fn chat_token(&self) -> Result<String> {
        let body: ChatTokenResponse =
            expect_json(self.request(Method::GET, "/chat/token").send().await?).await?;
        Ok(body.token)
    }

    pub async fn create_group(&self, body: &CreateGroupRequest) -> Result<GroupView> {
        expect_json(self.request(Method::POST, "/groups").json(body).send().await?).await
    }

    pub async fn groups(&self) -> Result<Vec<GroupView>> {
        let body: GroupsResponse =
            expect_json(self.request(Method::GET, "/groups").send().await?).await?;
        Ok(body.groups)
    }

    pub async fn group(&self, group: GroupId) -> Result<GroupView> {
        expect_json(self.request(Method::GET, &format!("/groups/{group}")).send().await?).await
    }

    pub async fn join_group(&self, group: GroupId) -> Result<GroupView> {
        expect_json(
            self.request(Method::POST, &format!("/groups/{group}/join")).send().await?,
        )
        .await
    }

    pub async fn leave_group(&self, group: GroupId) -> Result<GroupView> {
        expect_json(
            self.request(Method::POST, &format!("/groups/{group}/leave")).send().await?,
        )
        .await
    }

    pub async fn update_group(&self, group: GroupId, body: &UpdateGroupRequest) -> Result<GroupView> {
        expect_json(
            self.request(Method::PUT, &format!("/groups/{group}")).json(body).send().await?,
        )
        .await
    }

    pub async fn delete_group(&self, group: GroupId) -> Result<()> {
        expect_ok(self.request(Method::DELETE, &format!("/groups/{group}")).send().await?).await
    }

    pub async fn remove_group_member(&self, group: GroupId, member: UserId) -> Result<GroupView> {
        expect_json(
            self.request(Method::DELETE, &format!("/groups/{group}/member/{member}"))
                .send()
                .await?,
        )
        .await
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

async fn expect_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    if response.status().is_success() {
        Ok(response.json().await?)
    } else {
        Err(api_error(response).await)
    }
}

async fn expect_ok(response: Response) -> Result<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(api_error(response).await)
    }
}

async fn api_error(response: Response) -> anyhow::Error {
    let status: StatusCode = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => anyhow!("{status}: {}", body.message),
        Err(_) => anyhow!("{status}"),
    }
}
