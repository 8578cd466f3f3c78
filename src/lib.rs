use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GroupId(pub Uuid);

macro_rules! id_impl {
    ($I:ty) => {
        impl $I {
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }
        impl Default for $I {
            fn default() -> Self {
                Self::new()
            }
        }
        impl fmt::Display for $I {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_impl!(UserId);
id_impl!(RequestId);
id_impl!(GroupId);

/// Lifecycle of a friend request. `Pending` becomes `Accepted` exactly once,
/// by the recipient; there is no rejected state.
#[derive(Eq, PartialEq, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
}

/// Short profile projection used when listing friends and request peers.
#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCard {
    pub id: UserId,
    pub full_name: String,
    pub profile_picture: String,
    pub native_language: String,
    pub learning_language: String,
}

/// Full public profile, as returned by the recommendation endpoint.
#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub full_name: String,
    pub profile_picture: String,
    pub native_language: String,
    pub learning_language: String,
    pub location: String,
    pub bio: String,
}

/// The caller's own account, including private fields.
#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub profile_picture: String,
    pub native_language: String,
    pub learning_language: String,
    pub location: String,
    pub bio: String,
    pub is_onboarded: bool,
    pub friends: Vec<UserId>,
}

#[derive(Eq, PartialEq, Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestView {
    pub id: RequestId,
    pub sender: UserId,
    pub recipient: UserId,
    pub status: RequestStatus,
}

/// A pending request addressed to the caller, with the sender's card.
#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingRequest {
    pub id: RequestId,
    pub sender: UserCard,
}

/// A request the caller sent, with the recipient's card. Used both for
/// outgoing pending requests and for the "recently connected" history.
#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentRequest {
    pub id: RequestId,
    pub recipient: UserCard,
    pub status: RequestStatus,
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberCard {
    pub id: UserId,
    pub full_name: String,
    pub profile_picture: String,
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    pub members: Vec<MemberCard>,
    pub admins: Vec<MemberCard>,
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub full_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingRequest {
    pub full_name: String,
    pub native_language: String,
    pub learning_language: String,
    pub location: String,
    pub bio: String,
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Eq, PartialEq, Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGroupRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user: AccountView,
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedUsersResponse {
    pub recommended_users: Vec<UserProfile>,
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendsResponse {
    pub friends: Vec<UserCard>,
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestsResponse {
    pub incoming_friend_requests: Vec<IncomingRequest>,
    pub accepted_friend_requests: Vec<SentRequest>,
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingRequestsResponse {
    pub outgoing_friend_requests: Vec<SentRequest>,
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupsResponse {
    pub groups: Vec<GroupView>,
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTokenResponse {
    pub token: String,
}

#[derive(Eq, PartialEq, Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}
