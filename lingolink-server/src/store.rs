//! sled-backed document store. One tree per collection, JSON values.
//!
//! Single-document mutations go through a compare-and-swap loop, and the
//! uniqueness indexes (email, request pair, group name) are CAS inserts
//! against an absent key, so two racing writers cannot both claim one.

use std::collections::BTreeSet;
use std::path::Path;

use lingolink_common::{
    AccountView, GroupId, MemberCard, RequestId, RequestStatus, UserCard, UserId, UserProfile,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sled::Tree;
use time::OffsetDateTime;

use crate::error::{ApiError, ApiResult};

pub fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserDoc {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    pub password_hash: String,
    pub profile_picture: String,
    pub native_language: String,
    pub learning_language: String,
    pub location: String,
    pub bio: String,
    pub is_onboarded: bool,
    pub friends: BTreeSet<UserId>,
    pub created_at: i64,
}

impl UserDoc {
    /// Fresh account with the signup defaults; profile fields are filled in
    /// later by onboarding.
    pub fn new(full_name: String, email: String, password_hash: String, avatar: String) -> Self {
        Self {
            id: UserId::new(),
            full_name,
            email,
            password_hash,
            profile_picture: avatar,
            native_language: "English".to_owned(),
            learning_language: "English".to_owned(),
            location: "No location yet".to_owned(),
            bio: "No bio yet".to_owned(),
            is_onboarded: false,
            friends: BTreeSet::new(),
            created_at: unix_now(),
        }
    }

    pub fn card(&self) -> UserCard {
        UserCard {
            id: self.id,
            full_name: self.full_name.clone(),
            profile_picture: self.profile_picture.clone(),
            native_language: self.native_language.clone(),
            learning_language: self.learning_language.clone(),
        }
    }

    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: self.id,
            full_name: self.full_name.clone(),
            profile_picture: self.profile_picture.clone(),
            native_language: self.native_language.clone(),
            learning_language: self.learning_language.clone(),
            location: self.location.clone(),
            bio: self.bio.clone(),
        }
    }

    pub fn member_card(&self) -> MemberCard {
        MemberCard {
            id: self.id,
            full_name: self.full_name.clone(),
            profile_picture: self.profile_picture.clone(),
        }
    }

    pub fn account(&self) -> AccountView {
        AccountView {
            id: self.id,
            full_name: self.full_name.clone(),
            email: self.email.clone(),
            profile_picture: self.profile_picture.clone(),
            native_language: self.native_language.clone(),
            learning_language: self.learning_language.clone(),
            location: self.location.clone(),
            bio: self.bio.clone(),
            is_onboarded: self.is_onboarded,
            friends: self.friends.iter().copied().collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RequestDoc {
    pub id: RequestId,
    pub sender: UserId,
    pub recipient: UserId,
    pub status: RequestStatus,
    pub created_at: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupDoc {
    pub id: GroupId,
    pub name: String,
    pub description: String,
    // members keeps join order (first member = creator); treated as a set,
    // mutations are contains/push/retain, never positional edits.
    pub members: Vec<UserId>,
    pub admins: BTreeSet<UserId>,
    pub created_at: i64,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SessionDoc {
    pub user_id: UserId,
    pub expires_at: i64,
}

#[derive(Clone)]
pub struct Store {
    users: Tree,
    users_by_email: Tree,
    requests: Tree,
    request_pairs: Tree,
    groups: Tree,
    group_names: Tree,
    sessions: Tree,
}

impl Store {
    pub fn open(path: impl AsRef<Path>) -> ApiResult<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            users: db.open_tree("users")?,
            users_by_email: db.open_tree("users_by_email")?,
            requests: db.open_tree("requests")?,
            request_pairs: db.open_tree("request_pairs")?,
            groups: db.open_tree("groups")?,
            group_names: db.open_tree("group_names")?,
            sessions: db.open_tree("sessions")?,
        })
    }

    // ---- users ----

    /// Inserts a new user, claiming the email index entry first so a racing
    /// signup with the same address loses cleanly.
    pub fn create_user(&self, user: &UserDoc) -> ApiResult<()> {
        if !insert_unique(&self.users_by_email, &user.email, &user.id.to_string())? {
            return Err(ApiError::Conflict("email already exists, please login".to_owned()));
        }
        put_doc(&self.users, &user.id.to_string(), user)
    }

    pub fn user(&self, id: &UserId) -> ApiResult<Option<UserDoc>> {
        get_doc(&self.users, &id.to_string())
    }

    pub fn require_user(&self, id: &UserId) -> ApiResult<UserDoc> {
        self.user(id)?
            .ok_or_else(|| ApiError::NotFound("user not found".to_owned()))
    }

    pub fn user_by_email(&self, email: &str) -> ApiResult<Option<UserDoc>> {
        let Some(raw) = self.users_by_email.get(email.as_bytes())? else {
            return Ok(None);
        };
        let id = String::from_utf8_lossy(&raw).to_string();
        get_doc(&self.users, &id)
    }

    pub fn update_user(
        &self,
        id: &UserId,
        apply: impl FnMut(&mut UserDoc) -> ApiResult<()>,
    ) -> ApiResult<UserDoc> {
        modify_doc(&self.users, &id.to_string(), apply)?
            .ok_or_else(|| ApiError::NotFound("user not found".to_owned()))
    }

    /// All users in id order (sled iterates keys lexicographically, and v7
    /// uuids sort by creation time), which keeps listings deterministic.
    pub fn all_users(&self) -> ApiResult<Vec<UserDoc>> {
        scan(&self.users)
    }

    // ---- friend requests ----

    /// Claims the unordered-pair index entry for a new request. Returns false
    /// if any request between the two users already exists, in either
    /// direction and regardless of status.
    pub fn reserve_pair(&self, a: &UserId, b: &UserId, id: &RequestId) -> ApiResult<bool> {
        insert_unique(&self.request_pairs, &pair_key(a, b), &id.to_string())
    }

    pub fn pair_exists(&self, a: &UserId, b: &UserId) -> ApiResult<bool> {
        Ok(self.request_pairs.get(pair_key(a, b).as_bytes())?.is_some())
    }

    pub fn put_request(&self, request: &RequestDoc) -> ApiResult<()> {
        put_doc(&self.requests, &request.id.to_string(), request)
    }

    pub fn request(&self, id: &RequestId) -> ApiResult<Option<RequestDoc>> {
        get_doc(&self.requests, &id.to_string())
    }

    pub fn update_request(
        &self,
        id: &RequestId,
        apply: impl FnMut(&mut RequestDoc) -> ApiResult<()>,
    ) -> ApiResult<RequestDoc> {
        modify_doc(&self.requests, &id.to_string(), apply)?
            .ok_or_else(|| ApiError::NotFound("request not found".to_owned()))
    }

    pub fn all_requests(&self) -> ApiResult<Vec<RequestDoc>> {
        scan(&self.requests)
    }

    // ---- groups ----

    /// Inserts a new group, claiming its name first (names are unique).
    pub fn create_group(&self, group: &GroupDoc) -> ApiResult<()> {
        if !insert_unique(&self.group_names, &group.name, &group.id.to_string())? {
            return Err(ApiError::Conflict("a group with this name already exists".to_owned()));
        }
        put_doc(&self.groups, &group.id.to_string(), group)
    }

    pub fn group(&self, id: &GroupId) -> ApiResult<Option<GroupDoc>> {
        get_doc(&self.groups, &id.to_string())
    }

    pub fn require_group(&self, id: &GroupId) -> ApiResult<GroupDoc> {
        self.group(id)?
            .ok_or_else(|| ApiError::NotFound("group not found".to_owned()))
    }

    pub fn update_group(
        &self,
        id: &GroupId,
        apply: impl FnMut(&mut GroupDoc) -> ApiResult<()>,
    ) -> ApiResult<GroupDoc> {
        modify_doc(&self.groups, &id.to_string(), apply)?
            .ok_or_else(|| ApiError::NotFound("group not found".to_owned()))
    }

    pub fn delete_group(&self, id: &GroupId, name: &str) -> ApiResult<()> {
        self.groups.remove(id.to_string().as_bytes())?;
        self.group_names.remove(name.as_bytes())?;
        Ok(())
    }

    pub fn reserve_group_name(&self, name: &str, id: &GroupId) -> ApiResult<bool> {
        insert_unique(&self.group_names, name, &id.to_string())
    }

    pub fn release_group_name(&self, name: &str) -> ApiResult<()> {
        self.group_names.remove(name.as_bytes())?;
        Ok(())
    }

    pub fn all_groups(&self) -> ApiResult<Vec<GroupDoc>> {
        scan(&self.groups)
    }

    // ---- sessions ----

    pub fn put_session(&self, token: &str, session: &SessionDoc) -> ApiResult<()> {
        put_doc(&self.sessions, token, session)
    }

    pub fn session(&self, token: &str) -> ApiResult<Option<SessionDoc>> {
        get_doc(&self.sessions, token)
    }

    pub fn remove_session(&self, token: &str) -> ApiResult<()> {
        self.sessions.remove(token.as_bytes())?;
        Ok(())
    }
}

/// Order-independent key for the request-pair index.
fn pair_key(a: &UserId, b: &UserId) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}/{hi}")
}

fn get_doc<T: DeserializeOwned>(tree: &Tree, key: &str) -> ApiResult<Option<T>> {
    match tree.get(key.as_bytes())? {
        Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
        None => Ok(None),
    }
}

fn put_doc<T: Serialize>(tree: &Tree, key: &str, doc: &T) -> ApiResult<()> {
    tree.insert(key.as_bytes(), serde_json::to_vec(doc)?)?;
    Ok(())
}

/// Read-modify-write with a CAS retry loop, so each document update is
/// atomic. Returns None when the key does not exist; errors from `apply`
/// abort the update.
fn modify_doc<T, F>(tree: &Tree, key: &str, mut apply: F) -> ApiResult<Option<T>>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(&mut T) -> ApiResult<()>,
{
    loop {
        let Some(current) = tree.get(key.as_bytes())? else {
            return Ok(None);
        };
        let mut doc: T = serde_json::from_slice(&current)?;
        apply(&mut doc)?;
        let updated = serde_json::to_vec(&doc)?;
        match tree.compare_and_swap(key.as_bytes(), Some(current), Some(updated))? {
            Ok(()) => return Ok(Some(doc)),
            Err(_) => continue,
        }
    }
}

/// Insert `value` under `key` only if the key is absent.
fn insert_unique(tree: &Tree, key: &str, value: &str) -> ApiResult<bool> {
    let outcome = tree.compare_and_swap(key.as_bytes(), None::<&[u8]>, Some(value.as_bytes()))?;
    Ok(outcome.is_ok())
}

fn scan<T: DeserializeOwned>(tree: &Tree) -> ApiResult<Vec<T>> {
    tree.iter()
        .map(|entry| {
            let (_, raw) = entry?;
            Ok(serde_json::from_slice(&raw)?)
        })
        .collect()
}
