//! Friend Request Ledger and the recommendation query.
//!
//! The ledger is the sole authority for request state; each user document's
//! `friends` set is a denormalized projection updated on accept. There is no
//! reject or withdraw: once a pair has a request, re-sends in either
//! direction conflict for good.

use axum::extract::Path;
use axum::{Extension, Json};
use lingolink_common::{
    FriendRequestView, FriendRequestsResponse, FriendsResponse, IncomingRequest,
    OutgoingRequestsResponse, RecommendedUsersResponse, RequestId, RequestStatus, SentRequest,
    UserCard, UserId, UserProfile,
};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::store::{unix_now, RequestDoc, Store};
use crate::AppState;

fn view(request: &RequestDoc) -> FriendRequestView {
    FriendRequestView {
        id: request.id,
        sender: request.sender,
        recipient: request.recipient,
        status: request.status,
    }
}

/// Creates a pending request from `caller` to `recipient_id`.
///
/// The pair index is claimed before the record is written; a lost claim means
/// a request between the two already exists (either direction, any status),
/// including one inserted by a concurrent call.
pub fn send_request(store: &Store, caller: UserId, recipient_id: UserId) -> ApiResult<RequestDoc> {
    if caller == recipient_id {
        return Err(ApiError::Validation(
            "you cannot send a friend request to yourself".to_owned(),
        ));
    }
    let recipient = store
        .user(&recipient_id)?
        .ok_or_else(|| ApiError::NotFound("recipient not found".to_owned()))?;
    if recipient.friends.contains(&caller) {
        return Err(ApiError::Conflict(
            "recipient is already in your friends list".to_owned(),
        ));
    }
    if store.pair_exists(&caller, &recipient_id)? {
        return Err(ApiError::Conflict("friend request already sent".to_owned()));
    }

    let request = RequestDoc {
        id: RequestId::new(),
        sender: caller,
        recipient: recipient_id,
        status: RequestStatus::Pending,
        created_at: unix_now(),
    };
    if !store.reserve_pair(&caller, &recipient_id, &request.id)? {
        return Err(ApiError::Conflict("friend request already sent".to_owned()));
    }
    store.put_request(&request)?;
    Ok(request)
}

/// Accepts a pending request. Only the addressed recipient may accept, and
/// only once. Write order is fixed: ledger status first, then the two
/// friend-set additions; every step is idempotent so a retried partial
/// failure converges.
pub fn accept_request(store: &Store, caller: UserId, request_id: RequestId) -> ApiResult<RequestDoc> {
    let request = store
        .request(&request_id)?
        .ok_or_else(|| ApiError::NotFound("request not found".to_owned()))?;
    if request.recipient != caller {
        return Err(ApiError::Forbidden(
            "you are not the recipient of this request".to_owned(),
        ));
    }

    let request = store.update_request(&request_id, |request| {
        if request.status == RequestStatus::Accepted {
            return Err(ApiError::Conflict(
                "friend request already accepted".to_owned(),
            ));
        }
        request.status = RequestStatus::Accepted;
        Ok(())
    })?;

    store.update_user(&request.sender, |user| {
        user.friends.insert(request.recipient);
        Ok(())
    })?;
    store.update_user(&request.recipient, |user| {
        user.friends.insert(request.sender);
        Ok(())
    })?;
    Ok(request)
}

pub fn incoming_requests(store: &Store, caller: UserId) -> ApiResult<Vec<IncomingRequest>> {
    let mut out = Vec::new();
    for request in store.all_requests()? {
        if request.recipient == caller && request.status == RequestStatus::Pending {
            let sender = store.require_user(&request.sender)?;
            out.push(IncomingRequest {
                id: request.id,
                sender: sender.card(),
            });
        }
    }
    Ok(out)
}

pub fn outgoing_requests(store: &Store, caller: UserId) -> ApiResult<Vec<SentRequest>> {
    sent_requests(store, caller, RequestStatus::Pending)
}

/// Requests the caller sent that were accepted; rendered as "recently
/// connected" history.
pub fn accepted_sent_requests(store: &Store, caller: UserId) -> ApiResult<Vec<SentRequest>> {
    sent_requests(store, caller, RequestStatus::Accepted)
}

fn sent_requests(store: &Store, caller: UserId, status: RequestStatus) -> ApiResult<Vec<SentRequest>> {
    let mut out = Vec::new();
    for request in store.all_requests()? {
        if request.sender == caller && request.status == status {
            let recipient = store.require_user(&request.recipient)?;
            out.push(SentRequest {
                id: request.id,
                recipient: recipient.card(),
                status: request.status,
            });
        }
    }
    Ok(out)
}

/// Replays the friend-set projection from the ledger: every accepted request
/// implies both set-adds. Each write is idempotent, so this is safe to run at
/// any time to repair a partially applied accept.
pub fn reconcile_friend_sets(store: &Store) -> ApiResult<usize> {
    let mut repaired = 0;
    for request in store.all_requests()? {
        if request.status != RequestStatus::Accepted {
            continue;
        }
        for (owner, friend) in [
            (request.sender, request.recipient),
            (request.recipient, request.sender),
        ] {
            if !store.require_user(&owner)?.friends.contains(&friend) {
                store.update_user(&owner, |user| {
                    user.friends.insert(friend);
                    Ok(())
                })?;
                repaired += 1;
            }
        }
    }
    Ok(repaired)
}

pub fn friends_of(store: &Store, caller: UserId) -> ApiResult<Vec<UserCard>> {
    let me = store.require_user(&caller)?;
    me.friends
        .iter()
        .map(|id| Ok(store.require_user(id)?.card()))
        .collect()
}

/// Candidate partners for `caller`: every onboarded user that is not the
/// caller, not already a friend, and not on either side of a pending request
/// with the caller. Returned in id order.
pub fn recommended_users(store: &Store, caller: UserId) -> ApiResult<Vec<UserProfile>> {
    let me = store.require_user(&caller)?;
    let mut excluded: BTreeSet<UserId> = me.friends.clone();
    excluded.insert(caller);
    for request in store.all_requests()? {
        if request.status != RequestStatus::Pending {
            continue;
        }
        if request.recipient == caller {
            excluded.insert(request.sender);
        } else if request.sender == caller {
            excluded.insert(request.recipient);
        }
    }

    let mut out = Vec::new();
    for user in store.all_users()? {
        if user.is_onboarded && !excluded.contains(&user.id) {
            out.push(user.profile());
        }
    }
    Ok(out)
}

// ---- handlers ----

pub(crate) async fn recommended(
    Extension(app): Extension<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<RecommendedUsersResponse>> {
    Ok(Json(RecommendedUsersResponse {
        recommended_users: recommended_users(&app.store, caller)?,
    }))
}

pub(crate) async fn friends(
    Extension(app): Extension<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<FriendsResponse>> {
    Ok(Json(FriendsResponse {
        friends: friends_of(&app.store, caller)?,
    }))
}

pub(crate) async fn send(
    Extension(app): Extension<AppState>,
    AuthUser(caller): AuthUser,
    Path(recipient): Path<Uuid>,
) -> ApiResult<Json<FriendRequestView>> {
    let request = send_request(&app.store, caller, UserId(recipient))?;
    Ok(Json(view(&request)))
}

pub(crate) async fn accept(
    Extension(app): Extension<AppState>,
    AuthUser(caller): AuthUser,
    Path(request_id): Path<Uuid>,
) -> ApiResult<Json<FriendRequestView>> {
    let request = accept_request(&app.store, caller, RequestId(request_id))?;
    Ok(Json(view(&request)))
}

pub(crate) async fn requests(
    Extension(app): Extension<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<FriendRequestsResponse>> {
    Ok(Json(FriendRequestsResponse {
        incoming_friend_requests: incoming_requests(&app.store, caller)?,
        accepted_friend_requests: accepted_sent_requests(&app.store, caller)?,
    }))
}

pub(crate) async fn outgoing(
    Extension(app): Extension<AppState>,
    AuthUser(caller): AuthUser,
) -> ApiResult<Json<OutgoingRequestsResponse>> {
    Ok(Json(OutgoingRequestsResponse {
        outgoing_friend_requests: outgoing_requests(&app.store, caller)?,
    }))
}
