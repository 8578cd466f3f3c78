//! Group registry and membership rules.
//!
//! Every mutation is a single-document update on the group; admin checks run
//! inside the update closure so they hold against the version being written.
//! Invariant: a group with members always has at least one admin. When the
//! last admin leaves, the earliest remaining member is promoted.

use axum::extract::Path;
use axum::http::StatusCode;
use axum::{Extension, Json};
use lingolink_common::{
    CreateGroupRequest, GroupId, GroupView, GroupsResponse, UpdateGroupRequest, UserId,
};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::store::{unix_now, GroupDoc, Store};
use crate::AppState;

const MAX_NAME_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 500;

fn validate_name(raw: &str) -> ApiResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("group name is required".to_owned()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ApiError::Validation(format!(
            "group name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name.to_owned())
}

fn validate_description(raw: &str) -> ApiResult<String> {
    let description = raw.trim();
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ApiError::Validation(format!(
            "group description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(description.to_owned())
}

fn not_admin() -> ApiError {
    ApiError::Forbidden("only group admins can do this".to_owned())
}

/// Members and admins populated with profile cards, in member order.
fn group_view(store: &Store, group: &GroupDoc) -> ApiResult<GroupView> {
    let mut members = Vec::with_capacity(group.members.len());
    let mut admins = Vec::new();
    for id in &group.members {
        let card = store.require_user(id)?.member_card();
        if group.admins.contains(id) {
            admins.push(card.clone());
        }
        members.push(card);
    }
    Ok(GroupView {
        id: group.id,
        name: group.name.clone(),
        description: group.description.clone(),
        members,
        admins,
    })
}

pub fn create_group(
    store: &Store,
    caller: UserId,
    body: &CreateGroupRequest,
) -> ApiResult<GroupDoc> {
    let name = validate_name(&body.name)?;
    let description = validate_description(body.description.as_deref().unwrap_or(""))?;
    let group = GroupDoc {
        id: GroupId::new(),
        name,
        description,
        members: vec![caller],
        admins: BTreeSet::from([caller]),
        created_at: unix_now(),
    };
    store.create_group(&group)?;
    Ok(group)
}

pub fn join_group(store: &Store, caller: UserId, group_id: GroupId) -> ApiResult<GroupDoc> {
    store.update_group(&group_id, |group| {
        if group.members.contains(&caller) {
            return Err(ApiError::Conflict("already a member".to_owned()));
        }
        // first member into an emptied group takes over as admin
        if group.members.is_empty() {
            group.admins.insert(caller);
        }
        group.members.push(caller);
        Ok(())
    })
}

pub fn leave_group(store: &Store, caller: UserId, group_id: GroupId) -> ApiResult<GroupDoc> {
    store.update_group(&group_id, |group| {
        if !group.members.contains(&caller) {
            return Err(ApiError::Conflict(
                "you are not a member of this group".to_owned(),
            ));
        }
        group.members.retain(|id| id != &caller);
        group.admins.remove(&caller);
        if group.admins.is_empty() {
            if let Some(successor) = group.members.first() {
                group.admins.insert(*successor);
            }
        }
        Ok(())
    })
}

pub fn update_group(
    store: &Store,
    caller: UserId,
    group_id: GroupId,
    body: &UpdateGroupRequest,
) -> ApiResult<GroupDoc> {
    let new_name = body.name.as_deref().map(validate_name).transpose()?;
    let new_description = body
        .description
        .as_deref()
        .map(validate_description)
        .transpose()?;

    let current = store.require_group(&group_id)?;
    if !current.admins.contains(&caller) {
        return Err(not_admin());
    }

    let rename = new_name.as_deref().filter(|name| *name != current.name);
    if let Some(name) = rename {
        if !store.reserve_group_name(name, &group_id)? {
            return Err(ApiError::Conflict(
                "a group with this name already exists".to_owned(),
            ));
        }
    }

    let result = store.update_group(&group_id, |group| {
        if !group.admins.contains(&caller) {
            return Err(not_admin());
        }
        if let Some(name) = &new_name {
            group.name = name.clone();
        }
        if let Some(description) = &new_description {
            group.description = description.clone();
        }
        Ok(())
    });
    match result {
        Ok(updated) => {
            if rename.is_some() {
                store.release_group_name(&current.name)?;
            }
            Ok(updated)
        }
        Err(err) => {
            // a failed update must not keep the new name claimed
            if let Some(name) = rename {
                store.release_group_name(name)?;
            }
            Err(err)
        }
    }
}

pub fn delete_group(store: &Store, caller: UserId, group_id: GroupId) -> ApiResult<()> {
    let group = store.require_group(&group_id)?;
    if !group.admins.contains(&caller) {
        return Err(not_admin());
    }
    store.delete_group(&group_id, &group.name)
}

pub fn remove_member(
    store: &Store,
    caller: UserId,
    group_id: GroupId,
    target: UserId,
) -> ApiResult<GroupDoc> {
    let group = store.require_group(&group_id)?;
    if !group.admins.contains(&caller) {
        return Err(not_admin());
    }
    if target == caller {
        return Err(ApiError::Forbidden(
            "admins cannot remove themselves, leave the group instead".to_owned(),
        ));
    }
    store.update_group(&group_id, |group| {
        if !group.admins.contains(&caller) {
            return Err(not_admin());
        }
        if !group.members.contains(&target) {
            return Err(ApiError::Conflict(
                "user is not a member of this group".to_owned(),
            ));
        }
        group.members.retain(|id| id != &target);
        group.admins.remove(&target);
        Ok(())
    })
}

pub fn list_groups(store: &Store) -> ApiResult<Vec<GroupView>> {
    store
        .all_groups()?
        .iter()
        .map(|group| group_view(store, group))
        .collect()
}

// ---- handlers ----

pub(crate) async fn create(
    Extension(app): Extension<AppState>,
    AuthUser(caller): AuthUser,
    Json(body): Json<CreateGroupRequest>,
) -> ApiResult<(StatusCode, Json<GroupView>)> {
    let group = create_group(&app.store, caller, &body)?;
    Ok((StatusCode::CREATED, Json(group_view(&app.store, &group)?)))
}

pub(crate) async fn list(
    Extension(app): Extension<AppState>,
    AuthUser(_caller): AuthUser,
) -> ApiResult<Json<GroupsResponse>> {
    Ok(Json(GroupsResponse {
        groups: list_groups(&app.store)?,
    }))
}

pub(crate) async fn get_one(
    Extension(app): Extension<AppState>,
    AuthUser(_caller): AuthUser,
    Path(group_id): Path<Uuid>,
) -> ApiResult<Json<GroupView>> {
    let group = app.store.require_group(&GroupId(group_id))?;
    Ok(Json(group_view(&app.store, &group)?))
}

pub(crate) async fn join(
    Extension(app): Extension<AppState>,
    AuthUser(caller): AuthUser,
    Path(group_id): Path<Uuid>,
) -> ApiResult<Json<GroupView>> {
    let group = join_group(&app.store, caller, GroupId(group_id))?;
    Ok(Json(group_view(&app.store, &group)?))
}

pub(crate) async fn leave(
    Extension(app): Extension<AppState>,
    AuthUser(caller): AuthUser,
    Path(group_id): Path<Uuid>,
) -> ApiResult<Json<GroupView>> {
    let group = leave_group(&app.store, caller, GroupId(group_id))?;
    Ok(Json(group_view(&app.store, &group)?))
}

pub(crate) async fn update(
    Extension(app): Extension<AppState>,
    AuthUser(caller): AuthUser,
    Path(group_id): Path<Uuid>,
    Json(body): Json<UpdateGroupRequest>,
) -> ApiResult<Json<GroupView>> {
    let group = update_group(&app.store, caller, GroupId(group_id), &body)?;
    Ok(Json(group_view(&app.store, &group)?))
}

pub(crate) async fn remove(
    Extension(app): Extension<AppState>,
    AuthUser(caller): AuthUser,
    Path(group_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    delete_group(&app.store, caller, GroupId(group_id))?;
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn remove_one_member(
    Extension(app): Extension<AppState>,
    AuthUser(caller): AuthUser,
    Path((group_id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<GroupView>> {
    let group = remove_member(&app.store, caller, GroupId(group_id), UserId(user_id))?;
    Ok(Json(group_view(&app.store, &group)?))
}
