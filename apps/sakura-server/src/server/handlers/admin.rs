use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use sakura_core::{ApplicationRole, ApprovalStatus};

use super::super::{
    core::{AppState, GUILD_MEMBER_PAGE_LIMIT, MAX_MODERATION_REASON_CHARS},
    db::ensure_db_schema,
    discord::{GuildDirectory, GuildLookup as _},
    errors::ApiFailure,
    gate::require_admin,
    roles::{verify_all_users, VerifySummary},
    session::now_unix,
    types::{
        GuildMemberResponse, GuildMembersResponse, MembersPageQuery, ModerationRequest,
        TimeoutRequest, UpdateUserRequest, UserResponse, UsersListResponse,
    },
    user_repository::UserRepository,
};

pub(crate) async fn list_users(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UsersListResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    require_admin(&state, &headers).await?;

    let users = UserRepository::from_state(&state)
        .list_users()
        .await
        .map_err(|e| {
            tracing::error!(event = "admin.users.list", error = %e);
            ApiFailure::Internal
        })?;
    Ok(Json(UsersListResponse {
        users: users.iter().map(UserResponse::from_record).collect(),
    }))
}

pub(crate) async fn verify_all(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<VerifySummary>, ApiFailure> {
    ensure_db_schema(&state).await?;
    require_admin(&state, &headers).await?;

    let summary = verify_all_users(&state).await.map_err(|e| {
        tracing::error!(event = "admin.verify_all", error = %e);
        ApiFailure::Internal
    })?;
    Ok(Json(summary))
}

/// Applies a partial update to a stored user. Admin is granted through the
/// guild role alone, so `role` never accepts "admin" here.
pub(crate) async fn update_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    require_admin(&state, &headers).await?;

    let repo = UserRepository::from_state(&state);
    let mut user = repo
        .find_user(&user_id)
        .await
        .map_err(|e| {
            tracing::error!(event = "admin.users.update", error = %e);
            ApiFailure::Internal
        })?
        .ok_or(ApiFailure::NotFound)?;

    if let Some(role) = payload.role {
        let role = ApplicationRole::try_from(role).map_err(|_| ApiFailure::InvalidRequest)?;
        if role == ApplicationRole::Admin {
            return Err(ApiFailure::InvalidRequest);
        }
        user.role = role;
    }
    if let Some(approval) = payload.approval {
        user.approval =
            ApprovalStatus::try_from(approval).map_err(|_| ApiFailure::InvalidRequest)?;
    }
    if let Some(can_delete_columns) = payload.can_delete_columns {
        user.permissions.can_delete_columns = can_delete_columns;
    }
    if let Some(can_delete_cards) = payload.can_delete_cards {
        user.permissions.can_delete_cards = can_delete_cards;
    }

    repo.upsert_user(&user).await.map_err(|e| {
        tracing::error!(event = "admin.users.update", error = %e);
        ApiFailure::Internal
    })?;

    tracing::info!(
        event = "admin.users.update",
        user_id = %user.id,
        role = user.role.as_str(),
        approval = user.approval.as_str(),
    );
    Ok(Json(UserResponse::from_record(&user)))
}

pub(crate) async fn delete_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> Result<StatusCode, ApiFailure> {
    ensure_db_schema(&state).await?;
    require_admin(&state, &headers).await?;

    let deleted = UserRepository::from_state(&state)
        .delete_user(&user_id)
        .await
        .map_err(|e| {
            tracing::error!(event = "admin.users.delete", error = %e);
            ApiFailure::Internal
        })?;
    if !deleted {
        return Err(ApiFailure::NotFound);
    }
    tracing::info!(event = "admin.users.delete", user_id = %user_id);
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn list_guild_members(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<MembersPageQuery>,
) -> Result<Json<GuildMembersResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    require_admin(&state, &headers).await?;

    let directory = GuildDirectory::from_state(&state);
    let members = directory
        .list_members(query.after.as_deref(), GUILD_MEMBER_PAGE_LIMIT)
        .await
        .map_err(|_| ApiFailure::LookupFailed)?;

    let next_after = if members.len() == GUILD_MEMBER_PAGE_LIMIT as usize {
        members.last().map(|member| member.user_id.clone())
    } else {
        None
    };
    Ok(Json(GuildMembersResponse {
        members: members
            .into_iter()
            .map(GuildMemberResponse::from_summary)
            .collect(),
        next_after,
    }))
}

fn validated_reason(reason: &str) -> Result<&str, ApiFailure> {
    let reason = reason.trim();
    if reason.is_empty() || reason.chars().count() > MAX_MODERATION_REASON_CHARS {
        return Err(ApiFailure::InvalidRequest);
    }
    Ok(reason)
}

pub(crate) async fn timeout_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(payload): Json<TimeoutRequest>,
) -> Result<StatusCode, ApiFailure> {
    ensure_db_schema(&state).await?;
    let admin = require_admin(&state, &headers).await?;
    let reason = validated_reason(&payload.reason)?;
    if payload.duration_minutes <= 0 {
        return Err(ApiFailure::InvalidRequest);
    }
    let until_unix = now_unix().saturating_add(payload.duration_minutes.saturating_mul(60));

    GuildDirectory::from_state(&state)
        .timeout_member(&user_id, until_unix, reason)
        .await
        .map_err(|_| ApiFailure::LookupFailed)?;

    tracing::info!(
        event = "admin.moderation.timeout",
        actor_id = %admin.id,
        user_id = %user_id,
        until_unix,
    );
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn kick_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(payload): Json<ModerationRequest>,
) -> Result<StatusCode, ApiFailure> {
    ensure_db_schema(&state).await?;
    let admin = require_admin(&state, &headers).await?;
    let reason = validated_reason(&payload.reason)?;

    GuildDirectory::from_state(&state)
        .kick_member(&user_id, reason)
        .await
        .map_err(|_| ApiFailure::LookupFailed)?;

    tracing::info!(
        event = "admin.moderation.kick",
        actor_id = %admin.id,
        user_id = %user_id,
    );
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn ban_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Json(payload): Json<ModerationRequest>,
) -> Result<StatusCode, ApiFailure> {
    ensure_db_schema(&state).await?;
    let admin = require_admin(&state, &headers).await?;
    let reason = validated_reason(&payload.reason)?;

    GuildDirectory::from_state(&state)
        .ban_member(&user_id, reason)
        .await
        .map_err(|_| ApiFailure::LookupFailed)?;

    tracing::info!(
        event = "admin.moderation.ban",
        actor_id = %admin.id,
        user_id = %user_id,
    );
    Ok(StatusCode::NO_CONTENT)
}
