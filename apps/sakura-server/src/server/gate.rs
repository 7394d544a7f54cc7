use axum::http::HeaderMap;

use sakura_core::{ApplicationRole, ApprovalStatus};

use super::{
    core::{AppState, UserRecord},
    errors::ApiFailure,
    session::{session_token, verify_session, SessionClaims},
    user_repository::UserRepository,
};

pub(crate) fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<SessionClaims, ApiFailure> {
    let token = session_token(headers).ok_or(ApiFailure::Unauthorized)?;
    verify_session(state, &token).map_err(|e| {
        tracing::debug!(event = "auth.session", outcome = "rejected", error = %e);
        ApiFailure::Unauthorized
    })
}

/// Resolves the caller's stored record. The credential carries a role
/// snapshot, but every privileged decision reads current store state.
pub(crate) async fn current_user(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<UserRecord, ApiFailure> {
    let claims = authenticate(state, headers)?;
    let repo = UserRepository::from_state(state);
    repo.find_user(claims.user_id.as_str())
        .await
        .map_err(|e| {
            tracing::error!(event = "auth.lookup", error = %e);
            ApiFailure::Internal
        })?
        .ok_or(ApiFailure::Unauthorized)
}

pub(crate) async fn require_admin(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<UserRecord, ApiFailure> {
    let user = current_user(state, headers).await?;
    if user.role != ApplicationRole::Admin || user.approval != ApprovalStatus::Approved {
        return Err(ApiFailure::Forbidden);
    }
    Ok(user)
}

pub(crate) async fn require_editor(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<UserRecord, ApiFailure> {
    let user = current_user(state, headers).await?;
    if user.approval != ApprovalStatus::Approved || user.role == ApplicationRole::Viewer {
        return Err(ApiFailure::Forbidden);
    }
    Ok(user)
}

pub(crate) async fn require_approved(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<UserRecord, ApiFailure> {
    let user = current_user(state, headers).await?;
    if user.approval != ApprovalStatus::Approved {
        return Err(ApiFailure::Forbidden);
    }
    Ok(user)
}
