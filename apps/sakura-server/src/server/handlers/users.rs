use axum::{extract::State, http::HeaderMap, Json};

use super::super::{
    core::AppState,
    db::ensure_db_schema,
    errors::ApiFailure,
    gate::current_user,
    metrics::record_directory_lookup,
    roles::{refresh_membership, RefreshError},
    types::UserResponse,
};

/// Returns the caller's record after a live membership re-resolution. When
/// the guild directory is unreachable the stored record is served instead.
pub(crate) async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    let user = current_user(&state, &headers).await?;

    match refresh_membership(&state, &user).await {
        Ok(outcome) => Ok(Json(UserResponse::from_record(&outcome.record))),
        Err(RefreshError::Lookup(_)) => {
            record_directory_lookup("transport_error");
            tracing::warn!(event = "users.me", outcome = "stale", user_id = %user.id);
            Ok(Json(UserResponse::from_record(&user)))
        }
        Err(RefreshError::Store) => Err(ApiFailure::Internal),
    }
}
