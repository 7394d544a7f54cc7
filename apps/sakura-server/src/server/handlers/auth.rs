use axum::{
    extract::{Query, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{AppendHeaders, IntoResponse, Redirect},
};

use sakura_core::{reconcile_membership, DisplayName, MemberLookup, UserId};

use super::super::{
    core::{AppState, UserRecord},
    db::ensure_db_schema,
    discord::{DirectoryError, GuildDirectory, GuildLookup as _},
    errors::ApiFailure,
    metrics::record_directory_lookup,
    session::{clear_session_cookie, issue_session, session_cookie},
    types::{CallbackQuery, LoginQuery},
    user_repository::UserRepository,
};

const OAUTH_STATE_STAY: &str = "stayIn";
const OAUTH_STATE_NO_STAY: &str = "noStay";
const OAUTH_STATE_TUNER_SUFFIX: &str = "_tuner";

/// Redirects the browser into the Discord authorization flow. The stay and
/// tuner choices ride along in the OAuth state parameter.
pub(crate) async fn discord_login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
) -> Result<Redirect, ApiFailure> {
    let runtime = &state.runtime;
    let mut oauth_state = if query.stay.unwrap_or(false) {
        String::from(OAUTH_STATE_STAY)
    } else {
        String::from(OAUTH_STATE_NO_STAY)
    };
    if query.tuner.unwrap_or(false) {
        oauth_state.push_str(OAUTH_STATE_TUNER_SUFFIX);
    }

    let redirect_uri = format!("{}/api/auth/discord/callback", runtime.public_base_url);
    let authorize = reqwest::Url::parse_with_params(
        &format!("{}/oauth2/authorize", runtime.discord_api_base),
        &[
            ("client_id", runtime.discord_client_id.as_str()),
            ("redirect_uri", redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", "identify"),
            ("state", oauth_state.as_str()),
        ],
    )
    .map_err(|e| {
        tracing::error!(event = "auth.login", error = %e);
        ApiFailure::Internal
    })?;

    Ok(Redirect::temporary(authorize.as_str()))
}

/// Completes the OAuth exchange, reconciles guild membership, and hands the
/// session out twice: as a cookie and as a query parameter on the redirect.
pub(crate) async fn discord_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse, ApiFailure> {
    ensure_db_schema(&state).await?;

    let oauth_state = query.state.as_deref().unwrap_or(OAUTH_STATE_NO_STAY);
    let stay_logged_in = oauth_state.starts_with(OAUTH_STATE_STAY);
    let tuner = oauth_state.ends_with(OAUTH_STATE_TUNER_SUFFIX);

    let directory = GuildDirectory::from_state(&state);
    let identity = directory.exchange_code(&query.code).await.map_err(|e| {
        tracing::warn!(event = "auth.login", outcome = "exchange_failed", error = ?e);
        match e {
            DirectoryError::RejectedCode => ApiFailure::Unauthorized,
            DirectoryError::Transport => ApiFailure::LookupFailed,
        }
    })?;

    let user_id = UserId::try_from(identity.id.clone()).map_err(|e| {
        tracing::warn!(event = "auth.login", outcome = "bad_identity", error = %e);
        ApiFailure::LookupFailed
    })?;
    let display_name = DisplayName::try_from(identity.display_name()).map_err(|e| {
        tracing::warn!(event = "auth.login", outcome = "bad_identity", error = %e);
        ApiFailure::LookupFailed
    })?;

    let lookup = directory
        .fetch_member(user_id.as_str())
        .await
        .map_err(|_| ApiFailure::LookupFailed)?;
    match &lookup {
        MemberLookup::Found { .. } => record_directory_lookup("found"),
        MemberLookup::NotInGuild => record_directory_lookup("not_in_guild"),
    }

    let repo = UserRepository::from_state(&state);
    let prior = repo.find_user(user_id.as_str()).await.map_err(|e| {
        tracing::error!(event = "auth.login", error = %e);
        ApiFailure::Internal
    })?;

    let decision = reconcile_membership(
        prior.as_ref().map(|user| (user.role, user.approval)),
        &lookup,
        &state.runtime.admin_role_ids,
    );

    let record = UserRecord {
        id: user_id,
        display_name: display_name.as_str().to_owned(),
        avatar_ref: identity.avatar_ref(),
        role: decision.role,
        approval: decision.approval,
        cached_role_ids: decision.cached_role_ids,
        permissions: prior.map(|user| user.permissions).unwrap_or_default(),
    };
    repo.upsert_user(&record).await.map_err(|e| {
        tracing::error!(event = "auth.login", error = %e);
        ApiFailure::Internal
    })?;

    let token = issue_session(&state, &record, stay_logged_in).map_err(|e| {
        tracing::error!(event = "auth.login", error = %e);
        ApiFailure::Internal
    })?;

    let destination = if tuner {
        state
            .runtime
            .tuner_url
            .as_deref()
            .unwrap_or(state.runtime.frontend_url.as_str())
    } else {
        state.runtime.frontend_url.as_str()
    };
    let redirect = reqwest::Url::parse_with_params(destination, &[("token", token.as_str())])
        .map_err(|e| {
            tracing::error!(event = "auth.login", error = %e);
            ApiFailure::Internal
        })?;

    tracing::info!(
        event = "auth.login",
        outcome = "success",
        user_id = %record.id,
        role = record.role.as_str(),
        approval = record.approval.as_str(),
    );

    Ok((
        AppendHeaders([(SET_COOKIE, session_cookie(&token, stay_logged_in))]),
        Redirect::temporary(redirect.as_str()),
    ))
}

pub(crate) async fn logout() -> impl IntoResponse {
    (
        AppendHeaders([(SET_COOKIE, clear_session_cookie())]),
        StatusCode::NO_CONTENT,
    )
}
