use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::anyhow;
use axum::http::{
    header::{AUTHORIZATION, COOKIE},
    HeaderMap,
};
use pasetors::{
    claims::{Claims, ClaimsValidationRules},
    local,
    token::UntrustedToken,
    version4::V4,
    Local,
};

use sakura_core::{ApplicationRole, ApprovalStatus, UserId};

use super::core::{
    AppState, UserRecord, SESSION_COOKIE_NAME, SESSION_TTL_SHORT_SECS, SESSION_TTL_STAY_SECS,
};

/// Snapshot of identity and role state at issuance time. Advisory only for
/// privileged decisions; those re-read the store.
#[derive(Debug, Clone)]
pub(crate) struct SessionClaims {
    pub(crate) user_id: UserId,
    pub(crate) display_name: String,
    pub(crate) avatar_ref: Option<String>,
    pub(crate) role: ApplicationRole,
    pub(crate) approval: ApprovalStatus,
    pub(crate) cached_role_ids: Vec<String>,
}

pub(crate) fn issue_session(
    state: &AppState,
    user: &UserRecord,
    stay_logged_in: bool,
) -> anyhow::Result<String> {
    let ttl_secs = if stay_logged_in {
        SESSION_TTL_STAY_SECS
    } else {
        SESSION_TTL_SHORT_SECS
    };
    #[allow(clippy::cast_sign_loss)]
    let mut claims = Claims::new_expires_in(&Duration::from_secs(ttl_secs as u64))
        .map_err(|e| anyhow!("claims init failed: {e}"))?;
    claims
        .subject(user.id.as_str())
        .map_err(|e| anyhow!("claim sub failed: {e}"))?;
    claims
        .add_additional("display_name", user.display_name.as_str())
        .map_err(|e| anyhow!("claim display_name failed: {e}"))?;
    claims
        .add_additional(
            "avatar_ref",
            user.avatar_ref
                .as_deref()
                .map_or(serde_json::Value::Null, |avatar| {
                    serde_json::Value::String(avatar.to_owned())
                }),
        )
        .map_err(|e| anyhow!("claim avatar_ref failed: {e}"))?;
    claims
        .add_additional("role", user.role.as_str())
        .map_err(|e| anyhow!("claim role failed: {e}"))?;
    claims
        .add_additional("approval", user.approval.as_str())
        .map_err(|e| anyhow!("claim approval failed: {e}"))?;
    claims
        .add_additional(
            "role_ids",
            serde_json::Value::Array(
                user.cached_role_ids
                    .iter()
                    .map(|id| serde_json::Value::String(id.clone()))
                    .collect(),
            ),
        )
        .map_err(|e| anyhow!("claim role_ids failed: {e}"))?;

    local::encrypt(&state.token_key, &claims, None, None)
        .map_err(|e| anyhow!("session token mint failed: {e}"))
}

pub(crate) fn verify_session(state: &AppState, token: &str) -> anyhow::Result<SessionClaims> {
    let untrusted = UntrustedToken::<Local, V4>::try_from(token).map_err(|e| anyhow!("{e}"))?;
    let validation_rules = ClaimsValidationRules::new();
    let trusted = local::decrypt(&state.token_key, &untrusted, &validation_rules, None, None)
        .map_err(|e| anyhow!("session token decrypt failed: {e}"))?;
    let claims = trusted
        .payload_claims()
        .ok_or_else(|| anyhow!("session claims missing"))?;

    let user_id = claims
        .get_claim("sub")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| anyhow!("session subject missing"))?;
    let user_id =
        UserId::try_from(user_id.to_owned()).map_err(|e| anyhow!("session subject invalid: {e}"))?;
    let display_name = claims
        .get_claim("display_name")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| anyhow!("session display_name missing"))?
        .to_owned();
    let avatar_ref = claims
        .get_claim("avatar_ref")
        .and_then(serde_json::Value::as_str)
        .map(str::to_owned);
    let role = claims
        .get_claim("role")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| anyhow!("session role missing"))?;
    let role =
        ApplicationRole::try_from(role.to_owned()).map_err(|e| anyhow!("session role invalid: {e}"))?;
    let approval = claims
        .get_claim("approval")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| anyhow!("session approval missing"))?;
    let approval = ApprovalStatus::try_from(approval.to_owned())
        .map_err(|e| anyhow!("session approval invalid: {e}"))?;
    let cached_role_ids = claims
        .get_claim("role_ids")
        .and_then(serde_json::Value::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(serde_json::Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    Ok(SessionClaims {
        user_id,
        display_name,
        avatar_ref,
        role,
        approval,
        cached_role_ids,
    })
}

/// Pulls the session token from the bearer header or the session cookie.
pub(crate) fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = bearer_token(headers) {
        return Some(token.to_owned());
    }
    let cookies = headers.get(COOKIE)?.to_str().ok()?;
    cookies.split(';').map(str::trim).find_map(|cookie| {
        cookie
            .strip_prefix(SESSION_COOKIE_NAME)
            .and_then(|rest| rest.strip_prefix('='))
            .map(str::to_owned)
    })
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(AUTHORIZATION)?;
    let header = header.to_str().ok()?;
    header.strip_prefix("Bearer ")
}

/// Session-scoped cookie when the caller declined to stay logged in; the
/// credential's own expiry still bounds a persisted copy.
pub(crate) fn session_cookie(token: &str, stay_logged_in: bool) -> String {
    let mut cookie = format!("{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=None; Secure");
    if stay_logged_in {
        cookie.push_str("; Max-Age=");
        cookie.push_str(&SESSION_TTL_STAY_SECS.to_string());
    }
    cookie
}

pub(crate) fn clear_session_cookie() -> String {
    format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=None; Secure; Max-Age=0")
}

pub(crate) fn now_unix() -> i64 {
    let now = SystemTime::now();
    let seconds = now
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs();
    i64::try_from(seconds).unwrap_or(i64::MAX)
}
