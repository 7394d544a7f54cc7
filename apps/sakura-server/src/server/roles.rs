use serde::Serialize;

use sakura_core::{reconcile_membership, MemberLookup};

use super::{
    core::{AppState, UserRecord},
    discord::{DirectoryError, GuildDirectory, GuildLookup as _},
    metrics::record_directory_lookup,
    user_repository::UserRepository,
};

#[derive(Debug)]
pub(crate) enum RefreshError {
    Lookup(DirectoryError),
    Store,
}

pub(crate) struct RefreshOutcome {
    pub(crate) record: UserRecord,
    pub(crate) changed: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub(crate) struct VerifySummary {
    pub(crate) updated: u32,
    pub(crate) unchanged: u32,
    pub(crate) errored: u32,
}

/// Re-resolves one user's guild membership and persists the outcome. A
/// transport failure leaves the stored record untouched.
pub(crate) async fn refresh_membership(
    state: &AppState,
    user: &UserRecord,
) -> Result<RefreshOutcome, RefreshError> {
    let directory = GuildDirectory::from_state(state);
    let lookup = directory
        .fetch_member(user.id.as_str())
        .await
        .map_err(RefreshError::Lookup)?;
    match &lookup {
        MemberLookup::Found { .. } => record_directory_lookup("found"),
        MemberLookup::NotInGuild => record_directory_lookup("not_in_guild"),
    }

    let decision = reconcile_membership(
        Some((user.role, user.approval)),
        &lookup,
        &state.runtime.admin_role_ids,
    );

    let changed = decision.role != user.role
        || decision.approval != user.approval
        || decision.cached_role_ids != user.cached_role_ids;

    let mut record = user.clone();
    record.role = decision.role;
    record.approval = decision.approval;
    record.cached_role_ids = decision.cached_role_ids;

    // The role cache is written even when nothing changed, so a completed
    // lookup always leaves a fresh snapshot behind.
    UserRepository::from_state(state)
        .upsert_user(&record)
        .await
        .map_err(|e| {
            tracing::error!(event = "roles.refresh", error = %e);
            RefreshError::Store
        })?;

    if changed {
        tracing::info!(
            event = "roles.refresh",
            user_id = %record.id,
            role = record.role.as_str(),
            approval = record.approval.as_str(),
        );
    }

    Ok(RefreshOutcome { record, changed })
}

/// Walks every known user sequentially, refreshing each against the guild.
/// A failing lookup is counted and skipped rather than aborting the batch.
pub(crate) async fn verify_all_users(state: &AppState) -> Result<VerifySummary, sqlx::Error> {
    let users = UserRepository::from_state(state).list_users().await?;
    let mut summary = VerifySummary {
        updated: 0,
        unchanged: 0,
        errored: 0,
    };
    for user in &users {
        match refresh_membership(state, user).await {
            Ok(outcome) if outcome.changed => summary.updated += 1,
            Ok(_) => summary.unchanged += 1,
            Err(e) => {
                tracing::warn!(event = "roles.verify_all", user_id = %user.id, error = ?e);
                summary.errored += 1;
            }
        }
    }
    tracing::info!(
        event = "roles.verify_all",
        updated = summary.updated,
        unchanged = summary.unchanged,
        errored = summary.errored,
    );
    Ok(summary)
}
