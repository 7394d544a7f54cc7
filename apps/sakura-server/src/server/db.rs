use sqlx::Row as _;

use sakura_core::{ApplicationRole, ApprovalStatus};

use super::{core::AppState, core::CommentRecord, errors::ApiFailure};

const SCHEMA_LOCK_NAME: &str = "sakura_schema_init";
const SCHEMA_LOCK_TIMEOUT_SECS: i32 = 30;

const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id VARCHAR(32) PRIMARY KEY,
        display_name VARCHAR(100) NOT NULL,
        avatar_ref TEXT NULL,
        role TINYINT NOT NULL DEFAULT 0,
        approval TINYINT NOT NULL DEFAULT 0,
        role_ids_json TEXT NOT NULL,
        can_delete_columns BOOLEAN NOT NULL DEFAULT TRUE,
        can_delete_cards BOOLEAN NOT NULL DEFAULT TRUE
    )",
    "CREATE TABLE IF NOT EXISTS tags (
        tag_id VARCHAR(32) PRIMARY KEY,
        label VARCHAR(64) NOT NULL,
        color VARCHAR(7) NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS board_columns (
        column_id VARCHAR(32) PRIMARY KEY,
        title VARCHAR(128) NOT NULL,
        position INT NOT NULL DEFAULT 0
    )",
    "CREATE TABLE IF NOT EXISTS cards (
        card_id VARCHAR(32) PRIMARY KEY,
        column_id VARCHAR(32) NOT NULL,
        title VARCHAR(256) NOT NULL,
        description TEXT NOT NULL,
        due_date VARCHAR(32) NULL,
        sort_order INT NOT NULL DEFAULT 0,
        tag_ids_json TEXT NOT NULL,
        assigned_user_ids_json TEXT NOT NULL,
        allowed_viewer_ids_json TEXT NOT NULL,
        allowed_editor_ids_json TEXT NOT NULL,
        comments_json TEXT NOT NULL,
        INDEX idx_cards_column (column_id)
    )",
    "CREATE TABLE IF NOT EXISTS board_settings (
        settings_id TINYINT PRIMARY KEY,
        board_title VARCHAR(128) NOT NULL,
        accent_color VARCHAR(7) NOT NULL
    )",
];

/// Runs schema creation once per process. Concurrent replicas serialize on a
/// named server-side lock held by a dedicated connection.
pub(crate) async fn ensure_db_schema(state: &AppState) -> Result<(), ApiFailure> {
    let Some(pool) = &state.db_pool else {
        return Ok(());
    };

    state
        .db_init
        .get_or_try_init(|| async move {
            let mut conn = pool.acquire().await?;

            let acquired: i64 = sqlx::query("SELECT GET_LOCK(?, ?)")
                .bind(SCHEMA_LOCK_NAME)
                .bind(SCHEMA_LOCK_TIMEOUT_SECS)
                .fetch_one(conn.as_mut())
                .await?
                .try_get(0)?;
            if acquired != 1 {
                return Err(sqlx::Error::Protocol(String::from(
                    "schema init lock not acquired",
                )));
            }

            let mut statement_error = None;
            for statement in SCHEMA_STATEMENTS {
                if let Err(e) = sqlx::query(statement).execute(conn.as_mut()).await {
                    statement_error = Some(e);
                    break;
                }
            }

            let release = sqlx::query("SELECT RELEASE_LOCK(?)")
                .bind(SCHEMA_LOCK_NAME)
                .execute(conn.as_mut())
                .await;

            if let Some(e) = statement_error {
                return Err(e);
            }
            release?;
            Ok::<(), sqlx::Error>(())
        })
        .await
        .map_err(|e| {
            tracing::error!(event = "db.init", error = %e);
            ApiFailure::Internal
        })?;

    Ok(())
}

pub(crate) fn role_to_i16(role: ApplicationRole) -> i16 {
    match role {
        ApplicationRole::Viewer => 0,
        ApplicationRole::Editor => 1,
        ApplicationRole::Admin => 2,
    }
}

pub(crate) fn role_from_i16(value: i16) -> ApplicationRole {
    match value {
        2 => ApplicationRole::Admin,
        1 => ApplicationRole::Editor,
        _ => ApplicationRole::Viewer,
    }
}

pub(crate) fn approval_to_i16(approval: ApprovalStatus) -> i16 {
    match approval {
        ApprovalStatus::Pending => 0,
        ApprovalStatus::Approved => 1,
    }
}

pub(crate) fn approval_from_i16(value: i16) -> ApprovalStatus {
    if value == 1 {
        ApprovalStatus::Approved
    } else {
        ApprovalStatus::Pending
    }
}

pub(crate) fn id_list_to_json(ids: &[String]) -> String {
    serde_json::to_string(ids).unwrap_or_else(|_| String::from("[]"))
}

pub(crate) fn id_list_from_json(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

pub(crate) fn comments_to_json(comments: &[CommentRecord]) -> String {
    serde_json::to_string(comments).unwrap_or_else(|_| String::from("[]"))
}

pub(crate) fn comments_from_json(raw: &str) -> Vec<CommentRecord> {
    serde_json::from_str(raw).unwrap_or_default()
}
