use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use super::{
    core::{
        BoardSettingsRecord, CardRecord, ColumnRecord, CommentRecord, TagRecord, UserRecord,
        METRICS_TEXT_CONTENT_TYPE,
    },
    discord::GuildMemberSummary,
    metrics::render_metrics,
};

#[derive(Serialize)]
pub(crate) struct ApiError {
    pub(crate) error: &'static str,
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
}

pub(crate) async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub(crate) async fn metrics() -> impl IntoResponse {
    ([(CONTENT_TYPE, METRICS_TEXT_CONTENT_TYPE)], render_metrics())
}

#[derive(Serialize)]
pub(crate) struct PermissionsResponse {
    pub(crate) can_delete_columns: bool,
    pub(crate) can_delete_cards: bool,
}

#[derive(Serialize)]
pub(crate) struct UserResponse {
    pub(crate) id: String,
    pub(crate) display_name: String,
    pub(crate) avatar_ref: Option<String>,
    pub(crate) role: &'static str,
    pub(crate) approval: &'static str,
    pub(crate) role_ids: Vec<String>,
    pub(crate) permissions: PermissionsResponse,
}

impl UserResponse {
    pub(crate) fn from_record(record: &UserRecord) -> Self {
        Self {
            id: record.id.as_str().to_owned(),
            display_name: record.display_name.clone(),
            avatar_ref: record.avatar_ref.clone(),
            role: record.role.as_str(),
            approval: record.approval.as_str(),
            role_ids: record.cached_role_ids.clone(),
            permissions: PermissionsResponse {
                can_delete_columns: record.permissions.can_delete_columns,
                can_delete_cards: record.permissions.can_delete_cards,
            },
        }
    }
}

#[derive(Serialize)]
pub(crate) struct UsersListResponse {
    pub(crate) users: Vec<UserResponse>,
}

#[derive(Serialize)]
pub(crate) struct GuildMemberResponse {
    pub(crate) id: String,
    pub(crate) display_name: String,
    pub(crate) role_ids: Vec<String>,
}

#[derive(Serialize)]
pub(crate) struct GuildMembersResponse {
    pub(crate) members: Vec<GuildMemberResponse>,
    /// Cursor for the next page, absent once the page came back short.
    pub(crate) next_after: Option<String>,
}

impl GuildMemberResponse {
    pub(crate) fn from_summary(summary: GuildMemberSummary) -> Self {
        Self {
            id: summary.user_id,
            display_name: summary.display_name,
            role_ids: summary.role_ids,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct TagResponse {
    pub(crate) id: String,
    pub(crate) label: String,
    pub(crate) color: String,
}

impl TagResponse {
    pub(crate) fn from_record(record: &TagRecord) -> Self {
        Self {
            id: record.tag_id.clone(),
            label: record.label.clone(),
            color: record.color.clone(),
        }
    }
}

#[derive(Serialize)]
pub(crate) struct ColumnResponse {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) position: i32,
}

impl ColumnResponse {
    pub(crate) fn from_record(record: &ColumnRecord) -> Self {
        Self {
            id: record.column_id.clone(),
            title: record.title.clone(),
            position: record.position,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct CommentResponse {
    pub(crate) id: String,
    pub(crate) author_id: String,
    pub(crate) body: String,
    pub(crate) created_at_unix: i64,
}

impl CommentResponse {
    pub(crate) fn from_record(record: &CommentRecord) -> Self {
        Self {
            id: record.comment_id.clone(),
            author_id: record.author_id.clone(),
            body: record.body.clone(),
            created_at_unix: record.created_at_unix,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct CardResponse {
    pub(crate) id: String,
    pub(crate) column_id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) due_date: Option<String>,
    pub(crate) sort_order: i32,
    pub(crate) tag_ids: Vec<String>,
    pub(crate) assigned_user_ids: Vec<String>,
    pub(crate) allowed_viewer_ids: Vec<String>,
    pub(crate) allowed_editor_ids: Vec<String>,
    pub(crate) comments: Vec<CommentResponse>,
    /// Whether the requesting user may modify this card.
    pub(crate) editable: bool,
}

impl CardResponse {
    pub(crate) fn from_record(record: &CardRecord, editable: bool) -> Self {
        Self {
            id: record.card_id.clone(),
            column_id: record.column_id.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            due_date: record.due_date.clone(),
            sort_order: record.sort_order,
            tag_ids: record.tag_ids.clone(),
            assigned_user_ids: record.assigned_user_ids.clone(),
            allowed_viewer_ids: record.allowed_viewer_ids.clone(),
            allowed_editor_ids: record.allowed_editor_ids.clone(),
            comments: record.comments.iter().map(CommentResponse::from_record).collect(),
            editable,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct BoardResponse {
    pub(crate) columns: Vec<ColumnResponse>,
    pub(crate) cards: Vec<CardResponse>,
    pub(crate) tags: Vec<TagResponse>,
}

#[derive(Serialize)]
pub(crate) struct SettingsResponse {
    pub(crate) board_title: String,
    pub(crate) accent_color: String,
}

impl SettingsResponse {
    pub(crate) fn from_record(record: &BoardSettingsRecord) -> Self {
        Self {
            board_title: record.board_title.clone(),
            accent_color: record.accent_color.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginQuery {
    #[serde(default)]
    pub(crate) stay: Option<bool>,
    #[serde(default)]
    pub(crate) tuner: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CallbackQuery {
    pub(crate) code: String,
    #[serde(default)]
    pub(crate) state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MembersPageQuery {
    #[serde(default)]
    pub(crate) after: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct UpdateUserRequest {
    pub(crate) role: Option<String>,
    pub(crate) approval: Option<String>,
    pub(crate) can_delete_columns: Option<bool>,
    pub(crate) can_delete_cards: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct TimeoutRequest {
    pub(crate) duration_minutes: i64,
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ModerationRequest {
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreateTagRequest {
    pub(crate) label: String,
    pub(crate) color: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct UpdateTagRequest {
    pub(crate) label: Option<String>,
    pub(crate) color: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreateColumnRequest {
    pub(crate) title: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct UpdateColumnRequest {
    pub(crate) title: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ReorderColumnsRequest {
    pub(crate) column_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CreateCardRequest {
    pub(crate) column_id: String,
    pub(crate) title: String,
    #[serde(default)]
    pub(crate) description: Option<String>,
    #[serde(default)]
    pub(crate) due_date: Option<String>,
    #[serde(default)]
    pub(crate) tag_ids: Vec<String>,
    #[serde(default)]
    pub(crate) assigned_user_ids: Vec<String>,
    #[serde(default)]
    pub(crate) allowed_viewer_ids: Vec<String>,
    #[serde(default)]
    pub(crate) allowed_editor_ids: Vec<String>,
}

/// Partial update. An empty `due_date` string clears the stored date.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct UpdateCardRequest {
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) due_date: Option<String>,
    pub(crate) tag_ids: Option<Vec<String>>,
    pub(crate) assigned_user_ids: Option<Vec<String>>,
    pub(crate) allowed_viewer_ids: Option<Vec<String>>,
    pub(crate) allowed_editor_ids: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct MoveCardRequest {
    pub(crate) column_id: String,
    #[serde(default)]
    pub(crate) position: Option<i32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CommentRequest {
    pub(crate) body: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct UpdateSettingsRequest {
    pub(crate) board_title: Option<String>,
    pub(crate) accent_color: Option<String>,
}
