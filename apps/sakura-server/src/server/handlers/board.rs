use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use ulid::Ulid;

use sakura_core::{
    can_delete_card, can_delete_column, can_edit_card, can_view_card, CardTitle, ColumnTitle,
    HexColor, TagLabel, UserId,
};

use super::super::{
    board_repository::BoardRepository,
    core::{AppState, BoardSettingsRecord, CardRecord, ColumnRecord, CommentRecord, TagRecord},
    db::ensure_db_schema,
    errors::ApiFailure,
    gate::{require_admin, require_approved, require_editor},
    session::now_unix,
    types::{
        BoardResponse, CardResponse, ColumnResponse, CommentRequest, CommentResponse,
        CreateCardRequest, CreateColumnRequest, CreateTagRequest, MoveCardRequest,
        ReorderColumnsRequest, SettingsResponse, TagResponse, UpdateCardRequest,
        UpdateColumnRequest, UpdateSettingsRequest, UpdateTagRequest,
    },
};

const MAX_COMMENT_CHARS: usize = 2000;
const MAX_DESCRIPTION_CHARS: usize = 10_000;

fn parse_ids(raw: &[String]) -> Vec<UserId> {
    raw.iter()
        .filter_map(|id| UserId::try_from(id.clone()).ok())
        .collect()
}

fn store_error(event: &'static str) -> impl Fn(sqlx::Error) -> ApiFailure {
    move |e| {
        tracing::error!(event, error = %e);
        ApiFailure::Internal
    }
}

/// Full board snapshot with cards the caller is not allowed to see removed.
pub(crate) async fn board_snapshot(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BoardResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    let user = require_approved(&state, &headers).await?;

    let repo = BoardRepository::from_state(&state);
    let columns = repo.list_columns().await.map_err(store_error("board.snapshot"))?;
    let cards = repo.list_cards().await.map_err(store_error("board.snapshot"))?;
    let tags = repo.list_tags().await.map_err(store_error("board.snapshot"))?;

    let visible_cards = cards
        .iter()
        .filter(|card| {
            can_view_card(
                user.role,
                user.approval,
                &user.id,
                &parse_ids(&card.allowed_viewer_ids),
            )
        })
        .map(|card| {
            let editable = can_edit_card(
                user.role,
                user.approval,
                &user.id,
                &parse_ids(&card.allowed_editor_ids),
            );
            CardResponse::from_record(card, editable)
        })
        .collect();

    Ok(Json(BoardResponse {
        columns: columns.iter().map(ColumnResponse::from_record).collect(),
        cards: visible_cards,
        tags: tags.iter().map(TagResponse::from_record).collect(),
    }))
}

pub(crate) async fn create_tag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateTagRequest>,
) -> Result<Json<TagResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    require_editor(&state, &headers).await?;

    let label = TagLabel::try_from(payload.label).map_err(|_| ApiFailure::InvalidRequest)?;
    let color = HexColor::try_from(payload.color).map_err(|_| ApiFailure::InvalidRequest)?;

    let record = TagRecord {
        tag_id: Ulid::new().to_string(),
        label: label.as_str().to_owned(),
        color: color.as_str().to_owned(),
    };
    BoardRepository::from_state(&state)
        .upsert_tag(&record)
        .await
        .map_err(store_error("board.tags.create"))?;
    Ok(Json(TagResponse::from_record(&record)))
}

pub(crate) async fn update_tag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tag_id): Path<String>,
    Json(payload): Json<UpdateTagRequest>,
) -> Result<Json<TagResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    require_editor(&state, &headers).await?;

    let repo = BoardRepository::from_state(&state);
    let tags = repo.list_tags().await.map_err(store_error("board.tags.update"))?;
    let mut record = tags
        .into_iter()
        .find(|tag| tag.tag_id == tag_id)
        .ok_or(ApiFailure::NotFound)?;

    if let Some(label) = payload.label {
        let label = TagLabel::try_from(label).map_err(|_| ApiFailure::InvalidRequest)?;
        record.label = label.as_str().to_owned();
    }
    if let Some(color) = payload.color {
        let color = HexColor::try_from(color).map_err(|_| ApiFailure::InvalidRequest)?;
        record.color = color.as_str().to_owned();
    }

    repo.upsert_tag(&record)
        .await
        .map_err(store_error("board.tags.update"))?;
    Ok(Json(TagResponse::from_record(&record)))
}

/// Deleting a tag also strips it from every card that carries it.
pub(crate) async fn delete_tag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tag_id): Path<String>,
) -> Result<StatusCode, ApiFailure> {
    ensure_db_schema(&state).await?;
    require_editor(&state, &headers).await?;

    let repo = BoardRepository::from_state(&state);
    if !repo
        .delete_tag(&tag_id)
        .await
        .map_err(store_error("board.tags.delete"))?
    {
        return Err(ApiFailure::NotFound);
    }

    let cards = repo.list_cards().await.map_err(store_error("board.tags.delete"))?;
    for card in cards {
        if card.tag_ids.iter().any(|id| *id == tag_id) {
            let mut updated = card;
            updated.tag_ids.retain(|id| *id != tag_id);
            repo.upsert_card(&updated)
                .await
                .map_err(store_error("board.tags.delete"))?;
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn create_column(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateColumnRequest>,
) -> Result<Json<ColumnResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    require_editor(&state, &headers).await?;

    let title = ColumnTitle::try_from(payload.title).map_err(|_| ApiFailure::InvalidRequest)?;

    let repo = BoardRepository::from_state(&state);
    let columns = repo
        .list_columns()
        .await
        .map_err(store_error("board.columns.create"))?;
    let position = columns
        .iter()
        .map(|column| column.position)
        .max()
        .map_or(0, |max| max + 1);

    let record = ColumnRecord {
        column_id: Ulid::new().to_string(),
        title: title.as_str().to_owned(),
        position,
    };
    repo.upsert_column(&record)
        .await
        .map_err(store_error("board.columns.create"))?;
    Ok(Json(ColumnResponse::from_record(&record)))
}

pub(crate) async fn update_column(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(column_id): Path<String>,
    Json(payload): Json<UpdateColumnRequest>,
) -> Result<Json<ColumnResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    require_editor(&state, &headers).await?;

    let title = ColumnTitle::try_from(payload.title).map_err(|_| ApiFailure::InvalidRequest)?;

    let repo = BoardRepository::from_state(&state);
    let mut record = repo
        .find_column(&column_id)
        .await
        .map_err(store_error("board.columns.update"))?
        .ok_or(ApiFailure::NotFound)?;
    record.title = title.as_str().to_owned();

    repo.upsert_column(&record)
        .await
        .map_err(store_error("board.columns.update"))?;
    Ok(Json(ColumnResponse::from_record(&record)))
}

/// Removes a column and every card in it.
pub(crate) async fn delete_column(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(column_id): Path<String>,
) -> Result<StatusCode, ApiFailure> {
    ensure_db_schema(&state).await?;
    let user = require_approved(&state, &headers).await?;
    if !can_delete_column(user.role, user.approval, user.permissions) {
        return Err(ApiFailure::Forbidden);
    }

    let repo = BoardRepository::from_state(&state);
    if !repo
        .delete_column(&column_id)
        .await
        .map_err(store_error("board.columns.delete"))?
    {
        return Err(ApiFailure::NotFound);
    }

    let cards = repo
        .list_cards()
        .await
        .map_err(store_error("board.columns.delete"))?;
    for card in cards {
        if card.column_id == column_id {
            repo.delete_card(&card.card_id)
                .await
                .map_err(store_error("board.columns.delete"))?;
        }
    }
    tracing::info!(event = "board.columns.delete", column_id = %column_id, actor_id = %user.id);
    Ok(StatusCode::NO_CONTENT)
}

/// Rewrites every column position from the given full ordering.
pub(crate) async fn reorder_columns(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<ReorderColumnsRequest>,
) -> Result<StatusCode, ApiFailure> {
    ensure_db_schema(&state).await?;
    require_editor(&state, &headers).await?;

    let repo = BoardRepository::from_state(&state);
    let columns = repo
        .list_columns()
        .await
        .map_err(store_error("board.columns.reorder"))?;

    if payload.column_ids.len() != columns.len() {
        return Err(ApiFailure::InvalidRequest);
    }
    for column in &columns {
        if !payload.column_ids.iter().any(|id| *id == column.column_id) {
            return Err(ApiFailure::InvalidRequest);
        }
    }

    for (index, column_id) in payload.column_ids.iter().enumerate() {
        let Some(column) = columns.iter().find(|column| column.column_id == *column_id) else {
            return Err(ApiFailure::InvalidRequest);
        };
        let position = i32::try_from(index).map_err(|_| ApiFailure::InvalidRequest)?;
        if column.position != position {
            let mut updated = column.clone();
            updated.position = position;
            repo.upsert_column(&updated)
                .await
                .map_err(store_error("board.columns.reorder"))?;
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn create_card(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateCardRequest>,
) -> Result<Json<CardResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    require_editor(&state, &headers).await?;

    let title = CardTitle::try_from(payload.title).map_err(|_| ApiFailure::InvalidRequest)?;
    let description = payload.description.unwrap_or_default();
    if description.chars().count() > MAX_DESCRIPTION_CHARS {
        return Err(ApiFailure::InvalidRequest);
    }

    let repo = BoardRepository::from_state(&state);
    repo.find_column(&payload.column_id)
        .await
        .map_err(store_error("board.cards.create"))?
        .ok_or(ApiFailure::InvalidRequest)?;

    let cards = repo.list_cards().await.map_err(store_error("board.cards.create"))?;
    let sort_order = cards
        .iter()
        .filter(|card| card.column_id == payload.column_id)
        .map(|card| card.sort_order)
        .max()
        .map_or(0, |max| max + 1);

    let record = CardRecord {
        card_id: Ulid::new().to_string(),
        column_id: payload.column_id,
        title: title.as_str().to_owned(),
        description,
        due_date: payload.due_date,
        sort_order,
        tag_ids: payload.tag_ids,
        assigned_user_ids: payload.assigned_user_ids,
        allowed_viewer_ids: payload.allowed_viewer_ids,
        allowed_editor_ids: payload.allowed_editor_ids,
        comments: Vec::new(),
    };
    repo.upsert_card(&record)
        .await
        .map_err(store_error("board.cards.create"))?;
    Ok(Json(CardResponse::from_record(&record, true)))
}

pub(crate) async fn update_card(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(card_id): Path<String>,
    Json(payload): Json<UpdateCardRequest>,
) -> Result<Json<CardResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    let user = require_approved(&state, &headers).await?;

    let repo = BoardRepository::from_state(&state);
    let mut record = repo
        .find_card(&card_id)
        .await
        .map_err(store_error("board.cards.update"))?
        .ok_or(ApiFailure::NotFound)?;

    if !can_edit_card(
        user.role,
        user.approval,
        &user.id,
        &parse_ids(&record.allowed_editor_ids),
    ) {
        return Err(ApiFailure::Forbidden);
    }

    if let Some(title) = payload.title {
        let title = CardTitle::try_from(title).map_err(|_| ApiFailure::InvalidRequest)?;
        record.title = title.as_str().to_owned();
    }
    if let Some(description) = payload.description {
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(ApiFailure::InvalidRequest);
        }
        record.description = description;
    }
    if let Some(due_date) = payload.due_date {
        record.due_date = if due_date.is_empty() { None } else { Some(due_date) };
    }
    if let Some(tag_ids) = payload.tag_ids {
        record.tag_ids = tag_ids;
    }
    if let Some(assigned_user_ids) = payload.assigned_user_ids {
        record.assigned_user_ids = assigned_user_ids;
    }
    if let Some(allowed_viewer_ids) = payload.allowed_viewer_ids {
        record.allowed_viewer_ids = allowed_viewer_ids;
    }
    if let Some(allowed_editor_ids) = payload.allowed_editor_ids {
        record.allowed_editor_ids = allowed_editor_ids;
    }

    repo.upsert_card(&record)
        .await
        .map_err(store_error("board.cards.update"))?;
    Ok(Json(CardResponse::from_record(&record, true)))
}

pub(crate) async fn delete_card(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(card_id): Path<String>,
) -> Result<StatusCode, ApiFailure> {
    ensure_db_schema(&state).await?;
    let user = require_approved(&state, &headers).await?;

    let repo = BoardRepository::from_state(&state);
    let record = repo
        .find_card(&card_id)
        .await
        .map_err(store_error("board.cards.delete"))?
        .ok_or(ApiFailure::NotFound)?;

    if !can_delete_card(
        user.role,
        user.approval,
        &user.id,
        &parse_ids(&record.allowed_editor_ids),
        user.permissions,
    ) {
        return Err(ApiFailure::Forbidden);
    }

    repo.delete_card(&card_id)
        .await
        .map_err(store_error("board.cards.delete"))?;
    tracing::info!(event = "board.cards.delete", card_id = %card_id, actor_id = %user.id);
    Ok(StatusCode::NO_CONTENT)
}

/// Moves a card into a column at an optional position, then renumbers the
/// affected columns densely from zero.
pub(crate) async fn move_card(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(card_id): Path<String>,
    Json(payload): Json<MoveCardRequest>,
) -> Result<Json<CardResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    let user = require_approved(&state, &headers).await?;

    let repo = BoardRepository::from_state(&state);
    let record = repo
        .find_card(&card_id)
        .await
        .map_err(store_error("board.cards.move"))?
        .ok_or(ApiFailure::NotFound)?;

    if !can_edit_card(
        user.role,
        user.approval,
        &user.id,
        &parse_ids(&record.allowed_editor_ids),
    ) {
        return Err(ApiFailure::Forbidden);
    }

    repo.find_column(&payload.column_id)
        .await
        .map_err(store_error("board.cards.move"))?
        .ok_or(ApiFailure::InvalidRequest)?;

    let source_column = record.column_id.clone();
    let all_cards = repo.list_cards().await.map_err(store_error("board.cards.move"))?;

    let mut target: Vec<CardRecord> = all_cards
        .iter()
        .filter(|card| card.column_id == payload.column_id && card.card_id != card_id)
        .cloned()
        .collect();
    let mut moved = record;
    moved.column_id = payload.column_id.clone();
    let insert_at = payload
        .position
        .and_then(|position| usize::try_from(position).ok())
        .map_or(target.len(), |position| position.min(target.len()));
    target.insert(insert_at, moved);

    for (index, card) in target.iter_mut().enumerate() {
        let sort_order = i32::try_from(index).map_err(|_| ApiFailure::InvalidRequest)?;
        if card.sort_order != sort_order || card.card_id == card_id {
            card.sort_order = sort_order;
            repo.upsert_card(card)
                .await
                .map_err(store_error("board.cards.move"))?;
        }
    }

    if source_column != payload.column_id {
        let remaining: Vec<CardRecord> = all_cards
            .iter()
            .filter(|card| card.column_id == source_column && card.card_id != card_id)
            .cloned()
            .collect();
        for (index, card) in remaining.iter().enumerate() {
            let sort_order = i32::try_from(index).map_err(|_| ApiFailure::InvalidRequest)?;
            if card.sort_order != sort_order {
                let mut updated = card.clone();
                updated.sort_order = sort_order;
                repo.upsert_card(&updated)
                    .await
                    .map_err(store_error("board.cards.move"))?;
            }
        }
    }

    let moved = repo
        .find_card(&card_id)
        .await
        .map_err(store_error("board.cards.move"))?
        .ok_or(ApiFailure::Internal)?;
    Ok(Json(CardResponse::from_record(&moved, true)))
}

/// Appends a comment. View access on the card is enough to comment.
pub(crate) async fn add_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(card_id): Path<String>,
    Json(payload): Json<CommentRequest>,
) -> Result<Json<CommentResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    let user = require_approved(&state, &headers).await?;

    let body = payload.body.trim().to_owned();
    if body.is_empty() || body.chars().count() > MAX_COMMENT_CHARS {
        return Err(ApiFailure::InvalidRequest);
    }

    let repo = BoardRepository::from_state(&state);
    let mut record = repo
        .find_card(&card_id)
        .await
        .map_err(store_error("board.cards.comment"))?
        .ok_or(ApiFailure::NotFound)?;

    if !can_view_card(
        user.role,
        user.approval,
        &user.id,
        &parse_ids(&record.allowed_viewer_ids),
    ) {
        return Err(ApiFailure::Forbidden);
    }

    let comment = CommentRecord {
        comment_id: Ulid::new().to_string(),
        author_id: user.id.as_str().to_owned(),
        body,
        created_at_unix: now_unix(),
    };
    record.comments.push(comment.clone());

    repo.upsert_card(&record)
        .await
        .map_err(store_error("board.cards.comment"))?;
    Ok(Json(CommentResponse::from_record(&comment)))
}

/// Board chrome settings. Served without auth so the login page can brand
/// itself, and never fails: storage trouble degrades to the defaults.
pub(crate) async fn get_settings(State(state): State<AppState>) -> Json<SettingsResponse> {
    let settings = match ensure_db_schema(&state).await {
        Ok(()) => BoardRepository::from_state(&state)
            .fetch_settings()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(BoardSettingsRecord::fallback),
        Err(_) => BoardSettingsRecord::fallback(),
    };
    Json(SettingsResponse::from_record(&settings))
}

pub(crate) async fn update_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateSettingsRequest>,
) -> Result<Json<SettingsResponse>, ApiFailure> {
    ensure_db_schema(&state).await?;
    require_admin(&state, &headers).await?;

    let repo = BoardRepository::from_state(&state);
    let mut settings = repo
        .fetch_settings()
        .await
        .map_err(store_error("board.settings.update"))?
        .unwrap_or_else(BoardSettingsRecord::fallback);

    if let Some(board_title) = payload.board_title {
        let board_title = board_title.trim().to_owned();
        if board_title.is_empty() || board_title.chars().count() > 128 {
            return Err(ApiFailure::InvalidRequest);
        }
        settings.board_title = board_title;
    }
    if let Some(accent_color) = payload.accent_color {
        let accent_color =
            HexColor::try_from(accent_color).map_err(|_| ApiFailure::InvalidRequest)?;
        settings.accent_color = accent_color.as_str().to_owned();
    }

    repo.store_settings(&settings)
        .await
        .map_err(store_error("board.settings.update"))?;
    Ok(Json(SettingsResponse::from_record(&settings)))
}
