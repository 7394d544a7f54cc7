use sqlx::Row as _;

use super::{
    core::{AppState, BoardSettingsRecord, CardRecord, ColumnRecord, TagRecord},
    db::{comments_from_json, comments_to_json, id_list_from_json, id_list_to_json},
};

trait BoardPersistence {
    async fn upsert_tag(&self, tag: &TagRecord) -> Result<(), sqlx::Error>;
    async fn list_tags(&self) -> Result<Vec<TagRecord>, sqlx::Error>;
    async fn delete_tag(&self, tag_id: &str) -> Result<bool, sqlx::Error>;

    async fn upsert_column(&self, column: &ColumnRecord) -> Result<(), sqlx::Error>;
    async fn find_column(&self, column_id: &str) -> Result<Option<ColumnRecord>, sqlx::Error>;
    async fn list_columns(&self) -> Result<Vec<ColumnRecord>, sqlx::Error>;
    async fn delete_column(&self, column_id: &str) -> Result<bool, sqlx::Error>;

    async fn upsert_card(&self, card: &CardRecord) -> Result<(), sqlx::Error>;
    async fn find_card(&self, card_id: &str) -> Result<Option<CardRecord>, sqlx::Error>;
    async fn list_cards(&self) -> Result<Vec<CardRecord>, sqlx::Error>;
    async fn delete_card(&self, card_id: &str) -> Result<bool, sqlx::Error>;

    async fn store_settings(&self, settings: &BoardSettingsRecord) -> Result<(), sqlx::Error>;
    async fn fetch_settings(&self) -> Result<Option<BoardSettingsRecord>, sqlx::Error>;
}

struct MySqlBoardRepository<'a> {
    pool: &'a sqlx::MySqlPool,
}

impl BoardPersistence for MySqlBoardRepository<'_> {
    async fn upsert_tag(&self, tag: &TagRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO tags (tag_id, label, color) VALUES (?, ?, ?)
             ON DUPLICATE KEY UPDATE label = VALUES(label), color = VALUES(color)",
        )
        .bind(&tag.tag_id)
        .bind(&tag.label)
        .bind(&tag.color)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<TagRecord>, sqlx::Error> {
        let rows = sqlx::query("SELECT tag_id, label, color FROM tags ORDER BY label")
            .fetch_all(self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                Ok(TagRecord {
                    tag_id: row.try_get("tag_id")?,
                    label: row.try_get("label")?,
                    color: row.try_get("color")?,
                })
            })
            .collect()
    }

    async fn delete_tag(&self, tag_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tags WHERE tag_id = ?")
            .bind(tag_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_column(&self, column: &ColumnRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO board_columns (column_id, title, position) VALUES (?, ?, ?)
             ON DUPLICATE KEY UPDATE title = VALUES(title), position = VALUES(position)",
        )
        .bind(&column.column_id)
        .bind(&column.title)
        .bind(column.position)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    async fn find_column(&self, column_id: &str) -> Result<Option<ColumnRecord>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT column_id, title, position FROM board_columns WHERE column_id = ?",
        )
        .bind(column_id)
        .fetch_optional(self.pool)
        .await?;
        row.map(|row| {
            Ok(ColumnRecord {
                column_id: row.try_get("column_id")?,
                title: row.try_get("title")?,
                position: row.try_get("position")?,
            })
        })
        .transpose()
    }

    async fn list_columns(&self) -> Result<Vec<ColumnRecord>, sqlx::Error> {
        let rows =
            sqlx::query("SELECT column_id, title, position FROM board_columns ORDER BY position")
                .fetch_all(self.pool)
                .await?;
        rows.into_iter()
            .map(|row| {
                Ok(ColumnRecord {
                    column_id: row.try_get("column_id")?,
                    title: row.try_get("title")?,
                    position: row.try_get("position")?,
                })
            })
            .collect()
    }

    async fn delete_column(&self, column_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM board_columns WHERE column_id = ?")
            .bind(column_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_card(&self, card: &CardRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO cards (card_id, column_id, title, description, due_date, sort_order,
                                tag_ids_json, assigned_user_ids_json, allowed_viewer_ids_json,
                                allowed_editor_ids_json, comments_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON DUPLICATE KEY UPDATE
                 column_id = VALUES(column_id),
                 title = VALUES(title),
                 description = VALUES(description),
                 due_date = VALUES(due_date),
                 sort_order = VALUES(sort_order),
                 tag_ids_json = VALUES(tag_ids_json),
                 assigned_user_ids_json = VALUES(assigned_user_ids_json),
                 allowed_viewer_ids_json = VALUES(allowed_viewer_ids_json),
                 allowed_editor_ids_json = VALUES(allowed_editor_ids_json),
                 comments_json = VALUES(comments_json)",
        )
        .bind(&card.card_id)
        .bind(&card.column_id)
        .bind(&card.title)
        .bind(&card.description)
        .bind(card.due_date.as_deref())
        .bind(card.sort_order)
        .bind(id_list_to_json(&card.tag_ids))
        .bind(id_list_to_json(&card.assigned_user_ids))
        .bind(id_list_to_json(&card.allowed_viewer_ids))
        .bind(id_list_to_json(&card.allowed_editor_ids))
        .bind(comments_to_json(&card.comments))
        .execute(self.pool)
        .await?;
        Ok(())
    }

    async fn find_card(&self, card_id: &str) -> Result<Option<CardRecord>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT card_id, column_id, title, description, due_date, sort_order,
                    tag_ids_json, assigned_user_ids_json, allowed_viewer_ids_json,
                    allowed_editor_ids_json, comments_json
             FROM cards WHERE card_id = ?",
        )
        .bind(card_id)
        .fetch_optional(self.pool)
        .await?;
        row.as_ref().map(card_from_row).transpose()
    }

    async fn list_cards(&self) -> Result<Vec<CardRecord>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT card_id, column_id, title, description, due_date, sort_order,
                    tag_ids_json, assigned_user_ids_json, allowed_viewer_ids_json,
                    allowed_editor_ids_json, comments_json
             FROM cards ORDER BY column_id, sort_order",
        )
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(card_from_row).collect()
    }

    async fn delete_card(&self, card_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM cards WHERE card_id = ?")
            .bind(card_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn store_settings(&self, settings: &BoardSettingsRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO board_settings (settings_id, board_title, accent_color) VALUES (1, ?, ?)
             ON DUPLICATE KEY UPDATE board_title = VALUES(board_title), accent_color = VALUES(accent_color)",
        )
        .bind(&settings.board_title)
        .bind(&settings.accent_color)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_settings(&self) -> Result<Option<BoardSettingsRecord>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT board_title, accent_color FROM board_settings WHERE settings_id = 1",
        )
        .fetch_optional(self.pool)
        .await?;
        row.map(|row| {
            Ok(BoardSettingsRecord {
                board_title: row.try_get("board_title")?,
                accent_color: row.try_get("accent_color")?,
            })
        })
        .transpose()
    }
}

fn card_from_row(row: &sqlx::mysql::MySqlRow) -> Result<CardRecord, sqlx::Error> {
    let tag_ids_json: String = row.try_get("tag_ids_json")?;
    let assigned_json: String = row.try_get("assigned_user_ids_json")?;
    let viewers_json: String = row.try_get("allowed_viewer_ids_json")?;
    let editors_json: String = row.try_get("allowed_editor_ids_json")?;
    let comments_json: String = row.try_get("comments_json")?;
    Ok(CardRecord {
        card_id: row.try_get("card_id")?,
        column_id: row.try_get("column_id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        due_date: row.try_get("due_date")?,
        sort_order: row.try_get("sort_order")?,
        tag_ids: id_list_from_json(&tag_ids_json),
        assigned_user_ids: id_list_from_json(&assigned_json),
        allowed_viewer_ids: id_list_from_json(&viewers_json),
        allowed_editor_ids: id_list_from_json(&editors_json),
        comments: comments_from_json(&comments_json),
    })
}

struct InMemoryBoardRepository<'a> {
    state: &'a AppState,
}

impl BoardPersistence for InMemoryBoardRepository<'_> {
    async fn upsert_tag(&self, tag: &TagRecord) -> Result<(), sqlx::Error> {
        let mut tags = self.state.tags.write().await;
        tags.insert(tag.tag_id.clone(), tag.clone());
        Ok(())
    }

    async fn list_tags(&self) -> Result<Vec<TagRecord>, sqlx::Error> {
        let tags = self.state.tags.read().await;
        let mut listed: Vec<TagRecord> = tags.values().cloned().collect();
        listed.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(listed)
    }

    async fn delete_tag(&self, tag_id: &str) -> Result<bool, sqlx::Error> {
        let mut tags = self.state.tags.write().await;
        Ok(tags.remove(tag_id).is_some())
    }

    async fn upsert_column(&self, column: &ColumnRecord) -> Result<(), sqlx::Error> {
        let mut columns = self.state.columns.write().await;
        columns.insert(column.column_id.clone(), column.clone());
        Ok(())
    }

    async fn find_column(&self, column_id: &str) -> Result<Option<ColumnRecord>, sqlx::Error> {
        let columns = self.state.columns.read().await;
        Ok(columns.get(column_id).cloned())
    }

    async fn list_columns(&self) -> Result<Vec<ColumnRecord>, sqlx::Error> {
        let columns = self.state.columns.read().await;
        let mut listed: Vec<ColumnRecord> = columns.values().cloned().collect();
        listed.sort_by_key(|column| column.position);
        Ok(listed)
    }

    async fn delete_column(&self, column_id: &str) -> Result<bool, sqlx::Error> {
        let mut columns = self.state.columns.write().await;
        Ok(columns.remove(column_id).is_some())
    }

    async fn upsert_card(&self, card: &CardRecord) -> Result<(), sqlx::Error> {
        let mut cards = self.state.cards.write().await;
        cards.insert(card.card_id.clone(), card.clone());
        Ok(())
    }

    async fn find_card(&self, card_id: &str) -> Result<Option<CardRecord>, sqlx::Error> {
        let cards = self.state.cards.read().await;
        Ok(cards.get(card_id).cloned())
    }

    async fn list_cards(&self) -> Result<Vec<CardRecord>, sqlx::Error> {
        let cards = self.state.cards.read().await;
        let mut listed: Vec<CardRecord> = cards.values().cloned().collect();
        listed.sort_by(|a, b| {
            a.column_id
                .cmp(&b.column_id)
                .then(a.sort_order.cmp(&b.sort_order))
        });
        Ok(listed)
    }

    async fn delete_card(&self, card_id: &str) -> Result<bool, sqlx::Error> {
        let mut cards = self.state.cards.write().await;
        Ok(cards.remove(card_id).is_some())
    }

    async fn store_settings(&self, settings: &BoardSettingsRecord) -> Result<(), sqlx::Error> {
        let mut stored = self.state.settings.write().await;
        *stored = Some(settings.clone());
        Ok(())
    }

    async fn fetch_settings(&self) -> Result<Option<BoardSettingsRecord>, sqlx::Error> {
        let stored = self.state.settings.read().await;
        Ok(stored.clone())
    }
}

pub(crate) enum BoardRepository<'a> {
    MySql(MySqlBoardRepository<'a>),
    InMemory(InMemoryBoardRepository<'a>),
}

impl<'a> BoardRepository<'a> {
    pub(crate) fn from_state(state: &'a AppState) -> Self {
        match &state.db_pool {
            Some(pool) => Self::MySql(MySqlBoardRepository { pool }),
            None => Self::InMemory(InMemoryBoardRepository { state }),
        }
    }

    pub(crate) async fn upsert_tag(&self, tag: &TagRecord) -> Result<(), sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.upsert_tag(tag).await,
            Self::InMemory(repo) => repo.upsert_tag(tag).await,
        }
    }

    pub(crate) async fn list_tags(&self) -> Result<Vec<TagRecord>, sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.list_tags().await,
            Self::InMemory(repo) => repo.list_tags().await,
        }
    }

    pub(crate) async fn delete_tag(&self, tag_id: &str) -> Result<bool, sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.delete_tag(tag_id).await,
            Self::InMemory(repo) => repo.delete_tag(tag_id).await,
        }
    }

    pub(crate) async fn upsert_column(&self, column: &ColumnRecord) -> Result<(), sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.upsert_column(column).await,
            Self::InMemory(repo) => repo.upsert_column(column).await,
        }
    }

    pub(crate) async fn find_column(
        &self,
        column_id: &str,
    ) -> Result<Option<ColumnRecord>, sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.find_column(column_id).await,
            Self::InMemory(repo) => repo.find_column(column_id).await,
        }
    }

    pub(crate) async fn list_columns(&self) -> Result<Vec<ColumnRecord>, sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.list_columns().await,
            Self::InMemory(repo) => repo.list_columns().await,
        }
    }

    pub(crate) async fn delete_column(&self, column_id: &str) -> Result<bool, sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.delete_column(column_id).await,
            Self::InMemory(repo) => repo.delete_column(column_id).await,
        }
    }

    pub(crate) async fn upsert_card(&self, card: &CardRecord) -> Result<(), sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.upsert_card(card).await,
            Self::InMemory(repo) => repo.upsert_card(card).await,
        }
    }

    pub(crate) async fn find_card(&self, card_id: &str) -> Result<Option<CardRecord>, sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.find_card(card_id).await,
            Self::InMemory(repo) => repo.find_card(card_id).await,
        }
    }

    pub(crate) async fn list_cards(&self) -> Result<Vec<CardRecord>, sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.list_cards().await,
            Self::InMemory(repo) => repo.list_cards().await,
        }
    }

    pub(crate) async fn delete_card(&self, card_id: &str) -> Result<bool, sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.delete_card(card_id).await,
            Self::InMemory(repo) => repo.delete_card(card_id).await,
        }
    }

    pub(crate) async fn store_settings(
        &self,
        settings: &BoardSettingsRecord,
    ) -> Result<(), sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.store_settings(settings).await,
            Self::InMemory(repo) => repo.store_settings(settings).await,
        }
    }

    pub(crate) async fn fetch_settings(&self) -> Result<Option<BoardSettingsRecord>, sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.fetch_settings().await,
            Self::InMemory(repo) => repo.fetch_settings().await,
        }
    }
}
