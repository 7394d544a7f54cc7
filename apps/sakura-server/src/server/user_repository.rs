use sqlx::Row as _;

use sakura_core::{EditorPermissions, UserId};

use super::{
    core::{AppState, UserRecord},
    db::{
        approval_from_i16, approval_to_i16, id_list_from_json, id_list_to_json, role_from_i16,
        role_to_i16,
    },
};

trait UserPersistence {
    async fn upsert_user(&self, user: &UserRecord) -> Result<(), sqlx::Error>;
    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, sqlx::Error>;
    async fn list_users(&self) -> Result<Vec<UserRecord>, sqlx::Error>;
    async fn delete_user(&self, user_id: &str) -> Result<bool, sqlx::Error>;
}

struct MySqlUserRepository<'a> {
    pool: &'a sqlx::MySqlPool,
}

impl UserPersistence for MySqlUserRepository<'_> {
    async fn upsert_user(&self, user: &UserRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO users (id, display_name, avatar_ref, role, approval, role_ids_json, can_delete_columns, can_delete_cards)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON DUPLICATE KEY UPDATE
                 display_name = VALUES(display_name),
                 avatar_ref = VALUES(avatar_ref),
                 role = VALUES(role),
                 approval = VALUES(approval),
                 role_ids_json = VALUES(role_ids_json),
                 can_delete_columns = VALUES(can_delete_columns),
                 can_delete_cards = VALUES(can_delete_cards)",
        )
        .bind(user.id.as_str())
        .bind(&user.display_name)
        .bind(user.avatar_ref.as_deref())
        .bind(role_to_i16(user.role))
        .bind(approval_to_i16(user.approval))
        .bind(id_list_to_json(&user.cached_role_ids))
        .bind(user.permissions.can_delete_columns)
        .bind(user.permissions.can_delete_cards)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT id, display_name, avatar_ref, role, approval, role_ids_json, can_delete_columns, can_delete_cards
             FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.pool)
        .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT id, display_name, avatar_ref, role, approval, role_ids_json, can_delete_columns, can_delete_cards
             FROM users ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn user_from_row(row: &sqlx::mysql::MySqlRow) -> Result<UserRecord, sqlx::Error> {
    let id: String = row.try_get("id")?;
    let id = UserId::try_from(id).map_err(|e| sqlx::Error::Decode(Box::new(e)))?;
    let role_ids_json: String = row.try_get("role_ids_json")?;
    Ok(UserRecord {
        id,
        display_name: row.try_get("display_name")?,
        avatar_ref: row.try_get("avatar_ref")?,
        role: role_from_i16(row.try_get("role")?),
        approval: approval_from_i16(row.try_get("approval")?),
        cached_role_ids: id_list_from_json(&role_ids_json),
        permissions: EditorPermissions {
            can_delete_columns: row.try_get("can_delete_columns")?,
            can_delete_cards: row.try_get("can_delete_cards")?,
        },
    })
}

struct InMemoryUserRepository<'a> {
    state: &'a AppState,
}

impl UserPersistence for InMemoryUserRepository<'_> {
    async fn upsert_user(&self, user: &UserRecord) -> Result<(), sqlx::Error> {
        let mut users = self.state.users.write().await;
        users.insert(user.id.as_str().to_owned(), user.clone());
        Ok(())
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        let users = self.state.users.read().await;
        Ok(users.get(user_id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, sqlx::Error> {
        let users = self.state.users.read().await;
        let mut listed: Vec<UserRecord> = users.values().cloned().collect();
        listed.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        Ok(listed)
    }

    async fn delete_user(&self, user_id: &str) -> Result<bool, sqlx::Error> {
        let mut users = self.state.users.write().await;
        Ok(users.remove(user_id).is_some())
    }
}

pub(crate) enum UserRepository<'a> {
    MySql(MySqlUserRepository<'a>),
    InMemory(InMemoryUserRepository<'a>),
}

impl<'a> UserRepository<'a> {
    pub(crate) fn from_state(state: &'a AppState) -> Self {
        match &state.db_pool {
            Some(pool) => Self::MySql(MySqlUserRepository { pool }),
            None => Self::InMemory(InMemoryUserRepository { state }),
        }
    }

    pub(crate) async fn upsert_user(&self, user: &UserRecord) -> Result<(), sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.upsert_user(user).await,
            Self::InMemory(repo) => repo.upsert_user(user).await,
        }
    }

    pub(crate) async fn find_user(&self, user_id: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.find_user(user_id).await,
            Self::InMemory(repo) => repo.find_user(user_id).await,
        }
    }

    pub(crate) async fn list_users(&self) -> Result<Vec<UserRecord>, sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.list_users().await,
            Self::InMemory(repo) => repo.list_users().await,
        }
    }

    pub(crate) async fn delete_user(&self, user_id: &str) -> Result<bool, sqlx::Error> {
        match self {
            Self::MySql(repo) => repo.delete_user(user_id).await,
            Self::InMemory(repo) => repo.delete_user(user_id).await,
        }
    }
}
