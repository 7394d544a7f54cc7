use std::{
    collections::HashMap,
    sync::{
        atomic::AtomicBool,
        Arc, Mutex, OnceLock,
    },
    time::Duration,
};

use anyhow::anyhow;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use pasetors::{keys::SymmetricKey, version4::V4};
use rand::{rngs::OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sqlx::{mysql::MySqlPoolOptions, MySqlPool};
use tokio::sync::{OnceCell, RwLock};

use sakura_core::{ApplicationRole, ApprovalStatus, EditorPermissions, UserId};

use super::discord::{DirectoryMember, DiscordIdentity, ModerationAction};

pub const DEFAULT_JSON_BODY_LIMIT_BYTES: usize = 1_048_576;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_RATE_LIMIT_REQUESTS_PER_MINUTE: u32 = 120;
pub const SESSION_TTL_STAY_SECS: i64 = 30 * 24 * 60 * 60;
pub const SESSION_TTL_SHORT_SECS: i64 = 12 * 60 * 60;
pub const GUILD_MEMBER_PAGE_LIMIT: u32 = 1000;
pub(crate) const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";
pub(crate) const DEFAULT_BOARD_TITLE: &str = "SakuraBoard";
pub(crate) const DEFAULT_ACCENT_COLOR: &str = "#ffb7c5";
pub(crate) const SESSION_COOKIE_NAME: &str = "sakura_session";
pub(crate) const METRICS_TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
pub(crate) const MAX_MODERATION_REASON_CHARS: usize = 512;

pub(crate) static METRICS_STATE: OnceLock<MetricsState> = OnceLock::new();

#[derive(Default)]
pub(crate) struct MetricsState {
    pub(crate) auth_failures: Mutex<HashMap<&'static str, u64>>,
    pub(crate) directory_lookups: Mutex<HashMap<&'static str, u64>>,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
    pub rate_limit_requests_per_minute: u32,
    pub database_url: Option<String>,
    pub discord_client_id: String,
    pub discord_client_secret: String,
    /// Bot token for guild lookups. When absent the server runs against the
    /// in-memory directory, which only makes sense for tests.
    pub discord_bot_token: Option<String>,
    pub discord_guild_id: String,
    pub discord_api_base: String,
    pub admin_role_ids: Vec<String>,
    pub public_base_url: String,
    pub frontend_url: String,
    pub tuner_url: Option<String>,
    /// Base64-encoded 32-byte session key. Generated at startup when absent,
    /// which invalidates outstanding sessions on restart.
    pub session_key: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_JSON_BODY_LIMIT_BYTES,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            rate_limit_requests_per_minute: DEFAULT_RATE_LIMIT_REQUESTS_PER_MINUTE,
            database_url: None,
            discord_client_id: String::new(),
            discord_client_secret: String::new(),
            discord_bot_token: None,
            discord_guild_id: String::from("0"),
            discord_api_base: String::from(DEFAULT_DISCORD_API_BASE),
            admin_role_ids: Vec::new(),
            public_base_url: String::from("http://127.0.0.1:3000"),
            frontend_url: String::from("http://127.0.0.1:5173"),
            tuner_url: None,
            session_key: None,
        }
    }
}

#[derive(Clone)]
pub(crate) struct RuntimeConfig {
    pub(crate) admin_role_ids: std::collections::HashSet<String>,
    pub(crate) discord_client_id: String,
    pub(crate) discord_client_secret: String,
    pub(crate) discord_bot_token: Option<String>,
    pub(crate) discord_guild_id: String,
    pub(crate) discord_api_base: String,
    pub(crate) public_base_url: String,
    pub(crate) frontend_url: String,
    pub(crate) tuner_url: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub(crate) db_pool: Option<MySqlPool>,
    pub(crate) db_init: Arc<OnceCell<()>>,
    pub(crate) users: Arc<RwLock<HashMap<String, UserRecord>>>,
    pub(crate) tags: Arc<RwLock<HashMap<String, TagRecord>>>,
    pub(crate) columns: Arc<RwLock<HashMap<String, ColumnRecord>>>,
    pub(crate) cards: Arc<RwLock<HashMap<String, CardRecord>>>,
    pub(crate) settings: Arc<RwLock<Option<BoardSettingsRecord>>>,
    pub(crate) token_key: Arc<SymmetricKey<V4>>,
    pub(crate) http_client: reqwest::Client,
    pub(crate) directory_members: Arc<RwLock<HashMap<String, DirectoryMember>>>,
    pub(crate) directory_codes: Arc<RwLock<HashMap<String, DiscordIdentity>>>,
    pub(crate) directory_outage: Arc<AtomicBool>,
    pub(crate) moderation_log: Arc<RwLock<Vec<ModerationAction>>>,
    pub(crate) runtime: Arc<RuntimeConfig>,
}

impl AppState {
    pub(crate) fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let key_bytes = match &config.session_key {
            Some(encoded) => {
                let decoded = STANDARD
                    .decode(encoded)
                    .map_err(|e| anyhow!("session key decode failed: {e}"))?;
                <[u8; 32]>::try_from(decoded)
                    .map_err(|_| anyhow!("session key must be exactly 32 bytes"))?
            }
            None => {
                let mut generated = [0_u8; 32];
                OsRng.fill_bytes(&mut generated);
                generated
            }
        };
        let token_key = SymmetricKey::<V4>::from(&key_bytes)
            .map_err(|e| anyhow!("session key init failed: {e}"))?;

        let db_pool = if let Some(database_url) = &config.database_url {
            Some(
                MySqlPoolOptions::new()
                    .max_connections(10)
                    .connect_lazy(database_url)
                    .map_err(|e| anyhow!("mysql pool init failed: {e}"))?,
            )
        } else {
            None
        };

        Ok(Self {
            db_pool,
            db_init: Arc::new(OnceCell::new()),
            users: Arc::new(RwLock::new(HashMap::new())),
            tags: Arc::new(RwLock::new(HashMap::new())),
            columns: Arc::new(RwLock::new(HashMap::new())),
            cards: Arc::new(RwLock::new(HashMap::new())),
            settings: Arc::new(RwLock::new(None)),
            token_key: Arc::new(token_key),
            http_client: reqwest::Client::new(),
            directory_members: Arc::new(RwLock::new(HashMap::new())),
            directory_codes: Arc::new(RwLock::new(HashMap::new())),
            directory_outage: Arc::new(AtomicBool::new(false)),
            moderation_log: Arc::new(RwLock::new(Vec::new())),
            runtime: Arc::new(RuntimeConfig {
                admin_role_ids: config.admin_role_ids.iter().cloned().collect(),
                discord_client_id: config.discord_client_id.clone(),
                discord_client_secret: config.discord_client_secret.clone(),
                discord_bot_token: config.discord_bot_token.clone(),
                discord_guild_id: config.discord_guild_id.clone(),
                discord_api_base: config.discord_api_base.clone(),
                public_base_url: config.public_base_url.clone(),
                frontend_url: config.frontend_url.clone(),
                tuner_url: config.tuner_url.clone(),
            }),
        })
    }
}

#[derive(Debug, Clone)]
pub(crate) struct UserRecord {
    pub(crate) id: UserId,
    pub(crate) display_name: String,
    pub(crate) avatar_ref: Option<String>,
    pub(crate) role: ApplicationRole,
    pub(crate) approval: ApprovalStatus,
    pub(crate) cached_role_ids: Vec<String>,
    pub(crate) permissions: EditorPermissions,
}

#[derive(Debug, Clone)]
pub(crate) struct TagRecord {
    pub(crate) tag_id: String,
    pub(crate) label: String,
    pub(crate) color: String,
}

#[derive(Debug, Clone)]
pub(crate) struct ColumnRecord {
    pub(crate) column_id: String,
    pub(crate) title: String,
    pub(crate) position: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CommentRecord {
    pub(crate) comment_id: String,
    pub(crate) author_id: String,
    pub(crate) body: String,
    pub(crate) created_at_unix: i64,
}

#[derive(Debug, Clone)]
pub(crate) struct CardRecord {
    pub(crate) card_id: String,
    pub(crate) column_id: String,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) due_date: Option<String>,
    pub(crate) sort_order: i32,
    pub(crate) tag_ids: Vec<String>,
    pub(crate) assigned_user_ids: Vec<String>,
    pub(crate) allowed_viewer_ids: Vec<String>,
    pub(crate) allowed_editor_ids: Vec<String>,
    pub(crate) comments: Vec<CommentRecord>,
}

#[derive(Debug, Clone)]
pub(crate) struct BoardSettingsRecord {
    pub(crate) board_title: String,
    pub(crate) accent_color: String,
}

impl BoardSettingsRecord {
    pub(crate) fn fallback() -> Self {
        Self {
            board_title: String::from(DEFAULT_BOARD_TITLE),
            accent_color: String::from(DEFAULT_ACCENT_COLOR),
        }
    }
}
