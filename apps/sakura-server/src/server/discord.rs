use std::sync::atomic::Ordering;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use sakura_core::MemberLookup;

use super::core::AppState;

/// Discord user identity as returned by `/users/@me`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DiscordIdentity {
    pub(crate) id: String,
    pub(crate) username: String,
    #[serde(default)]
    pub(crate) global_name: Option<String>,
    #[serde(default)]
    pub(crate) avatar: Option<String>,
}

impl DiscordIdentity {
    pub(crate) fn display_name(&self) -> String {
        self.global_name
            .clone()
            .unwrap_or_else(|| self.username.clone())
    }

    pub(crate) fn avatar_ref(&self) -> Option<String> {
        self.avatar.as_ref().map(|hash| {
            format!(
                "https://cdn.discordapp.com/avatars/{}/{hash}.png",
                self.id
            )
        })
    }
}

/// Seeded member entry for the in-memory directory.
#[derive(Debug, Clone)]
pub(crate) struct DirectoryMember {
    pub(crate) display_name: String,
    pub(crate) role_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GuildMemberSummary {
    pub(crate) user_id: String,
    pub(crate) display_name: String,
    pub(crate) role_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ModerationAction {
    Timeout {
        user_id: String,
        until_unix: i64,
        reason: String,
    },
    Kick {
        user_id: String,
        reason: String,
    },
    Ban {
        user_id: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DirectoryError {
    /// Provider unreachable or replied outside its contract. Stored role and
    /// approval state must not change on this path.
    Transport,
    /// The OAuth authorization code was rejected.
    RejectedCode,
}

#[derive(Debug, Deserialize)]
struct OAuthTokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct GuildMemberWire {
    user: DiscordIdentity,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    nick: Option<String>,
}

pub(crate) trait GuildLookup {
    async fn exchange_code(&self, code: &str) -> Result<DiscordIdentity, DirectoryError>;

    async fn fetch_member(&self, user_id: &str) -> Result<MemberLookup, DirectoryError>;

    async fn list_members(
        &self,
        after: Option<&str>,
        limit: u32,
    ) -> Result<Vec<GuildMemberSummary>, DirectoryError>;

    async fn timeout_member(
        &self,
        user_id: &str,
        until_unix: i64,
        reason: &str,
    ) -> Result<(), DirectoryError>;

    async fn kick_member(&self, user_id: &str, reason: &str) -> Result<(), DirectoryError>;

    async fn ban_member(&self, user_id: &str, reason: &str) -> Result<(), DirectoryError>;
}

pub(crate) struct HttpGuildDirectory<'a> {
    state: &'a AppState,
}

impl<'a> HttpGuildDirectory<'a> {
    pub(crate) fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn bot_token(&self) -> Result<&str, DirectoryError> {
        self.state
            .runtime
            .discord_bot_token
            .as_deref()
            .ok_or(DirectoryError::Transport)
    }

    fn member_url(&self, user_id: &str) -> String {
        format!(
            "{}/guilds/{}/members/{user_id}",
            self.state.runtime.discord_api_base, self.state.runtime.discord_guild_id
        )
    }
}

impl GuildLookup for HttpGuildDirectory<'_> {
    async fn exchange_code(&self, code: &str) -> Result<DiscordIdentity, DirectoryError> {
        let runtime = &self.state.runtime;
        let redirect_uri = format!("{}/api/auth/discord/callback", runtime.public_base_url);
        let form = [
            ("client_id", runtime.discord_client_id.as_str()),
            ("client_secret", runtime.discord_client_secret.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri.as_str()),
        ];
        let response = self
            .state
            .http_client
            .post(format!("{}/oauth2/token", runtime.discord_api_base))
            .form(&form)
            .send()
            .await
            .map_err(|_| DirectoryError::Transport)?;
        if response.status().is_client_error() {
            return Err(DirectoryError::RejectedCode);
        }
        if !response.status().is_success() {
            return Err(DirectoryError::Transport);
        }
        let token: OAuthTokenResponse = response
            .json()
            .await
            .map_err(|_| DirectoryError::Transport)?;

        let identity_response = self
            .state
            .http_client
            .get(format!("{}/users/@me", runtime.discord_api_base))
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|_| DirectoryError::Transport)?;
        if !identity_response.status().is_success() {
            return Err(DirectoryError::Transport);
        }
        identity_response
            .json()
            .await
            .map_err(|_| DirectoryError::Transport)
    }

    async fn fetch_member(&self, user_id: &str) -> Result<MemberLookup, DirectoryError> {
        let token = self.bot_token()?;
        let response = self
            .state
            .http_client
            .get(self.member_url(user_id))
            .header("Authorization", format!("Bot {token}"))
            .send()
            .await
            .map_err(|_| DirectoryError::Transport)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(MemberLookup::NotInGuild);
        }
        if !response.status().is_success() {
            return Err(DirectoryError::Transport);
        }
        let member: GuildMemberWire = response
            .json()
            .await
            .map_err(|_| DirectoryError::Transport)?;
        Ok(MemberLookup::Found {
            role_ids: member.roles,
        })
    }

    async fn list_members(
        &self,
        after: Option<&str>,
        limit: u32,
    ) -> Result<Vec<GuildMemberSummary>, DirectoryError> {
        let token = self.bot_token()?;
        let runtime = &self.state.runtime;
        let mut url = format!(
            "{}/guilds/{}/members?limit={limit}",
            runtime.discord_api_base, runtime.discord_guild_id
        );
        if let Some(after) = after {
            url.push_str("&after=");
            url.push_str(after);
        }
        let response = self
            .state
            .http_client
            .get(url)
            .header("Authorization", format!("Bot {token}"))
            .send()
            .await
            .map_err(|_| DirectoryError::Transport)?;
        if !response.status().is_success() {
            return Err(DirectoryError::Transport);
        }
        let members: Vec<GuildMemberWire> = response
            .json()
            .await
            .map_err(|_| DirectoryError::Transport)?;
        Ok(members
            .into_iter()
            .map(|member| GuildMemberSummary {
                display_name: member
                    .nick
                    .unwrap_or_else(|| member.user.display_name()),
                user_id: member.user.id,
                role_ids: member.roles,
            })
            .collect())
    }

    async fn timeout_member(
        &self,
        user_id: &str,
        until_unix: i64,
        reason: &str,
    ) -> Result<(), DirectoryError> {
        let token = self.bot_token()?;
        let until = DateTime::<Utc>::from_timestamp(until_unix, 0)
            .ok_or(DirectoryError::Transport)?
            .to_rfc3339();
        let response = self
            .state
            .http_client
            .patch(self.member_url(user_id))
            .header("Authorization", format!("Bot {token}"))
            .header("X-Audit-Log-Reason", reason)
            .json(&serde_json::json!({ "communication_disabled_until": until }))
            .send()
            .await
            .map_err(|_| DirectoryError::Transport)?;
        if !response.status().is_success() {
            return Err(DirectoryError::Transport);
        }
        Ok(())
    }

    async fn kick_member(&self, user_id: &str, reason: &str) -> Result<(), DirectoryError> {
        let token = self.bot_token()?;
        let response = self
            .state
            .http_client
            .delete(self.member_url(user_id))
            .header("Authorization", format!("Bot {token}"))
            .header("X-Audit-Log-Reason", reason)
            .send()
            .await
            .map_err(|_| DirectoryError::Transport)?;
        if !response.status().is_success() {
            return Err(DirectoryError::Transport);
        }
        Ok(())
    }

    async fn ban_member(&self, user_id: &str, reason: &str) -> Result<(), DirectoryError> {
        let token = self.bot_token()?;
        let runtime = &self.state.runtime;
        let url = format!(
            "{}/guilds/{}/bans/{user_id}",
            runtime.discord_api_base, runtime.discord_guild_id
        );
        let response = self
            .state
            .http_client
            .put(url)
            .header("Authorization", format!("Bot {token}"))
            .header("X-Audit-Log-Reason", reason)
            .json(&serde_json::json!({ "delete_message_seconds": 0 }))
            .send()
            .await
            .map_err(|_| DirectoryError::Transport)?;
        if !response.status().is_success() {
            return Err(DirectoryError::Transport);
        }
        Ok(())
    }
}

pub(crate) struct InMemoryGuildDirectory<'a> {
    state: &'a AppState,
}

impl<'a> InMemoryGuildDirectory<'a> {
    pub(crate) fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn check_outage(&self) -> Result<(), DirectoryError> {
        if self.state.directory_outage.load(Ordering::Relaxed) {
            return Err(DirectoryError::Transport);
        }
        Ok(())
    }
}

impl GuildLookup for InMemoryGuildDirectory<'_> {
    async fn exchange_code(&self, code: &str) -> Result<DiscordIdentity, DirectoryError> {
        self.check_outage()?;
        self.state
            .directory_codes
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or(DirectoryError::RejectedCode)
    }

    async fn fetch_member(&self, user_id: &str) -> Result<MemberLookup, DirectoryError> {
        self.check_outage()?;
        let members = self.state.directory_members.read().await;
        Ok(members.get(user_id).map_or(MemberLookup::NotInGuild, |member| {
            MemberLookup::Found {
                role_ids: member.role_ids.clone(),
            }
        }))
    }

    async fn list_members(
        &self,
        after: Option<&str>,
        limit: u32,
    ) -> Result<Vec<GuildMemberSummary>, DirectoryError> {
        self.check_outage()?;
        let members = self.state.directory_members.read().await;
        let mut summaries: Vec<GuildMemberSummary> = members
            .iter()
            .filter(|(user_id, _)| after.is_none_or(|cursor| user_id.as_str() > cursor))
            .map(|(user_id, member)| GuildMemberSummary {
                user_id: user_id.clone(),
                display_name: member.display_name.clone(),
                role_ids: member.role_ids.clone(),
            })
            .collect();
        summaries.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        summaries.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(summaries)
    }

    async fn timeout_member(
        &self,
        user_id: &str,
        until_unix: i64,
        reason: &str,
    ) -> Result<(), DirectoryError> {
        self.check_outage()?;
        self.state
            .moderation_log
            .write()
            .await
            .push(ModerationAction::Timeout {
                user_id: user_id.to_owned(),
                until_unix,
                reason: reason.to_owned(),
            });
        Ok(())
    }

    async fn kick_member(&self, user_id: &str, reason: &str) -> Result<(), DirectoryError> {
        self.check_outage()?;
        self.state.directory_members.write().await.remove(user_id);
        self.state
            .moderation_log
            .write()
            .await
            .push(ModerationAction::Kick {
                user_id: user_id.to_owned(),
                reason: reason.to_owned(),
            });
        Ok(())
    }

    async fn ban_member(&self, user_id: &str, reason: &str) -> Result<(), DirectoryError> {
        self.check_outage()?;
        self.state.directory_members.write().await.remove(user_id);
        self.state
            .moderation_log
            .write()
            .await
            .push(ModerationAction::Ban {
                user_id: user_id.to_owned(),
                reason: reason.to_owned(),
            });
        Ok(())
    }
}

pub(crate) enum GuildDirectory<'a> {
    Http(HttpGuildDirectory<'a>),
    InMemory(InMemoryGuildDirectory<'a>),
}

impl GuildDirectory<'_> {
    pub(crate) fn from_state(state: &AppState) -> GuildDirectory<'_> {
        if state.runtime.discord_bot_token.is_some() {
            GuildDirectory::Http(HttpGuildDirectory::new(state))
        } else {
            GuildDirectory::InMemory(InMemoryGuildDirectory::new(state))
        }
    }
}

impl GuildLookup for GuildDirectory<'_> {
    async fn exchange_code(&self, code: &str) -> Result<DiscordIdentity, DirectoryError> {
        match self {
            Self::Http(directory) => directory.exchange_code(code).await,
            Self::InMemory(directory) => directory.exchange_code(code).await,
        }
    }

    async fn fetch_member(&self, user_id: &str) -> Result<MemberLookup, DirectoryError> {
        match self {
            Self::Http(directory) => directory.fetch_member(user_id).await,
            Self::InMemory(directory) => directory.fetch_member(user_id).await,
        }
    }

    async fn list_members(
        &self,
        after: Option<&str>,
        limit: u32,
    ) -> Result<Vec<GuildMemberSummary>, DirectoryError> {
        match self {
            Self::Http(directory) => directory.list_members(after, limit).await,
            Self::InMemory(directory) => directory.list_members(after, limit).await,
        }
    }

    async fn timeout_member(
        &self,
        user_id: &str,
        until_unix: i64,
        reason: &str,
    ) -> Result<(), DirectoryError> {
        match self {
            Self::Http(directory) => directory.timeout_member(user_id, until_unix, reason).await,
            Self::InMemory(directory) => {
                directory.timeout_member(user_id, until_unix, reason).await
            }
        }
    }

    async fn kick_member(&self, user_id: &str, reason: &str) -> Result<(), DirectoryError> {
        match self {
            Self::Http(directory) => directory.kick_member(user_id, reason).await,
            Self::InMemory(directory) => directory.kick_member(user_id, reason).await,
        }
    }

    async fn ban_member(&self, user_id: &str, reason: &str) -> Result<(), DirectoryError> {
        match self {
            Self::Http(directory) => directory.ban_member(user_id, reason).await,
            Self::InMemory(directory) => directory.ban_member(user_id, reason).await,
        }
    }
}
