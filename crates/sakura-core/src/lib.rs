#![forbid(unsafe_code)]

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Returns the project code name.
#[must_use]
pub const fn project_name() -> &'static str {
    "sakura-board"
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("user id is invalid")]
    InvalidUserId,
    #[error("display name is invalid")]
    InvalidDisplayName,
    #[error("role is invalid")]
    InvalidRole,
    #[error("approval status is invalid")]
    InvalidApproval,
    #[error("tag label is invalid")]
    InvalidTagLabel,
    #[error("color is invalid")]
    InvalidColor,
    #[error("card title is invalid")]
    InvalidCardTitle,
    #[error("column title is invalid")]
    InvalidColumnTitle,
}

/// Discord snowflake identifier. Treated as an opaque digit string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if !(1..=32).contains(&value.len()) {
            return Err(DomainError::InvalidUserId);
        }
        if value.chars().all(|c| c.is_ascii_digit()) {
            return Ok(Self(value));
        }
        Err(DomainError::InvalidUserId)
    }
}

impl core::fmt::Display for UserId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DisplayName(String);

impl DisplayName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DisplayName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if !(1..=100).contains(&value.len()) || value.contains('\0') {
            return Err(DomainError::InvalidDisplayName);
        }
        Ok(Self(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagLabel(String);

impl TagLabel {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TagLabel {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_title(&value, 1, 64).map_err(|_| DomainError::InvalidTagLabel)?;
        Ok(Self(value))
    }
}

/// Hex color in `#rrggbb` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HexColor(String);

impl HexColor {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for HexColor {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let rest = value.strip_prefix('#').ok_or(DomainError::InvalidColor)?;
        if rest.len() == 6 && rest.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(Self(value));
        }
        Err(DomainError::InvalidColor)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CardTitle(String);

impl CardTitle {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CardTitle {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_title(&value, 1, 256).map_err(|_| DomainError::InvalidCardTitle)?;
        Ok(Self(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnTitle(String);

impl ColumnTitle {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ColumnTitle {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_title(&value, 1, 128).map_err(|_| DomainError::InvalidColumnTitle)?;
        Ok(Self(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationRole {
    Viewer,
    Editor,
    Admin,
}

impl ApplicationRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Viewer => "viewer",
            Self::Editor => "editor",
            Self::Admin => "admin",
        }
    }
}

impl TryFrom<String> for ApplicationRole {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "viewer" => Ok(Self::Viewer),
            "editor" => Ok(Self::Editor),
            "admin" => Ok(Self::Admin),
            _ => Err(DomainError::InvalidRole),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
}

impl ApprovalStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
        }
    }
}

impl TryFrom<String> for ApprovalStatus {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            _ => Err(DomainError::InvalidApproval),
        }
    }
}

/// Per-user deletion switches. Only consulted for editors; admins bypass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorPermissions {
    pub can_delete_columns: bool,
    pub can_delete_cards: bool,
}

impl Default for EditorPermissions {
    fn default() -> Self {
        Self {
            can_delete_columns: true,
            can_delete_cards: true,
        }
    }
}

/// Outcome of a guild membership lookup that completed. Transport failures
/// never reach this type; callers propagate those without touching state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberLookup {
    Found { role_ids: Vec<String> },
    NotInGuild,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDecision {
    pub role: ApplicationRole,
    pub approval: ApprovalStatus,
    pub cached_role_ids: Vec<String>,
}

/// Reconciles a completed membership lookup with previously stored state.
///
/// An admin guild role forces `(admin, approved)` over any prior value. A
/// member without one keeps the prior values verbatim (first login defaults
/// to `(viewer, pending)`). Confirmed absence empties the role cache and
/// demotes `(admin, approved)` to `(viewer, pending)`; all other states
/// survive the absence unchanged.
#[must_use]
pub fn reconcile_membership(
    prior: Option<(ApplicationRole, ApprovalStatus)>,
    lookup: &MemberLookup,
    admin_role_ids: &HashSet<String>,
) -> RoleDecision {
    let (prior_role, prior_approval) =
        prior.unwrap_or((ApplicationRole::Viewer, ApprovalStatus::Pending));

    match lookup {
        MemberLookup::Found { role_ids } => {
            if role_ids.iter().any(|id| admin_role_ids.contains(id)) {
                return RoleDecision {
                    role: ApplicationRole::Admin,
                    approval: ApprovalStatus::Approved,
                    cached_role_ids: role_ids.clone(),
                };
            }
            RoleDecision {
                role: prior_role,
                approval: prior_approval,
                cached_role_ids: role_ids.clone(),
            }
        }
        MemberLookup::NotInGuild => {
            let demote = matches!(prior_role, ApplicationRole::Admin)
                && matches!(prior_approval, ApprovalStatus::Approved);
            let (role, approval) = if demote {
                (ApplicationRole::Viewer, ApprovalStatus::Pending)
            } else {
                (prior_role, prior_approval)
            };
            RoleDecision {
                role,
                approval,
                cached_role_ids: Vec::new(),
            }
        }
    }
}

/// True when the actor may see a card. An empty viewer allow-list leaves the
/// card visible to every approved user; admins bypass the list entirely.
#[must_use]
pub fn can_view_card(
    role: ApplicationRole,
    approval: ApprovalStatus,
    actor_id: &UserId,
    allowed_viewer_ids: &[UserId],
) -> bool {
    if !matches!(approval, ApprovalStatus::Approved) {
        return false;
    }
    if matches!(role, ApplicationRole::Admin) {
        return true;
    }
    allowed_viewer_ids.is_empty() || allowed_viewer_ids.contains(actor_id)
}

/// True when the actor may change a card's content. Viewers never edit,
/// regardless of allow-lists.
#[must_use]
pub fn can_edit_card(
    role: ApplicationRole,
    approval: ApprovalStatus,
    actor_id: &UserId,
    allowed_editor_ids: &[UserId],
) -> bool {
    if !matches!(approval, ApprovalStatus::Approved) {
        return false;
    }
    match role {
        ApplicationRole::Admin => true,
        ApplicationRole::Viewer => false,
        ApplicationRole::Editor => {
            allowed_editor_ids.is_empty() || allowed_editor_ids.contains(actor_id)
        }
    }
}

/// Card deletion layers the per-user switch on top of edit access.
#[must_use]
pub fn can_delete_card(
    role: ApplicationRole,
    approval: ApprovalStatus,
    actor_id: &UserId,
    allowed_editor_ids: &[UserId],
    permissions: EditorPermissions,
) -> bool {
    if !can_edit_card(role, approval, actor_id, allowed_editor_ids) {
        return false;
    }
    matches!(role, ApplicationRole::Admin) || permissions.can_delete_cards
}

#[must_use]
pub fn can_delete_column(
    role: ApplicationRole,
    approval: ApprovalStatus,
    permissions: EditorPermissions,
) -> bool {
    if !matches!(approval, ApprovalStatus::Approved) {
        return false;
    }
    match role {
        ApplicationRole::Admin => true,
        ApplicationRole::Viewer => false,
        ApplicationRole::Editor => permissions.can_delete_columns,
    }
}

fn validate_title(value: &str, min: usize, max: usize) -> Result<(), DomainError> {
    if !(min..=max).contains(&value.len()) {
        return Err(DomainError::InvalidCardTitle);
    }
    if value.contains('\0') || value.trim().is_empty() {
        return Err(DomainError::InvalidCardTitle);
    }
    Ok(())
}
