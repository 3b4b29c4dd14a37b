use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkflowError};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "TEXT", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Author,
    Reviewer,
    Editor,
    ChiefEditor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Author => "AUTHOR",
            Self::Reviewer => "REVIEWER",
            Self::Editor => "EDITOR",
            Self::ChiefEditor => "CHIEF_EDITOR",
            Self::Admin => "ADMIN",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Roles allowed to run editorial transitions (assignment, decisions).
pub const EDITORIAL: &[Role] = &[Role::Editor, Role::ChiefEditor];

/// Roles allowed to manage members and conferences.
pub const MANAGEMENT: &[Role] = &[Role::Admin, Role::ChiefEditor];

/// An authenticated caller. Every workflow operation receives one explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: String,
    pub roles: BTreeSet<Role>,
}

impl Actor {
    pub fn new(id: impl Into<String>, roles: impl IntoIterator<Item = Role>) -> Self {
        Self {
            id: id.into(),
            roles: roles.into_iter().collect(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.roles.contains(r))
    }

    pub fn is_editorial(&self) -> bool {
        self.has_any(EDITORIAL)
    }

    /// Fails closed unless the actor holds at least one of `roles`.
    pub fn require_any(&self, roles: &[Role], action: &str) -> Result<()> {
        if self.has_any(roles) {
            return Ok(());
        }
        let wanted = roles
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(" or ");
        Err(WorkflowError::permission(format!(
            "{} requires role {}",
            action, wanted
        )))
    }
}
