use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use super::Workflow;
use crate::db;
use crate::domain::{is_valid_email, Actor, Role, MANAGEMENT};
use crate::error::{Result, WorkflowError};

#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub id: String,
    pub name: String,
    pub email: String,
    pub roles: BTreeSet<Role>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMember {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub roles: Vec<Role>,
}

async fn load_member(conn: &mut SqliteConnection, id: &str) -> Result<Member> {
    let user = db::find_user(conn, id)
        .await?
        .ok_or_else(|| WorkflowError::not_found(format!("Member {}", id)))?;
    let roles = db::user_roles(conn, id).await?;
    Ok(Member {
        id: user.id,
        name: user.name,
        email: user.email,
        roles: roles.into_iter().collect(),
        created_at: user.created_at,
    })
}

/// Inserts a member after checking the email is well-formed and unused.
async fn insert_member(conn: &mut SqliteConnection, input: &NewMember) -> Result<Member> {
    let name = input.name.trim();
    let email = input.email.trim().to_lowercase();
    if name.is_empty() {
        return Err(WorkflowError::validation("Member name is required"));
    }
    if !is_valid_email(&email) {
        return Err(WorkflowError::validation(format!("Invalid email: {}", input.email)));
    }
    if db::email_taken(conn, &email).await? {
        return Err(WorkflowError::policy(format!(
            "A member with email {} already exists",
            email
        )));
    }

    let id = Uuid::new_v4().to_string();
    db::insert_user(conn, &id, name, &email, Utc::now()).await?;
    db::replace_roles(conn, &id, &input.roles).await?;
    load_member(conn, &id).await
}

/// Fails when `member` is the only CHIEF_EDITOR left.
async fn ensure_not_last_chief_editor(conn: &mut SqliteConnection, member: &Member) -> Result<()> {
    if member.roles.contains(&Role::ChiefEditor)
        && db::count_role_holders(conn, Role::ChiefEditor).await? <= 1
    {
        return Err(WorkflowError::policy(
            "At least one chief editor must remain",
        ));
    }
    Ok(())
}

impl Workflow {
    /// Open registration. New members are authors.
    pub async fn sign_up(&self, name: &str, email: &str) -> Result<Member> {
        let input = NewMember {
            name: name.to_string(),
            email: email.to_string(),
            roles: vec![Role::Author],
        };
        let mut tx = db::begin_write(&self.pool).await?;
        let member = insert_member(&mut tx, &input).await?;
        tx.commit().await?;
        info!("Member {} signed up", member.id);
        Ok(member)
    }

    pub async fn register_member(&self, actor: &Actor, input: NewMember) -> Result<Member> {
        actor.require_any(MANAGEMENT, "Registering a member")?;
        if input.roles.contains(&Role::ChiefEditor) {
            actor.require_any(&[Role::ChiefEditor], "Granting CHIEF_EDITOR")?;
        }
        let mut tx = db::begin_write(&self.pool).await?;
        let member = insert_member(&mut tx, &input).await?;
        tx.commit().await?;
        info!("Member {} registered by {} with roles {:?}", member.id, actor.id, member.roles);
        Ok(member)
    }

    /// Replaces a member's role set in one transaction.
    pub async fn set_roles(
        &self,
        actor: &Actor,
        member_id: &str,
        roles: &[Role],
    ) -> Result<Member> {
        actor.require_any(MANAGEMENT, "Changing member roles")?;

        let mut tx = db::begin_write(&self.pool).await?;
        let member = load_member(&mut tx, member_id).await?;
        let keeps_chief = roles.contains(&Role::ChiefEditor);
        let had_chief = member.roles.contains(&Role::ChiefEditor);

        if keeps_chief != had_chief {
            actor.require_any(&[Role::ChiefEditor], "Granting or revoking CHIEF_EDITOR")?;
        }
        if had_chief && !keeps_chief {
            ensure_not_last_chief_editor(&mut tx, &member).await?;
        }

        db::replace_roles(&mut tx, member_id, roles).await?;
        let member = load_member(&mut tx, member_id).await?;
        tx.commit().await?;

        info!("Roles of {} set to {:?} by {}", member_id, member.roles, actor.id);
        Ok(member)
    }

    pub async fn delete_member(&self, actor: &Actor, member_id: &str) -> Result<()> {
        actor.require_any(MANAGEMENT, "Deleting a member")?;

        let mut tx = db::begin_write(&self.pool).await?;
        let member = load_member(&mut tx, member_id).await?;
        if member.roles.contains(&Role::ChiefEditor) {
            actor.require_any(&[Role::ChiefEditor], "Deleting a chief editor")?;
            ensure_not_last_chief_editor(&mut tx, &member).await?;
        }
        if db::user_history_count(&mut tx, member_id).await? > 0 {
            return Err(WorkflowError::policy(format!(
                "Member {} has submissions, assignments or decisions on record",
                member_id
            )));
        }
        db::delete_user(&mut tx, member_id).await?;
        tx.commit().await?;

        info!("Member {} deleted by {}", member_id, actor.id);
        Ok(())
    }

    /// Creates the first chief editor when none exists. Returns `None` if one
    /// is already present.
    pub async fn bootstrap_chief_editor(&self, name: &str, email: &str) -> Result<Option<Member>> {
        let mut tx = db::begin_write(&self.pool).await?;
        if db::count_role_holders(&mut tx, Role::ChiefEditor).await? > 0 {
            return Ok(None);
        }
        let input = NewMember {
            name: name.to_string(),
            email: email.to_string(),
            roles: vec![Role::ChiefEditor, Role::Editor],
        };
        let member = insert_member(&mut tx, &input).await?;
        tx.commit().await?;
        info!("Bootstrapped chief editor {}", member.email);
        Ok(Some(member))
    }

    pub async fn member(&self, member_id: &str) -> Result<Member> {
        let mut conn = self.pool.acquire().await?;
        load_member(&mut conn, member_id).await
    }

    /// Resolves an authenticated member id into an [`Actor`].
    pub async fn resolve_actor(&self, member_id: &str) -> Result<Option<Actor>> {
        let mut conn = self.pool.acquire().await?;
        if db::find_user(&mut conn, member_id).await?.is_none() {
            return Ok(None);
        }
        let roles = db::user_roles(&mut conn, member_id).await?;
        Ok(Some(Actor::new(member_id, roles)))
    }
}
