use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::info;
use uuid::Uuid;

use super::Workflow;
use crate::db::{self, parse_string_list, ConferenceRow};
use crate::domain::{Actor, MANAGEMENT};
use crate::error::{Result, WorkflowError};

#[derive(Debug, Clone, Serialize)]
pub struct Conference {
    pub id: String,
    pub name: String,
    pub year: i32,
    pub is_active: bool,
    pub tracks: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ConferenceRow> for Conference {
    fn from(row: ConferenceRow) -> Self {
        Conference {
            tracks: parse_string_list(&row.tracks),
            id: row.id,
            name: row.name,
            year: row.year,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

impl Conference {
    /// An empty track list means the conference does not use tracks.
    pub fn has_track(&self, track: &str) -> bool {
        self.tracks.is_empty() || self.tracks.iter().any(|t| t == track)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewConference {
    pub name: String,
    pub year: i32,
    #[serde(default)]
    pub tracks: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// The conference a manuscript is filed under, checked for intake.
/// A blank track passes; it is only required at submission time.
pub(crate) async fn open_conference(
    conn: &mut SqliteConnection,
    conference_id: &str,
    track: &str,
) -> Result<Conference> {
    let conference: Conference = db::find_conference(conn, conference_id)
        .await?
        .ok_or_else(|| WorkflowError::not_found(format!("Conference {}", conference_id)))?
        .into();

    if !conference.is_active {
        return Err(WorkflowError::validation(format!(
            "{} is not accepting submissions",
            conference.name
        )));
    }
    if !track.trim().is_empty() && !conference.has_track(track) {
        return Err(WorkflowError::validation(format!(
            "Track '{}' does not exist in {}",
            track, conference.name
        )));
    }
    Ok(conference)
}

impl Workflow {
    pub async fn register_conference(
        &self,
        actor: &Actor,
        input: NewConference,
    ) -> Result<Conference> {
        actor.require_any(MANAGEMENT, "Registering a conference")?;
        if input.name.trim().is_empty() {
            return Err(WorkflowError::validation("Conference name is required"));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut tx = db::begin_write(&self.pool).await?;
        if db::conference_by_year(&mut tx, input.year).await?.is_some() {
            return Err(WorkflowError::policy(format!(
                "A conference is already registered for {}",
                input.year
            )));
        }
        db::insert_conference(
            &mut tx,
            &id,
            input.name.trim(),
            input.year,
            input.is_active,
            &input.tracks,
            now,
        )
        .await?;
        let conference = db::find_conference(&mut tx, &id)
            .await?
            .ok_or_else(|| WorkflowError::not_found(format!("Conference {}", id)))?;
        tx.commit().await?;

        info!("Registered conference {} for {}", input.name, input.year);
        Ok(conference.into())
    }

    pub async fn conference_for_year(&self, year: i32) -> Result<Conference> {
        let mut conn = self.pool.acquire().await?;
        db::conference_by_year(&mut conn, year)
            .await?
            .map(Conference::from)
            .ok_or_else(|| WorkflowError::not_found(format!("Conference for {}", year)))
    }

    pub async fn set_conference_active(&self, actor: &Actor, id: &str, active: bool) -> Result<()> {
        actor.require_any(MANAGEMENT, "Opening or closing a conference")?;
        let mut conn = self.pool.acquire().await?;
        if !db::set_conference_active(&mut conn, id, active).await? {
            return Err(WorkflowError::not_found(format!("Conference {}", id)));
        }
        info!("Conference {} active: {}", id, active);
        Ok(())
    }
}
