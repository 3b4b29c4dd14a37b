#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::TempDir;
use tokio::sync::mpsc;

use paperflow::db::DbPool;
use paperflow::domain::{Actor, Agreements, Author, ManuscriptInput, PaperType, Role};
use paperflow::notify::{Notification, NotificationKind, Notifier, NotifyError};
use paperflow::storage::LocalFileStore;
use paperflow::workflow::{Conference, NewConference, NewMember, SerialGenerator};
use paperflow::Workflow;

pub const YEAR: i32 = 2025;
pub const TRACK: &str = "Systems";

/// Forwards every notification into a channel the test can read.
pub struct RecordingNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let _ = self.tx.send(notification.clone());
        Ok(())
    }
}

pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Other("relay unavailable".to_string()))
    }
}

/// Hands out queued serials first, then falls back to a counter.
pub struct ScriptedSerials {
    queue: Mutex<VecDeque<String>>,
    counter: Mutex<u32>,
}

impl ScriptedSerials {
    pub fn new(serials: &[&str]) -> Self {
        Self {
            queue: Mutex::new(serials.iter().map(|s| s.to_string()).collect()),
            counter: Mutex::new(0),
        }
    }
}

impl SerialGenerator for ScriptedSerials {
    fn candidate(&self, _now: DateTime<Utc>) -> String {
        if let Some(next) = self.queue.lock().unwrap().pop_front() {
            return next;
        }
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        format!("20250101000000-{:06X}", *counter)
    }
}

pub struct Fixture {
    pub wf: Workflow,
    pub chief: Actor,
    pub editor: Actor,
    pub author: Actor,
    pub other_author: Actor,
    pub reviewers: Vec<Actor>,
    pub conference: Conference,
    pub inbox: mpsc::UnboundedReceiver<Notification>,
    pub uploads: TempDir,
    /// Holds the database file for fixtures built with [`fixture_on_disk`].
    pub db_dir: Option<TempDir>,
}

pub async fn fixture() -> Fixture {
    let (tx, inbox) = mpsc::unbounded_channel();
    let pool = paperflow::db::create_memory_pool().await.unwrap();
    build(pool, Arc::new(RecordingNotifier { tx }), inbox, None).await
}

pub async fn fixture_with_notifier(notifier: Arc<dyn Notifier>) -> Fixture {
    let (_tx, inbox) = mpsc::unbounded_channel();
    let pool = paperflow::db::create_memory_pool().await.unwrap();
    build(pool, notifier, inbox, None).await
}

pub async fn fixture_with_serials(serials: ScriptedSerials) -> Fixture {
    let (tx, inbox) = mpsc::unbounded_channel();
    let pool = paperflow::db::create_memory_pool().await.unwrap();
    build(pool, Arc::new(RecordingNotifier { tx }), inbox, Some(serials)).await
}

/// Same setup on a file database with several pooled connections, so
/// concurrent calls really run side by side.
pub async fn fixture_on_disk() -> Fixture {
    let (tx, inbox) = mpsc::unbounded_channel();
    let db_dir = TempDir::new().unwrap();
    let url = format!("sqlite://{}", db_dir.path().join("paperflow.db").display());
    let pool = paperflow::db::create_pool(&url, 4).await.unwrap();
    paperflow::db::run_migrations(&pool).await.unwrap();

    let mut fx = build(pool, Arc::new(RecordingNotifier { tx }), inbox, None).await;
    fx.db_dir = Some(db_dir);
    fx
}

async fn build(
    pool: DbPool,
    notifier: Arc<dyn Notifier>,
    inbox: mpsc::UnboundedReceiver<Notification>,
    serials: Option<ScriptedSerials>,
) -> Fixture {
    let uploads = TempDir::new().unwrap();
    let files = Arc::new(LocalFileStore::new(uploads.path()));
    let mut wf = Workflow::new(pool, files, notifier);
    if let Some(serials) = serials {
        wf = wf.with_serial_generator(Arc::new(serials));
    }

    let chief = wf
        .bootstrap_chief_editor("Grace Chief", "chief@example.org")
        .await
        .unwrap()
        .unwrap();
    let chief = wf.resolve_actor(&chief.id).await.unwrap().unwrap();

    let editor = member(&wf, &chief, "Eddie Editor", "editor@example.org", &[Role::Editor]).await;
    let author = member(&wf, &chief, "Ada Author", "ada@example.org", &[Role::Author]).await;
    let other_author =
        member(&wf, &chief, "Bob Author", "bob@example.org", &[Role::Author]).await;
    let mut reviewers = Vec::new();
    for i in 1..=4 {
        reviewers.push(
            member(
                &wf,
                &chief,
                &format!("Reviewer {i}"),
                &format!("r{i}@example.org"),
                &[Role::Reviewer],
            )
            .await,
        );
    }

    let conference = wf
        .register_conference(
            &chief,
            NewConference {
                name: "Systems Conference 2025".to_string(),
                year: YEAR,
                tracks: vec![TRACK.to_string(), "Theory".to_string()],
                is_active: true,
            },
        )
        .await
        .unwrap();

    Fixture {
        wf,
        chief,
        editor,
        author,
        other_author,
        reviewers,
        conference,
        inbox,
        uploads,
        db_dir: None,
    }
}

pub async fn member(wf: &Workflow, by: &Actor, name: &str, email: &str, roles: &[Role]) -> Actor {
    let member = wf
        .register_member(
            by,
            NewMember {
                name: name.to_string(),
                email: email.to_string(),
                roles: roles.to_vec(),
            },
        )
        .await
        .unwrap();
    wf.resolve_actor(&member.id).await.unwrap().unwrap()
}

pub fn ada() -> Author {
    Author {
        name: "Ada Author".to_string(),
        email: "ada@example.org".to_string(),
        affiliation: Some("Analytical Engines Ltd".to_string()),
        is_corresponding: true,
    }
}

pub fn coauthor(name: &str, email: &str) -> Author {
    Author {
        name: name.to_string(),
        email: email.to_string(),
        affiliation: None,
        is_corresponding: false,
    }
}

/// A manuscript that passes every submission check.
pub fn complete_input(conference: &Conference) -> ManuscriptInput {
    ManuscriptInput {
        conference_id: conference.id.clone(),
        title: "Deterministic Replay for Distributed Logs".to_string(),
        abstract_text: "We show how to replay logs.\n\nDetails follow.".to_string(),
        track: TRACK.to_string(),
        paper_type: PaperType::Regular,
        keywords: vec!["replay".to_string(), "logs".to_string()],
        authors: vec![ada(), coauthor("Carol Co", "carol@example.org")],
        agreements: Agreements::all(),
    }
}

/// Waits for the next notification, failing the test after a second.
pub async fn next_notification(
    inbox: &mut mpsc::UnboundedReceiver<Notification>,
) -> Notification {
    tokio::time::timeout(Duration::from_secs(1), inbox.recv())
        .await
        .expect("no notification within a second")
        .expect("notification channel closed")
}

/// Skips notifications of other kinds until one of `kind` arrives.
pub async fn next_of_kind(
    inbox: &mut mpsc::UnboundedReceiver<Notification>,
    kind: NotificationKind,
) -> Notification {
    loop {
        let note = next_notification(inbox).await;
        if note.kind == kind {
            return note;
        }
    }
}

pub fn pdf_bytes() -> Vec<u8> {
    b"%PDF-1.4\n1 0 obj << >> endobj\ntrailer << >>\n%%EOF\n".to_vec()
}
