use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::models::{
    encode_string_list, parse_string_list, AuthorRow, DraftRow, FileRow, SubmissionRow,
};
use super::reviews::{load_assignments, load_decisions};
use crate::domain::{Author, Draft, FileAsset, ListScope, Submission, SubmissionQuery, SubmissionSummary};

/// Which side of the draft/submission split a child row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Draft,
    Submission,
}

impl Owner {
    fn authors_table(self) -> &'static str {
        match self {
            Self::Draft => "draft_authors",
            Self::Submission => "submission_authors",
        }
    }

    fn files_table(self) -> &'static str {
        match self {
            Self::Draft => "draft_files",
            Self::Submission => "submission_files",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Draft => "draft_id",
            Self::Submission => "submission_id",
        }
    }
}

// =========================================================================
// Authors and files
// =========================================================================

pub async fn replace_authors(
    conn: &mut SqliteConnection,
    owner: Owner,
    owner_id: &str,
    authors: &[Author],
) -> Result<(), sqlx::Error> {
    sqlx::query(&format!(
        "DELETE FROM {} WHERE {} = $1",
        owner.authors_table(),
        owner.key()
    ))
    .bind(owner_id)
    .execute(&mut *conn)
    .await?;

    let insert = format!(
        "INSERT INTO {} ({}, position, name, email, affiliation, is_corresponding) \
         VALUES ($1, $2, $3, $4, $5, $6)",
        owner.authors_table(),
        owner.key()
    );
    for (position, author) in authors.iter().enumerate() {
        sqlx::query(&insert)
            .bind(owner_id)
            .bind(position as i64)
            .bind(author.name.trim())
            .bind(author.email.trim())
            .bind(&author.affiliation)
            .bind(author.is_corresponding)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn load_authors(
    conn: &mut SqliteConnection,
    owner: Owner,
    owner_id: &str,
) -> Result<Vec<Author>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AuthorRow>(&format!(
        "SELECT name, email, affiliation, is_corresponding FROM {} WHERE {} = $1 ORDER BY position",
        owner.authors_table(),
        owner.key()
    ))
    .bind(owner_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(Author::from).collect())
}

pub async fn insert_file(
    conn: &mut SqliteConnection,
    owner: Owner,
    owner_id: &str,
    file: &FileAsset,
) -> Result<(), sqlx::Error> {
    sqlx::query(&format!(
        "INSERT INTO {} ({}, kind, version, path, checksum, size, mime, uploaded_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        owner.files_table(),
        owner.key()
    ))
    .bind(owner_id)
    .bind(file.kind)
    .bind(file.version)
    .bind(&file.path)
    .bind(&file.checksum)
    .bind(file.size)
    .bind(&file.mime)
    .bind(file.uploaded_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn load_files(
    conn: &mut SqliteConnection,
    owner: Owner,
    owner_id: &str,
) -> Result<Vec<FileAsset>, sqlx::Error> {
    let rows = sqlx::query_as::<_, FileRow>(&format!(
        "SELECT kind, version, path, checksum, size, mime, uploaded_at FROM {} \
         WHERE {} = $1 ORDER BY kind, version",
        owner.files_table(),
        owner.key()
    ))
    .bind(owner_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(FileAsset::from).collect())
}

// =========================================================================
// Drafts
// =========================================================================

pub async fn insert_draft(conn: &mut SqliteConnection, draft: &Draft) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO drafts (id, conference_id, created_by, title, abstract, track, paper_type,
                            keywords, agreed_original_work, agreed_not_under_review,
                            agreed_consent_to_publish, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(&draft.id)
    .bind(&draft.conference_id)
    .bind(&draft.created_by)
    .bind(&draft.title)
    .bind(&draft.abstract_text)
    .bind(&draft.track)
    .bind(draft.paper_type)
    .bind(encode_string_list(&draft.keywords))
    .bind(draft.agreements.original_work)
    .bind(draft.agreements.not_under_review_elsewhere)
    .bind(draft.agreements.consent_to_publish)
    .bind(draft.created_at)
    .bind(draft.updated_at)
    .execute(&mut *conn)
    .await?;
    replace_authors(conn, Owner::Draft, &draft.id, &draft.authors).await
}

pub async fn update_draft(conn: &mut SqliteConnection, draft: &Draft) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE drafts
        SET title = $2, abstract = $3, track = $4, paper_type = $5, keywords = $6,
            agreed_original_work = $7, agreed_not_under_review = $8,
            agreed_consent_to_publish = $9, updated_at = $10
        WHERE id = $1
        "#,
    )
    .bind(&draft.id)
    .bind(&draft.title)
    .bind(&draft.abstract_text)
    .bind(&draft.track)
    .bind(draft.paper_type)
    .bind(encode_string_list(&draft.keywords))
    .bind(draft.agreements.original_work)
    .bind(draft.agreements.not_under_review_elsewhere)
    .bind(draft.agreements.consent_to_publish)
    .bind(draft.updated_at)
    .execute(&mut *conn)
    .await?;
    replace_authors(conn, Owner::Draft, &draft.id, &draft.authors).await
}

pub async fn find_draft(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Draft>, sqlx::Error> {
    let Some(row) = sqlx::query_as::<_, DraftRow>("SELECT * FROM drafts WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let authors = load_authors(conn, Owner::Draft, &row.id).await?;
    let files = load_files(conn, Owner::Draft, &row.id).await?;
    let agreements = row.agreements();

    Ok(Some(Draft {
        id: row.id,
        conference_id: row.conference_id,
        created_by: row.created_by,
        title: row.title,
        abstract_text: row.abstract_text,
        track: row.track,
        paper_type: row.paper_type,
        keywords: parse_string_list(&row.keywords),
        agreements,
        authors,
        files,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

pub async fn delete_draft(conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM drafts WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

// =========================================================================
// Submissions
// =========================================================================

/// Id of the submission a draft was promoted into, if any.
pub async fn submission_for_draft(
    conn: &mut SqliteConnection,
    draft_id: &str,
) -> Result<Option<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT id FROM submissions WHERE source_draft_id = $1")
        .bind(draft_id)
        .fetch_optional(&mut *conn)
        .await
}

pub async fn serial_exists(conn: &mut SqliteConnection, serial: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM submissions WHERE serial_number = $1)")
        .bind(serial)
        .fetch_one(&mut *conn)
        .await
}

/// Writes the submission row together with its authors and files.
pub async fn insert_submission(
    conn: &mut SqliteConnection,
    submission: &Submission,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO submissions (id, conference_id, created_by, source_draft_id, title, abstract,
                                 track, paper_type, keywords, agreed_original_work,
                                 agreed_not_under_review, agreed_consent_to_publish, status,
                                 serial_number, submitted_at, decision_note, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        "#,
    )
    .bind(&submission.id)
    .bind(&submission.conference_id)
    .bind(&submission.created_by)
    .bind(&submission.source_draft_id)
    .bind(&submission.title)
    .bind(&submission.abstract_text)
    .bind(&submission.track)
    .bind(submission.paper_type)
    .bind(encode_string_list(&submission.keywords))
    .bind(submission.agreements.original_work)
    .bind(submission.agreements.not_under_review_elsewhere)
    .bind(submission.agreements.consent_to_publish)
    .bind(submission.status)
    .bind(&submission.serial_number)
    .bind(submission.submitted_at)
    .bind(&submission.decision_note)
    .bind(submission.created_at)
    .bind(submission.updated_at)
    .execute(&mut *conn)
    .await?;

    replace_authors(conn, Owner::Submission, &submission.id, &submission.authors).await?;
    for file in &submission.files {
        insert_file(conn, Owner::Submission, &submission.id, file).await?;
    }
    Ok(())
}

/// Persists editable content (not status) and the author list.
pub async fn update_submission_content(
    conn: &mut SqliteConnection,
    submission: &Submission,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE submissions
        SET title = $2, abstract = $3, track = $4, paper_type = $5, keywords = $6,
            agreed_original_work = $7, agreed_not_under_review = $8,
            agreed_consent_to_publish = $9, updated_at = $10
        WHERE id = $1
        "#,
    )
    .bind(&submission.id)
    .bind(&submission.title)
    .bind(&submission.abstract_text)
    .bind(&submission.track)
    .bind(submission.paper_type)
    .bind(encode_string_list(&submission.keywords))
    .bind(submission.agreements.original_work)
    .bind(submission.agreements.not_under_review_elsewhere)
    .bind(submission.agreements.consent_to_publish)
    .bind(submission.updated_at)
    .execute(&mut *conn)
    .await?;
    replace_authors(conn, Owner::Submission, &submission.id, &submission.authors).await
}

/// Persists lifecycle fields. A serial number, once stored, is never overwritten.
pub async fn update_submission_state(
    conn: &mut SqliteConnection,
    submission: &Submission,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE submissions
        SET status = $2, serial_number = COALESCE(serial_number, $3),
            submitted_at = $4, decision_note = $5, updated_at = $6
        WHERE id = $1
        "#,
    )
    .bind(&submission.id)
    .bind(submission.status)
    .bind(&submission.serial_number)
    .bind(submission.submitted_at)
    .bind(&submission.decision_note)
    .bind(submission.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn find_submission(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Submission>, sqlx::Error> {
    let Some(row) = sqlx::query_as::<_, SubmissionRow>("SELECT * FROM submissions WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
    else {
        return Ok(None);
    };

    let authors = load_authors(conn, Owner::Submission, &row.id).await?;
    let files = load_files(conn, Owner::Submission, &row.id).await?;
    let review_assignments = load_assignments(conn, &row.id).await?;
    let decisions = load_decisions(conn, &row.id).await?;
    let agreements = row.agreements();

    Ok(Some(Submission {
        id: row.id,
        conference_id: row.conference_id,
        created_by: row.created_by,
        source_draft_id: row.source_draft_id,
        title: row.title,
        abstract_text: row.abstract_text,
        track: row.track,
        paper_type: row.paper_type,
        keywords: parse_string_list(&row.keywords),
        agreements,
        status: row.status,
        serial_number: row.serial_number,
        submitted_at: row.submitted_at,
        decision_note: row.decision_note,
        authors,
        files,
        review_assignments,
        decisions,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }))
}

pub async fn delete_submission(conn: &mut SqliteConnection, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM submissions WHERE id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn list_submissions(
    conn: &mut SqliteConnection,
    actor_id: &str,
    query: &SubmissionQuery,
) -> Result<Vec<SubmissionSummary>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT s.id, s.conference_id, c.year, s.created_by, s.title, s.track, s.status, \
         s.serial_number, s.submitted_at, s.updated_at \
         FROM submissions s JOIN conferences c ON c.id = s.conference_id WHERE 1 = 1",
    );

    match query.scope {
        ListScope::Authored => {
            qb.push(" AND s.created_by = ").push_bind(actor_id.to_string());
        }
        ListScope::Reviewing => {
            qb.push(
                " AND EXISTS (SELECT 1 FROM review_assignments ra \
                 WHERE ra.submission_id = s.id AND ra.status != 'DECLINED' AND ra.reviewer_id = ",
            )
            .push_bind(actor_id.to_string())
            .push(")");
        }
        ListScope::Editorial => {
            qb.push(" AND s.status != 'DRAFT'");
        }
    }

    if let Some(status) = query.status {
        qb.push(" AND s.status = ").push_bind(status);
    }
    if let Some(year) = query.year {
        qb.push(" AND c.year = ").push_bind(year);
    }
    if let Some(pattern) = query.search_pattern() {
        qb.push(" AND (lower(s.title) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR lower(s.abstract) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR lower(COALESCE(s.serial_number, '')) LIKE ")
            .push_bind(pattern)
            .push(")");
    }

    qb.push(" ORDER BY s.updated_at DESC, s.id");

    qb.build_query_as::<SubmissionSummary>()
        .fetch_all(&mut *conn)
        .await
}
