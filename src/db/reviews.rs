use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use super::models::{AssignmentRow, LoadRow, QueueRow};
use crate::domain::{AssignmentStatus, Decision, Review, ReviewAssignment, Role};

const ASSIGNMENT_COLUMNS: &str = r#"
    SELECT ra.id, ra.submission_id, ra.reviewer_id, ra.status, ra.due_at, ra.assigned_by,
           ra.assigned_at, r.score, r.recommendation, r.comment_to_editor, r.comment_to_author,
           r.submitted_at AS review_submitted_at
    FROM review_assignments ra
    LEFT JOIN reviews r ON r.assignment_id = ra.id
"#;

pub async fn load_assignments(
    conn: &mut SqliteConnection,
    submission_id: &str,
) -> Result<Vec<ReviewAssignment>, sqlx::Error> {
    let rows = sqlx::query_as::<_, AssignmentRow>(&format!(
        "{} WHERE ra.submission_id = $1 ORDER BY ra.assigned_at, ra.id",
        ASSIGNMENT_COLUMNS
    ))
    .bind(submission_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows.into_iter().map(ReviewAssignment::from).collect())
}

pub async fn find_assignment(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<ReviewAssignment>, sqlx::Error> {
    let sql = format!("{} WHERE ra.id = $1", ASSIGNMENT_COLUMNS);
    let row = sqlx::query_as::<_, AssignmentRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(ReviewAssignment::from))
}

/// Creates the (submission, reviewer) assignment or refreshes the existing one.
///
/// An existing row keeps its id; its due date is replaced and a DECLINED
/// reviewer goes back to PENDING. SUBMITTED rows keep their status.
/// Returns `true` when a new row was created.
pub async fn upsert_assignment(
    conn: &mut SqliteConnection,
    id: &str,
    submission_id: &str,
    reviewer_id: &str,
    due_at: Option<DateTime<Utc>>,
    assigned_by: &str,
    now: DateTime<Utc>,
) -> Result<bool, sqlx::Error> {
    let existed: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM review_assignments WHERE submission_id = $1 AND reviewer_id = $2
        )
        "#,
    )
    .bind(submission_id)
    .bind(reviewer_id)
    .fetch_one(&mut *conn)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO review_assignments
            (id, submission_id, reviewer_id, status, due_at, assigned_by, assigned_at, updated_at)
        VALUES ($1, $2, $3, 'PENDING', $4, $5, $6, $6)
        ON CONFLICT (submission_id, reviewer_id) DO UPDATE SET
            due_at = excluded.due_at,
            assigned_by = excluded.assigned_by,
            status = CASE WHEN review_assignments.status = 'DECLINED' THEN 'PENDING'
                          ELSE review_assignments.status END,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(id)
    .bind(submission_id)
    .bind(reviewer_id)
    .bind(due_at)
    .bind(assigned_by)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(!existed)
}

pub async fn set_assignment_status(
    conn: &mut SqliteConnection,
    id: &str,
    status: AssignmentStatus,
    now: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE review_assignments SET status = $2, updated_at = $3 WHERE id = $1")
        .bind(id)
        .bind(status)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// Inserts the review. The primary key on `assignment_id` rejects a second one.
pub async fn insert_review(
    conn: &mut SqliteConnection,
    review: &Review,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO reviews (assignment_id, score, recommendation, comment_to_editor,
                             comment_to_author, submitted_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(&review.assignment_id)
    .bind(review.score)
    .bind(review.recommendation)
    .bind(&review.comment_to_editor)
    .bind(&review.comment_to_author)
    .bind(review.submitted_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn active_assignment_count(
    conn: &mut SqliteConnection,
    reviewer_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM review_assignments ra
        JOIN submissions s ON s.id = ra.submission_id
        WHERE ra.reviewer_id = $1
          AND ra.status IN ('PENDING', 'ACCEPTED')
          AND s.status NOT IN ('ACCEPTED', 'REJECTED', 'WITHDRAWN')
        "#,
    )
    .bind(reviewer_id)
    .fetch_one(&mut *conn)
    .await
}

pub async fn reviewer_queue(
    conn: &mut SqliteConnection,
    reviewer_id: &str,
) -> Result<Vec<QueueRow>, sqlx::Error> {
    sqlx::query_as::<_, QueueRow>(
        r#"
        SELECT ra.id, ra.submission_id, ra.status, ra.due_at, s.title, s.serial_number,
               s.status AS submission_status
        FROM review_assignments ra
        JOIN submissions s ON s.id = ra.submission_id
        WHERE ra.reviewer_id = $1
        "#,
    )
    .bind(reviewer_id)
    .fetch_all(&mut *conn)
    .await
}

/// Every member holding `role`, with their count of active assignments.
/// Assignments on decided or withdrawn submissions no longer count.
pub async fn reviewer_loads(
    conn: &mut SqliteConnection,
    role: Role,
) -> Result<Vec<LoadRow>, sqlx::Error> {
    sqlx::query_as::<_, LoadRow>(
        r#"
        SELECT u.id, u.name,
               (SELECT COUNT(*)
                FROM review_assignments ra
                JOIN submissions s ON s.id = ra.submission_id
                WHERE ra.reviewer_id = u.id
                  AND ra.status IN ('PENDING', 'ACCEPTED')
                  AND s.status NOT IN ('ACCEPTED', 'REJECTED', 'WITHDRAWN')) AS active
        FROM users u
        JOIN user_roles ur ON ur.user_id = u.id AND ur.role = $1
        ORDER BY active, u.name
        "#,
    )
    .bind(role)
    .fetch_all(&mut *conn)
    .await
}

pub async fn insert_decision(
    conn: &mut SqliteConnection,
    decision: &Decision,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO decisions (id, submission_id, decided_by, result, note, decided_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(&decision.id)
    .bind(&decision.submission_id)
    .bind(&decision.decided_by)
    .bind(decision.result)
    .bind(&decision.note)
    .bind(decision.decided_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Decisions oldest first; the last one is current.
pub async fn load_decisions(
    conn: &mut SqliteConnection,
    submission_id: &str,
) -> Result<Vec<Decision>, sqlx::Error> {
    sqlx::query_as::<_, Decision>(
        "SELECT id, submission_id, decided_by, result, note, decided_at FROM decisions \
         WHERE submission_id = $1 ORDER BY decided_at, rowid",
    )
    .bind(submission_id)
    .fetch_all(&mut *conn)
    .await
}
