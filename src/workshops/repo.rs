use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::workshops::dto::{CreateWorkshopRequest, UpdateWorkshopRequest};
use crate::workshops::repo_types::{
    Participant, PublicWorkshopRow, Registration, Workshop, WorkshopStatus,
};

pub async fn create(
    db: &PgPool,
    creator_id: Uuid,
    req: &CreateWorkshopRequest,
) -> anyhow::Result<Workshop> {
    let workshop = sqlx::query_as::<_, Workshop>(
        r#"
        INSERT INTO workshops (topic, description, starts_at, location, language, duration_minutes, status, creator_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id, topic, description, starts_at, location, language, duration_minutes, status, creator_id, created_at
        "#,
    )
    .bind(&req.topic)
    .bind(&req.description)
    .bind(req.starts_at)
    .bind(&req.location)
    .bind(&req.language)
    .bind(req.duration_minutes)
    .bind(req.status.unwrap_or(WorkshopStatus::Draft))
    .bind(creator_id)
    .fetch_one(db)
    .await?;
    Ok(workshop)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Workshop>> {
    let workshop = sqlx::query_as::<_, Workshop>(
        r#"
        SELECT id, topic, description, starts_at, location, language, duration_minutes, status, creator_id, created_at
        FROM workshops
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(workshop)
}

/// Partial update; absent fields keep their current value. Returns None when
/// the row vanished after the caller's ownership check.
pub async fn update(
    db: &PgPool,
    id: Uuid,
    req: &UpdateWorkshopRequest,
) -> anyhow::Result<Option<Workshop>> {
    let workshop = sqlx::query_as::<_, Workshop>(
        r#"
        UPDATE workshops
        SET topic = COALESCE($2, topic),
            description = COALESCE($3, description),
            starts_at = COALESCE($4, starts_at),
            location = COALESCE($5, location),
            language = COALESCE($6, language),
            duration_minutes = COALESCE($7, duration_minutes),
            status = COALESCE($8, status)
        WHERE id = $1
        RETURNING id, topic, description, starts_at, location, language, duration_minutes, status, creator_id, created_at
        "#,
    )
    .bind(id)
    .bind(&req.topic)
    .bind(&req.description)
    .bind(req.starts_at)
    .bind(&req.location)
    .bind(&req.language)
    .bind(req.duration_minutes)
    .bind(req.status)
    .fetch_optional(db)
    .await?;
    Ok(workshop)
}

/// Delete a workshop and its registrations as one transaction, registrations
/// first so no orphan can survive a partial failure.
pub async fn delete_cascade(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
    let mut tx = db.begin().await?;
    sqlx::query("DELETE FROM registrations WHERE workshop_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM workshops WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    info!(workshop_id = %id, "workshop deleted with registrations");
    Ok(())
}

/// Public marketplace: public workshops with grouped registration counts.
pub async fn list_public(db: &PgPool) -> anyhow::Result<Vec<PublicWorkshopRow>> {
    let rows = sqlx::query_as::<_, PublicWorkshopRow>(
        r#"
        SELECT w.id, w.topic, w.description, w.starts_at, w.location, w.language,
               w.duration_minutes, w.status, w.creator_id, w.created_at,
               COUNT(r.id) AS participants
        FROM workshops w
        LEFT JOIN registrations r ON r.workshop_id = w.id
        WHERE w.status = $1
        GROUP BY w.id
        ORDER BY w.starts_at ASC NULLS LAST
        "#,
    )
    .bind(WorkshopStatus::Public)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn list_by_creator(db: &PgPool, creator_id: Uuid) -> anyhow::Result<Vec<Workshop>> {
    let rows = sqlx::query_as::<_, Workshop>(
        r#"
        SELECT id, topic, description, starts_at, location, language, duration_minutes, status, creator_id, created_at
        FROM workshops
        WHERE creator_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(creator_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Workshops the user has joined.
pub async fn schedule_for_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Workshop>> {
    let rows = sqlx::query_as::<_, Workshop>(
        r#"
        SELECT w.id, w.topic, w.description, w.starts_at, w.location, w.language,
               w.duration_minutes, w.status, w.creator_id, w.created_at
        FROM workshops w
        JOIN registrations r ON r.workshop_id = w.id
        WHERE r.user_id = $1
        ORDER BY w.starts_at ASC NULLS LAST
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Insert a registration. The unique (user_id, workshop_id) constraint is the
/// source of truth for duplicates; the raw error is returned so the handler
/// can map constraint violations.
pub async fn join(
    db: &PgPool,
    user_id: Uuid,
    workshop_id: Uuid,
) -> Result<Registration, sqlx::Error> {
    sqlx::query_as::<_, Registration>(
        r#"
        INSERT INTO registrations (user_id, workshop_id)
        VALUES ($1, $2)
        RETURNING id, user_id, workshop_id, joined_at
        "#,
    )
    .bind(user_id)
    .bind(workshop_id)
    .fetch_one(db)
    .await
}

/// Remove a registration if present. Removing a missing one is a no-op.
pub async fn leave(db: &PgPool, user_id: Uuid, workshop_id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM registrations WHERE user_id = $1 AND workshop_id = $2")
        .bind(user_id)
        .bind(workshop_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn participants(db: &PgPool, workshop_id: Uuid) -> anyhow::Result<Vec<Participant>> {
    let rows = sqlx::query_as::<_, Participant>(
        r#"
        SELECT u.id, u.username, u.email
        FROM users u
        JOIN registrations r ON r.user_id = u.id
        WHERE r.workshop_id = $1
        ORDER BY r.joined_at ASC
        "#,
    )
    .bind(workshop_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn count_created_by(db: &PgPool, creator_id: Uuid) -> anyhow::Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM workshops WHERE creator_id = $1",
    )
    .bind(creator_id)
    .fetch_one(db)
    .await?;
    Ok(count)
}

pub async fn count_registrations_for_creator(
    db: &PgPool,
    creator_id: Uuid,
) -> anyhow::Result<i64> {
    let count = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM registrations r
        JOIN workshops w ON w.id = r.workshop_id
        WHERE w.creator_id = $1
        "#,
    )
    .bind(creator_id)
    .fetch_one(db)
    .await?;
    Ok(count)
}

pub async fn count_joined_by(db: &PgPool, user_id: Uuid) -> anyhow::Result<i64> {
    let count =
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM registrations WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(db)
            .await?;
    Ok(count)
}
