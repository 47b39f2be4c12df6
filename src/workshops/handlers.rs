use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use sqlx::PgPool;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{
        guard::{self, Capability},
        jwt::AuthUser,
        repo_types::Role,
    },
    error::{is_foreign_key_violation, unique_violation, ApiError},
    state::AppState,
    workshops::{
        dto::{CreateWorkshopRequest, JoinResponse, StatsResponse, UpdateWorkshopRequest},
        repo,
        repo_types::{Participant, Workshop},
    },
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/workshops", get(list_workshops))
        .route("/workshops/schedule", get(my_schedule))
        .route("/workshops/:id/participants", get(list_participants))
        .route("/stats", get(get_stats))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/workshops", post(create_workshop))
        .route("/workshops/:id", put(update_workshop).delete(delete_workshop))
        .route(
            "/workshops/:id/join",
            post(join_workshop).delete(leave_workshop),
        )
}

const REGISTRATION_PAIR_CONSTRAINT: &str = "registrations_user_id_workshop_id_key";

/// Ownership decision for owner-gated operations. A workshop that does not
/// exist and one owned by someone else produce the same answer, so callers
/// cannot probe which ids exist.
fn owned_or_forbidden(workshop: Option<Workshop>, user: &AuthUser) -> Result<Workshop, ApiError> {
    match workshop {
        Some(w) if w.creator_id == user.id => Ok(w),
        _ => Err(ApiError::Forbidden("You do not own this workshop")),
    }
}

/// Fetch a workshop and verify the caller owns it.
async fn fetch_owned(db: &PgPool, id: Uuid, user: &AuthUser) -> Result<Workshop, ApiError> {
    let result = owned_or_forbidden(repo::find_by_id(db, id).await?, user);
    if result.is_err() {
        warn!(user_id = %user.id, workshop_id = %id, "ownership check failed");
    }
    result
}

/// Map a failed registration insert to its outcome: the unique pair
/// constraint means the caller already joined, a foreign-key failure means
/// the workshop vanished between the existence check and the insert.
/// Anything else is left to the store error path.
fn join_failure(unique_constraint: Option<&str>, foreign_key: bool) -> Option<ApiError> {
    match unique_constraint {
        Some(REGISTRATION_PAIR_CONSTRAINT) => {
            Some(ApiError::Conflict("You already joined this workshop".into()))
        }
        _ if foreign_key => Some(ApiError::NotFound("Workshop")),
        _ => None,
    }
}

/// Role-dependent listing: teachers see the workshops they created
/// (newest first), students see the public marketplace with participant
/// counts.
#[instrument(skip(state))]
pub async fn list_workshops(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, ApiError> {
    match user.role {
        Role::Teacher => {
            let mine = repo::list_by_creator(&state.db, user.id).await?;
            Ok(Json(mine).into_response())
        }
        Role::Student => {
            let public = repo::list_public(&state.db).await?;
            Ok(Json(public).into_response())
        }
    }
}

#[instrument(skip(state, payload))]
pub async fn create_workshop(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateWorkshopRequest>,
) -> Result<(StatusCode, Json<Workshop>), ApiError> {
    guard::require(&user, Capability::CreateWorkshop)?;

    if payload.topic.trim().is_empty() {
        return Err(ApiError::Validation("Topic is required".into()));
    }

    let workshop = repo::create(&state.db, user.id, &payload).await?;
    info!(workshop_id = %workshop.id, creator_id = %user.id, "workshop created");
    Ok((StatusCode::CREATED, Json(workshop)))
}

#[instrument(skip(state, payload))]
pub async fn update_workshop(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateWorkshopRequest>,
) -> Result<Json<Workshop>, ApiError> {
    guard::require(&user, Capability::UpdateWorkshop)?;
    fetch_owned(&state.db, id, &user).await?;

    if payload.topic.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::Validation("Topic cannot be empty".into()));
    }

    // row may vanish between the ownership check and the update; same answer
    // as the ownership check so nothing about the id's fate leaks
    let workshop = owned_or_forbidden(repo::update(&state.db, id, &payload).await?, &user)?;
    info!(workshop_id = %id, "workshop updated");
    Ok(Json(workshop))
}

#[instrument(skip(state))]
pub async fn delete_workshop(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    guard::require(&user, Capability::DeleteWorkshop)?;
    fetch_owned(&state.db, id, &user).await?;

    repo::delete_cascade(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn join_workshop(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<JoinResponse>, ApiError> {
    guard::require(&user, Capability::JoinWorkshop)?;

    repo::find_by_id(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Workshop"))?;

    match repo::join(&state.db, user.id, id).await {
        Ok(reg) => {
            info!(user_id = %user.id, workshop_id = %id, "joined workshop");
            Ok(Json(JoinResponse {
                workshop_id: reg.workshop_id,
                joined_at: reg.joined_at,
            }))
        }
        Err(e) => {
            let constraint = unique_violation(&e);
            match join_failure(constraint.as_deref(), is_foreign_key_violation(&e)) {
                Some(err) => {
                    warn!(user_id = %user.id, workshop_id = %id, "join rejected");
                    Err(err)
                }
                None => Err(e.into()),
            }
        }
    }
}

#[instrument(skip(state))]
pub async fn leave_workshop(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    guard::require(&user, Capability::LeaveWorkshop)?;

    // Idempotent: leaving a workshop you never joined is a success.
    repo::leave(&state.db, user.id, id).await?;
    info!(user_id = %user.id, workshop_id = %id, "left workshop");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn my_schedule(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Workshop>>, ApiError> {
    guard::require(&user, Capability::ViewSchedule)?;
    let workshops = repo::schedule_for_user(&state.db, user.id).await?;
    Ok(Json(workshops))
}

#[instrument(skip(state))]
pub async fn list_participants(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Participant>>, ApiError> {
    guard::require(&user, Capability::ViewParticipants)?;
    fetch_owned(&state.db, id, &user).await?;

    let participants = repo::participants(&state.db, id).await?;
    Ok(Json(participants))
}

#[instrument(skip(state))]
pub async fn get_stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<StatsResponse>, ApiError> {
    guard::require(&user, Capability::ViewStats)?;

    let stats = match user.role {
        Role::Teacher => StatsResponse::Teacher {
            workshops: repo::count_created_by(&state.db, user.id).await?,
            registrations: repo::count_registrations_for_creator(&state.db, user.id).await?,
        },
        Role::Student => StatsResponse::Student {
            joined: repo::count_joined_by(&state.db, user.id).await?,
        },
    };
    Ok(Json(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workshops::repo_types::WorkshopStatus;
    use time::OffsetDateTime;

    fn teacher() -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            role: Role::Teacher,
        }
    }

    fn workshop_of(creator_id: Uuid) -> Workshop {
        Workshop {
            id: Uuid::new_v4(),
            topic: "Intro".into(),
            description: None,
            starts_at: None,
            location: None,
            language: None,
            duration_minutes: None,
            status: WorkshopStatus::Public,
            creator_id,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn owner_passes_the_ownership_check() {
        let user = teacher();
        let workshop = workshop_of(user.id);
        let id = workshop.id;
        let owned = owned_or_forbidden(Some(workshop), &user).expect("owner passes");
        assert_eq!(owned.id, id);
    }

    #[test]
    fn missing_and_foreign_workshops_are_the_same_forbidden() {
        let user = teacher();
        let missing = owned_or_forbidden(None, &user).unwrap_err();
        let foreign = owned_or_forbidden(Some(workshop_of(Uuid::new_v4())), &user).unwrap_err();
        assert!(matches!(missing, ApiError::Forbidden(_)));
        assert!(matches!(foreign, ApiError::Forbidden(_)));
        assert_eq!(missing.to_string(), foreign.to_string());
    }

    #[test]
    fn duplicate_join_is_a_conflict() {
        let err = join_failure(Some(REGISTRATION_PAIR_CONSTRAINT), false).expect("classified");
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[test]
    fn join_against_a_vanished_workshop_is_not_found() {
        let err = join_failure(None, true).expect("classified");
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn other_insert_failures_stay_store_errors() {
        assert!(join_failure(None, false).is_none());
        assert!(join_failure(Some("users_email_key"), false).is_none());
    }
}
