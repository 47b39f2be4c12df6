use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Workshop visibility. Stored as the `workshop_status` enum in Postgres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "workshop_status", rename_all = "lowercase")]
pub enum WorkshopStatus {
    Draft,
    Public,
    Hidden,
}

/// Workshop record. Only the creator may mutate or delete it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Workshop {
    pub id: Uuid,
    pub topic: String,
    pub description: Option<String>,
    pub starts_at: Option<OffsetDateTime>,
    pub location: Option<String>,
    pub language: Option<String>,
    pub duration_minutes: Option<i32>,
    pub status: WorkshopStatus,
    pub creator_id: Uuid,
    pub created_at: OffsetDateTime,
}

/// One user's registration for one workshop. The (user_id, workshop_id) pair
/// is unique in the database.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Registration {
    pub id: Uuid,
    pub user_id: Uuid,
    pub workshop_id: Uuid,
    pub joined_at: OffsetDateTime,
}

/// Marketplace row: a public workshop with its aggregated registration count.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PublicWorkshopRow {
    pub id: Uuid,
    pub topic: String,
    pub description: Option<String>,
    pub starts_at: Option<OffsetDateTime>,
    pub location: Option<String>,
    pub language: Option<String>,
    pub duration_minutes: Option<i32>,
    pub status: WorkshopStatus,
    pub creator_id: Uuid,
    pub created_at: OffsetDateTime,
    pub participants: i64,
}

/// Registrant as shown to the owning teacher.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Participant {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&WorkshopStatus::Public).unwrap(),
            "\"public\""
        );
        assert_eq!(
            serde_json::to_string(&WorkshopStatus::Draft).unwrap(),
            "\"draft\""
        );
    }

    #[test]
    fn status_deserializes_lowercase() {
        let s: WorkshopStatus = serde_json::from_str("\"hidden\"").unwrap();
        assert_eq!(s, WorkshopStatus::Hidden);
        assert!(serde_json::from_str::<WorkshopStatus>("\"archived\"").is_err());
    }
}
