use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::workshops::repo_types::WorkshopStatus;

#[derive(Debug, Deserialize)]
pub struct CreateWorkshopRequest {
    pub topic: String,
    pub description: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub starts_at: Option<OffsetDateTime>,
    pub location: Option<String>,
    pub language: Option<String>,
    pub duration_minutes: Option<i32>,
    pub status: Option<WorkshopStatus>, // defaults to draft
}

/// Partial update; only provided fields change.
#[derive(Debug, Deserialize)]
pub struct UpdateWorkshopRequest {
    pub topic: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub starts_at: Option<OffsetDateTime>,
    pub location: Option<String>,
    pub language: Option<String>,
    pub duration_minutes: Option<i32>,
    pub status: Option<WorkshopStatus>,
}

#[derive(Debug, Serialize)]
pub struct JoinResponse {
    pub workshop_id: Uuid,
    pub joined_at: OffsetDateTime,
}

/// Role-dependent stats shape: teachers see their workshops and the
/// registrations across them, students see how many workshops they joined.
#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum StatsResponse {
    Teacher { workshops: i64, registrations: i64 },
    Student { joined: i64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_shapes_are_tagged_by_role() {
        let t = serde_json::to_value(StatsResponse::Teacher {
            workshops: 3,
            registrations: 12,
        })
        .unwrap();
        assert_eq!(t["role"], "teacher");
        assert_eq!(t["workshops"], 3);
        assert_eq!(t["registrations"], 12);

        let s = serde_json::to_value(StatsResponse::Student { joined: 2 }).unwrap();
        assert_eq!(s["role"], "student");
        assert_eq!(s["joined"], 2);
    }

    #[test]
    fn update_request_accepts_sparse_bodies() {
        let req: UpdateWorkshopRequest = serde_json::from_str(r#"{"topic":"Intro"}"#).unwrap();
        assert_eq!(req.topic.as_deref(), Some("Intro"));
        assert!(req.status.is_none());
        assert!(req.starts_at.is_none());
    }
}
