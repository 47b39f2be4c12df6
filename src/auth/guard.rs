use tracing::warn;

use crate::{
    auth::{jwt::AuthUser, repo_types::Role},
    error::ApiError,
};

/// Everything a protected operation can ask of a caller. Role checks live in
/// one table here instead of per-handler string comparisons; ownership of a
/// specific workshop is checked separately against a re-fetched row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    CreateWorkshop,
    UpdateWorkshop,
    DeleteWorkshop,
    ViewParticipants,
    JoinWorkshop,
    LeaveWorkshop,
    ViewSchedule,
    ViewStats,
}

impl Capability {
    fn denied_message(self) -> &'static str {
        match self {
            Self::CreateWorkshop => "Only teachers can create workshops",
            Self::UpdateWorkshop => "Only teachers can update workshops",
            Self::DeleteWorkshop => "Only teachers can delete workshops",
            Self::ViewParticipants => "Only teachers can view participants",
            Self::JoinWorkshop | Self::LeaveWorkshop | Self::ViewSchedule | Self::ViewStats => {
                "Not allowed"
            }
        }
    }
}

impl Role {
    pub fn allows(self, cap: Capability) -> bool {
        match cap {
            Capability::CreateWorkshop
            | Capability::UpdateWorkshop
            | Capability::DeleteWorkshop
            | Capability::ViewParticipants => self == Role::Teacher,
            Capability::JoinWorkshop
            | Capability::LeaveWorkshop
            | Capability::ViewSchedule
            | Capability::ViewStats => true,
        }
    }
}

pub fn require(user: &AuthUser, cap: Capability) -> Result<(), ApiError> {
    if user.role.allows(cap) {
        Ok(())
    } else {
        warn!(user_id = %user.id, role = ?user.role, capability = ?cap, "capability denied");
        Err(ApiError::Forbidden(cap.denied_message()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            id: Uuid::new_v4(),
            role,
        }
    }

    #[test]
    fn teacher_capabilities_are_teacher_only() {
        for cap in [
            Capability::CreateWorkshop,
            Capability::UpdateWorkshop,
            Capability::DeleteWorkshop,
            Capability::ViewParticipants,
        ] {
            assert!(Role::Teacher.allows(cap));
            assert!(!Role::Student.allows(cap));
        }
    }

    #[test]
    fn shared_capabilities_are_open_to_both_roles() {
        for cap in [
            Capability::JoinWorkshop,
            Capability::LeaveWorkshop,
            Capability::ViewSchedule,
            Capability::ViewStats,
        ] {
            assert!(Role::Teacher.allows(cap));
            assert!(Role::Student.allows(cap));
        }
    }

    #[test]
    fn require_maps_denial_to_forbidden() {
        let err = require(&user(Role::Student), Capability::CreateWorkshop).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
        assert!(require(&user(Role::Teacher), Capability::CreateWorkshop).is_ok());
    }
}
