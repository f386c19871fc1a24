use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMemberProfile {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,

    #[validate(length(min = 1, max = 100))]
    pub last_name: String,

    #[validate(email)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct MinistryAssignment {
    pub ministry_id: i64,
    pub ministry_name: String,
    pub role: Option<String>,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MinistryEntry {
    #[validate(range(min = 1))]
    pub ministry_id: i64,

    #[validate(length(max = 100))]
    pub role: Option<String>,
}

/// Replaces the member's whole ministry list.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMinistries {
    #[validate(nested)]
    pub ministries: Vec<MinistryEntry>,
}

impl UpdateMinistries {
    /// Rejects the same ministry listed twice; the table key would refuse it
    /// halfway through the reinsert.
    pub fn check_unique(&self) -> Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for entry in &self.ministries {
            if !seen.insert(entry.ministry_id) {
                return Err(format!("Ministry {} listed more than once", entry.ministry_id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_rejects_bad_email() {
        let update = UpdateMemberProfile {
            first_name: "Wanjiru".into(),
            last_name: "Kamau".into(),
            email: Some("not-an-email".into()),
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn profile_accepts_missing_email() {
        let update = UpdateMemberProfile {
            first_name: "Wanjiru".into(),
            last_name: "Kamau".into(),
            email: None,
        };
        assert!(update.validate().is_ok());
    }

    #[test]
    fn duplicate_ministries_are_rejected() {
        let update = UpdateMinistries {
            ministries: vec![
                MinistryEntry { ministry_id: 3, role: None },
                MinistryEntry { ministry_id: 3, role: Some("Chair".into()) },
            ],
        };
        assert!(update.validate().is_ok());
        assert!(update.check_unique().is_err());
    }

    #[test]
    fn nested_entries_are_validated() {
        let update = UpdateMinistries {
            ministries: vec![MinistryEntry { ministry_id: 0, role: None }],
        };
        assert!(update.validate().is_err());
    }
}
