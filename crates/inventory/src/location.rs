use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{LocationId, ValidationErrors};

/// A physical site grouping warehouses, e.g. "Main Facility".
///
/// Names are unique. A location cannot be deleted while a warehouse points at
/// it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLocation {
    pub name: String,
}

impl Location {
    pub fn create(
        id: LocationId,
        input: NewLocation,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = input.name.trim().to_string();
        if name.is_empty() {
            errors.add("name", "name cannot be empty");
        }
        errors.into_result(Self {
            id,
            name,
            created_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_trims_name() {
        let location = Location::create(
            LocationId::new(),
            NewLocation { name: "  Main Facility ".into() },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(location.name, "Main Facility");
    }

    #[test]
    fn blank_name_is_rejected() {
        let errors = Location::create(LocationId::new(), NewLocation { name: " ".into() }, Utc::now())
            .unwrap_err();
        assert!(errors.has_field("name"));
    }
}
