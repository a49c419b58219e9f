use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, LocationId, ValidationErrors, WarehouseId};

const MAX_SHORT_CODE_LEN: usize = 16;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WarehouseKind {
    #[default]
    Main,
    Store,
    Returns,
}

impl WarehouseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarehouseKind::Main => "MAIN",
            WarehouseKind::Store => "STORE",
            WarehouseKind::Returns => "RETURNS",
        }
    }
}

impl FromStr for WarehouseKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MAIN" => Ok(WarehouseKind::Main),
            "STORE" => Ok(WarehouseKind::Store),
            "RETURNS" => Ok(WarehouseKind::Returns),
            _ => Err(DomainError::validation(
                "type",
                "type must be one of: MAIN, STORE, RETURNS",
            )),
        }
    }
}

/// A place that holds stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub name: String,
    /// Unique, upper-cased.
    pub short_code: String,
    pub location_id: Option<LocationId>,
    pub kind: WarehouseKind,
    pub capacity: Option<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWarehouse {
    pub name: String,
    pub short_code: String,
    pub location_id: Option<LocationId>,
    pub kind: Option<WarehouseKind>,
    pub capacity: Option<i64>,
}

impl Warehouse {
    pub fn create(
        id: WarehouseId,
        input: NewWarehouse,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let name = input.name.trim().to_string();
        if name.is_empty() {
            errors.add("name", "name cannot be empty");
        }

        let short_code = input.short_code.trim().to_ascii_uppercase();
        if short_code.is_empty() || short_code.len() > MAX_SHORT_CODE_LEN {
            errors.add(
                "shortCode",
                format!("shortCode must be 1 to {MAX_SHORT_CODE_LEN} characters"),
            );
        } else if !short_code
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            errors.add("shortCode", "shortCode may only contain A-Z, 0-9, '-' and '_'");
        }

        if matches!(input.capacity, Some(c) if c <= 0) {
            errors.add("capacity", "capacity must be positive");
        }

        errors.into_result(Self {
            id,
            name,
            short_code,
            location_id: input.location_id,
            kind: input.kind.unwrap_or_default(),
            capacity: input.capacity,
            created_at: now,
        })
    }
}
