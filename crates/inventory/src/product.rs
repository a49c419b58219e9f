use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{ProductId, ValidationErrors};

const DEFAULT_UNIT_OF_MEASURE: &str = "pcs";

/// A stocked article.
///
/// Products are never edited once they exist; deletion is refused while any
/// transaction item or non-zero stock row still points at them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub unit_of_measure: String,
    /// Reorder threshold.
    pub min_stock: i64,
    /// Unit price in minor currency units.
    pub price: i64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A product together with its stock summed over every warehouse and
/// sub-location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub product: Product,
    pub total_stock: i64,
}

/// Input for creating a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub unit_of_measure: Option<String>,
    pub min_stock: i64,
    pub price: i64,
    pub active: Option<bool>,
}

impl Product {
    pub fn create(
        id: ProductId,
        input: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let sku = input.sku.trim().to_string();
        if sku.is_empty() {
            errors.add("sku", "sku cannot be empty");
        }
        let name = input.name.trim().to_string();
        if name.is_empty() {
            errors.add("name", "name cannot be empty");
        }
        if input.min_stock < 0 {
            errors.add("minStock", "minStock cannot be negative");
        }
        if input.price < 0 {
            errors.add("price", "price cannot be negative");
        }

        let unit_of_measure = match input.unit_of_measure.as_deref().map(str::trim) {
            Some("") => {
                errors.add("unitOfMeasure", "unitOfMeasure cannot be blank");
                String::new()
            }
            Some(u) => u.to_string(),
            None => DEFAULT_UNIT_OF_MEASURE.to_string(),
        };

        let category = input
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        errors.into_result(Self {
            id,
            sku,
            name,
            category,
            unit_of_measure,
            min_stock: input.min_stock,
            price: input.price,
            active: input.active.unwrap_or(true),
            created_at: now,
        })
    }
}
