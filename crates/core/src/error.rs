//! Domain error model.

use serde::Serialize;
use thiserror::Error;

use crate::id::{ProductId, WarehouseId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Every problem found while validating an input, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<FieldError>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &[FieldError] {
        &self.0
    }

    /// `Ok(value)` when nothing was recorded, the collected errors otherwise.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }
}

impl core::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut first = true;
        for e in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
            first = false;
        }
        Ok(())
    }
}

/// Domain-level error.
///
/// Deterministic business failures only. Storage and transport failures are
/// modelled by the layers that own them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or incomplete input, rejected before anything is persisted.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// A referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The operation is not allowed in the entity's current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A decrement would take a stock balance below zero.
    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock {
        product_id: ProductId,
        warehouse_id: WarehouseId,
        requested: i64,
        available: i64,
    },

    /// A uniqueness or concurrency conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An identifier could not be parsed.
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(ValidationErrors::single(field, message))
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}

impl From<ValidationErrors> for DomainError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_render_every_field() {
        let mut errors = ValidationErrors::new();
        errors.add("items", "at least one item is required");
        errors.add("targetWarehouseId", "required for IN");

        assert_eq!(
            errors.to_string(),
            "items: at least one item is required; targetWarehouseId: required for IN"
        );
        assert!(errors.has_field("items"));
        assert!(!errors.has_field("sourceWarehouseId"));
    }

    #[test]
    fn empty_errors_pass_the_value_through() {
        assert_eq!(ValidationErrors::new().into_result(7), Ok(7));
        assert!(ValidationErrors::single("x", "bad").into_result(7).is_err());
    }

    #[test]
    fn insufficient_stock_names_the_product() {
        let product_id = ProductId::new();
        let err = DomainError::InsufficientStock {
            product_id,
            warehouse_id: WarehouseId::new(),
            requested: 5,
            available: 3,
        };
        assert_eq!(err.to_string(), format!("Insufficient stock for product {product_id}"));
    }
}
