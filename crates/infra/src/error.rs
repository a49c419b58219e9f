//! Error types of the storage and application layers.

use thiserror::Error;

use stockledger_core::{DomainError, ProductId, ValidationErrors, WarehouseId};

/// Storage operation error.
///
/// These are infrastructure failures. Business rule violations are reported
/// through [`InventoryError`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Serialization failure or deadlock; the whole unit of work may be retried.
    #[error("concurrent update conflict: {0}")]
    Conflict(String),

    /// A lock wait or the whole unit of work ran out of time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// A unique constraint was violated.
    #[error("duplicate: {0}")]
    Duplicate(String),

    /// A foreign key pointed at a missing row.
    #[error("missing reference: {0}")]
    MissingReference(String),

    /// The caller passed a value the store refuses to write.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Connection, decoding or any other backend failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether re-running the unit of work from scratch may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}

/// Error returned by the transition engine and the application services.
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("Insufficient stock for product {product_id}")]
    InsufficientStock {
        product_id: ProductId,
        warehouse_id: WarehouseId,
        requested: i64,
        available: i64,
    },

    /// A uniqueness violation such as a repeated sku.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Validation kept losing races until the retry budget ran out.
    #[error("concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error(transparent)]
    Store(StoreError),
}

impl InventoryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<DomainError> for InventoryError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(errors) => Self::Validation(errors),
            DomainError::NotFound { entity, id } => Self::NotFound { entity, id },
            DomainError::InvalidState(msg) => Self::InvalidState(msg),
            DomainError::InsufficientStock {
                product_id,
                warehouse_id,
                requested,
                available,
            } => Self::InsufficientStock {
                product_id,
                warehouse_id,
                requested,
                available,
            },
            DomainError::Conflict(msg) => Self::Conflict(msg),
            DomainError::InvalidId(msg) => Self::Validation(ValidationErrors::single("id", msg)),
        }
    }
}

impl From<ValidationErrors> for InventoryError {
    fn from(value: ValidationErrors) -> Self {
        Self::Validation(value)
    }
}

impl From<StoreError> for InventoryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Duplicate(msg) => Self::Conflict(msg),
            other => Self::Store(other),
        }
    }
}

pub type InventoryResult<T> = Result<T, InventoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicates_surface_as_conflicts() {
        let err: InventoryError = StoreError::Duplicate("sku ABC".into()).into();
        assert!(matches!(err, InventoryError::Conflict(_)));

        let err: InventoryError = StoreError::Timeout("lock".into()).into();
        assert!(matches!(err, InventoryError::Store(StoreError::Timeout(_))));
    }

    #[test]
    fn domain_errors_keep_their_category() {
        let err: InventoryError = DomainError::invalid_state("not DRAFT").into();
        assert!(matches!(err, InventoryError::InvalidState(_)));

        let err: InventoryError = DomainError::validation("items", "required").into();
        match err {
            InventoryError::Validation(errors) => assert!(errors.has_field("items")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn only_conflicts_are_retryable() {
        assert!(StoreError::Conflict("40001".into()).is_retryable());
        assert!(!StoreError::Timeout("55P03".into()).is_retryable());
        assert!(!StoreError::Backend("io".into()).is_retryable());
    }
}
