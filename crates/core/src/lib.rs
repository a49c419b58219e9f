//! `stockledger-core`: shared domain building blocks.
//!
//! Identifiers and the domain error model. No infrastructure concerns.

pub mod error;
pub mod id;

pub use error::{DomainError, DomainResult, FieldError, ValidationErrors};
pub use id::{
    LedgerEntryId, LocationId, ProductId, SubLocationId, TransactionId, UserId, WarehouseId,
};
