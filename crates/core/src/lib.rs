//! `coffer-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod amount;
pub mod entity;
pub mod error;
pub mod name;
pub mod value_object;
pub mod version;

pub use amount::Amount;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use name::AccountName;
pub use value_object::ValueObject;
pub use version::ExpectedVersion;
