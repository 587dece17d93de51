//! Value object trait: equality by value, not identity.
//!
//! Value objects are domain objects that have **no identity** - they are defined entirely
//! by their attribute values. Two value objects with the same values are considered equal.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new one. In this crate `AccountName` and `Amount` are value objects:
/// both validate on construction, so holding one proves the value is usable.
///
/// ## Design Constraints
///
/// The trait requires:
/// - **Clone**: value objects are cheap to copy
/// - **PartialEq**: value objects are compared by their attribute values
/// - **Debug**: value objects show up in logs and test failures
///
/// ## Usage Pattern
///
/// ```ignore
/// let a = Amount::new(dec!(100))?;
/// let b = Amount::new(dec!(100.00))?;
/// assert_eq!(a, b);  // Equal by value, not by scale
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
