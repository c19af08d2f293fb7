//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two
/// `CurrencyCode("MRU")` values are interchangeable, whereas two lots with the
/// same quantity are still different lots.
///
/// ```ignore
/// let a = CurrencyCode::new("mru")?;
/// let b = CurrencyCode::new("MRU")?;
/// assert_eq!(a, b);
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
