//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are immutable and defined entirely by their attribute
/// values: two fee schedules with the same fees are interchangeable. To
/// "modify" one, build a new value. Entities, by contrast, keep their
/// identity across state changes (see [`crate::entity::Entity`]).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
