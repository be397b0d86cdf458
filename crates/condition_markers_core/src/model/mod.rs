//! Scene domain model.
//!
//! # Responsibility
//! - Define the generic scene item record exchanged with the store.
//! - Provide typed token and marker projections decoded at the store boundary.
//!
//! # Invariants
//! - Every item is identified by a stable `ItemId`.
//! - Markers reference their parent by id only; they never own it.

pub mod geometry;
pub mod item;
pub mod marker;
pub mod token;
