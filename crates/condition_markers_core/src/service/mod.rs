//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate query, transform and sync calls into user-level actions.
//! - Keep UI layers decoupled from store details.

pub mod condition_service;
