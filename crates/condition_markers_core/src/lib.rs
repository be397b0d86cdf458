//! Core placement and synchronization logic for condition markers.
//!
//! Markers are small overlay items attached to tabletop tokens. This crate
//! computes where they belong, detects when a token change invalidates them
//! and writes the minimal set of changes to the shared scene store.

pub mod config;
pub mod db;
pub mod listener;
pub mod logging;
pub mod model;
pub mod query;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod sync;
pub mod transform;

pub use config::{load_settings, ConfigError, MarkerSettings};
pub use listener::ChangeListener;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::geometry::Vector2;
pub use model::item::{
    AttachmentBehavior, ImageContent, ImageGrid, ItemId, ItemValidationError, Layer, Metadata,
    SceneItem,
};
pub use model::marker::{build_condition_marker, Marker, MarkerMetadata, MarkerMetadataError};
pub use model::token::Token;
pub use query::{list_managed_markers, markers_by_parent};
pub use reconcile::{plan_layout, reconcile_token_ids, reconcile_tokens, MarkerUpdate};
pub use service::condition_service::{
    ConditionResult, ConditionService, ConditionServiceError, DisableReport, ToggleOutcome,
};
pub use store::{
    ChangeEvent, SceneStore, SqliteSceneStore, StoreError, StoreResult, Subscription,
};
pub use sync::{
    apply_creates, apply_deletes, apply_updates, AlignmentMismatch, CreateReport, UpdateReport,
};
pub use transform::{
    compute_position, compute_rotation, compute_scale, compute_transform, MarkerTransform,
    TransformError, TransformPolicy,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
