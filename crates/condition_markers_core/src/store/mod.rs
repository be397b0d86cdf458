//! Shared scene store contract.
//!
//! # Responsibility
//! - Define the store operations the marker core depends on.
//! - Provide the change notification types delivered to subscribers.
//!
//! # Invariants
//! - `get_items` returns items in the store's native enumeration order; that
//!   order is the slot assignment order for markers of one parent.
//! - `update_items` hands the mutator the current copies of the requested
//!   items. Implementations should keep request order, but callers must
//!   verify alignment by id.
//! - Deleting an unknown id is a no-op.
//! - A successful mutation is announced to every live subscription.

use crate::db::DbError;
use crate::model::item::{ItemId, ItemValidationError, SceneItem};
use std::error::Error;
use std::fmt::{Display, Formatter};

mod feed;
pub mod sqlite;

pub use feed::{ChangeEvent, ChangeFeed, Subscription};
pub use sqlite::SqliteSceneStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Store transport and data errors.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Serialization(serde_json::Error),
    Validation(ItemValidationError),
    DuplicateId(ItemId),
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "scene item serialization failed: {err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::DuplicateId(id) => write!(f, "scene item already exists: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted scene data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::DuplicateId(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

impl From<ItemValidationError> for StoreError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Shared scene store interface.
pub trait SceneStore {
    /// Returns every item matching `predicate`, in enumeration order.
    fn get_items(&self, predicate: &dyn Fn(&SceneItem) -> bool) -> StoreResult<Vec<SceneItem>>;
    /// Returns the items with the given ids; unknown ids are omitted.
    fn get_items_by_ids(&self, ids: &[ItemId]) -> StoreResult<Vec<SceneItem>>;
    fn add_items(&self, items: &[SceneItem]) -> StoreResult<()>;
    /// Loads the requested items, lets `mutator` edit them in place and
    /// persists the result.
    fn update_items(
        &self,
        ids: &[ItemId],
        mutator: &mut dyn FnMut(&mut [SceneItem]),
    ) -> StoreResult<()>;
    fn delete_items(&self, ids: &[ItemId]) -> StoreResult<()>;
    /// Opens a change subscription; dropping it unsubscribes.
    fn subscribe(&self) -> Subscription;
    /// Scene grid resolution in scene units per cell.
    fn get_dpi(&self) -> StoreResult<f64>;
}

impl<T: SceneStore + ?Sized> SceneStore for &T {
    fn get_items(&self, predicate: &dyn Fn(&SceneItem) -> bool) -> StoreResult<Vec<SceneItem>> {
        (**self).get_items(predicate)
    }

    fn get_items_by_ids(&self, ids: &[ItemId]) -> StoreResult<Vec<SceneItem>> {
        (**self).get_items_by_ids(ids)
    }

    fn add_items(&self, items: &[SceneItem]) -> StoreResult<()> {
        (**self).add_items(items)
    }

    fn update_items(
        &self,
        ids: &[ItemId],
        mutator: &mut dyn FnMut(&mut [SceneItem]),
    ) -> StoreResult<()> {
        (**self).update_items(ids, mutator)
    }

    fn delete_items(&self, ids: &[ItemId]) -> StoreResult<()> {
        (**self).delete_items(ids)
    }

    fn subscribe(&self) -> Subscription {
        (**self).subscribe()
    }

    fn get_dpi(&self) -> StoreResult<f64> {
        (**self).get_dpi()
    }
}
