//! Managed marker lookup.
//!
//! # Invariants
//! - Results keep the store's enumeration order; for one parent that order is
//!   the slot assignment order.
//! - Items with malformed reserved metadata are treated as unmanaged and
//!   reported through a warning, never as an error.

use crate::config::MarkerSettings;
use crate::model::item::{ItemId, SceneItem};
use crate::model::marker::Marker;
use crate::store::{SceneStore, StoreResult};
use log::warn;
use std::collections::HashMap;

/// Lists managed markers, optionally restricted to one parent.
pub fn list_managed_markers<S: SceneStore + ?Sized>(
    store: &S,
    parent: Option<ItemId>,
    settings: &MarkerSettings,
) -> StoreResult<Vec<Marker>> {
    let key = settings.metadata_key.as_str();
    let items = store.get_items(&|item: &SceneItem| {
        item.metadata.contains_key(key)
            && parent.map_or(true, |parent_id| item.attached_to == Some(parent_id))
    })?;

    let mut markers = Vec::with_capacity(items.len());
    for item in &items {
        match Marker::from_item(item, settings) {
            Ok(Some(marker)) => markers.push(marker),
            Ok(None) => {}
            Err(err) => warn!(
                "event=marker_decode module=query status=skip item_id={} error={err}",
                item.id
            ),
        }
    }
    Ok(markers)
}

/// Groups markers by parent id, keeping relative order inside each group.
///
/// Markers without a parent are dropped.
pub fn markers_by_parent(markers: Vec<Marker>) -> HashMap<ItemId, Vec<Marker>> {
    let mut grouped: HashMap<ItemId, Vec<Marker>> = HashMap::new();
    for marker in markers {
        if let Some(parent_id) = marker.attached_to {
            grouped.entry(parent_id).or_default().push(marker);
        }
    }
    grouped
}
