//! Layout reconciler.
//!
//! # Responsibility
//! - Decide the desired transform of every marker attached to a set of
//!   tokens and report only the markers whose stored transform differs.
//!
//! # Invariants
//! - Slot index is the marker's position among its parent's managed markers
//!   in store enumeration order; it is never read from stored data.
//! - Re-layout always uses `TransformPolicy::FlipImmune`, so emitted
//!   rotation is `0`.
//! - Reconciling an unchanged scene twice emits nothing the second time.
//! - Tokens with unusable grid geometry are skipped, not failed.

use crate::config::MarkerSettings;
use crate::model::geometry::Vector2;
use crate::model::item::ItemId;
use crate::model::marker::Marker;
use crate::model::token::Token;
use crate::query::list_managed_markers;
use crate::store::{SceneStore, StoreResult};
use crate::transform::{compute_transform, TransformPolicy};
use log::{debug, warn};
use std::collections::HashSet;

/// Desired transform for one marker whose stored transform is stale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerUpdate {
    pub marker_id: ItemId,
    pub position: Vector2,
    pub rotation: f64,
    pub scale: Vector2,
}

/// Computes updates for markers attached to `tokens`.
///
/// `markers` must be in store enumeration order. Each token id is handled
/// once; when it appears several times in `tokens` the last copy wins.
pub fn plan_layout(
    tokens: &[Token],
    markers: &[Marker],
    scene_dpi: f64,
    settings: &MarkerSettings,
) -> Vec<MarkerUpdate> {
    let mut seen = HashSet::new();
    let mut latest: Vec<&Token> = tokens
        .iter()
        .rev()
        .filter(|token| seen.insert(token.id))
        .collect();
    latest.reverse();

    let mut updates = Vec::new();
    for token in latest {
        let attached = markers
            .iter()
            .filter(|marker| marker.attached_to == Some(token.id));

        for (slot, marker) in attached.enumerate() {
            let desired = match compute_transform(
                token,
                slot,
                scene_dpi,
                settings.markers_per_row,
                TransformPolicy::FlipImmune,
            ) {
                Ok(transform) => transform,
                Err(err) => {
                    warn!(
                        "event=layout_plan module=reconcile status=skip token_id={} error={err}",
                        token.id
                    );
                    break;
                }
            };

            if marker.position != desired.position
                || marker.rotation != desired.rotation
                || marker.scale != desired.scale
            {
                updates.push(MarkerUpdate {
                    marker_id: marker.id,
                    position: desired.position,
                    rotation: desired.rotation,
                    scale: desired.scale,
                });
            }
        }
    }

    updates
}

/// Reads fresh markers and scene dpi, then plans updates for `tokens`.
pub fn reconcile_tokens<S: SceneStore + ?Sized>(
    store: &S,
    tokens: &[Token],
    settings: &MarkerSettings,
) -> StoreResult<Vec<MarkerUpdate>> {
    if tokens.is_empty() {
        return Ok(Vec::new());
    }
    let markers = list_managed_markers(store, None, settings)?;
    let scene_dpi = store.get_dpi()?;
    let updates = plan_layout(tokens, &markers, scene_dpi, settings);
    debug!(
        "event=layout_plan module=reconcile status=ok tokens={} markers={} updates={}",
        tokens.len(),
        markers.len(),
        updates.len()
    );
    Ok(updates)
}

/// Loads the current state of `token_ids` and plans their re-layout.
///
/// Used after markers were removed, to close the slot gaps they left.
/// Ids that no longer resolve to tokens are ignored.
pub fn reconcile_token_ids<S: SceneStore + ?Sized>(
    store: &S,
    token_ids: &[ItemId],
    settings: &MarkerSettings,
) -> StoreResult<Vec<MarkerUpdate>> {
    let tokens: Vec<Token> = store
        .get_items_by_ids(token_ids)?
        .iter()
        .filter_map(Token::from_item)
        .collect();
    reconcile_tokens(store, &tokens, settings)
}
