//! Change listener driving automatic marker re-layout.
//!
//! # Responsibility
//! - Pick token mutations out of store change notifications.
//! - Run one reconciliation pass per notification and write the result.
//!
//! # Invariants
//! - Notifications are processed strictly one at a time, in delivery order.
//! - Every pass re-reads the changed tokens from the store; the item copies
//!   carried by a notification only identify which tokens moved.
//! - A failing pass aborts and propagates. The failed notification is
//!   consumed; the next notification for the same token re-plans from the
//!   store state at that time.
//! - Marker-only notifications (including the ones this listener causes)
//!   never trigger writes.

use crate::config::MarkerSettings;
use crate::model::item::ItemId;
use crate::model::token::Token;
use crate::reconcile::reconcile_token_ids;
use crate::store::{ChangeEvent, SceneStore, StoreResult, Subscription};
use crate::sync::{apply_updates, UpdateReport};
use log::{error, info};

pub struct ChangeListener {
    settings: MarkerSettings,
}

impl ChangeListener {
    pub fn new(settings: MarkerSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MarkerSettings {
        &self.settings
    }

    /// Returns the ids of tokens touched by `event`, first occurrence order.
    pub fn changed_token_ids(event: &ChangeEvent) -> Vec<ItemId> {
        let mut ids: Vec<ItemId> = Vec::new();
        for token in event.changed.iter().filter_map(Token::from_item) {
            if !ids.contains(&token.id) {
                ids.push(token.id);
            }
        }
        ids
    }

    /// Runs one reconciliation pass for `event` against current store state.
    pub fn handle_change<S: SceneStore + ?Sized>(
        &self,
        store: &S,
        event: &ChangeEvent,
    ) -> StoreResult<UpdateReport> {
        let tokens = Self::changed_token_ids(event);
        if tokens.is_empty() {
            return Ok(UpdateReport::default());
        }

        let updates = reconcile_token_ids(store, &tokens, &self.settings)?;
        let report = apply_updates(store, &updates)?;
        if !report.is_empty() {
            info!(
                "event=reconcile_pass module=listener status=ok tokens={} applied={} skipped={}",
                tokens.len(),
                report.applied.len(),
                report.skipped.len()
            );
        }
        Ok(report)
    }

    /// Processes every queued notification of `subscription`.
    ///
    /// Returns the number of notifications handled. On error the failing
    /// notification is already dequeued; later ones stay queued.
    pub fn drain<S: SceneStore + ?Sized>(
        &self,
        store: &S,
        subscription: &Subscription,
    ) -> StoreResult<usize> {
        let mut handled = 0;
        while let Some(event) = subscription.try_next() {
            if let Err(err) = self.handle_change(store, &event) {
                error!(
                    "event=reconcile_pass module=listener status=error handled={handled} error={err}"
                );
                return Err(err);
            }
            handled += 1;
        }
        Ok(handled)
    }
}
