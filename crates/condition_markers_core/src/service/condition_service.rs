//! Condition toggle use-case service.
//!
//! # Responsibility
//! - Enable, disable and toggle one condition across a token selection.
//! - Report which conditions the current selection carries.
//!
//! # Invariants
//! - At most one marker exists per (token, condition) pair; enabling an
//!   already present pair is a no-op for that token.
//! - New markers take the next free slot (`attached marker count`).
//! - Disabling re-packs the remaining markers of every affected token.
//! - Non-token ids in the selection are ignored.

use crate::config::MarkerSettings;
use crate::model::item::ItemId;
use crate::model::marker::{build_condition_marker, Marker};
use crate::model::token::Token;
use crate::query::{list_managed_markers, markers_by_parent};
use crate::reconcile::reconcile_token_ids;
use crate::store::{SceneStore, StoreError};
use crate::sync::{apply_creates, apply_deletes, apply_updates, CreateReport, UpdateReport};
use log::{info, warn};
use std::collections::{BTreeSet, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum ConditionServiceError {
    /// Condition label is blank after trim.
    EmptyCondition,
    Store(StoreError),
}

impl Display for ConditionServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCondition => write!(f, "condition must not be blank"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ConditionServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::EmptyCondition => None,
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for ConditionServiceError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

pub type ConditionResult<T> = Result<T, ConditionServiceError>;

/// Result of removing one condition from a selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisableReport {
    pub deleted: usize,
    /// Re-pack writes for the remaining markers of affected tokens.
    pub repack: UpdateReport,
}

/// What `toggle_condition` ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    Enabled(CreateReport),
    Disabled(DisableReport),
}

pub struct ConditionService<S: SceneStore> {
    store: S,
    settings: MarkerSettings,
}

impl<S: SceneStore> ConditionService<S> {
    pub fn new(store: S, settings: MarkerSettings) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &MarkerSettings {
        &self.settings
    }

    /// Returns the conditions carried by any selected token.
    pub fn active_conditions(&self, selection: &[ItemId]) -> ConditionResult<BTreeSet<String>> {
        let markers = list_managed_markers(&self.store, None, &self.settings)?;
        Ok(markers
            .into_iter()
            .filter(|marker| {
                marker
                    .attached_to
                    .is_some_and(|parent_id| selection.contains(&parent_id))
            })
            .filter_map(|marker| marker.condition)
            .collect())
    }

    /// Adds a `condition` marker to every selected token lacking one.
    pub fn enable_condition(
        &self,
        selection: &[ItemId],
        condition: &str,
    ) -> ConditionResult<CreateReport> {
        let condition = normalize_condition(condition)?;
        let tokens = self.selected_tokens(selection)?;
        let mut grouped = markers_by_parent(list_managed_markers(
            &self.store,
            None,
            &self.settings,
        )?);
        let scene_dpi = self.store.get_dpi()?;

        let mut items = Vec::new();
        for token in &tokens {
            let attached = grouped.remove(&token.id).unwrap_or_default();
            if attached.iter().any(|marker| marker.is_condition(condition)) {
                continue;
            }
            let slot = attached.len();
            match build_condition_marker(condition, token, slot, scene_dpi, &self.settings) {
                Ok(item) => items.push(item),
                Err(err) => warn!(
                    "event=condition_enable module=service status=skip token_id={} error={err}",
                    token.id
                ),
            }
        }

        let report = apply_creates(&self.store, &items, self.settings.max_batch_len)?;
        info!(
            "event=condition_enable module=service status=ok condition={condition} selected={} created={}",
            tokens.len(),
            report.created
        );
        Ok(report)
    }

    /// Removes `condition` markers from the selection and closes slot gaps.
    pub fn disable_condition(
        &self,
        selection: &[ItemId],
        condition: &str,
    ) -> ConditionResult<DisableReport> {
        let condition = normalize_condition(condition)?;
        let matched: Vec<Marker> = list_managed_markers(&self.store, None, &self.settings)?
            .into_iter()
            .filter(|marker| {
                marker.is_condition(condition)
                    && marker
                        .attached_to
                        .is_some_and(|parent_id| selection.contains(&parent_id))
            })
            .collect();

        let ids: Vec<ItemId> = matched.iter().map(|marker| marker.id).collect();
        let mut affected: Vec<ItemId> = Vec::new();
        for parent_id in matched.iter().filter_map(|marker| marker.attached_to) {
            if !affected.contains(&parent_id) {
                affected.push(parent_id);
            }
        }

        apply_deletes(&self.store, &ids)?;
        let updates = reconcile_token_ids(&self.store, &affected, &self.settings)?;
        let repack = apply_updates(&self.store, &updates)?;

        info!(
            "event=condition_disable module=service status=ok condition={condition} deleted={} repacked={}",
            ids.len(),
            repack.applied.len()
        );
        Ok(DisableReport {
            deleted: ids.len(),
            repack,
        })
    }

    /// Disables `condition` when any selected token carries it, otherwise
    /// enables it on the whole selection.
    pub fn toggle_condition(
        &self,
        selection: &[ItemId],
        condition: &str,
    ) -> ConditionResult<ToggleOutcome> {
        let normalized = normalize_condition(condition)?;
        if self.active_conditions(selection)?.contains(normalized) {
            self.disable_condition(selection, normalized)
                .map(ToggleOutcome::Disabled)
        } else {
            self.enable_condition(selection, normalized)
                .map(ToggleOutcome::Enabled)
        }
    }

    fn selected_tokens(&self, selection: &[ItemId]) -> ConditionResult<Vec<Token>> {
        let mut seen = HashSet::new();
        Ok(self
            .store
            .get_items_by_ids(selection)?
            .iter()
            .filter_map(Token::from_item)
            .filter(|token| seen.insert(token.id))
            .collect())
    }
}

fn normalize_condition(condition: &str) -> ConditionResult<&str> {
    let trimmed = condition.trim();
    if trimmed.is_empty() {
        return Err(ConditionServiceError::EmptyCondition);
    }
    Ok(trimmed)
}
