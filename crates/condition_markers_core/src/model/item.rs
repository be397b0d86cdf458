//! Scene item record exchanged with the shared scene store.
//!
//! # Responsibility
//! - Define the generic item shape every store implementation persists.
//! - Keep serialized field names aligned with the scene wire format
//!   (`attachedTo`, `disableAttachmentBehavior`, ...).
//!
//! # Invariants
//! - `id` is stable, non-nil and never reused for another item.
//! - Transform fields (`position`, `rotation`, `scale`) are always finite.
//! - `metadata` keys are namespaced by their owning extension.

use crate::model::geometry::Vector2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of one scene item.
pub type ItemId = Uuid;

/// Namespaced metadata bag attached to every item.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Scene layer an item is drawn on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Layer {
    Map,
    Prop,
    Mount,
    Character,
    Attachment,
    Note,
    Text,
    Drawing,
    Other,
}

/// Parent transform channels an attached item may opt out of inheriting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttachmentBehavior {
    Visible,
    Scale,
    Rotation,
    Position,
    Locked,
    Copy,
    Delete,
}

/// Image payload of an image item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    /// Native pixel width.
    pub width: f64,
    /// Native pixel height.
    pub height: f64,
    pub mime: String,
    pub url: String,
}

/// Placement of an image inside its own grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageGrid {
    /// Anchor point of the image in image pixels.
    pub offset: Vector2,
    /// Image pixels per grid cell. Positive by scene invariant.
    pub dpi: f64,
}

/// One item of the shared scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneItem {
    pub id: ItemId,
    pub name: String,
    pub layer: Layer,
    pub position: Vector2,
    /// Degrees.
    pub rotation: f64,
    /// Negative components mean the item is flipped on that axis.
    pub scale: Vector2,
    pub visible: bool,
    pub locked: bool,
    /// Non-owning back-reference to a parent item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attached_to: Option<ItemId>,
    #[serde(default)]
    pub disable_hit: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid: Option<ImageGrid>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disable_attachment_behavior: Vec<AttachmentBehavior>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl SceneItem {
    /// Creates a bare item with a generated id and identity transform.
    pub fn new(name: impl Into<String>, layer: Layer) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            layer,
            position: Vector2::ZERO,
            rotation: 0.0,
            scale: Vector2::ONE,
            visible: true,
            locked: false,
            attached_to: None,
            disable_hit: false,
            image: None,
            grid: None,
            disable_attachment_behavior: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    /// Creates an image item with a generated id.
    pub fn new_image(
        name: impl Into<String>,
        layer: Layer,
        image: ImageContent,
        grid: ImageGrid,
    ) -> Self {
        let mut item = Self::new(name, layer);
        item.image = Some(image);
        item.grid = Some(grid);
        item
    }

    /// Returns whether this item carries an image payload and grid.
    pub fn is_image(&self) -> bool {
        self.image.is_some() && self.grid.is_some()
    }

    /// Validates store-level invariants.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        if self.id.is_nil() {
            return Err(ItemValidationError::NilId);
        }
        if !self.position.is_finite() {
            return Err(ItemValidationError::NonFiniteTransform {
                id: self.id,
                field: "position",
            });
        }
        if !self.rotation.is_finite() {
            return Err(ItemValidationError::NonFiniteTransform {
                id: self.id,
                field: "rotation",
            });
        }
        if !self.scale.is_finite() {
            return Err(ItemValidationError::NonFiniteTransform {
                id: self.id,
                field: "scale",
            });
        }
        Ok(())
    }
}

/// Store-level item validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    NilId,
    NonFiniteTransform { id: ItemId, field: &'static str },
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NilId => write!(f, "item id must not be nil"),
            Self::NonFiniteTransform { id, field } => {
                write!(f, "item {id} has a non-finite {field}")
            }
        }
    }
}

impl Error for ItemValidationError {}

#[cfg(test)]
mod tests {
    use super::{AttachmentBehavior, ItemValidationError, Layer, SceneItem};
    use crate::model::geometry::Vector2;

    #[test]
    fn serializes_with_scene_wire_names() {
        let parent = SceneItem::new("Goblin", Layer::Character);
        let mut item = SceneItem::new("Condition Marker - Blinded", Layer::Attachment);
        item.attached_to = Some(parent.id);
        item.disable_attachment_behavior = vec![AttachmentBehavior::Rotation];

        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["attachedTo"], parent.id.to_string());
        assert_eq!(json["layer"], "ATTACHMENT");
        assert_eq!(json["disableAttachmentBehavior"][0], "ROTATION");
        assert_eq!(json["disableHit"], false);

        let decoded: SceneItem = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn validate_rejects_non_finite_transform() {
        let mut item = SceneItem::new("broken", Layer::Prop);
        item.position = Vector2::new(f64::NAN, 0.0);
        assert_eq!(
            item.validate().unwrap_err(),
            ItemValidationError::NonFiniteTransform {
                id: item.id,
                field: "position"
            }
        );
    }

    #[test]
    fn validate_rejects_nil_id() {
        let mut item = SceneItem::new("nil", Layer::Prop);
        item.id = uuid::Uuid::nil();
        assert_eq!(item.validate().unwrap_err(), ItemValidationError::NilId);
    }
}
