//! Condition marker model and its metadata boundary.
//!
//! # Responsibility
//! - Decode the reserved metadata entry once when reading scene items.
//! - Encode marker metadata and names once when building new marker items.
//!
//! # Invariants
//! - A managed marker carries `{ "enabled": true }` under the reserved key.
//! - Marker names follow `<prefix><condition>`; the condition is recovered by
//!   stripping the prefix, never by substring search.
//! - Built markers are locked, attached to their parent and isotropic.

use crate::config::MarkerSettings;
use crate::model::geometry::Vector2;
use crate::model::item::{ImageContent, ImageGrid, ItemId, Layer, Metadata, SceneItem};
use crate::model::token::Token;
use crate::transform::{compute_transform, TransformError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static IMAGE_SLUG_STRIP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"['\-]").expect("valid slug strip regex"));
static IMAGE_SLUG_SPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" ").expect("valid slug space regex"));

/// Typed shape of the reserved metadata entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerMetadata {
    #[serde(default)]
    pub enabled: bool,
}

impl MarkerMetadata {
    pub fn enabled() -> Self {
        Self { enabled: true }
    }
}

/// Reserved metadata entry exists but does not match `MarkerMetadata`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerMetadataError {
    NotAnObject { key: String },
    Malformed { key: String, message: String },
}

impl Display for MarkerMetadataError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject { key } => write!(f, "metadata entry `{key}` is not an object"),
            Self::Malformed { key, message } => {
                write!(f, "metadata entry `{key}` is malformed: {message}")
            }
        }
    }
}

impl Error for MarkerMetadataError {}

/// Decodes the reserved metadata entry.
///
/// Returns `Ok(None)` when the key is absent.
pub fn decode_marker_metadata(
    metadata: &Metadata,
    key: &str,
) -> Result<Option<MarkerMetadata>, MarkerMetadataError> {
    let Some(value) = metadata.get(key) else {
        return Ok(None);
    };
    if !value.is_object() {
        return Err(MarkerMetadataError::NotAnObject {
            key: key.to_string(),
        });
    }
    serde_json::from_value(value.clone())
        .map(Some)
        .map_err(|err| MarkerMetadataError::Malformed {
            key: key.to_string(),
            message: err.to_string(),
        })
}

/// Writes the reserved metadata entry into `metadata`.
pub fn encode_marker_metadata(metadata: &mut Metadata, key: &str, value: MarkerMetadata) {
    metadata.insert(
        key.to_string(),
        serde_json::json!({ "enabled": value.enabled }),
    );
}

/// Builds the display name of a condition marker.
pub fn marker_name(prefix: &str, condition: &str) -> String {
    format!("{prefix}{condition}")
}

/// Recovers the condition label from a marker name.
pub fn condition_from_marker_name<'a>(prefix: &str, name: &'a str) -> Option<&'a str> {
    name.strip_prefix(prefix).filter(|value| !value.is_empty())
}

/// Derives the marker image URL from the condition label.
///
/// Lower-cases the label, drops apostrophes and hyphens and replaces spaces
/// with underscores.
pub fn marker_image_url(base_url: &str, condition: &str) -> String {
    let lowered = condition.to_lowercase();
    let stripped = IMAGE_SLUG_STRIP_RE.replace_all(&lowered, "");
    let slug = IMAGE_SLUG_SPACE_RE.replace_all(&stripped, "_");
    format!("{}/{slug}.png", base_url.trim_end_matches('/'))
}

/// Managed marker decoded from a scene item.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub id: ItemId,
    pub attached_to: Option<ItemId>,
    pub position: Vector2,
    pub rotation: f64,
    pub scale: Vector2,
    pub name: String,
    /// Condition label recovered from `name`; `None` for foreign naming.
    pub condition: Option<String>,
    pub visible: bool,
    pub locked: bool,
}

impl Marker {
    /// Decodes a managed marker.
    ///
    /// Returns `Ok(None)` when the item is not a managed marker (key absent
    /// or `enabled == false`).
    pub fn from_item(
        item: &SceneItem,
        settings: &MarkerSettings,
    ) -> Result<Option<Self>, MarkerMetadataError> {
        let metadata = decode_marker_metadata(&item.metadata, &settings.metadata_key)?;
        if !metadata.is_some_and(|value| value.enabled) {
            return Ok(None);
        }
        Ok(Some(Self {
            id: item.id,
            attached_to: item.attached_to,
            position: item.position,
            rotation: item.rotation,
            scale: item.scale,
            name: item.name.clone(),
            condition: condition_from_marker_name(&settings.marker_name_prefix, &item.name)
                .map(str::to_string),
            visible: item.visible,
            locked: item.locked,
        }))
    }

    /// Returns whether this marker represents `condition`.
    pub fn is_condition(&self, condition: &str) -> bool {
        self.condition.as_deref() == Some(condition)
    }
}

/// Builds a new marker item for `condition` on `parent` at `slot`.
///
/// # Contract
/// - Placement follows `settings.creation_policy`.
/// - The marker image grid maps the condition image onto
///   `marker_size_fraction` of one scene grid cell.
///
/// # Errors
/// - `TransformError::DegenerateGrid` when parent or scene dpi is unusable.
pub fn build_condition_marker(
    condition: &str,
    parent: &Token,
    slot: usize,
    scene_dpi: f64,
    settings: &MarkerSettings,
) -> Result<SceneItem, TransformError> {
    let transform = compute_transform(
        parent,
        slot,
        scene_dpi,
        settings.markers_per_row,
        settings.creation_policy,
    )?;

    let desired_length = scene_dpi * settings.marker_size_fraction;
    let image = ImageContent {
        width: settings.condition_dpi,
        height: settings.condition_dpi,
        mime: "image/png".to_string(),
        url: marker_image_url(&settings.image_base_url, condition),
    };
    let grid = ImageGrid {
        offset: Vector2::ZERO,
        dpi: (scene_dpi * settings.condition_dpi) / desired_length,
    };

    let mut item = SceneItem::new_image(
        marker_name(&settings.marker_name_prefix, condition),
        Layer::Attachment,
        image,
        grid,
    );
    item.position = transform.position;
    item.rotation = transform.rotation;
    item.scale = transform.scale;
    item.attached_to = Some(parent.id);
    item.locked = true;
    item.disable_hit = false;
    item.visible = parent.visible;
    encode_marker_metadata(
        &mut item.metadata,
        &settings.metadata_key,
        MarkerMetadata::enabled(),
    );
    Ok(item)
}

#[cfg(test)]
mod tests {
    use super::{
        build_condition_marker, condition_from_marker_name, decode_marker_metadata,
        marker_image_url, Marker, MarkerMetadata, MarkerMetadataError,
    };
    use crate::config::MarkerSettings;
    use crate::model::geometry::Vector2;
    use crate::model::item::{ImageGrid, Layer, Metadata, SceneItem};
    use crate::model::token::Token;
    use serde_json::json;
    use uuid::Uuid;

    fn token() -> Token {
        Token {
            id: Uuid::new_v4(),
            position: Vector2::new(100.0, 100.0),
            rotation: 45.0,
            scale: Vector2::new(-1.0, 1.0),
            image_width: 150.0,
            grid: ImageGrid {
                offset: Vector2::ZERO,
                dpi: 150.0,
            },
            visible: false,
        }
    }

    #[test]
    fn decodes_enabled_flag_under_reserved_key() {
        let settings = MarkerSettings::default();
        let mut metadata = Metadata::new();
        assert_eq!(
            decode_marker_metadata(&metadata, &settings.metadata_key).unwrap(),
            None
        );

        metadata.insert(settings.metadata_key.clone(), json!({ "enabled": true }));
        assert_eq!(
            decode_marker_metadata(&metadata, &settings.metadata_key).unwrap(),
            Some(MarkerMetadata { enabled: true })
        );
    }

    #[test]
    fn rejects_non_object_and_mistyped_entries() {
        let key = "com.condition-markers/metadata";
        let mut metadata = Metadata::new();
        metadata.insert(key.to_string(), json!(true));
        assert!(matches!(
            decode_marker_metadata(&metadata, key),
            Err(MarkerMetadataError::NotAnObject { .. })
        ));

        metadata.insert(key.to_string(), json!({ "enabled": "yes" }));
        assert!(matches!(
            decode_marker_metadata(&metadata, key),
            Err(MarkerMetadataError::Malformed { .. })
        ));
    }

    #[test]
    fn disabled_or_foreign_items_are_not_markers() {
        let settings = MarkerSettings::default();
        let mut item = SceneItem::new("Condition Marker - Prone", Layer::Attachment);
        assert_eq!(Marker::from_item(&item, &settings).unwrap(), None);

        item.metadata
            .insert(settings.metadata_key.clone(), json!({ "enabled": false }));
        assert_eq!(Marker::from_item(&item, &settings).unwrap(), None);

        item.metadata.insert(
            "com.other-extension/metadata".to_string(),
            json!({ "enabled": true }),
        );
        assert_eq!(Marker::from_item(&item, &settings).unwrap(), None);
    }

    #[test]
    fn condition_is_recovered_by_prefix() {
        assert_eq!(
            condition_from_marker_name("Condition Marker - ", "Condition Marker - Blinded"),
            Some("Blinded")
        );
        assert_eq!(
            condition_from_marker_name("Condition Marker - ", "Blinded"),
            None
        );
        assert_eq!(
            condition_from_marker_name("Condition Marker - ", "Condition Marker - "),
            None
        );
    }

    #[test]
    fn image_url_slug_strips_punctuation() {
        assert_eq!(
            marker_image_url("https://assets.test/images/", "Hunter's Mark"),
            "https://assets.test/images/hunters_mark.png"
        );
        assert_eq!(
            marker_image_url("https://assets.test/images", "Half-Cover"),
            "https://assets.test/images/halfcover.png"
        );
    }

    #[test]
    fn built_marker_is_managed_locked_and_attached() {
        let settings = MarkerSettings::default();
        let parent = token();
        let item = build_condition_marker("Blinded", &parent, 0, 150.0, &settings).unwrap();

        assert_eq!(item.name, "Condition Marker - Blinded");
        assert_eq!(item.layer, Layer::Attachment);
        assert_eq!(item.attached_to, Some(parent.id));
        assert!(item.locked);
        assert!(!item.visible);
        assert_eq!(item.rotation, 0.0);
        assert_eq!(item.position, Vector2::new(100.0, 100.0));
        assert_eq!(item.scale, Vector2::new(1.0, 1.0));
        assert!((item.grid.unwrap().dpi - 937.5).abs() < 1e-9);
        let image = item.image.as_ref().unwrap();
        assert_eq!(image.mime, "image/png");
        assert!(image.url.ends_with("/blinded.png"));

        let marker = Marker::from_item(&item, &settings)
            .unwrap()
            .expect("built item decodes as marker");
        assert!(marker.is_condition("Blinded"));
    }
}
