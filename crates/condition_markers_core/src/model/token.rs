//! Token projection of scene items.
//!
//! A token is an image item living on the character or mount layer. Markers
//! attach to tokens; this core never owns or mutates token records.

use crate::model::geometry::Vector2;
use crate::model::item::{ImageGrid, ItemId, Layer, SceneItem};

/// Read-only geometry of a parent token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub id: ItemId,
    pub position: Vector2,
    /// Degrees.
    pub rotation: f64,
    /// Signed; a negative component means the token is flipped.
    pub scale: Vector2,
    /// Native image width in image pixels.
    pub image_width: f64,
    pub grid: ImageGrid,
    pub visible: bool,
}

impl Token {
    /// Returns whether `layer` holds tokens markers may attach to.
    pub fn is_token_layer(layer: Layer) -> bool {
        matches!(layer, Layer::Character | Layer::Mount)
    }

    /// Projects a scene item into a token.
    ///
    /// Returns `None` for items that are not images on a token layer.
    pub fn from_item(item: &SceneItem) -> Option<Self> {
        if !Self::is_token_layer(item.layer) {
            return None;
        }
        let image = item.image.as_ref()?;
        let grid = item.grid?;
        Some(Self {
            id: item.id,
            position: item.position,
            rotation: item.rotation,
            scale: item.scale,
            image_width: image.width,
            grid,
            visible: item.visible,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Token;
    use crate::model::geometry::Vector2;
    use crate::model::item::{ImageContent, ImageGrid, Layer, SceneItem};

    fn image_item(layer: Layer) -> SceneItem {
        SceneItem::new_image(
            "Goblin",
            layer,
            ImageContent {
                width: 300.0,
                height: 300.0,
                mime: "image/png".to_string(),
                url: "https://example.test/goblin.png".to_string(),
            },
            ImageGrid {
                offset: Vector2::new(150.0, 150.0),
                dpi: 300.0,
            },
        )
    }

    #[test]
    fn projects_character_and_mount_images() {
        let character = image_item(Layer::Character);
        let token = Token::from_item(&character).expect("character token");
        assert_eq!(token.id, character.id);
        assert_eq!(token.image_width, 300.0);
        assert_eq!(token.grid.dpi, 300.0);

        assert!(Token::from_item(&image_item(Layer::Mount)).is_some());
    }

    #[test]
    fn ignores_other_layers_and_non_images() {
        assert!(Token::from_item(&image_item(Layer::Prop)).is_none());
        assert!(Token::from_item(&image_item(Layer::Attachment)).is_none());
        assert!(Token::from_item(&SceneItem::new("label", Layer::Character)).is_none());
    }
}
