//! Marker transform engine.
//!
//! # Responsibility
//! - Compute a marker's position, scale and rotation from its parent token,
//!   its slot index and the scene grid resolution.
//!
//! # Invariants
//! - All functions are pure and deterministic.
//! - Slots fill a fixed-column grid laid over the parent image; cell spacing is
//!   `image_width / columns` regardless of the image aspect ratio.
//! - Marker scale is isotropic: the parent's x scale drives both axes.
//! - `FlipImmune` placement ignores parent flips and rotation and always
//!   yields rotation `0`.

use crate::model::geometry::Vector2;
use crate::model::token::Token;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// How parent flips and rotation carry over to a marker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformPolicy {
    /// Absolute parent scale, no rotation; marker rotation forced to `0`.
    ///
    /// Used by every automatic re-layout.
    #[default]
    FlipImmune,
    /// Signed parent scale, offset rotated with the parent; marker rotation
    /// copies the parent rotation.
    FollowParent,
}

/// Full placement of one marker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerTransform {
    pub position: Vector2,
    /// Degrees.
    pub rotation: f64,
    pub scale: Vector2,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformError {
    /// Parent grid dpi or scene dpi is zero, negative or non-finite.
    DegenerateGrid { grid_dpi: f64, scene_dpi: f64 },
    /// Marker grid has no columns.
    NoColumns,
}

impl Display for TransformError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DegenerateGrid {
                grid_dpi,
                scene_dpi,
            } => write!(
                f,
                "degenerate grid: parent dpi {grid_dpi}, scene dpi {scene_dpi}"
            ),
            Self::NoColumns => write!(f, "marker grid must have at least one column"),
        }
    }
}

impl Error for TransformError {}

/// Grid cell of `slot` in a grid with `columns` columns.
pub fn slot_cell(slot: usize, columns: usize) -> Vector2 {
    Vector2::new((slot % columns) as f64, (slot / columns) as f64)
}

/// Computes the scene position of the marker at `slot`.
///
/// # Algorithm
/// 1. Map `slot` onto a `columns`-wide grid.
/// 2. Convert the cell to image pixels (`image_width / columns` per cell).
/// 3. Re-base onto the parent anchor by subtracting `grid.offset`.
/// 4. Convert image pixels to scene units (`scene_dpi / grid.dpi`).
/// 5. Apply parent scale (and rotation for `FollowParent`).
/// 6. Translate by the parent position.
///
/// # Errors
/// - `TransformError::DegenerateGrid` for unusable dpi values.
/// - `TransformError::NoColumns` when `columns == 0`.
pub fn compute_position(
    parent: &Token,
    slot: usize,
    scene_dpi: f64,
    columns: usize,
    policy: TransformPolicy,
) -> Result<Vector2, TransformError> {
    ensure_grid(parent, scene_dpi)?;
    if columns == 0 {
        return Err(TransformError::NoColumns);
    }

    let cell_spacing = parent.image_width / columns as f64;
    let mut offset = slot_cell(slot, columns) * cell_spacing;
    offset = offset - parent.grid.offset;
    offset = offset * (scene_dpi / parent.grid.dpi);

    offset = match policy {
        TransformPolicy::FlipImmune => offset.multiply(parent.scale.abs()),
        TransformPolicy::FollowParent => offset
            .multiply(parent.scale)
            .rotate(Vector2::ZERO, parent.rotation),
    };

    Ok(offset + parent.position)
}

/// Computes the marker scale relative to its native size.
///
/// # Errors
/// - `TransformError::DegenerateGrid` when the parent grid dpi is unusable.
pub fn compute_scale(parent: &Token, policy: TransformPolicy) -> Result<Vector2, TransformError> {
    if !is_positive(parent.grid.dpi) {
        return Err(TransformError::DegenerateGrid {
            grid_dpi: parent.grid.dpi,
            scene_dpi: f64::NAN,
        });
    }
    let magnitude = match policy {
        TransformPolicy::FlipImmune => parent.scale.x.abs(),
        TransformPolicy::FollowParent => parent.scale.x,
    };
    let size = parent.image_width / parent.grid.dpi;
    Ok(Vector2::splat(magnitude * size))
}

/// Computes the marker rotation in degrees.
pub fn compute_rotation(parent: &Token, policy: TransformPolicy) -> f64 {
    match policy {
        TransformPolicy::FlipImmune => 0.0,
        TransformPolicy::FollowParent => parent.rotation,
    }
}

/// Computes position, rotation and scale together.
pub fn compute_transform(
    parent: &Token,
    slot: usize,
    scene_dpi: f64,
    columns: usize,
    policy: TransformPolicy,
) -> Result<MarkerTransform, TransformError> {
    Ok(MarkerTransform {
        position: compute_position(parent, slot, scene_dpi, columns, policy)?,
        rotation: compute_rotation(parent, policy),
        scale: compute_scale(parent, policy)?,
    })
}

fn ensure_grid(parent: &Token, scene_dpi: f64) -> Result<(), TransformError> {
    if is_positive(parent.grid.dpi) && is_positive(scene_dpi) {
        return Ok(());
    }
    Err(TransformError::DegenerateGrid {
        grid_dpi: parent.grid.dpi,
        scene_dpi,
    })
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

#[cfg(test)]
mod tests {
    use super::{
        compute_position, compute_rotation, compute_scale, compute_transform, slot_cell,
        TransformError, TransformPolicy,
    };
    use crate::model::geometry::Vector2;
    use crate::model::item::ImageGrid;
    use crate::model::token::Token;
    use uuid::Uuid;

    const COLUMNS: usize = 5;

    fn token(position: Vector2, scale: Vector2, rotation: f64) -> Token {
        Token {
            id: Uuid::new_v4(),
            position,
            rotation,
            scale,
            image_width: 150.0,
            grid: ImageGrid {
                offset: Vector2::ZERO,
                dpi: 150.0,
            },
            visible: true,
        }
    }

    fn assert_close(actual: Vector2, expected: Vector2) {
        assert!(
            (actual.x - expected.x).abs() < 1e-9 && (actual.y - expected.y).abs() < 1e-9,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn first_slot_sits_on_parent_anchor() {
        let parent = token(Vector2::new(100.0, 100.0), Vector2::ONE, 0.0);
        let transform =
            compute_transform(&parent, 0, 150.0, COLUMNS, TransformPolicy::FlipImmune).unwrap();
        assert_eq!(transform.position, Vector2::new(100.0, 100.0));
        assert_eq!(transform.scale, Vector2::new(1.0, 1.0));
        assert_eq!(transform.rotation, 0.0);
    }

    #[test]
    fn slots_wrap_after_five_columns() {
        assert_eq!(slot_cell(4, COLUMNS), Vector2::new(4.0, 0.0));
        assert_eq!(slot_cell(5, COLUMNS), Vector2::new(0.0, 1.0));
        assert_eq!(slot_cell(12, COLUMNS), Vector2::new(2.0, 2.0));

        let parent = token(Vector2::new(100.0, 100.0), Vector2::ONE, 0.0);
        let sixth =
            compute_position(&parent, 6, 150.0, COLUMNS, TransformPolicy::FlipImmune).unwrap();
        assert_eq!(sixth, Vector2::new(130.0, 130.0));
    }

    #[test]
    fn offset_and_dpi_rebase_into_scene_units() {
        let mut parent = token(Vector2::new(0.0, 0.0), Vector2::ONE, 0.0);
        parent.image_width = 300.0;
        parent.grid = ImageGrid {
            offset: Vector2::new(150.0, 150.0),
            dpi: 300.0,
        };
        // cell spacing 60px; slot 1 -> (60, 0) - (150, 150) = (-90, -150); * 0.5
        let position =
            compute_position(&parent, 1, 150.0, COLUMNS, TransformPolicy::FlipImmune).unwrap();
        assert_eq!(position, Vector2::new(-45.0, -75.0));
    }

    #[test]
    fn flip_immune_ignores_sign_and_rotation() {
        let upright = token(Vector2::new(10.0, 20.0), Vector2::new(2.0, 1.5), 0.0);
        let flipped = token(Vector2::new(10.0, 20.0), Vector2::new(-2.0, -1.5), 73.0);
        for slot in 0..12 {
            let a = compute_transform(&upright, slot, 140.0, COLUMNS, TransformPolicy::FlipImmune)
                .unwrap();
            let b = compute_transform(&flipped, slot, 140.0, COLUMNS, TransformPolicy::FlipImmune)
                .unwrap();
            assert_eq!(a, b, "slot {slot}");
            assert_eq!(b.rotation, 0.0);
        }
    }

    #[test]
    fn follow_parent_mirrors_and_rotates() {
        let parent = token(Vector2::new(100.0, 100.0), Vector2::new(-1.0, 1.0), 90.0);
        let position =
            compute_position(&parent, 1, 150.0, COLUMNS, TransformPolicy::FollowParent).unwrap();
        // (30, 0) mirrored -> (-30, 0), rotated 90deg -> (0, -30)
        assert_close(position, Vector2::new(100.0, 70.0));
        assert_eq!(
            compute_rotation(&parent, TransformPolicy::FollowParent),
            90.0
        );
        assert_eq!(
            compute_scale(&parent, TransformPolicy::FollowParent).unwrap(),
            Vector2::new(-1.0, -1.0)
        );
    }

    #[test]
    fn scale_is_isotropic_from_x_axis() {
        let parent = token(Vector2::ZERO, Vector2::new(-3.0, 0.5), 0.0);
        let scale = compute_scale(&parent, TransformPolicy::FlipImmune).unwrap();
        assert_eq!(scale.x, scale.y);
        assert_eq!(scale, Vector2::new(3.0, 3.0));
    }

    #[test]
    fn computation_is_deterministic() {
        let parent = token(Vector2::new(12.5, -7.25), Vector2::new(1.3, -0.7), 33.0);
        for policy in [TransformPolicy::FlipImmune, TransformPolicy::FollowParent] {
            let first = compute_transform(&parent, 7, 96.0, COLUMNS, policy).unwrap();
            let second = compute_transform(&parent, 7, 96.0, COLUMNS, policy).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn degenerate_grid_is_rejected() {
        let mut parent = token(Vector2::ZERO, Vector2::ONE, 0.0);
        parent.grid.dpi = 0.0;
        assert!(matches!(
            compute_position(&parent, 0, 150.0, COLUMNS, TransformPolicy::FlipImmune),
            Err(TransformError::DegenerateGrid { .. })
        ));
        assert!(matches!(
            compute_scale(&parent, TransformPolicy::FlipImmune),
            Err(TransformError::DegenerateGrid { .. })
        ));

        let parent = token(Vector2::ZERO, Vector2::ONE, 0.0);
        assert!(matches!(
            compute_position(&parent, 0, 0.0, COLUMNS, TransformPolicy::FlipImmune),
            Err(TransformError::DegenerateGrid { .. })
        ));
        assert_eq!(
            compute_position(&parent, 0, 150.0, 0, TransformPolicy::FlipImmune),
            Err(TransformError::NoColumns)
        );
    }
}
