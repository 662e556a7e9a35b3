//! Castle collision - spatial hash collision for a 2D tower-defense game
//!
//! Core modules:
//! - `collision`: Shapes, narrow-phase tests, response handlers and the grid
//! - `settings`: Grid configuration (JSON)

pub mod collision;
pub mod settings;

pub use collision::{
    CategorySet, CollisionGrid, CollisionStats, GameCategory, HandlerTable, ResponseHandler,
    Shape, ShapeHandle,
};
pub use settings::{ConfigError, GridSettings};

use glam::Vec2;

/// Collision configuration constants
pub mod consts {
    /// Side length of one grid bucket in pixels
    pub const BUCKET_PIXEL_SIZE: f32 = 64.0;
    /// Resolution sub-passes allowed per tick before overlaps are left for next tick
    pub const MAX_RESOLUTION_PASSES: usize = 15;
    /// Per-component tolerance when deciding two SAT normals are the same axis
    pub const NORMAL_MATCH_TOLERANCE: f32 = 0.05;
    /// Default RNG seed for resolution ordering
    pub const DEFAULT_SEED: u64 = 0x00C4_57E1;

    /// Default screen the grid covers
    pub const SCREEN_WIDTH: f32 = 1280.0;
    pub const SCREEN_HEIGHT: f32 = 768.0;
}

/// Normalized angle to [-π, π); non-finite angles become 0
#[inline]
pub fn normalize_angle(angle: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    if !angle.is_finite() {
        return 0.0;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    // rem_euclid may round up to TAU
    if wrapped >= PI { wrapped - TAU } else { wrapped }
}

/// Rotate a vector counter-clockwise (in y-up terms) by `angle` radians
#[inline]
pub fn rotate_vec(v: Vec2, angle: f32) -> Vec2 {
    let (sin, cos) = angle.sin_cos();
    Vec2::new(v.x * cos - v.y * sin, v.x * sin + v.y * cos)
}

/// True when two unit normals point the same way within `NORMAL_MATCH_TOLERANCE`
#[inline]
pub fn normals_match(a: Vec2, b: Vec2) -> bool {
    (a.x - b.x).abs() < consts::NORMAL_MATCH_TOLERANCE
        && (a.y - b.y).abs() < consts::NORMAL_MATCH_TOLERANCE
}
