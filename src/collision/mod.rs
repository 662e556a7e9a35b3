//! Collision subsystem
//!
//! Shapes are registered with a [`CollisionGrid`], which owns them and hands
//! back stable [`ShapeHandle`]s. Gameplay moves shapes through the grid, calls
//! [`CollisionGrid::tick`] once per frame, then reads each shape's
//! `collided_this_frame` list to react.
//!
//! - Geometry and narrow phase are pure functions of the shapes involved
//! - Resolution order is driven by a seeded RNG, so a run is reproducible

pub mod category;
pub mod geometry;
pub mod grid;
pub mod handler;
pub mod narrow;
pub mod shape;

pub use category::{CategorySet, GameCategory};
pub use geometry::{Aabb, Circle, OrientedRect, Primitive, RectEdge};
pub use grid::{BucketCoord, CollisionGrid, CollisionStats, ShapeHandle};
pub use handler::{HandlerTable, ResponseHandler};
pub use narrow::{
    Contact, SatReport, circle_circle, circle_rect, rect_rect, rect_rect_report, test_primitives,
    test_shapes,
};
pub use shape::{CollisionState, Composite, EntityId, Membership, Shape, ShapeKind};
