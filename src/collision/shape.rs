//! Collision shapes and their per-tick collision bookkeeping
//!
//! A `Shape` is what gameplay code builds and hands to the grid. It carries
//! geometry, categories, response handlers, its place in the grid and the
//! transient hit lists the grid rebuilds every tick.

use std::collections::HashMap;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::category::{CategorySet, GameCategory};
use super::geometry::{Aabb, Circle, OrientedRect, Primitive, RectEdge};
use super::grid::{BucketCoord, ShapeHandle};
use super::handler::{HandlerTable, ResponseHandler};
use crate::rotate_vec;

/// Index of the game entity that owns a shape (not a reference to it)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Several primitives moving together at fixed offsets from a centre
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Composite {
    center: Vec2,
    /// Declared footprint, used as the minimum bounding box
    size: Vec2,
    rotation: f32,
    offsets: Vec<Vec2>,
    parts: Vec<Primitive>,
}

impl Composite {
    pub fn new(center: Vec2, size: Vec2) -> Self {
        Self {
            center,
            size,
            rotation: 0.0,
            offsets: Vec::new(),
            parts: Vec::new(),
        }
    }

    /// Add a part; its position is `centre + offset` from now on
    pub fn add_part(&mut self, offset: Vec2, mut part: Primitive) {
        part.set_center(self.center + offset);
        self.offsets.push(offset);
        self.parts.push(part);
    }

    #[inline]
    pub fn parts(&self) -> &[Primitive] {
        &self.parts
    }

    pub fn center(&self) -> Vec2 {
        self.center
    }

    pub fn set_center(&mut self, center: Vec2) {
        self.center = center;
        for (part, offset) in self.parts.iter_mut().zip(&self.offsets) {
            part.set_center(center + *offset);
        }
    }

    /// Spin every offset around the centre and turn rect parts with it
    pub fn rotate(&mut self, delta: f32) {
        self.rotation += delta;
        for (part, offset) in self.parts.iter_mut().zip(self.offsets.iter_mut()) {
            // Same handedness as OrientedRect vertex placement
            *offset = rotate_vec(*offset, -delta);
            if let Primitive::Rect(rect) = part {
                rect.rotate(delta);
            }
            part.set_center(self.center + *offset);
        }
    }

    pub fn aabb(&self) -> Aabb {
        self.parts
            .iter()
            .fold(Aabb::from_center_size(self.center, self.size), |acc, part| {
                acc.union(&part.aabb())
            })
    }
}

/// Geometry of a shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeKind {
    /// A single circle or oriented rectangle
    Simple(Primitive),
    Composite(Composite),
}

impl ShapeKind {
    /// The convex pieces narrow phase runs against
    pub fn primitives(&self) -> &[Primitive] {
        match self {
            ShapeKind::Simple(p) => std::slice::from_ref(p),
            ShapeKind::Composite(c) => c.parts(),
        }
    }

    pub fn center(&self) -> Vec2 {
        match self {
            ShapeKind::Simple(p) => p.center(),
            ShapeKind::Composite(c) => c.center(),
        }
    }

    fn set_center(&mut self, center: Vec2) {
        match self {
            ShapeKind::Simple(p) => p.set_center(center),
            ShapeKind::Composite(c) => c.set_center(center),
        }
    }

    pub fn aabb(&self) -> Aabb {
        match self {
            ShapeKind::Simple(p) => p.aabb(),
            ShapeKind::Composite(c) => c.aabb(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ShapeKind::Simple(Primitive::Circle(_)) => "circle",
            ShapeKind::Simple(Primitive::Rect(_)) => "rect",
            ShapeKind::Composite(_) => "composite",
        }
    }
}

/// How a shape is registered with a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Membership {
    #[default]
    Detached,
    Mobile,
    Static,
}

/// Grid placement, owned by the grid but stored on the shape so the bucket
/// lists can be threaded through shapes without extra allocation
#[derive(Debug, Clone, Default)]
pub(crate) struct GridLink {
    pub membership: Membership,
    pub bucket: BucketCoord,
    /// Buckets to scan around `bucket`
    pub search_radius: usize,
    /// Inclusive bucket ranges to scan
    pub nearby_x: (usize, usize),
    pub nearby_y: (usize, usize),
    pub prev: Option<ShapeHandle>,
    pub next: Option<ShapeHandle>,
}

/// Hits and translation vectors gathered during a tick
///
/// Frame scope lives for the whole tick and is what gameplay reads.
/// Loop scope only lives for one resolution sub-pass.
#[derive(Debug, Clone, Default)]
pub struct CollisionState {
    frame_hits: Vec<ShapeHandle>,
    loop_hits: Vec<ShapeHandle>,
    frame_mtv: HashMap<ShapeHandle, Vec2>,
    loop_mtv: HashMap<ShapeHandle, Vec2>,
}

impl CollisionState {
    pub fn clear_frame(&mut self) {
        self.frame_hits.clear();
        self.frame_mtv.clear();
    }

    pub fn clear_loop(&mut self) {
        self.loop_hits.clear();
        self.loop_mtv.clear();
    }

    pub fn add_frame_hit(&mut self, other: ShapeHandle) {
        if !self.frame_hits.contains(&other) {
            self.frame_hits.push(other);
        }
    }

    pub fn add_loop_hit(&mut self, other: ShapeHandle) {
        if !self.loop_hits.contains(&other) {
            self.loop_hits.push(other);
        }
    }

    #[inline]
    pub fn in_loop(&self, other: ShapeHandle) -> bool {
        self.loop_hits.contains(&other)
    }

    /// Store the vector that moves this shape out of `other`
    ///
    /// The loop vector is fixed once the pair is in this sub-pass's loop set;
    /// the frame vector keeps whichever is longer.
    pub fn set_mtv(&mut self, other: ShapeHandle, vector: Vec2) {
        if !self.in_loop(other) {
            self.loop_mtv.insert(other, vector);
        }
        let keep_old = self
            .frame_mtv
            .get(&other)
            .is_some_and(|old| old.length_squared() >= vector.length_squared());
        if !keep_old {
            self.frame_mtv.insert(other, vector);
        }
    }

    pub fn loop_mtv(&self, other: ShapeHandle) -> Option<Vec2> {
        self.loop_mtv.get(&other).copied()
    }

    pub fn frame_mtv(&self, other: ShapeHandle) -> Option<Vec2> {
        self.frame_mtv.get(&other).copied()
    }

    pub fn frame_hits(&self) -> &[ShapeHandle] {
        &self.frame_hits
    }

    pub fn loop_hits(&self) -> &[ShapeHandle] {
        &self.loop_hits
    }

    /// Drop every trace of a shape that left the grid
    pub(crate) fn forget(&mut self, other: ShapeHandle) {
        self.frame_hits.retain(|h| *h != other);
        self.loop_hits.retain(|h| *h != other);
        self.frame_mtv.remove(&other);
        self.loop_mtv.remove(&other);
    }
}

/// A collision shape
#[derive(Debug, Clone)]
pub struct Shape {
    kind: ShapeKind,
    aabb: Aabb,
    category: GameCategory,
    collides_with: CategorySet,
    handlers: HandlerTable,
    owner: Option<EntityId>,
    id: String,
    moved_since_last_test: bool,
    pub(crate) link: GridLink,
    pub(crate) state: CollisionState,
}

impl Shape {
    fn new(
        kind: ShapeKind,
        handlers: HandlerTable,
        category: GameCategory,
        collides_with: CategorySet,
    ) -> Self {
        let aabb = kind.aabb();
        Self {
            kind,
            aabb,
            category,
            collides_with,
            handlers,
            owner: None,
            id: String::new(),
            moved_since_last_test: true,
            link: GridLink::default(),
            state: CollisionState::default(),
        }
    }

    pub fn circle(
        pos: Vec2,
        radius: f32,
        handlers: HandlerTable,
        category: GameCategory,
        collides_with: CategorySet,
    ) -> Self {
        let kind = ShapeKind::Simple(Primitive::Circle(Circle::new(pos, radius)));
        Self::new(kind, handlers, category, collides_with)
    }

    pub fn rect(
        center: Vec2,
        width: f32,
        height: f32,
        rotation: f32,
        handlers: HandlerTable,
        category: GameCategory,
        collides_with: CategorySet,
    ) -> Self {
        let rect = OrientedRect::new(center, width, height, rotation);
        Self::new(ShapeKind::Simple(Primitive::Rect(rect)), handlers, category, collides_with)
    }

    /// Empty composite; fill it with `add_circle` / `add_rotatable_rect`
    pub fn composite(
        center: Vec2,
        size: Vec2,
        handlers: HandlerTable,
        category: GameCategory,
        collides_with: CategorySet,
    ) -> Self {
        let kind = ShapeKind::Composite(Composite::new(center, size));
        Self::new(kind, handlers, category, collides_with)
    }

    /// Add a circle part at `offset` from the composite centre
    pub fn add_circle(&mut self, offset: Vec2, radius: f32) {
        self.add_part(offset, Primitive::Circle(Circle::new(Vec2::ZERO, radius)));
    }

    /// Add a rotatable rectangle part at `offset` from the composite centre
    pub fn add_rotatable_rect(&mut self, offset: Vec2, width: f32, height: f32, rotation: f32) {
        let rect = OrientedRect::new(Vec2::ZERO, width, height, rotation);
        self.add_part(offset, Primitive::Rect(rect));
    }

    fn add_part(&mut self, offset: Vec2, part: Primitive) {
        let ShapeKind::Composite(composite) = &mut self.kind else {
            log::warn!("add_part on a {} shape ignored", self.kind.name());
            return;
        };
        composite.add_part(offset, part);
        self.geometry_changed();
    }

    /// Recompute the bounding box and flag the shape for re-testing
    fn geometry_changed(&mut self) {
        self.aabb = self.kind.aabb();
        if self.link.membership != Membership::Static {
            self.moved_since_last_test = true;
        }
    }

    // --- Geometry ---

    #[inline]
    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.kind.center()
    }

    #[inline]
    pub fn aabb(&self) -> &Aabb {
        &self.aabb
    }

    pub fn set_position(&mut self, pos: Vec2) {
        self.kind.set_center(pos);
        self.geometry_changed();
    }

    pub fn translate(&mut self, delta: Vec2) {
        self.set_position(self.position() + delta);
    }

    /// Rotate by `delta` radians (circles only get flagged as moved)
    pub fn rotate(&mut self, delta: f32) {
        match &mut self.kind {
            ShapeKind::Simple(Primitive::Circle(_)) => {}
            ShapeKind::Simple(Primitive::Rect(rect)) => rect.rotate(delta),
            ShapeKind::Composite(composite) => composite.rotate(delta),
        }
        self.geometry_changed();
    }

    pub fn set_rotation(&mut self, rotation: f32) {
        let delta = match &self.kind {
            ShapeKind::Simple(Primitive::Circle(_)) => 0.0,
            ShapeKind::Simple(Primitive::Rect(rect)) => rotation - rect.rotation(),
            ShapeKind::Composite(composite) => rotation - composite.rotation,
        };
        self.rotate(delta);
    }

    pub fn rotation(&self) -> f32 {
        match &self.kind {
            ShapeKind::Simple(Primitive::Circle(_)) => 0.0,
            ShapeKind::Simple(Primitive::Rect(rect)) => rect.rotation(),
            ShapeKind::Composite(composite) => composite.rotation,
        }
    }

    /// Resize a circle
    pub fn set_radius(&mut self, radius: f32) {
        let ShapeKind::Simple(Primitive::Circle(circle)) = &mut self.kind else {
            log::warn!("set_radius on a {} shape ignored", self.kind.name());
            return;
        };
        circle.radius = radius;
        self.geometry_changed();
    }

    /// Resize a rectangle
    pub fn set_dimensions(&mut self, width: f32, height: f32) {
        let ShapeKind::Simple(Primitive::Rect(rect)) = &mut self.kind else {
            log::warn!("set_dimensions on a {} shape ignored", self.kind.name());
            return;
        };
        rect.set_dimensions(width, height);
        self.geometry_changed();
    }

    /// Exclude a rectangle edge normal from SAT resolution
    ///
    /// Used on tile seams so neighbouring tiles don't push shapes along
    /// their shared internal edges. Applies to every rect part of a composite.
    pub fn set_edge_skip(&mut self, edge: RectEdge, skip: bool) {
        let parts: &mut [Primitive] = match &mut self.kind {
            ShapeKind::Simple(p) => std::slice::from_mut(p),
            ShapeKind::Composite(c) => c.parts.as_mut_slice(),
        };
        for part in parts {
            if let Primitive::Rect(rect) = part {
                rect.set_skip(edge, skip);
            }
        }
    }

    pub fn is_inside(&self, point: Vec2) -> bool {
        self.kind.primitives().iter().any(|p| p.contains_point(point))
    }

    /// Surface normal best suited to push something at `point` away
    pub fn closest_active_collision_normal(&self, point: Vec2) -> Vec2 {
        let closest = self.kind.primitives().iter().min_by(|a, b| {
            let da = (a.center() - point).length_squared();
            let db = (b.center() - point).length_squared();
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        });
        closest
            .map(|p| p.closest_active_normal(point))
            .unwrap_or(Vec2::new(0.0, -1.0))
    }

    /// Side of the smallest square that always contains the shape
    pub fn longest_aabb_dimension(&self) -> f32 {
        self.aabb.longest_dimension()
    }

    /// Largest distance a shape can be moved in one step without tunnelling
    pub fn shortest_center_to_edge(&self) -> f32 {
        self.kind
            .primitives()
            .iter()
            .map(|p| match p {
                Primitive::Circle(c) => c.radius,
                Primitive::Rect(r) => r.shortest_center_to_edge(),
            })
            .fold(None, |acc: Option<f32>, d| Some(acc.map_or(d, |a| a.min(d))))
            .unwrap_or(0.0)
    }

    // --- Categories & handlers ---

    #[inline]
    pub fn category(&self) -> GameCategory {
        self.category
    }

    #[inline]
    pub fn collides_with(&self) -> CategorySet {
        self.collides_with
    }

    #[inline]
    pub fn handler_for(&self, other: GameCategory) -> ResponseHandler {
        self.handlers.get(other)
    }

    pub fn set_handler(&mut self, other: GameCategory, handler: ResponseHandler) {
        self.handlers.set(other, handler);
    }

    // --- Ownership ---

    pub fn set_owner(&mut self, owner: EntityId) {
        self.owner = Some(owner);
    }

    #[inline]
    pub fn owner(&self) -> Option<EntityId> {
        self.owner
    }

    /// Debug label
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    // --- Grid & collision state ---

    #[inline]
    pub fn moved_since_last_test(&self) -> bool {
        self.moved_since_last_test
    }

    pub(crate) fn set_moved(&mut self, moved: bool) {
        self.moved_since_last_test = moved;
    }

    #[inline]
    pub fn membership(&self) -> Membership {
        self.link.membership
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.link.membership == Membership::Static
    }

    /// Current bucket, `None` while not in a grid
    pub fn bucket(&self) -> Option<BucketCoord> {
        match self.link.membership {
            Membership::Detached => None,
            _ => Some(self.link.bucket),
        }
    }

    /// Shapes this one overlapped during the last `check_collisions`
    #[inline]
    pub fn collided_this_frame(&self) -> &[ShapeHandle] {
        self.state.frame_hits()
    }

    /// Shapes still waiting on resolution in the current sub-pass
    #[inline]
    pub fn collided_this_loop(&self) -> &[ShapeHandle] {
        self.state.loop_hits()
    }

    pub fn loop_mtv(&self, other: ShapeHandle) -> Option<Vec2> {
        self.state.loop_mtv(other)
    }

    pub fn frame_mtv(&self, other: ShapeHandle) -> Option<Vec2> {
        self.state.frame_mtv(other)
    }
}
