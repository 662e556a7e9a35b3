//! Primitive geometry for collision shapes
//!
//! Screen coordinates: x grows right, y grows down. A rectangle's "top" edge
//! is therefore the one with the smallest local y.
//!
//! Rectangles are stored as centre + size + rotation, with their four world
//! vertices cached so SAT never has to recompute them mid-test.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::{normalize_angle, rotate_vec};

/// Axis-aligned bounding box used for the cheap pre-check before narrow phase
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec2,
    pub max: Vec2,
}

impl Aabb {
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Longer of width and height
    pub fn longest_dimension(&self) -> f32 {
        self.width().max(self.height())
    }

    /// Overlap test; boxes that merely share an edge do not overlap
    #[inline]
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && other.min.x < self.max.x
            && self.min.y < other.max.y
            && other.min.y < self.max.y
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x > self.min.x && point.x < self.max.x && point.y > self.min.y && point.y < self.max.y
    }
}

/// A circle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Vec2,
    pub radius: f32,
}

impl Circle {
    pub fn new(center: Vec2, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_center_size(self.center, Vec2::splat(self.radius * 2.0))
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        (point - self.center).length() < self.radius
    }
}

/// The four edges of an oriented rectangle, in SAT test order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RectEdge {
    Top,
    Left,
    Right,
    Bottom,
}

impl RectEdge {
    pub const ALL: [RectEdge; 4] = [RectEdge::Top, RectEdge::Left, RectEdge::Right, RectEdge::Bottom];

    #[inline]
    fn index(self) -> usize {
        match self {
            RectEdge::Top => 0,
            RectEdge::Left => 1,
            RectEdge::Right => 2,
            RectEdge::Bottom => 3,
        }
    }

    /// Vertex indices (into `OrientedRect::verts`) of the edge, wound so the
    /// perpendicular `(e1.y - e0.y, e0.x - e1.x)` points outward
    #[inline]
    fn vertex_indices(self) -> (usize, usize) {
        match self {
            RectEdge::Top => (TOP_LEFT, TOP_RIGHT),
            RectEdge::Left => (BOTTOM_LEFT, TOP_LEFT),
            RectEdge::Right => (TOP_RIGHT, BOTTOM_RIGHT),
            RectEdge::Bottom => (BOTTOM_RIGHT, BOTTOM_LEFT),
        }
    }
}

const TOP_LEFT: usize = 0;
const TOP_RIGHT: usize = 1;
const BOTTOM_LEFT: usize = 2;
const BOTTOM_RIGHT: usize = 3;

/// A rotatable rectangle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrientedRect {
    center: Vec2,
    width: f32,
    height: f32,
    /// Radians, normalized to [-π, π)
    rotation: f32,
    verts: [Vec2; 4],
    /// Edge normals excluded from SAT resolution (tile seams)
    skip: [bool; 4],
}

impl OrientedRect {
    pub fn new(center: Vec2, width: f32, height: f32, rotation: f32) -> Self {
        let mut rect = Self {
            center,
            width,
            height,
            rotation: normalize_angle(rotation),
            verts: [Vec2::ZERO; 4],
            skip: [false; 4],
        };
        rect.update_verts();
        rect
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        self.center
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.height
    }

    #[inline]
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// World vertices: top-left, top-right, bottom-left, bottom-right
    #[inline]
    pub fn verts(&self) -> &[Vec2; 4] {
        &self.verts
    }

    pub fn set_center(&mut self, center: Vec2) {
        self.center = center;
        self.update_verts();
    }

    pub fn set_rotation(&mut self, rotation: f32) {
        self.rotation = normalize_angle(rotation);
        self.update_verts();
    }

    pub fn rotate(&mut self, delta: f32) {
        self.set_rotation(self.rotation + delta);
    }

    pub fn set_dimensions(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.update_verts();
    }

    fn update_verts(&mut self) {
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        let locals = [
            Vec2::new(-half_w, -half_h),
            Vec2::new(half_w, -half_h),
            Vec2::new(-half_w, half_h),
            Vec2::new(half_w, half_h),
        ];
        self.verts = locals.map(|local| self.to_world(local));
    }

    /// World point -> rectangle-local frame (centre at origin, unrotated)
    #[inline]
    pub fn to_local(&self, point: Vec2) -> Vec2 {
        rotate_vec(point - self.center, self.rotation)
    }

    /// Rectangle-local point -> world
    #[inline]
    pub fn to_world(&self, local: Vec2) -> Vec2 {
        self.center + rotate_vec(local, -self.rotation)
    }

    /// Edge endpoints in world space
    #[inline]
    pub fn edge(&self, edge: RectEdge) -> (Vec2, Vec2) {
        let (a, b) = edge.vertex_indices();
        (self.verts[a], self.verts[b])
    }

    pub fn edge_length(&self, edge: RectEdge) -> f32 {
        let (a, b) = self.edge(edge);
        (b - a).length()
    }

    /// Outward perpendicular of an edge, scaled by the edge length
    #[inline]
    pub fn edge_axis(&self, edge: RectEdge) -> Vec2 {
        let (a, b) = self.edge(edge);
        Vec2::new(b.y - a.y, a.x - b.x)
    }

    /// Outward unit normal of an edge (zero for a degenerate edge)
    pub fn normal(&self, edge: RectEdge) -> Vec2 {
        self.edge_axis(edge).normalize_or_zero()
    }

    pub fn is_skipped(&self, edge: RectEdge) -> bool {
        self.skip[edge.index()]
    }

    pub fn set_skip(&mut self, edge: RectEdge, skip: bool) {
        self.skip[edge.index()] = skip;
    }

    /// Closest point on or inside the rectangle to `point`, in world space
    pub fn closest_point(&self, point: Vec2) -> Vec2 {
        let local = self.to_local(point);
        let half = Vec2::new(self.width / 2.0, self.height / 2.0);
        self.to_world(local.clamp(-half, half))
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        let local = self.to_local(point);
        local.x.abs() < self.width / 2.0 && local.y.abs() < self.height / 2.0
    }

    /// Square box sized by the diagonal, so it stays valid under any rotation
    pub fn aabb(&self) -> Aabb {
        let diagonal = (self.width * self.width + self.height * self.height).sqrt();
        Aabb::from_center_size(self.center, Vec2::splat(diagonal))
    }

    pub fn shortest_center_to_edge(&self) -> f32 {
        (self.width / 2.0).min(self.height / 2.0)
    }

    /// Normal of the nearest edge that is not skipped, `(0, -1)` if all are
    pub fn closest_active_normal(&self, point: Vec2) -> Vec2 {
        let mut closest = None;
        let mut closest_dist = f32::MAX;
        for edge in RectEdge::ALL {
            if self.is_skipped(edge) {
                continue;
            }
            let (a, b) = self.edge(edge);
            let dist = dist_point_to_segment(point, a, b);
            if dist < closest_dist {
                closest_dist = dist;
                closest = Some(edge);
            }
        }
        closest
            .map(|edge| self.normal(edge))
            .unwrap_or(Vec2::new(0.0, -1.0))
    }
}

/// Distance from a point to a line segment
fn dist_point_to_segment(point: Vec2, a: Vec2, b: Vec2) -> f32 {
    let seg = b - a;
    let len_sq = seg.length_squared();
    if len_sq < 0.0001 {
        return (point - a).length(); // Degenerate segment
    }
    let t = ((point - a).dot(seg) / len_sq).clamp(0.0, 1.0);
    (point - (a + seg * t)).length()
}

/// A single convex piece: what narrow-phase tests operate on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Circle(Circle),
    Rect(OrientedRect),
}

impl Primitive {
    pub fn center(&self) -> Vec2 {
        match self {
            Primitive::Circle(c) => c.center,
            Primitive::Rect(r) => r.center(),
        }
    }

    pub fn set_center(&mut self, center: Vec2) {
        match self {
            Primitive::Circle(c) => c.center = center,
            Primitive::Rect(r) => r.set_center(center),
        }
    }

    pub fn aabb(&self) -> Aabb {
        match self {
            Primitive::Circle(c) => c.aabb(),
            Primitive::Rect(r) => r.aabb(),
        }
    }

    pub fn contains_point(&self, point: Vec2) -> bool {
        match self {
            Primitive::Circle(c) => c.contains_point(point),
            Primitive::Rect(r) => r.contains_point(point),
        }
    }

    pub fn closest_active_normal(&self, point: Vec2) -> Vec2 {
        match self {
            Primitive::Circle(c) => (point - c.center).normalize_or(Vec2::new(0.0, -1.0)),
            Primitive::Rect(r) => r.closest_active_normal(point),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 0.001
    }

    #[test]
    fn test_unrotated_rect_vertices_and_normals() {
        let rect = OrientedRect::new(Vec2::new(10.0, 20.0), 8.0, 4.0, 0.0);
        let v = rect.verts();
        assert!(approx(v[0], Vec2::new(6.0, 18.0)));
        assert!(approx(v[3], Vec2::new(14.0, 22.0)));

        assert!(approx(rect.normal(RectEdge::Top), Vec2::new(0.0, -1.0)));
        assert!(approx(rect.normal(RectEdge::Bottom), Vec2::new(0.0, 1.0)));
        assert!(approx(rect.normal(RectEdge::Left), Vec2::new(-1.0, 0.0)));
        assert!(approx(rect.normal(RectEdge::Right), Vec2::new(1.0, 0.0)));

        assert!((rect.edge_length(RectEdge::Top) - 8.0).abs() < 0.001);
        assert!((rect.edge_length(RectEdge::Left) - 4.0).abs() < 0.001);
    }

    #[test]
    fn test_rotated_rect_round_trips_local_frame() {
        let rect = OrientedRect::new(Vec2::new(50.0, 50.0), 20.0, 10.0, 0.7);
        let p = Vec2::new(57.0, 41.0);
        assert!(approx(rect.to_world(rect.to_local(p)), p));
    }

    #[test]
    fn test_quarter_turn_swaps_extents() {
        let rect = OrientedRect::new(Vec2::ZERO, 20.0, 4.0, FRAC_PI_2);
        // Long axis is now vertical
        assert!(rect.contains_point(Vec2::new(0.0, 8.0)));
        assert!(!rect.contains_point(Vec2::new(8.0, 0.0)));
    }

    #[test]
    fn test_closest_point_clamps_to_box() {
        let rect = OrientedRect::new(Vec2::ZERO, 10.0, 10.0, 0.0);
        assert!(approx(rect.closest_point(Vec2::new(20.0, 0.0)), Vec2::new(5.0, 0.0)));
        assert!(approx(rect.closest_point(Vec2::new(1.0, 2.0)), Vec2::new(1.0, 2.0)));
    }

    #[test]
    fn test_closest_active_normal_ignores_skipped_edges() {
        let mut rect = OrientedRect::new(Vec2::ZERO, 10.0, 10.0, 0.0);
        let above = Vec2::new(0.0, -20.0);
        assert!(approx(rect.closest_active_normal(above), Vec2::new(0.0, -1.0)));

        rect.set_skip(RectEdge::Top, true);
        let normal = rect.closest_active_normal(above);
        assert!(!approx(normal, Vec2::new(0.0, -1.0)));

        for edge in RectEdge::ALL {
            rect.set_skip(edge, true);
        }
        assert!(approx(rect.closest_active_normal(above), Vec2::new(0.0, -1.0)));
    }

    #[test]
    fn test_aabb_overlap_is_strict() {
        let a = Aabb::from_center_size(Vec2::ZERO, Vec2::splat(10.0));
        let touching = Aabb::from_center_size(Vec2::new(10.0, 0.0), Vec2::splat(10.0));
        let overlapping = Aabb::from_center_size(Vec2::new(9.0, 0.0), Vec2::splat(10.0));
        assert!(!a.overlaps(&touching));
        assert!(a.overlaps(&overlapping));
        assert!((a.union(&touching).width() - 20.0).abs() < 0.001);
    }

    #[test]
    fn test_rect_aabb_uses_diagonal() {
        let rect = OrientedRect::new(Vec2::ZERO, 3.0, 4.0, 0.3);
        assert!((rect.aabb().width() - 5.0).abs() < 0.001);
    }

    #[test]
    fn test_huge_rotation_wraps_into_range() {
        let mut rect = OrientedRect::new(Vec2::ZERO, 10.0, 2.0, 1.0e9);
        assert!((-PI..PI).contains(&rect.rotation()));

        rect.set_rotation(-1.0e9);
        assert!((-PI..PI).contains(&rect.rotation()));
        rect.rotate(f32::MAX);
        assert!((-PI..PI).contains(&rect.rotation()));
        // Still a 10x2 box after the wrap
        assert!((rect.edge_length(RectEdge::Top) - 10.0).abs() < 0.001);
    }
}
