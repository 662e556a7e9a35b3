//! Narrow-phase overlap tests
//!
//! Every test answers "do these overlap?" and, where it can, how far to move
//! the first shape to undo the overlap (the MTV). The second shape's vector is
//! always the exact negation, so the grid only runs each pair once.

use glam::Vec2;

use super::geometry::{Circle, OrientedRect, Primitive, RectEdge};
use super::shape::ShapeKind;
use crate::normals_match;

/// Fallback push direction when two centres coincide
pub const DEFAULT_NORMAL: Vec2 = Vec2::new(0.0, 1.0);

/// Result of a narrow-phase hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// Translation that separates the first shape from the second.
    /// `None` when the shapes touch but no resolving vector exists
    /// (zero depth, or every overlapping axis was skipped).
    pub mtv: Option<Vec2>,
}

impl Contact {
    fn from_vector(v: Vec2) -> Self {
        let mtv = if v.x.abs() > 0.0 || v.y.abs() > 0.0 {
            Some(v)
        } else {
            None
        };
        Self { mtv }
    }

    /// The same contact seen from the other shape
    pub fn flipped(self) -> Self {
        Self {
            mtv: self.mtv.map(|v| -v),
        }
    }
}

/// Circle vs circle; hits when the gap is <= 0
pub fn circle_circle(a: &Circle, b: &Circle) -> Option<Contact> {
    let delta = a.center - b.center;
    let dist_sq = delta.length_squared();
    let radius_sum = a.radius + b.radius;
    if dist_sq > radius_sum * radius_sum {
        return None;
    }
    Some(push_apart(delta, radius_sum))
}

/// Direction along `delta` (fallback `DEFAULT_NORMAL`) scaled by `reach - |delta|`
fn push_apart(delta: Vec2, reach: f32) -> Contact {
    let dist = delta.length();
    let normal = if dist > 0.0 { delta / dist } else { DEFAULT_NORMAL };
    Contact::from_vector(normal * (reach - dist))
}

/// Circle vs oriented rectangle; the MTV moves the circle
pub fn circle_rect(circle: &Circle, rect: &OrientedRect) -> Option<Contact> {
    // Closest point is computed in the rect's local frame, then brought back
    let closest = rect.closest_point(circle.center);
    let delta = circle.center - closest;
    if delta.length() >= circle.radius {
        return None;
    }
    // Treat the closest point as a zero-radius circle
    Some(push_apart(delta, circle.radius))
}

/// Outcome of a separating-axis test, with the number of axes examined
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SatReport {
    pub contact: Option<Contact>,
    pub axes_tested: usize,
}

/// Oriented rectangle vs oriented rectangle using the separating axis theorem
///
/// Stops at the first separating axis. Among overlapping axes the shallowest
/// one that is not skipped becomes the MTV. Depth is the overlap projected on
/// the unnormalized edge axis divided by the owning rect's width, for every
/// edge. That is not a true penetration depth; resolution tuning relies on
/// these magnitudes.
pub fn rect_rect_report(a: &OrientedRect, b: &OrientedRect) -> SatReport {
    let mut axes_tested = 0;
    let mut smallest_overlap = f32::MAX;
    let mut mtv = Vec2::ZERO;

    for polygon in [a, b] {
        let width = polygon.width();
        for edge in RectEdge::ALL {
            let edge_length = polygon.edge_length(edge);
            if edge_length <= f32::EPSILON {
                continue; // Degenerate edge: no usable axis
            }
            axes_tested += 1;

            let axis = polygon.edge_axis(edge);
            let (min_a, max_a) = project(a, axis);
            let (min_b, max_b) = project(b, axis);

            if max_a < min_b || max_b < min_a {
                return SatReport {
                    contact: None,
                    axes_tested,
                };
            }

            // Zero-width rects still separate but never resolve
            if width <= f32::EPSILON {
                continue;
            }
            let unit_normal = axis / edge_length;
            if axis_is_skipped(a, b, unit_normal) {
                continue;
            }

            let a_first = if max_a != max_b {
                max_a > max_b
            } else {
                // Equal reach: fall back to the interval midpoints
                min_a + max_a > min_b + max_b
            };
            let (overall, direction) = if a_first {
                (max_a - min_b, 1.0)
            } else {
                (max_b - min_a, -1.0)
            };
            let combined = (max_a - min_a) + (max_b - min_b);
            let depth = (combined - overall) / width;
            if depth < smallest_overlap {
                smallest_overlap = depth;
                mtv = unit_normal * depth * direction;
            }
        }
    }

    SatReport {
        contact: Some(Contact::from_vector(mtv)),
        axes_tested,
    }
}

/// Oriented rectangle vs oriented rectangle; see [`rect_rect_report`]
pub fn rect_rect(a: &OrientedRect, b: &OrientedRect) -> Option<Contact> {
    rect_rect_report(a, b).contact
}

/// Project all four vertices onto an (unnormalized) axis
#[inline]
fn project(rect: &OrientedRect, axis: Vec2) -> (f32, f32) {
    rect.verts()
        .iter()
        .map(|v| axis.dot(*v))
        .fold((f32::MAX, f32::MIN), |(lo, hi), p| (lo.min(p), hi.max(p)))
}

/// An axis is skipped if any matching normal on either rect is flagged
fn axis_is_skipped(a: &OrientedRect, b: &OrientedRect, unit_normal: Vec2) -> bool {
    [a, b].into_iter().any(|rect| {
        RectEdge::ALL
            .into_iter()
            .any(|edge| rect.is_skipped(edge) && normals_match(unit_normal, rect.normal(edge)))
    })
}

/// Dispatch on primitive kinds; the MTV always belongs to `a`
pub fn test_primitives(a: &Primitive, b: &Primitive) -> Option<Contact> {
    match (a, b) {
        (Primitive::Circle(ca), Primitive::Circle(cb)) => circle_circle(ca, cb),
        (Primitive::Circle(c), Primitive::Rect(r)) => circle_rect(c, r),
        (Primitive::Rect(r), Primitive::Circle(c)) => circle_rect(c, r).map(Contact::flipped),
        (Primitive::Rect(ra), Primitive::Rect(rb)) => rect_rect(ra, rb),
    }
}

/// Full shape test, expanding composites into their parts
///
/// A composite collides if any part does. Its MTV is the first one found
/// among the colliding parts, not necessarily the deepest.
pub fn test_shapes(a: &ShapeKind, b: &ShapeKind) -> Option<Contact> {
    let mut hit: Option<Contact> = None;
    for pa in a.primitives() {
        for pb in b.primitives() {
            let Some(contact) = test_primitives(pa, pb) else {
                continue;
            };
            match hit {
                None => hit = Some(contact),
                Some(Contact { mtv: None }) if contact.mtv.is_some() => hit = Some(contact),
                _ => {}
            }
            // Simple shapes have exactly one pair, so this only shortcuts composites
            if hit.is_some_and(|h| h.mtv.is_some()) {
                return hit;
            }
        }
    }
    hit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shape::Composite;
    use proptest::prelude::*;
    use std::f32::consts::FRAC_PI_4;

    fn circle(x: f32, y: f32, r: f32) -> Circle {
        Circle::new(Vec2::new(x, y), r)
    }

    fn rect(x: f32, y: f32, w: f32, h: f32, rot: f32) -> OrientedRect {
        OrientedRect::new(Vec2::new(x, y), w, h, rot)
    }

    fn approx(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 0.001
    }

    #[test]
    fn test_circle_circle_overlap_depth() {
        let a = circle(0.0, 0.0, 5.0);
        let b = circle(8.0, 0.0, 4.0);

        let ab = circle_circle(&a, &b).expect("overlapping circles");
        let mtv = ab.mtv.expect("penetrating pair has an mtv");
        assert!(approx(mtv, Vec2::new(-1.0, 0.0)));

        let ba = circle_circle(&b, &a).expect("symmetric");
        assert!(approx(ba.mtv.unwrap(), Vec2::new(1.0, 0.0)));
    }

    #[test]
    fn test_circle_circle_miss() {
        let a = circle(0.0, 0.0, 5.0);
        let b = circle(20.0, 0.0, 4.0);
        assert!(circle_circle(&a, &b).is_none());
    }

    #[test]
    fn test_circle_circle_coincident_centres_use_default_normal() {
        let a = circle(3.0, 3.0, 2.0);
        let b = circle(3.0, 3.0, 1.0);
        let mtv = circle_circle(&a, &b).unwrap().mtv.unwrap();
        assert!(approx(mtv, DEFAULT_NORMAL * 3.0));
    }

    #[test]
    fn test_touching_circles_hit_without_mtv() {
        let a = circle(0.0, 0.0, 5.0);
        let b = circle(10.0, 0.0, 5.0);
        let contact = circle_circle(&a, &b).expect("touching counts as a hit");
        assert!(contact.mtv.is_none());
    }

    #[test]
    fn test_circle_rect_pushes_circle_out() {
        let r = rect(0.0, 0.0, 20.0, 20.0, 0.0);
        let c = circle(13.0, 0.0, 5.0);
        let mtv = circle_rect(&c, &r).unwrap().mtv.unwrap();
        assert!(approx(mtv, Vec2::new(2.0, 0.0)));

        let far = circle(16.0, 0.0, 5.0);
        assert!(circle_rect(&far, &r).is_none());
    }

    #[test]
    fn test_circle_rect_respects_rotation() {
        // Diamond: corner points along +x at distance ~14.14
        let r = rect(0.0, 0.0, 20.0, 20.0, FRAC_PI_4);
        let c = circle(17.0, 0.0, 3.5);
        assert!(circle_rect(&c, &r).is_some());

        // Along the diagonal the diamond only reaches its flat side
        let c = circle(14.0, 14.0, 3.5);
        assert!(circle_rect(&c, &r).is_none());
    }

    #[test]
    fn test_circle_centre_inside_rect_uses_default_normal() {
        let r = rect(0.0, 0.0, 20.0, 20.0, 0.0);
        let c = circle(1.0, 1.0, 4.0);
        let mtv = circle_rect(&c, &r).unwrap().mtv.unwrap();
        assert!(approx(mtv, DEFAULT_NORMAL * 4.0));
    }

    #[test]
    fn test_sat_rejects_on_first_separating_axis() {
        let a = rect(0.0, 0.0, 10.0, 10.0, 0.0);
        let b = rect(100.0, 0.0, 10.0, 10.0, 0.0);
        let report = rect_rect_report(&a, &b);
        assert!(report.contact.is_none());
        // Top overlaps in y, left separates in x
        assert_eq!(report.axes_tested, 2);
        assert!(report.axes_tested < 8);
    }

    #[test]
    fn test_sat_overlap_mtv_along_shallowest_axis() {
        let a = rect(0.0, 0.0, 10.0, 10.0, 0.0);
        let b = rect(8.0, 1.0, 10.0, 10.0, 0.0);
        let report = rect_rect_report(&a, &b);
        assert_eq!(report.axes_tested, 8);
        let mtv = report.contact.unwrap().mtv.unwrap();
        // x overlap is 2, y overlap is 9: push a left by 2
        assert!(approx(mtv, Vec2::new(-2.0, 0.0)));
    }

    #[test]
    fn test_sat_depth_is_scaled_by_rect_width() {
        // Tall thin rects overlapping by 1px in x: the 40px side axis is
        // divided by the 4px width, giving a push of 10
        let a = rect(0.0, 0.0, 4.0, 40.0, 0.0);
        let b = rect(3.0, 0.0, 4.0, 40.0, 0.0);
        let mtv = rect_rect(&a, &b).unwrap().mtv.unwrap();
        assert!(approx(mtv, Vec2::new(-10.0, 0.0)));

        let back = rect_rect(&b, &a).unwrap().mtv.unwrap();
        assert!(approx(back, Vec2::new(10.0, 0.0)));
    }

    #[test]
    fn test_sat_zero_width_rect_never_resolves() {
        let a = rect(0.0, 0.0, 0.0, 10.0, 0.0);
        let b = rect(1.0, 0.0, 10.0, 10.0, 0.0);
        let contact = rect_rect(&a, &b).expect("still overlapping");
        let mtv = contact.mtv.expect("b's axes resolve");
        assert!(mtv.is_finite());
    }

    #[test]
    fn test_sat_equal_reach_still_gives_opposite_vectors() {
        // Left sides line up, so both project to the same max on the left axis
        let a = rect(0.0, 0.0, 10.0, 40.0, 0.0);
        let b = rect(-2.0, 0.0, 6.0, 40.0, 0.0);
        let ab = rect_rect(&a, &b).unwrap().mtv.unwrap();
        let ba = rect_rect(&b, &a).unwrap().mtv.unwrap();
        assert!(approx(ab, Vec2::new(24.0, 0.0)));
        assert!(approx(ba, -ab));
    }

    #[test]
    fn test_sat_skipped_normals_are_not_used_for_resolution() {
        let mut a = rect(0.0, 0.0, 10.0, 10.0, 0.0);
        let b = rect(8.0, 1.0, 10.0, 10.0, 0.0);
        a.set_skip(RectEdge::Left, true);
        a.set_skip(RectEdge::Right, true);
        let mtv = rect_rect(&a, &b).unwrap().mtv.unwrap();
        // Horizontal axes are suppressed, so resolution falls back to y
        assert!(approx(mtv, Vec2::new(0.0, -9.0)));

        for edge in [RectEdge::Top, RectEdge::Bottom] {
            a.set_skip(edge, true);
        }
        let contact = rect_rect(&a, &b).expect("still overlapping");
        assert!(contact.mtv.is_none());
    }

    #[test]
    fn test_sat_zero_size_rect_does_not_panic() {
        let a = rect(0.0, 0.0, 0.0, 0.0, 0.0);
        let b = rect(0.0, 0.0, 10.0, 10.0, 0.0);
        let report = rect_rect_report(&a, &b);
        assert_eq!(report.axes_tested, 4);
    }

    #[test]
    fn test_composite_uses_first_part_with_mtv() {
        let mut parts = Composite::new(Vec2::ZERO, Vec2::new(40.0, 10.0));
        parts.add_part(Vec2::new(-15.0, 0.0), Primitive::Circle(circle(0.0, 0.0, 5.0)));
        parts.add_part(Vec2::new(15.0, 0.0), Primitive::Circle(circle(0.0, 0.0, 5.0)));
        let composite = ShapeKind::Composite(parts);

        let other = ShapeKind::Simple(Primitive::Circle(circle(22.0, 0.0, 5.0)));
        let contact = test_shapes(&composite, &other).expect("right part overlaps");
        assert!(approx(contact.mtv.unwrap(), Vec2::new(-3.0, 0.0)));

        let reverse = test_shapes(&other, &composite).unwrap();
        assert!(approx(reverse.mtv.unwrap(), Vec2::new(3.0, 0.0)));

        let miss = ShapeKind::Simple(Primitive::Circle(circle(0.0, 30.0, 5.0)));
        assert!(test_shapes(&composite, &miss).is_none());
    }

    proptest! {
        #[test]
        fn prop_circle_pairs_are_symmetric(
            ax in -50.0f32..50.0, ay in -50.0f32..50.0, ar in 1.0f32..20.0,
            bx in -50.0f32..50.0, by in -50.0f32..50.0, br in 1.0f32..20.0,
        ) {
            // Coincident centres both fall back to the same default normal
            prop_assume!(ax != bx || ay != by);
            let a = Primitive::Circle(circle(ax, ay, ar));
            let b = Primitive::Circle(circle(bx, by, br));
            let ab = test_primitives(&a, &b);
            let ba = test_primitives(&b, &a);
            prop_assert_eq!(ab.is_some(), ba.is_some());
            if let (Some(ab), Some(ba)) = (ab, ba) {
                match (ab.mtv, ba.mtv) {
                    (Some(v1), Some(v2)) => prop_assert!((v1 + v2).length() < 0.001),
                    (None, None) => {}
                    _ => prop_assert!(false, "mtv presence differs"),
                }
            }
        }

        #[test]
        fn prop_circle_rect_is_symmetric(
            cx in -40.0f32..40.0, cy in -40.0f32..40.0, r in 1.0f32..15.0,
            w in 1.0f32..30.0, h in 1.0f32..30.0, rot in -3.0f32..3.0,
        ) {
            let c = Primitive::Circle(circle(cx, cy, r));
            let re = Primitive::Rect(rect(0.0, 0.0, w, h, rot));
            let cr = test_primitives(&c, &re);
            let rc = test_primitives(&re, &c);
            prop_assert_eq!(cr.is_some(), rc.is_some());
            if let (Some(cr), Some(rc)) = (cr, rc) {
                prop_assert_eq!(cr.mtv.map(|v| -v), rc.mtv);
            }
        }

        #[test]
        fn prop_rect_rect_is_symmetric(
            ax in -30.0f32..30.0, ay in -30.0f32..30.0, arot in -3.0f32..3.0,
            bx in -30.0f32..30.0, by in -30.0f32..30.0, brot in -3.0f32..3.0,
        ) {
            // Identical projections on every axis have no preferred side
            prop_assume!(ax != bx || ay != by);
            let a = rect(ax, ay, 20.0, 8.0, arot);
            let b = rect(bx, by, 12.0, 16.0, brot);
            let ab = rect_rect(&a, &b);
            let ba = rect_rect(&b, &a);
            prop_assert_eq!(ab.is_some(), ba.is_some());
            if let (Some(ab), Some(ba)) = (ab, ba) {
                prop_assert_eq!(ab.mtv, ba.mtv.map(|v| -v));
            }
        }
    }
}
