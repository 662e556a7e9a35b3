//! Collision response handlers
//!
//! A handler decides what happens to a shape once it is known to overlap
//! another: nothing at all (the overlap is only reported to gameplay), or a
//! push along the stored translation vector so the two just stop touching.

use serde::{Deserialize, Serialize};

use super::category::GameCategory;
use super::grid::ShapeHandle;
use super::shape::Shape;

/// Response to an overlap, chosen per (shape, other category)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResponseHandler {
    /// Detect only (e.g. projectile vs monster: the projectile destroys itself)
    #[default]
    NoHandler,
    /// Push the shape out by its translation vector
    Rub,
}

impl ResponseHandler {
    /// Resolve `mover`'s overlap with `other`
    ///
    /// Returns true when the shape may need further handling: moving it
    /// clears this overlap but can create new ones.
    pub fn handle(self, mover: &mut Shape, other: ShapeHandle) -> bool {
        match self {
            ResponseHandler::NoHandler => false,
            ResponseHandler::Rub => {
                if mover.is_static() {
                    return false;
                }
                match mover.loop_mtv(other) {
                    Some(mtv) => {
                        mover.translate(mtv);
                        true
                    }
                    None => false,
                }
            }
        }
    }

    /// Queue `handle` for resolution against `other` this sub-pass
    ///
    /// Only pairs with a translation vector are queued; each shape appears
    /// in the queue once.
    pub fn record_for_handling(
        self,
        queue: &mut Vec<ShapeHandle>,
        handle: ShapeHandle,
        shape: &Shape,
        other: ShapeHandle,
    ) {
        match self {
            ResponseHandler::NoHandler => {}
            ResponseHandler::Rub => {
                if shape.loop_mtv(other).is_some() && !queue.contains(&handle) {
                    queue.push(handle);
                }
            }
        }
    }
}

/// One shape's row of the category handler matrix
///
/// Every category has an entry, so lookups can't miss; unlisted categories
/// keep `NoHandler`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HandlerTable([ResponseHandler; GameCategory::COUNT]);

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of `set`
    pub fn with(mut self, other: GameCategory, handler: ResponseHandler) -> Self {
        self.set(other, handler);
        self
    }

    /// `Rub` against every listed category
    pub fn rub_against(categories: &[GameCategory]) -> Self {
        categories
            .iter()
            .fold(Self::new(), |table, c| table.with(*c, ResponseHandler::Rub))
    }

    pub fn set(&mut self, other: GameCategory, handler: ResponseHandler) {
        self.0[other.index()] = handler;
    }

    #[inline]
    pub fn get(&self, other: GameCategory) -> ResponseHandler {
        self.0[other.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::category::CategorySet;
    use glam::Vec2;
    use slotmap::SlotMap;

    fn shape_at(x: f32) -> Shape {
        Shape::circle(
            Vec2::new(x, 0.0),
            5.0,
            HandlerTable::rub_against(&[GameCategory::Monster]),
            GameCategory::Monster,
            CategorySet::of(&[GameCategory::Monster]),
        )
    }

    fn handle() -> ShapeHandle {
        let mut keys: SlotMap<ShapeHandle, ()> = SlotMap::with_key();
        keys.insert(())
    }

    #[test]
    fn test_table_defaults_to_no_handler() {
        let table = HandlerTable::new().with(GameCategory::Tile, ResponseHandler::Rub);
        assert_eq!(table.get(GameCategory::Tile), ResponseHandler::Rub);
        for category in [GameCategory::Monster, GameCategory::Explosion, GameCategory::TurretProjectile] {
            assert_eq!(table.get(category), ResponseHandler::NoHandler);
        }
    }

    #[test]
    fn test_rub_moves_by_loop_mtv() {
        let other = handle();
        let mut mover = shape_at(0.0);
        mover.state.set_mtv(other, Vec2::new(-3.0, 0.0));

        assert!(ResponseHandler::Rub.handle(&mut mover, other));
        assert_eq!(mover.position(), Vec2::new(-3.0, 0.0));
        assert!(mover.moved_since_last_test());
    }

    #[test]
    fn test_rub_without_mtv_does_nothing() {
        let mut mover = shape_at(4.0);
        assert!(!ResponseHandler::Rub.handle(&mut mover, handle()));
        assert_eq!(mover.position(), Vec2::new(4.0, 0.0));
    }

    #[test]
    fn test_no_handler_never_moves_or_queues() {
        let other = handle();
        let me = handle();
        let mut mover = shape_at(0.0);
        mover.state.set_mtv(other, Vec2::new(2.0, 0.0));

        assert!(!ResponseHandler::NoHandler.handle(&mut mover, other));
        assert_eq!(mover.position(), Vec2::ZERO);

        let mut queue = Vec::new();
        ResponseHandler::NoHandler.record_for_handling(&mut queue, me, &mover, other);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_rub_queues_once_and_only_with_mtv() {
        let mut keys: SlotMap<ShapeHandle, ()> = SlotMap::with_key();
        let me = keys.insert(());
        let with_mtv = keys.insert(());
        let without_mtv = keys.insert(());

        let mut shape = shape_at(0.0);
        shape.state.set_mtv(with_mtv, Vec2::new(1.0, 1.0));

        let mut queue = Vec::new();
        ResponseHandler::Rub.record_for_handling(&mut queue, me, &shape, without_mtv);
        assert!(queue.is_empty());
        ResponseHandler::Rub.record_for_handling(&mut queue, me, &shape, with_mtv);
        ResponseHandler::Rub.record_for_handling(&mut queue, me, &shape, with_mtv);
        assert_eq!(queue, vec![me]);
    }
}
