//! Collision categories
//!
//! Every shape carries one category and a set of categories it wants to be
//! tested against. Pairs where neither side lists the other are never
//! narrow-phase tested.

use serde::{Deserialize, Serialize};

/// What kind of game object a shape belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GameCategory {
    Monster,
    TurretProjectile,
    Explosion,
    /// Static level geometry (tile edges and seams)
    Tile,
}

impl GameCategory {
    /// Number of categories (size of handler tables)
    pub const COUNT: usize = 4;

    pub const ALL: [GameCategory; Self::COUNT] = [
        GameCategory::Monster,
        GameCategory::TurretProjectile,
        GameCategory::Explosion,
        GameCategory::Tile,
    ];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            GameCategory::Monster => 0,
            GameCategory::TurretProjectile => 1,
            GameCategory::Explosion => 2,
            GameCategory::Tile => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GameCategory::Monster => "monster",
            GameCategory::TurretProjectile => "turret_projectile",
            GameCategory::Explosion => "explosion",
            GameCategory::Tile => "tile",
        }
    }
}

/// Small bitset of categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategorySet(u8);

impl CategorySet {
    pub const EMPTY: CategorySet = CategorySet(0);

    pub fn of(categories: &[GameCategory]) -> Self {
        categories.iter().copied().collect()
    }

    #[inline]
    pub fn contains(self, category: GameCategory) -> bool {
        self.0 & (1 << category.index()) != 0
    }

    pub fn insert(&mut self, category: GameCategory) {
        self.0 |= 1 << category.index();
    }

    pub fn remove(&mut self, category: GameCategory) {
        self.0 &= !(1 << category.index());
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = GameCategory> {
        GameCategory::ALL.into_iter().filter(move |c| self.contains(*c))
    }
}

impl FromIterator<GameCategory> for CategorySet {
    fn from_iter<I: IntoIterator<Item = GameCategory>>(iter: I) -> Self {
        let mut set = CategorySet::EMPTY;
        for category in iter {
            set.insert(category);
        }
        set
    }
}
