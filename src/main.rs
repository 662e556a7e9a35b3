//! Castle collision demo
//!
//! Headless skirmish: monsters march on the castle wall, the turret behind it
//! shoots, and every bullet that lands sets off an explosion. Collision stats
//! are logged once per simulated second.
//!
//! Usage: `castle-collision [settings.json]`

use castle_collision::collision::{EntityId, RectEdge};
use castle_collision::consts::{SCREEN_HEIGHT, SCREEN_WIDTH};
use castle_collision::{
    CategorySet, CollisionGrid, CollisionStats, ConfigError, GameCategory, GridSettings,
    HandlerTable, Shape, ShapeHandle,
};
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

const TICKS: u32 = 1200;
const DT: f32 = 1.0 / 60.0;
const WALL_X: f32 = 1000.0;
const TILE_SIZE: f32 = 32.0;
const TURRET_POS: Vec2 = Vec2::new(1200.0, SCREEN_HEIGHT / 2.0);
const MONSTER_SPEED: f32 = 60.0;
const BULLET_SPEED: f32 = 420.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Role {
    Monster { hp: i32 },
    Bullet,
    /// Damages on its first frame, lingers for `ttl` ticks
    Explosion { ttl: u32, fresh: bool },
    Wall,
}

struct Entity {
    role: Role,
    shape: ShapeHandle,
    velocity: Vec2,
    alive: bool,
}

struct Skirmish {
    grid: CollisionGrid,
    entities: Vec<Entity>,
    rng: Pcg32,
    kills: u32,
    breaches: u32,
}

impl Skirmish {
    fn new(grid: CollisionGrid, seed: u64) -> Self {
        let mut skirmish = Self {
            grid,
            entities: Vec::new(),
            rng: Pcg32::seed_from_u64(seed),
            kills: 0,
            breaches: 0,
        };
        skirmish.build_wall();
        skirmish
    }

    fn next_id(&self) -> EntityId {
        EntityId(self.entities.len() as u32)
    }

    fn spawn(&mut self, role: Role, mut shape: Shape, velocity: Vec2, label: &str) -> EntityId {
        let id = self.next_id();
        shape.set_owner(id);
        shape.set_id(format!("{label}-{}", id.0));
        let handle = match role {
            Role::Wall => self.grid.add_static(shape),
            _ => self.grid.add(shape),
        };
        self.entities.push(Entity {
            role,
            shape: handle,
            velocity,
            alive: true,
        });
        id
    }

    /// A column of tiles; inner seams are skipped so monsters slide along it
    fn build_wall(&mut self) {
        let rows = (SCREEN_HEIGHT / TILE_SIZE) as usize;
        for row in 0..rows {
            let mut tile = Shape::rect(
                Vec2::new(WALL_X, (row as f32 + 0.5) * TILE_SIZE),
                TILE_SIZE,
                TILE_SIZE,
                0.0,
                HandlerTable::new(),
                GameCategory::Tile,
                CategorySet::of(&[GameCategory::Monster]),
            );
            if row > 0 {
                tile.set_edge_skip(RectEdge::Top, true);
            }
            if row + 1 < rows {
                tile.set_edge_skip(RectEdge::Bottom, true);
            }
            self.spawn(Role::Wall, tile, Vec2::ZERO, "tile");
        }
    }

    fn spawn_monster(&mut self) {
        let y = self.rng.random_range(40.0..SCREEN_HEIGHT - 40.0);
        let radius = self.rng.random_range(10.0..18.0);
        let shape = Shape::circle(
            Vec2::new(20.0, y),
            radius,
            HandlerTable::rub_against(&[GameCategory::Monster, GameCategory::Tile]),
            GameCategory::Monster,
            CategorySet::of(&[GameCategory::Monster, GameCategory::Tile]),
        );
        let hp = if radius > 14.0 { 3 } else { 2 };
        self.spawn(
            Role::Monster { hp },
            shape,
            Vec2::new(MONSTER_SPEED, 0.0),
            "monster",
        );
    }

    fn fire(&mut self) {
        let spread = self.rng.random_range(-0.35f32..0.35);
        let direction = Vec2::new(-spread.cos(), spread.sin());
        let shape = Shape::rect(
            TURRET_POS,
            10.0,
            3.0,
            spread,
            HandlerTable::new(),
            GameCategory::TurretProjectile,
            CategorySet::of(&[GameCategory::Monster]),
        );
        self.spawn(Role::Bullet, shape, direction * BULLET_SPEED, "bullet");
    }

    fn explode(&mut self, at: Vec2) {
        let mut blast = Shape::composite(
            at,
            Vec2::splat(40.0),
            HandlerTable::new(),
            GameCategory::Explosion,
            CategorySet::of(&[GameCategory::Monster]),
        );
        blast.add_circle(Vec2::ZERO, 18.0);
        blast.add_rotatable_rect(Vec2::ZERO, 56.0, 8.0, self.rng.random_range(0.0..std::f32::consts::PI));
        self.spawn(
            Role::Explosion { ttl: 12, fresh: true },
            blast,
            Vec2::ZERO,
            "explosion",
        );
    }

    fn advance(&mut self) {
        for entity in self.entities.iter().filter(|e| e.alive && e.velocity != Vec2::ZERO) {
            if let Some(shape) = self.grid.shape_mut(entity.shape) {
                shape.translate(entity.velocity * DT);
            }
        }
    }

    /// Owners of everything `id`'s shape touched this frame
    fn partners(&self, id: EntityId) -> Vec<EntityId> {
        let Some(shape) = self.grid.shape(self.entities[id.0 as usize].shape) else {
            return Vec::new();
        };
        shape
            .collided_this_frame()
            .iter()
            .filter_map(|h| self.grid.shape(*h).and_then(Shape::owner))
            .collect()
    }

    fn damage(&mut self, id: EntityId) {
        let entity = &mut self.entities[id.0 as usize];
        if let Role::Monster { hp } = &mut entity.role {
            *hp -= 1;
            if *hp <= 0 && entity.alive {
                entity.alive = false;
                self.kills += 1;
            }
        }
    }

    fn react_to_collisions(&mut self) {
        let owners: Vec<EntityId> = self.grid.collided_owners().collect();
        for id in owners {
            let index = id.0 as usize;
            if !self.entities[index].alive {
                continue;
            }
            match self.entities[index].role {
                Role::Bullet => {
                    let Some(target) = self
                        .partners(id)
                        .into_iter()
                        .find(|p| self.entities[p.0 as usize].alive)
                    else {
                        continue;
                    };
                    self.entities[index].alive = false;
                    self.damage(target);
                    if let Some(pos) = self.grid.shape(self.entities[index].shape).map(Shape::position) {
                        self.explode(pos);
                    }
                }
                Role::Explosion { fresh: true, .. } => {
                    for target in self.partners(id) {
                        self.damage(target);
                    }
                }
                Role::Monster { .. } | Role::Explosion { .. } | Role::Wall => {}
            }
        }
    }

    fn age_and_cull(&mut self) {
        for entity in self.entities.iter_mut().filter(|e| e.alive) {
            let pos = self.grid.shape(entity.shape).map(Shape::position).unwrap_or_default();
            match &mut entity.role {
                Role::Explosion { ttl, fresh } => {
                    *fresh = false;
                    *ttl = ttl.saturating_sub(1);
                    entity.alive = *ttl > 0;
                }
                Role::Bullet => {
                    entity.alive = pos.x > -20.0 && (0.0..SCREEN_HEIGHT).contains(&pos.y);
                }
                Role::Monster { .. } if pos.x > WALL_X => {
                    // Squeezed past the wall
                    entity.alive = false;
                    self.breaches += 1;
                }
                Role::Monster { .. } | Role::Wall => {}
            }
        }

        for entity in self.entities.iter().filter(|e| !e.alive) {
            if self.grid.contains(entity.shape) {
                self.grid.remove(entity.shape);
            }
        }
    }

    fn step(&mut self, tick: u32) -> CollisionStats {
        if tick % 30 == 0 {
            self.spawn_monster();
        }
        if tick % 12 == 0 {
            self.fire();
        }
        self.advance();
        let stats = self.grid.tick();
        self.react_to_collisions();
        self.age_and_cull();
        stats
    }
}

fn main() -> Result<(), ConfigError> {
    #[cfg(not(target_arch = "wasm32"))]
    env_logger::init();

    let settings = match std::env::args().nth(1) {
        Some(path) => GridSettings::load(path)?,
        None => GridSettings::default(),
    };
    log::info!(
        "Castle collision demo: {}x{} screen, {:?} buckets",
        SCREEN_WIDTH,
        SCREEN_HEIGHT,
        settings.grid_size
    );

    let grid = CollisionGrid::with_settings(&settings)?;
    let mut skirmish = Skirmish::new(grid, settings.seed);

    let mut capped = 0;
    let mut last = CollisionStats::default();
    for tick in 0..TICKS {
        last = skirmish.step(tick);
        if !last.converged {
            capped += 1;
        }
        if tick % 60 == 0 {
            log::info!(
                "t={:>3}s shapes={:>3} scanned={:>3} narrow={:>3} passes={:>2} converged={}",
                tick / 60,
                skirmish.grid.len(),
                last.scanned,
                last.narrow_tests,
                last.sub_passes,
                last.converged
            );
        }
    }

    println!("Kills: {}", skirmish.kills);
    println!("Breaches: {}", skirmish.breaches);
    println!("Ticks that hit the pass cap: {capped}");
    println!("Last tick: {}", serde_json::to_string(&last)?);
    Ok(())
}
