//! Uniform collision grid (spatial hash)
//!
//! The world is cut into square buckets. Every shape sits in exactly one
//! bucket (by its centre) and scans a square of neighbouring buckets sized by
//! its own bounding box. Each bucket threads two intrusive lists through the
//! shapes: mobile shapes, which are re-bucketed every tick, and static
//! shapes (level geometry), which never move.
//!
//! Per tick:
//! 1. `update_shape_positions` re-buckets mobile shapes that crossed a border
//! 2. `check_collisions` scans every shape that moved, narrow-phase tests its
//!    neighbours, then runs up to `max_resolution_passes` sub-passes letting
//!    response handlers push overlapping shapes apart.

use glam::Vec2;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};

use super::narrow;
use super::shape::{CollisionState, EntityId, GridLink, Membership, Shape};
use crate::consts::{BUCKET_PIXEL_SIZE, DEFAULT_SEED, MAX_RESOLUTION_PASSES};
use crate::settings::{ConfigError, GridSettings};

new_key_type! {
    /// Stable handle to a shape registered in a `CollisionGrid`.
    /// Removing a shape never invalidates other handles.
    pub struct ShapeHandle;
}

/// Bucket coordinate in grid units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BucketCoord {
    pub x: usize,
    pub y: usize,
}

impl BucketCoord {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Heads of the two shape lists threaded through a bucket
#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    mobile_head: Option<ShapeHandle>,
    static_head: Option<ShapeHandle>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BucketList {
    Mobile,
    Static,
}

/// Counters from one `check_collisions` call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CollisionStats {
    /// Broad-phase scans (a shape scanned in several sub-passes counts each time)
    pub scanned: usize,
    /// Narrow-phase tests actually run
    pub narrow_tests: usize,
    /// Resolution sub-passes used
    pub sub_passes: usize,
    /// Shapes still waiting on resolution when the pass cap was hit
    pub queued: usize,
    /// True when every queued overlap was handled before the cap
    pub converged: bool,
}

/// Collision grid owning every registered shape
#[derive(Debug)]
pub struct CollisionGrid {
    bucket_pixel_size: f32,
    /// Buckets along x and y
    grid_size: (usize, usize),
    /// Row-major: index = y * width + x
    buckets: Vec<Bucket>,
    shapes: SlotMap<ShapeHandle, Shape>,
    /// Shapes with frame-scope hits, in first-hit order
    frame_touched: Vec<ShapeHandle>,
    /// Shapes with loop-scope hits in the current sub-pass
    loop_touched: Vec<ShapeHandle>,
    max_resolution_passes: usize,
    rng: Pcg32,
    // Reused buffers
    scan_list: Vec<ShapeHandle>,
    candidates: Vec<ShapeHandle>,
}

impl CollisionGrid {
    /// Create an empty grid of `grid_size` buckets, each `bucket_pixel_size` wide
    pub fn new(grid_size: (usize, usize), bucket_pixel_size: f32) -> Self {
        assert!(grid_size.0 > 0 && grid_size.1 > 0, "grid needs at least one bucket");
        assert!(bucket_pixel_size > 0.0, "bucket size must be positive");
        log::debug!(
            "Collision grid {}x{} buckets of {}px",
            grid_size.0,
            grid_size.1,
            bucket_pixel_size
        );
        Self {
            bucket_pixel_size,
            grid_size,
            buckets: vec![Bucket::default(); grid_size.0 * grid_size.1],
            shapes: SlotMap::with_key(),
            frame_touched: Vec::new(),
            loop_touched: Vec::new(),
            max_resolution_passes: MAX_RESOLUTION_PASSES,
            rng: Pcg32::seed_from_u64(DEFAULT_SEED),
            scan_list: Vec::new(),
            candidates: Vec::new(),
        }
    }

    /// Create a grid covering a screen with default bucket size
    pub fn for_screen(width: f32, height: f32) -> Self {
        let settings = GridSettings::for_screen(width, height, BUCKET_PIXEL_SIZE);
        Self::new(
            (settings.grid_size[0], settings.grid_size[1]),
            settings.bucket_pixel_size,
        )
    }

    pub fn with_settings(settings: &GridSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        let mut grid = Self::new(
            (settings.grid_size[0], settings.grid_size[1]),
            settings.bucket_pixel_size,
        );
        grid.set_max_resolution_passes(settings.max_resolution_passes);
        grid.reseed(settings.seed);
        Ok(grid)
    }

    /// Reset the RNG that orders resolution
    pub fn reseed(&mut self, seed: u64) {
        self.rng = Pcg32::seed_from_u64(seed);
    }

    /// Clamped to `1..=MAX_RESOLUTION_PASSES`
    pub fn set_max_resolution_passes(&mut self, passes: usize) {
        self.max_resolution_passes = passes.clamp(1, MAX_RESOLUTION_PASSES);
    }

    pub fn max_resolution_passes(&self) -> usize {
        self.max_resolution_passes
    }

    pub fn grid_size(&self) -> (usize, usize) {
        self.grid_size
    }

    pub fn bucket_pixel_size(&self) -> f32 {
        self.bucket_pixel_size
    }

    // --- Shape access ---

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    pub fn contains(&self, handle: ShapeHandle) -> bool {
        self.shapes.contains_key(handle)
    }

    pub fn shape(&self, handle: ShapeHandle) -> Option<&Shape> {
        self.shapes.get(handle)
    }

    /// Mutable access for gameplay; geometry changes take effect in the
    /// bucket index on the next `update_shape_positions`
    pub fn shape_mut(&mut self, handle: ShapeHandle) -> Option<&mut Shape> {
        self.shapes.get_mut(handle)
    }

    pub fn handles(&self) -> impl Iterator<Item = ShapeHandle> + '_ {
        self.shapes.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShapeHandle, &Shape)> + '_ {
        self.shapes.iter()
    }

    // --- Bucket maths ---

    /// Bucket containing `pos`, clamped to the grid
    pub fn bucket_for(&self, pos: Vec2) -> BucketCoord {
        let cell = |v: f32, count: usize| {
            // NaN casts to 0, which the clamp keeps in range
            ((v / self.bucket_pixel_size).floor() as i64).clamp(0, count as i64 - 1) as usize
        };
        BucketCoord {
            x: cell(pos.x, self.grid_size.0),
            y: cell(pos.y, self.grid_size.1),
        }
    }

    #[inline]
    fn bucket_index(&self, coord: BucketCoord) -> usize {
        coord.y * self.grid_size.0 + coord.x
    }

    /// Buckets to scan around a shape's own bucket
    fn search_radius(&self, shape: &Shape) -> usize {
        (shape.longest_aabb_dimension() / self.bucket_pixel_size).ceil() as usize
    }

    /// Record a shape's bucket and refresh the range of buckets it scans
    fn set_bucket(&mut self, handle: ShapeHandle, bucket: BucketCoord) {
        let radius = self.search_radius(&self.shapes[handle]);
        let (width, height) = self.grid_size;
        let link = &mut self.shapes[handle].link;
        link.bucket = bucket;
        link.search_radius = radius;
        link.nearby_x = (bucket.x.saturating_sub(radius), bucket.x.saturating_add(radius).min(width - 1));
        link.nearby_y = (bucket.y.saturating_sub(radius), bucket.y.saturating_add(radius).min(height - 1));
    }

    /// Prepend a shape to its bucket's list
    fn link(&mut self, handle: ShapeHandle, list: BucketList) {
        let index = self.bucket_index(self.shapes[handle].link.bucket);
        let head = match list {
            BucketList::Mobile => &mut self.buckets[index].mobile_head,
            BucketList::Static => &mut self.buckets[index].static_head,
        };
        let old_head = head.replace(handle);

        if let Some(old_head) = old_head {
            self.shapes[old_head].link.prev = Some(handle);
        }
        let link = &mut self.shapes[handle].link;
        link.prev = None;
        link.next = old_head;
    }

    /// Remove a shape from its bucket's list
    fn unlink(&mut self, handle: ShapeHandle, list: BucketList) {
        let GridLink {
            bucket, prev, next, ..
        } = self.shapes[handle].link;

        match prev {
            Some(prev) => self.shapes[prev].link.next = next,
            None => {
                let index = self.bucket_index(bucket);
                let head = match list {
                    BucketList::Mobile => &mut self.buckets[index].mobile_head,
                    BucketList::Static => &mut self.buckets[index].static_head,
                };
                debug_assert_eq!(*head, Some(handle), "list head out of sync");
                *head = next;
            }
        }
        if let Some(next) = next {
            self.shapes[next].link.prev = prev;
        }

        let link = &mut self.shapes[handle].link;
        link.prev = None;
        link.next = None;
    }

    fn walk(&self, mut cursor: Option<ShapeHandle>, out: &mut Vec<ShapeHandle>) {
        while let Some(handle) = cursor {
            out.push(handle);
            cursor = self.shapes[handle].link.next;
        }
    }

    /// Mobile shapes currently filed under `coord`
    pub fn bucket_occupants(&self, coord: BucketCoord) -> Vec<ShapeHandle> {
        let mut out = Vec::new();
        self.walk(self.buckets[self.bucket_index(coord)].mobile_head, &mut out);
        out
    }

    /// Static shapes filed under `coord`
    pub fn static_occupants(&self, coord: BucketCoord) -> Vec<ShapeHandle> {
        let mut out = Vec::new();
        self.walk(self.buckets[self.bucket_index(coord)].static_head, &mut out);
        out
    }

    // --- Registration ---

    fn register(&mut self, mut shape: Shape, membership: Membership) -> ShapeHandle {
        debug_assert_eq!(
            shape.membership(),
            Membership::Detached,
            "shape is already registered with a grid"
        );
        shape.link = GridLink {
            membership,
            ..GridLink::default()
        };
        shape.state = CollisionState::default();
        shape.set_moved(membership == Membership::Mobile);

        let bucket = self.bucket_for(shape.position());
        let handle = self.shapes.insert(shape);
        self.set_bucket(handle, bucket);
        handle
    }

    /// Register a mobile shape; it is tested on the next `check_collisions`
    pub fn add(&mut self, shape: Shape) -> ShapeHandle {
        let handle = self.register(shape, Membership::Mobile);
        self.link(handle, BucketList::Mobile);
        handle
    }

    /// Register a shape that never moves (level geometry)
    ///
    /// Static shapes are never scanned themselves; moving shapes test against
    /// them. They should fit inside a single bucket.
    pub fn add_static(&mut self, shape: Shape) -> ShapeHandle {
        let handle = self.register(shape, Membership::Static);
        self.link(handle, BucketList::Static);
        handle
    }

    /// Unregister a shape and hand it back
    ///
    /// Removing an unknown handle is a programming error: it panics in debug
    /// builds and returns `None` otherwise.
    pub fn remove(&mut self, handle: ShapeHandle) -> Option<Shape> {
        debug_assert!(self.shapes.contains_key(handle), "removing a shape that is not in the grid");
        let Some(membership) = self.shapes.get(handle).map(Shape::membership) else {
            log::warn!("Ignoring removal of unknown shape {:?}", handle);
            return None;
        };

        let list = match membership {
            Membership::Static => BucketList::Static,
            _ => BucketList::Mobile,
        };
        self.unlink(handle, list);
        let mut shape = self.shapes.remove(handle)?;

        // Partners must not keep reporting a shape that no longer exists
        for &partner in shape.state.frame_hits().iter().chain(shape.state.loop_hits()) {
            if let Some(partner) = self.shapes.get_mut(partner) {
                partner.state.forget(handle);
            }
        }
        self.frame_touched.retain(|h| *h != handle);
        self.loop_touched.retain(|h| *h != handle);

        shape.link = GridLink::default();
        shape.state = CollisionState::default();
        shape.set_moved(true);
        Some(shape)
    }

    /// Move a mobile shape and re-bucket it immediately
    pub fn set_position(&mut self, handle: ShapeHandle, pos: Vec2) {
        debug_assert!(self.shapes.contains_key(handle), "moving a shape that is not in the grid");
        let Some(shape) = self.shapes.get_mut(handle) else {
            log::warn!("Ignoring set_position on unknown shape {:?}", handle);
            return;
        };
        debug_assert!(!shape.is_static(), "static shapes never move");
        if shape.is_static() {
            log::warn!("Ignoring set_position on static shape {:?}", handle);
            return;
        }
        shape.set_position(pos);
        self.relocate(handle);
    }

    /// Re-bucket one mobile shape if its centre left its bucket
    fn relocate(&mut self, handle: ShapeHandle) -> bool {
        let shape = &self.shapes[handle];
        let new_bucket = self.bucket_for(shape.position());
        if new_bucket == shape.link.bucket {
            return false;
        }
        log::trace!("Shape {:?} {:?} -> {:?}", handle, shape.link.bucket, new_bucket);
        self.unlink(handle, BucketList::Mobile);
        self.set_bucket(handle, new_bucket);
        self.link(handle, BucketList::Mobile);
        true
    }

    /// Re-bucket every mobile shape; returns how many changed bucket
    pub fn update_shape_positions(&mut self) -> usize {
        let mut mobile = std::mem::take(&mut self.scan_list);
        mobile.clear();
        mobile.extend(
            self.shapes
                .iter()
                .filter(|(_, s)| s.membership() == Membership::Mobile)
                .map(|(h, _)| h),
        );
        let moved = mobile.iter().filter(|h| self.relocate(**h)).count();
        self.scan_list = mobile;
        moved
    }

    // --- Collision pass ---

    /// One full tick: re-bucket, then detect and resolve
    pub fn tick(&mut self) -> CollisionStats {
        self.update_shape_positions();
        self.check_collisions()
    }

    /// Detect overlaps for every moved shape and resolve them
    ///
    /// Returns after at most `max_resolution_passes` sub-passes; overlaps
    /// left after that stay reported and are retried next tick.
    pub fn check_collisions(&mut self) -> CollisionStats {
        let mut stats = CollisionStats::default();

        for handle in self.frame_touched.drain(..) {
            if let Some(shape) = self.shapes.get_mut(handle) {
                shape.state.clear_frame();
            }
        }
        self.clear_loop_scope();

        let mut queue = Vec::new();
        self.scan_moved_shapes(&mut queue, &mut stats);

        let mut passes = 0;
        while !queue.is_empty() && passes < self.max_resolution_passes {
            // Shuffle first so ties in the sort don't always favour the same shape
            queue.shuffle(&mut self.rng);
            // Least-collided first: clear the edges of a pile-up before its centre
            queue.sort_by_key(|h| self.shapes.get(*h).map_or(0, |s| s.collided_this_loop().len()));

            for &handle in &queue {
                self.resolve(handle);
            }

            self.clear_loop_scope();
            queue.clear();
            self.scan_moved_shapes(&mut queue, &mut stats);
            passes += 1;
        }

        stats.sub_passes = passes;
        stats.queued = queue.len();
        stats.converged = queue.is_empty();
        if !stats.converged {
            log::debug!(
                "Collision resolution capped after {} passes, {} shapes still overlapping",
                passes,
                queue.len()
            );
        }
        stats
    }

    fn clear_loop_scope(&mut self) {
        for handle in self.loop_touched.drain(..) {
            if let Some(shape) = self.shapes.get_mut(handle) {
                shape.state.clear_loop();
            }
        }
    }

    /// Let one queued shape push itself out of its partners
    ///
    /// A shape moves at most once per sub-pass: as soon as it (or a partner)
    /// has moved since its last scan, the remaining pairs wait for the rescan.
    fn resolve(&mut self, handle: ShapeHandle) {
        let Some(shape) = self.shapes.get(handle) else {
            return;
        };
        if shape.collided_this_loop().is_empty() {
            return;
        }
        let mut partners = shape.collided_this_loop().to_vec();
        // Avoid bouncing between the same two shapes while ignoring a third
        partners.shuffle(&mut self.rng);

        for other in partners {
            let (Some(me), Some(them)) = (self.shapes.get(handle), self.shapes.get(other)) else {
                continue;
            };
            if me.moved_since_last_test() || them.moved_since_last_test() {
                continue;
            }
            let handler = me.handler_for(them.category());
            handler.handle(&mut self.shapes[handle], other);
        }
    }

    /// Broad-phase scan of every mobile shape flagged as moved
    fn scan_moved_shapes(&mut self, queue: &mut Vec<ShapeHandle>, stats: &mut CollisionStats) {
        let mut to_scan = std::mem::take(&mut self.scan_list);
        to_scan.clear();
        to_scan.extend(
            self.shapes
                .iter()
                .filter(|(_, s)| s.membership() == Membership::Mobile && s.moved_since_last_test())
                .map(|(h, _)| h),
        );
        for &handle in &to_scan {
            self.scan(handle, queue, stats);
        }
        self.scan_list = to_scan;
    }

    /// Test one shape against everything in its nearby buckets
    fn scan(&mut self, handle: ShapeHandle, queue: &mut Vec<ShapeHandle>, stats: &mut CollisionStats) {
        let shape = &mut self.shapes[handle];
        shape.set_moved(false);
        let (x_range, y_range) = (shape.link.nearby_x, shape.link.nearby_y);
        stats.scanned += 1;

        let mut candidates = std::mem::take(&mut self.candidates);
        candidates.clear();
        for y in y_range.0..=y_range.1 {
            for x in x_range.0..=x_range.1 {
                let bucket = self.buckets[self.bucket_index(BucketCoord { x, y })];
                self.walk(bucket.mobile_head, &mut candidates);
                self.walk(bucket.static_head, &mut candidates);
            }
        }

        for &other in &candidates {
            self.test_pair(handle, other, queue, stats);
        }
        self.candidates = candidates;
    }

    /// Broad checks, then narrow phase, for one (scanner, candidate) pair
    fn test_pair(
        &mut self,
        handle: ShapeHandle,
        other: ShapeHandle,
        queue: &mut Vec<ShapeHandle>,
        stats: &mut CollisionStats,
    ) {
        if handle == other {
            return;
        }
        let (Some(shape), Some(candidate)) = (self.shapes.get(handle), self.shapes.get(other)) else {
            return;
        };
        let interested = shape.collides_with().contains(candidate.category())
            || candidate.collides_with().contains(shape.category());
        if !interested || !shape.aabb().overlaps(candidate.aabb()) {
            return;
        }

        let handler = shape.handler_for(candidate.category());
        if shape.state.in_loop(other) {
            // Already known to overlap this sub-pass: reuse the stored vector
            handler.record_for_handling(queue, handle, shape, other);
            return;
        }

        stats.narrow_tests += 1;
        let Some(contact) = narrow::test_shapes(shape.kind(), candidate.kind()) else {
            return;
        };
        if let Some(mtv) = contact.mtv {
            self.shapes[handle].state.set_mtv(other, mtv);
            self.shapes[other].state.set_mtv(handle, -mtv);
        }

        let needs_resolving = self.shapes[handle].loop_mtv(other).is_some();
        self.record_hit(handle, other, needs_resolving);
        if needs_resolving {
            handler.record_for_handling(queue, handle, &self.shapes[handle], other);
        }
    }

    fn record_hit(&mut self, a: ShapeHandle, b: ShapeHandle, needs_resolving: bool) {
        for (me, them) in [(a, b), (b, a)] {
            let state = &mut self.shapes[me].state;
            if state.frame_hits().is_empty() {
                self.frame_touched.push(me);
            }
            state.add_frame_hit(them);

            if needs_resolving {
                if state.loop_hits().is_empty() {
                    self.loop_touched.push(me);
                }
                state.add_loop_hit(them);
            }
        }
    }

    // --- Queries ---

    /// Every shape that overlapped something during the last `check_collisions`
    pub fn shapes_collided_this_frame(&self) -> &[ShapeHandle] {
        &self.frame_touched
    }

    /// Owners of the shapes in `shapes_collided_this_frame`, for dispatching
    /// gameplay reactions
    pub fn collided_owners(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.frame_touched
            .iter()
            .filter_map(|h| self.shapes.get(*h).and_then(Shape::owner))
    }
}
