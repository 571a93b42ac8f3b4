use glam::Vec3;

use super::shape::Aabb;

/// Geometry spanning more cells than this goes on the oversized list.
const MAX_CELLS_PER_ITEM: i64 = 64;

/// Spatial hash grid over AABBs for broad-phase pair culling.
///
/// Each item is inserted into every cell its AABB touches. Items that are
/// unbounded (planes) or very large live on a separate oversized list that
/// every query returns. Uses multiplicative hash for even distribution.
pub struct SpatialHash {
    inv_cell_size: f32,
    table_size: usize,
    /// Each bucket holds item indices. Pre-allocated, cleared each step.
    buckets: Vec<Vec<u32>>,
    oversized: Vec<u32>,
}

impl SpatialHash {
    pub fn new(cell_size: f32, table_size: usize) -> Self {
        let mut buckets = Vec::with_capacity(table_size);
        for _ in 0..table_size {
            buckets.push(Vec::with_capacity(4));
        }
        Self {
            inv_cell_size: 1.0 / cell_size,
            table_size,
            buckets,
            oversized: Vec::new(),
        }
    }

    /// Clear all buckets. Call at start of each rebuild.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear(); // Keeps allocation.
        }
        self.oversized.clear();
    }

    pub fn insert(&mut self, aabb: &Aabb, item: u32) {
        match self.cell_range(aabb) {
            Some((lo, hi)) => {
                for cz in lo[2]..=hi[2] {
                    for cy in lo[1]..=hi[1] {
                        for cx in lo[0]..=hi[0] {
                            let hash = self.hash_cell(cx, cy, cz);
                            let bucket = &mut self.buckets[hash];
                            // Hash collisions can map two cells of one item to the same bucket.
                            if bucket.last() != Some(&item) {
                                bucket.push(item);
                            }
                        }
                    }
                }
            }
            None => self.oversized.push(item),
        }
    }

    /// Every item sharing a cell with `aabb`, plus all oversized items.
    /// May report an item more than once.
    pub fn query(&self, aabb: &Aabb, mut callback: impl FnMut(u32)) {
        for &item in &self.oversized {
            callback(item);
        }
        match self.cell_range(aabb) {
            Some((lo, hi)) => {
                for cz in lo[2]..=hi[2] {
                    for cy in lo[1]..=hi[1] {
                        for cx in lo[0]..=hi[0] {
                            let hash = self.hash_cell(cx, cy, cz);
                            for &item in &self.buckets[hash] {
                                callback(item);
                            }
                        }
                    }
                }
            }
            None => {
                for bucket in &self.buckets {
                    for &item in bucket {
                        callback(item);
                    }
                }
            }
        }
    }

    /// Inclusive cell range of an AABB, or `None` when it is unbounded or too big.
    fn cell_range(&self, aabb: &Aabb) -> Option<([i64; 3], [i64; 3])> {
        if !aabb.is_finite() {
            return None;
        }
        let lo = self.cell_coords(aabb.min);
        let hi = self.cell_coords(aabb.max);
        // Huge finite bounds saturate the cell coordinates; overflow counts as oversized.
        let span = (0..3).try_fold(1i64, |acc, i| {
            hi[i].checked_sub(lo[i])?.checked_add(1)?.checked_mul(acc)
        })?;
        (span <= MAX_CELLS_PER_ITEM).then_some((lo, hi))
    }

    fn cell_coords(&self, p: Vec3) -> [i64; 3] {
        let c = (p * self.inv_cell_size).floor();
        [c.x as i64, c.y as i64, c.z as i64]
    }

    fn hash_cell(&self, cx: i64, cy: i64, cz: i64) -> usize {
        let h = (cx as u32).wrapping_mul(73856093)
            ^ (cy as u32).wrapping_mul(19349663)
            ^ (cz as u32).wrapping_mul(83492791);
        (h as usize) % self.table_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(c: Vec3, he: f32) -> Aabb {
        Aabb::from_center_half_extents(c, Vec3::splat(he))
    }

    #[test]
    fn insert_and_query() {
        let mut grid = SpatialHash::new(4.0, 256);
        grid.insert(&cube(Vec3::new(1.0, 1.0, 1.0), 0.5), 0);
        grid.insert(&cube(Vec3::new(1.5, 1.2, 0.8), 0.5), 1);
        grid.insert(&cube(Vec3::new(900.0, 900.0, 900.0), 0.5), 2);

        let mut found = Vec::new();
        grid.query(&cube(Vec3::new(1.2, 1.0, 1.0), 0.5), |idx| found.push(idx));

        assert!(found.contains(&0));
        assert!(found.contains(&1));
    }

    #[test]
    fn unbounded_items_are_always_reported() {
        let mut grid = SpatialHash::new(4.0, 64);
        grid.insert(&Aabb::INFINITE, 7);
        grid.insert(&cube(Vec3::ZERO, 1000.0), 8);

        let mut found = Vec::new();
        grid.query(&cube(Vec3::new(-50.0, 3.0, 12.0), 0.1), |idx| found.push(idx));
        assert!(found.contains(&7));
        assert!(found.contains(&8));
    }

    #[test]
    fn huge_finite_bounds_go_on_the_oversized_list() {
        let mut grid = SpatialHash::new(4.0, 64);
        let huge = Aabb {
            min: Vec3::splat(-1.0e30),
            max: Vec3::splat(1.0e30),
        };
        grid.insert(&huge, 3);
        grid.insert(&cube(Vec3::new(1.0e20, 0.0, 0.0), 1.0e19), 4);

        let mut found = Vec::new();
        grid.query(&cube(Vec3::ZERO, 0.5), |idx| found.push(idx));
        assert_eq!(found, vec![3, 4]);

        found.clear();
        grid.query(&huge, |idx| found.push(idx));
        assert!(found.contains(&3) && found.contains(&4));
    }

    #[test]
    fn clear_and_reuse() {
        let mut grid = SpatialHash::new(4.0, 64);
        grid.insert(&cube(Vec3::splat(5.0), 0.5), 42);
        grid.clear();

        let mut found = Vec::new();
        grid.query(&cube(Vec3::splat(5.0), 0.5), |idx| found.push(idx));
        assert!(found.is_empty());
    }
}
