//! Spatial hash grid for neighbor search.
//!
//! Turns the all-pairs neighbor search into an expected O(n) pass for evenly
//! spread particles. Cells are hashed into a fixed-size table with
//!
//! ```text
//! hash(x, y, z) = (x·P1 ⊕ y·P2 ⊕ z·P3) mod table_size
//! ```
//!
//! and bucketed with a counting sort, so each table slot owns one contiguous
//! run of particle indices:
//!
//! ```text
//! cell_start:   [0, 0, 2, 2, 3, 5]
//! cell_entries: [4, 1, 0, 3, 2]
//!                └─┘ slot 1  └──┘ slot 4
//! ```
//!
//! Distinct cells may land in the same slot. Queries therefore return a
//! superset of the true neighbors; callers filter by exact distance.

use log::warn;

use crate::types::{Particle, ParticleId, Vec3};

const P1: i64 = 92_837_111;
const P2: i64 = 689_287_499;
const P3: i64 = 283_923_481;

/// Integer cell coordinate.
pub type Cell = [i64; 3];

#[derive(Debug, Clone)]
pub struct SpatialHashGrid {
    cell_size: f64,
    table_size: usize,
    /// `table_size + 1` offsets; slot `h` owns `cell_start[h]..cell_start[h + 1]`.
    cell_start: Vec<usize>,
    cell_entries: Vec<ParticleId>,
}

impl SpatialHashGrid {
    /// A grid with the given cell edge and number of hash slots.
    ///
    /// A non-positive or non-finite cell size falls back to `1.0`.
    pub fn new(cell_size: f64, table_size: usize) -> Self {
        let cell_size = if cell_size.is_finite() && cell_size > 0.0 {
            cell_size
        } else {
            warn!("invalid grid cell size {}, using 1.0", cell_size);
            1.0
        };
        let table_size = table_size.max(1);
        Self {
            cell_size,
            table_size,
            cell_start: vec![0; table_size + 1],
            cell_entries: Vec::new(),
        }
    }

    /// Grid sized for `n` particles: twice as many slots as particles.
    pub fn for_particles(cell_size: f64, n: usize) -> Self {
        Self::new(cell_size, 2 * n)
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn table_size(&self) -> usize {
        self.table_size
    }

    pub fn cell_coord(&self, pos: Vec3) -> Cell {
        let c = (pos / self.cell_size).floor();
        [c.x as i64, c.y as i64, c.z as i64]
    }

    pub fn hash_cell(&self, [x, y, z]: Cell) -> usize {
        let h = x.wrapping_mul(P1) ^ y.wrapping_mul(P2) ^ z.wrapping_mul(P3);
        (h.unsigned_abs() % self.table_size as u64) as usize
    }

    pub fn hash_pos(&self, pos: Vec3) -> usize {
        self.hash_cell(self.cell_coord(pos))
    }

    /// Rebuild the table from the current particle positions.
    pub fn create(&mut self, particles: &[Particle]) {
        let slots: Vec<usize> = particles.iter().map(|p| self.hash_pos(p.pos)).collect();

        self.cell_start.clear();
        self.cell_start.resize(self.table_size + 1, 0);
        for &h in &slots {
            self.cell_start[h] += 1;
        }

        // Inclusive prefix sum: cell_start[h] now points one past slot h's run
        let mut total = 0;
        for start in self.cell_start.iter_mut() {
            total += *start;
            *start = total;
        }

        // Scatter, decrementing each slot's end down to its start
        self.cell_entries.clear();
        self.cell_entries.resize(particles.len(), 0);
        for (i, &h) in slots.iter().enumerate() {
            self.cell_start[h] -= 1;
            self.cell_entries[self.cell_start[h]] = i;
        }
    }

    /// The run of particle indices stored in slot `h`.
    pub fn slot(&self, h: usize) -> &[ParticleId] {
        match (self.cell_start.get(h), self.cell_start.get(h + 1)) {
            (Some(&start), Some(&end)) if start <= end => &self.cell_entries[start..end],
            _ => &[],
        }
    }

    /// Append to `out` every particle stored in a cell overlapping the cube
    /// of half-width `radius` around `pos`, skipping `exclude`.
    ///
    /// Each slot is visited once, so no id is reported twice. When the cube
    /// spans at least as many cells as there are slots, every particle is a
    /// candidate and the cell walk is skipped.
    pub fn query_into(
        &self,
        pos: Vec3,
        radius: f64,
        exclude: Option<ParticleId>,
        out: &mut Vec<ParticleId>,
    ) {
        let radius = if radius.is_finite() { radius.max(0.0) } else { 0.0 };
        let lo = self.cell_coord(pos - Vec3::splat(radius));
        let hi = self.cell_coord(pos + Vec3::splat(radius));

        let span = (0..3)
            .map(|a| (hi[a].saturating_sub(lo[a]) as u64).saturating_add(1))
            .fold(1u64, u64::saturating_mul);
        if span >= self.table_size as u64 {
            out.extend(self.cell_entries.iter().copied().filter(|&j| Some(j) != exclude));
            return;
        }

        let mut slots = Vec::new();
        for x in lo[0]..=hi[0] {
            for y in lo[1]..=hi[1] {
                for z in lo[2]..=hi[2] {
                    slots.push(self.hash_cell([x, y, z]));
                }
            }
        }
        slots.sort_unstable();
        slots.dedup();

        for h in slots {
            out.extend(self.slot(h).iter().copied().filter(|&j| Some(j) != exclude));
        }
    }

    pub fn query(&self, pos: Vec3, radius: f64, exclude: Option<ParticleId>) -> Vec<ParticleId> {
        let mut out = Vec::new();
        self.query_into(pos, radius, exclude, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lattice(n: i32, spacing: f64) -> Vec<Particle> {
        let mut ps = Vec::new();
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    let pos = Vec3::new(i as f64, j as f64, k as f64) * spacing;
                    let mut p = Particle::new(pos, 1.0).unwrap();
                    p.id = ps.len();
                    ps.push(p);
                }
            }
        }
        ps
    }

    #[test]
    fn test_slots_partition_particles() {
        let ps = lattice(4, 0.7);
        let mut grid = SpatialHashGrid::for_particles(1.0, ps.len());
        grid.create(&ps);

        let mut seen = vec![0; ps.len()];
        for h in 0..grid.table_size() {
            for &i in grid.slot(h) {
                assert_eq!(grid.hash_pos(ps[i].pos), h, "Particle {} in wrong slot", i);
                seen[i] += 1;
            }
        }
        assert!(seen.iter().all(|&c| c == 1), "Every particle stored exactly once");
        assert_eq!(grid.slot(grid.table_size()), &[] as &[usize]);
    }

    #[test]
    fn test_negative_coordinates_hash_in_range() {
        let grid = SpatialHashGrid::new(0.5, 7);
        for pos in [
            Vec3::new(-1e6, -3.2, 4.0),
            Vec3::new(-0.1, -0.1, -0.1),
            Vec3::new(1e9, -1e9, 0.0),
        ] {
            assert!(grid.hash_pos(pos) < 7);
        }
        assert_eq!(grid.cell_coord(Vec3::new(-0.1, 0.0, 0.6)), [-1, 0, 1]);
    }

    #[test]
    fn test_lattice_half_cell_query_finds_only_self() {
        let cell = 1.0;
        let ps = lattice(5, cell);
        let mut grid = SpatialHashGrid::for_particles(cell, ps.len());
        grid.create(&ps);

        for p in &ps {
            let found: Vec<usize> = grid
                .query(p.pos, cell / 2.0, None)
                .into_iter()
                .filter(|&j| (ps[j].pos - p.pos).magnitude() <= cell / 2.0)
                .collect();
            assert_eq!(found, vec![p.id], "Query around {:?}", p.pos);
        }
    }

    #[test]
    fn test_query_is_superset_of_true_neighbors() {
        let ps = lattice(6, 0.37);
        let cell = 0.5;
        let mut grid = SpatialHashGrid::for_particles(cell, ps.len());
        grid.create(&ps);

        for radius in [cell, 2.0 * cell] {
            for p in &ps {
                let found = grid.query(p.pos, radius, Some(p.id));
                for q in &ps {
                    if q.id != p.id && (q.pos - p.pos).magnitude() <= radius {
                        assert!(
                            found.contains(&q.id),
                            "Missed neighbor {} of {} at radius {}",
                            q.id,
                            p.id,
                            radius
                        );
                    }
                }
                assert!(!found.contains(&p.id), "Excluded id must not appear");
            }
        }
    }

    #[test]
    fn test_query_has_no_duplicates_with_tiny_table() {
        // One slot: every cell collides
        let ps = lattice(3, 1.0);
        let mut grid = SpatialHashGrid::new(1.0, 1);
        grid.create(&ps);

        let mut found = grid.query(Vec3::splat(1.0), 1.0, None);
        assert_eq!(found.len(), ps.len());
        found.sort_unstable();
        found.dedup();
        assert_eq!(found.len(), ps.len());
    }

    #[test]
    fn test_huge_radius_returns_everything_but_excluded() {
        let ps = lattice(3, 1.0);
        let mut grid = SpatialHashGrid::for_particles(1.0, ps.len());
        grid.create(&ps);

        for radius in [1e12, f64::MAX] {
            let mut found = grid.query(Vec3::splat(1.0), radius, Some(13));
            found.sort_unstable();
            let expected: Vec<usize> = (0..ps.len()).filter(|&i| i != 13).collect();
            assert_eq!(found, expected, "Radius {}", radius);
        }
    }

    #[test]
    fn test_empty_grid() {
        let mut grid = SpatialHashGrid::for_particles(1.0, 0);
        grid.create(&[]);
        assert!(grid.query(Vec3::ZERO, 3.0, None).is_empty());
    }

    #[test]
    fn test_invalid_cell_size_falls_back() {
        let grid = SpatialHashGrid::new(0.0, 4);
        assert_eq!(grid.cell_size(), 1.0);
    }
}
