//! # Output Grids
//!
//! Flat row-major storage for the 4-D log-likelihood grid `[c][p][a][ams]`
//! and the 2-D side output `a_base[c][p]`.
//!
//! Every `(p, c)` work unit owns one contiguous `[a][ams]` slab. Slabs are
//! handed out as disjoint `&mut` borrows by [`split_slabs`], so concurrent
//! writers never need a lock on the grid itself.

use super::range::GridShape;

/// Index tuple into the output grid
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GridCoord {
    pub c: usize,
    pub p: usize,
    pub a: usize,
    pub ams: usize,
}

impl GridCoord {
    pub fn new(c: usize, p: usize, a: usize, ams: usize) -> Self {
        Self { c, p, a, ams }
    }
}

/// 4-D log-likelihood grid
#[derive(Debug, Clone, PartialEq)]
pub struct OutputGrid {
    shape: GridShape,
    data: Vec<f64>,
}

impl OutputGrid {
    /// Allocate a grid with every cell set to `fill`
    pub fn new(shape: GridShape, fill: f64) -> Self {
        Self {
            shape,
            data: vec![fill; shape.n_cells()],
        }
    }

    /// Allocate a grid filled with the `NaN` "never written" sentinel
    pub fn unwritten(shape: GridShape) -> Self {
        Self::new(shape, f64::NAN)
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    #[inline]
    pub fn index_of(&self, coord: GridCoord) -> usize {
        let s = &self.shape;
        debug_assert!(coord.c < s.n_c && coord.p < s.n_p && coord.a < s.n_a && coord.ams < s.n_ams);
        ((coord.c * s.n_p + coord.p) * s.n_a + coord.a) * s.n_ams + coord.ams
    }

    /// Inverse of [`index_of`](Self::index_of)
    pub fn coord_of(&self, idx: usize) -> GridCoord {
        let s = &self.shape;
        let ams = idx % s.n_ams;
        let rest = idx / s.n_ams;
        let a = rest % s.n_a;
        let rest = rest / s.n_a;
        let p = rest % s.n_p;
        let c = rest / s.n_p;
        GridCoord { c, p, a, ams }
    }

    #[inline]
    pub fn get(&self, coord: GridCoord) -> f64 {
        self.data[self.index_of(coord)]
    }

    pub fn set(&mut self, coord: GridCoord, value: f64) {
        let idx = self.index_of(coord);
        self.data[idx] = value;
    }

    /// The `[a][ams]` slab belonging to unit `(p_idx, c_idx)`
    pub fn slab(&self, c_idx: usize, p_idx: usize) -> &[f64] {
        let len = self.shape.slab_len();
        let start = (c_idx * self.shape.n_p + p_idx) * len;
        &self.data[start..start + len]
    }

    /// Row-major view of all cells
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Number of cells whose bit pattern equals `sentinel` (`NaN` matches any `NaN`)
    pub fn count_matching(&self, sentinel: f64) -> usize {
        if sentinel.is_nan() {
            self.data.iter().filter(|v| v.is_nan()).count()
        } else {
            let bits = sentinel.to_bits();
            self.data.iter().filter(|v| v.to_bits() == bits).count()
        }
    }
}

/// 2-D grid of branch-ratio-preserving productivity bases, `[c][p]`
#[derive(Debug, Clone, PartialEq)]
pub struct BaseValueGrid {
    n_c: usize,
    n_p: usize,
    data: Vec<f64>,
}

impl BaseValueGrid {
    pub fn new(n_c: usize, n_p: usize, fill: f64) -> Self {
        Self {
            n_c,
            n_p,
            data: vec![fill; n_c * n_p],
        }
    }

    pub fn unwritten(n_c: usize, n_p: usize) -> Self {
        Self::new(n_c, n_p, f64::NAN)
    }

    pub fn n_c(&self) -> usize {
        self.n_c
    }

    pub fn n_p(&self) -> usize {
        self.n_p
    }

    #[inline]
    pub fn get(&self, c_idx: usize, p_idx: usize) -> f64 {
        self.data[c_idx * self.n_p + p_idx]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

/// Exclusive write access to one work unit's region of both grids
#[derive(Debug)]
pub(crate) struct SlabMut<'g> {
    pub values: &'g mut [f64],
    pub a_base: &'g mut f64,
}

/// Split both grids into per-unit slabs, indexed `c_idx * n_p + p_idx`.
///
/// Callers must have checked that the two grids agree on `(n_c, n_p)`.
pub(crate) fn split_slabs<'g>(
    grid: &'g mut OutputGrid,
    base: &'g mut BaseValueGrid,
) -> Vec<SlabMut<'g>> {
    debug_assert_eq!(grid.shape.n_units(), base.data.len());
    let slab_len = grid.shape.slab_len().max(1);
    grid.data
        .chunks_mut(slab_len)
        .zip(base.data.iter_mut())
        .map(|(values, a_base)| SlabMut { values, a_base })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_roundtrip() {
        let grid = OutputGrid::unwritten(GridShape::new(3, 4, 5, 6));
        for idx in [0, 1, 17, 119, 359] {
            assert_eq!(grid.index_of(grid.coord_of(idx)), idx);
        }
        assert_eq!(grid.coord_of(359), GridCoord::new(2, 3, 4, 5));
    }

    #[test]
    fn test_slab_is_contiguous_block() {
        let shape = GridShape::new(2, 3, 2, 2);
        let mut grid = OutputGrid::new(shape, 0.0);
        grid.set(GridCoord::new(1, 2, 0, 0), 1.0);
        grid.set(GridCoord::new(1, 2, 1, 1), 4.0);
        assert_eq!(grid.slab(1, 2), &[1.0, 0.0, 0.0, 4.0]);
    }

    #[test]
    fn test_split_slabs_disjoint() {
        let shape = GridShape::new(2, 3, 2, 2);
        let mut grid = OutputGrid::unwritten(shape);
        let mut base = BaseValueGrid::unwritten(2, 3);
        {
            let slabs = split_slabs(&mut grid, &mut base);
            assert_eq!(slabs.len(), 6);
            for (i, slab) in slabs.into_iter().enumerate() {
                slab.values.fill(i as f64);
                *slab.a_base = -(i as f64);
            }
        }
        assert_eq!(grid.slab(1, 0), &[3.0; 4]);
        assert_eq!(base.get(1, 0), -3.0);
        assert_eq!(grid.count_matching(f64::NAN), 0);
    }

    #[test]
    fn test_count_matching() {
        let mut grid = OutputGrid::new(GridShape::new(1, 1, 2, 2), -1.0);
        grid.set(GridCoord::new(0, 0, 0, 1), 2.0);
        assert_eq!(grid.count_matching(-1.0), 3);
        assert_eq!(grid.count_matching(f64::NAN), 0);
    }
}
