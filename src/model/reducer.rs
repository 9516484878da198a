//! # Grid Reduction
//!
//! Post-hoc analysis of a finished (or partial) output grid.
//!
//! Cells holding `NaN` are treated as never written: they are skipped by the
//! argmax and contribute zero mass to marginals. This makes the reducers safe
//! to call on the partial grid left behind by a timed-out or aborted run.
//!
//! ## Tie-breaking
//! [`find_max`] scans row-major over `[c][p][a][ams]` and only replaces the
//! running best on a strictly greater value, so the first maximal coordinate
//! wins. A grid whose cells are all equal (for example all zero) therefore
//! reports `(0, 0, 0, 0)`.

use crate::data::grid::{BaseValueGrid, GridCoord, OutputGrid};
use crate::data::range::SearchRanges;
use crate::error::{GridError, Result};
use crate::model::parameters::SeedParams;

/// Grid axis selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    C,
    P,
    A,
    Ams,
}

impl Axis {
    fn of(self, coord: GridCoord) -> usize {
        match self {
            Axis::C => coord.c,
            Axis::P => coord.p,
            Axis::A => coord.a,
            Axis::Ams => coord.ams,
        }
    }

    fn len(self, grid: &OutputGrid) -> usize {
        let s = grid.shape();
        match self {
            Axis::C => s.n_c,
            Axis::P => s.n_p,
            Axis::A => s.n_a,
            Axis::Ams => s.n_ams,
        }
    }
}

/// How grid values are interpreted by [`marginal`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MarginalPolicy {
    /// Values are log-likelihoods; exponentiate relative to the grid max
    #[default]
    LogLikelihood,
    /// Values are already non-negative probability masses
    Probability,
}

/// Maximum value and its first coordinate in row-major order
pub fn find_max(grid: &OutputGrid) -> Option<(f64, GridCoord)> {
    let mut best: Option<(f64, usize)> = None;
    for (idx, &v) in grid.as_slice().iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((b, _)) if v <= b => {}
            _ => best = Some((v, idx)),
        }
    }
    best.map(|(v, idx)| (v, grid.coord_of(idx)))
}

/// Normalized marginal distribution along `axis`
pub fn marginal(grid: &OutputGrid, axis: Axis, policy: MarginalPolicy) -> Result<Vec<f64>> {
    let mut out = vec![0.0; axis.len(grid)];

    match policy {
        MarginalPolicy::LogLikelihood => {
            let max = match find_max(grid) {
                Some((m, _)) if m.is_finite() => m,
                _ => {
                    return Err(GridError::invalid_data(
                        "grid has no finite log-likelihood values",
                    ))
                }
            };
            for (idx, &v) in grid.as_slice().iter().enumerate() {
                if v.is_nan() {
                    continue;
                }
                out[axis.of(grid.coord_of(idx))] += (v - max).exp();
            }
        }
        MarginalPolicy::Probability => {
            for (idx, &v) in grid.as_slice().iter().enumerate() {
                if v.is_nan() {
                    continue;
                }
                if v < 0.0 || v.is_infinite() {
                    return Err(GridError::invalid_data(format!(
                        "probability cell {:?} has invalid value {}",
                        grid.coord_of(idx),
                        v
                    )));
                }
                out[axis.of(grid.coord_of(idx))] += v;
            }
        }
    }

    let total: f64 = out.iter().sum();
    if total.is_nan() || total <= 0.0 {
        return Err(GridError::invalid_data("grid has zero total mass"));
    }
    for v in &mut out {
        *v /= total;
    }
    Ok(out)
}

/// Parameter values at the grid maximum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BestFit {
    pub coord: GridCoord,
    pub log_likelihood: f64,
    pub p: f64,
    pub c: f64,
    pub a: f64,
    pub ams: f64,
}

/// Map the argmax back to `(p, c, a, ams)`
pub fn best_fit(
    grid: &OutputGrid,
    a_base: &BaseValueGrid,
    ranges: &SearchRanges,
    seed: &SeedParams,
) -> Option<BestFit> {
    let (log_likelihood, coord) = find_max(grid)?;
    let a = a_base.get(coord.c, coord.p) + ranges.a.get(coord.a);
    Some(BestFit {
        coord,
        log_likelihood,
        p: seed.p_at(ranges.p.get(coord.p)),
        c: seed.c_at(ranges.c.get(coord.c)),
        a,
        ams: a + ranges.ams.get(coord.ams),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::range::GridShape;
    use approx::assert_relative_eq;

    #[test]
    fn test_find_max_skips_nan() {
        let mut grid = OutputGrid::unwritten(GridShape::new(1, 1, 2, 2));
        assert!(find_max(&grid).is_none());
        grid.set(GridCoord::new(0, 0, 1, 0), -5.0);
        assert_eq!(find_max(&grid), Some((-5.0, GridCoord::new(0, 0, 1, 0))));
    }

    #[test]
    fn test_all_equal_grid_reports_origin() {
        let grid = OutputGrid::new(GridShape::new(2, 2, 2, 2), 0.0);
        assert_eq!(find_max(&grid), Some((0.0, GridCoord::default())));
    }

    #[test]
    fn test_marginal_loglik_is_normalized() {
        let mut grid = OutputGrid::new(GridShape::new(1, 2, 1, 1), 0.0);
        grid.set(GridCoord::new(0, 1, 0, 0), 2f64.ln());
        let m = marginal(&grid, Axis::P, MarginalPolicy::LogLikelihood).unwrap();
        assert_relative_eq!(m[0], 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(m[1], 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_marginal_large_loglik_does_not_overflow() {
        let mut grid = OutputGrid::new(GridShape::new(1, 1, 2, 1), 5000.0);
        grid.set(GridCoord::new(0, 0, 1, 0), 5000.0 + 3f64.ln());
        let m = marginal(&grid, Axis::A, MarginalPolicy::LogLikelihood).unwrap();
        assert_relative_eq!(m[1], 0.75, epsilon = 1e-9);
    }

    #[test]
    fn test_marginal_probability_policy() {
        let mut grid = OutputGrid::new(GridShape::new(2, 1, 1, 1), 0.25);
        grid.set(GridCoord::new(1, 0, 0, 0), 0.75);
        let m = marginal(&grid, Axis::C, MarginalPolicy::Probability).unwrap();
        assert_relative_eq!(m[0], 0.25);
        assert_relative_eq!(m[1], 0.75);

        grid.set(GridCoord::new(1, 0, 0, 0), -0.5);
        assert!(marginal(&grid, Axis::C, MarginalPolicy::Probability).is_err());
    }

    #[test]
    fn test_marginal_rejects_empty_grid() {
        let grid = OutputGrid::unwritten(GridShape::new(1, 1, 1, 1));
        assert!(marginal(&grid, Axis::C, MarginalPolicy::LogLikelihood).is_err());
        let neg_inf = OutputGrid::new(GridShape::new(1, 1, 1, 1), f64::NEG_INFINITY);
        assert!(marginal(&neg_inf, Axis::C, MarginalPolicy::LogLikelihood).is_err());
    }
}
