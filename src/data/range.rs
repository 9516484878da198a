//! # Parameter Ranges
//!
//! Discrete search axes. Each axis is a fixed, ordered list of offsets or
//! multipliers applied to a seed value:
//!
//! ```text
//! p   = p0 + p_range[p_idx]            (additive offset)
//! c   = c0 * 10^c_range[c_idx]         (log10 multiplier)
//! a   = a_base[c][p] + a_range[a_idx]  (offset from the rescaled base)
//! ams = a + ams_range[ams_idx]         (offset from the trial a)
//! ```

use std::str::FromStr;

use crate::error::{GridError, Result};

/// Ordered, non-empty sequence of finite values for one search dimension
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRange {
    values: Vec<f64>,
}

impl ParameterRange {
    /// Create a range from explicit values; `name` only labels errors
    pub fn new(name: &str, values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(GridError::config(format!("range '{}' is empty", name)));
        }
        if let Some((i, v)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(GridError::config(format!(
                "range '{}' has non-finite value {} at index {}",
                name, v, i
            )));
        }
        Ok(Self { values })
    }

    /// `n` evenly spaced values from `lo` to `hi` inclusive
    pub fn linspace(name: &str, lo: f64, hi: f64, n: usize) -> Result<Self> {
        let values = match n {
            0 => Vec::new(),
            1 => vec![lo],
            _ => {
                let step = (hi - lo) / (n - 1) as f64;
                // Last point pinned to `hi` so rounding never drifts past it
                (0..n)
                    .map(|i| if i == n - 1 { hi } else { lo + step * i as f64 })
                    .collect()
            }
        };
        Self::new(name, values)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false; ranges are non-empty by construction
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    pub fn get(&self, idx: usize) -> f64 {
        self.values[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}

/// Textual range form accepted on the command line: `lo:hi:n` or a single value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeSpec {
    pub lo: f64,
    pub hi: f64,
    pub n: usize,
}

impl RangeSpec {
    pub fn into_range(self, name: &str) -> Result<ParameterRange> {
        ParameterRange::linspace(name, self.lo, self.hi, self.n)
    }
}

impl FromStr for RangeSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let parse_f = |t: &str| {
            t.parse::<f64>()
                .map_err(|e| format!("invalid number '{}': {}", t, e))
        };
        match parts.as_slice() {
            [v] => {
                let v = parse_f(v)?;
                Ok(Self { lo: v, hi: v, n: 1 })
            }
            [lo, hi, n] => {
                let n = n
                    .parse::<usize>()
                    .map_err(|e| format!("invalid count '{}': {}", n, e))?;
                if n == 0 {
                    return Err("range count must be at least 1".to_string());
                }
                Ok(Self {
                    lo: parse_f(lo)?,
                    hi: parse_f(hi)?,
                    n,
                })
            }
            _ => Err(format!("expected 'lo:hi:n' or a single value, got '{}'", s)),
        }
    }
}

/// Dimensions of the 4-D output grid, `[c][p][a][ams]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub n_c: usize,
    pub n_p: usize,
    pub n_a: usize,
    pub n_ams: usize,
}

impl GridShape {
    pub fn new(n_c: usize, n_p: usize, n_a: usize, n_ams: usize) -> Self {
        Self {
            n_c,
            n_p,
            n_a,
            n_ams,
        }
    }

    /// Number of `(p, c)` work units
    pub fn n_units(&self) -> usize {
        self.n_c * self.n_p
    }

    /// Cells in one `[a][ams]` slab
    pub fn slab_len(&self) -> usize {
        self.n_a * self.n_ams
    }

    pub fn n_cells(&self) -> usize {
        self.n_units() * self.slab_len()
    }
}

/// The four search axes
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRanges {
    pub p: ParameterRange,
    pub c: ParameterRange,
    pub a: ParameterRange,
    pub ams: ParameterRange,
}

impl SearchRanges {
    pub fn new(
        p: ParameterRange,
        c: ParameterRange,
        a: ParameterRange,
        ams: ParameterRange,
    ) -> Self {
        Self { p, c, a, ams }
    }

    pub fn shape(&self) -> GridShape {
        GridShape::new(self.c.len(), self.p.len(), self.a.len(), self.ams.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linspace_endpoints() {
        let r = ParameterRange::linspace("p", -0.3, 0.3, 31).unwrap();
        assert_eq!(r.len(), 31);
        assert_eq!(r.get(0), -0.3);
        assert_eq!(r.get(30), 0.3);
        assert!((r.get(15)).abs() < 1e-12);
    }

    #[test]
    fn test_empty_and_non_finite_rejected() {
        assert!(ParameterRange::new("a", vec![]).unwrap_err().is_config());
        assert!(ParameterRange::new("a", vec![0.0, f64::NAN])
            .unwrap_err()
            .is_config());
        assert!(ParameterRange::linspace("a", 0.0, 1.0, 0).is_err());
    }

    #[test]
    fn test_range_spec_parse() {
        let spec: RangeSpec = "-1:1:51".parse().unwrap();
        assert_eq!(spec, RangeSpec { lo: -1.0, hi: 1.0, n: 51 });

        let single: RangeSpec = "0.5".parse().unwrap();
        assert_eq!(single.n, 1);

        assert!("1:2".parse::<RangeSpec>().is_err());
        assert!("0:1:0".parse::<RangeSpec>().is_err());
        assert!("x:1:3".parse::<RangeSpec>().is_err());
    }

    #[test]
    fn test_shape_counts() {
        let shape = GridShape::new(17, 31, 51, 51);
        assert_eq!(shape.n_units(), 527);
        assert_eq!(shape.slab_len(), 2601);
        assert_eq!(shape.n_cells(), 1_370_727);
    }
}
