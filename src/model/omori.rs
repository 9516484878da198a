//! # Omori Kernel Integrals
//!
//! Closed forms for the modified Omori decay `(t + c)^-p`. All functions are
//! pure and safe to call from any thread.

/// Below this distance from `p = 1` the logarithmic form is used
const P_ONE_TOLERANCE: f64 = 1.0e-10;

/// Integral of `(t + c)^-p` over `[t0, t1]`
pub fn omori_integral(p: f64, c: f64, t0: f64, t1: f64) -> f64 {
    if t1 <= t0 {
        return 0.0;
    }
    let q = 1.0 - p;
    if q.abs() < P_ONE_TOLERANCE {
        ((t1 + c) / (t0 + c)).ln()
    } else {
        ((t1 + c).powf(q) - (t0 + c).powf(q)) / q
    }
}

/// Mean value of `(t + c)^-p` over `[t0, t1]`.
///
/// The ratio `S(p0, c0) / S(p, c)` is the factor by which productivity must
/// change to keep the expected offspring count (branch ratio) fixed when the
/// Omori parameters move from `(p0, c0)` to `(p, c)`.
pub fn average_omori_scale(p: f64, c: f64, t0: f64, t1: f64) -> f64 {
    if t1 <= t0 {
        return (t0 + c).powf(-p);
    }
    omori_integral(p, c, t0, t1) / (t1 - t0)
}

/// `(t + c)^-p` for a single lag
#[inline]
pub fn omori_kernel(p: f64, c: f64, t: f64) -> f64 {
    (t + c).powf(-p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_integral_p_equals_one() {
        // (t + c)^-1 over [0, 9] with c = 1 -> ln(10)
        assert_relative_eq!(omori_integral(1.0, 1.0, 0.0, 9.0), 10f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_integral_general_p() {
        // (t + 1)^-2 over [0, 1] -> 1 - 1/2
        assert_relative_eq!(omori_integral(2.0, 1.0, 0.0, 1.0), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_integral_continuous_near_one() {
        let at_one = omori_integral(1.0, 0.01, 0.0, 100.0);
        let near_one = omori_integral(1.0 + 1e-7, 0.01, 0.0, 100.0);
        assert_relative_eq!(at_one, near_one, max_relative = 1e-5);
    }

    #[test]
    fn test_average_scale() {
        assert_relative_eq!(average_omori_scale(2.0, 1.0, 0.0, 1.0), 0.5, epsilon = 1e-12);
        // Degenerate interval falls back to the point value
        assert_relative_eq!(average_omori_scale(1.0, 1.0, 3.0, 3.0), 0.25, epsilon = 1e-12);
    }
}
