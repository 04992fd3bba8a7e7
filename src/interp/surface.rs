//! Tensor-product spline surface over a rectangular knot grid
//!
//! One natural cubic spline is fit along the date axis per age knot; a
//! query then splines the per-row results across the age axis. Because
//! the natural-spline operator is linear in its data, this evaluates the
//! bicubic tensor-product interpolant exactly, and integrating the rows
//! first yields the exact rectangle integral of that interpolant.

use crate::error::{Error, Result};
use crate::interp::CubicSpline;

/// Bicubic tensor surface: z(age, date) over an (age x date) grid
#[derive(Debug, Clone)]
pub struct SplineSurface {
    age_knots: Vec<f64>,
    date_knots: Vec<f64>,
    /// One date-axis spline per age knot row
    rows: Vec<CubicSpline>,
}

impl SplineSurface {
    /// Build from grid values `z[age_row][date_col]`
    pub fn new(age_knots: Vec<f64>, date_knots: Vec<f64>, z: Vec<Vec<f64>>) -> Result<Self> {
        if z.len() != age_knots.len() {
            return Err(Error::Internal(format!(
                "surface has {} value rows for {} age knots",
                z.len(),
                age_knots.len()
            )));
        }
        let rows = z
            .into_iter()
            .map(|row| {
                if row.len() != date_knots.len() {
                    return Err(Error::Internal(format!(
                        "surface row has {} values for {} date knots",
                        row.len(),
                        date_knots.len()
                    )));
                }
                CubicSpline::new(date_knots.clone(), row)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { age_knots, date_knots, rows })
    }

    /// Knot span of the age axis
    pub fn age_span(&self) -> (f64, f64) {
        (self.age_knots[0], self.age_knots[self.age_knots.len() - 1])
    }

    /// Knot span of the date axis
    pub fn date_span(&self) -> (f64, f64) {
        (self.date_knots[0], self.date_knots[self.date_knots.len() - 1])
    }

    /// Point evaluation of the surface (clamped beyond the knot grid)
    pub fn eval(&self, age: f64, date: f64) -> f64 {
        let column: Vec<f64> = self.rows.iter().map(|row| row.eval(date)).collect();
        match CubicSpline::new(self.age_knots.clone(), column) {
            Ok(spline) => spline.eval(age),
            // age knots were validated at construction; unreachable
            Err(_) => 0.0,
        }
    }

    /// Exact integral of the surface over the rectangle
    /// `[age_from, age_to] x [date_from, date_to]`
    pub fn integrate(
        &self,
        age_from: f64,
        age_to: f64,
        date_from: f64,
        date_to: f64,
    ) -> Result<f64> {
        let partials: Vec<f64> = self
            .rows
            .iter()
            .map(|row| row.integrate(date_from, date_to))
            .collect();
        let across_age = CubicSpline::new(self.age_knots.clone(), partials)?;
        Ok(across_age.integrate(age_from, age_to))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// z = 2 + 3*age + 0.5*date sampled on an uneven grid; linear data
    /// keeps the natural splines exact in both axes
    fn planar_surface() -> SplineSurface {
        let age_knots = vec![0.0, 1.0, 2.5, 4.0];
        let date_knots = vec![0.0, 2.0, 3.0, 6.0, 10.0];
        let z = age_knots
            .iter()
            .map(|&a| date_knots.iter().map(|&d| 2.0 + 3.0 * a + 0.5 * d).collect())
            .collect();
        SplineSurface::new(age_knots, date_knots, z).unwrap()
    }

    #[test]
    fn test_eval_reproduces_plane() {
        let surface = planar_surface();
        for (a, d) in [(0.0, 0.0), (1.7, 4.2), (3.9, 9.5), (2.5, 3.0)] {
            let expected = 2.0 + 3.0 * a + 0.5 * d;
            assert!(
                (surface.eval(a, d) - expected).abs() < 1e-9,
                "eval({}, {})",
                a,
                d
            );
        }
    }

    #[test]
    fn test_eval_clamps_outside_grid() {
        let surface = planar_surface();
        assert!((surface.eval(-5.0, 0.0) - surface.eval(0.0, 0.0)).abs() < 1e-12);
        assert!((surface.eval(2.0, 50.0) - surface.eval(2.0, 10.0)).abs() < 1e-12);
    }

    #[test]
    fn test_integrate_plane_closed_form() {
        let surface = planar_surface();
        let (a0, a1, d0, d1) = (0.5, 3.5, 1.0, 9.0);
        // int int (2 + 3a + 0.5d) da dd
        let da = a1 - a0;
        let dd = d1 - d0;
        let expected = 2.0 * da * dd
            + 3.0 * (a1 * a1 - a0 * a0) / 2.0 * dd
            + 0.5 * (d1 * d1 - d0 * d0) / 2.0 * da;
        let got = surface.integrate(a0, a1, d0, d1).unwrap();
        approx::assert_relative_eq!(got, expected, max_relative = 1e-12);
    }

    #[test]
    fn test_integrate_constant_narrow_band() {
        let age_knots: Vec<f64> = (0..6).map(|i| i as f64).collect();
        let date_knots: Vec<f64> = (0..4).map(|i| i as f64 * 10.0).collect();
        let z = vec![vec![7.0; 4]; 6];
        let surface = SplineSurface::new(age_knots, date_knots, z).unwrap();

        // the 0.1-wide date band used by the snapshot queries
        let got = surface.integrate(1.0, 4.0, 15.0, 15.1).unwrap();
        assert!((got - 7.0 * 3.0 * 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_ragged_grid() {
        let z = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(SplineSurface::new(vec![0.0, 1.0], vec![0.0, 1.0], z).is_err());
    }
}
