//! Interpolation kernel
//!
//! Natural cubic interpolating splines with closed-form integration, the
//! degree-2 interpolant through three points, and the tensor-product
//! surface the daily population model is built on.

mod cubic;
mod surface;

pub use cubic::{CubicSpline, Parabola};
pub use surface::SplineSurface;
