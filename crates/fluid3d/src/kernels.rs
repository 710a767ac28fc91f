//! SPH smoothing kernels over a support radius h.
//!
//! Normalisation constants are precomputed once per solver; every kernel
//! returns zero outside `[0, h)`.
//!
//! - `poly6`: density and field interpolation. `poly6(0)` is the
//!   self-contribution and must be included in density sums.
//! - `spiky_gradient`: pressure forces. Unlike the poly6 gradient it does not
//!   vanish as r → 0, so close pairs still repel.
//! - `viscosity_laplacian`: viscous diffusion.
//! - `cubic_spline` / `cubic_spline_gradient`: Monaghan M4 spline, used for the
//!   colour-field surface normal.

use std::f32::consts::PI;

use glam::Vec3;

use crate::constants::MIN_KERNEL_DISTANCE;
use crate::error::{FluidError, FluidResult};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphKernels {
    h: f32,
    h2: f32,
    /// 315 / (64π h⁹)
    poly6_const: f32,
    /// −945 / (32π h⁹)
    poly6_lapl_const: f32,
    /// −45 / (π h⁶)
    spiky_grad_const: f32,
    /// 45 / (π h⁶)
    visc_lapl_const: f32,
    /// 8 / (π h³)
    cubic_sigma: f32,
}

impl SphKernels {
    pub fn new(smoothing_radius: f32) -> FluidResult<Self> {
        let h = smoothing_radius;
        if !(h.is_finite() && h > 0.0) {
            return Err(FluidError::config(
                "smoothing_radius",
                format!("must be positive and finite, got {}", h),
            ));
        }
        let h3 = h * h * h;
        let h6 = h3 * h3;
        let h9 = h6 * h3;
        Ok(Self {
            h,
            h2: h * h,
            poly6_const: 315.0 / (64.0 * PI * h9),
            poly6_lapl_const: -945.0 / (32.0 * PI * h9),
            spiky_grad_const: -45.0 / (PI * h6),
            visc_lapl_const: 45.0 / (PI * h6),
            cubic_sigma: 8.0 / (PI * h3),
        })
    }

    #[inline]
    pub fn smoothing_radius(&self) -> f32 {
        self.h
    }

    /// W_poly6(r) = 315/(64πh⁹) (h² − r²)³
    #[inline]
    pub fn poly6(&self, r: f32) -> f32 {
        if r >= self.h {
            return 0.0;
        }
        let diff = self.h2 - r * r;
        self.poly6_const * diff * diff * diff
    }

    /// ∇²W_poly6(r) = −945/(32πh⁹) (h² − r²)(3h² − 7r²)
    #[inline]
    pub fn poly6_laplacian(&self, r: f32) -> f32 {
        if r >= self.h {
            return 0.0;
        }
        let r2 = r * r;
        self.poly6_lapl_const * (self.h2 - r2) * (3.0 * self.h2 - 7.0 * r2)
    }

    /// ∇W_spiky = −45/(πh⁶) (h − r)² r̂, where `r_vec = xᵢ − xⱼ`.
    #[inline]
    pub fn spiky_gradient(&self, r_vec: Vec3, dist: f32) -> Vec3 {
        if dist >= self.h || dist < MIN_KERNEL_DISTANCE {
            return Vec3::ZERO;
        }
        let diff = self.h - dist;
        r_vec * (self.spiky_grad_const * diff * diff / dist)
    }

    /// ∇²W_visc(r) = 45/(πh⁶) (h − r)
    #[inline]
    pub fn viscosity_laplacian(&self, dist: f32) -> f32 {
        if dist >= self.h {
            return 0.0;
        }
        self.visc_lapl_const * (self.h - dist)
    }

    #[inline]
    pub fn cubic_spline(&self, r: f32) -> f32 {
        let q = r / self.h;
        if q >= 1.0 {
            0.0
        } else if q >= 0.5 {
            let t = 1.0 - q;
            self.cubic_sigma * 2.0 * t * t * t
        } else {
            self.cubic_sigma * (6.0 * q * q * q - 6.0 * q * q + 1.0)
        }
    }

    /// Analytic gradient of `cubic_spline`.
    #[inline]
    pub fn cubic_spline_gradient(&self, r_vec: Vec3, dist: f32) -> Vec3 {
        if dist >= self.h || dist < MIN_KERNEL_DISTANCE {
            return Vec3::ZERO;
        }
        let q = dist / self.h;
        let dw_dq = if q >= 0.5 {
            let t = 1.0 - q;
            -6.0 * t * t
        } else {
            18.0 * q * q - 12.0 * q
        };
        r_vec * (self.cubic_sigma * dw_dq / (self.h * dist))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: f32 = 0.1;

    fn kernels() -> SphKernels {
        SphKernels::new(H).unwrap()
    }

    #[test]
    fn test_rejects_bad_radius() {
        assert!(SphKernels::new(0.0).is_err());
        assert!(SphKernels::new(-1.0).is_err());
        assert!(SphKernels::new(f32::NAN).is_err());
    }

    #[test]
    fn test_poly6_support() {
        let k = kernels();
        assert!(k.poly6(0.0) > 0.0);
        assert_eq!(k.poly6(H), 0.0);
        assert_eq!(k.poly6(2.0 * H), 0.0);
        assert!(k.poly6(0.2 * H) > k.poly6(0.8 * H));
    }

    #[test]
    fn test_poly6_integrates_to_one() {
        // Midpoint rule over the radial shell: ∫ 4πr² W(r) dr = 1
        let k = kernels();
        let n = 2000;
        let dr = H / n as f32;
        let integral: f32 = (0..n)
            .map(|i| {
                let r = (i as f32 + 0.5) * dr;
                4.0 * PI * r * r * k.poly6(r) * dr
            })
            .sum();
        assert!((integral - 1.0).abs() < 1e-3, "integral = {}", integral);
    }

    #[test]
    fn test_cubic_spline_integrates_to_one() {
        let k = kernels();
        let n = 2000;
        let dr = H / n as f32;
        let integral: f32 = (0..n)
            .map(|i| {
                let r = (i as f32 + 0.5) * dr;
                4.0 * PI * r * r * k.cubic_spline(r) * dr
            })
            .sum();
        assert!((integral - 1.0).abs() < 1e-3, "integral = {}", integral);
    }

    #[test]
    fn test_spiky_gradient_degenerate_and_outside() {
        let k = kernels();
        assert_eq!(k.spiky_gradient(Vec3::X * 1e-5, 1e-5), Vec3::ZERO);
        assert_eq!(k.spiky_gradient(Vec3::X * H, H), Vec3::ZERO);
        assert_eq!(k.spiky_gradient(Vec3::X * 2.0 * H, 2.0 * H), Vec3::ZERO);
    }

    #[test]
    fn test_spiky_gradient_points_toward_neighbour() {
        // r_vec = xᵢ − xⱼ; the gradient is anti-parallel, so −∇W pushes i away from j
        let k = kernels();
        let r = Vec3::new(0.5 * H, 0.0, 0.0);
        let g = k.spiky_gradient(r, r.length());
        assert!(g.x < 0.0);
        assert!(g.y.abs() < 1e-6 && g.z.abs() < 1e-6);
        let expected = -45.0 / (PI * H.powi(6)) * (0.5 * H) * (0.5 * H);
        assert!((g.x - expected).abs() / expected.abs() < 1e-4);
    }

    #[test]
    fn test_cubic_gradient_matches_finite_difference() {
        let k = kernels();
        let eps = 1e-3 * H;
        for q in [0.2_f32, 0.45, 0.55, 0.9] {
            let r = q * H;
            let numeric = (k.cubic_spline(r + eps) - k.cubic_spline(r - eps)) / (2.0 * eps);
            let analytic = k.cubic_spline_gradient(Vec3::X * r, r).x;
            assert!(
                (numeric - analytic).abs() <= 1e-2 * numeric.abs().max(1.0),
                "q = {}: numeric {} vs analytic {}",
                q,
                numeric,
                analytic
            );
        }
    }

    #[test]
    fn test_poly6_laplacian_matches_finite_difference() {
        // ∇²W = W'' + 2W'/r for a radial function; differenced in f64
        let k = kernels();
        let h = H as f64;
        let c = 315.0 / (64.0 * std::f64::consts::PI * h.powi(9));
        let w = |x: f64| c * (h * h - x * x).powi(3);
        let e = 1e-4 * h;
        for q in [0.3_f64, 0.6] {
            let r = q * h;
            let d1 = (w(r + e) - w(r - e)) / (2.0 * e);
            let d2 = (w(r + e) - 2.0 * w(r) + w(r - e)) / (e * e);
            let numeric = d2 + 2.0 * d1 / r;
            let analytic = k.poly6_laplacian(r as f32) as f64;
            assert!(
                (numeric - analytic).abs() <= 1e-3 * analytic.abs(),
                "q = {}: numeric {} vs analytic {}",
                q,
                numeric,
                analytic
            );
        }
    }

    #[test]
    fn test_viscosity_laplacian_positive_inside() {
        let k = kernels();
        assert!(k.viscosity_laplacian(0.0) > 0.0);
        assert!(k.viscosity_laplacian(0.5 * H) > 0.0);
        assert_eq!(k.viscosity_laplacian(H), 0.0);
    }
}
