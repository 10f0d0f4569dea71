//! Amplitude-vector transforms.
//!
//! A state is a vector of complex amplitudes whose squared magnitudes carry
//! weight mass. Transforms are sequences of 2x2 unitary gates acting on pairs
//! of coordinates plus single-coordinate phase shifts, so every transform has an
//! exact inverse and preserves total mass.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use anyhow::{ensure, Result};
use num_complex::Complex64;

/// Largest state dimension a transform may address.
pub const MAX_DIMENSION: usize = 64;

/// A 2x2 unitary acting on a pair of coordinates `(a, b)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gate {
    m: [[Complex64; 2]; 2],
}

impl Gate {
    fn new(m00: Complex64, m01: Complex64, m10: Complex64, m11: Complex64) -> Self {
        Self {
            m: [[m00, m01], [m10, m11]],
        }
    }

    /// X-axis rotation: moves `sin^2(theta)` of each coordinate's mass to its partner.
    pub fn rotation(theta: f64) -> Self {
        let c = Complex64::new(theta.cos(), 0.0);
        let s = Complex64::new(0.0, -theta.sin());
        Self::new(c, s, s, c)
    }

    /// Real Givens rotation coupling two coordinates.
    pub fn coupling(theta: f64) -> Self {
        let (s, c) = theta.sin_cos();
        Self::new(
            Complex64::new(c, 0.0),
            Complex64::new(-s, 0.0),
            Complex64::new(s, 0.0),
            Complex64::new(c, 0.0),
        )
    }

    /// Hadamard-like even mix of two coordinates.
    pub fn hadamard() -> Self {
        let h = Complex64::new(FRAC_1_SQRT_2, 0.0);
        Self::new(h, h, h, -h)
    }

    /// Fourier butterfly with twiddle `e^(i*theta)` on the second coordinate.
    pub fn butterfly(theta: f64) -> Self {
        let h = Complex64::new(FRAC_1_SQRT_2, 0.0);
        let w = Complex64::from_polar(FRAC_1_SQRT_2, theta);
        Self::new(h, w, h, -w)
    }

    /// Conjugate transpose, which is the inverse for a unitary gate.
    pub fn adjoint(&self) -> Self {
        let m = &self.m;
        Self::new(m[0][0].conj(), m[1][0].conj(), m[0][1].conj(), m[1][1].conj())
    }

    fn apply(&self, x: Complex64, y: Complex64) -> (Complex64, Complex64) {
        let m = &self.m;
        (m[0][0] * x + m[0][1] * y, m[1][0] * x + m[1][1] * y)
    }
}

/// One step of a transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operation {
    /// Unitary on coordinates `a` and `b`
    Pair { a: usize, b: usize, gate: Gate },
    /// Multiply coordinate `index` by `e^(i*angle)`
    Phase { index: usize, angle: f64 },
}

impl Operation {
    fn inverse(&self) -> Self {
        match *self {
            Operation::Pair { a, b, gate } => Operation::Pair {
                a,
                b,
                gate: gate.adjoint(),
            },
            Operation::Phase { index, angle } => Operation::Phase {
                index,
                angle: -angle,
            },
        }
    }
}

/// An ordered sequence of operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transform {
    ops: Vec<Operation>,
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn pair(&mut self, a: usize, b: usize, gate: Gate) -> &mut Self {
        self.ops.push(Operation::Pair { a, b, gate });
        self
    }

    pub fn phase(&mut self, index: usize, angle: f64) -> &mut Self {
        self.ops.push(Operation::Phase { index, angle });
        self
    }

    /// Append all operations of `other`.
    pub fn extend(&mut self, other: &Transform) -> &mut Self {
        self.ops.extend_from_slice(&other.ops);
        self
    }

    /// Exact inverse: operations in reverse order, each inverted.
    pub fn inverse(&self) -> Transform {
        Transform {
            ops: self.ops.iter().rev().map(Operation::inverse).collect(),
        }
    }

    /// Forward diffusion over `dim` coordinates.
    ///
    /// A Hadamard mix of coordinates 0 and 1, then a Fourier butterfly with
    /// phase `pi / 2^(j - i)` on every pair `i < j`.
    pub fn diffusion(dim: usize) -> Transform {
        let mut t = Transform::new();
        if dim > 1 {
            t.pair(0, 1, Gate::hadamard());
        }
        for i in 0..dim {
            for j in (i + 1)..dim {
                let theta = PI / 2f64.powi((j - i) as i32);
                t.pair(i, j, Gate::butterfly(theta));
            }
        }
        t
    }

    /// Apply the transform to a state in place.
    pub fn apply(&self, state: &mut AmplitudeState) -> Result<()> {
        let dim = state.dimension();
        for op in &self.ops {
            match *op {
                Operation::Pair { a, b, gate } => {
                    ensure!(a < dim && b < dim, "Pair ({}, {}) outside dimension {}", a, b, dim);
                    ensure!(a != b, "Pair operation on a single coordinate {}", a);
                    let (x, y) = gate.apply(state.amplitudes[a], state.amplitudes[b]);
                    state.amplitudes[a] = x;
                    state.amplitudes[b] = y;
                }
                Operation::Phase { index, angle } => {
                    ensure!(index < dim, "Phase on {} outside dimension {}", index, dim);
                    state.amplitudes[index] *= Complex64::from_polar(1.0, angle);
                }
            }
        }
        Ok(())
    }
}

/// Complex amplitude vector with a power-of-two dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct AmplitudeState {
    amplitudes: Vec<Complex64>,
}

impl AmplitudeState {
    /// Smallest power of two that holds `n` coordinates (1 for `n <= 1`).
    pub fn dimension_for(n: usize) -> usize {
        n.max(1).next_power_of_two()
    }

    /// Encode weights as amplitudes `sqrt(w)`; unused slots are zero.
    pub fn encode(weights: &[f64]) -> Result<Self> {
        let dim = Self::dimension_for(weights.len());
        ensure!(dim <= MAX_DIMENSION, "State dimension {} exceeds {}", dim, MAX_DIMENSION);

        let mut amplitudes = vec![Complex64::new(0.0, 0.0); dim];
        for (slot, &w) in amplitudes.iter_mut().zip(weights) {
            ensure!(w.is_finite() && w >= 0.0, "Cannot encode weight {}", w);
            *slot = Complex64::new(w.sqrt(), 0.0);
        }
        Ok(Self { amplitudes })
    }

    pub fn dimension(&self) -> usize {
        self.amplitudes.len()
    }

    pub fn amplitudes(&self) -> &[Complex64] {
        &self.amplitudes
    }

    /// Squared magnitude of one coordinate (0 when out of range).
    pub fn probability(&self, index: usize) -> f64 {
        self.amplitudes.get(index).map(|a| a.norm_sqr()).unwrap_or(0.0)
    }

    /// Total squared magnitude across all coordinates.
    pub fn total_mass(&self) -> f64 {
        self.amplitudes.iter().map(|a| a.norm_sqr()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: &AmplitudeState, b: &AmplitudeState) {
        assert_eq!(a.dimension(), b.dimension());
        for (x, y) in a.amplitudes().iter().zip(b.amplitudes()) {
            assert!((x - y).norm() < 1e-12, "{} != {}", x, y);
        }
    }

    #[test]
    fn test_dimension_for() {
        assert_eq!(AmplitudeState::dimension_for(0), 1);
        assert_eq!(AmplitudeState::dimension_for(1), 1);
        assert_eq!(AmplitudeState::dimension_for(2), 2);
        assert_eq!(AmplitudeState::dimension_for(3), 4);
        assert_eq!(AmplitudeState::dimension_for(5), 8);
        assert_eq!(AmplitudeState::dimension_for(8), 8);
    }

    #[test]
    fn test_encode() {
        let state = AmplitudeState::encode(&[0.25, 0.36, 0.04]).unwrap();
        assert_eq!(state.dimension(), 4);
        assert!((state.probability(0) - 0.25).abs() < 1e-12);
        assert!((state.probability(1) - 0.36).abs() < 1e-12);
        assert_eq!(state.probability(3), 0.0);
        assert!((state.total_mass() - 0.65).abs() < 1e-12);

        assert!(AmplitudeState::encode(&[0.5, -0.1]).is_err());
        assert!(AmplitudeState::encode(&[f64::NAN]).is_err());
    }

    #[test]
    fn test_rotation_moves_sin_squared_mass() {
        let mut state = AmplitudeState::encode(&[1.0, 0.0]).unwrap();
        let theta = (0.3f64).sqrt().asin();
        let mut t = Transform::new();
        t.pair(0, 1, Gate::rotation(theta));
        t.apply(&mut state).unwrap();

        assert!((state.probability(0) - 0.7).abs() < 1e-12);
        assert!((state.probability(1) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_diffusion_inverse_restores_state() {
        let weights = [0.1, 0.2, 0.3, 0.15, 0.05, 0.1, 0.05, 0.05];
        let original = AmplitudeState::encode(&weights).unwrap();
        let mut state = original.clone();

        let forward = Transform::diffusion(state.dimension());
        forward.apply(&mut state).unwrap();
        assert!((state.total_mass() - original.total_mass()).abs() < 1e-12);
        // Diffusion spreads mass
        assert!((state.probability(0) - original.probability(0)).abs() > 1e-6);

        forward.inverse().apply(&mut state).unwrap();
        assert_close(&state, &original);
    }

    #[test]
    fn test_mixed_transform_inverse() {
        let original = AmplitudeState::encode(&[0.4, 0.3, 0.3]).unwrap();
        let mut t = Transform::new();
        t.pair(0, 1, Gate::rotation(0.4))
            .pair(1, 2, Gate::coupling(0.2))
            .phase(2, 1.1)
            .extend(&Transform::diffusion(4));

        let mut state = original.clone();
        t.apply(&mut state).unwrap();
        t.inverse().apply(&mut state).unwrap();
        assert_close(&state, &original);
    }

    #[test]
    fn test_apply_rejects_bad_indices() {
        let mut state = AmplitudeState::encode(&[0.5, 0.5]).unwrap();
        let mut t = Transform::new();
        t.pair(0, 2, Gate::hadamard());
        assert!(t.apply(&mut state).is_err());

        let mut t = Transform::new();
        t.pair(1, 1, Gate::hadamard());
        assert!(t.apply(&mut state).is_err());

        let mut t = Transform::new();
        t.phase(5, 0.1);
        assert!(t.apply(&mut state).is_err());
    }

    #[test]
    fn test_diffusion_size() {
        assert!(Transform::diffusion(1).is_empty());
        // Hadamard plus one butterfly
        assert_eq!(Transform::diffusion(2).len(), 2);
        // Hadamard plus C(4, 2) butterflies
        assert_eq!(Transform::diffusion(4).len(), 7);
    }
}
