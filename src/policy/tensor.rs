//! Loss-tensor abstraction shared by the objectives.
//!
//! The update objectives are written once against [`LossTensor`]. A
//! differentiable backend keeps its autograd graph through these operations;
//! [`HostTensor`] evaluates them eagerly on plain vectors.

/// Elementwise tensor operations needed by the policy-gradient objectives.
///
/// Binary operations broadcast a single-element operand against the other.
pub trait LossTensor: Sized {
    /// Creates a constant (non-differentiable) 1-D tensor on the same device as `like`.
    fn constant(values: &[f64], like: &Self) -> Self;

    /// Copies the tensor's elements out to the host.
    fn values(&self) -> Vec<f64>;

    /// Value of a single-element tensor.
    fn scalar(&self) -> f64;

    fn exp(&self) -> Self;
    fn add(&self, rhs: &Self) -> Self;
    fn sub(&self, rhs: &Self) -> Self;
    fn mul(&self, rhs: &Self) -> Self;
    /// Elementwise minimum.
    fn minimum(&self, rhs: &Self) -> Self;
    fn clamp(&self, min: f64, max: f64) -> Self;
    fn square(&self) -> Self;
    /// Mean over all elements, as a single-element tensor.
    fn mean(&self) -> Self;
    /// Multiplies every element by `factor`.
    fn scale(&self, factor: f64) -> Self;
}

/// Eager host-side tensor backed by a `Vec<f64>`.
///
/// Carries no gradients; used by gradient-free policy ports and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct HostTensor(pub Vec<f64>);

impl HostTensor {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self(self.0.iter().map(|&v| f(v)).collect())
    }

    fn zip_with(&self, rhs: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        match (self.0.len(), rhs.0.len()) {
            (_, 1) => self.map(|a| f(a, rhs.0[0])),
            (1, _) => rhs.map(|b| f(self.0[0], b)),
            (l, r) => {
                assert_eq!(l, r, "HostTensor length mismatch");
                Self(self.0.iter().zip(&rhs.0).map(|(&a, &b)| f(a, b)).collect())
            }
        }
    }
}

impl LossTensor for HostTensor {
    fn constant(values: &[f64], _like: &Self) -> Self {
        Self(values.to_vec())
    }

    fn values(&self) -> Vec<f64> {
        self.0.clone()
    }

    fn scalar(&self) -> f64 {
        assert_eq!(self.0.len(), 1, "scalar() on a tensor of {} elements", self.0.len());
        self.0[0]
    }

    fn exp(&self) -> Self {
        self.map(f64::exp)
    }

    fn add(&self, rhs: &Self) -> Self {
        self.zip_with(rhs, |a, b| a + b)
    }

    fn sub(&self, rhs: &Self) -> Self {
        self.zip_with(rhs, |a, b| a - b)
    }

    fn mul(&self, rhs: &Self) -> Self {
        self.zip_with(rhs, |a, b| a * b)
    }

    fn minimum(&self, rhs: &Self) -> Self {
        self.zip_with(rhs, f64::min)
    }

    fn clamp(&self, min: f64, max: f64) -> Self {
        // NaN passes through unchanged.
        self.map(|v| if v.is_nan() { v } else { v.max(min).min(max) })
    }

    fn square(&self) -> Self {
        self.map(|v| v * v)
    }

    fn mean(&self) -> Self {
        let n = self.0.len().max(1) as f64;
        Self(vec![self.0.iter().sum::<f64>() / n])
    }

    fn scale(&self, factor: f64) -> Self {
        self.map(|v| v * factor)
    }
}
