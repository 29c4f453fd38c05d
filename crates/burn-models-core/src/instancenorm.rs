//! Instance normalization implementation
//!
//! Normalizes every channel of every sample independently over its spatial
//! extent. Used as the parameter-free normalizer in image-translation
//! generators, where batch statistics mix unrelated images.

use burn::prelude::*;

/// Instance normalization without affine parameters
///
/// # Formula
///
/// For each sample `n` and channel `c`:
/// ```text
/// y[n, c] = (x[n, c] - mean(x[n, c])) / sqrt(var(x[n, c]) + eps)
/// ```
///
/// Variance is the biased (population) estimate over `height * width`.
#[derive(Module, Clone, Debug)]
pub struct InstanceNorm {
    /// Epsilon for numerical stability
    pub eps: f64,
}

impl Default for InstanceNorm {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceNorm {
    pub fn new() -> Self {
        Self { eps: 1e-5 }
    }

    /// Applies instance normalization to a `[batch, channels, height, width]` tensor
    pub fn forward<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let [batch, channels, height, width] = x.dims();

        let x = x.reshape([batch, channels, height * width]);

        let mean = x.clone().mean_dim(2); // [batch, channels, 1]
        let diff = x - mean;
        let var = (diff.clone() * diff.clone()).mean_dim(2);

        let x = diff / (var + self.eps).sqrt();

        x.reshape([batch, channels, height, width])
    }
}
