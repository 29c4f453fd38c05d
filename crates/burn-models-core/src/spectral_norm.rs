//! Spectral normalization for convolutions
//!
//! Divides a convolution weight by an estimate of its largest singular value,
//! keeping the layer close to 1-Lipschitz. This is the usual stabilizer for
//! adversarially trained generators and discriminators.
//!
//! # Reference
//!
//! "Spectral Normalization for Generative Adversarial Networks" - Miyato et al., 2018

use burn::nn::PaddingConfig2d;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::prelude::*;
use burn::tensor::Distribution;
use burn::tensor::module::conv2d;
use burn::tensor::ops::ConvOptions;

/// Power-iteration state for one weight matrix
///
/// The weight `[out, in, kh, kw]` is viewed as a matrix `[out, in * kh * kw]`.
/// `u` holds the running estimate of its left singular vector, shape `[1, out]`.
#[derive(Module, Debug)]
pub struct SpectralNorm<B: Backend> {
    /// Left singular vector estimate, shape `[1, out]`
    pub u: Tensor<B, 2>,
    /// Power iterations per estimate
    pub n_power_iterations: usize,
    /// Epsilon for vector normalization
    pub eps: f64,
}

impl<B: Backend> SpectralNorm<B> {
    /// Creates power-iteration state for a weight with `out_features` rows
    pub fn new(out_features: usize, device: &B::Device) -> Self {
        let eps = 1e-12;
        let u = Tensor::random([1, out_features], Distribution::Normal(0.0, 1.0), device);

        Self {
            u: l2_normalize(u, eps),
            n_power_iterations: 1,
            eps,
        }
    }

    /// Runs power iteration from the stored `u` on a detached matrix
    ///
    /// Returns `(u, v)` with shapes `[1, out]` and `[1, in * kh * kw]`.
    fn estimate(&self, matrix: Tensor<B, 2>) -> (Tensor<B, 2>, Tensor<B, 2>) {
        let mut v = l2_normalize(self.u.clone().matmul(matrix.clone()), self.eps);
        let mut u = l2_normalize(v.clone().matmul(matrix.clone().transpose()), self.eps);

        for _ in 1..self.n_power_iterations {
            v = l2_normalize(u.clone().matmul(matrix.clone()), self.eps);
            u = l2_normalize(v.clone().matmul(matrix.clone().transpose()), self.eps);
        }

        (u, v)
    }

    /// Estimated largest singular value of `weight`, shape `[1, 1]`
    ///
    /// Gradients flow through the weight; `u` and `v` are constants.
    pub fn sigma(&self, weight: Tensor<B, 4>) -> Tensor<B, 2> {
        let matrix = flatten_weight(weight);
        let (u, v) = self.estimate(matrix.clone().detach());

        u.matmul(matrix).matmul(v.transpose())
    }

    /// Returns `weight / sigma(weight)`
    pub fn normalize(&self, weight: Tensor<B, 4>) -> Tensor<B, 4> {
        let sigma = self.sigma(weight.clone()).reshape([1, 1, 1, 1]);
        weight / sigma
    }

    /// Advances the stored `u` by one estimate against `weight`
    ///
    /// Forward passes never mutate state; a training step calls this after
    /// each parameter update.
    pub fn power_iterate(mut self, weight: Tensor<B, 4>) -> Self {
        let matrix = flatten_weight(weight).detach();
        let (u, _) = self.estimate(matrix);
        self.u = u;
        self
    }
}

/// `[out, in, kh, kw]` -> `[out, in * kh * kw]`
fn flatten_weight<B: Backend>(weight: Tensor<B, 4>) -> Tensor<B, 2> {
    let [out, in_channels, kh, kw] = weight.dims();
    weight.reshape([out, in_channels * kh * kw])
}

/// Normalizes each row to unit L2 norm
fn l2_normalize<B: Backend>(x: Tensor<B, 2>, eps: f64) -> Tensor<B, 2> {
    let norm = x.clone().powf_scalar(2.0).sum_dim(1).sqrt().clamp_min(eps);
    x / norm
}

/// Configuration for [`SnConv2d`]
#[derive(Config, Debug)]
pub struct SnConv2dConfig {
    /// `[in_channels, out_channels]`
    pub channels: [usize; 2],
    /// Square kernel side
    pub kernel_size: usize,
    /// Zero padding on every side
    #[config(default = 0)]
    pub padding: usize,
    #[config(default = true)]
    pub bias: bool,
    /// Wrap the weight with spectral normalization
    #[config(default = false)]
    pub spectral: bool,
}

impl SnConv2dConfig {
    /// Initializes the convolution
    pub fn init<B: Backend>(&self, device: &B::Device) -> SnConv2d<B> {
        let [in_channels, out_channels] = self.channels;

        let conv = Conv2dConfig::new(
            [in_channels, out_channels],
            [self.kernel_size, self.kernel_size],
        )
        .with_padding(PaddingConfig2d::Explicit(self.padding, self.padding))
        .with_bias(self.bias)
        .init(device);

        let spectral = if self.spectral {
            Some(SpectralNorm::new(out_channels, device))
        } else {
            None
        };

        SnConv2d {
            conv,
            spectral,
            padding: self.padding,
        }
    }
}

/// Stride-1 2D convolution with optional spectral normalization
///
/// Same input/output contract as the bare convolution it wraps.
#[derive(Module, Debug)]
pub struct SnConv2d<B: Backend> {
    pub conv: Conv2d<B>,
    pub spectral: Option<SpectralNorm<B>>,
    /// Zero padding on every side
    pub padding: usize,
}

impl<B: Backend> SnConv2d<B> {
    pub fn is_spectral(&self) -> bool {
        self.spectral.is_some()
    }

    /// Weight used by the forward pass
    pub fn effective_weight(&self) -> Tensor<B, 4> {
        let weight = self.conv.weight.val();
        match &self.spectral {
            Some(sn) => sn.normalize(weight),
            None => weight,
        }
    }

    /// Persists one power-iteration step; no-op without spectral normalization
    pub fn power_iterate(self) -> Self {
        let Self {
            conv,
            spectral,
            padding,
        } = self;
        let spectral = spectral.map(|sn| sn.power_iterate(conv.weight.val()));

        Self {
            conv,
            spectral,
            padding,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        if self.spectral.is_none() {
            return self.conv.forward(x);
        }

        let bias = self.conv.bias.as_ref().map(|b| b.val());
        let options = ConvOptions::new([1, 1], [self.padding, self.padding], [1, 1], 1);

        conv2d(x, self.effective_weight(), bias, options)
    }
}
