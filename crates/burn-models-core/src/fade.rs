//! FADE: Feature Adaptive DEnormalization
//!
//! Normalizes the input with a parameter-free normalizer, then modulates it
//! with a spatially varying scale and shift predicted from a conditioning
//! feature map. Used in two-stream image translation, where the content
//! stream's features steer the generator at every resolution.

use burn::nn::PaddingConfig2d;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::prelude::*;

use crate::norm::Norm;
use crate::norm_mode::{FadeNormConfig, NormModeError};

/// FADE normalization layer
///
/// # Formula
///
/// ```text
/// y = norm(x) * (1 + gamma(feat)) + beta(feat)
/// ```
///
/// `gamma` and `beta` are `KxK` convolutions from the conditioning channels to
/// the normalized channels.
#[derive(Module, Debug)]
pub struct Fade<B: Backend> {
    pub param_free_norm: Norm<B>,
    pub mlp_gamma: Conv2d<B>,
    pub mlp_beta: Conv2d<B>,
}

impl<B: Backend> Fade<B> {
    /// Creates a FADE layer from a sub-norm descriptor
    ///
    /// # Arguments
    ///
    /// * `sub_norm` - Descriptor with `spectral` already removed, e.g. `"instance"` or `"fadebatch3x3"`
    /// * `norm_nc` - Channels of the normalized input
    /// * `label_nc` - Channels of the conditioning feature map
    /// * `device` - Device to create tensors on
    pub fn new(
        sub_norm: &str,
        norm_nc: usize,
        label_nc: usize,
        device: &B::Device,
    ) -> Result<Self, NormModeError> {
        let config = FadeNormConfig::parse(sub_norm)?;
        Ok(Self::from_config(config, norm_nc, label_nc, device))
    }

    pub fn from_config(
        config: FadeNormConfig,
        norm_nc: usize,
        label_nc: usize,
        device: &B::Device,
    ) -> Self {
        let ks = config.kernel_size;
        let pw = ks / 2;

        let mlp = || {
            Conv2dConfig::new([label_nc, norm_nc], [ks, ks])
                .with_padding(PaddingConfig2d::Explicit(pw, pw))
                .init(device)
        };

        Self {
            param_free_norm: Norm::new(config.kind, norm_nc, false, device),
            mlp_gamma: mlp(),
            mlp_beta: mlp(),
        }
    }

    /// Normalizes `x` and modulates it with `feat`
    ///
    /// `feat` must share the spatial extent of `x`.
    pub fn forward(&self, x: Tensor<B, 4>, feat: Tensor<B, 4>) -> Tensor<B, 4> {
        let normalized = self.param_free_norm.forward(x);

        let gamma = self.mlp_gamma.forward(feat.clone());
        let beta = self.mlp_beta.forward(feat);

        normalized * (gamma + 1.0) + beta
    }
}
