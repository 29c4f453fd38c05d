//! ResNet block conditioned with FADE
//!
//! Unlike a SPADE block it receives a feature map rather than a semantic
//! layout, and learns the skip connection when the channel count changes.

use burn::prelude::*;

use burn_models_core::activation::lrelu;
use burn_models_core::fade::Fade;
use burn_models_core::norm_mode::{FadeNormConfig, NormMode, NormModeError};
use burn_models_core::spectral_norm::{SnConv2d, SnConv2dConfig};

/// Configuration for [`FadeResnetBlock`]
#[derive(Config, Debug)]
pub struct FadeResnetBlockConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    /// Normalization descriptor, e.g. `"spectralinstance"` or `"spectralfadebatch3x3"`
    pub norm_mode: String,
}

impl FadeResnetBlockConfig {
    /// Initializes the block
    ///
    /// Fails if the descriptor names an unknown or unsupported normalizer.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<FadeResnetBlock<B>, NormModeError> {
        let mode = NormMode::parse(&self.norm_mode);
        let fade = FadeNormConfig::parse(&mode.sub_norm)?;

        let fin = self.in_channels;
        let fout = self.out_channels;
        let learned_shortcut = fin != fout;
        // Middle width follows the input, not the output
        let fmiddle = fin;

        log::debug!(
            "FadeResnetBlock {fin}->{fout}: learned_shortcut={learned_shortcut}, spectral={}, norm={:?}",
            mode.spectral,
            fade.kind
        );

        let conv_0 = SnConv2dConfig::new([fin, fmiddle], 3)
            .with_padding(1)
            .with_spectral(mode.spectral)
            .init(device);
        let conv_1 = SnConv2dConfig::new([fmiddle, fout], 3)
            .with_padding(1)
            .with_spectral(mode.spectral)
            .init(device);

        let norm_0 = Fade::from_config(fade, fin, fin, device);
        let norm_1 = Fade::from_config(fade, fmiddle, fmiddle, device);

        let (conv_s, norm_s) = if learned_shortcut {
            let conv_s = SnConv2dConfig::new([fin, fout], 1)
                .with_bias(false)
                .with_spectral(mode.spectral)
                .init(device);
            let norm_s = Fade::from_config(fade, fin, fin, device);
            (Some(conv_s), Some(norm_s))
        } else {
            (None, None)
        };

        Ok(FadeResnetBlock {
            conv_0,
            conv_1,
            conv_s,
            norm_0,
            norm_1,
            norm_s,
        })
    }
}

/// Residual block with FADE normalization
///
/// Takes the feature map to normalize and a conditioning feature map with
/// `in_channels` channels at the same resolution.
#[derive(Module, Debug)]
pub struct FadeResnetBlock<B: Backend> {
    pub conv_0: SnConv2d<B>,
    pub conv_1: SnConv2d<B>,
    /// 1x1 projection, present when `in_channels != out_channels`
    pub conv_s: Option<SnConv2d<B>>,
    pub norm_0: Fade<B>,
    pub norm_1: Fade<B>,
    pub norm_s: Option<Fade<B>>,
}

impl<B: Backend> FadeResnetBlock<B> {
    pub fn learned_shortcut(&self) -> bool {
        self.conv_s.is_some()
    }

    /// Persists one power-iteration step in every convolution
    ///
    /// Call after each optimizer step so spectral normalization tracks the
    /// updated weights.
    pub fn power_iterate(self) -> Self {
        Self {
            conv_0: self.conv_0.power_iterate(),
            conv_1: self.conv_1.power_iterate(),
            conv_s: self.conv_s.map(SnConv2d::power_iterate),
            norm_0: self.norm_0,
            norm_1: self.norm_1,
            norm_s: self.norm_s,
        }
    }

    /// Forward pass
    ///
    /// Input: `x` `[batch, in, h, w]`, `feat` `[batch, in, h, w]`
    /// Output: `[batch, out, h, w]`
    pub fn forward(&self, x: Tensor<B, 4>, feat: Tensor<B, 4>) -> Tensor<B, 4> {
        let x_s = self.shortcut(x.clone(), feat.clone());

        let dx = self
            .conv_0
            .forward(lrelu(self.norm_0.forward(x, feat.clone())));
        let dx = self.conv_1.forward(lrelu(self.norm_1.forward(dx, feat)));

        x_s + dx
    }

    /// Skip path: identity, or `conv_s(norm_s(x, feat))` when learned
    pub fn shortcut(&self, x: Tensor<B, 4>, feat: Tensor<B, 4>) -> Tensor<B, 4> {
        match (&self.conv_s, &self.norm_s) {
            (Some(conv_s), Some(norm_s)) => conv_s.forward(norm_s.forward(x, feat)),
            _ => x,
        }
    }
}
