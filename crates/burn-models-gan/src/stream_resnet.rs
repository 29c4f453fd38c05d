//! Unconditioned ResNet block for the feature stream
//!
//! Same topology as [`FadeResnetBlock`](crate::FadeResnetBlock), but every
//! normalizer is a plain batch or instance norm applied after its convolution.

use burn::prelude::*;

use burn_models_core::activation::lrelu;
use burn_models_core::norm::Norm;
use burn_models_core::norm_mode::{NormKind, NormMode, NormModeError};
use burn_models_core::spectral_norm::{SnConv2d, SnConv2dConfig};

/// Configuration for [`StreamResnetBlock`]
#[derive(Config, Debug)]
pub struct StreamResnetBlockConfig {
    pub in_channels: usize,
    pub out_channels: usize,
    /// Normalization descriptor: optional `spectral` plus `batch`, `instance` or `syncbatch`
    pub norm_mode: String,
}

impl StreamResnetBlockConfig {
    /// Initializes the block
    ///
    /// `syncbatch` is always rejected, as is any sub-norm other than `batch`
    /// and `instance`.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Result<StreamResnetBlock<B>, NormModeError> {
        let mode = NormMode::parse(&self.norm_mode);
        let kind = NormKind::resolve(&mode.sub_norm)?;
        // Batch norm keeps its affine transform; instance norm never has one
        let affine = kind == NormKind::Batch;

        let fin = self.in_channels;
        let fout = self.out_channels;
        let learned_shortcut = fin != fout;
        let fmiddle = fin;

        log::debug!(
            "StreamResnetBlock {fin}->{fout}: learned_shortcut={learned_shortcut}, spectral={}, norm={kind:?}",
            mode.spectral
        );

        let conv = |channels: [usize; 2]| {
            SnConv2dConfig::new(channels, 3)
                .with_padding(1)
                .with_spectral(mode.spectral)
                .init(device)
        };

        let (conv_s, norm_layer_s) = if learned_shortcut {
            let conv_s = SnConv2dConfig::new([fin, fout], 1)
                .with_bias(false)
                .with_spectral(mode.spectral)
                .init(device);
            (Some(conv_s), Some(Norm::new(kind, fout, affine, device)))
        } else {
            (None, None)
        };

        Ok(StreamResnetBlock {
            conv_0: conv([fin, fmiddle]),
            conv_1: conv([fmiddle, fout]),
            conv_s,
            norm_layer_in: Norm::new(kind, fin, affine, device),
            norm_layer_out: Norm::new(kind, fout, affine, device),
            norm_layer_s,
        })
    }
}

/// Residual block with plain per-channel normalization
#[derive(Module, Debug)]
pub struct StreamResnetBlock<B: Backend> {
    pub conv_0: SnConv2d<B>,
    pub conv_1: SnConv2d<B>,
    /// 1x1 projection, present when `in_channels != out_channels`
    pub conv_s: Option<SnConv2d<B>>,
    pub norm_layer_in: Norm<B>,
    pub norm_layer_out: Norm<B>,
    pub norm_layer_s: Option<Norm<B>>,
}

impl<B: Backend> StreamResnetBlock<B> {
    pub fn learned_shortcut(&self) -> bool {
        self.conv_s.is_some()
    }

    /// Persists one power-iteration step in every convolution
    pub fn power_iterate(self) -> Self {
        Self {
            conv_0: self.conv_0.power_iterate(),
            conv_1: self.conv_1.power_iterate(),
            conv_s: self.conv_s.map(SnConv2d::power_iterate),
            ..self
        }
    }

    /// Forward pass
    ///
    /// Input: `[batch, in, h, w]`
    /// Output: `[batch, out, h, w]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x_s = self.shortcut(x.clone());

        let dx = lrelu(self.norm_layer_in.forward(self.conv_0.forward(x)));
        let dx = lrelu(self.norm_layer_out.forward(self.conv_1.forward(dx)));

        x_s + dx
    }

    /// Skip path: identity, or `lrelu(norm_s(conv_s(x)))` when learned
    ///
    /// The learned path ends in an activation, unlike the FADE block.
    pub fn shortcut(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match (&self.conv_s, &self.norm_layer_s) {
            (Some(conv_s), Some(norm_s)) => lrelu(norm_s.forward(conv_s.forward(x))),
            _ => x,
        }
    }
}
