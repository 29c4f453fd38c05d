//! Convolution wrapped by a non-conditional normalizer
//!
//! Descriptor `"spectralinstance"` yields a spectrally normalized convolution
//! followed by instance norm; `"none"` yields the bare convolution.

use burn::prelude::*;

use crate::norm::Norm;
use crate::norm_mode::NormLayerConfig;
use crate::spectral_norm::{SnConv2d, SnConv2dConfig};

/// Convolution followed by an optional normalizer
#[derive(Module, Debug)]
pub struct NormConv2d<B: Backend> {
    pub conv: SnConv2d<B>,
    pub norm: Option<Norm<B>>,
}

impl<B: Backend> NormConv2d<B> {
    /// Wraps a convolution described by `conv` according to `norm_layer`
    ///
    /// The convolution bias is dropped when a normalizer follows, since the
    /// normalizer removes any per-channel offset.
    pub fn new(conv: &SnConv2dConfig, norm_layer: NormLayerConfig, device: &B::Device) -> Self {
        let [_, out_channels] = conv.channels;

        let conv = conv
            .clone()
            .with_spectral(norm_layer.spectral)
            .with_bias(conv.bias && norm_layer.kind.is_none())
            .init(device);

        let norm = norm_layer
            .kind
            .map(|kind| Norm::new(kind, out_channels, true, device));

        Self { conv, norm }
    }

    /// Persists one power-iteration step of the convolution
    pub fn power_iterate(self) -> Self {
        Self {
            conv: self.conv.power_iterate(),
            norm: self.norm,
        }
    }

    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        }
    }
}
