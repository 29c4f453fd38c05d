//! ResNet block of the pix2pixHD generator
//!
//! Two reflection-padded convolutions with a fixed activation between them
//! and an identity skip. Channel count never changes.

use burn::module::Ignored;
use burn::prelude::*;

use burn_models_core::activation::Activation;
use burn_models_core::norm_conv::NormConv2d;
use burn_models_core::norm_mode::{NormLayerConfig, NormModeError};
use burn_models_core::padding::reflection_pad2d;
use burn_models_core::spectral_norm::SnConv2dConfig;

/// Configuration for [`ResnetBlock`]
#[derive(Config, Debug)]
pub struct ResnetBlockConfig {
    /// Input and output channels
    pub dim: usize,
    /// Normalizer wrapping each convolution, e.g. `"spectralinstance"` or `"none"`
    pub norm_layer: String,
    #[config(default = "Activation::Relu")]
    pub activation: Activation,
    /// Kernel side; must be odd so reflection padding keeps the spatial size
    #[config(default = 3)]
    pub kernel_size: usize,
}

impl ResnetBlockConfig {
    /// Initializes the block
    ///
    /// Fails on an unknown normalizer or an even kernel side.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Result<ResnetBlock<B>, NormModeError> {
        if self.kernel_size % 2 == 0 {
            return Err(NormModeError::InvalidKernelSize(format!(
                "{0}x{0}",
                self.kernel_size
            )));
        }
        let norm_layer = NormLayerConfig::parse(&self.norm_layer)?;
        let conv = SnConv2dConfig::new([self.dim, self.dim], self.kernel_size);

        log::debug!(
            "ResnetBlock dim={}: kernel={}, activation={:?}, norm={norm_layer:?}",
            self.dim,
            self.kernel_size,
            self.activation
        );

        Ok(ResnetBlock {
            conv1: NormConv2d::new(&conv, norm_layer, device),
            conv2: NormConv2d::new(&conv, norm_layer, device),
            activation: Ignored(self.activation),
            pad: self.kernel_size / 2,
        })
    }
}

/// Residual block with reflection padding and an identity skip
#[derive(Module, Debug)]
pub struct ResnetBlock<B: Backend> {
    pub conv1: NormConv2d<B>,
    pub conv2: NormConv2d<B>,
    pub activation: Ignored<Activation>,
    /// Reflection padding before each convolution
    pub pad: usize,
}

impl<B: Backend> ResnetBlock<B> {
    /// Persists one power-iteration step in both convolutions
    pub fn power_iterate(self) -> Self {
        Self {
            conv1: self.conv1.power_iterate(),
            conv2: self.conv2.power_iterate(),
            activation: self.activation,
            pad: self.pad,
        }
    }

    /// Forward pass with residual connection
    ///
    /// Input and output: `[batch, dim, h, w]`
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let y = self.conv1.forward(reflection_pad2d(x.clone(), self.pad));
        let y = self.activation.0.forward(y);
        // No activation after the second convolution
        let y = self.conv2.forward(reflection_pad2d(y, self.pad));

        x + y
    }
}
