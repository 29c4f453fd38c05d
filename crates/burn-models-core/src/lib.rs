//! Core Building Blocks for GAN Generators
//!
//! This crate provides the normalization and convolution layers shared by the
//! residual blocks in `burn-models-gan`.
//!
//! # Modules
//!
//! ## Normalization Descriptors
//!
//! - [`norm_mode`] - Parse descriptors like `"spectralinstance"` once at construction
//!
//! ## Normalization Layers
//!
//! - [`instancenorm`] - Instance normalization (per sample, per channel)
//! - [`norm`] - Batch / instance selection as a single [`Norm`](norm::Norm) module
//! - [`fade`] - FADE conditional normalization driven by a feature map
//! - [`spectral_norm`] - Spectrally normalized convolution
//! - [`norm_conv`] - Convolution followed by an optional normalizer
//!
//! ## Utilities
//!
//! - [`activation`] - ReLU / leaky ReLU / SiLU
//! - [`padding`] - Reflection padding
//!
//! # Example
//!
//! ```ignore
//! use burn_models_core::fade::Fade;
//! use burn_models_core::norm_mode::NormMode;
//!
//! let mode = NormMode::parse("spectralinstance");
//! let fade = Fade::<Backend>::new(&mode.sub_norm, 64, 64, &device)?;
//! let y = fade.forward(x, feat);
//! ```

pub mod activation;
pub mod fade;
pub mod instancenorm;
pub mod norm;
pub mod norm_conv;
pub mod norm_mode;
pub mod padding;
pub mod spectral_norm;

pub use activation::{Activation, LEAKY_RELU_SLOPE, lrelu};
pub use fade::Fade;
pub use instancenorm::InstanceNorm;
pub use norm::Norm;
pub use norm_conv::NormConv2d;
pub use norm_mode::{FadeNormConfig, NormKind, NormLayerConfig, NormMode, NormModeError};
pub use padding::reflection_pad2d;
pub use spectral_norm::{SnConv2d, SnConv2dConfig, SpectralNorm};
