//! GAN Generator Building Blocks
//!
//! Residual blocks and a perceptual feature extractor for image-to-image
//! translation generators.
//!
//! # Components
//!
//! - [`FadeResnetBlock`] - ResNet block normalized with FADE, conditioned on a feature map
//! - [`StreamResnetBlock`] - ResNet block with plain batch / instance normalization
//! - [`ResnetBlock`] - pix2pixHD ResNet block with reflection padding
//! - [`Vgg19`] - VGG-19 activations at five depths for perceptual losses
//!
//! Spectral normalization keeps a power-iteration estimate per convolution.
//! Forward passes leave it untouched; call `power_iterate` on a block after
//! each optimizer step to advance it.
//!
//! # Normalization Descriptors
//!
//! Blocks are configured with descriptor strings such as `"spectralinstance"`.
//! `spectral` wraps every convolution with spectral normalization; the rest
//! selects the normalizer. Descriptors are resolved once in `init`, which
//! returns [`NormModeError`] for unknown or unsupported normalizers.
//!
//! # Example
//!
//! ```ignore
//! use burn_models_gan::{FadeResnetBlockConfig, StreamResnetBlockConfig};
//!
//! let stream = StreamResnetBlockConfig::new(64, 128, "spectralinstance".into()).init(&device)?;
//! let block = FadeResnetBlockConfig::new(128, 64, "spectralfadeinstance3x3".into()).init(&device)?;
//!
//! let feat = stream.forward(content);
//! let x = block.forward(x, feat);
//! ```

pub mod fade_resnet;
pub mod resnet;
pub mod stream_resnet;
pub mod vgg;

pub use burn_models_core::norm_mode::NormModeError;
pub use fade_resnet::{FadeResnetBlock, FadeResnetBlockConfig};
pub use resnet::{ResnetBlock, ResnetBlockConfig};
pub use stream_resnet::{StreamResnetBlock, StreamResnetBlockConfig};
pub use vgg::{
    BackboneWeights, EXTRACTOR_DEPTH, InitWeights, SLICE_BOUNDARIES, Vgg19, Vgg19Config,
    Vgg19Features,
};
