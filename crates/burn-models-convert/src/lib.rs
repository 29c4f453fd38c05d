//! Weight Loading
//!
//! This crate loads pretrained weights from safetensors format into the
//! modules of `burn-models-gan`.
//!
//! # Weight Loading
//!
//! Load raw tensors from safetensors files:
//!
//! ```ignore
//! use burn_models_convert::{SafeTensorFile, LoadError};
//!
//! let file = SafeTensorFile::open("vgg19.safetensors")?;
//! let weight: Tensor<B, 4> = file.load_f32("features.0.weight", &device)?;
//! ```
//!
//! # Specialized Loaders
//!
//! - [`VggWeightLoader`] - torchvision VGG-19 weights for the perceptual feature extractor
//!
//! ```ignore
//! use burn_models_convert::VggWeightLoader;
//! use burn_models_gan::Vgg19Config;
//!
//! let weights = VggWeightLoader::open("vgg19.safetensors")?;
//! let vgg = Vgg19Config::new().init_pretrained::<B, _>(&weights, &device)?;
//! ```

pub mod loader;
pub mod vgg_loader;

pub use loader::{LoadError, SafeTensorFile};
pub use vgg_loader::{VggLoadError, VggWeightLoader};
