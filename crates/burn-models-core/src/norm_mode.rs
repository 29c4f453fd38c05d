//! Normalization-mode descriptors
//!
//! GAN generators are configured with short descriptor strings such as
//! `"spectralinstance"` or `"spectralfadesyncbatch3x3"`. The `spectral` token
//! requests spectral normalization of every convolution; what remains names the
//! per-channel normalizer.
//!
//! Descriptors are parsed once at construction into [`NormMode`] and then
//! resolved by each consumer:
//!
//! - [`NormKind::resolve`] - strict `batch` / `instance` / `syncbatch`
//! - [`FadeNormConfig::parse`] - FADE descriptors with optional `fade` prefix and `KxK` kernel
//! - [`NormLayerConfig::parse`] - plain wrappers, where `none` disables the normalizer

use thiserror::Error;

/// Token that enables spectral normalization
pub const SPECTRAL_TOKEN: &str = "spectral";

/// Errors raised while resolving a normalization descriptor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormModeError {
    #[error("normalization layer {0} is not recognized")]
    Unrecognized(String),

    #[error("synchronized batch normalization is not supported")]
    SyncBatchUnsupported,

    #[error("invalid kernel size in normalization descriptor: {0}")]
    InvalidKernelSize(String),
}

/// A descriptor split into its spectral flag and the remaining sub-norm token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormMode {
    /// Wrap convolutions with spectral normalization
    pub spectral: bool,
    /// Descriptor with every `spectral` occurrence removed
    pub sub_norm: String,
}

impl NormMode {
    /// Splits a descriptor into the spectral flag and the sub-norm token
    pub fn parse(descriptor: &str) -> Self {
        Self {
            spectral: descriptor.contains(SPECTRAL_TOKEN),
            sub_norm: descriptor.replace(SPECTRAL_TOKEN, ""),
        }
    }
}

/// Per-channel normalizer kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormKind {
    /// Batch statistics per channel
    Batch,
    /// Per-sample statistics per channel
    Instance,
}

impl NormKind {
    /// Resolves a sub-norm token to a normalizer kind
    ///
    /// `syncbatch` is recognized but cross-device statistics are not available,
    /// so it always fails.
    pub fn resolve(token: &str) -> Result<Self, NormModeError> {
        match token {
            "batch" => Ok(Self::Batch),
            "instance" => Ok(Self::Instance),
            "syncbatch" => Err(NormModeError::SyncBatchUnsupported),
            other => Err(NormModeError::Unrecognized(other.to_string())),
        }
    }
}

/// Resolved configuration of a FADE normalization layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FadeNormConfig {
    /// Parameter-free normalizer applied before modulation
    pub kind: NormKind,
    /// Kernel size of the gamma/beta convolutions
    pub kernel_size: usize,
}

impl FadeNormConfig {
    /// Default modulation kernel when the descriptor carries none
    pub const DEFAULT_KERNEL_SIZE: usize = 3;

    /// Parses a FADE sub-norm such as `instance`, `fadebatch` or `fadeinstance5x5`
    pub fn parse(sub_norm: &str) -> Result<Self, NormModeError> {
        let token = sub_norm.strip_prefix("fade").unwrap_or(sub_norm);

        let split = token
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(token.len());
        let (kind, kernel) = token.split_at(split);

        let kernel_size = if kernel.is_empty() {
            Self::DEFAULT_KERNEL_SIZE
        } else {
            parse_kernel(kernel)?
        };

        Ok(Self {
            kind: NormKind::resolve(kind)?,
            kernel_size,
        })
    }
}

/// `KxK` with equal odd sides
fn parse_kernel(size: &str) -> Result<usize, NormModeError> {
    let invalid = || NormModeError::InvalidKernelSize(size.to_string());

    let (h, w) = size.split_once('x').ok_or_else(invalid)?;
    let h: usize = h.parse().map_err(|_| invalid())?;
    let w: usize = w.parse().map_err(|_| invalid())?;

    if h != w || h % 2 == 0 {
        return Err(invalid());
    }
    Ok(h)
}

/// Resolved configuration of a non-conditional normalizer wrapper
///
/// Wraps a convolution with optional spectral normalization and an optional
/// trailing normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormLayerConfig {
    pub spectral: bool,
    /// `None` when the descriptor asks for no normalizer
    pub kind: Option<NormKind>,
}

impl NormLayerConfig {
    pub fn parse(descriptor: &str) -> Result<Self, NormModeError> {
        let mode = NormMode::parse(descriptor);
        let kind = match mode.sub_norm.as_str() {
            "" | "none" => None,
            token => Some(NormKind::resolve(token)?),
        };

        Ok(Self {
            spectral: mode.spectral,
            kind,
        })
    }
}
