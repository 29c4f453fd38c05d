//! Activation functions for GAN residual blocks
//!
//! The FADE and stream blocks use a fixed leaky ReLU; the classic block takes
//! its activation from configuration.

use burn::prelude::*;
use burn::tensor::activation::{leaky_relu, relu, sigmoid};
use serde::{Deserialize, Serialize};

/// Negative slope of the leaky ReLU used throughout GAN residual blocks
pub const LEAKY_RELU_SLOPE: f64 = 0.2;

/// SiLU (Sigmoid Linear Unit) activation: x * sigmoid(x)
pub fn silu<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    x.clone() * sigmoid(x)
}

/// Leaky ReLU with [`LEAKY_RELU_SLOPE`]
pub fn lrelu<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    leaky_relu(x, LEAKY_RELU_SLOPE)
}

/// Element-wise activation chosen by configuration
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum Activation {
    #[default]
    Relu,
    LeakyRelu { negative_slope: f64 },
    Silu,
}

impl Activation {
    pub fn forward<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Self::Relu => relu(x),
            Self::LeakyRelu { negative_slope } => leaky_relu(x, *negative_slope),
            Self::Silu => silu(x),
        }
    }
}
