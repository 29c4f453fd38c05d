//! Per-channel normalizers selected at construction time

use burn::nn::{BatchNorm, BatchNormConfig};
use burn::prelude::*;

use crate::instancenorm::InstanceNorm;
use crate::norm_mode::NormKind;

/// Normalizer without an external conditioning input
///
/// Built once from a resolved [`NormKind`]; every call dispatches on the
/// variant chosen at construction.
#[derive(Module, Debug)]
pub enum Norm<B: Backend> {
    /// Batch statistics per channel
    Batch(BatchNorm<B>),
    /// Per-sample statistics per channel, no parameters
    Instance(InstanceNorm),
}

impl<B: Backend> Norm<B> {
    /// Creates a normalizer for `num_channels` channels
    ///
    /// # Arguments
    ///
    /// * `kind` - Normalizer kind
    /// * `num_channels` - Number of input channels
    /// * `affine` - Learn scale and shift (batch only; instance norm never has them)
    /// * `device` - Device to create tensors on
    pub fn new(kind: NormKind, num_channels: usize, affine: bool, device: &B::Device) -> Self {
        match kind {
            NormKind::Batch => {
                let norm = BatchNormConfig::new(num_channels).init(device);
                // Frozen gamma = 1, beta = 0 is the parameter-free form
                let norm = if affine { norm } else { norm.no_grad() };
                Self::Batch(norm)
            }
            NormKind::Instance => Self::Instance(InstanceNorm::new()),
        }
    }

    pub fn kind(&self) -> NormKind {
        match self {
            Self::Batch(_) => NormKind::Batch,
            Self::Instance(_) => NormKind::Instance,
        }
    }

    /// Normalizes a `[batch, channels, height, width]` tensor
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::Batch(norm) => norm.forward(x),
            Self::Instance(norm) => norm.forward(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_norm_kinds() {
        let device = Default::default();

        let batch = Norm::<TestBackend>::new(NormKind::Batch, 8, true, &device);
        assert_eq!(batch.kind(), NormKind::Batch);

        let instance = Norm::<TestBackend>::new(NormKind::Instance, 8, false, &device);
        assert_eq!(instance.kind(), NormKind::Instance);
    }

    #[test]
    fn test_norm_preserves_shape() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 4>::random([2, 8, 6, 6], Distribution::Default, &device);

        for kind in [NormKind::Batch, NormKind::Instance] {
            let norm = Norm::<TestBackend>::new(kind, 8, true, &device);
            assert_eq!(norm.forward(x.clone()).dims(), [2, 8, 6, 6]);
        }
    }

    #[test]
    fn test_instance_norm_has_no_parameters() {
        let device = Default::default();
        let instance = Norm::<TestBackend>::new(NormKind::Instance, 8, true, &device);
        assert_eq!(instance.num_params(), 0);
    }
}
