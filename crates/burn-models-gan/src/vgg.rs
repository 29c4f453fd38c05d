//! VGG-19 feature extractor for perceptual losses
//!
//! Splits the convolutional `features` stack of VGG-19 into five slices that
//! end at relu1_1, relu2_1, relu3_1, relu4_1 and relu5_1. A perceptual loss
//! compares these activations between a real and a generated image.
//!
//! Weights come from an injected [`BackboneWeights`] provider; see
//! `burn-models-convert` for the safetensors loader.

use std::convert::Infallible;

use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::{PaddingConfig2d, Relu};
use burn::prelude::*;

/// Convolution widths of VGG-19; `None` is a 2x2 max pool
pub const VGG19_LAYOUT: [Option<usize>; 21] = [
    Some(64),
    Some(64),
    None,
    Some(128),
    Some(128),
    None,
    Some(256),
    Some(256),
    Some(256),
    Some(256),
    None,
    Some(512),
    Some(512),
    Some(512),
    Some(512),
    None,
    Some(512),
    Some(512),
    Some(512),
    Some(512),
    None,
];

/// Layer indices where the slices start and end
pub const SLICE_BOUNDARIES: [usize; 6] = [0, 2, 7, 12, 21, 30];

/// Layers of the features stack the extractor runs, up to relu5_1
pub const EXTRACTOR_DEPTH: usize = SLICE_BOUNDARIES[5];

/// Source of backbone convolution weights
pub trait BackboneWeights<B: Backend> {
    type Error: std::error::Error;

    /// Returns the 3x3, padding-1 convolution at `index` of the features stack
    fn conv2d(
        &self,
        index: usize,
        channels: [usize; 2],
        device: &B::Device,
    ) -> Result<Conv2d<B>, Self::Error>;
}

/// Freshly initialized weights, for training from scratch or tests
#[derive(Debug, Clone, Copy, Default)]
pub struct InitWeights;

impl<B: Backend> BackboneWeights<B> for InitWeights {
    type Error = Infallible;

    fn conv2d(
        &self,
        _index: usize,
        channels: [usize; 2],
        device: &B::Device,
    ) -> Result<Conv2d<B>, Infallible> {
        Ok(vgg_conv(channels, device))
    }
}

/// The 3x3 convolution used throughout VGG
pub fn vgg_conv<B: Backend>(channels: [usize; 2], device: &B::Device) -> Conv2d<B> {
    Conv2dConfig::new(channels, [3, 3])
        .with_padding(PaddingConfig2d::Explicit(1, 1))
        .init(device)
}

/// One entry of the VGG features stack
#[derive(Module, Debug)]
pub enum VggLayer<B: Backend> {
    Conv(Conv2d<B>),
    Relu(Relu),
    MaxPool(MaxPool2d),
}

impl<B: Backend> VggLayer<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        match self {
            Self::Conv(conv) => conv.forward(x),
            Self::Relu(relu) => relu.forward(x),
            Self::MaxPool(pool) => pool.forward(x),
        }
    }
}

/// The VGG-19 convolutional stack, 37 layers
#[derive(Module, Debug)]
pub struct Vgg19Features<B: Backend> {
    pub layers: Vec<VggLayer<B>>,
}

impl<B: Backend> Vgg19Features<B> {
    /// Builds the full stack, taking every convolution from `weights`
    pub fn new<W: BackboneWeights<B>>(weights: &W, device: &B::Device) -> Result<Self, W::Error> {
        Self::with_depth(weights, usize::MAX, device)
    }

    /// Builds the first `depth` layers of the stack
    ///
    /// Convolutions past `depth` are never requested from `weights`.
    pub fn with_depth<W: BackboneWeights<B>>(
        weights: &W,
        depth: usize,
        device: &B::Device,
    ) -> Result<Self, W::Error> {
        let mut layers = Vec::new();
        let mut in_channels = 3;

        for entry in VGG19_LAYOUT {
            if layers.len() >= depth {
                break;
            }
            match entry {
                Some(out_channels) => {
                    let conv = weights.conv2d(layers.len(), [in_channels, out_channels], device)?;
                    layers.push(VggLayer::Conv(conv));
                    layers.push(VggLayer::Relu(Relu::new()));
                    in_channels = out_channels;
                }
                None => {
                    let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
                    layers.push(VggLayer::MaxPool(pool));
                }
            }
        }
        layers.truncate(depth);

        Ok(Self { layers })
    }
}

/// Contiguous run `[start, end)` of the features stack
#[derive(Module, Debug)]
pub struct VggSlice<B: Backend> {
    pub layers: Vec<VggLayer<B>>,
    pub start: usize,
    pub end: usize,
}

impl<B: Backend> VggSlice<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        self.layers.iter().fold(x, |x, layer| layer.forward(x))
    }
}

/// Configuration for [`Vgg19`]
#[derive(Config, Debug)]
pub struct Vgg19Config {
    /// Keep the backbone trainable; frozen by default
    #[config(default = false)]
    pub requires_grad: bool,
}

impl Vgg19Config {
    /// Initializes the extractor with fresh, non-pretrained weights
    pub fn init<B: Backend>(&self, device: &B::Device) -> Vgg19<B> {
        match self.init_pretrained(&InitWeights, device) {
            Ok(vgg) => vgg,
            Err(never) => match never {},
        }
    }

    /// Initializes the extractor with weights from `weights`
    pub fn init_pretrained<B: Backend, W: BackboneWeights<B>>(
        &self,
        weights: &W,
        device: &B::Device,
    ) -> Result<Vgg19<B>, W::Error> {
        let features = Vgg19Features::with_depth(weights, EXTRACTOR_DEPTH, device)?;
        log::info!(
            "VGG-19 feature extractor ready (requires_grad={})",
            self.requires_grad
        );
        Ok(Vgg19::from_features(features, self.requires_grad))
    }
}

/// Multi-scale VGG-19 feature extractor
#[derive(Module, Debug)]
pub struct Vgg19<B: Backend> {
    pub slices: [VggSlice<B>; 5],
}

impl<B: Backend> Vgg19<B> {
    /// Splits `features` at [`SLICE_BOUNDARIES`]; layers past the last boundary are dropped
    ///
    /// `features` must hold at least [`EXTRACTOR_DEPTH`] layers.
    ///
    /// With `requires_grad == false` every parameter stops tracking gradients.
    /// Weight values are left untouched.
    pub fn from_features(features: Vgg19Features<B>, requires_grad: bool) -> Self {
        let mut layers = features.layers.into_iter();

        let slices = core::array::from_fn(|i| {
            let (start, end) = (SLICE_BOUNDARIES[i], SLICE_BOUNDARIES[i + 1]);
            VggSlice {
                layers: layers.by_ref().take(end - start).collect(),
                start,
                end,
            }
        });

        let vgg = Self { slices };
        if requires_grad { vgg } else { vgg.no_grad() }
    }

    /// All convolutions, in stack order
    pub fn convs(&self) -> impl Iterator<Item = &Conv2d<B>> {
        self.slices
            .iter()
            .flat_map(|slice| slice.layers.iter())
            .filter_map(|layer| match layer {
                VggLayer::Conv(conv) => Some(conv),
                _ => None,
            })
    }

    /// Returns `[relu1_1, relu2_1, relu3_1, relu4_1, relu5_1]`
    ///
    /// Input: `[batch, 3, h, w]` with `h` and `w` divisible by 16
    pub fn forward(&self, x: Tensor<B, 4>) -> [Tensor<B, 4>; 5] {
        let h_relu1 = self.slices[0].forward(x);
        let h_relu2 = self.slices[1].forward(h_relu1.clone());
        let h_relu3 = self.slices[2].forward(h_relu2.clone());
        let h_relu4 = self.slices[3].forward(h_relu3.clone());
        let h_relu5 = self.slices[4].forward(h_relu4.clone());

        [h_relu1, h_relu2, h_relu3, h_relu4, h_relu5]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::Distribution;
    use burn_autodiff::Autodiff;
    use std::cell::RefCell;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<TestBackend>;

    #[test]
    fn test_features_layout() {
        let device = Default::default();
        let features = Vgg19Features::<TestBackend>::new(&InitWeights, &device).unwrap();
        assert_eq!(features.layers.len(), 37);

        // torchvision indices of the first convolutions
        for index in [0, 2, 5, 7, 10, 12, 19, 21, 28] {
            assert!(matches!(features.layers[index], VggLayer::Conv(_)), "layer {index}");
        }
        for index in [4, 9, 18, 27, 36] {
            assert!(matches!(features.layers[index], VggLayer::MaxPool(_)), "layer {index}");
        }
    }

    #[test]
    fn test_slices_partition_first_30_layers() {
        let device = Default::default();
        let vgg = Vgg19Config::new().init::<TestBackend>(&device);

        let ranges: Vec<(usize, usize)> = vgg.slices.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(ranges, [(0, 2), (2, 7), (7, 12), (12, 21), (21, 30)]);

        let mut expected_start = 0;
        for slice in &vgg.slices {
            assert_eq!(slice.start, expected_start);
            assert_eq!(slice.layers.len(), slice.end - slice.start);
            assert!(matches!(slice.layers.last(), Some(VggLayer::Relu(_))));
            expected_start = slice.end;
        }
        assert_eq!(expected_start, 30);

        // conv1_1 .. conv5_1
        assert_eq!(vgg.convs().count(), 13);
    }

    /// Records requested indices; fails past conv5_1 like a truncated checkpoint
    struct TruncatedWeights(RefCell<Vec<usize>>);

    impl BackboneWeights<TestBackend> for TruncatedWeights {
        type Error = std::fmt::Error;

        fn conv2d(
            &self,
            index: usize,
            channels: [usize; 2],
            device: &<TestBackend as Backend>::Device,
        ) -> Result<Conv2d<TestBackend>, std::fmt::Error> {
            if index >= EXTRACTOR_DEPTH {
                return Err(std::fmt::Error);
            }
            self.0.borrow_mut().push(index);
            Ok(vgg_conv(channels, device))
        }
    }

    #[test]
    fn test_extractor_requests_only_sliced_convs() {
        let device = Default::default();
        let weights = TruncatedWeights(RefCell::new(Vec::new()));
        let vgg = Vgg19Config::new()
            .init_pretrained::<TestBackend, _>(&weights, &device)
            .unwrap();

        assert_eq!(
            weights.0.into_inner(),
            [0, 2, 5, 7, 10, 12, 14, 16, 19, 21, 23, 25, 28]
        );
        assert_eq!(vgg.convs().count(), 13);

        // The full stack still asks for conv5_2 .. conv5_4
        assert!(Vgg19Features::<TestBackend>::new(&TruncatedWeights(RefCell::new(Vec::new())), &device).is_err());
    }

    #[test]
    fn test_with_depth_truncates() {
        let device = Default::default();
        let features = Vgg19Features::<TestBackend>::with_depth(&InitWeights, 3, &device).unwrap();
        assert_eq!(features.layers.len(), 3);
        assert!(matches!(features.layers[2], VggLayer::Conv(_)));
    }

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let vgg = Vgg19Config::new().init::<TestBackend>(&device);

        let x = Tensor::<TestBackend, 4>::random([1, 3, 32, 32], Distribution::Default, &device);
        let dims = vgg.forward(x).map(|h| h.dims());

        assert_eq!(
            dims,
            [
                [1, 64, 32, 32],
                [1, 128, 16, 16],
                [1, 256, 8, 8],
                [1, 512, 4, 4],
                [1, 512, 2, 2],
            ]
        );
    }

    fn backward_grads(requires_grad: bool) -> Vec<bool> {
        let device = Default::default();
        let vgg = Vgg19Config::new()
            .with_requires_grad(requires_grad)
            .init::<TestAutodiffBackend>(&device);

        let x = Tensor::<TestAutodiffBackend, 4>::random(
            [1, 3, 16, 16],
            Distribution::Default,
            &device,
        )
        .require_grad();

        let loss = vgg
            .forward(x)
            .into_iter()
            .map(|h| h.sum())
            .reduce(|a, b| a + b)
            .unwrap();
        let grads = loss.backward();

        vgg.convs()
            .map(|conv| conv.weight.grad(&grads).is_some())
            .collect()
    }

    #[test]
    fn test_frozen_extractor_accumulates_no_gradient() {
        let has_grad = backward_grads(false);
        assert_eq!(has_grad.len(), 13);
        assert!(has_grad.iter().all(|g| !g));
    }

    #[test]
    fn test_trainable_extractor_accumulates_gradient() {
        let has_grad = backward_grads(true);
        assert!(has_grad.iter().all(|g| *g));
    }

    #[test]
    fn test_freezing_keeps_weights() {
        let device = Default::default();
        let features = Vgg19Features::<TestBackend>::new(&InitWeights, &device).unwrap();
        let VggLayer::Conv(conv) = &features.layers[0] else {
            panic!("layer 0 is not a convolution");
        };
        let before: Vec<f32> = conv.weight.val().into_data().to_vec().unwrap();

        let vgg = Vgg19::from_features(features, false);
        let after: Vec<f32> = vgg.convs().next().unwrap().weight.val().into_data().to_vec().unwrap();

        assert_eq!(before, after);
    }
}
