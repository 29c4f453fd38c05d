//! Pretrained VGG-19 weights from safetensors
//!
//! Expects torchvision key names (`features.{index}.weight` / `.bias`), as
//! produced by exporting `torchvision.models.vgg19(weights=...)` with
//! `safetensors.torch.save_file(model.state_dict(), ...)`.

use std::path::Path;

use burn::module::Param;
use burn::nn::conv::Conv2d;
use burn::prelude::*;

use burn_models_gan::vgg::{BackboneWeights, vgg_conv};

use crate::loader::{LoadError, SafeTensorFile};

/// Error type for VGG weight loading
#[derive(Debug, thiserror::Error)]
pub enum VggLoadError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

/// Weight provider backed by a safetensors file
pub struct VggWeightLoader {
    file: SafeTensorFile,
    /// Key prefix of the features stack
    prefix: String,
}

impl VggWeightLoader {
    /// Open a VGG-19 safetensors file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, VggLoadError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(VggLoadError::FileNotFound(path.display().to_string()));
        }

        let file = SafeTensorFile::open(path)?;
        log::info!("Opened VGG weights {}", path.display());

        Ok(Self {
            file,
            prefix: "features".to_string(),
        })
    }

    /// Use a different key prefix, e.g. `"vgg.features"` for wrapped checkpoints
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

impl<B: Backend> BackboneWeights<B> for VggWeightLoader {
    type Error = VggLoadError;

    fn conv2d(
        &self,
        index: usize,
        channels: [usize; 2],
        device: &B::Device,
    ) -> Result<Conv2d<B>, VggLoadError> {
        let [in_channels, out_channels] = channels;
        let weight_key = format!("{}.{index}.weight", self.prefix);
        let bias_key = format!("{}.{index}.bias", self.prefix);

        // PyTorch and Burn share the [out, in, kh, kw] layout
        let weight: Tensor<B, 4> =
            self.file
                .load_f32_checked(&weight_key, [out_channels, in_channels, 3, 3], device)?;
        let bias: Tensor<B, 1> = self
            .file
            .load_f32_checked(&bias_key, [out_channels], device)?;

        log::debug!("Loaded {weight_key} [{out_channels}, {in_channels}, 3, 3]");

        let mut conv = vgg_conv(channels, device);
        conv.weight = Param::from_tensor(weight);
        conv.bias = Some(Param::from_tensor(bias));

        Ok(conv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{f32_bytes, write_test_file};
    use burn_models_gan::Vgg19Config;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn first_conv_file(name: &str, prefix: &str) -> std::path::PathBuf {
        let weight: Vec<f32> = (0..64 * 3 * 3 * 3).map(|i| i as f32 * 1e-3).collect();
        let bias = vec![0.5f32; 64];
        let weight_key = format!("{prefix}.0.weight");
        let bias_key = format!("{prefix}.0.bias");

        write_test_file(
            name,
            &[
                (weight_key.as_str(), "F32", vec![64, 3, 3, 3], f32_bytes(&weight)),
                (bias_key.as_str(), "F32", vec![64], f32_bytes(&bias)),
            ],
        )
    }

    #[test]
    fn test_loads_first_conv() {
        let path = first_conv_file("vgg-conv0", "features");
        let loader = VggWeightLoader::open(&path).unwrap();
        let device = Default::default();

        let conv: Conv2d<TestBackend> = loader.conv2d(0, [3, 64], &device).unwrap();
        assert_eq!(conv.weight.dims(), [64, 3, 3, 3]);

        let weight: Vec<f32> = conv.weight.val().into_data().to_vec().unwrap();
        assert_eq!(weight[1], 1e-3);
        let bias: Vec<f32> = conv.bias.unwrap().val().into_data().to_vec().unwrap();
        assert!(bias.iter().all(|b| *b == 0.5));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_custom_prefix() {
        let path = first_conv_file("vgg-prefix", "vgg.features");
        let loader = VggWeightLoader::open(&path).unwrap().with_prefix("vgg.features");
        let device = Default::default();

        let conv: Result<Conv2d<TestBackend>, _> = loader.conv2d(0, [3, 64], &device);
        assert!(conv.is_ok());

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_shape_mismatch() {
        let path = first_conv_file("vgg-mismatch", "features");
        let loader = VggWeightLoader::open(&path).unwrap();
        let device = Default::default();

        let err = BackboneWeights::<TestBackend>::conv2d(&loader, 0, [3, 32], &device).unwrap_err();
        assert!(matches!(
            err,
            VggLoadError::Load(LoadError::ShapeMismatch { .. })
        ));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_incomplete_checkpoint_fails_extractor() {
        let path = first_conv_file("vgg-incomplete", "features");
        let loader = VggWeightLoader::open(&path).unwrap();
        let device = Default::default();

        // Only layer 0 is present; conv1_2 lives at index 2
        let err = Vgg19Config::new()
            .init_pretrained::<TestBackend, _>(&loader, &device)
            .unwrap_err();
        assert!(matches!(
            err,
            VggLoadError::Load(LoadError::TensorNotFound(ref name)) if name == "features.2.weight"
        ));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_file() {
        let err = VggWeightLoader::open("/nonexistent/vgg19.safetensors")
            .err()
            .unwrap();
        assert!(matches!(err, VggLoadError::FileNotFound(_)));
    }
}
