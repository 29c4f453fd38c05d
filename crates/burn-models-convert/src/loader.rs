//! Load tensors from .safetensors files

use std::collections::HashMap;
use std::fs::File;
use std::ops::Range;
use std::path::Path;

use burn::prelude::*;
use half::{bf16, f16};
use memmap2::{Mmap, MmapOptions};
use safetensors::{Dtype, SafeTensors};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Safetensors error: {0}")]
    Safetensors(#[from] safetensors::SafeTensorError),

    #[error("Tensor not found: {0}")]
    TensorNotFound(String),

    #[error("Unsupported dtype for {tensor}: {dtype:?}")]
    UnsupportedDtype { tensor: String, dtype: Dtype },

    #[error("Shape mismatch for {tensor}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        tensor: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

struct TensorInfo {
    dtype: Dtype,
    shape: Vec<usize>,
    /// Byte range inside the mapped file
    bytes: Range<usize>,
}

/// A memory-mapped safetensors file
pub struct SafeTensorFile {
    mmap: Mmap,
    tensors: HashMap<String, TensorInfo>,
}

impl SafeTensorFile {
    /// Open a safetensors file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let file = File::open(path)?;
        // The map is read-only and owned by the returned value
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        let tensors = {
            let st = SafeTensors::deserialize(&mmap)?;
            let base = mmap.as_ptr() as usize;

            st.tensors()
                .into_iter()
                .map(|(name, view)| {
                    let start = view.data().as_ptr() as usize - base;
                    let info = TensorInfo {
                        dtype: view.dtype(),
                        shape: view.shape().to_vec(),
                        bytes: start..start + view.data().len(),
                    };
                    (name, info)
                })
                .collect()
        };

        Ok(Self { mmap, tensors })
    }

    /// List all tensor names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tensors.keys().map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tensors.contains_key(name)
    }

    pub fn shape(&self, name: &str) -> Option<&[usize]> {
        self.tensors.get(name).map(|t| t.shape.as_slice())
    }

    /// Load a tensor as f32, converting from fp16/bf16 if needed
    pub fn load_f32<B: Backend, const D: usize>(
        &self,
        name: &str,
        device: &B::Device,
    ) -> Result<Tensor<B, D>, LoadError> {
        let info = self.info(name)?;

        if info.shape.len() != D {
            return Err(LoadError::ShapeMismatch {
                tensor: name.to_string(),
                expected: vec![0; D], // rank only
                actual: info.shape.clone(),
            });
        }

        let data = &self.mmap[info.bytes.clone()];

        // mmap data may be unaligned, so decode byte chunks
        let floats: Vec<f32> = match info.dtype {
            Dtype::F32 => data
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect(),
            Dtype::F16 => data
                .chunks_exact(2)
                .map(|c| f16::from_le_bytes([c[0], c[1]]).to_f32())
                .collect(),
            Dtype::BF16 => data
                .chunks_exact(2)
                .map(|c| bf16::from_le_bytes([c[0], c[1]]).to_f32())
                .collect(),
            dtype => {
                return Err(LoadError::UnsupportedDtype {
                    tensor: name.to_string(),
                    dtype,
                });
            }
        };

        let tensor_data = TensorData::new(floats, info.shape.clone());
        Ok(Tensor::from_data(tensor_data, device))
    }

    /// Load a tensor with expected shape, converting to f32
    pub fn load_f32_checked<B: Backend, const D: usize>(
        &self,
        name: &str,
        expected_shape: [usize; D],
        device: &B::Device,
    ) -> Result<Tensor<B, D>, LoadError> {
        let info = self.info(name)?;

        if info.shape.as_slice() != expected_shape.as_slice() {
            return Err(LoadError::ShapeMismatch {
                tensor: name.to_string(),
                expected: expected_shape.to_vec(),
                actual: info.shape.clone(),
            });
        }

        self.load_f32::<B, D>(name, device)
    }

    fn info(&self, name: &str) -> Result<&TensorInfo, LoadError> {
        self.tensors
            .get(name)
            .ok_or_else(|| LoadError::TensorNotFound(name.to_string()))
    }
}

/// Builds safetensors bytes from little-endian tensor payloads
#[cfg(test)]
pub(crate) fn write_test_file(
    name: &str,
    tensors: &[(&str, &str, Vec<usize>, Vec<u8>)],
) -> std::path::PathBuf {
    let mut entries = Vec::new();
    let mut payload = Vec::new();

    for (tensor, dtype, shape, bytes) in tensors {
        let start = payload.len();
        payload.extend_from_slice(bytes);
        let shape: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
        entries.push(format!(
            "\"{tensor}\":{{\"dtype\":\"{dtype}\",\"shape\":[{}],\"data_offsets\":[{start},{}]}}",
            shape.join(","),
            payload.len()
        ));
    }

    let mut header = format!("{{{}}}", entries.join(","));
    while header.len() % 8 != 0 {
        header.push(' ');
    }

    let mut bytes = (header.len() as u64).to_le_bytes().to_vec();
    bytes.extend_from_slice(header.as_bytes());
    bytes.extend_from_slice(&payload);

    let path = std::env::temp_dir().join(format!(
        "burn-models-convert-{name}-{}.safetensors",
        std::process::id()
    ));
    std::fs::write(&path, bytes).unwrap();
    path
}

#[cfg(test)]
pub(crate) fn f32_bytes(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_load_error_display() {
        let err = LoadError::TensorNotFound("missing".to_string());
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_load_f32() {
        let path = write_test_file(
            "load-f32",
            &[("w", "F32", vec![2, 2], f32_bytes(&[1.0, -2.0, 3.5, 4.0]))],
        );
        let file = SafeTensorFile::open(&path).unwrap();
        assert!(file.contains("w"));
        assert_eq!(file.shape("w"), Some([2, 2].as_slice()));

        let device = Default::default();
        let tensor: Tensor<TestBackend, 2> = file.load_f32("w", &device).unwrap();
        let values: Vec<f32> = tensor.into_data().to_vec().unwrap();
        assert_eq!(values, [1.0, -2.0, 3.5, 4.0]);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_f16_converts() {
        let bytes: Vec<u8> = [0.5f32, -1.25]
            .iter()
            .flat_map(|v| f16::from_f32(*v).to_le_bytes())
            .collect();
        let path = write_test_file("load-f16", &[("h", "F16", vec![2], bytes)]);
        let file = SafeTensorFile::open(&path).unwrap();

        let device = Default::default();
        let tensor: Tensor<TestBackend, 1> = file.load_f32("h", &device).unwrap();
        let values: Vec<f32> = tensor.into_data().to_vec().unwrap();
        assert_eq!(values, [0.5, -1.25]);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_missing_and_mismatched() {
        let path = write_test_file(
            "errors",
            &[("w", "F32", vec![3], f32_bytes(&[1.0, 2.0, 3.0]))],
        );
        let file = SafeTensorFile::open(&path).unwrap();
        let device = Default::default();

        let err = file.load_f32::<TestBackend, 1>("nope", &device).unwrap_err();
        assert!(matches!(err, LoadError::TensorNotFound(name) if name == "nope"));

        let err = file
            .load_f32_checked::<TestBackend, 1>("w", [4], &device)
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::ShapeMismatch { ref expected, ref actual, .. }
                if expected == &[4] && actual == &[3]
        ));

        let err = file.load_f32::<TestBackend, 2>("w", &device).unwrap_err();
        assert!(matches!(err, LoadError::ShapeMismatch { .. }));

        std::fs::remove_file(path).ok();
    }
}
