//! Reflection padding
//!
//! Burn convolutions only pad with zeros; reflection padding is assembled from
//! mirrored slices of the border.

use burn::prelude::*;

/// Pads height and width by `pad` on every side, mirroring without repeating the edge
///
/// Row `[a, b, c, d]` padded by 2 becomes `[c, b, a, b, c, d, c, b]`.
/// Requires `pad < height` and `pad < width`.
pub fn reflection_pad2d<B: Backend>(x: Tensor<B, 4>, pad: usize) -> Tensor<B, 4> {
    if pad == 0 {
        return x;
    }

    let [batch, channels, height, width] = x.dims();

    // Width
    let left = x
        .clone()
        .slice([0..batch, 0..channels, 0..height, 1..pad + 1])
        .flip([3]);
    let right = x
        .clone()
        .slice([0..batch, 0..channels, 0..height, width - pad - 1..width - 1])
        .flip([3]);
    let x = Tensor::cat(vec![left, x, right], 3);

    // Height
    let width = width + 2 * pad;
    let top = x
        .clone()
        .slice([0..batch, 0..channels, 1..pad + 1, 0..width])
        .flip([2]);
    let bottom = x
        .clone()
        .slice([0..batch, 0..channels, height - pad - 1..height - 1, 0..width])
        .flip([2]);

    Tensor::cat(vec![top, x, bottom], 2)
}
