// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Image → model input tensor.
//!
//! The constants are the ImageNet preprocessing the ResNet v1 zoo models
//! were trained with, in 0..=255 pixel units.

use crate::PipelineError;
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::path::Path;
use tensor_core::{Shape, Tensor};

/// Side length of the square model input.
pub const INPUT_SIZE: u32 = 224;

/// Per-channel (R, G, B) mean.
pub const MEAN: [f32; 3] = [123.0, 117.0, 104.0];

/// Per-channel (R, G, B) standard deviation.
pub const STD: [f32; 3] = [58.395, 57.12, 57.375];

/// Decodes an image file of any supported format to 8-bit RGB.
pub fn load_image(path: &Path) -> Result<RgbImage, PipelineError> {
    let image = image::open(path)?.into_rgb8();
    tracing::debug!(
        "decoded {} ({}x{})",
        path.display(),
        image.width(),
        image.height()
    );
    Ok(image)
}

/// Resizes to [`INPUT_SIZE`]², normalises each channel and lays the pixels
/// out as `[1, 3, H, W]`.
///
/// Deterministic: the same image always yields bit-identical output.
pub fn transform_image(image: &RgbImage) -> Result<Tensor, PipelineError> {
    let resized;
    let image = if image.dimensions() == (INPUT_SIZE, INPUT_SIZE) {
        image
    } else {
        resized = imageops::resize(image, INPUT_SIZE, INPUT_SIZE, FilterType::CatmullRom);
        &resized
    };

    let side = INPUT_SIZE as usize;
    let plane = side * side;
    let mut data = vec![0.0f32; 3 * plane];
    for (x, y, pixel) in image.enumerate_pixels() {
        let offset = y as usize * side + x as usize;
        for c in 0..3 {
            data[c * plane + offset] = (f32::from(pixel[c]) - MEAN[c]) / STD[c];
        }
    }
    Ok(Tensor::from_vec(Shape::nchw(1, 3, side, side), data)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn gradient(w: u32, h: u32) -> RgbImage {
        RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 5 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_shape_is_fixed() {
        for (w, h) in [(224, 224), (640, 480), (31, 97)] {
            let t = transform_image(&gradient(w, h)).unwrap();
            assert_eq!(t.shape(), &Shape::nchw(1, 3, 224, 224));
        }
    }

    #[test]
    fn test_channel_first_normalisation() {
        let img = RgbImage::from_pixel(224, 224, Rgb([123, 175, 161]));
        let t = transform_image(&img).unwrap();
        let plane = 224 * 224;
        let s = t.as_slice();
        assert_eq!(s[0], 0.0);
        assert!((s[plane] - 58.0 / 57.12).abs() < 1e-6);
        assert!((s[2 * plane + plane - 1] - 57.0 / 57.375).abs() < 1e-6);
    }

    #[test]
    fn test_pixel_placement() {
        let mut img = RgbImage::from_pixel(224, 224, Rgb([123, 117, 104]));
        img.put_pixel(5, 2, Rgb([255, 117, 104]));
        let t = transform_image(&img).unwrap();
        let s = t.as_slice();
        assert!((s[2 * 224 + 5] - 132.0 / 58.395).abs() < 1e-6);
        assert_eq!(s.iter().filter(|v| **v != 0.0).count(), 1);
    }

    #[test]
    fn test_deterministic() {
        let img = gradient(300, 200);
        let a = transform_image(&img).unwrap().to_le_bytes();
        let b = transform_image(&img).unwrap().to_le_bytes();
        assert_eq!(a, b);
    }

    #[test]
    fn test_load_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.png");
        gradient(16, 8).save(&path).unwrap();
        let img = load_image(&path).unwrap();
        assert_eq!(img.dimensions(), (16, 8));
        assert!(load_image(&dir.path().join("missing.png")).is_err());
    }
}
