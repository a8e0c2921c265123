// Image adapter — tensors <-> raster images
//
// Tensors use the (width, height, channels) layout of the convolution
// layers, so the value of channel c at pixel (x, y) lives at flat index
//
//   (x * height + y) * channels + c
//
// while image buffers are row-major interleaved, (y * width + x) * channels + c.
//
// Channel counts: 1 = gray, 2 = gray + alpha, 3 = RGB, 4 = RGBA.
// Pixel values map to [0, 1] on load; on save they are scaled back to
// [0, 255] and clamped.

use std::path::Path;

use axon_core::Tensor;
use image::{DynamicImage, ImageBuffer};

/// Errors produced by the image adapter.
#[derive(Debug, thiserror::Error)]
pub enum ImageAdapterError {
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("unsupported channel count {0} (expected 1, 2, 3 or 4)")]
    UnsupportedChannels(usize),

    #[error("expected a (width, height, channels) tensor, got shape {0}")]
    NotAnImage(axon_core::Shape),

    #[error(transparent)]
    Model(#[from] axon_core::Error),
}

pub type Result<T> = std::result::Result<T, ImageAdapterError>;

/// Convert an image into a `(width, height, channels)` tensor in [0, 1].
pub fn tensor_from_image(img: &DynamicImage, channels: usize) -> Result<Tensor> {
    let (w, h, raw) = match channels {
        1 => {
            let buf = img.to_luma8();
            (buf.width(), buf.height(), buf.into_raw())
        }
        2 => {
            let buf = img.to_luma_alpha8();
            (buf.width(), buf.height(), buf.into_raw())
        }
        3 => {
            let buf = img.to_rgb8();
            (buf.width(), buf.height(), buf.into_raw())
        }
        4 => {
            let buf = img.to_rgba8();
            (buf.width(), buf.height(), buf.into_raw())
        }
        c => return Err(ImageAdapterError::UnsupportedChannels(c)),
    };
    let (w, h) = (w as usize, h as usize);
    let mut data = vec![0.0; w * h * channels];
    for y in 0..h {
        for x in 0..w {
            let src = (y * w + x) * channels;
            let dst = (x * h + y) * channels;
            for c in 0..channels {
                data[dst + c] = raw[src + c] as f64 / 255.0;
            }
        }
    }
    Ok(Tensor::new(data, (w, h, channels))?)
}

/// Convert a `(width, height, channels)` tensor back into an image.
pub fn tensor_to_image(tensor: &Tensor) -> Result<DynamicImage> {
    let &[w, h, channels] = tensor.dims() else {
        return Err(ImageAdapterError::NotAnImage(tensor.shape().clone()));
    };
    if !(1..=4).contains(&channels) {
        return Err(ImageAdapterError::UnsupportedChannels(channels));
    }
    let src = tensor.data();
    let mut raw = vec![0u8; w * h * channels];
    for y in 0..h {
        for x in 0..w {
            let from = (x * h + y) * channels;
            let to = (y * w + x) * channels;
            for c in 0..channels {
                raw[to + c] = (src[from + c] * 255.0).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    let (w, h) = (
        u32::try_from(w).map_err(|_| ImageAdapterError::NotAnImage(tensor.shape().clone()))?,
        u32::try_from(h).map_err(|_| ImageAdapterError::NotAnImage(tensor.shape().clone()))?,
    );
    let too_small = || ImageAdapterError::NotAnImage(tensor.shape().clone());
    Ok(match channels {
        1 => DynamicImage::ImageLuma8(ImageBuffer::from_raw(w, h, raw).ok_or_else(too_small)?),
        2 => DynamicImage::ImageLumaA8(ImageBuffer::from_raw(w, h, raw).ok_or_else(too_small)?),
        3 => DynamicImage::ImageRgb8(ImageBuffer::from_raw(w, h, raw).ok_or_else(too_small)?),
        _ => DynamicImage::ImageRgba8(ImageBuffer::from_raw(w, h, raw).ok_or_else(too_small)?),
    })
}

/// Decode an image file into a tensor with `channels` channels.
pub fn load_image(path: impl AsRef<Path>, channels: usize) -> Result<Tensor> {
    let img = image::open(path.as_ref())?;
    log::debug!("image: loaded {}", path.as_ref().display());
    tensor_from_image(&img, channels)
}

/// Encode a tensor to an image file; the format follows the extension.
pub fn save_image(tensor: &Tensor, path: impl AsRef<Path>) -> Result<()> {
    tensor_to_image(tensor)?.save(path.as_ref())?;
    log::debug!("image: saved {}", path.as_ref().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_layout_is_width_major() -> Result<()> {
        let mut img = GrayImage::new(3, 2);
        img.put_pixel(2, 0, Luma([255]));
        img.put_pixel(0, 1, Luma([51]));
        let t = tensor_from_image(&DynamicImage::ImageLuma8(img), 1)?;
        assert_eq!(t.dims(), &[3, 2, 1]);
        assert_eq!(t.get(&[2, 0, 0])?, 1.0);
        assert_eq!(t.get(&[0, 1, 0])?, 0.2);
        assert_eq!(t.get(&[1, 1, 0])?, 0.0);
        Ok(())
    }

    #[test]
    fn test_round_trip_and_clamping() -> Result<()> {
        let t = Tensor::from_slice(&[0.0, 0.5, 1.0, 2.0, -1.0, 0.25], (2, 1, 3))?;
        let img = tensor_to_image(&t)?;
        let rgb = img.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 128, 255]);
        assert_eq!(rgb.get_pixel(1, 0).0, [255, 0, 64]);
        let back = tensor_from_image(&img, 3)?;
        assert_eq!(back.dims(), &[2, 1, 3]);
        assert_eq!(back.get(&[1, 0, 0])?, 1.0);
        Ok(())
    }

    #[test]
    fn test_rejects_bad_shapes() -> Result<()> {
        assert!(matches!(
            tensor_to_image(&Tensor::zeros((2, 2))?),
            Err(ImageAdapterError::NotAnImage(_))
        ));
        assert!(matches!(
            tensor_to_image(&Tensor::zeros((2, 2, 5))?),
            Err(ImageAdapterError::UnsupportedChannels(5))
        ));
        let img = DynamicImage::ImageLuma8(GrayImage::new(1, 1));
        assert!(matches!(
            tensor_from_image(&img, 0),
            Err(ImageAdapterError::UnsupportedChannels(0))
        ));
        Ok(())
    }
}
