//! Image processing implementation
//!
//! Handles the actual image transformation: decode → fit → encode

use fast_image_resize::{FilterType, Image, PixelType, ResizeAlg, Resizer};
use image::io::Reader as ImageReader;
use image::{DynamicImage, Rgba, RgbaImage};
use std::io::Cursor;
use std::num::NonZeroU32;

use super::encoder::{EncodedImage, EncoderFactory};
use super::error::ImageError;
use super::transform::{FitMode, OutputFormat, TransformSpec};

/// Result of image processing
#[derive(Debug)]
pub struct ProcessedImage {
    /// The processed image data
    pub data: Vec<u8>,
    /// Content-Type header value
    pub content_type: &'static str,
    pub format: OutputFormat,
    /// Original dimensions (width, height)
    pub original_size: (u32, u32),
    /// Output dimensions (width, height)
    pub output_size: (u32, u32),
}

/// Decode, resize and encode as one collaborator of the request pipeline
pub trait ImageCodec: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, ImageError>;

    fn resize(&self, image: DynamicImage, spec: &TransformSpec) -> Result<DynamicImage, ImageError>;

    fn encode(
        &self,
        image: &DynamicImage,
        format: &str,
        quality: u8,
    ) -> Result<EncodedImage, ImageError>;

    /// Full transform; the output format is checked before any decoding work
    fn transform(&self, data: &[u8], spec: &TransformSpec) -> Result<ProcessedImage, ImageError> {
        let format: OutputFormat = spec.format.parse()?;

        let img = self.decode(data)?;
        let original_size = (img.width(), img.height());

        let img = if spec.resizes() {
            self.resize(img, spec)?
        } else {
            img
        };
        let output_size = (img.width(), img.height());

        let encoded = self.encode(&img, format.as_str(), spec.quality)?;

        Ok(ProcessedImage {
            data: encoded.data,
            content_type: encoded.content_type,
            format: encoded.format,
            original_size,
            output_size,
        })
    }
}

/// Default codec built on `image`, `fast_image_resize` and `webp`
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterCodec;

impl RasterCodec {
    pub fn new() -> Self {
        Self
    }
}

impl ImageCodec for RasterCodec {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, ImageError> {
        decode_image(data)
    }

    fn resize(&self, image: DynamicImage, spec: &TransformSpec) -> Result<DynamicImage, ImageError> {
        let requested = target_box(image.width(), image.height(), spec.width, spec.height);
        let (box_w, box_h) = clamp_box(requested, spec.max_output);
        apply_fit(image, box_w, box_h, spec.fit)
    }

    fn encode(
        &self,
        image: &DynamicImage,
        format: &str,
        quality: u8,
    ) -> Result<EncodedImage, ImageError> {
        let format: OutputFormat = format.parse()?;
        let encoder = EncoderFactory::create(format);
        let rgba = image.to_rgba8();
        encoder.encode(rgba.as_raw(), rgba.width(), rgba.height(), quality)
    }
}

/// Decode image data into a DynamicImage
fn decode_image(data: &[u8]) -> Result<DynamicImage, ImageError> {
    ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| ImageError::decode_failed(e.to_string()))?
        .decode()
        .map_err(|e| ImageError::decode_failed(e.to_string()))
}

/// Requested box, deriving a missing side from the source aspect ratio
fn target_box(src_w: u32, src_h: u32, width: Option<u32>, height: Option<u32>) -> (u32, u32) {
    match (width, height) {
        (Some(w), Some(h)) => (w, h),
        (Some(w), None) => (w, scale_side(src_h, w as f64 / src_w as f64)),
        (None, Some(h)) => (scale_side(src_w, h as f64 / src_h as f64), h),
        (None, None) => (src_w, src_h),
    }
}

fn scale_side(side: u32, ratio: f64) -> u32 {
    ((side as f64 * ratio).round() as u32).max(1)
}

/// Shrink the box proportionally until both sides fit `max`
fn clamp_box((box_w, box_h): (u32, u32), (max_w, max_h): (u32, u32)) -> (u32, u32) {
    if box_w <= max_w && box_h <= max_h {
        return (box_w, box_h);
    }
    let ratio = (max_w as f64 / box_w as f64).min(max_h as f64 / box_h as f64);
    (
        scale_side(box_w, ratio).min(max_w.max(1)),
        scale_side(box_h, ratio).min(max_h.max(1)),
    )
}

fn apply_fit(
    img: DynamicImage,
    box_w: u32,
    box_h: u32,
    fit: FitMode,
) -> Result<DynamicImage, ImageError> {
    let (src_w, src_h) = (img.width(), img.height());
    let ratio_w = box_w as f64 / src_w as f64;
    let ratio_h = box_h as f64 / src_h as f64;

    match fit {
        FitMode::Scale | FitMode::ScaleDown => {
            let mut ratio = ratio_w.min(ratio_h);
            if fit == FitMode::ScaleDown {
                ratio = ratio.min(1.0);
            }
            let (w, h) = (scale_side(src_w, ratio), scale_side(src_h, ratio));
            resize_image(&img, w, h)
        }
        FitMode::Cover => {
            // Centre-crop the source to the box aspect ratio, then resize, so
            // nothing larger than the box is ever allocated
            let crop_w = scale_side(src_h, box_w as f64 / box_h as f64).min(src_w);
            let crop_h = scale_side(src_w, box_h as f64 / box_w as f64).min(src_h);
            let cropped = img.crop_imm((src_w - crop_w) / 2, (src_h - crop_h) / 2, crop_w, crop_h);
            resize_image(&cropped, box_w, box_h)
        }
        FitMode::Contain => {
            let ratio = ratio_w.min(ratio_h);
            let w = scale_side(src_w, ratio).min(box_w);
            let h = scale_side(src_h, ratio).min(box_h);
            let resized = resize_image(&img, w, h)?.to_rgba8();

            let mut canvas = RgbaImage::from_pixel(box_w, box_h, Rgba([0, 0, 0, 0]));
            let x = (box_w - w) / 2;
            let y = (box_h - h) / 2;
            image::imageops::overlay(&mut canvas, &resized, x as i64, y as i64);
            Ok(DynamicImage::ImageRgba8(canvas))
        }
        FitMode::Crop => Ok(img.crop_imm(0, 0, box_w.min(src_w), box_h.min(src_h))),
    }
}

/// Resize image using fast-image-resize with Lanczos3 filter
fn resize_image(img: &DynamicImage, target_w: u32, target_h: u32) -> Result<DynamicImage, ImageError> {
    let src_w = img.width();
    let src_h = img.height();

    if src_w == target_w && src_h == target_h {
        return Ok(img.clone());
    }

    let src_width =
        NonZeroU32::new(src_w).ok_or_else(|| ImageError::resize_failed("Source width is 0"))?;
    let src_height =
        NonZeroU32::new(src_h).ok_or_else(|| ImageError::resize_failed("Source height is 0"))?;
    let dst_width =
        NonZeroU32::new(target_w).ok_or_else(|| ImageError::resize_failed("Target width is 0"))?;
    let dst_height =
        NonZeroU32::new(target_h).ok_or_else(|| ImageError::resize_failed("Target height is 0"))?;

    let src_image = Image::from_vec_u8(
        src_width,
        src_height,
        img.to_rgba8().into_raw(),
        PixelType::U8x4,
    )
    .map_err(|e| ImageError::resize_failed(format!("Failed to create source image: {:?}", e)))?;

    let mut dst_image = Image::new(dst_width, dst_height, PixelType::U8x4);

    let mut resizer = Resizer::new(ResizeAlg::Convolution(FilterType::Lanczos3));

    resizer
        .resize(&src_image.view(), &mut dst_image.view_mut())
        .map_err(|e| ImageError::resize_failed(format!("Resize operation failed: {:?}", e)))?;

    let rgba_image = RgbaImage::from_raw(target_w, target_h, dst_image.into_vec())
        .ok_or_else(|| ImageError::resize_failed("Failed to create output image buffer"))?;

    Ok(DynamicImage::ImageRgba8(rgba_image))
}
