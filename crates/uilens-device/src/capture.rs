//! Screenshot decoding and encoding helpers.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Rgb, RgbImage};

use uilens_core::{LensError, Rect, Result, WindowSize};

/// Placeholder color for a blank capture.
const BLANK_RGB: [u8; 3] = [220, 220, 220];

/// Decode raw capture bytes (PNG from both adb and WebDriverAgent).
pub fn decode(raw: &[u8], platform: &str) -> Result<DynamicImage> {
    if raw.is_empty() {
        return Err(LensError::sdk(platform, "screen capture returned no data"));
    }
    Ok(image::load_from_memory(raw)?)
}

/// A solid image sized like the device screen.
pub fn blank_screenshot(size: WindowSize) -> DynamicImage {
    let img = RgbImage::from_pixel(size.width.max(1), size.height.max(1), Rgb(BLANK_RGB));
    DynamicImage::ImageRgb8(img)
}

pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    encoder.encode_image(&img.to_rgb8())?;
    Ok(buf)
}

pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png)?;
    Ok(buf.into_inner())
}

/// Crop `bounds` out of `img`, clamped to the image edges.
pub fn crop(img: &DynamicImage, bounds: Rect) -> Result<DynamicImage> {
    let x = bounds.x.max(0) as u32;
    let y = bounds.y.max(0) as u32;
    if x >= img.width() || y >= img.height() || bounds.width <= 0 || bounds.height <= 0 {
        return Err(LensError::invalid_argument(
            "bounds",
            format!(
                "{}x{}+{}+{} lies outside the {}x{} screenshot",
                bounds.width,
                bounds.height,
                bounds.x,
                bounds.y,
                img.width(),
                img.height()
            ),
        ));
    }
    let width = (bounds.width as u32).min(img.width() - x);
    let height = (bounds.height as u32).min(img.height() - y);
    Ok(img.crop_imm(x, y, width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_matches_window_size() {
        let img = blank_screenshot(WindowSize {
            width: 1080,
            height: 2400,
        });
        assert_eq!((img.width(), img.height()), (1080, 2400));
    }

    #[test]
    fn test_decode_empty_is_sdk_error() {
        assert!(matches!(
            decode(&[], "android"),
            Err(LensError::Sdk { .. })
        ));
        assert!(matches!(
            decode(b"not an image", "android"),
            Err(LensError::Image(_))
        ));
    }

    #[test]
    fn test_png_and_jpeg_encode() {
        let img = blank_screenshot(WindowSize {
            width: 8,
            height: 4,
        });
        let png = encode_png(&img).unwrap();
        let back = decode(&png, "android").unwrap();
        assert_eq!(back.width(), 8);
        let jpeg = encode_jpeg(&img, 70).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_crop_clamps_to_edges() {
        let img = blank_screenshot(WindowSize {
            width: 100,
            height: 50,
        });
        let part = crop(
            &img,
            Rect {
                x: 90,
                y: 40,
                width: 30,
                height: 30,
            },
        )
        .unwrap();
        assert_eq!((part.width(), part.height()), (10, 10));

        let outside = Rect {
            x: 200,
            y: 0,
            width: 10,
            height: 10,
        };
        assert!(crop(&img, outside).is_err());
    }
}
