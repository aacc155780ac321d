//! Face-centered re-crop of reference photos.

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use tracing::warn;

use crate::error::PipelineError;
use crate::photos::PhotoStore;

use super::FaceBox;

/// Pixel rectangle of the margin-padded crop, clamped to the source bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Expand the face box by the margin ratio and clamp to the image bounds.
/// The margin is asymmetric: half the ratio horizontally, the full ratio
/// vertically. Truncates silently at the edges.
pub fn crop_region(
    face: &FaceBox,
    image_width: u32,
    image_height: u32,
    margin_ratio: f64,
) -> CropRegion {
    let margin_x = (face.width as f64 * margin_ratio * 0.5) as u32;
    let margin_y = (face.height as f64 * margin_ratio) as u32;

    let x_start = face.x.saturating_sub(margin_x);
    let y_start = face.y.saturating_sub(margin_y);
    let x_end = (face.x + face.width).saturating_add(margin_x).min(image_width);
    let y_end = (face.y + face.height)
        .saturating_add(margin_y)
        .min(image_height);

    CropRegion {
        x: x_start,
        y: y_start,
        width: x_end - x_start,
        height: y_end - y_start,
    }
}

/// Crop the image around the face, archive the pre-crop original to the
/// store's secondary slot, and return the crop re-encoded as JPEG.
///
/// The archive write is an optional side effect: failures are logged and do
/// not fail the crop.
pub fn crop_to_face(
    image: &DynamicImage,
    face: &FaceBox,
    id: i64,
    margin_ratio: f64,
    jpeg_quality: u8,
    store: &dyn PhotoStore,
) -> Result<Vec<u8>, PipelineError> {
    let region = crop_region(face, image.width(), image.height(), margin_ratio);
    let cropped = image.crop_imm(region.x, region.y, region.width, region.height);

    if let Err(e) = store.archive_original(id, image) {
        warn!(id, error = %e, "failed to archive pre-crop original");
    }

    encode_jpeg(&cropped, jpeg_quality)
}

pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, PipelineError> {
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    image
        .to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| PipelineError::Encode(e.to_string()))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};
    use std::sync::Mutex;

    struct NullStore {
        archived: Mutex<Vec<i64>>,
    }

    impl NullStore {
        fn new() -> Self {
            Self {
                archived: Mutex::new(Vec::new()),
            }
        }
    }

    impl PhotoStore for NullStore {
        fn load_photo(&self, id: i64) -> Result<Vec<u8>, PipelineError> {
            Err(PipelineError::PhotoMissing(id))
        }

        fn archive_original(&self, id: i64, _image: &DynamicImage) -> Result<(), PipelineError> {
            self.archived.lock().unwrap().push(id);
            Ok(())
        }
    }

    fn face(x: u32, y: u32, width: u32, height: u32) -> FaceBox {
        FaceBox {
            x,
            y,
            width,
            height,
        }
    }

    fn gray_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_pixel(width, height, Luma([128u8])))
    }

    #[test]
    fn region_applies_asymmetric_margins() {
        // 40x40 face centered in 200x200, margin 0.40:
        // horizontal margin = 40 * 0.40 * 0.5 = 8, vertical = 40 * 0.40 = 16
        let region = crop_region(&face(80, 80, 40, 40), 200, 200, 0.40);
        assert_eq!(
            region,
            CropRegion {
                x: 72,
                y: 64,
                width: 56,
                height: 72
            }
        );
    }

    #[test]
    fn region_truncates_at_image_edges() {
        // Face flush against the top-left corner
        let region = crop_region(&face(0, 0, 40, 40), 100, 100, 0.40);
        assert_eq!(region.x, 0);
        assert_eq!(region.y, 0);
        assert_eq!(region.width, 48);
        assert_eq!(region.height, 56);

        // Face flush against the bottom-right corner
        let region = crop_region(&face(60, 60, 40, 40), 100, 100, 0.40);
        assert!(region.x + region.width <= 100);
        assert!(region.y + region.height <= 100);
    }

    #[test]
    fn region_is_always_inside_bounds() {
        for (x, y, w, h) in [(0, 0, 30, 30), (70, 0, 30, 99), (0, 70, 99, 30), (35, 35, 30, 30)] {
            let region = crop_region(&face(x, y, w, h), 100, 100, 0.40);
            assert!(region.x + region.width <= 100, "region = {region:?}");
            assert!(region.y + region.height <= 100, "region = {region:?}");
            assert!(region.width > 0 && region.height > 0);
        }
    }

    #[test]
    fn crop_returns_jpeg_and_archives_original() {
        let store = NullStore::new();
        let image = gray_image(200, 200);
        let bytes = crop_to_face(&image, &face(80, 80, 40, 40), 9, 0.40, 90, &store).unwrap();

        // JPEG SOI marker
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(*store.archived.lock().unwrap(), vec![9]);
    }
}
