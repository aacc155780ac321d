//! Slot-addressed photo directories of the cardholder system.
//!
//! The primary slot (`{id}_1.jpg`) is read for scoring; the secondary slot
//! (`{id}_2.jpg`) receives pre-crop originals before a re-crop is uploaded.

use image::DynamicImage;
use std::io::Cursor;
use std::path::PathBuf;

use crate::config::PhotoStoreConfig;
use crate::error::PipelineError;

pub trait PhotoStore: Send + Sync {
    /// Raw bytes of the primary photo for a cardholder.
    fn load_photo(&self, id: i64) -> Result<Vec<u8>, PipelineError>;

    /// Archive the pre-crop original to the secondary slot.
    fn archive_original(&self, id: i64, image: &DynamicImage) -> Result<(), PipelineError>;
}

pub struct DirPhotoStore {
    primary_dir: PathBuf,
    archive_dir: PathBuf,
}

impl DirPhotoStore {
    pub fn new(config: &PhotoStoreConfig) -> Self {
        Self {
            primary_dir: config.primary_dir.clone(),
            archive_dir: config.archive_dir.clone(),
        }
    }
}

impl PhotoStore for DirPhotoStore {
    fn load_photo(&self, id: i64) -> Result<Vec<u8>, PipelineError> {
        let path = self.primary_dir.join(format!("{id}_1.jpg"));
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PipelineError::PhotoMissing(id))
            }
            Err(e) => Err(PipelineError::Io(e)),
        }
    }

    fn archive_original(&self, id: i64, image: &DynamicImage) -> Result<(), PipelineError> {
        std::fs::create_dir_all(&self.archive_dir)?;
        let path = self.archive_dir.join(format!("{id}_2.jpg"));
        // JPEG output: flatten any alpha channel first
        DynamicImage::ImageRgb8(image.to_rgb8())
            .save(&path)
            .map_err(|e| PipelineError::Encode(e.to_string()))
    }
}

/// Decode photo bytes, normalizing EXIF orientation so detection and
/// cropping see the image upright.
pub fn decode_photo(bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
    let image =
        image::load_from_memory(bytes).map_err(|e| PipelineError::Decode(e.to_string()))?;

    Ok(match exif_rotation(bytes) {
        90 => image.rotate90(),
        180 => image.rotate180(),
        270 => image.rotate270(),
        _ => image,
    })
}

/// Read EXIF orientation from the raw file bytes and return rotation degrees.
fn exif_rotation(bytes: &[u8]) -> i32 {
    let mut reader = Cursor::new(bytes);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(e) => e,
        Err(_) => return 0,
    };

    if let Some(field) = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY) {
        if let exif::Value::Short(ref v) = field.value {
            if let Some(&orientation) = v.first() {
                return match orientation {
                    6 => 90,  // Rotate 90 CW
                    3 => 180, // Rotate 180
                    8 => 270, // Rotate 90 CCW
                    _ => 0,
                };
            }
        }
    }

    0
}
