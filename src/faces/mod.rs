pub mod crop;
pub mod detector;
pub mod quality;

pub use detector::UltraFaceDetector;
pub use quality::QualityResult;

use image::DynamicImage;

use crate::error::PipelineError;

/// Axis-aligned bounding box of a detected face, in image pixel coordinates.
/// Always non-empty and fully inside the image it was detected in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceBox {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Opaque face-detection capability. Implementations must be deterministic
/// for a fixed image and return boxes in a stable order; "no face found" is
/// an empty result, not an error.
pub trait FaceLocator: Send + Sync {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceBox>, PipelineError>;
}

/// The largest face by pixel area; ties keep the earliest detection.
pub fn primary_face(faces: &[FaceBox]) -> Option<&FaceBox> {
    let mut best: Option<&FaceBox> = None;
    for face in faces {
        if best.map_or(true, |b| face.area() > b.area()) {
            best = Some(face);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_face_picks_largest() {
        let faces = [
            FaceBox {
                x: 0,
                y: 0,
                width: 10,
                height: 10,
            },
            FaceBox {
                x: 5,
                y: 5,
                width: 30,
                height: 30,
            },
            FaceBox {
                x: 50,
                y: 50,
                width: 20,
                height: 20,
            },
        ];
        assert_eq!(primary_face(&faces), Some(&faces[1]));
    }

    #[test]
    fn primary_face_tie_keeps_first() {
        let faces = [
            FaceBox {
                x: 0,
                y: 0,
                width: 20,
                height: 20,
            },
            FaceBox {
                x: 40,
                y: 40,
                width: 20,
                height: 20,
            },
        ];
        assert_eq!(primary_face(&faces), Some(&faces[0]));
    }

    #[test]
    fn primary_face_empty_is_none() {
        assert_eq!(primary_face(&[]), None);
    }
}
