//! Composite photo-quality scoring.
//!
//! The sub-score formulas and constants reproduce the historical scoring
//! semantics; scores written to the cardholder system must stay comparable
//! across versions, so treat these as fixed tunables.

use image::{DynamicImage, GrayImage};
use imageproc::filter::laplacian_filter;

use super::{primary_face, FaceBox};

/// Maximum points for the face-size sub-score.
const SIZE_POINTS_MAX: f64 = 35.0;
/// Maximum points for the sharpness sub-score.
const SHARPNESS_POINTS_MAX: f64 = 35.0;
/// Maximum points for the illumination sub-score.
const ILLUMINATION_POINTS_MAX: f64 = 30.0;
/// Face-to-image area ratio band rewarded as well framed.
const IDEAL_RATIO_MIN: f64 = 0.30;
const IDEAL_RATIO_MAX: f64 = 0.50;
/// Mean luma treated as well exposed (mid-gray).
const TARGET_LUMA: f64 = 128.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityResult {
    /// Composite score, clamped to `[0, 100]`.
    pub score: f64,
    pub face_count: usize,
}

/// Score a photo against its detected faces. With no faces the result is
/// `{0, 0}` and the image is not touched.
pub fn score_photo(image: &DynamicImage, faces: &[FaceBox]) -> QualityResult {
    let Some(face) = primary_face(faces) else {
        return QualityResult {
            score: 0.0,
            face_count: 0,
        };
    };

    let face_crop = image
        .crop_imm(face.x, face.y, face.width, face.height)
        .to_luma8();

    let size = size_score(face, image.width(), image.height());
    let sharpness = sharpness_score(&face_crop);
    let illumination = illumination_score(&face_crop);

    QualityResult {
        score: (size + sharpness + illumination).min(100.0),
        face_count: faces.len(),
    }
}

/// 0–35 points from the face-to-image area ratio. Small faces ramp up
/// linearly, the 30–50% band is rewarded, oversized faces are penalized.
fn size_score(face: &FaceBox, image_width: u32, image_height: u32) -> f64 {
    let image_area = image_width as f64 * image_height as f64;
    let ratio = face.area() as f64 / image_area;

    let points = if ratio < IDEAL_RATIO_MIN {
        ratio * 100.0
    } else if ratio > IDEAL_RATIO_MAX {
        (SIZE_POINTS_MAX - (ratio - IDEAL_RATIO_MAX) * 150.0).max(0.0)
    } else {
        (25.0 + (ratio - IDEAL_RATIO_MIN) * 50.0).min(SIZE_POINTS_MAX)
    };

    points.clamp(0.0, SIZE_POINTS_MAX)
}

/// 0–35 points from the variance of the Laplacian over the face crop. The
/// raw variance is unbounded and heavy-tailed; `ln(1 + v)` compresses it so
/// one sharp outlier cannot dominate.
fn sharpness_score(face_crop: &GrayImage) -> f64 {
    (laplacian_variance(face_crop).ln_1p() * 10.0).min(SHARPNESS_POINTS_MAX)
}

fn laplacian_variance(gray: &GrayImage) -> f64 {
    let edges = laplacian_filter(gray);
    let count = edges.pixels().len();
    if count == 0 {
        return 0.0;
    }

    let mean = edges.pixels().map(|p| p[0] as f64).sum::<f64>() / count as f64;
    edges
        .pixels()
        .map(|p| {
            let d = p[0] as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / count as f64
}

/// 0–30 points from mean luma, with a quadratic penalty around mid-gray.
fn illumination_score(face_crop: &GrayImage) -> f64 {
    let count = face_crop.pixels().len();
    if count == 0 {
        return 0.0;
    }

    let mean = face_crop.pixels().map(|p| p[0] as f64).sum::<f64>() / count as f64;
    (ILLUMINATION_POINTS_MAX - (TARGET_LUMA - mean).powi(2) / 50.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};

    fn gray_image(width: u32, height: u32, luma: u8) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_pixel(width, height, Luma([luma])))
    }

    fn checkerboard(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(ImageBuffer::from_fn(width, height, |x, y| {
            if (x + y) % 2 == 0 {
                Luma([0u8])
            } else {
                Luma([255u8])
            }
        }))
    }

    fn face(width: u32, height: u32) -> FaceBox {
        FaceBox {
            x: 0,
            y: 0,
            width,
            height,
        }
    }

    #[test]
    fn no_face_scores_zero() {
        let result = score_photo(&gray_image(100, 100, 128), &[]);
        assert_eq!(result.score, 0.0);
        assert_eq!(result.face_count, 0);
    }

    #[test]
    fn size_score_small_face_ramps_linearly() {
        // 10x10 face on 100x100 image: ratio 0.01 -> 1.0 points
        let points = size_score(&face(10, 10), 100, 100);
        assert!((points - 1.0).abs() < 1e-9);
    }

    #[test]
    fn size_score_reward_zone_is_monotone_and_bounded() {
        // ratio sweeps 0.30..=0.50 with height fixed at 50
        let mut previous = f64::NEG_INFINITY;
        for width in 60..=100 {
            let points = size_score(&face(width, 50), 100, 100);
            assert!(points >= 25.0 && points <= 35.0, "points = {points}");
            assert!(points >= previous);
            previous = points;
        }
    }

    #[test]
    fn size_score_penalizes_oversized_faces() {
        // Full-frame face: ratio 1.0 -> 35 - 0.5*150 < 0 -> clamped to 0
        assert_eq!(size_score(&face(100, 100), 100, 100), 0.0);
        // ratio 0.6 -> 35 - 15 = 20
        let points = size_score(&face(60, 100), 100, 100);
        assert!((points - 20.0).abs() < 1e-9);
    }

    #[test]
    fn uniform_crop_has_zero_sharpness() {
        let crop = gray_image(50, 50, 128).to_luma8();
        assert_eq!(sharpness_score(&crop), 0.0);
    }

    #[test]
    fn checkerboard_crop_caps_sharpness() {
        let crop = checkerboard(50, 50).to_luma8();
        assert_eq!(sharpness_score(&crop), SHARPNESS_POINTS_MAX);
    }

    #[test]
    fn mid_gray_crop_maxes_illumination() {
        let crop = gray_image(50, 50, 128).to_luma8();
        assert_eq!(illumination_score(&crop), ILLUMINATION_POINTS_MAX);
    }

    #[test]
    fn dark_crop_zeroes_illumination() {
        let crop = gray_image(50, 50, 20).to_luma8();
        assert_eq!(illumination_score(&crop), 0.0);
    }

    #[test]
    fn composite_stays_in_bounds() {
        // Sharp, well-framed, mid-gray checkerboard pushes every sub-score
        // toward its cap; the composite must still be <= 100.
        let image = checkerboard(100, 100);
        let faces = [face(63, 63)];
        let result = score_photo(&image, &faces);
        assert!(result.score >= 0.0 && result.score <= 100.0);
        assert_eq!(result.face_count, 1);

        let dim = gray_image(100, 100, 10);
        let result = score_photo(&dim, &faces);
        assert!(result.score >= 0.0 && result.score <= 100.0);
    }

    #[test]
    fn well_framed_gray_face_scores_size_plus_illumination() {
        // 63x63 on 100x100: ratio ~0.397 -> size ~29.8; uniform mid-gray:
        // sharpness 0, illumination 30.
        let image = gray_image(100, 100, 128);
        let result = score_photo(&image, &[face(63, 63)]);
        assert!((result.score - 59.845).abs() < 0.01, "score = {}", result.score);
    }
}
