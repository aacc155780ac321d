//! UltraFace detection backend (ONNX Runtime).

use anyhow::{anyhow, Result};
use image::{DynamicImage, GenericImageView};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};

use crate::error::PipelineError;

use super::{FaceBox, FaceLocator};

/// Face detection model (UltraFace - lightweight and fast)
static DETECTION_MODEL: OnceLock<Mutex<Session>> = OnceLock::new();

const INPUT_WIDTH: u32 = 320;
const INPUT_HEIGHT: u32 = 240;
const CONFIDENCE_THRESHOLD: f32 = 0.7;
const NMS_THRESHOLD: f32 = 0.3;

/// Smallest accepted face, carried over from the legacy detector's
/// 30×30 px floor.
const MIN_FACE_SIZE_PX: u32 = 30;

/// Get the models directory path
fn models_dir() -> Result<PathBuf> {
    let data_dir =
        dirs::data_local_dir().ok_or_else(|| anyhow!("Could not find local data directory"))?;
    let models_dir = data_dir.join("facesync").join("models");
    std::fs::create_dir_all(&models_dir)?;
    Ok(models_dir)
}

/// Download a model file if it doesn't exist
fn ensure_model(filename: &str, url: &str) -> Result<PathBuf> {
    let models_dir = models_dir()?;
    let model_path = models_dir.join(filename);

    if !model_path.exists() {
        tracing::info!(model = %filename, "Downloading model...");
        let response = ureq::get(url)
            .timeout(std::time::Duration::from_secs(120))
            .call()
            .map_err(|e| anyhow!("Failed to download model: {}", e))?;

        let mut file = std::fs::File::create(&model_path)?;
        std::io::copy(&mut response.into_reader(), &mut file)?;
        tracing::info!(model = %filename, path = ?model_path, "Model downloaded");
    }

    Ok(model_path)
}

fn init_detection_model() -> Result<()> {
    if DETECTION_MODEL.get().is_some() {
        return Ok(());
    }

    // UltraFace model for detection (320x240 version - fast)
    let detection_model_path = ensure_model(
        "ultraface-320.onnx",
        "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-RFB-320.onnx"
    )?;

    let detection_session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| anyhow!("{e}"))?
        .with_intra_threads(4)
        .map_err(|e| anyhow!("{e}"))?
        .commit_from_file(&detection_model_path)?;

    let _ = DETECTION_MODEL.set(Mutex::new(detection_session));
    Ok(())
}

/// Face locator backed by a shared lazily-initialized UltraFace session.
/// Inference is serialized behind the session mutex; detection itself is
/// deterministic for a fixed image.
#[derive(Default)]
pub struct UltraFaceDetector;

impl UltraFaceDetector {
    pub fn new() -> Self {
        Self
    }

    fn detect_impl(&self, img: &DynamicImage) -> Result<Vec<FaceBox>> {
        if DETECTION_MODEL.get().is_none() {
            init_detection_model()?;
        }

        let mut session = DETECTION_MODEL
            .get()
            .ok_or_else(|| anyhow!("Detection model not initialized"))?
            .lock()
            .map_err(|e| anyhow!("Failed to lock detection model: {}", e))?;

        run_ultraface_detection(&mut session, img)
    }
}

impl FaceLocator for UltraFaceDetector {
    fn detect(&self, image: &DynamicImage) -> Result<Vec<FaceBox>, PipelineError> {
        self.detect_impl(image)
            .map_err(|e| PipelineError::Detector(e.to_string()))
    }
}

/// Run UltraFace and map its anchors back to clamped pixel boxes.
fn run_ultraface_detection(session: &mut Session, img: &DynamicImage) -> Result<Vec<FaceBox>> {
    let (orig_width, orig_height) = img.dimensions();

    // Resize image to model input size (use Triangle/bilinear for speed)
    let resized = img.resize_exact(
        INPUT_WIDTH,
        INPUT_HEIGHT,
        image::imageops::FilterType::Triangle,
    );
    let rgb = resized.to_rgb8();

    // Convert to tensor (NCHW format, normalized)
    let mut input_data = vec![0.0f32; (3 * INPUT_HEIGHT * INPUT_WIDTH) as usize];

    for y in 0..INPUT_HEIGHT as usize {
        for x in 0..INPUT_WIDTH as usize {
            let pixel = rgb.get_pixel(x as u32, y as u32);
            let idx = y * INPUT_WIDTH as usize + x;
            input_data[idx] = (pixel[0] as f32 - 127.0) / 128.0; // R
            input_data[INPUT_HEIGHT as usize * INPUT_WIDTH as usize + idx] =
                (pixel[1] as f32 - 127.0) / 128.0; // G
            input_data[2 * INPUT_HEIGHT as usize * INPUT_WIDTH as usize + idx] =
                (pixel[2] as f32 - 127.0) / 128.0; // B
        }
    }

    let input_tensor = Tensor::from_array((
        [1usize, 3, INPUT_HEIGHT as usize, INPUT_WIDTH as usize],
        input_data.into_boxed_slice(),
    ))?;

    let outputs = session.run(ort::inputs!["input" => input_tensor])?;

    // Parse outputs - UltraFace outputs: scores and boxes
    let scores_value = outputs
        .get("scores")
        .ok_or_else(|| anyhow!("No scores output"))?;
    let boxes_value = outputs
        .get("boxes")
        .ok_or_else(|| anyhow!("No boxes output"))?;

    let (scores_shape, scores_data) = scores_value.try_extract_tensor::<f32>()?;
    let (_boxes_shape, boxes_data) = boxes_value.try_extract_tensor::<f32>()?;

    let mut candidates = Vec::new();

    // scores shape: [1, num_anchors, 2] (background, face)
    // boxes shape: [1, num_anchors, 4] (x1, y1, x2, y2 normalized)
    let num_anchors = scores_shape[1] as usize;

    for i in 0..num_anchors {
        let confidence = scores_data[i * 2 + 1]; // Face confidence (class 1)

        if confidence > CONFIDENCE_THRESHOLD {
            let x1 = (boxes_data[i * 4] * orig_width as f32) as i64;
            let y1 = (boxes_data[i * 4 + 1] * orig_height as f32) as i64;
            let x2 = (boxes_data[i * 4 + 2] * orig_width as f32) as i64;
            let y2 = (boxes_data[i * 4 + 3] * orig_height as f32) as i64;

            if let Some(bbox) = clamp_box(x1, y1, x2, y2, orig_width, orig_height) {
                candidates.push((bbox, confidence));
            }
        }
    }

    // Apply non-maximum suppression
    let kept = nms(candidates, NMS_THRESHOLD);

    Ok(kept.into_iter().map(|(bbox, _)| bbox).collect())
}

/// Clamp raw pixel coordinates into image bounds; drops boxes that collapse
/// or fall under the minimum face size.
fn clamp_box(x1: i64, y1: i64, x2: i64, y2: i64, img_width: u32, img_height: u32) -> Option<FaceBox> {
    let x1 = x1.clamp(0, img_width as i64) as u32;
    let y1 = y1.clamp(0, img_height as i64) as u32;
    let x2 = x2.clamp(0, img_width as i64) as u32;
    let y2 = y2.clamp(0, img_height as i64) as u32;

    let width = x2.saturating_sub(x1);
    let height = y2.saturating_sub(y1);
    if width < MIN_FACE_SIZE_PX || height < MIN_FACE_SIZE_PX {
        return None;
    }

    Some(FaceBox {
        x: x1,
        y: y1,
        width,
        height,
    })
}

/// Non-maximum suppression to remove overlapping detections
fn nms(mut boxes: Vec<(FaceBox, f32)>, threshold: f32) -> Vec<(FaceBox, f32)> {
    // Sort by confidence descending
    boxes.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; boxes.len()];

    for i in 0..boxes.len() {
        if suppressed[i] {
            continue;
        }

        keep.push(boxes[i]);

        for j in (i + 1)..boxes.len() {
            if suppressed[j] {
                continue;
            }

            let iou = compute_iou(&boxes[i].0, &boxes[j].0);
            if iou > threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Compute Intersection over Union between two bounding boxes
fn compute_iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let intersection = (x2.saturating_sub(x1) as u64 * y2.saturating_sub(y1) as u64) as f32;
    let area_a = a.area() as f32;
    let area_b = b.area() as f32;
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}
