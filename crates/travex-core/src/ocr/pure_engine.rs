//! OCR service using `pure-onnx-ocr`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use image::{DynamicImage, GenericImageView};
use tracing::{debug, info};

use crate::error::ServiceError;
use crate::layout::{reconstruct_lines, PositionedToken};
use crate::models::OcrConfig;
use crate::services::{OcrService, ProgressSink};

use super::worker::Worker;

const DETECTION_MODEL: &str = "det.onnx";
const RECOGNITION_MODEL: &str = "latin_rec.onnx";
const DICTIONARY: &str = "latin_dict.txt";

/// OCR engine backed by `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).
///
/// The engine lives on its own thread, so recognition suspends the caller
/// instead of blocking other in-flight work.
pub struct PureOcrService {
    worker: Worker<DynamicImage, Result<Vec<OcrBox>, ServiceError>>,
}

impl PureOcrService {
    /// Load the detection and recognition models from a directory.
    ///
    /// Missing model files make the service unavailable rather than broken,
    /// so callers can carry on without OCR.
    pub fn from_dir(model_dir: &Path, keep_unk: bool) -> Result<Self, ServiceError> {
        if let Some(missing) = Self::missing_models(model_dir).first() {
            return Err(ServiceError::Unavailable(format!(
                "OCR model {}",
                missing.display()
            )));
        }

        let det_path = model_dir.join(DETECTION_MODEL);
        let rec_path = model_dir.join(RECOGNITION_MODEL);
        let dict_path = model_dir.join(DICTIONARY);

        let worker = Worker::spawn(
            "travex-ocr",
            move || {
                pure_onnx_ocr::engine::OcrEngineBuilder::new()
                    .det_model_path(&det_path)
                    .rec_model_path(&rec_path)
                    .dictionary_path(&dict_path)
                    .build()
                    .map_err(|e| ServiceError::Ocr(format!("failed to load models: {}", e)))
            },
            move |engine, image| run(engine, &image, keep_unk),
        )?;

        info!("Loaded pure-onnx-ocr engine from {}", model_dir.display());
        Ok(Self { worker })
    }

    /// Model files absent from `model_dir`.
    pub fn missing_models(model_dir: &Path) -> Vec<PathBuf> {
        [DETECTION_MODEL, RECOGNITION_MODEL, DICTIONARY]
            .into_iter()
            .map(|file| model_dir.join(file))
            .filter(|path| !path.is_file())
            .collect()
    }

    pub fn from_config(config: &OcrConfig) -> Result<Self, ServiceError> {
        Self::from_dir(&config.model_dir, config.keep_unk)
    }
}

fn run(
    engine: &pure_onnx_ocr::engine::OcrEngine,
    image: &DynamicImage,
    keep_unk: bool,
) -> Result<Vec<OcrBox>, ServiceError> {
    let results = engine
        .run_from_image(image)
        .map_err(|e| ServiceError::Ocr(format!("pure-onnx-ocr: {}", e)))?;

    Ok(results
        .iter()
        .filter_map(|r| {
            let text = if keep_unk {
                r.text.clone()
            } else {
                r.text.replace("[UNK]", " ")
            };
            OcrBox::from_points(
                r.bounding_box
                    .exterior()
                    .coords()
                    .map(|c| (c.x as f32, c.y as f32)),
                text,
            )
        })
        .collect())
}

impl OcrService for PureOcrService {
    async fn recognize(
        &self,
        image: &DynamicImage,
        progress: &dyn ProgressSink,
    ) -> Result<String, ServiceError> {
        let start = Instant::now();
        let (width, height) = image.dimensions();
        debug!("Running OCR on {}x{} image", width, height);

        progress.on_progress("Detecting text regions");
        let boxes = self.worker.call(image.clone()).await??;
        progress.on_progress(&format!("Recognized {} text regions", boxes.len()));

        let text = reading_order(boxes);
        info!(
            "OCR complete: {} characters in {}ms",
            text.len(),
            start.elapsed().as_millis()
        );
        Ok(text)
    }
}

/// A recognized text region in image coordinates (origin top left).
#[derive(Debug, Clone, PartialEq)]
struct OcrBox {
    left: f32,
    top: f32,
    bottom: f32,
    text: String,
}

impl OcrBox {
    fn from_points(points: impl Iterator<Item = (f32, f32)>, text: String) -> Option<Self> {
        let (mut left, mut top, mut bottom) = (f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY);
        for (x, y) in points {
            left = left.min(x);
            top = top.min(y);
            bottom = bottom.max(y);
        }
        left.is_finite().then_some(Self {
            left,
            top,
            bottom,
            text,
        })
    }

    fn center_y(&self) -> f32 {
        (self.top + self.bottom) / 2.0
    }
}

/// Join boxes into lines, top to bottom and left to right.
///
/// Boxes whose vertical centers are within half the median box height share
/// a line. Image `y` grows downwards, so it is negated for the line builder.
fn reading_order(boxes: Vec<OcrBox>) -> String {
    if boxes.is_empty() {
        return String::new();
    }

    let mut heights: Vec<f32> = boxes.iter().map(|b| b.bottom - b.top).collect();
    heights.sort_by(f32::total_cmp);
    let tolerance = (heights[heights.len() / 2] / 2.0).max(1.0);

    let tokens: Vec<PositionedToken> = boxes
        .into_iter()
        .map(|b| PositionedToken::new(b.left, -b.center_y(), b.text))
        .collect();
    reconstruct_lines(&tokens, tolerance).text()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ocr_box(left: f32, top: f32, height: f32, text: &str) -> OcrBox {
        OcrBox {
            left,
            top,
            bottom: top + height,
            text: text.to_string(),
        }
    }

    #[test]
    fn test_reading_order() {
        let boxes = vec![
            ocr_box(300.0, 52.0, 20.0, "£2.80"),
            ocr_box(20.0, 10.0, 20.0, "Tuesday 14 October 2025"),
            ocr_box(20.0, 50.0, 20.0, "Bus journey"),
            ocr_box(20.0, 90.0, 20.0, "Daily cap [UNK]"),
        ];
        assert_eq!(
            reading_order(boxes),
            "Tuesday 14 October 2025\nBus journey £2.80\nDaily cap [UNK]"
        );
        assert_eq!(reading_order(Vec::new()), "");
    }

    #[test]
    fn test_box_from_polygon_points() {
        let points = [(10.0, 5.0), (40.0, 6.0), (40.0, 20.0), (9.0, 19.0)];
        let b = OcrBox::from_points(points.into_iter(), "Bus".to_string()).unwrap();
        assert_eq!(b, OcrBox { left: 9.0, top: 5.0, bottom: 20.0, text: "Bus".to_string() });
        assert!(OcrBox::from_points(std::iter::empty(), String::new()).is_none());
    }

    #[test]
    fn test_missing_models_are_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DICTIONARY), "a\nb\n").unwrap();

        assert_eq!(
            PureOcrService::missing_models(dir.path()),
            vec![
                dir.path().join(DETECTION_MODEL),
                dir.path().join(RECOGNITION_MODEL),
            ]
        );
        assert!(matches!(
            PureOcrService::from_dir(dir.path(), false),
            Err(ServiceError::Unavailable(_))
        ));
    }
}
