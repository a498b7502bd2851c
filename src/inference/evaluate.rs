//! Directory evaluation
//!
//! Runs the predictor over a labeled directory laid out as
//!
//! ```text
//! root/
//! ├── NORMAL/
//! │   ├── IM-0001-0001.jpeg
//! │   └── ...
//! └── PNEUMONIA/
//!     └── ...
//! ```
//!
//! and reports binary classification metrics.

use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use walkdir::WalkDir;

use super::decision::Label;
use super::predictor::Predictor;
use super::preprocess::is_allowed_extension;
use crate::utils::error::{Error, Result};
use crate::utils::metrics::{BinaryConfusionMatrix, BinaryMetrics};

/// An image that could not be scored
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedSample {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of evaluating a labeled directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub data_dir: PathBuf,
    pub threshold: f32,
    pub metrics: BinaryMetrics,
    pub failures: Vec<FailedSample>,
    pub total_time_secs: f64,
}

/// Collect `(path, label)` pairs from the `NORMAL/` and `PNEUMONIA/` subfolders
pub fn collect_labeled_images(root: &Path) -> Result<Vec<(PathBuf, Label)>> {
    if !root.is_dir() {
        return Err(Error::PathNotFound(root.to_path_buf()));
    }

    let mut samples = Vec::new();
    for label in Label::ALL {
        let class_dir = root.join(label.as_str());
        if !class_dir.is_dir() {
            warn!("Class directory missing: {:?}", class_dir);
            continue;
        }

        let mut class_samples: Vec<PathBuf> = WalkDir::new(&class_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .map(is_allowed_extension)
                    .unwrap_or(false)
            })
            .collect();
        class_samples.sort();

        info!("Class '{}': {} images", label, class_samples.len());
        samples.extend(class_samples.into_iter().map(|p| (p, label)));
    }

    Ok(samples)
}

/// Predict every labeled image under `root` and compute metrics
pub fn evaluate_directory(
    predictor: &Predictor,
    root: &Path,
    show_progress: bool,
) -> Result<EvaluationReport> {
    let samples = collect_labeled_images(root)?;
    if samples.is_empty() {
        return Err(Error::Config(format!(
            "no NORMAL/ or PNEUMONIA/ images found under {:?}",
            root
        )));
    }

    let pb = if show_progress {
        let pb = ProgressBar::new(samples.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let start = Instant::now();
    let mut matrix = BinaryConfusionMatrix::default();
    let mut failures = Vec::new();

    for (path, actual) in &samples {
        match predictor.predict_file(path) {
            Ok(prediction) => matrix.record(prediction.label, *actual),
            Err(e) => {
                warn!("Skipping {:?}: {}", path, e);
                failures.push(FailedSample {
                    path: path.clone(),
                    error: e.to_string(),
                });
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(EvaluationReport {
        data_dir: root.to_path_buf(),
        threshold: predictor.threshold().value(),
        metrics: BinaryMetrics::from_confusion_matrix(matrix),
        failures,
        total_time_secs: start.elapsed().as_secs_f64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{ImageTensor, ScoreModel};
    use image::{DynamicImage, ImageFormat};
    use std::sync::Arc;

    /// Scores bright images as PNEUMONIA and dark ones as NORMAL
    struct BrightnessModel;

    impl ScoreModel for BrightnessModel {
        fn score(&self, image: &ImageTensor) -> Result<f32> {
            let data = image.data();
            Ok(data.iter().sum::<f32>() / data.len() as f32)
        }

        fn describe(&self) -> String {
            "brightness".to_string()
        }
    }

    fn write_image(path: &Path, value: u8) {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(40, 40, image::Rgb([value; 3])));
        img.save_with_format(path, ImageFormat::Png).unwrap();
    }

    #[test]
    fn test_evaluate_directory() {
        let dir = tempfile::tempdir().unwrap();
        let normal = dir.path().join("NORMAL");
        let pneumonia = dir.path().join("PNEUMONIA");
        std::fs::create_dir_all(&normal).unwrap();
        std::fs::create_dir_all(&pneumonia).unwrap();

        write_image(&normal.join("a.png"), 10);
        write_image(&normal.join("b.png"), 240); // misclassified
        write_image(&pneumonia.join("c.png"), 250);
        std::fs::write(pneumonia.join("notes.txt"), "ignored").unwrap();
        std::fs::write(pneumonia.join("broken.png"), "not an image").unwrap();

        let predictor = Predictor::new(Arc::new(BrightnessModel));
        let report = evaluate_directory(&predictor, dir.path(), false).unwrap();

        assert_eq!(report.metrics.total_samples, 3);
        assert_eq!(report.metrics.confusion_matrix.true_negative, 1);
        assert_eq!(report.metrics.confusion_matrix.false_positive, 1);
        assert_eq!(report.metrics.confusion_matrix.true_positive, 1);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("broken.png"));
    }

    #[test]
    fn test_missing_root() {
        let predictor = Predictor::new(Arc::new(BrightnessModel));
        let result = evaluate_directory(&predictor, Path::new("/does/not/exist"), false);
        assert!(matches!(result, Err(Error::PathNotFound(_))));
    }

    #[test]
    fn test_empty_root() {
        let dir = tempfile::tempdir().unwrap();
        let predictor = Predictor::new(Arc::new(BrightnessModel));
        assert!(evaluate_directory(&predictor, dir.path(), false).is_err());
    }
}
