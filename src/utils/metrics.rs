//! Metrics Module for Model Evaluation
//!
//! Binary classification metrics for the NORMAL / PNEUMONIA task, with
//! PNEUMONIA treated as the positive class:
//! - Confusion matrix (TP, FP, TN, FN)
//! - Accuracy, precision, recall (sensitivity), specificity, F1-score

use serde::{Deserialize, Serialize};

use crate::inference::Label;

/// 2x2 confusion matrix, PNEUMONIA as positive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl BinaryConfusionMatrix {
    /// Build from parallel slices of predictions and ground truth labels
    pub fn from_predictions(predictions: &[Label], ground_truth: &[Label]) -> Self {
        let mut matrix = Self::default();
        for (&predicted, &actual) in predictions.iter().zip(ground_truth.iter()) {
            matrix.record(predicted, actual);
        }
        matrix
    }

    /// Record a single (predicted, actual) pair
    pub fn record(&mut self, predicted: Label, actual: Label) {
        match (predicted, actual) {
            (Label::Pneumonia, Label::Pneumonia) => self.true_positive += 1,
            (Label::Pneumonia, Label::Normal) => self.false_positive += 1,
            (Label::Normal, Label::Normal) => self.true_negative += 1,
            (Label::Normal, Label::Pneumonia) => self.false_negative += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    /// Render as a small text table
    pub fn display(&self) -> String {
        let mut output = String::new();
        output.push_str("                 Predicted\n");
        output.push_str("               NORMAL  PNEUMONIA\n");
        output.push_str(&format!(
            "Actual NORMAL    {:>6}  {:>9}\n",
            self.true_negative, self.false_positive
        ));
        output.push_str(&format!(
            "    PNEUMONIA    {:>6}  {:>9}\n",
            self.false_negative, self.true_positive
        ));
        output
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Evaluation metrics derived from a confusion matrix
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BinaryMetrics {
    pub total_samples: usize,
    pub correct_predictions: usize,
    pub accuracy: f64,
    pub precision: f64,
    /// Sensitivity: fraction of PNEUMONIA cases detected
    pub recall: f64,
    /// Fraction of NORMAL cases classified NORMAL
    pub specificity: f64,
    pub f1: f64,
    pub confusion_matrix: BinaryConfusionMatrix,
}

impl BinaryMetrics {
    pub fn from_confusion_matrix(matrix: BinaryConfusionMatrix) -> Self {
        let total_samples = matrix.total();
        let correct_predictions = matrix.true_positive + matrix.true_negative;
        let precision = ratio(matrix.true_positive, matrix.true_positive + matrix.false_positive);
        let recall = ratio(matrix.true_positive, matrix.true_positive + matrix.false_negative);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            total_samples,
            correct_predictions,
            accuracy: ratio(correct_predictions, total_samples),
            precision,
            recall,
            specificity: ratio(matrix.true_negative, matrix.true_negative + matrix.false_positive),
            f1,
            confusion_matrix: matrix,
        }
    }

    pub fn from_predictions(predictions: &[Label], ground_truth: &[Label]) -> Self {
        assert_eq!(
            predictions.len(),
            ground_truth.len(),
            "Predictions and ground truth must have same length"
        );
        Self::from_confusion_matrix(BinaryConfusionMatrix::from_predictions(
            predictions,
            ground_truth,
        ))
    }

    /// Pretty print metrics
    pub fn display(&self) -> String {
        let mut output = String::new();

        output.push_str("╔══════════════════════════════════════════════╗\n");
        output.push_str("║              Evaluation Metrics              ║\n");
        output.push_str("╠══════════════════════════════════════════════╣\n");
        output.push_str(&format!("║ Accuracy:      {:6.2}%                       ║\n", self.accuracy * 100.0));
        output.push_str(&format!("║ Precision:     {:6.2}%                       ║\n", self.precision * 100.0));
        output.push_str(&format!("║ Recall:        {:6.2}%                       ║\n", self.recall * 100.0));
        output.push_str(&format!("║ Specificity:   {:6.2}%                       ║\n", self.specificity * 100.0));
        output.push_str(&format!("║ F1:            {:6.2}%                       ║\n", self.f1 * 100.0));
        output.push_str(&format!("║ Total Samples: {:6}                        ║\n", self.total_samples));
        output.push_str("╚══════════════════════════════════════════════╝\n");

        output
    }
}
