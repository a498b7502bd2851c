//! Decision Layer
//!
//! Turns the classifier's raw P(PNEUMONIA) into a label and a confidence.
//! Confidence is always the probability of the predicted class.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::error::{Error, Result, ResultExt};

/// Binary diagnosis label. PNEUMONIA is the positive class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Label {
    Normal,
    Pneumonia,
}

impl Label {
    pub const ALL: [Label; 2] = [Label::Normal, Label::Pneumonia];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Normal => "NORMAL",
            Label::Pneumonia => "PNEUMONIA",
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Label::Pneumonia)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "NORMAL" => Ok(Label::Normal),
            "PNEUMONIA" => Ok(Label::Pneumonia),
            other => Err(Error::Validation(format!("Unknown label: {}", other))),
        }
    }
}

/// Outcome of thresholding one raw score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub label: Label,
    /// Probability of `label`, in [0, 1]
    pub confidence: f32,
    /// Raw P(PNEUMONIA) after clamping
    pub score: f32,
}

impl Decision {
    /// Confidence as a percentage rounded to two decimals
    pub fn confidence_percent(&self) -> f64 {
        round_percent(self.confidence as f64)
    }
}

/// Convert a [0, 1] fraction to a percentage with two decimals
pub fn round_percent(fraction: f64) -> f64 {
    (fraction * 100.0 * 100.0).round() / 100.0
}

/// Decision boundary on the raw score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Threshold(f32);

impl Threshold {
    pub const DEFAULT: f32 = 0.50;

    /// Create a threshold strictly inside (0, 1)
    pub fn new(value: f32) -> Result<Self> {
        if !value.is_finite() || value <= 0.0 || value >= 1.0 {
            return Err(Error::Config(format!(
                "threshold must be in (0, 1), got {}",
                value
            )));
        }
        Ok(Self(value))
    }

    /// Read a threshold written by the training scripts (a single float)
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read threshold file {:?}", path))?;
        let value: f32 = contents
            .trim()
            .parse()
            .with_context(|| format!("Invalid threshold in {:?}", path))?;
        Self::new(value)
    }

    pub fn value(&self) -> f32 {
        self.0
    }

    /// label = PNEUMONIA if p >= t else NORMAL; confidence = p or 1 - p
    pub fn decide(&self, score: f32) -> Decision {
        let p = score.clamp(0.0, 1.0);
        if p >= self.0 {
            Decision {
                label: Label::Pneumonia,
                confidence: p,
                score: p,
            }
        } else {
            Decision {
                label: Label::Normal,
                confidence: 1.0 - p,
                score: p,
            }
        }
    }
}

impl Default for Threshold {
    fn default() -> Self {
        Self(Self::DEFAULT)
    }
}

impl fmt::Display for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_label_boundary() {
        let t = Threshold::default();
        assert_eq!(t.decide(0.5).label, Label::Pneumonia);
        assert_eq!(t.decide(0.499_99).label, Label::Normal);
        assert_eq!(t.decide(0.0).label, Label::Normal);
        assert_eq!(t.decide(1.0).label, Label::Pneumonia);
    }

    #[test]
    fn test_confidence_is_probability_of_predicted_class() {
        let t = Threshold::default();

        let d = t.decide(0.2);
        assert_eq!(d.label, Label::Normal);
        assert!((d.confidence - 0.8).abs() < 1e-6);

        let d = t.decide(0.93);
        assert_eq!(d.label, Label::Pneumonia);
        assert!((d.confidence - 0.93).abs() < 1e-6);
    }

    #[test]
    fn test_confidence_range_over_grid() {
        let t = Threshold::default();
        for i in 0..=1000 {
            let p = i as f32 / 1000.0;
            let d = t.decide(p);
            assert!(d.confidence >= 0.5 && d.confidence <= 1.0, "p={} c={}", p, d.confidence);
            assert_eq!(d.label == Label::Normal, p < 0.5);
        }
    }

    #[test]
    fn test_out_of_range_scores_are_clamped() {
        let t = Threshold::default();
        let d = t.decide(1.7);
        assert_eq!(d.label, Label::Pneumonia);
        assert_eq!(d.confidence, 1.0);

        let d = t.decide(-0.3);
        assert_eq!(d.label, Label::Normal);
        assert_eq!(d.confidence, 1.0);
    }

    #[test]
    fn test_confidence_percent_rounding() {
        let d = Threshold::default().decide(0.876_54);
        assert_eq!(d.confidence_percent(), 87.65);
        assert_eq!(round_percent(0.5), 50.0);
    }

    #[test]
    fn test_threshold_validation() {
        assert!(Threshold::new(0.0).is_err());
        assert!(Threshold::new(1.0).is_err());
        assert!(Threshold::new(f32::NAN).is_err());
        assert_eq!(Threshold::new(0.35).unwrap().value(), 0.35);
    }

    #[test]
    fn test_threshold_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "0.4500000000000001").unwrap();
        let t = Threshold::from_file(file.path()).unwrap();
        assert!((t.value() - 0.45).abs() < 1e-6);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, "not a number").unwrap();
        assert!(matches!(Threshold::from_file(bad.path()), Err(Error::Config(_))));
        assert!(matches!(
            Threshold::from_file(Path::new("/no/such/threshold.txt")),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_label_serde() {
        assert_eq!(serde_json::to_string(&Label::Pneumonia).unwrap(), "\"PNEUMONIA\"");
        let parsed: Label = serde_json::from_str("\"NORMAL\"").unwrap();
        assert_eq!(parsed, Label::Normal);
        assert_eq!("pneumonia".parse::<Label>().unwrap(), Label::Pneumonia);
    }
}
