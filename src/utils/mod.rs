//! Utilities: logging, error types, evaluation metrics and CLI formatting

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{Error, Result};
pub use logging::{init_logging, LogConfig};
pub use metrics::{BinaryConfusionMatrix, BinaryMetrics};

use std::time::Duration;

/// Short wall-clock rendering for CLI summaries: `850 ms`, `12.4 s`, `3m 05s`
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 1.0 {
        format!("{} ms", elapsed.as_millis())
    } else if secs < 60.0 {
        format!("{:.1} s", secs)
    } else {
        let whole = elapsed.as_secs();
        format!("{}m {:02}s", whole / 60, whole % 60)
    }
}

/// Images per second, or 0 when nothing was timed
pub fn images_per_second(images: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        images as f64 / secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(850)), "850 ms");
        assert_eq!(format_elapsed(Duration::from_millis(12_400)), "12.4 s");
        assert_eq!(format_elapsed(Duration::from_secs(185)), "3m 05s");
    }

    #[test]
    fn test_images_per_second() {
        assert_eq!(images_per_second(50, Duration::from_secs(2)), 25.0);
        assert_eq!(images_per_second(50, Duration::ZERO), 0.0);
    }
}
