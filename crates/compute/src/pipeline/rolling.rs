use super::frame::FeatureFrame;
use super::{PipelineError, TARGET_COLUMN};

/// Window statistics, in column order.
pub const ROLLING_STATS: [&str; 4] = ["mean", "std", "max", "min"];

pub fn rolling_column(target: &str, stat: &str, window: usize) -> String {
    format!("{target}_rolling_{stat}_{window}")
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub max: Option<f64>,
    pub min: Option<f64>,
}

impl WindowStats {
    /// Stats over the present values of `window`. Sample std needs two values.
    pub fn of(window: &[Option<f64>]) -> Self {
        let present: Vec<f64> = window.iter().flatten().copied().collect();
        let n = present.len();
        if n == 0 {
            return Self {
                mean: None,
                std: None,
                max: None,
                min: None,
            };
        }

        let mean = present.iter().sum::<f64>() / n as f64;
        let std = (n > 1).then(|| {
            let ss: f64 = present.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1) as f64).sqrt()
        });
        let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = present.iter().copied().fold(f64::INFINITY, f64::min);

        Self {
            mean: Some(mean),
            std,
            max: Some(max),
            min: Some(min),
        }
    }

    fn get(&self, stat: &str) -> Option<f64> {
        match stat {
            "mean" => self.mean,
            "std" => self.std,
            "max" => self.max,
            "min" => self.min,
            _ => None,
        }
    }
}

/// Trailing-window stats for each position of `series`, current value included.
pub fn rolling(series: &[Option<f64>], window: usize) -> Vec<WindowStats> {
    (0..series.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            WindowStats::of(&series[start..=i])
        })
        .collect()
}

/// Add mean/std/max/min of the target per window, computed within each lot.
pub fn add_rolling_features(frame: &mut FeatureFrame, windows: &[usize]) -> Result<(), PipelineError> {
    let groups = frame.lot_groups();
    for &window in windows {
        let mut stats = vec![WindowStats::of(&[]); frame.len()];
        for group in &groups {
            let series: Vec<Option<f64>> = group.iter().map(|&i| frame.targets()[i]).collect();
            for (&row, s) in group.iter().zip(rolling(&series, window)) {
                stats[row] = s;
            }
        }
        for stat in ROLLING_STATS {
            let column = stats.iter().map(|s| s.get(stat)).collect();
            frame.add_column(rolling_column(TARGET_COLUMN, stat, window), column)?;
        }
    }
    Ok(())
}
