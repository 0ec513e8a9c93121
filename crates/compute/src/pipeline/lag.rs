use super::frame::FeatureFrame;
use super::{PipelineError, TARGET_COLUMN};

pub fn lag_column(target: &str, lag: usize) -> String {
    format!("{target}_lag_{lag}")
}

/// Shift `series` forward by `lag` positions; the first `lag` slots are missing.
pub fn shift(series: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    (0..series.len())
        .map(|i| if i >= lag { series[i - lag] } else { None })
        .collect()
}

/// Add one lagged copy of the target per lag, shifted within each lot.
pub fn add_lag_features(frame: &mut FeatureFrame, lags: &[usize]) -> Result<(), PipelineError> {
    let groups = frame.lot_groups();
    for &lag in lags {
        let mut column = vec![None; frame.len()];
        for group in &groups {
            let series: Vec<Option<f64>> = group.iter().map(|&i| frame.targets()[i]).collect();
            for (&row, value) in group.iter().zip(shift(&series, lag)) {
                column[row] = value;
            }
        }
        frame.add_column(lag_column(TARGET_COLUMN, lag), column)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{interleave, series};
    use super::*;

    #[test]
    fn shift_pads_front() {
        let s = [Some(1.0), Some(2.0), None, Some(4.0)];
        assert_eq!(shift(&s, 1), vec![None, Some(1.0), Some(2.0), None]);
        assert_eq!(shift(&s, 4), vec![None; 4]);
    }

    #[test]
    fn lags_do_not_cross_lots() {
        let records = interleave(vec![
            series("a", 0, &[Some(10.0), Some(20.0), Some(30.0)]),
            series("b", 15, &[Some(90.0), Some(80.0), Some(70.0)]),
        ]);
        let mut frame = FeatureFrame::from_records(&records);
        add_lag_features(&mut frame, &[1, 2]).unwrap();

        let lag1 = frame.column("occupancy_rate_lag_1").unwrap();
        let lag2 = frame.column("occupancy_rate_lag_2").unwrap();
        // rows alternate a, b, a, b, a, b
        assert_eq!(lag1, &[None, None, Some(10.0), Some(90.0), Some(20.0), Some(80.0)]);
        assert_eq!(lag2, &[None, None, None, None, Some(10.0), Some(90.0)]);
    }
}
