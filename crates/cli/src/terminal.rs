use std::io::Write;

use anyhow::Result;
use crossterm::{
    queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
};

use parkcast_forecast::{PredictionReport, ReportDetail, TrainingReport};

/// Color scheme for report output.
struct Colors;

impl Colors {
    const HEADER: Color = Color::Magenta;
    const LABEL: Color = Color::Cyan;
    const GOOD: Color = Color::Green;
    const WARN: Color = Color::Yellow;
    const DIM: Color = Color::DarkGrey;
}

/// Writes training and prediction reports to a terminal (or any writer).
pub struct Terminal<W: Write> {
    out: W,
}

impl<W: Write> Terminal<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn header(&mut self, title: &str) -> Result<()> {
        queue!(
            self.out,
            Print("\n"),
            SetForegroundColor(Colors::HEADER),
            Print(format!("{title}\n")),
            SetForegroundColor(Colors::DIM),
            Print(format!("{}\n", "=".repeat(title.len()))),
            ResetColor,
        )?;
        Ok(())
    }

    fn field(&mut self, label: &str, value: impl std::fmt::Display) -> Result<()> {
        queue!(
            self.out,
            SetForegroundColor(Colors::LABEL),
            Print(format!("  {label:<16}")),
            ResetColor,
            Print(format!("{value}\n")),
        )?;
        Ok(())
    }

    fn line(&mut self, text: &str) -> Result<()> {
        queue!(self.out, Print(format!("{text}\n")))?;
        Ok(())
    }

    pub fn print_training_report(&mut self, report: &TrainingReport) -> Result<()> {
        self.header(&format!("Training {}", report.model_kind))?;
        self.field("readings", report.readings)?;
        self.field("lots", report.lots)?;
        self.field("feature rows", format!("{} ({} complete)", report.feature_rows, report.complete_rows))?;
        self.field("features", report.feature_count)?;
        self.field("train / test", format!("{} / {}", report.train_size, report.test_size))?;

        self.header("Training metrics")?;
        let t = &report.train_metrics;
        self.field("train MAE", format!("{:.2}", t.train_mae))?;
        self.field("train RMSE", format!("{:.2}", t.train_rmse))?;
        self.field("train R2", format!("{:.4}", t.train_r2))?;
        if let (Some(mae), Some(rmse), Some(r2)) = (t.val_mae, t.val_rmse, t.val_r2) {
            self.field("val MAE", format!("{mae:.2}"))?;
            self.field("val RMSE", format!("{rmse:.2}"))?;
            self.field("val R2", format!("{r2:.4}"))?;
        }

        self.header("Test metrics")?;
        let e = &report.eval_metrics;
        self.field("MAE", format!("{:.2}", e.mae))?;
        self.field("RMSE", format!("{:.2}", e.rmse))?;
        self.field("R2", format!("{:.4}", e.r2))?;
        match e.mape {
            Some(mape) => self.field("MAPE", format!("{mape:.2}%"))?,
            None => self.field("MAPE", "n/a")?,
        }

        if !report.top_features.is_empty() {
            self.header(&format!("Top {} features", report.top_features.len()))?;
            for (rank, f) in report.top_features.iter().enumerate() {
                self.line(&format!("  {:>2}. {:<28} {:.4}", rank + 1, f.feature, f.importance))?;
            }
        }

        queue!(self.out, Print("\n"))?;
        match &report.saved_to {
            Some(path) => queue!(
                self.out,
                SetForegroundColor(Colors::GOOD),
                Print(format!("Model saved to {}\n", path.display())),
                ResetColor,
            )?,
            None => queue!(
                self.out,
                SetForegroundColor(Colors::WARN),
                Print("Model not saved (--no-save)\n"),
                ResetColor,
            )?,
        }
        self.out.flush()?;
        Ok(())
    }

    pub fn print_prediction_report(&mut self, report: &PredictionReport) -> Result<()> {
        match &report.detail {
            ReportDetail::Lot { lot_id, name, total, recent } => {
                self.header(&format!("{name} ({lot_id})"))?;
                self.field("capacity", total)?;
                self.field("predictions", report.rows)?;
                self.field("MAE", format!("{:.2}", report.mae))?;

                self.header(&format!("Last {} readings", recent.len()))?;
                self.line(&format!("  {:<26} {:>8} {:>10} {:>8}", "timestamp", "actual", "predicted", "error"))?;
                for row in recent {
                    self.line(&format!(
                        "  {:<26} {:>8.2} {:>10.2} {:>8.2}",
                        row.timestamp.format("%Y-%m-%d %H:%M:%S %:z").to_string(),
                        row.actual,
                        row.predicted,
                        row.error
                    ))?;
                }
            }
            ReportDetail::Summary { lots } => {
                self.header("Prediction summary")?;
                self.field("readings", report.readings)?;
                self.field("predictions", report.rows)?;
                self.field("overall MAE", format!("{:.2}", report.mae))?;

                self.header(&format!("Worst {} lots by MAE", lots.len()))?;
                self.line(&format!("  {:<32} {:>10} {:>10} {:>8}", "lot", "avg actual", "avg pred", "MAE"))?;
                for lot in lots {
                    self.line(&format!(
                        "  {:<32} {:>10.2} {:>10.2} {:>8.2}",
                        lot.name, lot.avg_actual, lot.avg_predicted, lot.mae
                    ))?;
                }
            }
        }
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use parkcast_forecast::{LotSummary, PredictionRow};

    fn rendered(f: impl FnOnce(&mut Terminal<Vec<u8>>) -> Result<()>) -> String {
        let mut term = Terminal::new(Vec::new());
        f(&mut term).unwrap();
        String::from_utf8(term.into_inner()).unwrap()
    }

    #[test]
    fn summary_lists_lots() {
        let report = PredictionReport {
            readings: 120,
            rows: 100,
            mae: 4.25,
            detail: ReportDetail::Summary {
                lots: vec![LotSummary {
                    lot_id: "altmarkt".into(),
                    name: "Altmarkt".into(),
                    avg_actual: 61.0,
                    avg_predicted: 58.5,
                    mae: 6.75,
                }],
            },
        };
        let text = rendered(|t| t.print_prediction_report(&report));
        assert!(text.contains("Prediction summary"));
        assert!(text.contains("4.25"));
        assert!(text.contains("Altmarkt"));
        assert!(text.contains("6.75"));
    }

    #[test]
    fn lot_detail_shows_recent_rows() {
        let ts = FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 4, 9, 0, 0)
            .unwrap();
        let report = PredictionReport {
            readings: 30,
            rows: 27,
            mae: 1.5,
            detail: ReportDetail::Lot {
                lot_id: "altmarkt".into(),
                name: "Altmarkt".into(),
                total: 200,
                recent: vec![PredictionRow {
                    lot_id: "altmarkt".into(),
                    name: "Altmarkt".into(),
                    timestamp: ts,
                    actual: 50.0,
                    predicted: 48.0,
                    error: 2.0,
                }],
            },
        };
        let text = rendered(|t| t.print_prediction_report(&report));
        assert!(text.contains("Altmarkt (altmarkt)"));
        assert!(text.contains("2024-03-04 09:00:00 +01:00"));
        assert!(text.contains("48.00"));
    }
}
