use std::io::Write;

use anyhow::{Context, Result};

use crate::report_command::Report;
use crate::time_entry::TimeEntry;

/// Consoleに集計結果を表示するためのtrait。
pub trait ReportPresenter {
    /// 集計結果を表示する。
    ///
    /// # Arguments
    ///
    /// * `report` - 表示する集計結果
    fn show_report(&mut self, report: &Report) -> Result<()>;
}

/// 集計結果をテキストで表示する。
pub struct ConsoleReport<'a, W: Write> {
    writer: &'a mut W,
}

impl<'a, W: Write> ConsoleReport<'a, W> {
    /// 新しい`ConsoleReport`を返す。
    pub fn new(writer: &'a mut W) -> Self {
        Self { writer }
    }

    fn write_entry(&mut self, label: &str, entry: Option<&TimeEntry>) -> Result<()> {
        let result = match entry {
            Some(entry) => writeln!(self.writer, "{}: {}", label, entry),
            None => writeln!(self.writer, "{}: No time entries found.", label),
        };
        result.with_context(|| format!("Failed to write {}", label))
    }
}

impl<'a, W: Write> ReportPresenter for ConsoleReport<'a, W> {
    // 時間は小数点以下2桁で表示する。
    fn show_report(&mut self, report: &Report) -> Result<()> {
        self.write_entry("First entry", report.first_entry.as_ref())?;
        self.write_entry("Earliest entry", report.earliest_entry.as_ref())?;

        let weekdays = &report.weekdays;
        writeln!(
            self.writer,
            "Period: {} ~ {}",
            report.start_date, report.end_date
        )
        .context("Failed to write period")?;
        writeln!(
            self.writer,
            "Total number of days relevant for calculation: {} (Mon {}, Tue {}, Wed {}, Thu {}, Fri {})",
            weekdays.total(),
            weekdays.mondays,
            weekdays.tuesdays,
            weekdays.wednesdays,
            weekdays.thursdays,
            weekdays.fridays
        )
        .context("Failed to write weekdays")?;
        writeln!(
            self.writer,
            "Total time necessary for full-time: {:.2} hrs",
            report.expected_hours()
        )
        .context("Failed to write expected hours")?;

        for summary in &report.categories {
            writeln!(
                self.writer,
                "Total time spent on {}: {:.2} hrs. Your difference is: {:.2} hrs, formatted: {}",
                summary.category_id,
                summary.diff.total_hours(),
                summary.diff.diff_hours,
                summary.diff.formatted
            )
            .with_context(|| format!("Failed to write summary: {:?}", summary))?;
        }

        Ok(())
    }
}
