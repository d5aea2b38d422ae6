use chrono::{Datelike, NaiveDate, Weekday};

use crate::datetime;
use crate::error::Error;
use crate::time_entry::TimeEntry;

/// 期間内の平日(月曜日から金曜日)の曜日ごとの日数。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WeekdayTally {
    pub mondays: u32,
    pub tuesdays: u32,
    pub wednesdays: u32,
    pub thursdays: u32,
    pub fridays: u32,
}

impl WeekdayTally {
    /// 平日の合計日数を返す。
    pub fn total(&self) -> u32 {
        self.mondays + self.tuesdays + self.wednesdays + self.thursdays + self.fridays
    }
}

/// カテゴリーごとの実績と予定の差分。
#[derive(Clone, Debug, PartialEq)]
pub struct TimeDiff {
    /// カテゴリーに記録された合計時間(秒)。
    pub total_seconds: u64,
    /// 実績から予定を引いた時間。
    pub diff_hours: f64,
    /// `diff_hours`を`[-]HH:MM:SS`形式にした文字列。
    pub formatted: String,
}

impl TimeDiff {
    pub fn total_hours(&self) -> f64 {
        self.total_seconds as f64 / 3600.0
    }
}

/// `start`から`end`までの各平日の日数を数える。両端の日を含む。
///
/// `end`が指定されていない場合は、Localタイムゾーンの今日までとする。
/// `start`が`end`より後の場合はエラーを返す。
///
/// # Arguments
///
/// * `start` - 開始日
/// * `end` - 終了日
pub fn count_weekdays(start: NaiveDate, end: Option<NaiveDate>) -> Result<WeekdayTally, Error> {
    let end = end.unwrap_or_else(datetime::today);
    if start > end {
        return Err(Error::InvalidRange { start, end });
    }

    let tally = start
        .iter_days()
        .take_while(|date| *date <= end)
        .fold(WeekdayTally::default(), |mut tally, date| {
            match date.weekday() {
                Weekday::Mon => tally.mondays += 1,
                Weekday::Tue => tally.tuesdays += 1,
                Weekday::Wed => tally.wednesdays += 1,
                Weekday::Thu => tally.thursdays += 1,
                Weekday::Fri => tally.fridays += 1,
                Weekday::Sat | Weekday::Sun => {}
            }
            tally
        });

    Ok(tally)
}

/// 時間を`[-]HH:MM:SS`形式の文字列にする。
///
/// 秒未満は切り捨てる。
///
/// # Examples
///
/// ```
/// assert_eq!(format_hours(8.5), "08:30:00");
/// assert_eq!(format_hours(-1.5), "-01:30:00");
/// ```
pub fn format_hours(hours: f64) -> String {
    // マイクロ秒単位に丸めてから秒未満を切り捨てる。
    let seconds = ((hours * 3600.0 * 1_000_000.0).round() / 1_000_000.0).trunc();
    format_seconds(seconds as i64)
}

/// 秒数を`[-]HH:MM:SS`形式の文字列にする。
pub fn format_seconds(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let seconds = seconds.unsigned_abs();

    format!(
        "{}{:02}:{:02}:{:02}",
        sign,
        seconds / 3600,
        seconds % 3600 / 60,
        seconds % 60
    )
}

/// カテゴリーに記録された時間と予定の時間の差分を計算する。
///
/// # Arguments
///
/// * `time_entries` - 集計するtime entry
/// * `category_id` - 集計対象のカテゴリー
/// * `expected_hours_per_day` - 1日あたりの予定時間
/// * `num_days` - 予定されている日数
pub fn calculate_time_diff(
    time_entries: &[TimeEntry],
    category_id: &str,
    expected_hours_per_day: f64,
    num_days: u32,
) -> TimeDiff {
    let total_seconds: u64 = time_entries
        .iter()
        .filter(|entry| entry.category_id == category_id)
        .map(|entry| entry.duration)
        .sum();
    let total_hours = total_seconds as f64 / 3600.0;
    let diff_hours = total_hours - expected_hours_per_day * f64::from(num_days);
    let formatted = format_hours(diff_hours);
    // 表示上0秒以上になる誤差は0として扱い、数値と文字列の符号を揃える。
    let diff_hours = if diff_hours <= 0.0 && !formatted.starts_with('-') {
        0.0
    } else {
        diff_hours
    };

    TimeDiff {
        total_seconds,
        diff_hours,
        formatted,
    }
}
