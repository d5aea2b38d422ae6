use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use log::info;

use crate::calculator::{calculate_time_diff, count_weekdays, TimeDiff, WeekdayTally};
use crate::clockify::{fetch_time_entries, ClockifyRepository};
use crate::config::Config;
use crate::datetime;
use crate::error::Error;
use crate::time_entry::{parse_time_entries, TimeEntry};

/// 集計の引数。
#[derive(Debug, clap::Args)]
pub struct ReportArgs {
    #[clap(
        short = 'y',
        long = "year",
        default_value_t = 2025,
        help = "Year of the time entries to summarise"
    )]
    year: i32,

    #[clap(
        short = 's',
        long = "start-date",
        help = "First day of the period in the format YYYY-MM-DD [default: January 1 of the year]",
        parse(try_from_str = parse_date),
    )]
    start_date: Option<NaiveDate>,

    #[clap(
        short = 'e',
        long = "end-date",
        help = "Last day of the period in the format YYYY-MM-DD [default: today, at most December 31 of the year]",
        parse(try_from_str = parse_date),
    )]
    end_date: Option<NaiveDate>,

    #[clap(
        long = "hours-per-day",
        default_value_t = 8.4,
        help = "Expected working hours per weekday",
        parse(try_from_str = parse_hours),
    )]
    hours_per_day: f64,

    #[clap(
        short = 'c',
        long = "category",
        help = "Project id to summarise, can be repeated [default: CLOCKIFY_CATEGORY_ID]"
    )]
    categories: Vec<String>,
}

/// カテゴリーごとの集計結果。
#[derive(Clone, Debug, PartialEq)]
pub struct CategorySummary {
    pub category_id: String,
    pub diff: TimeDiff,
}

/// 表示する集計結果。
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    /// 取得した順で最初のtime entry。
    pub first_entry: Option<TimeEntry>,
    /// 開始日時が最も古いtime entry。
    pub earliest_entry: Option<TimeEntry>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub weekdays: WeekdayTally,
    pub hours_per_day: f64,
    pub categories: Vec<CategorySummary>,
}

impl Report {
    /// 期間内の平日を全て働いた場合の時間。
    pub fn expected_hours(&self) -> f64 {
        self.hours_per_day * f64::from(self.weekdays.total())
    }
}

pub struct ReportCommand<'a, T: ClockifyRepository> {
    clockify_client: &'a T,
    config: &'a Config,
}

impl<'a, T: ClockifyRepository> ReportCommand<'a, T> {
    /// 新しい`ReportCommand`を返す。
    ///
    /// # Arguments
    /// * `clockify_client` - Clockify APIと通信するためのリポジトリ
    /// * `config` - 集計対象のカテゴリーを含む設定
    pub fn new(clockify_client: &'a T, config: &'a Config) -> Self {
        Self {
            clockify_client,
            config,
        }
    }

    /// 指定した年のtime entryを取得し、期間内の平日の予定時間との差分を集計する。
    ///
    /// 期間の開始日が指定されていない場合は年の1月1日、終了日が指定されていない場合は
    /// 今日(年の12月31日を超える場合は12月31日)とする。
    ///
    /// # Arguments
    ///
    /// * `args` - 集計の引数
    pub async fn run(&self, args: ReportArgs) -> Result<Report> {
        let categories = if args.categories.is_empty() {
            self.config.category_ids.clone()
        } else {
            args.categories
        };
        if categories.is_empty() {
            return Err(Error::Config(
                "no category given, set CLOCKIFY_CATEGORY_ID or pass --category".to_string(),
            )
            .into());
        }

        let (start_date, end_date) = period(args.year, args.start_date, args.end_date)?;
        info!("Start date: {}, End date: {}", start_date, end_date);
        let weekdays = count_weekdays(start_date, Some(end_date))
            .context("Failed to count weekdays")?;

        let raw_entries = fetch_time_entries(self.clockify_client, args.year)
            .await
            .context("Failed to retrieve time entries")?;
        let time_entries =
            parse_time_entries(raw_entries).context("Failed to parse time entries")?;
        info!("Time entries parsed successfully.");

        let categories = categories
            .into_iter()
            .map(|category_id| {
                let diff = calculate_time_diff(
                    &time_entries,
                    &category_id,
                    args.hours_per_day,
                    weekdays.total(),
                );
                CategorySummary { category_id, diff }
            })
            .collect();

        Ok(Report {
            first_entry: time_entries.first().cloned(),
            earliest_entry: time_entries
                .iter()
                .min_by(|a, b| a.start.cmp(&b.start))
                .cloned(),
            start_date,
            end_date,
            weekdays,
            hours_per_day: args.hours_per_day,
            categories,
        })
    }
}

/// 集計期間を決める。
///
/// time entryは`year`の分しか取得しないため、期間は`year`の中に収まっていなければならない。
fn period(
    year: i32,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<(NaiveDate, NaiveDate)> {
    let start_date = match start_date {
        Some(date) => date,
        None => NaiveDate::from_ymd_opt(year, 1, 1)
            .with_context(|| format!("Invalid year: {}", year))?,
    };
    let end_date = match end_date {
        Some(date) => date,
        None => {
            let year_end = NaiveDate::from_ymd_opt(year, 12, 31)
                .with_context(|| format!("Invalid year: {}", year))?;
            datetime::today().min(year_end)
        }
    };

    if start_date.year() != year || end_date.year() != year {
        return Err(Error::PeriodOutsideYear {
            start: start_date,
            end: end_date,
            year,
        }
        .into());
    }

    Ok((start_date, end_date))
}

/// 日付をパースする。
fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("Failed to parse date: {}", s))
}

/// 1日あたりの時間をパースする。0以上の有限な値のみ受け付ける。
fn parse_hours(s: &str) -> Result<f64> {
    let hours = s
        .parse::<f64>()
        .with_context(|| format!("Failed to parse hours: {}", s))?;
    if !hours.is_finite() || hours < 0.0 {
        anyhow::bail!("Hours must be a non-negative number: {}", s);
    }

    Ok(hours)
}
