use chrono::NaiveDate;
use thiserror::Error;

/// Clockifyからの取得と集計で発生するエラー。
#[derive(Debug, Error)]
pub enum Error {
    /// 設定値が不足している、または不正。
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// リクエストの失敗、エラーステータス、JSONのデシリアライズ失敗。
    #[error("Failed to fetch time entries page {page}")]
    Network {
        page: u32,
        #[source]
        source: reqwest::Error,
    },

    /// サーバーが開始日時の降順でtime entryを返さなかった。
    #[error(
        "Time entries are not in reverse-chronological order on page {page}: {next} comes after {previous}"
    )]
    UnorderedResponse {
        page: u32,
        previous: String,
        next: String,
    },

    /// time entryの解析に失敗した。
    #[error("Failed to parse time entry: {0}")]
    Parse(String),

    /// 開始日が終了日より後になっている。
    #[error("Invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    /// 集計期間が取得する年の範囲外にある。
    #[error("Period {start} ~ {end} is not within {year}")]
    PeriodOutsideYear {
        start: NaiveDate,
        end: NaiveDate,
        year: i32,
    },
}
