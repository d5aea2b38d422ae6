use std::fmt;

use crate::clockify::RawTimeEntry;
use crate::error::Error;

/// 集計に利用するtime entry。
#[derive(Clone, Debug, PartialEq)]
pub struct TimeEntry {
    pub id: String,
    pub description: String,
    /// ClockifyのプロジェクトID。未設定の場合は空文字。
    pub category_id: String,
    /// ISO-8601形式の開始日時。
    pub start: String,
    pub end: Option<String>,
    /// 経過時間(秒)。
    pub duration: u64,
}

impl TimeEntry {
    /// Clockify APIのtime entryを変換する。
    pub fn from_raw(raw: RawTimeEntry) -> Result<Self, Error> {
        let id = raw
            .id
            .ok_or_else(|| Error::Parse("time entry has no id".to_string()))?;
        let duration = parse_duration(raw.time_interval.duration.as_deref())
            .map_err(|err| Error::Parse(format!("time entry {}: {}", id, err)))?;

        Ok(Self {
            id,
            description: raw.description.unwrap_or_default(),
            category_id: raw.project_id.unwrap_or_default(),
            start: raw.time_interval.start,
            end: raw.time_interval.end,
            duration,
        })
    }
}

impl fmt::Display for TimeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ~ {} ({}s) [{}] {} <{}>",
            self.start,
            self.end.as_deref().unwrap_or("now"),
            self.duration,
            self.category_id,
            self.description,
            self.id
        )
    }
}

/// Clockify APIのtime entryを順番を保ったまま変換する。
pub fn parse_time_entries(raw_entries: Vec<RawTimeEntry>) -> Result<Vec<TimeEntry>, Error> {
    raw_entries.into_iter().map(TimeEntry::from_raw).collect()
}

/// `PT1H30M15S`形式の経過時間を秒に変換する。
///
/// 時、分、秒はそれぞれ省略できる。値がない、または空文字の場合は0秒とする。
///
/// # Examples
///
/// ```
/// assert_eq!(parse_duration(Some("PT1H30M")).unwrap(), 5400);
/// ```
pub fn parse_duration(duration: Option<&str>) -> Result<u64, String> {
    let duration = match duration {
        None | Some("") => return Ok(0),
        Some(duration) => duration,
    };
    let mut rest = duration
        .strip_prefix("PT")
        .ok_or_else(|| format!("duration must start with PT: {:?}", duration))?;

    let mut total: u64 = 0;
    for (designator, unit) in [('H', 3600), ('M', 60), ('S', 1)] {
        if let Some((value, remainder)) = rest.split_once(designator) {
            let value = value
                .parse::<u64>()
                .map_err(|_| format!("invalid {} component in {:?}", designator, duration))?;
            total = value
                .checked_mul(unit)
                .and_then(|seconds| total.checked_add(seconds))
                .ok_or_else(|| format!("duration overflows: {:?}", duration))?;
            rest = remainder;
        }
    }

    if !rest.is_empty() {
        return Err(format!("unexpected trailing text in {:?}", duration));
    }

    Ok(total)
}
