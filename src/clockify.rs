use async_trait::async_trait;
use log::{debug, info};
use reqwest::{header::CONTENT_TYPE, Client};
use serde::Deserialize;

use crate::config::Config;
use crate::error::Error;

/// 1ページで取得するtime entryの件数。
pub const PAGE_SIZE: u32 = 200;

/// Clockify APIのtime entryをデシリアライズするための構造体。
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawTimeEntry {
    pub id: Option<String>,
    pub description: Option<String>,
    pub project_id: Option<String>,
    pub time_interval: RawTimeInterval,
}

/// time entryの開始、終了、経過時間。
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct RawTimeInterval {
    pub start: String,
    pub end: Option<String>,
    /// `PT1H30M`形式の経過時間。計測中のエントリーでは`null`になる。
    pub duration: Option<String>,
}

/// time entryを1ページずつ取得するためのtrait。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClockifyRepository: Send + Sync {
    /// 指定したページのtime entryを取得する。
    ///
    /// # Arguments
    ///
    /// * `page` - 1から始まるページ番号
    /// * `page_size` - 1ページの件数
    async fn read_time_entries_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<RawTimeEntry>, Error>;
}

/// Clockify APIと通信するためのクライアント。
///
/// # Examples
///
/// ```
/// let client = ClockifyClient::new(&config);
/// let entries = client.read_time_entries_page(1, PAGE_SIZE).await.unwrap();
/// ```
pub struct ClockifyClient {
    client: Client,
    api_url: String,
    api_key: String,
    workspace_id: String,
    user_id: String,
}

impl ClockifyClient {
    /// 新しい`ClockifyClient`を返す。
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            workspace_id: config.workspace_id.clone(),
            user_id: config.user_id.clone(),
        }
    }

    fn time_entries_url(&self) -> String {
        format!(
            "{}/workspaces/{}/user/{}/time-entries",
            self.api_url, self.workspace_id, self.user_id
        )
    }
}

#[async_trait]
impl ClockifyRepository for ClockifyClient {
    async fn read_time_entries_page(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<Vec<RawTimeEntry>, Error> {
        let network = |source| Error::Network { page, source };

        let entries = self
            .client
            .get(self.time_entries_url())
            .header("x-api-key", &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .query(&[
                ("page", page.to_string()),
                ("page-size", page_size.to_string()),
            ])
            .send()
            .await
            .map_err(network)?
            .error_for_status()
            .map_err(network)?
            .json::<Vec<RawTimeEntry>>()
            .await
            .map_err(network)?;

        Ok(entries)
    }
}

/// 指定した年のtime entryを全て取得する。
///
/// サーバーは開始日時の降順でtime entryを返すことを前提としている。
/// 取得したページに指定した年より前のエントリーが含まれていれば、それ以降のページは取得しない。
/// 件数が`PAGE_SIZE`未満のページを最後のページとみなす。
/// 開始日時が前のエントリーより新しいエントリーを見つけた場合はエラーを返す。
///
/// # Arguments
///
/// * `repository` - time entryを取得するリポジトリ
/// * `year` - 取得する年
pub async fn fetch_time_entries<R>(repository: &R, year: i32) -> Result<Vec<RawTimeEntry>, Error>
where
    R: ClockifyRepository + ?Sized,
{
    let year_prefix = format!("{:04}", year);
    let mut all_entries = Vec::new();
    let mut previous_start: Option<String> = None;
    let mut page = 1;

    loop {
        let entries = repository.read_time_entries_page(page, PAGE_SIZE).await?;
        check_order(page, &mut previous_start, &entries)?;

        let reached_older_year = entries
            .iter()
            .any(|entry| is_before_year(&entry.time_interval.start, year));
        let raw_count = entries.len();
        let before = all_entries.len();
        all_entries.extend(
            entries
                .into_iter()
                .filter(|entry| entry.time_interval.start.starts_with(&year_prefix)),
        );
        debug!(
            "Page {}: {} entries, {} kept",
            page,
            raw_count,
            all_entries.len() - before
        );

        if reached_older_year {
            info!("Page {} reached entries before {}, stop fetching", page, year);
            break;
        }
        if raw_count < PAGE_SIZE as usize {
            info!("Page {} is the last page", page);
            break;
        }
        page += 1;
    }

    info!("Fetched {} time entries in {}", all_entries.len(), year);
    Ok(all_entries)
}

/// 開始日時が降順に並んでいることを確認する。
///
/// ISO-8601の文字列は辞書順で比較できるため、文字列のまま比較する。
fn check_order(
    page: u32,
    previous_start: &mut Option<String>,
    entries: &[RawTimeEntry],
) -> Result<(), Error> {
    for entry in entries {
        let start = &entry.time_interval.start;
        if let Some(previous) = previous_start.as_ref() {
            if start > previous {
                return Err(Error::UnorderedResponse {
                    page,
                    previous: previous.clone(),
                    next: start.clone(),
                });
            }
        }
        *previous_start = Some(start.clone());
    }

    Ok(())
}

/// 開始日時の年が`year`より前かどうかを返す。年が読み取れない場合は`false`。
fn is_before_year(start: &str, year: i32) -> bool {
    start
        .get(..4)
        .and_then(|prefix| prefix.parse::<i32>().ok())
        .map_or(false, |start_year| start_year < year)
}


#[cfg(test)]
mod tests {
    use mockall::predicate::eq;
    use mockito::Matcher;
    use rstest::rstest;
    use serde_json::json;

    use super::test_utils::{descending_entries, raw_entry};
    use super::{
        fetch_time_entries, is_before_year, ClockifyClient, ClockifyRepository,
        MockClockifyRepository, RawTimeEntry, RawTimeInterval, PAGE_SIZE,
    };
    use crate::config::Config;
    use crate::error::Error;

    fn config_for(api_url: String) -> Config {
        Config {
            api_key: "secret-key".to_string(),
            workspace_id: "ws1".to_string(),
            user_id: "user1".to_string(),
            category_ids: vec![],
            api_url,
        }
    }

    #[tokio::test]
    async fn test_read_time_entries_page() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/workspaces/ws1/user/user1/time-entries")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("page".into(), "2".into()),
                Matcher::UrlEncoded("page-size".into(), "200".into()),
            ]))
            .match_header("x-api-key", "secret-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([
                    {
                        "id": "e1",
                        "description": "writing",
                        "projectId": "p1",
                        "timeInterval": {
                            "start": "2025-02-03T09:00:00Z",
                            "end": "2025-02-03T10:30:00Z",
                            "duration": "PT1H30M"
                        },
                        "billable": false
                    },
                    {
                        "id": "e2",
                        "description": null,
                        "projectId": null,
                        "timeInterval": {
                            "start": "2025-02-03T08:00:00Z",
                            "end": null,
                            "duration": null
                        }
                    }
                ])
                .to_string(),
            )
            .create_async()
            .await;

        let client = ClockifyClient::new(&config_for(server.url()));
        let entries = client.read_time_entries_page(2, PAGE_SIZE).await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            entries,
            vec![
                RawTimeEntry {
                    id: Some("e1".to_string()),
                    description: Some("writing".to_string()),
                    project_id: Some("p1".to_string()),
                    time_interval: RawTimeInterval {
                        start: "2025-02-03T09:00:00Z".to_string(),
                        end: Some("2025-02-03T10:30:00Z".to_string()),
                        duration: Some("PT1H30M".to_string()),
                    },
                },
                RawTimeEntry {
                    id: Some("e2".to_string()),
                    description: None,
                    project_id: None,
                    time_interval: RawTimeInterval {
                        start: "2025-02-03T08:00:00Z".to_string(),
                        end: None,
                        duration: None,
                    },
                },
            ]
        );
    }

    /// エラーステータスや不正なJSONはNetworkエラーになる。
    #[rstest]
    #[case::unauthorized(401, r#"{"message":"Api key does not exist"}"#)]
    #[case::server_error(500, "")]
    #[case::not_json(200, "<html></html>")]
    #[case::missing_interval(200, r#"[{"id":"e1"}]"#)]
    #[tokio::test]
    async fn test_read_time_entries_page_error(#[case] status: usize, #[case] body: &str) {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/workspaces/ws1/user/user1/time-entries")
            .match_query(Matcher::Any)
            .with_status(status)
            .with_body(body)
            .create_async()
            .await;

        let client = ClockifyClient::new(&config_for(server.url()));
        let result = client.read_time_entries_page(3, PAGE_SIZE).await;

        assert!(matches!(result, Err(Error::Network { page: 3, .. })));
    }

    /// 2025年だけの満杯のページの後に2024年を含むページが来たら、そこで取得を止める。
    #[tokio::test]
    async fn test_fetch_stops_at_older_year() {
        let page1 = descending_entries("2025-03-02", 1000, PAGE_SIZE);
        let page2 = descending_entries("2025-03-01", 1000, PAGE_SIZE);
        let mut page3 = descending_entries("2025-01-01", 100, 3);
        page3.extend(descending_entries("2024-12-31", 1000, 5));

        let mut expected = page1.clone();
        expected.extend(page2.clone());
        expected.extend(page3[..3].to_vec());

        let mut repository = MockClockifyRepository::new();
        repository
            .expect_read_time_entries_page()
            .with(eq(1), eq(PAGE_SIZE))
            .times(1)
            .returning(move |_, _| Ok(page1.clone()));
        repository
            .expect_read_time_entries_page()
            .with(eq(2), eq(PAGE_SIZE))
            .times(1)
            .returning(move |_, _| Ok(page2.clone()));
        repository
            .expect_read_time_entries_page()
            .with(eq(3), eq(PAGE_SIZE))
            .times(1)
            .returning(move |_, _| Ok(page3.clone()));
        repository
            .expect_read_time_entries_page()
            .with(eq(4), eq(PAGE_SIZE))
            .times(0);

        let entries = fetch_time_entries(&repository, 2025).await.unwrap();

        assert_eq!(entries, expected);
    }

    /// 古い年のエントリーが満杯のページにあっても次のページは取得しない。
    #[tokio::test]
    async fn test_fetch_stops_on_full_page_with_older_year() {
        let mut page1 = descending_entries("2025-01-01", 1000, PAGE_SIZE - 1);
        page1.extend(descending_entries("2023-06-01", 10, 1));

        let mut repository = MockClockifyRepository::new();
        repository
            .expect_read_time_entries_page()
            .with(eq(1), eq(PAGE_SIZE))
            .times(1)
            .returning(move |_, _| Ok(page1.clone()));
        repository
            .expect_read_time_entries_page()
            .with(eq(2), eq(PAGE_SIZE))
            .times(0);

        let entries = fetch_time_entries(&repository, 2025).await.unwrap();

        assert_eq!(entries.len(), (PAGE_SIZE - 1) as usize);
    }

    /// 件数がページサイズ未満なら最後のページとみなす。未来の年のエントリーは除外する。
    #[tokio::test]
    async fn test_fetch_stops_at_short_page() {
        let page1 = vec![
            raw_entry("future", "2026-01-02T09:00:00Z", Some("PT1H")),
            raw_entry("current", "2025-12-30T09:00:00Z", Some("PT1H")),
        ];

        let mut repository = MockClockifyRepository::new();
        repository
            .expect_read_time_entries_page()
            .with(eq(1), eq(PAGE_SIZE))
            .times(1)
            .returning(move |_, _| Ok(page1.clone()));

        let entries = fetch_time_entries(&repository, 2025).await.unwrap();

        assert_eq!(
            entries,
            vec![raw_entry("current", "2025-12-30T09:00:00Z", Some("PT1H"))]
        );
    }

    #[tokio::test]
    async fn test_fetch_empty() {
        let mut repository = MockClockifyRepository::new();
        repository
            .expect_read_time_entries_page()
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let entries = fetch_time_entries(&repository, 2025).await.unwrap();

        assert!(entries.is_empty());
    }

    /// ページ内で開始日時が昇順になっている場合はエラー。
    #[tokio::test]
    async fn test_fetch_unordered_within_page() {
        let page1 = vec![
            raw_entry("a", "2025-01-01T09:00:00Z", Some("PT1H")),
            raw_entry("b", "2025-01-02T09:00:00Z", Some("PT1H")),
        ];

        let mut repository = MockClockifyRepository::new();
        repository
            .expect_read_time_entries_page()
            .times(1)
            .returning(move |_, _| Ok(page1.clone()));

        let result = fetch_time_entries(&repository, 2025).await;

        match result {
            Err(Error::UnorderedResponse {
                page,
                previous,
                next,
            }) => {
                assert_eq!(page, 1);
                assert_eq!(previous, "2025-01-01T09:00:00Z");
                assert_eq!(next, "2025-01-02T09:00:00Z");
            }
            other => panic!("Unexpected result: {:?}", other),
        }
    }

    /// ページをまたいで開始日時が新しくなった場合もエラー。
    #[tokio::test]
    async fn test_fetch_unordered_across_pages() {
        let page1 = descending_entries("2025-01-01", 1000, PAGE_SIZE);
        let page2 = descending_entries("2025-05-01", 10, 1);

        let mut repository = MockClockifyRepository::new();
        repository
            .expect_read_time_entries_page()
            .with(eq(1), eq(PAGE_SIZE))
            .times(1)
            .returning(move |_, _| Ok(page1.clone()));
        repository
            .expect_read_time_entries_page()
            .with(eq(2), eq(PAGE_SIZE))
            .times(1)
            .returning(move |_, _| Ok(page2.clone()));

        let result = fetch_time_entries(&repository, 2025).await;

        assert!(matches!(
            result,
            Err(Error::UnorderedResponse { page: 2, .. })
        ));
    }

    /// リポジトリのエラーはそのまま返す。
    #[tokio::test]
    async fn test_fetch_propagates_error() {
        let mut repository = MockClockifyRepository::new();
        repository
            .expect_read_time_entries_page()
            .times(1)
            .returning(|_, _| Err(Error::Config("CLOCKIFY_API_KEY must be set".to_string())));

        let result = fetch_time_entries(&repository, 2025).await;

        assert!(matches!(result, Err(Error::Config(_))));
    }

    /// 4桁未満の年もISO-8601と同じく0埋めして比較する。
    #[tokio::test]
    async fn test_fetch_zero_padded_year() {
        let page1 = vec![
            raw_entry("current", "0999-06-01T09:00:00Z", Some("PT1H")),
            raw_entry("older", "0998-12-31T09:00:00Z", Some("PT1H")),
        ];

        let mut repository = MockClockifyRepository::new();
        repository
            .expect_read_time_entries_page()
            .with(eq(1), eq(PAGE_SIZE))
            .times(1)
            .returning(move |_, _| Ok(page1.clone()));

        let entries = fetch_time_entries(&repository, 999).await.unwrap();

        assert_eq!(
            entries,
            vec![raw_entry("current", "0999-06-01T09:00:00Z", Some("PT1H"))]
        );
    }

    #[rstest]
    #[case("2024-12-31T23:59:59Z", true)]
    #[case("2023-01-01T00:00:00Z", true)]
    #[case("2019-01-01T00:00:00Z", true)]
    #[case("2025-01-01T00:00:00Z", false)]
    #[case("2026-01-01T00:00:00Z", false)]
    #[case("", false)]
    #[case("abcd", false)]
    fn test_is_before_year(#[case] start: &str, #[case] expected: bool) {
        assert_eq!(is_before_year(start, 2025), expected);
    }
}
