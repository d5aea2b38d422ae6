use std::env;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::Error;

/// Clockify APIのデフォルトのURL。
pub const DEFAULT_API_URL: &str = "https://api.clockify.me/api/v1";

const API_KEY: &str = "CLOCKIFY_API_KEY";
const WORKSPACE_ID: &str = "CLOCKIFY_WORKSPACE_ID";
const USER_ID: &str = "CLOCKIFY_USER_ID";
const CATEGORY_ID: &str = "CLOCKIFY_CATEGORY_ID";
const API_URL: &str = "CLOCKIFY_API_URL";

/// 起動時に一度だけ読み込む設定。
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub api_key: String,
    pub workspace_id: String,
    pub user_id: String,
    /// 集計対象のプロジェクトID。コマンドライン引数で上書きされる。
    pub category_ids: Vec<String>,
    pub api_url: String,
}

impl Config {
    /// 環境変数から設定を読み込む。
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// `lookup`で取得した値から設定を組み立てる。
    ///
    /// 必須の値が未設定、または空文字の場合はエラーを返す。
    ///
    /// # Arguments
    ///
    /// * `lookup` - 変数名から値を返す関数
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or_else(|| Error::Config(format!("{} must be set", key)))
        };

        let category_ids = lookup(CATEGORY_ID)
            .map(|value| split_list(&value))
            .unwrap_or_default();
        let api_url = lookup(API_URL)
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        Ok(Self {
            api_key: required(API_KEY)?,
            workspace_id: required(WORKSPACE_ID)?,
            user_id: required(USER_ID)?,
            category_ids,
            api_url,
        })
    }
}

/// 環境変数を上書きするファイルを読み込む。
///
/// `path`が指定されていればそのファイルを読み込み、存在しなければエラーとする。
/// 指定がなければカレントディレクトリの`.env`、次に設定ディレクトリの
/// `clockify-balance/.env`を探す。すでに設定済みの環境変数は上書きしない。
///
/// # Arguments
///
/// * `path` - 読み込むファイルのパス
pub fn load_env_file(path: Option<&Path>) -> Result<(), Error> {
    if let Some(path) = path {
        dotenvy::from_path(path).map_err(|err| {
            Error::Config(format!("Failed to load {}: {}", path.display(), err))
        })?;
        info!("Loaded environment from {}", path.display());
        return Ok(());
    }

    match dotenvy::dotenv() {
        Ok(path) => {
            info!("Loaded environment from {}", path.display());
            return Ok(());
        }
        Err(err) if err.not_found() => debug!("No .env in the working directory"),
        Err(err) => return Err(Error::Config(format!("Failed to load .env: {}", err))),
    }

    if let Some(path) = user_env_file().filter(|path| path.is_file()) {
        dotenvy::from_path(&path).map_err(|err| {
            Error::Config(format!("Failed to load {}: {}", path.display(), err))
        })?;
        info!("Loaded environment from {}", path.display());
    }

    Ok(())
}

/// ユーザーの設定ディレクトリにある`.env`のパスを返す。
fn user_env_file() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("clockify-balance").join(".env"))
}

/// カンマ区切りの文字列を空要素を除いて分割する。
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
