//! Remote Folder Provider
//!
//! SharePointのREST API（`/_api/web`）を使用するフォルダプロバイダ。
//! 認証はベアラートークンで行い、トークンの取得は呼び出し側の責任です。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::RemoteSettings;
use crate::error::XrfPdfError;
use crate::provider::{is_source_file_name, FolderProvider};
use crate::security::validate_file_name;
use crate::types::{Folder, SourceFile};

/// ODataのコレクション応答
#[derive(Debug, Deserialize)]
struct ODataList<T> {
    value: Vec<T>,
}

/// フォルダまたはファイルの項目
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RemoteItem {
    name: String,
    server_relative_url: String,
}

/// リモートフォルダプロバイダ
#[derive(Debug, Clone)]
pub struct RemoteProvider {
    client: Client,
    site_url: String,
    root_folder: String,
    output_folder: String,
    mirror_dir: PathBuf,
    token: String,
}

impl RemoteProvider {
    /// 設定からプロバイダを生成
    ///
    /// # エラー
    ///
    /// * `XrfPdfError::Config` - アクセストークンがない場合
    /// * `XrfPdfError::Remote` - HTTPクライアントを構築できない場合
    pub fn new(settings: &RemoteSettings, mirror_dir: PathBuf) -> Result<Self, XrfPdfError> {
        let token = settings.resolve_access_token()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()?;

        let site_url = settings.site_url.trim_end_matches('/').to_string();
        info!("Connected to {}", site_url);

        Ok(Self {
            client,
            site_url,
            root_folder: settings.root_folder.trim_end_matches('/').to_string(),
            output_folder: settings.output_folder.trim_end_matches('/').to_string(),
            mirror_dir,
            token,
        })
    }

    /// フォルダのAPI URL
    fn folder_url(&self, server_relative_url: &str, tail: &str) -> String {
        format!(
            "{}/_api/web/GetFolderByServerRelativeUrl('{}')/{}",
            self.site_url,
            odata_literal(server_relative_url),
            tail
        )
    }

    /// ファイル内容のAPI URL
    fn file_value_url(&self, server_relative_url: &str) -> String {
        format!(
            "{}/_api/web/GetFileByServerRelativeUrl('{}')/$value",
            self.site_url,
            odata_literal(server_relative_url)
        )
    }

    /// 認証付きGETでJSONを取得
    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, XrfPdfError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json;odata=nometadata")
            .send()?;
        Ok(check_status(response)?.json()?)
    }

    /// フォルダ内の項目を列挙
    fn list_items(&self, server_relative_url: &str, kind: &str) -> Result<Vec<RemoteItem>, XrfPdfError> {
        let list: ODataList<RemoteItem> = self.get_json(&self.folder_url(server_relative_url, kind))?;
        Ok(list.value)
    }
}

impl FolderProvider for RemoteProvider {
    fn list_immediate_subfolders(&self) -> Result<Vec<Folder>, XrfPdfError> {
        // フォルダ名はミラーディレクトリのパスになるため、単一の名前に限る
        let mut folders: Vec<Folder> = self
            .list_items(&self.root_folder, "Folders")?
            .into_iter()
            .filter(|item| match validate_file_name(&item.name) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Ignoring remote folder: {}", e);
                    false
                }
            })
            .map(|item| Folder::new(item.name, item.server_relative_url))
            .collect();
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    fn download_sources(
        &self,
        folder: &Folder,
        dest: &Path,
    ) -> Result<Vec<SourceFile>, XrfPdfError> {
        let mut files = self.list_items(&folder.relative_path, "Files")?;
        files.sort_by(|a, b| a.name.cmp(&b.name));

        let mut sources = Vec::new();
        for item in files {
            if !is_source_file_name(&item.name) {
                continue;
            }
            validate_file_name(&item.name).map_err(XrfPdfError::SecurityViolation)?;

            let response = self
                .client
                .get(self.file_value_url(&item.server_relative_url))
                .bearer_auth(&self.token)
                .send()?;
            let bytes = check_status(response)?.bytes()?;

            let local = dest.join(&item.name);
            fs::write(&local, &bytes)?;
            info!("Downloaded {}", item.server_relative_url);
            sources.push(SourceFile::from_path(local));
        }
        Ok(sources)
    }

    fn upload_pdf(&self, path: &Path) -> Result<(), XrfPdfError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| XrfPdfError::Config(format!("Not a file path: {}", path.display())))?;
        let body = fs::read(path)?;

        let url = self.folder_url(
            &self.output_folder,
            &format!("Files/add(url='{}',overwrite=true)", odata_literal(name)),
        );
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json;odata=nometadata")
            .body(body)
            .send()?;
        check_status(response)?;

        info!("Uploaded {}", name);
        Ok(())
    }

    fn local_dir(&self, folder: &Folder) -> PathBuf {
        self.mirror_dir.join(&folder.name)
    }
}

/// ステータスコードを検査し、失敗時は本文をエラーメッセージに含める
fn check_status(response: Response) -> Result<Response, XrfPdfError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let message = response
        .text()
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(XrfPdfError::Remote(format!(
        "{} returned {}: {}",
        url,
        status.as_u16(),
        message
    )))
}

/// OData文字列リテラルの中身としてエスケープ
///
/// `'`は`''`に、URLで意味を持つ`%` `#` `?`はパーセントエンコードします。
fn odata_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\'' => escaped.push_str("''"),
            '%' => escaped.push_str("%25"),
            '#' => escaped.push_str("%23"),
            '?' => escaped.push_str("%3F"),
            c => escaped.push(c),
        }
    }
    escaped
}
