//! Configuration Module
//!
//! TOML形式の設定ファイルを読み込むモジュール。
//!
//! 設定はプロセス開始時に一度だけ読み込まれ、参照として各コンポーネントへ渡されます。
//! 相対パスは設定ファイルのあるディレクトリを基準に解決します。

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::XrfPdfError;
use crate::grid::PageSetup;
use crate::ledger::DEFAULT_CHECKLIST_NAME;

/// 設定ファイルの既定の名前
pub const CONFIG_FILE_NAME: &str = "xrfpdf.toml";

/// ログファイルの既定の名前
pub const DEFAULT_LOG_FILE: &str = "excel_converter.log";

/// アプリケーション設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// チェックリストCSVのパス
    pub checklist: PathBuf,

    /// ログファイルのパス（空文字列の場合はファイルに出力しない）
    pub log_file: String,

    /// 既知のユニットコード
    pub unit_codes: Vec<String>,

    /// 並列変換のワーカー数（1の場合は逐次処理）
    pub workers: usize,

    /// 生成したPDFをプロバイダへアップロードするか
    pub publish: bool,

    /// ローカル（モック）プロバイダの設定
    pub local: LocalSettings,

    /// リモートプロバイダの設定
    pub remote: RemoteSettings,

    /// ページ設定
    pub page: PageSettings,

    /// 相対パスの基準ディレクトリ
    #[serde(skip)]
    base_dir: PathBuf,
}

/// ローカル（モック）プロバイダの設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalSettings {
    /// フォルダを列挙するルートディレクトリ
    pub root: PathBuf,

    /// アップロード先のディレクトリ
    pub output: PathBuf,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            output: PathBuf::from("output"),
        }
    }
}

/// リモートプロバイダの設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteSettings {
    /// サイトのURL（例: `https://contoso.sharepoint.com/sites/Inspections`）
    pub site_url: String,

    /// フォルダを列挙するサーバー相対URL
    pub root_folder: String,

    /// アップロード先のサーバー相対URL
    pub output_folder: String,

    /// リモートフォルダに対応するローカルのミラーディレクトリ
    pub mirror_dir: PathBuf,

    /// アクセストークンを読み込む環境変数名
    pub access_token_env: String,

    /// アクセストークン（環境変数が未設定の場合に使用）
    pub access_token: Option<String>,
}

impl Default for RemoteSettings {
    fn default() -> Self {
        Self {
            site_url: String::new(),
            root_folder: String::new(),
            output_folder: String::new(),
            mirror_dir: PathBuf::from("remote_mirror"),
            access_token_env: "XRF_ACCESS_TOKEN".to_string(),
            access_token: None,
        }
    }
}

impl RemoteSettings {
    /// アクセストークンを取得
    ///
    /// 環境変数を優先し、未設定の場合は設定ファイルの値を使用します。
    pub fn resolve_access_token(&self) -> Result<String, XrfPdfError> {
        if let Ok(token) = env::var(&self.access_token_env) {
            if !token.trim().is_empty() {
                return Ok(token.trim().to_string());
            }
        }

        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                XrfPdfError::Config(format!(
                    "No access token: set {} or remote.access_token",
                    self.access_token_env
                ))
            })
    }
}

/// ページ設定と組版用フォント
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSettings {
    /// 余白とストライプ色
    #[serde(flatten)]
    pub setup: PageSetup,

    /// セッション開始時に読み込むフォントファイル
    pub fonts: Vec<PathBuf>,

    /// 本文のフォントファミリー
    pub font_family: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            checklist: PathBuf::from(DEFAULT_CHECKLIST_NAME),
            log_file: DEFAULT_LOG_FILE.to_string(),
            unit_codes: Vec::new(),
            workers: 1,
            publish: false,
            local: LocalSettings::default(),
            remote: RemoteSettings::default(),
            page: PageSettings::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    /// 設定ファイルを探す
    ///
    /// 優先順位:
    ///
    /// 1. `explicit`（コマンドラインで指定されたパス）
    /// 2. 実行ファイルと同じディレクトリの`xrfpdf.toml`
    /// 3. カレントディレクトリの`xrfpdf.toml`
    ///
    /// # エラー
    ///
    /// * `XrfPdfError::Config` - 設定ファイルが見つからない場合
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf, XrfPdfError> {
        if let Some(path) = explicit {
            if path.is_file() {
                return Ok(path.to_path_buf());
            }
            return Err(XrfPdfError::Config(format!(
                "Config file '{}' was not found",
                path.display()
            )));
        }

        let mut candidates = Vec::new();
        if let Some(dir) = env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf))
        {
            candidates.push(dir.join(CONFIG_FILE_NAME));
        }
        candidates.push(PathBuf::from(CONFIG_FILE_NAME));

        for candidate in &candidates {
            if candidate.is_file() {
                debug!("Using config file {}", candidate.display());
                return Ok(candidate.clone());
            }
        }

        Err(XrfPdfError::Config(format!(
            "Config file '{}' was not found. Place it next to the executable or in the working directory",
            CONFIG_FILE_NAME
        )))
    }

    /// 設定ファイルを読み込み、検証する
    pub fn load(path: &Path) -> Result<Self, XrfPdfError> {
        let text = fs::read_to_string(path).map_err(|e| {
            XrfPdfError::Config(format!("Cannot read config file '{}': {}", path.display(), e))
        })?;

        let mut config = Self::from_toml_str(&text)?;
        config.base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(config)
    }

    /// TOML文字列から設定を生成し、検証する
    ///
    /// 相対パスはカレントディレクトリを基準に解決されます。
    pub fn from_toml_str(text: &str) -> Result<Self, XrfPdfError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// 共通の設定値を検証
    pub fn validate(&self) -> Result<(), XrfPdfError> {
        if self.workers == 0 {
            return Err(XrfPdfError::Config(
                "workers must be at least 1".to_string(),
            ));
        }
        self.page.setup.validate().map_err(XrfPdfError::Config)?;
        Ok(())
    }

    /// リモートモードに必要な設定値を検証
    pub fn validate_remote(&self) -> Result<(), XrfPdfError> {
        let required = [
            ("remote.site_url", &self.remote.site_url),
            ("remote.root_folder", &self.remote.root_folder),
            ("remote.output_folder", &self.remote.output_folder),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(XrfPdfError::Config(format!("{} is required", name)));
            }
        }
        self.remote.resolve_access_token()?;
        Ok(())
    }

    /// 設定ファイルを基準にパスを解決
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// チェックリストCSVのパス
    pub fn checklist_path(&self) -> PathBuf {
        self.resolve(&self.checklist)
    }

    /// ログファイルのパス（無効の場合は`None`）
    pub fn log_file_path(&self) -> Option<PathBuf> {
        let trimmed = self.log_file.trim();
        (!trimmed.is_empty()).then(|| self.resolve(Path::new(trimmed)))
    }

    /// ローカルプロバイダのルート
    pub fn local_root(&self) -> PathBuf {
        self.resolve(&self.local.root)
    }

    /// ローカルプロバイダのアップロード先
    pub fn local_output(&self) -> PathBuf {
        self.resolve(&self.local.output)
    }

    /// リモートフォルダのミラーディレクトリ
    pub fn mirror_dir(&self) -> PathBuf {
        self.resolve(&self.remote.mirror_dir)
    }

    /// フォントファイルのパス
    pub fn font_paths(&self) -> Vec<PathBuf> {
        self.page.fonts.iter().map(|p| self.resolve(p)).collect()
    }
}
