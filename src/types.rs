//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use std::fmt;
use std::path::{Path, PathBuf};

/// 出力PDFファイル名の固定サフィックス
pub const ARTIFACT_SUFFIX: &str = "_lease_leadpaint_xrf.pdf";

/// 物件・ユニットの識別子
///
/// チェックリストでは`"{property}_{unit}"`形式のキーとして保存されます。
/// 比較は大文字小文字を区別します。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity {
    /// 物件コード
    pub property: String,

    /// ユニットコード（ファイル名から抽出したままの表記）
    pub unit: String,
}

impl Identity {
    /// 新しい識別子を生成
    ///
    /// どちらかが空文字列の場合は`None`を返します。
    pub fn new(property: impl Into<String>, unit: impl Into<String>) -> Option<Self> {
        let property = property.into();
        let unit = unit.into();
        if property.is_empty() || unit.is_empty() {
            return None;
        }
        Some(Self { property, unit })
    }

    /// チェックリスト用の正規化キー（例: `"ABC_U9"`）
    pub fn key(&self) -> String {
        format!("{}_{}", self.property, self.unit)
    }

    /// 出力PDFのファイル名（例: `"ABC_U9_lease_leadpaint_xrf.pdf"`）
    pub fn artifact_file_name(&self) -> String {
        format!("{}_{}{}", self.property, self.unit, ARTIFACT_SUFFIX)
    }

    /// 出力PDFのファイル名から識別子を復元
    ///
    /// 固定サフィックスを取り除き、`_`で分割した先頭2セグメントを使用します。
    /// セグメントが2つ未満の場合は`None`を返します。
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use xrfpdf::Identity;
    ///
    /// let id = Identity::from_artifact_file_name("P1_U1_lease_leadpaint_xrf.pdf").unwrap();
    /// assert_eq!(id.key(), "P1_U1");
    /// assert!(Identity::from_artifact_file_name("P1_lease_leadpaint_xrf.pdf").is_none());
    /// ```
    pub fn from_artifact_file_name(file_name: &str) -> Option<Self> {
        let prefix = file_name.strip_suffix(ARTIFACT_SUFFIX)?;
        let mut parts = prefix.split('_');
        let property = parts.next()?;
        let unit = parts.next()?;
        Self::new(property, unit)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.property, self.unit)
    }
}

/// ダウンロード済みの入力スプレッドシート
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// ローカルのファイルパス
    pub path: PathBuf,

    /// 拡張子を除いたファイル名
    pub stem: String,
}

impl SourceFile {
    /// パスから入力ファイルを生成
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, stem }
    }

    /// 表示用のファイル名
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.stem.clone())
    }
}

/// 生成されたPDFレポート
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub identity: Identity,
    pub path: PathBuf,
}

/// フォルダプロバイダが返すフォルダ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    /// 表示名（パスの最終セグメント）
    pub name: String,

    /// プロバイダ上の相対パス（リモートの場合はサーバー相対URL）
    pub relative_path: String,
}

impl Folder {
    pub fn new(name: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            relative_path: relative_path.into(),
        }
    }

    /// コマンドライン引数などで与えられた相対パスからフォルダを生成
    ///
    /// 名前は末尾の`/`を除いた最終セグメントです。
    pub fn from_relative_path(relative_path: &str) -> Self {
        let trimmed = relative_path.trim_end_matches(['/', '\\']);
        let name = Path::new(trimmed)
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| trimmed.to_string());
        Self::new(name, relative_path)
    }
}

/// セルの値を表す列挙型
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CellValue {
    /// 数値（f64）
    Number(f64),

    /// 文字列
    String(String),

    /// 論理値
    Bool(bool),

    /// 日付（Excelシリアル値）
    DateSerial(f64),

    /// エラー値（例: #DIV/0!）
    Error(String),

    /// 空セル
    Empty,
}
