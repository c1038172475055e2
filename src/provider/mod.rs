//! Folder Provider Module
//!
//! 検査フォルダの一覧取得、ソーススプレッドシートのダウンロード、
//! 生成したPDFのアップロードを行うフォルダプロバイダの抽象化。
//!
//! - [`LocalProvider`]: ローカルディレクトリをフォルダとして扱うモック実装
//! - [`RemoteProvider`]: SharePointのREST APIを使用する実装

mod local;
mod remote;

use std::path::{Path, PathBuf};

use crate::error::XrfPdfError;
use crate::types::{Folder, SourceFile};

pub use local::LocalProvider;
pub use remote::RemoteProvider;

/// ダウンロード対象の拡張子
pub const SOURCE_EXTENSIONS: &[&str] = &["xls", "xlsx", "csv"];

/// フォルダプロバイダ
pub trait FolderProvider {
    /// ルート直下のフォルダを列挙する
    fn list_immediate_subfolders(&self) -> Result<Vec<Folder>, XrfPdfError>;

    /// フォルダ内のスプレッドシートを`dest`へダウンロードする
    ///
    /// スプレッドシート以外のファイルは無視します。
    fn download_sources(&self, folder: &Folder, dest: &Path)
        -> Result<Vec<SourceFile>, XrfPdfError>;

    /// 生成したPDFをアップロードする
    fn upload_pdf(&self, path: &Path) -> Result<(), XrfPdfError>;

    /// フォルダに対応するローカルディレクトリ
    ///
    /// 生成したPDFは`local_dir/automation_output`へ出力され、
    /// 出力済みPDFの探索もこのディレクトリ以下で行います。
    fn local_dir(&self, folder: &Folder) -> PathBuf;
}

/// ソーススプレッドシートの拡張子かどうか（大文字小文字を区別しない）
pub fn is_source_file_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| {
            SOURCE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
}
