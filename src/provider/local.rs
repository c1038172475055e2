//! Local Folder Provider
//!
//! ローカルディレクトリの直下のサブディレクトリを検査フォルダとして扱うプロバイダ。
//! リモート環境なしで動作を確認するためのモックモードで使用します。

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::XrfPdfError;
use crate::provider::{is_source_file_name, FolderProvider};
use crate::security::validate_file_name;
use crate::types::{Folder, SourceFile};

/// ローカルフォルダプロバイダ
#[derive(Debug, Clone)]
pub struct LocalProvider {
    /// フォルダを列挙するルート
    root: PathBuf,

    /// アップロード先
    output: PathBuf,
}

impl LocalProvider {
    pub fn new(root: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        let provider = Self {
            root: root.into(),
            output: output.into(),
        };
        info!("Using local mock root: {}", provider.root.display());
        provider
    }

    /// フォルダに対応するソースディレクトリ
    fn source_dir(&self, folder: &Folder) -> PathBuf {
        self.root.join(&folder.name)
    }
}

impl FolderProvider for LocalProvider {
    fn list_immediate_subfolders(&self) -> Result<Vec<Folder>, XrfPdfError> {
        let mut folders = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            folders.push(Folder::new(name, path.to_string_lossy()));
        }
        folders.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(folders)
    }

    fn download_sources(
        &self,
        folder: &Folder,
        dest: &Path,
    ) -> Result<Vec<SourceFile>, XrfPdfError> {
        let src_dir = self.source_dir(folder);

        let mut names = Vec::new();
        for entry in fs::read_dir(&src_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_source_file_name(&name) {
                names.push(name);
            }
        }
        names.sort();

        let mut sources = Vec::with_capacity(names.len());
        for name in names {
            validate_file_name(&name).map_err(XrfPdfError::SecurityViolation)?;
            let local = dest.join(&name);
            fs::copy(src_dir.join(&name), &local)?;
            debug!("Copied {} to staging", name);
            sources.push(SourceFile::from_path(local));
        }
        Ok(sources)
    }

    fn upload_pdf(&self, path: &Path) -> Result<(), XrfPdfError> {
        let name = path.file_name().ok_or_else(|| {
            XrfPdfError::Config(format!("Not a file path: {}", path.display()))
        })?;
        fs::create_dir_all(&self.output)?;
        let dst = self.output.join(name);
        fs::copy(path, &dst)?;
        info!("Mock uploaded {} to {}", path.display(), dst.display());
        Ok(())
    }

    fn local_dir(&self, folder: &Folder) -> PathBuf {
        self.source_dir(folder)
    }
}
