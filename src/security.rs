//! Security Module
//!
//! 外部から受け取るファイルに対する制限を実装するモジュール。
//! リモートのファイル名をステージングディレクトリへ書き込む前の検証と、
//! 入力スプレッドシートのサイズ上限を提供します。

use std::path::Path;

use crate::error::XrfPdfError;

/// セキュリティ設定
#[derive(Debug, Clone)]
pub(crate) struct SecurityConfig {
    /// 入力ファイルの最大サイズ（バイト）
    /// デフォルト: 256MB (268_435_456 bytes)
    pub max_source_file_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_source_file_size: 268_435_456, // 256MB
        }
    }
}

impl SecurityConfig {
    /// ファイルサイズが上限以内かを検証
    pub fn check_file_size(&self, path: &Path) -> Result<(), XrfPdfError> {
        let size = std::fs::metadata(path)?.len();
        if size > self.max_source_file_size {
            return Err(XrfPdfError::SecurityViolation(format!(
                "Input file size exceeds maximum: {} bytes (max: {} bytes)",
                size, self.max_source_file_size
            )));
        }
        Ok(())
    }
}

/// プロバイダから受け取ったファイル名の検証
///
/// ステージングディレクトリの外へ書き込まれないよう、単一のファイル名であることを
/// 確認します。
///
/// # 戻り値
///
/// * `Ok(())` - ファイル名が安全な場合
/// * `Err(String)` - 空、`.`・`..`の要素、パス区切り、絶対パスを含む場合
///
/// `Oak..rev2.xlsx`のように名前の途中に現れる`..`は許可します。
pub(crate) fn validate_file_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Empty file name is not allowed".to_string());
    }

    if name
        .split(['/', '\\'])
        .any(|segment| segment == "." || segment == "..")
    {
        return Err(format!("Path traversal detected: {}", name));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(format!("Path separator in file name is not allowed: {}", name));
    }

    // Windows形式のドライブ指定（`C:`など）
    if name.len() >= 2 && name.as_bytes()[1] == b':' && name.as_bytes()[0].is_ascii_alphabetic()
    {
        return Err(format!("Absolute path is not allowed: {}", name));
    }

    if name.chars().any(char::is_control) {
        return Err(format!("Control character in file name: {:?}", name));
    }

    Ok(())
}
