//! Scanner Module
//!
//! 出力済みのPDFをファイルシステムから探し、チェックリストへ反映するモジュール。
//! 出力ファイル名から識別子を復元できるため、別途マニフェストは不要です。

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::ledger::Ledger;
use crate::types::{Identity, ARTIFACT_SUFFIX};

/// ディレクトリ以下（再帰）の出力PDFを列挙する
///
/// 存在しないディレクトリの場合は空のリストを返します。結果はパス順です。
pub fn find_artifacts(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }

    let mut found: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(ARTIFACT_SUFFIX))
        })
        .map(|entry| entry.into_path())
        .collect();
    found.sort();
    found
}

/// ディレクトリ以下の出力PDFの件数
pub fn count_artifacts(dir: &Path) -> usize {
    find_artifacts(dir).len()
}

/// 出力PDFの識別子をチェックリストへ反映する
///
/// 見つかった識別子はすべて完了（`true`）にします。完了を取り消すことはなく、
/// ファイルシステムが変わらなければ何度呼び出しても結果は同じです。
/// 新たに完了になったキーの数を返します。
pub fn reconcile<P: AsRef<Path>>(dirs: &[P], ledger: &mut Ledger) -> usize {
    let mut changed = 0;

    for dir in dirs {
        let dir = dir.as_ref();
        for artifact in find_artifacts(dir) {
            let Some(identity) = artifact
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(Identity::from_artifact_file_name)
            else {
                debug!("Cannot derive identity from {}", artifact.display());
                continue;
            };

            if ledger.mark_complete(&identity) {
                debug!("Reconciled {} from {}", identity, artifact.display());
                changed += 1;
            }
        }
    }

    if changed > 0 {
        info!("Reconciled {} completed report(s) from existing outputs", changed);
    }
    changed
}
