//! Application Module
//!
//! フォルダ単位の変換処理を組み立てるモジュール。
//!
//! [`Runner`]はチェックリストを唯一の共有状態として所有し、フォルダの走査、
//! 未変換ファイルの選択、変換、チェックリストの保存を順に行います。
//! チェックリストを書き換えるのは常に`Runner`を所有するスレッドだけです。

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info, warn};

use crate::api::BatchReport;
use crate::builder::Converter;
use crate::error::XrfPdfError;
use crate::identity::UnitCodes;
use crate::ledger::Ledger;
use crate::provider::FolderProvider;
use crate::render::RenderEngine;
use crate::scanner::{count_artifacts, reconcile};
use crate::selector::select_pending;
use crate::types::Folder;

/// 生成したPDFの出力先（フォルダのローカルディレクトリからの相対）
pub const OUTPUT_SUBDIR: &str = "automation_output";

/// ステージングディレクトリの接頭辞
const STAGING_PREFIX: &str = "lp_src_";

/// フォルダ一覧の1行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderStat {
    /// 1始まりの番号
    pub index: usize,

    /// フォルダ
    #[serde(skip)]
    pub folder: Folder,

    /// フォルダ名
    pub name: String,

    /// 出力済みPDFの数
    pub completed: usize,
}

/// フォルダごとの変換結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FolderSummary {
    /// フォルダ名
    pub folder: String,

    /// 変換結果の集計
    #[serde(flatten)]
    pub report: BatchReport,

    /// ファイル名を認識できなかった件数
    pub unrecognized: usize,

    /// チェックリスト上で完了済みだった件数
    pub already_done: usize,

    /// アップロードした件数
    pub uploaded: usize,

    /// フォルダ単位のエラー
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 1回の実行の集計
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// フォルダごとの結果
    pub folders: Vec<FolderSummary>,

    /// 全フォルダの合計
    pub totals: BatchReport,

    /// 名前を認識できなかったソースの合計
    pub unrecognized: usize,

    /// 完了済みの項目数（保存時点）
    pub completed: usize,

    /// チェックリストの保存先
    pub checklist: PathBuf,
}

impl RunSummary {
    /// フォルダ単位のエラーが発生したフォルダの数
    pub fn failed_folders(&self) -> usize {
        self.folders.iter().filter(|f| f.error.is_some()).count()
    }
}

/// 既知のユニットコードを決定する
///
/// 設定ファイルとコマンドラインで与えられたコードを合わせて使用します。
/// どちらも空の場合に限り、既存のチェックリストに含まれるユニットから復元します。
pub fn resolve_unit_codes(configured: &[String], extra: &[String], checklist: &Path) -> UnitCodes {
    let mut units: UnitCodes = configured
        .iter()
        .chain(extra)
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .collect();

    if units.is_empty() {
        let bootstrapped = Ledger::load_unit_codes(checklist);
        if !bootstrapped.is_empty() {
            info!(
                "Using {} unit code(s) found in {}",
                bootstrapped.len(),
                checklist.display()
            );
        }
        units.extend(bootstrapped);
    }

    if units.is_empty() {
        warn!("No known unit codes configured; every file name will be reported as unrecognized");
    }
    units
}

/// 変換処理の実行者
pub struct Runner<E: RenderEngine> {
    provider: Box<dyn FolderProvider>,
    engine: E,
    converter: Converter,
    ledger: Ledger,
    checklist_path: PathBuf,
    publish: bool,
}

impl<E: RenderEngine> Runner<E> {
    /// 新しいRunnerインスタンスを生成
    ///
    /// チェックリストは`checklist_path`から読み込みます（存在しない場合は空）。
    pub fn new(
        provider: Box<dyn FolderProvider>,
        engine: E,
        converter: Converter,
        checklist_path: impl Into<PathBuf>,
    ) -> Self {
        let checklist_path = checklist_path.into();
        let ledger = Ledger::load(&checklist_path);
        Self {
            provider,
            engine,
            converter,
            ledger,
            checklist_path,
            publish: false,
        }
    }

    /// 生成したPDFをプロバイダへアップロードするか
    pub fn with_publish(mut self, publish: bool) -> Self {
        self.publish = publish;
        self
    }

    /// 現在のチェックリスト
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// チェックリストの保存先
    pub fn checklist_path(&self) -> &Path {
        &self.checklist_path
    }

    /// フォルダ一覧と出力済みPDFの数
    pub fn folder_stats(&self) -> Result<Vec<FolderStat>, XrfPdfError> {
        let folders = self.provider.list_immediate_subfolders()?;
        Ok(folders
            .into_iter()
            .enumerate()
            .map(|(i, folder)| FolderStat {
                index: i + 1,
                name: folder.name.clone(),
                completed: count_artifacts(&self.provider.local_dir(&folder)),
                folder,
            })
            .collect())
    }

    /// すべてのフォルダの出力済みPDFをチェックリストへ反映し、保存する
    ///
    /// 新たに完了になった項目の数を返します。
    pub fn scan_all(&mut self) -> Result<usize, XrfPdfError> {
        let dirs: Vec<PathBuf> = self
            .provider
            .list_immediate_subfolders()?
            .iter()
            .map(|folder| self.provider.local_dir(folder))
            .collect();

        let changed = reconcile(&dirs, &mut self.ledger);
        self.ledger.save(&self.checklist_path)?;
        info!("Scan complete. Checklist updated ({} new)", changed);
        Ok(changed)
    }

    /// 1つのフォルダを変換する
    ///
    /// # 処理フロー
    ///
    /// 1. フォルダの出力済みPDFをチェックリストへ反映
    /// 2. 一時ディレクトリへソースをダウンロード（一時ディレクトリは必ず削除される）
    /// 3. 未完了のソースを選択
    /// 4. `local_dir/automation_output`へ変換し、成功したものをチェックリストに記録
    ///
    /// ソースごとの失敗は集計に含まれます。フォルダの列挙・転送の失敗はエラーとして返されます。
    pub fn convert_folder(&mut self, folder: &Folder) -> Result<FolderSummary, XrfPdfError> {
        let mut summary = FolderSummary {
            folder: folder.name.clone(),
            ..Default::default()
        };

        // 1. 既存の出力を反映
        let local_dir = self.provider.local_dir(folder);
        reconcile(&[&local_dir], &mut self.ledger);

        // 2. ダウンロード
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir()?;
        let sources = self.provider.download_sources(folder, staging.path())?;

        // 3. 選択
        let selection = select_pending(&sources, &self.ledger, self.converter.unit_codes());
        for source in &selection.unrecognized {
            warn!("Skipped {}: pattern not recognized", source.file_name());
        }
        summary.unrecognized = selection.unrecognized.len();
        summary.already_done = selection.done.len();

        if selection.pending.is_empty() {
            info!("No new files in {}", folder.name);
            return Ok(summary);
        }

        // 4. 変換
        let out_dir = local_dir.join(OUTPUT_SUBDIR);
        fs::create_dir_all(&out_dir)?;

        let total = selection.pending.len();
        info!("Converting {} file(s) in {}...", total, folder.name);

        let ledger = &mut self.ledger;
        let provider = self.provider.as_ref();
        let publish = self.publish;
        let mut finished = 0;
        let mut uploaded = 0;

        let report = self.converter.convert_batch(
            &self.engine,
            selection.pending,
            &out_dir,
            |source, outcome| {
                finished += 1;
                info!("[{}/{}] {} ... {}", finished, total, source.file_name(), outcome);

                let Some(artifact) = outcome.artifact() else {
                    return;
                };
                ledger.mark_complete(&artifact.identity);

                if publish {
                    match provider.upload_pdf(&artifact.path) {
                        Ok(()) => uploaded += 1,
                        Err(e) => error!("Upload failed for {}: {}", artifact.path.display(), e),
                    }
                }
            },
        )?;

        summary.report = report;
        summary.uploaded = uploaded;
        Ok(summary)
    }

    /// 複数のフォルダを変換する
    ///
    /// 1つのフォルダの失敗は他のフォルダの処理を妨げません。
    /// 一部のフォルダが失敗した場合でも、チェックリストは最後に必ず保存されます。
    pub fn convert_folders(&mut self, folders: &[Folder]) -> Result<RunSummary, XrfPdfError> {
        let mut summary = RunSummary {
            checklist: self.checklist_path.clone(),
            ..Default::default()
        };

        for folder in folders {
            match self.convert_folder(folder) {
                Ok(folder_summary) => {
                    summary.totals += folder_summary.report;
                    summary.unrecognized += folder_summary.unrecognized;
                    summary.folders.push(folder_summary);
                }
                Err(e) => {
                    error!("Folder {} failed: {}", folder.name, e);
                    summary.folders.push(FolderSummary {
                        folder: folder.name.clone(),
                        error: Some(e.to_string()),
                        ..Default::default()
                    });
                }
            }
        }

        self.ledger.save(&self.checklist_path)?;
        summary.completed = self.ledger.completed_count();
        Ok(summary)
    }

    /// チェックリストを書き出す
    ///
    /// ディレクトリが指定された場合は既定のファイル名で書き出します。
    pub fn export_checklist(&self, path: &Path) -> Result<PathBuf, XrfPdfError> {
        let written = self.ledger.export(path)?;
        info!("Checklist exported to {}", written.display());
        Ok(written)
    }

    /// チェックリストを空にする
    pub fn reset_checklist(&mut self) -> Result<(), XrfPdfError> {
        self.ledger.reset(&self.checklist_path)?;
        info!("Checklist reset");
        Ok(())
    }

    /// チェックリストを保存する
    pub fn save_checklist(&self) -> Result<(), XrfPdfError> {
        self.ledger.save(&self.checklist_path)
    }
}
