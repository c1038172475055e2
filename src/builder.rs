//! Builder Module
//!
//! Fluent Builder APIを提供し、`Converter`インスタンスを段階的に構築する。
//! `Converter`はソーススプレッドシートを1件ずつPDFレポートへ変換する
//! パイプラインと、逐次・並列のバッチ処理を提供します。

use std::fs;
use std::path::Path;
use std::sync::{mpsc, Mutex};

use tempfile::TempPath;
use tracing::{debug, error, info, warn};

use crate::api::{BatchReport, ConversionOutcome, FailureStage, SkipReason};
use crate::error::XrfPdfError;
use crate::grid::{PageSetup, SheetLayout};
use crate::identity::{extract_identity, UnitCodes};
use crate::render::{RenderEngine, RenderSession};
use crate::security::SecurityConfig;
use crate::types::{OutputArtifact, SourceFile};

/// 変換処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct ConversionConfig {
    /// 既知のユニットコード
    pub unit_codes: UnitCodes,

    /// ページ設定
    pub page: PageSetup,

    /// ワーカー数（1の場合は逐次処理）
    pub workers: usize,

    /// 入力ファイルの制限
    pub security: SecurityConfig,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            unit_codes: UnitCodes::new(),
            page: PageSetup::default(),
            workers: 1,
            security: SecurityConfig::default(),
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `Converter`インスタンスを段階的に構築するためのビルダーです。
///
/// # 使用例
///
/// ```rust,no_run
/// use xrfpdf::{ConverterBuilder, UnitCodes};
///
/// # fn main() -> Result<(), xrfpdf::XrfPdfError> {
/// let units: UnitCodes = ["U1", "U2"].into_iter().collect();
/// let converter = ConverterBuilder::new()
///     .with_unit_codes(units)
///     .with_workers(4)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConverterBuilder {
    /// 内部設定（構築中）
    config: ConversionConfig,
}

impl Default for ConverterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - ユニットコード: なし（すべてのファイル名が認識されない）
    /// - ページ設定: [`PageSetup::default`]
    /// - ワーカー数: 1（逐次処理）
    /// - 入力ファイルの最大サイズ: 256MB
    pub fn new() -> Self {
        Self {
            config: ConversionConfig::default(),
        }
    }

    /// 既知のユニットコードを設定する
    pub fn with_unit_codes(mut self, units: UnitCodes) -> Self {
        self.config.unit_codes = units;
        self
    }

    /// ページ設定を指定する
    pub fn with_page_setup(mut self, page: PageSetup) -> Self {
        self.config.page = page;
        self
    }

    /// 並列変換のワーカー数を指定する
    ///
    /// 各ワーカーはレンダリングセッションを1つずつ所有します。
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.workers = workers;
        self
    }

    /// 入力スプレッドシートの最大サイズ（バイト）を指定する
    ///
    /// 上限を超えるソースは開かずに`Failed/Open`として扱われます。
    pub fn with_max_source_file_size(mut self, bytes: u64) -> Self {
        self.config.security.max_source_file_size = bytes;
        self
    }

    /// 設定を検証し、`Converter`インスタンスを生成する
    ///
    /// # エラー
    ///
    /// * `XrfPdfError::Config` - ワーカー数・ファイルサイズ上限が0、またはページ余白が不正な場合
    pub fn build(self) -> Result<Converter, XrfPdfError> {
        // 1. ワーカー数の検証
        if self.config.workers == 0 {
            return Err(XrfPdfError::Config(
                "Worker count must be at least 1".to_string(),
            ));
        }
        if self.config.security.max_source_file_size == 0 {
            return Err(XrfPdfError::Config(
                "Maximum source file size must be greater than 0".to_string(),
            ));
        }

        // 2. ページ設定の検証
        self.config.page.validate().map_err(XrfPdfError::Config)?;

        Ok(Converter {
            config: self.config,
        })
    }
}

/// 変換処理のファサード
///
/// ソーススプレッドシートをPDFレポートへ変換します。ソースごとの失敗は
/// [`ConversionOutcome`]として返され、バッチを中断しません。
#[derive(Debug)]
pub struct Converter {
    /// 変換設定
    config: ConversionConfig,
}

impl Converter {
    /// 既知のユニットコード
    pub fn unit_codes(&self) -> &UnitCodes {
        &self.config.unit_codes
    }

    /// ページ設定
    pub fn page_setup(&self) -> &PageSetup {
        &self.config.page
    }

    /// ワーカー数
    pub fn workers(&self) -> usize {
        self.config.workers
    }

    /// 1つのソースファイルを変換する
    ///
    /// # 処理フロー
    ///
    /// 1. ソースを開く（失敗: `Failed/Open`）
    /// 2. 空のシートはスキップ（`Skipped/EmptySheet`）
    /// 3. ファイル名から識別子を再抽出（失敗: `Skipped/UnrecognizedName`）
    /// 4. レイアウトを計算し、ソースと同じディレクトリの一意な一時PDFへ書き出す
    ///    （失敗: `Failed/Export`）
    /// 5. ワークシートを解放
    /// 6. `output_dir/{property}_{unit}_lease_leadpaint_xrf.pdf`へ移動（失敗: `Failed/Move`）
    ///
    /// 既存の同名PDFは上書きされます。一時PDFは移動しなかった場合に削除されます。
    pub fn convert<S: RenderSession>(
        &self,
        session: &mut S,
        source: &SourceFile,
        output_dir: &Path,
    ) -> ConversionOutcome {
        let file_name = source.file_name();

        // 1. ソースを開く
        if let Err(e) = self.config.security.check_file_size(&source.path) {
            error!("Could not open {}: {}", file_name, e);
            return ConversionOutcome::failed(FailureStage::Open, e.to_string());
        }
        let sheet = match session.open(&source.path) {
            Ok(sheet) => sheet,
            Err(e) => {
                error!("Could not open {}: {}", file_name, e);
                return ConversionOutcome::failed(FailureStage::Open, e.to_string());
            }
        };

        // 2. 空のシート
        if sheet.is_effectively_empty() {
            info!("Skipped {}: empty", file_name);
            return ConversionOutcome::Skipped(SkipReason::EmptySheet);
        }

        // 3. 識別子の再検証
        let Some(identity) = extract_identity(&source.stem, &self.config.unit_codes) else {
            warn!("Skipped {}: pattern not recognized", file_name);
            return ConversionOutcome::Skipped(SkipReason::UnrecognizedName);
        };

        // 4. 書き出し
        let layout = SheetLayout::plan(&sheet, &self.config.page);
        let temp_pdf = match temp_pdf_beside(&source.path) {
            Ok(path) => path,
            Err(e) => {
                error!("Could not create a temporary PDF for {}: {}", file_name, e);
                return ConversionOutcome::failed(FailureStage::Export, e.to_string());
            }
        };
        if let Err(e) = session.export_pdf(&sheet, &layout, &temp_pdf) {
            error!("Export failed for {}: {}", file_name, e);
            return ConversionOutcome::failed(FailureStage::Export, e.to_string());
        }

        // 5. ソースを閉じる
        drop(sheet);

        // 6. 出力先へ移動
        let dest = output_dir.join(identity.artifact_file_name());
        match move_file(&temp_pdf, &dest) {
            Ok(()) => {
                info!("Converted {} -> {}", file_name, dest.display());
                ConversionOutcome::Converted(OutputArtifact {
                    identity,
                    path: dest,
                })
            }
            Err(e) => {
                error!("Could not move PDF for {} to {}: {}", file_name, dest.display(), e);
                ConversionOutcome::failed(FailureStage::Move, e.to_string())
            }
        }
    }

    /// 複数のソースファイルを変換する
    ///
    /// ワーカー数が1の場合は1つのセッションで順番に変換します。2以上の場合は
    /// ワーカーごとに1つのセッションを起動し、共有キューからジョブを取り出して並列に
    /// 変換します。結果は呼び出し元のスレッドで`on_result`に渡されるため、
    /// チェックリストの更新はこのコールバックだけで行えます。
    ///
    /// # 戻り値
    ///
    /// * `Ok(BatchReport)` - 変換結果の集計
    /// * `Err(XrfPdfError)` - 逐次処理でセッションを起動できない場合、
    ///   またはスレッドプールを構築できない場合
    pub fn convert_batch<E, F>(
        &self,
        engine: &E,
        jobs: Vec<SourceFile>,
        output_dir: &Path,
        mut on_result: F,
    ) -> Result<BatchReport, XrfPdfError>
    where
        E: RenderEngine,
        F: FnMut(&SourceFile, &ConversionOutcome),
    {
        let mut report = BatchReport::default();
        if jobs.is_empty() {
            return Ok(report);
        }

        if self.config.workers <= 1 || jobs.len() == 1 {
            let mut session = engine.start_session()?;
            for source in &jobs {
                let outcome = self.convert(&mut session, source, output_dir);
                report.record(&outcome);
                on_result(source, &outcome);
            }
        } else {
            self.convert_parallel(engine, jobs, output_dir, &mut on_result, &mut report)?;
        }

        Ok(report)
    }

    /// 並列変換（内部ヘルパー）
    fn convert_parallel<E, F>(
        &self,
        engine: &E,
        jobs: Vec<SourceFile>,
        output_dir: &Path,
        on_result: &mut F,
        report: &mut BatchReport,
    ) -> Result<(), XrfPdfError>
    where
        E: RenderEngine,
        F: FnMut(&SourceFile, &ConversionOutcome),
    {
        let workers = self.config.workers.min(jobs.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("xrfpdf-worker-{}", i))
            .build()
            .map_err(|e| XrfPdfError::WorkerPool(e.to_string()))?;

        debug!("Converting {} job(s) with {} worker(s)", jobs.len(), workers);

        let queue = Mutex::new(jobs.into_iter());
        let (tx, rx) = mpsc::channel::<(SourceFile, ConversionOutcome)>();

        pool.in_place_scope(|scope| {
            for worker in 0..workers {
                let tx = tx.clone();
                let queue = &queue;
                scope.spawn(move |_| {
                    // ワーカーごとに1つのセッションを所有し、終了時に解放する
                    let mut session = match engine.start_session() {
                        Ok(session) => session,
                        Err(e) => {
                            error!("Worker {} could not start a rendering session: {}", worker, e);
                            return;
                        }
                    };

                    loop {
                        let next = match queue.lock() {
                            Ok(mut jobs) => jobs.next(),
                            Err(_) => None,
                        };
                        let Some(source) = next else {
                            break;
                        };
                        let outcome = self.convert(&mut session, &source, output_dir);
                        if tx.send((source, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(tx);

            // 完了順に届く結果をソースと対応付けて処理する
            for (source, outcome) in rx {
                report.record(&outcome);
                on_result(&source, &outcome);
            }
        });

        // セッションを起動できたワーカーがいなかった場合の残りのジョブ
        let leftover = queue.into_inner().unwrap_or_else(|e| e.into_inner());
        for source in leftover {
            let outcome = ConversionOutcome::failed(
                FailureStage::Session,
                "No rendering session available",
            );
            error!("Could not convert {}: {}", source.file_name(), outcome);
            report.record(&outcome);
            on_result(&source, &outcome);
        }

        Ok(())
    }
}

/// ファイルを移動する
///
/// 同一ファイルシステム上ではrenameで置き換え、失敗した場合（デバイスをまたぐ場合など）は
/// コピーしてから元のファイルを削除します。
/// ソースと同じディレクトリに一意な名前の一時PDFを作成する
///
/// 返された[`TempPath`]は破棄時にファイルを削除します。
fn temp_pdf_beside(source: &Path) -> Result<TempPath, XrfPdfError> {
    let dir = source
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file = tempfile::Builder::new()
        .prefix(".xrfpdf-")
        .suffix(".pdf")
        .tempfile_in(dir)?;
    Ok(file.into_temp_path())
}

pub(crate) fn move_file(src: &Path, dest: &Path) -> Result<(), XrfPdfError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(
                "Rename {} -> {} failed ({}), falling back to copy",
                src.display(),
                dest.display(),
                e
            );
            fs::copy(src, dest)?;
            fs::remove_file(src)?;
            Ok(())
        }
    }
}
