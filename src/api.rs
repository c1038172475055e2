//! Public API Types
//!
//! 変換パイプラインの結果を表す公開型を定義するモジュール。
//!
//! 個々のソースファイルの変換は失敗してもバッチ全体を中断しないため、
//! 例外ではなくタグ付きの結果として呼び出し元へ返されます。

use std::fmt;

use serde::Serialize;

use crate::types::OutputArtifact;

/// 1つのソースファイルの変換結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    /// 出力PDFを生成した
    Converted(OutputArtifact),

    /// 変換対象外としてスキップした
    Skipped(SkipReason),

    /// 変換に失敗した（次回の実行で再試行される）
    Failed {
        /// 失敗した工程
        stage: FailureStage,
        /// エラーメッセージ
        message: String,
    },
}

impl ConversionOutcome {
    /// 変換に成功した場合は出力PDFを返す
    pub fn artifact(&self) -> Option<&OutputArtifact> {
        match self {
            ConversionOutcome::Converted(artifact) => Some(artifact),
            _ => None,
        }
    }

    pub(crate) fn failed(stage: FailureStage, message: impl Into<String>) -> Self {
        ConversionOutcome::Failed {
            stage,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConversionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionOutcome::Converted(artifact) => {
                write!(f, "converted -> {}", artifact.path.display())
            }
            ConversionOutcome::Skipped(reason) => write!(f, "skipped, {}", reason),
            ConversionOutcome::Failed { stage, message } => {
                write!(f, "failed at {}: {}", stage, message)
            }
        }
    }
}

/// スキップの理由
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum SkipReason {
    /// シートが実質的に空
    EmptySheet,

    /// ファイル名から識別子を抽出できない
    UnrecognizedName,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::EmptySheet => f.write_str("empty"),
            SkipReason::UnrecognizedName => f.write_str("pattern not recognized"),
        }
    }
}

/// 変換が失敗した工程
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub enum FailureStage {
    /// レンダリングセッションを起動できなかった
    Session,

    /// ソースファイルを開けなかった
    Open,

    /// PDFの書き出しに失敗した
    Export,

    /// 出力先への移動に失敗した
    Move,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureStage::Session => "session",
            FailureStage::Open => "open",
            FailureStage::Export => "export",
            FailureStage::Move => "move",
        };
        f.write_str(name)
    }
}

/// バッチ変換の集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// 変換に成功した件数
    pub converted: usize,

    /// スキップした件数
    pub skipped: usize,

    /// 失敗した件数
    pub failed: usize,
}

impl BatchReport {
    /// 結果を集計に加える
    pub fn record(&mut self, outcome: &ConversionOutcome) {
        match outcome {
            ConversionOutcome::Converted(_) => self.converted += 1,
            ConversionOutcome::Skipped(_) => self.skipped += 1,
            ConversionOutcome::Failed { .. } => self.failed += 1,
        }
    }

    /// 処理した件数の合計
    pub fn total(&self) -> usize {
        self.converted + self.skipped + self.failed
    }
}

impl std::ops::AddAssign for BatchReport {
    fn add_assign(&mut self, other: Self) {
        self.converted += other.converted;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}
