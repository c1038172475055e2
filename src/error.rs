//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。
//!
//! 個々のソースファイルの変換失敗はエラーではなく、
//! [`ConversionOutcome`](crate::ConversionOutcome)として呼び出し元に返される。

use thiserror::Error;

/// xrfpdfクレート全体で使用するエラー型
///
/// 設定の読み込み、チェックリストの入出力、フォルダプロバイダとの通信、
/// レンダリングセッションの起動などで発生するエラーを統一的に扱います。
///
/// # エラーの種類
///
/// - `Io`: I/O操作中に発生したエラー
/// - `Parse`: スプレッドシートの解析エラー（calamine由来）
/// - `Csv`: CSVの読み書きエラー
/// - `Config` / `ConfigFormat`: 設定の検証・解析エラー（致命的）
/// - `Remote`: リモートフォルダプロバイダとの通信エラー
/// - `Render`: レンダリングエンジンのエラー
/// - `SecurityViolation`: ファイル名・サイズ制限違反
/// - `WorkerPool`: 並列変換用スレッドプールの構築エラー
#[derive(Error, Debug)]
pub enum XrfPdfError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// スプレッドシートの解析中に発生したエラー
    ///
    /// calamineクレートがファイルを解析する際に発生したエラーです。
    #[error("Failed to parse spreadsheet: {0}")]
    Parse(#[from] calamine::Error),

    /// CSVの読み書きエラー
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// 設定の検証に失敗したエラー
    ///
    /// 設定ファイルが見つからない、必須項目が欠けている、値が不正な場合に発生します。
    /// プロセスはリモート操作・ファイル操作の前に終了します。
    ///
    /// # 例
    ///
    /// ```rust
    /// use xrfpdf::{ConverterBuilder, XrfPdfError};
    ///
    /// let result = ConverterBuilder::new().with_workers(0).build();
    ///
    /// match result {
    ///     Err(XrfPdfError::Config(msg)) => {
    ///         println!("設定エラー: {}", msg);
    ///     }
    ///     _ => {}
    /// }
    /// ```
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML設定ファイルの構文エラー
    #[error("Invalid configuration file: {0}")]
    ConfigFormat(#[from] toml::de::Error),

    /// リモートフォルダプロバイダとの通信エラー
    ///
    /// フォルダ単位の操作の呼び出し元に返され、他のフォルダの処理は継続します。
    #[error("Remote provider error: {0}")]
    Remote(String),

    /// レンダリングエンジンのエラー
    #[error("Render error: {0}")]
    Render(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// パストラバーサルを含むファイル名や、サイズ上限を超えるファイルを検出した場合に
    /// 発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// 並列変換用ワーカープールの構築エラー
    #[error("Worker pool error: {0}")]
    WorkerPool(String),
}

impl From<reqwest::Error> for XrfPdfError {
    fn from(err: reqwest::Error) -> Self {
        XrfPdfError::Remote(err.to_string())
    }
}
