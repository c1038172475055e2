//! Render Module
//!
//! ソーススプレッドシートを開き、整形済みのPDFを書き出すレンダリングエンジンの抽象化。
//!
//! エンジンは複数のワーカーから共有され、各ワーカーは[`RenderEngine::start_session`]で
//! 自分専用のセッションを1つだけ起動します。セッションの起動は高コストな処理
//! （フォントの読み込みなど）を含むため、1つのセッションで複数のジョブを処理します。
//! セッションは`Drop`で解放されるため、成功・失敗にかかわらず必ず閉じられます。

mod typst_engine;

use std::path::Path;

use crate::error::XrfPdfError;
use crate::grid::{SheetLayout, Worksheet};
use crate::parser::WorkbookParser;

pub use typst_engine::{TypstEngine, TypstSession};

/// レンダリングエンジン
///
/// 並列変換ではワーカースレッド間で共有されるため`Sync`が必要です。
pub trait RenderEngine: Sync {
    /// エンジンのセッション型
    type Session: RenderSession;

    /// 新しいセッションを起動
    fn start_session(&self) -> Result<Self::Session, XrfPdfError>;
}

/// レンダリングセッション
///
/// 1つのワーカーが所有し、ジョブを1件ずつ処理します。
pub trait RenderSession {
    /// ソースファイルの先頭シートを開く
    ///
    /// 既定の実装はcalamine/csvで読み込みます。
    fn open(&mut self, path: &Path) -> Result<Worksheet, XrfPdfError> {
        WorkbookParser::new().parse_first_sheet(path)
    }

    /// レイアウトを適用したワークシートをPDFとして書き出す
    fn export_pdf(
        &mut self,
        sheet: &Worksheet,
        layout: &SheetLayout,
        dest: &Path,
    ) -> Result<(), XrfPdfError>;
}
