//! Typst Rendering Engine
//!
//! typst-as-libでマークアップを組版し、typst-pdfでPDFを書き出すエンジン。
//!
//! セッションはフォントと組版エンジンを1度だけ構築し、ジョブごとに
//! シートのマークアップだけを差し替えてコンパイルします。

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info, warn};
use typst::diag::{FileError, FileResult};
use typst::foundations::Bytes;
use typst::syntax::{FileId, Source, VirtualPath};
use typst::text::Font;
use typst_as_lib::file_resolver::FileResolver;
use typst_as_lib::typst_kit_options::TypstKitFontOptions;
use typst_as_lib::TypstEngine as TypstCompiler;

use crate::error::XrfPdfError;
use crate::grid::{SheetLayout, Worksheet};
use crate::output::TypstMarkup;
use crate::render::{RenderEngine, RenderSession};

/// 組版対象のシートの仮想パス
const SHEET_PATH: &str = "/sheet.typ";

/// Typstレンダリングエンジン
///
/// フォントファイルのパスのみを保持し、実際の読み込みはセッション起動時に行います。
/// 同梱フォント（typst-assets）は常に利用可能で、指定したフォントが優先されます。
#[derive(Debug, Clone, Default)]
pub struct TypstEngine {
    font_paths: Vec<PathBuf>,
    font_family: Option<String>,
}

impl TypstEngine {
    /// 新しいTypstEngineインスタンスを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// セッションで読み込むフォントファイルを追加
    pub fn with_fonts<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.font_paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// 本文のフォントファミリーを指定
    pub fn with_font_family(mut self, family: Option<String>) -> Self {
        self.font_family = family.filter(|f| !f.trim().is_empty());
        self
    }

    /// フォントファイルを読み込み、含まれるフェイスをすべて返す
    fn load_fonts(&self) -> Result<Vec<Font>, XrfPdfError> {
        let mut fonts = Vec::new();
        for path in &self.font_paths {
            let bytes = fs::read(path).map_err(|e| {
                XrfPdfError::Render(format!("Failed to read font {}: {}", path.display(), e))
            })?;
            let faces: Vec<Font> = Font::iter(Bytes::new(bytes)).collect();
            if faces.is_empty() {
                return Err(XrfPdfError::Render(format!(
                    "No usable font faces in {}",
                    path.display()
                )));
            }
            fonts.extend(faces);
        }
        Ok(fonts)
    }
}

impl RenderEngine for TypstEngine {
    type Session = TypstSession;

    fn start_session(&self) -> Result<TypstSession, XrfPdfError> {
        let fonts = self.load_fonts()?;
        debug!("Rendering session started with {} custom font face(s)", fonts.len());

        let sheet = SheetSource::new();
        let compiler = TypstCompiler::builder()
            .fonts(fonts)
            .search_fonts_with(
                TypstKitFontOptions::new()
                    .include_system_fonts(false)
                    .include_embedded_fonts(true),
            )
            .add_file_resolver(sheet.clone())
            .build();

        Ok(TypstSession {
            compiler,
            sheet,
            markup: TypstMarkup::new(self.font_family.clone()),
            exported: 0,
        })
    }
}

/// ジョブごとに差し替えるシートのソース
#[derive(Clone)]
struct SheetSource {
    id: FileId,
    current: Arc<Mutex<Source>>,
}

impl SheetSource {
    fn new() -> Self {
        let id = FileId::new(None, VirtualPath::new(SHEET_PATH));
        Self {
            id,
            current: Arc::new(Mutex::new(Source::new(id, String::new()))),
        }
    }

    fn replace(&self, markup: String) {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        *current = Source::new(self.id, markup);
    }
}

impl FileResolver for SheetSource {
    fn resolve_binary(&self, id: FileId) -> FileResult<Cow<'_, Bytes>> {
        Err(FileError::NotFound(id.vpath().as_rootless_path().to_path_buf()))
    }

    fn resolve_source(&self, id: FileId) -> FileResult<Cow<'_, Source>> {
        if id != self.id {
            return Err(FileError::NotFound(id.vpath().as_rootless_path().to_path_buf()));
        }
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Cow::Owned(current.clone()))
    }
}

/// Typstレンダリングセッション
///
/// 構築済みの組版エンジンを保持し、ジョブごとに1ページ分の表を組版します。
pub struct TypstSession {
    compiler: TypstCompiler,
    sheet: SheetSource,
    markup: TypstMarkup,
    exported: usize,
}

impl TypstSession {
    /// マークアップをPDFのバイト列へ組版
    fn compile(&self, markup: String) -> Result<Vec<u8>, XrfPdfError> {
        self.sheet.replace(markup);

        // compiled.outputが組版結果、compiled.warningsは警告
        let compiled = self.compiler.compile(self.sheet.id);
        for warning in &compiled.warnings {
            warn!("Typst: {}", warning.message);
        }
        let document = compiled
            .output
            .map_err(|e| XrfPdfError::Render(format!("Typst compilation failed: {:?}", e)))?;

        let options = typst_pdf::PdfOptions::default();
        let pdf = typst_pdf::pdf(&document, &options)
            .map_err(|e| XrfPdfError::Render(format!("PDF generation failed: {:?}", e)))?;

        Ok(pdf.into())
    }
}

impl RenderSession for TypstSession {
    fn export_pdf(
        &mut self,
        sheet: &Worksheet,
        layout: &SheetLayout,
        dest: &Path,
    ) -> Result<(), XrfPdfError> {
        let markup = self.markup.render(sheet, layout);
        let pdf = self.compile(markup)?;
        fs::write(dest, pdf)?;
        self.exported += 1;
        Ok(())
    }
}

impl Drop for TypstSession {
    fn drop(&mut self) {
        info!("Rendering session closed after {} export(s)", self.exported);
    }
}
