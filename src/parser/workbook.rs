//! Workbook Parser
//!
//! calamineとcsvクレートを使用して、ソーススプレッドシートの先頭シートを
//! 表示用文字列のグリッドとして読み込みます。

use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use tracing::debug;

use crate::error::XrfPdfError;
use crate::formatter::CellFormatter;
use crate::grid::Worksheet;
use crate::security::SecurityConfig;
use crate::types::CellValue;

/// calamineで開く拡張子
const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// ワークブックパーサー
///
/// ファイルサイズ制限とセル書式化を保持し、1ファイルずつ先頭シートを読み込みます。
#[derive(Debug, Default)]
pub(crate) struct WorkbookParser {
    /// セルフォーマッター
    formatter: CellFormatter,

    /// 入力ファイルの制限
    security: SecurityConfig,
}

impl WorkbookParser {
    /// 新しいWorkbookParserインスタンスを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// サイズ上限を指定してパーサーを生成
    #[cfg(test)]
    pub fn with_security(security: SecurityConfig) -> Self {
        Self {
            formatter: CellFormatter::new(),
            security,
        }
    }

    /// ソースファイルの先頭シートを読み込む
    ///
    /// # 戻り値
    ///
    /// * `Ok(Worksheet)` - 先頭シートの使用範囲
    /// * `Err(XrfPdfError::SecurityViolation)` - ファイルサイズが上限を超える場合
    /// * `Err(XrfPdfError::Parse)` / `Err(XrfPdfError::Csv)` - 解析に失敗した場合
    /// * `Err(XrfPdfError::Config)` - 対応していない拡張子、またはシートが存在しない場合
    pub fn parse_first_sheet(&self, path: &Path) -> Result<Worksheet, XrfPdfError> {
        self.security.check_file_size(path)?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        if extension == "csv" {
            return self.parse_csv(path);
        }
        if WORKBOOK_EXTENSIONS.contains(&extension.as_str()) {
            return self.parse_workbook(path);
        }

        Err(XrfPdfError::Config(format!(
            "Unsupported source file type: {}",
            path.display()
        )))
    }

    /// calamineでワークブックを読み込む（内部ヘルパー）
    fn parse_workbook(&self, path: &Path) -> Result<Worksheet, XrfPdfError> {
        let mut workbook = open_workbook_auto(path)?;
        let name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| XrfPdfError::Config(format!("No sheets in {}", path.display())))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| XrfPdfError::Config(format!("No sheets in {}", path.display())))??;

        debug!(
            "Read sheet '{}' of {} ({} x {})",
            name,
            path.display(),
            range.height(),
            range.width()
        );

        Ok(Worksheet::from_rows(name, self.format_range(&range)))
    }

    /// 使用範囲を表示用文字列に変換（内部ヘルパー）
    fn format_range(&self, range: &Range<Data>) -> Vec<Vec<String>> {
        range
            .rows()
            .map(|row| {
                row.iter()
                    .map(|cell| self.formatter.format_cell(&Self::cell_value(cell)))
                    .collect()
            })
            .collect()
    }

    /// calamineのセルデータをCellValueへ変換（内部ヘルパー）
    fn cell_value(cell: &Data) -> CellValue {
        match cell {
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) => CellValue::String(s.clone()),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => CellValue::DateSerial(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::String(s.clone()),
            Data::Error(e) => CellValue::Error(e.to_string()),
            Data::Empty => CellValue::Empty,
        }
    }

    /// CSVファイルを読み込む（内部ヘルパー）
    ///
    /// ヘッダー行も含めてすべての行をデータとして扱い、列数の異なる行を許容します。
    fn parse_csv(&self, path: &Path) -> Result<Worksheet, XrfPdfError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
        }

        if let Some(first) = rows.first_mut().and_then(|row| row.first_mut()) {
            if let Some(stripped) = first.strip_prefix('\u{feff}') {
                *first = stripped.to_string();
            }
        }

        // 末尾の空行は使用範囲に含めない
        while rows
            .last()
            .is_some_and(|row| row.iter().all(|cell| cell.is_empty()))
        {
            rows.pop();
        }

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Sheet1")
            .to_string();
        Ok(Worksheet::from_rows(name, rows))
    }
}
