//! Output Markup Module
//!
//! ワークシートとページレイアウトから、PDFへ組版するためのTypstマークアップを
//! 生成するモジュール。
//!
//! 同じ入力からは常に同じマークアップを生成します。

use std::fmt::Write;

use crate::grid::{SheetLayout, Worksheet};

/// フォントサイズの下限（pt）
const MIN_FONT_SIZE: f64 = 4.0;

/// フォントサイズの上限（pt）
const MAX_FONT_SIZE: f64 = 10.0;

/// セルの左右パディング（pt、片側）
const CELL_INSET: f64 = 3.0;

/// 1文字あたりの平均幅（em）
const CHAR_WIDTH_EM: f64 = 0.5;

/// Typstマークアップ生成器
#[derive(Debug, Clone, Default)]
pub struct TypstMarkup {
    /// 本文のフォントファミリー（未指定の場合はTypstの既定）
    font_family: Option<String>,
}

impl TypstMarkup {
    /// 新しいTypstMarkupインスタンスを生成
    pub fn new(font_family: Option<String>) -> Self {
        Self { font_family }
    }

    /// ワークシートをTypstマークアップに変換
    ///
    /// 横向きのUS Letter用紙に、列幅の比率を保ったまま幅1ページに収まる表を出力します。
    /// ヘッダー行は太字で各ページに繰り返され、フッターに`Page N of M`を表示します。
    pub fn render(&self, sheet: &Worksheet, layout: &SheetLayout) -> String {
        let mut out = String::new();
        let page = &layout.page;

        // 見出しの位置は用紙端からの距離で指定されるため、本文との間隔へ変換する
        let header_ascent = (page.margin_top - page.header_margin).max(0.0);
        let footer_descent = (page.margin_bottom - page.footer_margin).max(0.0);

        let _ = writeln!(
            out,
            "#set page(paper: \"us-letter\", flipped: true, \
             margin: (left: {lr}in, right: {lr}in, top: {top}in, bottom: {bottom}in), \
             header-ascent: {ascent}in, footer-descent: {descent}in, \
             footer: context align(center)[Page #counter(page).display() of #counter(page).final().first()])",
            lr = inches(page.margin_left_right),
            top = inches(page.margin_top),
            bottom = inches(page.margin_bottom),
            ascent = inches(header_ascent),
            descent = inches(footer_descent),
        );

        let font_size = Self::font_size(layout, page.printable_width_pt());
        match &self.font_family {
            Some(family) => {
                let _ = writeln!(
                    out,
                    "#set text(font: {}, size: {:.2}pt)",
                    string_literal(family),
                    font_size
                );
            }
            None => {
                let _ = writeln!(out, "#set text(size: {:.2}pt)", font_size);
            }
        }

        if sheet.col_count() == 0 {
            return out;
        }

        let columns = layout
            .column_widths
            .iter()
            .map(|w| format!("{}fr", w))
            .collect::<Vec<_>>()
            .join(", ");

        // ヘッダー行より上の行（タイトルなど）は繰り返さない
        let preamble = &sheet.rows()[..layout.header_row.min(sheet.row_count())];
        if !preamble.is_empty() {
            let _ = writeln!(
                out,
                "#table(columns: ({}), stroke: none, inset: {}pt,",
                columns, CELL_INSET
            );
            for row in preamble {
                Self::write_row(&mut out, row);
            }
            out.push_str(")\n");
        }

        let [r, g, b] = page.stripe_rgb;
        let _ = writeln!(
            out,
            "#table(columns: ({}), stroke: none, inset: {}pt,",
            columns, CELL_INSET
        );
        let _ = writeln!(
            out,
            "  fill: (x, y) => if calc.odd(y) {{ rgb({}, {}, {}) }},",
            r, g, b
        );

        if let Some(header) = sheet.rows().get(layout.header_row) {
            let cells = header
                .iter()
                .map(|cell| format!("strong({})", string_literal(cell)))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "  table.header(repeat: true, {}),", cells);
        }

        for row in sheet.rows().iter().skip(layout.header_row + 1) {
            Self::write_row(&mut out, row);
        }
        out.push_str(")\n");

        out
    }

    /// 1行分のセルを出力（内部ヘルパー）
    fn write_row(out: &mut String, row: &[String]) {
        let cells = row
            .iter()
            .map(|cell| string_literal(cell))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(out, "  {},", cells);
    }

    /// 列幅の合計が印刷可能幅に収まるフォントサイズを計算
    pub(crate) fn font_size(layout: &SheetLayout, printable_width_pt: f64) -> f64 {
        let cols = layout.column_widths.len() as f64;
        let total_chars: usize = layout.column_widths.iter().sum();
        if total_chars == 0 {
            return MAX_FONT_SIZE;
        }

        let available = printable_width_pt - CELL_INSET * 2.0 * cols;
        let size = available / (CHAR_WIDTH_EM * total_chars as f64);
        size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
    }
}

/// インチ値の表記（末尾の0を除去）
fn inches(value: f64) -> String {
    let fixed = format!("{:.3}", value);
    fixed.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Typstの文字列リテラルに変換
fn string_literal(value: &str) -> String {
    let mut literal = String::with_capacity(value.len() + 2);
    literal.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => literal.push_str("\\\\"),
            '"' => literal.push_str("\\\""),
            '\n' => literal.push_str("\\n"),
            '\r' => literal.push_str("\\r"),
            '\t' => literal.push_str("\\t"),
            c => literal.push(c),
        }
    }
    literal.push('"');
    literal
}
