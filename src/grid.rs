//! Grid Module
//!
//! ワークシートの稠密なグリッドと、PDF出力のためのページレイアウトを
//! 計算するモジュール。
//!
//! レイアウトの規則:
//!
//! - ヘッダー行: 使用範囲内で空でないセルが最も多い行（同数の場合は先頭）
//! - ストライプ: ヘッダー行の次の行から1行おき
//! - 列幅: ヘッダー行以降の表示幅の最大値（自動調整）

use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthStr;

/// ページ設定
///
/// 余白はインチ単位です。用紙は横向き、幅1ページに収め、高さは制限しません。
/// 枠線と行列見出しは印刷しません。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSetup {
    /// 左右の余白
    pub margin_left_right: f64,
    /// 上余白
    pub margin_top: f64,
    /// 下余白
    pub margin_bottom: f64,
    /// ヘッダー位置（用紙上端から）
    pub header_margin: f64,
    /// フッター位置（用紙下端から）
    pub footer_margin: f64,
    /// ストライプ行の背景色
    pub stripe_rgb: [u8; 3],
}

impl Default for PageSetup {
    fn default() -> Self {
        Self {
            margin_left_right: 0.25,
            margin_top: 0.50,
            margin_bottom: 0.55,
            header_margin: 0.30,
            footer_margin: 0.30,
            stripe_rgb: [242, 242, 242],
        }
    }
}

impl PageSetup {
    /// 設定値を検証
    pub(crate) fn validate(&self) -> Result<(), String> {
        let margins = [
            ("margin_left_right", self.margin_left_right),
            ("margin_top", self.margin_top),
            ("margin_bottom", self.margin_bottom),
            ("header_margin", self.header_margin),
            ("footer_margin", self.footer_margin),
        ];
        for (name, value) in margins {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("Invalid page margin {}: {}", name, value));
            }
        }
        if self.margin_left_right * 2.0 >= LANDSCAPE_WIDTH_IN {
            return Err(format!(
                "Left/right margins leave no printable width: {}",
                self.margin_left_right
            ));
        }
        Ok(())
    }

    /// 横向きUS Letterの印刷可能幅（ポイント）
    pub(crate) fn printable_width_pt(&self) -> f64 {
        (LANDSCAPE_WIDTH_IN - self.margin_left_right * 2.0) * 72.0
    }
}

/// 横向きUS Letterの幅（インチ）
pub(crate) const LANDSCAPE_WIDTH_IN: f64 = 11.0;

/// ワークシート（先頭シートの使用範囲）
///
/// 各セルは表示用に書式化済みの文字列です。すべての行は同じ列数に揃えられます。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worksheet {
    name: String,
    rows: Vec<Vec<String>>,
    cols: usize,
}

impl Worksheet {
    /// 行データからワークシートを生成
    ///
    /// 行ごとの列数が異なる場合は空文字列で補完します。
    pub fn from_rows(name: impl Into<String>, mut rows: Vec<Vec<String>>) -> Self {
        let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(cols, String::new());
        }
        if cols == 0 {
            rows.clear();
        }
        Self {
            name: name.into(),
            rows,
            cols,
        }
    }

    /// シート名
    pub fn name(&self) -> &str {
        &self.name
    }

    /// 行数
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 列数
    pub fn col_count(&self) -> usize {
        self.cols
    }

    /// 行データ
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// 実質的に空のシートかどうか
    ///
    /// セルがない場合、または使用範囲が1セルのみでその値が空白の場合に`true`です。
    pub fn is_effectively_empty(&self) -> bool {
        match (self.rows.len(), self.cols) {
            (0, _) | (_, 0) => true,
            (1, 1) => self.rows[0][0].trim().is_empty(),
            _ => false,
        }
    }
}

/// ページレイアウト
#[derive(Debug, Clone, PartialEq)]
pub struct SheetLayout {
    /// ヘッダー行（0始まり）。太字で、各ページに繰り返し印刷される
    pub header_row: usize,

    /// 背景色を付ける行（0始まり）
    pub stripe_rows: Vec<usize>,

    /// 列ごとの幅（表示幅の文字数、最小1）
    pub column_widths: Vec<usize>,

    /// ページ設定
    pub page: PageSetup,
}

impl SheetLayout {
    /// ワークシートからレイアウトを計算
    pub fn plan(sheet: &Worksheet, page: &PageSetup) -> Self {
        let header_row = Self::find_header_row(sheet);
        let stripe_rows = ((header_row + 1)..sheet.row_count()).step_by(2).collect();
        let column_widths = Self::autofit_widths(sheet, header_row);

        Self {
            header_row,
            stripe_rows,
            column_widths,
            page: page.clone(),
        }
    }

    /// 空でないセルが最も多い行を探す（内部ヘルパー）
    fn find_header_row(sheet: &Worksheet) -> usize {
        let mut header_row = 0;
        let mut max_populated = 0;

        for (idx, row) in sheet.rows().iter().enumerate() {
            let populated = row.iter().filter(|cell| !cell.is_empty()).count();
            if populated > max_populated {
                max_populated = populated;
                header_row = idx;
            }
        }

        header_row
    }

    /// ヘッダー行以降の内容から列幅を計算（内部ヘルパー）
    fn autofit_widths(sheet: &Worksheet, header_row: usize) -> Vec<usize> {
        let mut widths = vec![1; sheet.col_count()];

        for row in sheet.rows().iter().skip(header_row) {
            for (col, cell) in row.iter().enumerate() {
                let width = cell
                    .lines()
                    .map(|line| line.trim().width())
                    .max()
                    .unwrap_or(0);
                widths[col] = widths[col].max(width);
            }
        }

        widths
    }

    /// ストライプ行かどうか
    pub fn is_striped(&self, row: usize) -> bool {
        row > self.header_row && (row - self.header_row) % 2 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(rows: &[&[&str]]) -> Worksheet {
        Worksheet::from_rows(
            "Sheet1",
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn test_from_rows_pads_ragged_rows() {
        let ws = sheet(&[&["a"], &["b", "c", "d"]]);
        assert_eq!(ws.col_count(), 3);
        assert_eq!(ws.rows()[0], vec!["a", "", ""]);
    }

    #[test]
    fn test_is_effectively_empty() {
        assert!(Worksheet::from_rows("S", vec![]).is_effectively_empty());
        assert!(sheet(&[&[""]]).is_effectively_empty());
        assert!(sheet(&[&["   "]]).is_effectively_empty());
        assert!(!sheet(&[&["x"]]).is_effectively_empty());
        assert!(!sheet(&[&["", ""]]).is_effectively_empty());
    }

    #[test]
    fn test_header_row_is_most_populated() {
        let ws = sheet(&[
            &["Report", "", ""],
            &["Room", "Component", "Result"],
            &["Kitchen", "", "Neg"],
            &["Bath", "Door", "Pos"],
        ]);
        let layout = SheetLayout::plan(&ws, &PageSetup::default());
        // 同数の場合は先頭の行
        assert_eq!(layout.header_row, 1);
        assert_eq!(layout.stripe_rows, vec![2]);
        assert!(layout.is_striped(2));
        assert!(!layout.is_striped(3));
        assert!(!layout.is_striped(0));
    }

    #[test]
    fn test_stripes_every_other_row_after_header() {
        let rows: Vec<Vec<String>> = (0..7).map(|i| vec![format!("r{i}"), "v".into()]).collect();
        let ws = Worksheet::from_rows("S", rows);
        let layout = SheetLayout::plan(&ws, &PageSetup::default());
        assert_eq!(layout.header_row, 0);
        assert_eq!(layout.stripe_rows, vec![1, 3, 5]);
    }

    #[test]
    fn test_whitespace_counts_as_populated_for_header() {
        let ws = sheet(&[&["a", "", ""], &[" ", " ", ""]]);
        let layout = SheetLayout::plan(&ws, &PageSetup::default());
        assert_eq!(layout.header_row, 1);
    }

    #[test]
    fn test_autofit_widths_from_header_down() {
        let ws = sheet(&[
            &["A very long report title", ""],
            &["Room", "結果"],
            &["Kitchen", ""],
        ]);
        let layout = SheetLayout::plan(&ws, &PageSetup::default());
        assert_eq!(layout.header_row, 1);
        // タイトル行はヘッダーより上なので列幅に含めない。全角文字は幅2
        assert_eq!(layout.column_widths, vec![7, 4]);
    }

    #[test]
    fn test_empty_column_has_minimum_width() {
        let ws = sheet(&[&["a", "", "b"]]);
        let layout = SheetLayout::plan(&ws, &PageSetup::default());
        assert_eq!(layout.column_widths, vec![1, 1, 1]);
    }

    #[test]
    fn test_page_setup_defaults_and_validation() {
        let page = PageSetup::default();
        assert_eq!(page.margin_left_right, 0.25);
        assert_eq!(page.margin_top, 0.50);
        assert_eq!(page.margin_bottom, 0.55);
        assert_eq!(page.stripe_rgb, [242, 242, 242]);
        assert!(page.validate().is_ok());
        assert_eq!(page.printable_width_pt(), 756.0);

        let bad = PageSetup {
            margin_top: -1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let too_wide = PageSetup {
            margin_left_right: 6.0,
            ..Default::default()
        };
        assert!(too_wide.validate().is_err());
    }

    // プロパティベーステスト
    #[allow(unused_doc_comments)]
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[allow(unused_doc_comments)]
        /// レイアウトの不変条件
        ///
        /// ストライプ行はヘッダー行より後にあり、1行おきに並びます。列幅は列数と一致し、
        /// すべて1以上です。
        proptest! {
            #[test]
            fn test_layout_invariants(
                rows in prop::collection::vec(
                    prop::collection::vec("[a-z ]{0,6}", 0..6),
                    0..20,
                )
            ) {
                let ws = Worksheet::from_rows("S", rows);
                let layout = SheetLayout::plan(&ws, &PageSetup::default());

                prop_assert_eq!(layout.column_widths.len(), ws.col_count());
                prop_assert!(layout.column_widths.iter().all(|w| *w >= 1));
                for pair in layout.stripe_rows.windows(2) {
                    prop_assert_eq!(pair[1] - pair[0], 2);
                }
                for row in &layout.stripe_rows {
                    prop_assert!(*row > layout.header_row);
                    prop_assert!(*row < ws.row_count());
                    prop_assert!(layout.is_striped(*row));
                }
            }
        }
    }
}
