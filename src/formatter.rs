//! Formatter Module
//!
//! セル値を表示用の文字列に変換するモジュール。
//! PDFには書式適用後の文字列がそのまま描画されます。

use chrono::{Duration, NaiveDate};

use crate::types::CellValue;

/// セルフォーマッター
///
/// セル値のフォーマット処理のファサードとして機能します。
#[derive(Debug, Default)]
pub(crate) struct CellFormatter {
    /// 日付フォーマッター
    date_formatter: DateFormatter,

    /// 数値フォーマッター
    number_formatter: NumberFormatter,
}

impl CellFormatter {
    /// 新しいCellFormatterインスタンスを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// セル値を表示用文字列にフォーマット
    pub fn format_cell(&self, value: &CellValue) -> String {
        match value {
            CellValue::Number(n) => self.number_formatter.format(*n),
            CellValue::DateSerial(serial) => self
                .date_formatter
                .format(*serial)
                .unwrap_or_else(|| self.number_formatter.format(*serial)),
            CellValue::String(s) => s.clone(),
            CellValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Error(e) => e.clone(),
            CellValue::Empty => String::new(),
        }
    }
}

/// 日付フォーマッター
///
/// Excelのシリアル日付値をISO 8601形式（YYYY-MM-DD）の文字列に変換します。
///
/// # エポックシステム
///
/// 1900年システム（1899年12月30日起算）として処理します。
/// Excelは存在しない1900年2月29日（シリアル値60）を数えるため、60未満の値は
/// 1日を加算してシリアル値1 = 1900年1月1日になるよう補正します。
#[derive(Debug, Default)]
pub(crate) struct DateFormatter;

impl DateFormatter {
    /// 日付値をフォーマット
    ///
    /// 日付の計算がオーバーフローした場合は`None`を返します。
    pub fn format(&self, serial_value: f64) -> Option<String> {
        if !serial_value.is_finite() {
            return None;
        }
        let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
        let days = serial_value.floor() as i64;
        let days = if days < 60 { days.checked_add(1)? } else { days };
        let date = epoch.checked_add_signed(Duration::try_days(days)?)?;
        Some(date.format("%Y-%m-%d").to_string())
    }
}

/// 数値フォーマッター
///
/// 整数値は小数点なし、それ以外は最大10桁の小数で表示します（末尾の0は除去）。
#[derive(Debug, Default)]
pub(crate) struct NumberFormatter;

impl NumberFormatter {
    pub fn format(&self, value: f64) -> String {
        if !value.is_finite() {
            return value.to_string();
        }
        if value.fract() == 0.0 && value.abs() < 1e15 {
            return format!("{:.0}", value);
        }
        let fixed = format!("{:.10}", value);
        let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
        if trimmed == "-0" {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_formatter_1900_epoch() {
        let formatter = DateFormatter;

        // 1900年1月1日（シリアル値: 1）
        assert_eq!(formatter.format(1.0).as_deref(), Some("1900-01-01"));

        // 1900年1月2日（シリアル値: 2）
        assert_eq!(formatter.format(2.0).as_deref(), Some("1900-01-02"));

        // うるう年バグの前後
        assert_eq!(formatter.format(59.0).as_deref(), Some("1900-02-28"));
        assert_eq!(formatter.format(61.0).as_deref(), Some("1900-03-01"));

        // 2025年1月1日（シリアル値: 45658）
        assert_eq!(formatter.format(45658.0).as_deref(), Some("2025-01-01"));

        // 時刻部分は切り捨て
        assert_eq!(formatter.format(45658.75).as_deref(), Some("2025-01-01"));
    }

    #[test]
    fn test_date_formatter_overflow() {
        let formatter = DateFormatter;
        assert_eq!(formatter.format(f64::NAN), None);
        assert_eq!(formatter.format(1e300), None);
    }

    #[test]
    fn test_number_formatter() {
        let formatter = NumberFormatter;
        assert_eq!(formatter.format(123.45), "123.45");
        assert_eq!(formatter.format(0.0), "0");
        assert_eq!(formatter.format(-123.45), "-123.45");
        assert_eq!(formatter.format(3.0), "3");
        assert_eq!(formatter.format(0.1 + 0.2), "0.3");
        assert_eq!(formatter.format(1.2), "1.2");
    }

    #[test]
    fn test_format_cell_variants() {
        let formatter = CellFormatter::new();
        assert_eq!(formatter.format_cell(&CellValue::Number(1.5)), "1.5");
        assert_eq!(
            formatter.format_cell(&CellValue::String("Lead | Paint".to_string())),
            "Lead | Paint"
        );
        assert_eq!(formatter.format_cell(&CellValue::Bool(true)), "TRUE");
        assert_eq!(formatter.format_cell(&CellValue::Bool(false)), "FALSE");
        assert_eq!(
            formatter.format_cell(&CellValue::Error("#DIV/0!".to_string())),
            "#DIV/0!"
        );
        assert_eq!(formatter.format_cell(&CellValue::Empty), "");
        assert_eq!(
            formatter.format_cell(&CellValue::DateSerial(45658.0)),
            "2025-01-01"
        );
    }

    // プロパティベーステスト
    #[allow(unused_doc_comments)]
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[allow(unused_doc_comments)]
        /// 日付変換の単調性
        ///
        /// シリアル値の整数部の大小関係がISO 8601文字列の大小関係と一致することを確認します。
        proptest! {
            #[test]
            fn test_date_conversion_monotonicity(
                serial1 in 1.0f64..80000.0,
                serial2 in 1.0f64..80000.0
            ) {
                let formatter = DateFormatter;
                let date1 = formatter.format(serial1).unwrap();
                let date2 = formatter.format(serial2).unwrap();

                let (day1, day2) = (serial1.floor(), serial2.floor());
                if day1 < day2 {
                    prop_assert!(date1 <= date2, "{} ({}) > {} ({})", serial1, date1, serial2, date2);
                } else if day1 > day2 {
                    prop_assert!(date1 >= date2, "{} ({}) < {} ({})", serial1, date1, serial2, date2);
                } else {
                    prop_assert_eq!(date1, date2);
                }
            }
        }
    }
}
