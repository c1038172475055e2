//! Parser Module
//!
//! calamineとcsvクレートを使用したソーススプレッドシートの読み込み。
//! 先頭シートの使用範囲を表示用文字列のグリッドとして抽出します。

mod workbook;

pub(crate) use workbook::WorkbookParser;
