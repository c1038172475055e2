//! Selector Module
//!
//! ダウンロードしたソースファイルのうち、まだ変換されていないものを選ぶモジュール。

use crate::identity::{extract_identity, UnitCodes};
use crate::ledger::Ledger;
use crate::types::SourceFile;

/// 変換対象の選択結果
///
/// いずれのリストも入力順を保持します。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// 変換が必要なソース
    pub pending: Vec<SourceFile>,

    /// ファイル名のパターンを認識できなかったソース
    pub unrecognized: Vec<SourceFile>,

    /// チェックリスト上で完了済みのソース
    pub done: Vec<SourceFile>,
}

/// 未完了のソースを選ぶ
///
/// 識別子を抽出できないソースは`unrecognized`へ、完了済みのソースは`done`へ振り分け、
/// それ以外を`pending`として返します。
pub fn select_pending(sources: &[SourceFile], ledger: &Ledger, units: &UnitCodes) -> Selection {
    let mut selection = Selection::default();

    for source in sources {
        match extract_identity(&source.stem, units) {
            None => selection.unrecognized.push(source.clone()),
            Some(identity) if ledger.is_complete(&identity) => {
                selection.done.push(source.clone())
            }
            Some(_) => selection.pending.push(source.clone()),
        }
    }

    selection
}
