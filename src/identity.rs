//! Identity Module
//!
//! ソースファイル名から（物件, ユニット）の識別子を抽出するモジュール。
//!
//! ファイル名の規則:
//!
//! - 物件コード: 最初の`-`より前の文字列
//! - ユニットコード: `-<unit>-XRF`パターンの`<unit>`部分
//!
//! ユニットコードは既知のユニットコード集合（大文字小文字を区別しない）に
//! 含まれる場合のみ有効です。

use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::types::Identity;

fn property_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^([^-]+)").expect("valid property pattern"))
}

fn unit_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-([^-]+)-XRF").expect("valid unit pattern"))
}

/// 既知のユニットコード集合
///
/// 大文字に正規化して保持します。1回の実行中は変更されません。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitCodes {
    codes: BTreeSet<String>,
}

impl UnitCodes {
    /// 空の集合を生成
    pub fn new() -> Self {
        Self::default()
    }

    /// ユニットコードが含まれるかを判定（大文字小文字を区別しない）
    pub fn contains(&self, unit: &str) -> bool {
        self.codes.contains(&unit.trim().to_uppercase())
    }

    /// 集合が空かどうか
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// 要素数
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// 大文字に正規化されたコードを順に返す
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for UnitCodes {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let codes = iter
            .into_iter()
            .map(|s| s.as_ref().trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self { codes }
    }
}

impl<S: AsRef<str>> Extend<S> for UnitCodes {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.codes.extend(
            iter.into_iter()
                .map(|s| s.as_ref().trim().to_uppercase())
                .filter(|s| !s.is_empty()),
        );
    }
}

/// ファイル名（拡張子なし）から物件コードとユニットコードを抽出する
///
/// どちらも見つからない場合は`None`を返します。ユニットコードが既知の集合に
/// 含まれない場合、ユニットのみ`None`になります。任意の文字列に対してパニックしません。
///
/// # 使用例
///
/// ```rust
/// use xrfpdf::{extract, UnitCodes};
///
/// let units: UnitCodes = ["U9"].into_iter().collect();
/// let (property, unit) = extract("ABC-something-U9-XRF-extra", &units);
/// assert_eq!(property.as_deref(), Some("ABC"));
/// assert_eq!(unit.as_deref(), Some("U9"));
///
/// let (property, unit) = extract("ABC-something-U7-XRF", &units);
/// assert_eq!(property.as_deref(), Some("ABC"));
/// assert_eq!(unit, None);
/// ```
pub fn extract(stem: &str, units: &UnitCodes) -> (Option<String>, Option<String>) {
    let property = property_pattern()
        .captures(stem)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());

    let unit = unit_pattern()
        .captures(stem)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|u| units.contains(u));

    (property, unit)
}

/// 物件・ユニットの両方が揃った場合のみ識別子を返す
pub fn extract_identity(stem: &str, units: &UnitCodes) -> Option<Identity> {
    match extract(stem, units) {
        (Some(property), Some(unit)) => Identity::new(property, unit),
        _ => None,
    }
}
