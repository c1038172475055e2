//! Ledger Module
//!
//! 変換済みレポートのチェックリスト（`Property,Unit,Complete`形式のCSV）を
//! 読み書きするモジュール。
//!
//! 読み込みは寛容です。ファイルが存在しない、ヘッダーが想定外、CSVが壊れている
//! といった場合は警告をログに出し、空のチェックリストとして扱います。
//! 保存は常にキー順でソートした全件の書き直しで、一時ファイル経由で置き換えます。

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::XrfPdfError;
use crate::types::{Identity, ARTIFACT_SUFFIX};

/// デフォルトのチェックリストファイル名
pub const DEFAULT_CHECKLIST_NAME: &str = "XRF_checklist.csv";

/// 完了とみなす値（trim・小文字化後に比較）
const TRUTHY_TOKENS: [&str; 5] = ["x", "yes", "true", "1", "✓"];

/// 保存時に書き込む完了マーカー
const COMPLETE_MARKER: &str = "X";

/// 値が完了を示すかを判定
pub fn is_truthy(value: &str) -> bool {
    let normalized = value.trim().to_lowercase();
    TRUTHY_TOKENS.contains(&normalized.as_str())
}

/// 読み込み時に認識したヘッダー形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Schema {
    /// `Property,Unit,Complete`
    Direct {
        property: usize,
        unit: usize,
        complete: usize,
    },
    /// `Folder,Complete`（読み込み専用の旧形式）
    Legacy { folder: usize, complete: usize },
}

impl Schema {
    fn detect(headers: &csv::StringRecord) -> Option<Self> {
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
        };

        if let (Some(property), Some(unit), Some(complete)) =
            (position("Property"), position("Unit"), position("Complete"))
        {
            return Some(Schema::Direct {
                property,
                unit,
                complete,
            });
        }

        if let (Some(folder), Some(complete)) = (position("Folder"), position("Complete")) {
            return Some(Schema::Legacy { folder, complete });
        }

        None
    }
}

/// 識別子 → 完了フラグのチェックリスト
///
/// キーは`"{property}_{unit}"`形式の正規化キーです。`BTreeMap`で保持するため、
/// 保存時の行順は常にキー順になります。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: BTreeMap<String, bool>,
}

impl Ledger {
    /// 空のチェックリストを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// 永続化されたチェックリストを読み込む
    ///
    /// 失敗してもエラーは返さず、警告をログに出して空のチェックリストを返します。
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            debug!("Checklist {} does not exist, starting empty", path.display());
            return Self::new();
        }

        match Self::try_load(path) {
            Ok(Some(ledger)) => ledger,
            Ok(None) => {
                warn!(
                    "Checklist {} has unexpected headers, ignoring file",
                    path.display()
                );
                Self::new()
            }
            Err(e) => {
                warn!("Error reading checklist {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    fn try_load(path: &Path) -> Result<Option<Self>, XrfPdfError> {
        let file = File::open(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let headers = reader.headers()?.clone();
        let Some(schema) = Schema::detect(&headers) else {
            return Ok(None);
        };

        let mut ledger = Self::new();
        for record in reader.records() {
            let record = record?;
            let field = |idx: usize| record.get(idx).unwrap_or("").trim();

            match schema {
                Schema::Direct {
                    property,
                    unit,
                    complete,
                } => {
                    let key = format!("{}_{}", field(property), field(unit));
                    ledger.entries.insert(key, is_truthy(field(complete)));
                }
                Schema::Legacy { folder, complete } => {
                    let done = is_truthy(field(complete));
                    for identity in legacy_folder_identities(Path::new(field(folder))) {
                        ledger.entries.insert(identity.key(), done);
                    }
                }
            }
        }

        Ok(Some(ledger))
    }

    /// チェックリストを保存する（全件の書き直し）
    ///
    /// ヘッダーは常に出力されます。キーは最初の`_`で物件とユニットに分割されます。
    pub fn save(&self, path: &Path) -> Result<(), XrfPdfError> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut temp = tempfile::NamedTempFile::new_in(&parent)?;
        {
            let mut writer = csv::Writer::from_writer(temp.as_file_mut());
            writer.write_record(["Property", "Unit", "Complete"])?;
            for (key, done) in &self.entries {
                let (property, unit) = key.split_once('_').unwrap_or((key.as_str(), ""));
                let complete = if *done { COMPLETE_MARKER } else { "" };
                writer.write_record([property, unit, complete])?;
            }
            writer.flush()?;
        }
        temp.as_file_mut().flush()?;
        temp.persist(path).map_err(|e| XrfPdfError::Io(e.error))?;

        debug!("Saved {} checklist rows to {}", self.entries.len(), path.display());
        Ok(())
    }

    /// 任意の場所へチェックリストを書き出す
    ///
    /// `path`が既存のディレクトリの場合は[`DEFAULT_CHECKLIST_NAME`]を付加します。
    /// 親ディレクトリは必要に応じて作成されます。書き出し先のパスを返します。
    pub fn export(&self, path: &Path) -> Result<PathBuf, XrfPdfError> {
        let target = if path.is_dir() {
            path.join(DEFAULT_CHECKLIST_NAME)
        } else {
            path.to_path_buf()
        };
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        self.save(&target)?;
        Ok(target)
    }

    /// チェックリストを初期化し、ヘッダーのみのファイルで置き換える
    pub fn reset(&mut self, path: &Path) -> Result<(), XrfPdfError> {
        self.entries.clear();
        self.save(path)
    }

    /// 識別子を完了にする
    ///
    /// 新たに完了になった場合は`true`を返します。
    pub fn mark_complete(&mut self, identity: &Identity) -> bool {
        self.mark_key_complete(identity.key())
    }

    pub(crate) fn mark_key_complete(&mut self, key: String) -> bool {
        let previous = self.entries.insert(key, true);
        previous != Some(true)
    }

    /// 識別子が完了済みかどうか
    pub fn is_complete(&self, identity: &Identity) -> bool {
        self.get(&identity.key()).unwrap_or(false)
    }

    /// キーの値を取得
    pub fn get(&self, key: &str) -> Option<bool> {
        self.entries.get(key).copied()
    }

    /// 完了済みの件数
    pub fn completed_count(&self) -> usize {
        self.entries.values().filter(|done| **done).count()
    }

    /// 全エントリ数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// キー順にエントリを返す
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// チェックリストの`Unit`列に含まれるユニットコードを読み込む
    ///
    /// 設定でユニットコードが与えられない場合の初期値として使用します。
    /// `Unit`列のないファイル（旧形式を含む）や読み込めないファイルからは何も返しません。
    /// 重複を除いた、ファイル内で最初に現れた順のコードを返します。
    pub fn load_unit_codes(path: &Path) -> Vec<String> {
        if !path.exists() {
            return Vec::new();
        }
        match Self::try_load_unit_codes(path) {
            Ok(units) => units,
            Err(e) => {
                warn!("Error reading unit codes from {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    fn try_load_unit_codes(path: &Path) -> Result<Vec<String>, XrfPdfError> {
        let file = File::open(path)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::new(file));

        let headers = reader.headers()?.clone();
        let Some(column) = headers
            .iter()
            .position(|h| h.trim_start_matches('\u{feff}').trim() == "Unit")
        else {
            return Ok(Vec::new());
        };

        let mut units: Vec<String> = Vec::new();
        for record in reader.records() {
            let record = record?;
            let unit = record.get(column).unwrap_or("").trim();
            if !unit.is_empty() && !units.iter().any(|u| u == unit) {
                units.push(unit.to_string());
            }
        }
        Ok(units)
    }
}

/// 旧形式の`Folder`列が指すフォルダ直下の出力PDFから識別子を集める
fn legacy_folder_identities(folder: &Path) -> Vec<Identity> {
    let Ok(entries) = fs::read_dir(folder) else {
        debug!("Legacy checklist folder {} is not readable", folder.display());
        return Vec::new();
    };

    let mut identities: Vec<Identity> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_file())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            if name.ends_with(ARTIFACT_SUFFIX) {
                Identity::from_artifact_file_name(&name)
            } else {
                None
            }
        })
        .collect();
    identities.sort();
    identities
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(path: &Path, content: &str) {
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_is_truthy() {
        for token in ["x", "X", " yes ", "TRUE", "1", "✓"] {
            assert!(is_truthy(token), "{token:?} should be truthy");
        }
        for token in ["", "no", "0", "false", "done", "xx"] {
            assert!(!is_truthy(token), "{token:?} should be falsy");
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = Ledger::load(&dir.path().join("missing.csv"));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_load_direct_schema() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checklist.csv");
        write(
            &path,
            "Property,Unit,Complete\nP1,U1,X\nP2,U2,\n P3 , U3 , yes \nP4,U4,no\n",
        );

        let ledger = Ledger::load(&path);
        assert_eq!(ledger.len(), 4);
        assert_eq!(ledger.get("P1_U1"), Some(true));
        assert_eq!(ledger.get("P2_U2"), Some(false));
        assert_eq!(ledger.get("P3_U3"), Some(true));
        assert_eq!(ledger.get("P4_U4"), Some(false));
        assert_eq!(ledger.completed_count(), 2);
    }

    #[test]
    fn test_load_direct_schema_with_bom_and_extra_columns() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checklist.csv");
        write(&path, "\u{feff}Notes,Property,Unit,Complete\nhi,P1,U1,1\n");

        let ledger = Ledger::load(&path);
        assert_eq!(ledger.get("P1_U1"), Some(true));
    }

    #[test]
    fn test_load_legacy_schema() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("a");
        fs::create_dir_all(&folder).unwrap();
        write(&folder.join("P1_U1_lease_leadpaint_xrf.pdf"), "%PDF");
        write(&folder.join("unrelated.pdf"), "%PDF");

        let path = dir.path().join("checklist.csv");
        write(
            &path,
            &format!("Folder,Complete\n{},X\n", folder.display()),
        );

        let ledger = Ledger::load(&path);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.get("P1_U1"), Some(true));
    }

    #[test]
    fn test_load_legacy_schema_applies_row_value() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("b");
        fs::create_dir_all(&folder).unwrap();
        write(&folder.join("P1_U1_lease_leadpaint_xrf.pdf"), "%PDF");
        write(&folder.join("P1_U2_lease_leadpaint_xrf.pdf"), "%PDF");

        let path = dir.path().join("checklist.csv");
        write(&path, &format!("Folder,Complete\n{},\n", folder.display()));

        let ledger = Ledger::load(&path);
        assert_eq!(ledger.get("P1_U1"), Some(false));
        assert_eq!(ledger.get("P1_U2"), Some(false));
    }

    #[test]
    fn test_load_unexpected_headers_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checklist.csv");
        write(&path, "Name,Status\nP1,X\n");
        assert!(Ledger::load(&path).is_empty());
    }

    #[test]
    fn test_load_invalid_utf8_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checklist.csv");
        fs::write(&path, b"Property,Unit,Complete\nP1,\xff\xfe,X\n").unwrap();
        assert!(Ledger::load(&path).is_empty());
    }

    #[test]
    fn test_save_sorted_with_markers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checklist.csv");
        write(&path, "Property,Unit,Complete\nP2,U2,\nP1,U1,X\n");

        let ledger = Ledger::load(&path);
        ledger.save(&path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content, "Property,Unit,Complete\nP1,U1,X\nP2,U2,\n");
    }

    #[test]
    fn test_save_empty_writes_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checklist.csv");
        Ledger::new().save(&path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Property,Unit,Complete\n"
        );
    }

    #[test]
    fn test_save_key_without_underscore() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checklist.csv");
        let mut ledger = Ledger::new();
        ledger.mark_key_complete("Lonely".to_string());
        ledger.save(&path).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Property,Unit,Complete\nLonely,,X\n"
        );
    }

    #[test]
    fn test_round_trip_preserves_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checklist.csv");
        let mut ledger = Ledger::new();
        ledger.mark_complete(&Identity::new("Oak", "1A").unwrap());
        ledger.mark_complete(&Identity::new("Elm", "2B").unwrap());
        ledger.save(&path).unwrap();

        let reloaded = Ledger::load(&path);
        assert_eq!(reloaded, ledger);
    }

    #[test]
    fn test_export_to_directory_appends_default_name() {
        let dir = TempDir::new().unwrap();
        let mut ledger = Ledger::new();
        ledger.mark_complete(&Identity::new("P1", "U1").unwrap());

        let target = ledger.export(dir.path()).unwrap();
        assert_eq!(target, dir.path().join(DEFAULT_CHECKLIST_NAME));
        assert!(target.exists());

        let nested = ledger.export(&dir.path().join("out/deep/list.csv")).unwrap();
        assert!(nested.exists());
    }

    #[test]
    fn test_reset_clears_memory_and_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checklist.csv");
        write(&path, "Property,Unit,Complete\nP1,U1,X\n");

        let mut ledger = Ledger::load(&path);
        assert_eq!(ledger.len(), 1);
        ledger.reset(&path).unwrap();

        assert!(ledger.is_empty());
        assert!(Ledger::load(&path).is_empty());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Property,Unit,Complete\n"
        );
    }

    #[test]
    fn test_mark_complete_reports_change() {
        let mut ledger = Ledger::new();
        let id = Identity::new("P1", "U1").unwrap();
        assert!(ledger.mark_complete(&id));
        assert!(!ledger.mark_complete(&id));
        assert!(ledger.is_complete(&id));
    }

    #[test]
    fn test_load_unit_codes_reads_unit_column() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checklist.csv");
        write(&path, "Property,Unit,Complete\nP1,U1,X\nP2,u2,\nP3,U1,X\n");
        assert_eq!(
            Ledger::load_unit_codes(&path),
            vec!["U1".to_string(), "u2".to_string()]
        );
    }

    #[test]
    fn test_load_unit_codes_property_with_underscore() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("checklist.csv");
        write(&path, "Property,Unit,Complete\nOak_St,2B,X\n");
        assert_eq!(Ledger::load_unit_codes(&path), vec!["2B".to_string()]);
    }

    #[test]
    fn test_load_unit_codes_without_unit_column() {
        let dir = TempDir::new().unwrap();
        let folder = dir.path().join("Oak St");
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join("P1_U1_lease_leadpaint_xrf.pdf"), b"%PDF").unwrap();

        let path = dir.path().join("checklist.csv");
        write(&path, &format!("Folder,Complete\n{},X\n", folder.display()));
        assert!(Ledger::load_unit_codes(&path).is_empty());
        assert!(Ledger::load_unit_codes(&dir.path().join("missing.csv")).is_empty());
    }
}
