//! Command-line Interface
//!
//! `xrfpdf`コマンドの実装。設定の読み込み、ログの初期化、フォルダの選択
//! （引数または対話メニュー）、変換、集計の表示を行います。

use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use crate::app::{resolve_unit_codes, RunSummary, Runner};
use crate::builder::ConverterBuilder;
use crate::config::AppConfig;
use crate::ledger::Ledger;
use crate::provider::{FolderProvider, LocalProvider, RemoteProvider};
use crate::render::{RenderEngine, TypstEngine};
use crate::types::Folder;

/// XRF検査スプレッドシートをPDFレポートへ変換する
#[derive(Parser, Debug)]
#[command(name = "xrfpdf")]
#[command(author, version, about = "Convert XRF inspection spreadsheets to PDF reports", long_about = None)]
pub struct Cli {
    /// Config file (defaults to xrfpdf.toml next to the executable or in the working directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Use the local mock provider instead of the remote document library
    #[arg(long)]
    pub mock_local: bool,

    /// Export the checklist to a CSV file (or directory) and exit
    #[arg(long, value_name = "CSV_PATH")]
    pub export_checklist: Option<PathBuf>,

    /// Known unit code (repeatable); added to unit_codes from the config file
    #[arg(long = "unit", value_name = "CODE")]
    pub units: Vec<String>,

    /// Number of parallel rendering workers (overrides the config file)
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// Print the run summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Folders to process (skips the interactive menu)
    pub folders: Vec<String>,
}

/// 対話メニューの選択
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuChoice {
    /// 番号で指定したフォルダを変換（1始まり、入力順、重複なし）
    Convert(Vec<usize>),
    /// すべてのフォルダを変換
    All,
    /// すべてのフォルダを走査してチェックリストを更新
    Scan,
    /// チェックリストを書き出す
    Export,
    /// チェックリストを空にする
    Reset,
    /// 終了
    Quit,
}

/// メニューの入力を解釈する
///
/// 番号の一覧（`1,3,5`）のうち、範囲外や数値でない項目は無視され、
/// その旨のメッセージが返されます。有効な選択がない場合は`None`です。
pub fn parse_menu_choice(input: &str, folder_count: usize) -> (Option<MenuChoice>, Vec<String>) {
    let choice = input.trim().to_lowercase();
    match choice.as_str() {
        "all" => return (Some(MenuChoice::All), Vec::new()),
        "s" => return (Some(MenuChoice::Scan), Vec::new()),
        "e" => return (Some(MenuChoice::Export), Vec::new()),
        "r" => return (Some(MenuChoice::Reset), Vec::new()),
        "q" => return (Some(MenuChoice::Quit), Vec::new()),
        _ => {}
    }

    let mut indices = Vec::new();
    let mut messages = Vec::new();
    for part in choice.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.parse::<usize>() {
            Ok(n) if (1..=folder_count).contains(&n) => {
                if !indices.contains(&n) {
                    indices.push(n);
                }
            }
            Ok(n) => messages.push(format!("{} is out of range, ignored.", n)),
            Err(_) => messages.push(format!("'{}' is not a valid option, ignored.", part)),
        }
    }

    if indices.is_empty() {
        (None, messages)
    } else {
        (Some(MenuChoice::Convert(indices)), messages)
    }
}

/// コマンドラインのエントリーポイント
pub fn run_cli() -> Result<()> {
    run(Cli::parse())
}

/// 解析済みの引数で実行
pub fn run(cli: Cli) -> Result<()> {
    // 設定のエラーはファイル操作・リモート操作の前に報告する
    let config_path = AppConfig::locate(cli.config.as_deref())?;
    let config = AppConfig::load(&config_path)?;
    init_logging(config.log_file_path().as_deref())?;
    info!("Loaded configuration from {}", config_path.display());
    validate_startup(&cli, &config)?;

    let checklist = config.checklist_path();

    if let Some(path) = &cli.export_checklist {
        let written = Ledger::load(&checklist).export(path)?;
        println!("Checklist exported to {}", written.display());
        return Ok(());
    }

    let units = resolve_unit_codes(&config.unit_codes, &cli.units, &checklist);
    let converter = ConverterBuilder::new()
        .with_unit_codes(units)
        .with_page_setup(config.page.setup.clone())
        .with_workers(cli.workers.unwrap_or(config.workers))
        .build()?;

    let provider: Box<dyn FolderProvider> = if cli.mock_local {
        Box::new(LocalProvider::new(config.local_root(), config.local_output()))
    } else {
        Box::new(RemoteProvider::new(&config.remote, config.mirror_dir())?)
    };

    let engine = TypstEngine::new()
        .with_fonts(config.font_paths())
        .with_font_family(config.page.font_family.clone());

    let mut runner = Runner::new(provider, engine, converter, checklist).with_publish(config.publish);

    let folders: Vec<Folder> = if cli.folders.is_empty() {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        match interactive_menu(&mut runner, &mut input, &mut output)? {
            Some(folders) => folders,
            None => {
                println!("No folders selected, exiting.");
                return Ok(());
            }
        }
    } else {
        cli.folders
            .iter()
            .map(|f| Folder::from_relative_path(f))
            .collect()
    };

    let summary = runner.convert_folders(&folders)?;
    print_summary(&summary, cli.json, &mut io::stdout())?;
    Ok(())
}

/// 実行モードに必要な設定を検証する
///
/// チェックリストやフォルダに触れる前に呼び出します。リモートを使用する場合は
/// 接続先とアクセストークンが必要です。
fn validate_startup(cli: &Cli, config: &AppConfig) -> Result<()> {
    if !cli.mock_local {
        config.validate_remote()?;
    }
    Ok(())
}

/// ログの初期化
///
/// 標準エラー出力に加え、ログファイルが指定されている場合はファイルにも追記します。
/// ログレベルは`RUST_LOG`で変更できます（既定: `info`）。
fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let result = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Cannot open log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(io::stderr.and(Mutex::new(file)))
                .try_init()
        }
        None => builder.with_writer(io::stderr).try_init(),
    };
    result.map_err(|e| anyhow!("Cannot initialize logging: {}", e))
}

/// 対話メニュー
///
/// 変換するフォルダが選ばれた場合は`Some`、終了が選ばれた場合や入力が終わった場合は
/// `None`を返します。走査・書き出し・リセットの後はメニューを再表示します。
pub fn interactive_menu<E, R, W>(
    runner: &mut Runner<E>,
    input: &mut R,
    out: &mut W,
) -> Result<Option<Vec<Folder>>>
where
    E: RenderEngine,
    R: BufRead,
    W: Write,
{
    loop {
        let stats = runner.folder_stats()?;
        if stats.is_empty() {
            writeln!(out, "No subfolders found.")?;
            return Ok(None);
        }

        writeln!(out, "Folders:")?;
        for stat in &stats {
            writeln!(out, "  {}. {} - {} completed", stat.index, stat.name, stat.completed)?;
        }
        writeln!(
            out,
            "Options: [numbers] convert (e.g. 1 or 1,3,5), 'all' convert all, \
             's' scan all, 'e' export checklist, 'r' reset checklist, 'q' quit"
        )?;

        let Some(line) = prompt(input, out, "Choice: ")? else {
            return Ok(None);
        };
        let (choice, messages) = parse_menu_choice(&line, stats.len());
        for message in messages {
            writeln!(out, "{}", message)?;
        }

        match choice {
            Some(MenuChoice::All) => {
                return Ok(Some(stats.into_iter().map(|s| s.folder).collect()));
            }
            Some(MenuChoice::Convert(indices)) => {
                return Ok(Some(
                    indices
                        .into_iter()
                        .map(|i| stats[i - 1].folder.clone())
                        .collect(),
                ));
            }
            Some(MenuChoice::Scan) => match runner.scan_all() {
                Ok(changed) => {
                    writeln!(out, "Scan complete. Checklist updated ({} new).", changed)?;
                    for stat in runner.folder_stats()? {
                        writeln!(out, "  {}: {} completed", stat.name, stat.completed)?;
                    }
                }
                Err(e) => writeln!(out, "Scan failed: {}", e)?,
            },
            Some(MenuChoice::Export) => {
                writeln!(
                    out,
                    "Enter a file path (e.g. ./my_checklist.csv) or an existing directory"
                )?;
                let Some(path) = prompt(input, out, "Export checklist to (path or directory): ")?
                else {
                    return Ok(None);
                };
                let path = path.trim();
                if path.is_empty() {
                    writeln!(out, "No path given.")?;
                    continue;
                }
                match runner.export_checklist(Path::new(path)) {
                    Ok(written) => writeln!(out, "Checklist exported to {}", written.display())?,
                    Err(e) => writeln!(out, "Export failed: {}", e)?,
                }
            }
            Some(MenuChoice::Reset) => match runner.reset_checklist() {
                Ok(()) => writeln!(out, "Checklist reset.")?,
                Err(e) => writeln!(out, "Reset failed: {}", e)?,
            },
            Some(MenuChoice::Quit) => return Ok(None),
            None => writeln!(out, "No valid selection, try again.")?,
        }
    }
}

/// 1行読み込む（入力の終わりでは`None`）
fn prompt<R: BufRead, W: Write>(input: &mut R, out: &mut W, label: &str) -> Result<Option<String>> {
    write!(out, "{}", label)?;
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

/// 実行結果の集計を表示
pub fn print_summary<W: Write>(summary: &RunSummary, json: bool, out: &mut W) -> Result<()> {
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(summary)?)?;
        return Ok(());
    }

    for folder in &summary.folders {
        match &folder.error {
            Some(error) => writeln!(out, "{}: failed ({})", folder.folder, error)?,
            None => writeln!(
                out,
                "{}: {} converted, {} skipped, {} failed, {} unrecognized, {} already done",
                folder.folder,
                folder.report.converted,
                folder.report.skipped,
                folder.report.failed,
                folder.unrecognized,
                folder.already_done
            )?,
        }
    }

    writeln!(
        out,
        "All done. {} converted, {} skipped, {} failed, {} unrecognized. Checklist saved to {} ({} complete).",
        summary.totals.converted,
        summary.totals.skipped,
        summary.totals.failed,
        summary.unrecognized,
        summary.checklist.display(),
        summary.completed
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::FolderSummary;
    use crate::api::BatchReport;
    use std::fs;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_parse_menu_commands() {
        assert_eq!(parse_menu_choice("ALL", 3).0, Some(MenuChoice::All));
        assert_eq!(parse_menu_choice(" s ", 3).0, Some(MenuChoice::Scan));
        assert_eq!(parse_menu_choice("e", 3).0, Some(MenuChoice::Export));
        assert_eq!(parse_menu_choice("r", 3).0, Some(MenuChoice::Reset));
        assert_eq!(parse_menu_choice("q", 3).0, Some(MenuChoice::Quit));
    }

    #[test]
    fn test_parse_menu_numbers() {
        let (choice, messages) = parse_menu_choice("1, 3,3", 3);
        assert_eq!(choice, Some(MenuChoice::Convert(vec![1, 3])));
        assert!(messages.is_empty());
    }

    #[test]
    fn test_parse_menu_ignores_invalid_entries() {
        let (choice, messages) = parse_menu_choice("2,9,x", 3);
        assert_eq!(choice, Some(MenuChoice::Convert(vec![2])));
        assert_eq!(
            messages,
            vec![
                "9 is out of range, ignored.".to_string(),
                "'x' is not a valid option, ignored.".to_string()
            ]
        );

        let (choice, messages) = parse_menu_choice("0", 3);
        assert_eq!(choice, None);
        assert_eq!(messages.len(), 1);

        assert_eq!(parse_menu_choice("", 3), (None, Vec::new()));
    }

    #[test]
    fn test_cli_arguments() {
        let cli = Cli::parse_from([
            "xrfpdf",
            "--mock-local",
            "--unit",
            "1A",
            "--unit",
            "2B",
            "--workers",
            "4",
            "Oak St",
            "Elm Ave",
        ]);
        assert!(cli.mock_local);
        assert_eq!(cli.units, vec!["1A", "2B"]);
        assert_eq!(cli.workers, Some(4));
        assert_eq!(cli.folders, vec!["Oak St", "Elm Ave"]);
        assert!(cli.export_checklist.is_none());

        let cli = Cli::parse_from(["xrfpdf", "--export-checklist", "out/list.csv"]);
        assert_eq!(cli.export_checklist, Some(PathBuf::from("out/list.csv")));
    }

    #[test]
    fn test_run_fails_without_config() {
        let cli = Cli::parse_from(["xrfpdf", "--config", "/no/such/xrfpdf.toml", "--mock-local"]);
        let err = run(cli).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    fn menu_runner(dir: &TempDir) -> Runner<TypstEngine> {
        let root = dir.path().join("root");
        fs::create_dir_all(root.join("Elm Ave/automation_output")).unwrap();
        fs::create_dir_all(root.join("Oak St")).unwrap();
        fs::write(
            root.join("Elm Ave/automation_output/E1_U1_lease_leadpaint_xrf.pdf"),
            b"%PDF",
        )
        .unwrap();

        let provider = LocalProvider::new(&root, dir.path().join("published"));
        let converter = ConverterBuilder::new().build().unwrap();
        Runner::new(
            Box::new(provider),
            TypstEngine::new(),
            converter,
            dir.path().join("XRF_checklist.csv"),
        )
    }

    #[test]
    fn test_interactive_menu_scan_then_select() {
        let dir = TempDir::new().unwrap();
        let mut runner = menu_runner(&dir);
        let mut input = Cursor::new("s\n9\n2\n");
        let mut out = Vec::new();

        let folders = interactive_menu(&mut runner, &mut input, &mut out)
            .unwrap()
            .unwrap();
        assert_eq!(folders.len(), 1);
        assert_eq!(folders[0].name, "Oak St");

        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("1. Elm Ave - 1 completed"));
        assert!(text.contains("Scan complete. Checklist updated (1 new)."));
        assert!(text.contains("9 is out of range, ignored."));
        assert!(text.contains("No valid selection, try again."));
        assert_eq!(runner.ledger().get("E1_U1"), Some(true));
    }

    #[test]
    fn test_interactive_menu_export_and_quit() {
        let dir = TempDir::new().unwrap();
        let mut runner = menu_runner(&dir);
        let export_dir = dir.path().join("exports");
        fs::create_dir_all(&export_dir).unwrap();

        let script = format!("e\n{}\nq\n", export_dir.display());
        let mut input = Cursor::new(script);
        let mut out = Vec::new();

        let folders = interactive_menu(&mut runner, &mut input, &mut out).unwrap();
        assert!(folders.is_none());
        assert!(export_dir.join("XRF_checklist.csv").exists());
    }

    #[test]
    fn test_interactive_menu_end_of_input() {
        let dir = TempDir::new().unwrap();
        let mut runner = menu_runner(&dir);
        let mut input = Cursor::new("");
        let mut out = Vec::new();
        assert!(interactive_menu(&mut runner, &mut input, &mut out)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_validate_startup_requires_remote_settings() {
        let config = AppConfig::default();

        let remote = Cli::parse_from(["xrfpdf", "--export-checklist", "out.csv"]);
        let err = validate_startup(&remote, &config).unwrap_err();
        assert!(err.to_string().contains("remote.site_url"), "error: {}", err);

        let local = Cli::parse_from(["xrfpdf", "--mock-local"]);
        assert!(validate_startup(&local, &config).is_ok());
    }

    #[test]
    fn test_print_summary_text_and_json() {
        let summary = RunSummary {
            folders: vec![
                FolderSummary {
                    folder: "Oak St".to_string(),
                    report: BatchReport {
                        converted: 2,
                        skipped: 1,
                        failed: 0,
                    },
                    unrecognized: 1,
                    ..Default::default()
                },
                FolderSummary {
                    folder: "Elm Ave".to_string(),
                    error: Some("listing failed".to_string()),
                    ..Default::default()
                },
            ],
            totals: BatchReport {
                converted: 2,
                skipped: 1,
                failed: 0,
            },
            unrecognized: 1,
            completed: 5,
            checklist: PathBuf::from("XRF_checklist.csv"),
        };

        let mut out = Vec::new();
        print_summary(&summary, false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Oak St: 2 converted, 1 skipped, 0 failed, 1 unrecognized, 0 already done"));
        assert!(text.contains("Elm Ave: failed (listing failed)"));
        assert!(text.contains("All done. 2 converted, 1 skipped, 0 failed, 1 unrecognized."));

        let mut out = Vec::new();
        print_summary(&summary, true, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["totals"]["converted"], 2);
        assert_eq!(value["unrecognized"], 1);
        assert_eq!(value["folders"][0]["converted"], 2);
        assert_eq!(value["folders"][1]["error"], "listing failed");
    }
}
