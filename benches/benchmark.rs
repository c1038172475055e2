//! パフォーマンスベンチマーク
//!
//! このモジュールは、xrfpdfクレートのパフォーマンスを測定するためのベンチマークを提供します。
//!
//! 実装するベンチマーク:
//! - 未変換ファイルの選択（5,000ファイル）
//! - チェックリストの保存（5,000行）
//! - 組版マークアップの生成（500行のシート）
//! - バッチ変換のスループット（CSV 50ファイル、PDF書き出しはスタブ）
//!
//! フィクスチャは実行時に一時ディレクトリへ生成します。

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use xrfpdf::{
    select_pending, ConverterBuilder, Identity, Ledger, PageSetup, RenderEngine, RenderSession,
    SheetLayout, SourceFile, TypstMarkup, UnitCodes, Worksheet, XrfPdfError,
};

const UNITS: [&str; 8] = ["U1", "U2", "U3", "U4", "1A", "1B", "2A", "2B"];

/// PDFの代わりに固定のバイト列を書き出すエンジン
struct StubEngine;

struct StubSession;

impl RenderEngine for StubEngine {
    type Session = StubSession;

    fn start_session(&self) -> Result<StubSession, XrfPdfError> {
        Ok(StubSession)
    }
}

impl RenderSession for StubSession {
    fn export_pdf(
        &mut self,
        _sheet: &Worksheet,
        _layout: &SheetLayout,
        dest: &Path,
    ) -> Result<(), XrfPdfError> {
        fs::write(dest, b"%PDF-stub")?;
        Ok(())
    }
}

fn inspection_sheet(rows: usize) -> Worksheet {
    let mut data = vec![
        vec!["XRF Inspection".to_string()],
        ["Room", "Side", "Component", "Substrate", "Condition", "Reading", "Result"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    ];
    for i in 0..rows {
        data.push(vec![
            format!("Room {}", i % 12),
            ["A", "B", "C", "D"][i % 4].to_string(),
            "Window Sill".to_string(),
            "Wood".to_string(),
            "Intact".to_string(),
            format!("{:.1}", (i % 30) as f64 / 10.0),
            if i % 7 == 0 { "Positive" } else { "Negative" }.to_string(),
        ]);
    }
    Worksheet::from_rows("Sheet1", data)
}

/// 未変換ファイルの選択
///
/// ファイル名の解析とチェックリストの照会のみを測定します。
fn benchmark_selection(c: &mut Criterion) {
    let units: UnitCodes = UNITS.iter().collect();
    let sources: Vec<SourceFile> = (0..5_000)
        .map(|i| {
            let unit = UNITS[i % UNITS.len()];
            SourceFile::from_path(format!("/stage/P{}-survey-{}-XRF-final.xlsx", i, unit))
        })
        .collect();

    let mut ledger = Ledger::new();
    for i in (0..5_000).step_by(3) {
        let unit = UNITS[i % UNITS.len()];
        if let Some(id) = Identity::new(format!("P{}", i), unit) {
            ledger.mark_complete(&id);
        }
    }

    let mut group = c.benchmark_group("selection");
    group.throughput(Throughput::Elements(sources.len() as u64));
    group.bench_function("select_pending_5000", |b| {
        b.iter(|| black_box(select_pending(black_box(&sources), &ledger, &units)));
    });
    group.finish();
}

/// チェックリストの保存（全件の書き直し）
fn benchmark_ledger_save(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("XRF_checklist.csv");

    let mut ledger = Ledger::new();
    for i in 0..5_000 {
        if let Some(id) = Identity::new(format!("P{}", i), UNITS[i % UNITS.len()]) {
            ledger.mark_complete(&id);
        }
    }

    let mut group = c.benchmark_group("ledger");
    group.throughput(Throughput::Elements(ledger.len() as u64));
    group.bench_function("save_5000_rows", |b| {
        b.iter(|| ledger.save(black_box(&path)).unwrap());
    });
    group.bench_function("load_5000_rows", |b| {
        b.iter(|| black_box(Ledger::load(black_box(&path))));
    });
    group.finish();
}

/// 組版マークアップの生成
fn benchmark_markup(c: &mut Criterion) {
    let sheet = inspection_sheet(500);
    let page = PageSetup::default();
    let markup = TypstMarkup::new(None);

    let mut group = c.benchmark_group("markup");
    group.bench_function("plan_and_render_500_rows", |b| {
        b.iter(|| {
            let layout = SheetLayout::plan(black_box(&sheet), &page);
            black_box(markup.render(&sheet, &layout))
        });
    });
    group.finish();
}

/// バッチ変換のスループット
///
/// 読み込み、レイアウト計算、出力の移動を含み、PDFの書き出しのみスタブに置き換えます。
fn benchmark_batch_processing(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let stage = dir.path().join("stage");
    let out = dir.path().join("out");
    fs::create_dir_all(&stage).unwrap();

    let mut csv = String::from("Room,Side,Component,Reading,Result\n");
    for i in 0..200 {
        csv.push_str(&format!("Room {},A,Door,{:.1},Negative\n", i, (i % 9) as f64 / 10.0));
    }

    let jobs: Vec<SourceFile> = (0..50)
        .map(|i| {
            let path = stage.join(format!("P{}-x-U1-XRF.csv", i));
            fs::write(&path, &csv).unwrap();
            SourceFile::from_path(path)
        })
        .collect();

    let mut group = c.benchmark_group("batch_processing");
    group.sample_size(10);
    group.throughput(Throughput::Elements(jobs.len() as u64));

    for workers in [1, 4] {
        let converter = ConverterBuilder::new()
            .with_unit_codes(["U1"].into_iter().collect())
            .with_workers(workers)
            .build()
            .unwrap();

        group.bench_function(format!("convert_50_files_{}_workers", workers), |b| {
            b.iter(|| {
                let report = converter
                    .convert_batch(&StubEngine, jobs.clone(), &out, |_, _| {})
                    .unwrap();
                black_box(report)
            });
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(std::time::Duration::from_secs(10))
        .warm_up_time(std::time::Duration::from_secs(3));
    targets = benchmark_selection, benchmark_ledger_save, benchmark_markup, benchmark_batch_processing
}

criterion_main!(benches);
