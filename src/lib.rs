//! xrfpdf - XRF lead-paint inspection spreadsheets to one-page PDF reports
//!
//! This crate converts inspection spreadsheets stored in a document library (or a local
//! directory tree) into standardized landscape PDF reports, and tracks completion per
//! (property, unit) in a checklist CSV.
//!
//! Source files are named like `ABC-anything-U9-XRF-extra.xlsx`; the property (`ABC`) and
//! unit (`U9`) are extracted from the name, and the report is written as
//! `ABC_U9_lease_leadpaint_xrf.pdf`. Because the identity can be recovered from the report
//! name alone, existing reports on disk are reconciled back into the checklist without a
//! separate manifest.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use xrfpdf::{ConverterBuilder, Folder, LocalProvider, Runner, TypstEngine, UnitCodes};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let units: UnitCodes = ["U1", "U9"].into_iter().collect();
//!     let converter = ConverterBuilder::new()
//!         .with_unit_codes(units)
//!         .with_workers(2)
//!         .build()?;
//!
//!     let provider = LocalProvider::new("inspections", "published");
//!     let mut runner = Runner::new(
//!         Box::new(provider),
//!         TypstEngine::new(),
//!         converter,
//!         "XRF_checklist.csv",
//!     );
//!
//!     let summary = runner.convert_folders(&[Folder::from_relative_path("Oak St")])?;
//!     println!("{} converted", summary.totals.converted);
//!     Ok(())
//! }
//! ```
//!
//! # Checklist Only
//!
//! ```rust,no_run
//! use std::path::Path;
//! use xrfpdf::{reconcile, Ledger};
//!
//! # fn main() -> Result<(), xrfpdf::XrfPdfError> {
//! let mut ledger = Ledger::load(Path::new("XRF_checklist.csv"));
//! let changed = reconcile(&["inspections"], &mut ledger);
//! ledger.save(Path::new("XRF_checklist.csv"))?;
//! println!("{} new completion(s)", changed);
//! # Ok(())
//! # }
//! ```

mod api;
mod app;
mod builder;
mod cli;
mod config;
mod error;
mod formatter;
mod grid;
mod identity;
mod ledger;
mod output;
mod parser;
mod provider;
mod render;
mod scanner;
mod security;
mod selector;
mod types;

// 公開API
pub use api::{BatchReport, ConversionOutcome, FailureStage, SkipReason};
pub use app::{resolve_unit_codes, FolderStat, FolderSummary, RunSummary, Runner, OUTPUT_SUBDIR};
pub use builder::{Converter, ConverterBuilder};
pub use cli::{interactive_menu, parse_menu_choice, print_summary, run, run_cli, Cli, MenuChoice};
pub use config::{AppConfig, LocalSettings, PageSettings, RemoteSettings, CONFIG_FILE_NAME};
pub use error::XrfPdfError;
pub use grid::{PageSetup, SheetLayout, Worksheet};
pub use identity::{extract, extract_identity, UnitCodes};
pub use ledger::{is_truthy, Ledger, DEFAULT_CHECKLIST_NAME};
pub use output::TypstMarkup;
pub use provider::{is_source_file_name, FolderProvider, LocalProvider, RemoteProvider};
pub use render::{RenderEngine, RenderSession, TypstEngine, TypstSession};
pub use scanner::{count_artifacts, find_artifacts, reconcile};
pub use selector::{select_pending, Selection};
pub use types::{Folder, Identity, OutputArtifact, SourceFile, ARTIFACT_SUFFIX};
