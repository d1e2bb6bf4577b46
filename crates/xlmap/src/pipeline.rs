//! Pipeline orchestrator: config and input in, formatted workbook out.
//!
//! A run moves through `Idle → Loaded → Transformed → Filtered → Written`.
//! A failed run is the `Err` side: [`PipelineError`] carries the stage whose
//! work failed. Row-local failures never stop a run; they are returned in
//! [`SpecRunReport::warnings`].
//!
//! [`run_pipeline_folder`] runs every readable file of a directory with one
//! configuration, and [`preview_pipeline`] stops before writing.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};
use xlmap_core::{
    ConfigError, FatalError, SpecMappingConfig, SpecOutputRow, SpecRowWarning,
    load_config_with_warnings, process,
};
use xlmap_io_xlsx::conf::{TUP_EXT_IPC, TUP_EXT_WORKBOOK};
use xlmap_io_xlsx::util::estimate_unicode_string_width;
use xlmap_io_xlsx::{
    ReadError, SpecReadOptions, SpecXlsxReport, SpecXlsxWriteOptions, read_input_table,
    write_output_table,
};

/// Suffix inserted between the input stem and the run timestamp.
pub const C_OUTPUT_SUFFIX: &str = "_formatted";
/// Timestamp layout of generated output names.
pub const C_OUTPUT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

////////////////////////////////////////////////////////////////////////////////
// #region Stages

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumPipelineStage {
    Idle,
    /// Configuration and input table loaded.
    Loaded,
    /// Every row evaluated against the output columns.
    Transformed,
    /// Void rows dropped and columns ordered.
    Filtered,
    /// Workbook saved.
    Written,
}

impl EnumPipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loaded => "loaded",
            Self::Transformed => "transformed",
            Self::Filtered => "filtered",
            Self::Written => "written",
        }
    }
}

impl fmt::Display for EnumPipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cause of a failed run.
#[derive(Debug, Error)]
pub enum EnumPipelineFailure {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Fatal(#[from] FatalError),
    #[error("{0}")]
    Write(String),
    #[error("failed to list input folder {}: {source}", .path.display())]
    Folder {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no readable input files in {}", .path.display())]
    NoInputFiles { path: PathBuf },
    #[error("a folder input needs an output directory, not the file {}", .path.display())]
    OutputFileForFolder { path: PathBuf },
}

/// A run that stopped; `stage` is the stage whose work failed.
#[derive(Debug, Error)]
#[error("pipeline failed in stage '{stage}': {source}")]
pub struct PipelineError {
    pub stage: EnumPipelineStage,
    #[source]
    pub source: EnumPipelineFailure,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RunOptions

/// Where the formatted workbook goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumOutputTarget {
    /// Generated `<stem>_formatted_<timestamp>.xlsx` name in this directory.
    Dir(PathBuf),
    /// Exact output file.
    File(PathBuf),
}

/// Inputs of one pipeline run.
#[derive(Debug, Clone)]
pub struct SpecRunOptions {
    pub path_input: PathBuf,
    pub path_config: PathBuf,
    /// `None` writes next to the input file.
    pub output: Option<EnumOutputTarget>,
    pub read_options: SpecReadOptions,
    pub write_options: SpecXlsxWriteOptions,
    /// Timestamp used for generated output names; the local time when `None`.
    pub datetime_run: Option<NaiveDateTime>,
}

impl SpecRunOptions {
    pub fn new(path_input: impl Into<PathBuf>, path_config: impl Into<PathBuf>) -> Self {
        Self {
            path_input: path_input.into(),
            path_config: path_config.into(),
            output: None,
            read_options: SpecReadOptions::default(),
            write_options: SpecXlsxWriteOptions::default(),
            datetime_run: None,
        }
    }

    /// Resolved output file path.
    pub fn path_output(&self) -> PathBuf {
        let dt_run = self
            .datetime_run
            .unwrap_or_else(|| Local::now().naive_local());
        match &self.output {
            Some(EnumOutputTarget::File(path)) => path.clone(),
            Some(EnumOutputTarget::Dir(dir)) => derive_output_path(&self.path_input, dir, &dt_run),
            None => {
                let dir = self
                    .path_input
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                derive_output_path(&self.path_input, &dir, &dt_run)
            }
        }
    }
}

/// `<dir>/<input stem>_formatted_<YYYYmmdd_HHMMSS>.xlsx`.
pub fn derive_output_path(path_input: &Path, dir_output: &Path, dt_run: &NaiveDateTime) -> PathBuf {
    let c_stem = path_input
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "output".to_string());
    dir_output.join(format!(
        "{c_stem}{C_OUTPUT_SUFFIX}_{}.xlsx",
        dt_run.format(C_OUTPUT_TIMESTAMP_FORMAT)
    ))
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RunReport

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecRunReport {
    pub path_output: PathBuf,
    pub sheet_name_input: Option<String>,
    /// Zero-based header row the input was read from.
    pub idx_row_header: usize,
    /// Data rows read, after fully blank rows were skipped.
    pub n_rows_input: usize,
    pub n_rows_skipped_blank: usize,
    pub n_rows_voided: usize,
    pub n_rows_output: usize,
    /// Configuration load warnings.
    pub config_warnings: Vec<String>,
    /// Run-level notes from processing.
    pub notes: Vec<String>,
    pub warnings: Vec<SpecRowWarning>,
    pub sheet: SpecXlsxReport,
}

impl SpecRunReport {
    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "{} rows read, {} written, {} voided, {} blank skipped, {} warnings -> {}",
            self.n_rows_input,
            self.n_rows_output,
            self.n_rows_voided,
            self.n_rows_skipped_blank,
            self.warnings.len(),
            self.path_output.display()
        )
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Run

fn fail(stage: EnumPipelineStage, source: EnumPipelineFailure) -> PipelineError {
    warn!(stage = %stage, error = %source, "pipeline failed");
    PipelineError { stage, source }
}

fn load_run_config(path_config: &Path) -> Result<(SpecMappingConfig, Vec<String>), PipelineError> {
    let (config, config_warnings) = load_config_with_warnings(path_config)
        .map_err(|err| fail(EnumPipelineStage::Loaded, err.into()))?;
    for c_warning in &config_warnings {
        warn!(target: "xlmap::config", "{c_warning}");
    }
    Ok((config, config_warnings))
}

/// Run config load, read, transform, void filter and write.
pub fn run_pipeline(options: &SpecRunOptions) -> Result<SpecRunReport, PipelineError> {
    let span = info_span!("pipeline", input = %options.path_input.display());
    let _guard = span.enter();

    let (config, config_warnings) = load_run_config(&options.path_config)?;
    run_with_config(options, &config, config_warnings)
}

fn run_with_config(
    options: &SpecRunOptions,
    config: &SpecMappingConfig,
    config_warnings: Vec<String>,
) -> Result<SpecRunReport, PipelineError> {
    let input = read_input_table(&options.path_input, &options.read_options)
        .map_err(|err| fail(EnumPipelineStage::Loaded, err.into()))?;
    info!(
        stage = %EnumPipelineStage::Loaded,
        columns = config.output_columns.len(),
        rows = input.table.height(),
        "configuration and input loaded"
    );

    let output = process(&input.table, config)
        .map_err(|err| fail(EnumPipelineStage::Transformed, err.into()))?;
    debug!(stage = %EnumPipelineStage::Transformed, warnings = output.warnings.len(), "rows evaluated");
    for warning in &output.warnings {
        warn!(row = warning.idx_row, column = %warning.column, "{}", warning.error);
    }
    for c_note in &output.notes {
        warn!("{c_note}");
    }
    info!(
        stage = %EnumPipelineStage::Filtered,
        kept = output.table.height(),
        voided = output.n_rows_voided,
        "rows ready"
    );

    let path_output = options.path_output();
    let sheet = write_output_table(
        &output.table,
        config,
        &path_output,
        options.write_options.clone(),
    )
    .map_err(|err| fail(EnumPipelineStage::Written, EnumPipelineFailure::Write(err)))?;
    for c_warning in &sheet.warnings {
        warn!("{c_warning}");
    }
    info!(stage = %EnumPipelineStage::Written, path = %path_output.display(), "output written");

    Ok(SpecRunReport {
        path_output,
        sheet_name_input: input.sheet_name,
        idx_row_header: input.idx_row_header,
        n_rows_input: output.n_rows_input,
        n_rows_skipped_blank: input.n_rows_skipped,
        n_rows_voided: output.n_rows_voided,
        n_rows_output: output.table.height(),
        config_warnings,
        notes: output.notes,
        warnings: output.warnings,
        sheet,
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Folder

/// Readable input files directly inside `dir`, sorted by path.
///
/// Office lock files (`~$name.xlsx`) are skipped.
pub fn list_input_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut l_paths = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let if_lock_file = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with("~$"));
        let if_supported = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .is_some_and(|ext| {
                TUP_EXT_WORKBOOK.contains(&ext.as_str()) || TUP_EXT_IPC.contains(&ext.as_str())
            });
        if if_supported && !if_lock_file {
            l_paths.push(path);
        }
    }
    l_paths.sort();
    Ok(l_paths)
}

/// One file of a folder run that failed.
#[derive(Debug)]
pub struct SpecBatchFailure {
    pub path_input: PathBuf,
    pub error: PipelineError,
}

/// Outcome of a folder run. Per-file failures do not stop the run.
#[derive(Debug)]
pub struct SpecBatchReport {
    pub dir_input: PathBuf,
    pub dir_output: PathBuf,
    /// Configuration load warnings, reported once.
    pub config_warnings: Vec<String>,
    pub l_reports: Vec<SpecRunReport>,
    pub l_failures: Vec<SpecBatchFailure>,
}

impl SpecBatchReport {
    pub fn summary(&self) -> String {
        format!(
            "{} of {} files written, {} failed -> {}",
            self.l_reports.len(),
            self.l_reports.len() + self.l_failures.len(),
            self.l_failures.len(),
            self.dir_output.display()
        )
    }
}

/// Run every readable file in the `path_input` directory with one configuration.
///
/// Outputs go to the `Dir` target, or next to the inputs when `output` is
/// `None`. Only a bad configuration, an unreadable folder or a `File` target
/// fail the whole run.
pub fn run_pipeline_folder(options: &SpecRunOptions) -> Result<SpecBatchReport, PipelineError> {
    let span = info_span!("pipeline_folder", input = %options.path_input.display());
    let _guard = span.enter();

    let dir_output = match &options.output {
        Some(EnumOutputTarget::File(path)) => {
            return Err(fail(
                EnumPipelineStage::Loaded,
                EnumPipelineFailure::OutputFileForFolder { path: path.clone() },
            ));
        }
        Some(EnumOutputTarget::Dir(dir)) => dir.clone(),
        None => options.path_input.clone(),
    };

    let (config, config_warnings) = load_run_config(&options.path_config)?;
    let l_paths = list_input_files(&options.path_input).map_err(|source| {
        fail(
            EnumPipelineStage::Loaded,
            EnumPipelineFailure::Folder {
                path: options.path_input.clone(),
                source,
            },
        )
    })?;
    if l_paths.is_empty() {
        warn!(dir = %options.path_input.display(), "no readable input files found");
    }
    info!(files = l_paths.len(), "folder listed");

    let dt_run = options
        .datetime_run
        .unwrap_or_else(|| Local::now().naive_local());
    let mut l_reports = Vec::with_capacity(l_paths.len());
    let mut l_failures = Vec::new();
    for path_input in l_paths {
        let options_file = SpecRunOptions {
            path_input: path_input.clone(),
            output: Some(EnumOutputTarget::Dir(dir_output.clone())),
            datetime_run: Some(dt_run),
            ..options.clone()
        };
        let span_file = info_span!("file", input = %path_input.display());
        let _guard_file = span_file.enter();
        match run_with_config(&options_file, &config, config_warnings.clone()) {
            Ok(report) => l_reports.push(report),
            Err(error) => l_failures.push(SpecBatchFailure { path_input, error }),
        }
    }
    info!(written = l_reports.len(), failed = l_failures.len(), "folder processed");

    Ok(SpecBatchReport {
        dir_input: options.path_input.clone(),
        dir_output,
        config_warnings,
        l_reports,
        l_failures,
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region Preview

/// Leading rows of a processed table; nothing is written.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecPreview {
    /// File previewed; the first listed file for a folder input.
    pub path_input: PathBuf,
    pub columns: Vec<String>,
    pub rows: Vec<SpecOutputRow>,
    /// Rows the full output would have.
    pub n_rows_output: usize,
    pub n_rows_voided: usize,
    pub config_warnings: Vec<String>,
    pub warnings: Vec<SpecRowWarning>,
}

impl SpecPreview {
    /// Plain-text table: a shape line, the header, one line per row.
    pub fn render_text(&self) -> String {
        let l_cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| row.values.iter().map(ToString::to_string).collect())
            .collect();
        let l_widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx_col, name)| {
                l_cells
                    .iter()
                    .filter_map(|row| row.get(idx_col))
                    .map(|c_cell| estimate_unicode_string_width(c_cell))
                    .fold(estimate_unicode_string_width(name), usize::max)
            })
            .collect();

        let render_line = |l_texts: &[String]| -> String {
            l_texts
                .iter()
                .zip(&l_widths)
                .map(|(c_text, n_width)| {
                    let n_pad = n_width.saturating_sub(estimate_unicode_string_width(c_text));
                    format!("{c_text}{}", " ".repeat(n_pad))
                })
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let c_name = self
            .path_input
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut l_lines = vec![
            format!(
                "{c_name}: {} rows x {} columns ({} voided)",
                self.n_rows_output,
                self.columns.len(),
                self.n_rows_voided
            ),
            render_line(&self.columns),
        ];
        l_lines.extend(l_cells.iter().map(|row| render_line(row)));
        if self.n_rows_output > self.rows.len() {
            l_lines.push(format!("... and {} more rows", self.n_rows_output - self.rows.len()));
        }
        l_lines.join("\n")
    }
}

/// Load, transform and filter like [`run_pipeline`], keeping at most
/// `n_rows_max` output rows instead of writing them.
///
/// A directory input previews its first readable file.
pub fn preview_pipeline(
    options: &SpecRunOptions,
    n_rows_max: Option<usize>,
) -> Result<SpecPreview, PipelineError> {
    let span = info_span!("preview", input = %options.path_input.display());
    let _guard = span.enter();

    let (config, config_warnings) = load_run_config(&options.path_config)?;
    let path_input = if options.path_input.is_dir() {
        let path_dir = &options.path_input;
        list_input_files(path_dir)
            .map_err(|source| {
                fail(
                    EnumPipelineStage::Loaded,
                    EnumPipelineFailure::Folder {
                        path: path_dir.clone(),
                        source,
                    },
                )
            })?
            .into_iter()
            .next()
            .ok_or_else(|| {
                fail(
                    EnumPipelineStage::Loaded,
                    EnumPipelineFailure::NoInputFiles {
                        path: path_dir.clone(),
                    },
                )
            })?
    } else {
        options.path_input.clone()
    };

    let input = read_input_table(&path_input, &options.read_options)
        .map_err(|err| fail(EnumPipelineStage::Loaded, err.into()))?;
    let mut output = process(&input.table, &config)
        .map_err(|err| fail(EnumPipelineStage::Transformed, err.into()))?;

    let n_rows_output = output.table.height();
    if let Some(n_rows_max) = n_rows_max {
        output.table.rows.truncate(n_rows_max);
    }
    debug!(shown = output.table.height(), rows = n_rows_output, "preview ready");

    Ok(SpecPreview {
        path_input,
        columns: output.table.columns,
        rows: output.table.rows,
        n_rows_output,
        n_rows_voided: output.n_rows_voided,
        config_warnings,
        warnings: output.warnings,
    })
}

// #endregion
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use calamine::{Data, Reader, open_workbook_auto};
    use chrono::NaiveDate;
    use rust_xlsxwriter::Workbook;
    use tempfile::{TempDir, tempdir};
    use xlmap_core::{SpecColumnConfig, SpecMappingConfig, default_config, save_config};

    use super::*;

    fn dt_run() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(14, 7, 9)
            .unwrap()
    }

    fn write_input(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("register.xlsx");
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        for (idx_col, name) in ["Employee Name", "Gross Pay", "Social Security", "Medicare"]
            .iter()
            .enumerate()
        {
            worksheet.write_string(0, idx_col as u16, *name).unwrap();
        }
        worksheet.write_string(1, 0, "Ann").unwrap();
        worksheet.write_number(1, 1, 100.0).unwrap();
        worksheet.write_number(1, 2, 6.2).unwrap();
        worksheet.write_number(1, 3, 1.45).unwrap();
        worksheet.write_string(2, 0, "Bob").unwrap();
        worksheet.write_number(2, 1, 0.0).unwrap();
        worksheet.write_number(2, 2, 0.0).unwrap();
        worksheet.write_string(2, 3, "N/A").unwrap();
        worksheet.write_string(3, 0, "Cy").unwrap();
        worksheet.write_number(3, 1, 50.0).unwrap();
        worksheet.write_string(3, 2, "n/a").unwrap();
        worksheet.write_number(3, 3, 1.0).unwrap();
        workbook.save(&path).unwrap();
        path
    }

    fn write_config(dir: &TempDir) -> PathBuf {
        let mut config = SpecMappingConfig {
            output_columns: vec![
                SpecColumnConfig::new("Name", "Employee Name"),
                SpecColumnConfig::new("Liab", "=Social Security + Medicare"),
            ],
            ..default_config()
        };
        config.void_filter.enabled = true;
        config.void_filter.zero_columns = vec!["Gross Pay".to_string()];

        let path = dir.path().join("mapping.json");
        save_config(&config, &path).unwrap();
        path
    }

    #[test]
    fn test_derive_output_path() {
        let path = derive_output_path(Path::new("/in/register.xlsx"), Path::new("/out"), &dt_run());
        assert_eq!(path, PathBuf::from("/out/register_formatted_20240305_140709.xlsx"));
    }

    #[test]
    fn run_pipeline_end_to_end() {
        let dir = tempdir().unwrap();
        let mut options = SpecRunOptions::new(write_input(&dir), write_config(&dir));
        options.output = Some(EnumOutputTarget::Dir(dir.path().join("out")));
        options.datetime_run = Some(dt_run());

        let report = run_pipeline(&options).unwrap();
        assert_eq!(
            report.path_output,
            dir.path().join("out").join("register_formatted_20240305_140709.xlsx")
        );
        assert_eq!(report.n_rows_input, 3);
        assert_eq!(report.n_rows_voided, 1);
        assert_eq!(report.n_rows_output, 2);
        // "N/A" and "n/a" are not numeric; the voided row keeps its warning.
        let l_rows_warned: Vec<usize> = report.warnings.iter().map(|warning| warning.idx_row).collect();
        assert_eq!(l_rows_warned, vec![1, 2]);
        assert!(report.warnings.iter().all(|warning| warning.column == "Liab"));
        assert!(report.summary().contains("3 rows read, 2 written, 1 voided"));

        let mut workbook = open_workbook_auto(&report.path_output).unwrap();
        let range = workbook.worksheet_range("Sheet1").unwrap();
        assert_eq!(range.get_value((0, 1)), Some(&Data::String("Liab".to_string())));
        assert_eq!(range.get_value((1, 0)), Some(&Data::String("Ann".to_string())));
        match range.get_value((1, 1)) {
            Some(Data::Float(val)) => assert!((val - 7.65).abs() < 1e-9),
            other => panic!("expected a number, got {other:?}"),
        }
        assert_eq!(range.get_value((2, 0)), Some(&Data::String("Cy".to_string())));
        assert!(matches!(range.get_value((2, 1)), None | Some(Data::Empty)));
    }

    #[test]
    fn failures_carry_the_stage() {
        let dir = tempdir().unwrap();
        let path_config = write_config(&dir);

        let options = SpecRunOptions::new(dir.path().join("missing.xlsx"), &path_config);
        let err = run_pipeline(&options).unwrap_err();
        assert_eq!(err.stage, EnumPipelineStage::Loaded);
        assert!(matches!(err.source, EnumPipelineFailure::Read(ReadError::NotFound { .. })));

        let options = SpecRunOptions::new(write_input(&dir), dir.path().join("missing.json"));
        let err = run_pipeline(&options).unwrap_err();
        assert_eq!(err.stage, EnumPipelineStage::Loaded);
        assert!(matches!(err.source, EnumPipelineFailure::Config(ConfigError::NotFound { .. })));

        // An empty sheet has no header to transform against.
        let path_empty = dir.path().join("empty.xlsx");
        let mut workbook = Workbook::new();
        workbook.add_worksheet();
        workbook.save(&path_empty).unwrap();
        let options = SpecRunOptions::new(&path_empty, &path_config);
        let err = run_pipeline(&options).unwrap_err();
        assert_eq!(err.stage, EnumPipelineStage::Transformed);
        assert!(matches!(err.source, EnumPipelineFailure::Fatal(FatalError::EmptyHeader)));

        // The parent of the output path is a file, so saving fails.
        let path_blocker = dir.path().join("blocker");
        std::fs::write(&path_blocker, "x").unwrap();
        let mut options = SpecRunOptions::new(write_input(&dir), &path_config);
        options.output = Some(EnumOutputTarget::File(path_blocker.join("out.xlsx")));
        let err = run_pipeline(&options).unwrap_err();
        assert_eq!(err.stage, EnumPipelineStage::Written);
        assert!(matches!(err.source, EnumPipelineFailure::Write(_)));
    }

    #[test]
    fn folder_run_continues_past_bad_files() {
        let dir = tempdir().unwrap();
        let path_config = write_config(&dir);
        let dir_input = dir.path().join("inbox");
        std::fs::create_dir(&dir_input).unwrap();
        std::fs::copy(write_input(&dir), dir_input.join("a_register.xlsx")).unwrap();
        std::fs::copy(write_input(&dir), dir_input.join("c_register.xlsx")).unwrap();
        std::fs::write(dir_input.join("b_broken.xlsx"), "not a workbook").unwrap();
        std::fs::write(dir_input.join("~$a_register.xlsx"), "lock").unwrap();
        std::fs::write(dir_input.join("notes.txt"), "skip me").unwrap();

        let l_listed = list_input_files(&dir_input).unwrap();
        let l_names: Vec<String> = l_listed
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(l_names, vec!["a_register.xlsx", "b_broken.xlsx", "c_register.xlsx"]);

        let mut options = SpecRunOptions::new(&dir_input, &path_config);
        options.output = Some(EnumOutputTarget::Dir(dir.path().join("out")));
        options.datetime_run = Some(dt_run());
        let report = run_pipeline_folder(&options).unwrap();

        assert_eq!(report.l_reports.len(), 2);
        assert_eq!(report.l_failures.len(), 1);
        assert_eq!(report.l_failures[0].path_input, dir_input.join("b_broken.xlsx"));
        assert_eq!(report.l_failures[0].error.stage, EnumPipelineStage::Loaded);
        assert!(
            dir.path()
                .join("out")
                .join("c_register_formatted_20240305_140709.xlsx")
                .is_file()
        );
        assert!(report.summary().starts_with("2 of 3 files written, 1 failed"));

        options.output = Some(EnumOutputTarget::File(dir.path().join("one.xlsx")));
        let err = run_pipeline_folder(&options).unwrap_err();
        assert!(matches!(err.source, EnumPipelineFailure::OutputFileForFolder { .. }));
    }

    #[test]
    fn preview_keeps_leading_rows_and_writes_nothing() {
        let dir = tempdir().unwrap();
        let path_input = write_input(&dir);
        let options = SpecRunOptions::new(&path_input, write_config(&dir));

        let preview = preview_pipeline(&options, Some(1)).unwrap();
        assert_eq!(preview.columns, vec!["Name".to_string(), "Liab".to_string()]);
        assert_eq!(preview.rows.len(), 1);
        assert_eq!(preview.n_rows_output, 2);
        assert_eq!(preview.n_rows_voided, 1);

        let c_text = preview.render_text();
        let l_lines: Vec<&str> = c_text.lines().collect();
        assert_eq!(l_lines[0], "register.xlsx: 2 rows x 2 columns (1 voided)");
        assert_eq!(l_lines[1], "Name  Liab");
        assert!(l_lines[2].starts_with("Ann   7.65"));
        assert_eq!(l_lines[3], "... and 1 more rows");

        let l_entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(l_entries.len(), 2);

        let preview_all = preview_pipeline(&options, None).unwrap();
        assert_eq!(preview_all.rows.len(), 2);

        let dir_empty = dir.path().join("empty");
        std::fs::create_dir(&dir_empty).unwrap();
        let options = SpecRunOptions::new(&dir_empty, dir.path().join("mapping.json"));
        let err = preview_pipeline(&options, Some(5)).unwrap_err();
        assert!(matches!(err.source, EnumPipelineFailure::NoInputFiles { .. }));
    }

    #[test]
    fn explicit_output_file_is_used_verbatim() {
        let dir = tempdir().unwrap();
        let path_out = dir.path().join("fixed.xlsx");
        let mut options = SpecRunOptions::new(write_input(&dir), write_config(&dir));
        options.output = Some(EnumOutputTarget::File(path_out.clone()));
        assert_eq!(options.path_output(), path_out);

        let report = run_pipeline(&options).unwrap();
        assert!(report.path_output.is_file());
    }
}
