use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use xlmap::pipeline::{
    EnumOutputTarget, SpecBatchReport, SpecRunOptions, SpecRunReport, preview_pipeline,
    run_pipeline, run_pipeline_folder,
};
use xlmap_core::{create_sample_config, load_config_with_warnings};
use xlmap_io_xlsx::{SpecReadOptions, read_input_table};

use crate::cli::{InputArgs, PreviewArgs, ProcessArgs};

fn derive_read_options(args: &InputArgs) -> SpecReadOptions {
    SpecReadOptions {
        sheet_name: args.sheet.clone(),
        idx_row_header: args.header_row.map(|n_row| n_row as usize - 1),
    }
}

pub fn run_process(args: &ProcessArgs) -> Result<()> {
    let mut options = SpecRunOptions::new(&args.input.input, &args.config);
    options.output = match (&args.output, &args.output_dir) {
        (Some(path), _) => Some(EnumOutputTarget::File(path.clone())),
        (None, Some(dir)) => Some(EnumOutputTarget::Dir(dir.clone())),
        (None, None) => None,
    };
    options.read_options = derive_read_options(&args.input);

    if args.input.input.is_dir() {
        let report = run_pipeline_folder(&options)?;
        print_batch_report(&report);
        anyhow::ensure!(
            report.l_failures.is_empty(),
            "{} of {} files failed",
            report.l_failures.len(),
            report.l_reports.len() + report.l_failures.len()
        );
    } else {
        let report = run_pipeline(&options)?;
        print_report(&report);
    }
    Ok(())
}

pub fn run_preview(args: &PreviewArgs) -> Result<()> {
    let mut options = SpecRunOptions::new(&args.input.input, &args.config);
    options.read_options = derive_read_options(&args.input);

    let preview = preview_pipeline(&options, (!args.all).then_some(args.rows))?;
    for c_warning in &preview.config_warnings {
        println!("config warning: {c_warning}");
    }
    println!("{}", preview.render_text());
    if !preview.warnings.is_empty() {
        println!("{} cell warnings (run with -v to list them)", preview.warnings.len());
    }
    Ok(())
}

pub fn run_columns(args: &InputArgs) -> Result<()> {
    let output = read_input_table(&args.input, &derive_read_options(args))
        .with_context(|| format!("read {}", args.input.display()))?;
    match &output.sheet_name {
        Some(sheet) => println!(
            "{} [{sheet}], header row {}:",
            args.input.display(),
            output.idx_row_header + 1
        ),
        None => println!("{}:", args.input.display()),
    }
    for (idx_col, name) in output.table.columns.iter().enumerate() {
        println!("{:>4}  {name}", idx_col + 1);
    }
    Ok(())
}

pub fn run_init_config(path: &Path) -> Result<()> {
    let config = create_sample_config(path)
        .with_context(|| format!("write sample configuration {}", path.display()))?;
    info!(path = %path.display(), columns = config.output_columns.len(), "sample configuration written");
    println!("Sample configuration written to {}", path.display());
    Ok(())
}

/// Returns whether the configuration loaded without warnings.
pub fn run_check_config(path: &Path) -> Result<bool> {
    let (config, l_warnings) = load_config_with_warnings(path)
        .with_context(|| format!("load configuration {}", path.display()))?;
    println!(
        "{}: {} output columns",
        path.display(),
        config.output_columns.len()
    );
    for c_warning in &l_warnings {
        println!("warning: {c_warning}");
    }
    Ok(l_warnings.is_empty())
}

pub fn print_report(report: &SpecRunReport) {
    println!("{}", report.summary());
    for c_warning in &report.config_warnings {
        println!("config warning: {c_warning}");
    }
    for c_note in &report.notes {
        println!("note: {c_note}");
    }
    for warning in &report.warnings {
        println!("warning: {warning}");
    }
}

fn print_batch_report(report: &SpecBatchReport) {
    for c_warning in &report.config_warnings {
        println!("config warning: {c_warning}");
    }
    for run in &report.l_reports {
        println!("{}", run.summary());
    }
    for failure in &report.l_failures {
        println!("failed: {}: {}", failure.path_input.display(), failure.error);
    }
    println!("{}", report.summary());
}
