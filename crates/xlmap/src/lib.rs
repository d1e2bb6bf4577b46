//! Orchestration and logging for the `xlmap` binary.
//!
//! [`pipeline::run_pipeline`] loads a mapping configuration and an input
//! file, runs the `xlmap_core` engine and writes the formatted workbook
//! through `xlmap_io_xlsx`. Folder inputs and write-free previews reuse the
//! same stages.

pub mod logging;
pub mod pipeline;

pub use pipeline::{
    EnumOutputTarget, EnumPipelineFailure, EnumPipelineStage, PipelineError, SpecBatchFailure,
    SpecBatchReport, SpecPreview, SpecRunOptions, SpecRunReport, derive_output_path,
    list_input_files, preview_pipeline, run_pipeline, run_pipeline_folder,
};
