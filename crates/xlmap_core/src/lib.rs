//! Column-mapping engine for reformatting spreadsheet tables.
//!
//! A [`SpecMappingConfig`] describes the output columns. Each column takes its
//! value from an input column, a `" + "` combination of input columns, or an
//! `=` formula. [`process`] evaluates every configured column for each input
//! row, drops void rows and returns the output table with per-cell warnings.
//!
//! Reading and writing workbooks lives in `xlmap_io_xlsx`.

pub mod conf;
pub mod config;
pub mod engine;
pub mod error;
pub mod expr;
pub mod spec;
pub mod transform;
pub mod util;
pub mod void;

pub use config::{
    MappingConfigBuilder, create_sample_config, default_config, load_config,
    load_config_with_warnings, parse_config_str, save_config, validate_config,
};
pub use engine::process;
pub use error::{ConfigError, EvalError, FatalError};
pub use expr::{EnumSourceColumn, evaluate_source};
pub use spec::{
    EnumAlignment, EnumCellValue, EnumFreezePanes, SpecColumnConfig, SpecColumnFormatting,
    SpecFreezePanes, SpecGeneralSettings, SpecHeaderFormatting, SpecInputRow, SpecInputTable,
    SpecMappingConfig, SpecOutputRow, SpecOutputTable, SpecProcessOutput, SpecRowWarning,
    SpecVoidConfig,
};
