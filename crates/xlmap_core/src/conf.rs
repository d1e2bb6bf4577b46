//! Constants and default configuration presets.

use crate::spec::{
    EnumAlignment, SpecColumnConfig, SpecColumnFormatting, SpecGeneralSettings,
    SpecHeaderFormatting, SpecMappingConfig, SpecVoidConfig,
};

/// Prefix marking a `source_column` as a formula.
pub const C_FORMULA_PREFIX: &str = "=";
/// Separator joining input names in a combined column.
pub const C_COMBINED_SEPARATOR: &str = " + ";
/// Deepest nesting of parentheses and unary minus a formula may use.
pub const N_FORMULA_DEPTH_MAX: usize = 64;
/// Default header fill color.
pub const C_HEADER_BG_COLOR_DEFAULT: &str = "366092";
/// Default header font color.
pub const C_HEADER_FONT_COLOR_DEFAULT: &str = "FFFFFF";
/// Default fixed width used by presets.
pub const N_COLUMN_WIDTH_DEFAULT: f64 = 15.0;

/// Built-in configuration used when no file is supplied.
pub fn derive_default_mapping_config() -> SpecMappingConfig {
    SpecMappingConfig {
        output_columns: vec![SpecColumnConfig {
            width: Some(N_COLUMN_WIDTH_DEFAULT),
            ..SpecColumnConfig::new("Column 1", "")
        }],
        header_formatting: SpecHeaderFormatting::default(),
        column_name_alignment: Default::default(),
        general_settings: SpecGeneralSettings::default(),
        void_filter: SpecVoidConfig::default(),
        column_order: vec![],
    }
}

/// Annotated sample configuration written by `create_sample_config`.
pub fn derive_sample_mapping_config() -> SpecMappingConfig {
    SpecMappingConfig {
        output_columns: vec![
            SpecColumnConfig {
                alignment: EnumAlignment::Left,
                width: Some(20.0),
                ..SpecColumnConfig::new("Employee Name", "Name")
            },
            SpecColumnConfig {
                alignment: EnumAlignment::Right,
                width: Some(12.0),
                formatting: SpecColumnFormatting {
                    number_format: Some("#,##0.00".to_string()),
                    negative_format: Some("(#,##0.00)".to_string()),
                    ..Default::default()
                },
                ..SpecColumnConfig::new("Amount", "Net Pay")
            },
            SpecColumnConfig {
                alignment: EnumAlignment::Center,
                width: Some(12.0),
                formatting: SpecColumnFormatting {
                    date_format: Some("MM/DD/YYYY".to_string()),
                    ..Default::default()
                },
                ..SpecColumnConfig::new("Date", "Pay Date")
            },
        ],
        header_formatting: SpecHeaderFormatting::default(),
        column_name_alignment: Default::default(),
        general_settings: SpecGeneralSettings::default(),
        void_filter: SpecVoidConfig::default(),
        column_order: vec![],
    }
}
