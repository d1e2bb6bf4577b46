//! Output formatter: maps column formatting descriptors onto cell formats.

use rust_xlsxwriter::{Color, Format, FormatAlign};
use xlmap_core::util::{parse_hex_color, translate_excel_date_pattern};
use xlmap_core::{EnumAlignment, EnumCellValue, SpecColumnConfig, SpecMappingConfig};

use crate::conf::{
    C_DATE_FORMAT_DEFAULT, C_DATE_RANGE_PATTERN_DEFAULT, C_DATETIME_FORMAT_DEFAULT,
    derive_default_cell_format,
};
use crate::spec::{EnumColumnWidth, SpecCellFormat, SpecColumnFormatPlan};

/// Header alignment: per-name override, then header default, then the column's own.
pub fn resolve_header_alignment(config: &SpecMappingConfig, column: &SpecColumnConfig) -> EnumAlignment {
    config
        .column_name_alignment
        .get(&column.name)
        .copied()
        .or(config.header_formatting.alignment)
        .unwrap_or(column.alignment)
}

/// Header cell format for one column.
pub fn plan_header_format(
    config: &SpecMappingConfig,
    column: &SpecColumnConfig,
    fmt_base: &SpecCellFormat,
) -> SpecCellFormat {
    let header = &config.header_formatting;
    fmt_base.with_(SpecCellFormat {
        bold: Some(header.bold),
        align: Some(resolve_header_alignment(config, column).as_str().to_string()),
        bg_color: derive_color_text(&header.background_color),
        font_color: derive_color_text(&header.font_color),
        ..Default::default()
    })
}

/// Build the header and body formats of every written column.
///
/// `cols_idx_config` maps each written column to its index in `output_columns`.
pub fn plan_column_formats(
    config: &SpecMappingConfig,
    cols_idx_config: &[usize],
    fmt_base_patch: &SpecCellFormat,
) -> Vec<SpecColumnFormatPlan> {
    let fmt_base = derive_default_cell_format().merge(fmt_base_patch);

    cols_idx_config
        .iter()
        .filter_map(|idx_config| config.output_columns.get(*idx_config))
        .map(|column| {
            let formatting = &column.formatting;
            let fmt_aligned = fmt_base.with_(SpecCellFormat {
                align: Some(column.alignment.as_str().to_string()),
                ..Default::default()
            });

            let fmt_body = fmt_aligned.with_(SpecCellFormat {
                num_format: formatting.number_format.clone(),
                ..Default::default()
            });
            let fmt_body_negative = formatting.negative_format.as_ref().map(|c_fmt| {
                fmt_aligned.with_(SpecCellFormat {
                    num_format: Some(c_fmt.clone()),
                    ..Default::default()
                })
            });
            let fmt_date = fmt_aligned.with_(SpecCellFormat {
                num_format: Some(
                    formatting
                        .date_format
                        .clone()
                        .unwrap_or_else(|| C_DATE_FORMAT_DEFAULT.to_string()),
                ),
                ..Default::default()
            });
            let fmt_datetime = fmt_aligned.with_(SpecCellFormat {
                num_format: Some(
                    formatting
                        .date_format
                        .clone()
                        .unwrap_or_else(|| C_DATETIME_FORMAT_DEFAULT.to_string()),
                ),
                ..Default::default()
            });
            let date_range_pattern = formatting
                .date_range_format
                .as_deref()
                .map(translate_excel_date_pattern)
                .unwrap_or_else(|| C_DATE_RANGE_PATTERN_DEFAULT.to_string());

            let width = match column.width {
                Some(n_width) => EnumColumnWidth::Fixed(n_width),
                None if config.general_settings.auto_fit_columns => EnumColumnWidth::Autofit,
                None => EnumColumnWidth::Default,
            };

            SpecColumnFormatPlan {
                name: column.name.clone(),
                fmt_header: plan_header_format(config, column, &fmt_base),
                fmt_body,
                fmt_body_negative,
                fmt_date,
                fmt_datetime,
                date_range_pattern,
                width,
            }
        })
        .collect()
}

/// Body format for a value: negative numbers switch to the negative format when set.
pub fn select_body_format<'a>(plan: &'a SpecColumnFormatPlan, value: &EnumCellValue) -> &'a SpecCellFormat {
    match value {
        EnumCellValue::Number(val) if *val < 0.0 => plan.fmt_body_negative.as_ref().unwrap_or(&plan.fmt_body),
        _ => &plan.fmt_body,
    }
}

fn derive_color_text(value: &str) -> Option<String> {
    parse_hex_color(value).map(|n_rgb| format!("{n_rgb:06X}"))
}

/// Translate a [`SpecCellFormat`] into a writer format.
pub fn derive_rust_xlsx_format(spec: &SpecCellFormat) -> Format {
    let mut format = Format::new();

    if spec.bold.unwrap_or(false) {
        format = format.set_bold();
    }

    if let Some(val) = &spec.align
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }
    if let Some(val) = &spec.valign
        && let Some(align) = derive_format_align(val)
    {
        format = format.set_align(align);
    }

    if let Some(val) = &spec.num_format {
        format = format.set_num_format(val.clone());
    }
    if let Some(n_rgb) = spec.bg_color.as_deref().and_then(parse_hex_color) {
        format = format.set_background_color(Color::RGB(n_rgb));
    }
    if let Some(n_rgb) = spec.font_color.as_deref().and_then(parse_hex_color) {
        format = format.set_font_color(Color::RGB(n_rgb));
    }

    format
}

fn derive_format_align(align: &str) -> Option<FormatAlign> {
    let value = align.trim().to_ascii_lowercase();
    match value.as_str() {
        "left" => Some(FormatAlign::Left),
        "center" => Some(FormatAlign::Center),
        "right" => Some(FormatAlign::Right),
        "top" => Some(FormatAlign::Top),
        "bottom" => Some(FormatAlign::Bottom),
        "vcenter" | "vertical_center" => Some(FormatAlign::VerticalCenter),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use xlmap_core::{SpecColumnFormatting, default_config};

    use super::*;

    fn config_with(columns: Vec<SpecColumnConfig>) -> SpecMappingConfig {
        SpecMappingConfig {
            output_columns: columns,
            ..default_config()
        }
    }

    #[test]
    fn header_alignment_precedence() {
        let mut config = config_with(vec![SpecColumnConfig {
            alignment: EnumAlignment::Right,
            ..SpecColumnConfig::new("X", "X")
        }]);
        config.header_formatting.alignment = Some(EnumAlignment::Center);
        config.column_name_alignment = BTreeMap::from([("X".to_string(), EnumAlignment::Left)]);
        let column = &config.output_columns[0];
        assert_eq!(resolve_header_alignment(&config, column), EnumAlignment::Left);

        config.column_name_alignment.clear();
        assert_eq!(resolve_header_alignment(&config, &config.output_columns[0]), EnumAlignment::Center);

        config.header_formatting.alignment = None;
        assert_eq!(resolve_header_alignment(&config, &config.output_columns[0]), EnumAlignment::Right);
    }

    #[test]
    fn header_format_carries_styling() {
        let config = config_with(vec![SpecColumnConfig::new("X", "X")]);
        let l_plans = plan_column_formats(&config, &[0], &SpecCellFormat::default());
        let fmt_header = &l_plans[0].fmt_header;
        assert_eq!(fmt_header.bold, Some(true));
        assert_eq!(fmt_header.bg_color.as_deref(), Some("366092"));
        assert_eq!(fmt_header.font_color.as_deref(), Some("FFFFFF"));
        assert_eq!(fmt_header.align.as_deref(), Some("center"));
        assert_eq!(fmt_header.valign.as_deref(), Some("vcenter"));
    }

    #[test]
    fn negative_values_use_negative_format() {
        let config = config_with(vec![SpecColumnConfig {
            formatting: SpecColumnFormatting {
                number_format: Some("#,##0.00".to_string()),
                negative_format: Some("(#,##0.00)".to_string()),
                ..Default::default()
            },
            ..SpecColumnConfig::new("Net", "Net")
        }]);
        let l_plans = plan_column_formats(&config, &[0], &SpecCellFormat::default());
        let plan = &l_plans[0];

        let fmt = select_body_format(plan, &EnumCellValue::Number(-5.0));
        assert_eq!(fmt.num_format.as_deref(), Some("(#,##0.00)"));
        let fmt = select_body_format(plan, &EnumCellValue::Number(5.0));
        assert_eq!(fmt.num_format.as_deref(), Some("#,##0.00"));
        let fmt = select_body_format(plan, &EnumCellValue::Number(0.0));
        assert_eq!(fmt.num_format.as_deref(), Some("#,##0.00"));
    }

    #[test]
    fn width_plan_follows_fixed_then_autofit() {
        let mut config = config_with(vec![
            SpecColumnConfig {
                width: Some(12.0),
                ..SpecColumnConfig::new("A", "A")
            },
            SpecColumnConfig::new("B", "B"),
        ]);
        let l_plans = plan_column_formats(&config, &[0, 1], &SpecCellFormat::default());
        assert_eq!(l_plans[0].width, EnumColumnWidth::Fixed(12.0));
        assert_eq!(l_plans[1].width, EnumColumnWidth::Autofit);

        config.general_settings.auto_fit_columns = false;
        let l_plans = plan_column_formats(&config, &[1, 0], &SpecCellFormat::default());
        assert_eq!(l_plans[0].name, "B");
        assert_eq!(l_plans[0].width, EnumColumnWidth::Default);
    }

    #[test]
    fn date_formats_and_range_pattern() {
        let config = config_with(vec![
            SpecColumnConfig {
                formatting: SpecColumnFormatting {
                    date_format: Some("MM/DD/YYYY".to_string()),
                    ..Default::default()
                },
                ..SpecColumnConfig::new("Date", "Date")
            },
            SpecColumnConfig {
                formatting: SpecColumnFormatting {
                    date_range_format: Some("MM/DD/YYYY".to_string()),
                    ..Default::default()
                },
                ..SpecColumnConfig::new("Period", "Period")
            },
        ]);
        let l_plans = plan_column_formats(&config, &[0, 1], &SpecCellFormat::default());
        assert_eq!(l_plans[0].fmt_date.num_format.as_deref(), Some("MM/DD/YYYY"));
        assert_eq!(l_plans[1].fmt_date.num_format.as_deref(), Some(C_DATE_FORMAT_DEFAULT));
        assert_eq!(l_plans[1].date_range_pattern, "%m/%d/%Y");
    }

    #[test]
    fn empty_colors_are_unset() {
        let mut config = config_with(vec![SpecColumnConfig::new("X", "X")]);
        config.header_formatting.background_color = String::new();
        config.header_formatting.font_color = "#00ff00".to_string();
        let fmt_header = plan_header_format(&config, &config.output_columns[0], &SpecCellFormat::default());
        assert_eq!(fmt_header.bg_color, None);
        assert_eq!(fmt_header.font_color.as_deref(), Some("00FF00"));
    }
}
