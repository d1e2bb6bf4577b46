//! XLSX writer kernel that turns a processed output table into a formatted workbook.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDateTime, Timelike};
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook, Worksheet, XlsxError};
use tracing::{debug, info};
use xlmap_core::util::convert_datetime_to_excel_serial;
use xlmap_core::{EnumCellValue, SpecMappingConfig, SpecOutputTable};

use crate::conf::{
    C_SHEET_NAME_DEFAULT, N_LEN_EXCEL_SHEET_NAME_MAX, N_NCOLS_EXCEL_MAX, N_NROWS_EXCEL_MAX,
};
use crate::spec::{
    EnumColumnWidth, SpecAutofitCellsPolicy, SpecCellFormat, SpecColumnFormatPlan,
    SpecXlsxReport, SpecXlsxValuePolicy, SpecXlsxWriteOptions,
};
use crate::style::{derive_rust_xlsx_format, plan_column_formats, select_body_format};
use crate::util::{
    convert_nan_inf_to_str, estimate_unicode_string_width, plan_freeze_panes, render_cell_text,
    render_date_range, sanitize_sheet_name,
};

/// Stateful workbook writer.
pub struct XlsxWriter {
    path_file_out: PathBuf,
    workbook: Workbook,
    write_options: SpecXlsxWriteOptions,
    set_sheet_names_existing: BTreeSet<String>,
    l_reports: Vec<SpecXlsxReport>,
    if_closed: bool,
}

impl XlsxWriter {
    /// Create writer bound to output path and options.
    ///
    /// The workbook is buffered in memory until [`Self::close`] is called.
    pub fn new(path_file_out: PathBuf, write_options: SpecXlsxWriteOptions) -> Result<Self, String> {
        let mut workbook = Workbook::new();
        if let Some(dt_created) = &write_options.datetime_created {
            let props = DocProperties::new()
                .set_creation_datetime(&derive_excel_datetime(dt_created).map_err(derive_xlsx_error_text)?);
            workbook.set_properties(&props);
        }

        Ok(Self {
            path_file_out,
            workbook,
            write_options,
            set_sheet_names_existing: BTreeSet::new(),
            l_reports: Vec::new(),
            if_closed: false,
        })
    }

    /// Return immutable snapshot of per-sheet write reports.
    pub fn report(&self) -> Vec<SpecXlsxReport> {
        self.l_reports.clone()
    }

    /// Flush workbook to disk. Idempotent.
    pub fn close(&mut self) -> Result<(), String> {
        if self.if_closed {
            return Ok(());
        }
        if let Some(dir_parent) = self.path_file_out.parent()
            && !dir_parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir_parent)
                .map_err(|err| format!("Failed to create {}: {err}", dir_parent.display()))?;
        }
        self.workbook
            .save(&self.path_file_out)
            .map_err(derive_xlsx_error_text)?;
        self.if_closed = true;
        info!(path = %self.path_file_out.display(), sheets = self.l_reports.len(), "workbook saved");
        Ok(())
    }

    /// Write one formatted sheet: styled header row, typed body cells, widths and freeze panes.
    pub fn write_sheet(
        &mut self,
        table: &SpecOutputTable,
        config: &SpecMappingConfig,
        sheet_name: &str,
    ) -> Result<(), String> {
        if self.if_closed {
            return Err("Cannot write after close().".to_string());
        }
        validate_policy_autofit(&self.write_options.policy_autofit)?;

        let n_width = table.width();
        let n_height = table.height();
        if n_height + 1 > N_NROWS_EXCEL_MAX {
            return Err(format!(
                "{n_height} data rows plus header exceed the Excel row limit {N_NROWS_EXCEL_MAX}."
            ));
        }
        if n_width > N_NCOLS_EXCEL_MAX {
            return Err(format!(
                "{n_width} columns exceed the Excel column limit {N_NCOLS_EXCEL_MAX}."
            ));
        }

        let l_plans = plan_column_formats(
            config,
            &table.cols_idx_config,
            &self.write_options.base_format_patch,
        );
        if l_plans.len() != n_width {
            return Err(format!(
                "Output table has {n_width} columns but {} resolve to configured columns.",
                l_plans.len()
            ));
        }

        let policy_autofit = self.write_options.policy_autofit.clone();
        let value_policy = self.write_options.value_policy.clone();
        let sheet_name_unique = self.derive_unique_sheet_name(&sanitize_sheet_name(sheet_name, "_"));
        let mut report = SpecXlsxReport {
            sheet_name: sheet_name_unique.clone(),
            n_rows: n_height,
            n_cols: n_width,
            ..Default::default()
        };

        let worksheet = self.workbook.add_worksheet();
        worksheet
            .set_name(&sheet_name_unique)
            .map_err(derive_xlsx_error_text)?;

        let mut dict_formats: HashMap<SpecCellFormat, Format> = HashMap::new();

        write_header(worksheet, &l_plans, &mut dict_formats)?;
        let mut l_width_by_col: Vec<usize> = l_plans
            .iter()
            .map(|plan| estimate_unicode_string_width(&plan.name))
            .collect();

        let mut n_cells_non_finite = 0usize;
        for (idx_row, row) in table.rows.iter().enumerate() {
            let if_measure = policy_autofit
                .height_body_inferred_max
                .is_none_or(|n_max| idx_row < n_max);

            for (idx_col, (plan, value)) in l_plans.iter().zip(&row.values).enumerate() {
                if matches!(value, EnumCellValue::Number(val) if !val.is_finite()) {
                    n_cells_non_finite += 1;
                }
                write_cell_with_format(
                    worksheet,
                    idx_row + 1,
                    idx_col,
                    value,
                    plan,
                    &value_policy,
                    &mut dict_formats,
                )?;
                if if_measure && plan.width == EnumColumnWidth::Autofit {
                    let n_width_cell =
                        estimate_unicode_string_width(&render_cell_text(value, plan, &value_policy));
                    l_width_by_col[idx_col] = usize::max(l_width_by_col[idx_col], n_width_cell);
                }
            }
        }
        if n_cells_non_finite > 0 {
            report.warn(format!(
                "{n_cells_non_finite} NaN/Inf number cells written as text"
            ));
        }

        let n_min = usize::max(1, policy_autofit.width_cell_min);
        let n_max = usize::min(255, usize::max(n_min, policy_autofit.width_cell_max));
        for (idx_col, plan) in l_plans.iter().enumerate() {
            let width = match plan.width {
                EnumColumnWidth::Default => None,
                EnumColumnWidth::Fixed(n_width_fixed) => Some(n_width_fixed),
                EnumColumnWidth::Autofit => Some(usize::min(
                    n_max,
                    usize::max(n_min, l_width_by_col[idx_col] + policy_autofit.width_cell_padding),
                ) as f64),
            };
            if let Some(n_width_final) = width {
                worksheet
                    .set_column_width(cast_col_num(idx_col)?, n_width_final)
                    .map_err(derive_xlsx_error_text)?;
            }
            report.widths_by_col.push(width);
        }

        let freeze_panes = config.general_settings.freeze_panes.as_ref();
        report.freeze_panes = plan_freeze_panes(freeze_panes, &table.columns);
        if let Some((n_row, n_col)) = report.freeze_panes {
            worksheet
                .set_freeze_panes(n_row, n_col)
                .map_err(derive_xlsx_error_text)?;
        } else if freeze_panes.is_some() {
            report.warn("freeze_panes selects no rows or columns; nothing frozen");
        }

        debug!(
            sheet = %report.sheet_name,
            rows = n_height,
            cols = n_width,
            formats = dict_formats.len(),
            "sheet written"
        );
        self.l_reports.push(report);
        Ok(())
    }

    fn derive_unique_sheet_name(&mut self, name: &str) -> String {
        if !self.set_sheet_names_existing.contains(name) {
            self.set_sheet_names_existing.insert(name.to_string());
            return name.to_string();
        }

        let base_name: String = name
            .chars()
            .take(usize::max(1, N_LEN_EXCEL_SHEET_NAME_MAX - 3))
            .collect();

        let mut n_idx = 2usize;
        loop {
            let candidate: String = format!("{base_name}__{n_idx}")
                .chars()
                .take(N_LEN_EXCEL_SHEET_NAME_MAX)
                .collect();
            if !self.set_sheet_names_existing.contains(&candidate) {
                self.set_sheet_names_existing.insert(candidate.clone());
                return candidate;
            }
            n_idx += 1;
        }
    }
}

/// Write `table` as the single sheet of a new workbook at `path_file_out`.
pub fn write_output_table(
    table: &SpecOutputTable,
    config: &SpecMappingConfig,
    path_file_out: impl AsRef<Path>,
    write_options: SpecXlsxWriteOptions,
) -> Result<SpecXlsxReport, String> {
    let mut writer = XlsxWriter::new(path_file_out.as_ref().to_path_buf(), write_options)?;
    writer.write_sheet(table, config, C_SHEET_NAME_DEFAULT)?;
    writer.close()?;
    writer
        .report()
        .pop()
        .ok_or_else(|| "No sheet was written.".to_string())
}

fn validate_policy_autofit(policy_autofit: &SpecAutofitCellsPolicy) -> Result<(), String> {
    if policy_autofit.width_cell_min > policy_autofit.width_cell_max {
        return Err(format!(
            "Autofit min width {} exceeds max width {}.",
            policy_autofit.width_cell_min, policy_autofit.width_cell_max
        ));
    }
    Ok(())
}

fn derive_cached_format<'a>(
    dict_formats: &'a mut HashMap<SpecCellFormat, Format>,
    spec: &SpecCellFormat,
) -> &'a Format {
    dict_formats
        .entry(spec.clone())
        .or_insert_with(|| derive_rust_xlsx_format(spec))
}

fn write_header(
    worksheet: &mut Worksheet,
    l_plans: &[SpecColumnFormatPlan],
    dict_formats: &mut HashMap<SpecCellFormat, Format>,
) -> Result<(), String> {
    for (idx_col, plan) in l_plans.iter().enumerate() {
        let fmt_header = derive_cached_format(dict_formats, &plan.fmt_header);
        if plan.name.is_empty() {
            worksheet
                .write_blank(0, cast_col_num(idx_col)?, fmt_header)
                .map_err(derive_xlsx_error_text)?;
        } else {
            worksheet
                .write_string_with_format(0, cast_col_num(idx_col)?, &plan.name, fmt_header)
                .map_err(derive_xlsx_error_text)?;
        }
    }
    Ok(())
}

/// Write one body cell with its planned format.
fn write_cell_with_format(
    worksheet: &mut Worksheet,
    idx_row: usize,
    idx_col: usize,
    value: &EnumCellValue,
    plan: &SpecColumnFormatPlan,
    value_policy: &SpecXlsxValuePolicy,
    dict_formats: &mut HashMap<SpecCellFormat, Format>,
) -> Result<(), String> {
    let n_row = cast_row_num(idx_row)?;
    let n_col = cast_col_num(idx_col)?;

    match value {
        EnumCellValue::Blank => {
            let format = derive_cached_format(dict_formats, &plan.fmt_body);
            worksheet
                .write_blank(n_row, n_col, format)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::Text(val) => {
            let format = derive_cached_format(dict_formats, &plan.fmt_body);
            worksheet
                .write_string_with_format(n_row, n_col, val, format)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::Number(val) if !val.is_finite() => {
            let c_text = convert_nan_inf_to_str(*val, value_policy)?;
            let format = derive_cached_format(dict_formats, &plan.fmt_body);
            worksheet
                .write_string_with_format(n_row, n_col, &c_text, format)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::Number(val) => {
            let format = derive_cached_format(dict_formats, select_body_format(plan, value));
            worksheet
                .write_number_with_format(n_row, n_col, *val, format)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::Date(dt) => {
            let spec = if dt.time() == chrono::NaiveTime::MIN {
                &plan.fmt_date
            } else {
                &plan.fmt_datetime
            };
            let format = derive_cached_format(dict_formats, spec);
            worksheet
                .write_number_with_format(n_row, n_col, convert_datetime_to_excel_serial(dt), format)
                .map_err(derive_xlsx_error_text)?;
        }
        EnumCellValue::DateRange(dt_start, dt_end) => {
            let c_text = render_date_range(dt_start, dt_end, &plan.date_range_pattern);
            let format = derive_cached_format(dict_formats, &plan.fmt_body);
            worksheet
                .write_string_with_format(n_row, n_col, &c_text, format)
                .map_err(derive_xlsx_error_text)?;
        }
    }
    Ok(())
}

fn derive_excel_datetime(dt: &NaiveDateTime) -> Result<ExcelDateTime, XlsxError> {
    let n_year = u16::try_from(dt.year()).unwrap_or(1900);
    ExcelDateTime::from_ymd(n_year, dt.month() as u8, dt.day() as u8)?.and_hms(
        dt.hour() as u16,
        dt.minute() as u8,
        dt.second(),
    )
}

fn cast_row_num(value: usize) -> Result<u32, String> {
    u32::try_from(value).map_err(|_| format!("row index overflow: {value}"))
}

fn cast_col_num(value: usize) -> Result<u16, String> {
    u16::try_from(value).map_err(|_| format!("column index overflow: {value}"))
}

fn derive_xlsx_error_text(err: XlsxError) -> String {
    format!("xlsx write error: {err}")
}

#[cfg(test)]
mod tests {
    use calamine::{Data, Reader, open_workbook_auto};
    use chrono::NaiveDate;
    use tempfile::tempdir;
    use xlmap_core::{
        EnumFreezePanes, SpecColumnConfig, SpecColumnFormatting, SpecFreezePanes, SpecOutputRow,
        default_config,
    };

    use super::*;

    fn payroll_config() -> SpecMappingConfig {
        let mut config = default_config();
        config.output_columns = vec![
            SpecColumnConfig::new("Name", "Name"),
            SpecColumnConfig {
                width: Some(14.0),
                formatting: SpecColumnFormatting {
                    number_format: Some("#,##0.00".to_string()),
                    negative_format: Some("(#,##0.00)".to_string()),
                    ..Default::default()
                },
                ..SpecColumnConfig::new("Net", "Net")
            },
            SpecColumnConfig {
                formatting: SpecColumnFormatting {
                    date_format: Some("mm/dd/yyyy".to_string()),
                    ..Default::default()
                },
                ..SpecColumnConfig::new("Check Date", "Check Date")
            },
            SpecColumnConfig {
                formatting: SpecColumnFormatting {
                    date_range_format: Some("mm/dd/yyyy".to_string()),
                    ..Default::default()
                },
                ..SpecColumnConfig::new("Period", "Period")
            },
        ];
        config.general_settings.freeze_panes = Some(EnumFreezePanes::Spec(SpecFreezePanes {
            freeze_header: true,
            freeze_columns: vec!["Name".to_string()],
        }));
        config
    }

    fn payroll_table() -> SpecOutputTable {
        let dt_check = NaiveDate::from_ymd_opt(2024, 1, 19)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        SpecOutputTable {
            columns: vec![
                "Name".to_string(),
                "Net".to_string(),
                "Check Date".to_string(),
                "Period".to_string(),
            ],
            cols_idx_config: vec![0, 1, 2, 3],
            rows: vec![
                SpecOutputRow {
                    idx_row_source: 0,
                    values: vec![
                        EnumCellValue::from("Ann Example-Longname"),
                        EnumCellValue::Number(1234.5),
                        EnumCellValue::Date(dt_check),
                        EnumCellValue::DateRange(
                            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                        ),
                    ],
                },
                SpecOutputRow {
                    idx_row_source: 2,
                    values: vec![
                        EnumCellValue::from("Bob"),
                        EnumCellValue::Number(-20.0),
                        EnumCellValue::Blank,
                        EnumCellValue::Blank,
                    ],
                },
            ],
        }
    }

    fn pinned_options() -> SpecXlsxWriteOptions {
        SpecXlsxWriteOptions {
            datetime_created: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0),
            ..Default::default()
        }
    }

    #[test]
    fn write_output_table_reports_layout() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("payroll_formatted.xlsx");

        let report =
            write_output_table(&payroll_table(), &payroll_config(), &path, pinned_options()).unwrap();
        assert!(path.is_file());
        assert_eq!(report.sheet_name, C_SHEET_NAME_DEFAULT);
        assert_eq!(report.n_rows, 2);
        assert_eq!(report.n_cols, 4);
        assert_eq!(report.freeze_panes, Some((1, 1)));
        assert_eq!(report.widths_by_col[1], Some(14.0));
        // "Ann Example-Longname" is 20 wide, plus padding.
        assert_eq!(report.widths_by_col[0], Some(22.0));
        // "Period" header is narrower than the minimum, the rendered range is not.
        assert_eq!(report.widths_by_col[3], Some(25.0));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn written_workbook_reads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("payroll_formatted.xlsx");
        write_output_table(&payroll_table(), &payroll_config(), &path, pinned_options()).unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        let range = workbook.worksheet_range(C_SHEET_NAME_DEFAULT).unwrap();
        assert_eq!(range.get_value((0, 0)), Some(&Data::String("Name".to_string())));
        assert_eq!(range.get_value((0, 3)), Some(&Data::String("Period".to_string())));
        assert_eq!(range.get_value((1, 1)), Some(&Data::Float(1234.5)));
        assert_eq!(range.get_value((2, 1)), Some(&Data::Float(-20.0)));
        assert_eq!(
            range.get_value((1, 3)),
            Some(&Data::String("01/01/2024 - 01/15/2024".to_string()))
        );
        match range.get_value((1, 2)) {
            Some(Data::DateTime(dt)) => assert_eq!(dt.as_f64(), 45310.0),
            other => panic!("expected a date cell, got {other:?}"),
        }
    }

    #[test]
    fn pinned_creation_time_gives_identical_bytes() {
        let dir = tempdir().unwrap();
        let path_a = dir.path().join("a.xlsx");
        let path_b = dir.path().join("b.xlsx");
        write_output_table(&payroll_table(), &payroll_config(), &path_a, pinned_options()).unwrap();
        write_output_table(&payroll_table(), &payroll_config(), &path_b, pinned_options()).unwrap();
        assert_eq!(std::fs::read(&path_a).unwrap(), std::fs::read(&path_b).unwrap());
    }

    #[test]
    fn writer_dedups_sheet_names_and_rejects_write_after_close() {
        let dir = tempdir().unwrap();
        let mut writer =
            XlsxWriter::new(dir.path().join("multi.xlsx"), SpecXlsxWriteOptions::default()).unwrap();
        let table = payroll_table();
        let config = payroll_config();
        writer.write_sheet(&table, &config, "Pay/Roll").unwrap();
        writer.write_sheet(&table, &config, "Pay/Roll").unwrap();

        let l_names: Vec<String> = writer.report().into_iter().map(|rep| rep.sheet_name).collect();
        assert_eq!(l_names, vec!["Pay_Roll", "Pay_Roll__2"]);

        writer.close().unwrap();
        writer.close().unwrap();
        assert!(writer.write_sheet(&table, &config, "Late").is_err());
    }

    fn single_number_column(l_values: Vec<EnumCellValue>) -> (SpecOutputTable, SpecMappingConfig) {
        let mut config = default_config();
        config.output_columns = vec![SpecColumnConfig {
            formatting: SpecColumnFormatting {
                number_format: Some("#,##0.00".to_string()),
                ..Default::default()
            },
            ..SpecColumnConfig::new("Amount", "Amount")
        }];
        let table = SpecOutputTable {
            columns: vec!["Amount".to_string()],
            cols_idx_config: vec![0],
            rows: l_values
                .into_iter()
                .enumerate()
                .map(|(idx_row, value)| SpecOutputRow {
                    idx_row_source: idx_row,
                    values: vec![value],
                })
                .collect(),
        };
        (table, config)
    }

    #[test]
    fn autofit_measures_formatted_numbers() {
        let dir = tempdir().unwrap();
        let (table, config) = single_number_column(vec![EnumCellValue::Number(1234567.5)]);
        let report =
            write_output_table(&table, &config, dir.path().join("w.xlsx"), pinned_options()).unwrap();
        // "1,234,567.50" rather than "1234567.5".
        assert_eq!(report.widths_by_col, vec![Some(14.0)]);
    }

    #[test]
    fn non_finite_numbers_are_written_as_policy_text() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nan.xlsx");
        let (table, config) = single_number_column(vec![
            EnumCellValue::Number(f64::NAN),
            EnumCellValue::Number(f64::INFINITY),
            EnumCellValue::Number(2.0),
        ]);
        let report = write_output_table(&table, &config, &path, pinned_options()).unwrap();
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("2 NaN/Inf"));

        let mut workbook = open_workbook_auto(&path).unwrap();
        let range = workbook.worksheet_range(C_SHEET_NAME_DEFAULT).unwrap();
        assert_eq!(range.get_value((1, 0)), Some(&Data::String("NaN".to_string())));
        assert_eq!(range.get_value((2, 0)), Some(&Data::String("Inf".to_string())));
        assert_eq!(range.get_value((3, 0)), Some(&Data::Float(2.0)));
    }

    #[test]
    fn mismatched_column_plan_is_an_error() {
        let dir = tempdir().unwrap();
        let mut table = payroll_table();
        table.cols_idx_config = vec![0, 1];
        let err = write_output_table(
            &table,
            &payroll_config(),
            dir.path().join("bad.xlsx"),
            SpecXlsxWriteOptions::default(),
        )
        .unwrap_err();
        assert!(err.contains("resolve to configured columns"));
    }
}
