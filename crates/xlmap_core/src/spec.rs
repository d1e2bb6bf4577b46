//! Mapping configuration models, cell values and row containers.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::conf::{C_HEADER_BG_COLOR_DEFAULT, C_HEADER_FONT_COLOR_DEFAULT};
use crate::error::EvalError;
use crate::expr::EnumSourceColumn;
use crate::util::{format_number_general, parse_number_text};

////////////////////////////////////////////////////////////////////////////////
// #region CellValue

/// Typed cell value flowing from input rows to the written workbook.
///
/// Coercion between variants only happens through the explicit rules in
/// [`crate::expr`] and [`crate::void`]; nothing is converted implicitly.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum EnumCellValue {
    /// Empty cell.
    #[default]
    Blank,
    /// Numeric value.
    Number(f64),
    /// Text value.
    Text(String),
    /// Date or date-time value.
    Date(NaiveDateTime),
    /// Inclusive date range, rendered as text.
    DateRange(NaiveDate, NaiveDate),
}

impl EnumCellValue {
    /// Blank cells and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Blank => true,
            Self::Text(val) => val.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric reading of the value: numbers as-is, text when it parses.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(val) => Some(*val),
            Self::Text(val) => parse_number_text(val),
            _ => None,
        }
    }
}

impl fmt::Display for EnumCellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank => Ok(()),
            Self::Number(val) => write!(f, "{}", format_number_general(*val)),
            Self::Text(val) => write!(f, "{val}"),
            Self::Date(val) => {
                if val.num_seconds_from_midnight() == 0 {
                    write!(f, "{}", val.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", val.format("%Y-%m-%d %H:%M:%S"))
                }
            }
            Self::DateRange(start, end) => {
                write!(f, "{} - {}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
        }
    }
}

impl From<f64> for EnumCellValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for EnumCellValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for EnumCellValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnConfiguration

/// Horizontal alignment accepted in the mapping configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnumAlignment {
    #[default]
    Left,
    Center,
    Right,
}

impl EnumAlignment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Center => "center",
            Self::Right => "right",
        }
    }
}

/// Per-column formatting descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecColumnFormatting {
    /// Excel number format applied to numeric cells.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_format: Option<String>,
    /// Excel number format applied instead when the value is negative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_format: Option<String>,
    /// Excel date format applied to date cells.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
    /// Date pattern applied to each end of a date-range cell.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_range_format: Option<String>,
    /// Strip `*` from text values of direct columns.
    #[serde(skip_serializing_if = "is_false")]
    pub remove_asterisks: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// One output column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecColumnConfig {
    /// Output header text; unique within the configuration.
    pub name: String,
    /// Blank, direct/combined reference, or `=` formula.
    #[serde(default)]
    pub source_column: String,
    /// Body cell alignment.
    #[serde(default)]
    pub alignment: EnumAlignment,
    /// Fixed column width in Excel units.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default)]
    pub formatting: SpecColumnFormatting,
}

impl SpecColumnConfig {
    pub fn new(name: impl Into<String>, source_column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_column: source_column.into(),
            alignment: EnumAlignment::default(),
            width: None,
            formatting: SpecColumnFormatting::default(),
        }
    }

    /// Parsed form of [`Self::source_column`].
    pub fn source(&self) -> EnumSourceColumn {
        EnumSourceColumn::parse(&self.source_column)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region SheetConfiguration

/// Header row styling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecHeaderFormatting {
    pub bold: bool,
    /// Hex RGB fill color, empty for none.
    pub background_color: String,
    /// Hex RGB font color, empty for none.
    pub font_color: String,
    /// Header alignment; `null` defers to the column's own alignment.
    pub alignment: Option<EnumAlignment>,
}

impl Default for SpecHeaderFormatting {
    fn default() -> Self {
        Self {
            bold: true,
            background_color: C_HEADER_BG_COLOR_DEFAULT.to_string(),
            font_color: C_HEADER_FONT_COLOR_DEFAULT.to_string(),
            alignment: Some(EnumAlignment::Center),
        }
    }
}

/// Structured freeze-pane selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecFreezePanes {
    /// Keep the header row visible.
    pub freeze_header: bool,
    /// Output columns to keep visible; everything up to the right-most one is frozen.
    pub freeze_columns: Vec<String>,
}

/// Freeze-pane setting in either legacy or structured form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumFreezePanes {
    /// Top-left unfrozen cell, e.g. `"B2"`.
    CellRef(String),
    Spec(SpecFreezePanes),
}

/// Worksheet-level toggles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecGeneralSettings {
    pub auto_fit_columns: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freeze_panes: Option<EnumFreezePanes>,
}

impl Default for SpecGeneralSettings {
    fn default() -> Self {
        Self {
            auto_fit_columns: true,
            freeze_panes: None,
        }
    }
}

/// Void-row filter rules.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecVoidConfig {
    pub enabled: bool,
    /// Columns checked for zero/blank; output names first, then input names.
    pub zero_columns: Vec<String>,
}

/// Root mapping configuration. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecMappingConfig {
    pub output_columns: Vec<SpecColumnConfig>,
    #[serde(default)]
    pub header_formatting: SpecHeaderFormatting,
    /// Header alignment overrides keyed by output column name.
    #[serde(default)]
    pub column_name_alignment: BTreeMap<String, EnumAlignment>,
    #[serde(default)]
    pub general_settings: SpecGeneralSettings,
    #[serde(default, rename = "void")]
    pub void_filter: SpecVoidConfig,
    /// Optional output ordering; unlisted columns follow in configured order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub column_order: Vec<String>,
}

impl SpecMappingConfig {
    /// Look up an output column by exact name.
    pub fn column(&self, name: &str) -> Option<&SpecColumnConfig> {
        self.output_columns.iter().find(|col| col.name == name)
    }

    /// Output column names in configured order.
    pub fn column_names(&self) -> Vec<String> {
        self.output_columns.iter().map(|col| col.name.clone()).collect()
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region RowContainers

static VAL_BLANK: EnumCellValue = EnumCellValue::Blank;

/// Named-column input table, independent of the source file format.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecInputTable {
    /// Header names in sheet order.
    pub columns: Vec<String>,
    /// Data rows; short rows read as blank in the missing positions.
    pub rows: Vec<Vec<EnumCellValue>>,
}

impl SpecInputTable {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<EnumCellValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col == name)
    }

    /// Borrow one row as a name-addressable view.
    pub fn row(&self, idx_row: usize) -> Option<SpecInputRow<'_>> {
        self.rows.get(idx_row).map(|values| SpecInputRow {
            idx_row,
            columns: &self.columns,
            values,
        })
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = SpecInputRow<'_>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(idx_row, values)| SpecInputRow {
                idx_row,
                columns: &self.columns,
                values,
            })
    }
}

/// Borrowed view of one input row.
#[derive(Debug, Clone, Copy)]
pub struct SpecInputRow<'a> {
    /// Zero-based data row index.
    pub idx_row: usize,
    pub columns: &'a [String],
    pub values: &'a [EnumCellValue],
}

impl<'a> SpecInputRow<'a> {
    pub fn new(idx_row: usize, columns: &'a [String], values: &'a [EnumCellValue]) -> Self {
        Self {
            idx_row,
            columns,
            values,
        }
    }

    /// Value by column name; `None` when the column does not exist.
    pub fn get(&self, name: &str) -> Option<&'a EnumCellValue> {
        self.columns
            .iter()
            .position(|col| col == name)
            .map(|idx_col| self.get_at(idx_col))
    }

    /// Value by column position; positions past the row end are blank.
    pub fn get_at(&self, idx_col: usize) -> &'a EnumCellValue {
        self.values.get(idx_col).unwrap_or(&VAL_BLANK)
    }
}

/// One transformed row, aligned to the configured output columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecOutputRow {
    /// Index of the input row this row was produced from.
    pub idx_row_source: usize,
    pub values: Vec<EnumCellValue>,
}

/// Final output table in written column order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecOutputTable {
    /// Header names in written order.
    pub columns: Vec<String>,
    /// For each written column, its index in `output_columns`.
    pub cols_idx_config: Vec<usize>,
    pub rows: Vec<SpecOutputRow>,
}

impl SpecOutputTable {
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Value by row position and header name.
    pub fn get(&self, idx_row: usize, name: &str) -> Option<&EnumCellValue> {
        let idx_col = self.columns.iter().position(|col| col == name)?;
        self.rows.get(idx_row)?.values.get(idx_col)
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ProcessReport

/// Row-local evaluation failure; the cell was written blank.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecRowWarning {
    /// Zero-based data row index in the input table.
    pub idx_row: usize,
    /// Output column name.
    pub column: String,
    pub error: EvalError,
}

impl fmt::Display for SpecRowWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {} column {:?}: {}",
            self.idx_row, self.column, self.error
        )
    }
}

/// Result of [`crate::engine::process`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecProcessOutput {
    pub table: SpecOutputTable,
    /// Row-local failures in row, then column order.
    pub warnings: Vec<SpecRowWarning>,
    /// Non-row diagnostics (void columns that resolve nowhere, ...).
    pub notes: Vec<String>,
    pub n_rows_input: usize,
    pub n_rows_voided: usize,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
