//! Shared XLSX specification models.

use chrono::NaiveDateTime;
use xlmap_core::SpecInputTable;

////////////////////////////////////////////////////////////////////////////////
// #region CellFormatSpecification

/// Cell format specification, translated to a `rust_xlsxwriter::Format` at write time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct SpecCellFormat {
    /// Bold style.
    pub bold: Option<bool>,

    /// Horizontal alignment.
    pub align: Option<String>,
    /// Vertical alignment.
    pub valign: Option<String>,

    /// Number format code.
    pub num_format: Option<String>,
    /// Background fill color, six hex digits.
    pub bg_color: Option<String>,
    /// Font color, six hex digits.
    pub font_color: Option<String>,
}

impl SpecCellFormat {
    /// Return a new format by overlaying `patch` onto `self`.
    pub fn with_(&self, patch: SpecCellFormat) -> SpecCellFormat {
        self.merge(&patch)
    }

    /// Merge two formats with right-side non-`None` overwrite semantics.
    pub fn merge(&self, other: &SpecCellFormat) -> SpecCellFormat {
        SpecCellFormat {
            bold: other.bold.or(self.bold),
            align: other.align.clone().or_else(|| self.align.clone()),
            valign: other.valign.clone().or_else(|| self.valign.clone()),
            num_format: other.num_format.clone().or_else(|| self.num_format.clone()),
            bg_color: other.bg_color.clone().or_else(|| self.bg_color.clone()),
            font_color: other.font_color.clone().or_else(|| self.font_color.clone()),
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ColumnFormatSpecification

/// How a column's width is decided.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum EnumColumnWidth {
    /// Leave Excel's default width.
    #[default]
    Default,
    /// Configured width.
    Fixed(f64),
    /// Inferred from header and body text.
    Autofit,
}

/// Planned formats for one written column.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecColumnFormatPlan {
    /// Header text.
    pub name: String,
    /// Header cell format.
    pub fmt_header: SpecCellFormat,
    /// Body format for text, blanks and non-negative numbers.
    pub fmt_body: SpecCellFormat,
    /// Body format for negative numbers when a negative format is configured.
    pub fmt_body_negative: Option<SpecCellFormat>,
    /// Body format for date cells.
    pub fmt_date: SpecCellFormat,
    /// Body format for date cells carrying a time of day.
    pub fmt_datetime: SpecCellFormat,
    /// chrono pattern applied to each end of a date range.
    pub date_range_pattern: String,
    pub width: EnumColumnWidth,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region WriteOptions

/// Autofit policy for column width inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecAutofitCellsPolicy {
    /// Max body rows inspected; `None` inspects every row.
    pub height_body_inferred_max: Option<usize>,
    /// Minimum final width.
    pub width_cell_min: usize,
    /// Maximum final width.
    pub width_cell_max: usize,
    /// Width padding added after inference.
    pub width_cell_padding: usize,
}

impl Default for SpecAutofitCellsPolicy {
    fn default() -> Self {
        Self {
            height_body_inferred_max: None,
            width_cell_min: 8,
            width_cell_max: 50,
            width_cell_padding: 2,
        }
    }
}

/// Replacement text for numbers Excel cannot store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecXlsxValuePolicy {
    /// Replacement text for NaN.
    pub nan_str: String,
    /// Replacement text for positive infinity.
    pub posinf_str: String,
    /// Replacement text for negative infinity.
    pub neginf_str: String,
}

impl Default for SpecXlsxValuePolicy {
    fn default() -> Self {
        Self {
            nan_str: "NaN".to_string(),
            posinf_str: "Inf".to_string(),
            neginf_str: "-Inf".to_string(),
        }
    }
}

/// Writer-wide options.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecXlsxWriteOptions {
    /// Column autofit policy.
    pub policy_autofit: SpecAutofitCellsPolicy,
    /// Base patch merged into every header and body format.
    pub base_format_patch: SpecCellFormat,
    /// NaN/Inf replacement text.
    pub value_policy: SpecXlsxValuePolicy,
    /// Fixed workbook creation time; the current time is embedded when `None`.
    pub datetime_created: Option<NaiveDateTime>,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReadOptions

/// Options for reading an input table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpecReadOptions {
    /// Worksheet to read; the first sheet when `None`.
    pub sheet_name: Option<String>,
    /// Zero-based header row; auto-detected when `None`.
    pub idx_row_header: Option<usize>,
}

/// Input table plus how it was located in the source file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecReadOutput {
    pub table: SpecInputTable,
    /// Worksheet read, `None` for Arrow IPC input.
    pub sheet_name: Option<String>,
    /// Zero-based header row within the sheet.
    pub idx_row_header: usize,
    /// Fully blank data rows that were dropped.
    pub n_rows_skipped: usize,
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ReportSpecification

/// Per-sheet write report.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecXlsxReport {
    /// Actual unique sheet name in workbook.
    pub sheet_name: String,
    /// Body rows written.
    pub n_rows: usize,
    /// Columns written.
    pub n_cols: usize,
    /// Width set per column; `None` where Excel's default is kept.
    pub widths_by_col: Vec<Option<f64>>,
    /// Zero-based `(row, col)` of the first unfrozen cell.
    pub freeze_panes: Option<(u32, u16)>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl SpecXlsxReport {
    /// Add a warning message.
    pub fn warn(&mut self, msg: impl AsRef<str>) {
        self.warnings.push(msg.as_ref().to_string());
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
