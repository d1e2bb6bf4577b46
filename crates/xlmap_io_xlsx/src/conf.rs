//! XLSX constants and default preset factories.

use crate::spec::SpecCellFormat;

/// Excel worksheet maximum row count.
pub const N_NROWS_EXCEL_MAX: usize = 1_048_576;
/// Excel worksheet maximum column count.
pub const N_NCOLS_EXCEL_MAX: usize = 16_384;
/// Excel sheet name maximum length.
pub const N_LEN_EXCEL_SHEET_NAME_MAX: usize = 31;
/// Characters not allowed in sheet names.
pub const TUP_EXCEL_ILLEGAL: [&str; 7] = ["*", ":", "?", "/", "\\", "[", "]"];

/// Sheet name used for the formatted output.
pub const C_SHEET_NAME_DEFAULT: &str = "Sheet1";

/// Workbook extensions read through calamine.
pub const TUP_EXT_WORKBOOK: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];
/// Arrow IPC extensions read through polars.
pub const TUP_EXT_IPC: [&str; 3] = ["arrow", "ipc", "feather"];

/// Keywords that mark a payroll header row during auto-detection.
pub const TUP_HEADER_KEYWORDS: [&str; 19] = [
    "name",
    "employee",
    "pay",
    "gross",
    "net",
    "date",
    "period",
    "amount",
    "salary",
    "wage",
    "hours",
    "rate",
    "deduction",
    "tax",
    "social",
    "security",
    "medicare",
    "federal",
    "state",
];
/// Rows scanned from the top of a sheet when detecting the header.
pub const N_HEADER_SCAN_ROWS: usize = 21;
/// Distinct keywords a row must contain to be taken as the header.
pub const N_HEADER_KEYWORDS_MIN: usize = 3;

/// Date format used for date cells without a configured `date_format`.
pub const C_DATE_FORMAT_DEFAULT: &str = "yyyy-mm-dd";
/// Date-time format used for timed cells without a configured `date_format`.
pub const C_DATETIME_FORMAT_DEFAULT: &str = "yyyy-mm-dd hh:mm:ss";
/// Endpoint pattern for date ranges without a configured `date_range_format`.
pub const C_DATE_RANGE_PATTERN_DEFAULT: &str = "%Y-%m-%d";
/// Separator between the two rendered ends of a date range.
pub const C_DATE_RANGE_SEPARATOR: &str = " - ";

/// Base format shared by header and body cells.
pub fn derive_default_cell_format() -> SpecCellFormat {
    SpecCellFormat {
        valign: Some("vcenter".to_string()),
        ..Default::default()
    }
}
