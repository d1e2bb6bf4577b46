//! Input reader: spreadsheet workbooks via calamine, Arrow IPC via polars.

use std::fs::File;
use std::path::{Path, PathBuf};

use calamine::{Data, Reader, open_workbook_auto};
use polars::prelude::{AnyValue, DataFrame, IpcReader, PolarsError, SerReader};
use thiserror::Error;
use tracing::{debug, info, warn};
use xlmap_core::util::{convert_excel_serial_to_datetime, parse_date_text};
use xlmap_core::{EnumCellValue, SpecInputTable};

use crate::conf::{TUP_EXT_IPC, TUP_EXT_WORKBOOK};
use crate::spec::{SpecReadOptions, SpecReadOutput};
use crate::util::{derive_unique_column_names, detect_header_row};

/// Failures opening or decoding an input file.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("input file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("unsupported input format {extension:?} for {}", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("failed to open workbook {}: {source}", .path.display())]
    Workbook {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("workbook {} has no worksheets", .path.display())]
    NoSheets { path: PathBuf },

    #[error("worksheet {sheet:?} not found; available: {available:?}")]
    SheetNotFound { sheet: String, available: Vec<String> },

    #[error("failed to open {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read Arrow IPC {}: {source}", .path.display())]
    Ipc {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("header row {idx_row} is past the last row ({n_rows} rows)")]
    HeaderRowOutOfRange { idx_row: usize, n_rows: usize },

    #[error("header row {idx_row} is blank")]
    HeaderRowBlank { idx_row: usize },
}

/// Read a named-column table from a workbook or Arrow IPC file.
pub fn read_input_table(
    path: impl AsRef<Path>,
    options: &SpecReadOptions,
) -> Result<SpecReadOutput, ReadError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ReadError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let c_ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let output = if TUP_EXT_WORKBOOK.contains(&c_ext.as_str()) {
        read_workbook(path, options)?
    } else if TUP_EXT_IPC.contains(&c_ext.as_str()) {
        read_ipc(path)?
    } else {
        return Err(ReadError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: c_ext,
        });
    };

    info!(
        path = %path.display(),
        rows = output.table.height(),
        columns = output.table.width(),
        header_row = output.idx_row_header,
        "input table read"
    );
    Ok(output)
}

////////////////////////////////////////////////////////////////////////////////
// #region Workbook

fn read_workbook(path: &Path, options: &SpecReadOptions) -> Result<SpecReadOutput, ReadError> {
    let map_workbook_err = |source| ReadError::Workbook {
        path: path.to_path_buf(),
        source,
    };

    let mut workbook = open_workbook_auto(path).map_err(map_workbook_err)?;
    let l_sheet_names = workbook.sheet_names().to_owned();
    let sheet_name = match &options.sheet_name {
        Some(name) if l_sheet_names.contains(name) => name.clone(),
        Some(name) => {
            return Err(ReadError::SheetNotFound {
                sheet: name.clone(),
                available: l_sheet_names,
            });
        }
        None => l_sheet_names.first().cloned().ok_or_else(|| ReadError::NoSheets {
            path: path.to_path_buf(),
        })?,
    };

    let range = workbook.worksheet_range(&sheet_name).map_err(map_workbook_err)?;
    let n_row_offset = range.start().map_or(0, |(n_row, _)| n_row as usize);
    let grid: Vec<Vec<EnumCellValue>> = range
        .rows()
        .map(|row| row.iter().map(derive_cell_value_from_data).collect())
        .collect();
    debug!(sheet = %sheet_name, rows = grid.len(), offset = n_row_offset, "worksheet range loaded");

    let idx_row_local = match options.idx_row_header {
        Some(idx_row) if grid.is_empty() => idx_row,
        Some(idx_row) => {
            // Rows above the used range are blank.
            let Some(idx_local) = idx_row.checked_sub(n_row_offset) else {
                return Err(ReadError::HeaderRowBlank { idx_row });
            };
            let Some(row_header) = grid.get(idx_local) else {
                return Err(ReadError::HeaderRowOutOfRange {
                    idx_row,
                    n_rows: n_row_offset + grid.len(),
                });
            };
            if row_header.iter().all(EnumCellValue::is_blank) {
                return Err(ReadError::HeaderRowBlank { idx_row });
            }
            idx_local
        }
        None => detect_header_row(&grid).unwrap_or_else(|| {
            warn!(sheet = %sheet_name, "no header row detected; using the first row");
            0
        }),
    };

    let (table, n_rows_skipped) = derive_table_from_grid(grid, idx_row_local);
    Ok(SpecReadOutput {
        table,
        sheet_name: Some(sheet_name),
        idx_row_header: n_row_offset + idx_row_local,
        n_rows_skipped,
    })
}

fn derive_cell_value_from_data(value: &Data) -> EnumCellValue {
    match value {
        Data::Empty => EnumCellValue::Blank,
        Data::String(val) => EnumCellValue::Text(val.clone()),
        Data::Float(val) => EnumCellValue::Number(*val),
        Data::Int(val) => EnumCellValue::Number(*val as f64),
        Data::Bool(val) => EnumCellValue::Text(if *val { "True" } else { "False" }.to_string()),
        Data::Error(err) => EnumCellValue::Text(err.to_string()),
        Data::DateTime(dt) => convert_excel_serial_to_datetime(dt.as_f64())
            .map(EnumCellValue::Date)
            .unwrap_or(EnumCellValue::Number(dt.as_f64())),
        Data::DateTimeIso(val) => parse_date_text(val)
            .map(EnumCellValue::Date)
            .unwrap_or_else(|| EnumCellValue::Text(val.clone())),
        other => EnumCellValue::Text(other.to_string()),
    }
}

/// Split a raw grid into header and data rows, dropping fully blank rows.
fn derive_table_from_grid(grid: Vec<Vec<EnumCellValue>>, idx_row_header: usize) -> (SpecInputTable, usize) {
    let mut it_rows = grid.into_iter().skip(idx_row_header);
    let Some(row_header) = it_rows.next() else {
        return (SpecInputTable::default(), 0);
    };

    let l_raw: Vec<String> = row_header.iter().map(ToString::to_string).collect();
    let columns = derive_unique_column_names(&l_raw);
    let n_width = columns.len();

    let mut rows = Vec::new();
    let mut n_rows_skipped = 0usize;
    for mut row in it_rows {
        if row.iter().all(EnumCellValue::is_blank) {
            n_rows_skipped += 1;
            continue;
        }
        row.resize(n_width, EnumCellValue::Blank);
        rows.push(row);
    }

    (SpecInputTable::new(columns, rows), n_rows_skipped)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region ArrowIpc

fn read_ipc(path: &Path) -> Result<SpecReadOutput, ReadError> {
    let file = File::open(path).map_err(|source| ReadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let df = IpcReader::new(file).finish().map_err(|source| ReadError::Ipc {
        path: path.to_path_buf(),
        source,
    })?;
    let (table, n_rows_skipped) = derive_table_from_dataframe(&df).map_err(|source| ReadError::Ipc {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(SpecReadOutput {
        table,
        sheet_name: None,
        idx_row_header: 0,
        n_rows_skipped,
    })
}

fn derive_table_from_dataframe(df: &DataFrame) -> Result<(SpecInputTable, usize), PolarsError> {
    let l_raw: Vec<String> = df
        .get_column_names_str()
        .into_iter()
        .map(ToString::to_string)
        .collect();
    let columns = derive_unique_column_names(&l_raw);
    let l_cols = df.get_columns();

    let mut rows = Vec::with_capacity(df.height());
    let mut n_rows_skipped = 0usize;
    for idx_row in 0..df.height() {
        let mut row = Vec::with_capacity(l_cols.len());
        for col in l_cols {
            row.push(derive_cell_value_from_any_value(col.get(idx_row)?));
        }
        if row.iter().all(EnumCellValue::is_blank) {
            n_rows_skipped += 1;
            continue;
        }
        rows.push(row);
    }
    Ok((SpecInputTable::new(columns, rows), n_rows_skipped))
}

fn derive_cell_value_from_any_value(value: AnyValue<'_>) -> EnumCellValue {
    match value {
        AnyValue::Null => EnumCellValue::Blank,
        AnyValue::String(val) => EnumCellValue::Text(val.to_string()),
        AnyValue::StringOwned(val) => EnumCellValue::Text(val.to_string()),
        AnyValue::Boolean(val) => EnumCellValue::Text(if val { "True" } else { "False" }.to_string()),
        AnyValue::UInt8(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt16(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt32(val) => EnumCellValue::Number(val as f64),
        AnyValue::UInt64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int8(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int16(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Int64(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float32(val) => EnumCellValue::Number(val as f64),
        AnyValue::Float64(val) => EnumCellValue::Number(val),
        _ => EnumCellValue::Text(value.to_string()),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
