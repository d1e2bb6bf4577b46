//! Workbook input and output for `xlmap`.
//!
//! [`reader::read_input_table`] loads a named-column table from a workbook
//! (calamine) or Arrow IPC file (polars). [`writer::XlsxWriter`] writes a
//! processed table as a styled worksheet (rust_xlsxwriter), with per-column
//! formats planned in [`style`].

pub mod conf;
pub mod reader;
pub mod spec;
pub mod style;
pub mod util;
pub mod writer;

pub use reader::{ReadError, read_input_table};
pub use spec::{
    EnumColumnWidth, SpecAutofitCellsPolicy, SpecCellFormat, SpecColumnFormatPlan,
    SpecReadOptions, SpecReadOutput, SpecXlsxReport, SpecXlsxValuePolicy, SpecXlsxWriteOptions,
};
pub use writer::{XlsxWriter, write_output_table};
