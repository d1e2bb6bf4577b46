//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{InfoLevel, Verbosity};

#[derive(Parser)]
#[command(
    name = "xlmap",
    version,
    about = "Reformat spreadsheet tables through a JSON column mapping",
    long_about = "Reformat spreadsheet tables through a JSON column mapping.\n\n\
                  Each output column is copied, combined or computed from the input\n\
                  columns, void rows are dropped, and the result is written as a\n\
                  styled .xlsx workbook."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for debug, -vv for trace, -q for warnings only).
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Log output format.
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Reformat one input file, or every readable file in a folder.
    Process(ProcessArgs),

    /// Show the first output rows without writing a workbook.
    Preview(PreviewArgs),

    /// List the column names of an input file.
    Columns(InputArgs),

    /// Write the sample mapping configuration.
    InitConfig {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },

    /// Load and validate a mapping configuration.
    CheckConfig {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
}

#[derive(Args)]
pub struct InputArgs {
    /// Input workbook (.xlsx, .xlsm, .xlsb, .xls, .ods), Arrow IPC file, or folder.
    #[arg(long = "input", short = 'i', value_name = "PATH")]
    pub input: PathBuf,

    /// Worksheet to read (default: first sheet).
    #[arg(long = "sheet", value_name = "NAME")]
    pub sheet: Option<String>,

    /// 1-based header row (default: auto-detect).
    #[arg(long = "header-row", value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
    pub header_row: Option<u32>,
}

#[derive(Args)]
pub struct ProcessArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Mapping configuration JSON.
    #[arg(long = "config", short = 'c', value_name = "FILE")]
    pub config: PathBuf,

    /// Directory for the timestamped output file (default: next to the input).
    #[arg(long = "output-dir", value_name = "DIR", conflicts_with = "output")]
    pub output_dir: Option<PathBuf>,

    /// Exact output file path (single-file input only).
    #[arg(long = "output", short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub input: InputArgs,

    /// Mapping configuration JSON.
    #[arg(long = "config", short = 'c', value_name = "FILE")]
    pub config: PathBuf,

    /// Output rows to show.
    #[arg(long = "rows", short = 'n', value_name = "N", default_value_t = 10)]
    pub rows: usize,

    /// Show every output row.
    #[arg(long = "all", conflicts_with = "rows")]
    pub all: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_process_arguments() {
        let cli = Cli::try_parse_from([
            "xlmap",
            "-v",
            "process",
            "--input",
            "register.xlsx",
            "--config",
            "mapping.json",
            "--header-row",
            "3",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert!(matches!(cli.log_format, LogFormatArg::Json));
        let Command::Process(args) = cli.command else {
            panic!("expected process");
        };
        assert_eq!(args.input.input, PathBuf::from("register.xlsx"));
        assert_eq!(args.input.header_row, Some(3));
        assert!(args.output.is_none());
    }

    #[test]
    fn output_dir_conflicts_with_output() {
        let result = Cli::try_parse_from([
            "xlmap",
            "process",
            "-i",
            "in.xlsx",
            "-c",
            "map.json",
            "--output-dir",
            "out",
            "-o",
            "out.xlsx",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn header_row_is_one_based() {
        let result = Cli::try_parse_from([
            "xlmap", "process", "-i", "in.xlsx", "-c", "map.json", "--header-row", "0",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_preview_and_columns() {
        let cli = Cli::try_parse_from(["xlmap", "preview", "-i", "in.xlsx", "-c", "map.json", "-n", "3"])
            .unwrap();
        let Command::Preview(args) = cli.command else {
            panic!("expected preview");
        };
        assert_eq!(args.rows, 3);
        assert!(!args.all);

        let result =
            Cli::try_parse_from(["xlmap", "preview", "-i", "in", "-c", "m.json", "-n", "3", "--all"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["xlmap", "columns", "-i", "in.xlsx", "--sheet", "Pay"]).unwrap();
        let Command::Columns(args) = cli.command else {
            panic!("expected columns");
        };
        assert_eq!(args.sheet.as_deref(), Some("Pay"));
    }
}
