//! In-memory processing: transform, void-filter and order the output table.

use std::collections::HashSet;

use tracing::info;

use crate::error::FatalError;
use crate::spec::{SpecInputTable, SpecMappingConfig, SpecOutputTable, SpecProcessOutput};
use crate::transform::transform_rows;
use crate::void::{apply_void_filter, plan_void_columns};

/// Reject headers the transformer cannot address unambiguously.
pub fn validate_input_header(columns: &[String]) -> Result<(), FatalError> {
    if columns.is_empty() {
        return Err(FatalError::EmptyHeader);
    }
    let mut set_seen = HashSet::with_capacity(columns.len());
    for name in columns {
        if !set_seen.insert(name.as_str()) {
            return Err(FatalError::DuplicateInputColumn { name: name.clone() });
        }
    }
    Ok(())
}

/// Written column order: `column_order` names first, then the rest as configured.
pub fn derive_column_order(config: &SpecMappingConfig) -> Vec<usize> {
    let mut l_order: Vec<usize> = Vec::with_capacity(config.output_columns.len());
    for name in &config.column_order {
        if let Some(idx_col) = config.output_columns.iter().position(|col| &col.name == name)
            && !l_order.contains(&idx_col)
        {
            l_order.push(idx_col);
        }
    }
    for idx_col in 0..config.output_columns.len() {
        if !l_order.contains(&idx_col) {
            l_order.push(idx_col);
        }
    }
    l_order
}

/// Run the row transformer and void filter over a whole input table.
///
/// Row-local evaluation failures are collected in
/// [`SpecProcessOutput::warnings`]; only a malformed header is fatal.
pub fn process(
    table: &SpecInputTable,
    config: &SpecMappingConfig,
) -> Result<SpecProcessOutput, FatalError> {
    validate_input_header(&table.columns)?;

    let (mut l_rows, warnings) = transform_rows(table, config);
    info!(
        rows = l_rows.len(),
        columns = config.output_columns.len(),
        warnings = warnings.len(),
        "rows transformed"
    );

    let columns_config = config.column_names();
    let plan_void = plan_void_columns(&config.void_filter, &columns_config, &table.columns);
    let notes: Vec<String> = plan_void
        .l_unresolved
        .iter()
        .map(|name| format!("void filter column {name:?} matches no output or input column; ignored"))
        .collect();
    let n_rows_voided = apply_void_filter(&plan_void, &mut l_rows, table);
    if plan_void.is_active() {
        info!(voided = n_rows_voided, kept = l_rows.len(), "void filter applied");
    }

    let cols_idx_config = derive_column_order(config);
    if cols_idx_config.iter().enumerate().any(|(idx, idx_config)| idx != *idx_config) {
        for row in &mut l_rows {
            let l_values = std::mem::take(&mut row.values);
            row.values = cols_idx_config
                .iter()
                .map(|idx_config| l_values.get(*idx_config).cloned().unwrap_or_default())
                .collect();
        }
    }

    let table_out = SpecOutputTable {
        columns: cols_idx_config
            .iter()
            .map(|idx_config| columns_config[*idx_config].clone())
            .collect(),
        cols_idx_config,
        rows: l_rows,
    };

    Ok(SpecProcessOutput {
        table: table_out,
        warnings,
        notes,
        n_rows_input: table.height(),
        n_rows_voided,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conf::derive_default_mapping_config;
    use crate::error::EvalError;
    use crate::spec::{EnumCellValue, SpecColumnConfig, SpecVoidConfig};

    fn payroll_table() -> SpecInputTable {
        SpecInputTable::new(
            ["Name", "Gross", "SS", "Med"].iter().map(|col| col.to_string()).collect(),
            vec![
                vec!["A".into(), 100.0.into(), 5.0.into(), 2.0.into()],
                vec!["B".into(), 0.0.into(), 0.0.into(), 0.0.into()],
            ],
        )
    }

    fn liab_config() -> SpecMappingConfig {
        SpecMappingConfig {
            output_columns: vec![
                SpecColumnConfig::new("Name", "Name"),
                SpecColumnConfig::new("Liab", "=Gross - SS - Med"),
            ],
            void_filter: SpecVoidConfig {
                enabled: true,
                zero_columns: vec!["Gross".to_string()],
            },
            ..derive_default_mapping_config()
        }
    }

    #[test]
    fn liability_example_end_to_end() {
        let output = process(&payroll_table(), &liab_config()).expect("process");

        assert_eq!(output.table.columns, vec!["Name".to_string(), "Liab".to_string()]);
        assert_eq!(output.table.height(), 1);
        assert_eq!(output.table.get(0, "Name"), Some(&EnumCellValue::from("A")));
        assert_eq!(output.table.get(0, "Liab"), Some(&EnumCellValue::Number(93.0)));
        assert_eq!(output.n_rows_input, 2);
        assert_eq!(output.n_rows_voided, 1);
        assert!(output.warnings.is_empty());
        assert!(output.notes.is_empty());
    }

    #[test]
    fn column_order_reorders_values_and_headers() {
        let config = SpecMappingConfig {
            column_order: vec!["Liab".to_string()],
            ..liab_config()
        };
        let output = process(&payroll_table(), &config).expect("process");

        assert_eq!(output.table.columns, vec!["Liab".to_string(), "Name".to_string()]);
        assert_eq!(output.table.cols_idx_config, vec![1, 0]);
        assert_eq!(
            output.table.rows[0].values,
            vec![EnumCellValue::Number(93.0), EnumCellValue::from("A")]
        );
    }

    #[test]
    fn unresolved_void_column_becomes_a_note() {
        let config = SpecMappingConfig {
            void_filter: SpecVoidConfig {
                enabled: true,
                zero_columns: vec!["Net".to_string()],
            },
            ..liab_config()
        };
        let output = process(&payroll_table(), &config).expect("process");
        assert_eq!(output.table.height(), 2);
        assert_eq!(output.notes.len(), 1);
    }

    #[test]
    fn warnings_survive_voiding_of_their_row() {
        let config = SpecMappingConfig {
            output_columns: vec![
                SpecColumnConfig::new("Name", "Name"),
                SpecColumnConfig::new("Share", "=SS / Gross"),
            ],
            ..liab_config()
        };
        let output = process(&payroll_table(), &config).expect("process");
        assert_eq!(output.table.height(), 1);
        assert_eq!(output.warnings.len(), 1);
        assert_eq!(output.warnings[0].idx_row, 1);
        assert_eq!(output.warnings[0].error, EvalError::DivisionByZero);
    }

    #[test]
    fn malformed_header_is_fatal() {
        let config = liab_config();
        let empty = SpecInputTable::default();
        assert!(matches!(process(&empty, &config), Err(FatalError::EmptyHeader)));

        let dup = SpecInputTable::new(vec!["A".to_string(), "A".to_string()], vec![]);
        assert!(matches!(
            process(&dup, &config),
            Err(FatalError::DuplicateInputColumn { .. })
        ));
    }
}
