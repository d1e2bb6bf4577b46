//! Void filter: drops rows whose check columns are all zero or blank.

use tracing::{debug, warn};

use crate::spec::{EnumCellValue, SpecInputTable, SpecOutputRow, SpecVoidConfig};

/// Where a `zero_columns` name resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumVoidSource {
    /// Index into the configured output columns.
    Output(usize),
    /// Index into the input header.
    Input(usize),
}

/// Void rules resolved against the output and input headers.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpecVoidPlan {
    pub l_sources: Vec<(String, EnumVoidSource)>,
    /// Names that resolved nowhere; reported once, then ignored.
    pub l_unresolved: Vec<String>,
}

impl SpecVoidPlan {
    /// Filtering happens only when at least one check column resolved.
    pub fn is_active(&self) -> bool {
        !self.l_sources.is_empty()
    }

    /// Whether every check column of the row is zero or blank.
    pub fn is_void_row(&self, row: &SpecOutputRow, table: &SpecInputTable) -> bool {
        self.is_active()
            && self.l_sources.iter().all(|(_, source)| {
                let value = match source {
                    EnumVoidSource::Output(idx_col) => row.values.get(*idx_col),
                    EnumVoidSource::Input(idx_col) => table
                        .rows
                        .get(row.idx_row_source)
                        .and_then(|values| values.get(*idx_col)),
                };
                value.is_none_or(is_void_value)
            })
    }
}

/// Resolve `zero_columns` names: output columns first, then input columns.
pub fn plan_void_columns(
    config: &SpecVoidConfig,
    columns_output: &[String],
    columns_input: &[String],
) -> SpecVoidPlan {
    let mut plan = SpecVoidPlan::default();
    if !config.enabled {
        return plan;
    }

    for name in &config.zero_columns {
        let source = columns_output
            .iter()
            .position(|col| col == name)
            .map(EnumVoidSource::Output)
            .or_else(|| {
                columns_input
                    .iter()
                    .position(|col| col == name)
                    .map(EnumVoidSource::Input)
            });
        match source {
            Some(source) => plan.l_sources.push((name.clone(), source)),
            None => {
                warn!(column = %name, "void filter column matches no output or input column; ignored");
                plan.l_unresolved.push(name.clone());
            }
        }
    }
    plan
}

/// Zero or blank. Non-numeric text and dates are never void.
pub fn is_void_value(value: &EnumCellValue) -> bool {
    if value.is_blank() {
        return true;
    }
    match value {
        EnumCellValue::Number(val) => *val == 0.0,
        EnumCellValue::Text(val) => crate::util::parse_number_text(val) == Some(0.0),
        _ => false,
    }
}

/// Drop void rows, preserving the order of the kept rows. Returns the number dropped.
pub fn apply_void_filter(
    plan: &SpecVoidPlan,
    rows: &mut Vec<SpecOutputRow>,
    table: &SpecInputTable,
) -> usize {
    if !plan.is_active() {
        return 0;
    }
    let n_before = rows.len();
    rows.retain(|row| {
        let if_void = plan.is_void_row(row, table);
        if if_void {
            debug!(row = row.idx_row_source, "row voided");
        }
        !if_void
    });
    n_before - rows.len()
}
