//! Row transformer: evaluates every configured output column for each input row.

use tracing::debug;

use crate::expr::{EnumCompiledSource, compile_source, evaluate_compiled};
use crate::spec::{
    EnumCellValue, SpecColumnConfig, SpecInputRow, SpecInputTable, SpecMappingConfig,
    SpecOutputRow, SpecRowWarning,
};
use crate::util::{parse_date_range_text, parse_date_text};

/// One output column resolved against the input header.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecColumnPlan {
    pub name: String,
    pub compiled: EnumCompiledSource,
    pub if_parse_date: bool,
    pub if_parse_date_range: bool,
    pub if_remove_asterisks: bool,
}

impl SpecColumnPlan {
    pub fn new(column: &SpecColumnConfig, columns_input: &[String]) -> Self {
        Self {
            name: column.name.clone(),
            compiled: compile_source(&column.source(), columns_input),
            if_parse_date: column.formatting.date_format.is_some(),
            if_parse_date_range: column.formatting.date_range_format.is_some(),
            if_remove_asterisks: column.formatting.remove_asterisks,
        }
    }

    /// Apply the column's value coercions to an evaluated cell.
    fn finish(&self, value: EnumCellValue) -> EnumCellValue {
        let EnumCellValue::Text(c_text) = value else {
            return value;
        };

        let c_text = if self.if_remove_asterisks
            && matches!(self.compiled, EnumCompiledSource::Direct { .. })
            && c_text.contains('*')
        {
            let c_clean = c_text.replace('*', "").trim().to_string();
            if c_clean.is_empty() {
                return EnumCellValue::Blank;
            }
            c_clean
        } else {
            c_text
        };

        if self.if_parse_date
            && let Some(dt) = parse_date_text(&c_text)
        {
            return EnumCellValue::Date(dt);
        }
        if self.if_parse_date_range
            && let Some((dt_start, dt_end)) = parse_date_range_text(&c_text)
        {
            return EnumCellValue::DateRange(dt_start, dt_end);
        }
        EnumCellValue::Text(c_text)
    }
}

/// Compile every output column once against the input header.
pub fn plan_columns(config: &SpecMappingConfig, columns_input: &[String]) -> Vec<SpecColumnPlan> {
    config
        .output_columns
        .iter()
        .map(|col| SpecColumnPlan::new(col, columns_input))
        .collect()
}

/// Evaluate one row. Failing columns are blanked and reported, never aborting the row.
pub fn transform_row(
    l_plans: &[SpecColumnPlan],
    row: &SpecInputRow<'_>,
) -> (SpecOutputRow, Vec<SpecRowWarning>) {
    let mut l_values = Vec::with_capacity(l_plans.len());
    let mut l_warnings = Vec::new();

    for plan in l_plans {
        match evaluate_compiled(&plan.compiled, row) {
            Ok(value) => l_values.push(plan.finish(value)),
            Err(error) => {
                debug!(row = row.idx_row, column = %plan.name, %error, "cell evaluation failed");
                l_values.push(EnumCellValue::Blank);
                l_warnings.push(SpecRowWarning {
                    idx_row: row.idx_row,
                    column: plan.name.clone(),
                    error,
                });
            }
        }
    }

    let row_out = SpecOutputRow {
        idx_row_source: row.idx_row,
        values: l_values,
    };
    (row_out, l_warnings)
}

/// Transform all rows in input order; output rows map 1:1 to input rows.
pub fn transform_rows(
    table: &SpecInputTable,
    config: &SpecMappingConfig,
) -> (Vec<SpecOutputRow>, Vec<SpecRowWarning>) {
    let l_plans = plan_columns(config, &table.columns);
    let mut l_rows = Vec::with_capacity(table.height());
    let mut l_warnings = Vec::new();

    for row in table.iter_rows() {
        let (row_out, l_row_warnings) = transform_row(&l_plans, &row);
        l_rows.push(row_out);
        l_warnings.extend(l_row_warnings);
    }

    (l_rows, l_warnings)
}
