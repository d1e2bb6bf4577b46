//! Source-column expressions: blank, direct/combined references and
//! arithmetic formulas over input column names.
//!
//! Formulas evaluate strictly left to right with no operator precedence:
//! `=A + B * C` is `(A + B) * C`. Parentheses group explicitly and a leading
//! `-` negates the operand that follows it.

use crate::conf::{C_COMBINED_SEPARATOR, C_FORMULA_PREFIX, N_FORMULA_DEPTH_MAX};
use crate::error::EvalError;
use crate::spec::{EnumCellValue, SpecInputRow};
use crate::util::parse_number_text;

////////////////////////////////////////////////////////////////////////////////
// #region SourceColumn

/// Parsed `source_column` string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnumSourceColumn {
    /// Empty string; the output cell is always blank.
    Blank,
    /// One input column name, or several joined by `" + "`.
    DirectOrCombined(String),
    /// Formula body after the leading `=`.
    Formula(String),
}

impl EnumSourceColumn {
    pub fn parse(raw: &str) -> Self {
        let c_raw = raw.trim();
        if c_raw.is_empty() {
            Self::Blank
        } else if let Some(body) = c_raw.strip_prefix(C_FORMULA_PREFIX) {
            Self::Formula(body.to_string())
        } else {
            Self::DirectOrCombined(c_raw.to_string())
        }
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FormulaTree

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumFormulaOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl EnumFormulaOp {
    fn from_char(chr: char) -> Option<Self> {
        match chr {
            '+' => Some(Self::Add),
            '-' => Some(Self::Sub),
            '*' => Some(Self::Mul),
            '/' => Some(Self::Div),
            _ => None,
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> Result<f64, EvalError> {
        match self {
            Self::Add => Ok(lhs + rhs),
            Self::Sub => Ok(lhs - rhs),
            Self::Mul => Ok(lhs * rhs),
            Self::Div if rhs == 0.0 => Err(EvalError::DivisionByZero),
            Self::Div => Ok(lhs / rhs),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnumFormulaOperand {
    Literal(f64),
    /// Column reference; `idx_col` is `None` when the name is not in the header.
    Reference {
        name: String,
        idx_col: Option<usize>,
    },
    Negate(Box<EnumFormulaOperand>),
    Group(Box<SpecFormula>),
}

/// Operand chain folded left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecFormula {
    pub first: EnumFormulaOperand,
    pub rest: Vec<(EnumFormulaOp, EnumFormulaOperand)>,
}

impl SpecFormula {
    /// Fold the chain; a non-finite result (overflow, NaN operand) is an error.
    pub fn evaluate(&self, row: &SpecInputRow<'_>) -> Result<f64, EvalError> {
        let mut n_acc = evaluate_operand(&self.first, row)?;
        for (op, operand) in &self.rest {
            let n_rhs = evaluate_operand(operand, row)?;
            n_acc = op.apply(n_acc, n_rhs)?;
        }
        if !n_acc.is_finite() {
            return Err(EvalError::NonFiniteResult { value: n_acc });
        }
        Ok(n_acc)
    }
}

fn evaluate_operand(operand: &EnumFormulaOperand, row: &SpecInputRow<'_>) -> Result<f64, EvalError> {
    match operand {
        EnumFormulaOperand::Literal(val) => Ok(*val),
        EnumFormulaOperand::Reference { name, idx_col } => {
            let idx_col = idx_col.ok_or_else(|| EvalError::UnresolvedReference { name: name.clone() })?;
            coerce_operand(name, row.get_at(idx_col))
        }
        EnumFormulaOperand::Negate(inner) => Ok(-evaluate_operand(inner, row)?),
        EnumFormulaOperand::Group(inner) => inner.evaluate(row),
    }
}

/// Numeric reading of a formula operand: blank is zero, text must parse.
fn coerce_operand(name: &str, value: &EnumCellValue) -> Result<f64, EvalError> {
    if value.is_blank() {
        return Ok(0.0);
    }
    match value {
        EnumCellValue::Number(val) => Ok(*val),
        EnumCellValue::Text(val) => parse_number_text(val).ok_or_else(|| EvalError::NonNumericOperand {
            name: name.to_string(),
            value: val.clone(),
        }),
        other => Err(EvalError::NonNumericOperand {
            name: name.to_string(),
            value: other.to_string(),
        }),
    }
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region FormulaParser

struct FormulaParser<'a> {
    c_src: &'a str,
    n_pos: usize,
    /// Header names sorted longest first, paired with their column index.
    l_names: Vec<(&'a str, usize)>,
    /// Current nesting of groups and negations.
    n_depth: usize,
}

impl<'a> FormulaParser<'a> {
    fn new(c_src: &'a str, columns: &'a [String]) -> Self {
        let mut l_names: Vec<(&str, usize)> = columns
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty())
            .map(|(idx_col, name)| (name.as_str(), idx_col))
            .collect();
        l_names.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then(a.1.cmp(&b.1)));
        Self {
            c_src,
            n_pos: 0,
            l_names,
            n_depth: 0,
        }
    }

    fn rest(&self) -> &'a str {
        &self.c_src[self.n_pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn skip_whitespace(&mut self) {
        let c_rest = self.rest();
        self.n_pos += c_rest.len() - c_rest.trim_start().len();
    }

    fn error(&self, message: impl Into<String>) -> EvalError {
        EvalError::FormulaSyntax {
            offset: self.n_pos,
            message: message.into(),
        }
    }

    fn parse_formula(&mut self) -> Result<SpecFormula, EvalError> {
        let first = self.parse_operand()?;
        let mut rest = Vec::new();
        loop {
            self.skip_whitespace();
            let Some(chr) = self.peek() else {
                break;
            };
            if chr == ')' {
                break;
            }
            let op = EnumFormulaOp::from_char(chr)
                .ok_or_else(|| self.error(format!("expected operator, found {chr:?}")))?;
            self.n_pos += chr.len_utf8();
            rest.push((op, self.parse_operand()?));
        }
        Ok(SpecFormula { first, rest })
    }

    fn parse_operand(&mut self) -> Result<EnumFormulaOperand, EvalError> {
        self.n_depth += 1;
        let operand = self.parse_operand_inner();
        self.n_depth -= 1;
        operand
    }

    fn parse_operand_inner(&mut self) -> Result<EnumFormulaOperand, EvalError> {
        if self.n_depth > N_FORMULA_DEPTH_MAX {
            return Err(self.error("formula nested too deeply"));
        }
        self.skip_whitespace();
        let Some(chr) = self.peek() else {
            return Err(self.error("expected operand"));
        };

        match chr {
            '-' => {
                self.n_pos += 1;
                Ok(EnumFormulaOperand::Negate(Box::new(self.parse_operand()?)))
            }
            '(' => {
                self.n_pos += 1;
                let inner = self.parse_formula()?;
                self.skip_whitespace();
                if self.peek() != Some(')') {
                    return Err(self.error("unclosed parenthesis"));
                }
                self.n_pos += 1;
                Ok(EnumFormulaOperand::Group(Box::new(inner)))
            }
            '"' => self.parse_quoted_reference(),
            '+' | '*' | '/' | ')' => Err(self.error(format!("expected operand, found {chr:?}"))),
            _ => {
                if let Some(operand) = self.match_column_name() {
                    return Ok(operand);
                }
                if chr.is_ascii_digit() || chr == '.' {
                    return self.parse_literal();
                }
                Ok(self.parse_bare_reference())
            }
        }
    }

    fn parse_quoted_reference(&mut self) -> Result<EnumFormulaOperand, EvalError> {
        let n_start = self.n_pos;
        let c_body = &self.rest()[1..];
        let Some(n_len) = c_body.find('"') else {
            return Err(self.error("unclosed quoted column name"));
        };
        let c_name = &c_body[..n_len];
        self.n_pos = n_start + 1 + n_len + 1;
        Ok(self.derive_reference(c_name))
    }

    /// Greedy longest-name match at the cursor.
    fn match_column_name(&mut self) -> Option<EnumFormulaOperand> {
        let c_rest = self.rest();
        let (name, idx_col) = self.l_names.iter().copied().find(|(name, _)| {
            c_rest.starts_with(name)
                && c_rest[name.len()..]
                    .chars()
                    .next()
                    .is_none_or(|chr| chr.is_whitespace() || "+-*/)".contains(chr))
        })?;
        self.n_pos += name.len();
        Some(EnumFormulaOperand::Reference {
            name: name.to_string(),
            idx_col: Some(idx_col),
        })
    }

    fn parse_literal(&mut self) -> Result<EnumFormulaOperand, EvalError> {
        let c_rest = self.rest();
        let n_len = c_rest
            .find(|chr: char| !(chr.is_ascii_digit() || chr == '.'))
            .unwrap_or(c_rest.len());
        let c_num = &c_rest[..n_len];
        let n_value = c_num
            .parse::<f64>()
            .map_err(|_| self.error(format!("invalid number {c_num:?}")))?;
        self.n_pos += n_len;
        Ok(EnumFormulaOperand::Literal(n_value))
    }

    /// Text up to the next operator or parenthesis that names no header column.
    fn parse_bare_reference(&mut self) -> EnumFormulaOperand {
        let c_rest = self.rest();
        let n_len = c_rest.find(['+', '-', '*', '/', '(', ')']).unwrap_or(c_rest.len());
        self.n_pos += n_len;
        EnumFormulaOperand::Reference {
            name: c_rest[..n_len].trim_end().to_string(),
            idx_col: None,
        }
    }

    fn derive_reference(&self, name: &str) -> EnumFormulaOperand {
        let idx_col = self
            .l_names
            .iter()
            .find(|(col, _)| *col == name)
            .map(|(_, idx_col)| *idx_col);
        EnumFormulaOperand::Reference {
            name: name.to_string(),
            idx_col,
        }
    }
}

/// Parse a formula body (without the leading `=`) against an input header.
pub fn compile_formula(body: &str, columns: &[String]) -> Result<SpecFormula, EvalError> {
    let mut parser = FormulaParser::new(body, columns);
    let formula = parser.parse_formula()?;
    parser.skip_whitespace();
    if parser.peek().is_some() {
        return Err(parser.error("unmatched closing parenthesis"));
    }
    Ok(formula)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
// #region CompiledSource

/// A `source_column` resolved once against the input header.
#[derive(Debug, Clone, PartialEq)]
pub enum EnumCompiledSource {
    Blank,
    Direct {
        name: String,
        idx_col: Option<usize>,
    },
    Combined(Vec<(String, Option<usize>)>),
    Formula(SpecFormula),
    /// Formula that failed to parse; every row reports the same error.
    Invalid(EvalError),
}

pub fn compile_source(source: &EnumSourceColumn, columns: &[String]) -> EnumCompiledSource {
    let position = |name: &str| columns.iter().position(|col| col == name);

    match source {
        EnumSourceColumn::Blank => EnumCompiledSource::Blank,
        EnumSourceColumn::DirectOrCombined(raw) => {
            if let Some(idx_col) = position(raw) {
                return EnumCompiledSource::Direct {
                    name: raw.clone(),
                    idx_col: Some(idx_col),
                };
            }
            if !raw.contains(C_COMBINED_SEPARATOR) {
                return EnumCompiledSource::Direct {
                    name: raw.clone(),
                    idx_col: None,
                };
            }
            let l_parts = raw
                .split(C_COMBINED_SEPARATOR)
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| (part.to_string(), position(part)))
                .collect();
            EnumCompiledSource::Combined(l_parts)
        }
        EnumSourceColumn::Formula(body) => match compile_formula(body, columns) {
            Ok(formula) => EnumCompiledSource::Formula(formula),
            Err(err) => EnumCompiledSource::Invalid(err),
        },
    }
}

pub fn evaluate_compiled(
    compiled: &EnumCompiledSource,
    row: &SpecInputRow<'_>,
) -> Result<EnumCellValue, EvalError> {
    match compiled {
        EnumCompiledSource::Blank => Ok(EnumCellValue::Blank),
        EnumCompiledSource::Direct { name, idx_col } => idx_col
            .map(|idx_col| row.get_at(idx_col).clone())
            .ok_or_else(|| EvalError::UnresolvedReference { name: name.clone() }),
        EnumCompiledSource::Combined(l_parts) => evaluate_combined(l_parts, row),
        EnumCompiledSource::Formula(formula) => formula.evaluate(row).map(EnumCellValue::Number),
        EnumCompiledSource::Invalid(err) => Err(err.clone()),
    }
}

/// Blank operands are skipped; all-numeric operands sum, anything else joins
/// as text with no separator.
fn evaluate_combined(
    l_parts: &[(String, Option<usize>)],
    row: &SpecInputRow<'_>,
) -> Result<EnumCellValue, EvalError> {
    let mut l_values = Vec::with_capacity(l_parts.len());
    for (name, idx_col) in l_parts {
        let idx_col = idx_col.ok_or_else(|| EvalError::UnresolvedReference { name: name.clone() })?;
        let value = row.get_at(idx_col);
        if !value.is_blank() {
            l_values.push(value);
        }
    }

    if l_values.is_empty() {
        return Ok(EnumCellValue::Blank);
    }

    let l_numbers: Option<Vec<f64>> = l_values.iter().map(|val| val.as_number()).collect();
    match l_numbers {
        Some(l_numbers) => {
            let n_sum: f64 = l_numbers.iter().sum();
            if !n_sum.is_finite() {
                return Err(EvalError::NonFiniteResult { value: n_sum });
            }
            Ok(EnumCellValue::Number(n_sum))
        }
        None => Ok(EnumCellValue::Text(l_values.iter().map(|val| val.to_string()).collect())),
    }
}

/// Evaluate a raw `source_column` string against one row.
pub fn evaluate_source(source: &str, row: &SpecInputRow<'_>) -> Result<EnumCellValue, EvalError> {
    let compiled = compile_source(&EnumSourceColumn::parse(source), row.columns);
    evaluate_compiled(&compiled, row)
}

// #endregion
////////////////////////////////////////////////////////////////////////////////
