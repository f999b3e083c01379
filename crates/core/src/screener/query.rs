use crate::domain::filter::EmaReference;
use crate::domain::preset::{PresetComparison, PresetField};
use crate::domain::scan::{Column, ScanRow};
use crate::screener::ScanParams;
use serde_json::{json, Value};

const SORT_BY: &str = "Value.Traded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Greater,
    EGreater,
    Less,
    ELess,
    Equal,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Greater => "greater",
            Operation::EGreater => "egreater",
            Operation::Less => "less",
            Operation::ELess => "eless",
            Operation::Equal => "equal",
        }
    }

    fn holds(self, left: f64, right: f64) -> bool {
        match self {
            Operation::Greater => left > right,
            Operation::EGreater => left >= right,
            Operation::Less => left < right,
            Operation::ELess => left <= right,
            Operation::Equal => left == right,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f64),
    Column(Column),
    Text(String),
}

impl Operand {
    fn to_wire(&self) -> Value {
        match self {
            Operand::Number(n) => json!(n),
            Operand::Column(c) => json!(c.as_str()),
            Operand::Text(s) => json!(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub left: Column,
    pub operation: Operation,
    pub right: Operand,
}

impl Predicate {
    pub fn new(left: Column, operation: Operation, right: Operand) -> Self {
        Self {
            left,
            operation,
            right,
        }
    }

    fn number(left: Column, operation: Operation, value: f64) -> Self {
        Self::new(left, operation, Operand::Number(value))
    }

    /// Evaluates the predicate against a row. Missing values never match.
    pub fn matches(&self, row: &ScanRow) -> bool {
        match &self.right {
            Operand::Text(expected) => {
                self.operation == Operation::Equal && row.text(self.left) == Some(expected.as_str())
            }
            Operand::Number(r) => row
                .number(self.left)
                .is_some_and(|l| self.operation.holds(l, *r)),
            Operand::Column(c) => match (row.number(self.left), row.number(*c)) {
                (Some(l), Some(r)) => self.operation.holds(l, r),
                _ => false,
            },
        }
    }

    fn to_wire(&self) -> Value {
        json!({
            "left": self.left.as_str(),
            "operation": self.operation.as_str(),
            "right": self.right.to_wire(),
        })
    }
}

/// A declarative scanner query: market scope, field selection, predicates and row limit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanQuery {
    pub market: String,
    pub columns: Vec<Column>,
    pub predicates: Vec<Predicate>,
    pub limit: usize,
}

impl ScanQuery {
    pub fn body(&self) -> Value {
        let columns: Vec<&str> = self.columns.iter().map(|c| c.as_str()).collect();
        let filter: Vec<Value> = self.predicates.iter().map(Predicate::to_wire).collect();
        json!({
            "markets": [self.market],
            "symbols": {"query": {"types": []}, "tickers": []},
            "options": {"lang": "en"},
            "columns": columns,
            "filter": filter,
            "sort": {"sortBy": SORT_BY, "sortOrder": "desc"},
            "range": [0, self.limit],
        })
    }

    /// RSI predicates, re-applied client-side after retrieval.
    pub fn rsi_guard(&self) -> Vec<&Predicate> {
        self.predicates
            .iter()
            .filter(|p| p.left == Column::Rsi)
            .collect()
    }

    pub fn has_predicate_on(&self, col: Column) -> bool {
        self.predicates.iter().any(|p| p.left == col)
    }
}

pub fn build_query(params: &ScanParams, market: &str) -> ScanQuery {
    let eff = params.filters.effective();
    let cfg = &eff.thresholds;
    let strict_preset = params.preset_comparison == PresetComparison::Strict;

    let lower = |field: PresetField| {
        if strict_preset && eff.from_preset(field) {
            Operation::Greater
        } else {
            Operation::EGreater
        }
    };
    let upper = |field: PresetField| {
        if strict_preset && eff.from_preset(field) {
            Operation::Less
        } else {
            Operation::ELess
        }
    };

    let mut predicates = vec![Predicate::new(
        Column::Type,
        Operation::Equal,
        Operand::Text("stock".to_string()),
    )];

    if eff.mode.includes_technical() {
        predicates.push(Predicate::number(Column::Rsi, lower(PresetField::RsiMin), cfg.rsi_min));
        predicates.push(Predicate::number(Column::Rsi, upper(PresetField::RsiMax), cfg.rsi_max));
        predicates.push(Predicate::number(Column::Adx, lower(PresetField::AdxMin), cfg.adx_min));

        let ema_col = match cfg.ema {
            EmaReference::None => None,
            EmaReference::Ema20 => Some(Column::Ema20),
            EmaReference::Ema50 => Some(Column::Ema50),
            EmaReference::Ema200 => Some(Column::Ema200),
        };
        if let Some(col) = ema_col {
            predicates.push(Predicate::new(
                Column::Close,
                Operation::Greater,
                Operand::Column(col),
            ));
        }
    }

    if eff.mode.includes_fundamental() {
        predicates.push(Predicate::number(Column::PeTtm, upper(PresetField::PeMax), cfg.pe_max));
        predicates.push(Predicate::number(Column::Roic, lower(PresetField::RoceMin), cfg.roce_min));
        predicates.push(Predicate::number(Column::Roe, lower(PresetField::RoeMin), cfg.roe_min));
        predicates.push(Predicate::number(
            Column::DebtToEquity,
            upper(PresetField::DeMax),
            cfg.de_max,
        ));
        if let Some(nm) = cfg.net_margin_min {
            predicates.push(Predicate::number(
                Column::NetMargin,
                lower(PresetField::NetMarginMin),
                nm,
            ));
        }
    }

    ScanQuery {
        market: market.to_string(),
        columns: Column::REQUESTED.to_vec(),
        predicates,
        limit: params.limit,
    }
}
