//! Time-indexed tables
//!
//! A [`Table`] materialises a session as rows (one per distinct timestamp)
//! and named columns. All tables are immutable values: every analysis step
//! returns a new table.
//!
//! Alignment policy: the row index is the sorted union of all group time
//! axes. Each column is forward-filled with its most recent sample at or
//! before the row time; rows before a column's first sample are NaN (numeric)
//! or empty (text).

use crate::metadata::offset_time;
use crate::session::{ChannelGroup, LogSession, Samples};
use crate::stats::SummaryStats;
use crate::types::{Result, SessionError, Timestamp};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Format accepted by [`Table::slice_time`] (fractional seconds optional)
pub const RANGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
/// Format of calendar timestamps in rendered tables and exports
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
/// Header of the index column
pub const INDEX_NAME: &str = "timestamps";

const MAX_DISPLAY_ROWS: usize = 60;
const TRUNCATED_EDGE_ROWS: usize = 5;

/// How the row index is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Absolute UTC calendar time
    Timestamp,
    /// Seconds relative to the session start
    Relative,
}

/// Column types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnData::Numeric(_) => ColumnKind::Numeric,
            ColumnData::Text(_) => ColumnKind::Text,
        }
    }

    fn take(&self, rows: &[usize]) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => ColumnData::Numeric(rows.iter().map(|&r| v[r]).collect()),
            ColumnData::Text(v) => ColumnData::Text(rows.iter().map(|&r| v[r].clone()).collect()),
        }
    }

    /// Cell as text; missing values render as `missing`
    pub(crate) fn cell(&self, row: usize, missing: &str) -> String {
        match self {
            ColumnData::Numeric(v) if v[row].is_nan() => missing.to_string(),
            ColumnData::Numeric(v) => format!("{}", v[row]),
            ColumnData::Text(v) => v[row].clone().unwrap_or_else(|| missing.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub unit: Option<String>,
    pub data: ColumnData,
}

/// Elementwise arithmetic between two numeric columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    /// IEEE semantics: division by zero yields ±inf or NaN, never an error
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
        }
    }
}

/// Comparison used by row predicates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Comparison {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
    Ne,
}

/// `value <op> threshold` on one column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuePredicate {
    pub op: Comparison,
    pub value: f64,
}

impl ValuePredicate {
    pub fn new(op: Comparison, value: f64) -> Self {
        Self { op, value }
    }

    /// NaN never matches
    pub fn matches(&self, v: f64) -> bool {
        if v.is_nan() {
            return false;
        }
        match self.op {
            Comparison::Gt => v > self.value,
            Comparison::Ge => v >= self.value,
            Comparison::Lt => v < self.value,
            Comparison::Le => v <= self.value,
            Comparison::Eq => v == self.value,
            Comparison::Ne => v != self.value,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    start_time: Timestamp,
    index_kind: IndexKind,
    /// Seconds relative to `start_time`, non-decreasing
    index: Vec<f64>,
    columns: Vec<Column>,
}

impl Table {
    /// Build a table from raw parts
    ///
    /// Every column must have one value per index entry.
    pub fn new(
        start_time: Timestamp,
        index_kind: IndexKind,
        index: Vec<f64>,
        columns: Vec<Column>,
    ) -> Result<Table> {
        if let Some(bad) = columns.iter().find(|c| c.data.len() != index.len()) {
            return Err(SessionError::LogFormat(format!(
                "Column '{}' has {} rows, index has {}",
                bad.name,
                bad.data.len(),
                index.len()
            )));
        }
        Ok(Table {
            start_time,
            index_kind,
            index,
            columns,
        })
    }

    /// Tabulate a whole session on the union of its time axes
    pub fn from_session(session: &LogSession, time_as_date: bool) -> Table {
        let mut index: Vec<f64> = session
            .groups
            .iter()
            .flat_map(|g| g.timestamps.iter().copied())
            .collect();
        index.sort_by(f64::total_cmp);
        index.dedup();

        Self::aligned(session.start_time(), time_as_date, index, &session.groups)
    }

    /// Tabulate one group on its own time axis
    pub fn from_group(group: &ChannelGroup, start_time: Timestamp, time_as_date: bool) -> Table {
        Self::aligned(
            start_time,
            time_as_date,
            group.timestamps.clone(),
            std::slice::from_ref(group),
        )
    }

    fn aligned(
        start_time: Timestamp,
        time_as_date: bool,
        index: Vec<f64>,
        groups: &[ChannelGroup],
    ) -> Table {
        let mut used = HashSet::new();
        let mut columns = Vec::new();

        for group in groups {
            let rows = forward_fill_rows(&group.timestamps, &index);
            for channel in &group.channels {
                let name = if used.contains(channel.name.as_str()) {
                    format!("{}.{}", group.name, channel.name)
                } else {
                    channel.name.clone()
                };
                used.insert(name.clone());

                let data = match &channel.samples {
                    Samples::Numeric(values) => ColumnData::Numeric(
                        rows.iter()
                            .map(|r| r.map_or(f64::NAN, |i| values[i]))
                            .collect(),
                    ),
                    Samples::Bytes(values) => ColumnData::Text(
                        rows.iter().map(|r| r.map(|i| hex_bytes(&values[i]))).collect(),
                    ),
                };
                columns.push(Column {
                    name,
                    unit: channel.unit.clone(),
                    data,
                });
            }
        }

        log::debug!("Tabulated {} rows x {} columns", index.len(), columns.len());

        Table {
            start_time,
            index_kind: if time_as_date {
                IndexKind::Timestamp
            } else {
                IndexKind::Relative
            },
            index,
            columns,
        }
    }

    pub fn start_time(&self) -> Timestamp {
        self.start_time
    }

    pub fn index_kind(&self) -> IndexKind {
        self.index_kind
    }

    /// Relative seconds of every row
    pub fn index(&self) -> &[f64] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Column names with their types
    pub fn schema(&self) -> Vec<(&str, ColumnKind)> {
        self.columns
            .iter()
            .map(|c| (c.name.as_str(), c.data.kind()))
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Values of a numeric column
    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        let column = self
            .column(name)
            .ok_or_else(|| SessionError::NameNotFound(name.to_string()))?;
        match &column.data {
            ColumnData::Numeric(values) => Ok(values),
            ColumnData::Text(_) => Err(SessionError::ColumnType(name.to_string())),
        }
    }

    /// Absolute time of a row, None when it falls outside the calendar range
    pub fn absolute_time(&self, row: usize) -> Option<Timestamp> {
        offset_time(self.start_time, self.index[row])
    }

    /// Index cell as rendered in listings and exports
    ///
    /// Rows without a calendar time fall back to relative seconds.
    pub fn index_label(&self, row: usize) -> String {
        match (self.index_kind, self.absolute_time(row)) {
            (IndexKind::Timestamp, Some(time)) => time.format(DATE_FORMAT).to_string(),
            _ => format!("{}", self.index[row]),
        }
    }

    /// Add a column computed elementwise from two numeric columns
    ///
    /// NaN and infinities propagate. An existing column with the same name is
    /// replaced.
    pub fn with_computed_column(
        &self,
        name: &str,
        lhs: &str,
        rhs: &str,
        op: BinaryOp,
    ) -> Result<Table> {
        let a = self.numeric(lhs)?;
        let b = self.numeric(rhs)?;
        let values = a.iter().zip(b).map(|(&x, &y)| op.apply(x, y)).collect();

        let mut table = self.clone();
        table.columns.retain(|c| c.name != name);
        table.columns.push(Column {
            name: name.to_string(),
            unit: None,
            data: ColumnData::Numeric(values),
        });
        Ok(table)
    }

    /// `name = numerator / denominator`
    pub fn with_ratio_column(&self, name: &str, numerator: &str, denominator: &str) -> Result<Table> {
        self.with_computed_column(name, numerator, denominator, BinaryOp::Div)
    }

    /// Rows whose absolute time lies in `[start, end]`
    ///
    /// Bounds use `YYYY-MM-DD HH:MM:SS` (UTC), fractional seconds allowed.
    pub fn slice_time(&self, start: &str, end: &str) -> Result<Table> {
        Ok(self.slice_time_range(parse_utc(start)?, parse_utc(end)?))
    }

    /// Rows whose absolute time lies in `[start, end]`
    pub fn slice_time_range(&self, start: Timestamp, end: Timestamp) -> Table {
        let rows: Vec<usize> = (0..self.len())
            .filter(|&i| matches!(self.absolute_time(i), Some(t) if t >= start && t <= end))
            .collect();
        self.take_rows(&rows)
    }

    /// Rows where the column value satisfies the predicate
    pub fn filter_rows(&self, column: &str, predicate: &ValuePredicate) -> Result<Table> {
        self.filter_by(column, |v| predicate.matches(v))
    }

    /// Rows where `keep` returns true for the column value
    pub fn filter_by<F>(&self, column: &str, keep: F) -> Result<Table>
    where
        F: Fn(f64) -> bool,
    {
        let values = self.numeric(column)?;
        let rows: Vec<usize> = values
            .iter()
            .enumerate()
            .filter(|(_, &v)| keep(v))
            .map(|(i, _)| i)
            .collect();
        Ok(self.take_rows(&rows))
    }

    /// Summary statistics of a numeric column
    pub fn summary(&self, column: &str) -> Result<SummaryStats> {
        Ok(SummaryStats::from_values(self.numeric(column)?))
    }

    fn take_rows(&self, rows: &[usize]) -> Table {
        Table {
            start_time: self.start_time,
            index_kind: self.index_kind,
            index: rows.iter().map(|&r| self.index[r]).collect(),
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    unit: c.unit.clone(),
                    data: c.data.take(rows),
                })
                .collect(),
        }
    }
}

/// Index of the sample to use for each row: the last sample at or before it
fn forward_fill_rows(timestamps: &[f64], index: &[f64]) -> Vec<Option<usize>> {
    let mut next = 0;
    index
        .iter()
        .map(|&t| {
            while next < timestamps.len() && timestamps[next] <= t {
                next += 1;
            }
            next.checked_sub(1)
        })
        .collect()
}

/// Space-separated upper-case hex
pub(crate) fn hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn parse_utc(text: &str) -> Result<Timestamp> {
    NaiveDateTime::parse_from_str(text.trim(), RANGE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| SessionError::InvalidTimestamp(format!("'{}': {}", text, e)))
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows: Vec<Option<usize>> = if self.len() > MAX_DISPLAY_ROWS {
            (0..TRUNCATED_EDGE_ROWS)
                .map(Some)
                .chain(std::iter::once(None))
                .chain((self.len() - TRUNCATED_EDGE_ROWS..self.len()).map(Some))
                .collect()
        } else {
            (0..self.len()).map(Some).collect()
        };

        let mut cells: Vec<Vec<String>> = Vec::with_capacity(rows.len() + 1);
        let mut header = vec![INDEX_NAME.to_string()];
        header.extend(self.columns.iter().map(|c| c.name.clone()));
        cells.push(header);

        for row in &rows {
            let line = match row {
                Some(r) => {
                    let mut line = vec![self.index_label(*r)];
                    line.extend(self.columns.iter().map(|c| c.data.cell(*r, "NaN")));
                    line
                }
                None => vec!["...".to_string(); self.columns.len() + 1],
            };
            cells.push(line);
        }

        let widths: Vec<usize> = (0..=self.columns.len())
            .map(|col| cells.iter().map(|line| line[col].len()).max().unwrap_or(0))
            .collect();

        for line in &cells {
            let mut text = format!("{:<width$}", line[0], width = widths[0]);
            for (cell, width) in line.iter().zip(&widths).skip(1) {
                text.push_str(&format!("  {:>width$}", cell, width = width));
            }
            writeln!(f, "{}", text.trim_end())?;
        }

        write!(f, "\n[{} rows x {} columns]", self.len(), self.columns.len())
    }
}
