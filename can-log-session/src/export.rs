//! Delimited text export and re-import

use crate::config::ExportOptions;
use crate::session::LogSession;
use crate::table::{parse_utc, Column, ColumnData, IndexKind, Table, INDEX_NAME};
use crate::types::{Result, SessionError, Timestamp};
use chrono::DateTime;
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Export a session as CSV next to `stem`
///
/// With a single time base one `<stem>.csv` is written; otherwise one file
/// per group, `<stem>.ChannelGroup_<i>_<group>.csv`. Returns the written
/// paths in order.
pub fn export_csv(session: &LogSession, stem: &Path, options: &ExportOptions) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    if options.single_time_base {
        let table = Table::from_session(session, options.time_as_date);
        let path = with_suffix(stem, ".csv");
        write_table(&table, &path, options)?;
        written.push(path);
    } else {
        for (i, group) in session.groups.iter().enumerate() {
            let table = Table::from_group(group, session.start_time(), options.time_as_date);
            let path = with_suffix(
                stem,
                &format!(".ChannelGroup_{}_{}.csv", i, file_safe(&group.name)),
            );
            write_table(&table, &path, options)?;
            written.push(path);
        }
    }

    log::info!("Exported {} CSV file(s) for {:?}", written.len(), stem);
    Ok(written)
}

/// Write one table as delimited text
pub fn write_table(table: &Table, path: &Path, options: &ExportOptions) -> Result<()> {
    let delimiter = options.delimiter.to_string();
    let mut out = BufWriter::new(File::create(path)?);

    let header: Vec<String> = std::iter::once(INDEX_NAME)
        .chain(table.columns().iter().map(|c| c.name.as_str()))
        .map(|name| quote(name, options.delimiter))
        .collect();
    writeln!(out, "{}", header.join(&delimiter))?;

    let origin = table.index().first().copied().unwrap_or(0.0);
    for row in 0..table.len() {
        let time = if options.time_as_date {
            table
                .absolute_time(row)
                .ok_or_else(|| {
                    SessionError::LogFormat(format!(
                        "Timestamp {} is outside the calendar range",
                        table.index()[row]
                    ))
                })?
                .format(crate::table::DATE_FORMAT)
                .to_string()
        } else if options.time_from_zero {
            format!("{}", table.index()[row] - origin)
        } else {
            format!("{}", table.index()[row])
        };

        let mut cells = vec![time];
        cells.extend(table.columns().iter().map(|c| match &c.data {
            // Text is always quoted so it never reloads as a number
            ColumnData::Text(values) => values[row].as_deref().map(quote_text).unwrap_or_default(),
            ColumnData::Numeric(_) => c.data.cell(row, ""),
        }));
        writeln!(out, "{}", cells.join(&delimiter))?;
    }

    out.flush()?;
    log::debug!("Wrote {} rows to {:?}", table.len(), path);
    Ok(())
}

/// Reload an exported file
///
/// The index is read as calendar time when it does not parse as seconds.
/// Columns holding a quoted cell are text, with empty unquoted cells read as
/// missing. Other columns whose non-empty cells all parse as numbers become
/// numeric, with empty cells read as NaN. Units are not stored in the export.
pub fn read_csv(path: &Path, delimiter: char) -> Result<Table> {
    let reader = BufReader::new(File::open(path)?);
    let mut lines = reader.lines();

    let header = match lines.next() {
        Some(line) => split_record(&line?, delimiter),
        None => {
            return Err(SessionError::LogFormat(format!("{:?} is empty", path)));
        }
    };
    if header.first().map(|f| f.value.as_str()) != Some(INDEX_NAME) {
        return Err(SessionError::LogFormat(format!(
            "{:?} does not start with a '{}' column",
            path, INDEX_NAME
        )));
    }

    let width = header.len();
    let mut index_cells = Vec::new();
    let mut cells: Vec<Vec<Field>> = (1..width).map(|_| Vec::new()).collect();
    for (number, line) in lines.enumerate() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let record = split_record(&line, delimiter);
        if record.len() != width {
            return Err(SessionError::LogFormat(format!(
                "{:?} line {}: expected {} fields, found {}",
                path,
                number + 2,
                width,
                record.len()
            )));
        }
        let mut fields = record.into_iter();
        index_cells.extend(fields.next().map(|f| f.value));
        for (column, field) in cells.iter_mut().zip(fields) {
            column.push(field);
        }
    }

    let (start_time, index_kind, index) = parse_index(&index_cells)?;
    let columns = header
        .into_iter()
        .skip(1)
        .zip(cells)
        .map(|(name, values)| Column {
            name: name.value,
            unit: None,
            data: infer_column(values),
        })
        .collect();

    Table::new(start_time, index_kind, index, columns)
}

fn parse_index(cells: &[String]) -> Result<(Timestamp, IndexKind, Vec<f64>)> {
    let numeric: Option<Vec<f64>> = cells.iter().map(|c| c.parse().ok()).collect();
    if let Some(index) = numeric {
        return Ok((DateTime::UNIX_EPOCH, IndexKind::Relative, index));
    }

    let times = cells
        .iter()
        .map(|c| parse_utc(c))
        .collect::<Result<Vec<_>>>()?;
    let start = times.first().copied().unwrap_or(DateTime::UNIX_EPOCH);
    let index = times
        .iter()
        .map(|t| {
            let delta = *t - start;
            delta.num_microseconds().unwrap_or(0) as f64 / 1_000_000.0
        })
        .collect();
    Ok((start, IndexKind::Timestamp, index))
}

fn infer_column(fields: Vec<Field>) -> ColumnData {
    let text = |fields: Vec<Field>| {
        ColumnData::Text(
            fields
                .into_iter()
                .map(|f| if f.value.is_empty() && !f.quoted { None } else { Some(f.value) })
                .collect(),
        )
    };
    if fields.iter().any(|f| f.quoted) {
        return text(fields);
    }

    let numeric: Option<Vec<f64>> = fields
        .iter()
        .map(|f| if f.value.is_empty() { Some(f64::NAN) } else { f.value.parse().ok() })
        .collect();
    match numeric {
        Some(numbers) => ColumnData::Numeric(numbers),
        None => text(fields),
    }
}

fn quote(field: &str, delimiter: char) -> String {
    if field.contains(delimiter) || field.contains('"') {
        quote_text(field)
    } else {
        field.to_string()
    }
}

fn quote_text(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

/// One delimited field, `quoted` when any part of it was in quotes
#[derive(Debug, PartialEq)]
struct Field {
    value: String,
    quoted: bool,
}

fn split_record(line: &str, delimiter: char) -> Vec<Field> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => {
                in_quotes = !in_quotes;
                quoted = true;
            }
            c if c == delimiter && !in_quotes => fields.push(Field {
                value: std::mem::take(&mut field),
                quoted: std::mem::take(&mut quoted),
            }),
            c => field.push(c),
        }
    }
    fields.push(Field { value: field, quoted });
    fields
}

fn with_suffix(stem: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(stem.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}
