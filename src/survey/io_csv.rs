// Primitives for reading CSV files.

use crate::survey::{io_common::ParsedTable, *};

fn read_cell(s: &str) -> RawValue {
    let t = s.trim();
    if t.is_empty() {
        RawValue::Missing
    } else if let Ok(i) = t.parse::<i64>() {
        RawValue::Integer(i)
    } else if let Ok(f) = t.parse::<f64>() {
        RawValue::Float(f)
    } else {
        RawValue::Text(t.to_string())
    }
}

/// Reads a CSV file with a header row.
///
/// Short lines are padded with missing cells.
pub fn read_csv_table(path: &str) -> SurveyResult<ParsedTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let mut records = rdr.records();
    let header: Vec<String> = match records.next() {
        Some(line_r) => line_r
            .context(CsvLineParseSnafu { lineno: 1usize })?
            .iter()
            .map(|s| s.trim().to_string())
            .collect(),
        None => whatever!("empty csv file {}", path),
    };
    debug!("read_csv_table: header: {:?}", header);

    let mut rows: Vec<(usize, Vec<RawValue>)> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        // The header is on line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        let mut cells: Vec<RawValue> = line.iter().map(read_cell).collect();
        if cells.len() > header.len() {
            whatever!(
                "line {} has {} cells but the header has {} columns",
                lineno,
                cells.len(),
                header.len()
            )
        }
        cells.resize(header.len(), RawValue::Missing);
        debug!("read_csv_table: lineno: {:?} row: {:?}", lineno, &cells);
        rows.push((lineno, cells));
    }
    Ok(ParsedTable { header, rows })
}
