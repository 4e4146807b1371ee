use calamine::DataType;

use crate::survey::{io_common::ParsedTable, *};

fn read_cell(cell: &DataType) -> Option<RawValue> {
    match cell {
        DataType::Empty => Some(RawValue::Missing),
        DataType::String(s) if s.trim().is_empty() => Some(RawValue::Missing),
        DataType::String(s) => Some(RawValue::Text(s.clone())),
        DataType::Int(i) => Some(RawValue::Integer(*i)),
        DataType::Float(f) => Some(RawValue::Float(*f)),
        DataType::Bool(b) => Some(RawValue::Bool(*b)),
        _ => None,
    }
}

fn header_name(cell: &DataType) -> String {
    match cell {
        DataType::String(s) => s.trim().to_string(),
        DataType::Empty => "".to_string(),
        x => x.to_string(),
    }
}

/// Reads the first row of the worksheet as the header, and the other rows as
/// responses.
pub fn read_xlsx_table(path: &str, cfs: &FileSource) -> SurveyResult<ParsedTable> {
    let wrange = get_range(path, cfs)?;

    let mut iter = wrange.rows();
    let header: Vec<String> = iter
        .next()
        .context(EmptyExcelSnafu {})?
        .iter()
        .map(header_name)
        .collect();
    debug!("read_xlsx_table: header: {:?}", header);

    let mut rows: Vec<(usize, Vec<RawValue>)> = Vec::new();
    for (idx, row) in iter.enumerate() {
        let lineno = idx + 2;
        let mut cells: Vec<RawValue> = Vec::with_capacity(header.len());
        for (col_idx, cell) in row.iter().enumerate() {
            let v = read_cell(cell).context(ExcelWrongCellTypeSnafu {
                lineno,
                column: header.get(col_idx).cloned().unwrap_or_default(),
                content: format!("{:?}", cell),
            })?;
            cells.push(v);
        }
        cells.resize(header.len(), RawValue::Missing);
        debug!("read_xlsx_table: lineno: {:?} row: {:?}", lineno, &cells);
        rows.push((lineno, cells));
    }
    Ok(ParsedTable { header, rows })
}

fn get_range(path: &str, cfs: &FileSource) -> SurveyResult<calamine::Range<DataType>> {
    let worksheet_name_o = cfs.excel_worksheet_name.clone();
    debug!(
        "read_xlsx_table: path: {:?} worksheet: {:?}",
        &path, &worksheet_name_o
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(worksheet_name) = worksheet_name_o {
        let wrange = workbook
            .worksheet_range(&worksheet_name)
            .context(MissingWorksheetSnafu {
                name: worksheet_name.clone(),
            })?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    } else {
        let all_worksheets = workbook.worksheets();
        match all_worksheets.as_slice() {
            [] => EmptyExcelSnafu {}.fail(),
            [(worksheet_name, wrange)] => {
                debug!(
                    "read_xlsx_table: path: {:?} worksheet: {:?}",
                    &path, &worksheet_name
                );
                Ok(wrange.clone())
            }
            _ => whatever!(
                "{} has several worksheets, the worksheet name must be provided",
                path
            ),
        }
    }
}
