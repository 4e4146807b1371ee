use std::collections::HashMap;
use std::path::Path;

use crate::survey::*;

/// A sheet of raw cells, as read from a file.
#[derive(PartialEq, Debug, Clone)]
pub struct ParsedTable {
    pub header: Vec<String>,
    /// The line number in the file (starting at 1, the header being line 1) and the cells.
    pub rows: Vec<(usize, Vec<RawValue>)>,
}

impl ParsedTable {
    /// Maps each column header to its position.
    pub fn column_index(&self) -> HashMap<String, usize> {
        self.header
            .iter()
            .enumerate()
            .map(|(idx, h)| (h.trim().to_string(), idx))
            .collect()
    }

    pub fn column(&self, name: &str) -> SurveyResult<usize> {
        let idx = self.column_index().get(name.trim()).cloned();
        idx.context(MissingColumnSnafu { column: name })
    }
}

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

pub fn make_default_id(path: &str) -> impl Fn(usize) -> String {
    let simplified_file_name = simplify_file_name(path);
    move |lineno| format!("{}-{:08}", simplified_file_name, lineno)
}

pub fn cell_text(cell: &RawValue) -> Option<String> {
    match cell {
        RawValue::Missing => None,
        RawValue::Text(s) if s.trim().is_empty() => None,
        RawValue::Text(s) => Some(s.trim().to_string()),
        RawValue::Integer(i) => Some(i.to_string()),
        RawValue::Float(f) if f.fract() == 0.0 => Some(format!("{}", *f as i64)),
        RawValue::Float(f) => Some(f.to_string()),
        RawValue::Bool(b) => Some(b.to_string()),
    }
}

/// "3 (joined in 2022)" -> 3
pub fn leading_integer(s: &str) -> Option<i64> {
    let digits: String = s
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse::<i64>().ok()
}
