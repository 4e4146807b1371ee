use log::debug;
use std::collections::{BTreeMap, HashMap, HashSet};

pub use crate::config::*;
use crate::matrix::{Respondent, ResponseMatrix, TraitValue};

/// A builder for validating rows of survey data into a [`ResponseMatrix`].
///
/// ```
/// use sentiment_disparity::builder::MatrixBuilder;
/// use sentiment_disparity::{AnalysisError, Polarity, SentimentItem, TraitDef};
///
/// let items = vec![SentimentItem::new("belong", "I feel I belong", (1.0, 6.0), Polarity::HigherIsBetter)];
/// let traits = vec![TraitDef::new("gender", &["F", "M"])];
/// let mut builder = MatrixBuilder::new(&items, &traits)?;
///
/// builder.add_respondent("r1", &[("gender", "F")], &[("belong", Some(5.0))])?;
/// builder.add_respondent("r2", &[("gender", "")], &[("belong", None)])?;
///
/// let matrix = builder.build();
/// assert_eq!(matrix.num_respondents(), 2);
/// # Ok::<(), AnalysisError>(())
/// ```
pub struct MatrixBuilder {
    _items: Vec<SentimentItem>,
    _traits: Vec<TraitDef>,
    _item_idx: HashMap<String, usize>,
    _trait_idx: HashMap<String, usize>,
    _seen_ids: HashSet<String>,
    _respondents: Vec<Respondent>,
    _responses: Vec<Vec<Option<f64>>>,
}

impl MatrixBuilder {
    pub fn new(items: &[SentimentItem], traits: &[TraitDef]) -> Result<MatrixBuilder, AnalysisError> {
        check_schema(items, traits)?;
        Ok(MatrixBuilder {
            _items: items.to_vec(),
            _traits: traits.to_vec(),
            _item_idx: items
                .iter()
                .enumerate()
                .map(|(idx, i)| (i.id.clone(), idx))
                .collect(),
            _trait_idx: traits
                .iter()
                .enumerate()
                .map(|(idx, t)| (t.id.clone(), idx))
                .collect(),
            _seen_ids: HashSet::new(),
            _respondents: Vec::new(),
            _responses: vec![Vec::new(); items.len()],
        })
    }

    /// Adds a respondent from already-decoded values.
    ///
    /// Empty trait strings are treated as unknown, `None` responses as missing.
    pub fn add_respondent(
        &mut self,
        id: &str,
        traits: &[(&str, &str)],
        responses: &[(&str, Option<f64>)],
    ) -> Result<(), AnalysisError> {
        let row = RawRow {
            id: id.to_string(),
            traits: traits
                .iter()
                .map(|(k, v)| (k.to_string(), RawValue::Text(v.to_string())))
                .collect(),
            responses: responses
                .iter()
                .map(|(k, v)| {
                    let raw = match v {
                        Some(x) => RawValue::Float(*x),
                        None => RawValue::Missing,
                    };
                    (k.to_string(), raw)
                })
                .collect(),
        };
        self.add_row(&row)
    }

    /// Validates one row and appends it to the matrix.
    ///
    /// Nothing is appended if the row is rejected.
    pub fn add_row(&mut self, row: &RawRow) -> Result<(), AnalysisError> {
        let rowno = self._respondents.len() + 1;
        let id = row.id.trim();
        let violation = |column: &str, reason: String| AnalysisError::SchemaViolation {
            row: rowno,
            respondent: id.to_string(),
            column: column.to_string(),
            reason,
        };

        if id.is_empty() {
            return Err(violation("id", "empty respondent id".to_string()));
        }
        if self._seen_ids.contains(id) {
            return Err(violation("id", "duplicate respondent id".to_string()));
        }

        for name in row.traits.keys() {
            if !self._trait_idx.contains_key(name) {
                return Err(violation(name, "unknown trait".to_string()));
            }
        }
        for name in row.responses.keys() {
            if !self._item_idx.contains_key(name) {
                return Err(violation(name, "unknown item".to_string()));
            }
        }

        let mut trait_values: Vec<TraitValue> = Vec::with_capacity(self._traits.len());
        for tdef in self._traits.iter() {
            let raw = row
                .traits
                .get(&tdef.id)
                .ok_or_else(|| violation(&tdef.id, "missing trait value".to_string()))?;
            let tv = read_trait_value(tdef, raw).map_err(|reason| violation(&tdef.id, reason))?;
            trait_values.push(tv);
        }

        let mut cells: Vec<Option<f64>> = Vec::with_capacity(self._items.len());
        for item in self._items.iter() {
            // An absent column is a missing answer, not an error.
            let cell = match row.responses.get(&item.id) {
                Some(raw) => read_response(item, raw).map_err(|reason| violation(&item.id, reason))?,
                None => None,
            };
            cells.push(cell);
        }

        debug!(
            "add_row: row {} id {:?} traits {:?} responses {:?}",
            rowno, id, trait_values, cells
        );

        for (column, cell) in self._responses.iter_mut().zip(cells) {
            column.push(cell);
        }
        self._seen_ids.insert(id.to_string());
        self._respondents.push(Respondent {
            id: id.to_string(),
            traits: trait_values,
        });
        Ok(())
    }

    pub fn build(self) -> ResponseMatrix {
        ResponseMatrix {
            items: self._items,
            traits: self._traits,
            respondents: self._respondents,
            responses: self._responses,
        }
    }
}

/// Builds a matrix in one go from a collection of rows.
pub fn build_matrix(
    items: &[SentimentItem],
    traits: &[TraitDef],
    rows: &[RawRow],
) -> Result<ResponseMatrix, AnalysisError> {
    let mut builder = MatrixBuilder::new(items, traits)?;
    for row in rows {
        builder.add_row(row)?;
    }
    Ok(builder.build())
}

fn check_schema(items: &[SentimentItem], traits: &[TraitDef]) -> Result<(), AnalysisError> {
    let mut item_ids: HashSet<&str> = HashSet::new();
    for item in items {
        if item.id.is_empty() {
            return Err(AnalysisError::InvalidSchema("empty item id".to_string()));
        }
        if !item_ids.insert(item.id.as_str()) {
            return Err(AnalysisError::InvalidSchema(format!(
                "duplicate item id {:?}",
                item.id
            )));
        }
        if !(item.scale_min.is_finite() && item.scale_max.is_finite())
            || item.scale_min >= item.scale_max
        {
            return Err(AnalysisError::InvalidSchema(format!(
                "item {:?} has an invalid scale [{}, {}]",
                item.id, item.scale_min, item.scale_max
            )));
        }
    }

    let mut trait_ids: HashSet<&str> = HashSet::new();
    for tdef in traits {
        if tdef.id.is_empty() {
            return Err(AnalysisError::InvalidSchema("empty trait id".to_string()));
        }
        if !trait_ids.insert(tdef.id.as_str()) {
            return Err(AnalysisError::InvalidSchema(format!(
                "duplicate trait id {:?}",
                tdef.id
            )));
        }
        if tdef.categories.is_empty() {
            return Err(AnalysisError::InvalidSchema(format!(
                "trait {:?} declares no category",
                tdef.id
            )));
        }
        let mut seen: BTreeMap<&str, usize> = BTreeMap::new();
        for c in tdef.categories.iter() {
            if c.trim().is_empty() {
                return Err(AnalysisError::InvalidSchema(format!(
                    "trait {:?} declares an empty category",
                    tdef.id
                )));
            }
            *seen.entry(c.as_str()).or_insert(0) += 1;
        }
        if let Some((c, _)) = seen.iter().find(|(_, n)| **n > 1) {
            return Err(AnalysisError::InvalidSchema(format!(
                "trait {:?} declares category {:?} more than once",
                tdef.id, c
            )));
        }
    }
    Ok(())
}

fn read_trait_value(tdef: &TraitDef, raw: &RawValue) -> Result<TraitValue, String> {
    let text: String = match raw {
        RawValue::Missing => return Ok(TraitValue::Unknown),
        RawValue::Text(s) if s.trim().is_empty() => return Ok(TraitValue::Unknown),
        RawValue::Text(s) => s.trim().to_string(),
        RawValue::Integer(i) => i.to_string(),
        RawValue::Float(f) if f.is_finite() && f.fract() == 0.0 => format!("{}", *f as i64),
        RawValue::Float(f) => return Err(format!("unrecognized trait value type: float {}", f)),
        RawValue::Bool(b) => return Err(format!("unrecognized trait value type: bool {}", b)),
    };
    tdef.categories
        .iter()
        .position(|c| *c == text)
        .map(TraitValue::Category)
        .ok_or_else(|| format!("unrecognized category {:?}", text))
}

fn read_response(item: &SentimentItem, raw: &RawValue) -> Result<Option<f64>, String> {
    let value = match raw {
        RawValue::Missing => return Ok(None),
        RawValue::Text(s) if s.trim().is_empty() => return Ok(None),
        RawValue::Text(s) => {
            // Numbers stored as text are common in CSV exports.
            s.trim()
                .parse::<f64>()
                .map_err(|_| format!("non-numeric response {:?}", s))?
        }
        RawValue::Integer(i) => *i as f64,
        RawValue::Float(f) => *f,
        RawValue::Bool(b) => return Err(format!("non-numeric response {}", b)),
    };
    if item.contains(value) {
        Ok(Some(value))
    } else {
        Err(format!(
            "response {} outside of scale [{}, {}]",
            value, item.scale_min, item.scale_max
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> (Vec<SentimentItem>, Vec<TraitDef>) {
        (
            vec![
                SentimentItem::new("teams", "MS Teams usefulness", (1.0, 6.0), Polarity::HigherIsBetter),
                SentimentItem::new("stress", "I feel stressed", (1.0, 6.0), Polarity::HigherIsWorse),
            ],
            vec![
                TraitDef::new("grade", &["9", "10", "11", "12"]).ordinal(),
                TraitDef::new("gender", &["F", "M", "Other"]),
            ],
        )
    }

    fn row(id: &str, traits: &[(&str, RawValue)], responses: &[(&str, RawValue)]) -> RawRow {
        RawRow {
            id: id.to_string(),
            traits: traits.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            responses: responses
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        }
    }

    #[test]
    fn missing_responses_stay_missing() {
        let (items, traits) = schema();
        let mut b = MatrixBuilder::new(&items, &traits).unwrap();
        b.add_row(&row(
            "r1",
            &[("grade", RawValue::Integer(9)), ("gender", RawValue::Text("F".into()))],
            &[("teams", RawValue::Text(" ".into()))],
        ))
        .unwrap();
        let m = b.build();
        assert_eq!(m.responses(0), &[None]);
        // Absent column
        assert_eq!(m.responses(1), &[None]);
        assert_eq!(m.respondents()[0].traits[0], TraitValue::Category(0));
    }

    #[test]
    fn out_of_scale_names_location() {
        let (items, traits) = schema();
        let mut b = MatrixBuilder::new(&items, &traits).unwrap();
        b.add_respondent("r1", &[("grade", "10"), ("gender", "M")], &[("teams", Some(3.0))])
            .unwrap();
        let err = b
            .add_respondent("r2", &[("grade", "10"), ("gender", "M")], &[("stress", Some(7.0))])
            .unwrap_err();
        match err {
            AnalysisError::SchemaViolation {
                row,
                respondent,
                column,
                ..
            } => {
                assert_eq!(row, 2);
                assert_eq!(respondent, "r2");
                assert_eq!(column, "stress");
            }
            e => panic!("unexpected error {:?}", e),
        }
        // The rejected row was not added.
        assert_eq!(b.build().num_respondents(), 1);
    }

    #[test]
    fn trait_values_are_checked() {
        let (items, traits) = schema();
        let mut b = MatrixBuilder::new(&items, &traits).unwrap();
        assert!(b
            .add_respondent("r1", &[("grade", "13"), ("gender", "M")], &[])
            .is_err());
        assert!(b
            .add_row(&row(
                "r2",
                &[("grade", RawValue::Bool(true)), ("gender", RawValue::Missing)],
                &[]
            ))
            .is_err());
        // Missing trait key
        assert!(b.add_respondent("r3", &[("grade", "9")], &[]).is_err());
        // Unknown values are fine
        b.add_respondent("r4", &[("grade", ""), ("gender", "")], &[])
            .unwrap();
        let m = b.build();
        assert_eq!(m.respondents()[0].traits, vec![TraitValue::Unknown; 2]);
    }

    #[test]
    fn rejects_duplicates_and_unknown_columns() {
        let (items, traits) = schema();
        let mut b = MatrixBuilder::new(&items, &traits).unwrap();
        let t = [("grade", "9"), ("gender", "F")];
        b.add_respondent("r1", &t, &[]).unwrap();
        assert!(b.add_respondent("r1", &t, &[]).is_err());
        assert!(b.add_respondent("r2", &t, &[("bogus", Some(1.0))]).is_err());
        assert!(b
            .add_row(&row(
                "r3",
                &[("grade", RawValue::Text("9".into())), ("gender", RawValue::Text("F".into()))],
                &[("teams", RawValue::Text("agree".into()))]
            ))
            .is_err());
    }

    #[test]
    fn ids_are_trimmed() {
        let (items, traits) = schema();
        let mut b = MatrixBuilder::new(&items, &traits).unwrap();
        let t = [("grade", "9"), ("gender", "F")];
        b.add_respondent(" r1 ", &t, &[]).unwrap();
        match b.add_respondent("r1", &t, &[]) {
            Err(AnalysisError::SchemaViolation {
                row,
                respondent,
                reason,
                ..
            }) => {
                assert_eq!(row, 2);
                assert_eq!(respondent, "r1");
                assert_eq!(reason, "duplicate respondent id");
            }
            x => panic!("unexpected result {:?}", x),
        }
        assert!(b.add_respondent("   ", &t, &[]).is_err());
        let m = b.build();
        assert_eq!(m.num_respondents(), 1);
        assert_eq!(m.respondents()[0].id, "r1");
    }

    #[test]
    fn rejects_bad_schema() {
        let bad_scale = vec![SentimentItem::new("a", "a", (6.0, 1.0), Polarity::HigherIsBetter)];
        assert!(MatrixBuilder::new(&bad_scale, &[]).is_err());
        let dup_cat = vec![TraitDef::new("g", &["x", "x"])];
        assert!(MatrixBuilder::new(&[], &dup_cat).is_err());
        let no_cat = vec![TraitDef::new("g", &[])];
        assert!(MatrixBuilder::new(&[], &no_cat).is_err());
    }
}
