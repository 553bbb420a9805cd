// ********* Record store ***********

use std::borrow::Cow;
use std::collections::HashMap;

use crate::config::CrosstabError;

/// The value of one field for one respondent.
///
/// A missing value is represented by the absence of a `FieldValue`
/// (`None`), never by an empty string.
#[derive(PartialEq, Debug, Clone)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

impl FieldValue {
    /// Builds a value from raw text. Blank text is a missing value.
    pub fn from_text(s: &str) -> Option<FieldValue> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(FieldValue::Text(trimmed.to_string()))
        }
    }

    /// Builds a value from a number. NaN and infinities are missing values.
    pub fn from_number(n: f64) -> Option<FieldValue> {
        if n.is_finite() {
            Some(FieldValue::Number(n))
        } else {
            None
        }
    }

    /// The textual label used for matching against option and category labels.
    ///
    /// Whole numbers are printed without a fractional part, so that a
    /// spreadsheet cell holding `25.0` matches the label `25`.
    pub fn label(&self) -> Cow<'_, str> {
        match self {
            FieldValue::Text(s) => Cow::Borrowed(s.as_str()),
            FieldValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => {
                Cow::Owned(format!("{}", *n as i64))
            }
            FieldValue::Number(n) => Cow::Owned(n.to_string()),
        }
    }
}

/// One row of the survey: an immutable respondent record.
#[derive(PartialEq, Debug, Clone)]
pub struct Respondent {
    pub id: String,
    pub(crate) values: Vec<Option<FieldValue>>,
}

/// In-memory table of survey responses.
///
/// Columns are addressed by their exact header name. The store is never
/// mutated during a report run: derived fields produce a new store.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RecordStore {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Respondent>,
}

impl RecordStore {
    pub fn new(columns: &[String]) -> Result<RecordStore, CrosstabError> {
        let mut index: HashMap<String, usize> = HashMap::new();
        for (idx, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), idx).is_some() {
                return Err(CrosstabError::DuplicateColumn {
                    column: name.clone(),
                });
            }
        }
        Ok(RecordStore {
            columns: columns.to_vec(),
            index,
            rows: Vec::new(),
        })
    }

    pub fn push(
        &mut self,
        id: String,
        values: Vec<Option<FieldValue>>,
    ) -> Result<(), CrosstabError> {
        if values.len() != self.columns.len() {
            return Err(CrosstabError::RaggedRow {
                respondent: id,
                expected: self.columns.len(),
                found: values.len(),
            });
        }
        self.rows.push(Respondent { id, values });
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.index.get(name).cloned()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn respondents(&self) -> &[Respondent] {
        &self.rows
    }

    pub fn respondent(&self, row: usize) -> &Respondent {
        &self.rows[row]
    }

    pub fn value(&self, row: usize, col: usize) -> Option<&FieldValue> {
        self.rows[row].values.get(col).and_then(|v| v.as_ref())
    }

    pub fn label(&self, row: usize, col: usize) -> Option<Cow<'_, str>> {
        self.value(row, col).map(|v| v.label())
    }

    /// All the present values of a column, in row order.
    pub fn present_labels(&self, col: usize) -> Vec<Cow<'_, str>> {
        (0..self.rows.len())
            .filter_map(|row| self.label(row, col))
            .collect()
    }

    /// Returns a new store with one extra column appended.
    pub(crate) fn with_column(
        &self,
        name: &str,
        values: Vec<Option<FieldValue>>,
    ) -> Result<RecordStore, CrosstabError> {
        assert_eq!(values.len(), self.rows.len());
        let mut columns = self.columns.clone();
        columns.push(name.to_string());
        let mut res = RecordStore::new(&columns)?;
        for (r, v) in self.rows.iter().zip(values) {
            let mut row_values = r.values.clone();
            row_values.push(v);
            res.rows.push(Respondent {
                id: r.id.clone(),
                values: row_values,
            });
        }
        Ok(res)
    }
}
