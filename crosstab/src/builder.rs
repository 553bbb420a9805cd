pub use crate::config::*;
use crate::store::{FieldValue, RecordStore};

/// A builder for adding respondents.
///
/// The readers of the command-line tool fill a store through this builder.
///
/// ```
/// pub use crosstab::builder::Builder;
/// # use crosstab::CrosstabError;
///
/// let mut builder = Builder::new(&["P3 - Medios SAT Utilizados".to_string(), "Edad".to_string()])?;
///
/// builder.add_respondent_simple(&["a. Presencial, b. Contact Center", "34"])?;
/// builder.add_respondent_simple(&["", "61"])?;
///
/// let store = builder.build();
/// assert_eq!(store.len(), 2);
/// assert_eq!(store.label(1, 0), None);
///
/// # Ok::<(), CrosstabError>(())
/// ```
pub struct Builder {
    pub(crate) _store: RecordStore,
}

impl Builder {
    pub fn new(columns: &[String]) -> Result<Builder, CrosstabError> {
        Ok(Builder {
            _store: RecordStore::new(columns)?,
        })
    }

    /// Adds a respondent from text values, in column order.
    ///
    /// Blank values are missing. The respondent gets a sequential id.
    pub fn add_respondent_simple(&mut self, values: &[&str]) -> Result<(), CrosstabError> {
        let id = format!("{}", self._store.len() + 1);
        let parsed: Vec<Option<FieldValue>> =
            values.iter().map(|s| FieldValue::from_text(s)).collect();
        self.add_respondent(&id, parsed)
    }

    /// Adds a respondent with an explicit id.
    ///
    /// values: one entry per column, `None` for a missing answer.
    pub fn add_respondent(
        &mut self,
        id: &str,
        values: Vec<Option<FieldValue>>,
    ) -> Result<(), CrosstabError> {
        self._store.push(id.to_string(), values)
    }

    pub fn len(&self) -> usize {
        self._store.len()
    }

    pub fn is_empty(&self) -> bool {
        self._store.is_empty()
    }

    pub fn build(self) -> RecordStore {
        self._store
    }
}
