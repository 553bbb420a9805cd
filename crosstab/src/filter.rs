use log::{debug, info};
use std::collections::HashMap;

use crate::config::*;
use crate::store::RecordStore;

/// The respondents that a question is tabulated over.
///
/// It is also the base of the "percentage of total" column.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Population {
    rows: Vec<usize>,
}

impl Population {
    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Declarative table of branch questions: question -> gate.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct GateTable {
    gates: HashMap<String, Gate>,
}

impl GateTable {
    pub fn new(gates: &[Gate]) -> GateTable {
        GateTable {
            gates: gates
                .iter()
                .map(|g| (g.question.clone(), g.clone()))
                .collect(),
        }
    }

    pub fn gate_for(&self, question: &str) -> Option<&Gate> {
        self.gates.get(question)
    }

    /// Every column the gates read.
    pub fn columns(&self) -> Vec<&str> {
        let mut res: Vec<&str> = self
            .gates
            .values()
            .flat_map(|g| [g.question.as_str(), g.gating_question.as_str()])
            .collect();
        res.sort();
        res.dedup();
        res
    }
}

/// Computes the eligible respondents of a question.
///
/// A respondent is eligible when the question has a present answer and, for
/// branch questions, when the gating answer contains the required option.
pub fn eligible_population(
    store: &RecordStore,
    question: &str,
    gates: &GateTable,
) -> Result<Population, CrosstabError> {
    let q_idx = store
        .column_index(question)
        .ok_or_else(|| CrosstabError::MissingColumn {
            column: question.to_string(),
            context: "target question".to_string(),
        })?;

    let gate_check: Option<(usize, &str)> = match gates.gate_for(question) {
        Some(gate) => {
            let g_idx = store.column_index(&gate.gating_question).ok_or_else(|| {
                CrosstabError::MissingColumn {
                    column: gate.gating_question.clone(),
                    context: format!("gate of question {:?}", question),
                }
            })?;
            Some((g_idx, gate.required_option.as_str()))
        }
        None => None,
    };

    let mut rows: Vec<usize> = Vec::new();
    let mut num_answered: usize = 0;
    for row in 0..store.len() {
        if store.value(row, q_idx).is_none() {
            continue;
        }
        num_answered += 1;
        if let Some((g_idx, required)) = gate_check {
            let passes = store
                .label(row, g_idx)
                .map(|v| MatchMode::Contains.matches(&v, required))
                .unwrap_or(false);
            if !passes {
                debug!(
                    "eligible_population: {}: respondent {} answered but did not select {:?}",
                    question,
                    store.respondent(row).id,
                    required
                );
                continue;
            }
        }
        rows.push(row);
    }

    if let Some(gate) = gates.gate_for(question) {
        info!(
            "{} is conditional on {:?} in {:?}: {} eligible out of {} answers",
            question,
            gate.required_option,
            gate.gating_question,
            rows.len(),
            num_answered
        );
    }
    Ok(Population { rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FieldValue;

    fn txt(s: &str) -> Option<FieldValue> {
        FieldValue::from_text(s)
    }

    fn branch_store() -> RecordStore {
        let cols = vec!["P3".to_string(), "P6".to_string()];
        let mut store = RecordStore::new(&cols).unwrap();
        let rows = vec![
            (txt("a. Presencial"), txt("Buena")),
            (txt("a. Presencial, b. Contact Center"), txt("Mala")),
            (txt("b. Contact Center"), txt("Regular")),
            (txt("c. Servicios Electrónicos"), txt("Buena")),
            (None, txt("Buena")),
            (txt("a. Presencial"), None),
        ];
        for (idx, (p3, p6)) in rows.into_iter().enumerate() {
            store.push(format!("r{}", idx), vec![p3, p6]).unwrap();
        }
        store
    }

    #[test]
    fn default_population_is_answered_rows() {
        let store = branch_store();
        let pop = eligible_population(&store, "P3", &GateTable::default()).unwrap();
        assert_eq!(pop.rows(), &[0, 1, 2, 3, 5]);
        let pop6 = eligible_population(&store, "P6", &GateTable::default()).unwrap();
        assert_eq!(pop6.rows(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn branch_question_is_restricted_by_gate() {
        let store = branch_store();
        let gates = GateTable::new(&[Gate {
            question: "P6".to_string(),
            gating_question: "P3".to_string(),
            required_option: "b. Contact Center".to_string(),
        }]);
        // Five respondents answered P6 but only two selected the gating option.
        let pop = eligible_population(&store, "P6", &gates).unwrap();
        assert_eq!(pop.rows(), &[1, 2]);
        // The gate does not apply to other questions.
        let pop3 = eligible_population(&store, "P3", &gates).unwrap();
        assert_eq!(pop3.len(), 5);
    }

    #[test]
    fn missing_gating_column_is_a_configuration_error() {
        let store = branch_store();
        let gates = GateTable::new(&[Gate {
            question: "P6".to_string(),
            gating_question: "P99".to_string(),
            required_option: "x".to_string(),
        }]);
        assert!(matches!(
            eligible_population(&store, "P6", &gates),
            Err(CrosstabError::MissingColumn { .. })
        ));
    }

    #[test]
    fn gate_table_lists_columns() {
        let gates = GateTable::new(&[
            Gate {
                question: "P6".to_string(),
                gating_question: "P3".to_string(),
                required_option: "b. Contact Center".to_string(),
            },
            Gate {
                question: "P7".to_string(),
                gating_question: "P3".to_string(),
                required_option: "b. Contact Center".to_string(),
            },
        ]);
        assert_eq!(gates.columns(), vec!["P3", "P6", "P7"]);
    }
}
