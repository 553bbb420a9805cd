use log::{debug, info};
use regex::Regex;
use std::sync::OnceLock;

use crate::config::*;
use crate::normalize::{detect_multi_select, discover_vocabulary, Vocabulary};
use crate::store::RecordStore;
use crate::table::TargetQuestion;

fn question_header_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // "P11.1 - Satisfacción Servicio"
    PATTERN.get_or_init(|| Regex::new(r"^P(\d+(?:\.\d+)?)\s*-\s").expect("static pattern"))
}

/// The number of a question column, `11.1` for `P11.1 - ...`.
pub fn question_number(column: &str) -> Option<f64> {
    question_header_pattern()
        .captures(column)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Finds the target questions in a header.
///
/// Columns named `P<number> - <title>` with a number at least `min_number`
/// are returned in numerical order. Columns with the same number keep their
/// header order.
pub fn discover_question_columns(columns: &[String], min_number: f64) -> Vec<String> {
    let mut found: Vec<(f64, &String)> = columns
        .iter()
        .filter_map(|c| question_number(c).map(|n| (n, c)))
        .filter(|(n, _)| *n >= min_number)
        .collect();
    found.sort_by(|a, b| a.0.total_cmp(&b.0));
    debug!("discover_question_columns: {:?}", found);
    found.into_iter().map(|(_, c)| c.clone()).collect()
}

/// The outcome of preparing one question before tabulation.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Resolution {
    Ready(TargetQuestion),
    /// The question has no usable data. The reason is meant for the report,
    /// the warning (if any) for the data-quality summary.
    Skipped {
        reason: String,
        warning: Option<DataQualityWarning>,
    },
}

/// Fixes the vocabulary of a question, discovering it from the data when
/// needed.
///
/// The values of all the respondents are used, not only the eligible ones.
/// A discovered multi-select vocabulary in which one option contains another
/// is a data problem: the question is skipped with a warning. The same
/// overlap in a configured vocabulary is an error.
pub fn resolve_question(
    store: &RecordStore,
    spec: &QuestionSpec,
) -> Result<Resolution, CrosstabError> {
    let col = store
        .column_index(&spec.column)
        .ok_or_else(|| CrosstabError::MissingColumn {
            column: spec.column.clone(),
            context: "question list".to_string(),
        })?;
    let values = store.present_labels(col);
    let multi_select = spec
        .multi_select
        .unwrap_or_else(|| detect_multi_select(&values));

    let options: Vec<String> = match &spec.vocabulary {
        VocabularySource::Fixed(opts) => opts.clone(),
        VocabularySource::Discover => {
            let opts = discover_vocabulary(&values, multi_select);
            if opts.is_empty() {
                info!("{}: no answer, skipping", spec.column);
                return Ok(Resolution::Skipped {
                    reason: "no answer to discover options from".to_string(),
                    warning: None,
                });
            }
            opts
        }
    };
    let vocabulary = if !multi_select {
        Vocabulary::new(&spec.column, &options)?
    } else {
        match Vocabulary::new_multi_select(&spec.column, &options) {
            Ok(v) => v,
            Err(CrosstabError::OverlappingOptions { inner, outer, .. })
                if spec.vocabulary == VocabularySource::Discover =>
            {
                info!(
                    "{}: discovered option {:?} is contained in {:?}, skipping",
                    spec.column, inner, outer
                );
                return Ok(Resolution::Skipped {
                    reason: format!("discovered option {:?} is contained in {:?}", inner, outer),
                    warning: Some(DataQualityWarning::OverlappingOptions {
                        question: spec.column.clone(),
                        inner,
                        outer,
                    }),
                });
            }
            Err(e) => return Err(e),
        }
    };
    info!(
        "{}: {} options, multi-select: {}",
        spec.column,
        vocabulary.len(),
        multi_select
    );
    Ok(Resolution::Ready(TargetQuestion {
        column: spec.column.clone(),
        vocabulary,
        multi_select,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::store::FieldValue;

    fn strings(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn question_numbers() {
        assert_eq!(question_number("P3 - Medios SAT Utilizados"), Some(3.0));
        assert_eq!(question_number("P11.1 - Atención"), Some(11.1));
        assert_eq!(question_number("Pregunta - libre"), None);
        assert_eq!(question_number("Edad"), None);
        // Built once for the whole header.
        assert!(std::ptr::eq(question_header_pattern(), question_header_pattern()));
    }

    #[test]
    fn discovers_questions_in_numerical_order() {
        let cols = strings(&[
            "Edad",
            "P12 - Uso",
            "P2 - Consentimiento",
            "P3 - Medios SAT Utilizados",
            "P11.1 - Atención",
            "P4 - Gestión",
            "Region_Oficina",
        ]);
        assert_eq!(
            discover_question_columns(&cols, 3.0),
            strings(&[
                "P3 - Medios SAT Utilizados",
                "P4 - Gestión",
                "P11.1 - Atención",
                "P12 - Uso"
            ])
        );
    }

    fn store() -> RecordStore {
        let mut b = Builder::new(&strings(&["P3", "P4", "P43", "P50"])).unwrap();
        b.add_respondent_simple(&["a. Presencial, b. Contact Center", "b. FEL", "Caja, Banco", ""])
            .unwrap();
        b.add_respondent_simple(&["a. Presencial", "a. RTU", "Agencia", ""])
            .unwrap();
        b.build()
    }

    #[test]
    fn detection_and_discovery() {
        let s = store();
        match resolve_question(&s, &QuestionSpec::discover("P3")).unwrap() {
            Resolution::Ready(t) => {
                assert!(t.multi_select);
                assert_eq!(
                    t.vocabulary.options(),
                    &strings(&["a. Presencial", "b. Contact Center"])[..]
                );
            }
            other => panic!("unexpected {:?}", other),
        }
        match resolve_question(&s, &QuestionSpec::discover("P4")).unwrap() {
            Resolution::Ready(t) => {
                assert!(!t.multi_select);
                assert_eq!(t.vocabulary.options(), &strings(&["a. RTU", "b. FEL"])[..]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn explicit_flag_overrides_detection() {
        let s = store();
        let mut spec = QuestionSpec::discover("P43");
        spec.multi_select = Some(false);
        match resolve_question(&s, &spec).unwrap() {
            Resolution::Ready(t) => {
                assert!(!t.multi_select);
                assert_eq!(t.vocabulary.options(), &strings(&["Agencia", "Caja, Banco"])[..]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unanswered_question_is_skipped() {
        let s = store();
        assert!(matches!(
            resolve_question(&s, &QuestionSpec::discover("P50")),
            Ok(Resolution::Skipped { warning: None, .. })
        ));
        // A fixed vocabulary does not need data.
        let spec = QuestionSpec::fixed("P50", &["Sí", "No"], false);
        assert!(matches!(resolve_question(&s, &spec), Ok(Resolution::Ready(_))));
        assert!(matches!(
            resolve_question(&s, &QuestionSpec::discover("P99")),
            Err(CrosstabError::MissingColumn { .. })
        ));
    }

    #[test]
    fn overlapping_discovered_options_skip_the_question() {
        let mut b = Builder::new(&strings(&["P39"])).unwrap();
        b.add_respondent_simple(&["e. Kaqchikel, w. Otro"]).unwrap();
        b.add_respondent_simple(&["Otro"]).unwrap();
        let s = b.build();
        match resolve_question(&s, &QuestionSpec::discover("P39")).unwrap() {
            Resolution::Skipped { reason, warning } => {
                assert!(reason.contains("w. Otro"));
                assert_eq!(
                    warning,
                    Some(DataQualityWarning::OverlappingOptions {
                        question: "P39".to_string(),
                        inner: "Otro".to_string(),
                        outer: "w. Otro".to_string(),
                    })
                );
            }
            other => panic!("unexpected {:?}", other),
        }
        // A configured vocabulary with the same overlap is a configuration error.
        let spec = QuestionSpec::fixed("P39", &["e. Kaqchikel", "w. Otro", "Otro"], true);
        assert!(matches!(
            resolve_question(&s, &spec),
            Err(CrosstabError::OverlappingOptions { .. })
        ));
    }

    #[test]
    fn numeric_answers_are_discovered_in_numerical_order() {
        let mut b = Builder::new(&strings(&["P20"])).unwrap();
        for (idx, score) in [10.0, 2.0, 1.0, 2.0].iter().enumerate() {
            b.add_respondent(&format!("r{}", idx), vec![FieldValue::from_number(*score)])
                .unwrap();
        }
        let s = b.build();
        match resolve_question(&s, &QuestionSpec::discover("P20")).unwrap() {
            Resolution::Ready(t) => {
                assert!(!t.multi_select);
                assert_eq!(t.vocabulary.options(), &strings(&["1", "2", "10"])[..]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
