use log::debug;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::OnceLock;

use crate::config::*;

/// The ordered option labels of a question.
///
/// Once built, a vocabulary is treated as static configuration for the rest
/// of the run, even when it was discovered from the data.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Vocabulary {
    options: Vec<String>,
}

impl Vocabulary {
    /// Builds a vocabulary for exact-match questions.
    /// Options must be unique and non-empty.
    pub fn new(question: &str, options: &[String]) -> Result<Vocabulary, CrosstabError> {
        if options.is_empty() {
            return Err(CrosstabError::EmptyVocabulary {
                question: question.to_string(),
            });
        }
        for (idx, opt) in options.iter().enumerate() {
            if options[..idx].contains(opt) {
                return Err(CrosstabError::DuplicateOption {
                    question: question.to_string(),
                    option: opt.clone(),
                });
            }
        }
        Ok(Vocabulary {
            options: options.to_vec(),
        })
    }

    /// Builds a vocabulary for contains-match (multi-select) questions.
    ///
    /// No option may be a substring of another one: the raw answer
    /// "b. Contact Center" would otherwise also count as "Contact".
    pub fn new_multi_select(
        question: &str,
        options: &[String],
    ) -> Result<Vocabulary, CrosstabError> {
        let vocab = Vocabulary::new(question, options)?;
        check_no_overlap(question, &vocab.options)?;
        Ok(vocab)
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// Checks that no label is contained in another label of the same list.
pub fn check_no_overlap(context: &str, labels: &[String]) -> Result<(), CrosstabError> {
    for inner in labels.iter() {
        for outer in labels.iter() {
            if inner != outer && outer.contains(inner.as_str()) {
                return Err(CrosstabError::OverlappingOptions {
                    question: context.to_string(),
                    inner: inner.clone(),
                    outer: outer.clone(),
                });
            }
        }
    }
    Ok(())
}

/// A multi-select answer reduced to the vocabulary options it mentions,
/// in vocabulary order.
///
/// Two answers naming the same options in a different order, or with
/// different separators, have equal canonical combinations.
#[derive(Eq, PartialEq, Debug, Clone, Hash, Ord, PartialOrd)]
pub struct CanonicalCombination {
    // Indexes in the vocabulary, strictly increasing, never empty.
    indexes: Vec<usize>,
    label: String,
}

impl CanonicalCombination {
    pub fn contains(&self, option_index: usize) -> bool {
        self.indexes.binary_search(&option_index).is_ok()
    }

    pub fn option_indexes(&self) -> &[usize] {
        &self.indexes
    }

    pub fn as_str(&self) -> &str {
        &self.label
    }
}

impl Display for CanonicalCombination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label)
    }
}

pub const COMBINATION_SEPARATOR: &str = ", ";

/// Normalizes a raw multi-select answer.
///
/// Returns `None` when no vocabulary option appears in the answer.
pub fn normalize(raw: &str, vocabulary: &Vocabulary) -> Option<CanonicalCombination> {
    let indexes: Vec<usize> = vocabulary
        .options
        .iter()
        .enumerate()
        .filter_map(|(idx, opt)| if raw.contains(opt.as_str()) { Some(idx) } else { None })
        .collect();
    if indexes.is_empty() {
        return None;
    }
    let label = indexes
        .iter()
        .map(|idx| vocabulary.options[*idx].as_str())
        .collect::<Vec<&str>>()
        .join(COMBINATION_SEPARATOR);
    Some(CanonicalCombination { indexes, label })
}

/// A question is multi-select when at least one of its answers holds a comma.
pub fn detect_multi_select<S: AsRef<str>>(values: &[S]) -> bool {
    values.iter().any(|v| v.as_ref().contains(','))
}

fn primary_option_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // "a. Presencial", "k. Maestría / Posgrado", ...
    PATTERN.get_or_init(|| Regex::new(r"^[a-z]\.\s").expect("static pattern"))
}

// Numeric labels ("1", "10", "2.5") by value and before the text labels.
fn compare_answers(a: &str, b: &str) -> Ordering {
    let number = |s: &str| s.parse::<f64>().ok().filter(|n| n.is_finite());
    match (number(a), number(b)) {
        (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.cmp(b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Discovers the option vocabulary of a question from its present answers.
///
/// Single-select questions: the distinct answers, sorted. Numeric answers
/// (a 1 to 10 scale read from a spreadsheet) sort by value.
///
/// Multi-select questions: answers are split on commas. Tokens written as
/// "letter dot space label" come first, sorted by their letter; the other
/// tokens follow by decreasing frequency. Ties keep the order of first
/// appearance, which makes the result a pure function of the data.
pub fn discover_vocabulary<S: AsRef<str>>(values: &[S], multi_select: bool) -> Vec<String> {
    if !multi_select {
        let mut res: Vec<String> = values.iter().map(|v| v.as_ref().trim().to_string()).collect();
        res.retain(|s| !s.is_empty());
        res.sort_by(|a, b| compare_answers(a, b));
        res.dedup();
        return res;
    }

    let mut counts: Vec<(String, u64)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for v in values.iter() {
        for token in v.as_ref().split(',').map(|t| t.trim()).filter(|t| !t.is_empty()) {
            if let Some(pos) = positions.get(token) {
                counts[*pos].1 += 1;
            } else {
                positions.insert(token.to_string(), counts.len());
                counts.push((token.to_string(), 1));
            }
        }
    }
    // Stable sort: equal counts keep their first-appearance order.
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    debug!("discover_vocabulary: token counts: {:?}", counts);

    let pattern = primary_option_pattern();
    let (mut primary, secondary): (Vec<(String, u64)>, Vec<(String, u64)>) = counts
        .into_iter()
        .partition(|(token, _)| pattern.is_match(token));
    primary.sort_by_key(|(token, _)| token.chars().next());
    primary
        .into_iter()
        .chain(secondary)
        .map(|(token, _)| token)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> Vocabulary {
        let opts: Vec<String> = ["a. Presencial", "b. Contact Center", "c. Servicios Electrónicos"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Vocabulary::new_multi_select("P3", &opts).unwrap()
    }

    #[test]
    fn normalization_is_order_invariant() {
        let v = vocab();
        let x = normalize("b. Contact Center, a. Presencial", &v).unwrap();
        let y = normalize("a. Presencial, b. Contact Center", &v).unwrap();
        let z = normalize("a. Presencial;b. Contact Center", &v).unwrap();
        assert_eq!(x, y);
        assert_eq!(y, z);
        assert_eq!(x.as_str(), "a. Presencial, b. Contact Center");
        assert_eq!(x.option_indexes(), &[0, 1]);
    }

    #[test]
    fn normalization_is_idempotent() {
        let v = vocab();
        let once = normalize("c. Servicios Electrónicos, a. Presencial", &v).unwrap();
        let twice = normalize(once.as_str(), &v).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn no_known_option_is_missing() {
        let v = vocab();
        assert_eq!(normalize("d. Otro", &v), None);
        assert_eq!(normalize("", &v), None);
    }

    #[test]
    fn overlapping_options_are_rejected() {
        let opts = vec!["Otro".to_string(), "Otros".to_string()];
        assert_eq!(
            Vocabulary::new_multi_select("P5", &opts),
            Err(CrosstabError::OverlappingOptions {
                question: "P5".to_string(),
                inner: "Otro".to_string(),
                outer: "Otros".to_string(),
            })
        );
        // Exact matching does not care.
        assert!(Vocabulary::new("P5", &opts).is_ok());
    }

    #[test]
    fn duplicate_and_empty_vocabularies_are_rejected() {
        let opts = vec!["H".to_string(), "H".to_string()];
        assert!(matches!(
            Vocabulary::new("P37", &opts),
            Err(CrosstabError::DuplicateOption { .. })
        ));
        assert!(matches!(
            Vocabulary::new("P37", &[]),
            Err(CrosstabError::EmptyVocabulary { .. })
        ));
    }

    #[test]
    fn detects_multi_select_answers() {
        assert!(detect_multi_select(&["a. Presencial", "a. Presencial, b. Contact Center"]));
        assert!(!detect_multi_select(&["a. RTU", "b. FEL"]));
    }

    #[test]
    fn discovery_single_select_sorts_distinct_values() {
        let values = ["b. FEL", "a. RTU", "b. FEL", "e. Otros"];
        assert_eq!(
            discover_vocabulary(&values, false),
            vec!["a. RTU", "b. FEL", "e. Otros"]
        );
    }

    #[test]
    fn discovery_single_select_sorts_numbers_by_value() {
        let values = ["10", "2", "Ninguno", "1", "2", "1.5"];
        assert_eq!(
            discover_vocabulary(&values, false),
            vec!["1", "1.5", "2", "10", "Ninguno"]
        );
    }

    #[test]
    fn discovery_multi_select_orders_primary_then_frequency() {
        let values = [
            "c. Tres, Libre",
            "a. Uno, Otra cosa, Libre",
            "Otra cosa, Libre",
            "b. Dos",
            "Rara",
        ];
        assert_eq!(
            discover_vocabulary(&values, true),
            vec!["a. Uno", "b. Dos", "c. Tres", "Libre", "Otra cosa", "Rara"]
        );
        assert!(std::ptr::eq(primary_option_pattern(), primary_option_pattern()));
    }

    #[test]
    fn discovery_is_deterministic() {
        let values = ["x, y", "y, x", "z"];
        let first = discover_vocabulary(&values, true);
        for _ in 0..10 {
            assert_eq!(discover_vocabulary(&values, true), first);
        }
        // Equal counts keep the order of first appearance.
        assert_eq!(first, vec!["x", "y", "z"]);
    }
}
