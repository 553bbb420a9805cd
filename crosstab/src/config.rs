// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// How a respondent's value is compared to an option or category label.
///
/// `Contains` is used for multi-select fields: the raw value matches when it
/// contains the label as a substring. A vocabulary used in `Contains` mode
/// must not hold a label that is a substring of another one.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum MatchMode {
    Exact,
    Contains,
}

impl MatchMode {
    pub fn matches(&self, value: &str, label: &str) -> bool {
        match self {
            MatchMode::Exact => value == label,
            MatchMode::Contains => value.contains(label),
        }
    }
}

/// A classification axis against which target questions are tabulated.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CrossVariable {
    /// The display name, for example `P37 Género`.
    pub name: String,
    /// The raw or derived column holding the respondent's category.
    pub source: String,
    pub categories: Vec<String>,
    pub mode: MatchMode,
}

/// Where the option vocabulary of a question comes from.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum VocabularySource {
    /// A configured, ordered list of option labels.
    Fixed(Vec<String>),
    /// Discovered from the data before any tabulation happens.
    Discover,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct QuestionSpec {
    /// The exact column name of the question in the input table.
    pub column: String,
    pub vocabulary: VocabularySource,
    /// `None` lets the engine detect multi-select answers (comma separated).
    pub multi_select: Option<bool>,
}

impl QuestionSpec {
    pub fn discover(column: &str) -> QuestionSpec {
        QuestionSpec {
            column: column.to_string(),
            vocabulary: VocabularySource::Discover,
            multi_select: None,
        }
    }

    pub fn fixed(column: &str, options: &[&str], multi_select: bool) -> QuestionSpec {
        QuestionSpec {
            column: column.to_string(),
            vocabulary: VocabularySource::Fixed(options.iter().map(|s| s.to_string()).collect()),
            multi_select: Some(multi_select),
        }
    }
}

/// A branch question is only applicable to the respondents who selected
/// `required_option` on `gating_question`.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Gate {
    pub question: String,
    pub gating_question: String,
    pub required_option: String,
}

/// A lookup table from location labels to region labels.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RegionTable {
    /// (location label, region label), in lookup order.
    pub entries: Vec<(String, String)>,
    /// `Exact` for office names, `Contains` for customs posts whose labels
    /// carry extra text after the post name.
    pub mode: MatchMode,
}

impl RegionTable {
    /// Builds a table from region groups, in the given order.
    pub fn from_groups(groups: &[(&str, &[&str])], mode: MatchMode) -> RegionTable {
        let mut entries: Vec<(String, String)> = Vec::new();
        for (region, locations) in groups {
            for loc in locations.iter() {
                entries.push((loc.to_string(), region.to_string()));
            }
        }
        RegionTable { entries, mode }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub enum Derivation {
    AgeBracket,
    Region(RegionTable),
}

/// A synthetic column computed once per respondent from a raw column.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DerivedField {
    pub name: String,
    pub source: String,
    pub derivation: Derivation,
}

// ********* Configuration **********

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum RoundingPolicy {
    /// Whole percent, `.5` and above goes up.
    RoundHalfUp,
    /// Two decimals, never rounded up.
    TruncateTwoDecimals,
}

/// How the TOTAL row of the percentage table is obtained.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TotalRowPolicy {
    /// Sum of the already rounded percentages in the column. This is what
    /// the legacy reports print, rounding errors included.
    SumOfRounded,
    /// Sum of the raw counts in the column divided by the column base, then
    /// rounded once.
    RecomputeFromRaw,
}

/// What to do with a classification column that is absent from the input.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum MissingColumnPolicy {
    Fail,
    /// The variable is tabulated with zero counts and a warning is emitted.
    ZeroFill,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TabulationRules {
    pub rounding: RoundingPolicy,
    pub total_row: TotalRowPolicy,
    pub missing_columns: MissingColumnPolicy,
}

impl TabulationRules {
    pub const DEFAULT_RULES: TabulationRules = TabulationRules {
        rounding: RoundingPolicy::TruncateTwoDecimals,
        total_row: TotalRowPolicy::SumOfRounded,
        missing_columns: MissingColumnPolicy::Fail,
    };
}

/// Everything needed to produce a report from a record store.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ReportPlan {
    pub questions: Vec<QuestionSpec>,
    pub variables: Vec<CrossVariable>,
    pub derived: Vec<DerivedField>,
    pub gates: Vec<Gate>,
    pub rules: TabulationRules,
}

// ******** Output data structures *********

/// A percentage, in hundredths of a percent (`1345` is `13.45%`), or the
/// "no data" sentinel.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum Percent {
    Value(u64),
    NoData,
}

impl Percent {
    /// The percent value, `13.45` for `13.45%`.
    pub fn as_percent(&self) -> Option<f64> {
        match self {
            Percent::Value(h) => Some(*h as f64 / 100.0),
            Percent::NoData => None,
        }
    }

    pub(crate) fn hundredths(&self) -> u64 {
        match self {
            Percent::Value(h) => *h,
            Percent::NoData => 0,
        }
    }
}

/// Counts for the categories of one cross-variable, in category order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VariableCounts {
    pub variable: String,
    pub categories: Vec<(String, u64)>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct OptionRow {
    pub option: String,
    pub total: u64,
    pub by_variable: Vec<VariableCounts>,
}

/// Count matrix of one target question against all the cross-variables.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ContingencyTable {
    pub question: String,
    pub multi_select: bool,
    pub rows: Vec<OptionRow>,
    /// Marginal totals of each cross-variable over the eligible population.
    pub column_totals: Vec<VariableCounts>,
    pub grand_total: u64,
    /// For multi-select questions: canonical combination -> respondents.
    pub combinations: Vec<(String, u64)>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VariablePercents {
    pub variable: String,
    pub categories: Vec<(String, Percent)>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PercentRow {
    pub option: String,
    /// Share of the whole eligible population.
    pub total: Percent,
    /// Share within each category of each cross-variable.
    pub by_variable: Vec<VariablePercents>,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PercentageTable {
    pub rounding: RoundingPolicy,
    pub total_row_policy: TotalRowPolicy,
    pub rows: Vec<PercentRow>,
    pub total_row: PercentRow,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct QuestionReport {
    pub question: String,
    pub options: Vec<String>,
    pub eligible: u64,
    pub gate: Option<Gate>,
    pub table: ContingencyTable,
    pub percentages: PercentageTable,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SkippedQuestion {
    pub question: String,
    pub reason: String,
}

#[derive(PartialEq, Debug, Clone)]
pub struct SurveyReport {
    pub respondents: u64,
    pub questions: Vec<QuestionReport>,
    pub skipped: Vec<SkippedQuestion>,
    pub warnings: Vec<DataQualityWarning>,
}

// ******** Errors and warnings *********

/// Configuration errors. They are detected before any counting happens and
/// abort the run.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum CrosstabError {
    MissingColumn {
        column: String,
        context: String,
    },
    DuplicateColumn {
        column: String,
    },
    EmptyVocabulary {
        question: String,
    },
    DuplicateOption {
        question: String,
        option: String,
    },
    OverlappingOptions {
        question: String,
        inner: String,
        outer: String,
    },
    UnknownCrossVariable {
        name: String,
    },
    InvalidCategories {
        variable: String,
        reason: String,
    },
    RaggedRow {
        respondent: String,
        expected: usize,
        found: usize,
    },
}

impl Error for CrosstabError {}

impl Display for CrosstabError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CrosstabError::MissingColumn { column, context } => {
                write!(f, "column {:?} required by {} is missing from the input", column, context)
            }
            CrosstabError::DuplicateColumn { column } => {
                write!(f, "column {:?} appears more than once in the header", column)
            }
            CrosstabError::EmptyVocabulary { question } => {
                write!(f, "question {:?} has an empty option list", question)
            }
            CrosstabError::DuplicateOption { question, option } => {
                write!(f, "option {:?} is listed twice for question {:?}", option, question)
            }
            CrosstabError::OverlappingOptions {
                question,
                inner,
                outer,
            } => write!(
                f,
                "question {:?}: option {:?} is contained in option {:?}, contains-matching would count it twice",
                question, inner, outer
            ),
            CrosstabError::UnknownCrossVariable { name } => {
                write!(f, "unknown cross-variable {:?}", name)
            }
            CrosstabError::InvalidCategories { variable, reason } => {
                write!(f, "cross-variable {:?}: {}", variable, reason)
            }
            CrosstabError::RaggedRow {
                respondent,
                expected,
                found,
            } => write!(
                f,
                "respondent {:?} has {} values, expected {}",
                respondent, found, expected
            ),
        }
    }
}

/// Data-quality problems. They never abort the run: the affected value
/// degrades to missing, zero or "no data".
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub enum DataQualityWarning {
    UnparseableAge {
        respondent: String,
        value: String,
    },
    UnmappedLocation {
        field: String,
        respondent: String,
        value: String,
    },
    EmptyCategory {
        question: String,
        variable: String,
        category: String,
    },
    MissingSourceColumn {
        variable: String,
        column: String,
    },
    /// A discovered option is contained in another discovered option of a
    /// multi-select question.
    OverlappingOptions {
        question: String,
        inner: String,
        outer: String,
    },
}

impl DataQualityWarning {
    pub fn kind(&self) -> &'static str {
        match self {
            DataQualityWarning::UnparseableAge { .. } => "unparseableAge",
            DataQualityWarning::UnmappedLocation { .. } => "unmappedLocation",
            DataQualityWarning::EmptyCategory { .. } => "emptyCategory",
            DataQualityWarning::MissingSourceColumn { .. } => "missingSourceColumn",
            DataQualityWarning::OverlappingOptions { .. } => "overlappingOptions",
        }
    }
}

impl Display for DataQualityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataQualityWarning::UnparseableAge { respondent, value } => {
                write!(f, "respondent {}: cannot read age {:?}", respondent, value)
            }
            DataQualityWarning::UnmappedLocation {
                field,
                respondent,
                value,
            } => write!(
                f,
                "respondent {}: location {:?} has no region for {}",
                respondent, value, field
            ),
            DataQualityWarning::EmptyCategory {
                question,
                variable,
                category,
            } => write!(
                f,
                "{}: category {:?} of {:?} has no eligible respondent",
                question, category, variable
            ),
            DataQualityWarning::MissingSourceColumn { variable, column } => write!(
                f,
                "cross-variable {:?}: column {:?} is absent, counted as zero",
                variable, column
            ),
            DataQualityWarning::OverlappingOptions {
                question,
                inner,
                outer,
            } => write!(
                f,
                "{}: discovered option {:?} is contained in {:?}, question skipped",
                question, inner, outer
            ),
        }
    }
}

/// Number of warnings of each kind, in order of first occurrence.
pub fn summarize_warnings(warnings: &[DataQualityWarning]) -> Vec<(&'static str, u64)> {
    let mut res: Vec<(&'static str, u64)> = Vec::new();
    for w in warnings {
        let kind = w.kind();
        if let Some(e) = res.iter_mut().find(|(k, _)| *k == kind) {
            e.1 += 1;
        } else {
            res.push((kind, 1));
        }
    }
    res
}
