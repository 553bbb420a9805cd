mod config;
mod derive;
mod filter;
mod normalize;
mod percent;
mod questions;
mod store;
mod table;

pub mod builder;
pub mod manual;

use log::{info, warn};
use std::collections::HashSet;

pub use crate::config::*;
pub use crate::derive::{age_bracket, region_of, AgeBracket};
pub use crate::filter::{eligible_population, GateTable, Population};
pub use crate::normalize::{
    check_no_overlap, detect_multi_select, discover_vocabulary, normalize, CanonicalCombination,
    Vocabulary, COMBINATION_SEPARATOR,
};
pub use crate::percent::{build_percentages, TOTAL_LABEL};
pub use crate::questions::{
    discover_question_columns, question_number, resolve_question, Resolution,
};
pub use crate::store::{FieldValue, RecordStore, Respondent};
pub use crate::table::{build_table, validate_variable, TargetQuestion};

impl ReportPlan {
    /// Keeps only the named questions, in the order of the plan.
    pub fn select_questions(&self, names: &[String]) -> Result<ReportPlan, CrosstabError> {
        for n in names {
            if !self.questions.iter().any(|q| q.column == *n) {
                return Err(CrosstabError::MissingColumn {
                    column: n.clone(),
                    context: "question selection".to_string(),
                });
            }
        }
        Ok(ReportPlan {
            questions: self
                .questions
                .iter()
                .filter(|q| names.contains(&q.column))
                .cloned()
                .collect(),
            ..self.clone()
        })
    }

    /// Keeps only the named cross-variables, in the order of the plan.
    pub fn select_variables(&self, names: &[String]) -> Result<ReportPlan, CrosstabError> {
        for n in names {
            if !self.variables.iter().any(|v| v.name == *n) {
                return Err(CrosstabError::UnknownCrossVariable { name: n.clone() });
            }
        }
        Ok(ReportPlan {
            variables: self
                .variables
                .iter()
                .filter(|v| names.contains(&v.name))
                .cloned()
                .collect(),
            ..self.clone()
        })
    }
}

/// Tabulates one question against the cross-variables.
///
/// The store must already hold the derived fields the variables refer to.
pub fn run_crosstab(
    store: &RecordStore,
    target: &TargetQuestion,
    variables: &[CrossVariable],
    gates: &GateTable,
    rules: &TabulationRules,
) -> Result<(QuestionReport, Vec<DataQualityWarning>), CrosstabError> {
    let population = eligible_population(store, &target.column, gates)?;
    let (table, mut warnings) = build_table(store, target, variables, &population, rules)?;
    let (percentages, pct_warnings) = build_percentages(&table, rules);
    warnings.extend(pct_warnings);
    Ok((
        QuestionReport {
            question: target.column.clone(),
            options: target.vocabulary.options().to_vec(),
            eligible: population.len() as u64,
            gate: gates.gate_for(&target.column).cloned(),
            table,
            percentages,
        },
        warnings,
    ))
}

fn check_variables(variables: &[CrossVariable]) -> Result<(), CrosstabError> {
    for (idx, var) in variables.iter().enumerate() {
        validate_variable(var)?;
        if variables[..idx].iter().any(|v| v.name == var.name) {
            return Err(CrosstabError::InvalidCategories {
                variable: var.name.clone(),
                reason: "the variable is defined twice".to_string(),
            });
        }
    }
    Ok(())
}

// All the columns are checked on the raw header before anything is derived
// or counted. Derived fields are available to the fields declared after them.
fn check_columns(
    store: &RecordStore,
    plan: &ReportPlan,
    warnings: &mut Vec<DataQualityWarning>,
) -> Result<(), CrosstabError> {
    let mut available: HashSet<&str> = store.columns().iter().map(|c| c.as_str()).collect();
    for f in plan.derived.iter() {
        if !available.contains(f.source.as_str()) {
            return Err(CrosstabError::MissingColumn {
                column: f.source.clone(),
                context: format!("derived field {:?}", f.name),
            });
        }
        available.insert(f.name.as_str());
    }
    let missing = |column: &str, context: String| -> Result<(), CrosstabError> {
        if available.contains(column) {
            Ok(())
        } else {
            Err(CrosstabError::MissingColumn {
                column: column.to_string(),
                context,
            })
        }
    };
    for q in plan.questions.iter() {
        missing(&q.column, "question list".to_string())?;
    }
    for g in plan.gates.iter() {
        missing(&g.gating_question, format!("gate of question {:?}", g.question))?;
    }
    for v in plan.variables.iter() {
        if available.contains(v.source.as_str()) {
            continue;
        }
        match plan.rules.missing_columns {
            MissingColumnPolicy::Fail => {
                missing(&v.source, format!("cross-variable {:?}", v.name))?;
            }
            MissingColumnPolicy::ZeroFill => {
                warnings.push(DataQualityWarning::MissingSourceColumn {
                    variable: v.name.clone(),
                    column: v.source.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Runs a full report.
///
/// The steps are:
/// * configuration checks: categories, then every required column of the
///   raw header or of the declared derived fields
/// * derived fields
/// * the vocabulary of every question is fixed, discovered from the data
///   if needed
/// * each question is tabulated, one after the other
///
/// Configuration errors abort the run before any counting happens.
/// Questions without data, or whose discovered options overlap, are listed
/// as skipped.
pub fn run_report(store: &RecordStore, plan: &ReportPlan) -> Result<SurveyReport, CrosstabError> {
    info!(
        "Processing {} respondents, {} questions, {} cross-variables, rules: {:?}",
        store.len(),
        plan.questions.len(),
        plan.variables.len(),
        plan.rules
    );
    check_variables(&plan.variables)?;
    let mut column_warnings: Vec<DataQualityWarning> = Vec::new();
    check_columns(store, plan, &mut column_warnings)?;
    let (derived, mut warnings) = derive::derive_fields(store, &plan.derived)?;
    warnings.extend(column_warnings);
    let gates = GateTable::new(&plan.gates);

    let mut targets: Vec<TargetQuestion> = Vec::new();
    let mut skipped: Vec<SkippedQuestion> = Vec::new();
    for q in plan.questions.iter() {
        match resolve_question(&derived, q)? {
            Resolution::Ready(t) => targets.push(t),
            Resolution::Skipped { reason, warning } => {
                warnings.extend(warning);
                skipped.push(SkippedQuestion {
                    question: q.column.clone(),
                    reason,
                });
            }
        }
    }

    let mut seen: HashSet<DataQualityWarning> = warnings.iter().cloned().collect();
    let mut reports: Vec<QuestionReport> = Vec::with_capacity(targets.len());
    for t in targets.iter() {
        let (report, q_warnings) = run_crosstab(&derived, t, &plan.variables, &gates, &plan.rules)?;
        for w in q_warnings {
            if seen.insert(w.clone()) {
                warnings.push(w);
            }
        }
        reports.push(report);
    }

    for w in warnings.iter() {
        warn!("{}", w);
    }
    for (kind, count) in summarize_warnings(&warnings) {
        info!("Data quality: {} {} warnings", count, kind);
    }
    info!(
        "Report done: {} questions tabulated, {} skipped",
        reports.len(),
        skipped.len()
    );
    Ok(SurveyReport {
        respondents: store.len() as u64,
        questions: reports,
        skipped,
        warnings,
    })
}
