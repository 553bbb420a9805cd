use log::{debug, info, warn};
use std::collections::HashMap;

use crate::config::*;
use crate::filter::Population;
use crate::normalize::{check_no_overlap, normalize, CanonicalCombination, Vocabulary};
use crate::store::RecordStore;

/// A question ready to be tabulated: its vocabulary is fixed for the rest
/// of the run.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct TargetQuestion {
    pub column: String,
    pub vocabulary: Vocabulary,
    pub multi_select: bool,
}

/// Checks the categories of a cross-variable.
pub fn validate_variable(var: &CrossVariable) -> Result<(), CrosstabError> {
    if var.categories.is_empty() {
        return Err(CrosstabError::InvalidCategories {
            variable: var.name.clone(),
            reason: "no category".to_string(),
        });
    }
    for (idx, c) in var.categories.iter().enumerate() {
        if var.categories[..idx].contains(c) {
            return Err(CrosstabError::InvalidCategories {
                variable: var.name.clone(),
                reason: format!("category {:?} is listed twice", c),
            });
        }
    }
    if var.mode == MatchMode::Contains {
        check_no_overlap(&var.name, &var.categories)?;
    }
    Ok(())
}

// How the categories of one variable are resolved for the current table.
enum VariableSource {
    Column(usize),
    // The column is absent and the rules allow counting it as zero.
    Absent,
}

fn resolve_source(
    store: &RecordStore,
    target: &TargetQuestion,
    var: &CrossVariable,
    rules: &TabulationRules,
    warnings: &mut Vec<DataQualityWarning>,
) -> Result<VariableSource, CrosstabError> {
    if var.source == target.column {
        debug!(
            "build_table: {}: {:?} reads the question itself",
            target.column, var.name
        );
    }
    match (store.column_index(&var.source), rules.missing_columns) {
        (Some(idx), _) => Ok(VariableSource::Column(idx)),
        (None, MissingColumnPolicy::Fail) => Err(CrosstabError::MissingColumn {
            column: var.source.clone(),
            context: format!("cross-variable {:?}", var.name),
        }),
        (None, MissingColumnPolicy::ZeroFill) => {
            warnings.push(DataQualityWarning::MissingSourceColumn {
                variable: var.name.clone(),
                column: var.source.clone(),
            });
            Ok(VariableSource::Absent)
        }
    }
}

/// The options of the target question selected by one respondent.
fn matched_options(
    raw: &str,
    target: &TargetQuestion,
) -> (Vec<usize>, Option<CanonicalCombination>) {
    if target.multi_select {
        match normalize(raw, &target.vocabulary) {
            Some(comb) => (comb.option_indexes().to_vec(), Some(comb)),
            None => (vec![], None),
        }
    } else {
        let idxs = target
            .vocabulary
            .options()
            .iter()
            .position(|o| o == raw)
            .into_iter()
            .collect();
        (idxs, None)
    }
}

/// Builds the count matrix of a target question against the cross-variables.
///
/// Only the respondents of `population` are counted. Column totals are the
/// marginals of each cross-variable over the whole population, so they do
/// not depend on how the target question is answered. A cross-variable that
/// reads the target question itself is matched on the raw answer like any
/// other column: its cells are co-occurrences of options, and its marginals
/// equal the option totals when its categories are the options matched the
/// same way.
pub fn build_table(
    store: &RecordStore,
    target: &TargetQuestion,
    variables: &[CrossVariable],
    population: &Population,
    rules: &TabulationRules,
) -> Result<(ContingencyTable, Vec<DataQualityWarning>), CrosstabError> {
    let q_idx = store
        .column_index(&target.column)
        .ok_or_else(|| CrosstabError::MissingColumn {
            column: target.column.clone(),
            context: "target question".to_string(),
        })?;
    let mut warnings: Vec<DataQualityWarning> = Vec::new();
    let num_options = target.vocabulary.len();

    // Options selected by every eligible respondent.
    let mut selections: Vec<(usize, Vec<usize>)> = Vec::with_capacity(population.len());
    let mut combination_counts: HashMap<CanonicalCombination, u64> = HashMap::new();
    let mut option_totals: Vec<u64> = vec![0; num_options];
    for &row in population.rows() {
        let raw = match store.label(row, q_idx) {
            Some(raw) => raw,
            None => continue,
        };
        let (options, comb) = matched_options(&raw, target);
        if options.is_empty() {
            debug!(
                "build_table: {}: respondent {}: no known option in {:?}",
                target.column,
                store.respondent(row).id,
                raw
            );
        }
        if let Some(c) = comb {
            *combination_counts.entry(c).or_insert(0) += 1;
        }
        for o in options.iter() {
            option_totals[*o] += 1;
        }
        selections.push((row, options));
    }

    let mut rows: Vec<OptionRow> = target
        .vocabulary
        .options()
        .iter()
        .zip(option_totals.iter())
        .map(|(option, total)| OptionRow {
            option: option.clone(),
            total: *total,
            by_variable: Vec::with_capacity(variables.len()),
        })
        .collect();
    let mut column_totals: Vec<VariableCounts> = Vec::with_capacity(variables.len());

    for var in variables {
        let num_cats = var.categories.len();
        // cells[option][category]
        let mut cells: Vec<Vec<u64>> = vec![vec![0; num_cats]; num_options];
        let mut marginals: Vec<u64> = vec![0; num_cats];

        match resolve_source(store, target, var, rules, &mut warnings)? {
            VariableSource::Column(v_idx) => {
                for (row, options) in selections.iter() {
                    let value = match store.label(*row, v_idx) {
                        Some(v) => v,
                        None => continue,
                    };
                    for (c_idx, cat) in var.categories.iter().enumerate() {
                        if !var.mode.matches(&value, cat) {
                            continue;
                        }
                        marginals[c_idx] += 1;
                        for o in options.iter() {
                            cells[*o][c_idx] += 1;
                        }
                    }
                }
            }
            VariableSource::Absent => {
                warn!(
                    "build_table: {}: column {:?} of {:?} is absent, counting zero",
                    target.column, var.source, var.name
                );
            }
        }

        for (o_idx, row) in rows.iter_mut().enumerate() {
            row.by_variable.push(VariableCounts {
                variable: var.name.clone(),
                categories: var
                    .categories
                    .iter()
                    .cloned()
                    .zip(cells[o_idx].iter().cloned())
                    .collect(),
            });
        }
        column_totals.push(VariableCounts {
            variable: var.name.clone(),
            categories: var.categories.iter().cloned().zip(marginals).collect(),
        });
    }

    let mut combinations: Vec<(CanonicalCombination, u64)> =
        combination_counts.into_iter().collect();
    combinations.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let grand_total = population.len() as u64;
    info!(
        "{}: {} eligible respondents, option totals: {:?}",
        target.column, grand_total, option_totals
    );

    Ok((
        ContingencyTable {
            question: target.column.clone(),
            multi_select: target.multi_select,
            rows,
            column_totals,
            grand_total,
            combinations: combinations
                .into_iter()
                .map(|(c, n)| (c.to_string(), n))
                .collect(),
        },
        warnings,
    ))
}
