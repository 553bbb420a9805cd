use log::debug;

use crate::config::*;

impl RoundingPolicy {
    /// Rounds a percent value (`13.456` for `13.456%`).
    ///
    /// A result of zero is reported as no data: the reports do not
    /// distinguish "nobody" from "no base".
    pub fn apply(&self, pct: f64) -> Percent {
        if !pct.is_finite() || pct <= 0.0 {
            return Percent::NoData;
        }
        let hundredths = match self {
            RoundingPolicy::RoundHalfUp => {
                let whole = pct.floor();
                let whole = if pct - whole >= 0.5 { whole + 1.0 } else { whole };
                whole as u64 * 100
            }
            RoundingPolicy::TruncateTwoDecimals => (pct * 100.0).floor() as u64,
        };
        to_percent(hundredths)
    }

    /// Rounds `count / base` expressed as a percentage, without going
    /// through floating point. A zero base is no data.
    pub fn ratio(&self, count: u64, base: u64) -> Percent {
        if base == 0 {
            return Percent::NoData;
        }
        let hundredths = match self {
            RoundingPolicy::RoundHalfUp => {
                let scaled = count * 100;
                let whole = scaled / base;
                let rest = scaled % base;
                let whole = if 2 * rest >= base { whole + 1 } else { whole };
                whole * 100
            }
            RoundingPolicy::TruncateTwoDecimals => count * 10_000 / base,
        };
        to_percent(hundredths)
    }
}

fn to_percent(hundredths: u64) -> Percent {
    if hundredths == 0 {
        Percent::NoData
    } else {
        Percent::Value(hundredths)
    }
}

fn sum_of_rounded<'a, I: Iterator<Item = &'a Percent>>(values: I) -> Percent {
    to_percent(values.map(|p| p.hundredths()).sum())
}

/// Turns a count matrix into percentages.
///
/// The total column is a share of the eligible population; every
/// cross-variable cell is a share of its category's marginal total.
/// Categories with an empty marginal are reported as no data and produce
/// an `EmptyCategory` warning.
pub fn build_percentages(
    table: &ContingencyTable,
    rules: &TabulationRules,
) -> (PercentageTable, Vec<DataQualityWarning>) {
    let rounding = rules.rounding;
    let mut warnings: Vec<DataQualityWarning> = Vec::new();
    for vc in table.column_totals.iter() {
        for (cat, n) in vc.categories.iter() {
            if *n == 0 {
                warnings.push(DataQualityWarning::EmptyCategory {
                    question: table.question.clone(),
                    variable: vc.variable.clone(),
                    category: cat.clone(),
                });
            }
        }
    }

    let rows: Vec<PercentRow> = table
        .rows
        .iter()
        .map(|row| PercentRow {
            option: row.option.clone(),
            total: rounding.ratio(row.total, table.grand_total),
            by_variable: row
                .by_variable
                .iter()
                .zip(table.column_totals.iter())
                .map(|(counts, marginals)| VariablePercents {
                    variable: counts.variable.clone(),
                    categories: counts
                        .categories
                        .iter()
                        .zip(marginals.categories.iter())
                        .map(|((cat, n), (_, base))| (cat.clone(), rounding.ratio(*n, *base)))
                        .collect(),
                })
                .collect(),
        })
        .collect();

    let total_row = match rules.total_row {
        TotalRowPolicy::SumOfRounded => PercentRow {
            option: TOTAL_LABEL.to_string(),
            total: sum_of_rounded(rows.iter().map(|r| &r.total)),
            by_variable: table
                .column_totals
                .iter()
                .enumerate()
                .map(|(v_idx, vc)| VariablePercents {
                    variable: vc.variable.clone(),
                    categories: vc
                        .categories
                        .iter()
                        .enumerate()
                        .map(|(c_idx, (cat, _))| {
                            let p = sum_of_rounded(
                                rows.iter().map(|r| &r.by_variable[v_idx].categories[c_idx].1),
                            );
                            (cat.clone(), p)
                        })
                        .collect(),
                })
                .collect(),
        },
        TotalRowPolicy::RecomputeFromRaw => PercentRow {
            option: TOTAL_LABEL.to_string(),
            total: rounding.ratio(
                table.rows.iter().map(|r| r.total).sum(),
                table.grand_total,
            ),
            by_variable: table
                .column_totals
                .iter()
                .enumerate()
                .map(|(v_idx, vc)| VariablePercents {
                    variable: vc.variable.clone(),
                    categories: vc
                        .categories
                        .iter()
                        .enumerate()
                        .map(|(c_idx, (cat, base))| {
                            let n: u64 = table
                                .rows
                                .iter()
                                .map(|r| r.by_variable[v_idx].categories[c_idx].1)
                                .sum();
                            (cat.clone(), rounding.ratio(n, *base))
                        })
                        .collect(),
                })
                .collect(),
        },
    };
    debug!(
        "build_percentages: {}: total row {:?}",
        table.question, total_row.total
    );

    (
        PercentageTable {
            rounding,
            total_row_policy: rules.total_row,
            rows,
            total_row,
        },
        warnings,
    )
}

/// The label of the total row.
pub const TOTAL_LABEL: &str = "TOTAL";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_half_up() {
        let r = RoundingPolicy::RoundHalfUp;
        assert_eq!(r.apply(0.5), Percent::Value(100));
        assert_eq!(r.apply(1.49), Percent::Value(100));
        assert_eq!(r.apply(1.5), Percent::Value(200));
        assert_eq!(r.apply(66.66), Percent::Value(6700));
        assert_eq!(r.apply(0.0), Percent::NoData);
        assert_eq!(r.apply(0.49), Percent::NoData);
    }

    #[test]
    fn truncate_two_decimals() {
        let r = RoundingPolicy::TruncateTwoDecimals;
        assert_eq!(r.apply(13.456), Percent::Value(1345));
        assert_eq!(r.apply(13.459), Percent::Value(1345));
        assert_eq!(r.apply(0.004), Percent::NoData);
        assert_eq!(r.apply(100.0), Percent::Value(10000));
        assert_eq!(Percent::Value(1345).as_percent(), Some(13.45));
    }

    #[test]
    fn exact_ratios() {
        let half_up = RoundingPolicy::RoundHalfUp;
        // 3 / 200 = 1.5%
        assert_eq!(half_up.ratio(3, 200), Percent::Value(200));
        // 1 / 3 = 33.33%
        assert_eq!(half_up.ratio(1, 3), Percent::Value(3300));
        assert_eq!(half_up.ratio(2, 3), Percent::Value(6700));
        assert_eq!(half_up.ratio(0, 3), Percent::NoData);
        assert_eq!(half_up.ratio(1, 0), Percent::NoData);

        let trunc = RoundingPolicy::TruncateTwoDecimals;
        assert_eq!(trunc.ratio(2, 3), Percent::Value(6666));
        // 29 / 100 is exactly 29%, which floating point would print 28.99.
        assert_eq!(trunc.ratio(29, 100), Percent::Value(2900));
        assert_eq!(trunc.ratio(1, 100_000), Percent::NoData);
    }

    fn two_by_two() -> ContingencyTable {
        // Three options answered by 3 respondents, crossed by gender; nobody
        // answered "No deseo responder".
        let counts = |h: u64, m: u64| VariableCounts {
            variable: "Género".to_string(),
            categories: vec![
                ("H".to_string(), h),
                ("M".to_string(), m),
                ("No deseo responder".to_string(), 0),
            ],
        };
        ContingencyTable {
            question: "P4".to_string(),
            multi_select: false,
            rows: vec![
                OptionRow {
                    option: "a".to_string(),
                    total: 1,
                    by_variable: vec![counts(1, 0)],
                },
                OptionRow {
                    option: "b".to_string(),
                    total: 1,
                    by_variable: vec![counts(0, 1)],
                },
                OptionRow {
                    option: "c".to_string(),
                    total: 1,
                    by_variable: vec![counts(0, 1)],
                },
            ],
            column_totals: vec![counts(1, 2)],
            grand_total: 3,
            combinations: vec![],
        }
    }

    fn rules(rounding: RoundingPolicy, total_row: TotalRowPolicy) -> TabulationRules {
        TabulationRules {
            rounding,
            total_row,
            ..TabulationRules::DEFAULT_RULES
        }
    }

    #[test]
    fn cells_are_shares_of_their_category() {
        let (pt, warnings) = build_percentages(
            &two_by_two(),
            &rules(RoundingPolicy::RoundHalfUp, TotalRowPolicy::SumOfRounded),
        );
        assert_eq!(pt.rows[0].total, Percent::Value(3300));
        assert_eq!(
            pt.rows[1].by_variable[0].categories,
            vec![
                ("H".to_string(), Percent::NoData),
                ("M".to_string(), Percent::Value(5000)),
                ("No deseo responder".to_string(), Percent::NoData),
            ]
        );
        assert_eq!(warnings.len(), 1);
        assert_eq!(
            warnings[0],
            DataQualityWarning::EmptyCategory {
                question: "P4".to_string(),
                variable: "Género".to_string(),
                category: "No deseo responder".to_string(),
            }
        );
    }

    #[test]
    fn total_row_policies_diverge() {
        let table = two_by_two();
        let (summed, _) = build_percentages(
            &table,
            &rules(RoundingPolicy::RoundHalfUp, TotalRowPolicy::SumOfRounded),
        );
        // 33 + 33 + 33
        assert_eq!(summed.total_row.total, Percent::Value(9900));
        assert_eq!(summed.total_row.option, TOTAL_LABEL);

        let (recomputed, _) = build_percentages(
            &table,
            &rules(RoundingPolicy::RoundHalfUp, TotalRowPolicy::RecomputeFromRaw),
        );
        assert_eq!(recomputed.total_row.total, Percent::Value(10000));
        assert_eq!(
            recomputed.total_row.by_variable[0].categories,
            vec![
                ("H".to_string(), Percent::Value(10000)),
                ("M".to_string(), Percent::Value(10000)),
                ("No deseo responder".to_string(), Percent::NoData),
            ]
        );

        let (truncated, _) = build_percentages(
            &table,
            &rules(RoundingPolicy::TruncateTwoDecimals, TotalRowPolicy::SumOfRounded),
        );
        assert_eq!(truncated.total_row.total, Percent::Value(9999));
    }

    #[test]
    fn empty_population_is_no_data() {
        let mut table = two_by_two();
        table.grand_total = 0;
        for r in table.rows.iter_mut() {
            r.total = 0;
        }
        let (pt, _) = build_percentages(&table, &TabulationRules::DEFAULT_RULES);
        assert!(pt.rows.iter().all(|r| r.total == Percent::NoData));
        assert_eq!(pt.total_row.total, Percent::NoData);
    }
}
