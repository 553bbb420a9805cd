use log::{info, warn};

use crosstab::*;
use snafu::{prelude::*, ErrorCompat, Snafu};

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::xtab::config_reader::*;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_excel;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum XtabError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No worksheet or empty worksheet in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Worksheet {worksheet} not found in {path}"))]
    MissingWorksheet { path: String, worksheet: String },
    #[snafu(display("Empty header cell in column {column} of {path}"))]
    ExcelEmptyHeader { path: String, column: usize },
    #[snafu(display("Error opening file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error reading line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error writing the summary to {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The configuration file has no parent directory"))]
    MissingParentDir {},
    #[snafu(display("{source}"))]
    Engine { source: CrosstabError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type XtabResult<T> = Result<T, XtabError>;

fn percent_js(p: &Percent, no_data: &str) -> JSValue {
    match p.as_percent() {
        Some(x) => json!(x),
        None => json!(no_data),
    }
}

fn counts_js(counts: &[VariableCounts]) -> JSValue {
    let mut res: JSMap<String, JSValue> = JSMap::new();
    for vc in counts.iter() {
        let cats: JSMap<String, JSValue> = vc
            .categories
            .iter()
            .map(|(c, n)| (c.clone(), json!(n)))
            .collect();
        res.insert(vc.variable.clone(), JSValue::Object(cats));
    }
    JSValue::Object(res)
}

fn percent_row_js(row: &PercentRow, no_data: &str) -> JSValue {
    let mut by_variable: JSMap<String, JSValue> = JSMap::new();
    for vp in row.by_variable.iter() {
        let cats: JSMap<String, JSValue> = vp
            .categories
            .iter()
            .map(|(c, p)| (c.clone(), percent_js(p, no_data)))
            .collect();
        by_variable.insert(vp.variable.clone(), JSValue::Object(cats));
    }
    json!({
        "option": row.option,
        "total": percent_js(&row.total, no_data),
        "byVariable": by_variable,
    })
}

fn question_js(q: &QuestionReport, no_data: &str) -> JSValue {
    let options: Vec<JSValue> = q
        .table
        .rows
        .iter()
        .map(|r| {
            json!({
                "option": r.option,
                "total": r.total,
                "byVariable": counts_js(&r.by_variable),
            })
        })
        .collect();
    let percentages: Vec<JSValue> = q
        .percentages
        .rows
        .iter()
        .map(|r| percent_row_js(r, no_data))
        .collect();
    let combinations: Vec<JSValue> = q
        .table
        .combinations
        .iter()
        .map(|(c, n)| json!({ "combination": c, "count": n }))
        .collect();
    let gate = match &q.gate {
        Some(g) => json!({
            "gatingQuestion": g.gating_question,
            "requiredOption": g.required_option,
        }),
        None => JSValue::Null,
    };
    json!({
        "question": q.question,
        "multiSelect": q.table.multi_select,
        "eligible": q.eligible,
        "grandTotal": q.table.grand_total,
        "gate": gate,
        "options": options,
        "columnTotals": counts_js(&q.table.column_totals),
        "percentages": {
            "rounding": rounding_name(q.percentages.rounding),
            "totalRow": total_row_name(q.percentages.total_row_policy),
            "options": percentages,
            "total": percent_row_js(&q.percentages.total_row, no_data),
        },
        "combinations": combinations,
    })
}

pub fn build_summary_js(config: &XtabConfig, rules: &TabulationRules, report: &SurveyReport) -> JSValue {
    let no_data = config
        .output_settings
        .no_data_label
        .clone()
        .unwrap_or_else(|| DEFAULT_NO_DATA_LABEL.to_string());
    let c = OutputConfig {
        survey: config.output_settings.survey_name.clone(),
        date: config.output_settings.survey_date.clone(),
        respondents: report.respondents,
        rounding: rounding_name(rules.rounding).to_string(),
        total_row: total_row_name(rules.total_row).to_string(),
    };
    let questions: Vec<JSValue> = report
        .questions
        .iter()
        .map(|q| question_js(q, &no_data))
        .collect();
    let skipped: Vec<JSValue> = report
        .skipped
        .iter()
        .map(|s| json!({ "question": s.question, "reason": s.reason }))
        .collect();
    let warnings: JSMap<String, JSValue> = summarize_warnings(&report.warnings)
        .into_iter()
        .map(|(kind, n)| (kind.to_string(), json!(n)))
        .collect();
    json!({
        "config": c,
        "questions": questions,
        "skipped": skipped,
        "warnings": warnings,
    })
}

/// Reads the respondents of the configured input.
///
/// Relative paths from the configuration file are resolved against the
/// directory of that file.
fn read_records(root_path: &Path, source: &InputSource) -> XtabResult<RecordStore> {
    let p: PathBuf = root_path.join(&source.file_path);
    let p2 = p.as_path().display().to_string();
    info!("Attempting to read survey file {:?}", p2);
    let provider: String = match &source.provider {
        Some(x) => x.clone(),
        None => match io_common::infer_provider(&p2) {
            Some(x) => x.to_string(),
            None => whatever!("cannot guess the type of {:?}, please set the provider", p2),
        },
    };
    match provider.as_str() {
        "xlsx" => io_excel::read_excel_records(
            &p2,
            source.excel_worksheet_name.as_deref(),
            source.id_column.as_deref(),
        ),
        "csv" => io_csv::read_csv_records(&p2, source.id_column.as_deref()),
        x => whatever!("Provider not implemented {:?}", x),
    }
}

fn write_summary(out: &Option<String>, pretty_js: &str) -> XtabResult<()> {
    match out.as_deref() {
        None | Some("stdout") | Some("") => {
            println!("{}", pretty_js);
        }
        Some(path) => {
            info!("Writing summary to {:?}", path);
            fs::write(path, pretty_js).context(WritingOutputSnafu { path })?;
        }
    }
    Ok(())
}

/// Compares the summary with a reference summary, and prints the
/// differences if any.
fn check_reference(summary_p: &str, result_js: &JSValue) -> XtabResult<()> {
    let summary_ref = read_summary(summary_p)?;
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
    let pretty_js_stats = serde_json::to_string_pretty(result_js).context(ParsingJsonSnafu {})?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference summary");
        print_diff(
            pretty_js_summary_ref.as_str(),
            pretty_js_stats.as_ref(),
            "\n",
        );
        whatever!("Difference detected between calculated summary and reference summary")
    }
    Ok(())
}

/// Applies the command line to the configuration. Flags take precedence.
fn apply_args(config: &XtabConfig, args: &Args) -> XtabConfig {
    let mut res = config.clone();
    if let Some(input) = &args.input {
        res.input_source.file_path = input.clone();
    }
    if let Some(input_type) = &args.input_type {
        res.input_source.provider = Some(input_type.clone());
    }
    if let Some(ws) = &args.excel_worksheet_name {
        res.input_source.excel_worksheet_name = Some(ws.clone());
    }
    if let Some(out) = &args.out {
        res.output_settings.output_path = Some(out.clone());
    }
    res
}

pub fn run_survey(args: &Args) -> XtabResult<JSValue> {
    let config_path = match &args.config {
        Some(p) => p.clone(),
        None => whatever!("a configuration file is required (--config)"),
    };
    let config_p = Path::new(config_path.as_str());
    let config = apply_args(&read_config(&config_path)?, args);
    info!("config: {:?}", config);

    // The input given on the command line is relative to the working directory.
    let root_p: PathBuf = if args.input.is_some() {
        PathBuf::new()
    } else {
        config_p
            .parent()
            .context(MissingParentDirSnafu {})?
            .to_path_buf()
    };
    let store = read_records(&root_p, &config.input_source)?;

    let mut plan = build_plan(&config, store.columns())?;
    if let Some(names) = &args.question {
        plan = plan.select_questions(names).context(EngineSnafu {})?;
    }
    if let Some(names) = &args.variable {
        plan = plan.select_variables(names).context(EngineSnafu {})?;
    }

    let report = run_report(&store, &plan).context(EngineSnafu {})?;

    // Assemble the final json
    let result_js = build_summary_js(&config, &plan.rules, &report);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    write_summary(&config.output_settings.output_path, &pretty_js_stats)?;

    // The reference summary, if provided for comparison
    if let Some(summary_p) = &args.reference {
        check_reference(summary_p, &result_js)?;
    }
    Ok(result_js)
}

pub fn report_error(e: &XtabError) {
    eprintln!("An error occured: {}", e);
    if let Some(bt) = ErrorCompat::backtrace(e) {
        eprintln!("trace: {}", bt);
    }
}

#[cfg(test)]
fn test_dir() -> String {
    format!("{}/tests/data", env!("CARGO_MANIFEST_DIR"))
}

#[cfg(test)]
fn test_args(test_name: &str, out: &Path) -> Args {
    Args {
        config: Some(format!("{}/{}/{}_config.json", test_dir(), test_name, test_name)),
        reference: Some(format!(
            "{}/{}/{}_expected_summary.json",
            test_dir(),
            test_name,
            test_name
        )),
        out: Some(out.display().to_string()),
        input: None,
        input_type: None,
        excel_worksheet_name: None,
        question: None,
        variable: None,
        verbose: false,
    }
}

/// Runs the configuration `tests/data/<name>/<name>_config.json` and checks
/// the summary against `<name>_expected_summary.json`.
#[cfg(test)]
pub fn test_wrapper(test_name: &str) {
    let _ = env_logger::builder().is_test(true).try_init();
    info!("Running test {}", test_name);
    let out_dir = tempfile::tempdir().unwrap();
    let args = test_args(test_name, &out_dir.path().join("summary.json"));
    if let Err(e) = run_survey(&args) {
        report_error(&e);
        panic!("test {} failed: {}", test_name, e);
    }
}
