use crate::xtab::*;

use crosstab::*;
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;
use snafu::prelude::*;
use std::fs;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "surveyName")]
    pub survey_name: String,
    #[serde(rename = "surveyDate")]
    pub survey_date: Option<String>,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
    /// The text printed for cells without data. Defaults to `---`.
    #[serde(rename = "noDataLabel")]
    pub no_data_label: Option<String>,
}

/// The part of the configuration that is copied in the summary.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub survey: String,
    pub date: Option<String>,
    pub respondents: u64,
    pub rounding: String,
    #[serde(rename = "totalRow")]
    pub total_row: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct InputSource {
    /// `xlsx` or `csv`. Inferred from the file extension if absent.
    pub provider: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "idColumn")]
    pub id_column: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct XtabRegionGroup {
    pub region: String,
    pub locations: Vec<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct XtabDerivedField {
    pub name: String,
    pub source: String,
    /// `ageBracket` or `region`.
    pub derivation: String,
    pub regions: Option<Vec<XtabRegionGroup>>,
    #[serde(rename = "matchMode")]
    pub match_mode: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct XtabCrossVariable {
    pub name: String,
    pub source: String,
    /// May be omitted for derived fields: the age brackets, or the regions
    /// of the lookup table.
    pub categories: Option<Vec<String>>,
    #[serde(rename = "matchMode")]
    pub match_mode: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct XtabQuestion {
    pub column: String,
    pub options: Option<Vec<String>>,
    #[serde(rename = "multiSelect")]
    pub multi_select: Option<bool>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDiscovery {
    #[serde(rename = "minQuestionNumber")]
    pub min_question_number: Option<f64>,
    /// Columns whose answers contain commas but are a single option.
    #[serde(rename = "singleValueColumns")]
    pub single_value_columns: Option<Vec<String>>,
    /// Discovered columns that are not tabulated.
    pub exclude: Option<Vec<String>>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ConditionalQuestion {
    pub question: String,
    #[serde(rename = "gatingQuestion")]
    pub gating_question: String,
    #[serde(rename = "requiredOption")]
    pub required_option: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct XtabRules {
    pub rounding: Option<String>,
    #[serde(rename = "totalRow")]
    pub total_row: Option<String>,
    #[serde(rename = "missingColumns")]
    pub missing_columns: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct XtabConfig {
    #[serde(rename = "outputSettings")]
    pub output_settings: OutputSettings,
    #[serde(rename = "inputSource")]
    pub input_source: InputSource,
    #[serde(rename = "derivedFields", default)]
    pub derived_fields: Vec<XtabDerivedField>,
    #[serde(rename = "crossVariables")]
    pub cross_variables: Vec<XtabCrossVariable>,
    /// If absent, the questions are discovered from the header.
    pub questions: Option<Vec<XtabQuestion>>,
    #[serde(rename = "questionDiscovery")]
    pub question_discovery: Option<QuestionDiscovery>,
    #[serde(rename = "conditionalQuestions", default)]
    pub conditional_questions: Vec<ConditionalQuestion>,
    pub rules: Option<XtabRules>,
}

pub const DEFAULT_NO_DATA_LABEL: &str = "---";
pub const DEFAULT_MIN_QUESTION_NUMBER: f64 = 3.0;

pub fn read_config(path: &str) -> XtabResult<XtabConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: XtabConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    Ok(config)
}

pub fn read_summary(path: &str) -> XtabResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

pub fn validate_rules(rules: &Option<XtabRules>) -> XtabResult<TabulationRules> {
    let default = TabulationRules::DEFAULT_RULES;
    let r = match rules {
        Some(r) => r,
        None => return Ok(default),
    };
    let res = TabulationRules {
        rounding: match r.rounding.as_deref() {
            None => default.rounding,
            Some("roundHalfUp") => RoundingPolicy::RoundHalfUp,
            Some("truncateTwoDecimals") => RoundingPolicy::TruncateTwoDecimals,
            Some(x) => whatever!("unknown rounding rule: {:?}", x),
        },
        total_row: match r.total_row.as_deref() {
            None => default.total_row,
            Some("sumOfRounded") => TotalRowPolicy::SumOfRounded,
            Some("recomputeFromRaw") => TotalRowPolicy::RecomputeFromRaw,
            Some(x) => whatever!("unknown total row rule: {:?}", x),
        },
        missing_columns: match r.missing_columns.as_deref() {
            None => default.missing_columns,
            Some("fail") => MissingColumnPolicy::Fail,
            Some("zeroFill") => MissingColumnPolicy::ZeroFill,
            Some(x) => whatever!("unknown missing columns rule: {:?}", x),
        },
    };
    Ok(res)
}

pub fn rounding_name(r: RoundingPolicy) -> &'static str {
    match r {
        RoundingPolicy::RoundHalfUp => "roundHalfUp",
        RoundingPolicy::TruncateTwoDecimals => "truncateTwoDecimals",
    }
}

pub fn total_row_name(t: TotalRowPolicy) -> &'static str {
    match t {
        TotalRowPolicy::SumOfRounded => "sumOfRounded",
        TotalRowPolicy::RecomputeFromRaw => "recomputeFromRaw",
    }
}

fn validate_match_mode(mode: &Option<String>, default: MatchMode) -> XtabResult<MatchMode> {
    match mode.as_deref() {
        None => Ok(default),
        Some("exact") => Ok(MatchMode::Exact),
        Some("contains") => Ok(MatchMode::Contains),
        Some(x) => whatever!("unknown match mode: {:?}", x),
    }
}

pub fn validate_derived(fields: &[XtabDerivedField]) -> XtabResult<Vec<DerivedField>> {
    let mut res: Vec<DerivedField> = Vec::new();
    for f in fields {
        let derivation = match f.derivation.as_str() {
            "ageBracket" => Derivation::AgeBracket,
            "region" => {
                let groups = match &f.regions {
                    Some(g) if !g.is_empty() => g,
                    _ => whatever!("derived field {:?}: a region lookup needs regions", f.name),
                };
                let mut entries: Vec<(String, String)> = Vec::new();
                for g in groups {
                    for loc in g.locations.iter() {
                        entries.push((loc.clone(), g.region.clone()));
                    }
                }
                Derivation::Region(RegionTable {
                    entries,
                    mode: validate_match_mode(&f.match_mode, MatchMode::Exact)?,
                })
            }
            x => whatever!("derived field {:?}: unknown derivation {:?}", f.name, x),
        };
        res.push(DerivedField {
            name: f.name.clone(),
            source: f.source.clone(),
            derivation,
        });
    }
    Ok(res)
}

// The categories of a variable reading a derived field, when they are not listed.
fn implied_categories(source: &str, derived: &[DerivedField]) -> Option<Vec<String>> {
    let field = derived.iter().find(|f| f.name == source)?;
    match &field.derivation {
        Derivation::AgeBracket => Some(AgeBracket::labels()),
        Derivation::Region(table) => {
            let mut regions: Vec<String> = Vec::new();
            for (_, region) in table.entries.iter() {
                if !regions.contains(region) {
                    regions.push(region.clone());
                }
            }
            Some(regions)
        }
    }
}

pub fn validate_variables(
    variables: &[XtabCrossVariable],
    derived: &[DerivedField],
) -> XtabResult<Vec<CrossVariable>> {
    let mut res: Vec<CrossVariable> = Vec::new();
    for v in variables {
        let categories = match (&v.categories, implied_categories(&v.source, derived)) {
            (Some(c), _) => c.clone(),
            (None, Some(c)) => c,
            (None, None) => whatever!("cross-variable {:?} has no categories", v.name),
        };
        res.push(CrossVariable {
            name: v.name.clone(),
            source: v.source.clone(),
            categories,
            mode: validate_match_mode(&v.match_mode, MatchMode::Exact)?,
        });
    }
    Ok(res)
}

/// The questions to tabulate: the configured ones, or the ones found in the
/// header.
pub fn validate_questions(config: &XtabConfig, header: &[String]) -> Vec<QuestionSpec> {
    let discovery = config.question_discovery.clone();
    let single_value: Vec<String> = discovery
        .as_ref()
        .and_then(|d| d.single_value_columns.clone())
        .unwrap_or_default();
    match &config.questions {
        Some(qs) => qs
            .iter()
            .map(|q| QuestionSpec {
                column: q.column.clone(),
                vocabulary: match &q.options {
                    Some(opts) => VocabularySource::Fixed(opts.clone()),
                    None => VocabularySource::Discover,
                },
                multi_select: q
                    .multi_select
                    .or_else(|| single_value.contains(&q.column).then_some(false)),
            })
            .collect(),
        None => {
            let min_number = discovery
                .as_ref()
                .and_then(|d| d.min_question_number)
                .unwrap_or(DEFAULT_MIN_QUESTION_NUMBER);
            let excluded: Vec<String> = discovery
                .as_ref()
                .and_then(|d| d.exclude.clone())
                .unwrap_or_default();
            let columns = discover_question_columns(header, min_number);
            info!("Discovered {} question columns", columns.len());
            columns
                .iter()
                .filter(|c| !excluded.contains(c))
                .map(|c| {
                    let mut q = QuestionSpec::discover(c);
                    if single_value.contains(c) {
                        q.multi_select = Some(false);
                    }
                    q
                })
                .collect()
        }
    }
}

pub fn validate_gates(conditionals: &[ConditionalQuestion]) -> Vec<Gate> {
    conditionals
        .iter()
        .map(|c| Gate {
            question: c.question.clone(),
            gating_question: c.gating_question.clone(),
            required_option: c.required_option.clone(),
        })
        .collect()
}

/// Turns the configuration into an engine plan. The header is needed when
/// the questions are discovered.
pub fn build_plan(config: &XtabConfig, header: &[String]) -> XtabResult<ReportPlan> {
    let rules = validate_rules(&config.rules)?;
    let derived = validate_derived(&config.derived_fields)?;
    let variables = validate_variables(&config.cross_variables, &derived)?;
    let questions = validate_questions(config, header);
    Ok(ReportPlan {
        questions,
        variables,
        derived,
        gates: validate_gates(&config.conditional_questions),
        rules,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_js() -> JSValue {
        serde_json::json!({
            "outputSettings": { "surveyName": "Satisfacción 2024" },
            "inputSource": { "filePath": "encuesta.csv" },
            "derivedFields": [
                { "name": "Rango_Edad", "source": "P36 - Edad", "derivation": "ageBracket" },
                { "name": "Region_Aduana", "source": "P44 - Aduana", "derivation": "region",
                  "matchMode": "contains",
                  "regions": [
                      { "region": "Occidente", "locations": ["El Carmen", "La Mesilla"] },
                      { "region": "Sur", "locations": ["Valle Nuevo"] }
                  ] }
            ],
            "crossVariables": [
                { "name": "P37 Género", "source": "P37 - Género", "categories": ["H", "M"] },
                { "name": "Rango de edad", "source": "Rango_Edad" },
                { "name": "Aduana", "source": "Region_Aduana" }
            ],
            "questionDiscovery": { "singleValueColumns": ["P43 - Tipo de Punto"], "exclude": ["P36 - Edad"] },
            "conditionalQuestions": [
                { "question": "P6 - Gestión Contact Center",
                  "gatingQuestion": "P3 - Medios SAT Utilizados",
                  "requiredOption": "b. Contact Center" }
            ],
            "rules": { "rounding": "roundHalfUp" }
        })
    }

    fn config() -> XtabConfig {
        serde_json::from_value(config_js()).unwrap()
    }

    #[test]
    fn plan_from_config() {
        let header: Vec<String> = [
            "P2 - Consentimiento",
            "P3 - Medios SAT Utilizados",
            "P36 - Edad",
            "P43 - Tipo de Punto",
            "P6 - Gestión Contact Center",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let plan = build_plan(&config(), &header).unwrap();
        let questions: Vec<&str> = plan.questions.iter().map(|q| q.column.as_str()).collect();
        assert_eq!(
            questions,
            vec![
                "P3 - Medios SAT Utilizados",
                "P6 - Gestión Contact Center",
                "P43 - Tipo de Punto"
            ]
        );
        assert_eq!(plan.questions[2].multi_select, Some(false));
        assert_eq!(plan.questions[0].multi_select, None);

        assert_eq!(plan.variables[1].categories, AgeBracket::labels());
        assert_eq!(plan.variables[2].categories, vec!["Occidente", "Sur"]);
        match &plan.derived[1].derivation {
            Derivation::Region(t) => assert_eq!(t.mode, MatchMode::Contains),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(plan.rules.rounding, RoundingPolicy::RoundHalfUp);
        assert_eq!(plan.rules.total_row, TotalRowPolicy::SumOfRounded);
        assert_eq!(plan.gates.len(), 1);
    }

    #[test]
    fn explicit_questions() {
        let mut js = config_js();
        js["questions"] = serde_json::json!([
            { "column": "P4 - Gestión", "options": ["a. RTU", "b. FEL"] },
            { "column": "P43 - Tipo de Punto" }
        ]);
        let c: XtabConfig = serde_json::from_value(js).unwrap();
        let plan = build_plan(&c, &[]).unwrap();
        assert_eq!(plan.questions.len(), 2);
        assert_eq!(
            plan.questions[0].vocabulary,
            VocabularySource::Fixed(vec!["a. RTU".to_string(), "b. FEL".to_string()])
        );
        assert_eq!(plan.questions[1].multi_select, Some(false));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let mut js = config_js();
        js["rules"]["totalRow"] = serde_json::json!("average");
        let c: XtabConfig = serde_json::from_value(js).unwrap();
        assert!(build_plan(&c, &[]).is_err());

        let mut js = config_js();
        js["derivedFields"][0]["derivation"] = serde_json::json!("zodiac");
        let c: XtabConfig = serde_json::from_value(js).unwrap();
        assert!(build_plan(&c, &[]).is_err());

        let mut js = config_js();
        js["crossVariables"][0]["matchMode"] = serde_json::json!("fuzzy");
        let c: XtabConfig = serde_json::from_value(js).unwrap();
        assert!(build_plan(&c, &[]).is_err());

        let mut js = config_js();
        js["crossVariables"][0]
            .as_object_mut()
            .unwrap()
            .remove("categories");
        let c: XtabConfig = serde_json::from_value(js).unwrap();
        assert!(build_plan(&c, &[]).is_err());
    }
}
