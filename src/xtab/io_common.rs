use std::path::Path;

use crosstab::FieldValue;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Respondent ids when the input has no id column: `<file name>-<row number>`.
pub fn make_default_id(path: &str) -> impl Fn(usize) -> String {
    let simplified_file_name = simplify_file_name(path);
    move |lineno| format!("{}-{:08}", simplified_file_name, lineno)
}

/// The provider of an input file, from its extension.
pub fn infer_provider(path: &str) -> Option<&'static str> {
    let ext = Path::new(path).extension()?.to_str()?.to_lowercase();
    match ext.as_str() {
        "xlsx" | "xlsm" => Some("xlsx"),
        "csv" => Some("csv"),
        _ => None,
    }
}

/// The id of a respondent: the value of the id column if there is one and it
/// is filled, else the default id.
pub fn respondent_id(
    values: &[Option<FieldValue>],
    id_idx: Option<usize>,
    default_id: &dyn Fn(usize) -> String,
    lineno: usize,
) -> String {
    id_idx
        .and_then(|idx| values.get(idx))
        .and_then(|v| v.as_ref())
        .map(|v| v.label().to_string())
        .unwrap_or_else(|| default_id(lineno))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn providers_from_extensions() {
        assert_eq!(infer_provider("data/encuesta.xlsx"), Some("xlsx"));
        assert_eq!(infer_provider("data/ENCUESTA.CSV"), Some("csv"));
        assert_eq!(infer_provider("data/encuesta.json"), None);
        assert_eq!(infer_provider("data/encuesta"), None);
    }

    #[test]
    fn default_ids() {
        let f = make_default_id("/tmp/data/encuesta.csv");
        assert_eq!(f(12), "encuesta.csv-00000012");
        let values = vec![FieldValue::from_text("R-7"), None];
        assert_eq!(respondent_id(&values, Some(0), &f, 3), "R-7");
        assert_eq!(respondent_id(&values, Some(1), &f, 3), "encuesta.csv-00000003");
        assert_eq!(respondent_id(&values, None, &f, 3), "encuesta.csv-00000003");
    }
}
