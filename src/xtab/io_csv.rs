// Primitives for reading CSV files.

use log::{debug, info};
use snafu::prelude::*;

use crosstab::builder::Builder;
use crosstab::{FieldValue, RecordStore};

use crate::xtab::{
    io_common::{make_default_id, respondent_id},
    *,
};

/// Reads a CSV file with a header row. Each other row is a respondent.
pub fn read_csv_records(path: &str, id_column: Option<&str>) -> XtabResult<RecordStore> {
    let default_id = make_default_id(path);
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;

    let header: Vec<String> = rdr
        .headers()
        .context(CsvLineParseSnafu { lineno: 1_usize })?
        .iter()
        .map(|s| s.trim().to_string())
        .collect();
    debug!("read_csv_records: header: {:?}", header);
    let id_idx = find_id_column(&header, id_column)?;

    let mut builder = Builder::new(&header).context(EngineSnafu {})?;
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is line 1.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        let values: Vec<Option<FieldValue>> = line.iter().map(FieldValue::from_text).collect();
        debug!("read_csv_records: lineno: {:?} row: {:?}", lineno, &values);
        let id = respondent_id(&values, id_idx, &default_id, lineno);
        builder.add_respondent(&id, values).context(EngineSnafu {})?;
    }
    info!("Read {} respondents from {:?}", builder.len(), path);
    Ok(builder.build())
}

pub fn find_id_column(header: &[String], id_column: Option<&str>) -> XtabResult<Option<usize>> {
    match id_column {
        None => Ok(None),
        Some(name) => match header.iter().position(|c| c == name) {
            Some(idx) => Ok(Some(idx)),
            None => whatever!("id column {:?} is not in the header", name),
        },
    }
}
