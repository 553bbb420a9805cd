use calamine::{open_workbook, DataType, Range, Reader, Xlsx};
use log::{debug, info, warn};
use snafu::prelude::*;

use crosstab::builder::Builder;
use crosstab::{FieldValue, RecordStore};

use crate::xtab::{
    io_common::{make_default_id, respondent_id},
    io_csv::find_id_column,
    *,
};

/// Reads the first worksheet of a workbook, or the named one. The first row
/// is the header, each other row is a respondent.
pub fn read_excel_records(
    path: &str,
    worksheet_name: Option<&str>,
    id_column: Option<&str>,
) -> XtabResult<RecordStore> {
    let default_id = make_default_id(path);
    let wrange = get_range(path, worksheet_name)?;

    let mut rows = wrange.rows();
    let header_row = rows.next().context(EmptyExcelSnafu { path })?;
    let mut header: Vec<String> = Vec::with_capacity(header_row.len());
    for (idx, cell) in header_row.iter().enumerate() {
        match read_cell(cell) {
            Some(v) => header.push(v.label().to_string()),
            None => {
                return Err(XtabError::ExcelEmptyHeader {
                    path: path.to_string(),
                    column: idx + 1,
                })
            }
        }
    }
    debug!("read_excel_records: header: {:?}", header);
    let id_idx = find_id_column(&header, id_column)?;

    let mut builder = Builder::new(&header).context(EngineSnafu {})?;
    for (idx, row) in rows.enumerate() {
        // The header is row 1.
        let lineno = idx + 2;
        let values: Vec<Option<FieldValue>> = row.iter().map(read_cell).collect();
        if values.iter().all(|v| v.is_none()) {
            debug!("read_excel_records: lineno: {:?}: empty row, skipping", lineno);
            continue;
        }
        debug!("read_excel_records: lineno: {:?} row: {:?}", lineno, &values);
        let id = respondent_id(&values, id_idx, &default_id, lineno);
        builder.add_respondent(&id, values).context(EngineSnafu {})?;
    }
    info!("Read {} respondents from {:?}", builder.len(), path);
    Ok(builder.build())
}

fn read_cell(cell: &DataType) -> Option<FieldValue> {
    match cell {
        DataType::String(s) => FieldValue::from_text(s),
        DataType::Float(f) => FieldValue::from_number(*f),
        DataType::Int(i) => FieldValue::from_number(*i as f64),
        DataType::DateTime(f) => FieldValue::from_number(*f),
        DataType::Bool(b) => FieldValue::from_text(&b.to_string()),
        DataType::Empty => None,
        other => {
            warn!("read_cell: unreadable cell {:?}, treated as missing", other);
            None
        }
    }
}

fn get_range(path: &str, worksheet_name: Option<&str>) -> XtabResult<Range<DataType>> {
    debug!(
        "read_excel_records: path: {:?} worksheet: {:?}",
        &path, &worksheet_name
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(name) = worksheet_name {
        workbook
            .worksheet_range(name)
            .context(MissingWorksheetSnafu {
                path,
                worksheet: name,
            })?
            .context(OpeningExcelSnafu { path })
    } else {
        workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xtab::io_csv::read_csv_records;

    fn data_path(name: &str) -> String {
        format!("{}/tests/data/{}", env!("CARGO_MANIFEST_DIR"), name)
    }

    #[test]
    fn excel_and_csv_inputs_agree() {
        let xlsx = read_excel_records(&data_path("small/small.xlsx"), None, Some("Id")).unwrap();
        let csv = read_csv_records(&data_path("small/small.csv"), Some("Id")).unwrap();
        assert_eq!(xlsx.columns(), csv.columns());
        assert_eq!(xlsx.len(), csv.len());
        for row in 0..csv.len() {
            assert_eq!(xlsx.respondent(row).id, csv.respondent(row).id);
            for col in 0..csv.columns().len() {
                assert_eq!(xlsx.label(row, col), csv.label(row, col));
            }
        }
    }

    #[test]
    fn numeric_cells_stay_numeric() {
        let xlsx = read_excel_records(&data_path("small/small.xlsx"), None, None).unwrap();
        let age = xlsx.column_index("P36 - Edad").unwrap();
        assert!(matches!(xlsx.value(0, age), Some(FieldValue::Number(_))));
    }

    #[test]
    fn unknown_worksheet() {
        let res = read_excel_records(&data_path("small/small.xlsx"), Some("Hoja9"), None);
        assert!(matches!(res, Err(XtabError::MissingWorksheet { .. })));
    }
}
