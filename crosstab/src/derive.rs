use log::{debug, info};

use crate::config::*;
use crate::store::{FieldValue, RecordStore};

/// Age groups used by the classification battery.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub enum AgeBracket {
    From18To25,
    From26To35,
    From36To45,
    From46To60,
    Over60,
}

impl AgeBracket {
    pub const ALL: [AgeBracket; 5] = [
        AgeBracket::From18To25,
        AgeBracket::From26To35,
        AgeBracket::From36To45,
        AgeBracket::From46To60,
        AgeBracket::Over60,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AgeBracket::From18To25 => "18-25",
            AgeBracket::From26To35 => "26-35",
            AgeBracket::From36To45 => "36-45",
            AgeBracket::From46To60 => "46-60",
            AgeBracket::Over60 => "61+",
        }
    }

    pub fn labels() -> Vec<String> {
        AgeBracket::ALL.iter().map(|b| b.label().to_string()).collect()
    }

    fn from_years(years: i64) -> AgeBracket {
        match years {
            y if y <= 25 => AgeBracket::From18To25,
            y if y <= 35 => AgeBracket::From26To35,
            y if y <= 45 => AgeBracket::From36To45,
            y if y <= 60 => AgeBracket::From46To60,
            _ => AgeBracket::Over60,
        }
    }
}

// Fractional ages are truncated: 25.9 is still 25.
fn read_years(age: &FieldValue) -> Option<i64> {
    let n = match age {
        FieldValue::Number(n) => *n,
        FieldValue::Text(s) => s.trim().parse::<f64>().ok()?,
    };
    if n.is_finite() {
        Some(n.trunc() as i64)
    } else {
        None
    }
}

/// The age bracket of a respondent. Absent or unreadable ages have no bracket.
pub fn age_bracket(age: Option<&FieldValue>) -> Option<AgeBracket> {
    age.and_then(read_years).map(AgeBracket::from_years)
}

/// Looks up the region of a location. Locations that are not in the table
/// have no region.
pub fn region_of<'a>(location: Option<&str>, table: &'a RegionTable) -> Option<&'a str> {
    let loc = location?.trim();
    table
        .entries
        .iter()
        .find(|(label, _)| table.mode.matches(loc, label))
        .map(|(_, region)| region.as_str())
}

/// Computes all the derived fields, in order, and appends them as new
/// columns. A derived field may use an earlier derived field as its source.
pub(crate) fn derive_fields(
    store: &RecordStore,
    fields: &[DerivedField],
) -> Result<(RecordStore, Vec<DataQualityWarning>), CrosstabError> {
    let mut current = store.clone();
    let mut warnings: Vec<DataQualityWarning> = Vec::new();
    for field in fields {
        let src_idx =
            current
                .column_index(&field.source)
                .ok_or_else(|| CrosstabError::MissingColumn {
                    column: field.source.clone(),
                    context: format!("derived field {:?}", field.name),
                })?;
        let mut values: Vec<Option<FieldValue>> = Vec::with_capacity(current.len());
        for (row, r) in current.respondents().iter().enumerate() {
            let raw = current.value(row, src_idx);
            let derived: Option<String> = match &field.derivation {
                Derivation::AgeBracket => {
                    let b = age_bracket(raw);
                    if b.is_none() {
                        if let Some(v) = raw {
                            warnings.push(DataQualityWarning::UnparseableAge {
                                respondent: r.id.clone(),
                                value: v.label().to_string(),
                            });
                        }
                    }
                    b.map(|b| b.label().to_string())
                }
                Derivation::Region(table) => {
                    let label = raw.map(|v| v.label());
                    let region = region_of(label.as_deref(), table);
                    if region.is_none() {
                        if let Some(l) = &label {
                            warnings.push(DataQualityWarning::UnmappedLocation {
                                field: field.name.clone(),
                                respondent: r.id.clone(),
                                value: l.to_string(),
                            });
                        }
                    }
                    region.map(|s| s.to_string())
                }
            };
            debug!(
                "derive_fields: {}: respondent {} -> {:?}",
                field.name, r.id, derived
            );
            values.push(derived.and_then(|s| FieldValue::from_text(&s)));
        }
        let num_present = values.iter().filter(|v| v.is_some()).count();
        info!(
            "Derived field {:?} from {:?}: {} of {} respondents classified",
            field.name,
            field.source,
            num_present,
            current.len()
        );
        current = current.with_column(&field.name, values)?;
    }
    Ok((current, warnings))
}
