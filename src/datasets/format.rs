//! Dataset formats and the header schemas uploads are checked against.

use super::DatasetError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::path::Path;
use std::sync::LazyLock;

/// Kind of dataset an upload claims to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    Experiment,
}

impl DatasetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Experiment => "experiment",
        }
    }

    /// Header schema registered for this format, if any.
    pub fn schema(&self) -> Option<&'static FormatSchema> {
        FORMAT_SCHEMAS.get(self)
    }
}

impl std::fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DatasetFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "experiment" => Ok(Self::Experiment),
            other => Err(format!("Unknown dataset format: {}", other)),
        }
    }
}

/// Required and allowed header fields of a delimited dataset.
///
/// `required` is always a subset of `allowed`.
#[derive(Debug)]
pub struct FormatSchema {
    pub required: &'static [&'static str],
    pub allowed: &'static [&'static str],
}

impl FormatSchema {
    fn required_set(&self) -> BTreeSet<String> {
        self.required.iter().map(|s| s.to_string()).collect()
    }

    fn allowed_set(&self) -> BTreeSet<String> {
        self.allowed.iter().map(|s| s.to_string()).collect()
    }

    /// Check a set of header fields against this schema.
    pub fn check(&self, format: DatasetFormat, fields: &BTreeSet<String>) -> Result<(), DatasetError> {
        let missing: BTreeSet<String> = self.required_set().difference(fields).cloned().collect();
        if !missing.is_empty() {
            return Err(DatasetError::MissingFields {
                format: format.to_string(),
                missing,
            });
        }

        let allowed = self.allowed_set();
        let invalid: BTreeSet<String> = fields.difference(&allowed).cloned().collect();
        if !invalid.is_empty() {
            return Err(DatasetError::InvalidFields {
                format: format.to_string(),
                invalid,
                allowed,
            });
        }

        Ok(())
    }
}

/// Header schemas per dataset format.
static FORMAT_SCHEMAS: LazyLock<HashMap<DatasetFormat, FormatSchema>> = LazyLock::new(|| {
    HashMap::from([(
        DatasetFormat::Experiment,
        FormatSchema {
            required: &["examples"],
            allowed: &["examples", "ground_truth"],
        },
    )])
});

/// Validate a fully written upload against the schema of `format`.
///
/// The file is parsed as CSV with a header row. Content that does not decode as
/// UTF-8 is reported as [`DatasetError::UnprocessableContent`]; a format with no
/// registered schema is an [`DatasetError::Internal`] error.
pub fn validate_format(path: &Path, format: DatasetFormat) -> Result<(), DatasetError> {
    let schema = format.schema().ok_or_else(|| {
        DatasetError::Internal(anyhow::anyhow!("Unknown dataset format: {}", format))
    })?;

    let file = File::open(path).map_err(|e| DatasetError::Internal(e.into()))?;
    let fields = read_header_fields(file)?;

    schema.check(format, &fields)
}

/// Read the header row of a CSV source and make sure the rest of it decodes.
fn read_header_fields<R: std::io::Read>(source: R) -> Result<BTreeSet<String>, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(source);

    let fields = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(|f| f.to_string())
        .collect();

    for record in reader.records() {
        record.map_err(csv_error)?;
    }

    Ok(fields)
}

fn csv_error(e: csv::Error) -> DatasetError {
    if matches!(e.kind(), csv::ErrorKind::Io(_)) {
        DatasetError::Internal(e.into())
    } else {
        tracing::info!(error = %e, "Error processing dataset upload");
        DatasetError::UnprocessableContent(e.into())
    }
}
