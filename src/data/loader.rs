//! CSV loader: one linear pass from the source file to a validated [`Dataset`].

use super::dataset::{Dataset, DatasetError};
use crate::domain::{synthetic_id, CustomerId, Step, Transaction, TransactionType};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Columns every source must provide.
pub const REQUIRED_COLUMNS: [&str; 11] = [
    "step",
    "type",
    "amount",
    "nameOrig",
    "oldbalanceOrg",
    "newbalanceOrig",
    "nameDest",
    "oldbalanceDest",
    "newbalanceDest",
    "isFraud",
    "isFlaggedFraud",
];

/// Optional explicit identifier column.
pub const ID_COLUMN: &str = "id";

/// Fatal load failures. Row numbers are zero-based data rows (the header is not counted).
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("missing required column '{0}'")]
    MissingColumn(String),
    #[error("row {row}: column '{column}' has invalid value '{value}': {reason}")]
    TypeMismatch {
        row: usize,
        column: &'static str,
        value: String,
        reason: String,
    },
    #[error("source contains no rows")]
    EmptySource,
    #[error("row {row}: duplicate transaction id '{id}'")]
    DuplicateId { row: usize, id: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Load the dataset from a CSV file. The file handle is dropped on every exit path.
pub fn load_path(path: impl AsRef<Path>) -> Result<Dataset, LoadError> {
    let file = File::open(path.as_ref())?;
    load_reader(BufReader::new(file))
}

/// Load the dataset from any CSV reader.
pub fn load_reader<R: Read>(reader: R) -> Result<Dataset, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = ColumnMap::from_headers(csv_reader.headers()?)?;
    let mut dataset = Dataset::default();
    let mut record = csv::StringRecord::new();
    let mut row = 0usize;

    while csv_reader.read_record(&mut record)? {
        let tx = columns.parse_row(row, &record)?;
        dataset.push(tx).map_err(|e| match e {
            DatasetError::DuplicateId(id) => LoadError::DuplicateId { row, id },
        })?;
        row += 1;
    }

    if dataset.is_empty() {
        return Err(LoadError::EmptySource);
    }

    tracing::debug!(rows = dataset.len(), "Parsed transaction source");
    Ok(dataset)
}

/// Header positions of the known columns.
struct ColumnMap {
    required: [usize; REQUIRED_COLUMNS.len()],
    id: Option<usize>,
}

impl ColumnMap {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, LoadError> {
        let position = |name: &str| headers.iter().position(|h| h == name);

        let mut required = [0usize; REQUIRED_COLUMNS.len()];
        for (slot, name) in required.iter_mut().zip(REQUIRED_COLUMNS) {
            *slot = position(name).ok_or_else(|| LoadError::MissingColumn(name.to_string()))?;
        }

        Ok(Self {
            required,
            id: position(ID_COLUMN),
        })
    }

    fn parse_row(&self, row: usize, record: &csv::StringRecord) -> Result<Transaction, LoadError> {
        let cell = Cells {
            row,
            record,
            columns: self,
        };

        let id = match self.id {
            Some(idx) => {
                let value = record.get(idx).unwrap_or_default();
                if value.is_empty() {
                    return Err(mismatch(row, ID_COLUMN, value, "empty value"));
                }
                value.to_string()
            }
            None => synthetic_id(row),
        };

        let amount = cell.float(2)?;
        if amount < 0.0 {
            return Err(mismatch(row, "amount", cell.raw(2), "must be non-negative"));
        }

        Ok(Transaction {
            id,
            step: Step::new(cell.parse::<u32>(0)?),
            tx_type: cell.parse::<TransactionType>(1)?,
            amount,
            origin_customer_id: CustomerId::new(cell.text(3)?),
            old_balance_origin: cell.float(4)?,
            new_balance_origin: cell.float(5)?,
            dest_customer_id: CustomerId::new(cell.text(6)?),
            old_balance_dest: cell.float(7)?,
            new_balance_dest: cell.float(8)?,
            is_fraud: cell.flag(9)?,
            is_flagged_fraud: cell.flag(10)?,
        })
    }
}

/// Typed accessors over one record, indexed by position in [`REQUIRED_COLUMNS`].
struct Cells<'a> {
    row: usize,
    record: &'a csv::StringRecord,
    columns: &'a ColumnMap,
}

impl Cells<'_> {
    fn raw(&self, col: usize) -> &str {
        self.record
            .get(self.columns.required[col])
            .unwrap_or_default()
    }

    fn text(&self, col: usize) -> Result<String, LoadError> {
        let value = self.raw(col);
        if value.is_empty() {
            return Err(mismatch(self.row, REQUIRED_COLUMNS[col], value, "empty value"));
        }
        Ok(value.to_string())
    }

    fn parse<T>(&self, col: usize) -> Result<T, LoadError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let value = self.raw(col);
        value
            .parse::<T>()
            .map_err(|e| mismatch(self.row, REQUIRED_COLUMNS[col], value, &e.to_string()))
    }

    fn float(&self, col: usize) -> Result<f64, LoadError> {
        let v = self.parse::<f64>(col)?;
        if !v.is_finite() {
            return Err(mismatch(self.row, REQUIRED_COLUMNS[col], self.raw(col), "must be finite"));
        }
        Ok(v)
    }

    fn flag(&self, col: usize) -> Result<bool, LoadError> {
        match self.raw(col) {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(mismatch(self.row, REQUIRED_COLUMNS[col], other, "expected 0 or 1")),
        }
    }
}

fn mismatch(row: usize, column: &'static str, value: &str, reason: &str) -> LoadError {
    LoadError::TypeMismatch {
        row,
        column,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
