// 🏗️ CSV decoder for meter reading uploads
//
// Lenient on shape (column order, extra columns, short rows), strict on
// framing: anything the csv crate cannot decode, or an AccountId that is not
// an integer, is a StructuralParse error and ends the batch.

use crate::error::IngestError;
use crate::reading::RawReading;
use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter, Trim};
use std::io::Read;

const ACCOUNT_ID: &str = "AccountId";
const READING_DATE_TIME: &str = "MeterReadingDateTime";
const READ_VALUE: &str = "MeterReadValue";

/// Positions of the known columns in the upload's header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    account_id: Option<usize>,
    date_time: Option<usize>,
    value: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Self {
        let find = |name: &str| headers.iter().position(|h| h == name);
        Columns {
            account_id: find(ACCOUNT_ID),
            date_time: find(READING_DATE_TIME),
            value: find(READ_VALUE),
        }
    }
}

/// Lazy, single-pass sequence of decoded rows.
///
/// Yields `Err` at most once: after a structural error the iterator is fused.
pub struct ReadingDecoder<R> {
    columns: Columns,
    records: StringRecordsIntoIter<R>,
    failed: bool,
}

/// Start decoding an upload. Only the header row is read up front.
pub fn decode_readings<R: Read>(source: R) -> Result<ReadingDecoder<R>, IngestError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(source);

    let columns = Columns::locate(reader.headers()?);

    Ok(ReadingDecoder {
        columns,
        records: reader.into_records(),
        failed: false,
    })
}

impl<R: Read> ReadingDecoder<R> {
    fn decode(&self, record: &StringRecord) -> Result<RawReading, IngestError> {
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        // Absent columns and short rows read as empty text.
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");

        let account_text = match self.columns.account_id.and_then(|i| record.get(i)) {
            Some(text) => text,
            None => {
                return Err(IngestError::StructuralParse {
                    line,
                    message: format!("missing field `{}`", ACCOUNT_ID),
                })
            }
        };
        let account_id: i64 = account_text.parse().map_err(|e| IngestError::StructuralParse {
            line,
            message: format!("field `{}`: {:?} is not an integer ({})", ACCOUNT_ID, account_text, e),
        })?;

        Ok(RawReading::new(
            account_id,
            field(self.columns.date_time),
            field(self.columns.value),
        )
        .at_line(line))
    }
}

impl<R: Read> Iterator for ReadingDecoder<R> {
    type Item = Result<RawReading, IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let result = match self.records.next()? {
            Ok(record) => self.decode(&record),
            Err(err) => Err(IngestError::from(err)),
        };

        if result.is_err() {
            self.failed = true;
        }
        Some(result)
    }
}

// ============================================================================
// TESTS
// ============================================================================
