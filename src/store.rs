use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use tracing::info;

use crate::normalize::{DrawRecord, SCORE_RANGES};
use crate::{Error, Result};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// What an upsert ended up doing to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The store didn't exist yet and was created with this record.
    Created,
    Appended,
    Updated,
}

impl fmt::Display for Upsert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upsert::Created => f.write_str("created"),
            Upsert::Appended => f.write_str("appended"),
            Upsert::Updated => f.write_str("updated"),
        }
    }
}

/// Date keyed store of draw records.
pub trait DrawStore {
    /// Whether the most recently written record is for `date`.
    fn exists(&self, date: NaiveDate) -> Result<bool>;
    fn get(&self, date: NaiveDate) -> Result<Option<DrawRecord>>;
    fn upsert(&self, record: &DrawRecord) -> Result<Upsert>;
}

/// `DrawStore` over a plain, append only CSV file: a header line followed by one
/// `date,counts..,total` line per day, in the order they were written.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn rewrite(&self, text: &str, record: &DrawRecord) -> Result<()> {
        let key = record.date().format(DATE_FORMAT).to_string();
        let replacement = encode_record(record)?;
        let replacement = replacement.trim_end_matches('\n');

        // Splitting on '\n' keeps a trailing empty piece, so joining restores the file byte for byte.
        let updated = text
            .split('\n')
            .map(|line| if leading_field(line) == key { replacement } else { line })
            .collect::<Vec<_>>()
            .join("\n");
        fs::write(&self.path, updated)?;
        Ok(())
    }

    fn append(&self, text: &str, record: &DrawRecord) -> Result<()> {
        let mut line = encode_record(record)?;
        if !text.is_empty() && !text.ends_with('\n') {
            line.insert(0, '\n');
        }
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    fn create(&self, record: &DrawRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut contents = encode_header()?;
        contents.push_str(&encode_record(record)?);
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl DrawStore for CsvStore {
    /// Only the last line is looked at: a run for today that already wrote will be the latest line.
    fn exists(&self, date: NaiveDate) -> Result<bool> {
        Ok(self
            .read()?
            .is_some_and(|text| last_line_is(&text, date)))
    }

    fn get(&self, date: NaiveDate) -> Result<Option<DrawRecord>> {
        let Some(text) = self.read()? else {
            return Ok(None);
        };
        let key = date.format(DATE_FORMAT).to_string();
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut found = None;
        for record in reader.records() {
            let record = record?;
            if record.get(0) == Some(key.as_str()) {
                found = Some(record);
            }
        }
        found.map(|record| decode_record(date, &record)).transpose()
    }

    fn upsert(&self, record: &DrawRecord) -> Result<Upsert> {
        let Some(text) = self.read()? else {
            self.create(record)?;
            info!(path = %self.path.display(), "header written to CSV");
            info!(date = %record.date(), total = record.total(), "data saved to CSV file");
            return Ok(Upsert::Created);
        };

        if last_line_is(&text, record.date()) {
            self.rewrite(&text, record)?;
            info!(date = %record.date(), total = record.total(), "data updated successfully");
            Ok(Upsert::Updated)
        } else {
            self.append(&text, record)?;
            info!(date = %record.date(), total = record.total(), "data saved to CSV file");
            Ok(Upsert::Appended)
        }
    }
}

fn last_line_is(text: &str, date: NaiveDate) -> bool {
    let last_line = text.lines().last().unwrap_or_default();
    leading_field(last_line) == date.format(DATE_FORMAT).to_string()
}

#[inline]
fn leading_field(line: &str) -> &str {
    line.split(',').next().unwrap_or_default()
}

fn encode_line<I, T>(fields: I) -> Result<String>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut writer = WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(vec![]);
    writer.write_record(fields)?;
    let data = writer.into_inner()?;
    Ok(String::from_utf8_lossy(&data).into_owned())
}

fn encode_header() -> Result<String> {
    encode_line(
        std::iter::once("Date")
            .chain(SCORE_RANGES)
            .chain(std::iter::once("Total")),
    )
}

fn encode_record(record: &DrawRecord) -> Result<String> {
    encode_line(
        std::iter::once(record.date().format(DATE_FORMAT).to_string())
            .chain(record.counts().iter().map(u32::to_string))
            .chain(std::iter::once(record.total().to_string())),
    )
}

fn decode_record(date: NaiveDate, record: &StringRecord) -> Result<DrawRecord> {
    let malformed = |reason: String| Error::MalformedRecord {
        date: date.to_string(),
        reason,
    };
    // date + buckets + total
    if record.len() != SCORE_RANGES.len() + 2 {
        return Err(malformed(format!("expected {} fields, found {}", SCORE_RANGES.len() + 2, record.len())));
    }

    let mut counts = [0u32; SCORE_RANGES.len()];
    for (slot, field) in counts.iter_mut().zip(record.iter().skip(1)) {
        *slot = field
            .trim()
            .parse()
            .map_err(|_| malformed(format!("'{field}' is not a count")))?;
    }
    let decoded = DrawRecord::new(date, counts);
    let stored_total = record.get(SCORE_RANGES.len() + 1).unwrap_or_default().trim();
    if stored_total != decoded.total().to_string() {
        return Err(malformed(format!("total '{stored_total}' doesn't match the bucket sum")));
    }
    Ok(decoded)
}
