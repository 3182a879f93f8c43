use chrono::NaiveDate;

use crate::parse::RawRow;

/// Score range buckets, lowest first. This is also the column order of `data.csv`.
pub const SCORE_RANGES: [&str; 15] = [
    "0-300", "301-350", "351-400", "401-410", "411-420", "421-430", "431-440", "441-450",
    "451-460", "461-470", "471-480", "481-490", "491-500", "501-600", "601-1200",
];

/// One day of the distribution, already mapped onto [`SCORE_RANGES`].
/// Bucket counts are `u32` and the total `u64`, so summing fifteen buckets can't overflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawRecord {
    date: NaiveDate,
    counts: [u32; SCORE_RANGES.len()],
    total: u64,
}

impl DrawRecord {
    pub fn new(date: NaiveDate, counts: [u32; SCORE_RANGES.len()]) -> Self {
        Self {
            date,
            counts,
            total: counts.iter().map(|&c| u64::from(c)).sum(),
        }
    }

    /// Looks every bucket up in `rows`, first match wins. Missing buckets count as zero and
    /// labels that aren't a bucket are dropped.
    pub fn from_rows(date: NaiveDate, rows: &[RawRow]) -> Self {
        let counts = SCORE_RANGES.map(|range| {
            rows.iter()
                .find(|row| row.score_range == range)
                .map_or(0, |row| row.num_candidates)
        });
        Self::new(date, counts)
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn counts(&self) -> &[u32; SCORE_RANGES.len()] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn count_for(&self, range: &str) -> Option<u32> {
        SCORE_RANGES
            .iter()
            .position(|r| *r == range)
            .map(|idx| self.counts[idx])
    }
}
