// 📥 CSV import - bulk member registration
//
// Headers: id_number, first_name, last_name, email, cellphone
// Optional: status, member_number
//
// Every row goes through the registry, so it gets the same validation,
// birth-date derivation and member-number assignment as a form submission.
// Bad rows are collected, not fatal.

use crate::config::Config;
use crate::member::MemberInput;
use crate::registry::MemberRegistry;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use std::io::Read;
use std::path::Path;

pub const IMPORT_ACTOR: &str = "csv_importer";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// 1-based line in the file (header is line 1)
    pub line: u64,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub rejected: Vec<RejectedRow>,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.rejected.len()
    }
}

pub fn import_members(
    conn: &Connection,
    csv_path: &Path,
    today: NaiveDate,
    config: &Config,
) -> Result<ImportSummary> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open CSV file {}", csv_path.display()))?;

    import_members_from_reader(conn, file, today, config)
}

pub fn import_members_from_reader<Rd: Read>(
    conn: &Connection,
    reader: Rd,
    today: NaiveDate,
    config: &Config,
) -> Result<ImportSummary> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);
    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();

    let mut registry = MemberRegistry::from_config(conn, config).actor(IMPORT_ACTOR);
    let mut summary = ImportSummary::default();

    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                let line = err.position().map(|p| p.line()).unwrap_or(0);
                reject(&mut summary, line, format!("unreadable row: {}", err));
                continue;
            }
        };
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let input: MemberInput = match record.deserialize(Some(&headers)) {
            Ok(input) => input,
            Err(err) => {
                reject(&mut summary, line, format!("unreadable row: {}", err));
                continue;
            }
        };

        match registry.register(&input, today) {
            Ok(_) => summary.inserted += 1,
            Err(err) if err.is_user_error() => reject(&mut summary, line, err.to_string()),
            Err(err) => {
                return Err(err).with_context(|| format!("Failed to import row on line {}", line))
            }
        }
    }

    tracing::info!(
        inserted = summary.inserted,
        rejected = summary.rejected.len(),
        "CSV import finished"
    );
    Ok(summary)
}

fn reject(summary: &mut ImportSummary, line: u64, reason: String) {
    tracing::warn!(line, %reason, "rejected CSV row");
    summary.rejected.push(RejectedRow { line, reason });
}
