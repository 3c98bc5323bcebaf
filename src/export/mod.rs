//! CSV export of the records a run accepted.

use crate::models::Record;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use tracing::info;

const FIXED_COLUMNS: [&str; 3] = ["url", "page", "posted_age_days"];

/// Header: fixed columns, then every field name any record carries, sorted.
fn header(records: &[Record]) -> Vec<String> {
    let names: BTreeSet<&str> = records
        .iter()
        .flat_map(|r| r.fields.keys().map(String::as_str))
        .collect();
    FIXED_COLUMNS
        .iter()
        .copied()
        .chain(names)
        .map(str::to_string)
        .collect()
}

pub fn write_records<W: Write>(out: W, records: &[Record]) -> Result<()> {
    let columns = header(records);
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&columns)?;

    for record in records {
        let mut row = vec![
            record.url.clone(),
            record.page.to_string(),
            record.posted_age_days.map(|d| d.to_string()).unwrap_or_default(),
        ];
        row.extend(
            columns[FIXED_COLUMNS.len()..]
                .iter()
                .map(|name| record.get(name).unwrap_or_default().to_string()),
        );
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_csv(path: &Path, records: &[Record]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create dir {:?}", parent))?;
    }
    let file = std::fs::File::create(path)
        .with_context(|| format!("Could not create {:?}", path))?;
    write_records(file, records)?;
    info!("Wrote {} records to {:?}", records.len(), path);
    Ok(())
}
