//! Newline-delimited JSON output and repository list input.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::record::ChangeRecord;
use crate::Result;

/// Append one repository's records to `writer` with a single write.
///
/// The batch is serialized up front so concurrent producers funnelled through
/// one writer never interleave records of different repositories.
pub fn append_batch<W: Write + ?Sized>(writer: &mut W, records: &[ChangeRecord]) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }

    let mut buffer = Vec::with_capacity(records.len() * 256);
    for record in records {
        serde_json::to_writer(&mut buffer, record)?;
        buffer.push(b'\n');
    }

    writer.write_all(&buffer)?;
    writer.flush()?;
    Ok(())
}

/// Read records back, skipping blank and malformed lines
pub fn read_records<R: BufRead>(reader: R) -> Result<Vec<ChangeRecord>> {
    let mut records = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<ChangeRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("Skipping malformed record on line {}: {}", index + 1, e),
        }
    }

    Ok(records)
}

/// Load a repository list: one identifier per line, blank lines and `#`
/// comments ignored. Repeated entries are kept.
pub fn read_repository_list<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let reader = BufReader::new(File::open(path)?);
    let mut repositories = Vec::new();

    for line in reader.lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        repositories.push(line.to_string());
    }

    Ok(repositories)
}

/// The `n` most frequent entries, ties broken by first appearance
pub fn top_repositories(repositories: &[String], n: usize) -> Vec<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, repository) in repositories.iter().enumerate() {
        counts.entry(repository.as_str()).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(repository, (count, first))| (repository, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    ranked
        .into_iter()
        .take(n)
        .map(|(repository, _, _)| repository.to_string())
        .collect()
}
