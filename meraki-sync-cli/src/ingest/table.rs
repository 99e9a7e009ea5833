use anyhow::{Context, Result};
use log::debug;
use std::collections::BTreeMap;
use std::io::Read;

use super::{Ingested, IngestOptions, RawRow, build_record};
use crate::api::discovery::DeviceDirectory;
use crate::sync::value::FieldValue;

const BOM: char = '\u{feff}';

/// Trim surrounding whitespace and any byte order mark
fn normalize_header(header: &str) -> String {
    header.trim().trim_start_matches(BOM).trim().to_string()
}

/// Parse CSV rows into records. Row numbers start at 2, the header being row 1.
pub fn read_csv<R: Read>(
    mut reader: R,
    options: &IngestOptions,
    directory: Option<&DeviceDirectory>,
) -> Result<Ingested> {
    let mut text = String::new();
    reader
        .read_to_string(&mut text)
        .context("Input is not valid UTF-8")?;
    let text = text.strip_prefix(BOM).unwrap_or(&text);

    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = csv_reader
        .headers()
        .context("Failed to read CSV header")?
        .iter()
        .map(normalize_header)
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        anyhow::bail!("CSV appears to have no headers");
    }

    let find = |name: &str| headers.iter().position(|h| h == name);
    let id_idx = find(&options.id_column);
    if id_idx.is_none() && options.target.is_none() {
        anyhow::bail!(
            "Missing expected column '{}'. Found columns: {:?}",
            options.id_column,
            headers
        );
    }
    let sub_idx = if options.kind.is_composite() {
        find(&options.sub_id_column)
    } else {
        None
    };
    if options.kind.is_composite() && sub_idx.is_none() && options.target.is_some() {
        anyhow::bail!(
            "Missing expected column '{}' (needed with --target). Found columns: {:?}",
            options.sub_id_column,
            headers
        );
    }
    debug!("CSV columns: {:?}", headers);

    let mut ingested = Vec::new();
    for (index, result) in csv_reader.records().enumerate() {
        let source_row = index + 2;
        let record = result.with_context(|| format!("Malformed CSV at row {}", source_row))?;

        let cell = |idx: Option<usize>| idx.map(|i| record.get(i).unwrap_or("").to_string());

        let mut fields = BTreeMap::new();
        for (i, header) in headers.iter().enumerate() {
            if header.is_empty() || options.is_identifier_column(header) {
                continue;
            }
            let field = options.column_map.rename(header);
            let raw = record.get(i).unwrap_or("");
            fields.insert(field.to_string(), FieldValue::from_cell(field, raw));
        }

        ingested.push(build_record(
            options,
            directory,
            RawRow {
                source_row,
                id: cell(id_idx),
                sub_id: cell(sub_idx),
                fields,
            },
        ));
    }

    Ok(ingested)
}
