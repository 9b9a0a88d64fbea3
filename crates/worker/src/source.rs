//! Decoding uploaded CSV sources into header-keyed rows.

use sheetport_core::error::CoreError;
use sheetport_core::imports::template_file::is_template_marker_row;
use sheetport_core::imports::transform::row_from_cells;
use sheetport_core::types::JsonRecord;

/// A decoded source file. Row `i` is data row number `i + 1`.
#[derive(Debug, Clone, Default)]
pub struct SourceRows {
    pub headers: Vec<String>,
    pub rows: Vec<JsonRecord>,
}

/// Parse CSV bytes. The first record is the header row; template
/// description/example rows and fully blank rows are dropped.
pub fn parse_csv(bytes: &[u8]) -> Result<SourceRows, CoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(invalid_csv)?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches('\u{feff}').to_string()
            } else {
                h.to_string()
            }
        })
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(CoreError::Validation("Source file has no header row".into()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(invalid_csv)?;
        let cells: Vec<String> = record.iter().map(str::to_string).collect();
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        if cells.first().is_some_and(|c| is_template_marker_row(c)) {
            continue;
        }
        rows.push(row_from_cells(&headers, &cells));
    }

    Ok(SourceRows { headers, rows })
}

fn invalid_csv(err: csv::Error) -> CoreError {
    CoreError::Validation(format!("Source file is not valid CSV: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn header_row_keys_each_record() {
        let parsed = parse_csv(b"Full Name,Email\nAda,ada@club.test\nGrace,grace@club.test\n").unwrap();
        assert_eq!(parsed.headers, vec!["Full Name", "Email"]);
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.rows[1]["Email"], "grace@club.test");
    }

    #[test]
    fn marker_and_blank_rows_are_skipped() {
        let csv = "\u{feff}Full Name,Email\n\
                   __DESCRIPTION__ | __SHEETPORT_TEMPLATE__ Required,Email address\n\
                   __EXAMPLE__ Jane Doe,jane@example.com\n\
                   ,\n\
                   Ada,ada@club.test\n";
        let parsed = parse_csv(csv.as_bytes()).unwrap();
        assert_eq!(parsed.headers[0], "Full Name");
        assert_eq!(parsed.rows.len(), 1);
        assert_eq!(parsed.rows[0]["Full Name"], "Ada");
    }

    #[test]
    fn short_records_are_padded() {
        let parsed = parse_csv(b"a,b,c\n1\n").unwrap();
        assert_eq!(parsed.rows[0]["c"], "");
    }

    #[test]
    fn empty_file_is_rejected() {
        assert_matches!(parse_csv(b""), Err(CoreError::Validation(_)));
    }
}
