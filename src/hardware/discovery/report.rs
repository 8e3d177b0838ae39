//! esxcli Report Parsing
//!
//! `esxcli` prints two kinds of reports. Record reports start each record at
//! an unindented line and list `Key: Value` fields beneath it, indented:
//!
//! ```text
//! t10.NVMe____SAMSUNG_MZQL21T9HCJR2D00007______________S64GNA0T123456
//!    Display Name: Local NVMe Disk (t10.NVMe____SAMSUNG...)
//!    Size: 1831420
//!    Other Names:
//!       vml.0100000000533634474e41305431323334353620202020
//! ```
//!
//! Table reports have a header row, a row of dashes, then one row per item.

/// One line of a record, with its indentation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine<'a> {
    pub indent: usize,
    pub text: &'a str,
}

/// A record from a record report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord<'a> {
    /// The unindented line that starts the record
    pub name: &'a str,
    /// Every indented line below it
    pub lines: Vec<ReportLine<'a>>,
}

impl<'a> ReportRecord<'a> {
    /// Value of the first `key: value` line with exactly this key
    pub fn field(&self, key: &str) -> Option<&'a str> {
        self.lines
            .iter()
            .find_map(|line| split_field(line.text).filter(|(k, _)| *k == key))
            .map(|(_, value)| value)
    }

    /// Values listed under a field: its same-line value, if any, followed by
    /// every deeper-indented line beneath it
    pub fn field_block(&self, key: &str) -> Vec<&'a str> {
        let Some(pos) = self
            .lines
            .iter()
            .position(|line| split_field(line.text).is_some_and(|(k, _)| k == key))
        else {
            return Vec::new();
        };

        let header = &self.lines[pos];
        let mut values = Vec::new();
        if let Some((_, value)) = split_field(header.text) {
            if !value.is_empty() {
                values.push(value);
            }
        }

        values.extend(
            self.lines[pos + 1..]
                .iter()
                .take_while(|line| line.indent > header.indent)
                .map(|line| line.text),
        );
        values
    }
}

/// Split `key: value` on the first colon
fn split_field(text: &str) -> Option<(&str, &str)> {
    let (key, value) = text.split_once(':')?;
    Some((key.trim(), value.trim()))
}

/// Split a record report into records. Lines before the first record are
/// ignored.
pub fn parse_records(text: &str) -> Vec<ReportRecord<'_>> {
    let mut records: Vec<ReportRecord<'_>> = Vec::new();

    for raw in text.lines() {
        if raw.trim().is_empty() {
            continue;
        }

        let indent = raw.len() - raw.trim_start().len();
        if indent == 0 {
            records.push(ReportRecord {
                name: raw.trim_end(),
                lines: Vec::new(),
            });
        } else if let Some(current) = records.last_mut() {
            current.lines.push(ReportLine {
                indent,
                text: raw.trim(),
            });
        }
    }

    records
}

/// Rows of a table report, split on whitespace. Everything up to and
/// including the dashed separator row is skipped.
pub fn parse_table(text: &str) -> Vec<Vec<&str>> {
    let mut lines = text.lines().skip_while(|line| !is_separator(line));
    // separator row itself
    lines.next();

    lines
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split_whitespace().collect())
        .collect()
}

fn is_separator(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.chars().all(|c| c == '-' || c.is_whitespace())
}
