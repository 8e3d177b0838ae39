//! Serial Number Extraction
//!
//! ESXi device identifiers embed the drive serial in vendor-specific ways.
//! The structured form is `<prefix>__<model>__<serial>` where each separator
//! is a run of two or more underscores and the model may itself contain
//! single (or doubled) underscores:
//!
//! ```text
//! t10.ATA_____INTEL_SSDSC2KB480G8__________________PHYF9999999A480BGN__
//! ^prefix     ^model                               ^serial
//! ```
//!
//! Alias identifiers that do not fit that shape are tried against two
//! fallback forms in order: a serial after a run of two or more underscores,
//! then a serial after a single underscore (Dell-style NVMe names).

use serde::Serialize;

/// The three segments of a structured device identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StructuredIdentifier<'a> {
    pub prefix: &'a str,
    pub model: &'a str,
    pub serial: &'a str,
}

/// Extract the canonical serial from a device identifier.
///
/// Returns `None` when neither the structured form nor a fallback form
/// matches.
pub fn extract_serial(identifier: &str) -> Option<String> {
    if let Some(parsed) = parse_structured(identifier) {
        return Some(parsed.serial.to_string());
    }
    extract_fallback_serial(identifier)
}

/// Split a structured identifier into prefix, model and serial.
///
/// The model runs up to the last run of two or more underscores and the
/// serial is everything after it, minus trailing underscores.
pub fn parse_structured(identifier: &str) -> Option<StructuredIdentifier<'_>> {
    let trimmed = identifier.trim().trim_end_matches('_');
    let runs = separator_runs(trimmed);
    if runs.len() < 2 {
        return None;
    }

    let (first_start, first_end) = runs[0];
    let (last_start, last_end) = runs[runs.len() - 1];

    let prefix = &trimmed[..first_start];
    let model = &trimmed[first_end..last_start];
    let serial = &trimmed[last_end..];
    if prefix.is_empty() || model.is_empty() || serial.is_empty() {
        return None;
    }

    Some(StructuredIdentifier {
        prefix,
        model,
        serial,
    })
}

/// Serial from an identifier outside the structured form
pub fn extract_fallback_serial(identifier: &str) -> Option<String> {
    let trimmed = identifier.trim().trim_end_matches('_');

    // <anything>__<alnum>
    if let Some(&(_, end)) = separator_runs(trimmed).last() {
        let tail = &trimmed[end..];
        if is_serial_token(tail) {
            return Some(tail.to_string());
        }
    }

    // <anything>_<alnum>
    let (_, tail) = trimmed.rsplit_once('_')?;
    if is_serial_token(tail) {
        return Some(tail.to_string());
    }

    None
}

/// Identifier inside a display name such as `Local NVMe Disk (t10.NVMe____...)`
pub fn identifier_in_display_name(display_name: &str) -> Option<&str> {
    let open = display_name.rfind('(')?;
    let close = display_name[open..].find(')')? + open;
    let inner = display_name[open + 1..close].trim();
    (!inner.is_empty()).then_some(inner)
}

/// Byte ranges of every run of two or more underscores
fn separator_runs(s: &str) -> Vec<(usize, usize)> {
    let bytes = s.as_bytes();
    let mut runs = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'_' {
            let start = i;
            while i < bytes.len() && bytes[i] == b'_' {
                i += 1;
            }
            if i - start >= 2 {
                runs.push((start, i));
            }
        } else {
            i += 1;
        }
    }

    runs
}

fn is_serial_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric())
}
