// ─── Version Comparator ───
// Dotted numeric versions ("1.2", "1.2.0.5"), compared segment by segment.

use std::cmp::Ordering;

use crate::core::error::{CatalogError, CatalogResult};

/// Split a dotted version into numeric segments with leading zeros dropped.
///
/// Segments stay digit strings so build numbers wider than any integer type
/// still compare. The empty string counts as a single `0` segment so that an
/// asset without a version sorts below every real release.
fn segments(version: &str) -> CatalogResult<Vec<&str>> {
    if version.is_empty() {
        return Ok(vec!["0"]);
    }

    version
        .split('.')
        .map(|part| {
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(CatalogError::InvalidVersion(version.to_string()));
            }
            let trimmed = part.trim_start_matches('0');
            Ok(if trimmed.is_empty() { "0" } else { trimmed })
        })
        .collect()
}

/// Numeric order of two zero-trimmed digit strings.
fn compare_segment(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Compare two dotted versions.
///
/// The shorter side is padded with trailing zeros, so `"1.2"` equals
/// `"1.2.0"`. A non-numeric segment is a configuration error.
pub fn compare_versions(a: &str, b: &str) -> CatalogResult<Ordering> {
    let a = segments(a)?;
    let b = segments(b)?;
    let len = a.len().max(b.len());

    for i in 0..len {
        let left = a.get(i).copied().unwrap_or("0");
        let right = b.get(i).copied().unwrap_or("0");
        match compare_segment(left, right) {
            Ordering::Equal => continue,
            other => return Ok(other),
        }
    }

    Ok(Ordering::Equal)
}
