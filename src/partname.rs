//! Part file naming contract
//!
//! Maps (base, ext, index) to a part file name and back:
//!
//!   {base}_part{index}{ext}.enc
//!
//! where `ext` retains the leading dot of the original file's extension
//! and may be empty. Parsing is the strict inverse of formatting and
//! rejects anything else; indices are compared numerically, never
//! lexically, so `part2` sorts before `part10`.

use crate::error::{ErrorCategory, ErrorKind, PartboxError, Result};

/// Marker separating the base name from the chunk index.
const PART_MARKER: &str = "_part";

/// Suffix carried by every part file.
const ENC_SUFFIX: &str = ".enc";

/// A parsed part file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartName {
    /// Original file name up to (not including) the extension.
    pub base: String,
    /// Original extension including its leading dot; empty if none.
    pub ext: String,
    /// 1-based chunk index.
    pub index: u64,
}

/// Format a part file name for chunk `index` of `{base}{ext}`.
pub fn format(base: &str, ext: &str, index: u64) -> String {
    format!("{}{}{}{}{}", base, PART_MARKER, index, ext, ENC_SUFFIX)
}

/// Parse a part file name, rejecting anything that `format` could not
/// have produced.
///
/// The index marker is anchored on the *last* `_part` occurrence so
/// base names that themselves contain `_part` round-trip correctly.
pub fn parse(file_name: &str) -> Result<PartName> {
    let stem = file_name.strip_suffix(ENC_SUFFIX).ok_or_else(|| {
        PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::NameFormat,
            format!("'{}' does not end in {}", file_name, ENC_SUFFIX),
        )
    })?;

    let marker_at = stem.rfind(PART_MARKER).ok_or_else(|| {
        PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::NameFormat,
            format!("'{}' has no {} marker", file_name, PART_MARKER),
        )
    })?;

    let base = &stem[..marker_at];
    let after_marker = &stem[marker_at + PART_MARKER.len()..];

    let digits_len = after_marker
        .bytes()
        .take_while(|b| b.is_ascii_digit())
        .count();
    let (digits, ext) = after_marker.split_at(digits_len);

    if digits.is_empty() {
        return Err(PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::NameFormat,
            format!("'{}' has no chunk index after {}", file_name, PART_MARKER),
        ));
    }

    // Formatting never emits leading zeros; accepting them would make
    // two distinct names map to the same (base, ext, index).
    if digits.len() > 1 && digits.starts_with('0') {
        return Err(PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::NameFormat,
            format!("'{}' has a zero-padded chunk index", file_name),
        ));
    }

    let index: u64 = digits.parse().map_err(|_| {
        PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::NameFormat,
            format!("'{}' has an out-of-range chunk index", file_name),
        )
    })?;

    if index == 0 {
        return Err(PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::NameFormat,
            format!("'{}' has chunk index 0; indices are 1-based", file_name),
        ));
    }

    if !ext.is_empty() && !ext.starts_with('.') {
        return Err(PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::NameFormat,
            format!("'{}' has trailing data after the chunk index", file_name),
        ));
    }

    Ok(PartName {
        base: base.to_string(),
        ext: ext.to_string(),
        index,
    })
}

/// Split a file name into (base, extension-with-dot).
///
/// The last dot wins ("archive.tar.gz" -> ("archive.tar", ".gz")); a
/// dot-file with no further dot has no extension (".bashrc" ->
/// (".bashrc", "")).
pub fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rfind('.') {
        Some(pos) if file_name[..pos].bytes().any(|b| b != b'.') => file_name.split_at(pos),
        _ => (file_name, ""),
    }
}
