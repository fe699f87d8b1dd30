//! File split and merge operations
//!
//! This module provides the high-level operations: splitting a file
//! into encrypted part files, and discovering, validating, decrypting
//! and reassembling those parts into the original file.
//!
//! A part file's binary format is:
//! - salt: 16 bytes (raw, not encoded)
//! - token: variable length authenticated-encryption output covering
//!   exactly one plaintext chunk

use crate::chunkcrypt;
use crate::error::{ErrorCategory, ErrorKind, PartboxError, Result};
use crate::keyderive::{self, SALT_LEN};
use crate::partname;
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use rand::RngCore;
use rand::rngs::OsRng;

/// Split a file into encrypted parts
///
/// Reads `input_path` sequentially in `chunk_size`-byte blocks (only one
/// block is held in memory at a time; the final block may be shorter) and
/// writes each block as `{base}_part{index}{ext}.enc` next to the input.
/// The source file is never modified or deleted. Empty input produces no
/// part files.
///
/// Part files are created with mode 0o600 (read/write for owner only) on
/// Unix systems. There is no rollback: parts written before an I/O failure
/// stay on disk.
///
/// Returns the created part paths in chunk order.
pub fn split_file(input_path: &Path, chunk_size: u64, secret: &[u8]) -> Result<Vec<PathBuf>> {
    if chunk_size == 0 {
        return Err(PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidParameter,
            "chunk size must be greater than zero",
        ));
    }
    if secret.is_empty() {
        return Err(PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidParameter,
            "base secret must not be empty",
        ));
    }

    let file_name = input_path.file_name().and_then(|n| n.to_str()).ok_or_else(|| {
        PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidParameter,
            format!(
                "input path {} has no usable file name",
                input_path.display()
            ),
        )
    })?;
    let (base, ext) = partname::split_extension(file_name);
    let dir = parent_dir(input_path);

    let file = fs::File::open(input_path).map_err(|e| read_error(input_path, e))?;
    let mut reader = io::BufReader::new(file);

    let mut part_paths = Vec::new();
    let mut chunk = Vec::new();
    let mut index: u64 = 1;

    loop {
        chunk.clear();
        let n = (&mut reader)
            .take(chunk_size)
            .read_to_end(&mut chunk)
            .map_err(|e| read_error(input_path, e))?;
        if n == 0 {
            break;
        }

        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let key = keyderive::derive(secret, index, &salt)
            .map_err(|e| e.with_context(format!("failed to derive key for chunk {}", index)))?;
        let token = chunkcrypt::encrypt(&key, &chunk)
            .map_err(|e| e.with_context(format!("failed to encrypt chunk {}", index)))?;

        let mut contents = Vec::with_capacity(SALT_LEN + token.len());
        contents.extend_from_slice(&salt);
        contents.extend_from_slice(&token);

        let part_path = dir.join(partname::format(base, ext, index));
        write_file_secure(&part_path, &contents)
            .map_err(|e| e.with_context(format!("failed to write {}", part_path.display())))?;

        part_paths.push(part_path);
        index += 1;
    }

    Ok(part_paths)
}

/// Merge encrypted parts back into the original file
///
/// `first_part_path` only anchors discovery: its *name* determines the
/// base and extension, and every part in the same directory matching
/// `{base}_part{index}{ext}.enc` is collected. The sequence must be the
/// contiguous range 1..=max_index; any gap fails with `MissingParts`
/// before anything is written or deleted.
///
/// Output is assembled in a temp file in the output directory and renamed
/// onto `output_path` only after every chunk decrypted, so a failed merge
/// never leaves a partial output file. Consumed parts are deleted only
/// after the rename succeeds.
pub fn merge_file(first_part_path: &Path, output_path: &Path, secret: &[u8]) -> Result<()> {
    if secret.is_empty() {
        return Err(PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::InvalidParameter,
            "base secret must not be empty",
        ));
    }

    let first_name = first_part_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            PartboxError::with_kind(
                ErrorCategory::User,
                ErrorKind::NameFormat,
                format!(
                    "part path {} has no usable file name",
                    first_part_path.display()
                ),
            )
        })?;
    let first = partname::parse(first_name)?;
    let dir = parent_dir(first_part_path);

    let parts = discover_parts(dir, &first.base, &first.ext)?;

    if parts.is_empty() {
        return Err(PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::MissingParts(vec![1]),
            format!(
                "no part files found for '{}{}' in {}",
                first.base,
                first.ext,
                dir.display()
            ),
        ));
    }

    let max_index = parts.keys().next_back().copied().unwrap_or(0);
    let missing: Vec<u64> = (1..=max_index).filter(|i| !parts.contains_key(i)).collect();
    if !missing.is_empty() {
        let listed = missing
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(PartboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::MissingParts(missing),
            format!("part sequence is incomplete; missing indices: {}", listed),
        ));
    }

    let out_dir = parent_dir(output_path);
    let mut temp_file = tempfile::NamedTempFile::new_in(out_dir).map_err(|e| {
        PartboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to create tempfile",
            e,
        )
    })?;

    // Ascending index order is load-bearing: output bytes are the
    // concatenation of chunks in this order and chunk boundaries are
    // not otherwise recorded.
    for (index, part_path) in &parts {
        let contents = fs::read(part_path).map_err(|e| read_error(part_path, e))?;
        if contents.len() < SALT_LEN {
            return Err(PartboxError::with_kind(
                ErrorCategory::User,
                ErrorKind::AuthenticationFailed,
                format!(
                    "{} truncated while reading salt",
                    part_path.display()
                ),
            ));
        }
        let (salt, token) = contents.split_at(SALT_LEN);

        let key = keyderive::derive(secret, *index, salt)
            .map_err(|e| e.with_context(format!("failed to derive key for part {}", index)))?;
        let plaintext = chunkcrypt::decrypt(&key, token)
            .map_err(|e| e.with_context(format!("failed to decrypt {}", part_path.display())))?;

        temp_file.write_all(&plaintext).map_err(|e| {
            PartboxError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to write to tempfile",
                e,
            )
        })?;
    }

    // Flush and fsync() such that the rename later, if it succeeds, will
    // always point to a valid file.
    temp_file.flush().map_err(|e| {
        PartboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to flush tempfile",
            e,
        )
    })?;
    temp_file.as_file().sync_all().map_err(|e| {
        PartboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to sync file prior to rename",
            e,
        )
    })?;

    // Atomically rename temp file to target (persist with restrictive permissions)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = temp_file
            .as_file()
            .metadata()
            .map_err(|e| {
                PartboxError::with_kind_and_source(
                    ErrorCategory::Internal,
                    ErrorKind::Io,
                    "failed to get tempfile metadata",
                    e,
                )
            })?
            .permissions();
        perms.set_mode(0o600);
        temp_file.as_file().set_permissions(perms).map_err(|e| {
            PartboxError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                "failed to set tempfile permissions",
                e,
            )
        })?;
    }
    temp_file.persist(output_path).map_err(|e| {
        PartboxError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            format!("failed to rename to target file {}", output_path.display()),
            e,
        )
    })?;

    // Destructive step last: every part was consumed successfully and the
    // output is durably in place.
    for part_path in parts.values() {
        fs::remove_file(part_path).map_err(|e| {
            PartboxError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to remove consumed part {}", part_path.display()),
                e,
            )
        })?;
    }

    Ok(())
}

/// Scan `dir` for part files matching `base` and `ext`, keyed by index.
///
/// Entries whose names are not valid UTF-8 or do not parse as part names
/// are skipped, not errors; the directory may contain anything.
fn discover_parts(dir: &Path, base: &str, ext: &str) -> Result<BTreeMap<u64, PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        PartboxError::with_kind_and_source(
            ErrorCategory::User,
            ErrorKind::Io,
            format!("failed to list directory {}", dir.display()),
            e,
        )
    })?;

    let mut parts = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            PartboxError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to read directory entry in {}", dir.display()),
                e,
            )
        })?;
        let name_os = entry.file_name();
        let Some(name) = name_os.to_str() else {
            continue;
        };
        let Ok(parsed) = partname::parse(name) else {
            continue;
        };
        if parsed.base == base && parsed.ext == ext {
            parts.insert(parsed.index, entry.path());
        }
    }

    Ok(parts)
}

/// The containing directory of `path`, with "." standing in for a bare
/// file name (read_dir("") fails).
fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    }
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| {
                PartboxError::with_kind_and_source(
                    ErrorCategory::User,
                    ErrorKind::Io,
                    format!("failed to open {}", path.display()),
                    e,
                )
            })?;

        file.write_all(contents).map_err(|e| {
            PartboxError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).map_err(|e| {
            PartboxError::with_kind_and_source(
                ErrorCategory::User,
                ErrorKind::Io,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }
}

fn read_error(path: &Path, err: io::Error) -> PartboxError {
    let category = if err.kind() == io::ErrorKind::NotFound {
        ErrorCategory::User
    } else {
        ErrorCategory::Internal
    };
    PartboxError::with_kind_and_source(
        category,
        ErrorKind::Io,
        format!("failed to read from {}", path.display()),
        err,
    )
}
