//! File readers and parsers for the kernel's text formats.

use std::fs;
use std::io;
use std::path::Path;

use crate::error::{IntListError, SysfsError};

/// Parses a kernel integer list like `"0-7,16-23"`.
///
/// An empty string is an empty list. Entries keep the order in which they
/// are listed.
///
/// # Errors
///
/// Returns [`IntListError`] for empty entries, non-numeric values and
/// descending ranges.
pub fn parse_int_list(s: &str) -> Result<Vec<usize>, IntListError> {
    let s = s.trim();
    let fail = |reason: String| IntListError {
        input: s.to_string(),
        reason,
    };
    let number = |part: &str| {
        part.trim()
            .parse::<usize>()
            .map_err(|_| fail(format!("'{}' is not a number", part.trim())))
    };

    let mut values = Vec::new();
    if s.is_empty() {
        return Ok(values);
    }
    for part in s.split(',') {
        if part.trim().is_empty() {
            return Err(fail("empty entry".to_string()));
        }
        if let Some((start, end)) = part.split_once('-') {
            let (start, end) = (number(start)?, number(end)?);
            if start > end {
                return Err(fail(format!("range {start}-{end} is descending")));
            }
            values.extend(start..=end);
        } else {
            values.push(number(part)?);
        }
    }
    Ok(values)
}

/// Reads a file and trims surrounding whitespace.
pub(crate) fn read_trimmed(path: &Path) -> Result<String, SysfsError> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| SysfsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Like [`read_trimmed`], but a missing file is `None`.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>, SysfsError> {
    match fs::read_to_string(path) {
        Ok(s) => Ok(Some(s.trim().to_string())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SysfsError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Parses the contents of `path` as an integer list.
pub(crate) fn parse_list_file(path: &Path, contents: &str) -> Result<Vec<usize>, SysfsError> {
    parse_int_list(contents).map_err(|err| SysfsError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

/// Reads an integer list file.
pub(crate) fn read_int_list(path: &Path) -> Result<Vec<usize>, SysfsError> {
    parse_list_file(path, &read_trimmed(path)?)
}

/// Reads a file holding a single unsigned integer.
pub(crate) fn read_number(path: &Path) -> Result<u64, SysfsError> {
    let contents = read_trimmed(path)?;
    contents.parse().map_err(|_| SysfsError::Parse {
        path: path.to_path_buf(),
        message: format!("'{contents}' is not a number"),
    })
}

/// Lists the memory banks a directory has `nodeN` entries for, ascending.
///
/// Works for `devices/system/node` (all banks) as well as for a
/// `devices/system/cpu/cpuN` directory (the bank local to that core).
pub(crate) fn memory_banks_listed_in(dir: &Path) -> Result<Vec<usize>, SysfsError> {
    let io_err = |source: io::Error| SysfsError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut banks = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name();
        if let Some(id) = name
            .to_str()
            .and_then(|n| n.strip_prefix("node"))
            .and_then(|id| id.parse::<usize>().ok())
        {
            banks.push(id);
        }
    }
    banks.sort_unstable();
    Ok(banks)
}

/// Extracts `MemTotal` from a node `meminfo` file, in bytes.
///
/// The kernel reports KiB but labels them `kB`.
pub(crate) fn parse_mem_total(path: &Path, contents: &str) -> Result<u64, SysfsError> {
    let fail = |message: String| SysfsError::Parse {
        path: path.to_path_buf(),
        message,
    };
    let line = contents
        .lines()
        .find(|line| line.contains("MemTotal"))
        .ok_or_else(|| fail("failed to read total memory".to_string()))?;
    let size = line
        .split_once(':')
        .map(|(_, size)| size.trim())
        .ok_or_else(|| fail(format!("'{line}' has no value")))?;
    let kib = size
        .strip_suffix(" kB")
        .and_then(|kib| kib.trim().parse::<u64>().ok())
        .ok_or_else(|| fail(format!("\"{size}\" is not a memory size")))?;
    Ok(kib.saturating_mul(1024))
}
