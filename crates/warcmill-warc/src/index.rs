//! Offset Index Sidecars
//!
//! An input named `<stem>.warc.<ext>` may come with a sidecar `<stem>.txt`
//! listing one decimal byte offset per line. Offsets index the raw
//! compressed stream and mark member starts, so resynchronization can jump
//! instead of scanning. A missing or unreadable sidecar only costs the
//! jump targets; it is never fatal.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Derive the sidecar path for an input, if its name has the
/// `<stem>.warc.<ext>` shape.
pub fn sidecar_path(input: &Path) -> Option<PathBuf> {
    let name = input.file_name()?.to_str()?;
    let pos = name.rfind(".warc.")?;
    if pos == 0 {
        return None;
    }
    Some(input.with_file_name(format!("{}.txt", &name[..pos])))
}

/// Load one decimal offset per line. Blank lines are ignored; anything else
/// that does not parse makes the whole sidecar unusable.
pub fn load_offsets(path: &Path) -> io::Result<Vec<u64>> {
    let reader = BufReader::new(File::open(path)?);
    let mut offsets = Vec::new();
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let offset = trimmed.parse::<u64>().map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad offset line `{trimmed}` in {}", path.display()),
            )
        })?;
        offsets.push(offset);
    }
    Ok(offsets)
}
