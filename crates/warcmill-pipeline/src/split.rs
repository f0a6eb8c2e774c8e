//! Rolling Byte-Bounded Output
//!
//! `SplitFileStream` writes to a sequence of numbered files, moving to the
//! next file *before* any write that would push the current one past the
//! byte limit. Records are handed to it whole, so a record is never split
//! across two files; a file only exceeds the limit when a single record is
//! bigger than the limit by itself.
//!
//! File names come from a template where the last run of `X` characters is
//! replaced by a zero-padded decimal index: `out-XXX` names `out-000`,
//! `out-001`, and so on.

use std::fs::File;
use std::io::{self, BufWriter, Write};

use warcmill_core::{Error, Result};

/// File name template with an `X`-run placeholder
#[derive(Debug, Clone)]
pub struct NameTemplate {
    prefix: String,
    suffix: String,
    width: usize,
}

impl NameTemplate {
    /// Parse a template. The placeholder is the last run of consecutive
    /// `X` characters; a template without any `X` is an error.
    pub fn parse(template: &str) -> Result<Self> {
        let end = template.rfind('X').ok_or_else(|| {
            Error::Template(format!("no X placeholder characters in `{template}`"))
        })?;
        let mut start = end;
        while start > 0 && template.as_bytes()[start - 1] == b'X' {
            start -= 1;
        }
        Ok(Self {
            prefix: template[..start].to_string(),
            suffix: template[end + 1..].to_string(),
            width: end - start + 1,
        })
    }

    /// True if `template` contains a placeholder at all.
    pub fn has_placeholder(template: &str) -> bool {
        template.contains('X')
    }

    /// File name for index `n`.
    pub fn format(&self, n: usize) -> String {
        format!("{}{:0width$}{}", self.prefix, n, self.suffix, width = self.width)
    }
}

/// Byte-bounded rolling file sink
pub struct SplitFileStream {
    template: NameTemplate,
    bytes_limit: u64,
    file_n: usize,
    bytes_written: u64,
    current: Option<BufWriter<File>>,
}

impl SplitFileStream {
    /// The sink opens its first file lazily, on the first write.
    pub fn new(template: NameTemplate, bytes_limit: u64) -> Self {
        Self {
            template,
            bytes_limit,
            file_n: 0,
            bytes_written: 0,
            current: None,
        }
    }

    fn open_next(&mut self) -> io::Result<()> {
        if let Some(mut previous) = self.current.take() {
            previous.flush()?;
        }
        let name = self.template.format(self.file_n);
        self.file_n += 1;
        self.current = Some(BufWriter::new(File::create(name)?));
        self.bytes_written = 0;
        Ok(())
    }
}

impl Write for SplitFileStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Roll on the first write, or when this write would go over.
        if self.current.is_none() || self.bytes_written + buf.len() as u64 > self.bytes_limit {
            self.open_next()?;
        }
        if let Some(file) = &mut self.current {
            file.write_all(buf)?;
            self.bytes_written += buf.len() as u64;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.current {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---------------------------------------------------------------
    // NameTemplate
    // ---------------------------------------------------------------

    #[test]
    fn test_template_basic() {
        let tpl = NameTemplate::parse("out-XXX").unwrap();
        assert_eq!(tpl.format(0), "out-000");
        assert_eq!(tpl.format(7), "out-007");
        assert_eq!(tpl.format(123), "out-123");
    }

    #[test]
    fn test_template_wider_than_needed() {
        let tpl = NameTemplate::parse("chunk-XXXXX.warc.gz").unwrap();
        assert_eq!(tpl.format(42), "chunk-00042.warc.gz");
    }

    #[test]
    fn test_template_index_overflows_padding() {
        let tpl = NameTemplate::parse("x-XX").unwrap();
        assert_eq!(tpl.format(1234), "x-1234");
    }

    #[test]
    fn test_template_uses_last_x_run() {
        let tpl = NameTemplate::parse("proXXcessed-XX").unwrap();
        assert_eq!(tpl.format(3), "proXXcessed-03");
    }

    #[test]
    fn test_template_single_x() {
        let tpl = NameTemplate::parse("outX").unwrap();
        assert_eq!(tpl.format(5), "out5");
    }

    #[test]
    fn test_template_without_x_is_error() {
        let err = NameTemplate::parse("plain-output").unwrap_err();
        assert!(matches!(err, Error::Template(_)));
    }

    #[test]
    fn test_has_placeholder() {
        assert!(NameTemplate::has_placeholder("out-XXX"));
        assert!(!NameTemplate::has_placeholder("out-123"));
    }

    // ---------------------------------------------------------------
    // SplitFileStream
    // ---------------------------------------------------------------

    fn read_file(path: &std::path::Path) -> Vec<u8> {
        std::fs::read(path).unwrap()
    }

    #[test]
    fn test_split_rolls_before_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let tpl_str = dir.path().join("part-XX").to_str().unwrap().to_string();
        let tpl = NameTemplate::parse(&tpl_str).unwrap();

        // Three 1 MiB records with a 2.5 MB limit: two fit in the first
        // file, the third rolls over.
        let record = vec![b'r'; 1024 * 1024];
        let mut sink = SplitFileStream::new(tpl, 2_500_000);
        for _ in 0..3 {
            sink.write_all(&record).unwrap();
        }
        sink.flush().unwrap();

        let first = read_file(&dir.path().join("part-00"));
        let second = read_file(&dir.path().join("part-01"));
        assert_eq!(first.len(), 2 * 1024 * 1024);
        assert_eq!(second.len(), 1024 * 1024);
        assert!(!dir.path().join("part-02").exists());
    }

    #[test]
    fn test_split_never_splits_one_write() {
        let dir = tempfile::tempdir().unwrap();
        let tpl_str = dir.path().join("big-X").to_str().unwrap().to_string();
        let tpl = NameTemplate::parse(&tpl_str).unwrap();

        // A single record larger than the limit still lands in one file.
        let record = vec![b'b'; 4096];
        let mut sink = SplitFileStream::new(tpl, 1000);
        sink.write_all(&record).unwrap();
        sink.write_all(b"next").unwrap();
        sink.flush().unwrap();

        assert_eq!(read_file(&dir.path().join("big-0")).len(), 4096);
        assert_eq!(read_file(&dir.path().join("big-1")), b"next");
    }

    #[test]
    fn test_split_exact_fit_stays_in_file() {
        let dir = tempfile::tempdir().unwrap();
        let tpl_str = dir.path().join("fit-X").to_str().unwrap().to_string();
        let tpl = NameTemplate::parse(&tpl_str).unwrap();

        let mut sink = SplitFileStream::new(tpl, 10);
        sink.write_all(b"12345").unwrap();
        sink.write_all(b"67890").unwrap(); // lands exactly at the limit
        sink.write_all(b"x").unwrap(); // must roll
        sink.flush().unwrap();

        assert_eq!(read_file(&dir.path().join("fit-0")), b"1234567890");
        assert_eq!(read_file(&dir.path().join("fit-1")), b"x");
    }

    #[test]
    fn test_no_file_without_writes() {
        let dir = tempfile::tempdir().unwrap();
        let tpl_str = dir.path().join("idle-X").to_str().unwrap().to_string();
        let tpl = NameTemplate::parse(&tpl_str).unwrap();
        let mut sink = SplitFileStream::new(tpl, 100);
        sink.flush().unwrap();
        drop(sink);
        assert!(!dir.path().join("idle-0").exists());
    }
}
