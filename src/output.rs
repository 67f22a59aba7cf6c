use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::results::ProductRecord;

/// Writes records as JSON Lines, one object per line
pub struct RecordWriter {
    out: Box<dyn Write + Send>,
    written: usize,
}

impl RecordWriter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out, written: 0 }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(BufWriter::new(io::stdout())))
    }

    /// Create (or truncate) `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    /// Stdout when no path is given
    pub fn open(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::create(path),
            None => Ok(Self::stdout()),
        }
    }

    pub fn write(&mut self, record: &ProductRecord) -> Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        self.out.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }

    pub fn finish(mut self) -> Result<usize> {
        self.out.flush()?;
        Ok(self.written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_writes_one_object_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");

        let mut writer = RecordWriter::create(&path).unwrap();
        writer
            .write(&ProductRecord::new(
                "https://fix-price.com/a".into(),
                "Зубная паста".into(),
                99.0,
            ))
            .unwrap();
        writer
            .write(&ProductRecord::new(
                "https://fix-price.com/b".into(),
                "Brush".into(),
                0.0,
            ))
            .unwrap();
        assert_eq!(writer.written(), 2);
        assert_eq!(writer.finish().unwrap(), 2);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: ProductRecord = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.title, "Зубная паста");
        assert_eq!(first.price_current, 99.0);
        assert!(lines[1].contains("\"url\":\"https://fix-price.com/b\""));
    }

    #[test]
    fn test_create_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.jsonl");
        fs::write(&path, "stale\n").unwrap();

        let writer = RecordWriter::open(Some(&path)).unwrap();
        assert_eq!(writer.finish().unwrap(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = RecordWriter::create(dir.path().join("nope").join("out.jsonl"));
        assert!(matches!(result, Err(crate::error::CrawlError::Io(_))));
    }
}
