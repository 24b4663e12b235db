/// Binary index file codec
///
/// Layout (all integers little-endian):
///
/// ```text
/// magic       2 bytes  BE E5
/// version     u8
/// count       i32
/// count x {
///     path     i32 len + bytes
///     code     i32 len + bytes
///     mtime    i64
///     bins     i32 n, n x (i32 len + bytes)
///     parents  i32 n (-1 = unknown), n x (i32 len + bytes)
/// }
/// ```
///
/// Records are self-delimited so the file can be written in one pass.
/// Any short read is treated as corruption and the whole read fails.

use crate::db::models::{Dialect, ModuleEntry};
use crate::error::{MiiError, Result};
use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};

/// Identifies the index file format. Should never need to change.
pub const MAGIC: [u8; 2] = [0xBE, 0xE5];

/// Bumped whenever fields are added to a record
pub const FORMAT_VERSION: u8 = 1;

const UNKNOWN_PARENTS: i32 = -1;

/// A module record as stored in the index file
#[derive(Debug, Clone, PartialEq)]
pub struct CachedModule {
    pub path: PathBuf,
    pub code: String,
    pub timestamp: i64,
    pub bins: Vec<String>,
    pub parents: Option<Vec<String>>,
}

impl CachedModule {
    /// Turn the record into a complete table entry
    pub fn into_entry(self) -> ModuleEntry {
        let (dialect, _) = Dialect::classify(&self.path.to_string_lossy());

        ModuleEntry {
            path: self.path,
            code: self.code,
            dialect,
            timestamp: self.timestamp,
            bins: self.bins,
            parents: self.parents,
            analysis_complete: true,
        }
    }
}

/// Write `entries` to `writer`. Callers pass only complete entries.
pub fn write_index<W: Write>(writer: &mut W, entries: &[&ModuleEntry]) -> Result<()> {
    writer.write_all(&MAGIC)?;
    writer.write_all(&[FORMAT_VERSION])?;
    write_len(writer, entries.len())?;

    for entry in entries {
        write_bytes(writer, entry.path.as_os_str().as_bytes())?;
        write_bytes(writer, entry.code.as_bytes())?;
        writer.write_all(&entry.timestamp.to_le_bytes())?;

        write_len(writer, entry.bins.len())?;
        for bin in &entry.bins {
            write_bytes(writer, bin.as_bytes())?;
        }

        match &entry.parents {
            Some(parents) => {
                write_len(writer, parents.len())?;
                for parent in parents {
                    write_bytes(writer, parent.as_bytes())?;
                }
            }
            None => writer.write_all(&UNKNOWN_PARENTS.to_le_bytes())?,
        }
    }

    writer.flush()?;
    Ok(())
}

/// Create (or truncate) `path` and write the index into it
pub fn write_index_file(path: &Path, entries: &[&ModuleEntry]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_index(&mut writer, entries)
}

/// Parse every record from `reader`.
///
/// `source` is only used to label a bad-magic error.
pub fn read_index<R: Read>(reader: R, source: &Path) -> Result<Vec<CachedModule>> {
    let mut reader = IndexReader { inner: reader };

    let mut magic = [0u8; 2];
    reader.fill(&mut magic, "magic")?;
    if magic != MAGIC {
        return Err(MiiError::BadMagic {
            path: source.to_path_buf(),
        });
    }

    let mut version = [0u8; 1];
    reader.fill(&mut version, "version")?;
    if version[0] != FORMAT_VERSION {
        return Err(MiiError::UnsupportedVersion(version[0]));
    }

    let count = reader.read_len("module count")?;
    let mut modules = Vec::new();

    for _ in 0..count {
        let path = PathBuf::from(OsString::from_vec(reader.read_bytes("module path")?));
        let code = reader.read_string("module code")?;
        let timestamp = reader.read_i64("timestamp")?;

        let num_bins = reader.read_len("bin count")?;
        let mut bins = Vec::new();
        for _ in 0..num_bins {
            bins.push(reader.read_string("bin")?);
        }

        let num_parents = reader.read_i32("parent count")?;
        let parents = if num_parents == UNKNOWN_PARENTS {
            None
        } else {
            let num_parents = checked_len(num_parents, "parent count")?;
            let mut parents = Vec::new();
            for _ in 0..num_parents {
                parents.push(reader.read_string("parent")?);
            }
            Some(parents)
        };

        modules.push(CachedModule {
            path,
            code,
            timestamp,
            bins,
            parents,
        });
    }

    Ok(modules)
}

/// Open `path` and parse every record from it
pub fn read_index_file(path: &Path) -> Result<Vec<CachedModule>> {
    let file = File::open(path)?;
    read_index(BufReader::new(file), path)
}

fn write_len<W: Write>(writer: &mut W, len: usize) -> Result<()> {
    let len = i32::try_from(len)
        .map_err(|_| MiiError::CorruptIndex(format!("length {} does not fit in i32", len)))?;
    writer.write_all(&len.to_le_bytes())?;
    Ok(())
}

fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> Result<()> {
    write_len(writer, bytes.len())?;
    writer.write_all(bytes)?;
    Ok(())
}

fn checked_len(value: i32, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| MiiError::CorruptIndex(format!("negative {}", what)))
}

struct IndexReader<R> {
    inner: R,
}

impl<R: Read> IndexReader<R> {
    fn fill(&mut self, buf: &mut [u8], what: &str) -> Result<()> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => {
                MiiError::CorruptIndex(format!("unexpected end of file reading {}", what))
            }
            _ => MiiError::Io(e),
        })
    }

    fn read_i32(&mut self, what: &str) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.fill(&mut buf, what)?;
        Ok(i32::from_le_bytes(buf))
    }

    fn read_i64(&mut self, what: &str) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.fill(&mut buf, what)?;
        Ok(i64::from_le_bytes(buf))
    }

    fn read_len(&mut self, what: &str) -> Result<usize> {
        let value = self.read_i32(what)?;
        checked_len(value, what)
    }

    fn read_bytes(&mut self, what: &str) -> Result<Vec<u8>> {
        let len = self.read_len(what)?;

        // bounded read so a garbage length can't trigger a huge allocation
        let mut buf = Vec::new();
        (&mut self.inner).take(len as u64).read_to_end(&mut buf)?;

        if buf.len() != len {
            return Err(MiiError::CorruptIndex(format!(
                "unexpected end of file reading {}",
                what
            )));
        }

        Ok(buf)
    }

    fn read_string(&mut self, what: &str) -> Result<String> {
        let bytes = self.read_bytes(what)?;
        String::from_utf8(bytes).map_err(|_| MiiError::CorruptIndex(format!("{} is not UTF-8", what)))
    }
}
