// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL write-ahead log.
//!
//! Records are buffered by `append` and made durable by `flush`, which
//! writes the whole batch and issues a single fsync. A store flushes once
//! per committing transaction, before the commit becomes visible.
//!
//! Each entry is a single line of JSON: `{"seq":N,"record":{...}}\n`

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Number of rotated `.bak` files kept next to a corrupt log
const MAX_BAK_FILES: u32 = 3;

#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct WalRecordRef<'a, R> {
    seq: u64,
    record: &'a R,
}

#[derive(Deserialize)]
struct WalRecord<R> {
    seq: u64,
    record: R,
}

/// A single WAL entry with sequence number
#[derive(Debug, Clone, PartialEq)]
pub struct WalEntry<R> {
    pub seq: u64,
    pub record: R,
}

pub struct Wal<R> {
    file: File,
    path: PathBuf,
    /// Highest sequence number assigned
    write_seq: u64,
    /// Serialized lines waiting for `flush` (without trailing newline)
    write_buffer: Vec<Vec<u8>>,
    _record: PhantomData<fn() -> R>,
}

impl<R> Wal<R>
where
    R: Serialize + DeserializeOwned,
{
    /// Open or create a WAL at the given path.
    ///
    /// A log whose tail cannot be parsed is rotated to `.bak` and rewritten
    /// with the entries that precede the corruption.
    pub fn open(path: &Path) -> Result<Self, WalError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = open_append(path)?;
        let (valid_lines, write_seq, corrupt) = Self::scan(&file)?;

        let file = if corrupt {
            drop(file);
            let bak_path = rotate_bak_path(path);
            warn!(
                path = %path.display(),
                bak = %bak_path.display(),
                valid_entries = valid_lines.len(),
                "corrupt WAL detected, rotating to .bak and preserving valid entries",
            );
            fs::rename(path, &bak_path)?;
            {
                let mut clean = File::create(path)?;
                for line in &valid_lines {
                    clean.write_all(line.as_bytes())?;
                    clean.write_all(b"\n")?;
                }
                clean.sync_all()?;
            }
            open_append(path)?
        } else {
            file
        };

        Ok(Self {
            file,
            path: path.to_owned(),
            write_seq,
            write_buffer: Vec::new(),
            _record: PhantomData,
        })
    }

    /// Read every parseable line, stopping at the first corrupt one.
    ///
    /// Returns `(valid_lines, max_seq, corrupt)`.
    fn scan(file: &File) -> Result<(Vec<String>, u64, bool), WalError> {
        let mut reader = BufReader::new(file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut valid_lines = Vec::new();
        let mut max_seq = 0u64;
        let mut corrupt = false;
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    corrupt = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let record: WalRecord<R> = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(_) => {
                    corrupt = true;
                    break;
                }
            };
            max_seq = max_seq.max(record.seq);
            valid_lines.push(trimmed.to_string());
        }

        Ok((valid_lines, max_seq, corrupt))
    }

    /// Buffer a record. Not durable until `flush()` returns.
    pub fn append(&mut self, record: &R) -> Result<u64, WalError> {
        let seq = self.write_seq + 1;
        let json_bytes = serde_json::to_vec(&WalRecordRef { seq, record })?;
        self.write_seq = seq;
        self.write_buffer.push(json_bytes);
        Ok(seq)
    }

    /// Drop buffered records that were never flushed.
    pub fn discard_buffer(&mut self) {
        self.write_seq -= self.write_buffer.len() as u64;
        self.write_buffer.clear();
    }

    /// Write all buffered entries with a single fsync.
    ///
    /// This is the durability point.
    pub fn flush(&mut self) -> Result<(), WalError> {
        if self.write_buffer.is_empty() {
            return Ok(());
        }

        for mut json_bytes in self.write_buffer.drain(..) {
            json_bytes.push(b'\n');
            self.file.write_all(&json_bytes)?;
        }

        self.file.sync_all()?;
        Ok(())
    }

    pub fn write_seq(&self) -> u64 {
        self.write_seq
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All durable entries after `seq`, in order. Used for replay on open.
    pub fn entries_after(&self, seq: u64) -> Result<Vec<WalEntry<R>>, WalError> {
        let mut reader = BufReader::new(self.file.try_clone()?);
        reader.seek(SeekFrom::Start(0))?;

        let mut entries = Vec::new();
        let mut line = String::new();

        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => break,
                Err(e) => return Err(e.into()),
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let record: WalRecord<R> = match serde_json::from_str(trimmed) {
                Ok(r) => r,
                Err(e) => {
                    warn!(error = %e, "corrupt WAL entry during replay, stopping");
                    break;
                }
            };

            if record.seq > seq {
                entries.push(WalEntry {
                    seq: record.seq,
                    record: record.record,
                });
            }
        }

        Ok(entries)
    }
}

fn open_append(path: &Path) -> Result<File, io::Error> {
    OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)
}

/// Next free `.bak` path, shifting older backups up by one.
fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
