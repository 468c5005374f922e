//! Token persistence backends.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use super::validate_token_name;

/// File name suffix of stored tokens.
const TOKEN_EXTENSION: &str = ".json";

/// File name suffix of tokens still being written.
const TEMP_EXTENSION: &str = ".tmp";

/// Raw storage for serialized tokens, keyed by validated token name.
///
/// Entries are created once and never rewritten.
pub trait TokenBackend: Send + Sync {
    /// Store a new entry; fails with [`io::ErrorKind::AlreadyExists`] if the
    /// name is taken.
    fn create(&self, name: &str, contents: &[u8]) -> io::Result<()>;

    /// Read an entry; `None` if it does not exist.
    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>>;

    /// Delete an entry; `false` if it was already gone.
    fn delete(&self, name: &str) -> io::Result<bool>;

    /// Names of all stored entries.
    fn list(&self) -> io::Result<Vec<String>>;

    /// Remove partial writes last touched before `cutoff`, returning how
    /// many were removed.
    fn remove_stale_temp(&self, _cutoff: SystemTime) -> io::Result<usize> {
        Ok(0)
    }
}

/// One file per token in a directory.
///
/// Files are written to a temporary name and then hard-linked into place,
/// so readers never observe a partially written token and an existing token
/// is never replaced.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    temp_counter: AtomicU64,
}

impl FileBackend {
    /// Use `dir` for token files, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            temp_counter: AtomicU64::new(0),
        })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{TOKEN_EXTENSION}"))
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        let n = self.temp_counter.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{name}.{}.{n}{TEMP_EXTENSION}", std::process::id()))
    }
}

impl TokenBackend for FileBackend {
    fn create(&self, name: &str, contents: &[u8]) -> io::Result<()> {
        let temp = self.temp_path(name);
        let written = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp)
            .and_then(|mut file| {
                file.write_all(contents)?;
                file.sync_all()
            })
            .and_then(|()| fs::hard_link(&temp, self.path(name)));

        if let Err(e) = fs::remove_file(&temp) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    path = %temp.display(),
                    error = %e,
                    "Failed to remove temporary token file"
                );
            }
        }
        written
    }

    fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path(name)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn delete(&self, name: &str) -> io::Result<bool> {
        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn list(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let file_name = entry.file_name();
            let Some(name) = file_name
                .to_str()
                .and_then(|f| f.strip_suffix(TOKEN_EXTENSION))
            else {
                continue;
            };
            if validate_token_name(name).is_ok() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn remove_stale_temp(&self, cutoff: SystemTime) -> io::Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let is_temp = entry
                .file_name()
                .to_str()
                .is_some_and(|f| f.starts_with('.') && f.ends_with(TEMP_EXTENSION));
            if !is_temp || entry.metadata()?.modified()? >= cutoff {
                continue;
            }
            match fs::remove_file(entry.path()) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path().join("tokens")).unwrap();

        backend.create("oai_1", b"{}").unwrap();
        assert_eq!(backend.read("oai_1").unwrap(), Some(b"{}".to_vec()));
        assert_eq!(backend.read("oai_2").unwrap(), None);

        assert!(backend.delete("oai_1").unwrap());
        assert!(!backend.delete("oai_1").unwrap());
    }

    #[test]
    fn test_create_never_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();

        backend.create("oai_1", b"first").unwrap();
        let err = backend.create("oai_1", b"second").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert_eq!(backend.read("oai_1").unwrap(), Some(b"first".to_vec()));
    }

    #[test]
    fn test_list_ignores_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();
        backend.create("oai_2", b"{}").unwrap();
        backend.create("oai_1", b"{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::write(dir.path().join("oai_x.json"), "x").unwrap();

        assert_eq!(backend.list().unwrap(), vec!["oai_1", "oai_2"]);
        // No temporary files are left behind.
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 4);
    }

    #[test]
    fn test_remove_stale_temp() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::new(dir.path()).unwrap();
        backend.create("oai_1", b"{}").unwrap();
        let temp = dir.path().join(".oai_2.4242.0.tmp");
        fs::write(&temp, "{").unwrap();

        assert_eq!(backend.remove_stale_temp(SystemTime::UNIX_EPOCH).unwrap(), 0);
        assert!(temp.exists());

        let later = SystemTime::now() + std::time::Duration::from_secs(3600);
        assert_eq!(backend.remove_stale_temp(later).unwrap(), 1);
        assert!(!temp.exists());
        assert_eq!(backend.list().unwrap(), vec!["oai_1"]);
    }
}
