//! Byte-stream source (spec.md §4.2, §6): seekable random-access reads over
//! a name-addressed resource, either a plain file or a zip-archive entry.
//!
//! `path` is resolved by walking it left-to-right: at each `/`, if the
//! accumulated prefix names a regular file, the remainder is treated as an
//! entry inside that file's zip archive. This is out of scope for redesign
//! (spec.md §1) — it exists only so the loader graph (spec.md §4.4) has
//! something concrete to call.

use crate::error::SourceError;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

/// A name-addressed, seekable byte source. The core depends only on this
/// trait; host I/O (actual file descriptors, zip extraction) is an external
/// collaborator per spec.md §1.
pub trait ByteSource {
    fn exists(&self, path: &str) -> bool;
    fn read_all(&self, path: &str) -> Result<Vec<u8>, SourceError>;
}

/// Default implementation: walks `path` left-to-right, diving into a zip
/// archive the moment a prefix names a regular file on disk.
pub struct FsByteSource {
    root: PathBuf,
}

impl FsByteSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsByteSource { root: root.into() }
    }

    /// Split `path` into the longest on-disk-file prefix (if any) and the
    /// remaining zip-entry path, per spec.md §4.2/§6's resolution rule.
    fn locate(&self, path: &str) -> Located {
        let mut prefix_end = 0usize;
        for (idx, ch) in path.char_indices() {
            if ch == '/' {
                let candidate = self.root.join(&path[..idx]);
                if candidate.is_file() {
                    prefix_end = idx;
                    break;
                }
            }
        }
        if prefix_end == 0 {
            let full = self.root.join(path);
            if full.is_file() {
                return Located::File(full);
            }
        }
        if prefix_end > 0 {
            let archive = self.root.join(&path[..prefix_end]);
            let entry = path[prefix_end + 1..].to_string();
            return Located::ZipEntry { archive, entry };
        }
        Located::File(self.root.join(path))
    }
}

enum Located {
    File(PathBuf),
    ZipEntry { archive: PathBuf, entry: String },
}

impl ByteSource for FsByteSource {
    fn exists(&self, path: &str) -> bool {
        match self.locate(path) {
            Located::File(p) => p.is_file(),
            Located::ZipEntry { archive, entry } => open_zip_entry(&archive, &entry).is_ok(),
        }
    }

    fn read_all(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        match self.locate(path) {
            Located::File(p) => fs::read(&p).map_err(|_| SourceError::NotFound),
            Located::ZipEntry { archive, entry } => open_zip_entry(&archive, &entry),
        }
    }
}

fn open_zip_entry(archive: &Path, entry: &str) -> Result<Vec<u8>, SourceError> {
    let file = fs::File::open(archive).map_err(|e| SourceError::Io(e.to_string()))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| SourceError::MalformedArchive(e.to_string()))?;
    let mut zip_entry = zip.by_name(entry).map_err(|_| SourceError::NotFound)?;
    let mut bytes = Vec::with_capacity(zip_entry.size() as usize);
    zip_entry
        .read_to_end(&mut bytes)
        .map_err(|e| SourceError::Io(e.to_string()))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_a_plain_class_file() {
        let dir = std::env::temp_dir().join(format!("nanojvm-test-{}", std::process::id()));
        fs::create_dir_all(dir.join("com/example")).unwrap();
        fs::write(dir.join("com/example/Main.class"), b"\xCA\xFE\xBA\xBE").unwrap();
        let source = FsByteSource::new(&dir);
        assert!(source.exists("com/example/Main.class"));
        let bytes = source.read_all("com/example/Main.class").unwrap();
        assert_eq!(&bytes[..4], b"\xCA\xFE\xBA\xBE");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn reads_a_zip_entry_behind_a_regular_file_prefix() {
        let dir = std::env::temp_dir().join(format!("nanojvm-test-zip-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let jar_path = dir.join("java.base.jar");
        {
            let file = fs::File::create(&jar_path).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            writer
                .start_file("java/lang/Object.class", zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(b"\xCA\xFE\xBA\xBE").unwrap();
            writer.finish().unwrap();
        }
        let source = FsByteSource::new(&dir);
        let path = "java.base.jar/java/lang/Object.class";
        assert!(source.exists(path));
        let bytes = source.read_all(path).unwrap();
        assert_eq!(&bytes[..4], b"\xCA\xFE\xBA\xBE");
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_path_is_not_found() {
        let source = FsByteSource::new(std::env::temp_dir());
        assert!(!source.exists("does/not/Exist.class"));
        assert!(matches!(
            source.read_all("does/not/Exist.class"),
            Err(SourceError::NotFound)
        ));
    }
}
