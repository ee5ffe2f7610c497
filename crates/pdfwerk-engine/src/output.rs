// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Output placement — atomic, collision-free files under the configured output
// directory, split folders owned by one request and their zip archives.

use std::io::Write;
use std::path::{Path, PathBuf};

use pdfwerk_core::error::{PdfwerkError, Result};
use tempfile::NamedTempFile;
use tracing::{debug, warn};
use uuid::Uuid;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// How many fresh names are tried before giving up on a collision.
const MAX_NAME_ATTEMPTS: u32 = 16;

/// The shared directory every operation writes into.
#[derive(Debug, Clone)]
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    /// Write `bytes` as `<stem>_<random>.<extension>`. The file appears
    /// complete or not at all and never replaces an existing file.
    pub fn write_unique(&self, stem: &str, extension: &str, bytes: &[u8]) -> Result<PathBuf> {
        self.ensure()?;
        let stem = sanitise(stem);
        let names = (0..MAX_NAME_ATTEMPTS).map(|_| format!("{stem}_{}.{extension}", short_id()));
        let (path, _) = persist_exclusive(&self.root, names, bytes)?;
        debug!(path = %path.display(), size = bytes.len(), "output written");
        Ok(path)
    }

    /// Create a fresh `<prefix>_split_<random>` folder. The folder is removed
    /// again unless [`SplitFolder::commit`] is called.
    pub fn create_split_folder(&self, prefix: &str) -> Result<SplitFolder> {
        self.ensure()?;
        let prefix = sanitise(prefix);
        for _ in 0..MAX_NAME_ATTEMPTS {
            let name = format!("{prefix}_split_{}", short_id());
            let path = self.root.join(&name);
            match std::fs::create_dir(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "split folder created");
                    return Ok(SplitFolder {
                        path,
                        name,
                        committed: false,
                    });
                }
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(PdfwerkError::processing("split", "could not allocate a unique output folder"))
    }

    /// Archive every file of `folder` into `<folder>.zip` next to it, with
    /// entries stored as `<folder>/<filename>`. Returns the archive name.
    pub fn write_zip(&self, folder: &SplitFolder, filenames: &[String]) -> Result<String> {
        let archive_name = format!("{}.zip", folder.name);
        let temp = NamedTempFile::new_in(&self.root)?;
        let mut zip = ZipWriter::new(temp);
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

        for filename in filenames {
            let bytes = std::fs::read(folder.path.join(filename))?;
            zip.start_file(format!("{}/{filename}", folder.name), options)
                .map_err(|err| PdfwerkError::Archive(format!("cannot add {filename}: {err}")))?;
            zip.write_all(&bytes)?;
        }
        let temp = zip
            .finish()
            .map_err(|err| PdfwerkError::Archive(format!("cannot finish archive: {err}")))?;

        let target = self.root.join(&archive_name);
        temp.persist_noclobber(&target)
            .map_err(|err| PdfwerkError::Archive(format!("cannot place {archive_name}: {}", err.error)))?;
        debug!(path = %target.display(), entries = filenames.len(), "split archive written");
        Ok(archive_name)
    }
}

/// A split output folder owned by one request.
#[derive(Debug)]
pub struct SplitFolder {
    path: PathBuf,
    name: String,
    committed: bool,
}

impl SplitFolder {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Write `bytes` as `<stem>.pdf`, adding `_1`, `_2`, ... on collision.
    /// Returns the path and the file name actually used.
    pub fn write_file(&self, stem: &str, bytes: &[u8]) -> Result<(PathBuf, String)> {
        let stem = sanitise(stem);
        let names = std::iter::once(format!("{stem}.pdf"))
            .chain((1..MAX_NAME_ATTEMPTS).map(|n| format!("{stem}_{n}.pdf")));
        persist_exclusive(&self.path, names, bytes)
    }

    /// Keep the folder; returns its path and name.
    pub fn commit(mut self) -> (PathBuf, String) {
        self.committed = true;
        (self.path.clone(), self.name.clone())
    }
}

impl Drop for SplitFolder {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(err) = std::fs::remove_dir_all(&self.path) {
            warn!(path = %self.path.display(), %err, "failed to remove abandoned split folder");
        }
    }
}

/// An uploaded input file that is deleted when the guard is dropped, whether
/// the operation that read it succeeded or not.
#[derive(Debug)]
pub struct TempInput {
    path: PathBuf,
}

impl TempInput {
    /// Take ownership of an existing file.
    pub fn adopt(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store `bytes` as a new temporary file in `dir`.
    pub fn from_bytes(dir: &Path, bytes: &[u8]) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let mut temp = tempfile::Builder::new()
            .prefix("upload_")
            .suffix(".pdf")
            .tempfile_in(dir)?;
        temp.write_all(bytes)?;
        let path = temp
            .into_temp_path()
            .keep()
            .map_err(|err| PdfwerkError::Io(err.error))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempInput {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "temporary input removed"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => warn!(path = %self.path.display(), %err, "failed to remove temporary input"),
        }
    }
}

/// Write `bytes` to a temp file in `dir` and move it to the first candidate
/// name that does not exist yet.
fn persist_exclusive(
    dir: &Path,
    names: impl IntoIterator<Item = String>,
    bytes: &[u8],
) -> Result<(PathBuf, String)> {
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;

    for name in names {
        let target = dir.join(&name);
        match temp.persist_noclobber(&target) {
            Ok(_) => return Ok((target, name)),
            Err(err) if err.error.kind() == std::io::ErrorKind::AlreadyExists => temp = err.file,
            Err(err) => return Err(err.error.into()),
        }
    }
    Err(PdfwerkError::processing(
        "output",
        format!("no free file name in {}", dir.display()),
    ))
}

/// Eight hex characters of a fresh v4 uuid.
fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Reduce a user-supplied name to a safe file-name stem.
pub fn sanitise(raw: &str) -> String {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect();
    if cleaned.trim_matches('_').is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}

/// File stem of `path`, sanitised, for naming derived outputs.
pub fn input_stem(path: &Path) -> String {
    sanitise(
        &path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn unique_writes_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputDir::new(dir.path());
        let first = output.write_unique("report_merged", "pdf", b"one").unwrap();
        let second = output.write_unique("report_merged", "pdf", b"two").unwrap();
        assert_ne!(first, second);
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 2, "no temp files left behind");
    }

    #[test]
    fn split_folder_adds_numeric_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputDir::new(dir.path());
        let folder = output.create_split_folder("doc").unwrap();
        let (_, first) = folder.write_file("doc_page_1", b"a").unwrap();
        let (_, second) = folder.write_file("doc_page_1", b"b").unwrap();
        assert_eq!(first, "doc_page_1.pdf");
        assert_eq!(second, "doc_page_1_1.pdf");
        folder.commit();
    }

    #[test]
    fn uncommitted_split_folder_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputDir::new(dir.path());
        let path = {
            let folder = output.create_split_folder("doc").unwrap();
            folder.write_file("doc_page_1", b"a").unwrap();
            folder.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn zip_preserves_folder_structure() {
        let dir = tempfile::tempdir().unwrap();
        let output = OutputDir::new(dir.path());
        let folder = output.create_split_folder("doc").unwrap();
        let (_, name) = folder.write_file("doc_page_1", b"%PDF-fake").unwrap();
        let archive = output.write_zip(&folder, std::slice::from_ref(&name)).unwrap();
        let (_, folder_name) = folder.commit();
        assert_eq!(archive, format!("{folder_name}.zip"));

        let file = std::fs::File::open(dir.path().join(&archive)).unwrap();
        let mut zip = zip::ZipArchive::new(file).unwrap();
        let mut entry = zip.by_name(&format!("{folder_name}/doc_page_1.pdf")).unwrap();
        let mut body = Vec::new();
        entry.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"%PDF-fake");
    }

    #[test]
    fn temp_input_is_deleted_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let input = TempInput::from_bytes(dir.path(), b"%PDF").unwrap();
            assert!(input.path().exists());
            input.path().to_path_buf()
        };
        assert!(!path.exists());

        // Already gone is fine.
        drop(TempInput::adopt(dir.path().join("missing.pdf")));
    }

    #[test]
    fn names_are_sanitised() {
        assert_eq!(sanitise("../etc/passwd"), "___etc_passwd");
        assert_eq!(sanitise("  "), "document");
        assert_eq!(input_stem(Path::new("/tmp/Annual Report.pdf")), "Annual_Report");
    }
}
