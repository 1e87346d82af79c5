//! Upload directory - where uploaded bytes live on disk

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{SheetError, SheetResult};

#[derive(Debug, Clone)]
pub struct UploadDir {
    root: PathBuf,
}

impl UploadDir {
    /// Use `root`, creating it if needed
    pub fn create<P: AsRef<Path>>(root: P) -> SheetResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// `<tmp>/sheetdesk-uploads`
    pub fn default_root() -> PathBuf {
        std::env::temp_dir().join("sheetdesk-uploads")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Storage path for a client filename. Directory parts are stripped so a
    /// name can never point outside the upload directory.
    pub fn path_for(&self, filename: &str) -> SheetResult<PathBuf> {
        Ok(self.root.join(sanitize_filename(filename)?))
    }

    /// Write `bytes` under `filename`, replacing any previous upload of that name
    /// only once `check` accepts them. The bytes are staged in a temporary file
    /// in the same directory (keeping the extension, which format detection
    /// relies on) and renamed over the final path. On rejection the previous
    /// upload is untouched and the staged file is removed.
    pub fn store_checked<T, F>(&self, filename: &str, bytes: &[u8], check: F) -> SheetResult<(PathBuf, T)>
    where
        F: FnOnce(&Path) -> SheetResult<T>,
    {
        let path = self.path_for(filename)?;
        let suffix = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();

        let mut staged = tempfile::Builder::new()
            .prefix(".staged-")
            .suffix(&suffix)
            .tempfile_in(&self.root)?;
        staged.write_all(bytes)?;
        staged.flush()?;

        let checked = check(staged.path())?;
        staged.persist(&path).map_err(|e| SheetError::Io(e.error))?;
        Ok((path, checked))
    }

    /// Remove a stored file; a missing file is not an error
    pub fn remove(&self, path: &Path) -> SheetResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Final path component of a client-supplied filename
pub fn sanitize_filename(filename: &str) -> SheetResult<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(SheetError::validation("No selected file"));
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(SheetError::validation("Invalid filename"));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_filename_strips_directories() {
        assert_eq!(sanitize_filename("book.xlsx").unwrap(), "book.xlsx");
        assert_eq!(sanitize_filename("../../etc/passwd.csv").unwrap(), "passwd.csv");
        assert_eq!(sanitize_filename("C:\\Users\\me\\data.csv").unwrap(), "data.csv");
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("   ").is_err());
        assert!(sanitize_filename("dir/").is_err());
        assert!(sanitize_filename("..").is_err());
    }

    fn accept(_: &Path) -> SheetResult<()> {
        Ok(())
    }

    #[test]
    fn test_store_and_remove() {
        let dir = TempDir::new().unwrap();
        let uploads = UploadDir::create(dir.path().join("uploads")).unwrap();

        let (path, ()) = uploads.store_checked("a.csv", b"A,B\n1,2\n", accept).unwrap();
        assert!(path.starts_with(uploads.root()));
        assert_eq!(fs::read_to_string(&path).unwrap(), "A,B\n1,2\n");

        uploads.store_checked("a.csv", b"A\n", accept).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "A\n");

        uploads.remove(&path).unwrap();
        assert!(!path.exists());
        uploads.remove(&path).unwrap();
    }

    #[test]
    fn test_rejected_store_keeps_previous_file() {
        let dir = TempDir::new().unwrap();
        let uploads = UploadDir::create(dir.path()).unwrap();
        let (path, ()) = uploads.store_checked("book.xlsx", b"good", accept).unwrap();

        let err = uploads
            .store_checked("book.xlsx", b"bad", |staged| {
                assert_eq!(staged.extension().and_then(|e| e.to_str()), Some("xlsx"));
                assert_eq!(fs::read(staged).unwrap(), b"bad");
                Err::<(), _>(SheetError::Parse("broken".into()))
            })
            .unwrap_err();

        assert!(matches!(err, SheetError::Parse(_)));
        assert_eq!(fs::read(&path).unwrap(), b"good");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
