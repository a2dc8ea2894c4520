//! Persistence adapters for issued certificate and key bytes.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CertForgeError, Result};

/// Default mode bits for written files: read-only by owner.
pub const DEFAULT_FILE_MODE: u32 = 0o400;

/// Writes an issued certificate and private key to a destination pair.
pub trait Writer {
    /// Persists the certificate and private key bytes.
    ///
    /// Implementations must report certificate-write and key-write failures
    /// distinctly so partial writes are diagnosable.
    fn write(&mut self, cert: &[u8], key: &[u8]) -> Result<()>;
}

/// Writes certificate and key to two filesystem paths, applying mode bits
/// and optional ownership on Unix.
pub struct FileWriter {
    cert_path: PathBuf,
    key_path: PathBuf,
    mode: u32,
    owner: Option<(u32, u32)>,
}

impl FileWriter {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            mode: DEFAULT_FILE_MODE,
            owner: None,
        }
    }

    /// Sets the mode bits of the output files.
    pub fn set_mode(&mut self, mode: u32) {
        self.mode = mode;
    }

    /// Sets the owner uid and gid of the output files.
    pub fn set_owner(&mut self, uid: u32, gid: u32) {
        self.owner = Some((uid, gid));
    }

    fn write_file(&self, path: &Path, raw: &[u8]) -> std::io::Result<()> {
        fs::write(path, raw)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(self.mode))?;
            if let Some((uid, gid)) = self.owner {
                std::os::unix::fs::chown(path, Some(uid), Some(gid))?;
            }
        }
        Ok(())
    }
}

impl Writer for FileWriter {
    fn write(&mut self, cert: &[u8], key: &[u8]) -> Result<()> {
        self.write_file(&self.cert_path, cert)
            .map_err(CertForgeError::CertificateWrite)?;
        self.write_file(&self.key_path, key)
            .map_err(CertForgeError::KeyWrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("certforge-{}-{name}", std::process::id()))
    }

    #[test]
    fn writes_both_files() {
        let cert_path = temp_path("write.crt");
        let key_path = temp_path("write.key");
        let mut writer = FileWriter::new(&cert_path, &key_path);
        writer.set_mode(0o600);
        writer.write(b"cert bytes", b"key bytes").unwrap();

        assert_eq!(fs::read(&cert_path).unwrap(), b"cert bytes");
        assert_eq!(fs::read(&key_path).unwrap(), b"key bytes");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&key_path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let _ = fs::remove_file(cert_path);
        let _ = fs::remove_file(key_path);
    }

    #[test]
    fn certificate_write_failure_is_distinct() {
        let mut writer = FileWriter::new("/nonexistent-dir/out.crt", temp_path("err.key"));
        match writer.write(b"cert", b"key") {
            Err(CertForgeError::CertificateWrite(_)) => {}
            other => panic!("expected CertificateWrite, got {other:?}"),
        }
    }
}
