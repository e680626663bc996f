//! Manifest persistence.
//!
//! The file is rewritten in full on every save: serialized next to the
//! target, then renamed over it, so readers never see a partial manifest.
//! The replacement keeps the mode of the file it replaces (0644 when new).

use std::fs::Permissions;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::debug;

use crate::errors::Result;
use crate::types::{Input, Manifest};

/// Mode for a manifest that does not exist yet.
const NEW_FILE_MODE: u32 = 0o644;

/// Where a manifest lives.
pub trait ManifestStorage: Send + Sync {
    /// Read the current manifest.
    fn load(&self) -> Result<Manifest>;
    /// Replace the stored manifest.
    fn save(&self, manifest: &Manifest) -> Result<()>;
}

/// JSON file storage with atomic replace.
#[derive(Clone, Debug)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Storage backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The manifest file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ManifestStorage for FileStorage {
    fn load(&self) -> Result<Manifest> {
        let content = std::fs::read_to_string(&self.path)?;
        let manifest = serde_json::from_str(&content)?;
        Ok(manifest)
    }

    fn save(&self, manifest: &Manifest) -> Result<()> {
        let bytes = to_pretty_json(manifest)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let permissions = match std::fs::metadata(&self.path) {
            Ok(existing) => existing.permissions(),
            Err(_) => Permissions::from_mode(NEW_FILE_MODE),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().set_permissions(permissions)?;
        tmp.as_file().sync_all()?;
        let _ = tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!(path = %self.path.display(), entries = manifest.len(), "manifest saved");
        Ok(())
    }
}

/// Read a rebuild input file.
pub fn load_input(path: &Path) -> Result<Input> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Serialize with four-space indentation and a trailing newline.
pub fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}
