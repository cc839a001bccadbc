//! Dataset handles.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::{FormatOptions, MemoryBackend};
use crate::core::{Attributes, StorageBackend};
use crate::util::{Error, Result};

use super::group::{Group, SharedBackend};

/// Library string stamped on the root group of new containers.
pub fn provenance() -> String {
    format!(
        "nctree {} (built {} {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("NCTREE_BUILD_DATE").unwrap_or("unknown"),
        option_env!("NCTREE_BUILD_TIME").unwrap_or("unknown")
    )
}

/// An open container and its group tree.
///
/// The handle must be released exactly once, either with [`close`](Self::close)
/// (commit and write) or [`discard`](Self::discard) (drop uncommitted work).
/// Dropping an open handle closes it without committing.
pub struct Dataset {
    backend: SharedBackend,
    root: Group,
}

impl Dataset {
    /// Create a new file-backed dataset.
    ///
    /// # Example
    /// ```ignore
    /// let ds = Dataset::create("out.nct", FormatOptions::default())?;
    /// ds.root().add_dimension("time", DimLength::Growable)?;
    /// ds.close()?;
    /// ```
    pub fn create<P: AsRef<Path>>(path: P, options: FormatOptions) -> Result<Self> {
        let stamp = options.stamp_provenance;
        let backend = MemoryBackend::create(path.as_ref(), options)?;
        let dataset = Self::from_backend(Box::new(backend))?;
        if stamp {
            dataset
                .root
                .set_attribute(Attributes::PROVENANCE_KEY, provenance())?;
        }
        tracing::info!("created {}", path.as_ref().display());
        Ok(dataset)
    }

    /// Open an existing dataset and load its group tree.
    pub fn open<P: AsRef<Path>>(path: P, writable: bool) -> Result<Self> {
        let backend = MemoryBackend::open(path.as_ref(), writable)?;
        let dataset = Self::from_backend(Box::new(backend))?;
        tracing::info!(
            "opened {} ({})",
            path.as_ref().display(),
            if writable { "read-write" } else { "read-only" }
        );
        Ok(dataset)
    }

    /// Ephemeral dataset that is never written anywhere.
    pub fn in_memory() -> Result<Self> {
        Self::from_backend(Box::new(MemoryBackend::new()))
    }

    /// Layer a dataset on any backend.
    pub fn from_backend(backend: Box<dyn StorageBackend>) -> Result<Self> {
        let backend: SharedBackend = Arc::new(Mutex::new(backend));
        let root = Group::load_root(backend.clone())?;
        Ok(Self { backend, root })
    }

    pub fn root(&self) -> &Group {
        &self.root
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.backend.lock().path().map(Path::to_path_buf)
    }

    pub fn is_writable(&self) -> bool {
        self.backend.lock().is_writable()
    }

    pub fn is_closed(&self) -> bool {
        self.backend.lock().is_closed()
    }

    /// Write staged variables, commit definitions and flush to the container.
    pub fn sync(&self) -> Result<()> {
        self.check_open()?;
        self.root.flush()?;
        let mut backend = self.backend.lock();
        if backend.is_writable() {
            backend.end_define()?;
        }
        backend.sync()
    }

    /// Commit and release the handle. A second call fails with
    /// [`Error::AlreadyClosed`].
    pub fn close(&self) -> Result<()> {
        self.check_open()?;
        let flushed = self.root.flush();
        let mut backend = self.backend.lock();
        if flushed.is_ok() && backend.is_writable() {
            backend.end_define()?;
        }
        let closed = backend.close();
        tracing::info!("closed {}", describe(backend.path()));
        flushed?;
        closed
    }

    /// Release the handle without committing. A container that was never
    /// committed is left unwritten.
    pub fn discard(&self) -> Result<()> {
        self.check_open()?;
        let mut backend = self.backend.lock();
        tracing::info!("discarding {}", describe(backend.path()));
        backend.close()
    }

    fn check_open(&self) -> Result<()> {
        if self.backend.lock().is_closed() {
            return Err(Error::AlreadyClosed);
        }
        Ok(())
    }
}

impl Drop for Dataset {
    fn drop(&mut self) {
        let mut backend = self.backend.lock();
        if backend.is_closed() {
            return;
        }
        if let Err(err) = backend.close() {
            tracing::warn!("closing {} on drop failed: {}", describe(backend.path()), err);
        }
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("path", &self.path())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn describe(path: Option<&Path>) -> String {
    path.map_or_else(|| "<memory>".to_string(), |p| p.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ArrayData, DimLength};
    use crate::util::ScalarType;

    #[test]
    fn test_provenance_string() {
        let p = provenance();
        assert!(p.starts_with("nctree "));
        assert!(p.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_double_close() {
        let ds = Dataset::in_memory().unwrap();
        ds.close().unwrap();
        assert!(ds.is_closed());
        assert!(matches!(ds.close(), Err(Error::AlreadyClosed)));
        assert!(matches!(ds.sync(), Err(Error::AlreadyClosed)));
    }

    #[test]
    fn test_create_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ds.nct");
        {
            let ds = Dataset::create(&path, FormatOptions::default()).unwrap();
            let root = ds.root();
            root.add_dimension("x", DimLength::Fixed(2)).unwrap();
            root.add_variable("v", ScalarType::Int, &["x"]).unwrap();
            root.put_variable("v", ArrayData::from_vec(&[2], vec![7, 8]).unwrap())
                .unwrap();
            ds.close().unwrap();
        }

        let ds = Dataset::open(&path, false).unwrap();
        let root = ds.root();
        assert!(root
            .attribute(Attributes::PROVENANCE_KEY)
            .and_then(|v| v.as_str().map(str::to_string))
            .is_some_and(|s| s.starts_with("nctree")));
        let data = root.read("v").unwrap();
        assert_eq!(data.as_real().unwrap().to_vec::<i32>().unwrap(), vec![7, 8]);
        assert!(matches!(
            root.put_variable("v", ArrayData::from_vec(&[2], vec![1, 2]).unwrap()),
            Err(Error::ReadOnly)
        ));
        ds.close().unwrap();
    }

    #[test]
    fn test_discard_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.nct");
        let ds = Dataset::create(&path, FormatOptions::compact()).unwrap();
        ds.root().add_dimension("x", DimLength::Fixed(1)).unwrap();
        ds.discard().unwrap();
        assert!(!path.exists());
    }
}
