//! Scratch storage for intermediate rasters
//!
//! A pipeline creates one `ScratchStore`, persists intermediate results into
//! it while it runs and purges it at the end.

use super::native::write_geotiff;
use super::store::load;
use crate::error::Result;
use crate::raster::{Raster, RasterElement};
use std::fs;
use std::path::{Path, PathBuf};

/// Default scratch directory name, relative to the working directory
pub const DEFAULT_SCRATCH_DIR: &str = "__cache__";

/// A directory of uniquely named intermediate GeoTIFFs
#[derive(Debug)]
pub struct ScratchStore {
    dir: PathBuf,
    counter: usize,
    written: Vec<PathBuf>,
}

impl ScratchStore {
    /// The directory is created on first use, not here
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            counter: 0,
            written: Vec::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files persisted so far
    pub fn files(&self) -> &[PathBuf] {
        &self.written
    }

    fn next_path(&mut self, marker: &str) -> PathBuf {
        loop {
            self.counter += 1;
            let path = self.dir.join(format!("{marker}_{}.tif", self.counter));
            if !path.exists() {
                return path;
            }
        }
    }

    /// Write `raster` to the store and return it as read back from disk
    pub fn persist<T: RasterElement>(&mut self, raster: &Raster<T>, marker: &str) -> Result<Raster<T>> {
        fs::create_dir_all(&self.dir)?;
        let path = self.next_path(marker);
        write_geotiff(raster, &path, None)?;
        tracing::debug!("persisted {} to {}", raster.name(), path.display());
        self.written.push(path.clone());

        let stored: Raster<T> = load(&path, None)?;
        Ok(stored.with_name(raster.name()))
    }

    /// Delete the scratch directory and everything in it
    pub fn purge(&mut self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir)?;
            tracing::debug!("purged {}", self.dir.display());
        }
        self.written.clear();
        Ok(())
    }
}

impl Default for ScratchStore {
    fn default() -> Self {
        Self::new(DEFAULT_SCRATCH_DIR)
    }
}
