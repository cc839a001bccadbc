//! Truncate-and-recopy.
//!
//! Copies a whole dataset into a new file, dropping the trailing positions of
//! one dimension. It is the duplicator with a single leading selection.

use std::path::Path;

use crate::backend::FormatOptions;
use crate::core::IndexSelection;
use crate::util::{Error, Result};

use super::dataset::Dataset;
use super::duplicate::{DuplicateOptions, DuplicateReport, Duplicator};

/// Which dimension to shorten and by how much.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Truncation {
    /// Group the dimension is looked up from; `/` or empty for the root.
    pub group: String,
    /// Dimension name or path, resolved from `group`.
    pub dimension: String,
    /// Number of trailing positions to drop.
    pub drop: usize,
}

impl Truncation {
    pub fn new(group: impl Into<String>, dimension: impl Into<String>, drop: usize) -> Self {
        Self {
            group: group.into(),
            dimension: dimension.into(),
            drop,
        }
    }
}

/// Copy `src` to a new dataset at `dst`, keeping the first `len - drop`
/// positions of the chosen dimension.
///
/// Everything is validated against the source before `dst` is created, so
/// dropping more positions than exist fails with
/// [`Error::InvalidTruncation`] and leaves no destination behind.
pub fn truncate<P: AsRef<Path>, Q: AsRef<Path>>(
    src: P,
    dst: Q,
    truncation: &Truncation,
    options: FormatOptions,
) -> Result<DuplicateReport> {
    let source = Dataset::open(src.as_ref(), false)?;
    let group = match truncation.group.trim() {
        "" | "/" => source.root().clone(),
        path => source.root().group(path)?,
    };
    let dim = group.dimension(&truncation.dimension)?;
    let len = dim.len();
    if truncation.drop > len {
        return Err(Error::InvalidTruncation(format!(
            "cannot drop {} of {} positions along {}",
            truncation.drop,
            len,
            dim.full_path()
        )));
    }
    let keep = len - truncation.drop;
    tracing::info!(
        "truncating {} from {} to {} positions",
        dim.full_path(),
        len,
        keep
    );

    let copy_options = DuplicateOptions::new().select(dim.full_path(), IndexSelection::leading(keep));
    let duplicator = Duplicator::new(source.root(), &copy_options)?;

    let dest = Dataset::create(dst.as_ref(), options)?;
    match duplicator.copy_into(dest.root()) {
        Ok(report) => {
            dest.close()?;
            source.close()?;
            Ok(report)
        }
        Err(err @ Error::IncompleteCopy { .. }) => {
            // Keep what the write pass managed to copy.
            dest.close()?;
            Err(err)
        }
        Err(err) => {
            dest.discard()?;
            Err(err)
        }
    }
}
