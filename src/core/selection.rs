//! Index selections along one axis.
//!
//! Selections use 1-based positions, counted from the start of the axis.

use std::ops::RangeInclusive;

use crate::util::{Error, Result};

/// Which positions of an axis to keep when copying.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum IndexSelection {
    /// Every position currently present.
    #[default]
    All,
    /// Exactly these 1-based positions, in this order (repeats allowed).
    Indices(Vec<usize>),
    /// The first `n` positions.
    Leading(usize),
}

impl IndexSelection {
    pub fn indices(indices: impl Into<Vec<usize>>) -> Self {
        Self::Indices(indices.into())
    }

    /// Contiguous 1-based range.
    pub fn range(range: RangeInclusive<usize>) -> Self {
        Self::Indices(range.collect())
    }

    pub const fn leading(n: usize) -> Self {
        Self::Leading(n)
    }

    /// Resolve to 0-based positions against an axis of `extent` elements.
    pub fn resolve(&self, extent: usize) -> Result<Vec<usize>> {
        match self {
            Self::All => Ok((0..extent).collect()),
            Self::Leading(n) if *n <= extent => Ok((0..*n).collect()),
            Self::Leading(n) => Err(Error::InvalidTruncation(format!(
                "cannot keep {} of {} positions",
                n, extent
            ))),
            Self::Indices(list) => list
                .iter()
                .map(|&i| {
                    if i == 0 || i > extent {
                        Err(Error::InvalidTruncation(format!(
                            "index {} outside 1..={}",
                            i, extent
                        )))
                    } else {
                        Ok(i - 1)
                    }
                })
                .collect(),
        }
    }

    /// Number of positions selected from an axis of `extent` elements.
    pub fn len(&self, extent: usize) -> usize {
        match self {
            Self::All => extent,
            Self::Indices(list) => list.len(),
            Self::Leading(n) => *n,
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Parse a comma separated list of 1-based positions or `a-b` ranges,
    /// e.g. `"1,3,5-7"`.
    pub fn parse(text: &str) -> Result<Self> {
        let mut out = Vec::new();
        for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let bad = || Error::InvalidTruncation(format!("bad index selection '{}'", part));
            match part.split_once('-') {
                Some((a, b)) => {
                    let a: usize = a.trim().parse().map_err(|_| bad())?;
                    let b: usize = b.trim().parse().map_err(|_| bad())?;
                    if a > b {
                        return Err(bad());
                    }
                    out.extend(a..=b);
                }
                None => out.push(part.parse().map_err(|_| bad())?),
            }
        }
        Ok(Self::Indices(out))
    }
}

impl From<Vec<usize>> for IndexSelection {
    fn from(v: Vec<usize>) -> Self {
        Self::Indices(v)
    }
}

impl From<RangeInclusive<usize>> for IndexSelection {
    fn from(r: RangeInclusive<usize>) -> Self {
        Self::range(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve() {
        assert_eq!(IndexSelection::All.resolve(3).unwrap(), vec![0, 1, 2]);
        assert_eq!(IndexSelection::indices([6, 2, 4]).resolve(10).unwrap(), vec![5, 1, 3]);
        assert_eq!(IndexSelection::leading(7).resolve(10).unwrap().len(), 7);
        assert!(IndexSelection::leading(11).resolve(10).is_err());
        assert!(IndexSelection::indices([0]).resolve(10).is_err());
        assert!(IndexSelection::indices([11]).resolve(10).is_err());
    }

    #[test]
    fn test_len() {
        assert_eq!(IndexSelection::All.len(5), 5);
        assert_eq!(IndexSelection::range(2..=4).len(5), 3);
    }

    #[test]
    fn test_parse() {
        assert_eq!(
            IndexSelection::parse("1, 3,5-7").unwrap(),
            IndexSelection::Indices(vec![1, 3, 5, 6, 7])
        );
        assert!(IndexSelection::parse("x").is_err());
        assert!(IndexSelection::parse("4-2").is_err());
    }
}
