//! Complex pairing.
//!
//! A complex variable is stored as two real variables carrying reserved
//! attributes: one marks the part (real or imaginary), the other names the
//! logical variable. Loading a group scans its real variables and joins the
//! parts back together.

use std::collections::BTreeMap;

use crate::core::Attributes;
use crate::util::{Error, Result};

use super::variable::{ComplexVariable, RealVariable};

/// Stored name of the real part of `name`.
pub(crate) fn real_part_name(name: &str) -> String {
    format!("{}.real", name)
}

/// Stored name of the imaginary part of `name`.
pub(crate) fn imag_part_name(name: &str) -> String {
    format!("{}.imag", name)
}

/// Reserved attributes written on the real (`is_real`) or imaginary part.
pub(crate) fn part_markers(name: &str, is_real: bool) -> Attributes {
    let mut attrs = Attributes::new();
    let key = if is_real {
        Attributes::COMPLEX_REAL_KEY
    } else {
        Attributes::COMPLEX_IMAG_KEY
    };
    attrs.set(key, 1i64);
    attrs.set(Attributes::COMPLEX_NAME_KEY, name);
    attrs
}

#[derive(Default)]
struct Parts {
    real: Option<RealVariable>,
    imag: Option<RealVariable>,
}

/// Join marked parts into complex variables.
///
/// Parts whose partner is missing stay ordinary real variables. Two parts
/// claiming the same role for one logical name, or a pair whose parts
/// disagree, is a schema error.
pub(crate) fn pair_parts(variables: &[RealVariable]) -> Result<Vec<ComplexVariable>> {
    let mut buckets: BTreeMap<&str, Parts> = BTreeMap::new();
    for var in variables {
        let attrs = var.attributes();
        let (is_real, is_imag) = (attrs.is_complex_real(), attrs.is_complex_imag());
        if !is_real && !is_imag {
            continue;
        }
        let Some(name) = attrs.complex_name() else {
            tracing::warn!("variable '{}' is marked complex but has no logical name", var.name());
            continue;
        };
        let bucket = buckets.entry(name).or_default();
        let slot = if is_real { &mut bucket.real } else { &mut bucket.imag };
        if let Some(previous) = slot {
            return Err(Error::schema(format!(
                "complex variable '{}' has two {} parts: '{}' and '{}'",
                name,
                if is_real { "real" } else { "imaginary" },
                previous.name(),
                var.name()
            )));
        }
        *slot = Some(var.clone());
    }

    let mut out = Vec::new();
    for (name, parts) in buckets {
        match (parts.real, parts.imag) {
            (Some(real), Some(imag)) => out.push(ComplexVariable::pair(name, real, imag)?),
            (Some(part), None) | (None, Some(part)) => {
                tracing::warn!(
                    "complex variable '{}' is missing a part, keeping '{}' as a real variable",
                    name,
                    part.name()
                );
            }
            (None, None) => {}
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DimId, DimLength, VarId};
    use crate::model::dimension::Dimension;
    use crate::util::ScalarType;

    fn axis() -> Dimension {
        Dimension::new("x", DimId(0), DimLength::Fixed(3), 3, "/")
    }

    fn part(dim: &Dimension, name: &str, id: u32, logical: &str, is_real: bool) -> RealVariable {
        RealVariable::new(
            name,
            VarId(id),
            vec![dim.clone()],
            ScalarType::Double,
            part_markers(logical, is_real),
        )
    }

    fn plain(dim: &Dimension, name: &str, id: u32) -> RealVariable {
        RealVariable::new(name, VarId(id), vec![dim.clone()], ScalarType::Double, Attributes::new())
    }

    #[test]
    fn test_pairs_complete_parts() {
        let x = axis();
        let vars = vec![
            plain(&x, "t", 0),
            part(&x, "w.real", 1, "w", true),
            part(&x, "w.imag", 2, "w", false),
        ];
        let paired = pair_parts(&vars).unwrap();
        assert_eq!(paired.len(), 1);
        assert_eq!(paired[0].name(), "w");
        assert_eq!(paired[0].real_part().name(), "w.real");
        assert_eq!(paired[0].imag_part().name(), "w.imag");
    }

    #[test]
    fn test_parts_over_distinct_dimensions_fail() {
        let vars = vec![
            part(&axis(), "w.real", 1, "w", true),
            part(&axis(), "w.imag", 2, "w", false),
        ];
        assert!(matches!(pair_parts(&vars), Err(Error::SchemaInconsistent(_))));
    }

    #[test]
    fn test_incomplete_pair_is_skipped() {
        let vars = vec![part(&axis(), "w.real", 1, "w", true)];
        assert!(pair_parts(&vars).unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_role_fails() {
        let x = axis();
        let vars = vec![part(&x, "a", 1, "w", true), part(&x, "b", 2, "w", true)];
        assert!(matches!(pair_parts(&vars), Err(Error::SchemaInconsistent(_))));
    }

    #[test]
    fn test_part_names() {
        assert_eq!(real_part_name("w"), "w.real");
        assert_eq!(imag_part_name("w"), "w.imag");
    }
}
