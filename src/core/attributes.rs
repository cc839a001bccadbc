//! Attribute mappings for groups and variables.
//!
//! Attributes are stored as ordered name/value pairs so that dumps and copies
//! preserve the order in which they were defined.

use smallvec::SmallVec;
use std::fmt;

use crate::util::AttrValue;

/// Ordered attribute mapping.
///
/// Uses SmallVec optimization for the common case of few entries.
#[derive(Clone, Default, PartialEq)]
pub struct Attributes {
    entries: SmallVec<[(String, AttrValue); 4]>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing an existing entry in place.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<AttrValue>) {
        let name = name.into();
        let value = value.into();

        for (k, v) in &mut self.entries {
            if k == &name {
                *v = value;
                return;
            }
        }
        self.entries.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == name)
    }

    /// Remove an entry and return its value.
    pub fn remove(&mut self, name: &str) -> Option<AttrValue> {
        let pos = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(pos).1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Attributes whose names are not reserved for internal bookkeeping.
    pub fn user_entries(&self) -> impl Iterator<Item = (&str, &AttrValue)> {
        self.iter().filter(|(k, _)| !is_reserved(k))
    }

    // === Reserved attribute names ===

    /// Marks the real part of a complex variable.
    pub const COMPLEX_REAL_KEY: &'static str = "_nct_complex_real";

    /// Marks the imaginary part of a complex variable.
    pub const COMPLEX_IMAG_KEY: &'static str = "_nct_complex_imag";

    /// Logical name shared by both parts of a complex variable.
    pub const COMPLEX_NAME_KEY: &'static str = "_nct_complex_name";

    /// Marks a variable whose payload is an opaque byte blob.
    pub const BLOB_KEY: &'static str = "_nct_blob";

    /// Library provenance stamped on the root group of created containers.
    pub const PROVENANCE_KEY: &'static str = "_nct_library";

    pub fn is_complex_real(&self) -> bool {
        self.get(Self::COMPLEX_REAL_KEY).is_some_and(AttrValue::is_true)
    }

    pub fn is_complex_imag(&self) -> bool {
        self.get(Self::COMPLEX_IMAG_KEY).is_some_and(AttrValue::is_true)
    }

    pub fn complex_name(&self) -> Option<&str> {
        self.get(Self::COMPLEX_NAME_KEY).and_then(AttrValue::as_str)
    }

    pub fn is_blob(&self) -> bool {
        self.get(Self::BLOB_KEY).is_some_and(AttrValue::is_true)
    }
}

/// Reserved names are written and interpreted by the library itself.
pub fn is_reserved(name: &str) -> bool {
    name.starts_with("_nct_")
}

impl FromIterator<(String, AttrValue)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, AttrValue)>>(iter: I) -> Self {
        let mut attrs = Self::new();
        for (k, v) in iter {
            attrs.set(k, v);
        }
        attrs
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
