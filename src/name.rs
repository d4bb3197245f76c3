use std::fmt;
use std::ops::Deref;

use compact_str::CompactString;

/// The identifier of a symbol, attribute, or parameter.
///
/// Identifiers are short and repeated heavily (every `self`, every dunder),
/// so they're backed by a small-string-optimized buffer rather than `String`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Name(CompactString);

impl Name {
    #[inline]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(CompactString::new(name.as_ref()))
    }

    #[inline]
    pub const fn new_static(name: &'static str) -> Self {
        Self(CompactString::const_new(name))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Whether this is a double-underscore ("dunder") name like `__init__`.
    pub fn is_dunder(&self) -> bool {
        self.0.starts_with("__") && self.0.ends_with("__")
    }
}

impl Deref for Name {
    type Target = str;

    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl std::borrow::Borrow<str> for Name {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Name {
    fn from(value: String) -> Self {
        Self(value.into())
    }
}

impl PartialEq<str> for Name {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == other
    }
}

impl PartialEq<&str> for Name {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Name;

    #[test]
    fn dunder_detection() {
        assert!(Name::new_static("__init__").is_dunder());
        assert!(!Name::new_static("_private").is_dunder());
        assert!(!Name::new_static("plain").is_dunder());
    }
}
