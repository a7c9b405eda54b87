//! Entity naming: validation predicates and the `(family, qualifier)` pair.
//!
//! Layout names, aliases, and column qualifiers share one identifier
//! ruleset. The predicates are pure; builders turn a rejection into the
//! appropriate layout error.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// A fully-qualified column reference: a family name plus an optional
/// qualifier. A missing qualifier denotes the whole family, which is a
/// valid address only for map-type families.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColumnName {
    family: String,
    qualifier: Option<String>,
}

impl ColumnName {
    pub fn unqualified(family: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            qualifier: None,
        }
    }

    pub fn qualified(family: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self {
            family: family.into(),
            qualifier: Some(qualifier.into()),
        }
    }

    /// Parse `"family"` or `"family:qualifier"`. Only the first `:` splits;
    /// a trailing `:` with nothing after it means no qualifier.
    pub fn parse(s: &str) -> Self {
        match s.split_once(':') {
            Some((family, "")) => Self::unqualified(family),
            Some((family, qualifier)) => Self::qualified(family, qualifier),
            None => Self::unqualified(s),
        }
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub fn is_qualified(&self) -> bool {
        self.qualifier.is_some()
    }
}

impl fmt::Display for ColumnName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}:{}", self.family, q),
            None => write!(f, "{}", self.family),
        }
    }
}

/// Every string is a column address (validity of the parts is checked by
/// the layout compiler, not here), so parsing cannot fail.
impl FromStr for ColumnName {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// Check that a string is a valid primary name for a table, locality
/// group, family, or column: a nonempty run of letters, digits, and
/// underscores that does not start with a digit.
pub fn is_valid_layout_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Check that a string is a valid alias. Aliases follow the same ruleset
/// as primary names; builders run primary names through this predicate as
/// well, so every name a layout exposes satisfies both.
pub fn is_valid_alias(alias: &str) -> bool {
    is_valid_layout_name(alias)
}

/// Check that a string is a valid fully-qualified class name: one or more
/// identifier segments joined by dots.
pub fn is_valid_class_name(name: &str) -> bool {
    !name.is_empty() && name.split('.').all(is_valid_layout_name)
}
