//! Directory entry model.

use std::collections::{BTreeMap, HashMap};

/// A search result entry: its distinguished name and attribute values.
///
/// A missing key means the attribute is absent from the entry. Values keep the order the server
/// returned them in. Entries order by `dn` first and then by their attribute maps, which gives
/// a stable presentation order independent of the server's.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct DirectoryEntry {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attribute name to ordered values.
    pub attributes: BTreeMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// Creates an entry with no attributes.
    #[must_use]
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Adds an attribute with its values, replacing any previous values.
    #[must_use]
    pub fn with_attribute<I, S>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Returns all values for the attribute.
    #[must_use]
    pub fn values(&self, attribute: &str) -> Option<&[String]> {
        self.attributes.get(attribute).map(Vec::as_slice)
    }

    /// Returns the last value of the attribute if present.
    #[must_use]
    pub fn last(&self, attribute: &str) -> Option<&str> {
        self.values(attribute)
            .and_then(|values| values.last().map(String::as_str))
    }

    fn from_parts(dn: String, attrs: HashMap<String, Vec<String>>) -> Self {
        Self {
            dn,
            attributes: attrs.into_iter().collect(),
        }
    }
}

impl From<ldap3::SearchEntry> for DirectoryEntry {
    fn from(entry: ldap3::SearchEntry) -> Self {
        Self::from_parts(entry.dn, entry.attrs)
    }
}
