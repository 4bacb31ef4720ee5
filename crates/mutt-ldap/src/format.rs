//! Turning directory entries into mail addresses.

use crate::entry::DirectoryEntry;
use std::fmt;

/// Characters that force a display name to be quoted (RFC 5322 specials).
const SPECIALS: &[char] = &['(', ')', '<', '>', '@', ',', ':', ';', '.', '"', '[', ']', '\\'];

/// A mail address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    /// Display name, usually the entry's common name.
    pub name: Option<String>,
    /// The mail attribute value.
    pub email: String,
}

impl Address {
    /// Creates an address.
    #[must_use]
    pub fn new(name: Option<String>, email: impl Into<String>) -> Self {
        Self {
            name,
            email: email.into(),
        }
    }
}

impl fmt::Display for Address {
    /// Writes `Name <email>`, quoting the name when it contains specials, or the bare address
    /// when there is no name.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name.as_deref().filter(|name| !name.is_empty()) {
            Some(name) if name.contains(SPECIALS) => {
                let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                write!(f, "\"{escaped}\" <{}>", self.email)
            }
            Some(name) => write!(f, "{name} <{}>", self.email),
            None => f.write_str(&self.email),
        }
    }
}

/// Yields one address per `mail` value of `entry`, in attribute order.
///
/// Every address carries the entry's last `cn` value as its name. Entries without `mail`
/// yield nothing.
pub fn format_entry(entry: &DirectoryEntry) -> impl Iterator<Item = Address> + '_ {
    let name = entry.last("cn");
    entry
        .values("mail")
        .unwrap_or_default()
        .iter()
        .map(move |email| Address::new(name.map(str::to_owned), email.as_str()))
}

/// Sorts `entries` and flattens their addresses.
#[must_use]
pub fn format_results(mut entries: Vec<DirectoryEntry>) -> Vec<Address> {
    entries.sort();
    entries.iter().flat_map(|entry| format_entry(entry)).collect()
}

/// Renders the count line followed by one address per line.
#[must_use]
pub fn render(addresses: &[Address]) -> String {
    let mut output = format!("{} addresses found:\n", addresses.len());
    for address in addresses {
        output.push_str(&address.to_string());
        output.push('\n');
    }
    output
}
