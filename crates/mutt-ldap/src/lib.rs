//! LDAP address searches for mutt.
//!
//! Point mutt's `query_command` at the `mutt-ldap` binary:
//!
//! ```text
//! set query_command = "mutt-ldap '%s'"
//! ```
//!
//! The crate opens one directory session, runs a substring search over `cn`, `uid` and `mail`
//! under the configured base DN, and formats every mail value as `Name <address>`.

#![warn(missing_docs)]

mod client;
mod entry;
mod format;
mod query;

pub use client::{
    connection_url, search_filter, DirectoryClient, DirectoryConnector, DirectorySession,
    Endpoint, LdapConnector,
};
pub use entry::DirectoryEntry;
pub use format::{format_entry, format_results, render, Address};
pub use query::{join_query, lookup};

/// Convenient result alias that reuses the core error type.
pub type Result<T> = mutt_ldap_core::Result<T>;
