//! The lookup pipeline behind the command line.

use crate::client::DirectoryClient;
use crate::format::{format_results, Address};
use crate::Result;

/// Joins command-line words into a single query, separated by single spaces.
#[must_use]
pub fn join_query<S: AsRef<str>>(words: &[S]) -> String {
    words
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs one lookup: join the words, search with a session opened for the call, and format the
/// sorted results.
///
/// # Errors
///
/// Propagates configuration, connection, bind and search errors from the client.
pub async fn lookup<S: AsRef<str>>(client: &DirectoryClient, words: &[S]) -> Result<Vec<Address>> {
    let query = join_query(words);
    let entries = client.search(&query, None).await?;
    Ok(format_results(entries))
}
