//! # mutt-ldap-core
//!
//! Core types shared by the `mutt-ldap` address query helper.
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy and process exit status mapping
//! - [`config`] - Connection and authentication settings, loaded from `~/.mutt-ldap.rc`

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;

pub use config::{AuthSettings, Configuration, ConnectionSettings};
pub use error::{Error, Result};
