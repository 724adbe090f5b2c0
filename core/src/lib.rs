//! E2E Bootstrap - gets the code under test and hands off to the E2E runner
//!
//! The bootstrap reads the CI environment, optionally clones the repository at
//! the revision under test, installs its dependencies, and then launches the
//! runner from the checkout.

pub mod bootstrap;
pub mod command;
pub mod config;
pub mod error;
pub mod logging;
pub mod started;

pub use bootstrap::{clone_url, resolve_revision, Bootstrap, SourceCheckout};
pub use command::{CommandRunner, CommandSpec, SystemRunner};
pub use config::{BootstrapConfig, CheckoutSource, Layout, Validate, ValidationResult};
pub use error::{Error, Result};
pub use started::Started;
