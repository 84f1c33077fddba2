//! # ciwatch-id
//!
//! Typed names for the resources a CI cluster exposes.
//!
//! ## Design Principles
//!
//! - Names are assigned by the CI server; ciwatch never generates them
//! - Names are typed to prevent mixing jobs, nodes, labels and templates
//! - Names are opaque text: spaces and punctuation are preserved as reported
//! - The only structural rule is that a name is never blank
//!
//! Examples:
//! - `JobName`: `build-42`, `deploy-9`
//! - `NodeName`: `linux-builder (i-0abc123)`
//! - `Label`: `linux_large`
//! - `TemplateId`: `linux-builder`

mod error;
mod macros;
mod types;

pub use error::NameError;
pub use types::*;
