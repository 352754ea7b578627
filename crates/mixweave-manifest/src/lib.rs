//! # Mixweave Manifest
//!
//! Declarative composition manifests. A manifest lists the compositions a
//! program uses, so they can be checked against a [`TypeUniverse`] and
//! synthesized ahead of first use.
//!
//! ```toml
//! schema = 1
//!
//! [[composition]]
//! target = "Order"
//! interfaces = ["IPrintable"]
//!
//! [[composition.mixin]]
//! type = "Audit"
//!
//! [[composition.mixin]]
//! type = "Vault"
//! visibility = "private"
//! after = ["Audit"]
//! ```
//!
//! The same document shape is accepted as JSON.
//!
//! [`TypeUniverse`]: mixweave_kernel::TypeUniverse

pub mod error;
pub mod manifest;
pub mod report;
pub mod validate;

pub use error::ManifestError;
pub use manifest::{CompositionEntry, MANIFEST_SCHEMA, Manifest, MixinEntry};
pub use report::{ValidationIssue, ValidationReport};
pub use validate::{precompose, validate};
