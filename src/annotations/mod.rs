// src/annotations/mod.rs

//! Output annotations (`props`): presentational properties of declared
//! outputs, stored in the declaration and never in the lock.
//!
//! - [`store`] reads and edits annotations.
//! - [`edit`] performs the format-preserving document edit.
//! - [`templates`] resolves plot template names.

pub mod edit;
pub mod store;
pub mod templates;

pub use store::{OutputAnnotationStore, TEMPLATE_KEY};
pub use templates::{TemplateRegistry, TemplateSource, BUILTIN_TEMPLATES};
