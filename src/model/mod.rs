//! Capability/requirement model.
//!
//! Resources are stored in a session-scoped `ResourceArena` and addressed by
//! `ResourceRef` handles, so identity never depends on structural equality.
//! Modules owned by the host registry use the `ResourceRef::Module` variant and
//! are never stored in an arena.

pub mod attribute;
pub mod capability;
pub mod resource;

pub use attribute::{AttributeValue, Version};
pub use capability::{Capability, ModuleId, Requirement, ResourceId, ResourceRef, names};
pub use resource::{Resource, ResourceArena, ResourceBuilder};
