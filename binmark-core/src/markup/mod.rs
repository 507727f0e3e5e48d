//! Markup: handing decoded structures to the analysis database.
//!
//! The database itself lives outside this crate; decoders only talk to it
//! through [`MarkupTarget`]. [`TypeRegistry`] and [`MarkupSession`] are an
//! in-memory implementation used by the dump tool and by tests.

mod registry;

pub use registry::{ConflictPolicy, MarkupSession, RegisteredType, TypeRegistry};

use serde::{Deserialize, Serialize};

use crate::error::MarkupError;
use crate::structure::{CategoryPath, StructureDescriptor};

/// A registered structure type, as returned by the database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeHandle {
    pub id: usize,
    /// Name the type was registered under; differs from the structure name
    /// when the registry renamed it to resolve a conflict.
    pub name: String,
    pub category: CategoryPath,
    pub size: u64,
}

/// A placement request that was accepted by a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Placement {
    Data {
        address: u64,
        type_name: String,
        size: u64,
    },
    Fragment {
        name: String,
        start: u64,
        size: u64,
    },
}

/// The analysis database as seen by decoders.
pub trait MarkupTarget {
    /// Register `structure` as a named type, or find an identical one.
    fn register_type(&mut self, structure: &StructureDescriptor) -> Result<TypeHandle, MarkupError>;

    /// Create typed data of `ty` at `address`.
    fn create_data(&mut self, address: u64, ty: &TypeHandle) -> Result<(), MarkupError>;

    /// Create a named grouping spanning `[start, start + size)`.
    fn create_fragment(&mut self, name: &str, start: u64, size: u64) -> Result<(), MarkupError>;
}
