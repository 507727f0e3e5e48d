use std::fmt;

use serde::{Deserialize, Serialize};

/// Type tag of a synthesized field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum DataKind {
    Byte,
    Word,
    DWord,
    QWord,
    /// NUL-terminated ASCII, padded to the field size
    String,
    /// undefined bytes
    Bytes,
}

impl DataKind {
    /// Natural size, for kinds that have one.
    pub fn natural_size(self) -> Option<u64> {
        match self {
            DataKind::Byte => Some(1),
            DataKind::Word => Some(2),
            DataKind::DWord => Some(4),
            DataKind::QWord => Some(8),
            DataKind::String | DataKind::Bytes => None,
        }
    }
}

/// Category (namespace) a structure is filed under in the type registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CategoryPath(String);

impl CategoryPath {
    pub const ROOT: &'static str = "/";
    pub const ELF: &'static str = "/ELF";
    pub const MACHO: &'static str = "/MachO";

    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn root() -> Self {
        Self::new(Self::ROOT)
    }

    pub fn elf() -> Self {
        Self::new(Self::ELF)
    }

    pub fn macho() -> Self {
        Self::new(Self::MACHO)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CategoryPath {
    fn default() -> Self {
        Self::root()
    }
}

impl fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: DataKind,
    pub size: u64,
    pub offset: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// An ordered field layout with a name and a category.
///
/// Built with [`StructureDescriptor::builder`]; offsets are assigned in
/// insertion order, so fields are always packed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructureDescriptor {
    name: String,
    category: CategoryPath,
    fields: Vec<FieldDescriptor>,
    size: u64,
}

impl StructureDescriptor {
    pub fn builder(name: impl Into<String>) -> StructureBuilder {
        StructureBuilder {
            name: name.into(),
            category: CategoryPath::default(),
            fields: Vec::new(),
            size: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> &CategoryPath {
        &self.category
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Copy of this structure filed under `category`.
    pub fn with_category(&self, category: CategoryPath) -> Self {
        Self {
            category,
            ..self.clone()
        }
    }

    /// Field names and sizes, the shape used by tests and reports.
    pub fn layout(&self) -> Vec<(&str, u64)> {
        self.fields.iter().map(|f| (f.name.as_str(), f.size)).collect()
    }

    /// Key under which two structures count as the same type: the name plus
    /// every field's name, kind, size and offset.
    pub fn shape_key(&self) -> ShapeKey {
        ShapeKey {
            name: self.name.clone(),
            fields: self
                .fields
                .iter()
                .map(|f| (f.name.clone(), f.kind, f.size, f.offset))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeKey {
    pub name: String,
    pub fields: Vec<(String, DataKind, u64, u64)>,
}

pub struct StructureBuilder {
    name: String,
    category: CategoryPath,
    fields: Vec<FieldDescriptor>,
    size: u64,
}

impl StructureBuilder {
    pub fn category(mut self, category: CategoryPath) -> Self {
        self.category = category;
        self
    }

    pub fn field(self, name: &str, kind: DataKind, size: u64) -> Self {
        self.push(name, kind, size, None)
    }

    pub fn commented(self, name: &str, kind: DataKind, size: u64, comment: &str) -> Self {
        self.push(name, kind, size, Some(comment.to_string()))
    }

    /// Field of a fixed-size kind.
    pub fn scalar(self, name: &str, kind: DataKind) -> Self {
        let size = kind.natural_size().unwrap_or(1);
        self.push(name, kind, size, None)
    }

    pub fn dword(self, name: &str) -> Self {
        self.scalar(name, DataKind::DWord)
    }

    pub fn qword(self, name: &str) -> Self {
        self.scalar(name, DataKind::QWord)
    }

    fn push(mut self, name: &str, kind: DataKind, size: u64, comment: Option<String>) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.to_string(),
            kind,
            size,
            offset: self.size,
            comment,
        });
        self.size += size;
        self
    }

    pub fn build(self) -> StructureDescriptor {
        StructureDescriptor {
            name: self.name,
            category: self.category,
            fields: self.fields,
            size: self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builder_packs_offsets() {
        let s = StructureDescriptor::builder("thing")
            .dword("a")
            .field("b", DataKind::String, 6)
            .qword("c")
            .build();
        let offsets: Vec<_> = s.fields().iter().map(|f| f.offset).collect();
        assert_eq!(offsets, vec![0, 4, 10]);
        assert_eq!(s.size(), 18);
        assert_eq!(s.category(), &CategoryPath::root());
    }

    #[test]
    fn category_does_not_change_shape() {
        let s = StructureDescriptor::builder("thing").dword("a").build();
        let tagged = s.with_category(CategoryPath::elf());
        assert_eq!(tagged.category().as_str(), "/ELF");
        assert_eq!(s.shape_key(), tagged.shape_key());
    }

    #[test]
    fn shape_key_sees_field_sizes() {
        let a = StructureDescriptor::builder("x").field("f", DataKind::String, 8).build();
        let b = StructureDescriptor::builder("x").field("f", DataKind::String, 12).build();
        assert_ne!(a.shape_key(), b.shape_key());
    }
}
