use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{MarkupTarget, Placement, TypeHandle};
use crate::error::MarkupError;
use crate::structure::{ShapeKey, StructureDescriptor};

/// How [`TypeRegistry`] treats a name that is already bound to another shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// fail the registration with [`MarkupError::Conflict`]
    Reject,
    /// register under `<name>.conflict`, `<name>.conflict1`, ...
    #[default]
    Rename,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisteredType {
    pub handle: TypeHandle,
    pub structure: Arc<StructureDescriptor>,
}

#[derive(Default)]
struct Inner {
    /// `category/name` -> index into `types`
    by_path: HashMap<String, usize>,
    /// name-plus-shape -> index into `types`
    by_shape: HashMap<(String, ShapeKey), usize>,
    types: Vec<RegisteredType>,
}

/// Shared type store. Safe to use from several decodes at once; registration
/// is insert-if-absent keyed by category, name and shape.
#[derive(Default)]
pub struct TypeRegistry {
    policy: ConflictPolicy,
    inner: Mutex<Inner>,
}

fn type_path(category: &str, name: &str) -> String {
    format!("{}/{}", category.trim_end_matches('/'), name)
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: ConflictPolicy) -> Self {
        Self {
            policy,
            inner: Mutex::default(),
        }
    }

    pub fn register(&self, structure: &StructureDescriptor) -> Result<TypeHandle, MarkupError> {
        let category = structure.category().as_str().to_string();
        let shape = (category.clone(), structure.shape_key());

        let mut inner = self.inner.lock();
        if let Some(&idx) = inner.by_shape.get(&shape) {
            return Ok(inner.types[idx].handle.clone());
        }

        let mut name = structure.name().to_string();
        if inner.by_path.contains_key(&type_path(&category, &name)) {
            match self.policy {
                ConflictPolicy::Reject => {
                    return Err(MarkupError::Conflict {
                        name: type_path(&category, &name),
                    })
                }
                ConflictPolicy::Rename => {
                    let base = format!("{}.conflict", structure.name());
                    name = base.clone();
                    let mut n = 1;
                    while inner.by_path.contains_key(&type_path(&category, &name)) {
                        name = format!("{}{}", base, n);
                        n += 1;
                    }
                    log::debug!("renamed conflicting type {} to {}", structure.name(), name);
                }
            }
        }

        let idx = inner.types.len();
        let handle = TypeHandle {
            id: idx,
            name: name.clone(),
            category: structure.category().clone(),
            size: structure.size(),
        };
        inner.by_path.insert(type_path(&category, &name), idx);
        inner.by_shape.insert(shape, idx);
        inner.types.push(RegisteredType {
            handle: handle.clone(),
            structure: Arc::new(structure.clone()),
        });
        Ok(handle)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn lookup(&self, category: &str, name: &str) -> Option<RegisteredType> {
        let inner = self.inner.lock();
        inner
            .by_path
            .get(&type_path(category, name))
            .map(|&idx| inner.types[idx].clone())
    }

    /// Every registered type, in registration order.
    pub fn snapshot(&self) -> Vec<RegisteredType> {
        self.inner.lock().types.clone()
    }
}

/// One container's view of the database: shares the type registry, owns the
/// placements made while decoding that container.
pub struct MarkupSession<'r> {
    registry: &'r TypeRegistry,
    image: Option<Range<u64>>,
    placements: Vec<Placement>,
}

impl<'r> MarkupSession<'r> {
    pub fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            image: None,
            placements: Vec::new(),
        }
    }

    /// Reject placements that fall outside `image`.
    pub fn with_image_range(mut self, image: Range<u64>) -> Self {
        self.image = Some(image);
        self
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn into_placements(self) -> Vec<Placement> {
        self.placements
    }

    /// End of `[start, start + size)`, provided it neither wraps nor leaves
    /// the image.
    fn check_range(&self, start: u64, size: u64, what: &str) -> Result<u64, MarkupError> {
        let invalid = || MarkupError::InvalidAddress {
            address: start,
            what: what.to_string(),
        };
        let end = start.checked_add(size).ok_or_else(invalid)?;
        match &self.image {
            Some(image) if start < image.start || end > image.end => Err(invalid()),
            _ => Ok(end),
        }
    }
}

impl MarkupTarget for MarkupSession<'_> {
    fn register_type(&mut self, structure: &StructureDescriptor) -> Result<TypeHandle, MarkupError> {
        self.registry.register(structure)
    }

    fn create_data(&mut self, address: u64, ty: &TypeHandle) -> Result<(), MarkupError> {
        let end = self.check_range(address, ty.size, &ty.name)?;
        let overlaps = self.placements.iter().any(|p| match p {
            Placement::Data {
                address: other,
                size,
                ..
            } => address < other.saturating_add(*size) && *other < end,
            Placement::Fragment { .. } => false,
        });
        if overlaps {
            return Err(MarkupError::Rejected(format!(
                "data for {} at 0x{:X} overlaps existing data",
                ty.name, address
            )));
        }
        self.placements.push(Placement::Data {
            address,
            type_name: ty.name.clone(),
            size: ty.size,
        });
        Ok(())
    }

    fn create_fragment(&mut self, name: &str, start: u64, size: u64) -> Result<(), MarkupError> {
        self.check_range(start, size, name)?;
        self.placements.push(Placement::Fragment {
            name: name.to_string(),
            start,
            size,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{CategoryPath, DataKind};
    use pretty_assertions::assert_eq;

    fn debug_link(name_size: u64) -> StructureDescriptor {
        StructureDescriptor::builder("Gnu_DebugLink")
            .category(CategoryPath::elf())
            .field("filename", DataKind::String, name_size)
            .dword("crc")
            .build()
    }

    #[test]
    fn identical_shapes_share_a_handle() {
        let reg = TypeRegistry::new();
        let a = reg.register(&debug_link(16)).unwrap();
        let b = reg.register(&debug_link(16)).unwrap();
        assert_eq!(a, b);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn reject_policy_refuses_other_shapes() {
        let reg = TypeRegistry::with_policy(ConflictPolicy::Reject);
        reg.register(&debug_link(16)).unwrap();
        let err = reg.register(&debug_link(20)).unwrap_err();
        assert_eq!(
            err,
            MarkupError::Conflict {
                name: "/ELF/Gnu_DebugLink".to_string()
            }
        );
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn default_policy_renames_other_shapes() {
        let reg = TypeRegistry::new();
        reg.register(&debug_link(16)).unwrap();
        let second = reg.register(&debug_link(20)).unwrap();
        let third = reg.register(&debug_link(24)).unwrap();
        assert_eq!(second.name, "Gnu_DebugLink.conflict");
        assert_eq!(third.name, "Gnu_DebugLink.conflict1");
        assert!(reg.lookup("/ELF", "Gnu_DebugLink.conflict").is_some());
    }

    #[test]
    fn categories_are_separate_namespaces() {
        let reg = TypeRegistry::with_policy(ConflictPolicy::Reject);
        let s = StructureDescriptor::builder("header").dword("a").build();
        reg.register(&s.with_category(CategoryPath::elf())).unwrap();
        reg.register(&s.with_category(CategoryPath::macho())).unwrap();
        let other = StructureDescriptor::builder("header").qword("a").build();
        assert!(reg.register(&other.with_category(CategoryPath::macho())).is_err());
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn concurrent_registration_dedups() {
        let reg = TypeRegistry::new();
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..100 {
                        reg.register(&debug_link(16)).unwrap();
                    }
                });
            }
        });
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn session_rejects_overlapping_data() {
        let reg = TypeRegistry::new();
        let mut session = MarkupSession::new(&reg);
        let ty = session.register_type(&debug_link(16)).unwrap();
        session.create_data(0x100, &ty).unwrap();
        assert!(matches!(
            session.create_data(0x110, &ty),
            Err(MarkupError::Rejected(_))
        ));
        session.create_data(0x114, &ty).unwrap();
        assert_eq!(session.placements().len(), 2);
    }

    #[test]
    fn session_rejects_wrapping_ranges() {
        let reg = TypeRegistry::new();
        let mut session = MarkupSession::new(&reg);
        let ty = session.register_type(&debug_link(16)).unwrap();
        assert!(matches!(
            session.create_data(u64::MAX - 8, &ty),
            Err(MarkupError::InvalidAddress { address, .. }) if address == u64::MAX - 8
        ));
        assert!(session.create_fragment("a", u64::MAX, 2).is_err());
        session.create_data(u64::MAX - 20, &ty).unwrap();
        assert!(session.create_data(u64::MAX - 30, &ty).is_err());
        assert_eq!(session.placements().len(), 1);
    }

    #[test]
    fn session_checks_image_range() {
        let reg = TypeRegistry::new();
        let mut session = MarkupSession::new(&reg).with_image_range(0..0x40);
        assert!(session.create_fragment("a", 0x30, 0x10).is_ok());
        assert!(matches!(
            session.create_fragment("b", 0x38, 0x10),
            Err(MarkupError::InvalidAddress { address: 0x38, .. })
        ));
    }
}
