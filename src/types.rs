//! Caller-owned table of annotation and relation types.
//!
//! Type names are interned once into small integer [`TypeId`]s. The table is
//! passed explicitly into compilation (see [`crate::compile_with`]) so that a
//! compiled program is a pure function of its source text and the table.

use std::collections::HashMap;

/// Interned type identifier (index into the owning [`TypeTable`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Annotation,
    Relation,
}

impl TypeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            TypeKind::Annotation => "annotation",
            TypeKind::Relation => "relation",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub name: String,
    pub kind: TypeKind,
    /// Parent in the type hierarchy, if any.
    pub parent: Option<TypeId>,
}

#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    descriptors: Vec<TypeDescriptor>,
    by_name: HashMap<String, TypeId>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or look up) an annotation type.
    pub fn annotation(&mut self, name: &str) -> TypeId {
        self.intern(name, TypeKind::Annotation, None)
    }

    /// Register (or look up) a relation type.
    pub fn relation(&mut self, name: &str) -> TypeId {
        self.intern(name, TypeKind::Relation, None)
    }

    /// Register a type under `parent`. An already registered name keeps its
    /// original descriptor.
    pub fn register(&mut self, name: &str, kind: TypeKind, parent: Option<TypeId>) -> TypeId {
        self.intern(name, kind, parent)
    }

    fn intern(&mut self, name: &str, kind: TypeKind, parent: Option<TypeId>) -> TypeId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = TypeId(self.descriptors.len() as u32);
        self.descriptors.push(TypeDescriptor { name: name.to_string(), kind, parent });
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeDescriptor> {
        self.descriptors.get(id.index())
    }

    /// Name of `id`, or `"?"` for an id from another table.
    pub fn name(&self, id: TypeId) -> &str {
        self.get(id).map(|d| d.name.as_str()).unwrap_or("?")
    }

    /// True when `id` equals `ancestor` or descends from it.
    pub fn is_a(&self, id: TypeId, ancestor: TypeId) -> bool {
        let mut current = Some(id);
        while let Some(cur) = current {
            if cur == ancestor {
                return true;
            }
            current = self.get(cur).and_then(|d| d.parent);
        }
        false
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
