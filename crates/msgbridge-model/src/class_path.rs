//! The set of types visible to the transform.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::decl::{ClassAnnotation, MethodDecl, TypeDecl, TypeKind};
use crate::names::RuntimeNames;
use crate::types::{TypeName, ValueType};

/// All types of a compilation, keyed and iterated by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "ClassPathFile", into = "ClassPathFile")]
pub struct ClassPath {
    runtime: RuntimeNames,
    types: BTreeMap<TypeName, TypeDecl>,
}

/// On-disk shape of a class path.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ClassPathFile {
    #[serde(default)]
    pub runtime: RuntimeNames,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
}

impl From<ClassPathFile> for ClassPath {
    fn from(file: ClassPathFile) -> Self {
        let mut class_path = ClassPath::new(file.runtime);
        for decl in file.types {
            class_path.insert(decl);
        }
        class_path
    }
}

impl From<ClassPath> for ClassPathFile {
    fn from(class_path: ClassPath) -> Self {
        ClassPathFile {
            runtime: class_path.runtime,
            types: class_path.types.into_values().collect(),
        }
    }
}

impl Default for ClassPath {
    fn default() -> Self {
        ClassPath::new(RuntimeNames::default())
    }
}

impl ClassPath {
    /// A class path holding only the bootstrap runtime support types.
    pub fn new(runtime: RuntimeNames) -> Self {
        let mut types = BTreeMap::new();
        for (name, is_interface) in runtime.bootstrap_types() {
            let kind = if is_interface {
                TypeKind::Interface
            } else {
                TypeKind::Class
            };
            let mut decl = TypeDecl::new(name.clone(), kind);
            decl.superclass = if *name == runtime.native_object {
                Some(runtime.object.clone())
            } else if *name == runtime.event || *name == runtime.ordered_collection {
                decl.annotations.push(ClassAnnotation::NativeClass);
                Some(runtime.native_object.clone())
            } else {
                None
            };
            if *name == runtime.native_object {
                decl.annotations.push(ClassAnnotation::NativeClass);
            }
            types.insert(name.clone(), decl);
        }
        ClassPath { runtime, types }
    }

    pub fn runtime(&self) -> &RuntimeNames {
        &self.runtime
    }

    /// Insert or replace a type.
    pub fn insert(&mut self, decl: TypeDecl) {
        self.types.insert(decl.name.clone(), decl);
    }

    pub fn get(&self, name: &TypeName) -> Option<&TypeDecl> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &TypeName) -> bool {
        self.types.contains_key(name)
    }

    /// Types in name order.
    pub fn types(&self) -> impl Iterator<Item = &TypeDecl> {
        self.types.values()
    }

    pub fn type_names(&self) -> impl Iterator<Item = &TypeName> {
        self.types.keys()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Walk the superclass chain of `name`, excluding `name` itself.
    pub fn superclasses<'a>(&'a self, name: &TypeName) -> Superclasses<'a> {
        Superclasses {
            class_path: self,
            next: self.get(name).and_then(|d| d.superclass.clone()),
            seen: HashSet::from([name.clone()]),
        }
    }

    /// Whether a value of type `from` can be stored in a slot of type `to`.
    ///
    /// Walks the superclass/interface DAG breadth-first with a visited set; unknown types are
    /// only assignable to themselves.
    pub fn is_assignable(&self, from: &TypeName, to: &TypeName) -> bool {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([from.clone()]);
        while let Some(current) = queue.pop_front() {
            if &current == to {
                return true;
            }
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(decl) = self.get(&current) {
                queue.extend(decl.superclass.iter().cloned());
                queue.extend(decl.interfaces.iter().cloned());
            }
        }
        false
    }

    /// [`is_assignable`](Self::is_assignable) for a value type; primitives never are.
    pub fn value_assignable(&self, ty: &ValueType, to: &TypeName) -> bool {
        match ty {
            ValueType::Object(name) => self.is_assignable(name, to),
            _ => false,
        }
    }

    /// Find a method on `start` or its superclasses, stopping after the universal object root.
    pub fn find_method_in_hierarchy(
        &self,
        start: &TypeName,
        name: &str,
        params: &[ValueType],
        ret: &ValueType,
    ) -> Option<(&TypeDecl, &MethodDecl)> {
        let first = self.get(start)?;
        std::iter::once(first)
            .chain(self.superclasses(start))
            .find_map(|decl| decl.find_method(name, params, ret).map(|m| (decl, m)))
    }
}

/// Iterator over a superclass chain, guarded against malformed cycles.
pub struct Superclasses<'a> {
    class_path: &'a ClassPath,
    next: Option<TypeName>,
    seen: HashSet<TypeName>,
}

impl<'a> Iterator for Superclasses<'a> {
    type Item = &'a TypeDecl;

    fn next(&mut self) -> Option<Self::Item> {
        let name = self.next.take()?;
        if !self.seen.insert(name.clone()) {
            return None;
        }
        let decl = self.class_path.get(&name)?;
        self.next = decl.superclass.clone();
        Some(decl)
    }
}
