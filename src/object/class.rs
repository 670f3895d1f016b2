//! The runtime "Class-reference" (spec.md §3): a tagged variant over a
//! loaded class, an array class, or a primitive class. Cross-references
//! that would otherwise cycle (superclass held by a loader that also
//! (transitively) holds the subclass, nest-host back-pointers) are `Weak`
//! per spec.md §9's "true back-references are weak."

use super::field::FieldPtr;
use super::method::MethodPtr;
use super::{Monitor, ResolvedCache};
use crate::classfile::model::ClassFile;
use crate::loader::Loader;
use crate::runtime::value::Slot;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

/// A fully loaded, linked class.
pub struct Class {
    pub classfile: Rc<ClassFile>,
    pub name: Rc<str>,
    pub super_class: RefCell<Option<ClassRef>>,
    pub interfaces: RefCell<Vec<ClassRef>>,
    pub fields: Vec<FieldPtr>,
    pub methods: Vec<MethodPtr>,
    pub static_field_count: usize,
    pub instance_field_count: usize,
    pub static_fields: RefCell<Vec<Slot>>,
    pub defining_loader: Weak<Loader>,
    pub resolved_cache: ResolvedCache,
    pub nest_host: RefCell<Option<ClassRef>>,
    pub initialized: Cell<bool>,
    pub initializing: Cell<bool>,
    pub monitor: RefCell<Monitor>,
}

impl Class {
    pub fn is_interface(&self) -> bool {
        self.classfile.is_interface()
    }

    pub fn package(&self) -> &str {
        self.classfile.package()
    }

    pub fn find_declared_field(&self, name: &str) -> Option<FieldPtr> {
        self.fields.iter().find(|f| f.name.as_ref() == name).cloned()
    }

    pub fn find_declared_method(&self, name: &str, descriptor: &str) -> Option<MethodPtr> {
        self.methods
            .iter()
            .find(|m| m.name.as_ref() == name && m.descriptor.as_ref() == descriptor)
            .cloned()
    }

    /// Walks the superclass chain to `java/lang/Object` (spec.md §4.4 "is
    /// subclass").
    pub fn is_subclass_of(self_ref: &ClassRef, other: &ClassRef) -> bool {
        let mut current = Some(self_ref.clone());
        while let Some(class_ref) = current {
            if class_ref.name() == other.name() {
                return true;
            }
            current = match &class_ref {
                ClassRef::Loaded(c) => c.super_class.borrow().clone(),
                _ => None,
            };
        }
        false
    }
}

/// A synthesized array class: base type + dimension count.
pub struct ArrayClass {
    pub name: Rc<str>,
    pub element: ClassRef,
    pub dimensions: u32,
    pub defining_loader: Weak<Loader>,
    pub resolved_cache: ResolvedCache,
    pub monitor: RefCell<Monitor>,
}

/// One of the nine primitive classes, process-wide singletons (spec.md
/// §9 "Static mutable singletons").
pub struct PrimitiveClass {
    pub tag: char,
    pub name: Rc<str>,
    pub resolved_cache: ResolvedCache,
}

#[derive(Clone)]
pub enum ClassRef {
    Loaded(Rc<Class>),
    Array(Rc<ArrayClass>),
    Primitive(Rc<PrimitiveClass>),
}

impl ClassRef {
    pub fn name(&self) -> Rc<str> {
        match self {
            ClassRef::Loaded(c) => c.name.clone(),
            ClassRef::Array(a) => a.name.clone(),
            ClassRef::Primitive(p) => p.name.clone(),
        }
    }

    pub fn defining_loader(&self) -> Option<Rc<Loader>> {
        match self {
            ClassRef::Loaded(c) => c.defining_loader.upgrade(),
            ClassRef::Array(a) => a.defining_loader.upgrade(),
            ClassRef::Primitive(_) => None,
        }
    }

    pub fn resolved_cache(&self) -> &ResolvedCache {
        match self {
            ClassRef::Loaded(c) => &c.resolved_cache,
            ClassRef::Array(a) => &a.resolved_cache,
            ClassRef::Primitive(p) => &p.resolved_cache,
        }
    }

    pub fn as_loaded(&self) -> Option<&Rc<Class>> {
        match self {
            ClassRef::Loaded(c) => Some(c),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ClassRef::Array(_))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, ClassRef::Primitive(_))
    }

    pub fn is_interface(&self) -> bool {
        matches!(self, ClassRef::Loaded(c) if c.is_interface())
    }

    /// spec.md §4.4 "same package": same defining loader and equal prefix
    /// up to the last `/`.
    pub fn same_package(&self, other: &ClassRef) -> bool {
        let same_loader = match (self.defining_loader(), other.defining_loader()) {
            (Some(a), Some(b)) => Rc::ptr_eq(&a, &b),
            (None, None) => true,
            _ => false,
        };
        same_loader && package_of(&self.name()) == package_of(&other.name())
    }

    /// spec.md §4.4 "can access class": target is public, or same package.
    pub fn can_access_class(&self, accessor: &ClassRef) -> bool {
        match self {
            ClassRef::Loaded(c) => c.classfile.is_public() || self.same_package(accessor),
            _ => true,
        }
    }

    /// Nest-host resolution (spec.md §4.4): either the named host (if the
    /// host lists this class in its `NestMembers` and they share a
    /// package), or the class itself.
    pub fn nest_host(&self) -> ClassRef {
        let ClassRef::Loaded(class) = self else {
            return self.clone();
        };
        if let Some(cached) = class.nest_host.borrow().clone() {
            return cached;
        }
        let host = class
            .classfile
            .nest_host
            .as_ref()
            .and_then(|host_name| {
                let loader = class.defining_loader.upgrade()?;
                let host_ref = loader.load(host_name).ok()?;
                let ClassRef::Loaded(host_class) = &host_ref else {
                    return None;
                };
                let lists_member = host_class
                    .classfile
                    .nest_members
                    .iter()
                    .any(|m| m.as_ref() == class.name.as_ref());
                if lists_member && host_ref.same_package(self) {
                    Some(host_ref)
                } else {
                    None
                }
            })
            .unwrap_or_else(|| self.clone());
        *class.nest_host.borrow_mut() = Some(host.clone());
        host
    }

    /// spec.md §4.4 "can access member".
    pub fn can_access_member(&self, accessor: &ClassRef, member_access_flags: u16) -> bool {
        const PUBLIC: u16 = 0x0001;
        const PRIVATE: u16 = 0x0002;
        const PROTECTED: u16 = 0x0004;

        if member_access_flags & PUBLIC != 0 {
            return true;
        }
        if member_access_flags & PROTECTED != 0 {
            if Class::is_subclass_of(accessor, self) || self.same_package(accessor) {
                return true;
            }
        }
        if member_access_flags & PRIVATE != 0 {
            let self_host = self.nest_host().name();
            let accessor_host = accessor.nest_host().name();
            return self_host == accessor_host;
        }
        if member_access_flags & (PUBLIC | PRIVATE | PROTECTED) == 0 {
            // package-private
            return self.same_package(accessor);
        }
        false
    }
}

fn package_of(name: &str) -> &str {
    match name.rfind('/') {
        Some(idx) => &name[..idx],
        None => "",
    }
}
