//! The loader graph (spec.md §4.4): each [`Loader`] delegates to its
//! parent before attempting to define a class itself, tracks classes
//! currently being loaded to detect circular inheritance, and owns the
//! classes it defines for their lifetime (a class's `defining_loader`
//! is a `Weak` back-reference into here).

use crate::byte_source::ByteSource;
use crate::classfile::{self, model::ClassFile};
use crate::error::{LoaderError, SourceError};
use crate::object::class::{ArrayClass, Class, ClassRef, PrimitiveClass};
use crate::object::field::Field;
use crate::object::method::Method;
use crate::object::primitive::Primitives;
use crate::object::{Monitor, ResolvedCache};
use crate::runtime::value::Slot;
use log::{debug, trace};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};

/// Ordered archive roots searched for a class, per spec.md §4.4:
/// local classpath entries first in declaration order, the built-in
/// module archive last.
pub struct Loader {
    parent: Option<Rc<Loader>>,
    archive_roots: Vec<Rc<dyn ByteSource>>,
    primitives: Rc<Primitives>,
    defined: RefCell<HashMap<Rc<str>, ClassRef>>,
    currently_loading: RefCell<HashSet<Rc<str>>>,
}

impl Loader {
    pub fn new_bootstrap(archive_roots: Vec<Rc<dyn ByteSource>>, primitives: Rc<Primitives>) -> Rc<Loader> {
        Rc::new(Loader {
            parent: None,
            archive_roots,
            primitives,
            defined: RefCell::new(HashMap::new()),
            currently_loading: RefCell::new(HashSet::new()),
        })
    }

    pub fn new_child(parent: &Rc<Loader>, archive_roots: Vec<Rc<dyn ByteSource>>) -> Rc<Loader> {
        Rc::new(Loader {
            parent: Some(parent.clone()),
            archive_roots,
            primitives: parent.primitives.clone(),
            defined: RefCell::new(HashMap::new()),
            currently_loading: RefCell::new(HashSet::new()),
        })
    }

    /// Loads (defining if necessary) the class, array class, or
    /// primitive class named `name`, in internal binary-name form
    /// (`java/lang/Object`, `[I`, `[Ljava/lang/String;`).
    pub fn load(self: &Rc<Self>, name: &str) -> Result<ClassRef, LoaderError> {
        if let Some(rest) = name.strip_prefix('[') {
            return self.load_array(rest, 1);
        }
        if let Some(cached) = self.defined.borrow().get(name) {
            return Ok(cached.clone());
        }
        if let Some(parent) = &self.parent {
            match parent.load(name) {
                Ok(class_ref) => return Ok(class_ref),
                Err(LoaderError::Source(SourceError::NotFound)) => {}
                Err(other) => return Err(other),
            }
        }
        self.define(name)
    }

    fn load_array(self: &Rc<Self>, rest: &str, dimensions: u32) -> Result<ClassRef, LoaderError> {
        let array_name: Rc<str> = Rc::from(format!("{}{}", "[".repeat(dimensions as usize), rest));
        if let Some(cached) = self.defined.borrow().get(&array_name) {
            return Ok(cached.clone());
        }
        let element = if let Some(next) = rest.strip_prefix('[') {
            self.load_array(next, dimensions + 1)?
        } else if let Some(class_name) = rest.strip_prefix('L').and_then(|s| s.strip_suffix(';')) {
            self.load(class_name)?
        } else {
            let tag = rest.chars().next().ok_or_else(|| {
                LoaderError::ClassFormat(crate::error::ClassFormatError::Malformed(
                    "empty array element descriptor".into(),
                ))
            })?;
            self.primitives
                .by_tag(tag)
                .cloned()
                .ok_or_else(|| {
                    LoaderError::ClassFormat(crate::error::ClassFormatError::Malformed(format!(
                        "unknown primitive array element tag `{tag}`"
                    )))
                })?
        };
        let array_class = ClassRef::Array(Rc::new(ArrayClass {
            name: array_name.clone(),
            element,
            dimensions,
            defining_loader: Rc::downgrade(self),
            resolved_cache: ResolvedCache::default(),
            monitor: RefCell::new(Monitor::default()),
        }));
        self.defined
            .borrow_mut()
            .insert(array_name, array_class.clone());
        Ok(array_class)
    }

    fn define(self: &Rc<Self>, name: &str) -> Result<ClassRef, LoaderError> {
        if !self.currently_loading.borrow_mut().insert(Rc::from(name)) {
            return Err(LoaderError::Circularity(name.to_string()));
        }
        let result = self.define_inner(name);
        self.currently_loading.borrow_mut().remove(name);
        result
    }

    fn define_inner(self: &Rc<Self>, name: &str) -> Result<ClassRef, LoaderError> {
        let path = format!("{name}.class");
        let bytes = self.read_bytes(&path)?;
        let classfile = classfile::parse_class(&bytes)?;
        if classfile.this_class.as_ref() != name {
            return Err(LoaderError::NameMismatch {
                requested: name.to_string(),
                found: classfile.this_class.to_string(),
            });
        }
        trace!("defining class {name}");
        self.link(classfile)
    }

    fn read_bytes(&self, path: &str) -> Result<Vec<u8>, LoaderError> {
        for root in &self.archive_roots {
            if root.exists(path) {
                return root.read_all(path).map_err(LoaderError::Source);
            }
        }
        Err(LoaderError::Source(SourceError::NotFound))
    }

    /// Resolves the superclass/interface graph, assigns field slots, and
    /// installs the class in this loader's defined map.
    fn link(self: &Rc<Self>, classfile: ClassFile) -> Result<ClassRef, LoaderError> {
        let super_class = match &classfile.super_class {
            Some(super_name) => {
                let super_ref = self.load(super_name)?;
                if super_ref.is_interface() {
                    return Err(LoaderError::IncompatibleSuper(format!(
                        "{super_name} is an interface"
                    )));
                }
                if let ClassRef::Loaded(super_class) = &super_ref {
                    if super_class.classfile.is_final() {
                        return Err(LoaderError::IncompatibleSuper(format!(
                            "{super_name} is final"
                        )));
                    }
                    let permitted = &super_class.classfile.permitted_subclasses;
                    if !permitted.is_empty() {
                        let same_package =
                            package_of(super_name) == package_of(&classfile.this_class);
                        if !(super_class.classfile.is_public() || same_package) {
                            return Err(LoaderError::IncompatibleSuper(format!(
                                "{super_name} is a sealed class inaccessible to {}",
                                classfile.this_class
                            )));
                        }
                        if !permitted.iter().any(|p| p.as_ref() == classfile.this_class.as_ref()) {
                            return Err(LoaderError::IncompatibleSuper(format!(
                                "{super_name} does not permit {} as a subclass",
                                classfile.this_class
                            )));
                        }
                    }
                }
                Some(super_ref)
            }
            None => None,
        };
        let interfaces = classfile
            .interfaces
            .iter()
            .map(|name| {
                let iface = self.load(name)?;
                if !iface.is_interface() {
                    return Err(LoaderError::IncompatibleSuper(format!(
                        "{name} is not an interface"
                    )));
                }
                Ok(iface)
            })
            .collect::<Result<Vec<_>, LoaderError>>()?;

        let instance_base = super_class
            .as_ref()
            .and_then(ClassRef::as_loaded)
            .map(|c| c.instance_field_count)
            .unwrap_or(0);

        let mut instance_count = instance_base;
        let mut static_count = 0usize;
        let mut slot_indices = Vec::with_capacity(classfile.fields.len());
        for f in &classfile.fields {
            let is_static = f.access_flags & 0x0008 != 0;
            let slot_index = if is_static {
                let idx = static_count;
                static_count += 1;
                idx
            } else {
                let idx = instance_count;
                instance_count += 1;
                idx
            };
            slot_indices.push(slot_index);
        }

        let static_fields = classfile
            .fields
            .iter()
            .filter(|f| f.access_flags & 0x0008 != 0)
            .map(|f| default_slot_for(&f.descriptor))
            .collect();

        let name = classfile.this_class.clone();
        let classfile = Rc::new(classfile);
        let classfile_for_closure = classfile.clone();
        let class = Rc::new_cyclic(|weak_self: &Weak<Class>| {
            let fields = classfile_for_closure
                .fields
                .iter()
                .zip(slot_indices)
                .map(|(f, slot_index)| {
                    Rc::new(Field {
                        access_flags: f.access_flags,
                        name: f.name.clone(),
                        descriptor: f.descriptor.clone(),
                        constant_value_index: f.constant_value_index,
                        slot_index,
                        owner: weak_self.clone(),
                    })
                })
                .collect();
            let methods = classfile_for_closure
                .methods
                .iter()
                .map(|m| {
                    Rc::new(Method {
                        access_flags: m.access_flags,
                        name: m.name.clone(),
                        descriptor: m.descriptor.clone(),
                        parsed_descriptor: m.parsed_descriptor.clone(),
                        code: m.code.clone(),
                        exceptions: m.exceptions.clone(),
                        owner: weak_self.clone(),
                    })
                })
                .collect();
            Class {
                classfile: classfile_for_closure,
                name: name.clone(),
                super_class: RefCell::new(super_class),
                interfaces: RefCell::new(interfaces),
                fields,
                methods,
                static_field_count: static_count,
                instance_field_count: instance_count,
                static_fields: RefCell::new(static_fields),
                defining_loader: Rc::downgrade(self),
                resolved_cache: ResolvedCache::default(),
                nest_host: RefCell::new(None),
                initialized: Cell::new(false),
                initializing: Cell::new(false),
                monitor: RefCell::new(Monitor::default()),
            }
        });
        let class_ref = ClassRef::Loaded(class);
        self.defined.borrow_mut().insert(name, class_ref.clone());
        debug!("loaded class {}", class_ref.name());
        Ok(class_ref)
    }
}

fn default_slot_for(descriptor: &str) -> Slot {
    Slot::default_for_descriptor(descriptor)
}

fn package_of(name: &str) -> &str {
    match name.rfind('/') {
        Some(idx) => &name[..idx],
        None => "",
    }
}
