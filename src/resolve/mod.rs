//! Symbolic reference resolution (spec.md §4.5): turns a constant-pool
//! index into a live runtime reference, caching the result on the
//! requesting class so a repeat resolution is a cache hit (spec.md §8).

pub mod dynamic;
pub mod method_handle;

use crate::classfile::constant_pool::ConstantPool;
use crate::classfile::descriptor::{parse_field_descriptor, FieldType};
use crate::error::ResolveError;
use crate::loader::Loader;
use crate::object::class::{Class, ClassRef};
use crate::object::field::{Field, FieldRef, ResolvedField};
use crate::object::method::{Method, MethodRef, ResolvedMethod};
use crate::object::RtRef;
use std::rc::Rc;

/// Resolves a `Class`/`Module`/`Package`/`MethodType`/`String`-by-index
/// `Class` constant to a live [`ClassRef`] (spec.md §4.5 step 1).
pub fn resolve_class(
    pool: &ConstantPool,
    index: u16,
    requesting: &ClassRef,
    loader: &Rc<Loader>,
) -> Result<ClassRef, ResolveError> {
    if let Some(RtRef::Class(cached)) = requesting.resolved_cache().get(index) {
        return Ok(cached);
    }
    let name = pool.class_name(index).map_err(|e| {
        ResolveError::Loader(crate::error::LoaderError::ClassFormat(e))
    })?;
    let resolved = loader.load(&name)?;
    if !resolved.can_access_class(requesting) {
        return Err(ResolveError::IllegalAccess(format!(
            "{} is not accessible from {}",
            resolved.name(),
            requesting.name()
        )));
    }
    requesting
        .resolved_cache()
        .insert(index, RtRef::Class(resolved.clone()));
    Ok(resolved)
}

fn field_type_to_class_ref(
    field_type: &FieldType,
    loader: &Rc<Loader>,
    primitives: &crate::object::primitive::Primitives,
) -> Result<ClassRef, ResolveError> {
    Ok(match field_type {
        FieldType::Class(name) => loader.load(name)?,
        FieldType::Array { .. } => loader.load(&array_descriptor(field_type))?,
        FieldType::Byte => primitives.byte.clone(),
        FieldType::Char => primitives.char.clone(),
        FieldType::Double => primitives.double.clone(),
        FieldType::Float => primitives.float.clone(),
        FieldType::Int => primitives.int.clone(),
        FieldType::Long => primitives.long.clone(),
        FieldType::Short => primitives.short.clone(),
        FieldType::Boolean => primitives.boolean.clone(),
    })
}

fn array_descriptor(field_type: &FieldType) -> String {
    match field_type {
        FieldType::Array { element, dimensions } => {
            format!("{}{}", "[".repeat(*dimensions as usize), element_tag(element))
        }
        other => element_tag(other),
    }
}

fn element_tag(field_type: &FieldType) -> String {
    match field_type {
        FieldType::Byte => "B".into(),
        FieldType::Char => "C".into(),
        FieldType::Double => "D".into(),
        FieldType::Float => "F".into(),
        FieldType::Int => "I".into(),
        FieldType::Long => "J".into(),
        FieldType::Short => "S".into(),
        FieldType::Boolean => "Z".into(),
        FieldType::Class(name) => format!("L{name};"),
        FieldType::Array { element, dimensions } => {
            format!("{}{}", "[".repeat(*dimensions as usize), element_tag(element))
        }
    }
}

/// Walks the class itself, then its superinterfaces (breadth-first over
/// the interface DAG), then its superclass chain, for a declared field
/// (spec.md §4.5's field-lookup order).
fn lookup_field(owner: &ClassRef, name: &str) -> Option<(ClassRef, Rc<Field>)> {
    let mut current = Some(owner.clone());
    while let Some(class_ref) = current {
        if let ClassRef::Loaded(class) = &class_ref {
            if let Some(field) = class.find_declared_field(name) {
                return Some((class_ref.clone(), field));
            }
            for iface in class.interfaces.borrow().iter() {
                if let Some(found) = lookup_field(iface, name) {
                    return Some(found);
                }
            }
        }
        current = match &class_ref {
            ClassRef::Loaded(c) => c.super_class.borrow().clone(),
            _ => None,
        };
    }
    None
}

pub fn resolve_field(
    pool: &ConstantPool,
    index: u16,
    requesting: &ClassRef,
    loader: &Rc<Loader>,
    primitives: &crate::object::primitive::Primitives,
) -> Result<FieldRef, ResolveError> {
    if let Some(RtRef::Field(cached)) = requesting.resolved_cache().get(index) {
        return Ok(cached);
    }
    let (class_name, name, descriptor) = pool.member_ref(index).map_err(|e| {
        ResolveError::Loader(crate::error::LoaderError::ClassFormat(e))
    })?;
    let owner_class = loader.load(&class_name)?;
    let (found_on, field) = lookup_field(&owner_class, &name)
        .ok_or_else(|| ResolveError::NoSuchField(format!("{class_name}.{name}")))?;
    if !found_on.can_access_member(requesting, field.access_flags) {
        return Err(ResolveError::IllegalAccess(format!(
            "{class_name}.{name} is not accessible from {}",
            requesting.name()
        )));
    }
    let field_type = parse_field_descriptor(&descriptor)
        .map_err(|e| ResolveError::Loader(crate::error::LoaderError::ClassFormat(e)))?;
    let resolved_type = field_type_to_class_ref(&field_type, loader, primitives)?;
    let resolved = Rc::new(ResolvedField {
        name,
        field_type: resolved_type,
        owner: found_on,
        field,
    });
    requesting
        .resolved_cache()
        .insert(index, RtRef::Field(resolved.clone()));
    Ok(resolved)
}

/// Walks the superclass chain, then the interface graph, for a declared
/// method matching `name`/`descriptor` (spec.md §4.4's method-lookup
/// order).
fn lookup_method(owner: &ClassRef, name: &str, descriptor: &str) -> Option<(ClassRef, Rc<Method>)> {
    let mut current = Some(owner.clone());
    while let Some(class_ref) = current {
        if let ClassRef::Loaded(class) = &class_ref {
            if let Some(method) = class.find_declared_method(name, descriptor) {
                return Some((class_ref.clone(), method));
            }
            for iface in class.interfaces.borrow().iter() {
                if let Some(found) = lookup_method(iface, name, descriptor) {
                    return Some(found);
                }
            }
        }
        current = match &class_ref {
            ClassRef::Loaded(c) => c.super_class.borrow().clone(),
            _ => None,
        };
    }
    None
}

fn resolve_method_ref(
    pool: &ConstantPool,
    index: u16,
    requesting: &ClassRef,
    loader: &Rc<Loader>,
    primitives: &crate::object::primitive::Primitives,
    expect_interface: bool,
    variant: fn(MethodRef) -> RtRef,
) -> Result<MethodRef, ResolveError> {
    const PUBLIC: u16 = 0x0001;

    let cached = requesting.resolved_cache().get(index);
    if let Some(cached) = cached {
        let method_ref = match cached {
            RtRef::ClassMethod(m) | RtRef::InterfaceMethod(m) => Some(m),
            _ => None,
        };
        if let Some(method_ref) = method_ref {
            return Ok(method_ref);
        }
    }
    let (class_name, name, descriptor) = pool.member_ref(index).map_err(|e| {
        ResolveError::Loader(crate::error::LoaderError::ClassFormat(e))
    })?;
    let owner_class = loader.load(&class_name)?;
    if owner_class.is_interface() != expect_interface {
        return Err(ResolveError::IncompatibleClassChange(format!(
            "{class_name} is {}an interface but a {} was requested",
            if owner_class.is_interface() { "" } else { "not " },
            if expect_interface { "InterfaceMethodref" } else { "Methodref" },
        )));
    }
    let (found_on, method) = lookup_method(&owner_class, &name, &descriptor)
        .ok_or_else(|| ResolveError::NoSuchMethod(format!("{class_name}.{name}{descriptor}")))?;
    if expect_interface && (method.access_flags & PUBLIC == 0 || method.is_static()) {
        return Err(ResolveError::NoSuchMethod(format!(
            "{class_name}.{name}{descriptor} is not a public instance method"
        )));
    }
    if !found_on.can_access_member(requesting, method.access_flags) {
        return Err(ResolveError::IllegalAccess(format!(
            "{class_name}.{name}{descriptor} is not accessible from {}",
            requesting.name()
        )));
    }
    let return_type = match &method.parsed_descriptor.return_type {
        crate::classfile::descriptor::ReturnType::Void => primitives.void.clone(),
        crate::classfile::descriptor::ReturnType::Value(ft) => {
            field_type_to_class_ref(ft, loader, primitives)?
        }
    };
    let argument_types = method
        .parsed_descriptor
        .parameters
        .iter()
        .map(|ft| field_type_to_class_ref(ft, loader, primitives))
        .collect::<Result<Vec<_>, _>>()?;
    let resolved = Rc::new(ResolvedMethod {
        name,
        descriptor,
        return_type,
        argument_types,
        owner: found_on,
        method,
    });
    requesting
        .resolved_cache()
        .insert(index, variant(resolved.clone()));
    Ok(resolved)
}

/// Resolves a `Methodref` constant (spec.md §4.5 step 3).
pub fn resolve_method(
    pool: &ConstantPool,
    index: u16,
    requesting: &ClassRef,
    loader: &Rc<Loader>,
    primitives: &crate::object::primitive::Primitives,
) -> Result<MethodRef, ResolveError> {
    resolve_method_ref(pool, index, requesting, loader, primitives, false, RtRef::ClassMethod)
}

/// Resolves an `InterfaceMethodref` constant (spec.md §4.5 step 4).
pub fn resolve_interface_method(
    pool: &ConstantPool,
    index: u16,
    requesting: &ClassRef,
    loader: &Rc<Loader>,
    primitives: &crate::object::primitive::Primitives,
) -> Result<MethodRef, ResolveError> {
    resolve_method_ref(
        pool,
        index,
        requesting,
        loader,
        primitives,
        true,
        RtRef::InterfaceMethod,
    )
}

/// Dynamic dispatch (`invokevirtual`/`invokeinterface`): walks from the
/// receiver's actual class rather than the statically resolved owner
/// (spec.md §4.6).
pub fn select_virtual(receiver_class: &ClassRef, name: &str, descriptor: &str) -> Option<Rc<Method>> {
    lookup_method(receiver_class, name, descriptor).map(|(_, m)| m)
}

pub fn is_assignable(from: &ClassRef, to: &ClassRef) -> bool {
    if from.name() == to.name() {
        return true;
    }
    match (from, to) {
        (ClassRef::Loaded(_), ClassRef::Loaded(_)) => {
            Class::is_subclass_of(from, to) || implements_interface(from, to)
        }
        (ClassRef::Array(a), ClassRef::Array(b)) => {
            a.dimensions == b.dimensions && is_assignable(&a.element, &b.element)
                || (a.dimensions > b.dimensions && matches!(b.element, ClassRef::Loaded(ref c) if c.name.as_ref() == "java/lang/Object"))
        }
        _ => false,
    }
}

fn implements_interface(class_ref: &ClassRef, iface: &ClassRef) -> bool {
    let mut current = Some(class_ref.clone());
    while let Some(c) = current {
        if let ClassRef::Loaded(class) = &c {
            for declared in class.interfaces.borrow().iter() {
                if declared.name() == iface.name() || implements_interface(declared, iface) {
                    return true;
                }
            }
            current = class.super_class.borrow().clone();
        } else {
            current = None;
        }
    }
    false
}
