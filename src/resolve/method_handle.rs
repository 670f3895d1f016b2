//! `MethodType`/`MethodHandle` constant resolution (spec.md §4.5 step 5,
//! §6). A method handle's reference kind says whether it denotes a field
//! accessor or an invocation; either way it resolves to the same
//! [`FieldRef`]/[`MethodRef`] the corresponding `*ref` constant would
//! have produced, rather than a `java.lang.invoke.MethodHandle` object --
//! the direct internal dispatch documented in DESIGN.md.

use crate::classfile::constant_pool::{ConstantPool, MethodHandleKind};
use crate::classfile::descriptor::parse_method_descriptor;
use crate::error::ResolveError;
use crate::loader::Loader;
use crate::object::class::ClassRef;
use crate::object::field::FieldRef;
use crate::object::method::MethodRef;
use crate::object::primitive::Primitives;
use crate::object::RtRef;
use std::rc::Rc;

pub enum ResolvedHandle {
    Field(FieldRef),
    Method(MethodRef),
}

/// Resolves a `MethodType` constant to its parsed descriptor (spec.md
/// §4.5 step 5).
pub fn resolve_method_type(
    pool: &ConstantPool,
    index: u16,
    requesting: &ClassRef,
) -> Result<Rc<crate::classfile::descriptor::MethodDescriptor>, ResolveError> {
    if let Some(RtRef::MethodType(cached)) = requesting.resolved_cache().get(index) {
        return Ok(cached);
    }
    let entry = pool
        .get(index)
        .map_err(|e| ResolveError::Loader(crate::error::LoaderError::ClassFormat(e)))?;
    let descriptor_index = match entry {
        crate::classfile::constant_pool::ConstantPoolEntry::MethodType { descriptor_index } => {
            *descriptor_index
        }
        other => {
            return Err(ResolveError::IncompatibleClassChange(format!(
                "index {index} is not a MethodType constant, found {}",
                other.tag_name()
            )))
        }
    };
    let descriptor = pool
        .utf8(descriptor_index)
        .map_err(|e| ResolveError::Loader(crate::error::LoaderError::ClassFormat(e)))?;
    let parsed = parse_method_descriptor(&descriptor)
        .map_err(|e| ResolveError::Loader(crate::error::LoaderError::ClassFormat(e)))?;
    let parsed = Rc::new(parsed);
    requesting
        .resolved_cache()
        .insert(index, RtRef::MethodType(parsed.clone()));
    Ok(parsed)
}

/// Resolves a `MethodHandle` constant (spec.md §4.5 step 5) by
/// dispatching its `reference_kind` to the matching field or method
/// resolution path.
pub fn resolve_method_handle(
    pool: &ConstantPool,
    index: u16,
    requesting: &ClassRef,
    loader: &Rc<Loader>,
    primitives: &Primitives,
) -> Result<ResolvedHandle, ResolveError> {
    let entry = pool
        .get(index)
        .map_err(|e| ResolveError::Loader(crate::error::LoaderError::ClassFormat(e)))?;
    let (kind, reference_index) = match entry {
        crate::classfile::constant_pool::ConstantPoolEntry::MethodHandle {
            reference_kind,
            reference_index,
        } => (
            MethodHandleKind::from_u8(*reference_kind)
                .map_err(|e| ResolveError::Loader(crate::error::LoaderError::ClassFormat(e)))?,
            *reference_index,
        ),
        other => {
            return Err(ResolveError::IncompatibleClassChange(format!(
                "index {index} is not a MethodHandle constant, found {}",
                other.tag_name()
            )))
        }
    };
    match kind {
        MethodHandleKind::GetField
        | MethodHandleKind::GetStatic
        | MethodHandleKind::PutField
        | MethodHandleKind::PutStatic => Ok(ResolvedHandle::Field(super::resolve_field(
            pool,
            reference_index,
            requesting,
            loader,
            primitives,
        )?)),
        MethodHandleKind::InvokeInterface => Ok(ResolvedHandle::Method(
            super::resolve_interface_method(pool, reference_index, requesting, loader, primitives)?,
        )),
        MethodHandleKind::InvokeVirtual
        | MethodHandleKind::InvokeStatic
        | MethodHandleKind::InvokeSpecial
        | MethodHandleKind::NewInvokeSpecial => Ok(ResolvedHandle::Method(super::resolve_method(
            pool,
            reference_index,
            requesting,
            loader,
            primitives,
        )?)),
    }
}
