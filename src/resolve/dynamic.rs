//! `invokedynamic`/dynamically-computed-constant linkage (spec.md §4.5
//! step 6). Bootstrap-method invocation is reduced to resolving the
//! bootstrap method's own `MethodHandle` constant and caching its target
//! as the call site's resolved reference -- a deliberately narrow reading
//! of "linkage" that skips actually invoking
//! `java.lang.invoke.StringConcatFactory`-style bootstraps, recorded as
//! an open-question decision in DESIGN.md.

use crate::classfile::constant_pool::ConstantPoolEntry;
use crate::error::ResolveError;
use crate::loader::Loader;
use crate::object::class::ClassRef;
use crate::object::primitive::Primitives;
use crate::object::RtRef;
use std::rc::Rc;

use super::method_handle::{resolve_method_handle, ResolvedHandle};

fn linked_call_site(
    pool: &crate::classfile::constant_pool::ConstantPool,
    index: u16,
    bootstrap_method_attr_index: u16,
    requesting: &ClassRef,
    loader: &Rc<Loader>,
    primitives: &Primitives,
) -> Result<RtRef, ResolveError> {
    if let Some(cached) = requesting.resolved_cache().get(index) {
        return Ok(cached);
    }
    let class = requesting.as_loaded().ok_or_else(|| {
        ResolveError::BootstrapMethod("dynamic constants require a loaded class".to_string())
    })?;
    let bsm = class
        .classfile
        .bootstrap_methods
        .get(bootstrap_method_attr_index as usize)
        .ok_or_else(|| {
            ResolveError::BootstrapMethod(format!(
                "no bootstrap method at index {bootstrap_method_attr_index}"
            ))
        })?;
    let handle = resolve_method_handle(pool, bsm.method_handle_index, requesting, loader, primitives)?;
    let resolved = match handle {
        ResolvedHandle::Method(method_ref) => RtRef::ClassMethod(method_ref),
        ResolvedHandle::Field(field_ref) => RtRef::Field(field_ref),
    };
    requesting.resolved_cache().insert(index, resolved.clone());
    Ok(resolved)
}

/// Resolves a `Dynamic` constant (`ldc` of a dynamically-computed
/// constant).
pub fn resolve_dynamic_constant(
    pool: &crate::classfile::constant_pool::ConstantPool,
    index: u16,
    requesting: &ClassRef,
    loader: &Rc<Loader>,
    primitives: &Primitives,
) -> Result<RtRef, ResolveError> {
    let bootstrap_method_attr_index = match pool
        .get(index)
        .map_err(|e| ResolveError::Loader(crate::error::LoaderError::ClassFormat(e)))?
    {
        ConstantPoolEntry::Dynamic { bootstrap_method_attr_index, .. } => {
            *bootstrap_method_attr_index
        }
        other => {
            return Err(ResolveError::IncompatibleClassChange(format!(
                "index {index} is not a Dynamic constant, found {}",
                other.tag_name()
            )))
        }
    };
    linked_call_site(pool, index, bootstrap_method_attr_index, requesting, loader, primitives)
}

/// Resolves an `InvokeDynamic` constant's call site.
pub fn resolve_invoke_dynamic(
    pool: &crate::classfile::constant_pool::ConstantPool,
    index: u16,
    requesting: &ClassRef,
    loader: &Rc<Loader>,
    primitives: &Primitives,
) -> Result<RtRef, ResolveError> {
    let bootstrap_method_attr_index = match pool
        .get(index)
        .map_err(|e| ResolveError::Loader(crate::error::LoaderError::ClassFormat(e)))?
    {
        ConstantPoolEntry::InvokeDynamic { bootstrap_method_attr_index, .. } => {
            *bootstrap_method_attr_index
        }
        other => {
            return Err(ResolveError::IncompatibleClassChange(format!(
                "index {index} is not an InvokeDynamic constant, found {}",
                other.tag_name()
            )))
        }
    };
    linked_call_site(pool, index, bootstrap_method_attr_index, requesting, loader, primitives)
}
