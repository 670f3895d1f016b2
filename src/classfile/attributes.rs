//! Parsed specializations of the recognized class-file attributes
//! (spec.md §4.3). Unrecognized attributes are skipped structurally by the
//! parser and never reach this module.

use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct ExceptionTableEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    /// `None` means catch-all (a `catch_type` of 0 in the wire format).
    pub catch_type: Option<Rc<str>>,
}

#[derive(Debug, Clone, Default)]
pub struct LineNumberEntry {
    pub start_pc: u16,
    pub line_number: u16,
}

#[derive(Debug, Clone)]
pub struct Code {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionTableEntry>,
    pub line_number_table: Vec<LineNumberEntry>,
}

#[derive(Debug, Clone)]
pub struct BootstrapMethod {
    /// Constant-pool index of the `MethodHandle` constant.
    pub method_handle_index: u16,
    /// Constant-pool indices of the static arguments.
    pub arguments: Vec<u16>,
}

#[derive(Debug, Clone)]
pub struct InnerClassEntry {
    pub inner_class: Rc<str>,
    pub outer_class: Option<Rc<str>>,
    pub inner_name: Option<Rc<str>>,
    pub access_flags: u16,
}

#[derive(Debug, Clone)]
pub struct EnclosingMethod {
    pub class: Rc<str>,
    pub method_name_and_type: Option<(Rc<str>, Rc<str>)>,
}

#[derive(Debug, Clone)]
pub struct RecordComponent {
    pub name: Rc<str>,
    pub descriptor: Rc<str>,
}

#[derive(Debug, Clone, Default)]
pub struct Record {
    pub components: Vec<RecordComponent>,
}

#[derive(Debug, Clone)]
pub struct RequiresEntry {
    pub module: Rc<str>,
    pub access_flags: u16,
    pub version: Option<Rc<str>>,
}

#[derive(Debug, Clone)]
pub struct ExportsEntry {
    pub package: Rc<str>,
    pub access_flags: u16,
    pub exports_to: Vec<Rc<str>>,
}

#[derive(Debug, Clone)]
pub struct OpensEntry {
    pub package: Rc<str>,
    pub access_flags: u16,
    pub opens_to: Vec<Rc<str>>,
}

#[derive(Debug, Clone)]
pub struct ProvidesEntry {
    pub interface: Rc<str>,
    pub implementations: Vec<Rc<str>>,
}

/// The `Module` attribute, fully parsed per spec.md §6 (requires / exports
/// / opens / uses / provides).
#[derive(Debug, Clone, Default)]
pub struct ModuleAttribute {
    pub name: Rc<str>,
    pub access_flags: u16,
    pub version: Option<Rc<str>>,
    pub requires: Vec<RequiresEntry>,
    pub exports: Vec<ExportsEntry>,
    pub opens: Vec<OpensEntry>,
    pub uses: Vec<Rc<str>>,
    pub provides: Vec<ProvidesEntry>,
}

impl ModuleAttribute {
    /// Package membership by shared prefix up to the last `/`, matched
    /// against export or open entries; an empty `*_to` list means
    /// unconditionally exported/opened.
    pub fn can_access_package(&self, package: &str, requesting_module: &str, reflective: bool) -> bool {
        if reflective {
            self.opens.iter().any(|e| {
                e.package.as_ref() == package
                    && (e.opens_to.is_empty()
                        || e.opens_to.iter().any(|m| m.as_ref() == requesting_module))
            })
        } else {
            self.exports.iter().any(|e| {
                e.package.as_ref() == package
                    && (e.exports_to.is_empty()
                        || e.exports_to.iter().any(|m| m.as_ref() == requesting_module))
            })
        }
    }

    /// Service-provider visibility is narrower than package visibility and
    /// nothing in the resolver needs it yet; always reports unreachable.
    pub fn can_access_service(&self, _target_interface: &str) -> bool {
        false
    }

    /// Same rationale as `can_access_service`: no caller resolves providers.
    pub fn providers_of(&self, _target_interface: &str) -> &[Rc<str>] {
        &[]
    }
}
