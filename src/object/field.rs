//! Declared fields and resolved field references (spec.md §3, §4.5).

use super::class::ClassRef;
use std::rc::{Rc, Weak};

/// A field as declared in a class file: its slot in the owning class's
/// static or instance slot vector, fixed at link time.
pub struct Field {
    pub access_flags: u16,
    pub name: Rc<str>,
    pub descriptor: Rc<str>,
    pub constant_value_index: Option<u16>,
    pub slot_index: usize,
    pub owner: Weak<super::class::Class>,
}

pub type FieldPtr = Rc<Field>;

impl Field {
    pub fn is_static(&self) -> bool {
        self.access_flags & 0x0008 != 0
    }

    pub fn is_final(&self) -> bool {
        self.access_flags & 0x0010 != 0
    }

    pub fn is_volatile(&self) -> bool {
        self.access_flags & 0x0040 != 0
    }
}

/// A resolved `Fieldref` (spec.md §4.5): the declared field plus its
/// parsed type, itself expressed as another class reference so a field
/// of primitive type resolves to a primitive class rather than a string.
pub struct ResolvedField {
    pub name: Rc<str>,
    pub field_type: ClassRef,
    pub owner: ClassRef,
    pub field: FieldPtr,
}

pub type FieldRef = Rc<ResolvedField>;
