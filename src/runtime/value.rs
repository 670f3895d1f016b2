//! Operand-stack and local-variable slots (spec.md §3 "Typed slot").
//!
//! Category-2 values (`long`, `double`) occupy one [`Slot`] here rather
//! than the two raw machine words the class-file format describes them
//! as; `slot_width()` on the parsed descriptor is what callers use to
//! advance local-variable indices correctly.

use crate::object::RtRef;

#[derive(Clone)]
pub enum Slot {
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Reference(RtRef),
    /// Pushed by `jsr`/`jsr_w`, consumed by `ret` (spec.md §4.6).
    ReturnAddress(usize),
    /// The upper half of a category-2 local-variable pair, never read
    /// directly.
    None,
}

impl Slot {
    /// Default value for a field of the given descriptor (spec.md §4.6
    /// "static-field slots start at the type's zero value").
    pub fn default_for_descriptor(descriptor: &str) -> Slot {
        use crate::classfile::descriptor::FieldType;
        match crate::classfile::descriptor::parse_field_descriptor(descriptor) {
            Ok(FieldType::Long) => Slot::Long(0),
            Ok(FieldType::Double) => Slot::Double(0.0),
            Ok(FieldType::Float) => Slot::Float(0.0),
            Ok(FieldType::Class(_)) | Ok(FieldType::Array { .. }) => {
                Slot::Reference(RtRef::Null)
            }
            _ => Slot::Int(0),
        }
    }

    pub fn default_for_tag(tag: char) -> Slot {
        match tag {
            'J' => Slot::Long(0),
            'D' => Slot::Double(0.0),
            'F' => Slot::Float(0.0),
            'L' | '[' => Slot::Reference(RtRef::Null),
            _ => Slot::Int(0),
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Slot::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Slot::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            Slot::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Slot::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<&RtRef> {
        match self {
            Slot::Reference(r) => Some(r),
            _ => None,
        }
    }
}
