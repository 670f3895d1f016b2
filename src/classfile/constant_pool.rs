//! Constant pool model (spec.md §3, §9). A real sum type over the 18
//! class-file tag kinds, including the reserved `None` slot that occupies
//! the second word of every `Long`/`Double` entry — per spec.md §9 that
//! slot "is a real variant of the sum, not an absence marker."

use crate::error::ClassFormatError;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum ConstantPoolEntry {
    /// Reserved: occupies the index following a `Long`/`Double`, and index 0
    /// (constant indices are 1-based on the wire).
    None,
    Utf8(Rc<str>),
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Class { name_index: u16 },
    String { utf8_index: u16 },
    Fieldref { class_index: u16, name_and_type_index: u16 },
    Methodref { class_index: u16, name_and_type_index: u16 },
    InterfaceMethodref { class_index: u16, name_and_type_index: u16 },
    NameAndType { name_index: u16, descriptor_index: u16 },
    MethodHandle { reference_kind: u8, reference_index: u16 },
    MethodType { descriptor_index: u16 },
    Dynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    InvokeDynamic { bootstrap_method_attr_index: u16, name_and_type_index: u16 },
    Module { name_index: u16 },
    Package { name_index: u16 },
}

impl ConstantPoolEntry {
    pub fn tag_name(&self) -> &'static str {
        match self {
            ConstantPoolEntry::None => "None",
            ConstantPoolEntry::Utf8(_) => "Utf8",
            ConstantPoolEntry::Integer(_) => "Integer",
            ConstantPoolEntry::Float(_) => "Float",
            ConstantPoolEntry::Long(_) => "Long",
            ConstantPoolEntry::Double(_) => "Double",
            ConstantPoolEntry::Class { .. } => "Class",
            ConstantPoolEntry::String { .. } => "String",
            ConstantPoolEntry::Fieldref { .. } => "Fieldref",
            ConstantPoolEntry::Methodref { .. } => "Methodref",
            ConstantPoolEntry::InterfaceMethodref { .. } => "InterfaceMethodref",
            ConstantPoolEntry::NameAndType { .. } => "NameAndType",
            ConstantPoolEntry::MethodHandle { .. } => "MethodHandle",
            ConstantPoolEntry::MethodType { .. } => "MethodType",
            ConstantPoolEntry::Dynamic { .. } => "Dynamic",
            ConstantPoolEntry::InvokeDynamic { .. } => "InvokeDynamic",
            ConstantPoolEntry::Module { .. } => "Module",
            ConstantPoolEntry::Package { .. } => "Package",
        }
    }
}

/// Reference kinds behind a `MethodHandle` constant (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodHandleKind {
    GetField = 1,
    GetStatic = 2,
    PutField = 3,
    PutStatic = 4,
    InvokeVirtual = 5,
    InvokeStatic = 6,
    InvokeSpecial = 7,
    NewInvokeSpecial = 8,
    InvokeInterface = 9,
}

impl MethodHandleKind {
    pub fn from_u8(kind: u8) -> Result<Self, ClassFormatError> {
        Ok(match kind {
            1 => MethodHandleKind::GetField,
            2 => MethodHandleKind::GetStatic,
            3 => MethodHandleKind::PutField,
            4 => MethodHandleKind::PutStatic,
            5 => MethodHandleKind::InvokeVirtual,
            6 => MethodHandleKind::InvokeStatic,
            7 => MethodHandleKind::InvokeSpecial,
            8 => MethodHandleKind::NewInvokeSpecial,
            9 => MethodHandleKind::InvokeInterface,
            other => {
                return Err(ClassFormatError::Malformed(format!(
                    "method handle kind {other} out of range [1, 9]"
                )))
            }
        })
    }
}

/// The constant pool, 1-based on the wire. `entries[0]` is always `None`.
#[derive(Debug, Default)]
pub struct ConstantPool {
    entries: Vec<ConstantPoolEntry>,
}

impl ConstantPool {
    pub fn with_capacity(count: u16) -> Self {
        let mut entries = Vec::with_capacity(count as usize);
        entries.push(ConstantPoolEntry::None);
        ConstantPool { entries }
    }

    pub fn push(&mut self, entry: ConstantPoolEntry) {
        self.entries.push(entry);
    }

    /// Total slot count including the reserved index 0, matching the
    /// class-file `constant_pool_count` field.
    pub fn len(&self) -> u16 {
        self.entries.len() as u16
    }

    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    fn in_range(&self, index: u16) -> bool {
        index >= 1 && (index as usize) < self.entries.len()
    }

    pub fn get(&self, index: u16) -> Result<&ConstantPoolEntry, ClassFormatError> {
        if !self.in_range(index) {
            return Err(ClassFormatError::Malformed(format!(
                "constant pool index {index} out of range [1, {}]",
                self.entries.len().saturating_sub(1)
            )));
        }
        Ok(&self.entries[index as usize])
    }

    pub fn utf8(&self, index: u16) -> Result<Rc<str>, ClassFormatError> {
        match self.get(index)? {
            ConstantPoolEntry::Utf8(s) => Ok(s.clone()),
            other => Err(ClassFormatError::Malformed(format!(
                "index {index} expected Utf8, found {}",
                other.tag_name()
            ))),
        }
    }

    pub fn class_name(&self, index: u16) -> Result<Rc<str>, ClassFormatError> {
        match self.get(index)? {
            ConstantPoolEntry::Class { name_index } => self.utf8(*name_index),
            other => Err(ClassFormatError::Malformed(format!(
                "index {index} expected Class, found {}",
                other.tag_name()
            ))),
        }
    }

    pub fn name_and_type(&self, index: u16) -> Result<(Rc<str>, Rc<str>), ClassFormatError> {
        match self.get(index)? {
            ConstantPoolEntry::NameAndType { name_index, descriptor_index } => {
                Ok((self.utf8(*name_index)?, self.utf8(*descriptor_index)?))
            }
            other => Err(ClassFormatError::Malformed(format!(
                "index {index} expected NameAndType, found {}",
                other.tag_name()
            ))),
        }
    }

    /// `(class_name, member_name, member_descriptor)` for any of the three
    /// `*ref` kinds.
    pub fn member_ref(
        &self,
        index: u16,
    ) -> Result<(Rc<str>, Rc<str>, Rc<str>), ClassFormatError> {
        let (class_index, nt_index) = match self.get(index)? {
            ConstantPoolEntry::Fieldref { class_index, name_and_type_index }
            | ConstantPoolEntry::Methodref { class_index, name_and_type_index }
            | ConstantPoolEntry::InterfaceMethodref { class_index, name_and_type_index } => {
                (*class_index, *name_and_type_index)
            }
            other => {
                return Err(ClassFormatError::Malformed(format!(
                    "index {index} expected a *ref constant, found {}",
                    other.tag_name()
                )))
            }
        };
        let class_name = self.class_name(class_index)?;
        let (name, descriptor) = self.name_and_type(nt_index)?;
        Ok((class_name, name, descriptor))
    }

    /// Validate that every index this entry refers to lies in range and
    /// points at the expected tag kind (spec.md §4.3 step 1 / §8).
    pub fn validate(&self) -> Result<(), ClassFormatError> {
        for index in 1..self.entries.len() as u16 {
            match &self.entries[index as usize] {
                ConstantPoolEntry::Class { name_index } => {
                    self.utf8(*name_index)?;
                }
                ConstantPoolEntry::String { utf8_index } => {
                    self.utf8(*utf8_index)?;
                }
                ConstantPoolEntry::NameAndType { name_index, descriptor_index } => {
                    self.utf8(*name_index)?;
                    self.utf8(*descriptor_index)?;
                }
                ConstantPoolEntry::Fieldref { class_index, name_and_type_index }
                | ConstantPoolEntry::Methodref { class_index, name_and_type_index }
                | ConstantPoolEntry::InterfaceMethodref { class_index, name_and_type_index } => {
                    self.class_name(*class_index)?;
                    self.name_and_type(*name_and_type_index)?;
                }
                ConstantPoolEntry::MethodHandle { reference_kind, reference_index } => {
                    MethodHandleKind::from_u8(*reference_kind)?;
                    self.get(*reference_index)?;
                }
                ConstantPoolEntry::MethodType { descriptor_index } => {
                    self.utf8(*descriptor_index)?;
                }
                ConstantPoolEntry::Dynamic { name_and_type_index, .. }
                | ConstantPoolEntry::InvokeDynamic { name_and_type_index, .. } => {
                    self.name_and_type(*name_and_type_index)?;
                }
                ConstantPoolEntry::Module { name_index } | ConstantPoolEntry::Package { name_index } => {
                    self.utf8(*name_index)?;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_index_is_malformed() {
        let pool = ConstantPool::with_capacity(2);
        assert!(pool.get(5).is_err());
        assert!(pool.get(0).is_err());
    }

    #[test]
    fn long_double_second_slot_is_none_variant() {
        let mut pool = ConstantPool::with_capacity(3);
        pool.push(ConstantPoolEntry::Long(42));
        pool.push(ConstantPoolEntry::None);
        assert!(matches!(pool.get(2).unwrap(), ConstantPoolEntry::None));
    }
}
