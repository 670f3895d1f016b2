//! Class-file parser (spec.md §4.3). Decodes the fixed binary layout
//! defined by the JVM specification: big-endian integers, magic
//! `0xCAFEBABE`, major version in `[45, 68]` with minor forced to zero for
//! `[56, 68]`.

use super::attributes::{
    BootstrapMethod, Code, EnclosingMethod, ExceptionTableEntry, ExportsEntry, InnerClassEntry,
    LineNumberEntry, ModuleAttribute, OpensEntry, ProvidesEntry, Record, RecordComponent,
    RequiresEntry,
};
use super::constant_pool::{ConstantPool, ConstantPoolEntry, MethodHandleKind};
use super::descriptor::parse_method_descriptor;
use super::model::{access_flags, ClassFile, FieldInfo, MethodInfo};
use super::reader::ClassReader;
use crate::error::ClassFormatError;
use std::rc::Rc;

const CLASS_FILE_MAGIC: u32 = 0xCAFEBABE;

pub fn parse_class(bytes: &[u8]) -> Result<ClassFile, ClassFormatError> {
    let mut reader = ClassReader::new(bytes);

    let magic = reader.read_u4()?;
    if magic != CLASS_FILE_MAGIC {
        return Err(ClassFormatError::Malformed(
            "bad magic number, expected 0xCAFEBABE".to_string(),
        ));
    }
    let minor_version = reader.read_u2()?;
    let major_version = reader.read_u2()?;
    validate_version(major_version, minor_version)?;

    let constant_pool = Rc::new(parse_constant_pool(&mut reader)?);
    constant_pool.validate()?;

    let access_flags_bits = reader.read_u2()?;
    let this_class_index = reader.read_u2()?;
    let this_class = constant_pool.class_name(this_class_index)?;

    let super_class_index = reader.read_u2()?;
    let super_class = if super_class_index != 0 {
        Some(constant_pool.class_name(super_class_index)?)
    } else {
        None
    };
    validate_super(&this_class, &super_class, access_flags_bits)?;

    let interfaces_count = reader.read_u2()?;
    let mut interfaces = Vec::with_capacity(interfaces_count as usize);
    for _ in 0..interfaces_count {
        let idx = reader.read_u2()?;
        interfaces.push(constant_pool.class_name(idx)?);
    }

    let fields_count = reader.read_u2()?;
    let mut fields = Vec::with_capacity(fields_count as usize);
    for _ in 0..fields_count {
        fields.push(parse_field(&mut reader, &constant_pool)?);
    }

    let methods_count = reader.read_u2()?;
    let mut methods = Vec::with_capacity(methods_count as usize);
    for _ in 0..methods_count {
        methods.push(parse_method(&mut reader, &constant_pool)?);
    }

    let mut class_file = ClassFile {
        major_version,
        minor_version,
        constant_pool: constant_pool.clone(),
        access_flags: access_flags_bits,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        bootstrap_methods: Vec::new(),
        nest_host: None,
        nest_members: Vec::new(),
        permitted_subclasses: Vec::new(),
        inner_classes: Vec::new(),
        enclosing_method: None,
        source_file: None,
        synthetic: false,
        signature: None,
        record: None,
        module: None,
    };

    parse_class_attributes(&mut reader, &constant_pool, &mut class_file)?;

    Ok(class_file)
}

fn validate_version(major: u16, minor: u16) -> Result<(), ClassFormatError> {
    if !(45..=68).contains(&major) {
        return Err(ClassFormatError::UnsupportedVersion { major, minor });
    }
    if (56..=68).contains(&major) && minor != 0 {
        return Err(ClassFormatError::UnsupportedVersion { major, minor });
    }
    Ok(())
}

fn validate_super(
    this_class: &str,
    super_class: &Option<Rc<str>>,
    access_flags_bits: u16,
) -> Result<(), ClassFormatError> {
    let is_module_info = access_flags_bits & access_flags::MODULE != 0;
    if is_module_info && this_class != "module-info" {
        return Err(ClassFormatError::Malformed(
            "Module access flag set on a class other than module-info".to_string(),
        ));
    }
    if super_class.is_none() && this_class != "java/lang/Object" && !is_module_info {
        return Err(ClassFormatError::Malformed(format!(
            "class {this_class} has no superclass but is not java/lang/Object or module-info"
        )));
    }
    Ok(())
}

fn parse_constant_pool(reader: &mut ClassReader) -> Result<ConstantPool, ClassFormatError> {
    let count = reader.read_u2()?;
    let mut pool = ConstantPool::with_capacity(count);
    let mut remaining = count.saturating_sub(1);
    while remaining > 0 {
        let tag = reader.read_u1()?;
        let entry = parse_constant_entry(reader, tag)?;
        let wide = matches!(entry, ConstantPoolEntry::Long(_) | ConstantPoolEntry::Double(_));
        pool.push(entry);
        remaining -= 1;
        if wide {
            // Long/Double consume two constant-pool indices; the second is
            // the reserved `None` slot (spec.md §3 invariant).
            pool.push(ConstantPoolEntry::None);
            remaining = remaining.saturating_sub(1);
        }
    }
    Ok(pool)
}

fn parse_constant_entry(reader: &mut ClassReader, tag: u8) -> Result<ConstantPoolEntry, ClassFormatError> {
    Ok(match tag {
        1 => {
            let length = reader.read_u2()?;
            let bytes = reader.read_bytes(length as usize)?;
            let utf8 = crate::transcode::from_modified(bytes)
                .map_err(|_| ClassFormatError::Malformed("malformed modified-UTF-8 in Utf8 constant".to_string()))?;
            let s = String::from_utf8(utf8)
                .map_err(|_| ClassFormatError::Malformed("non-UTF-8 Utf8 constant".to_string()))?;
            ConstantPoolEntry::Utf8(Rc::from(s.as_str()))
        }
        3 => ConstantPoolEntry::Integer(reader.read_i4()?),
        4 => ConstantPoolEntry::Float(f32::from_bits(reader.read_u4()?)),
        5 => ConstantPoolEntry::Long({
            let hi = reader.read_u4()? as u64;
            let lo = reader.read_u4()? as u64;
            ((hi << 32) | lo) as i64
        }),
        6 => ConstantPoolEntry::Double({
            let hi = reader.read_u4()? as u64;
            let lo = reader.read_u4()? as u64;
            f64::from_bits((hi << 32) | lo)
        }),
        7 => ConstantPoolEntry::Class { name_index: reader.read_u2()? },
        8 => ConstantPoolEntry::String { utf8_index: reader.read_u2()? },
        9 => {
            let class_index = reader.read_u2()?;
            let name_and_type_index = reader.read_u2()?;
            ConstantPoolEntry::Fieldref { class_index, name_and_type_index }
        }
        10 => {
            let class_index = reader.read_u2()?;
            let name_and_type_index = reader.read_u2()?;
            ConstantPoolEntry::Methodref { class_index, name_and_type_index }
        }
        11 => {
            let class_index = reader.read_u2()?;
            let name_and_type_index = reader.read_u2()?;
            ConstantPoolEntry::InterfaceMethodref { class_index, name_and_type_index }
        }
        12 => {
            let name_index = reader.read_u2()?;
            let descriptor_index = reader.read_u2()?;
            ConstantPoolEntry::NameAndType { name_index, descriptor_index }
        }
        15 => {
            let reference_kind = reader.read_u1()?;
            MethodHandleKind::from_u8(reference_kind)?;
            let reference_index = reader.read_u2()?;
            ConstantPoolEntry::MethodHandle { reference_kind, reference_index }
        }
        16 => ConstantPoolEntry::MethodType { descriptor_index: reader.read_u2()? },
        17 => {
            let bootstrap_method_attr_index = reader.read_u2()?;
            let name_and_type_index = reader.read_u2()?;
            ConstantPoolEntry::Dynamic { bootstrap_method_attr_index, name_and_type_index }
        }
        18 => {
            let bootstrap_method_attr_index = reader.read_u2()?;
            let name_and_type_index = reader.read_u2()?;
            ConstantPoolEntry::InvokeDynamic { bootstrap_method_attr_index, name_and_type_index }
        }
        19 => ConstantPoolEntry::Module { name_index: reader.read_u2()? },
        20 => ConstantPoolEntry::Package { name_index: reader.read_u2()? },
        other => {
            return Err(ClassFormatError::Malformed(format!(
                "unrecognized constant pool tag {other}"
            )))
        }
    })
}

fn parse_field(reader: &mut ClassReader, pool: &ConstantPool) -> Result<FieldInfo, ClassFormatError> {
    let access_flags = reader.read_u2()?;
    let name = pool.utf8(reader.read_u2()?)?;
    let descriptor = pool.utf8(reader.read_u2()?)?;
    let attrs_count = reader.read_u2()?;
    let mut constant_value_index = None;
    let mut synthetic = false;
    let mut signature = None;
    for _ in 0..attrs_count {
        let attr_name = pool.utf8(reader.read_u2()?)?;
        let attr_len = reader.read_u4()?;
        match attr_name.as_ref() {
            "ConstantValue" => constant_value_index = Some(reader.read_u2()?),
            "Synthetic" => synthetic = true,
            "Signature" => signature = Some(pool.utf8(reader.read_u2()?)?),
            _ => reader.skip(attr_len as usize)?,
        }
    }
    Ok(FieldInfo { access_flags, name, descriptor, constant_value_index, synthetic, signature })
}

fn parse_method(reader: &mut ClassReader, pool: &ConstantPool) -> Result<MethodInfo, ClassFormatError> {
    let access_flags = reader.read_u2()?;
    let name = pool.utf8(reader.read_u2()?)?;
    let descriptor = pool.utf8(reader.read_u2()?)?;
    let parsed_descriptor = parse_method_descriptor(&descriptor)?;
    let attrs_count = reader.read_u2()?;
    let mut code = None;
    let mut exceptions = Vec::new();
    let mut synthetic = false;
    let mut signature = None;
    for _ in 0..attrs_count {
        let attr_name = pool.utf8(reader.read_u2()?)?;
        let attr_len = reader.read_u4()?;
        match attr_name.as_ref() {
            "Code" => code = Some(parse_code(reader, pool)?),
            "Exceptions" => {
                let count = reader.read_u2()?;
                for _ in 0..count {
                    exceptions.push(pool.class_name(reader.read_u2()?)?);
                }
            }
            "Synthetic" => synthetic = true,
            "Signature" => signature = Some(pool.utf8(reader.read_u2()?)?),
            _ => reader.skip(attr_len as usize)?,
        }
    }
    Ok(MethodInfo { access_flags, name, descriptor, parsed_descriptor, code, exceptions, synthetic, signature })
}

fn parse_code(reader: &mut ClassReader, pool: &ConstantPool) -> Result<Code, ClassFormatError> {
    let max_stack = reader.read_u2()?;
    let max_locals = reader.read_u2()?;
    let code_length = reader.read_u4()?;
    let code = reader.read_bytes(code_length as usize)?.to_vec();

    let exception_table_length = reader.read_u2()?;
    let mut exception_table = Vec::with_capacity(exception_table_length as usize);
    for _ in 0..exception_table_length {
        let start_pc = reader.read_u2()?;
        let end_pc = reader.read_u2()?;
        let handler_pc = reader.read_u2()?;
        let catch_type_index = reader.read_u2()?;
        let catch_type = if catch_type_index != 0 {
            Some(pool.class_name(catch_type_index)?)
        } else {
            None
        };
        exception_table.push(ExceptionTableEntry { start_pc, end_pc, handler_pc, catch_type });
    }

    let attrs_count = reader.read_u2()?;
    let mut line_number_table = Vec::new();
    for _ in 0..attrs_count {
        let attr_name = pool.utf8(reader.read_u2()?)?;
        let attr_len = reader.read_u4()?;
        if attr_name.as_ref() == "LineNumberTable" {
            let count = reader.read_u2()?;
            for _ in 0..count {
                let start_pc = reader.read_u2()?;
                let line_number = reader.read_u2()?;
                line_number_table.push(LineNumberEntry { start_pc, line_number });
            }
        } else {
            reader.skip(attr_len as usize)?;
        }
    }

    Ok(Code { max_stack, max_locals, code, exception_table, line_number_table })
}

fn parse_class_attributes(
    reader: &mut ClassReader,
    pool: &ConstantPool,
    class_file: &mut ClassFile,
) -> Result<(), ClassFormatError> {
    let attrs_count = reader.read_u2()?;
    for _ in 0..attrs_count {
        let attr_name = pool.utf8(reader.read_u2()?)?;
        let attr_len = reader.read_u4()?;
        match attr_name.as_ref() {
            "BootstrapMethods" => {
                let count = reader.read_u2()?;
                for _ in 0..count {
                    let method_handle_index = reader.read_u2()?;
                    let arg_count = reader.read_u2()?;
                    let mut arguments = Vec::with_capacity(arg_count as usize);
                    for _ in 0..arg_count {
                        arguments.push(reader.read_u2()?);
                    }
                    class_file.bootstrap_methods.push(BootstrapMethod { method_handle_index, arguments });
                }
            }
            "NestHost" => class_file.nest_host = Some(pool.class_name(reader.read_u2()?)?),
            "NestMembers" => {
                let count = reader.read_u2()?;
                for _ in 0..count {
                    class_file.nest_members.push(pool.class_name(reader.read_u2()?)?);
                }
            }
            "PermittedSubclasses" => {
                let count = reader.read_u2()?;
                for _ in 0..count {
                    class_file.permitted_subclasses.push(pool.class_name(reader.read_u2()?)?);
                }
            }
            "InnerClasses" => {
                let count = reader.read_u2()?;
                for _ in 0..count {
                    let inner_index = reader.read_u2()?;
                    let outer_index = reader.read_u2()?;
                    let name_index = reader.read_u2()?;
                    let access_flags = reader.read_u2()?;
                    class_file.inner_classes.push(InnerClassEntry {
                        inner_class: pool.class_name(inner_index)?,
                        outer_class: if outer_index != 0 { Some(pool.class_name(outer_index)?) } else { None },
                        inner_name: if name_index != 0 { Some(pool.utf8(name_index)?) } else { None },
                        access_flags,
                    });
                }
            }
            "EnclosingMethod" => {
                let class_index = reader.read_u2()?;
                let method_index = reader.read_u2()?;
                class_file.enclosing_method = Some(EnclosingMethod {
                    class: pool.class_name(class_index)?,
                    method_name_and_type: if method_index != 0 {
                        Some(pool.name_and_type(method_index)?)
                    } else {
                        None
                    },
                });
            }
            "SourceFile" => class_file.source_file = Some(pool.utf8(reader.read_u2()?)?),
            "Synthetic" => class_file.synthetic = true,
            "Signature" => class_file.signature = Some(pool.utf8(reader.read_u2()?)?),
            "Record" => class_file.record = Some(parse_record(reader, pool)?),
            "Module" => class_file.module = Some(parse_module(reader, pool)?),
            _ => reader.skip(attr_len as usize)?,
        }
    }
    Ok(())
}

fn parse_record(reader: &mut ClassReader, pool: &ConstantPool) -> Result<Record, ClassFormatError> {
    let count = reader.read_u2()?;
    let mut components = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name = pool.utf8(reader.read_u2()?)?;
        let descriptor = pool.utf8(reader.read_u2()?)?;
        let sub_attrs = reader.read_u2()?;
        for _ in 0..sub_attrs {
            let _name = pool.utf8(reader.read_u2()?)?;
            let len = reader.read_u4()?;
            reader.skip(len as usize)?;
        }
        components.push(RecordComponent { name, descriptor });
    }
    Ok(Record { components })
}

fn parse_module(reader: &mut ClassReader, pool: &ConstantPool) -> Result<ModuleAttribute, ClassFormatError> {
    let module_name_index = reader.read_u2()?;
    let name = pool.class_name(module_name_index).or_else(|_| pool.utf8(module_name_index))?;
    let access_flags = reader.read_u2()?;
    let version_index = reader.read_u2()?;
    let version = if version_index != 0 { Some(pool.utf8(version_index)?) } else { None };

    let requires_count = reader.read_u2()?;
    let mut requires = Vec::with_capacity(requires_count as usize);
    for _ in 0..requires_count {
        let module_index = reader.read_u2()?;
        let access_flags = reader.read_u2()?;
        let version_index = reader.read_u2()?;
        requires.push(RequiresEntry {
            module: pool.class_name(module_index).or_else(|_| pool.utf8(module_index))?,
            access_flags,
            version: if version_index != 0 { Some(pool.utf8(version_index)?) } else { None },
        });
    }

    let exports_count = reader.read_u2()?;
    let mut exports = Vec::with_capacity(exports_count as usize);
    for _ in 0..exports_count {
        let package_index = reader.read_u2()?;
        let access_flags = reader.read_u2()?;
        let to_count = reader.read_u2()?;
        let mut exports_to = Vec::with_capacity(to_count as usize);
        for _ in 0..to_count {
            let idx = reader.read_u2()?;
            exports_to.push(pool.class_name(idx).or_else(|_| pool.utf8(idx))?);
        }
        exports.push(ExportsEntry { package: pool.utf8(package_index)?, access_flags, exports_to });
    }

    let opens_count = reader.read_u2()?;
    let mut opens = Vec::with_capacity(opens_count as usize);
    for _ in 0..opens_count {
        let package_index = reader.read_u2()?;
        let access_flags = reader.read_u2()?;
        let to_count = reader.read_u2()?;
        let mut opens_to = Vec::with_capacity(to_count as usize);
        for _ in 0..to_count {
            let idx = reader.read_u2()?;
            opens_to.push(pool.class_name(idx).or_else(|_| pool.utf8(idx))?);
        }
        opens.push(OpensEntry { package: pool.utf8(package_index)?, access_flags, opens_to });
    }

    let uses_count = reader.read_u2()?;
    let mut uses = Vec::with_capacity(uses_count as usize);
    for _ in 0..uses_count {
        uses.push(pool.class_name(reader.read_u2()?)?);
    }

    let provides_count = reader.read_u2()?;
    let mut provides = Vec::with_capacity(provides_count as usize);
    for _ in 0..provides_count {
        let interface_index = reader.read_u2()?;
        let with_count = reader.read_u2()?;
        let mut implementations = Vec::with_capacity(with_count as usize);
        for _ in 0..with_count {
            implementations.push(pool.class_name(reader.read_u2()?)?);
        }
        provides.push(ProvidesEntry { interface: pool.class_name(interface_index)?, implementations });
    }

    Ok(ModuleAttribute { name, access_flags, version, requires, exports, opens, uses, provides })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_class_bytes() -> Vec<u8> {
        // magic, minor=0, major=52, cp_count=1 (empty pool), access=PUBLIC,
        // this_class=0 (invalid but caught before use in these tests),
        // super_class=0, interfaces=0, fields=0, methods=0, attrs=0
        let mut bytes = vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 52, 0x00, 0x01];
        bytes.extend_from_slice(&[0x00, 0x01]); // access_flags = PUBLIC
        bytes.extend_from_slice(&[0x00, 0x00]); // this_class = 0 (will fail resolving name)
        bytes.extend_from_slice(&[0x00, 0x00]); // super_class = 0
        bytes.extend_from_slice(&[0x00, 0x00]); // interfaces_count
        bytes.extend_from_slice(&[0x00, 0x00]); // fields_count
        bytes.extend_from_slice(&[0x00, 0x00]); // methods_count
        bytes.extend_from_slice(&[0x00, 0x00]); // attributes_count
        bytes
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = vec![0, 0, 0, 0];
        assert!(parse_class(&bytes).is_err());
    }

    #[test]
    fn rejects_version_below_45() {
        let mut bytes = vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 44];
        bytes.extend_from_slice(&[0x00, 0x01]);
        let err = parse_class(&bytes).unwrap_err();
        assert!(matches!(err, ClassFormatError::UnsupportedVersion { major: 44, .. }));
    }

    #[test]
    fn rejects_nonzero_minor_at_or_above_56() {
        let mut bytes = vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x07, 0x00, 56];
        bytes.extend_from_slice(&[0x00, 0x01]);
        let err = parse_class(&bytes).unwrap_err();
        assert!(matches!(err, ClassFormatError::UnsupportedVersion { major: 56, minor: 7 }));
    }

    #[test]
    fn this_class_zero_fails_with_malformed_index() {
        let bytes = minimal_class_bytes();
        assert!(parse_class(&bytes).is_err());
    }
}
