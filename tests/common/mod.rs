//! Hand-assembled class-file byte builder and an in-memory `ByteSource`,
//! shared by the end-to-end tests. Not a general-purpose class writer:
//! just enough to exercise the loader and interpreter without shelling
//! out to `javac`.

use nanojvm::byte_source::ByteSource;
use nanojvm::error::SourceError;
use nanojvm::transcode;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_STATIC: u16 = 0x0008;
pub const ACC_FINAL: u16 = 0x0010;
pub const ACC_SUPER: u16 = 0x0020;

/// One constant-pool entry, already serialized to its on-wire bytes
/// (tag byte included). `Builder` hands out 1-based indices as entries
/// are appended, matching the class-file format's own numbering.
struct Pool {
    raw: Vec<u8>,
    count: u16,
}

impl Pool {
    fn new() -> Self {
        Pool { raw: Vec::new(), count: 1 }
    }

    fn push(&mut self, entry: Vec<u8>) -> u16 {
        self.raw.extend_from_slice(&entry);
        let index = self.count;
        self.count += 1;
        index
    }
}

pub struct ClassBuilder {
    pool: Pool,
    // name -> utf8 index, de-duplicated so repeated class/name/descriptor
    // strings don't bloat the pool.
    utf8_cache: HashMap<String, u16>,
    class_cache: HashMap<String, u16>,
    name_and_type_cache: HashMap<(String, String), u16>,
    fields: Vec<u8>,
    field_count: u16,
    methods: Vec<u8>,
    method_count: u16,
}

pub struct MethodSpec {
    pub access_flags: u16,
    pub name: &'static str,
    pub descriptor: &'static str,
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionSpec>,
}

pub struct ExceptionSpec {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: Option<&'static str>,
}

pub struct FieldSpec {
    pub access_flags: u16,
    pub name: &'static str,
    pub descriptor: &'static str,
}

impl ClassBuilder {
    pub fn new() -> Self {
        ClassBuilder {
            pool: Pool::new(),
            utf8_cache: HashMap::new(),
            class_cache: HashMap::new(),
            name_and_type_cache: HashMap::new(),
            fields: Vec::new(),
            field_count: 0,
            methods: Vec::new(),
            method_count: 0,
        }
    }

    pub fn utf8(&mut self, s: &str) -> u16 {
        if let Some(idx) = self.utf8_cache.get(s) {
            return *idx;
        }
        let bytes = transcode::to_modified(s.as_bytes()).expect("test fixture strings are valid UTF-8");
        let mut entry = vec![1u8];
        entry.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
        entry.extend_from_slice(&bytes);
        let idx = self.pool.push(entry);
        self.utf8_cache.insert(s.to_string(), idx);
        idx
    }

    pub fn class(&mut self, name: &str) -> u16 {
        if let Some(idx) = self.class_cache.get(name) {
            return *idx;
        }
        let name_idx = self.utf8(name);
        let mut entry = vec![7u8];
        entry.extend_from_slice(&name_idx.to_be_bytes());
        let idx = self.pool.push(entry);
        self.class_cache.insert(name.to_string(), idx);
        idx
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let key = (name.to_string(), descriptor.to_string());
        if let Some(idx) = self.name_and_type_cache.get(&key) {
            return *idx;
        }
        let name_idx = self.utf8(name);
        let desc_idx = self.utf8(descriptor);
        let mut entry = vec![12u8];
        entry.extend_from_slice(&name_idx.to_be_bytes());
        entry.extend_from_slice(&desc_idx.to_be_bytes());
        let idx = self.pool.push(entry);
        self.name_and_type_cache.insert(key, idx);
        idx
    }

    pub fn methodref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_idx = self.class(class);
        let nt_idx = self.name_and_type(name, descriptor);
        let mut entry = vec![10u8];
        entry.extend_from_slice(&class_idx.to_be_bytes());
        entry.extend_from_slice(&nt_idx.to_be_bytes());
        self.pool.push(entry)
    }

    pub fn fieldref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_idx = self.class(class);
        let nt_idx = self.name_and_type(name, descriptor);
        let mut entry = vec![9u8];
        entry.extend_from_slice(&class_idx.to_be_bytes());
        entry.extend_from_slice(&nt_idx.to_be_bytes());
        self.pool.push(entry)
    }

    pub fn integer(&mut self, v: i32) -> u16 {
        let mut entry = vec![3u8];
        entry.extend_from_slice(&v.to_be_bytes());
        self.pool.push(entry)
    }

    pub fn add_method(&mut self, spec: MethodSpec) {
        let name_idx = self.utf8(spec.name);
        let desc_idx = self.utf8(spec.descriptor);

        let mut code_attr = Vec::new();
        code_attr.extend_from_slice(&spec.max_stack.to_be_bytes());
        code_attr.extend_from_slice(&spec.max_locals.to_be_bytes());
        code_attr.extend_from_slice(&(spec.code.len() as u32).to_be_bytes());
        code_attr.extend_from_slice(&spec.code);
        code_attr.extend_from_slice(&(spec.exception_table.len() as u16).to_be_bytes());
        for entry in &spec.exception_table {
            code_attr.extend_from_slice(&entry.start_pc.to_be_bytes());
            code_attr.extend_from_slice(&entry.end_pc.to_be_bytes());
            code_attr.extend_from_slice(&entry.handler_pc.to_be_bytes());
            let catch_type_idx = match entry.catch_type {
                Some(name) => self.class(name),
                None => 0,
            };
            code_attr.extend_from_slice(&catch_type_idx.to_be_bytes());
        }
        code_attr.extend_from_slice(&0u16.to_be_bytes()); // Code has no sub-attributes here

        let code_name_idx = self.utf8("Code");

        self.methods.extend_from_slice(&spec.access_flags.to_be_bytes());
        self.methods.extend_from_slice(&name_idx.to_be_bytes());
        self.methods.extend_from_slice(&desc_idx.to_be_bytes());
        self.methods.extend_from_slice(&1u16.to_be_bytes()); // attributes_count
        self.methods.extend_from_slice(&code_name_idx.to_be_bytes());
        self.methods.extend_from_slice(&(code_attr.len() as u32).to_be_bytes());
        self.methods.extend_from_slice(&code_attr);
        self.method_count += 1;
    }

    pub fn add_field(&mut self, spec: FieldSpec) {
        let name_idx = self.utf8(spec.name);
        let desc_idx = self.utf8(spec.descriptor);
        self.fields.extend_from_slice(&spec.access_flags.to_be_bytes());
        self.fields.extend_from_slice(&name_idx.to_be_bytes());
        self.fields.extend_from_slice(&desc_idx.to_be_bytes());
        self.fields.extend_from_slice(&0u16.to_be_bytes()); // attributes_count
        self.field_count += 1;
    }

    /// Serializes a complete class file: `this_name extends super_name`
    /// (or no superclass at all, for `java/lang/Object` itself), with
    /// whatever fields/methods were added.
    pub fn build(mut self, this_name: &str, super_name: Option<&str>) -> Vec<u8> {
        let this_idx = self.class(this_name);
        let super_idx = super_name.map(|s| self.class(s)).unwrap_or(0);

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFEBABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // minor
        out.extend_from_slice(&52u16.to_be_bytes()); // major: Java 8
        out.extend_from_slice(&self.pool.count.to_be_bytes());
        out.extend_from_slice(&self.pool.raw);
        out.extend_from_slice(&(ACC_PUBLIC | ACC_SUPER).to_be_bytes());
        out.extend_from_slice(&this_idx.to_be_bytes());
        out.extend_from_slice(&super_idx.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // interfaces_count
        out.extend_from_slice(&self.field_count.to_be_bytes());
        out.extend_from_slice(&self.fields);
        out.extend_from_slice(&self.method_count.to_be_bytes());
        out.extend_from_slice(&self.methods);
        out.extend_from_slice(&0u16.to_be_bytes()); // attributes_count
        out
    }
}

/// A minimal class with no fields or methods beyond the implicit
/// superclass link, for the handful of `java/lang/*` classes the
/// interpreter needs on hand to synthesize exceptions and walk
/// `is_subclass_of`.
pub fn minimal_class(this_name: &str, super_name: Option<&str>) -> Vec<u8> {
    ClassBuilder::new().build(this_name, super_name)
}

/// An in-memory `ByteSource` backing the fake class library used by the
/// end-to-end tests, keyed by `"Name.class"` path.
pub struct MemSource {
    classes: RefCell<HashMap<String, Vec<u8>>>,
}

impl MemSource {
    pub fn new() -> Rc<MemSource> {
        Rc::new(MemSource { classes: RefCell::new(HashMap::new()) })
    }

    pub fn add(&self, name: &str, bytes: Vec<u8>) {
        self.classes.borrow_mut().insert(format!("{name}.class"), bytes);
    }
}

impl ByteSource for MemSource {
    fn exists(&self, path: &str) -> bool {
        self.classes.borrow().contains_key(path)
    }

    fn read_all(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        self.classes
            .borrow()
            .get(path)
            .cloned()
            .ok_or(SourceError::NotFound)
    }
}

/// Registers the slice of `java/lang/*` throwable classes the
/// interpreter synthesizes by name, plus `java/lang/Object` itself.
pub fn install_core_classes(source: &MemSource) {
    source.add("java/lang/Object", minimal_class("java/lang/Object", None));
    let throwables: &[(&str, &str)] = &[
        ("java/lang/Throwable", "java/lang/Object"),
        ("java/lang/Exception", "java/lang/Throwable"),
        ("java/lang/RuntimeException", "java/lang/Exception"),
        ("java/lang/ArithmeticException", "java/lang/RuntimeException"),
        ("java/lang/NullPointerException", "java/lang/RuntimeException"),
        ("java/lang/ClassCastException", "java/lang/RuntimeException"),
        (
            "java/lang/IndexOutOfBoundsException",
            "java/lang/RuntimeException",
        ),
        (
            "java/lang/ArrayIndexOutOfBoundsException",
            "java/lang/IndexOutOfBoundsException",
        ),
        (
            "java/lang/NegativeArraySizeException",
            "java/lang/RuntimeException",
        ),
        (
            "java/lang/IllegalMonitorStateException",
            "java/lang/RuntimeException",
        ),
        ("java/lang/Error", "java/lang/Throwable"),
        ("java/lang/LinkageError", "java/lang/Error"),
        ("java/lang/IncompatibleClassChangeError", "java/lang/LinkageError"),
        ("java/lang/NoSuchFieldError", "java/lang/IncompatibleClassChangeError"),
        ("java/lang/NoSuchMethodError", "java/lang/IncompatibleClassChangeError"),
        ("java/lang/IllegalAccessError", "java/lang/IncompatibleClassChangeError"),
        ("java/lang/UnsatisfiedLinkError", "java/lang/LinkageError"),
        ("java/lang/ClassFormatError", "java/lang/LinkageError"),
        ("java/lang/ClassCircularityError", "java/lang/LinkageError"),
        ("java/lang/NoClassDefFoundError", "java/lang/LinkageError"),
        ("java/lang/ClassNotFoundException", "java/lang/Exception"),
    ];
    for (name, super_name) in throwables {
        source.add(name, minimal_class(name, Some(super_name)));
    }
}
