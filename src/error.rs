//! Shared error taxonomy. Mirrors the three-band split in spec.md §7:
//! recoverable-inside-the-core failures never reach these types (they're
//! silent fallbacks logged at `trace`), band 2 failures carry the Java
//! throwable class name they must surface as, band 3 failures abort the
//! thread.

use std::fmt;

/// A failure surfaced to Java code as an instance of a specific throwable
/// class (spec.md §6's "Thrown class names"). Carried as
/// `interpreter::Unwind::Thrown` until the interpreter's exception table
/// walk either catches it or it escapes the thread's call stack.
#[derive(Debug, Clone)]
pub struct Throwable {
    pub class_name: &'static str,
    pub message: String,
}

impl Throwable {
    pub fn new(class_name: &'static str, message: impl Into<String>) -> Self {
        Throwable {
            class_name,
            message: message.into(),
        }
    }
}

impl fmt::Display for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.class_name, self.message)
    }
}

/// Band-1/structural failures raised while decoding a class file. Always
/// maps to `java/lang/ClassFormatError` unless a more specific variant
/// says otherwise (`UnsupportedVersion` -> `UnsupportedClassVersionError`).
#[derive(Debug, Clone)]
pub enum ClassFormatError {
    Malformed(String),
    Truncated,
    UnsupportedVersion { major: u16, minor: u16 },
}

impl ClassFormatError {
    pub fn throwable_class(&self) -> &'static str {
        match self {
            ClassFormatError::Malformed(_) | ClassFormatError::Truncated => {
                "java/lang/ClassFormatError"
            }
            ClassFormatError::UnsupportedVersion { .. } => {
                "java/lang/UnsupportedClassVersionError"
            }
        }
    }

    pub fn into_throwable(self) -> Throwable {
        let class_name = self.throwable_class();
        let message = match self {
            ClassFormatError::Malformed(msg) => msg,
            ClassFormatError::Truncated => "truncated class file".to_string(),
            ClassFormatError::UnsupportedVersion { major, minor } => {
                format!("unsupported class version {major}.{minor}")
            }
        };
        Throwable::new(class_name, message)
    }
}

impl fmt::Display for ClassFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.clone().into_throwable())
    }
}

/// Failures raised by the byte-stream source (spec.md §4.2).
#[derive(Debug, Clone)]
pub enum SourceError {
    NotFound,
    Io(String),
    MalformedArchive(String),
}

/// Failures raised by the loader graph (spec.md §4.4).
#[derive(Debug, Clone)]
pub enum LoaderError {
    ClassFormat(ClassFormatError),
    Source(SourceError),
    Circularity(String),
    AlreadyDefined(String),
    NameMismatch { requested: String, found: String },
    IncompatibleSuper(String),
}

impl LoaderError {
    pub fn into_throwable(self) -> Throwable {
        match self {
            LoaderError::ClassFormat(e) => e.into_throwable(),
            LoaderError::Source(SourceError::NotFound) => {
                Throwable::new("java/lang/ClassNotFoundException", "class not found")
            }
            LoaderError::Source(SourceError::Io(msg)) => {
                Throwable::new("java/lang/ClassNotFoundException", msg)
            }
            LoaderError::Source(SourceError::MalformedArchive(msg)) => {
                Throwable::new("java/lang/ClassNotFoundException", msg)
            }
            LoaderError::Circularity(name) => {
                Throwable::new("java/lang/ClassCircularityError", name)
            }
            LoaderError::AlreadyDefined(name) => {
                Throwable::new("java/lang/LinkageError", format!("{name} already defined"))
            }
            LoaderError::NameMismatch { requested, found } => Throwable::new(
                "java/lang/NoClassDefFoundError",
                format!("requested {requested} but found {found}"),
            ),
            LoaderError::IncompatibleSuper(msg) => {
                Throwable::new("java/lang/IncompatibleClassChangeError", msg)
            }
        }
    }
}

/// Failures raised while resolving symbolic references (spec.md §4.5).
#[derive(Debug, Clone)]
pub enum ResolveError {
    Loader(LoaderError),
    IllegalAccess(String),
    NoSuchField(String),
    NoSuchMethod(String),
    IncompatibleClassChange(String),
    BootstrapMethod(String),
    StackOverflow,
}

impl ResolveError {
    pub fn into_throwable(self) -> Throwable {
        match self {
            ResolveError::Loader(e) => e.into_throwable(),
            ResolveError::IllegalAccess(msg) => {
                Throwable::new("java/lang/IllegalAccessError", msg)
            }
            ResolveError::NoSuchField(msg) => Throwable::new("java/lang/NoSuchFieldError", msg),
            ResolveError::NoSuchMethod(msg) => Throwable::new("java/lang/NoSuchMethodError", msg),
            ResolveError::IncompatibleClassChange(msg) => {
                Throwable::new("java/lang/IncompatibleClassChangeError", msg)
            }
            ResolveError::BootstrapMethod(msg) => {
                Throwable::new("java/lang/BootstrapMethodError", msg)
            }
            ResolveError::StackOverflow => {
                Throwable::new("java/lang/StackOverflowError", "resolution recursed too deep")
            }
        }
    }
}

impl From<LoaderError> for ResolveError {
    fn from(e: LoaderError) -> Self {
        ResolveError::Loader(e)
    }
}

impl From<ClassFormatError> for LoaderError {
    fn from(e: ClassFormatError) -> Self {
        LoaderError::ClassFormat(e)
    }
}

/// Band-3 fatal failures: allocation exhaustion, invariant violations,
/// host-side I/O catastrophe. Abort the thread and surface to the host.
#[derive(Debug, Clone)]
pub enum VmError {
    Init(String),
    Loader(LoaderError),
    OutOfMemory,
    Fatal(String),
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::Init(msg) => write!(f, "VM init failed: {msg}"),
            VmError::Loader(e) => write!(f, "{}", e.clone().into_throwable()),
            VmError::OutOfMemory => write!(f, "java/lang/OutOfMemoryError"),
            VmError::Fatal(msg) => write!(f, "fatal VM error: {msg}"),
        }
    }
}

impl From<LoaderError> for VmError {
    fn from(e: LoaderError) -> Self {
        VmError::Loader(e)
    }
}
