//! Host entry point (spec.md §1, §5): owns the bootstrap loader and the
//! primitive-class table, and drives a single thread through a named
//! class's `main` method, sized for what a single-threaded embedded host
//! needs.

use crate::byte_source::{ByteSource, FsByteSource};
use crate::error::{SourceError, VmError};
use crate::interpreter::{self, Context, Unwind};
use crate::loader::Loader;
use crate::object::class::ClassRef;
use crate::object::instance::Instance;
use crate::object::primitive::Primitives;
use crate::object::RtRef;
use crate::runtime::thread::{Thread, ThreadId};
use crate::runtime::value::Slot;
use log::info;
use std::path::PathBuf;
use std::rc::Rc;

/// Class-path roots searched in declaration order, plus the class that
/// should run (spec.md §5's "host supplies a class path and a main
/// class").
#[derive(Clone)]
pub struct VmConfig {
    pub class_path: Vec<PathBuf>,
    /// Built-in module archive (`java.base.<archive-extension>`), searched
    /// last, after every `class_path` entry (spec.md §4.4 step 3, §6).
    pub module_archive: Option<PathBuf>,
    pub main_class: String,
    pub args: Vec<String>,
}

impl VmConfig {
    pub fn new(main_class: impl Into<String>) -> Self {
        VmConfig {
            class_path: vec![PathBuf::from(".")],
            module_archive: None,
            main_class: main_class.into(),
            args: Vec::new(),
        }
    }
}

pub struct Vm {
    loader: Rc<Loader>,
    primitives: Rc<Primitives>,
    config: VmConfig,
}

impl Vm {
    pub fn new(config: VmConfig) -> Result<Vm, VmError> {
        let primitives = Rc::new(Primitives::new());
        let mut roots: Vec<Rc<dyn ByteSource>> = config
            .class_path
            .iter()
            .map(|p| Rc::new(FsByteSource::new(p.clone())) as Rc<dyn ByteSource>)
            .collect();
        if roots.is_empty() {
            return Err(VmError::Init("class path must not be empty".into()));
        }
        if let Some(archive) = &config.module_archive {
            let dir = archive.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file_name = archive
                .file_name()
                .ok_or_else(|| VmError::Init(format!("{} is not a file path", archive.display())))?
                .to_string_lossy()
                .into_owned();
            roots.push(Rc::new(ModuleArchiveSource {
                prefix: file_name,
                inner: FsByteSource::new(dir.to_path_buf()),
            }));
        }
        let loader = Loader::new_bootstrap(roots, primitives.clone());
        Ok(Vm {
            loader,
            primitives,
            config,
        })
    }

    /// Loads the configured main class, resolves its `main(String[])`
    /// entry point, and runs it on a single thread to completion.
    pub fn run(&self) -> Result<(), VmError> {
        let mut thread = Thread::new(ThreadId(0), "main");
        let ctx = Context {
            loader: &self.loader,
            primitives: &self.primitives,
        };

        let class_ref = self
            .loader
            .load(&self.config.main_class)
            .map_err(VmError::from)?;
        let class = class_ref
            .as_loaded()
            .ok_or_else(|| VmError::Init(format!("{} is not a class", self.config.main_class)))?
            .clone();
        let method = class
            .find_declared_method("main", "([Ljava/lang/String;)V")
            .ok_or_else(|| {
                VmError::Init(format!(
                    "{} has no main([Ljava/lang/String;)V",
                    self.config.main_class
                ))
            })?;
        if !method.is_static() {
            return Err(VmError::Init("main must be static".into()));
        }

        let args_array = self.build_args_array(&ctx)?;

        info!("running {}.main", self.config.main_class);
        match interpreter::ensure_initialized(&class_ref, &mut thread, &ctx)
            .map_err(|u| self.unwind_to_vm_error(u))
            .and_then(|()| {
                interpreter::invoke_direct(
                    &mut thread,
                    &ctx,
                    class_ref,
                    method,
                    vec![Slot::Reference(RtRef::Instance(args_array))],
                )
                .map_err(|u| self.unwind_to_vm_error(u))
            }) {
            Ok(_) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn build_args_array(&self, ctx: &Context) -> Result<crate::object::instance::InstanceRef, VmError> {
        let array_class = self
            .loader
            .load("[Ljava/lang/String;")
            .map_err(VmError::from)?;
        let _ = ctx;
        let slots = vec![Slot::Reference(RtRef::Null); self.config.args.len()];
        Ok(Instance::new(array_class, slots))
    }

    /// An unhandled Java exception escaping `main` is reported as a
    /// fatal VM error rather than silently discarded (spec.md §5).
    fn unwind_to_vm_error(&self, unwind: Unwind) -> VmError {
        match unwind {
            Unwind::Fatal(e) => e,
            Unwind::Thrown(instance) => {
                let class_name = class_name_of(&instance.class);
                VmError::Fatal(format!("uncaught {class_name}"))
            }
        }
    }
}

fn class_name_of(class_ref: &ClassRef) -> Rc<str> {
    class_ref.name()
}

/// Adapts the built-in module archive to `byte_source`'s path-walking
/// rule (spec.md §4.2/§6) by re-anchoring every lookup at `prefix/path`,
/// so `"java/lang/Object.class"` becomes
/// `"java.base.jar/java/lang/Object.class"` before `FsByteSource` walks
/// its zip-entry prefix search.
struct ModuleArchiveSource {
    prefix: String,
    inner: FsByteSource,
}

impl ByteSource for ModuleArchiveSource {
    fn exists(&self, path: &str) -> bool {
        self.inner.exists(&format!("{}/{path}", self.prefix))
    }

    fn read_all(&self, path: &str) -> Result<Vec<u8>, SourceError> {
        self.inner.read_all(&format!("{}/{path}", self.prefix))
    }
}
