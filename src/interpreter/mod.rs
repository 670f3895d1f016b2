//! Frame-based bytecode interpreter (spec.md §4.6). `run_frame` drives a
//! single activation record to completion; `invoke` pushes a fresh frame
//! and recurses, so the Rust call stack mirrors the Java call stack one
//! level at a time -- deep enough for the programs this VM targets
//! (spec.md §5's embedded, non-recursion-heavy workloads), simpler than
//! threading an explicit frame stack through one flat loop.

pub mod opcode;

use crate::classfile::constant_pool::ConstantPoolEntry;
use crate::error::VmError;
use crate::loader::Loader;
use crate::object::class::{Class, ClassRef};
use crate::object::instance::{Instance, InstanceRef};
use crate::object::method::MethodPtr;
use crate::object::primitive::Primitives;
use crate::object::RtRef;
use crate::resolve;
use crate::runtime::frame::Frame;
use crate::runtime::thread::Thread;
use crate::runtime::value::Slot;
use log::trace;
use std::rc::Rc;

pub struct Context<'a> {
    pub loader: &'a Rc<Loader>,
    pub primitives: &'a Primitives,
}

pub type Thrown = InstanceRef;

/// An exceptional exit from the opcode loop: either a live Java
/// exception (catchable by an exception-table entry) or an internal
/// failure the VM cannot recover from.
pub enum Unwind {
    Thrown(Thrown),
    Fatal(VmError),
}

impl From<VmError> for Unwind {
    fn from(e: VmError) -> Self {
        Unwind::Fatal(e)
    }
}

fn unwind_from_resolve(e: crate::error::ResolveError, ctx: &Context) -> Unwind {
    let throwable = e.into_throwable();
    match synthesize(throwable.class_name, throwable.message, ctx) {
        Ok(instance) => Unwind::Thrown(instance),
        Err(vm_err) => Unwind::Fatal(vm_err),
    }
}

fn unwind_from_loader(e: crate::error::LoaderError, ctx: &Context) -> Unwind {
    let throwable = e.into_throwable();
    match synthesize(throwable.class_name, throwable.message, ctx) {
        Ok(instance) => Unwind::Thrown(instance),
        Err(vm_err) => Unwind::Fatal(vm_err),
    }
}

/// Allocates an exception instance of `class_name` without running a
/// constructor (spec.md §4.6's final-field/constructor machinery is not
/// invoked for VM-synthesized throwables; the message is carried only in
/// logs, documented as a simplification in DESIGN.md).
pub fn synthesize(class_name: &str, message: impl Into<String>, ctx: &Context) -> Result<Thrown, VmError> {
    let message = message.into();
    trace!("synthesizing {class_name}: {message}");
    let class_ref = ctx.loader.load(class_name).map_err(VmError::from)?;
    let class = class_ref
        .as_loaded()
        .ok_or_else(|| VmError::Fatal(format!("{class_name} did not load as a class")))?
        .clone();
    let fields = default_instance_slots(&class);
    Ok(Instance::new(class_ref, fields))
}

fn default_instance_slots(class: &Rc<Class>) -> Vec<Slot> {
    let mut slots = vec![Slot::Int(0); class.instance_field_count];
    for field in &class.fields {
        if !field.is_static() {
            slots[field.slot_index] = Slot::default_for_descriptor(&field.descriptor);
        }
    }
    slots
}

/// Runs a class's superclass chain through `<clinit>` exactly once
/// (spec.md §4.6's "first active use" trigger; idempotent per class).
pub fn ensure_initialized(class_ref: &ClassRef, thread: &mut Thread, ctx: &Context) -> Result<(), Unwind> {
    let class = match class_ref {
        ClassRef::Loaded(c) => c.clone(),
        _ => return Ok(()),
    };
    if class.initialized.get() || class.initializing.get() {
        return Ok(());
    }
    if let Some(super_ref) = class.super_class.borrow().clone() {
        ensure_initialized(&super_ref, thread, ctx)?;
    }
    class.initializing.set(true);
    if let Some(clinit) = class.find_declared_method("<clinit>", "()V") {
        invoke_direct(thread, ctx, class_ref.clone(), clinit, vec![])?;
    }
    class.initializing.set(false);
    class.initialized.set(true);
    Ok(())
}

/// Pushes a frame for `method` (owned by `owner`), runs it to
/// completion, and returns its result.
pub fn invoke_direct(
    thread: &mut Thread,
    ctx: &Context,
    owner: ClassRef,
    method: MethodPtr,
    args: Vec<Slot>,
) -> Result<Slot, Unwind> {
    if method.is_native() {
        return throw(
            "java/lang/UnsatisfiedLinkError",
            format!("{} has no implementation", method.name),
            ctx,
        );
    }
    if method.is_abstract() || method.code.is_none() {
        return Err(Unwind::Fatal(VmError::Fatal(format!(
            "{} has no Code attribute to execute",
            method.name
        ))));
    }
    let mut frame = Frame::new(owner, method);
    for (idx, arg) in args.into_iter().enumerate() {
        frame.locals[idx] = arg;
    }
    thread.push_frame(frame);
    run_frame(thread, ctx)
}

/// Drives the top frame on `thread`'s call stack to completion, popping
/// it whether it returns normally or an exception escapes it
/// unhandled.
pub fn run_frame(thread: &mut Thread, ctx: &Context) -> Result<Slot, Unwind> {
    let result = run_frame_body(thread, ctx);
    thread.pop_frame();
    result
}

fn run_frame_body(thread: &mut Thread, ctx: &Context) -> Result<Slot, Unwind> {
    loop {
        let pc_start = thread.current_frame().pc;
        match execute_one(thread, ctx) {
            Ok(Step::Continue) => continue,
            Ok(Step::Return(slot)) => return Ok(slot),
            Err(Unwind::Fatal(e)) => return Err(Unwind::Fatal(e)),
            Err(Unwind::Thrown(thrown)) => {
                let handler = find_handler(thread.current_frame(), pc_start, &thrown, ctx);
                match handler {
                    Some(handler_pc) => {
                        let frame = thread.current_frame_mut();
                        frame.operand_stack.clear();
                        frame.push(Slot::Reference(RtRef::Instance(thrown)));
                        frame.pc = handler_pc;
                    }
                    None => return Err(Unwind::Thrown(thrown)),
                }
            }
        }
    }
}

fn find_handler(frame: &Frame, pc: usize, thrown: &Thrown, ctx: &Context) -> Option<usize> {
    let code = frame.method.code.as_ref()?;
    for entry in &code.exception_table {
        if (entry.start_pc as usize) <= pc && pc < (entry.end_pc as usize) {
            let matches = match &entry.catch_type {
                None => true,
                Some(name) => match ctx.loader.load(name) {
                    Ok(catch_class) => resolve::is_assignable(&thrown.class, &catch_class),
                    Err(_) => false,
                },
            };
            if matches {
                return Some(entry.handler_pc as usize);
            }
        }
    }
    None
}

enum Step {
    Continue,
    Return(Slot),
}

fn pool_of(class_ref: &ClassRef) -> Rc<crate::classfile::constant_pool::ConstantPool> {
    class_ref
        .as_loaded()
        .expect("bytecode always runs against a loaded class")
        .classfile
        .constant_pool
        .clone()
}

fn u16_at(code: &[u8], pc: usize) -> u16 {
    u16::from_be_bytes([code[pc], code[pc + 1]])
}

fn i16_at(code: &[u8], pc: usize) -> i16 {
    i16::from_be_bytes([code[pc], code[pc + 1]])
}

fn i32_at(code: &[u8], pc: usize) -> i32 {
    i32::from_be_bytes([code[pc], code[pc + 1], code[pc + 2], code[pc + 3]])
}

/// Raises `class_name` as a live Java exception from anywhere the
/// interpreter returns `Result<_, Unwind>`.
fn throw<T>(class_name: &str, message: impl Into<String>, ctx: &Context) -> Result<T, Unwind> {
    Err(Unwind::Thrown(synthesize(class_name, message, ctx)?))
}

fn array_index_in_bounds(len: usize, index: i32, ctx: &Context) -> Result<usize, Unwind> {
    if index < 0 || index as usize >= len {
        return throw(
            "java/lang/ArrayIndexOutOfBoundsException",
            format!("index {index}, length {len}"),
            ctx,
        );
    }
    Ok(index as usize)
}

fn null_check(reference: &RtRef, ctx: &Context) -> Result<(), Unwind> {
    if reference.is_null() {
        let thrown = synthesize("java/lang/NullPointerException", "", ctx)?;
        return Err(Unwind::Thrown(thrown));
    }
    Ok(())
}

/// A `final` field may only be written from within its declaring class,
/// and only from `expected_initializer` (`<init>` for instance fields,
/// `<clinit>` for static fields) -- any other writer raises
/// `IllegalAccessError`.
fn check_final_write(
    field: &crate::object::field::ResolvedField,
    class_ref: &ClassRef,
    current_method: &str,
    expected_initializer: &str,
    ctx: &Context,
) -> Result<(), Unwind> {
    if !field.field.is_final() {
        return Ok(());
    }
    if field.owner.name() == class_ref.name() && current_method == expected_initializer {
        return Ok(());
    }
    Err(unwind_from_resolve(
        crate::error::ResolveError::IllegalAccess(format!(
            "final field {} can only be set from {expected_initializer} of its declaring class",
            field.name
        )),
        ctx,
    ))
}

#[allow(clippy::too_many_lines)]
fn execute_one(thread: &mut Thread, ctx: &Context) -> Result<Step, Unwind> {
    use opcode::*;

    let class_ref = thread.current_frame().class.clone();
    let pool = pool_of(&class_ref);
    let pc = thread.current_frame().pc;
    let code_byte = thread.current_frame().code()[pc];
    let mut next_pc = pc + 1;

    macro_rules! frame {
        () => {
            thread.current_frame_mut()
        };
    }

    match code_byte {
        NOP => {}
        ACONST_NULL => frame!().push(Slot::Reference(RtRef::Null)),
        ICONST_M1..=ICONST_5 => {
            frame!().push(Slot::Int(code_byte as i32 - ICONST_0 as i32));
        }
        LCONST_0 | LCONST_1 => frame!().push(Slot::Long((code_byte - LCONST_0) as i64)),
        FCONST_0..=FCONST_2 => frame!().push(Slot::Float((code_byte - FCONST_0) as f32)),
        DCONST_0 | DCONST_1 => frame!().push(Slot::Double((code_byte - DCONST_0) as f64)),
        BIPUSH => {
            let value = thread.current_frame().code()[pc + 1] as i8 as i32;
            frame!().push(Slot::Int(value));
            next_pc = pc + 2;
        }
        SIPUSH => {
            let value = i16_at(thread.current_frame().code(), pc + 1) as i32;
            frame!().push(Slot::Int(value));
            next_pc = pc + 3;
        }
        LDC | LDC_W | LDC2_W => {
            let (index, width) = if code_byte == LDC {
                (thread.current_frame().code()[pc + 1] as u16, 2)
            } else {
                (u16_at(thread.current_frame().code(), pc + 1), 3)
            };
            let entry = pool.get(index).map_err(|e| {
                unwind_from_loader(crate::error::LoaderError::ClassFormat(e), ctx)
            })?;
            let slot = match entry {
                ConstantPoolEntry::Integer(v) => Slot::Int(*v),
                ConstantPoolEntry::Float(v) => Slot::Float(*v),
                ConstantPoolEntry::Long(v) => Slot::Long(*v),
                ConstantPoolEntry::Double(v) => Slot::Double(*v),
                ConstantPoolEntry::String { utf8_index } => {
                    let text = pool.utf8(*utf8_index).map_err(|e| {
                        unwind_from_loader(crate::error::LoaderError::ClassFormat(e), ctx)
                    })?;
                    Slot::Reference(RtRef::InternedString(text))
                }
                ConstantPoolEntry::Class { .. } => {
                    let resolved = resolve::resolve_class(&pool, index, &class_ref, ctx.loader)
                        .map_err(|e| unwind_from_resolve(e, ctx))?;
                    Slot::Reference(RtRef::Class(resolved))
                }
                _ => {
                    return Err(Unwind::Fatal(VmError::Fatal(format!(
                        "ldc of unsupported constant kind at index {index}"
                    ))))
                }
            };
            frame!().push(slot);
            next_pc = pc + width;
        }
        ILOAD | FLOAD | ALOAD | LLOAD | DLOAD => {
            let index = thread.current_frame().code()[pc + 1] as usize;
            let frame = frame!();
            frame.push(frame.locals[index].clone());
            next_pc = pc + 2;
        }
        ILOAD_0..=ILOAD_3 => load_local(frame!(), (code_byte - ILOAD_0) as usize),
        LLOAD_0..=LLOAD_3 => load_local(frame!(), (code_byte - LLOAD_0) as usize),
        FLOAD_0..=FLOAD_3 => load_local(frame!(), (code_byte - FLOAD_0) as usize),
        DLOAD_0..=DLOAD_3 => load_local(frame!(), (code_byte - DLOAD_0) as usize),
        ALOAD_0..=ALOAD_3 => load_local(frame!(), (code_byte - ALOAD_0) as usize),
        ISTORE | FSTORE | ASTORE | LSTORE | DSTORE => {
            let index = thread.current_frame().code()[pc + 1] as usize;
            let frame = frame!();
            let value = frame.pop();
            frame.locals[index] = value;
            next_pc = pc + 2;
        }
        ISTORE_0..=ISTORE_3 => store_local(frame!(), (code_byte - ISTORE_0) as usize),
        LSTORE_0..=LSTORE_3 => store_local(frame!(), (code_byte - LSTORE_0) as usize),
        FSTORE_0..=FSTORE_3 => store_local(frame!(), (code_byte - FSTORE_0) as usize),
        DSTORE_0..=DSTORE_3 => store_local(frame!(), (code_byte - DSTORE_0) as usize),
        ASTORE_0..=ASTORE_3 => store_local(frame!(), (code_byte - ASTORE_0) as usize),

        IALOAD | LALOAD | FALOAD | DALOAD | AALOAD | BALOAD | CALOAD | SALOAD => {
            array_load(thread, ctx, code_byte)?;
        }
        IASTORE | LASTORE | FASTORE | DASTORE | AASTORE | BASTORE | CASTORE | SASTORE => {
            array_store(thread, ctx, code_byte)?;
        }

        POP => {
            frame!().pop();
        }
        POP2 => {
            let frame = frame!();
            let top = frame.pop();
            if !matches!(top, Slot::Long(_) | Slot::Double(_)) {
                frame.pop();
            }
        }
        DUP => {
            let frame = frame!();
            let top = frame.operand_stack.last().unwrap().clone();
            frame.push(top);
        }
        DUP_X1 => {
            let frame = frame!();
            let a = frame.pop();
            let b = frame.pop();
            frame.push(a.clone());
            frame.push(b);
            frame.push(a);
        }
        DUP_X2 => {
            let frame = frame!();
            let a = frame.pop();
            let b = frame.pop();
            let c = frame.pop();
            frame.push(a.clone());
            frame.push(c);
            frame.push(b);
            frame.push(a);
        }
        DUP2_X1 => {
            let frame = frame!();
            let top = frame.operand_stack.last().unwrap().clone();
            if matches!(top, Slot::Long(_) | Slot::Double(_)) {
                let a = frame.pop();
                let b = frame.pop();
                frame.push(a.clone());
                frame.push(b);
                frame.push(a);
            } else {
                let a = frame.pop();
                let b = frame.pop();
                let c = frame.pop();
                frame.push(b.clone());
                frame.push(a.clone());
                frame.push(c);
                frame.push(b);
                frame.push(a);
            }
        }
        DUP2_X2 => {
            let frame = frame!();
            let len = frame.operand_stack.len();
            let is_wide = |i: usize| matches!(frame.operand_stack[i], Slot::Long(_) | Slot::Double(_));
            let top_is_wide = is_wide(len - 1);
            if top_is_wide && len >= 2 && is_wide(len - 2) {
                // form 4: one category-2 value dup'd above another.
                let a = frame.pop();
                let b = frame.pop();
                frame.push(a.clone());
                frame.push(b);
                frame.push(a);
            } else if top_is_wide {
                // form 2: one category-2 value dup'd above three category-1 values.
                let a = frame.pop();
                let b = frame.pop();
                let c = frame.pop();
                let d = frame.pop();
                frame.push(a.clone());
                frame.push(d);
                frame.push(c);
                frame.push(b);
                frame.push(a);
            } else if len >= 3 && is_wide(len - 3) {
                // form 3: two category-1 values dup'd above one category-2 value.
                let a = frame.pop();
                let b = frame.pop();
                let c = frame.pop();
                frame.push(b.clone());
                frame.push(a.clone());
                frame.push(c);
                frame.push(b);
                frame.push(a);
            } else {
                // form 1: two category-1 values dup'd above two category-1 values.
                let a = frame.pop();
                let b = frame.pop();
                let c = frame.pop();
                let d = frame.pop();
                frame.push(b.clone());
                frame.push(a.clone());
                frame.push(d);
                frame.push(c);
                frame.push(b);
                frame.push(a);
            }
        }
        DUP2 => {
            let frame = frame!();
            let top = frame.operand_stack.last().unwrap();
            if matches!(top, Slot::Long(_) | Slot::Double(_)) {
                let a = top.clone();
                frame.push(a);
            } else {
                let len = frame.operand_stack.len();
                let a = frame.operand_stack[len - 2].clone();
                let b = frame.operand_stack[len - 1].clone();
                frame.push(a);
                frame.push(b);
            }
        }
        SWAP => {
            let frame = frame!();
            let a = frame.pop();
            let b = frame.pop();
            frame.push(a);
            frame.push(b);
        }

        IADD => int_binop(frame!(), |a, b| a.wrapping_add(b)),
        ISUB => int_binop(frame!(), |a, b| a.wrapping_sub(b)),
        IMUL => int_binop(frame!(), |a, b| a.wrapping_mul(b)),
        IDIV => {
            let frame = frame!();
            let b = frame.pop().as_int().unwrap();
            let a = frame.pop().as_int().unwrap();
            if b == 0 {
                let thrown = synthesize("java/lang/ArithmeticException", "/ by zero", ctx)?;
                return Err(Unwind::Thrown(thrown));
            }
            frame.push(Slot::Int(a.wrapping_div(b)));
        }
        IREM => {
            let frame = frame!();
            let b = frame.pop().as_int().unwrap();
            let a = frame.pop().as_int().unwrap();
            if b == 0 {
                let thrown = synthesize("java/lang/ArithmeticException", "/ by zero", ctx)?;
                return Err(Unwind::Thrown(thrown));
            }
            frame.push(Slot::Int(a.wrapping_rem(b)));
        }
        INEG => {
            let frame = frame!();
            let a = frame.pop().as_int().unwrap();
            frame.push(Slot::Int(a.wrapping_neg()));
        }
        IAND => int_binop(frame!(), |a, b| a & b),
        IOR => int_binop(frame!(), |a, b| a | b),
        IXOR => int_binop(frame!(), |a, b| a ^ b),
        ISHL => int_binop(frame!(), |a, b| a.wrapping_shl(b as u32 & 0x1f)),
        ISHR => int_binop(frame!(), |a, b| a.wrapping_shr(b as u32 & 0x1f)),
        IUSHR => int_binop(frame!(), |a, b| ((a as u32).wrapping_shr(b as u32 & 0x1f)) as i32),

        LADD => long_binop(frame!(), |a, b| a.wrapping_add(b)),
        LSUB => long_binop(frame!(), |a, b| a.wrapping_sub(b)),
        LMUL => long_binop(frame!(), |a, b| a.wrapping_mul(b)),
        LDIV => {
            let frame = frame!();
            let b = frame.pop().as_long().unwrap();
            let a = frame.pop().as_long().unwrap();
            if b == 0 {
                let thrown = synthesize("java/lang/ArithmeticException", "/ by zero", ctx)?;
                return Err(Unwind::Thrown(thrown));
            }
            frame.push(Slot::Long(a.wrapping_div(b)));
        }
        LREM => {
            let frame = frame!();
            let b = frame.pop().as_long().unwrap();
            let a = frame.pop().as_long().unwrap();
            if b == 0 {
                let thrown = synthesize("java/lang/ArithmeticException", "/ by zero", ctx)?;
                return Err(Unwind::Thrown(thrown));
            }
            frame.push(Slot::Long(a.wrapping_rem(b)));
        }
        LNEG => {
            let frame = frame!();
            let a = frame.pop().as_long().unwrap();
            frame.push(Slot::Long(a.wrapping_neg()));
        }
        LCMP => {
            let frame = frame!();
            let b = frame.pop().as_long().unwrap();
            let a = frame.pop().as_long().unwrap();
            frame.push(Slot::Int(a.cmp(&b) as i32));
        }
        LAND => long_binop(frame!(), |a, b| a & b),
        LOR => long_binop(frame!(), |a, b| a | b),
        LXOR => long_binop(frame!(), |a, b| a ^ b),
        LSHL => {
            let frame = frame!();
            let shift = frame.pop().as_int().unwrap();
            let a = frame.pop().as_long().unwrap();
            frame.push(Slot::Long(a.wrapping_shl(shift as u32 & 0x3f)));
        }
        LSHR => {
            let frame = frame!();
            let shift = frame.pop().as_int().unwrap();
            let a = frame.pop().as_long().unwrap();
            frame.push(Slot::Long(a.wrapping_shr(shift as u32 & 0x3f)));
        }
        LUSHR => {
            let frame = frame!();
            let shift = frame.pop().as_int().unwrap();
            let a = frame.pop().as_long().unwrap();
            frame.push(Slot::Long(((a as u64).wrapping_shr(shift as u32 & 0x3f)) as i64));
        }

        FADD => float_binop(frame!(), |a, b| a + b),
        FSUB => float_binop(frame!(), |a, b| a - b),
        FMUL => float_binop(frame!(), |a, b| a * b),
        FDIV => float_binop(frame!(), |a, b| a / b),
        FREM => float_binop(frame!(), |a, b| a % b),
        FNEG => {
            let frame = frame!();
            let a = frame.pop().as_float().unwrap();
            frame.push(Slot::Float(-a));
        }
        DADD => double_binop(frame!(), |a, b| a + b),
        DSUB => double_binop(frame!(), |a, b| a - b),
        DMUL => double_binop(frame!(), |a, b| a * b),
        DDIV => double_binop(frame!(), |a, b| a / b),
        DREM => double_binop(frame!(), |a, b| a % b),
        DNEG => {
            let frame = frame!();
            let a = frame.pop().as_double().unwrap();
            frame.push(Slot::Double(-a));
        }

        IINC => {
            let index = thread.current_frame().code()[pc + 1] as usize;
            let delta = thread.current_frame().code()[pc + 2] as i8 as i32;
            let frame = frame!();
            let current = frame.locals[index].as_int().unwrap();
            frame.locals[index] = Slot::Int(current.wrapping_add(delta));
            next_pc = pc + 3;
        }

        I2L => conv(frame!(), |f| Slot::Long(f.pop().as_int().unwrap() as i64)),
        I2F => conv(frame!(), |f| Slot::Float(f.pop().as_int().unwrap() as f32)),
        I2D => conv(frame!(), |f| Slot::Double(f.pop().as_int().unwrap() as f64)),
        L2I => conv(frame!(), |f| Slot::Int(f.pop().as_long().unwrap() as i32)),
        L2F => conv(frame!(), |f| Slot::Float(f.pop().as_long().unwrap() as f32)),
        L2D => conv(frame!(), |f| Slot::Double(f.pop().as_long().unwrap() as f64)),
        F2I => conv(frame!(), |f| Slot::Int(f.pop().as_float().unwrap() as i32)),
        F2L => conv(frame!(), |f| Slot::Long(f.pop().as_float().unwrap() as i64)),
        F2D => conv(frame!(), |f| Slot::Double(f.pop().as_float().unwrap() as f64)),
        D2I => conv(frame!(), |f| Slot::Int(f.pop().as_double().unwrap() as i32)),
        D2L => conv(frame!(), |f| Slot::Long(f.pop().as_double().unwrap() as i64)),
        D2F => conv(frame!(), |f| Slot::Float(f.pop().as_double().unwrap() as f32)),
        I2B => conv(frame!(), |f| Slot::Int(f.pop().as_int().unwrap() as i8 as i32)),
        I2C => conv(frame!(), |f| Slot::Int(f.pop().as_int().unwrap() as u16 as i32)),
        I2S => conv(frame!(), |f| Slot::Int(f.pop().as_int().unwrap() as i16 as i32)),

        FCMPL | FCMPG => {
            let frame = frame!();
            let b = frame.pop().as_float().unwrap();
            let a = frame.pop().as_float().unwrap();
            frame.push(Slot::Int(float_cmp(a, b, code_byte == FCMPG)));
        }
        DCMPL | DCMPG => {
            let frame = frame!();
            let b = frame.pop().as_double().unwrap();
            let a = frame.pop().as_double().unwrap();
            frame.push(Slot::Int(double_cmp(a, b, code_byte == DCMPG)));
        }

        IFEQ | IFNE | IFLT | IFGE | IFGT | IFLE => {
            let frame = frame!();
            let value = frame.pop().as_int().unwrap();
            let taken = match code_byte {
                IFEQ => value == 0,
                IFNE => value != 0,
                IFLT => value < 0,
                IFGE => value >= 0,
                IFGT => value > 0,
                _ => value <= 0,
            };
            next_pc = branch_target(thread.current_frame().code(), pc, taken);
        }
        IF_ICMPEQ | IF_ICMPNE | IF_ICMPLT | IF_ICMPGE | IF_ICMPGT | IF_ICMPLE => {
            let frame = frame!();
            let b = frame.pop().as_int().unwrap();
            let a = frame.pop().as_int().unwrap();
            let taken = match code_byte {
                IF_ICMPEQ => a == b,
                IF_ICMPNE => a != b,
                IF_ICMPLT => a < b,
                IF_ICMPGE => a >= b,
                IF_ICMPGT => a > b,
                _ => a <= b,
            };
            next_pc = branch_target(thread.current_frame().code(), pc, taken);
        }
        IF_ACMPEQ | IF_ACMPNE => {
            let frame = frame!();
            let b = frame.pop();
            let a = frame.pop();
            let equal = ref_eq(&a, &b);
            let taken = if code_byte == IF_ACMPEQ { equal } else { !equal };
            next_pc = branch_target(thread.current_frame().code(), pc, taken);
        }
        IFNULL | IFNONNULL => {
            let frame = frame!();
            let value = frame.pop();
            let is_null = matches!(&value, Slot::Reference(r) if r.is_null());
            let taken = if code_byte == IFNULL { is_null } else { !is_null };
            next_pc = branch_target(thread.current_frame().code(), pc, taken);
        }
        GOTO => {
            next_pc = branch_target(thread.current_frame().code(), pc, true);
        }
        GOTO_W => {
            let offset = i32_at(thread.current_frame().code(), pc + 1);
            next_pc = (pc as i64 + offset as i64) as usize;
        }
        JSR => {
            let frame = frame!();
            frame.push(Slot::ReturnAddress(pc + 3));
            next_pc = branch_target(thread.current_frame().code(), pc, true);
        }
        JSR_W => {
            let offset = i32_at(thread.current_frame().code(), pc + 1);
            frame!().push(Slot::ReturnAddress(pc + 5));
            next_pc = (pc as i64 + offset as i64) as usize;
        }
        RET => {
            let index = thread.current_frame().code()[pc + 1] as usize;
            let target = thread.current_frame().locals[index].clone();
            next_pc = match target {
                Slot::ReturnAddress(addr) => addr,
                _ => {
                    return Err(Unwind::Fatal(VmError::Fatal(
                        "ret from a local that is not a return address".into(),
                    )))
                }
            };
        }
        TABLESWITCH => {
            next_pc = table_switch(thread, pc)?;
        }
        LOOKUPSWITCH => {
            next_pc = lookup_switch(thread, pc)?;
        }

        IRETURN | FRETURN | ARETURN | LRETURN | DRETURN => {
            let value = frame!().pop();
            return Ok(Step::Return(value));
        }
        RETURN => return Ok(Step::Return(Slot::None)),

        GETSTATIC => {
            let index = u16_at(thread.current_frame().code(), pc + 1);
            let field = resolve::resolve_field(&pool, index, &class_ref, ctx.loader, ctx.primitives)
                .map_err(|e| unwind_from_resolve(e, ctx))?;
            ensure_initialized(&field.owner, thread, ctx)?;
            let value = field
                .owner
                .as_loaded()
                .unwrap()
                .static_fields
                .borrow()[field.field.slot_index]
                .clone();
            frame!().push(value);
            next_pc = pc + 3;
        }
        PUTSTATIC => {
            let index = u16_at(thread.current_frame().code(), pc + 1);
            let field = resolve::resolve_field(&pool, index, &class_ref, ctx.loader, ctx.primitives)
                .map_err(|e| unwind_from_resolve(e, ctx))?;
            check_final_write(&field, &class_ref, &thread.current_frame().method.name, "<clinit>", ctx)?;
            ensure_initialized(&field.owner, thread, ctx)?;
            let value = frame!().pop();
            field.owner.as_loaded().unwrap().static_fields.borrow_mut()[field.field.slot_index] = value;
            next_pc = pc + 3;
        }
        GETFIELD => {
            let index = u16_at(thread.current_frame().code(), pc + 1);
            let field = resolve::resolve_field(&pool, index, &class_ref, ctx.loader, ctx.primitives)
                .map_err(|e| unwind_from_resolve(e, ctx))?;
            let objectref = frame!().pop();
            let reference = objectref.as_reference().cloned().unwrap_or(RtRef::Null);
            null_check(&reference, ctx)?;
            let instance = match reference {
                RtRef::Instance(i) => i,
                _ => {
                    return Err(Unwind::Fatal(VmError::Fatal(
                        "getfield on a non-instance reference".into(),
                    )))
                }
            };
            let value = instance.fields.borrow()[field.field.slot_index].clone();
            frame!().push(value);
            next_pc = pc + 3;
        }
        PUTFIELD => {
            let index = u16_at(thread.current_frame().code(), pc + 1);
            let field = resolve::resolve_field(&pool, index, &class_ref, ctx.loader, ctx.primitives)
                .map_err(|e| unwind_from_resolve(e, ctx))?;
            check_final_write(&field, &class_ref, &thread.current_frame().method.name, "<init>", ctx)?;
            let value = frame!().pop();
            let objectref = frame!().pop();
            let reference = objectref.as_reference().cloned().unwrap_or(RtRef::Null);
            null_check(&reference, ctx)?;
            let instance = match reference {
                RtRef::Instance(i) => i,
                _ => {
                    return Err(Unwind::Fatal(VmError::Fatal(
                        "putfield on a non-instance reference".into(),
                    )))
                }
            };
            instance.fields.borrow_mut()[field.field.slot_index] = value;
            next_pc = pc + 3;
        }

        INVOKEVIRTUAL | INVOKESPECIAL | INVOKESTATIC | INVOKEINTERFACE => {
            next_pc = invoke(thread, ctx, &pool, &class_ref, pc, code_byte)?;
        }
        INVOKEDYNAMIC => {
            let index = u16_at(thread.current_frame().code(), pc + 1);
            let target = crate::resolve::dynamic::resolve_invoke_dynamic(
                &pool,
                index,
                &class_ref,
                ctx.loader,
                ctx.primitives,
            )
            .map_err(|e| unwind_from_resolve(e, ctx))?;
            let method = match target {
                RtRef::ClassMethod(m) | RtRef::InterfaceMethod(m) => m,
                _ => {
                    return Err(Unwind::Fatal(VmError::Fatal(
                        "invokedynamic call site did not link to a method".into(),
                    )))
                }
            };
            let arg_count = method.argument_types.len();
            let mut args = pop_args(frame!(), arg_count);
            args.reverse();
            let owner = method.owner.clone();
            let result = invoke_direct(thread, ctx, owner, method.method.clone(), args)?;
            if !matches!(result, Slot::None) {
                frame!().push(result);
            }
            next_pc = pc + 5;
        }

        NEW => {
            let index = u16_at(thread.current_frame().code(), pc + 1);
            let target = resolve::resolve_class(&pool, index, &class_ref, ctx.loader)
                .map_err(|e| unwind_from_resolve(e, ctx))?;
            ensure_initialized(&target, thread, ctx)?;
            let class = target.as_loaded().unwrap().clone();
            let instance = Instance::new(target, default_instance_slots(&class));
            frame!().push(Slot::Reference(RtRef::Instance(instance)));
            next_pc = pc + 3;
        }
        NEWARRAY => {
            let type_code = thread.current_frame().code()[pc + 1];
            let count = frame!().pop().as_int().unwrap();
            if count < 0 {
                let thrown = synthesize("java/lang/NegativeArraySizeException", count.to_string(), ctx)?;
                return Err(Unwind::Thrown(thrown));
            }
            let tag = primitive_array_tag(type_code).ok_or_else(|| {
                Unwind::Fatal(VmError::Fatal(format!("unknown newarray type code {type_code}")))
            })?;
            let array_class = ctx
                .loader
                .load(&format!("[{tag}"))
                .map_err(|e| unwind_from_loader(e, ctx))?;
            let slots = vec![Slot::default_for_tag(tag); count as usize];
            let instance = Instance::new(array_class, slots);
            frame!().push(Slot::Reference(RtRef::Instance(instance)));
            next_pc = pc + 2;
        }
        ANEWARRAY => {
            let index = u16_at(thread.current_frame().code(), pc + 1);
            let element = resolve::resolve_class(&pool, index, &class_ref, ctx.loader)
                .map_err(|e| unwind_from_resolve(e, ctx))?;
            let count = frame!().pop().as_int().unwrap();
            if count < 0 {
                let thrown = synthesize("java/lang/NegativeArraySizeException", count.to_string(), ctx)?;
                return Err(Unwind::Thrown(thrown));
            }
            let array_name = format!("[L{};", element.name());
            let array_class = ctx
                .loader
                .load(&array_name)
                .map_err(|e| unwind_from_loader(e, ctx))?;
            let slots = vec![Slot::Reference(RtRef::Null); count as usize];
            let instance = Instance::new(array_class, slots);
            frame!().push(Slot::Reference(RtRef::Instance(instance)));
            next_pc = pc + 3;
        }
        MULTIANEWARRAY => {
            let index = u16_at(thread.current_frame().code(), pc + 1);
            let dimensions = thread.current_frame().code()[pc + 3] as usize;
            let element = resolve::resolve_class(&pool, index, &class_ref, ctx.loader)
                .map_err(|e| unwind_from_resolve(e, ctx))?;
            let mut counts = Vec::with_capacity(dimensions);
            for _ in 0..dimensions {
                counts.push(frame!().pop().as_int().unwrap());
            }
            counts.reverse();
            let instance = build_multi_array(&counts, &element, ctx)?;
            frame!().push(Slot::Reference(RtRef::Instance(instance)));
            next_pc = pc + 4;
        }
        ARRAYLENGTH => {
            let objectref = frame!().pop();
            let reference = objectref.as_reference().cloned().unwrap_or(RtRef::Null);
            null_check(&reference, ctx)?;
            let instance = match reference {
                RtRef::Instance(i) => i,
                _ => {
                    return Err(Unwind::Fatal(VmError::Fatal(
                        "arraylength on a non-array reference".into(),
                    )))
                }
            };
            let len = instance.fields.borrow().len() as i32;
            frame!().push(Slot::Int(len));
        }

        ATHROW => {
            let objectref = frame!().pop();
            let reference = objectref.as_reference().cloned().unwrap_or(RtRef::Null);
            null_check(&reference, ctx)?;
            let instance = match reference {
                RtRef::Instance(i) => i,
                _ => {
                    return Err(Unwind::Fatal(VmError::Fatal("athrow of a non-instance".into())))
                }
            };
            return Err(Unwind::Thrown(instance));
        }

        CHECKCAST | INSTANCEOF => {
            let index = u16_at(thread.current_frame().code(), pc + 1);
            let target = resolve::resolve_class(&pool, index, &class_ref, ctx.loader)
                .map_err(|e| unwind_from_resolve(e, ctx))?;
            let objectref = frame!().pop();
            let reference = objectref.as_reference().cloned().unwrap_or(RtRef::Null);
            let is_instance = match &reference {
                RtRef::Null => false,
                RtRef::Instance(i) => resolve::is_assignable(&i.class, &target),
                _ => false,
            };
            if code_byte == INSTANCEOF {
                frame!().push(Slot::Int(is_instance as i32));
            } else {
                if !reference.is_null() && !is_instance {
                    let thrown = synthesize(
                        "java/lang/ClassCastException",
                        format!("cannot cast to {}", target.name()),
                        ctx,
                    )?;
                    return Err(Unwind::Thrown(thrown));
                }
                frame!().push(Slot::Reference(reference));
            }
            next_pc = pc + 3;
        }

        MONITORENTER => {
            let objectref = frame!().pop();
            let reference = objectref.as_reference().cloned().unwrap_or(RtRef::Null);
            null_check(&reference, ctx)?;
            if let Some(monitor) = reference.monitor() {
                let mut monitor = monitor.borrow_mut();
                match monitor.owner {
                    Some(owner) if owner == thread.id => monitor.entry_count += 1,
                    None => {
                        monitor.owner = Some(thread.id);
                        monitor.entry_count = 1;
                    }
                    Some(_) => {
                        return Err(Unwind::Fatal(VmError::Fatal(
                            "monitor held by another thread in a single-threaded VM".into(),
                        )))
                    }
                }
            }
        }
        MONITOREXIT => {
            let objectref = frame!().pop();
            let reference = objectref.as_reference().cloned().unwrap_or(RtRef::Null);
            null_check(&reference, ctx)?;
            if let Some(monitor) = reference.monitor() {
                let mut monitor = monitor.borrow_mut();
                if monitor.owner != Some(thread.id) {
                    return throw(
                        "java/lang/IllegalMonitorStateException",
                        "monitorexit by a thread that does not own the monitor",
                        ctx,
                    );
                }
                monitor.entry_count -= 1;
                if monitor.entry_count == 0 {
                    monitor.owner = None;
                }
            }
        }

        WIDE => {
            next_pc = execute_wide(thread, ctx, pc)?;
        }

        other => {
            return Err(Unwind::Fatal(VmError::Fatal(format!(
                "unsupported opcode 0x{other:02x} at pc {pc}"
            ))))
        }
    }

    thread.current_frame_mut().pc = next_pc;
    Ok(Step::Continue)
}

fn load_local(frame: &mut Frame, index: usize) {
    frame.push(frame.locals[index].clone());
}

fn store_local(frame: &mut Frame, index: usize) {
    let value = frame.pop();
    frame.locals[index] = value;
}

fn int_binop(frame: &mut Frame, f: impl Fn(i32, i32) -> i32) {
    let b = frame.pop().as_int().unwrap();
    let a = frame.pop().as_int().unwrap();
    frame.push(Slot::Int(f(a, b)));
}

fn long_binop(frame: &mut Frame, f: impl Fn(i64, i64) -> i64) {
    let b = frame.pop().as_long().unwrap();
    let a = frame.pop().as_long().unwrap();
    frame.push(Slot::Long(f(a, b)));
}

fn float_binop(frame: &mut Frame, f: impl Fn(f32, f32) -> f32) {
    let b = frame.pop().as_float().unwrap();
    let a = frame.pop().as_float().unwrap();
    frame.push(Slot::Float(f(a, b)));
}

fn double_binop(frame: &mut Frame, f: impl Fn(f64, f64) -> f64) {
    let b = frame.pop().as_double().unwrap();
    let a = frame.pop().as_double().unwrap();
    frame.push(Slot::Double(f(a, b)));
}

fn conv(frame: &mut Frame, f: impl Fn(&mut Frame) -> Slot) {
    let value = f(frame);
    frame.push(value);
}

fn float_cmp(a: f32, b: f32, nan_is_greater: bool) -> i32 {
    match a.partial_cmp(&b) {
        Some(std::cmp::Ordering::Less) => -1,
        Some(std::cmp::Ordering::Equal) => 0,
        Some(std::cmp::Ordering::Greater) => 1,
        None => {
            if nan_is_greater {
                1
            } else {
                -1
            }
        }
    }
}

fn double_cmp(a: f64, b: f64, nan_is_greater: bool) -> i32 {
    match a.partial_cmp(&b) {
        Some(std::cmp::Ordering::Less) => -1,
        Some(std::cmp::Ordering::Equal) => 0,
        Some(std::cmp::Ordering::Greater) => 1,
        None => {
            if nan_is_greater {
                1
            } else {
                -1
            }
        }
    }
}

fn ref_eq(a: &Slot, b: &Slot) -> bool {
    match (a.as_reference(), b.as_reference()) {
        (Some(RtRef::Null), Some(RtRef::Null)) => true,
        (Some(RtRef::Instance(x)), Some(RtRef::Instance(y))) => Rc::ptr_eq(x, y),
        (Some(RtRef::Class(x)), Some(RtRef::Class(y))) => x.name() == y.name(),
        _ => false,
    }
}

fn branch_target(code: &[u8], pc: usize, taken: bool) -> usize {
    if taken {
        let offset = i16_at(code, pc + 1);
        (pc as i64 + offset as i64) as usize
    } else {
        pc + 3
    }
}

fn table_switch(thread: &mut Thread, pc: usize) -> Result<usize, Unwind> {
    let code = thread.current_frame().code().to_vec();
    let mut cursor = pc + 1;
    cursor += (4 - (cursor % 4)) % 4;
    let default = i32_at(&code, cursor);
    let low = i32_at(&code, cursor + 4);
    let high = i32_at(&code, cursor + 8);
    let key = thread.current_frame_mut().pop().as_int().unwrap();
    if key < low || key > high {
        return Ok((pc as i64 + default as i64) as usize);
    }
    let entry_offset = cursor + 12 + (key - low) as usize * 4;
    let offset = i32_at(&code, entry_offset);
    Ok((pc as i64 + offset as i64) as usize)
}

fn lookup_switch(thread: &mut Thread, pc: usize) -> Result<usize, Unwind> {
    let code = thread.current_frame().code().to_vec();
    let mut cursor = pc + 1;
    cursor += (4 - (cursor % 4)) % 4;
    let default = i32_at(&code, cursor);
    let npairs = i32_at(&code, cursor + 4) as usize;
    let key = thread.current_frame_mut().pop().as_int().unwrap();
    let mut table_cursor = cursor + 8;
    for _ in 0..npairs {
        let match_value = i32_at(&code, table_cursor);
        if match_value == key {
            let offset = i32_at(&code, table_cursor + 4);
            return Ok((pc as i64 + offset as i64) as usize);
        }
        table_cursor += 8;
    }
    Ok((pc as i64 + default as i64) as usize)
}

fn pop_args(frame: &mut Frame, count: usize) -> Vec<Slot> {
    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        args.push(frame.pop());
    }
    args
}

fn primitive_array_tag(type_code: u8) -> Option<char> {
    Some(match type_code {
        opcode::T_BOOLEAN => 'Z',
        opcode::T_CHAR => 'C',
        opcode::T_FLOAT => 'F',
        opcode::T_DOUBLE => 'D',
        opcode::T_BYTE => 'B',
        opcode::T_SHORT => 'S',
        opcode::T_INT => 'I',
        opcode::T_LONG => 'J',
        _ => return None,
    })
}

fn build_multi_array(
    counts: &[i32],
    element: &ClassRef,
    ctx: &Context,
) -> Result<InstanceRef, Unwind> {
    let count = counts[0];
    if count < 0 {
        let thrown = synthesize("java/lang/NegativeArraySizeException", count.to_string(), ctx)?;
        return Err(Unwind::Thrown(thrown));
    }
    if counts.len() == 1 {
        let array_name = array_name_for(element, 1);
        let array_class = ctx
            .loader
            .load(&array_name)
            .map_err(|e| unwind_from_loader(e, ctx))?;
        let slots = vec![Slot::Reference(RtRef::Null); count as usize];
        return Ok(Instance::new(array_class, slots));
    }
    let inner_name = array_name_for(element, counts.len() as u32 - 1);
    let array_name = format!("[{inner_name}");
    let array_class = ctx
        .loader
        .load(&array_name)
        .map_err(|e| unwind_from_loader(e, ctx))?;
    let mut slots = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let sub = build_multi_array(&counts[1..], element, ctx)?;
        slots.push(Slot::Reference(RtRef::Instance(sub)));
    }
    Ok(Instance::new(array_class, slots))
}

fn array_name_for(element: &ClassRef, dimensions: u32) -> String {
    let prefix = "[".repeat(dimensions as usize);
    match element {
        ClassRef::Primitive(p) => format!("{prefix}{}", p.tag),
        _ => format!("{prefix}L{};", element.name()),
    }
}

fn array_load(thread: &mut Thread, ctx: &Context, opcode: u8) -> Result<(), Unwind> {
    use opcode::*;
    let frame = thread.current_frame_mut();
    let index = frame.pop().as_int().unwrap();
    let arrayref = frame.pop();
    let reference = arrayref.as_reference().cloned().unwrap_or(RtRef::Null);
    null_check(&reference, ctx)?;
    let instance = match reference {
        RtRef::Instance(i) => i,
        _ => return Err(Unwind::Fatal(VmError::Fatal("array load on non-array".into()))),
    };
    let len = instance.fields.borrow().len();
    let idx = array_index_in_bounds(len, index, ctx)?;
    let value = instance.fields.borrow()[idx].clone();
    let frame = thread.current_frame_mut();
    frame.push(match opcode {
        BALOAD => Slot::Int(value.as_int().unwrap_or(0)),
        _ => value,
    });
    Ok(())
}

fn array_store(thread: &mut Thread, ctx: &Context, _opcode: u8) -> Result<(), Unwind> {
    let frame = thread.current_frame_mut();
    let value = frame.pop();
    let index = frame.pop().as_int().unwrap();
    let arrayref = frame.pop();
    let reference = arrayref.as_reference().cloned().unwrap_or(RtRef::Null);
    null_check(&reference, ctx)?;
    let instance = match reference {
        RtRef::Instance(i) => i,
        _ => return Err(Unwind::Fatal(VmError::Fatal("array store on non-array".into()))),
    };
    let len = instance.fields.borrow().len();
    let idx = array_index_in_bounds(len, index, ctx)?;
    instance.fields.borrow_mut()[idx] = value;
    Ok(())
}

fn invoke(
    thread: &mut Thread,
    ctx: &Context,
    pool: &crate::classfile::constant_pool::ConstantPool,
    class_ref: &ClassRef,
    pc: usize,
    opcode: u8,
) -> Result<usize, Unwind> {
    use opcode::*;
    let index = u16_at(thread.current_frame().code(), pc + 1);
    let next_pc = if opcode == INVOKEINTERFACE { pc + 5 } else { pc + 3 };

    let method_ref = if opcode == INVOKEINTERFACE {
        resolve::resolve_interface_method(pool, index, class_ref, ctx.loader, ctx.primitives)
    } else {
        resolve::resolve_method(pool, index, class_ref, ctx.loader, ctx.primitives)
    }
    .map_err(|e| unwind_from_resolve(e, ctx))?;

    let arg_count = method_ref.argument_types.len();
    let is_static = opcode == INVOKESTATIC;
    let total_args = if is_static { arg_count } else { arg_count + 1 };
    let mut popped = pop_args(thread.current_frame_mut(), total_args);
    popped.reverse();

    let (receiver, args): (Option<RtRef>, Vec<Slot>) = if is_static {
        (None, popped)
    } else {
        let receiver_slot = popped.remove(0);
        let reference = receiver_slot.as_reference().cloned().unwrap_or(RtRef::Null);
        null_check(&reference, ctx)?;
        (Some(reference), popped)
    };

    if is_static {
        ensure_initialized(&method_ref.owner, thread, ctx)?;
        let result = invoke_direct(thread, ctx, method_ref.owner.clone(), method_ref.method.clone(), args)?;
        if !matches!(result, Slot::None) {
            thread.current_frame_mut().push(result);
        }
        return Ok(next_pc);
    }

    let instance = match receiver.unwrap() {
        RtRef::Instance(i) => i,
        _ => return Err(Unwind::Fatal(VmError::Fatal("invoke on a non-instance receiver".into()))),
    };

    let (owner, method) = if opcode == INVOKESPECIAL {
        (method_ref.owner.clone(), method_ref.method.clone())
    } else {
        let dispatched = resolve::select_virtual(&instance.class, &method_ref.name, &method_ref.descriptor);
        match dispatched {
            Some(m) => (instance.class.clone(), m),
            None => (method_ref.owner.clone(), method_ref.method.clone()),
        }
    };

    let mut full_args = Vec::with_capacity(args.len() + 1);
    full_args.push(Slot::Reference(RtRef::Instance(instance)));
    full_args.extend(args);
    let result = invoke_direct(thread, ctx, owner, method, full_args)?;
    if !matches!(result, Slot::None) {
        thread.current_frame_mut().push(result);
    }
    Ok(next_pc)
}

fn execute_wide(thread: &mut Thread, _ctx: &Context, pc: usize) -> Result<usize, Unwind> {
    use opcode::*;
    let code = thread.current_frame().code();
    let sub_opcode = code[pc + 1];
    let index = u16_at(code, pc + 2) as usize;
    match sub_opcode {
        IINC => {
            let delta = i16_at(code, pc + 4) as i32;
            let frame = thread.current_frame_mut();
            let current = frame.locals[index].as_int().unwrap();
            frame.locals[index] = Slot::Int(current.wrapping_add(delta));
            Ok(pc + 6)
        }
        ILOAD | FLOAD | ALOAD | LLOAD | DLOAD => {
            let frame = thread.current_frame_mut();
            let value = frame.locals[index].clone();
            frame.push(value);
            Ok(pc + 4)
        }
        ISTORE | FSTORE | ASTORE | LSTORE | DSTORE => {
            let frame = thread.current_frame_mut();
            let value = frame.pop();
            frame.locals[index] = value;
            Ok(pc + 4)
        }
        RET => {
            let frame = thread.current_frame_mut();
            match frame.locals[index].clone() {
                Slot::ReturnAddress(addr) => Ok(addr),
                _ => Err(Unwind::Fatal(VmError::Fatal(
                    "wide ret from a local that is not a return address".into(),
                ))),
            }
        }
        other => Err(Unwind::Fatal(VmError::Fatal(format!(
            "unsupported wide sub-opcode 0x{other:02x}"
        )))),
    }
}
