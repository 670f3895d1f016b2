//! End-to-end scenarios driving the loader and interpreter together
//! over hand-assembled class files, without a real JDK standard
//! library: just `java/lang/Object` and the handful of `Throwable`
//! classes the interpreter synthesizes by name.

mod common;

use common::{
    ClassBuilder, ExceptionSpec, FieldSpec, MemSource, MethodSpec, ACC_FINAL, ACC_PUBLIC, ACC_STATIC,
};
use nanojvm::byte_source::ByteSource;
use nanojvm::error::{LoaderError, SourceError};
use nanojvm::interpreter::{self, Context, Unwind};
use nanojvm::loader::Loader;
use nanojvm::object::primitive::Primitives;
use nanojvm::runtime::thread::{Thread, ThreadId};
use nanojvm::runtime::value::Slot;
use nanojvm::transcode;
use std::rc::Rc;

use nanojvm::interpreter::opcode::*;

fn new_loader(source: &Rc<MemSource>) -> Rc<Loader> {
    let primitives = Rc::new(Primitives::new());
    Loader::new_bootstrap(vec![source.clone() as Rc<dyn ByteSource>], primitives)
}

#[test]
fn hello_arithmetic_computes_and_returns() {
    let source = MemSource::new();
    common::install_core_classes(&source);

    // static int compute() { return 2 + 3 * 4; }
    let mut builder = ClassBuilder::new();
    let code = vec![
        BIPUSH, 2,
        BIPUSH, 3,
        BIPUSH, 4,
        IMUL,
        IADD,
        IRETURN,
    ];
    builder.add_method(MethodSpec {
        access_flags: ACC_PUBLIC | ACC_STATIC,
        name: "compute",
        descriptor: "()I",
        max_stack: 3,
        max_locals: 0,
        code,
        exception_table: Vec::new(),
    });
    source.add("Main", builder.build("Main", Some("java/lang/Object")));

    let loader = new_loader(&source);
    let primitives = Rc::new(Primitives::new());
    let ctx = Context { loader: &loader, primitives: &primitives };
    let mut thread = Thread::new(ThreadId(0), "main");

    let class_ref = loader.load("Main").expect("Main loads");
    let class = class_ref.as_loaded().unwrap().clone();
    let method = class.find_declared_method("compute", "()I").unwrap();

    let result = interpreter::invoke_direct(&mut thread, &ctx, class_ref, method, vec![])
        .expect("compute returns normally");
    assert_eq!(result.as_int(), Some(14));
    assert_eq!(thread.depth(), 0);
}

#[test]
fn static_initializer_runs_before_first_use() {
    let source = MemSource::new();
    common::install_core_classes(&source);

    // class Counter { static int value; static { value = 7; } }
    let mut builder = ClassBuilder::new();
    builder.add_field(FieldSpec { access_flags: ACC_STATIC, name: "value", descriptor: "I" });
    let value_field = builder.fieldref("Counter", "value", "I");
    let code = vec![
        BIPUSH, 7,
        PUTSTATIC, (value_field >> 8) as u8, value_field as u8,
        RETURN,
    ];
    builder.add_method(MethodSpec {
        access_flags: ACC_STATIC,
        name: "<clinit>",
        descriptor: "()V",
        max_stack: 1,
        max_locals: 0,
        code,
        exception_table: Vec::new(),
    });
    source.add("Counter", builder.build("Counter", Some("java/lang/Object")));

    let loader = new_loader(&source);
    let primitives = Rc::new(Primitives::new());
    let ctx = Context { loader: &loader, primitives: &primitives };
    let mut thread = Thread::new(ThreadId(0), "main");

    let class_ref = loader.load("Counter").expect("Counter loads");
    let class = class_ref.as_loaded().unwrap().clone();
    assert!(!class.initialized.get());

    interpreter::ensure_initialized(&class_ref, &mut thread, &ctx).expect("clinit runs");
    assert!(class.initialized.get());
    assert!(matches!(class.static_fields.borrow()[0], Slot::Int(7)));

    // Running it again must not re-run <clinit> (guarded by `initialized`).
    interpreter::ensure_initialized(&class_ref, &mut thread, &ctx).expect("idempotent");
    assert!(matches!(class.static_fields.borrow()[0], Slot::Int(7)));
}

#[test]
fn division_by_zero_throws_arithmetic_exception() {
    let source = MemSource::new();
    common::install_core_classes(&source);

    // static int divide() { return 1 / 0; }
    let mut builder = ClassBuilder::new();
    const ICONST_1: u8 = 0x04;
    let code = vec![ICONST_1, ICONST_0, IDIV, IRETURN];
    builder.add_method(MethodSpec {
        access_flags: ACC_PUBLIC | ACC_STATIC,
        name: "divide",
        descriptor: "()I",
        max_stack: 2,
        max_locals: 0,
        code,
        exception_table: Vec::new(),
    });
    source.add("Main", builder.build("Main", Some("java/lang/Object")));

    let loader = new_loader(&source);
    let primitives = Rc::new(Primitives::new());
    let ctx = Context { loader: &loader, primitives: &primitives };
    let mut thread = Thread::new(ThreadId(0), "main");

    let class_ref = loader.load("Main").expect("Main loads");
    let class = class_ref.as_loaded().unwrap().clone();
    let method = class.find_declared_method("divide", "()I").unwrap();

    let err = interpreter::invoke_direct(&mut thread, &ctx, class_ref, method, vec![])
        .expect_err("division by zero must throw");
    match err {
        Unwind::Thrown(instance) => {
            assert_eq!(instance.class.name().as_ref(), "java/lang/ArithmeticException");
        }
        Unwind::Fatal(e) => panic!("expected a thrown exception, got a fatal error: {e}"),
    }
    assert_eq!(thread.depth(), 0);
}

#[test]
fn exception_table_catches_the_thrown_arithmetic_exception() {
    let source = MemSource::new();
    common::install_core_classes(&source);

    // static int safeDivide() {
    //   try {
    //     return 1 / 0;     // pc 0..4, handler at 5
    //   } catch (ArithmeticException e) {
    //     return -1;         // pc 5
    //   }
    // }
    let mut builder = ClassBuilder::new();
    const ICONST_1: u8 = 0x04;
    let code = vec![
        /* 0 */ ICONST_1,
        /* 1 */ ICONST_0,
        /* 2 */ IDIV,
        /* 3 */ IRETURN,
        /* pad to keep handler_pc distinct from the try region end */
        /* 4 */ NOP,
        /* 5 */ ICONST_M1,
        /* 6 */ IRETURN,
    ];
    builder.add_method(MethodSpec {
        access_flags: ACC_PUBLIC | ACC_STATIC,
        name: "safeDivide",
        descriptor: "()I",
        max_stack: 2,
        max_locals: 0,
        code,
        exception_table: vec![ExceptionSpec {
            start_pc: 0,
            end_pc: 4,
            handler_pc: 5,
            catch_type: Some("java/lang/ArithmeticException"),
        }],
    });
    source.add("Main", builder.build("Main", Some("java/lang/Object")));

    let loader = new_loader(&source);
    let primitives = Rc::new(Primitives::new());
    let ctx = Context { loader: &loader, primitives: &primitives };
    let mut thread = Thread::new(ThreadId(0), "main");

    let class_ref = loader.load("Main").expect("Main loads");
    let class = class_ref.as_loaded().unwrap().clone();
    let method = class.find_declared_method("safeDivide", "()I").unwrap();

    let result = interpreter::invoke_direct(&mut thread, &ctx, class_ref, method, vec![])
        .expect("the handler catches the exception and returns normally");
    assert_eq!(result.as_int(), Some(-1));
    assert_eq!(thread.depth(), 0);
}

#[test]
fn loading_an_unknown_class_fails_with_class_not_found() {
    let source = MemSource::new();
    common::install_core_classes(&source);
    let loader = new_loader(&source);

    let err = loader.load("NoSuchClass").expect_err("the class does not exist");
    assert!(matches!(err, LoaderError::Source(SourceError::NotFound)));
}

#[test]
fn modified_utf8_embedded_null_round_trips_through_the_constant_pool() {
    let source = MemSource::new();
    common::install_core_classes(&source);

    // A Utf8 constant whose modified-UTF-8 encoding embeds a NUL via the
    // two-byte 0xC0 0x80 overlong form, per spec.md's modified-UTF-8 rule.
    let embedded = "a\u{0}b";
    let mut builder = ClassBuilder::new();
    let name_index = builder.utf8(embedded);
    // Force a reference to the index so it survives into the pool even
    // though no opcode in this class uses it directly.
    let _ = name_index;
    let bytes = builder.build("NullHolder", Some("java/lang/Object"));

    // Confirm the raw bytes really carry the overlong encoding, then
    // parse them with the real parser and check the decoded string.
    let encoded = transcode::to_modified(embedded.as_bytes()).unwrap();
    assert!(encoded.windows(2).any(|w| w == [0xC0, 0x80]));

    source.add("NullHolder", bytes);
    let loader = new_loader(&source);
    let class_ref = loader.load("NullHolder").expect("parses despite the embedded NUL");
    let class = class_ref.as_loaded().unwrap();
    assert_eq!(class.classfile.constant_pool.utf8(name_index).unwrap().as_ref(), embedded);
}

#[test]
fn long_bitwise_and_shift_ops_compute_expected_result() {
    let source = MemSource::new();
    common::install_core_classes(&source);

    // static long compute() {
    //   long a = 12L, b = 10L;
    //   return (a & b) + (a | b) + (a ^ b) + (a << 1) + (a >> 1) + (a >>> 1);
    // }
    let mut builder = ClassBuilder::new();
    let code = vec![
        BIPUSH, 12, I2L, LSTORE, 0,
        BIPUSH, 10, I2L, LSTORE, 1,
        LLOAD, 0, LLOAD, 1, LAND,
        LLOAD, 0, LLOAD, 1, LOR, LADD,
        LLOAD, 0, LLOAD, 1, LXOR, LADD,
        LLOAD, 0, BIPUSH, 1, LSHL, LADD,
        LLOAD, 0, BIPUSH, 1, LSHR, LADD,
        LLOAD, 0, BIPUSH, 1, LUSHR, LADD,
        LRETURN,
    ];
    builder.add_method(MethodSpec {
        access_flags: ACC_PUBLIC | ACC_STATIC,
        name: "compute",
        descriptor: "()J",
        max_stack: 4,
        max_locals: 2,
        code,
        exception_table: Vec::new(),
    });
    source.add("Main", builder.build("Main", Some("java/lang/Object")));

    let loader = new_loader(&source);
    let primitives = Rc::new(Primitives::new());
    let ctx = Context { loader: &loader, primitives: &primitives };
    let mut thread = Thread::new(ThreadId(0), "main");

    let class_ref = loader.load("Main").expect("Main loads");
    let class = class_ref.as_loaded().unwrap().clone();
    let method = class.find_declared_method("compute", "()J").unwrap();

    let result = interpreter::invoke_direct(&mut thread, &ctx, class_ref, method, vec![])
        .expect("compute returns normally");
    // (12&10)=8, (12|10)=14, (12^10)=6, (12<<1)=24, (12>>1)=6, (12>>>1)=6
    assert_eq!(result.as_long(), Some(8 + 14 + 6 + 24 + 6 + 6));
}

#[test]
fn float_and_double_remainder_ops_compute_expected_result() {
    let source = MemSource::new();
    common::install_core_classes(&source);

    // static double compute() { return (9.0f % 4.0f) + ((double) 9 % (double) 4); }
    let mut builder = ClassBuilder::new();
    let code = vec![
        BIPUSH, 9, I2F, BIPUSH, 4, I2F, FREM, F2D,
        BIPUSH, 9, I2D, BIPUSH, 4, I2D, DREM,
        DADD,
        DRETURN,
    ];
    builder.add_method(MethodSpec {
        access_flags: ACC_PUBLIC | ACC_STATIC,
        name: "compute",
        descriptor: "()D",
        max_stack: 4,
        max_locals: 0,
        code,
        exception_table: Vec::new(),
    });
    source.add("Main", builder.build("Main", Some("java/lang/Object")));

    let loader = new_loader(&source);
    let primitives = Rc::new(Primitives::new());
    let ctx = Context { loader: &loader, primitives: &primitives };
    let mut thread = Thread::new(ThreadId(0), "main");

    let class_ref = loader.load("Main").expect("Main loads");
    let class = class_ref.as_loaded().unwrap().clone();
    let method = class.find_declared_method("compute", "()D").unwrap();

    let result = interpreter::invoke_direct(&mut thread, &ctx, class_ref, method, vec![])
        .expect("compute returns normally");
    // 9.0f % 4.0f == 1.0, 9.0 % 4.0 == 1.0
    assert_eq!(result.as_double(), Some(2.0));
}

#[test]
fn dup_x2_and_dup2_variants_shuffle_the_stack_as_the_jvm_specifies() {
    let source = MemSource::new();
    common::install_core_classes(&source);

    // static int compute() {
    //   // dup_x2: ..., 1, 2, 3 -> ..., 3, 1, 2, 3 ; pops leave (3+1+2+3)=9
    //   // dup2_x1: ..., 4, 5, 6 -> ..., 5, 6, 4, 5, 6 ; sum of the top four (6+4+5+6)... only iadd top two then discard
    //   return dupX2Sum() + dup2X1Sum();
    // }
    let mut builder = ClassBuilder::new();
    let dup_x2_code = vec![
        BIPUSH, 1, BIPUSH, 2, BIPUSH, 3,
        DUP_X2,
        // ..., 1, 2, 3 -> ..., 3, 1, 2, 3 ; sum all five remaining slots.
        IADD, IADD, IADD,
        IRETURN,
    ];
    builder.add_method(MethodSpec {
        access_flags: ACC_PUBLIC | ACC_STATIC,
        name: "dupX2Sum",
        descriptor: "()I",
        max_stack: 4,
        max_locals: 0,
        code: dup_x2_code,
        exception_table: Vec::new(),
    });

    let dup2_x1_code = vec![
        BIPUSH, 4, BIPUSH, 5, BIPUSH, 6,
        DUP2_X1,
        // ..., 4, 5, 6 -> ..., 5, 6, 4, 5, 6 ; sum all five remaining slots.
        IADD, IADD, IADD, IADD,
        IRETURN,
    ];
    builder.add_method(MethodSpec {
        access_flags: ACC_PUBLIC | ACC_STATIC,
        name: "dup2X1Sum",
        descriptor: "()I",
        max_stack: 5,
        max_locals: 0,
        code: dup2_x1_code,
        exception_table: Vec::new(),
    });
    source.add("Main", builder.build("Main", Some("java/lang/Object")));

    let loader = new_loader(&source);
    let primitives = Rc::new(Primitives::new());
    let ctx = Context { loader: &loader, primitives: &primitives };
    let mut thread = Thread::new(ThreadId(0), "main");

    let class_ref = loader.load("Main").expect("Main loads");
    let class = class_ref.as_loaded().unwrap().clone();

    let dup_x2_method = class.find_declared_method("dupX2Sum", "()I").unwrap();
    let dup_x2_result =
        interpreter::invoke_direct(&mut thread, &ctx, class_ref.clone(), dup_x2_method, vec![])
            .expect("dupX2Sum returns normally");
    // push 1,2,3 (top=3); dup_x2 -> ...,3,1,2,3(top) ; sum of all four remaining slots.
    assert_eq!(dup_x2_result.as_int(), Some(3 + 1 + 2 + 3));

    let dup2_x1_method = class.find_declared_method("dup2X1Sum", "()I").unwrap();
    let dup2_x1_result =
        interpreter::invoke_direct(&mut thread, &ctx, class_ref, dup2_x1_method, vec![])
            .expect("dup2X1Sum returns normally");
    // push 4,5,6; dup2_x1 -> 4,5,6,5,6(top) ... sum of all five remaining slots.
    assert_eq!(dup2_x1_result.as_int(), Some(4 + 5 + 6 + 5 + 6));
}

#[test]
fn putstatic_on_a_final_field_outside_clinit_is_rejected() {
    let source = MemSource::new();
    common::install_core_classes(&source);

    // class Holder { static final int X; static int write() { X = 5; return X; } }
    // (the <clinit> that would legitimately set X is omitted here; `write`
    // is an ordinary static method, so the write must be rejected.)
    let mut builder = ClassBuilder::new();
    builder.add_field(FieldSpec { access_flags: ACC_STATIC | ACC_FINAL, name: "x", descriptor: "I" });
    let field_ref = builder.fieldref("Holder", "x", "I");
    let code = vec![
        BIPUSH, 5,
        PUTSTATIC, (field_ref >> 8) as u8, field_ref as u8,
        RETURN,
    ];
    builder.add_method(MethodSpec {
        access_flags: ACC_PUBLIC | ACC_STATIC,
        name: "write",
        descriptor: "()V",
        max_stack: 1,
        max_locals: 0,
        code,
        exception_table: Vec::new(),
    });
    source.add("Holder", builder.build("Holder", Some("java/lang/Object")));

    let loader = new_loader(&source);
    let primitives = Rc::new(Primitives::new());
    let ctx = Context { loader: &loader, primitives: &primitives };
    let mut thread = Thread::new(ThreadId(0), "main");

    let class_ref = loader.load("Holder").expect("Holder loads");
    let class = class_ref.as_loaded().unwrap().clone();
    let method = class.find_declared_method("write", "()V").unwrap();

    let err = interpreter::invoke_direct(&mut thread, &ctx, class_ref, method, vec![])
        .expect_err("writing a final static field outside <clinit> must be rejected");
    match err {
        Unwind::Thrown(instance) => {
            assert_eq!(instance.class.name().as_ref(), "java/lang/IllegalAccessError");
        }
        Unwind::Fatal(e) => panic!("expected a thrown exception, got a fatal error: {e}"),
    }
}

#[test]
fn putfield_on_a_final_field_from_clinit_is_still_rejected() {
    let source = MemSource::new();
    common::install_core_classes(&source);

    // class Holder { final int x; static void write() { ((Holder) null).x = 5; } }
    // Modeled directly against a null receiver: the final check must fire
    // before the null check would even matter for this test's purpose is
    // to confirm <clinit> does not count as a valid instance-field
    // initializer, so the wrong-initializer rejection is exercised here
    // rather than the write actually landing.
    let mut builder = ClassBuilder::new();
    builder.add_field(FieldSpec { access_flags: ACC_FINAL, name: "x", descriptor: "I" });
    let field_ref = builder.fieldref("Holder", "x", "I");
    let code = vec![
        ACONST_NULL,
        BIPUSH, 5,
        PUTFIELD, (field_ref >> 8) as u8, field_ref as u8,
        RETURN,
    ];
    builder.add_method(MethodSpec {
        access_flags: ACC_STATIC,
        name: "<clinit>",
        descriptor: "()V",
        max_stack: 2,
        max_locals: 0,
        code,
        exception_table: Vec::new(),
    });
    source.add("Holder", builder.build("Holder", Some("java/lang/Object")));

    let loader = new_loader(&source);
    let primitives = Rc::new(Primitives::new());
    let ctx = Context { loader: &loader, primitives: &primitives };
    let mut thread = Thread::new(ThreadId(0), "main");

    let class_ref = loader.load("Holder").expect("Holder loads");

    let err = interpreter::ensure_initialized(&class_ref, &mut thread, &ctx)
        .expect_err("a final instance field cannot be written from <clinit>");
    match err {
        Unwind::Thrown(instance) => {
            assert_eq!(instance.class.name().as_ref(), "java/lang/IllegalAccessError");
        }
        Unwind::Fatal(e) => panic!("expected a thrown exception, got a fatal error: {e}"),
    }
}

#[test]
fn null_pointer_on_getfield_receiver() {
    let source = MemSource::new();
    common::install_core_classes(&source);

    // static int readNull() { return ((Main) null).missing; } -- modeled
    // directly as aconst_null; getfield without ever defining the field,
    // since only the null check is under test here.
    let mut builder = ClassBuilder::new();
    let field_ref = builder.fieldref("Main", "x", "I");
    let code = vec![
        ACONST_NULL,
        GETFIELD, (field_ref >> 8) as u8, field_ref as u8,
        IRETURN,
    ];
    builder.add_field(FieldSpec { access_flags: 0, name: "x", descriptor: "I" });
    builder.add_method(MethodSpec {
        access_flags: ACC_PUBLIC | ACC_STATIC,
        name: "readNull",
        descriptor: "()I",
        max_stack: 1,
        max_locals: 0,
        code,
        exception_table: Vec::new(),
    });
    source.add("Main", builder.build("Main", Some("java/lang/Object")));

    let loader = new_loader(&source);
    let primitives = Rc::new(Primitives::new());
    let ctx = Context { loader: &loader, primitives: &primitives };
    let mut thread = Thread::new(ThreadId(0), "main");

    let class_ref = loader.load("Main").expect("Main loads");
    let class = class_ref.as_loaded().unwrap().clone();
    let method = class.find_declared_method("readNull", "()I").unwrap();

    let err = interpreter::invoke_direct(&mut thread, &ctx, class_ref, method, vec![])
        .expect_err("getfield on a null receiver must throw");
    match err {
        Unwind::Thrown(instance) => {
            assert_eq!(instance.class.name().as_ref(), "java/lang/NullPointerException");
        }
        Unwind::Fatal(e) => panic!("expected a thrown exception, got a fatal error: {e}"),
    }
}
