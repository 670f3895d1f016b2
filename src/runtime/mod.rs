//! Thread, frame, and value types the interpreter operates on (spec.md §3, §5).

pub mod frame;
pub mod thread;
pub mod value;
