//! The nine primitive classes (spec.md §3's "Primitive class"), created
//! once by [`crate::vm::VM::new`] and handed out by reference for the
//! lifetime of the VM.

use super::class::{ClassRef, PrimitiveClass};
use super::ResolvedCache;
use std::rc::Rc;

pub struct Primitives {
    pub byte: ClassRef,
    pub char: ClassRef,
    pub double: ClassRef,
    pub float: ClassRef,
    pub int: ClassRef,
    pub long: ClassRef,
    pub short: ClassRef,
    pub boolean: ClassRef,
    pub void: ClassRef,
}

impl Primitives {
    pub fn new() -> Self {
        Primitives {
            byte: make('B', "byte"),
            char: make('C', "char"),
            double: make('D', "double"),
            float: make('F', "float"),
            int: make('I', "int"),
            long: make('J', "long"),
            short: make('S', "short"),
            boolean: make('Z', "boolean"),
            void: make('V', "void"),
        }
    }

    /// Looks up the primitive class for a field-descriptor tag, e.g. `I`
    /// for `int`. Returns `None` for `L`/`[` (not primitive tags).
    pub fn by_tag(&self, tag: char) -> Option<&ClassRef> {
        match tag {
            'B' => Some(&self.byte),
            'C' => Some(&self.char),
            'D' => Some(&self.double),
            'F' => Some(&self.float),
            'I' => Some(&self.int),
            'J' => Some(&self.long),
            'S' => Some(&self.short),
            'Z' => Some(&self.boolean),
            'V' => Some(&self.void),
            _ => None,
        }
    }
}

fn make(tag: char, name: &str) -> ClassRef {
    ClassRef::Primitive(Rc::new(PrimitiveClass {
        tag,
        name: Rc::from(name),
        resolved_cache: ResolvedCache::default(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn by_tag_covers_all_primitive_descriptors() {
        let primitives = Primitives::new();
        for tag in ['B', 'C', 'D', 'F', 'I', 'J', 'S', 'Z', 'V'] {
            assert!(primitives.by_tag(tag).is_some());
        }
        assert!(primitives.by_tag('L').is_none());
    }
}
