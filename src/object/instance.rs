//! Heap instances (spec.md §3): a class reference plus a flat vector of
//! slots covering every field declared from `java/lang/Object` down to
//! the instance's actual class, indexed by the `slot_index` each
//! [`super::field::Field`] was assigned at link time.

use super::class::ClassRef;
use super::Monitor;
use crate::runtime::value::Slot;
use std::cell::RefCell;
use std::rc::Rc;

pub struct Instance {
    pub class: ClassRef,
    pub fields: RefCell<Vec<Slot>>,
    pub monitor: RefCell<Monitor>,
}

pub type InstanceRef = Rc<Instance>;

impl Instance {
    pub fn new(class: ClassRef, fields: Vec<Slot>) -> InstanceRef {
        Rc::new(Instance {
            class,
            fields: RefCell::new(fields),
            monitor: RefCell::new(Monitor::default()),
        })
    }
}
