//! Compilation units.
//!
//! A [`Module`] owns the methods of one compilation unit and its global data. Globals are
//! kept in insertion order and never move, so a [`GlobalId`] stays valid for the lifetime
//! of the module and the layout of the global-data segment is stable.

use super::method::Method;
use super::types::{align_up, DataType};
use super::value::{GlobalId, GlobalRef, ModuleId, Value, ValueKind};
use crate::core::session::CompilationSession;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

static NEXT_MODULE_ID: AtomicU32 = AtomicU32::new(0);

/// A global variable or constant.
#[derive(Debug, Clone)]
pub struct Global {
    pub name: Arc<str>,
    /// Type of the global's address (a pointer to its content).
    pub ty: DataType,
    pub initial_value: Value,
    pub is_constant: bool,
}

impl Global {
    /// Type of the stored content.
    pub fn content_type(&self) -> DataType {
        self.ty.element_type()
    }
}

pub struct Module<'arena> {
    id: ModuleId,
    /// Global data in declaration order.
    globals: Vec<Global>,
    methods: Vec<Method<'arena>>,
    segment_alignment: u32,
}

impl<'arena> Module<'arena> {
    pub fn new(session: &CompilationSession<'arena>) -> Self {
        Self {
            id: ModuleId(NEXT_MODULE_ID.fetch_add(1, Ordering::Relaxed)),
            globals: Vec::new(),
            methods: Vec::new(),
            segment_alignment: session.config().global_segment_alignment,
        }
    }

    /// Declare a global holding `initial_value`. Returns the global's address.
    pub fn add_global(&mut self, name: &str, initial_value: Value, is_constant: bool) -> Value {
        let id = GlobalId(self.globals.len() as u32);
        let ty = DataType::pointer_to(initial_value.ty.clone());
        let name: Arc<str> = name.into();
        self.globals.push(Global {
            name: name.clone(),
            ty: ty.clone(),
            initial_value,
            is_constant,
        });
        Value::new(
            ValueKind::Global(GlobalRef {
                module: self.id,
                id,
                name,
            }),
            ty,
        )
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn globals(&self) -> &[Global] {
        &self.globals
    }

    /// The global behind `global`, `None` if it belongs to another module.
    pub fn global(&self, global: &GlobalRef) -> Option<&Global> {
        if global.module != self.id {
            return None;
        }
        self.globals.get(global.id.index())
    }

    pub fn find_global(&self, name: &str) -> Option<&Global> {
        self.globals.iter().find(|global| &*global.name == name)
    }

    /// Byte offset of a global from the start of the global-data segment.
    ///
    /// For a global of this module the correctly aligned position is returned. For
    /// anything else (a non-global value or `None`) the complete size of the segment,
    /// aligned to the configured segment alignment, is returned. A global of another
    /// module yields `None`.
    pub fn global_data_offset(&self, local: Option<&Value>) -> Option<u32> {
        let wanted = local.and_then(Value::global).map(|global| (global.module, global.id));
        let mut offset = 0u32;
        for (index, global) in self.globals.iter().enumerate() {
            let content = global.content_type();
            offset = align_up(offset, content.in_memory_alignment());
            if wanted.is_some_and(|(module, id)| module == self.id && id.index() == index) {
                return Some(offset);
            }
            offset += content.in_memory_width();
        }
        match wanted {
            Some(_) => None,
            None => Some(align_up(offset, self.segment_alignment)),
        }
    }

    pub fn add_method(&mut self, method: Method<'arena>) -> &mut Method<'arena> {
        self.methods.push(method);
        let last = self.methods.len() - 1;
        &mut self.methods[last]
    }

    pub fn methods(&self) -> &[Method<'arena>] {
        &self.methods
    }

    pub fn methods_mut(&mut self) -> &mut [Method<'arena>] {
        &mut self.methods
    }

    pub fn method(&self, name: &str) -> Option<&Method<'arena>> {
        self.methods.iter().find(|method| method.name == name)
    }

    pub fn method_mut(&mut self, name: &str) -> Option<&mut Method<'arena>> {
        self.methods.iter_mut().find(|method| method.name == name)
    }

    /// The methods marked as OpenCL kernels.
    pub fn kernels(&self) -> impl Iterator<Item = &Method<'arena>> + '_ {
        self.methods.iter().filter(|method| method.is_kernel)
    }
}
