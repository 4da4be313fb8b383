// This module defines Method, the per-function container the lowering pass writes into. A
// method owns its locals (parameters, stack allocations, labels, temporaries) in an indexed
// table with a hashbrown name index, and its canonical instruction stream in a bumpalo Vec
// allocated in the compilation session's arena. Lowering only ever appends to the end of the
// stream and introduces fresh uniquely-named locals; the single exception to otherwise
// immutable locals is add_parameter_decoration, used when lowering discovers that a parameter
// must be treated as volatile. The method also answers the provenance queries intrinsic
// lowering needs: which single instruction writes a local, and which local a derived local
// was ultimately computed from (a bounded walk over the reference links).

//! Functions and their instruction streams.

use super::instruction::Instruction;
use super::local::{Local, LocalKind, LocalReference, ParameterDecorations};
use super::types::DataType;
use super::value::{LocalId, LocalRef, Value, ValueKind};
use crate::core::session::CompilationSession;
use bumpalo::collections::Vec as BumpVec;
use hashbrown::HashMap;
use std::sync::Arc;

/// A function being lowered.
pub struct Method<'arena> {
    pub name: String,
    pub return_type: DataType,
    /// Whether this is an OpenCL kernel entry point.
    pub is_kernel: bool,

    parameters: Vec<LocalId>,
    locals: Vec<Local>,
    local_names: HashMap<Arc<str>, LocalId>,

    /// Append-only instruction stream, allocated in the session arena.
    instructions: BumpVec<'arena, Instruction>,

    /// Suffix counter for fresh local names.
    next_temporary: u32,
    max_reference_depth: usize,
}

impl<'arena> Method<'arena> {
    pub fn new(session: &CompilationSession<'arena>, name: impl Into<String>, return_type: DataType) -> Self {
        Self {
            name: name.into(),
            return_type,
            is_kernel: false,
            parameters: Vec::new(),
            locals: Vec::new(),
            local_names: HashMap::new(),
            instructions: BumpVec::new_in(session.arena()),
            next_temporary: 0,
            max_reference_depth: session.config().max_reference_depth,
        }
    }

    fn insert_local(&mut self, local: Local) -> Value {
        let id = LocalId(self.locals.len() as u32);
        let value = Value::new(
            ValueKind::Local(LocalRef {
                id,
                name: local.name.clone(),
            }),
            local.ty.clone(),
        );
        self.local_names.insert(local.name.clone(), id);
        self.locals.push(local);
        value
    }

    /// Append a parameter to the signature.
    pub fn add_parameter(&mut self, name: &str, ty: DataType, decorations: ParameterDecorations) -> Value {
        let value = self.insert_local(Local::new(name, ty, LocalKind::Parameter { decorations }));
        if let Some(id) = value.local_id() {
            self.parameters.push(id);
        }
        value
    }

    /// Reserve stack memory for a `content` object. The returned value is the pointer to it.
    pub fn add_stack_allocation(&mut self, name: &str, content: DataType) -> Value {
        let kind = LocalKind::StackAllocation {
            size: content.in_memory_width(),
            alignment: content.in_memory_alignment(),
        };
        self.insert_local(Local::new(name, DataType::pointer_to(content), kind))
    }

    /// Create a basic-block label.
    pub fn add_label(&mut self, name: &str) -> Value {
        self.insert_local(Local::new(name, DataType::LABEL, LocalKind::Label))
    }

    /// Return the local called `name`, creating a plain local of type `ty` if there is none.
    pub fn find_or_create_local(&mut self, ty: DataType, name: &str) -> Value {
        match self.find_local(name) {
            Some(id) => self.value_of(id),
            None => self.insert_local(Local::new(name, ty, LocalKind::Plain)),
        }
    }

    /// Introduce a fresh, uniquely named local of type `ty`.
    pub fn add_new_local(&mut self, ty: DataType, prefix: &str) -> Value {
        loop {
            let name = format!("{prefix}.{}", self.next_temporary);
            self.next_temporary += 1;
            if !self.local_names.contains_key(name.as_str()) {
                return self.insert_local(Local::new(name, ty, LocalKind::Plain));
            }
        }
    }

    pub fn find_local(&self, name: &str) -> Option<LocalId> {
        self.local_names.get(name).copied()
    }

    /// # Panics
    ///
    /// Panics if `id` was not created by this method.
    pub fn local(&self, id: LocalId) -> &Local {
        &self.locals[id.index()]
    }

    /// A value referring to local `id`.
    pub fn value_of(&self, id: LocalId) -> Value {
        let local = self.local(id);
        Value::new(
            ValueKind::Local(LocalRef {
                id,
                name: local.name.clone(),
            }),
            local.ty.clone(),
        )
    }

    pub fn parameters(&self) -> impl Iterator<Item = &Local> + '_ {
        self.parameters.iter().map(move |id| self.local(*id))
    }

    pub fn parameter_ids(&self) -> &[LocalId] {
        &self.parameters
    }

    /// Record that `derived` was computed from `reference.base`.
    pub fn set_reference(&mut self, derived: LocalId, reference: LocalReference) {
        if derived != reference.base {
            self.locals[derived.index()].reference = Some(reference);
        }
    }

    /// Follow the reference links starting at `id` to the local it was originally derived from.
    pub fn base_of(&self, id: LocalId) -> LocalId {
        let mut current = id;
        for _ in 0..self.max_reference_depth {
            match self.local(current).referenced() {
                Some(base) if base != current => current = base,
                _ => break,
            }
        }
        current
    }

    /// Add `decorations` to parameter `id`. Returns false if `id` is not a parameter.
    pub fn add_parameter_decoration(&mut self, id: LocalId, decorations: ParameterDecorations) -> bool {
        match &mut self.locals[id.index()].kind {
            LocalKind::Parameter { decorations: current } => {
                *current = current.with(decorations);
                true
            }
            _ => false,
        }
    }

    /// Append `instruction` at the end of the stream.
    pub fn append_to_end(&mut self, instruction: Instruction) {
        log::trace!("    {instruction}");
        self.instructions.push(instruction);
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    /// The only instruction writing local `id`, `None` if there are none or several.
    pub fn single_writer(&self, id: LocalId) -> Option<&Instruction> {
        let mut writers = self
            .instructions
            .iter()
            .filter(|inst| inst.output().and_then(Value::local_id) == Some(id));
        let first = writers.next()?;
        match writers.next() {
            Some(_) => None,
            None => Some(first),
        }
    }
}
