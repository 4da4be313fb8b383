//! Named SSA storage locations.
//!
//! A [`Local`] is owned by its [`Method`](super::method::Method) and addressed by
//! [`LocalId`]. Besides its type it records what kind of storage it is (plain value,
//! parameter, stack allocation, basic-block label) and an optional provenance link to the
//! local it was derived from. The link is used for tracing only, never for ownership.

use super::types::DataType;
use super::value::LocalId;
use std::fmt;
use std::sync::Arc;

/// Decoration flags of a kernel/function parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ParameterDecorations(u8);

impl ParameterDecorations {
    pub const NONE: Self = Self(0);
    pub const VOLATILE: Self = Self(1 << 0);
    pub const READ_ONLY: Self = Self(1 << 1);
    pub const WRITE_ONLY: Self = Self(1 << 2);
    pub const RESTRICT: Self = Self(1 << 3);

    pub fn contains(self, flag: Self) -> bool {
        self.0 & flag.0 == flag.0
    }

    #[must_use]
    pub fn with(self, flag: Self) -> Self {
        Self(self.0 | flag.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl fmt::Display for ParameterDecorations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(ParameterDecorations, &str); 4] = [
            (ParameterDecorations::VOLATILE, "volatile"),
            (ParameterDecorations::READ_ONLY, "readonly"),
            (ParameterDecorations::WRITE_ONLY, "writeonly"),
            (ParameterDecorations::RESTRICT, "restrict"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        f.write_str(&names.join(" "))
    }
}

/// Storage class of a local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalKind {
    Plain,
    Parameter { decorations: ParameterDecorations },
    StackAllocation { size: u32, alignment: u32 },
    Label,
}

/// Provenance link from a derived local to the local it was computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalReference {
    pub base: LocalId,
    /// Byte offset from `base`, `None` if not known at compile time.
    pub offset: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct Local {
    pub name: Arc<str>,
    pub ty: DataType,
    pub kind: LocalKind,
    pub reference: Option<LocalReference>,
}

impl Local {
    pub fn new(name: impl Into<Arc<str>>, ty: DataType, kind: LocalKind) -> Self {
        Self {
            name: name.into(),
            ty,
            kind,
            reference: None,
        }
    }

    pub fn is_stack_allocation(&self) -> bool {
        matches!(self.kind, LocalKind::StackAllocation { .. })
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.kind, LocalKind::Parameter { .. })
    }

    pub fn is_label(&self) -> bool {
        matches!(self.kind, LocalKind::Label)
    }

    /// Decorations of a parameter, `None` for any other kind of local.
    pub fn parameter_decorations(&self) -> Option<ParameterDecorations> {
        match self.kind {
            LocalKind::Parameter { decorations } => Some(decorations),
            _ => None,
        }
    }

    /// The local this one was derived from, if recorded.
    pub fn referenced(&self) -> Option<LocalId> {
        self.reference.map(|reference| reference.base)
    }
}

impl fmt::Display for Local {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ty, self.name)
    }
}
