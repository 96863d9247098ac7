//! Method metadata consumed by the walker and the argument iterators
//!
//! The walker only ever sees raw method pointers in frame slots. A
//! [`MethodTable`] resolves them into [`Method`] records: name, shorty
//! signature and the flags that decide how a frame's arguments are laid out.

use crate::arch::marshal::ArgKind;
use crate::memory::Address;
use crate::vreg::VRegType;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;

/// Primitive type tag of one shorty entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TypeId {
    Void,
    U1,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
    I64,
    U64,
    Reference,
    Tagged,
}

impl TypeId {
    pub const fn from_char(c: char) -> Option<Self> {
        Some(match c {
            'V' => TypeId::Void,
            'Z' => TypeId::U1,
            'B' => TypeId::I8,
            'b' => TypeId::U8,
            'S' => TypeId::I16,
            's' => TypeId::U16,
            'I' => TypeId::I32,
            'i' => TypeId::U32,
            'F' => TypeId::F32,
            'D' => TypeId::F64,
            'J' => TypeId::I64,
            'j' => TypeId::U64,
            'L' => TypeId::Reference,
            'A' => TypeId::Tagged,
            _ => return None,
        })
    }

    pub const fn as_char(self) -> char {
        match self {
            TypeId::Void => 'V',
            TypeId::U1 => 'Z',
            TypeId::I8 => 'B',
            TypeId::U8 => 'b',
            TypeId::I16 => 'S',
            TypeId::U16 => 's',
            TypeId::I32 => 'I',
            TypeId::U32 => 'i',
            TypeId::F32 => 'F',
            TypeId::F64 => 'D',
            TypeId::I64 => 'J',
            TypeId::U64 => 'j',
            TypeId::Reference => 'L',
            TypeId::Tagged => 'A',
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, TypeId::F32 | TypeId::F64)
    }

    /// Virtual-register type a value of this type is reported as.
    pub const fn vreg_type(self) -> VRegType {
        match self {
            TypeId::U1 => VRegType::Bool,
            TypeId::I8 | TypeId::U8 | TypeId::I16 | TypeId::U16 | TypeId::I32 | TypeId::U32 => {
                VRegType::Int32
            }
            TypeId::F32 => VRegType::Float32,
            TypeId::F64 => VRegType::Float64,
            TypeId::I64 | TypeId::U64 | TypeId::Tagged => VRegType::Int64,
            TypeId::Reference => VRegType::Object,
            TypeId::Void => VRegType::Undefined,
        }
    }

    /// Machine class for the calling convention; `None` for `Void`.
    pub const fn arg_kind(self, pointer_size: usize) -> Option<ArgKind> {
        let (size, signed) = match self {
            TypeId::Void => return None,
            TypeId::F32 => return Some(ArgKind::Float { size: 4 }),
            TypeId::F64 => return Some(ArgKind::Float { size: 8 }),
            TypeId::U1 | TypeId::U8 => (1, false),
            TypeId::I8 => (1, true),
            TypeId::I16 => (2, true),
            TypeId::U16 => (2, false),
            TypeId::I32 => (4, true),
            TypeId::U32 => (4, false),
            TypeId::I64 => (8, true),
            TypeId::U64 | TypeId::Tagged => (8, false),
            TypeId::Reference => (pointer_size, false),
        };
        Some(ArgKind::Integer { size, signed })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShortyError {
    #[error("shorty is empty")]
    Empty,

    #[error("invalid shorty character '{ch}' at position {pos}")]
    InvalidChar { ch: char, pos: usize },

    #[error("void is only allowed as the return type (position {pos})")]
    VoidArgument { pos: usize },
}

/// Compact signature: the return type followed by the declared parameter
/// types. The implicit receiver of instance methods is not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Shorty(Vec<TypeId>);

impl Shorty {
    /// `Void` is not a parameter type; any in `params` are dropped.
    pub fn new(ret: TypeId, params: impl IntoIterator<Item = TypeId>) -> Self {
        let mut types = vec![ret];
        types.extend(params.into_iter().filter(|ty| *ty != TypeId::Void));
        Self(types)
    }

    pub fn parse(text: &str) -> Result<Self, ShortyError> {
        let mut types = Vec::with_capacity(text.len());
        for (pos, ch) in text.chars().enumerate() {
            let ty = TypeId::from_char(ch).ok_or(ShortyError::InvalidChar { ch, pos })?;
            if pos > 0 && ty == TypeId::Void {
                return Err(ShortyError::VoidArgument { pos });
            }
            types.push(ty);
        }
        if types.is_empty() {
            return Err(ShortyError::Empty);
        }
        Ok(Self(types))
    }

    pub fn return_type(&self) -> TypeId {
        self.0[0]
    }

    pub fn params(&self) -> &[TypeId] {
        &self.0[1..]
    }
}

impl fmt::Display for Shorty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|ty| write!(f, "{}", ty.as_char()))
    }
}

impl std::str::FromStr for Shorty {
    type Err = ShortyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Shorty::parse(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Method {
    pub name: String,
    pub shorty: Shorty,
    pub is_static: bool,
    pub is_native: bool,
    /// Dynamic-language methods take `(method, argc, args...)` natively
    pub is_dynamic: bool,
    /// Bytecode offset → source line
    pub line_table: BTreeMap<u32, u32>,
}

impl Method {
    /// A static, managed method.
    pub fn new(name: impl Into<String>, shorty: Shorty) -> Self {
        Self {
            name: name.into(),
            shorty,
            is_static: true,
            is_native: false,
            is_dynamic: false,
            line_table: BTreeMap::new(),
        }
    }

    pub fn instance(mut self) -> Self {
        self.is_static = false;
        self
    }

    pub fn native(mut self) -> Self {
        self.is_native = true;
        self
    }

    pub fn dynamic(mut self) -> Self {
        self.is_dynamic = true;
        self
    }

    pub fn with_line(mut self, bytecode_offset: u32, line: u32) -> Self {
        self.line_table.insert(bytecode_offset, line);
        self
    }

    /// Declared arguments plus the receiver for instance methods.
    pub fn num_args(&self) -> usize {
        self.shorty.params().len() + usize::from(!self.is_static)
    }

    /// Source line of the last line-table entry at or before `bytecode_pc`.
    pub fn source_line(&self, bytecode_pc: u32) -> Option<u32> {
        self.line_table
            .range(..=bytecode_pc)
            .next_back()
            .map(|(_, line)| *line)
    }
}

/// Resolves method pointers found in frames.
pub trait MethodTable {
    fn method(&self, addr: Address) -> Option<&Method>;
}

/// In-memory [`MethodTable`] keyed by fake method addresses.
#[derive(Debug, Default, Clone)]
pub struct MethodRegistry {
    methods: HashMap<Address, Method>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, addr: Address, method: Method) -> &mut Self {
        self.methods.insert(addr, method);
        self
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

impl MethodTable for MethodRegistry {
    fn method(&self, addr: Address) -> Option<&Method> {
        self.methods.get(&addr)
    }
}
