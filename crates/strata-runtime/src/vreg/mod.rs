//! Virtual-register descriptors and values
//!
//! A [`VRegInfo`] says where one logical virtual register of a frame lives
//! (stack slot, machine register or constant pool) and what it holds. It is
//! produced on demand while walking and never stored.

pub mod dynamic;
pub mod jni;

pub use dynamic::DynamicArgIter;
pub use jni::JniArgIter;

use crate::error::{stack_corruption, StackCorruption};
use crate::memory::Address;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VRegLocation {
    None,
    Slot,
    Register,
    FpRegister,
    Constant,
    Invalid,
}

impl VRegLocation {
    pub const fn as_str(self) -> &'static str {
        match self {
            VRegLocation::None => "NONE",
            VRegLocation::Slot => "SLOT",
            VRegLocation::Register => "REGISTER",
            VRegLocation::FpRegister => "FP_REGISTER",
            VRegLocation::Constant => "CONSTANT",
            VRegLocation::Invalid => "INVALID",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VRegType {
    Undefined,
    Object,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
}

impl VRegType {
    pub const fn as_str(self) -> &'static str {
        match self {
            VRegType::Undefined => "UNDEFINED",
            VRegType::Object => "OBJECT",
            VRegType::Int32 => "INT32",
            VRegType::Int64 => "INT64",
            VRegType::Float32 => "FLOAT32",
            VRegType::Float64 => "FLOAT64",
            VRegType::Bool => "BOOL",
        }
    }
}

/// Location and type of one virtual register.
///
/// `value` is interpreted by `location`: a slot number relative to the
/// frame's register area, a machine register number, or two packed 16-bit
/// constant-pool indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VRegInfo {
    pub value: i32,
    pub location: VRegLocation,
    pub vtype: VRegType,
    pub is_acc: bool,
    pub index: u16,
}

/// Register number for the `index`-th vreg of a frame. Counts read from a
/// frame never exceed `u16::MAX` on a sound stack.
pub(crate) fn vreg_index(index: usize) -> u16 {
    u16::try_from(index)
        .unwrap_or_else(|_| stack_corruption(StackCorruption::VRegIndexOverflow { index }))
}

impl Default for VRegInfo {
    fn default() -> Self {
        Self {
            value: 0,
            location: VRegLocation::None,
            vtype: VRegType::Undefined,
            is_acc: false,
            index: 0,
        }
    }
}

impl VRegInfo {
    pub const fn new(
        value: i32,
        location: VRegLocation,
        vtype: VRegType,
        is_acc: bool,
        index: u16,
    ) -> Self {
        Self {
            value,
            location,
            vtype,
            is_acc,
            index,
        }
    }

    pub const fn slot(slot: i32, vtype: VRegType, index: u16) -> Self {
        Self::new(slot, VRegLocation::Slot, vtype, false, index)
    }

    pub const fn register(reg: u32, is_fp: bool, vtype: VRegType, index: u16) -> Self {
        let location = if is_fp {
            VRegLocation::FpRegister
        } else {
            VRegLocation::Register
        };
        Self::new(reg as i32, location, vtype, false, index)
    }

    /// A constant stored as one (`hi == low`) or two pool entries.
    pub const fn constant(low: u16, hi: u16, vtype: VRegType, index: u16) -> Self {
        let packed = (low as u32) | ((hi as u32) << 16);
        Self::new(packed as i32, VRegLocation::Constant, vtype, false, index)
    }

    pub const fn invalid() -> Self {
        Self::new(0, VRegLocation::Invalid, VRegType::Undefined, false, 0)
    }

    pub const fn with_acc(mut self, is_acc: bool) -> Self {
        self.is_acc = is_acc;
        self
    }

    pub const fn is_live(&self) -> bool {
        !matches!(self.location, VRegLocation::None | VRegLocation::Invalid)
    }

    pub const fn is_object(&self) -> bool {
        matches!(self.vtype, VRegType::Object)
    }

    pub const fn is_float(&self) -> bool {
        matches!(self.vtype, VRegType::Float32 | VRegType::Float64)
    }

    pub const fn has_64bit_value(&self) -> bool {
        matches!(self.vtype, VRegType::Float64 | VRegType::Int64)
    }

    pub const fn is_location_register(&self) -> bool {
        matches!(
            self.location,
            VRegLocation::Register | VRegLocation::FpRegister
        )
    }

    pub const fn constant_low_index(&self) -> usize {
        ((self.value as u32) & 0xffff) as usize
    }

    pub const fn constant_hi_index(&self) -> usize {
        (((self.value as u32) >> 16) & 0xffff) as usize
    }

    /// Debugger-facing name: `acc` or `v<index>`.
    pub fn name(&self) -> String {
        if self.is_acc {
            "acc".to_string()
        } else {
            format!("v{}", self.index)
        }
    }
}

impl fmt::Display for VRegInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VReg #{}:{}, {}={}",
            self.index,
            self.vtype.as_str(),
            self.location.as_str(),
            self.value
        )?;
        if self.is_acc {
            f.write_str(", ACC")?;
        }
        Ok(())
    }
}

/// Raw contents of a virtual register plus whether it holds a reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VRegValue {
    bits: u64,
    is_object: bool,
}

impl VRegValue {
    pub const fn new(bits: u64, is_object: bool) -> Self {
        Self { bits, is_object }
    }

    pub const fn from_i64(value: i64) -> Self {
        Self::new(value as u64, false)
    }

    pub const fn from_i32(value: i32) -> Self {
        Self::new(value as u32 as u64, false)
    }

    pub fn from_f64(value: f64) -> Self {
        Self::new(value.to_bits(), false)
    }

    pub fn from_f32(value: f32) -> Self {
        Self::new(u64::from(value.to_bits()), false)
    }

    pub const fn reference(addr: Address) -> Self {
        Self::new(addr, true)
    }

    pub const fn bits(&self) -> u64 {
        self.bits
    }

    pub const fn has_object(&self) -> bool {
        self.is_object
    }

    pub const fn as_i64(&self) -> i64 {
        self.bits as i64
    }

    pub const fn as_i32(&self) -> i32 {
        self.bits as i32
    }

    pub fn as_f32(&self) -> f32 {
        f32::from_bits(self.bits as u32)
    }

    pub fn as_f64(&self) -> f64 {
        f64::from_bits(self.bits)
    }

    pub const fn as_bool(&self) -> bool {
        self.bits != 0
    }

    /// The referenced object, `None` for null or non-reference values.
    pub const fn as_reference(&self) -> Option<Address> {
        if self.is_object && self.bits != 0 {
            Some(self.bits)
        } else {
            None
        }
    }

    /// Renders the value the way `vtype` says to read it.
    pub fn render(&self, vtype: VRegType) -> String {
        match vtype {
            VRegType::Int32 => self.as_i32().to_string(),
            VRegType::Int64 => self.as_i64().to_string(),
            VRegType::Float32 => self.as_f32().to_string(),
            VRegType::Float64 => self.as_f64().to_string(),
            VRegType::Bool => self.as_bool().to_string(),
            VRegType::Object => format!("{:#x}", self.bits),
            VRegType::Undefined => "undefined".to_string(),
        }
    }
}
