use cranelift_entity::entity_impl;
use serde::{Deserialize, Serialize};

use crate::types::BitSize;

/// Dense index of an SSA definition inside one function.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SsaId(u32);
entity_impl!(SsaId, "ssa");

/// Dense index of a mutable register declared by a function.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegId(u32);
entity_impl!(RegId, "r");

/// Index of a shader variable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(u32);
entity_impl!(VarId, "var");

/// Shape of an SSA definition. Base kind is decided by each consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SsaDef {
    pub id: SsaId,
    pub num_components: u8,
    pub bit_size: BitSize,
}

impl SsaDef {
    pub fn new(id: SsaId, num_components: u8, bit_size: BitSize) -> Self {
        Self {
            id,
            num_components,
            bit_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegRef {
    pub reg: RegId,
    pub indirect: Option<Box<Src>>,
}

/// Instruction operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Src {
    Ssa(SsaDef),
    Reg(RegRef),
}

impl Src {
    pub fn reg(reg: RegId) -> Self {
        Src::Reg(RegRef {
            reg,
            indirect: None,
        })
    }

    pub fn reg_indirect(reg: RegId, index: Src) -> Self {
        Src::Reg(RegRef {
            reg,
            indirect: Some(Box::new(index)),
        })
    }

    pub fn as_ssa(&self) -> Option<SsaId> {
        match self {
            Src::Ssa(def) => Some(def.id),
            Src::Reg(_) => None,
        }
    }
}

impl From<SsaDef> for Src {
    fn from(def: SsaDef) -> Self {
        Src::Ssa(def)
    }
}

/// Instruction result slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dest {
    Ssa(SsaDef),
    Reg(RegRef),
}

impl Dest {
    pub fn reg(reg: RegId) -> Self {
        Dest::Reg(RegRef {
            reg,
            indirect: None,
        })
    }

    pub fn ssa_def(&self) -> Option<&SsaDef> {
        match self {
            Dest::Ssa(def) => Some(def),
            Dest::Reg(_) => None,
        }
    }
}

impl From<SsaDef> for Dest {
    fn from(def: SsaDef) -> Self {
        Dest::Ssa(def)
    }
}

pub const MAX_COMPONENTS: usize = 16;

/// ALU operand: a source plus a per-component swizzle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AluSrc {
    pub src: Src,
    pub swizzle: [u8; MAX_COMPONENTS],
}

impl AluSrc {
    pub const IDENTITY: [u8; MAX_COMPONENTS] =
        [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

    pub fn new(src: impl Into<Src>) -> Self {
        Self {
            src: src.into(),
            swizzle: Self::IDENTITY,
        }
    }

    /// Uses `components` for the leading swizzle entries; the rest stay identity.
    pub fn swizzled(src: impl Into<Src>, components: &[u8]) -> Self {
        let mut swizzle = Self::IDENTITY;
        swizzle[..components.len()].copy_from_slice(components);
        Self {
            src: src.into(),
            swizzle,
        }
    }

    pub fn is_identity(&self, num_components: usize) -> bool {
        self.swizzle[..num_components] == Self::IDENTITY[..num_components]
    }
}

impl From<SsaDef> for AluSrc {
    fn from(def: SsaDef) -> Self {
        AluSrc::new(def)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AluDest {
    pub dest: Dest,
    /// Zero writes every component.
    pub write_mask: u16,
}

impl AluDest {
    pub fn new(dest: impl Into<Dest>) -> Self {
        Self {
            dest: dest.into(),
            write_mask: 0,
        }
    }
}
