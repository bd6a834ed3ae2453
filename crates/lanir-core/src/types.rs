use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{IrError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseKind {
    Float,
    Int,
    Uint,
    Bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BitSize {
    B8,
    B16,
    B32,
    B64,
}

impl BitSize {
    pub fn bits(self) -> u32 {
        match self {
            BitSize::B8 => 8,
            BitSize::B16 => 16,
            BitSize::B32 => 32,
            BitSize::B64 => 64,
        }
    }

    pub fn bytes(self) -> u32 {
        self.bits() / 8
    }

    pub fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            8 => Some(BitSize::B8),
            16 => Some(BitSize::B16),
            32 => Some(BitSize::B32),
            64 => Some(BitSize::B64),
            _ => None,
        }
    }

    /// All-ones pattern for this width.
    pub fn mask(self) -> u64 {
        match self {
            BitSize::B64 => u64::MAX,
            other => (1u64 << other.bits()) - 1,
        }
    }

    pub fn sign_bit(self) -> u64 {
        1u64 << (self.bits() - 1)
    }

    pub fn signed_max(self) -> u64 {
        self.sign_bit() - 1
    }
}

impl fmt::Display for BitSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bits())
    }
}

/// A scalar machine type: base kind plus width.
///
/// Floats exist only at 32 and 64 bits; booleans are carried as integers of
/// their width once they reach a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScalarType {
    pub kind: BaseKind,
    pub bits: BitSize,
}

impl ScalarType {
    pub const F32: ScalarType = ScalarType::raw(BaseKind::Float, BitSize::B32);
    pub const F64: ScalarType = ScalarType::raw(BaseKind::Float, BitSize::B64);
    pub const I8: ScalarType = ScalarType::raw(BaseKind::Int, BitSize::B8);
    pub const I16: ScalarType = ScalarType::raw(BaseKind::Int, BitSize::B16);
    pub const I32: ScalarType = ScalarType::raw(BaseKind::Int, BitSize::B32);
    pub const I64: ScalarType = ScalarType::raw(BaseKind::Int, BitSize::B64);
    pub const U8: ScalarType = ScalarType::raw(BaseKind::Uint, BitSize::B8);
    pub const U16: ScalarType = ScalarType::raw(BaseKind::Uint, BitSize::B16);
    pub const U32: ScalarType = ScalarType::raw(BaseKind::Uint, BitSize::B32);
    pub const U64: ScalarType = ScalarType::raw(BaseKind::Uint, BitSize::B64);

    const fn raw(kind: BaseKind, bits: BitSize) -> Self {
        Self { kind, bits }
    }

    /// Checked constructor. Booleans fold into signed integers of the same width.
    pub fn new(kind: BaseKind, bits: BitSize) -> Result<Self> {
        match (kind, bits) {
            (BaseKind::Float, BitSize::B8 | BitSize::B16) => Err(IrError::TypeError(format!(
                "float{} is not a supported machine type",
                bits
            ))),
            (BaseKind::Bool, _) => Ok(Self::raw(BaseKind::Int, bits)),
            _ => Ok(Self::raw(kind, bits)),
        }
    }

    pub fn float(bits: BitSize) -> Result<Self> {
        Self::new(BaseKind::Float, bits)
    }

    pub fn int(bits: BitSize) -> Self {
        Self::raw(BaseKind::Int, bits)
    }

    pub fn uint(bits: BitSize) -> Self {
        Self::raw(BaseKind::Uint, bits)
    }

    pub fn is_float(&self) -> bool {
        self.kind == BaseKind::Float
    }

    pub fn is_signed(&self) -> bool {
        matches!(self.kind, BaseKind::Int | BaseKind::Float)
    }

    /// Same width, unsigned integer kind.
    pub fn as_uint(&self) -> Self {
        Self::uint(self.bits)
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            BaseKind::Float => "f",
            BaseKind::Int => "i",
            BaseKind::Uint => "u",
            BaseKind::Bool => "b",
        };
        write!(f, "{}{}", prefix, self.bits)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SamplerDim {
    D1,
    D2,
    D3,
    Cube,
    Rect,
    Buf,
    Ms,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructField {
    pub name: String,
    pub ty: GlslType,
}

/// Source-level type of a shader variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlslType {
    Scalar(ScalarType),
    Vector(ScalarType, u8),
    Matrix {
        element: ScalarType,
        columns: u8,
        rows: u8,
    },
    Array(Box<GlslType>, u32),
    Struct(Vec<StructField>),
    Sampler {
        dim: SamplerDim,
        arrayed: bool,
        shadow: bool,
    },
    Image {
        dim: SamplerDim,
        arrayed: bool,
    },
}

impl GlslType {
    pub fn array_of(element: GlslType, length: u32) -> Self {
        GlslType::Array(Box::new(element), length)
    }

    pub fn vec4() -> Self {
        GlslType::Vector(ScalarType::F32, 4)
    }

    /// Number of attribute slots (vec4 locations) the type occupies.
    ///
    /// Doubles with more than two components spill into a second slot, except
    /// for vertex-stage inputs which the vertex fetch path packs into one.
    pub fn attribute_slots(&self, vs_input: bool) -> u32 {
        match self {
            GlslType::Scalar(_) => 1,
            GlslType::Vector(element, components) => {
                if !vs_input && element.bits == BitSize::B64 && *components > 2 {
                    2
                } else {
                    1
                }
            }
            GlslType::Matrix {
                element,
                columns,
                rows,
            } => {
                let column = GlslType::Vector(*element, *rows);
                *columns as u32 * column.attribute_slots(vs_input)
            }
            GlslType::Array(element, length) => length * element.attribute_slots(vs_input),
            GlslType::Struct(fields) => fields
                .iter()
                .map(|field| field.ty.attribute_slots(vs_input))
                .sum(),
            GlslType::Sampler { .. } | GlslType::Image { .. } => 1,
        }
    }

    /// Type produced by indexing: the element of an array or the column of a matrix.
    pub fn indexed_element(&self) -> Option<GlslType> {
        match self {
            GlslType::Array(element, _) => Some((**element).clone()),
            GlslType::Matrix { element, rows, .. } => Some(GlslType::Vector(*element, *rows)),
            _ => None,
        }
    }

    pub fn struct_fields(&self) -> Option<&[StructField]> {
        match self {
            GlslType::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Strips every array level.
    pub fn without_array(&self) -> &GlslType {
        let mut ty = self;
        while let GlslType::Array(element, _) = ty {
            ty = element;
        }
        ty
    }

    pub fn sampler_dim(&self) -> Option<(SamplerDim, bool)> {
        match self.without_array() {
            GlslType::Sampler { dim, arrayed, .. } | GlslType::Image { dim, arrayed } => {
                Some((*dim, *arrayed))
            }
            _ => None,
        }
    }
}
