/*! ALU opcodes and their metadata table.
 *
 * Every opcode carries its operand count, the base type each operand is read as and the
 * base type of its result. Unsized entries take the width of the operand they are applied to.
 */

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{BaseKind, BitSize};

/// Base kind an ALU operand or result is interpreted as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AluType {
    pub base: BaseKind,
    /// `None` means "same width as the value".
    pub bits: Option<BitSize>,
}

impl AluType {
    pub const FLOAT: AluType = AluType::any_width(BaseKind::Float);
    pub const INT: AluType = AluType::any_width(BaseKind::Int);
    pub const UINT: AluType = AluType::any_width(BaseKind::Uint);
    pub const BOOL32: AluType = AluType::with_width(BaseKind::Bool, BitSize::B32);
    pub const FLOAT32: AluType = AluType::with_width(BaseKind::Float, BitSize::B32);
    pub const FLOAT64: AluType = AluType::with_width(BaseKind::Float, BitSize::B64);
    pub const INT8: AluType = AluType::with_width(BaseKind::Int, BitSize::B8);
    pub const INT16: AluType = AluType::with_width(BaseKind::Int, BitSize::B16);
    pub const INT32: AluType = AluType::with_width(BaseKind::Int, BitSize::B32);
    pub const INT64: AluType = AluType::with_width(BaseKind::Int, BitSize::B64);
    pub const UINT8: AluType = AluType::with_width(BaseKind::Uint, BitSize::B8);
    pub const UINT16: AluType = AluType::with_width(BaseKind::Uint, BitSize::B16);
    pub const UINT32: AluType = AluType::with_width(BaseKind::Uint, BitSize::B32);
    pub const UINT64: AluType = AluType::with_width(BaseKind::Uint, BitSize::B64);

    const fn any_width(base: BaseKind) -> Self {
        Self { base, bits: None }
    }

    const fn with_width(base: BaseKind, bits: BitSize) -> Self {
        Self {
            base,
            bits: Some(bits),
        }
    }

    /// Width this type has when applied to a value of `value_bits`.
    pub fn resolve_bits(&self, value_bits: BitSize) -> BitSize {
        self.bits.unwrap_or(value_bits)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpInfo {
    pub input_types: &'static [AluType],
    pub output_type: AluType,
}

impl OpInfo {
    pub fn num_inputs(&self) -> usize {
        self.input_types.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AluOp {
    B2f32,
    B2f64,
    B2i32,
    B2i64,
    B32csel,
    BitCount,
    BitfieldSelect,
    BitfieldReverse,
    F2b32,
    F2f32,
    F2f64,
    F2i32,
    F2u32,
    F2i64,
    F2u64,
    Fabs,
    Fadd,
    Fceil,
    Fcos,
    Fddx,
    FddxCoarse,
    FddxFine,
    Fddy,
    FddyCoarse,
    FddyFine,
    Fdiv,
    Feq32,
    Fexp2,
    Ffloor,
    Ffma,
    Ffract,
    Fge32,
    FindLsb,
    Flog2,
    Flt32,
    Fmin,
    Fmax,
    Fmod,
    Fmul,
    Fne32,
    Fneg,
    Fpow,
    Frcp,
    FroundEven,
    Frsq,
    Fsat,
    Fsign,
    Fsin,
    Fsqrt,
    Ftrunc,
    I2b32,
    I2f32,
    I2f64,
    I2i8,
    I2i16,
    I2i32,
    I2i64,
    Iabs,
    Iadd,
    Iand,
    Idiv,
    Ieq32,
    Ige32,
    Ilt32,
    Imax,
    Imin,
    Imul,
    Imul24,
    ImulHigh,
    Ine32,
    Ineg,
    Inot,
    Ior,
    Irem,
    Ishl,
    Ishr,
    Isign,
    Isub,
    Ixor,
    Mov,
    Unpack64_2x32SplitX,
    Unpack64_2x32SplitY,
    Pack64_2x32Split,
    U2f32,
    U2f64,
    U2u8,
    U2u16,
    U2u32,
    U2u64,
    Udiv,
    UfindMsb,
    Uge32,
    Ult32,
    Umax,
    Umin,
    Umod,
    UmulHigh,
    Ushr,
    Vec2,
    Vec3,
    Vec4,
    Vec8,
    Vec16,
}

const F1: &[AluType] = &[AluType::FLOAT];
const F2: &[AluType] = &[AluType::FLOAT, AluType::FLOAT];
const F3: &[AluType] = &[AluType::FLOAT, AluType::FLOAT, AluType::FLOAT];
const I1: &[AluType] = &[AluType::INT];
const I2: &[AluType] = &[AluType::INT, AluType::INT];
const U1: &[AluType] = &[AluType::UINT];
const U2: &[AluType] = &[AluType::UINT, AluType::UINT];
const B1: &[AluType] = &[AluType::BOOL32];
const SHIFT_I: &[AluType] = &[AluType::INT, AluType::UINT32];
const SHIFT_U: &[AluType] = &[AluType::UINT, AluType::UINT32];
const CSEL: &[AluType] = &[AluType::BOOL32, AluType::UINT, AluType::UINT];
const U32X3: &[AluType] = &[AluType::UINT32, AluType::UINT32, AluType::UINT32];
const U64X1: &[AluType] = &[AluType::UINT64];
const VEC16: &[AluType] = &[AluType::UINT; 16];

impl AluOp {
    /// Metadata for every opcode.
    pub fn info(self) -> OpInfo {
        use AluOp::*;
        let (input_types, output_type) = match self {
            B2f32 => (B1, AluType::FLOAT32),
            B2f64 => (B1, AluType::FLOAT64),
            B2i32 => (B1, AluType::INT32),
            B2i64 => (B1, AluType::INT64),
            B32csel => (CSEL, AluType::UINT),
            BitCount => (U1, AluType::UINT32),
            BitfieldSelect => (U32X3, AluType::UINT32),
            BitfieldReverse => (&U32X3[..1], AluType::UINT32),
            F2b32 => (F1, AluType::BOOL32),
            F2f32 => (F1, AluType::FLOAT32),
            F2f64 => (F1, AluType::FLOAT64),
            F2i32 => (F1, AluType::INT32),
            F2u32 => (F1, AluType::UINT32),
            F2i64 => (F1, AluType::INT64),
            F2u64 => (F1, AluType::UINT64),
            Fabs | Fceil | Fcos | Fddx | FddxCoarse | FddxFine | Fddy | FddyCoarse | FddyFine
            | Fexp2 | Ffloor | Ffract | Flog2 | Fneg | Frcp | FroundEven | Frsq | Fsat | Fsign
            | Fsin | Fsqrt | Ftrunc => (F1, AluType::FLOAT),
            Fadd | Fdiv | Fmin | Fmax | Fmod | Fmul | Fpow => (F2, AluType::FLOAT),
            Feq32 | Fge32 | Flt32 | Fne32 => (F2, AluType::BOOL32),
            Ffma => (F3, AluType::FLOAT),
            FindLsb => (I1, AluType::INT32),
            UfindMsb => (U1, AluType::INT32),
            I2b32 => (I1, AluType::BOOL32),
            I2f32 => (I1, AluType::FLOAT32),
            I2f64 => (I1, AluType::FLOAT64),
            I2i8 => (I1, AluType::INT8),
            I2i16 => (I1, AluType::INT16),
            I2i32 => (I1, AluType::INT32),
            I2i64 => (I1, AluType::INT64),
            Iabs | Ineg | Inot | Isign => (I1, AluType::INT),
            Iadd | Iand | Idiv | Imax | Imin | Imul | Imul24 | ImulHigh | Ior | Irem | Isub
            | Ixor => (I2, AluType::INT),
            Ieq32 | Ige32 | Ilt32 | Ine32 => (I2, AluType::BOOL32),
            Ishl | Ishr => (SHIFT_I, AluType::INT),
            Ushr => (SHIFT_U, AluType::UINT),
            Mov => (U1, AluType::UINT),
            Unpack64_2x32SplitX | Unpack64_2x32SplitY => (U64X1, AluType::UINT32),
            Pack64_2x32Split => (&U32X3[..2], AluType::UINT64),
            U2f32 => (U1, AluType::FLOAT32),
            U2f64 => (U1, AluType::FLOAT64),
            U2u8 => (U1, AluType::UINT8),
            U2u16 => (U1, AluType::UINT16),
            U2u32 => (U1, AluType::UINT32),
            U2u64 => (U1, AluType::UINT64),
            Udiv | Umax | Umin | Umod | UmulHigh => (U2, AluType::UINT),
            Uge32 | Ult32 => (U2, AluType::BOOL32),
            Vec2 => (&VEC16[..2], AluType::UINT),
            Vec3 => (&VEC16[..3], AluType::UINT),
            Vec4 => (&VEC16[..4], AluType::UINT),
            Vec8 => (&VEC16[..8], AluType::UINT),
            Vec16 => (VEC16, AluType::UINT),
        };
        OpInfo {
            input_types,
            output_type,
        }
    }

    /// Component count of a vector-construction opcode.
    pub fn vec_width(self) -> Option<u8> {
        match self {
            AluOp::Vec2 => Some(2),
            AluOp::Vec3 => Some(3),
            AluOp::Vec4 => Some(4),
            AluOp::Vec8 => Some(8),
            AluOp::Vec16 => Some(16),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        use AluOp::*;
        match self {
            B2f32 => "b2f32",
            B2f64 => "b2f64",
            B2i32 => "b2i32",
            B2i64 => "b2i64",
            B32csel => "b32csel",
            BitCount => "bit_count",
            BitfieldSelect => "bitfield_select",
            BitfieldReverse => "bitfield_reverse",
            F2b32 => "f2b32",
            F2f32 => "f2f32",
            F2f64 => "f2f64",
            F2i32 => "f2i32",
            F2u32 => "f2u32",
            F2i64 => "f2i64",
            F2u64 => "f2u64",
            Fabs => "fabs",
            Fadd => "fadd",
            Fceil => "fceil",
            Fcos => "fcos",
            Fddx => "fddx",
            FddxCoarse => "fddx_coarse",
            FddxFine => "fddx_fine",
            Fddy => "fddy",
            FddyCoarse => "fddy_coarse",
            FddyFine => "fddy_fine",
            Fdiv => "fdiv",
            Feq32 => "feq32",
            Fexp2 => "fexp2",
            Ffloor => "ffloor",
            Ffma => "ffma",
            Ffract => "ffract",
            Fge32 => "fge32",
            FindLsb => "find_lsb",
            Flog2 => "flog2",
            Flt32 => "flt32",
            Fmin => "fmin",
            Fmax => "fmax",
            Fmod => "fmod",
            Fmul => "fmul",
            Fne32 => "fne32",
            Fneg => "fneg",
            Fpow => "fpow",
            Frcp => "frcp",
            FroundEven => "fround_even",
            Frsq => "frsq",
            Fsat => "fsat",
            Fsign => "fsign",
            Fsin => "fsin",
            Fsqrt => "fsqrt",
            Ftrunc => "ftrunc",
            I2b32 => "i2b32",
            I2f32 => "i2f32",
            I2f64 => "i2f64",
            I2i8 => "i2i8",
            I2i16 => "i2i16",
            I2i32 => "i2i32",
            I2i64 => "i2i64",
            Iabs => "iabs",
            Iadd => "iadd",
            Iand => "iand",
            Idiv => "idiv",
            Ieq32 => "ieq32",
            Ige32 => "ige32",
            Ilt32 => "ilt32",
            Imax => "imax",
            Imin => "imin",
            Imul => "imul",
            Imul24 => "imul24",
            ImulHigh => "imul_high",
            Ine32 => "ine32",
            Ineg => "ineg",
            Inot => "inot",
            Ior => "ior",
            Irem => "irem",
            Ishl => "ishl",
            Ishr => "ishr",
            Isign => "isign",
            Isub => "isub",
            Ixor => "ixor",
            Mov => "mov",
            Unpack64_2x32SplitX => "unpack_64_2x32_split_x",
            Unpack64_2x32SplitY => "unpack_64_2x32_split_y",
            Pack64_2x32Split => "pack_64_2x32_split",
            U2f32 => "u2f32",
            U2f64 => "u2f64",
            U2u8 => "u2u8",
            U2u16 => "u2u16",
            U2u32 => "u2u32",
            U2u64 => "u2u64",
            Udiv => "udiv",
            UfindMsb => "ufind_msb",
            Uge32 => "uge32",
            Ult32 => "ult32",
            Umax => "umax",
            Umin => "umin",
            Umod => "umod",
            UmulHigh => "umul_high",
            Ushr => "ushr",
            Vec2 => "vec2",
            Vec3 => "vec3",
            Vec4 => "vec4",
            Vec8 => "vec8",
            Vec16 => "vec16",
        }
    }
}

impl fmt::Display for AluOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
