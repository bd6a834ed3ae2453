/*! Capability interface of the vector-machine code generator.
 *
 * A backend value stands for one scalar per lane. All calls are synchronous and may not fail:
 * anything the lowering engine cannot express is rejected before it reaches the backend.
 */

use lanir_core::{
    AtomicOp, RegisterDecl, SamplerDim, ScalarType, SystemValue, VarId, Variable, VariableMode,
    VoteOp,
};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
    Abs,
    Sign,
    Floor,
    Ceil,
    Trunc,
    RoundEven,
    Sqrt,
    Rsqrt,
    Rcp,
    Exp2,
    Log2,
    Sin,
    Cos,
    Saturate,
    Ddx,
    Ddy,
    BitCount,
    BitReverse,
    /// All ones for a zero input.
    CountTrailingZeros,
    CountLeadingZeros,
}

/// Two-operand arithmetic. Signedness comes from the operand type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    MulHigh,
    Div,
    Rem,
    Min,
    Max,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareFunc {
    Equal,
    NotEqual,
    Less,
    GreaterEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConvertOp {
    Trunc,
    SignExtend,
    ZeroExtend,
    FloatTrunc,
    FloatExtend,
    FloatToSigned,
    FloatToUnsigned,
    SignedToFloat,
    UnsignedToFloat,
}

/// Read-modify-write operation of an atomic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RmwOp {
    Add,
    Xchg,
    And,
    Or,
    Xor,
    UMin,
    UMax,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomicKind {
    Rmw(RmwOp),
    CompareSwap,
}

impl From<AtomicOp> for AtomicKind {
    fn from(op: AtomicOp) -> Self {
        match op {
            AtomicOp::Add => AtomicKind::Rmw(RmwOp::Add),
            AtomicOp::Exchange => AtomicKind::Rmw(RmwOp::Xchg),
            AtomicOp::And => AtomicKind::Rmw(RmwOp::And),
            AtomicOp::Or => AtomicKind::Rmw(RmwOp::Or),
            AtomicOp::Xor => AtomicKind::Rmw(RmwOp::Xor),
            AtomicOp::Umin => AtomicKind::Rmw(RmwOp::UMin),
            AtomicOp::Umax => AtomicKind::Rmw(RmwOp::UMax),
            AtomicOp::Imin => AtomicKind::Rmw(RmwOp::Min),
            AtomicOp::Imax => AtomicKind::Rmw(RmwOp::Max),
            AtomicOp::CompSwap => AtomicKind::CompareSwap,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TextureTarget {
    Buffer,
    Texture1D,
    Texture1DArray,
    Texture2D,
    Texture2DArray,
    Texture3D,
    Cube,
    CubeArray,
    Rect,
}

impl TextureTarget {
    pub fn from_dim(dim: SamplerDim, is_array: bool) -> Self {
        match (dim, is_array) {
            (SamplerDim::D1, false) => TextureTarget::Texture1D,
            (SamplerDim::D1, true) => TextureTarget::Texture1DArray,
            (SamplerDim::D2 | SamplerDim::Ms, false) => TextureTarget::Texture2D,
            (SamplerDim::D2 | SamplerDim::Ms, true) => TextureTarget::Texture2DArray,
            (SamplerDim::D3, _) => TextureTarget::Texture3D,
            (SamplerDim::Cube, false) => TextureTarget::Cube,
            (SamplerDim::Cube, true) => TextureTarget::CubeArray,
            (SamplerDim::Rect, _) => TextureTarget::Rect,
            (SamplerDim::Buf, _) => TextureTarget::Buffer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleOp {
    Texture = 0,
    Fetch = 1,
    Gather = 2,
    Lodq = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LodControl {
    Implicit = 0,
    Bias = 1,
    Explicit = 2,
    Derivatives = 3,
}

/// How far a level-of-detail value is shared across lanes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LodProperty {
    Scalar = 0,
    PerElement = 1,
    PerQuad = 2,
}

/// Bit-packed sampling variant selector.
///
/// | bits | field            |
/// |------|------------------|
/// | 0    | shadow compare   |
/// | 1    | texel offsets    |
/// | 2-3  | [`SampleOp`]     |
/// | 4-5  | [`LodControl`]   |
/// | 6-7  | [`LodProperty`]  |
/// | 8-9  | gather component |
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SampleKey(u32);

impl SampleKey {
    pub const SHADOW: u32 = 1 << 0;
    pub const OFFSETS: u32 = 1 << 1;
    pub const OP_SHIFT: u32 = 2;
    pub const OP_MASK: u32 = 3 << Self::OP_SHIFT;
    pub const LOD_CONTROL_SHIFT: u32 = 4;
    pub const LOD_CONTROL_MASK: u32 = 3 << Self::LOD_CONTROL_SHIFT;
    pub const LOD_PROPERTY_SHIFT: u32 = 6;
    pub const LOD_PROPERTY_MASK: u32 = 3 << Self::LOD_PROPERTY_SHIFT;
    pub const GATHER_COMP_SHIFT: u32 = 8;
    pub const GATHER_COMP_MASK: u32 = 3 << Self::GATHER_COMP_SHIFT;

    pub fn new(op: SampleOp) -> Self {
        Self((op as u32) << Self::OP_SHIFT)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn with_shadow(self) -> Self {
        Self(self.0 | Self::SHADOW)
    }

    pub fn with_offsets(self) -> Self {
        Self(self.0 | Self::OFFSETS)
    }

    pub fn with_lod_control(self, control: LodControl) -> Self {
        Self((self.0 & !Self::LOD_CONTROL_MASK) | ((control as u32) << Self::LOD_CONTROL_SHIFT))
    }

    pub fn with_lod_property(self, property: LodProperty) -> Self {
        Self(
            (self.0 & !Self::LOD_PROPERTY_MASK)
                | ((property as u32) << Self::LOD_PROPERTY_SHIFT),
        )
    }

    pub fn with_gather_component(self, component: u8) -> Self {
        Self(
            (self.0 & !Self::GATHER_COMP_MASK)
                | (((component as u32) & 3) << Self::GATHER_COMP_SHIFT),
        )
    }

    pub fn is_shadow(self) -> bool {
        self.0 & Self::SHADOW != 0
    }

    pub fn has_offsets(self) -> bool {
        self.0 & Self::OFFSETS != 0
    }

    pub fn op(self) -> SampleOp {
        match (self.0 & Self::OP_MASK) >> Self::OP_SHIFT {
            0 => SampleOp::Texture,
            1 => SampleOp::Fetch,
            2 => SampleOp::Gather,
            _ => SampleOp::Lodq,
        }
    }

    pub fn lod_control(self) -> LodControl {
        match (self.0 & Self::LOD_CONTROL_MASK) >> Self::LOD_CONTROL_SHIFT {
            0 => LodControl::Implicit,
            1 => LodControl::Bias,
            2 => LodControl::Explicit,
            _ => LodControl::Derivatives,
        }
    }

    pub fn lod_property(self) -> LodProperty {
        match (self.0 & Self::LOD_PROPERTY_MASK) >> Self::LOD_PROPERTY_SHIFT {
            0 => LodProperty::Scalar,
            1 => LodProperty::PerElement,
            _ => LodProperty::PerQuad,
        }
    }

    pub fn gather_component(self) -> u8 {
        ((self.0 & Self::GATHER_COMP_MASK) >> Self::GATHER_COMP_SHIFT) as u8
    }
}

impl fmt::Debug for SampleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleKey")
            .field("op", &self.op())
            .field("lod_control", &self.lod_control())
            .field("lod_property", &self.lod_property())
            .field("shadow", &self.is_shadow())
            .field("offsets", &self.has_offsets())
            .field("gather_component", &self.gather_component())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Derivatives<V> {
    pub ddx: Vec<V>,
    pub ddy: Vec<V>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SampleParams<V> {
    pub target: TextureTarget,
    pub texture_index: u32,
    pub sampler_index: u32,
    pub key: SampleKey,
    /// Always five slots: s, t, r, layer/q, shadow reference.
    pub coords: Vec<V>,
    pub offsets: [Option<V>; 3],
    pub lod: Option<V>,
    pub derivatives: Option<Derivatives<V>>,
    pub sampler_handle: Option<V>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizeQueryParams<V> {
    pub target: TextureTarget,
    pub texture_unit: u32,
    pub explicit_lod: Option<V>,
    /// Query the full view info (level count lands in component 3).
    pub is_sviewinfo: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOp {
    Load,
    Store,
    Atomic(AtomicKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageParams<V> {
    pub target: TextureTarget,
    pub image_index: u32,
    pub op: ImageOp,
    /// Four slots; the layer of a 1D array sits in slot 2.
    pub coords: Vec<V>,
    pub data: Vec<V>,
    pub compare: Vec<V>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VertexIndex<V> {
    Const(u32),
    Dynamic(V),
}

/// Resolved location of a shader variable access.
#[derive(Debug, Clone)]
pub struct VarAccess<'a, V> {
    pub id: VarId,
    pub var: &'a Variable,
    pub mode: VariableMode,
    pub const_offset: u32,
    /// Already includes `const_offset` when present.
    pub indirect_offset: Option<V>,
    pub vertex_index: Option<VertexIndex<V>>,
}

pub trait Backend {
    type Value: Clone + fmt::Debug;
    type Register;

    fn const_uint(&mut self, ty: ScalarType, bits: u64) -> Self::Value;
    fn undef(&mut self, ty: ScalarType) -> Self::Value;

    fn unary(&mut self, op: UnaryOp, ty: ScalarType, a: Self::Value) -> Self::Value;
    fn binary(
        &mut self,
        op: BinaryOp,
        ty: ScalarType,
        a: Self::Value,
        b: Self::Value,
    ) -> Self::Value;
    fn fma(
        &mut self,
        ty: ScalarType,
        a: Self::Value,
        b: Self::Value,
        c: Self::Value,
    ) -> Self::Value;
    /// Lane mask of `ty`'s width: all ones where the comparison holds.
    fn compare(
        &mut self,
        func: CompareFunc,
        ordered: bool,
        ty: ScalarType,
        a: Self::Value,
        b: Self::Value,
    ) -> Self::Value;
    /// Picks `a` in lanes where `mask` is nonzero.
    fn select(
        &mut self,
        ty: ScalarType,
        mask: Self::Value,
        a: Self::Value,
        b: Self::Value,
    ) -> Self::Value;
    fn bitcast(&mut self, value: Self::Value, to: ScalarType) -> Self::Value;
    fn convert(&mut self, op: ConvertOp, value: Self::Value, to: ScalarType) -> Self::Value;
    /// Broadcasts the value of one lane to all lanes.
    fn extract_lane(&mut self, value: Self::Value, lane: u32) -> Self::Value;

    fn declare_output(&mut self, id: VarId, var: &Variable);
    fn load_var(
        &mut self,
        access: &VarAccess<'_, Self::Value>,
        num_components: u8,
        ty: ScalarType,
    ) -> Vec<Self::Value>;
    fn store_var(
        &mut self,
        access: &VarAccess<'_, Self::Value>,
        write_mask: u16,
        ty: ScalarType,
        values: &[Self::Value],
    );
    fn variable_address(&mut self, id: VarId, var: &Variable) -> Self::Value;

    fn alloc_register(&mut self, decl: &RegisterDecl) -> Self::Register;
    fn load_register(
        &mut self,
        reg: &Self::Register,
        decl: &RegisterDecl,
        indirect: Option<Self::Value>,
    ) -> Vec<Self::Value>;
    fn store_register(
        &mut self,
        reg: &Self::Register,
        decl: &RegisterDecl,
        indirect: Option<Self::Value>,
        write_mask: u16,
        values: &[Self::Value],
    );
    fn release_register(&mut self, reg: Self::Register);

    fn load_ubo(
        &mut self,
        num_components: u8,
        ty: ScalarType,
        offset_is_uniform: bool,
        index: Self::Value,
        offset: Self::Value,
    ) -> Vec<Self::Value>;
    /// SSBO access when `index` is set, shared memory otherwise.
    fn load_mem(
        &mut self,
        num_components: u8,
        ty: ScalarType,
        index: Option<Self::Value>,
        offset: Self::Value,
    ) -> Vec<Self::Value>;
    fn store_mem(
        &mut self,
        write_mask: u16,
        ty: ScalarType,
        index: Option<Self::Value>,
        offset: Self::Value,
        values: &[Self::Value],
    );
    fn atomic_mem(
        &mut self,
        op: AtomicKind,
        ty: ScalarType,
        index: Option<Self::Value>,
        offset: Self::Value,
        value: Self::Value,
        compare: Option<Self::Value>,
    ) -> Self::Value;
    fn buffer_size(&mut self, index: Self::Value) -> Self::Value;
    fn load_kernel_arg(
        &mut self,
        num_components: u8,
        ty: ScalarType,
        offset_bits: u32,
        offset_is_uniform: bool,
        offset: Self::Value,
    ) -> Vec<Self::Value>;
    fn load_global(
        &mut self,
        num_components: u8,
        ty: ScalarType,
        address_bits: u32,
        address: Self::Value,
    ) -> Vec<Self::Value>;
    fn store_global(
        &mut self,
        write_mask: u16,
        ty: ScalarType,
        address_bits: u32,
        address: Self::Value,
        values: &[Self::Value],
    );
    fn atomic_global(
        &mut self,
        op: AtomicKind,
        ty: ScalarType,
        address_bits: u32,
        address: Self::Value,
        value: Self::Value,
        compare: Option<Self::Value>,
    ) -> Self::Value;

    fn image_op(&mut self, params: &ImageParams<Self::Value>) -> Vec<Self::Value>;
    fn image_size(&mut self, params: &SizeQueryParams<Self::Value>) -> Vec<Self::Value>;
    fn sample(&mut self, params: &SampleParams<Self::Value>) -> Vec<Self::Value>;
    fn texture_size(&mut self, params: &SizeQueryParams<Self::Value>) -> Vec<Self::Value>;

    fn system_value(
        &mut self,
        value: SystemValue,
        num_components: u8,
        ty: ScalarType,
    ) -> Vec<Self::Value>;
    fn discard(&mut self, condition: Option<Self::Value>);
    fn emit_vertex(&mut self, stream: u32);
    fn end_primitive(&mut self, stream: u32);
    fn barrier(&mut self);
    fn vote(&mut self, op: VoteOp, value: Self::Value) -> Self::Value;

    fn begin_if(&mut self, condition: Self::Value);
    fn begin_else(&mut self);
    fn end_if(&mut self);
    fn begin_loop(&mut self);
    fn end_loop(&mut self);
    fn emit_break(&mut self);
    fn emit_continue(&mut self);
}
