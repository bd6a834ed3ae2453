use serde::{Deserialize, Serialize};

use crate::opcodes::AluOp;
use crate::types::SamplerDim;
use crate::values::{AluDest, AluSrc, Dest, SsaDef, Src, VarId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    Alu(AluInstr),
    LoadConst(LoadConst),
    Intrinsic(Intrinsic),
    Tex(TexInstr),
    Jump(JumpKind),
    SsaUndef(SsaDef),
    Deref(DerefInstr),
    Phi(PhiInstr),
}

impl Instruction {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Instruction::Alu(_) => "alu",
            Instruction::LoadConst(_) => "load_const",
            Instruction::Intrinsic(_) => "intrinsic",
            Instruction::Tex(_) => "tex",
            Instruction::Jump(_) => "jump",
            Instruction::SsaUndef(_) => "ssa_undef",
            Instruction::Deref(_) => "deref",
            Instruction::Phi(_) => "phi",
        }
    }

    pub fn is_jump(&self) -> bool {
        matches!(self, Instruction::Jump(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AluInstr {
    pub op: AluOp,
    pub dest: AluDest,
    pub srcs: Vec<AluSrc>,
}

/// Per-component constant bits, zero-extended to 64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadConst {
    pub def: SsaDef,
    pub values: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JumpKind {
    Break,
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerefInstr {
    pub def: SsaDef,
    pub var: VarId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhiInstr {
    pub def: SsaDef,
    pub sources: Vec<Src>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DerefStep {
    Array(Src),
    Struct(u32),
}

/// Access path from a variable to the element being read or written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerefChain {
    pub var: VarId,
    pub path: Vec<DerefStep>,
}

impl DerefChain {
    pub fn var(var: VarId) -> Self {
        Self {
            var,
            path: Vec::new(),
        }
    }

    pub fn index(mut self, index: impl Into<Src>) -> Self {
        self.path.push(DerefStep::Array(index.into()));
        self
    }

    pub fn field(mut self, field: u32) -> Self {
        self.path.push(DerefStep::Struct(field));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AtomicOp {
    Add,
    Imin,
    Umin,
    Imax,
    Umax,
    And,
    Or,
    Xor,
    Exchange,
    CompSwap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemValue {
    VertexId,
    PrimitiveId,
    InstanceId,
    BaseInstance,
    BaseVertex,
    WorkGroupId,
    LocalInvocationId,
    NumWorkGroups,
    InvocationId,
    FrontFace,
    DrawId,
    LocalGroupSize,
    WorkDim,
    TessCoord,
    TessLevelOuter,
    TessLevelInner,
    PatchVerticesIn,
}

impl SystemValue {
    /// Same value for every lane of one draw or work group.
    pub fn is_group_uniform(self) -> bool {
        matches!(
            self,
            SystemValue::BaseInstance
                | SystemValue::BaseVertex
                | SystemValue::WorkGroupId
                | SystemValue::NumWorkGroups
                | SystemValue::DrawId
                | SystemValue::LocalGroupSize
                | SystemValue::WorkDim
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VoteOp {
    All,
    Any,
    Ieq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryBarrierKind {
    All,
    Buffer,
    Image,
    Shared,
    AtomicCounter,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intrinsic {
    LoadDeref {
        dest: Dest,
        deref: DerefChain,
    },
    StoreDeref {
        deref: DerefChain,
        value: Src,
        write_mask: u16,
    },
    LoadUbo {
        dest: Dest,
        index: Src,
        offset: Src,
    },
    LoadSsbo {
        dest: Dest,
        index: Src,
        offset: Src,
    },
    StoreSsbo {
        value: Src,
        index: Src,
        offset: Src,
        write_mask: u16,
    },
    SsboAtomic {
        dest: Dest,
        op: AtomicOp,
        index: Src,
        offset: Src,
        value: Src,
        compare: Option<Src>,
    },
    GetBufferSize {
        dest: Dest,
        index: Src,
    },
    ImageLoad {
        dest: Dest,
        image: VarId,
        coord: Src,
    },
    ImageStore {
        image: VarId,
        coord: Src,
        value: Src,
    },
    ImageAtomic {
        dest: Dest,
        op: AtomicOp,
        image: VarId,
        coord: Src,
        value: Src,
        compare: Option<Src>,
    },
    ImageSize {
        dest: Dest,
        image: VarId,
    },
    LoadShared {
        dest: Dest,
        offset: Src,
    },
    StoreShared {
        value: Src,
        offset: Src,
        write_mask: u16,
    },
    SharedAtomic {
        dest: Dest,
        op: AtomicOp,
        offset: Src,
        value: Src,
        compare: Option<Src>,
    },
    LoadGlobal {
        dest: Dest,
        address: Src,
    },
    StoreGlobal {
        value: Src,
        address: Src,
        write_mask: u16,
    },
    GlobalAtomic {
        dest: Dest,
        op: AtomicOp,
        address: Src,
        value: Src,
        compare: Option<Src>,
    },
    LoadKernelInput {
        dest: Dest,
        offset: Src,
    },
    LoadSystemValue {
        dest: Dest,
        value: SystemValue,
    },
    Discard,
    DiscardIf {
        condition: Src,
    },
    EmitVertex {
        stream: u32,
    },
    EndPrimitive {
        stream: u32,
    },
    ControlBarrier,
    MemoryBarrier(MemoryBarrierKind),
    Vote {
        dest: Dest,
        op: VoteOp,
        value: Src,
    },
}

impl Intrinsic {
    pub fn dest(&self) -> Option<&Dest> {
        match self {
            Intrinsic::LoadDeref { dest, .. }
            | Intrinsic::LoadUbo { dest, .. }
            | Intrinsic::LoadSsbo { dest, .. }
            | Intrinsic::SsboAtomic { dest, .. }
            | Intrinsic::GetBufferSize { dest, .. }
            | Intrinsic::ImageLoad { dest, .. }
            | Intrinsic::ImageAtomic { dest, .. }
            | Intrinsic::ImageSize { dest, .. }
            | Intrinsic::LoadShared { dest, .. }
            | Intrinsic::SharedAtomic { dest, .. }
            | Intrinsic::LoadGlobal { dest, .. }
            | Intrinsic::GlobalAtomic { dest, .. }
            | Intrinsic::LoadKernelInput { dest, .. }
            | Intrinsic::LoadSystemValue { dest, .. }
            | Intrinsic::Vote { dest, .. } => Some(dest),
            Intrinsic::StoreDeref { .. }
            | Intrinsic::StoreSsbo { .. }
            | Intrinsic::ImageStore { .. }
            | Intrinsic::StoreShared { .. }
            | Intrinsic::StoreGlobal { .. }
            | Intrinsic::Discard
            | Intrinsic::DiscardIf { .. }
            | Intrinsic::EmitVertex { .. }
            | Intrinsic::EndPrimitive { .. }
            | Intrinsic::ControlBarrier
            | Intrinsic::MemoryBarrier(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Intrinsic::LoadDeref { .. } => "load_deref",
            Intrinsic::StoreDeref { .. } => "store_deref",
            Intrinsic::LoadUbo { .. } => "load_ubo",
            Intrinsic::LoadSsbo { .. } => "load_ssbo",
            Intrinsic::StoreSsbo { .. } => "store_ssbo",
            Intrinsic::SsboAtomic { .. } => "ssbo_atomic",
            Intrinsic::GetBufferSize { .. } => "get_buffer_size",
            Intrinsic::ImageLoad { .. } => "image_load",
            Intrinsic::ImageStore { .. } => "image_store",
            Intrinsic::ImageAtomic { .. } => "image_atomic",
            Intrinsic::ImageSize { .. } => "image_size",
            Intrinsic::LoadShared { .. } => "load_shared",
            Intrinsic::StoreShared { .. } => "store_shared",
            Intrinsic::SharedAtomic { .. } => "shared_atomic",
            Intrinsic::LoadGlobal { .. } => "load_global",
            Intrinsic::StoreGlobal { .. } => "store_global",
            Intrinsic::GlobalAtomic { .. } => "global_atomic",
            Intrinsic::LoadKernelInput { .. } => "load_kernel_input",
            Intrinsic::LoadSystemValue { .. } => "load_system_value",
            Intrinsic::Discard => "discard",
            Intrinsic::DiscardIf { .. } => "discard_if",
            Intrinsic::EmitVertex { .. } => "emit_vertex",
            Intrinsic::EndPrimitive { .. } => "end_primitive",
            Intrinsic::ControlBarrier => "control_barrier",
            Intrinsic::MemoryBarrier(_) => "memory_barrier",
            Intrinsic::Vote { .. } => "vote",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TexOp {
    /// Implicit-lod sample.
    Tex,
    /// Sample with lod bias.
    Txb,
    /// Sample with explicit lod.
    Txl,
    /// Sample with explicit derivatives.
    Txd,
    /// Texel fetch.
    Txf,
    /// Multisample texel fetch.
    TxfMs,
    /// Size query at an explicit level.
    Txs,
    /// Lod query.
    Lod,
    /// Gather.
    Tg4,
    QueryLevels,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TexSrc {
    Coord(Src),
    Projector(Src),
    Comparator(Src),
    Bias(Src),
    Lod(Src),
    Ddx(Src),
    Ddy(Src),
    Offset(Src),
    MsIndex(Src),
    TextureDeref(VarId),
    SamplerDeref(VarId),
    SamplerHandle(Src),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TexInstr {
    pub op: TexOp,
    pub dest: Dest,
    pub sampler_dim: SamplerDim,
    pub is_array: bool,
    pub is_shadow: bool,
    pub coord_components: u8,
    /// Gathered channel for `Tg4`.
    pub component: u8,
    pub texture_index: u32,
    pub sampler_index: u32,
    pub srcs: Vec<TexSrc>,
}

impl TexInstr {
    pub fn new(op: TexOp, dest: impl Into<Dest>, sampler_dim: SamplerDim) -> Self {
        Self {
            op,
            dest: dest.into(),
            sampler_dim,
            is_array: false,
            is_shadow: false,
            coord_components: 0,
            component: 0,
            texture_index: 0,
            sampler_index: 0,
            srcs: Vec::new(),
        }
    }
}
