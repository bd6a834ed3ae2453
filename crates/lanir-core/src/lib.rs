/*! Core SSA shader IR for lanir.
 *
 * Shaders arrive here already optimized and out of SSA form for anything that needed phis:
 * structured control flow, dense SSA numbering, registers for loop-carried state. This crate
 * holds that representation, the ALU opcode metadata table and the builders used to produce it.
 */

pub mod builder;
pub mod function;
pub mod instructions;
pub mod ir_persist;
pub mod opcodes;
pub mod types;
pub mod values;
pub mod variable;

pub use builder::{FunctionBuilder, ShaderBuilder};
pub use function::{Block, CfNode, Function, IfNode, LoopNode, RegisterDecl, Shader};
pub use instructions::{
    AluInstr, AtomicOp, DerefChain, DerefInstr, DerefStep, Instruction, Intrinsic, JumpKind,
    LoadConst, MemoryBarrierKind, PhiInstr, SystemValue, TexInstr, TexOp, TexSrc, VoteOp,
};
pub use opcodes::{AluOp, AluType, OpInfo};
pub use types::{BaseKind, BitSize, GlslType, SamplerDim, ScalarType, StructField};
pub use values::{
    AluDest, AluSrc, Dest, RegId, RegRef, SsaDef, SsaId, Src, VarId, MAX_COMPONENTS,
};
pub use variable::{ShaderStage, Variable, VariableMode};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IrError {
    #[error("Type error: {0}")]
    TypeError(String),
    #[error("Invalid instruction: {0}")]
    InvalidInstruction(String),
    #[error("Builder error: {0}")]
    BuilderError(String),
    #[error("Function not found: {0}")]
    FunctionNotFound(String),
}

pub type Result<T> = std::result::Result<T, IrError>;

#[cfg(test)]
mod tests;
