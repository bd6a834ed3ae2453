/*! Lowering of SSA shader IR onto vector-machine backends.
 *
 * One import for the IR model and builders, the lowering engine with its [`Backend`] trait, and
 * the bundled trace and evaluation backends.
 */

pub use lanir_core as core;
pub use lanir_emit as emit;
pub use lanir_lower as lower;

pub use lanir_core::{
    ir_persist::{load_shader, save_shader},
    AluOp, BitSize, DerefChain, Function, FunctionBuilder, GlslType, Instruction, Intrinsic,
    IrError, RegisterDecl, ScalarType, Shader, ShaderBuilder, ShaderStage, Variable,
    VariableMode,
};

pub use lanir_lower::{Backend, LowerConfig, LowerError, Lowerer};

pub use lanir_emit::{trace_shader, EvalBackend, TraceBackend, TraceConfig};

/// Lowers the entry point of `shader` with the configuration read from the environment.
pub fn lower<B: Backend>(shader: &Shader, backend: B) -> Result<B, LowerError> {
    let mut lowerer = Lowerer::with_config(backend, LowerConfig::from_env());
    lowerer.lower_shader(shader)?;
    Ok(lowerer.into_backend())
}
