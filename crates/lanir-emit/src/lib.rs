/*! Concrete backends for the lowering engine.
 *
 * [`TraceBackend`] turns every backend call into a line of a readable listing, and
 * [`EvalBackend`] executes the calls lane by lane so lowered shaders can be checked against
 * expected results.
 */

pub mod config;
pub mod eval;
pub mod trace;

pub use config::{IndentStyle, TraceConfig};
pub use eval::{EvalBackend, Lanes, MemorySpace, SampleRecord, DEFAULT_LANES};
pub use trace::{EmitResult, EventKind, TraceBackend, TraceEvent, TraceValue};

use lanir_core::Shader;
use lanir_lower::Lowerer;

/// Lowers the entry point of `shader` and renders the resulting call trace.
pub fn trace_shader(shader: &Shader, config: TraceConfig) -> anyhow::Result<String> {
    let mut lowerer = Lowerer::new(TraceBackend::with_config(config));
    lowerer.lower_shader(shader)?;
    lowerer.backend().render()
}
