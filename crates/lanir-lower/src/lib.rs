/*! Lowering of lanir shader IR onto a vector-machine backend.
 *
 * Every SSA value becomes one backend value per component, every register a backend storage
 * slot. Instructions are visited in program order over the structured control-flow tree and
 * translated into calls on the [`Backend`] trait, which is where actual code generation happens.
 */

mod alu;
pub mod analysis;
pub mod backend;
mod coerce;
pub mod config;
mod context;
mod control_flow;
mod deref;
mod driver;
pub mod error;
mod memory;
mod texture;
pub mod value_table;

pub use analysis::Analysis;
pub use backend::{
    AtomicKind, Backend, BinaryOp, CompareFunc, ConvertOp, Derivatives, ImageOp, ImageParams,
    LodControl, LodProperty, RmwOp, SampleKey, SampleOp, SampleParams, SizeQueryParams,
    TextureTarget, UnaryOp, VarAccess, VertexIndex,
};
pub use config::{LowerConfig, PERF_ENV};
pub use driver::Lowerer;
pub use error::{LowerError, Result};
pub use value_table::ValueTable;

#[cfg(test)]
mod tests;
