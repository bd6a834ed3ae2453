use lanir_core::{BitSize, Dest, Function, RegRef, Shader, Src, VarId, Variable};

use crate::analysis::Analysis;
use crate::backend::Backend;
use crate::config::LowerConfig;
use crate::error::{LowerError, Result};
use crate::value_table::ValueTable;

/// State for lowering one function. The per-instruction visitors live in the
/// `alu`, `memory`, `texture` and `control_flow` modules as further impl blocks.
///
/// Registers are allocated on construction and released when the context is dropped,
/// including while unwinding out of a backend call.
pub(crate) struct LowerContext<'a, B: Backend> {
    pub(crate) backend: &'a mut B,
    pub(crate) shader: &'a Shader,
    pub(crate) config: &'a LowerConfig,
    pub(crate) table: ValueTable<B::Value, B::Register>,
    pub(crate) analysis: Analysis,
}

impl<'a, B: Backend> LowerContext<'a, B> {
    /// Allocates the SSA table and every register of `function`.
    pub(crate) fn new(
        backend: &'a mut B,
        shader: &'a Shader,
        function: &'a Function,
        config: &'a LowerConfig,
    ) -> Self {
        let mut table = ValueTable::new(function.ssa_alloc);
        table.allocate_registers(backend, &function.registers);
        tracing::debug!(
            registers = table.register_count(),
            ssa_alloc = function.ssa_alloc,
            "allocated function storage"
        );
        Self {
            backend,
            shader,
            config,
            table,
            analysis: Analysis::compute_with(function, |deref| {
                shader.variables.get(deref.var).map(|var| var.mode)
            }),
        }
    }

    pub(crate) fn variable(&self, id: VarId) -> Result<&'a Variable> {
        self.shader
            .variables
            .get(id)
            .ok_or(LowerError::UnknownVariable(id))
    }

    pub(crate) fn src_shape(&self, src: &Src) -> Result<(u8, BitSize)> {
        match src {
            Src::Ssa(def) => Ok((def.num_components, def.bit_size)),
            Src::Reg(reg) => {
                let decl = self.table.register_decl(reg.reg)?;
                Ok((decl.num_components, decl.bit_size))
            }
        }
    }

    pub(crate) fn dest_shape(&self, dest: &Dest) -> Result<(u8, BitSize)> {
        match dest {
            Dest::Ssa(def) => Ok((def.num_components, def.bit_size)),
            Dest::Reg(reg) => {
                let decl = self.table.register_decl(reg.reg)?;
                Ok((decl.num_components, decl.bit_size))
            }
        }
    }

    fn register_index(&mut self, reg: &RegRef) -> Result<Option<B::Value>> {
        match &reg.indirect {
            Some(index) => Ok(Some(self.read_scalar(index)?)),
            None => Ok(None),
        }
    }

    /// Reads every component of an operand.
    pub(crate) fn read_src(&mut self, src: &Src) -> Result<Vec<B::Value>> {
        match src {
            Src::Ssa(def) => {
                let values = self.table.read_ssa(def.id)?;
                if values.len() != def.num_components as usize {
                    return Err(LowerError::Malformed(format!(
                        "{} has {} components, operand expects {}",
                        def.id,
                        values.len(),
                        def.num_components
                    )));
                }
                Ok(values)
            }
            Src::Reg(reg) => {
                let indirect = self.register_index(reg)?;
                self.table.read_register(self.backend, reg.reg, indirect)
            }
        }
    }

    /// First component of an operand.
    pub(crate) fn read_scalar(&mut self, src: &Src) -> Result<B::Value> {
        self.read_src(src)?
            .into_iter()
            .next()
            .ok_or_else(|| LowerError::Malformed("operand without components".into()))
    }

    /// Binds the result of an instruction: SSA dests take the values as they are,
    /// register dests are written through the backend under `write_mask`.
    pub(crate) fn assign_dest(
        &mut self,
        dest: &Dest,
        write_mask: u16,
        values: Vec<B::Value>,
    ) -> Result<()> {
        match dest {
            Dest::Ssa(def) => {
                if values.len() != def.num_components as usize {
                    return Err(LowerError::Malformed(format!(
                        "{} declares {} components, lowering produced {}",
                        def.id,
                        def.num_components,
                        values.len()
                    )));
                }
                self.table.write_ssa(def.id, values)
            }
            Dest::Reg(reg) => {
                let indirect = self.register_index(reg)?;
                self.table
                    .write_register(self.backend, reg.reg, indirect, write_mask, &values)
            }
        }
    }

    /// Constant value of an SSA operand, if it was produced by a constant load.
    pub(crate) fn constant_of(&self, src: &Src) -> Option<u64> {
        src.as_ssa().and_then(|id| self.analysis.constant(id))
    }

    pub(crate) fn is_uniform(&self, src: &Src) -> bool {
        src.as_ssa()
            .map(|id| self.analysis.is_uniform(id))
            .unwrap_or(false)
    }
}

impl<B: Backend> Drop for LowerContext<'_, B> {
    fn drop(&mut self) {
        let released = self.table.register_count();
        self.table.release_registers(&mut *self.backend);
        tracing::debug!(released, "released function registers");
    }
}
