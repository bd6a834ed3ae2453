use lanir_core::{Dest, Function, Instruction, Shader, VariableMode};

use crate::backend::Backend;
use crate::config::LowerConfig;
use crate::context::LowerContext;
use crate::error::{LowerError, Result};

/// Drives lowering of whole shaders into one backend.
pub struct Lowerer<B: Backend> {
    backend: B,
    config: LowerConfig,
}

impl<B: Backend> Lowerer<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, LowerConfig::default())
    }

    pub fn with_config(backend: B, config: LowerConfig) -> Self {
        Self { backend, config }
    }

    pub fn config(&self) -> &LowerConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn into_backend(self) -> B {
        self.backend
    }

    /// Lowers the shader's entry point.
    pub fn lower_shader(&mut self, shader: &Shader) -> Result<()> {
        let function = shader
            .entry_point()
            .ok_or_else(|| LowerError::FunctionNotFound(format!("{} entry point", shader.name)))?;
        self.lower(shader, function)
    }

    pub fn lower_function(&mut self, shader: &Shader, name: &str) -> Result<()> {
        let function = shader
            .get_function(name)
            .ok_or_else(|| LowerError::FunctionNotFound(name.to_string()))?;
        self.lower(shader, function)
    }

    fn lower(&mut self, shader: &Shader, function: &Function) -> Result<()> {
        let span = tracing::debug_span!(
            "lower",
            function = %function.name,
            stage = %shader.stage,
            ssa_alloc = function.ssa_alloc
        );
        let _enter = span.enter();

        if self.config.check_normalized {
            check_normalized(function)?;
        }

        for (id, var) in shader.variables.iter() {
            if var.mode == VariableMode::ShaderOut {
                tracing::debug!(output = %var.name, location = var.location, "declaring output");
                self.backend.declare_output(id, var);
            }
        }

        let walked = {
            let mut context =
                LowerContext::new(&mut self.backend, shader, function, &self.config);
            context.visit_cf_list(&function.body)
        };
        if let Err(err) = &walked {
            tracing::debug!(%err, "lowering stopped");
        }
        walked
    }
}

/// Rejects phis and definitions outside the function's SSA index range.
fn check_normalized(function: &Function) -> Result<()> {
    let mut result = Ok(());
    function.for_each_instruction(|instruction| {
        if result.is_err() {
            return;
        }
        let def = match instruction {
            Instruction::Phi(phi) => {
                result = Err(LowerError::PhiNotLowered(phi.def.id));
                return;
            }
            Instruction::Alu(alu) => alu.dest.dest.ssa_def(),
            Instruction::LoadConst(load) => Some(&load.def),
            Instruction::SsaUndef(def) => Some(def),
            Instruction::Deref(deref) => Some(&deref.def),
            Instruction::Intrinsic(intrinsic) => intrinsic.dest().and_then(Dest::ssa_def),
            Instruction::Tex(tex) => tex.dest.ssa_def(),
            Instruction::Jump(_) => None,
        };
        if let Some(def) = def {
            if def.id.as_u32() >= function.ssa_alloc {
                result = Err(LowerError::SsaOutOfRange {
                    id: def.id,
                    alloc: function.ssa_alloc,
                });
            }
        }
    });
    result
}
