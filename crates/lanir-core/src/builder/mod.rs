/*! Fluent API for constructing shader IR programmatically.
 *
 * The builders number SSA values densely, group straight-line instructions into blocks and
 * nest if/loop bodies through closures, so the result is ready for lowering as built.
 */

pub mod function_builder;

pub use function_builder::FunctionBuilder;

use crate::{
    function::{Function, Shader},
    values::VarId,
    variable::{ShaderStage, Variable},
    IrError, Result,
};

pub struct ShaderBuilder {
    shader: Shader,
}

impl ShaderBuilder {
    pub fn new(name: impl Into<String>, stage: ShaderStage) -> Self {
        Self {
            shader: Shader::new(name, stage),
        }
    }

    pub fn variable(&mut self, variable: Variable) -> VarId {
        self.shader.add_variable(variable)
    }

    pub fn function(&self, name: &str) -> FunctionBuilder {
        FunctionBuilder::new(name)
    }

    pub fn add_function(&mut self, builder: FunctionBuilder) -> Result<&mut Self> {
        let function = builder.build()?;
        self.insert(function)
    }

    pub fn insert(&mut self, function: Function) -> Result<&mut Self> {
        if self.shader.functions.contains_key(&function.name) {
            return Err(IrError::BuilderError(format!(
                "function '{}' already defined",
                function.name
            )));
        }
        self.shader.add_function(function);
        Ok(self)
    }

    pub fn build(self) -> Result<Shader> {
        if self.shader.functions.is_empty() {
            return Err(IrError::BuilderError(format!(
                "shader '{}' has no functions",
                self.shader.name
            )));
        }
        Ok(self.shader)
    }
}
