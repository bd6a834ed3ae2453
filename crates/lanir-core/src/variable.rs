use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::GlslType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShaderStage {
    Vertex,
    TessCtrl,
    TessEval,
    Geometry,
    Fragment,
    Compute,
    Kernel,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::TessCtrl => "tess_ctrl",
            ShaderStage::TessEval => "tess_eval",
            ShaderStage::Geometry => "geometry",
            ShaderStage::Fragment => "fragment",
            ShaderStage::Compute => "compute",
            ShaderStage::Kernel => "kernel",
        };
        f.write_str(name)
    }
}

/// Storage class of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableMode {
    ShaderIn,
    ShaderOut,
    Uniform,
    Ubo,
    Ssbo,
    Shared,
    Global,
    FunctionTemp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub mode: VariableMode,
    pub ty: GlslType,
    pub location: u32,
    pub binding: u32,
    /// Per-patch tessellation varying.
    pub patch: bool,
    /// Scalar array packed into vec4 slots (clip/cull distances).
    pub compact: bool,
}

impl Variable {
    pub fn new(name: impl Into<String>, mode: VariableMode, ty: GlslType) -> Self {
        Self {
            name: name.into(),
            mode,
            ty,
            location: 0,
            binding: 0,
            patch: false,
            compact: false,
        }
    }

    pub fn with_location(mut self, location: u32) -> Self {
        self.location = location;
        self
    }

    pub fn with_binding(mut self, binding: u32) -> Self {
        self.binding = binding;
        self
    }

    pub fn patch(mut self) -> Self {
        self.patch = true;
        self
    }

    pub fn compact(mut self) -> Self {
        self.compact = true;
        self
    }
}
