use cranelift_entity::PrimaryMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::instructions::Instruction;
use crate::types::BitSize;
use crate::values::{RegId, Src, VarId};
use crate::variable::{ShaderStage, Variable, VariableMode};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterDecl {
    pub num_components: u8,
    pub bit_size: BitSize,
    /// Zero for a plain register, otherwise the length of the register array.
    pub num_array_elems: u32,
    pub name: Option<String>,
}

impl RegisterDecl {
    pub fn new(num_components: u8, bit_size: BitSize) -> Self {
        Self {
            num_components,
            bit_size,
            num_array_elems: 0,
            name: None,
        }
    }

    pub fn array(num_components: u8, bit_size: BitSize, num_array_elems: u32) -> Self {
        Self {
            num_array_elems,
            ..Self::new(num_components, bit_size)
        }
    }

    pub fn is_array(&self) -> bool {
        self.num_array_elems > 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IfNode {
    pub condition: Src,
    pub then_list: Vec<CfNode>,
    pub else_list: Vec<CfNode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopNode {
    pub body: Vec<CfNode>,
}

/// Structured control-flow node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CfNode {
    Block(Block),
    If(IfNode),
    Loop(LoopNode),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub registers: PrimaryMap<RegId, RegisterDecl>,
    /// Number of SSA indices in use; every def id is below this.
    pub ssa_alloc: u32,
    pub body: Vec<CfNode>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registers: PrimaryMap::new(),
            ssa_alloc: 0,
            body: Vec::new(),
        }
    }

    /// Visits every instruction in program order, descending into if and loop bodies.
    pub fn for_each_instruction<'a>(&'a self, mut f: impl FnMut(&'a Instruction)) {
        fn walk<'a>(list: &'a [CfNode], f: &mut impl FnMut(&'a Instruction)) {
            for node in list {
                match node {
                    CfNode::Block(block) => block.instructions.iter().for_each(&mut *f),
                    CfNode::If(node) => {
                        walk(&node.then_list, f);
                        walk(&node.else_list, f);
                    }
                    CfNode::Loop(node) => walk(&node.body, f),
                }
            }
        }
        walk(&self.body, &mut f);
    }

    pub fn instruction_count(&self) -> usize {
        let mut count = 0;
        self.for_each_instruction(|_| count += 1);
        count
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shader {
    pub name: String,
    pub stage: ShaderStage,
    pub variables: PrimaryMap<VarId, Variable>,
    pub functions: IndexMap<String, Function>,
}

impl Shader {
    pub fn new(name: impl Into<String>, stage: ShaderStage) -> Self {
        Self {
            name: name.into(),
            stage,
            variables: PrimaryMap::new(),
            functions: IndexMap::new(),
        }
    }

    pub fn add_variable(&mut self, variable: Variable) -> VarId {
        self.variables.push(variable)
    }

    pub fn add_function(&mut self, function: Function) {
        self.functions.insert(function.name.clone(), function);
    }

    /// The first function added is the entry point.
    pub fn entry_point(&self) -> Option<&Function> {
        self.functions.values().next()
    }

    pub fn get_function(&self, name: &str) -> Option<&Function> {
        self.functions.get(name)
    }

    pub fn variables_with_mode(
        &self,
        mode: VariableMode,
    ) -> impl Iterator<Item = (VarId, &Variable)> + '_ {
        self.variables
            .iter()
            .filter(move |(_, variable)| variable.mode == mode)
    }
}
