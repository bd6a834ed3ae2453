/*! Structured control-flow walk and per-instruction dispatch. */

use lanir_core::{
    BaseKind, BitSize, Block, CfNode, IfNode, Instruction, JumpKind, LoopNode, ScalarType,
};

use crate::backend::Backend;
use crate::context::LowerContext;
use crate::error::{LowerError, Result};

impl<'a, B: Backend> LowerContext<'a, B> {
    pub(crate) fn visit_cf_list(&mut self, list: &[CfNode]) -> Result<()> {
        for node in list {
            match node {
                CfNode::Block(block) => self.visit_block(block)?,
                CfNode::If(node) => self.visit_if(node)?,
                CfNode::Loop(node) => self.visit_loop(node)?,
            }
        }
        Ok(())
    }

    fn visit_if(&mut self, node: &IfNode) -> Result<()> {
        let (_, bits) = self.src_shape(&node.condition)?;
        let condition = self.read_scalar(&node.condition)?;
        let condition = self.reinterpret(condition, BaseKind::Int, bits)?;
        let condition = self.resize_int(condition, bits, BitSize::B32, true);

        self.backend.begin_if(condition);
        self.visit_cf_list(&node.then_list)?;
        if !node.else_list.is_empty() {
            self.backend.begin_else();
            self.visit_cf_list(&node.else_list)?;
        }
        self.backend.end_if();
        Ok(())
    }

    fn visit_loop(&mut self, node: &LoopNode) -> Result<()> {
        self.backend.begin_loop();
        self.visit_cf_list(&node.body)?;
        self.backend.end_loop();
        Ok(())
    }

    fn visit_block(&mut self, block: &Block) -> Result<()> {
        let mut jumped = false;
        for instruction in &block.instructions {
            if jumped {
                tracing::warn!(
                    kind = instruction.kind_name(),
                    "instruction after a jump in the same block"
                );
            }
            self.visit_instruction(instruction)?;
            jumped |= instruction.is_jump();
        }
        Ok(())
    }

    fn visit_instruction(&mut self, instruction: &Instruction) -> Result<()> {
        match instruction {
            Instruction::Alu(alu) => self.visit_alu(alu),
            Instruction::LoadConst(load) => {
                let ty = ScalarType::uint(load.def.bit_size);
                if load.values.len() != load.def.num_components as usize {
                    return Err(LowerError::Malformed(format!(
                        "constant {} has {} values for {} components",
                        load.def.id,
                        load.values.len(),
                        load.def.num_components
                    )));
                }
                let values = load
                    .values
                    .iter()
                    .map(|&bits| self.const_int(ty, bits))
                    .collect();
                self.table.write_ssa(load.def.id, values)
            }
            Instruction::SsaUndef(def) => {
                let ty = ScalarType::uint(def.bit_size);
                let values = (0..def.num_components)
                    .map(|_| self.backend.undef(ty))
                    .collect();
                self.table.write_ssa(def.id, values)
            }
            Instruction::Intrinsic(intrinsic) => self.visit_intrinsic(intrinsic),
            Instruction::Tex(tex) => self.visit_tex(tex),
            Instruction::Deref(deref) => self.visit_deref(deref),
            Instruction::Jump(JumpKind::Break) => {
                self.backend.emit_break();
                Ok(())
            }
            Instruction::Jump(JumpKind::Continue) => {
                self.backend.emit_continue();
                Ok(())
            }
            Instruction::Phi(phi) => Err(LowerError::PhiNotLowered(phi.def.id)),
        }
    }
}
