/*! Uniformity and constant facts about SSA values.
 *
 * A value is uniform when every active lane of the lane group sees the same bits. The pass is a
 * single forward walk: SSA definitions dominate their uses in structured control flow, so each
 * operand is classified before it is consumed. Register reads are never uniform.
 */

use cranelift_entity::{EntitySet, SecondaryMap};
use lanir_core::{
    DerefInstr, Dest, Function, Instruction, Intrinsic, SsaDef, SsaId, Src, VariableMode,
};

#[derive(Debug)]
pub struct Analysis {
    uniform: EntitySet<SsaId>,
    constants: SecondaryMap<SsaId, Option<u64>>,
}

impl Analysis {
    pub fn compute(function: &Function) -> Self {
        Self::compute_with(function, |_| None)
    }

    /// Same as [`Analysis::compute`], with a lookup for the storage class of deref targets.
    pub fn compute_with(
        function: &Function,
        deref_mode: impl Fn(&DerefInstr) -> Option<VariableMode>,
    ) -> Self {
        let mut analysis = Self {
            uniform: EntitySet::new(),
            constants: SecondaryMap::new(),
        };
        function.for_each_instruction(|instruction| analysis.visit(instruction, &deref_mode));
        analysis
    }

    pub fn is_uniform(&self, id: SsaId) -> bool {
        self.uniform.contains(id)
    }

    /// First component of a constant load.
    pub fn constant(&self, id: SsaId) -> Option<u64> {
        self.constants[id]
    }

    fn src_uniform(&self, src: &Src) -> bool {
        match src {
            Src::Ssa(def) => self.uniform.contains(def.id),
            Src::Reg(_) => false,
        }
    }

    fn mark(&mut self, def: &SsaDef) {
        self.uniform.insert(def.id);
    }

    fn mark_dest(&mut self, dest: &Dest) {
        if let Dest::Ssa(def) = dest {
            self.uniform.insert(def.id);
        }
    }

    fn visit(
        &mut self,
        instruction: &Instruction,
        deref_mode: &impl Fn(&DerefInstr) -> Option<VariableMode>,
    ) {
        match instruction {
            Instruction::LoadConst(load) => {
                self.mark(&load.def);
                self.constants[load.def.id] = load.values.first().copied();
            }
            Instruction::Alu(alu) => {
                if alu.srcs.iter().all(|src| self.src_uniform(&src.src)) {
                    self.mark_dest(&alu.dest.dest);
                }
            }
            Instruction::Intrinsic(intrinsic) => match intrinsic {
                Intrinsic::LoadUbo {
                    dest,
                    index,
                    offset,
                } if self.src_uniform(index) && self.src_uniform(offset) => self.mark_dest(dest),
                Intrinsic::LoadKernelInput { dest, offset } if self.src_uniform(offset) => {
                    self.mark_dest(dest)
                }
                Intrinsic::LoadSystemValue { dest, value } if value.is_group_uniform() => {
                    self.mark_dest(dest)
                }
                _ => {}
            },
            Instruction::Deref(deref) => {
                if matches!(
                    deref_mode(deref),
                    Some(VariableMode::Shared | VariableMode::Global)
                ) {
                    self.mark(&deref.def);
                }
            }
            Instruction::Tex(_)
            | Instruction::Jump(_)
            | Instruction::SsaUndef(_)
            | Instruction::Phi(_) => {}
        }
    }
}
