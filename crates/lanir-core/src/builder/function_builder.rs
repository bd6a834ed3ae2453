use crate::{
    function::{Block, CfNode, Function, IfNode, LoopNode, RegisterDecl},
    instructions::{DerefChain, Instruction, Intrinsic, JumpKind, LoadConst, TexInstr},
    opcodes::AluOp,
    types::BitSize,
    values::{AluDest, AluSrc, Dest, RegId, SsaDef, SsaId, Src},
    AluInstr, IrError, Result,
};

/// Builds one function body with structured control flow.
///
/// SSA ids are handed out densely in creation order, so a finished function is
/// already in the compacted form the lowering engine expects.
pub struct FunctionBuilder {
    function: Function,
    scopes: Vec<Vec<CfNode>>,
}

impl FunctionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            function: Function::new(name),
            scopes: vec![Vec::new()],
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    pub fn register(&mut self, decl: RegisterDecl) -> RegId {
        self.function.registers.push(decl)
    }

    pub fn new_ssa(&mut self, num_components: u8, bit_size: BitSize) -> SsaDef {
        let id = SsaId::from_u32(self.function.ssa_alloc);
        self.function.ssa_alloc += 1;
        SsaDef::new(id, num_components, bit_size)
    }

    pub fn push(&mut self, instruction: Instruction) -> &mut Self {
        if let Some(scope) = self.scopes.last_mut() {
            match scope.last_mut() {
                Some(CfNode::Block(block)) => block.instructions.push(instruction),
                _ => scope.push(CfNode::Block(Block {
                    instructions: vec![instruction],
                })),
            }
        }
        self
    }

    pub fn load_const(&mut self, bit_size: BitSize, values: &[u64]) -> SsaDef {
        let def = self.new_ssa(values.len() as u8, bit_size);
        let values = values.iter().map(|v| v & bit_size.mask()).collect();
        self.push(Instruction::LoadConst(LoadConst { def, values }));
        def
    }

    pub fn imm_u32(&mut self, value: u32) -> SsaDef {
        self.load_const(BitSize::B32, &[value as u64])
    }

    pub fn imm_i32(&mut self, value: i32) -> SsaDef {
        self.load_const(BitSize::B32, &[value as u32 as u64])
    }

    pub fn imm_u64(&mut self, value: u64) -> SsaDef {
        self.load_const(BitSize::B64, &[value])
    }

    pub fn imm_f32(&mut self, value: f32) -> SsaDef {
        self.load_const(BitSize::B32, &[value.to_bits() as u64])
    }

    pub fn undef(&mut self, num_components: u8, bit_size: BitSize) -> SsaDef {
        let def = self.new_ssa(num_components, bit_size);
        self.push(Instruction::SsaUndef(def));
        def
    }

    fn src_shape(&self, src: &Src) -> Result<(u8, BitSize)> {
        match src {
            Src::Ssa(def) => Ok((def.num_components, def.bit_size)),
            Src::Reg(reg) => self
                .function
                .registers
                .get(reg.reg)
                .map(|decl| (decl.num_components, decl.bit_size))
                .ok_or_else(|| IrError::BuilderError(format!("unknown register {}", reg.reg))),
        }
    }

    /// Emits an ALU op into a fresh SSA value whose shape follows the opcode table:
    /// vector constructors produce their width, everything else the first operand's
    /// component count; sized outputs fix the width, unsized ones follow the data operand.
    pub fn alu(&mut self, op: AluOp, srcs: &[AluSrc]) -> Result<SsaDef> {
        let info = op.info();
        if srcs.len() != info.num_inputs() {
            return Err(IrError::InvalidInstruction(format!(
                "{} takes {} operands, got {}",
                op,
                info.num_inputs(),
                srcs.len()
            )));
        }
        let (first_components, first_bits) = self.src_shape(&srcs[0].src)?;
        let data_bits = if op == AluOp::B32csel {
            self.src_shape(&srcs[1].src)?.1
        } else {
            first_bits
        };
        let num_components = op.vec_width().unwrap_or(first_components);
        let bit_size = info.output_type.resolve_bits(data_bits);
        self.alu_sized(op, srcs, num_components, bit_size)
    }

    pub fn alu_sized(
        &mut self,
        op: AluOp,
        srcs: &[AluSrc],
        num_components: u8,
        bit_size: BitSize,
    ) -> Result<SsaDef> {
        let def = self.new_ssa(num_components, bit_size);
        self.alu_into(op, AluDest::new(def), srcs.to_vec());
        Ok(def)
    }

    /// Emits an ALU op with an explicit destination, e.g. a register write.
    pub fn alu_into(&mut self, op: AluOp, dest: AluDest, srcs: Vec<AluSrc>) -> &mut Self {
        self.push(Instruction::Alu(AluInstr { op, dest, srcs }))
    }

    pub fn mov_to_reg(&mut self, reg: RegId, value: impl Into<AluSrc>) -> &mut Self {
        self.alu_into(AluOp::Mov, AluDest::new(Dest::reg(reg)), vec![value.into()])
    }

    pub fn intrinsic(&mut self, intrinsic: Intrinsic) -> &mut Self {
        self.push(Instruction::Intrinsic(intrinsic))
    }

    pub fn load_deref(
        &mut self,
        deref: DerefChain,
        num_components: u8,
        bit_size: BitSize,
    ) -> SsaDef {
        let def = self.new_ssa(num_components, bit_size);
        self.intrinsic(Intrinsic::LoadDeref {
            dest: Dest::Ssa(def),
            deref,
        });
        def
    }

    pub fn store_deref(
        &mut self,
        deref: DerefChain,
        value: impl Into<Src>,
        write_mask: u16,
    ) -> &mut Self {
        self.intrinsic(Intrinsic::StoreDeref {
            deref,
            value: value.into(),
            write_mask,
        })
    }

    pub fn tex(&mut self, instr: TexInstr) -> &mut Self {
        self.push(Instruction::Tex(instr))
    }

    pub fn jump(&mut self, kind: JumpKind) -> &mut Self {
        self.push(Instruction::Jump(kind))
    }

    fn scoped(&mut self, body: impl FnOnce(&mut Self)) -> Vec<CfNode> {
        self.scopes.push(Vec::new());
        body(self);
        self.scopes.pop().unwrap_or_default()
    }

    fn push_node(&mut self, node: CfNode) -> &mut Self {
        if let Some(scope) = self.scopes.last_mut() {
            scope.push(node);
        }
        self
    }

    pub fn if_else(
        &mut self,
        condition: impl Into<Src>,
        then_body: impl FnOnce(&mut Self),
        else_body: impl FnOnce(&mut Self),
    ) -> &mut Self {
        let then_list = self.scoped(then_body);
        let else_list = self.scoped(else_body);
        self.push_node(CfNode::If(IfNode {
            condition: condition.into(),
            then_list,
            else_list,
        }))
    }

    pub fn if_then(
        &mut self,
        condition: impl Into<Src>,
        then_body: impl FnOnce(&mut Self),
    ) -> &mut Self {
        self.if_else(condition, then_body, |_| {})
    }

    pub fn build_loop(&mut self, body: impl FnOnce(&mut Self)) -> &mut Self {
        let body = self.scoped(body);
        self.push_node(CfNode::Loop(LoopNode { body }))
    }

    pub fn build(mut self) -> Result<Function> {
        if self.scopes.len() != 1 {
            return Err(IrError::BuilderError(format!(
                "function '{}' has {} unclosed scopes",
                self.function.name,
                self.scopes.len() - 1
            )));
        }
        self.function.body = self.scopes.pop().unwrap_or_default();
        Ok(self.function)
    }
}
