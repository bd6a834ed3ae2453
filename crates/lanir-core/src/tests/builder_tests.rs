use crate::builder::{FunctionBuilder, ShaderBuilder};
use crate::function::{CfNode, RegisterDecl};
use crate::instructions::{Instruction, JumpKind};
use crate::opcodes::AluOp;
use crate::types::BitSize;
use crate::values::{AluSrc, Src};
use crate::variable::ShaderStage;
use pretty_assertions::assert_eq;

#[test]
fn test_ssa_numbering_is_dense() {
    let mut func = FunctionBuilder::new("main");
    let a = func.imm_u32(1);
    let b = func.imm_u32(2);
    let sum = func.alu(AluOp::Iadd, &[a.into(), b.into()]).unwrap();
    let function = func.build().unwrap();

    assert_eq!(a.id.as_u32(), 0);
    assert_eq!(b.id.as_u32(), 1);
    assert_eq!(sum.id.as_u32(), 2);
    assert_eq!(function.ssa_alloc, 3);
    assert_eq!(function.body.len(), 1);
    assert_eq!(function.instruction_count(), 3);
}

#[test]
fn test_alu_shape_inference() {
    let mut func = FunctionBuilder::new("main");
    let v = func.load_const(BitSize::B64, &[1, 2, 3]);
    let neg = func.alu(AluOp::Ineg, &[v.into()]).unwrap();
    assert_eq!((neg.num_components, neg.bit_size), (3, BitSize::B64));

    let cmp = func.alu(AluOp::Ilt32, &[v.into(), v.into()]).unwrap();
    assert_eq!((cmp.num_components, cmp.bit_size), (3, BitSize::B32));

    let x = func.imm_f32(1.0);
    let y = func.imm_f32(2.0);
    let pair = func.alu(AluOp::Vec2, &[x.into(), y.into()]).unwrap();
    assert_eq!(pair.num_components, 2);

    let lo = func
        .alu(AluOp::Unpack64_2x32SplitX, &[AluSrc::swizzled(v, &[2])])
        .unwrap();
    assert_eq!(lo.bit_size, BitSize::B32);
}

#[test]
fn test_alu_arity_mismatch() {
    let mut func = FunctionBuilder::new("main");
    let a = func.imm_u32(1);
    assert!(func.alu(AluOp::Iadd, &[a.into()]).is_err());
}

#[test]
fn test_structured_control_flow() {
    let mut func = FunctionBuilder::new("main");
    let counter = func.register(RegisterDecl::new(1, BitSize::B32));
    let cond = func.imm_u32(1);
    func.build_loop(|body| {
        body.if_else(
            cond,
            |then| {
                then.jump(JumpKind::Break);
            },
            |_| {},
        );
        body.mov_to_reg(counter, AluSrc::new(Src::reg(counter)));
    });
    let function = func.build().unwrap();

    assert_eq!(function.body.len(), 2);
    let CfNode::Loop(looped) = &function.body[1] else {
        panic!("expected loop, got {:?}", function.body[1]);
    };
    let CfNode::If(branch) = &looped.body[0] else {
        panic!("expected if");
    };
    assert!(branch.else_list.is_empty());
    assert!(matches!(
        &branch.then_list[0],
        CfNode::Block(block) if block.instructions == vec![Instruction::Jump(JumpKind::Break)]
    ));
    assert_eq!(function.registers.len(), 1);
}

#[test]
fn test_shader_builder_requires_functions() {
    let builder = ShaderBuilder::new("empty", ShaderStage::Compute);
    assert!(builder.build().is_err());

    let mut builder = ShaderBuilder::new("dup", ShaderStage::Compute);
    builder.add_function(FunctionBuilder::new("main")).unwrap();
    assert!(builder.add_function(FunctionBuilder::new("main")).is_err());
    let shader = builder.build().unwrap();
    assert_eq!(shader.entry_point().unwrap().name, "main");
}
