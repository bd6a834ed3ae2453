use lanir_core::{
    AluOp, BitSize, Function, GlslType, Instruction, Intrinsic, JumpKind, LoadConst, PhiInstr,
    RegisterDecl, Shader, ShaderBuilder, ShaderStage, SsaDef, SsaId, SystemValue, Variable,
    VariableMode,
};
use pretty_assertions::assert_eq;
use std::panic::{self, AssertUnwindSafe};

use super::mock::MockBackend;
use super::{run, run_with};
use crate::{LowerConfig, LowerError, Lowerer};

fn lane_value(func: &mut lanir_core::FunctionBuilder) -> SsaDef {
    let def = func.new_ssa(1, BitSize::B32);
    func.intrinsic(Intrinsic::LoadSystemValue {
        dest: def.into(),
        value: SystemValue::LocalInvocationId,
    });
    def
}

#[test]
fn test_empty_else_is_not_opened() {
    let mut sb = ShaderBuilder::new("cf", ShaderStage::Fragment);
    let mut func = sb.function("main");
    let cond = func.imm_u32(u32::MAX);
    func.if_then(cond, |b| {
        b.intrinsic(Intrinsic::Discard);
    });
    func.if_else(
        cond,
        |b| {
            b.intrinsic(Intrinsic::Discard);
        },
        |b| {
            b.intrinsic(Intrinsic::DiscardIf {
                condition: cond.into(),
            });
        },
    );
    sb.add_function(func).unwrap();
    let shader = sb.build().unwrap();

    let backend = run(&shader);
    assert_eq!(
        backend.calls,
        vec![
            "begin_if",
            "discard cond=false",
            "end_if",
            "begin_if",
            "discard cond=false",
            "begin_else",
            "discard cond=true",
            "end_if",
        ]
    );
}

#[test]
fn test_loop_with_jumps() {
    let mut sb = ShaderBuilder::new("loop", ShaderStage::Compute);
    let mut func = sb.function("main");
    let cond = func.imm_u32(0);
    func.build_loop(|b| {
        b.if_then(cond, |b| {
            b.jump(JumpKind::Break);
        });
        b.jump(JumpKind::Continue);
    });
    sb.add_function(func).unwrap();
    let shader = sb.build().unwrap();

    let backend = run(&shader);
    assert_eq!(
        backend.calls,
        vec!["begin_loop", "begin_if", "break", "end_if", "continue", "end_loop"]
    );
}

#[test]
fn test_loop_emitted_once_with_several_continues() {
    let mut sb = ShaderBuilder::new("loop", ShaderStage::Compute);
    let mut func = sb.function("main");
    let cond = func.imm_u32(1);
    func.build_loop(|b| {
        b.if_then(cond, |b| {
            b.jump(JumpKind::Continue);
        });
        b.if_else(
            cond,
            |b| {
                b.jump(JumpKind::Continue);
            },
            |b| {
                b.jump(JumpKind::Break);
            },
        );
        b.jump(JumpKind::Continue);
    });
    sb.add_function(func).unwrap();
    let shader = sb.build().unwrap();

    let backend = run(&shader);
    assert_eq!(backend.called("begin_loop"), 1);
    assert_eq!(backend.called("end_loop"), 1);
    assert_eq!(backend.called("continue"), 3);
    assert_eq!(backend.calls.first().map(String::as_str), Some("begin_loop"));
    assert_eq!(backend.calls.last().map(String::as_str), Some("end_loop"));
}

#[test]
fn test_registers_released_when_backend_panics() {
    let mut sb = ShaderBuilder::new("fma", ShaderStage::Fragment);
    let mut func = sb.function("main");
    func.register(RegisterDecl::new(2, BitSize::B32));
    let x = func.imm_f32(2.0);
    func.alu(AluOp::Ffma, &[x.into(), x.into(), x.into()]).unwrap();
    sb.add_function(func).unwrap();
    let shader = sb.build().unwrap();

    let backend = MockBackend {
        panic_on_fma: true,
        ..MockBackend::default()
    };
    let mut lowerer = Lowerer::new(backend);
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| lowerer.lower_shader(&shader)));
    assert!(outcome.is_err());
    assert_eq!(lowerer.backend().registers_live, 0);
}

fn shader_with_phi() -> (Shader, SsaId) {
    let mut sb = ShaderBuilder::new("phi", ShaderStage::Fragment);
    let mut func = sb.function("main");
    func.register(RegisterDecl::new(4, BitSize::B32));
    let a = func.imm_u32(1);
    let def = func.new_ssa(1, BitSize::B32);
    func.push(Instruction::Phi(PhiInstr {
        def,
        sources: vec![a.into()],
    }));
    sb.add_function(func).unwrap();
    (sb.build().unwrap(), def.id)
}

#[test]
fn test_phi_rejected_before_allocation() {
    let (shader, phi) = shader_with_phi();
    let (backend, result) = run_with(&shader, LowerConfig::default());
    assert!(matches!(result, Err(LowerError::PhiNotLowered(id)) if id == phi));
    assert_eq!(backend.registers_live, 0);
}

#[test]
fn test_phi_without_check_still_releases_registers() {
    let (shader, phi) = shader_with_phi();
    let config = LowerConfig::from_flags("no_check");
    let (backend, result) = run_with(&shader, config);
    let err = result.unwrap_err();
    assert!(err.is_integrity_violation());
    assert!(matches!(err, LowerError::PhiNotLowered(id) if id == phi));
    assert_eq!(backend.registers_live, 0);
}

#[test]
fn test_definition_outside_ssa_range() {
    let mut function = Function::new("main");
    function.ssa_alloc = 1;
    let def = SsaDef::new(SsaId::from_u32(3), 1, BitSize::B32);
    function
        .body
        .push(lanir_core::CfNode::Block(lanir_core::Block {
            instructions: vec![Instruction::LoadConst(LoadConst {
                def,
                values: vec![7],
            })],
        }));
    let mut shader = Shader::new("range", ShaderStage::Vertex);
    shader.add_function(function);

    for config in [LowerConfig::default(), LowerConfig::from_flags("no_check")] {
        let (_, result) = run_with(&shader, config);
        assert!(matches!(
            result,
            Err(LowerError::SsaOutOfRange { alloc: 1, .. })
        ));
    }
}

#[test]
fn test_missing_function() {
    let mut sb = ShaderBuilder::new("named", ShaderStage::Vertex);
    sb.add_function(sb.function("main")).unwrap();
    let shader = sb.build().unwrap();

    let mut lowerer = crate::Lowerer::new(super::mock::MockBackend::default());
    assert!(lowerer.lower_function(&shader, "main").is_ok());
    assert!(matches!(
        lowerer.lower_function(&shader, "helper"),
        Err(LowerError::FunctionNotFound(name)) if name == "helper"
    ));
}

#[test]
fn test_outputs_declared_up_front() {
    let mut sb = ShaderBuilder::new("io", ShaderStage::Vertex);
    sb.variable(Variable::new(
        "in_pos",
        VariableMode::ShaderIn,
        GlslType::vec4(),
    ));
    let out = sb.variable(Variable::new(
        "out_pos",
        VariableMode::ShaderOut,
        GlslType::vec4(),
    ));
    sb.add_function(sb.function("main")).unwrap();
    let shader = sb.build().unwrap();

    let backend = run(&shader);
    assert_eq!(backend.outputs, vec![out]);
}

#[test]
fn test_signed_divide_guards_overflow() {
    let mut sb = ShaderBuilder::new("div", ShaderStage::Compute);
    let mut func = sb.function("main");
    let a = lane_value(&mut func);
    let b = lane_value(&mut func);
    func.alu(AluOp::Idiv, &[a.into(), b.into()]).unwrap();
    sb.add_function(func).unwrap();
    let shader = sb.build().unwrap();

    let backend = run(&shader);
    assert_eq!(backend.called("Div i32"), 1);
    assert_eq!(backend.called("select u32"), 1);
    assert_eq!(backend.called("Not u32"), 1);
}

#[test]
fn test_unsigned_divide_has_no_select() {
    let mut sb = ShaderBuilder::new("div", ShaderStage::Compute);
    let mut func = sb.function("main");
    let a = lane_value(&mut func);
    let b = lane_value(&mut func);
    func.alu(AluOp::Udiv, &[a.into(), b.into()]).unwrap();
    sb.add_function(func).unwrap();
    let shader = sb.build().unwrap();

    let backend = run(&shader);
    assert_eq!(backend.called("Div u32"), 1);
    assert_eq!(backend.called("select u32"), 0);
    assert_eq!(backend.called("Or u32"), 2);
}

#[test]
fn test_shift_amount_is_masked() {
    let mut sb = ShaderBuilder::new("shift", ShaderStage::Compute);
    let mut func = sb.function("main");
    let value = func.imm_u64(1);
    let amount = lane_value(&mut func);
    func.alu(AluOp::Ishl, &[value.into(), amount.into()])
        .unwrap();
    sb.add_function(func).unwrap();
    let shader = sb.build().unwrap();

    let backend = run(&shader);
    assert_eq!(backend.called("ZeroExtend u64"), 1);
    assert_eq!(backend.called("And u64"), 1);
    assert!(backend.calls.iter().any(|call| call.starts_with("Shl")));
    let mask = backend
        .consts
        .values()
        .filter(|&&bits| bits == 63)
        .count();
    assert_eq!(mask, 1);
}

#[test]
fn test_register_write_mask_reaches_backend() {
    let mut sb = ShaderBuilder::new("regs", ShaderStage::Fragment);
    let mut func = sb.function("main");
    let reg = func.register(RegisterDecl::new(4, BitSize::B32));
    let value = func.load_const(BitSize::B32, &[1, 2, 3, 4]);
    func.alu_into(
        AluOp::Mov,
        lanir_core::AluDest {
            dest: lanir_core::Dest::reg(reg),
            write_mask: 0b0101,
        },
        vec![value.into()],
    );
    sb.add_function(func).unwrap();
    let shader = sb.build().unwrap();

    let backend = run(&shader);
    assert_eq!(backend.called("store_register 0x5"), 1);
    assert_eq!(backend.registers_live, 0);
}
