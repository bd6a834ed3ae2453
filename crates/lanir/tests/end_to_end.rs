use lanir::{
    load_shader, lower, save_shader, AluOp, BitSize, DerefChain, EvalBackend, GlslType,
    Instruction, Intrinsic, LowerConfig, LowerError, Lowerer, ScalarType, ShaderBuilder,
    ShaderStage, TraceBackend, Variable, VariableMode,
};
use lanir::core::{AluSrc, JumpKind, PhiInstr, RegisterDecl, StructField, SystemValue};
use pretty_assertions::assert_eq;
use tempfile::NamedTempFile;

#[test]
fn test_add_then_store() {
    let mut sb = ShaderBuilder::new("add", ShaderStage::Vertex);
    let out = sb.variable(Variable::new(
        "sum",
        VariableMode::ShaderOut,
        GlslType::Scalar(ScalarType::U32),
    ));
    let mut main = sb.function("main");
    let a = main.imm_u32(5);
    let b = main.imm_u32(7);
    let sum = main.alu(AluOp::Iadd, &[a.into(), b.into()]).unwrap();
    main.store_deref(DerefChain::var(out), sum, 0);
    sb.add_function(main).unwrap();
    let shader = sb.build().unwrap();

    let trace = lower(&shader, TraceBackend::new()).unwrap();
    assert_eq!(trace.count("binary"), 1);

    let eval = lower(&shader, EvalBackend::new()).unwrap();
    assert_eq!(eval.output(out, 0, 0).unwrap(), &[12; 4]);
}

#[test]
fn test_vector_component_extraction() {
    let mut sb = ShaderBuilder::new("swizzle", ShaderStage::Fragment);
    let input = sb.variable(Variable::new(
        "v",
        VariableMode::ShaderIn,
        GlslType::Vector(ScalarType::U32, 4),
    ));
    let out = sb.variable(Variable::new(
        "picked",
        VariableMode::ShaderOut,
        GlslType::Scalar(ScalarType::U32),
    ));
    let mut main = sb.function("main");
    let v = main.load_deref(DerefChain::var(input), 4, BitSize::B32);
    let z = main
        .alu_sized(AluOp::Mov, &[AluSrc::swizzled(v, &[2])], 1, BitSize::B32)
        .unwrap();
    main.store_deref(DerefChain::var(out), z, 0);
    sb.add_function(main).unwrap();
    let shader = sb.build().unwrap();

    let mut backend = EvalBackend::new();
    for component in 0..4u8 {
        backend.set_input(input, 0, component, 10 + component as u64);
    }
    let backend = lower(&shader, backend).unwrap();
    assert_eq!(backend.output(out, 0, 0).unwrap(), &[12; 4]);
}

#[test]
fn test_else_branch_and_continue() {
    let mut sb = ShaderBuilder::new("flow", ShaderStage::Compute);
    let mut main = sb.function("main");
    let cond = main.imm_u32(0);
    main.if_then(cond, |_| {});
    main.build_loop(|body| {
        body.if_then(cond, |skip| {
            skip.jump(JumpKind::Continue);
        });
        body.jump(JumpKind::Continue);
    });
    sb.add_function(main).unwrap();
    let shader = sb.build().unwrap();

    let trace = lower(&shader, TraceBackend::new()).unwrap();
    assert_eq!(trace.count("begin_else"), 0);
    assert_eq!(trace.count("begin_loop"), 1);
    assert_eq!(trace.count("end_loop"), 1);
    assert_eq!(trace.count("continue"), 2);

    let eval = lower(&shader, EvalBackend::new()).unwrap();
    assert_eq!(eval.loops_entered(), 1);
    assert_eq!(eval.active_lanes(), &[true; 4]);
}

#[test]
fn test_phi_rejected_and_registers_released() {
    let mut sb = ShaderBuilder::new("phi", ShaderStage::Compute);
    let mut main = sb.function("main");
    main.register(RegisterDecl::new(2, BitSize::B32));
    let def = main.new_ssa(1, BitSize::B32);
    main.push(Instruction::Phi(PhiInstr {
        def,
        sources: Vec::new(),
    }));
    sb.add_function(main).unwrap();
    let shader = sb.build().unwrap();

    let config = LowerConfig {
        check_normalized: false,
        ..LowerConfig::default()
    };
    let mut lowerer = Lowerer::with_config(EvalBackend::new(), config);
    let err = lowerer.lower_shader(&shader).unwrap_err();
    assert!(matches!(err, LowerError::PhiNotLowered(id) if id == def.id));
    assert!(err.is_integrity_violation());
    assert_eq!(lowerer.backend().live_registers(), 0);

    let mut lowerer = Lowerer::new(TraceBackend::new());
    assert!(matches!(
        lowerer.lower_shader(&shader),
        Err(LowerError::PhiNotLowered(_))
    ));
    assert_eq!(lowerer.backend().count("alloc_register"), 0);
}

#[test]
fn test_missing_function() {
    let mut sb = ShaderBuilder::new("named", ShaderStage::Compute);
    let mut main = sb.function("main");
    main.imm_u32(1);
    sb.add_function(main).unwrap();
    let shader = sb.build().unwrap();

    let mut lowerer = Lowerer::new(TraceBackend::new());
    assert!(lowerer.lower_function(&shader, "main").is_ok());
    let err = lowerer.lower_function(&shader, "helper").unwrap_err();
    assert!(matches!(err, LowerError::FunctionNotFound(ref name) if name == "helper"));
}

#[test]
fn test_persisted_shader_lowers_identically() {
    let mut sb = ShaderBuilder::new("persist", ShaderStage::Compute);
    let out = sb.variable(Variable::new(
        "out",
        VariableMode::ShaderOut,
        GlslType::Scalar(ScalarType::U32),
    ));
    let mut main = sb.function("main");
    let a = main.imm_u32(40);
    let b = main.imm_u32(2);
    let sum = main.alu(AluOp::Iadd, &[a.into(), b.into()]).unwrap();
    main.build_loop(|body| {
        body.store_deref(DerefChain::var(out), sum, 0);
        body.jump(JumpKind::Break);
    });
    sb.add_function(main).unwrap();
    let shader = sb.build().unwrap();

    let file = NamedTempFile::new().unwrap();
    save_shader(&shader, file.path()).unwrap();
    let loaded = load_shader(file.path()).unwrap();
    assert_eq!(loaded, shader);

    let original = lower(&shader, TraceBackend::new()).unwrap();
    let reloaded = lower(&loaded, TraceBackend::new()).unwrap();
    assert_eq!(original.events(), reloaded.events());

    let eval = lower(&loaded, EvalBackend::new()).unwrap();
    assert_eq!(eval.output(out, 0, 0).unwrap(), &[42; 4]);
}

#[test]
fn test_variable_store_then_load() {
    let mut sb = ShaderBuilder::new("round_trip", ShaderStage::Vertex);
    let vec4 = GlslType::Vector(ScalarType::U32, 4);
    let first = sb.variable(Variable::new("first", VariableMode::ShaderOut, vec4.clone()));
    let second = sb.variable(Variable::new("second", VariableMode::ShaderOut, vec4));
    let mut main = sb.function("main");
    let value = main.load_const(BitSize::B32, &[1, 2, 3, 4]);
    main.store_deref(DerefChain::var(first), value, 0);
    let loaded = main.load_deref(DerefChain::var(first), 4, BitSize::B32);
    main.store_deref(DerefChain::var(second), loaded, 0);
    sb.add_function(main).unwrap();
    let shader = sb.build().unwrap();

    let backend = lower(&shader, EvalBackend::new()).unwrap();
    for component in 0..4u8 {
        assert_eq!(
            backend.output(second, 0, component).unwrap(),
            &[component as u64 + 1; 4]
        );
    }
}

#[test]
fn test_dynamic_index_store_then_load() {
    let mut sb = ShaderBuilder::new("indexed", ShaderStage::Compute);
    let uint = GlslType::Scalar(ScalarType::U32);
    let element = GlslType::Struct(vec![
        StructField {
            name: "pad".into(),
            ty: GlslType::vec4(),
        },
        StructField {
            name: "value".into(),
            ty: uint.clone(),
        },
    ]);
    let items = sb.variable(Variable::new(
        "items",
        VariableMode::ShaderOut,
        GlslType::array_of(element, 5),
    ));
    let out = sb.variable(Variable::new("out", VariableMode::ShaderOut, uint));
    let mut main = sb.function("main");
    let lane = main.new_ssa(1, BitSize::B32);
    main.intrinsic(Intrinsic::LoadSystemValue {
        dest: lane.into(),
        value: SystemValue::LocalInvocationId,
    });
    let one = main.imm_u32(1);
    let ten = main.imm_u32(10);
    let index = main.alu(AluOp::Iadd, &[lane.into(), one.into()]).unwrap();
    let value = main.alu(AluOp::Imul, &[lane.into(), ten.into()]).unwrap();
    let slot = || DerefChain::var(items).index(index).field(1);
    main.store_deref(slot(), value, 0);
    let loaded = main.load_deref(slot(), 1, BitSize::B32);
    main.store_deref(DerefChain::var(out), loaded, 0);
    sb.add_function(main).unwrap();
    let shader = sb.build().unwrap();

    let backend = lower(&shader, EvalBackend::new()).unwrap();
    assert_eq!(backend.output(out, 0, 0).unwrap(), &[0, 10, 20, 30]);
    // each element spans two slots, the field sits one slot in
    assert_eq!(backend.output(items, 9, 0).unwrap(), &[0, 0, 0, 30]);
    assert_eq!(backend.output(items, 3, 0).unwrap(), &[0, 0, 0, 0]);
}

#[test]
fn test_vector_construction_extracts_inputs() {
    let mut sb = ShaderBuilder::new("vec4", ShaderStage::Compute);
    let outs: Vec<_> = (0..4)
        .map(|i| {
            sb.variable(Variable::new(
                format!("out{}", i),
                VariableMode::ShaderOut,
                GlslType::Scalar(ScalarType::U32),
            ))
        })
        .collect();
    let mut main = sb.function("main");
    let scalars: Vec<_> = [11u32, 22, 33, 44]
        .iter()
        .map(|&v| main.imm_u32(v))
        .collect();
    let srcs: Vec<AluSrc> = scalars.iter().map(|&s| s.into()).collect();
    let vector = main.alu(AluOp::Vec4, &srcs).unwrap();
    for (i, &out) in outs.iter().enumerate() {
        let picked = main
            .alu_sized(AluOp::Mov, &[AluSrc::swizzled(vector, &[i as u8])], 1, BitSize::B32)
            .unwrap();
        main.store_deref(DerefChain::var(out), picked, 0);
    }
    sb.add_function(main).unwrap();
    let shader = sb.build().unwrap();

    let backend = lower(&shader, EvalBackend::new()).unwrap();
    for (out, expected) in outs.into_iter().zip([11u64, 22, 33, 44]) {
        assert_eq!(backend.output(out, 0, 0).unwrap(), &[expected; 4]);
    }
}
