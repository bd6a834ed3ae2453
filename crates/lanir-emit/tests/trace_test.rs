use lanir_core::{
    AluOp, BitSize, DerefChain, GlslType, JumpKind, RegisterDecl, ScalarType, Shader,
    ShaderBuilder, ShaderStage, Variable, VariableMode,
};
use lanir_emit::{trace_shader, IndentStyle, TraceBackend, TraceConfig};
use lanir_lower::Lowerer;
use pretty_assertions::assert_eq;

fn sum_shader() -> Shader {
    let mut sb = ShaderBuilder::new("sum", ShaderStage::Vertex);
    let out = sb.variable(Variable::new(
        "result",
        VariableMode::ShaderOut,
        GlslType::Scalar(ScalarType::U32),
    ));
    let mut main = sb.function("main");
    let a = main.imm_u32(5);
    let b = main.imm_u32(7);
    let sum = main.alu(AluOp::Iadd, &[a.into(), b.into()]).unwrap();
    main.store_deref(DerefChain::var(out), sum, 0);
    sb.add_function(main).unwrap();
    sb.build().unwrap()
}

fn nested_flow_shader() -> Shader {
    let mut sb = ShaderBuilder::new("flow", ShaderStage::Compute);
    let mut main = sb.function("main");
    let cond = main.imm_u32(1);
    main.if_then(cond, |then| {
        then.build_loop(|body| {
            let inner = body.imm_u32(0);
            body.if_then(inner, |exit| {
                exit.jump(JumpKind::Break);
            });
        });
    });
    sb.add_function(main).unwrap();
    sb.build().unwrap()
}

#[test]
fn test_single_add() {
    let mut lowerer = Lowerer::new(TraceBackend::new());
    lowerer.lower_shader(&sum_shader()).unwrap();
    let backend = lowerer.backend();

    assert_eq!(backend.count("binary"), 1);
    assert_eq!(backend.count("declare_output"), 1);
    assert_eq!(backend.count("store_var"), 1);
    let consts: Vec<u64> = backend
        .events()
        .iter()
        .filter(|event| event.op == "const")
        .filter_map(|event| event.text.split_whitespace().last().map(str::to_string))
        .filter_map(|hex| u64::from_str_radix(hex.trim_start_matches("0x"), 16).ok())
        .collect();
    assert_eq!(consts, vec![5, 7]);
}

#[test]
fn test_control_flow_order() {
    let mut lowerer = Lowerer::new(TraceBackend::new());
    lowerer.lower_shader(&nested_flow_shader()).unwrap();

    let flow: Vec<&str> = lowerer
        .backend()
        .ops()
        .into_iter()
        .filter(|op| {
            matches!(
                *op,
                "begin_if" | "begin_else" | "end_if" | "begin_loop" | "end_loop" | "break"
            )
        })
        .collect();
    assert_eq!(
        flow,
        vec!["begin_if", "begin_loop", "begin_if", "break", "end_if", "end_loop", "end_if"]
    );
}

#[test]
fn test_render_indents_by_depth() {
    let rendered = trace_shader(&nested_flow_shader(), TraceConfig::plain()).unwrap();
    assert!(rendered.lines().any(|line| line == "      break"));
    assert!(rendered.lines().any(|line| line == "  loop {"));
    assert_eq!(rendered.lines().last(), Some("}"));

    let tabs = TraceConfig {
        use_colors: false,
        indent_style: IndentStyle::Tabs,
        tag_kinds: false,
    };
    let rendered = trace_shader(&nested_flow_shader(), tabs).unwrap();
    assert!(rendered.lines().any(|line| line == "\t\t\tbreak"));

    let tagged = TraceConfig {
        tag_kinds: true,
        ..TraceConfig::plain()
    };
    let rendered = trace_shader(&nested_flow_shader(), tagged).unwrap();
    assert!(rendered.lines().any(|line| line == "[cf]       break"));
    assert!(rendered.lines().any(|line| line.starts_with("[val] %")));
}

#[test]
fn test_register_lifetime_is_traced() {
    let mut sb = ShaderBuilder::new("regs", ShaderStage::Compute);
    let mut main = sb.function("main");
    let reg = main.register(RegisterDecl::new(1, BitSize::B32));
    let value = main.imm_u32(3);
    main.mov_to_reg(reg, value);
    sb.add_function(main).unwrap();
    let shader = sb.build().unwrap();

    let mut lowerer = Lowerer::new(TraceBackend::new());
    lowerer.lower_shader(&shader).unwrap();
    let ops = lowerer.backend().ops();
    assert_eq!(ops.first(), Some(&"alloc_register"));
    assert_eq!(ops.last(), Some(&"release_register"));
    assert_eq!(lowerer.backend().count("store_register"), 1);
}

#[test]
fn test_double_precision_sine_is_rejected() {
    let mut sb = ShaderBuilder::new("bad", ShaderStage::Fragment);
    let mut main = sb.function("main");
    let v = main.imm_f32(1.0);
    main.alu(AluOp::Fsin, &[v.into()]).unwrap();
    sb.add_function(main).unwrap();
    let shader = sb.build().unwrap();
    assert!(trace_shader(&shader, TraceConfig::plain()).is_ok());

    let mut sb = ShaderBuilder::new("bad64", ShaderStage::Fragment);
    let mut main = sb.function("main");
    let v = main.load_const(BitSize::B64, &[1.0f64.to_bits()]);
    main.alu(AluOp::Fsin, &[v.into()]).unwrap();
    sb.add_function(main).unwrap();
    let shader = sb.build().unwrap();
    let err = trace_shader(&shader, TraceConfig::plain()).unwrap_err();
    assert!(err.to_string().contains("unsupported operation"));
}
