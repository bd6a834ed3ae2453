use lanir_core::{
    BitSize, FunctionBuilder, GlslType, Intrinsic, SamplerDim, Shader, ShaderBuilder,
    ShaderStage, SsaDef, SystemValue, TexInstr, TexOp, TexSrc, VarId, Variable, VariableMode,
};
use pretty_assertions::assert_eq;

use super::mock::MockBackend;
use super::{run, run_with};
use crate::{LodControl, LodProperty, LowerConfig, SampleOp, TextureTarget};

fn f32_bits(value: f32) -> u64 {
    value.to_bits() as u64
}

fn lane_float(func: &mut FunctionBuilder) -> SsaDef {
    let def = func.new_ssa(1, BitSize::B32);
    func.intrinsic(Intrinsic::LoadSystemValue {
        dest: def.into(),
        value: SystemValue::PrimitiveId,
    });
    def
}

/// Shader with one 2D sampler bound at unit 3 and a single texture instruction.
fn sampling_shader(
    stage: ShaderStage,
    build: impl FnOnce(&mut FunctionBuilder, VarId) -> TexInstr,
) -> Shader {
    let mut sb = ShaderBuilder::new("tex", stage);
    let sampler = sb.variable(
        Variable::new(
            "tex",
            VariableMode::Uniform,
            GlslType::Sampler {
                dim: SamplerDim::D2,
                arrayed: false,
                shadow: false,
            },
        )
        .with_binding(3),
    );
    let mut func = sb.function("main");
    let instr = build(&mut func, sampler);
    func.tex(instr);
    sb.add_function(func).unwrap();
    sb.build().unwrap()
}

fn sample_2d(func: &mut FunctionBuilder, op: TexOp, sampler: VarId) -> TexInstr {
    let coord = func.load_const(BitSize::B32, &[f32_bits(0.25), f32_bits(0.75)]);
    let dest = func.new_ssa(4, BitSize::B32);
    let mut instr = TexInstr::new(op, dest, SamplerDim::D2);
    instr.coord_components = 2;
    instr.srcs.push(TexSrc::TextureDeref(sampler));
    instr.srcs.push(TexSrc::Coord(coord.into()));
    instr
}

fn biased(func: &mut FunctionBuilder, sampler: VarId) -> TexInstr {
    let bias = lane_float(func);
    let mut instr = sample_2d(func, TexOp::Txb, sampler);
    instr.srcs.push(TexSrc::Bias(bias.into()));
    instr
}

#[test]
fn test_fragment_bias_is_per_quad() {
    let shader = sampling_shader(ShaderStage::Fragment, biased);
    let backend = run(&shader);

    let params = &backend.samples[0];
    assert_eq!(params.target, TextureTarget::Texture2D);
    assert_eq!(params.texture_index, 3);
    assert_eq!(params.sampler_index, 3);
    assert_eq!(params.coords.len(), 5);
    assert_eq!(params.key.op(), SampleOp::Texture);
    assert_eq!(params.key.lod_control(), LodControl::Bias);
    assert_eq!(params.key.lod_property(), LodProperty::PerQuad);
    assert!(params.lod.is_some());
    assert!(!params.key.is_shadow());
}

#[test]
fn test_no_quad_lod_flag() {
    let shader = sampling_shader(ShaderStage::Fragment, biased);
    let (backend, result) = run_with(&shader, LowerConfig::from_flags("no_quad_lod"));
    result.unwrap();
    assert_eq!(
        backend.samples[0].key.lod_property(),
        LodProperty::PerElement
    );

    let compute = sampling_shader(ShaderStage::Compute, biased);
    assert_eq!(
        run(&compute).samples[0].key.lod_property(),
        LodProperty::PerElement
    );
}

#[test]
fn test_constant_lod_is_scalar() {
    let shader = sampling_shader(ShaderStage::Fragment, |func, sampler| {
        let lod = func.imm_f32(2.0);
        let mut instr = sample_2d(func, TexOp::Txl, sampler);
        instr.srcs.push(TexSrc::Lod(lod.into()));
        instr
    });
    let backend = run(&shader);

    let key = backend.samples[0].key;
    assert_eq!(key.lod_control(), LodControl::Explicit);
    assert_eq!(key.lod_property(), LodProperty::Scalar);
}

#[test]
fn test_fetch_with_offsets() {
    let shader = sampling_shader(ShaderStage::Fragment, |func, sampler| {
        let lod = func.imm_i32(1);
        let offset = func.load_const(BitSize::B32, &[1, (-1i32) as u32 as u64]);
        let mut instr = sample_2d(func, TexOp::Txf, sampler);
        instr.srcs.push(TexSrc::Lod(lod.into()));
        instr.srcs.push(TexSrc::Offset(offset.into()));
        instr
    });
    let backend = run(&shader);

    let params = &backend.samples[0];
    assert_eq!(params.key.op(), SampleOp::Fetch);
    assert!(params.key.has_offsets());
    assert!(params.offsets[0].is_some());
    assert!(params.offsets[1].is_some());
    assert!(params.offsets[2].is_none());
    let offset_y = params.offsets[1].unwrap();
    assert_eq!(backend.consts.get(&offset_y), Some(&0xFFFF_FFFF));
}

#[test]
fn test_gather_component() {
    let shader = sampling_shader(ShaderStage::Fragment, |func, sampler| {
        let mut instr = sample_2d(func, TexOp::Tg4, sampler);
        instr.component = 2;
        instr
    });
    let backend = run(&shader);

    let key = backend.samples[0].key;
    assert_eq!(key.op(), SampleOp::Gather);
    assert_eq!(key.gather_component(), 2);
    assert_eq!(key.lod_control(), LodControl::Implicit);
}

#[test]
fn test_shadow_comparator_lands_in_last_slot() {
    let shader = sampling_shader(ShaderStage::Fragment, |func, sampler| {
        let reference = func.imm_f32(0.625);
        let mut instr = sample_2d(func, TexOp::Tex, sampler);
        instr.is_shadow = true;
        instr.srcs.push(TexSrc::Comparator(reference.into()));
        instr
    });
    let backend = run(&shader);

    let params = &backend.samples[0];
    assert!(params.key.is_shadow());
    assert_eq!(backend.consts.get(&params.coords[4]), Some(&f32_bits(0.625)));
}

#[test]
fn test_projector_divides_coordinates() {
    let shader = sampling_shader(ShaderStage::Fragment, |func, sampler| {
        let q = lane_float(func);
        let mut instr = sample_2d(func, TexOp::Tex, sampler);
        instr.srcs.push(TexSrc::Projector(q.into()));
        instr
    });
    let backend = run(&shader);

    assert_eq!(backend.called("Rcp f32"), 1);
    assert_eq!(backend.called("Mul f32"), 2);
}

#[test]
fn test_1d_array_layer_moves_to_slot_two() {
    let shader = sampling_shader(ShaderStage::Fragment, |func, _| {
        let coord = func.load_const(BitSize::B32, &[f32_bits(0.5), f32_bits(3.0)]);
        let dest = func.new_ssa(4, BitSize::B32);
        let mut instr = TexInstr::new(TexOp::Tex, dest, SamplerDim::D1);
        instr.is_array = true;
        instr.coord_components = 2;
        instr.texture_index = 5;
        instr.sampler_index = 6;
        instr.srcs.push(TexSrc::Coord(coord.into()));
        instr
    });
    let backend = run(&shader);

    let params = &backend.samples[0];
    assert_eq!(params.target, TextureTarget::Texture1DArray);
    assert_eq!((params.texture_index, params.sampler_index), (5, 6));
    assert_eq!(backend.consts.get(&params.coords[2]), Some(&f32_bits(3.0)));
    assert_eq!(backend.consts.get(&params.coords[1]), None);
}

#[test]
fn test_size_queries_bypass_sampling() {
    let shader = sampling_shader(ShaderStage::Fragment, |func, sampler| {
        let lod = func.imm_i32(0);
        let dest = func.new_ssa(2, BitSize::B32);
        let mut instr = TexInstr::new(TexOp::Txs, dest, SamplerDim::D2);
        instr.srcs.push(TexSrc::TextureDeref(sampler));
        instr.srcs.push(TexSrc::Lod(lod.into()));
        instr
    });
    let backend = run(&shader);
    assert!(backend.samples.is_empty());
    assert_eq!(backend.size_queries.len(), 1);
    assert_eq!(backend.size_queries[0].texture_unit, 3);
    assert!(!backend.size_queries[0].is_sviewinfo);
    assert!(backend.size_queries[0].explicit_lod.is_some());
}

#[test]
fn test_query_levels_reads_view_info() {
    let shader = sampling_shader(ShaderStage::Fragment, |func, sampler| {
        let dest = func.new_ssa(1, BitSize::B32);
        let mut instr = TexInstr::new(TexOp::QueryLevels, dest, SamplerDim::D2);
        instr.srcs.push(TexSrc::TextureDeref(sampler));
        instr
    });
    let mut lowerer = crate::Lowerer::new(MockBackend::default());
    lowerer.lower_shader(&shader).unwrap();
    let backend = lowerer.into_backend();

    let query = &backend.size_queries[0];
    assert!(query.is_sviewinfo);
    assert_eq!(
        query.explicit_lod.and_then(|lod| backend.consts.get(&lod).copied()),
        Some(0)
    );
}
