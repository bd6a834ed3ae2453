use lanir_core::{
    AtomicOp, BitSize, DerefInstr, FunctionBuilder, GlslType, Instruction, Intrinsic,
    MemoryBarrierKind, SamplerDim, Shader, ShaderBuilder, ShaderStage, SsaDef, SystemValue,
    Variable, VariableMode, VoteOp,
};
use pretty_assertions::assert_eq;

use super::{run, run_with};
use crate::{AtomicKind, ImageOp, LowerConfig, LowerError, RmwOp, TextureTarget};

fn compute_shader(body: impl FnOnce(&mut ShaderBuilder, &mut FunctionBuilder)) -> Shader {
    let mut sb = ShaderBuilder::new("cs", ShaderStage::Compute);
    let mut func = sb.function("main");
    body(&mut sb, &mut func);
    sb.add_function(func).unwrap();
    sb.build().unwrap()
}

fn lane_id(func: &mut FunctionBuilder) -> SsaDef {
    let def = func.new_ssa(1, BitSize::B32);
    func.intrinsic(Intrinsic::LoadSystemValue {
        dest: def.into(),
        value: SystemValue::LocalInvocationId,
    });
    def
}

#[test]
fn test_ubo_offset_uniformity() {
    let shader = compute_shader(|_, func| {
        let index = func.imm_u32(0);
        let offset = func.imm_u32(16);
        let lane = lane_id(func);
        for offset in [offset, lane] {
            let dest = func.new_ssa(4, BitSize::B32);
            func.intrinsic(Intrinsic::LoadUbo {
                dest: dest.into(),
                index: index.into(),
                offset: offset.into(),
            });
        }
    });

    let backend = run(&shader);
    assert_eq!(backend.ubo_uniform, vec![true, false]);
}

#[test]
fn test_ssbo_and_shared_share_the_memory_path() {
    let shader = compute_shader(|_, func| {
        let index = func.imm_u32(1);
        let offset = lane_id(func);
        let value = func.load_const(BitSize::B32, &[1, 2]);
        func.intrinsic(Intrinsic::StoreSsbo {
            value: value.into(),
            index: index.into(),
            offset: offset.into(),
            write_mask: 0,
        });
        func.intrinsic(Intrinsic::StoreShared {
            value: value.into(),
            offset: offset.into(),
            write_mask: 0b10,
        });
        let dest = func.new_ssa(2, BitSize::B32);
        func.intrinsic(Intrinsic::LoadShared {
            dest: dest.into(),
            offset: offset.into(),
        });
    });

    let backend = run(&shader);
    assert_eq!(
        backend.calls,
        vec![
            "system_value LocalInvocationId",
            "store_mem ssbo=true 0x3",
            "store_mem ssbo=false 0x2",
            "load_mem ssbo=false",
        ]
    );
}

#[test]
fn test_atomics() {
    let shader = compute_shader(|_, func| {
        let index = func.imm_u32(0);
        let offset = func.imm_u32(4);
        let value = lane_id(func);
        let dest = func.new_ssa(1, BitSize::B32);
        func.intrinsic(Intrinsic::SsboAtomic {
            dest: dest.into(),
            op: AtomicOp::Imax,
            index: index.into(),
            offset: offset.into(),
            value: value.into(),
            compare: None,
        });
        let dest = func.new_ssa(1, BitSize::B32);
        func.intrinsic(Intrinsic::SharedAtomic {
            dest: dest.into(),
            op: AtomicOp::CompSwap,
            offset: offset.into(),
            value: value.into(),
            compare: Some(offset.into()),
        });
    });

    let backend = run(&shader);
    assert_eq!(backend.called("atomic_mem Rmw(Max) cmp=false"), 1);
    assert_eq!(backend.called("atomic_mem CompareSwap cmp=true"), 1);
}

#[test]
fn test_compare_swap_needs_comparison() {
    let shader = compute_shader(|_, func| {
        let offset = func.imm_u32(0);
        let dest = func.new_ssa(1, BitSize::B32);
        func.intrinsic(Intrinsic::SharedAtomic {
            dest: dest.into(),
            op: AtomicOp::CompSwap,
            offset: offset.into(),
            value: offset.into(),
            compare: None,
        });
    });

    let (_, result) = run_with(&shader, LowerConfig::default());
    assert!(matches!(result, Err(LowerError::Malformed(_))));
}

#[test]
fn test_shared_variable_address_feeds_global_access() {
    let shader = compute_shader(|sb, func| {
        let var = sb.variable(Variable::new(
            "scratch",
            VariableMode::Shared,
            GlslType::array_of(GlslType::vec4(), 16),
        ));
        let address = func.new_ssa(1, BitSize::B64);
        func.push(Instruction::Deref(DerefInstr { def: address, var }));
        let dest = func.new_ssa(4, BitSize::B32);
        func.intrinsic(Intrinsic::LoadGlobal {
            dest: dest.into(),
            address: address.into(),
        });
        func.intrinsic(Intrinsic::StoreGlobal {
            value: dest.into(),
            address: address.into(),
            write_mask: 0,
        });
    });

    let backend = run(&shader);
    assert_eq!(backend.calls, vec!["load_global 64", "store_global 64"]);
}

#[test]
fn test_kernel_input_offset() {
    let mut sb = ShaderBuilder::new("kernel", ShaderStage::Kernel);
    let mut func = sb.function("main");
    let offset = func.imm_u32(8);
    let dest = func.new_ssa(2, BitSize::B64);
    func.intrinsic(Intrinsic::LoadKernelInput {
        dest: dest.into(),
        offset: offset.into(),
    });
    sb.add_function(func).unwrap();
    let shader = sb.build().unwrap();

    let backend = run(&shader);
    assert_eq!(backend.calls, vec!["load_kernel_arg 32 uniform=true"]);
}

#[test]
fn test_barriers_and_votes() {
    let shader = compute_shader(|_, func| {
        func.intrinsic(Intrinsic::MemoryBarrier(MemoryBarrierKind::Shared));
        func.intrinsic(Intrinsic::ControlBarrier);
        let lane = lane_id(func);
        let dest = func.new_ssa(1, BitSize::B32);
        func.intrinsic(Intrinsic::Vote {
            dest: dest.into(),
            op: VoteOp::Ieq,
            value: lane.into(),
        });
    });

    let backend = run(&shader);
    assert_eq!(
        backend.calls,
        vec!["barrier", "system_value LocalInvocationId", "vote Ieq"]
    );
}

#[test]
fn test_image_coordinates_for_1d_arrays() {
    let mut sb = ShaderBuilder::new("img", ShaderStage::Compute);
    let image = sb.variable(
        Variable::new(
            "img",
            VariableMode::Uniform,
            GlslType::Image {
                dim: SamplerDim::D1,
                arrayed: true,
            },
        )
        .with_binding(2),
    );
    let mut func = sb.function("main");
    let coord = func.load_const(BitSize::B32, &[7, 3]);
    let value = func.load_const(BitSize::B32, &[0, 0, 0, 0]);
    func.intrinsic(Intrinsic::ImageStore {
        image,
        coord: coord.into(),
        value: value.into(),
    });
    let dest = func.new_ssa(1, BitSize::B32);
    func.intrinsic(Intrinsic::ImageAtomic {
        dest: dest.into(),
        op: AtomicOp::Add,
        image,
        coord: coord.into(),
        value: value.into(),
        compare: None,
    });
    sb.add_function(func).unwrap();
    let shader = sb.build().unwrap();

    let backend = run(&shader);
    assert_eq!(backend.images.len(), 2);
    let store = &backend.images[0];
    assert_eq!(store.target, TextureTarget::Texture1DArray);
    assert_eq!(store.image_index, 2);
    assert_eq!(store.op, ImageOp::Store);
    assert_eq!(store.coords.len(), 4);
    assert_eq!(store.coords[2], store.coords[1]);
    assert_eq!(backend.consts.get(&store.coords[1]), Some(&3));
    assert_eq!(store.data.len(), 4);

    let atomic = &backend.images[1];
    assert_eq!(atomic.op, ImageOp::Atomic(AtomicKind::Rmw(RmwOp::Add)));
    assert_eq!(atomic.data.len(), 1);
    assert!(atomic.compare.is_empty());
}
