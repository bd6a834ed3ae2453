/*! Lane-parallel reference backend.
 *
 * Every value holds one scalar per lane. Stores, atomics and discards only touch lanes that are
 * active under the current `if`/`loop` nesting. Loops run a single pass: `break` and `continue`
 * switch lanes off until the enclosing `end_loop`, which is enough to check that structured
 * control flow and lane masking come out right without replaying the loop body.
 */

use std::collections::HashMap;

use lanir_core::{
    BaseKind, BitSize, RegisterDecl, ScalarType, SystemValue, VarId, Variable, VoteOp,
};
use lanir_lower::{
    AtomicKind, Backend, BinaryOp, CompareFunc, ConvertOp, ImageOp, ImageParams, RmwOp,
    SampleKey, SampleParams, SizeQueryParams, UnaryOp, VarAccess, VertexIndex,
};

pub const DEFAULT_LANES: usize = 4;

/// Base of the address range handed out by `variable_address`.
const VARIABLE_BASE: u64 = 0x1000;
const VARIABLE_STRIDE: u64 = 0x1000;

/// One scalar per lane, stored as raw bits of `ty`'s width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lanes {
    pub ty: ScalarType,
    pub lanes: Vec<u64>,
}

impl Lanes {
    pub fn splat(ty: ScalarType, bits: u64, count: usize) -> Self {
        Self {
            ty,
            lanes: vec![bits & ty.bits.mask(); count],
        }
    }

    pub fn lane(&self, index: usize) -> u64 {
        self.lanes.get(index).copied().unwrap_or(0)
    }

    /// Lane `index` sign-extended from the value's width.
    pub fn signed(&self, index: usize) -> i64 {
        sext(self.lane(index), self.ty.bits)
    }

    pub fn float(&self, index: usize) -> f64 {
        to_float(self.ty.bits, self.lane(index))
    }

    pub fn is_uniform(&self) -> bool {
        self.lanes.windows(2).all(|pair| pair[0] == pair[1])
    }
}

fn sext(bits: u64, size: BitSize) -> i64 {
    let shift = 64 - size.bits();
    ((bits << shift) as i64) >> shift
}

fn to_float(size: BitSize, bits: u64) -> f64 {
    match size {
        BitSize::B64 => f64::from_bits(bits),
        _ => f32::from_bits(bits as u32) as f64,
    }
}

fn from_float(size: BitSize, value: f64) -> u64 {
    match size {
        BitSize::B64 => value.to_bits(),
        _ => (value as f32).to_bits() as u64,
    }
}

fn round_even(value: f64) -> f64 {
    let rounded = value.round();
    if (value - value.trunc()).abs() == 0.5 {
        2.0 * (value / 2.0).round()
    } else {
        rounded
    }
}

fn float_to_int(value: f64, to: ScalarType) -> u64 {
    let signed = to.kind == BaseKind::Int;
    let bits = match (to.bits, signed) {
        (BitSize::B8, true) => value as i8 as u64,
        (BitSize::B16, true) => value as i16 as u64,
        (BitSize::B32, true) => value as i32 as u64,
        (BitSize::B64, true) => value as i64 as u64,
        (BitSize::B8, false) => value as u8 as u64,
        (BitSize::B16, false) => value as u16 as u64,
        (BitSize::B32, false) => value as u32 as u64,
        (BitSize::B64, false) => value as u64,
    };
    bits & to.bits.mask()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemorySpace {
    Ssbo(u32),
    Shared,
    Global,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct VarSlot {
    var: VarId,
    vertex: Option<u64>,
    slot: u64,
    component: u8,
}

struct RegisterStorage {
    num_components: usize,
    bits: BitSize,
    /// `[element * num_components + component][lane]`
    cells: Vec<Vec<u64>>,
}

struct IfFrame {
    saved: Vec<bool>,
    condition: Vec<bool>,
}

/// Recorded sampling request.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub texture_index: u32,
    pub sampler_index: u32,
    pub key: SampleKey,
}

pub struct EvalBackend {
    lane_count: usize,
    active: Vec<bool>,
    if_stack: Vec<IfFrame>,
    loop_stack: Vec<Vec<bool>>,
    loops_entered: usize,
    division_fault: bool,

    registers: Vec<Option<RegisterStorage>>,
    vars: HashMap<VarSlot, Vec<u64>>,
    memory: HashMap<(MemorySpace, u64), u8>,
    ubos: HashMap<u32, Vec<u8>>,
    kernel_args: Vec<u8>,
    buffer_sizes: HashMap<u32, u64>,
    variable_addresses: HashMap<VarId, u64>,
    texels: HashMap<(u32, [u64; 4]), [u64; 4]>,
    texture_sizes: HashMap<u32, [u64; 4]>,
    texture_colors: HashMap<u32, [f32; 4]>,
    system_values: HashMap<SystemValue, Vec<u64>>,

    samples: Vec<SampleRecord>,
    discarded: Vec<bool>,
    outputs: Vec<VarId>,
    vertices_emitted: u32,
    primitives_ended: u32,
    barriers: u32,
}

impl EvalBackend {
    pub fn new() -> Self {
        Self::with_lanes(DEFAULT_LANES)
    }

    pub fn with_lanes(lane_count: usize) -> Self {
        Self {
            lane_count,
            active: vec![true; lane_count],
            if_stack: Vec::new(),
            loop_stack: Vec::new(),
            loops_entered: 0,
            division_fault: false,
            registers: Vec::new(),
            vars: HashMap::new(),
            memory: HashMap::new(),
            ubos: HashMap::new(),
            kernel_args: Vec::new(),
            buffer_sizes: HashMap::new(),
            variable_addresses: HashMap::new(),
            texels: HashMap::new(),
            texture_sizes: HashMap::new(),
            texture_colors: HashMap::new(),
            system_values: HashMap::new(),
            samples: Vec::new(),
            discarded: vec![false; lane_count],
            outputs: Vec::new(),
            vertices_emitted: 0,
            primitives_ended: 0,
            barriers: 0,
        }
    }

    pub fn lane_count(&self) -> usize {
        self.lane_count
    }

    /// Broadcasts `value` into component `component` of input slot `slot`.
    pub fn set_input(&mut self, var: VarId, slot: u32, component: u8, value: u64) {
        self.set_input_lanes(var, slot, component, vec![value; self.lane_count]);
    }

    pub fn set_input_lanes(&mut self, var: VarId, slot: u32, component: u8, lanes: Vec<u64>) {
        let key = VarSlot {
            var,
            vertex: None,
            slot: slot as u64,
            component,
        };
        self.vars.insert(key, lanes);
    }

    /// Per-vertex input of a geometry or tessellation stage.
    pub fn set_vertex_input(
        &mut self,
        var: VarId,
        vertex: u32,
        slot: u32,
        component: u8,
        value: u64,
    ) {
        let key = VarSlot {
            var,
            vertex: Some(vertex as u64),
            slot: slot as u64,
            component,
        };
        self.vars.insert(key, vec![value; self.lane_count]);
    }

    /// Per-lane contents of a variable component, if anything was stored there.
    pub fn output(&self, var: VarId, slot: u32, component: u8) -> Option<&[u64]> {
        let key = VarSlot {
            var,
            vertex: None,
            slot: slot as u64,
            component,
        };
        self.vars.get(&key).map(Vec::as_slice)
    }

    pub fn declared_outputs(&self) -> &[VarId] {
        &self.outputs
    }

    pub fn set_system_value(&mut self, value: SystemValue, components: Vec<u64>) {
        self.system_values.insert(value, components);
    }

    pub fn set_ubo(&mut self, index: u32, bytes: Vec<u8>) {
        self.ubos.insert(index, bytes);
    }

    pub fn set_kernel_args(&mut self, bytes: Vec<u8>) {
        self.kernel_args = bytes;
    }

    pub fn set_buffer_size(&mut self, index: u32, size: u64) {
        self.buffer_sizes.insert(index, size);
    }

    pub fn set_texture_size(&mut self, unit: u32, size: [u64; 4]) {
        self.texture_sizes.insert(unit, size);
    }

    /// Color every sample of texture `index` returns.
    pub fn set_texture_color(&mut self, index: u32, color: [f32; 4]) {
        self.texture_colors.insert(index, color);
    }

    pub fn set_texel(&mut self, image: u32, coords: [u64; 4], texel: [u64; 4]) {
        self.texels.insert((image, coords), texel);
    }

    pub fn texel(&self, image: u32, coords: [u64; 4]) -> Option<[u64; 4]> {
        self.texels.get(&(image, coords)).copied()
    }

    pub fn write_memory(&mut self, space: MemorySpace, address: u64, bytes: &[u8]) {
        for (i, byte) in bytes.iter().enumerate() {
            self.memory.insert((space, address + i as u64), *byte);
        }
    }

    pub fn read_memory(&self, space: MemorySpace, address: u64, len: usize) -> Vec<u8> {
        (0..len as u64)
            .map(|i| self.memory.get(&(space, address + i)).copied().unwrap_or(0))
            .collect()
    }

    /// Address `variable_address` assigned to `var`, once it has been asked for.
    pub fn address_of(&self, var: VarId) -> Option<u64> {
        self.variable_addresses.get(&var).copied()
    }

    /// Set when an active lane divided by zero.
    pub fn division_fault(&self) -> bool {
        self.division_fault
    }

    pub fn discarded(&self) -> &[bool] {
        &self.discarded
    }

    pub fn samples(&self) -> &[SampleRecord] {
        &self.samples
    }

    pub fn loops_entered(&self) -> usize {
        self.loops_entered
    }

    pub fn live_registers(&self) -> usize {
        self.registers.iter().filter(|reg| reg.is_some()).count()
    }

    pub fn vertices_emitted(&self) -> u32 {
        self.vertices_emitted
    }

    pub fn primitives_ended(&self) -> u32 {
        self.primitives_ended
    }

    pub fn barriers(&self) -> u32 {
        self.barriers
    }

    pub fn active_lanes(&self) -> &[bool] {
        &self.active
    }

    fn map1(&self, ty: ScalarType, a: &Lanes, f: impl Fn(u64) -> u64) -> Lanes {
        let lanes = (0..self.lane_count)
            .map(|i| f(a.lane(i)) & ty.bits.mask())
            .collect();
        Lanes { ty, lanes }
    }

    fn map2(&self, ty: ScalarType, a: &Lanes, b: &Lanes, f: impl Fn(u64, u64) -> u64) -> Lanes {
        let lanes = (0..self.lane_count)
            .map(|i| f(a.lane(i), b.lane(i)) & ty.bits.mask())
            .collect();
        Lanes { ty, lanes }
    }

    fn active_indices(&self) -> Vec<usize> {
        (0..self.lane_count).filter(|&i| self.active[i]).collect()
    }

    fn read_bytes(&self, space: MemorySpace, address: u64, size: BitSize) -> u64 {
        let bytes = self.read_memory(space, address, size.bytes() as usize);
        bytes
            .iter()
            .enumerate()
            .fold(0u64, |acc, (i, byte)| acc | ((*byte as u64) << (8 * i)))
    }

    fn write_bytes(&mut self, space: MemorySpace, address: u64, size: BitSize, value: u64) {
        let bytes: Vec<u8> = (0..size.bytes()).map(|i| (value >> (8 * i)) as u8).collect();
        self.write_memory(space, address, &bytes);
    }

    fn space(index: &Option<Lanes>, lane: usize) -> MemorySpace {
        match index {
            Some(index) => MemorySpace::Ssbo(index.lane(lane) as u32),
            None => MemorySpace::Shared,
        }
    }

    fn load_lanes(
        &self,
        num_components: u8,
        ty: ScalarType,
        address: impl Fn(usize) -> (MemorySpace, u64),
    ) -> Vec<Lanes> {
        let stride = ty.bits.bytes() as u64;
        (0..num_components as u64)
            .map(|component| {
                let lanes = (0..self.lane_count)
                    .map(|lane| {
                        let (space, base) = address(lane);
                        self.read_bytes(space, base + component * stride, ty.bits)
                    })
                    .collect();
                Lanes { ty, lanes }
            })
            .collect()
    }

    fn store_lanes(
        &mut self,
        write_mask: u16,
        ty: ScalarType,
        values: &[Lanes],
        address: impl Fn(usize) -> (MemorySpace, u64),
    ) {
        let stride = ty.bits.bytes() as u64;
        for lane in self.active_indices() {
            let (space, base) = address(lane);
            for (component, value) in values.iter().enumerate() {
                if write_mask & (1 << component) != 0 {
                    let address = base + component as u64 * stride;
                    self.write_bytes(space, address, ty.bits, value.lane(lane));
                }
            }
        }
    }

    fn atomic_lanes(
        &mut self,
        op: AtomicKind,
        ty: ScalarType,
        value: &Lanes,
        compare: &Option<Lanes>,
        address: impl Fn(usize) -> (MemorySpace, u64),
    ) -> Lanes {
        let mut result = vec![0; self.lane_count];
        for lane in self.active_indices() {
            let (space, address) = address(lane);
            let old = self.read_bytes(space, address, ty.bits);
            let compare = compare.as_ref().map(|c| c.lane(lane));
            let new = atomic_result(op, ty.bits, old, value.lane(lane), compare);
            self.write_bytes(space, address, ty.bits, new);
            result[lane] = old;
        }
        Lanes { ty, lanes: result }
    }

    fn var_slot(&self, access: &VarAccess<'_, Lanes>, lane: usize, component: u8) -> VarSlot {
        let slot = match &access.indirect_offset {
            Some(offset) => offset.lane(lane),
            None => access.const_offset as u64,
        };
        let vertex = match &access.vertex_index {
            None => None,
            Some(VertexIndex::Const(n)) => Some(*n as u64),
            Some(VertexIndex::Dynamic(v)) => Some(v.lane(lane)),
        };
        VarSlot {
            var: access.id,
            vertex,
            slot,
            component,
        }
    }

    fn register_cell(
        storage: &RegisterStorage,
        indirect: &Option<Lanes>,
        lane: usize,
        component: usize,
    ) -> usize {
        let element = indirect.as_ref().map(|i| i.lane(lane) as usize).unwrap_or(0);
        element * storage.num_components + component
    }

    fn texture_size_lanes(&self, unit: u32) -> Vec<Lanes> {
        let size = self.texture_sizes.get(&unit).copied().unwrap_or([0; 4]);
        size.iter()
            .map(|&v| Lanes::splat(ScalarType::I32, v, self.lane_count))
            .collect()
    }
}

impl Default for EvalBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn atomic_result(
    op: AtomicKind,
    size: BitSize,
    old: u64,
    value: u64,
    compare: Option<u64>,
) -> u64 {
    let new = match op {
        AtomicKind::CompareSwap => {
            if Some(old) == compare {
                value
            } else {
                old
            }
        }
        AtomicKind::Rmw(rmw) => match rmw {
            RmwOp::Add => old.wrapping_add(value),
            RmwOp::Xchg => value,
            RmwOp::And => old & value,
            RmwOp::Or => old | value,
            RmwOp::Xor => old ^ value,
            RmwOp::UMin => old.min(value),
            RmwOp::UMax => old.max(value),
            RmwOp::Min => {
                if sext(value, size) < sext(old, size) {
                    value
                } else {
                    old
                }
            }
            RmwOp::Max => {
                if sext(value, size) > sext(old, size) {
                    value
                } else {
                    old
                }
            }
        },
    };
    new & size.mask()
}

fn float_unary(op: UnaryOp, x: f64) -> f64 {
    match op {
        UnaryOp::Neg => -x,
        UnaryOp::Abs => x.abs(),
        UnaryOp::Sign => {
            if x > 0.0 {
                1.0
            } else if x < 0.0 {
                -1.0
            } else {
                0.0
            }
        }
        UnaryOp::Floor => x.floor(),
        UnaryOp::Ceil => x.ceil(),
        UnaryOp::Trunc => x.trunc(),
        UnaryOp::RoundEven => round_even(x),
        UnaryOp::Sqrt => x.sqrt(),
        UnaryOp::Rsqrt => 1.0 / x.sqrt(),
        UnaryOp::Rcp => 1.0 / x,
        UnaryOp::Exp2 => x.exp2(),
        UnaryOp::Log2 => x.log2(),
        UnaryOp::Sin => x.sin(),
        UnaryOp::Cos => x.cos(),
        UnaryOp::Saturate => {
            if x.is_nan() {
                0.0
            } else {
                x.clamp(0.0, 1.0)
            }
        }
        _ => x,
    }
}

fn int_unary(op: UnaryOp, ty: ScalarType, x: u64) -> u64 {
    let size = ty.bits;
    let x = x & size.mask();
    match op {
        UnaryOp::Neg => x.wrapping_neg(),
        UnaryOp::Not => !x,
        UnaryOp::Abs => sext(x, size).wrapping_abs() as u64,
        UnaryOp::Sign => sext(x, size).signum() as u64,
        UnaryOp::BitCount => x.count_ones() as u64,
        UnaryOp::BitReverse => x.reverse_bits() >> (64 - size.bits()),
        UnaryOp::CountTrailingZeros => {
            if x == 0 {
                size.mask()
            } else {
                x.trailing_zeros() as u64
            }
        }
        UnaryOp::CountLeadingZeros => (x.leading_zeros() - (64 - size.bits())) as u64,
        _ => x,
    }
}

fn float_binary(op: BinaryOp, a: f64, b: f64) -> f64 {
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        BinaryOp::Min => a.min(b),
        BinaryOp::Max => a.max(b),
        BinaryOp::Pow => a.powf(b),
        _ => f64::NAN,
    }
}

/// Integer lane operation. `None` for a zero divisor.
fn int_binary(op: BinaryOp, ty: ScalarType, a: u64, b: u64) -> Option<u64> {
    let size = ty.bits;
    let signed = ty.kind == BaseKind::Int;
    let (sa, sb) = (sext(a, size), sext(b, size));
    let shift = (b & (size.bits() as u64 - 1)) as u32;
    let value = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::MulHigh => {
            if signed {
                ((sa as i128 * sb as i128) >> size.bits()) as u64
            } else {
                ((a as u128 * b as u128) >> size.bits()) as u64
            }
        }
        BinaryOp::Div | BinaryOp::Rem if b & size.mask() == 0 => return None,
        BinaryOp::Div if signed => sa.wrapping_div(sb) as u64,
        BinaryOp::Div => a / b,
        BinaryOp::Rem if signed => sa.wrapping_rem(sb) as u64,
        BinaryOp::Rem => a % b,
        BinaryOp::Min if signed => sa.min(sb) as u64,
        BinaryOp::Min => a.min(b),
        BinaryOp::Max if signed => sa.max(sb) as u64,
        BinaryOp::Max => a.max(b),
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::Shl => a << shift,
        BinaryOp::Shr if signed => (sa >> shift) as u64,
        BinaryOp::Shr => (a & size.mask()) >> shift,
        BinaryOp::Pow => 0,
    };
    Some(value & size.mask())
}

fn compare_lane(func: CompareFunc, ordered: bool, ty: ScalarType, a: u64, b: u64) -> bool {
    if ty.is_float() {
        let (x, y) = (to_float(ty.bits, a), to_float(ty.bits, b));
        if x.is_nan() || y.is_nan() {
            return !ordered;
        }
        return match func {
            CompareFunc::Equal => x == y,
            CompareFunc::NotEqual => x != y,
            CompareFunc::Less => x < y,
            CompareFunc::GreaterEqual => x >= y,
        };
    }
    let ordering = if ty.kind == BaseKind::Int {
        sext(a, ty.bits).cmp(&sext(b, ty.bits))
    } else {
        (a & ty.bits.mask()).cmp(&(b & ty.bits.mask()))
    };
    match func {
        CompareFunc::Equal => ordering.is_eq(),
        CompareFunc::NotEqual => ordering.is_ne(),
        CompareFunc::Less => ordering.is_lt(),
        CompareFunc::GreaterEqual => ordering.is_ge(),
    }
}

fn convert_lane(op: ConvertOp, from: ScalarType, to: ScalarType, x: u64) -> u64 {
    let bits = match op {
        ConvertOp::Trunc => x,
        ConvertOp::SignExtend => sext(x, from.bits) as u64,
        ConvertOp::ZeroExtend => x & from.bits.mask(),
        ConvertOp::FloatTrunc | ConvertOp::FloatExtend => {
            from_float(to.bits, to_float(from.bits, x))
        }
        ConvertOp::FloatToSigned | ConvertOp::FloatToUnsigned => {
            float_to_int(to_float(from.bits, x), to)
        }
        ConvertOp::SignedToFloat => from_float(to.bits, sext(x, from.bits) as f64),
        ConvertOp::UnsignedToFloat => from_float(to.bits, (x & from.bits.mask()) as f64),
    };
    bits & to.bits.mask()
}

impl Backend for EvalBackend {
    type Value = Lanes;
    type Register = usize;

    fn const_uint(&mut self, ty: ScalarType, bits: u64) -> Lanes {
        Lanes::splat(ty, bits, self.lane_count)
    }

    fn undef(&mut self, ty: ScalarType) -> Lanes {
        Lanes::splat(ty, 0, self.lane_count)
    }

    fn unary(&mut self, op: UnaryOp, ty: ScalarType, a: Lanes) -> Lanes {
        match op {
            UnaryOp::Ddx | UnaryOp::Ddy => {
                let step = if op == UnaryOp::Ddx { 1 } else { 2 };
                let lanes = (0..self.lane_count)
                    .map(|i| {
                        let (lo, hi) = (i & !step, i | step);
                        if hi >= self.lane_count {
                            return from_float(ty.bits, 0.0);
                        }
                        from_float(ty.bits, a.float(hi) - a.float(lo))
                    })
                    .collect();
                Lanes { ty, lanes }
            }
            _ if ty.is_float() => self.map1(ty, &a, |x| {
                from_float(ty.bits, float_unary(op, to_float(ty.bits, x)))
            }),
            _ => self.map1(ty, &a, |x| int_unary(op, ty, x)),
        }
    }

    fn binary(&mut self, op: BinaryOp, ty: ScalarType, a: Lanes, b: Lanes) -> Lanes {
        if ty.is_float() {
            return self.map2(ty, &a, &b, |x, y| {
                let value = float_binary(op, to_float(ty.bits, x), to_float(ty.bits, y));
                from_float(ty.bits, value)
            });
        }
        let mut lanes = Vec::with_capacity(self.lane_count);
        for i in 0..self.lane_count {
            match int_binary(op, ty, a.lane(i), b.lane(i)) {
                Some(value) => lanes.push(value),
                None => {
                    if self.active[i] {
                        self.division_fault = true;
                    }
                    lanes.push(0);
                }
            }
        }
        Lanes { ty, lanes }
    }

    fn fma(&mut self, ty: ScalarType, a: Lanes, b: Lanes, c: Lanes) -> Lanes {
        let lanes = (0..self.lane_count)
            .map(|i| from_float(ty.bits, a.float(i).mul_add(b.float(i), c.float(i))))
            .collect();
        Lanes { ty, lanes }
    }

    fn compare(
        &mut self,
        func: CompareFunc,
        ordered: bool,
        ty: ScalarType,
        a: Lanes,
        b: Lanes,
    ) -> Lanes {
        let mask = ScalarType::int(ty.bits);
        self.map2(mask, &a, &b, |x, y| {
            if compare_lane(func, ordered, ty, x, y) {
                u64::MAX
            } else {
                0
            }
        })
    }

    fn select(&mut self, ty: ScalarType, mask: Lanes, a: Lanes, b: Lanes) -> Lanes {
        let lanes = (0..self.lane_count)
            .map(|i| {
                let picked = if mask.lane(i) != 0 { a.lane(i) } else { b.lane(i) };
                picked & ty.bits.mask()
            })
            .collect();
        Lanes { ty, lanes }
    }

    fn bitcast(&mut self, value: Lanes, to: ScalarType) -> Lanes {
        self.map1(to, &value, |x| x)
    }

    fn convert(&mut self, op: ConvertOp, value: Lanes, to: ScalarType) -> Lanes {
        let from = value.ty;
        self.map1(to, &value, |x| convert_lane(op, from, to, x))
    }

    fn extract_lane(&mut self, value: Lanes, lane: u32) -> Lanes {
        Lanes::splat(value.ty, value.lane(lane as usize), self.lane_count)
    }

    fn declare_output(&mut self, id: VarId, _var: &Variable) {
        self.outputs.push(id);
    }

    fn load_var(
        &mut self,
        access: &VarAccess<'_, Lanes>,
        num_components: u8,
        ty: ScalarType,
    ) -> Vec<Lanes> {
        (0..num_components)
            .map(|component| {
                let lanes = (0..self.lane_count)
                    .map(|lane| {
                        let key = self.var_slot(access, lane, component);
                        self.vars
                            .get(&key)
                            .map(|stored| stored.get(lane).copied().unwrap_or(0))
                            .unwrap_or(0)
                            & ty.bits.mask()
                    })
                    .collect();
                Lanes { ty, lanes }
            })
            .collect()
    }

    fn store_var(
        &mut self,
        access: &VarAccess<'_, Lanes>,
        write_mask: u16,
        ty: ScalarType,
        values: &[Lanes],
    ) {
        for lane in self.active_indices() {
            for (component, value) in values.iter().enumerate() {
                if write_mask & (1 << component) == 0 {
                    continue;
                }
                let key = self.var_slot(access, lane, component as u8);
                let lane_count = self.lane_count;
                let stored = self.vars.entry(key).or_insert_with(|| vec![0; lane_count]);
                stored[lane] = value.lane(lane) & ty.bits.mask();
            }
        }
    }

    fn variable_address(&mut self, id: VarId, _var: &Variable) -> Lanes {
        let next = VARIABLE_BASE + VARIABLE_STRIDE * self.variable_addresses.len() as u64;
        let address = *self.variable_addresses.entry(id).or_insert(next);
        Lanes::splat(ScalarType::U64, address, self.lane_count)
    }

    fn alloc_register(&mut self, decl: &RegisterDecl) -> usize {
        let elements = decl.num_array_elems.max(1) as usize;
        let num_components = decl.num_components as usize;
        self.registers.push(Some(RegisterStorage {
            num_components,
            bits: decl.bit_size,
            cells: vec![vec![0; self.lane_count]; elements * num_components],
        }));
        self.registers.len() - 1
    }

    fn load_register(
        &mut self,
        reg: &usize,
        decl: &RegisterDecl,
        indirect: Option<Lanes>,
    ) -> Vec<Lanes> {
        let ty = ScalarType::uint(decl.bit_size);
        let storage = match self.registers.get(*reg).and_then(Option::as_ref) {
            Some(storage) => storage,
            None => {
                let zero = Lanes::splat(ty, 0, self.lane_count);
                return vec![zero; decl.num_components as usize];
            }
        };
        (0..storage.num_components)
            .map(|component| {
                let lanes = (0..self.lane_count)
                    .map(|lane| {
                        let cell = Self::register_cell(storage, &indirect, lane, component);
                        storage
                            .cells
                            .get(cell)
                            .map(|cell| cell[lane])
                            .unwrap_or(0)
                    })
                    .collect();
                Lanes {
                    ty: ScalarType::uint(storage.bits),
                    lanes,
                }
            })
            .collect()
    }

    fn store_register(
        &mut self,
        reg: &usize,
        _decl: &RegisterDecl,
        indirect: Option<Lanes>,
        write_mask: u16,
        values: &[Lanes],
    ) {
        let active = self.active_indices();
        let storage = match self.registers.get_mut(*reg).and_then(Option::as_mut) {
            Some(storage) => storage,
            None => return,
        };
        let mask = storage.bits.mask();
        for lane in active {
            for (component, value) in values.iter().enumerate() {
                if write_mask & (1 << component) == 0 {
                    continue;
                }
                let cell = Self::register_cell(storage, &indirect, lane, component);
                if let Some(cell) = storage.cells.get_mut(cell) {
                    cell[lane] = value.lane(lane) & mask;
                }
            }
        }
    }

    fn release_register(&mut self, reg: usize) {
        if let Some(slot) = self.registers.get_mut(reg) {
            *slot = None;
        }
    }

    fn load_ubo(
        &mut self,
        num_components: u8,
        ty: ScalarType,
        _offset_is_uniform: bool,
        index: Lanes,
        offset: Lanes,
    ) -> Vec<Lanes> {
        let empty = Vec::new();
        let buffer = self.ubos.get(&(index.lane(0) as u32)).unwrap_or(&empty);
        let stride = ty.bits.bytes() as u64;
        (0..num_components as u64)
            .map(|component| {
                let lanes = (0..self.lane_count)
                    .map(|lane| {
                        let start = offset.lane(lane) + component * stride;
                        (0..stride).fold(0u64, |acc, i| {
                            let byte = buffer.get((start + i) as usize).copied().unwrap_or(0);
                            acc | ((byte as u64) << (8 * i))
                        })
                    })
                    .collect();
                Lanes { ty, lanes }
            })
            .collect()
    }

    fn load_mem(
        &mut self,
        num_components: u8,
        ty: ScalarType,
        index: Option<Lanes>,
        offset: Lanes,
    ) -> Vec<Lanes> {
        self.load_lanes(num_components, ty, |lane| {
            (Self::space(&index, lane), offset.lane(lane))
        })
    }

    fn store_mem(
        &mut self,
        write_mask: u16,
        ty: ScalarType,
        index: Option<Lanes>,
        offset: Lanes,
        values: &[Lanes],
    ) {
        self.store_lanes(write_mask, ty, values, |lane| {
            (Self::space(&index, lane), offset.lane(lane))
        });
    }

    fn atomic_mem(
        &mut self,
        op: AtomicKind,
        ty: ScalarType,
        index: Option<Lanes>,
        offset: Lanes,
        value: Lanes,
        compare: Option<Lanes>,
    ) -> Lanes {
        self.atomic_lanes(op, ty, &value, &compare, |lane| {
            (Self::space(&index, lane), offset.lane(lane))
        })
    }

    fn buffer_size(&mut self, index: Lanes) -> Lanes {
        let lanes = (0..self.lane_count)
            .map(|lane| {
                let index = index.lane(lane) as u32;
                self.buffer_sizes.get(&index).copied().unwrap_or(0)
            })
            .collect();
        Lanes {
            ty: ScalarType::U32,
            lanes,
        }
    }

    fn load_kernel_arg(
        &mut self,
        num_components: u8,
        ty: ScalarType,
        _offset_bits: u32,
        _offset_is_uniform: bool,
        offset: Lanes,
    ) -> Vec<Lanes> {
        let stride = ty.bits.bytes() as u64;
        (0..num_components as u64)
            .map(|component| {
                let lanes = (0..self.lane_count)
                    .map(|lane| {
                        let start = offset.lane(lane) + component * stride;
                        (0..stride).fold(0u64, |acc, i| {
                            let byte = self
                                .kernel_args
                                .get((start + i) as usize)
                                .copied()
                                .unwrap_or(0);
                            acc | ((byte as u64) << (8 * i))
                        })
                    })
                    .collect();
                Lanes { ty, lanes }
            })
            .collect()
    }

    fn load_global(
        &mut self,
        num_components: u8,
        ty: ScalarType,
        _address_bits: u32,
        address: Lanes,
    ) -> Vec<Lanes> {
        self.load_lanes(num_components, ty, |lane| {
            (MemorySpace::Global, address.lane(lane))
        })
    }

    fn store_global(
        &mut self,
        write_mask: u16,
        ty: ScalarType,
        _address_bits: u32,
        address: Lanes,
        values: &[Lanes],
    ) {
        self.store_lanes(write_mask, ty, values, |lane| {
            (MemorySpace::Global, address.lane(lane))
        });
    }

    fn atomic_global(
        &mut self,
        op: AtomicKind,
        ty: ScalarType,
        _address_bits: u32,
        address: Lanes,
        value: Lanes,
        compare: Option<Lanes>,
    ) -> Lanes {
        self.atomic_lanes(op, ty, &value, &compare, |lane| {
            (MemorySpace::Global, address.lane(lane))
        })
    }

    fn image_op(&mut self, params: &ImageParams<Lanes>) -> Vec<Lanes> {
        let coords_of = |lane: usize| -> [u64; 4] {
            let mut coords = [0; 4];
            for (slot, value) in params.coords.iter().take(4).enumerate() {
                coords[slot] = value.lane(lane) & 0xFFFF_FFFF;
            }
            coords
        };
        let mut result: Vec<Vec<u64>> = vec![vec![0; self.lane_count]; 4];
        let mut result_ty = ScalarType::F32;

        match params.op {
            ImageOp::Load => {
                for lane in 0..self.lane_count {
                    let texel = self
                        .texel(params.image_index, coords_of(lane))
                        .unwrap_or([0; 4]);
                    for (component, value) in texel.iter().enumerate() {
                        result[component][lane] = *value;
                    }
                }
            }
            ImageOp::Store => {
                for lane in self.active_indices() {
                    let mut texel = [0; 4];
                    for (component, value) in params.data.iter().take(4).enumerate() {
                        texel[component] = value.lane(lane);
                    }
                    self.texels
                        .insert((params.image_index, coords_of(lane)), texel);
                }
            }
            ImageOp::Atomic(kind) => {
                result_ty = ScalarType::U32;
                for lane in self.active_indices() {
                    let key = (params.image_index, coords_of(lane));
                    let mut texel = self.texels.get(&key).copied().unwrap_or([0; 4]);
                    let old = texel[0];
                    let value = params.data.first().map(|v| v.lane(lane)).unwrap_or(0);
                    let compare = params.compare.first().map(|c| c.lane(lane));
                    texel[0] = atomic_result(kind, BitSize::B32, old, value, compare);
                    self.texels.insert(key, texel);
                    result[0][lane] = old;
                }
            }
        }

        result
            .into_iter()
            .map(|lanes| Lanes {
                ty: result_ty,
                lanes,
            })
            .collect()
    }

    fn image_size(&mut self, params: &SizeQueryParams<Lanes>) -> Vec<Lanes> {
        self.texture_size_lanes(params.texture_unit)
    }

    fn sample(&mut self, params: &SampleParams<Lanes>) -> Vec<Lanes> {
        self.samples.push(SampleRecord {
            texture_index: params.texture_index,
            sampler_index: params.sampler_index,
            key: params.key,
        });
        let color = self
            .texture_colors
            .get(&params.texture_index)
            .copied()
            .unwrap_or([0.0; 4]);
        color
            .iter()
            .map(|&c| Lanes::splat(ScalarType::F32, c.to_bits() as u64, self.lane_count))
            .collect()
    }

    fn texture_size(&mut self, params: &SizeQueryParams<Lanes>) -> Vec<Lanes> {
        self.texture_size_lanes(params.texture_unit)
    }

    fn system_value(
        &mut self,
        value: SystemValue,
        num_components: u8,
        ty: ScalarType,
    ) -> Vec<Lanes> {
        let configured = self.system_values.get(&value);
        (0..num_components as usize)
            .map(|component| match configured {
                Some(values) => {
                    let bits = values.get(component).copied().unwrap_or(0);
                    Lanes::splat(ty, bits, self.lane_count)
                }
                None if value == SystemValue::LocalInvocationId && component == 0 => Lanes {
                    ty,
                    lanes: (0..self.lane_count as u64).collect(),
                },
                None => Lanes::splat(ty, 0, self.lane_count),
            })
            .collect()
    }

    fn discard(&mut self, condition: Option<Lanes>) {
        for lane in self.active_indices() {
            let hit = condition.as_ref().map(|c| c.lane(lane) != 0).unwrap_or(true);
            if hit {
                self.discarded[lane] = true;
            }
        }
    }

    fn emit_vertex(&mut self, _stream: u32) {
        self.vertices_emitted += 1;
    }

    fn end_primitive(&mut self, _stream: u32) {
        self.primitives_ended += 1;
    }

    fn barrier(&mut self) {
        self.barriers += 1;
    }

    fn vote(&mut self, op: VoteOp, value: Lanes) -> Lanes {
        let active = self.active_indices();
        let holds = match op {
            VoteOp::All => active.iter().all(|&lane| value.lane(lane) != 0),
            VoteOp::Any => active.iter().any(|&lane| value.lane(lane) != 0),
            VoteOp::Ieq => active
                .windows(2)
                .all(|pair| value.lane(pair[0]) == value.lane(pair[1])),
        };
        Lanes::splat(ScalarType::I32, if holds { u64::MAX } else { 0 }, self.lane_count)
    }

    fn begin_if(&mut self, condition: Lanes) {
        let condition: Vec<bool> = (0..self.lane_count)
            .map(|lane| condition.lane(lane) != 0)
            .collect();
        let saved = self.active.clone();
        for (lane, active) in self.active.iter_mut().enumerate() {
            *active &= condition[lane];
        }
        self.if_stack.push(IfFrame { saved, condition });
    }

    fn begin_else(&mut self) {
        if let Some(frame) = self.if_stack.last() {
            // lanes switched off by a jump inside the then-branch stay off
            let loop_live = self.loop_stack.last();
            for lane in 0..self.lane_count {
                let jumped = loop_live.map(|dead| dead[lane]).unwrap_or(false);
                self.active[lane] = frame.saved[lane] && !frame.condition[lane] && !jumped;
            }
        }
    }

    fn end_if(&mut self) {
        if let Some(frame) = self.if_stack.pop() {
            let dead = self.loop_stack.last();
            for lane in 0..self.lane_count {
                let jumped = dead.map(|dead| dead[lane]).unwrap_or(false);
                self.active[lane] = frame.saved[lane] && !jumped;
            }
        }
    }

    fn begin_loop(&mut self) {
        self.loops_entered += 1;
        self.loop_stack.push(vec![false; self.lane_count]);
        self.if_stack.push(IfFrame {
            saved: self.active.clone(),
            condition: vec![true; self.lane_count],
        });
    }

    fn end_loop(&mut self) {
        self.loop_stack.pop();
        if let Some(frame) = self.if_stack.pop() {
            self.active = frame.saved;
        }
    }

    fn emit_break(&mut self) {
        self.jump();
    }

    fn emit_continue(&mut self) {
        self.jump();
    }
}

impl EvalBackend {
    /// Switches the active lanes off until the innermost loop ends.
    fn jump(&mut self) {
        if let Some(dead) = self.loop_stack.last_mut() {
            for (lane, active) in self.active.iter_mut().enumerate() {
                if *active {
                    dead[lane] = true;
                    *active = false;
                }
            }
        }
    }
}
