/*! Backend that records every call as one line of text.
 *
 * Values are numbered as they are produced (`%1`, `%2`, ...) and control-flow calls adjust the
 * nesting depth, so the rendered trace reads like a structured listing of what the lowering
 * engine asked for.
 */

use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use anyhow::Result;
use colored::Colorize;
use lanir_core::{RegisterDecl, ScalarType, SystemValue, VarId, Variable, VoteOp};
use lanir_lower::{
    AtomicKind, Backend, BinaryOp, CompareFunc, ConvertOp, ImageParams, SampleParams,
    SizeQueryParams, UnaryOp, VarAccess, VertexIndex,
};

use crate::config::TraceConfig;

pub type EmitResult = Result<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceValue(u32);

impl fmt::Display for TraceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Value,
    Memory,
    Resource,
    ControlFlow,
    Misc,
}

impl EventKind {
    pub fn tag(self) -> &'static str {
        match self {
            EventKind::Value => "val",
            EventKind::Memory => "mem",
            EventKind::Resource => "res",
            EventKind::ControlFlow => "cf",
            EventKind::Misc => "misc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub depth: usize,
    pub kind: EventKind,
    pub op: &'static str,
    pub text: String,
}

pub struct TraceBackend {
    config: TraceConfig,
    next_value: u32,
    next_register: u32,
    depth: usize,
    events: Vec<TraceEvent>,
    constants: HashMap<TraceValue, u64>,
}

fn list(values: &[TraceValue]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn optional(value: Option<TraceValue>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

fn vertex(index: &Option<VertexIndex<TraceValue>>) -> String {
    match index {
        None => String::new(),
        Some(VertexIndex::Const(n)) => format!(" vertex={}", n),
        Some(VertexIndex::Dynamic(v)) => format!(" vertex={}", v),
    }
}

impl TraceBackend {
    pub fn new() -> Self {
        Self::with_config(TraceConfig::default())
    }

    pub fn with_config(config: TraceConfig) -> Self {
        Self {
            config,
            next_value: 0,
            next_register: 0,
            depth: 0,
            events: Vec::new(),
            constants: HashMap::new(),
        }
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn ops(&self) -> Vec<&'static str> {
        self.events.iter().map(|event| event.op).collect()
    }

    pub fn count(&self, op: &str) -> usize {
        self.events.iter().filter(|event| event.op == op).count()
    }

    /// Bits of a value produced by `const_uint`.
    pub fn constant(&self, value: TraceValue) -> Option<u64> {
        self.constants.get(&value).copied()
    }

    fn fresh(&mut self) -> TraceValue {
        self.next_value += 1;
        TraceValue(self.next_value)
    }

    fn fresh_vec(&mut self, count: usize) -> Vec<TraceValue> {
        (0..count).map(|_| self.fresh()).collect()
    }

    fn push(&mut self, kind: EventKind, op: &'static str, text: String) {
        self.events.push(TraceEvent {
            depth: self.depth,
            kind,
            op,
            text,
        });
    }

    fn produce(&mut self, kind: EventKind, op: &'static str, text: String) -> TraceValue {
        let value = self.fresh();
        self.push(kind, op, format!("{} = {}", value, text));
        value
    }

    fn produce_vec(
        &mut self,
        kind: EventKind,
        op: &'static str,
        count: usize,
        text: String,
    ) -> Vec<TraceValue> {
        let values = self.fresh_vec(count);
        self.push(kind, op, format!("{} = {}", list(&values), text));
        values
    }

    fn close_scope(&mut self, kind: EventKind, op: &'static str, text: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.push(kind, op, text.to_string());
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> EmitResult {
        let unit = self.config.indent_style.unit();
        for event in &self.events {
            let mut indent = unit.repeat(event.depth);
            if self.config.tag_kinds {
                indent = format!("[{}] {}", event.kind.tag(), indent);
            }
            if self.config.use_colors {
                let text = match event.kind {
                    EventKind::ControlFlow => event.text.cyan().to_string(),
                    EventKind::Memory => event.text.yellow().to_string(),
                    EventKind::Resource => event.text.magenta().to_string(),
                    EventKind::Misc => event.text.bright_red().to_string(),
                    EventKind::Value => event.text.clone(),
                };
                writeln!(writer, "{}{}", indent, text)?;
            } else {
                writeln!(writer, "{}{}", indent, event.text)?;
            }
        }
        Ok(())
    }

    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl Default for TraceBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for TraceBackend {
    type Value = TraceValue;
    type Register = u32;

    fn const_uint(&mut self, ty: ScalarType, bits: u64) -> TraceValue {
        let value = self.produce(EventKind::Value, "const", format!("const.{} {:#x}", ty, bits));
        self.constants.insert(value, bits);
        value
    }

    fn undef(&mut self, ty: ScalarType) -> TraceValue {
        self.produce(EventKind::Value, "undef", format!("undef.{}", ty))
    }

    fn unary(&mut self, op: UnaryOp, ty: ScalarType, a: TraceValue) -> TraceValue {
        self.produce(EventKind::Value, "unary", format!("{:?}.{} {}", op, ty, a))
    }

    fn binary(&mut self, op: BinaryOp, ty: ScalarType, a: TraceValue, b: TraceValue) -> TraceValue {
        self.produce(
            EventKind::Value,
            "binary",
            format!("{:?}.{} {}, {}", op, ty, a, b),
        )
    }

    fn fma(&mut self, ty: ScalarType, a: TraceValue, b: TraceValue, c: TraceValue) -> TraceValue {
        self.produce(
            EventKind::Value,
            "fma",
            format!("fma.{} {}, {}, {}", ty, a, b, c),
        )
    }

    fn compare(
        &mut self,
        func: CompareFunc,
        ordered: bool,
        ty: ScalarType,
        a: TraceValue,
        b: TraceValue,
    ) -> TraceValue {
        let order = if ordered { "o" } else { "u" };
        self.produce(
            EventKind::Value,
            "compare",
            format!("cmp.{:?}.{}.{} {}, {}", func, order, ty, a, b),
        )
    }

    fn select(
        &mut self,
        ty: ScalarType,
        mask: TraceValue,
        a: TraceValue,
        b: TraceValue,
    ) -> TraceValue {
        self.produce(
            EventKind::Value,
            "select",
            format!("select.{} {}, {}, {}", ty, mask, a, b),
        )
    }

    fn bitcast(&mut self, value: TraceValue, to: ScalarType) -> TraceValue {
        self.produce(EventKind::Value, "bitcast", format!("bitcast.{} {}", to, value))
    }

    fn convert(&mut self, op: ConvertOp, value: TraceValue, to: ScalarType) -> TraceValue {
        self.produce(
            EventKind::Value,
            "convert",
            format!("{:?}.{} {}", op, to, value),
        )
    }

    fn extract_lane(&mut self, value: TraceValue, lane: u32) -> TraceValue {
        self.produce(
            EventKind::Value,
            "extract_lane",
            format!("extract_lane {}[{}]", value, lane),
        )
    }

    fn declare_output(&mut self, id: VarId, var: &Variable) {
        self.push(
            EventKind::Memory,
            "declare_output",
            format!("output {} '{}' location={}", id, var.name, var.location),
        );
    }

    fn load_var(
        &mut self,
        access: &VarAccess<'_, TraceValue>,
        num_components: u8,
        ty: ScalarType,
    ) -> Vec<TraceValue> {
        let text = format!(
            "load_var.{} {}+{} indirect={}{}",
            ty,
            access.var.name,
            access.const_offset,
            optional(access.indirect_offset),
            vertex(&access.vertex_index)
        );
        self.produce_vec(EventKind::Memory, "load_var", num_components as usize, text)
    }

    fn store_var(
        &mut self,
        access: &VarAccess<'_, TraceValue>,
        write_mask: u16,
        ty: ScalarType,
        values: &[TraceValue],
    ) {
        self.push(
            EventKind::Memory,
            "store_var",
            format!(
                "store_var.{} {}+{} indirect={}{} mask={:#x} [{}]",
                ty,
                access.var.name,
                access.const_offset,
                optional(access.indirect_offset),
                vertex(&access.vertex_index),
                write_mask,
                list(values)
            ),
        );
    }

    fn variable_address(&mut self, id: VarId, var: &Variable) -> TraceValue {
        self.produce(
            EventKind::Memory,
            "variable_address",
            format!("address_of {} '{}'", id, var.name),
        )
    }

    fn alloc_register(&mut self, decl: &RegisterDecl) -> u32 {
        let reg = self.next_register;
        self.next_register += 1;
        self.push(
            EventKind::Misc,
            "alloc_register",
            format!(
                "reg{} = alloc {}x{} elems={}",
                reg, decl.num_components, decl.bit_size, decl.num_array_elems
            ),
        );
        reg
    }

    fn load_register(
        &mut self,
        reg: &u32,
        decl: &RegisterDecl,
        indirect: Option<TraceValue>,
    ) -> Vec<TraceValue> {
        let text = format!("load reg{} indirect={}", reg, optional(indirect));
        self.produce_vec(
            EventKind::Memory,
            "load_register",
            decl.num_components as usize,
            text,
        )
    }

    fn store_register(
        &mut self,
        reg: &u32,
        _decl: &RegisterDecl,
        indirect: Option<TraceValue>,
        write_mask: u16,
        values: &[TraceValue],
    ) {
        self.push(
            EventKind::Memory,
            "store_register",
            format!(
                "store reg{} indirect={} mask={:#x} [{}]",
                reg,
                optional(indirect),
                write_mask,
                list(values)
            ),
        );
    }

    fn release_register(&mut self, reg: u32) {
        self.push(EventKind::Misc, "release_register", format!("release reg{}", reg));
    }

    fn load_ubo(
        &mut self,
        num_components: u8,
        ty: ScalarType,
        offset_is_uniform: bool,
        index: TraceValue,
        offset: TraceValue,
    ) -> Vec<TraceValue> {
        let text = format!(
            "load_ubo.{} ubo[{}]+{} uniform={}",
            ty, index, offset, offset_is_uniform
        );
        self.produce_vec(EventKind::Memory, "load_ubo", num_components as usize, text)
    }

    fn load_mem(
        &mut self,
        num_components: u8,
        ty: ScalarType,
        index: Option<TraceValue>,
        offset: TraceValue,
    ) -> Vec<TraceValue> {
        let text = match index {
            Some(index) => format!("load_ssbo.{} ssbo[{}]+{}", ty, index, offset),
            None => format!("load_shared.{} +{}", ty, offset),
        };
        self.produce_vec(EventKind::Memory, "load_mem", num_components as usize, text)
    }

    fn store_mem(
        &mut self,
        write_mask: u16,
        ty: ScalarType,
        index: Option<TraceValue>,
        offset: TraceValue,
        values: &[TraceValue],
    ) {
        let target = match index {
            Some(index) => format!("store_ssbo.{} ssbo[{}]", ty, index),
            None => format!("store_shared.{}", ty),
        };
        self.push(
            EventKind::Memory,
            "store_mem",
            format!(
                "{}+{} mask={:#x} [{}]",
                target,
                offset,
                write_mask,
                list(values)
            ),
        );
    }

    fn atomic_mem(
        &mut self,
        op: AtomicKind,
        ty: ScalarType,
        index: Option<TraceValue>,
        offset: TraceValue,
        value: TraceValue,
        compare: Option<TraceValue>,
    ) -> TraceValue {
        self.produce(
            EventKind::Memory,
            "atomic_mem",
            format!(
                "atomic.{:?}.{} {}+{} {} cmp={}",
                op,
                ty,
                optional(index),
                offset,
                value,
                optional(compare)
            ),
        )
    }

    fn buffer_size(&mut self, index: TraceValue) -> TraceValue {
        self.produce(
            EventKind::Resource,
            "buffer_size",
            format!("buffer_size ssbo[{}]", index),
        )
    }

    fn load_kernel_arg(
        &mut self,
        num_components: u8,
        ty: ScalarType,
        offset_bits: u32,
        offset_is_uniform: bool,
        offset: TraceValue,
    ) -> Vec<TraceValue> {
        let text = format!(
            "load_kernel_arg.{} +{} offset_bits={} uniform={}",
            ty, offset, offset_bits, offset_is_uniform
        );
        self.produce_vec(
            EventKind::Memory,
            "load_kernel_arg",
            num_components as usize,
            text,
        )
    }

    fn load_global(
        &mut self,
        num_components: u8,
        ty: ScalarType,
        address_bits: u32,
        address: TraceValue,
    ) -> Vec<TraceValue> {
        let text = format!("load_global.{} [{}] a{}", ty, address, address_bits);
        self.produce_vec(
            EventKind::Memory,
            "load_global",
            num_components as usize,
            text,
        )
    }

    fn store_global(
        &mut self,
        write_mask: u16,
        ty: ScalarType,
        address_bits: u32,
        address: TraceValue,
        values: &[TraceValue],
    ) {
        self.push(
            EventKind::Memory,
            "store_global",
            format!(
                "store_global.{} [{}] a{} mask={:#x} [{}]",
                ty,
                address,
                address_bits,
                write_mask,
                list(values)
            ),
        );
    }

    fn atomic_global(
        &mut self,
        op: AtomicKind,
        ty: ScalarType,
        address_bits: u32,
        address: TraceValue,
        value: TraceValue,
        compare: Option<TraceValue>,
    ) -> TraceValue {
        self.produce(
            EventKind::Memory,
            "atomic_global",
            format!(
                "atomic_global.{:?}.{} [{}] a{} {} cmp={}",
                op,
                ty,
                address,
                address_bits,
                value,
                optional(compare)
            ),
        )
    }

    fn image_op(&mut self, params: &ImageParams<TraceValue>) -> Vec<TraceValue> {
        let text = format!(
            "image.{:?} {:?} image[{}] coords=[{}] data=[{}] cmp=[{}]",
            params.op,
            params.target,
            params.image_index,
            list(&params.coords),
            list(&params.data),
            list(&params.compare)
        );
        self.produce_vec(EventKind::Resource, "image_op", 4, text)
    }

    fn image_size(&mut self, params: &SizeQueryParams<TraceValue>) -> Vec<TraceValue> {
        let text = format!(
            "image_size {:?} image[{}]",
            params.target, params.texture_unit
        );
        self.produce_vec(EventKind::Resource, "image_size", 4, text)
    }

    fn sample(&mut self, params: &SampleParams<TraceValue>) -> Vec<TraceValue> {
        let offsets: Vec<TraceValue> = params.offsets.iter().flatten().copied().collect();
        let text = format!(
            "sample {:?} tex[{}] samp[{}] key={:#x} coords=[{}] offsets=[{}] lod={}",
            params.target,
            params.texture_index,
            params.sampler_index,
            params.key.bits(),
            list(&params.coords),
            list(&offsets),
            optional(params.lod)
        );
        self.produce_vec(EventKind::Resource, "sample", 4, text)
    }

    fn texture_size(&mut self, params: &SizeQueryParams<TraceValue>) -> Vec<TraceValue> {
        let text = format!(
            "texture_size {:?} tex[{}] lod={} view_info={}",
            params.target,
            params.texture_unit,
            optional(params.explicit_lod),
            params.is_sviewinfo
        );
        self.produce_vec(EventKind::Resource, "texture_size", 4, text)
    }

    fn system_value(
        &mut self,
        value: SystemValue,
        num_components: u8,
        ty: ScalarType,
    ) -> Vec<TraceValue> {
        let text = format!("system_value.{} {:?}", ty, value);
        self.produce_vec(
            EventKind::Value,
            "system_value",
            num_components as usize,
            text,
        )
    }

    fn discard(&mut self, condition: Option<TraceValue>) {
        self.push(
            EventKind::Misc,
            "discard",
            format!("discard if={}", optional(condition)),
        );
    }

    fn emit_vertex(&mut self, stream: u32) {
        self.push(EventKind::Misc, "emit_vertex", format!("emit_vertex {}", stream));
    }

    fn end_primitive(&mut self, stream: u32) {
        self.push(
            EventKind::Misc,
            "end_primitive",
            format!("end_primitive {}", stream),
        );
    }

    fn barrier(&mut self) {
        self.push(EventKind::Misc, "barrier", "barrier".into());
    }

    fn vote(&mut self, op: VoteOp, value: TraceValue) -> TraceValue {
        self.produce(EventKind::Value, "vote", format!("vote.{:?} {}", op, value))
    }

    fn begin_if(&mut self, condition: TraceValue) {
        self.push(EventKind::ControlFlow, "begin_if", format!("if {} {{", condition));
        self.depth += 1;
    }

    fn begin_else(&mut self) {
        self.close_scope(EventKind::ControlFlow, "begin_else", "} else {");
        self.depth += 1;
    }

    fn end_if(&mut self) {
        self.close_scope(EventKind::ControlFlow, "end_if", "}");
    }

    fn begin_loop(&mut self) {
        self.push(EventKind::ControlFlow, "begin_loop", "loop {".into());
        self.depth += 1;
    }

    fn end_loop(&mut self) {
        self.close_scope(EventKind::ControlFlow, "end_loop", "}");
    }

    fn emit_break(&mut self) {
        self.push(EventKind::ControlFlow, "break", "break".into());
    }

    fn emit_continue(&mut self) {
        self.push(EventKind::ControlFlow, "continue", "continue".into());
    }
}
