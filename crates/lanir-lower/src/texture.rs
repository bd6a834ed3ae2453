/*! Texture instruction lowering onto the sampling and size-query interfaces. */

use lanir_core::{BaseKind, SamplerDim, ScalarType, ShaderStage, Src, TexInstr, TexOp, TexSrc};

use crate::backend::{
    Backend, BinaryOp, Derivatives, LodControl, LodProperty, SampleKey, SampleOp, SampleParams,
    SizeQueryParams, TextureTarget, UnaryOp,
};
use crate::context::LowerContext;
use crate::error::{LowerError, Result};

/// Sources of one texture instruction, sorted by role.
#[derive(Default)]
struct TexSources<'i> {
    coord: Option<&'i Src>,
    projector: Option<&'i Src>,
    comparator: Option<&'i Src>,
    bias: Option<&'i Src>,
    lod: Option<&'i Src>,
    ddx: Option<&'i Src>,
    ddy: Option<&'i Src>,
    offset: Option<&'i Src>,
    texture_binding: Option<u32>,
    sampler_binding: Option<u32>,
    sampler_handle: Option<&'i Src>,
}

impl<'a, B: Backend> LowerContext<'a, B> {
    fn classify_tex_srcs<'i>(&self, instr: &'i TexInstr) -> Result<TexSources<'i>> {
        let mut sources = TexSources::default();
        for src in &instr.srcs {
            match src {
                TexSrc::Coord(src) => sources.coord = Some(src),
                TexSrc::Projector(src) => sources.projector = Some(src),
                TexSrc::Comparator(src) => sources.comparator = Some(src),
                TexSrc::Bias(src) => sources.bias = Some(src),
                TexSrc::Lod(src) => sources.lod = Some(src),
                TexSrc::Ddx(src) => sources.ddx = Some(src),
                TexSrc::Ddy(src) => sources.ddy = Some(src),
                TexSrc::Offset(src) => sources.offset = Some(src),
                TexSrc::MsIndex(_) => {}
                TexSrc::TextureDeref(var) => {
                    sources.texture_binding = Some(self.variable(*var)?.binding)
                }
                TexSrc::SamplerDeref(var) => {
                    sources.sampler_binding = Some(self.variable(*var)?.binding)
                }
                TexSrc::SamplerHandle(src) => sources.sampler_handle = Some(src),
            }
        }
        Ok(sources)
    }

    /// Reads up to `count` components of `src` reinterpreted as 32-bit `kind`.
    fn tex_components(
        &mut self,
        src: &Src,
        kind: BaseKind,
        count: usize,
    ) -> Result<Vec<B::Value>> {
        let (_, bits) = self.src_shape(src)?;
        let mut values = self.read_src(src)?;
        values.truncate(count);
        self.reinterpret_all(values, kind, bits)
    }

    fn lod_property(&self, lod: Option<&Src>, explicit_derivatives: bool) -> LodProperty {
        let uniform =
            !explicit_derivatives && lod.map(|lod| self.is_uniform(lod)).unwrap_or(false);
        if uniform {
            LodProperty::Scalar
        } else if self.shader.stage == ShaderStage::Fragment && !self.config.no_quad_lod {
            LodProperty::PerQuad
        } else {
            LodProperty::PerElement
        }
    }

    fn texture_query(&mut self, instr: &TexInstr, sources: &TexSources<'_>) -> Result<()> {
        let target = TextureTarget::from_dim(instr.sampler_dim, instr.is_array);
        let texture_unit = sources.texture_binding.unwrap_or(instr.texture_index);
        let params = if instr.op == TexOp::QueryLevels {
            let zero = self.backend.const_uint(ScalarType::I32, 0);
            SizeQueryParams {
                target,
                texture_unit,
                explicit_lod: Some(zero),
                is_sviewinfo: true,
            }
        } else {
            let explicit_lod = match sources.lod {
                Some(lod) => {
                    let (_, bits) = self.src_shape(lod)?;
                    let lod = self.read_scalar(lod)?;
                    Some(self.reinterpret(lod, BaseKind::Int, bits)?)
                }
                None => None,
            };
            SizeQueryParams {
                target,
                texture_unit,
                explicit_lod,
                is_sviewinfo: false,
            }
        };

        let mut values = self.backend.texture_size(&params);
        if instr.op == TexOp::QueryLevels {
            if values.len() < 4 {
                return Err(LowerError::Malformed(
                    "view info query returned no level count".into(),
                ));
            }
            values.drain(..3);
        }
        self.bind_result(&instr.dest, values, "texture size query")
    }

    pub(crate) fn visit_tex(&mut self, instr: &TexInstr) -> Result<()> {
        tracing::trace!(op = ?instr.op, dim = ?instr.sampler_dim, "lowering texture instruction");
        let sources = self.classify_tex_srcs(instr)?;
        if matches!(instr.op, TexOp::Txs | TexOp::QueryLevels) {
            return self.texture_query(instr, &sources);
        }

        let is_fetch = matches!(instr.op, TexOp::Txf | TexOp::TxfMs);
        let mut key = match instr.op {
            TexOp::Txf | TexOp::TxfMs => SampleKey::new(SampleOp::Fetch),
            TexOp::Tg4 => SampleKey::new(SampleOp::Gather).with_gather_component(instr.component),
            TexOp::Lod => SampleKey::new(SampleOp::Lodq),
            _ => SampleKey::new(SampleOp::Texture),
        };
        let coord_kind = if is_fetch { BaseKind::Int } else { BaseKind::Float };
        let coord_ty = if is_fetch { ScalarType::I32 } else { ScalarType::F32 };

        let mut coords = match sources.coord {
            Some(coord) => self.tex_components(coord, coord_kind, 4)?,
            None => Vec::new(),
        };
        while coords.len() < 5 {
            coords.push(self.backend.undef(coord_ty));
        }
        if instr.sampler_dim == SamplerDim::D1 && instr.is_array {
            coords[2] = coords[1].clone();
            coords[1] = self.backend.undef(coord_ty);
        }

        let mut comparator = match sources.comparator {
            Some(comparator) => {
                key = key.with_shadow();
                let (_, bits) = self.src_shape(comparator)?;
                let value = self.read_scalar(comparator)?;
                Some(self.reinterpret(value, BaseKind::Float, bits)?)
            }
            None => None,
        };

        if let Some(projector) = sources.projector {
            let (_, bits) = self.src_shape(projector)?;
            let projector = self.read_scalar(projector)?;
            let projector = self.reinterpret(projector, BaseKind::Float, bits)?;
            let inverse = self.backend.unary(UnaryOp::Rcp, ScalarType::F32, projector);
            let projected = (instr.coord_components as usize).min(4);
            for coord in coords.iter_mut().take(projected) {
                *coord = self.backend.binary(
                    BinaryOp::Mul,
                    ScalarType::F32,
                    coord.clone(),
                    inverse.clone(),
                );
            }
            if let Some(value) = comparator.take() {
                comparator = Some(self.backend.binary(
                    BinaryOp::Mul,
                    ScalarType::F32,
                    value,
                    inverse,
                ));
            }
        }
        if let Some(comparator) = comparator {
            coords[4] = comparator;
        }

        let spatial = (instr.coord_components as usize)
            .saturating_sub(instr.is_array as usize)
            .min(3);
        let mut lod = None;
        let mut derivatives = None;
        if let Some(bias) = sources.bias {
            let value = self.read_scalar(bias)?;
            let (_, bits) = self.src_shape(bias)?;
            lod = Some(self.reinterpret(value, BaseKind::Float, bits)?);
            key = key
                .with_lod_control(LodControl::Bias)
                .with_lod_property(self.lod_property(Some(bias), false));
        } else if let Some(explicit) = sources.lod {
            let value = self.read_scalar(explicit)?;
            let (_, bits) = self.src_shape(explicit)?;
            let kind = if is_fetch { BaseKind::Int } else { BaseKind::Float };
            lod = Some(self.reinterpret(value, kind, bits)?);
            key = key
                .with_lod_control(LodControl::Explicit)
                .with_lod_property(self.lod_property(Some(explicit), false));
        } else if instr.op == TexOp::Txd {
            let (ddx, ddy) = match (sources.ddx, sources.ddy) {
                (Some(ddx), Some(ddy)) => (ddx, ddy),
                _ => {
                    return Err(LowerError::Malformed(
                        "txd without both derivatives".into(),
                    ))
                }
            };
            derivatives = Some(Derivatives {
                ddx: self.tex_components(ddx, BaseKind::Float, spatial)?,
                ddy: self.tex_components(ddy, BaseKind::Float, spatial)?,
            });
            key = key
                .with_lod_control(LodControl::Derivatives)
                .with_lod_property(self.lod_property(None, true));
        }

        let mut offsets: [Option<B::Value>; 3] = [None, None, None];
        if let Some(offset) = sources.offset {
            key = key.with_offsets();
            let values = self.tex_components(offset, BaseKind::Int, spatial)?;
            for (slot, value) in offsets.iter_mut().zip(values) {
                *slot = Some(value);
            }
        }

        let sampler_handle = match sources.sampler_handle {
            Some(handle) => Some(self.read_scalar(handle)?),
            None => None,
        };

        let texture_index = sources.texture_binding.unwrap_or(instr.texture_index);
        let params = SampleParams {
            target: TextureTarget::from_dim(instr.sampler_dim, instr.is_array),
            texture_index,
            sampler_index: sources
                .sampler_binding
                .or(sources.texture_binding)
                .unwrap_or(instr.sampler_index),
            key,
            coords,
            offsets,
            lod,
            derivatives,
            sampler_handle,
        };
        let values = self.backend.sample(&params);
        self.bind_result(&instr.dest, values, "texture sample")
    }
}
