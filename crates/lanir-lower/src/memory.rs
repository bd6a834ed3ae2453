/*! Intrinsic lowering: variables, buffers, images, shared and global memory, system values. */

use lanir_core::{
    AtomicOp, BaseKind, BitSize, DerefChain, DerefInstr, Dest, Intrinsic, ScalarType,
    ShaderStage, Src, VarId, VariableMode,
};

use crate::backend::{
    AtomicKind, Backend, ImageOp, ImageParams, SizeQueryParams, TextureTarget, VarAccess,
};
use crate::context::LowerContext;
use crate::deref::VertexMode;
use crate::error::{LowerError, Result};
use crate::value_table::full_mask;

impl<'a, B: Backend> LowerContext<'a, B> {
    /// Binds backend results to an intrinsic's destination, keeping as many
    /// leading components as the destination declares.
    pub(crate) fn bind_result(
        &mut self,
        dest: &Dest,
        mut values: Vec<B::Value>,
        what: &str,
    ) -> Result<()> {
        let (num_components, _) = self.dest_shape(dest)?;
        if values.len() < num_components as usize {
            return Err(LowerError::Malformed(format!(
                "{} produced {} components for a {}-component destination",
                what,
                values.len(),
                num_components
            )));
        }
        values.truncate(num_components as usize);
        self.assign_dest(dest, 0, values)
    }

    fn dest_uint(&self, dest: &Dest) -> Result<(u8, ScalarType)> {
        let (num_components, bits) = self.dest_shape(dest)?;
        Ok((num_components, ScalarType::uint(bits)))
    }

    fn src_uint(&mut self, src: &Src) -> Result<(Vec<B::Value>, ScalarType)> {
        let (_, bits) = self.src_shape(src)?;
        Ok((self.read_src(src)?, ScalarType::uint(bits)))
    }

    fn optional_scalar(&mut self, src: Option<&Src>) -> Result<Option<B::Value>> {
        src.map(|src| self.read_scalar(src)).transpose()
    }

    fn atomic_kind(op: AtomicOp, compare: Option<&Src>) -> Result<AtomicKind> {
        let kind = AtomicKind::from(op);
        if kind == AtomicKind::CompareSwap && compare.is_none() {
            return Err(LowerError::Malformed(
                "compare-and-swap without a comparison value".into(),
            ));
        }
        Ok(kind)
    }

    fn vertex_mode(&self, mode: VariableMode, patch: bool, store: bool) -> VertexMode {
        let stage = self.shader.stage;
        match (stage, mode) {
            (ShaderStage::Geometry, VariableMode::ShaderIn) if !store => VertexMode::Const,
            (ShaderStage::TessCtrl, VariableMode::ShaderIn) if !store => VertexMode::Dynamic,
            (ShaderStage::TessCtrl, VariableMode::ShaderOut) if !patch => VertexMode::Dynamic,
            (ShaderStage::TessEval, VariableMode::ShaderIn) if !patch && !store => {
                VertexMode::Dynamic
            }
            _ => VertexMode::None,
        }
    }

    fn var_access(&mut self, deref: &DerefChain, store: bool) -> Result<VarAccess<'a, B::Value>> {
        let var = self.variable(deref.var)?;
        let vs_in = self.shader.stage == ShaderStage::Vertex && var.mode == VariableMode::ShaderIn;
        let vertex = self.vertex_mode(var.mode, var.patch, store);
        let offset = self.resolve_deref(deref, vs_in, vertex)?;
        Ok(VarAccess {
            id: deref.var,
            var,
            mode: var.mode,
            const_offset: offset.const_offset,
            indirect_offset: offset.indirect,
            vertex_index: offset.vertex_index,
        })
    }

    fn load_deref(&mut self, dest: &Dest, deref: &DerefChain) -> Result<()> {
        let access = self.var_access(deref, false)?;
        let (num_components, ty) = self.dest_uint(dest)?;
        let values = self.backend.load_var(&access, num_components, ty);
        self.bind_result(dest, values, "variable load")
    }

    fn store_deref(&mut self, deref: &DerefChain, value: &Src, write_mask: u16) -> Result<()> {
        let access = self.var_access(deref, true)?;
        let (values, ty) = self.src_uint(value)?;
        let write_mask = effective_mask(write_mask, values.len());
        self.backend.store_var(&access, write_mask, ty, &values);
        Ok(())
    }

    fn image_params(
        &mut self,
        image: VarId,
        coord: &Src,
        op: ImageOp,
    ) -> Result<ImageParams<B::Value>> {
        let var = self.variable(image)?;
        let (dim, arrayed) = var.ty.sampler_dim().ok_or_else(|| LowerError::InvalidDeref {
            var: var.name.clone(),
            reason: "not an image".into(),
        })?;
        let target = TextureTarget::from_dim(dim, arrayed);

        let mut coords = self.read_src(coord)?;
        coords.truncate(4);
        while coords.len() < 4 {
            coords.push(self.backend.undef(ScalarType::I32));
        }
        if target == TextureTarget::Texture1DArray {
            coords[2] = coords[1].clone();
        }

        Ok(ImageParams {
            target,
            image_index: var.binding,
            op,
            coords,
            data: Vec::new(),
            compare: Vec::new(),
        })
    }

    fn image_size_params(&self, image: VarId) -> Result<SizeQueryParams<B::Value>> {
        let var = self.variable(image)?;
        let (dim, arrayed) = var.ty.sampler_dim().ok_or_else(|| LowerError::InvalidDeref {
            var: var.name.clone(),
            reason: "not an image".into(),
        })?;
        Ok(SizeQueryParams {
            target: TextureTarget::from_dim(dim, arrayed),
            texture_unit: var.binding,
            explicit_lod: None,
            is_sviewinfo: false,
        })
    }

    /// Shared and global variables evaluate to their base address; other derefs
    /// are folded into the load or store that consumes them.
    pub(crate) fn visit_deref(&mut self, deref: &DerefInstr) -> Result<()> {
        let var = self.variable(deref.var)?;
        if matches!(var.mode, VariableMode::Shared | VariableMode::Global) {
            let address = self.backend.variable_address(deref.var, var);
            self.table.write_ssa(deref.def.id, vec![address])?;
        }
        Ok(())
    }

    pub(crate) fn visit_intrinsic(&mut self, intrinsic: &Intrinsic) -> Result<()> {
        tracing::trace!(intrinsic = intrinsic.name(), "lowering intrinsic");
        match intrinsic {
            Intrinsic::LoadDeref { dest, deref } => self.load_deref(dest, deref),
            Intrinsic::StoreDeref {
                deref,
                value,
                write_mask,
            } => self.store_deref(deref, value, *write_mask),

            Intrinsic::LoadUbo {
                dest,
                index,
                offset,
            } => {
                let (num_components, ty) = self.dest_uint(dest)?;
                let offset_is_uniform = self.is_uniform(offset);
                let index = self.read_scalar(index)?;
                let index = self.backend.extract_lane(index, 0);
                let offset = self.read_scalar(offset)?;
                let values =
                    self.backend
                        .load_ubo(num_components, ty, offset_is_uniform, index, offset);
                self.bind_result(dest, values, "ubo load")
            }
            Intrinsic::LoadSsbo {
                dest,
                index,
                offset,
            } => {
                let (num_components, ty) = self.dest_uint(dest)?;
                let index = self.read_scalar(index)?;
                let offset = self.read_scalar(offset)?;
                let values = self
                    .backend
                    .load_mem(num_components, ty, Some(index), offset);
                self.bind_result(dest, values, "ssbo load")
            }
            Intrinsic::StoreSsbo {
                value,
                index,
                offset,
                write_mask,
            } => {
                let (values, ty) = self.src_uint(value)?;
                let index = self.read_scalar(index)?;
                let offset = self.read_scalar(offset)?;
                let write_mask = effective_mask(*write_mask, values.len());
                self.backend
                    .store_mem(write_mask, ty, Some(index), offset, &values);
                Ok(())
            }
            Intrinsic::SsboAtomic {
                dest,
                op,
                index,
                offset,
                value,
                compare,
            } => {
                let kind = Self::atomic_kind(*op, compare.as_ref())?;
                let (_, ty) = self.dest_uint(dest)?;
                let index = self.read_scalar(index)?;
                let offset = self.read_scalar(offset)?;
                let value = self.read_scalar(value)?;
                let compare = self.optional_scalar(compare.as_ref())?;
                let result = self
                    .backend
                    .atomic_mem(kind, ty, Some(index), offset, value, compare);
                self.assign_dest(dest, 0, vec![result])
            }
            Intrinsic::GetBufferSize { dest, index } => {
                let index = self.read_scalar(index)?;
                let size = self.backend.buffer_size(index);
                self.assign_dest(dest, 0, vec![size])
            }

            Intrinsic::ImageLoad { dest, image, coord } => {
                let params = self.image_params(*image, coord, ImageOp::Load)?;
                let values = self.backend.image_op(&params);
                self.bind_result(dest, values, "image load")
            }
            Intrinsic::ImageStore {
                image,
                coord,
                value,
            } => {
                let mut params = self.image_params(*image, coord, ImageOp::Store)?;
                let (_, bits) = self.src_shape(value)?;
                let values = self.read_src(value)?;
                params.data = self.reinterpret_all(values, BaseKind::Float, bits)?;
                self.backend.image_op(&params);
                Ok(())
            }
            Intrinsic::ImageAtomic {
                dest,
                op,
                image,
                coord,
                value,
                compare,
            } => {
                let kind = Self::atomic_kind(*op, compare.as_ref())?;
                let mut params = self.image_params(*image, coord, ImageOp::Atomic(kind))?;
                params.data = vec![self.read_scalar(value)?];
                if let Some(compare) = self.optional_scalar(compare.as_ref())? {
                    params.compare = vec![compare];
                }
                let values = self.backend.image_op(&params);
                self.bind_result(dest, values, "image atomic")
            }
            Intrinsic::ImageSize { dest, image } => {
                let params = self.image_size_params(*image)?;
                let values = self.backend.image_size(&params);
                self.bind_result(dest, values, "image size")
            }

            Intrinsic::LoadShared { dest, offset } => {
                let (num_components, ty) = self.dest_uint(dest)?;
                let offset = self.read_scalar(offset)?;
                let values = self.backend.load_mem(num_components, ty, None, offset);
                self.bind_result(dest, values, "shared load")
            }
            Intrinsic::StoreShared {
                value,
                offset,
                write_mask,
            } => {
                let (values, ty) = self.src_uint(value)?;
                let offset = self.read_scalar(offset)?;
                let write_mask = effective_mask(*write_mask, values.len());
                self.backend.store_mem(write_mask, ty, None, offset, &values);
                Ok(())
            }
            Intrinsic::SharedAtomic {
                dest,
                op,
                offset,
                value,
                compare,
            } => {
                let kind = Self::atomic_kind(*op, compare.as_ref())?;
                let (_, ty) = self.dest_uint(dest)?;
                let offset = self.read_scalar(offset)?;
                let value = self.read_scalar(value)?;
                let compare = self.optional_scalar(compare.as_ref())?;
                let result = self
                    .backend
                    .atomic_mem(kind, ty, None, offset, value, compare);
                self.assign_dest(dest, 0, vec![result])
            }

            Intrinsic::LoadGlobal { dest, address } => {
                let (num_components, ty) = self.dest_uint(dest)?;
                let (_, address_bits) = self.src_shape(address)?;
                let address = self.read_scalar(address)?;
                let values =
                    self.backend
                        .load_global(num_components, ty, address_bits.bits(), address);
                self.bind_result(dest, values, "global load")
            }
            Intrinsic::StoreGlobal {
                value,
                address,
                write_mask,
            } => {
                let (values, ty) = self.src_uint(value)?;
                let (_, address_bits) = self.src_shape(address)?;
                let address = self.read_scalar(address)?;
                let write_mask = effective_mask(*write_mask, values.len());
                self.backend
                    .store_global(write_mask, ty, address_bits.bits(), address, &values);
                Ok(())
            }
            Intrinsic::GlobalAtomic {
                dest,
                op,
                address,
                value,
                compare,
            } => {
                let kind = Self::atomic_kind(*op, compare.as_ref())?;
                let (_, ty) = self.dest_uint(dest)?;
                let (_, address_bits) = self.src_shape(address)?;
                let address = self.read_scalar(address)?;
                let value = self.read_scalar(value)?;
                let compare = self.optional_scalar(compare.as_ref())?;
                let result = self.backend.atomic_global(
                    kind,
                    ty,
                    address_bits.bits(),
                    address,
                    value,
                    compare,
                );
                self.assign_dest(dest, 0, vec![result])
            }

            Intrinsic::LoadKernelInput { dest, offset } => {
                let (num_components, ty) = self.dest_uint(dest)?;
                let offset_is_uniform = self.is_uniform(offset);
                let (_, offset_bits) = self.src_shape(offset)?;
                let offset = self.read_scalar(offset)?;
                let values = self.backend.load_kernel_arg(
                    num_components,
                    ty,
                    offset_bits.bits(),
                    offset_is_uniform,
                    offset,
                );
                self.bind_result(dest, values, "kernel input load")
            }
            Intrinsic::LoadSystemValue { dest, value } => {
                let (num_components, ty) = self.dest_uint(dest)?;
                let values = self.backend.system_value(*value, num_components, ty);
                self.bind_result(dest, values, "system value")
            }

            Intrinsic::Discard => {
                self.backend.discard(None);
                Ok(())
            }
            Intrinsic::DiscardIf { condition } => {
                let condition = self.read_scalar(condition)?;
                let condition = self.reinterpret(condition, BaseKind::Int, BitSize::B32)?;
                self.backend.discard(Some(condition));
                Ok(())
            }
            Intrinsic::EmitVertex { stream } => {
                self.backend.emit_vertex(*stream);
                Ok(())
            }
            Intrinsic::EndPrimitive { stream } => {
                self.backend.end_primitive(*stream);
                Ok(())
            }
            Intrinsic::ControlBarrier => {
                self.backend.barrier();
                Ok(())
            }
            Intrinsic::MemoryBarrier(kind) => {
                tracing::trace!(?kind, "memory barrier lowered to nothing");
                Ok(())
            }
            Intrinsic::Vote { dest, op, value } => {
                let (_, bits) = self.src_shape(value)?;
                let value = self.read_scalar(value)?;
                let value = self.reinterpret(value, BaseKind::Int, bits)?;
                let result = self.backend.vote(*op, value);
                self.assign_dest(dest, 0, vec![result])
            }
        }
    }
}

fn effective_mask(write_mask: u16, num_components: usize) -> u16 {
    let full = full_mask(num_components);
    if write_mask == 0 {
        full
    } else {
        write_mask & full
    }
}
