/*! Deref chain resolution into attribute-slot offsets. */

use lanir_core::{BaseKind, BitSize, DerefChain, DerefStep, ScalarType, Src};

use crate::backend::{Backend, BinaryOp, VertexIndex};
use crate::context::LowerContext;
use crate::error::{LowerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum VertexMode {
    None,
    /// Geometry inputs: the first array step is a constant vertex number.
    Const,
    /// Tessellation per-vertex varyings: the first array step is a lane value.
    Dynamic,
}

pub(crate) struct DerefOffset<V> {
    pub(crate) const_offset: u32,
    /// Includes `const_offset` when present.
    pub(crate) indirect: Option<V>,
    pub(crate) vertex_index: Option<VertexIndex<V>>,
}

impl<'a, B: Backend> LowerContext<'a, B> {
    fn index_u32(&mut self, index: &Src) -> Result<B::Value> {
        let (_, bits) = self.src_shape(index)?;
        let value = self.read_scalar(index)?;
        let value = self.reinterpret(value, BaseKind::Uint, bits)?;
        Ok(self.resize_int(value, bits, BitSize::B32, false))
    }

    /// Walks the access path accumulating a constant slot offset and, for
    /// non-constant array indices, a dynamic one scaled by the element's slot count.
    pub(crate) fn resolve_deref(
        &mut self,
        chain: &DerefChain,
        vs_in: bool,
        vertex: VertexMode,
    ) -> Result<DerefOffset<B::Value>> {
        let var = self.variable(chain.var)?;
        let invalid = |reason: &str| LowerError::InvalidDeref {
            var: var.name.clone(),
            reason: reason.to_string(),
        };

        let mut steps = chain.path.iter();
        let mut ty = var.ty.clone();

        let vertex_index = match vertex {
            VertexMode::None => None,
            mode => {
                let Some(DerefStep::Array(index)) = steps.next() else {
                    return Err(invalid("per-vertex access without a vertex index"));
                };
                ty = ty
                    .indexed_element()
                    .ok_or_else(|| invalid("per-vertex variable is not an array"))?;
                Some(if mode == VertexMode::Const {
                    let vertex = self
                        .constant_of(index)
                        .ok_or_else(|| invalid("vertex index must be a constant"))?;
                    VertexIndex::Const(vertex as u32)
                } else {
                    VertexIndex::Dynamic(self.index_u32(index)?)
                })
            }
        };

        if var.compact {
            let const_offset = match chain.path.last() {
                Some(DerefStep::Array(index)) => self
                    .constant_of(index)
                    .ok_or_else(|| invalid("compact arrays need a constant index"))?
                    as u32,
                _ => 0,
            };
            return Ok(DerefOffset {
                const_offset,
                indirect: None,
                vertex_index,
            });
        }

        let mut const_offset = 0u32;
        let mut indirect: Option<B::Value> = None;
        for step in steps {
            match step {
                DerefStep::Struct(field) => {
                    let fields = ty
                        .struct_fields()
                        .ok_or_else(|| invalid("field access on a non-struct"))?;
                    let field = *field as usize;
                    if field >= fields.len() {
                        return Err(invalid("field index out of range"));
                    }
                    const_offset += fields[..field]
                        .iter()
                        .map(|f| f.ty.attribute_slots(vs_in))
                        .sum::<u32>();
                    ty = fields[field].ty.clone();
                }
                DerefStep::Array(index) => {
                    let element = ty
                        .indexed_element()
                        .ok_or_else(|| invalid("array access on a non-array"))?;
                    let stride = element.attribute_slots(vs_in);
                    match self.constant_of(index) {
                        Some(value) => {
                            const_offset =
                                const_offset.wrapping_add((value as u32).wrapping_mul(stride));
                        }
                        None => {
                            let index = self.index_u32(index)?;
                            let stride = self.const_u32(stride);
                            let scaled =
                                self.backend
                                    .binary(BinaryOp::Mul, ScalarType::U32, stride, index);
                            indirect = Some(match indirect {
                                Some(offset) => self.backend.binary(
                                    BinaryOp::Add,
                                    ScalarType::U32,
                                    offset,
                                    scaled,
                                ),
                                None => scaled,
                            });
                        }
                    }
                    ty = element;
                }
            }
        }

        if const_offset != 0 {
            if let Some(offset) = indirect.take() {
                let constant = self.const_u32(const_offset);
                indirect = Some(
                    self.backend
                        .binary(BinaryOp::Add, ScalarType::U32, offset, constant),
                );
            }
        }
        Ok(DerefOffset {
            const_offset,
            indirect,
            vertex_index,
        })
    }
}
