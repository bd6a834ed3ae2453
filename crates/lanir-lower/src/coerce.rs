/*! Reinterpretation and width changes between the types an opcode expects. */

use lanir_core::{AluType, BaseKind, BitSize, ScalarType};
use std::cmp::Ordering;

use crate::backend::{Backend, ConvertOp};
use crate::context::LowerContext;
use crate::error::{LowerError, Result};

impl<'a, B: Backend> LowerContext<'a, B> {
    /// Bitcast to `(kind, bits)`. Fails for machine types that do not exist.
    pub(crate) fn reinterpret(
        &mut self,
        value: B::Value,
        kind: BaseKind,
        bits: BitSize,
    ) -> Result<B::Value> {
        let ty = ScalarType::new(kind, bits)?;
        Ok(self.backend.bitcast(value, ty))
    }

    /// Reinterprets a value of `value_bits` as the opcode-table type `ty`.
    pub(crate) fn cast_alu(
        &mut self,
        value: B::Value,
        ty: AluType,
        value_bits: BitSize,
    ) -> Result<B::Value> {
        if let Some(bits) = ty.bits {
            if bits != value_bits {
                return Err(LowerError::Malformed(format!(
                    "{}-bit value used where a {}-bit operand is required",
                    value_bits, bits
                )));
            }
        }
        self.reinterpret(value, ty.base, ty.resolve_bits(value_bits))
    }

    /// Sign/zero extends or truncates an integer. Equal widths pass through untouched.
    pub(crate) fn resize_int(
        &mut self,
        value: B::Value,
        from: BitSize,
        to: BitSize,
        signed: bool,
    ) -> B::Value {
        let ty = if signed {
            ScalarType::int(to)
        } else {
            ScalarType::uint(to)
        };
        match from.cmp(&to) {
            Ordering::Equal => value,
            Ordering::Less => {
                let op = if signed {
                    ConvertOp::SignExtend
                } else {
                    ConvertOp::ZeroExtend
                };
                self.backend.convert(op, value, ty)
            }
            Ordering::Greater => self.backend.convert(ConvertOp::Trunc, value, ty),
        }
    }

    /// Normalizes a comparison mask of `bits` to the 32-bit boolean representation.
    pub(crate) fn mask_to_bool32(&mut self, mask: B::Value, bits: BitSize) -> B::Value {
        self.resize_int(mask, bits, BitSize::B32, true)
    }

    /// Integer constant broadcast to all lanes.
    pub(crate) fn const_int(&mut self, ty: ScalarType, bits: u64) -> B::Value {
        self.backend.const_uint(ty, bits & ty.bits.mask())
    }

    pub(crate) fn const_u32(&mut self, value: u32) -> B::Value {
        self.backend.const_uint(ScalarType::U32, value as u64)
    }

    /// Reinterprets every component as `kind` at `bits`.
    pub(crate) fn reinterpret_all(
        &mut self,
        values: Vec<B::Value>,
        kind: BaseKind,
        bits: BitSize,
    ) -> Result<Vec<B::Value>> {
        values
            .into_iter()
            .map(|value| self.reinterpret(value, kind, bits))
            .collect()
    }
}
