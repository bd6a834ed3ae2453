/*! Arithmetic and logic lowering.
 *
 * Operands are swizzled and reinterpreted according to the opcode table, then each destination
 * component is computed independently. Integer division and shifts are made total here so the
 * backend never sees a trapping divide or an out-of-range shift amount.
 */

use lanir_core::{AluInstr, AluOp, AluSrc, BitSize, ScalarType, MAX_COMPONENTS};

use crate::backend::{Backend, BinaryOp, CompareFunc, ConvertOp, UnaryOp};
use crate::context::LowerContext;
use crate::error::{LowerError, Result};

impl<'a, B: Backend> LowerContext<'a, B> {
    /// Applies the operand swizzle: one component picked out of a vector,
    /// a scalar broadcast, or a general gather.
    fn alu_src(&mut self, src: &AluSrc, num_components: u8) -> Result<Vec<B::Value>> {
        let (src_components, _) = self.src_shape(&src.src)?;
        let values = self.read_src(&src.src)?;
        let wanted = num_components as usize;
        if wanted == 0 || wanted > MAX_COMPONENTS {
            return Err(LowerError::Malformed(format!(
                "{} components requested from an ALU operand",
                wanted
            )));
        }

        if src_components == 1 && wanted > 1 {
            return Ok(vec![values[0].clone(); wanted]);
        }
        if wanted == src_components as usize && src.is_identity(wanted) {
            return Ok(values);
        }
        src.swizzle[..wanted]
            .iter()
            .map(|&component| {
                values.get(component as usize).cloned().ok_or_else(|| {
                    LowerError::Malformed(format!(
                        "swizzle selects component {} of a {}-component value",
                        component, src_components
                    ))
                })
            })
            .collect()
    }

    pub(crate) fn visit_alu(&mut self, instr: &AluInstr) -> Result<()> {
        let info = instr.op.info();
        if instr.srcs.len() != info.num_inputs() {
            return Err(LowerError::Malformed(format!(
                "{} expects {} operands, found {}",
                instr.op,
                info.num_inputs(),
                instr.srcs.len()
            )));
        }
        let (num_components, dest_bits) = self.dest_shape(&instr.dest.dest)?;
        let src_components = match instr.op.vec_width() {
            Some(_) => 1,
            None => num_components,
        };

        let mut operands = Vec::with_capacity(instr.srcs.len());
        let mut src_bits = Vec::with_capacity(instr.srcs.len());
        for src in &instr.srcs {
            src_bits.push(self.src_shape(&src.src)?.1);
            operands.push(self.alu_src(src, src_components)?);
        }

        let mut result = Vec::with_capacity(num_components as usize);
        if let Some(width) = instr.op.vec_width() {
            if width != num_components {
                return Err(LowerError::Malformed(format!(
                    "{} writes a {}-component destination",
                    instr.op, num_components
                )));
            }
            for (i, mut values) in operands.into_iter().enumerate() {
                let value = values.swap_remove(0);
                result.push(self.cast_alu(value, info.input_types[i], src_bits[i])?);
            }
        } else {
            for component in 0..num_components as usize {
                let mut channel = Vec::with_capacity(operands.len());
                for (i, values) in operands.iter().enumerate() {
                    let value = values[component].clone();
                    channel.push(self.cast_alu(value, info.input_types[i], src_bits[i])?);
                }
                let value = self.alu_op(instr.op, &src_bits, channel)?;
                result.push(self.cast_alu(value, info.output_type, dest_bits)?);
            }
        }

        tracing::trace!(op = %instr.op, components = num_components, "lowered alu");
        self.assign_dest(&instr.dest.dest, instr.dest.write_mask, result)
    }

    fn require_float32(&self, op: AluOp, bits: BitSize) -> Result<ScalarType> {
        if bits != BitSize::B32 {
            return Err(LowerError::UnsupportedOp(format!(
                "{} on {}-bit floats",
                op, bits
            )));
        }
        Ok(ScalarType::F32)
    }

    fn float_unary(&mut self, op: UnaryOp, bits: BitSize, a: B::Value) -> Result<B::Value> {
        let ty = ScalarType::float(bits)?;
        Ok(self.backend.unary(op, ty, a))
    }

    fn float_binary(
        &mut self,
        op: BinaryOp,
        bits: BitSize,
        a: B::Value,
        b: B::Value,
    ) -> Result<B::Value> {
        let ty = ScalarType::float(bits)?;
        Ok(self.backend.binary(op, ty, a, b))
    }

    fn float_resize(&mut self, value: B::Value, from: BitSize, to: BitSize) -> Result<B::Value> {
        let ty = ScalarType::float(to)?;
        Ok(match from.cmp(&to) {
            std::cmp::Ordering::Equal => value,
            std::cmp::Ordering::Less => self.backend.convert(ConvertOp::FloatExtend, value, ty),
            std::cmp::Ordering::Greater => self.backend.convert(ConvertOp::FloatTrunc, value, ty),
        })
    }

    /// Comparison normalized to a 32-bit boolean.
    fn int_compare(
        &mut self,
        func: CompareFunc,
        ty: ScalarType,
        a: B::Value,
        b: B::Value,
    ) -> B::Value {
        let mask = self.backend.compare(func, false, ty, a, b);
        self.mask_to_bool32(mask, ty.bits)
    }

    /// Ordered comparison except for not-equal, which must hold for NaN operands.
    fn float_compare(
        &mut self,
        func: CompareFunc,
        bits: BitSize,
        a: B::Value,
        b: B::Value,
    ) -> Result<B::Value> {
        let ty = ScalarType::float(bits)?;
        let ordered = func != CompareFunc::NotEqual;
        let mask = self.backend.compare(func, ordered, ty, a, b);
        Ok(self.mask_to_bool32(mask, bits))
    }

    /// Substitutes a divisor of 1 in lanes computing `MIN / -1`.
    fn guard_signed_overflow(
        &mut self,
        bits: BitSize,
        a: B::Value,
        b: B::Value,
        divisor: B::Value,
    ) -> B::Value {
        let uty = ScalarType::uint(bits);
        let min = self.const_int(uty, bits.sign_bit());
        let neg_one = self.const_int(uty, bits.mask());
        let a_is_min = self.backend.compare(CompareFunc::Equal, false, uty, a, min);
        let b_is_neg_one = self
            .backend
            .compare(CompareFunc::Equal, false, uty, b, neg_one);
        let overflow = self
            .backend
            .binary(BinaryOp::And, uty, a_is_min, b_is_neg_one);
        let one = self.const_int(uty, 1);
        self.backend.select(uty, overflow, one, divisor)
    }

    /// Quotient with zero divisors yielding all ones (unsigned) or zero (signed).
    fn int_divide(&mut self, signed: bool, bits: BitSize, a: B::Value, b: B::Value) -> B::Value {
        let uty = ScalarType::uint(bits);
        let zero = self.const_int(uty, 0);
        let div_by_zero = self
            .backend
            .compare(CompareFunc::Equal, false, uty, b.clone(), zero);

        if signed {
            // zero divisors become MAX with the sign bit cleared, then the quotient is masked off
            let max = self.const_int(uty, bits.signed_max());
            let fixup = self
                .backend
                .binary(BinaryOp::And, uty, div_by_zero.clone(), max);
            let divisor = self.backend.binary(BinaryOp::Or, uty, b.clone(), fixup);
            let divisor = self.guard_signed_overflow(bits, a.clone(), b, divisor);
            let quotient = self
                .backend
                .binary(BinaryOp::Div, ScalarType::int(bits), a, divisor);
            let keep = self.backend.unary(UnaryOp::Not, uty, div_by_zero);
            self.backend.binary(BinaryOp::And, uty, keep, quotient)
        } else {
            let divisor = self
                .backend
                .binary(BinaryOp::Or, uty, b, div_by_zero.clone());
            let quotient = self.backend.binary(BinaryOp::Div, uty, a, divisor);
            self.backend.binary(BinaryOp::Or, uty, div_by_zero, quotient)
        }
    }

    /// Remainder with zero divisors yielding all ones for both signednesses.
    fn int_remainder(
        &mut self,
        signed: bool,
        bits: BitSize,
        a: B::Value,
        b: B::Value,
    ) -> B::Value {
        let uty = ScalarType::uint(bits);
        let zero = self.const_int(uty, 0);
        let div_by_zero = self
            .backend
            .compare(CompareFunc::Equal, false, uty, b.clone(), zero);

        let (ty, divisor) = if signed {
            let one = self.const_int(uty, 1);
            let fixup = self
                .backend
                .binary(BinaryOp::And, uty, div_by_zero.clone(), one);
            let divisor = self.backend.binary(BinaryOp::Or, uty, b.clone(), fixup);
            let divisor = self.guard_signed_overflow(bits, a.clone(), b, divisor);
            (ScalarType::int(bits), divisor)
        } else {
            let divisor = self
                .backend
                .binary(BinaryOp::Or, uty, b, div_by_zero.clone());
            (uty, divisor)
        };
        let remainder = self.backend.binary(BinaryOp::Rem, ty, a, divisor);
        self.backend.binary(BinaryOp::Or, uty, div_by_zero, remainder)
    }

    /// Shift with the amount resized to the shifted width and masked to `bits - 1`.
    fn shift(
        &mut self,
        op: BinaryOp,
        ty: ScalarType,
        amount_bits: BitSize,
        a: B::Value,
        amount: B::Value,
    ) -> B::Value {
        let uty = ty.as_uint();
        let amount = self.resize_int(amount, amount_bits, ty.bits, false);
        let mask = self.const_int(uty, (ty.bits.bits() - 1) as u64);
        let amount = self.backend.binary(BinaryOp::And, uty, amount, mask);
        self.backend.binary(op, ty, a, amount)
    }

    fn alu_op(
        &mut self,
        op: AluOp,
        src_bits: &[BitSize],
        operands: Vec<B::Value>,
    ) -> Result<B::Value> {
        use AluOp::*;

        let bits = src_bits[0];
        let [a, b, c] = operand_triple(operands)?;
        let int = ScalarType::int(bits);
        let uint = ScalarType::uint(bits);

        let value = match op {
            B2f32 | B2f64 => {
                let one = self.const_int(ScalarType::I32, 1.0f32.to_bits() as u64);
                let masked = self.backend.binary(BinaryOp::And, ScalarType::I32, a, one);
                let value = self.backend.bitcast(masked, ScalarType::F32);
                if op == B2f64 {
                    self.backend
                        .convert(ConvertOp::FloatExtend, value, ScalarType::F64)
                } else {
                    value
                }
            }
            B2i32 | B2i64 => {
                let one = self.const_int(ScalarType::I32, 1);
                let value = self.backend.binary(BinaryOp::And, ScalarType::I32, a, one);
                if op == B2i64 {
                    self.resize_int(value, BitSize::B32, BitSize::B64, false)
                } else {
                    value
                }
            }
            B32csel => {
                let zero = self.const_int(ScalarType::I32, 0);
                let mask = self
                    .backend
                    .compare(CompareFunc::NotEqual, false, ScalarType::I32, a, zero);
                let ty = ScalarType::uint(src_bits[1]);
                self.backend.select(ty, mask, b, c)
            }
            BitCount => {
                let count = self.backend.unary(UnaryOp::BitCount, uint, a);
                self.resize_int(count, bits, BitSize::B32, false)
            }
            BitfieldSelect => {
                let ty = ScalarType::U32;
                let diff = self.backend.binary(BinaryOp::Xor, ty, b, c.clone());
                let picked = self.backend.binary(BinaryOp::And, ty, a, diff);
                self.backend.binary(BinaryOp::Xor, ty, c, picked)
            }
            BitfieldReverse => self
                .backend
                .unary(UnaryOp::BitReverse, ScalarType::U32, a),
            F2b32 => {
                let ty = ScalarType::float(bits)?;
                let zero = self.const_int(ty, 0);
                let mask = self
                    .backend
                    .compare(CompareFunc::NotEqual, false, ty, a, zero);
                self.mask_to_bool32(mask, bits)
            }
            F2f32 => self.float_resize(a, bits, BitSize::B32)?,
            F2f64 => self.float_resize(a, bits, BitSize::B64)?,
            F2i32 => self
                .backend
                .convert(ConvertOp::FloatToSigned, a, ScalarType::I32),
            F2u32 => self
                .backend
                .convert(ConvertOp::FloatToUnsigned, a, ScalarType::U32),
            F2i64 => self
                .backend
                .convert(ConvertOp::FloatToSigned, a, ScalarType::I64),
            F2u64 => self
                .backend
                .convert(ConvertOp::FloatToUnsigned, a, ScalarType::U64),
            Fabs => self.float_unary(UnaryOp::Abs, bits, a)?,
            Fceil => self.float_unary(UnaryOp::Ceil, bits, a)?,
            Ffloor => self.float_unary(UnaryOp::Floor, bits, a)?,
            Fneg => self.float_unary(UnaryOp::Neg, bits, a)?,
            Frcp => self.float_unary(UnaryOp::Rcp, bits, a)?,
            FroundEven => self.float_unary(UnaryOp::RoundEven, bits, a)?,
            Frsq => self.float_unary(UnaryOp::Rsqrt, bits, a)?,
            Fsat => self.float_unary(UnaryOp::Saturate, bits, a)?,
            Fsign => self.float_unary(UnaryOp::Sign, bits, a)?,
            Fsqrt => self.float_unary(UnaryOp::Sqrt, bits, a)?,
            Ftrunc => self.float_unary(UnaryOp::Trunc, bits, a)?,
            Fcos | Fsin | Fexp2 | Flog2 | Fddx | FddxCoarse | FddxFine | Fddy | FddyCoarse
            | FddyFine => {
                let ty = self.require_float32(op, bits)?;
                let unary = match op {
                    Fcos => UnaryOp::Cos,
                    Fsin => UnaryOp::Sin,
                    Fexp2 => UnaryOp::Exp2,
                    Flog2 => UnaryOp::Log2,
                    Fddx | FddxCoarse | FddxFine => UnaryOp::Ddx,
                    _ => UnaryOp::Ddy,
                };
                self.backend.unary(unary, ty, a)
            }
            Fadd => self.float_binary(BinaryOp::Add, bits, a, b)?,
            Fdiv => self.float_binary(BinaryOp::Div, bits, a, b)?,
            Fmin => self.float_binary(BinaryOp::Min, bits, a, b)?,
            Fmax => self.float_binary(BinaryOp::Max, bits, a, b)?,
            Fmul => self.float_binary(BinaryOp::Mul, bits, a, b)?,
            Fpow => {
                let ty = self.require_float32(op, bits)?;
                self.backend.binary(BinaryOp::Pow, ty, a, b)
            }
            Fmod => {
                // a - b * floor(a / b)
                let ty = ScalarType::float(bits)?;
                let quotient = self.backend.binary(BinaryOp::Div, ty, a.clone(), b.clone());
                let floored = self.backend.unary(UnaryOp::Floor, ty, quotient);
                let product = self.backend.binary(BinaryOp::Mul, ty, b, floored);
                self.backend.binary(BinaryOp::Sub, ty, a, product)
            }
            Ffract => {
                let ty = ScalarType::float(bits)?;
                let floored = self.backend.unary(UnaryOp::Floor, ty, a.clone());
                self.backend.binary(BinaryOp::Sub, ty, a, floored)
            }
            Ffma => {
                let ty = ScalarType::float(bits)?;
                self.backend.fma(ty, a, b, c)
            }
            Feq32 => self.float_compare(CompareFunc::Equal, bits, a, b)?,
            Fne32 => self.float_compare(CompareFunc::NotEqual, bits, a, b)?,
            Flt32 => self.float_compare(CompareFunc::Less, bits, a, b)?,
            Fge32 => self.float_compare(CompareFunc::GreaterEqual, bits, a, b)?,
            FindLsb => {
                let index = self.backend.unary(UnaryOp::CountTrailingZeros, int, a);
                self.resize_int(index, bits, BitSize::B32, false)
            }
            UfindMsb => {
                // (bits - 1) - clz, which is -1 for a zero input
                let leading = self.backend.unary(UnaryOp::CountLeadingZeros, uint, a);
                let top = self.const_int(uint, (bits.bits() - 1) as u64);
                let index = self.backend.binary(BinaryOp::Sub, uint, top, leading);
                self.resize_int(index, bits, BitSize::B32, true)
            }
            I2b32 => {
                let zero = self.const_int(int, 0);
                self.int_compare(CompareFunc::NotEqual, int, a, zero)
            }
            I2f32 => self
                .backend
                .convert(ConvertOp::SignedToFloat, a, ScalarType::F32),
            I2f64 => self
                .backend
                .convert(ConvertOp::SignedToFloat, a, ScalarType::F64),
            U2f32 => self
                .backend
                .convert(ConvertOp::UnsignedToFloat, a, ScalarType::F32),
            U2f64 => self
                .backend
                .convert(ConvertOp::UnsignedToFloat, a, ScalarType::F64),
            I2i8 => self.resize_int(a, bits, BitSize::B8, true),
            I2i16 => self.resize_int(a, bits, BitSize::B16, true),
            I2i32 => self.resize_int(a, bits, BitSize::B32, true),
            I2i64 => self.resize_int(a, bits, BitSize::B64, true),
            U2u8 => self.resize_int(a, bits, BitSize::B8, false),
            U2u16 => self.resize_int(a, bits, BitSize::B16, false),
            U2u32 => self.resize_int(a, bits, BitSize::B32, false),
            U2u64 => self.resize_int(a, bits, BitSize::B64, false),
            Iabs => self.backend.unary(UnaryOp::Abs, int, a),
            Ineg => self.backend.unary(UnaryOp::Neg, int, a),
            Inot => self.backend.unary(UnaryOp::Not, int, a),
            Isign => self.backend.unary(UnaryOp::Sign, int, a),
            Iadd => self.backend.binary(BinaryOp::Add, int, a, b),
            Isub => self.backend.binary(BinaryOp::Sub, int, a, b),
            Imul | Imul24 => self.backend.binary(BinaryOp::Mul, int, a, b),
            Iand => self.backend.binary(BinaryOp::And, int, a, b),
            Ior => self.backend.binary(BinaryOp::Or, int, a, b),
            Ixor => self.backend.binary(BinaryOp::Xor, int, a, b),
            Imax => self.backend.binary(BinaryOp::Max, int, a, b),
            Imin => self.backend.binary(BinaryOp::Min, int, a, b),
            Umax => self.backend.binary(BinaryOp::Max, uint, a, b),
            Umin => self.backend.binary(BinaryOp::Min, uint, a, b),
            ImulHigh | UmulHigh => {
                if bits != BitSize::B32 {
                    return Err(LowerError::UnsupportedOp(format!(
                        "{} on {}-bit integers",
                        op, bits
                    )));
                }
                let ty = if op == ImulHigh { int } else { uint };
                self.backend.binary(BinaryOp::MulHigh, ty, a, b)
            }
            Idiv => self.int_divide(true, bits, a, b),
            Udiv => self.int_divide(false, bits, a, b),
            Irem => self.int_remainder(true, bits, a, b),
            Umod => self.int_remainder(false, bits, a, b),
            Ieq32 => self.int_compare(CompareFunc::Equal, int, a, b),
            Ine32 => self.int_compare(CompareFunc::NotEqual, int, a, b),
            Ilt32 => self.int_compare(CompareFunc::Less, int, a, b),
            Ige32 => self.int_compare(CompareFunc::GreaterEqual, int, a, b),
            Ult32 => self.int_compare(CompareFunc::Less, uint, a, b),
            Uge32 => self.int_compare(CompareFunc::GreaterEqual, uint, a, b),
            Ishl => self.shift(BinaryOp::Shl, int, src_bits[1], a, b),
            Ishr => self.shift(BinaryOp::Shr, int, src_bits[1], a, b),
            Ushr => self.shift(BinaryOp::Shr, uint, src_bits[1], a, b),
            Mov => a,
            Unpack64_2x32SplitX => self
                .backend
                .convert(ConvertOp::Trunc, a, ScalarType::U32),
            Unpack64_2x32SplitY => {
                let amount = self.const_int(ScalarType::U64, 32);
                let high = self.backend.binary(BinaryOp::Shr, ScalarType::U64, a, amount);
                self.backend.convert(ConvertOp::Trunc, high, ScalarType::U32)
            }
            Pack64_2x32Split => {
                let low = self.resize_int(a, BitSize::B32, BitSize::B64, false);
                let high = self.resize_int(b, BitSize::B32, BitSize::B64, false);
                let amount = self.const_int(ScalarType::U64, 32);
                let high = self
                    .backend
                    .binary(BinaryOp::Shl, ScalarType::U64, high, amount);
                self.backend.binary(BinaryOp::Or, ScalarType::U64, low, high)
            }
            Vec2 | Vec3 | Vec4 | Vec8 | Vec16 => {
                return Err(LowerError::Malformed(format!(
                    "{} is not a per-component operation",
                    op
                )))
            }
        };
        Ok(value)
    }
}

/// Spreads up to three operands into fixed slots. Slots past the opcode's arity
/// repeat the first operand and are never read.
fn operand_triple<V: Clone>(operands: Vec<V>) -> Result<[V; 3]> {
    let first = operands
        .first()
        .cloned()
        .ok_or_else(|| LowerError::Malformed("ALU operation without operands".into()))?;
    let slot = |i: usize| operands.get(i).cloned().unwrap_or_else(|| first.clone());
    Ok([slot(0), slot(1), slot(2)])
}
