/*! Backend values for every SSA definition and register of the function being lowered. */

use cranelift_entity::{EntityRef, PrimaryMap, SecondaryMap};
use lanir_core::{RegId, RegisterDecl, SsaId};

use crate::backend::Backend;
use crate::error::{LowerError, Result};

#[derive(Debug, Clone)]
enum SsaEntry<V> {
    Scalar(V),
    Vector(Box<[V]>),
}

struct RegisterSlot<R> {
    handle: R,
    decl: RegisterDecl,
}

pub struct ValueTable<V: Clone, R> {
    ssa: SecondaryMap<SsaId, Option<SsaEntry<V>>>,
    ssa_alloc: u32,
    registers: Vec<RegisterSlot<R>>,
}

impl<V: Clone, R> ValueTable<V, R> {
    pub fn new(ssa_alloc: u32) -> Self {
        Self {
            ssa: SecondaryMap::with_capacity(ssa_alloc as usize),
            ssa_alloc,
            registers: Vec::new(),
        }
    }

    fn check_range(&self, id: SsaId) -> Result<()> {
        if id.as_u32() >= self.ssa_alloc {
            return Err(LowerError::SsaOutOfRange {
                id,
                alloc: self.ssa_alloc,
            });
        }
        Ok(())
    }

    /// Binds the components of an SSA definition. Each index may be written once.
    pub fn write_ssa(&mut self, id: SsaId, mut components: Vec<V>) -> Result<()> {
        self.check_range(id)?;
        if self.ssa[id].is_some() {
            return Err(LowerError::SsaRedefined(id));
        }
        let entry = match components.len() {
            0 => {
                return Err(LowerError::Malformed(format!(
                    "{} defined with no components",
                    id
                )))
            }
            1 => SsaEntry::Scalar(components.remove(0)),
            _ => SsaEntry::Vector(components.into_boxed_slice()),
        };
        self.ssa[id] = Some(entry);
        Ok(())
    }

    pub fn read_ssa(&self, id: SsaId) -> Result<Vec<V>> {
        self.check_range(id)?;
        match &self.ssa[id] {
            Some(SsaEntry::Scalar(value)) => Ok(vec![value.clone()]),
            Some(SsaEntry::Vector(values)) => Ok(values.to_vec()),
            None => Err(LowerError::SsaUndefined(id)),
        }
    }

    pub fn is_defined(&self, id: SsaId) -> bool {
        id.as_u32() < self.ssa_alloc && self.ssa[id].is_some()
    }

    pub fn register_count(&self) -> usize {
        self.registers.len()
    }

    fn slot(&self, reg: RegId) -> Result<&RegisterSlot<R>> {
        self.registers
            .get(reg.index())
            .ok_or(LowerError::UnknownRegister(reg))
    }

    pub fn register_decl(&self, reg: RegId) -> Result<&RegisterDecl> {
        Ok(&self.slot(reg)?.decl)
    }

    /// Allocates backend storage for every declared register, in declaration order.
    pub fn allocate_registers<B>(
        &mut self,
        backend: &mut B,
        registers: &PrimaryMap<RegId, RegisterDecl>,
    ) where
        B: Backend<Value = V, Register = R>,
    {
        for (reg, decl) in registers.iter() {
            debug_assert_eq!(reg.index(), self.registers.len());
            let handle = backend.alloc_register(decl);
            self.registers.push(RegisterSlot {
                handle,
                decl: decl.clone(),
            });
        }
    }

    pub fn read_register<B>(
        &self,
        backend: &mut B,
        reg: RegId,
        indirect: Option<V>,
    ) -> Result<Vec<V>>
    where
        B: Backend<Value = V, Register = R>,
    {
        let slot = self.slot(reg)?;
        let values = backend.load_register(&slot.handle, &slot.decl, indirect);
        if values.len() != slot.decl.num_components as usize {
            return Err(LowerError::Malformed(format!(
                "register {} read produced {} components, expected {}",
                reg,
                values.len(),
                slot.decl.num_components
            )));
        }
        Ok(values)
    }

    /// Writes the components selected by `write_mask` (zero selects all).
    pub fn write_register<B>(
        &self,
        backend: &mut B,
        reg: RegId,
        indirect: Option<V>,
        write_mask: u16,
        values: &[V],
    ) -> Result<()>
    where
        B: Backend<Value = V, Register = R>,
    {
        let slot = self.slot(reg)?;
        let num_components = slot.decl.num_components as usize;
        if values.len() != num_components {
            return Err(LowerError::Malformed(format!(
                "register {} written with {} components, declared {}",
                reg,
                values.len(),
                num_components
            )));
        }
        let full = full_mask(num_components);
        let write_mask = if write_mask == 0 {
            full
        } else {
            write_mask & full
        };
        backend.store_register(&slot.handle, &slot.decl, indirect, write_mask, values);
        Ok(())
    }

    /// Hands every register back to the backend. The table keeps its SSA bindings.
    pub fn release_registers<B>(&mut self, backend: &mut B)
    where
        B: Backend<Value = V, Register = R>,
    {
        for slot in self.registers.drain(..) {
            backend.release_register(slot.handle);
        }
    }
}

pub(crate) fn full_mask(num_components: usize) -> u16 {
    if num_components >= 16 {
        u16::MAX
    } else {
        (1u16 << num_components) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssa(n: u32) -> SsaId {
        SsaId::from_u32(n)
    }

    #[test]
    fn test_scalar_and_vector_round_trip() {
        let mut table: ValueTable<u32, ()> = ValueTable::new(4);
        table.write_ssa(ssa(0), vec![7]).unwrap();
        table.write_ssa(ssa(3), vec![1, 2, 3]).unwrap();

        assert_eq!(table.read_ssa(ssa(0)).unwrap(), vec![7]);
        assert_eq!(table.read_ssa(ssa(3)).unwrap(), vec![1, 2, 3]);
        assert!(table.is_defined(ssa(3)));
        assert!(!table.is_defined(ssa(1)));
    }

    #[test]
    fn test_second_write_is_rejected() {
        let mut table: ValueTable<u32, ()> = ValueTable::new(1);
        table.write_ssa(ssa(0), vec![1]).unwrap();
        let err = table.write_ssa(ssa(0), vec![2]).unwrap_err();
        assert!(matches!(err, LowerError::SsaRedefined(id) if id == ssa(0)));
        assert!(err.is_integrity_violation());
        assert_eq!(table.read_ssa(ssa(0)).unwrap(), vec![1]);
    }

    #[test]
    fn test_undefined_and_out_of_range() {
        let mut table: ValueTable<u32, ()> = ValueTable::new(2);
        assert!(matches!(
            table.read_ssa(ssa(1)),
            Err(LowerError::SsaUndefined(_))
        ));
        assert!(matches!(
            table.write_ssa(ssa(2), vec![0]),
            Err(LowerError::SsaOutOfRange { alloc: 2, .. })
        ));
        assert!(matches!(
            table.write_ssa(ssa(0), vec![]),
            Err(LowerError::Malformed(_))
        ));
    }

    #[test]
    fn test_full_mask() {
        assert_eq!(full_mask(1), 0b1);
        assert_eq!(full_mask(4), 0b1111);
        assert_eq!(full_mask(16), u16::MAX);
    }
}
