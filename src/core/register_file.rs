//! Register allocation with lexical scopes.
//!
//! The sequencer has a small bank of 32-bit registers and no stack, so
//! allocation is strictly stack-like: every allocation takes the next free
//! slot and registers are only released in bulk when the scope that
//! allocated them exits. Named registers hold program variables, unnamed
//! ones are temporaries of a single code-generation step.
//!
//! Every handle carries the serial number of its allocation. A handle that
//! outlives its scope stops being live even when the slot is reused, which
//! the instruction queue checks in debug builds.

use std::fmt;

use hashbrown::HashMap;
use log::trace;

use super::error::{CompileError, CompileResult};

/// Maximum number of registers a bank can have.
pub const MAX_REGISTERS: usize = 64;

/// Compile-time type tag of a register.
///
/// Floats are 32-bit fixed-point values in ordinary registers; the tag only
/// drives type checking and operand conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    Int,
    Float,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Int => write!(f, "int"),
            DType::Float => write!(f, "float"),
        }
    }
}

/// Handle to an allocated register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Reg {
    slot: u8,
    serial: u32,
}

impl Reg {
    /// Physical register number.
    pub fn slot(&self) -> u8 {
        self.slot
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.slot)
    }
}

/// Bit set over physical register slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegBitSet(u64);

impl RegBitSet {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn contains(&self, slot: u8) -> bool {
        slot < 64 && self.0 & (1u64 << slot) != 0
    }

    pub fn set(&mut self, slot: u8) {
        if slot < 64 {
            self.0 |= 1u64 << slot;
        }
    }

    pub fn clear(&mut self, slot: u8) {
        if slot < 64 {
            self.0 &= !(1u64 << slot);
        }
    }

    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }

    /// Iterate over set slots in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..64u8).filter(move |slot| self.contains(*slot))
    }
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    reg: Reg,
    dtype: DType,
}

#[derive(Debug, Default)]
struct Scope {
    /// Free pointer when the scope was entered.
    mark: usize,
    names: Vec<String>,
}

/// Stack-discipline register allocator.
#[derive(Debug)]
pub struct RegisterAllocator {
    capacity: usize,
    next_free: usize,
    high_water: usize,
    serial: u32,
    live: Vec<Option<u32>>,
    used: RegBitSet,
    names: HashMap<String, Binding>,
    scopes: Vec<Scope>,
}

impl RegisterAllocator {
    /// Create an allocator over `capacity` registers with an open root scope.
    pub fn new(capacity: usize) -> CompileResult<Self> {
        if capacity == 0 || capacity > MAX_REGISTERS {
            return Err(CompileError::value(format!(
                "register bank size must be between 1 and {MAX_REGISTERS}, got {capacity}"
            )));
        }
        Ok(Self {
            capacity,
            next_free: 0,
            high_water: 0,
            serial: 0,
            live: vec![None; capacity],
            used: RegBitSet::new(),
            names: HashMap::new(),
            scopes: vec![Scope::default()],
        })
    }

    fn take_slot(&mut self) -> CompileResult<Reg> {
        if self.next_free >= self.capacity {
            return Err(CompileError::MemoryExhausted {
                capacity: self.capacity,
            });
        }
        let slot = self.next_free;
        self.next_free += 1;
        self.high_water = self.high_water.max(self.next_free);
        self.serial += 1;
        self.live[slot] = Some(self.serial);
        self.used.set(slot as u8);
        Ok(Reg {
            slot: slot as u8,
            serial: self.serial,
        })
    }

    /// Bind `name` to a fresh register in the current scope.
    pub fn allocate(&mut self, name: &str, dtype: DType) -> CompileResult<Reg> {
        if self.names.contains_key(name) {
            return Err(CompileError::NameConflict {
                name: name.to_string(),
            });
        }
        let reg = self.take_slot()?;
        self.names.insert(name.to_string(), Binding { reg, dtype });
        if let Some(scope) = self.scopes.last_mut() {
            scope.names.push(name.to_string());
        }
        trace!("allocated {} for '{}' ({})", reg, name, dtype);
        Ok(reg)
    }

    /// Look up the register bound to `name`.
    pub fn get(&self, name: &str) -> CompileResult<Reg> {
        self.binding(name).map(|(reg, _)| reg)
    }

    /// Look up register and type tag of `name`.
    pub fn binding(&self, name: &str) -> CompileResult<(Reg, DType)> {
        self.names
            .get(name)
            .map(|b| (b.reg, b.dtype))
            .ok_or_else(|| CompileError::UndefinedName {
                name: name.to_string(),
            })
    }

    /// Allocate an unnamed register released with the current scope.
    pub fn temp(&mut self) -> CompileResult<Reg> {
        self.take_slot()
    }

    /// Allocate `count` unnamed registers in order.
    pub fn temp_regs(&mut self, count: usize) -> CompileResult<Vec<Reg>> {
        (0..count).map(|_| self.take_slot()).collect()
    }

    pub fn enter_scope(&mut self) {
        self.scopes.push(Scope {
            mark: self.next_free,
            names: Vec::new(),
        });
    }

    /// Release everything allocated since the matching [`enter_scope`](Self::enter_scope).
    pub fn exit_scope(&mut self) -> CompileResult<()> {
        if self.scopes.len() <= 1 {
            return Err(CompileError::internal("register scope exited without being entered"));
        }
        let Some(scope) = self.scopes.pop() else {
            return Err(CompileError::internal("register scope stack is empty"));
        };
        for name in &scope.names {
            self.names.remove(name);
        }
        for slot in scope.mark..self.next_free {
            self.live[slot] = None;
            self.used.clear(slot as u8);
        }
        trace!(
            "scope exit released R{}..R{}",
            scope.mark,
            self.next_free
        );
        self.next_free = scope.mark;
        Ok(())
    }

    /// Run `f` inside a fresh scope, releasing its registers on every exit path.
    pub fn with_scope<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> CompileResult<T>,
    ) -> CompileResult<T> {
        self.enter_scope();
        let result = f(self);
        let exit = self.exit_scope();
        let value = result?;
        exit?;
        Ok(value)
    }

    /// Whether `reg` still refers to its original allocation.
    pub fn is_live(&self, reg: Reg) -> bool {
        self.live
            .get(reg.slot as usize)
            .is_some_and(|serial| *serial == Some(reg.serial))
    }

    pub fn next_free(&self) -> usize {
        self.next_free
    }

    pub fn high_water_mark(&self) -> usize {
        self.high_water
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Scope nesting depth, 1 for the root scope.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Slots currently in use.
    pub fn in_use(&self) -> RegBitSet {
        self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regbitset_operations() {
        let mut set = RegBitSet::new();
        set.set(3);
        set.set(31);
        assert!(set.contains(3));
        assert!(!set.contains(4));
        assert_eq!(set.count(), 2);
        set.clear(3);
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![31]);
    }

    #[test]
    fn test_allocation_is_stack_like() {
        let mut regs = RegisterAllocator::new(32).unwrap();
        let a = regs.allocate("a", DType::Int).unwrap();
        let b = regs.allocate("b", DType::Float).unwrap();
        assert_eq!(a.slot(), 0);
        assert_eq!(b.slot(), 1);
        assert_eq!(regs.binding("b").unwrap(), (b, DType::Float));
        assert_eq!(regs.next_free(), 2);
    }

    #[test]
    fn test_name_conflict() {
        let mut regs = RegisterAllocator::new(32).unwrap();
        regs.allocate("x", DType::Int).unwrap();
        regs.enter_scope();
        let err = regs.allocate("x", DType::Int).unwrap_err();
        assert_eq!(
            err,
            CompileError::NameConflict {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn test_scope_exit_restores_free_pointer() {
        let mut regs = RegisterAllocator::new(32).unwrap();
        regs.allocate("outer", DType::Int).unwrap();
        let before = regs.next_free();
        regs.enter_scope();
        let inner = regs.allocate("inner", DType::Int).unwrap();
        regs.temp_regs(3).unwrap();
        assert_eq!(regs.next_free(), before + 4);
        regs.exit_scope().unwrap();
        assert_eq!(regs.next_free(), before);
        assert!(!regs.is_live(inner));
        assert!(matches!(
            regs.get("inner"),
            Err(CompileError::UndefinedName { .. })
        ));
        assert!(regs.get("outer").is_ok());
        assert_eq!(regs.high_water_mark(), before + 4);
    }

    #[test]
    fn test_reused_slot_invalidates_old_handle() {
        let mut regs = RegisterAllocator::new(32).unwrap();
        regs.enter_scope();
        let first = regs.temp().unwrap();
        regs.exit_scope().unwrap();
        let second = regs.temp().unwrap();
        assert_eq!(first.slot(), second.slot());
        assert!(!regs.is_live(first));
        assert!(regs.is_live(second));
    }

    #[test]
    fn test_exhaustion() {
        let mut regs = RegisterAllocator::new(2).unwrap();
        regs.temp_regs(2).unwrap();
        assert_eq!(
            regs.temp().unwrap_err(),
            CompileError::MemoryExhausted { capacity: 2 }
        );
    }

    #[test]
    fn test_with_scope_releases_on_error() {
        let mut regs = RegisterAllocator::new(4).unwrap();
        let result: CompileResult<()> = regs.with_scope(|r| {
            r.temp_regs(2)?;
            Err(CompileError::value("boom"))
        });
        assert!(result.is_err());
        assert_eq!(regs.next_free(), 0);
        assert_eq!(regs.depth(), 1);
    }

    #[test]
    fn test_root_scope_cannot_exit() {
        let mut regs = RegisterAllocator::new(4).unwrap();
        assert!(matches!(
            regs.exit_scope(),
            Err(CompileError::Internal { .. })
        ));
    }
}
