//! Expression trees and their lowering to ALU instructions.
//!
//! Operands are integers or floats; a float is a 32-bit fixed-point value in
//! an ordinary register, so the dtype only exists at compile time. Constant
//! subtrees are folded. Because the first operand of an ALU instruction must
//! be a register, a literal on the left is swapped to the right for
//! commutative operators and moved into a temporary otherwise.

use std::fmt;

use log::trace;

use crate::core::fixed_point::encode_i32;
use crate::core::{CompileError, CompileResult, DType, Reg, RegisterAllocator};

use super::instruction::Operand;
use super::queue::InstructionQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    And,
    Or,
    Xor,
    Shl,
    Shr,
}

impl BinOp {
    fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::Shl => "asl",
            BinOp::Shr => "asr",
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::And => "&",
            BinOp::Or => "|",
            BinOp::Xor => "^",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
        }
    }

    fn is_commutative(self) -> bool {
        matches!(self, BinOp::Add | BinOp::And | BinOp::Or | BinOp::Xor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Var(String),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Unary(UnOp, Box<Expr>),
}

/// An evaluated operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Value {
    Imm(u32),
    Reg(Reg),
}

impl Value {
    fn operand(self) -> Operand {
        match self {
            Value::Imm(v) => Operand::word(v),
            Value::Reg(r) => Operand::Reg(r),
        }
    }
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Var(name.into())
    }

    pub fn binary(op: BinOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary(op, Box::new(lhs), Box::new(rhs))
    }

    pub fn unary(op: UnOp, inner: Expr) -> Self {
        Expr::Unary(op, Box::new(inner))
    }

    /// Type of the expression given the current variable bindings.
    pub fn dtype(&self, registers: &RegisterAllocator) -> CompileResult<DType> {
        match self {
            Expr::Int(_) => Ok(DType::Int),
            Expr::Float(_) => Ok(DType::Float),
            Expr::Var(name) => registers.binding(name).map(|(_, dtype)| dtype),
            Expr::Binary(op, lhs, rhs) => {
                let left = lhs.dtype(registers)?;
                let right = rhs.dtype(registers)?;
                match op {
                    BinOp::Add | BinOp::Sub => {
                        if left != right {
                            return Err(CompileError::type_error(format!(
                                "cannot combine {left} and {right} in `{self}`"
                            )));
                        }
                        Ok(left)
                    }
                    _ => {
                        if left != DType::Int || right != DType::Int {
                            return Err(CompileError::type_error(format!(
                                "`{}` needs int operands in `{self}`",
                                op.symbol()
                            )));
                        }
                        Ok(DType::Int)
                    }
                }
            }
            Expr::Unary(UnOp::Neg, inner) => inner.dtype(registers),
            Expr::Unary(UnOp::Not, inner) => match inner.dtype(registers)? {
                DType::Int => Ok(DType::Int),
                DType::Float => Err(CompileError::type_error(format!(
                    "`~` needs an int operand in `{self}`"
                ))),
            },
        }
    }

    /// Register value of a constant subtree.
    pub fn fold(&self, signed: bool) -> CompileResult<Option<u32>> {
        match self {
            Expr::Int(v) => {
                if *v < i32::MIN as i64 || *v > u32::MAX as i64 {
                    return Err(CompileError::value(format!(
                        "integer {v} does not fit in 32 bits"
                    )));
                }
                Ok(Some(*v as u32))
            }
            Expr::Float(v) => Ok(Some(encode_i32(*v)? as u32)),
            Expr::Var(_) => Ok(None),
            Expr::Binary(op, lhs, rhs) => {
                let (Some(l), Some(r)) = (lhs.fold(signed)?, rhs.fold(signed)?) else {
                    return Ok(None);
                };
                let value = match op {
                    BinOp::Add => l.wrapping_add(r),
                    BinOp::Sub => l.wrapping_sub(r),
                    BinOp::And => l & r,
                    BinOp::Or => l | r,
                    BinOp::Xor => l ^ r,
                    BinOp::Shl => l << shift_amount(r)?,
                    BinOp::Shr if signed => ((l as i32) >> shift_amount(r)?) as u32,
                    BinOp::Shr => l >> shift_amount(r)?,
                };
                Ok(Some(value))
            }
            Expr::Unary(op, inner) => Ok(inner.fold(signed)?.map(|v| match op {
                UnOp::Not => !v,
                UnOp::Neg => 0u32.wrapping_sub(v),
            })),
        }
    }
}

fn shift_amount(amount: u32) -> CompileResult<u32> {
    if amount > 31 {
        return Err(CompileError::value(format!(
            "shift amount {amount} is outside 0..=31"
        )));
    }
    Ok(amount)
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(v) => write!(f, "{v}"),
            Expr::Float(v) => write!(f, "{v:?}"),
            Expr::Var(name) => write!(f, "{name}"),
            Expr::Binary(op, lhs, rhs) => {
                write_operand(f, lhs)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, rhs)
            }
            Expr::Unary(UnOp::Not, inner) => {
                write!(f, "~")?;
                write_operand(f, inner)
            }
            Expr::Unary(UnOp::Neg, inner) => {
                write!(f, "-")?;
                write_operand(f, inner)
            }
        }
    }
}

fn write_operand(f: &mut fmt::Formatter<'_>, expr: &Expr) -> fmt::Result {
    if matches!(expr, Expr::Binary(..)) {
        write!(f, "({expr})")
    } else {
        write!(f, "{expr}")
    }
}

impl InstructionQueue {
    /// Evaluate `expr` into `dest`, or into a new temporary of the enclosing scope.
    pub fn evaluate(&mut self, expr: &Expr, dest: Option<Reg>) -> CompileResult<Reg> {
        expr.dtype(&self.registers)?;
        let dest = match dest {
            Some(reg) => reg,
            None => self.temp()?,
        };
        trace!("evaluate `{}` into {}", expr, dest);
        self.scoped(|q| q.lower_into(expr, dest))?;
        Ok(dest)
    }

    fn lower_into(&mut self, expr: &Expr, dest: Reg) -> CompileResult<()> {
        let signed = self.config().emulate_signed;
        if let Some(value) = expr.fold(signed)? {
            self.emit("move", vec![Operand::word(value), dest.into()])?;
            return Ok(());
        }
        match expr {
            Expr::Var(name) => {
                let reg = self.registers.get(name)?;
                if reg != dest {
                    self.emit("move", vec![reg.into(), dest.into()])?;
                }
                Ok(())
            }
            Expr::Binary(op, lhs, rhs) => {
                let left = self.lower_operand(lhs)?;
                let right = self.lower_operand(rhs)?;
                self.emit_binary(*op, left, right, dest)
            }
            Expr::Unary(UnOp::Not, inner) => {
                let value = self.lower_operand(inner)?;
                self.emit("not", vec![value.operand(), dest.into()])?;
                Ok(())
            }
            Expr::Unary(UnOp::Neg, inner) => {
                let value = self.lower_operand(inner)?;
                let zero = self.temp()?;
                self.emit("move", vec![Operand::Imm(0), zero.into()])?;
                self.emit("sub", vec![zero.into(), value.operand(), dest.into()])?;
                Ok(())
            }
            Expr::Int(_) | Expr::Float(_) => {
                Err(CompileError::internal("literal was not folded"))
            }
        }
    }

    /// Literal to immediate, variable to its register, anything else to a temporary.
    fn lower_operand(&mut self, expr: &Expr) -> CompileResult<Value> {
        if let Some(value) = expr.fold(self.config().emulate_signed)? {
            return Ok(Value::Imm(value));
        }
        if let Expr::Var(name) = expr {
            return Ok(Value::Reg(self.registers.get(name)?));
        }
        let temp = self.temp()?;
        self.lower_into(expr, temp)?;
        Ok(Value::Reg(temp))
    }

    fn emit_binary(&mut self, op: BinOp, left: Value, right: Value, dest: Reg) -> CompileResult<()> {
        let (lhs, rhs) = match (left, right) {
            (Value::Reg(l), r) => (l, r),
            (Value::Imm(l), Value::Reg(r)) if op.is_commutative() => (r, Value::Imm(l)),
            (Value::Imm(l), r) => {
                let temp = self.temp()?;
                self.emit("move", vec![Operand::word(l), temp.into()])?;
                (temp, r)
            }
        };
        match (op, rhs) {
            (BinOp::Shr, Value::Imm(amount)) => {
                self.emit_shift_right_imm(lhs, shift_amount(amount)?, dest)
            }
            (BinOp::Shr, Value::Reg(amount)) => self.emit_shift_right_reg(lhs, amount, dest),
            (BinOp::Shl, Value::Imm(amount)) => {
                shift_amount(amount)?;
                self.emit(op.mnemonic(), vec![lhs.into(), rhs.operand(), dest.into()])?;
                Ok(())
            }
            _ => {
                self.emit(op.mnemonic(), vec![lhs.into(), rhs.operand(), dest.into()])?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::CompilerConfig;

    fn queue() -> InstructionQueue {
        InstructionQueue::new(CompilerConfig::default().with_sync_on_start(false)).unwrap()
    }

    fn listing(q: &InstructionQueue) -> Vec<String> {
        q.instructions().iter().map(ToString::to_string).collect()
    }

    fn int(v: i64) -> Expr {
        Expr::Int(v)
    }

    #[test]
    fn test_literal_left_is_swapped_when_commutative() {
        let mut q = queue();
        let a = q.registers_mut().allocate("a", DType::Int).unwrap();
        let b = q.registers_mut().allocate("b", DType::Int).unwrap();
        q.evaluate(&Expr::binary(BinOp::Add, int(1), Expr::var("a")), Some(b))
            .unwrap();
        assert_eq!(listing(&q), vec!["add R0,1,R1"]);
        assert_eq!(q.registers().next_free(), 2);
        assert!(q.registers().is_live(a));
    }

    #[test]
    fn test_literal_left_of_subtraction_goes_through_temp() {
        let mut q = queue();
        q.registers_mut().allocate("a", DType::Int).unwrap();
        let b = q.registers_mut().allocate("b", DType::Int).unwrap();
        q.evaluate(&Expr::binary(BinOp::Sub, int(5), Expr::var("a")), Some(b))
            .unwrap();
        assert_eq!(listing(&q), vec!["move 5,R2", "nop", "sub R2,R0,R1"]);
        assert_eq!(q.registers().next_free(), 2);
    }

    #[test]
    fn test_constants_fold() {
        let mut q = queue();
        let a = q.registers_mut().allocate("a", DType::Int).unwrap();
        let expr = Expr::binary(BinOp::Shl, Expr::binary(BinOp::Add, int(2), int(3)), int(1));
        q.evaluate(&expr, Some(a)).unwrap();
        assert_eq!(listing(&q), vec!["move 10,R0"]);

        let neg = Expr::binary(BinOp::Shr, int(-16), int(2));
        assert_eq!(neg.fold(true).unwrap(), Some(-4i32 as u32));
        assert_eq!(neg.fold(false).unwrap(), Some((-16i32 as u32) >> 2));
    }

    #[test]
    fn test_nested_temporaries_are_released() {
        let mut q = queue();
        q.registers_mut().allocate("a", DType::Int).unwrap();
        q.registers_mut().allocate("b", DType::Int).unwrap();
        let expr = Expr::binary(
            BinOp::Sub,
            Expr::binary(BinOp::Add, Expr::var("a"), int(1)),
            Expr::binary(BinOp::Xor, Expr::var("b"), int(2)),
        );
        let out = q.evaluate(&expr, None).unwrap();
        assert_eq!(out.slot(), 2);
        assert_eq!(q.registers().next_free(), 3);
        assert_eq!(
            listing(&q),
            vec!["add R0,1,R3", "xor R1,2,R4", "nop", "sub R3,R4,R2"]
        );
    }

    #[test]
    fn test_type_errors() {
        let mut q = queue();
        q.registers_mut().allocate("i", DType::Int).unwrap();
        q.registers_mut().allocate("f", DType::Float).unwrap();
        let mixed = Expr::binary(BinOp::Add, Expr::var("i"), Expr::var("f"));
        assert!(matches!(q.evaluate(&mixed, None), Err(CompileError::Type { .. })));
        let float_shift = Expr::binary(BinOp::Shl, Expr::var("f"), int(1));
        assert!(matches!(
            q.evaluate(&float_shift, None),
            Err(CompileError::Type { .. })
        ));
        let ok = Expr::binary(BinOp::Sub, Expr::var("f"), Expr::Float(0.25));
        assert_eq!(ok.dtype(q.registers()).unwrap(), DType::Float);
    }

    #[test]
    fn test_float_literal_is_fixed_point() {
        let mut q = queue();
        let f = q.registers_mut().allocate("f", DType::Float).unwrap();
        q.evaluate(&Expr::Float(-0.5), Some(f)).unwrap();
        assert_eq!(listing(&q), vec!["move 3221225472,R0"]);
        assert!(matches!(
            Expr::Float(1.5).fold(true),
            Err(CompileError::Value { .. })
        ));
    }

    #[test]
    fn test_undefined_variable() {
        let mut q = queue();
        assert!(matches!(
            q.evaluate(&Expr::var("ghost"), None),
            Err(CompileError::UndefinedName { .. })
        ));
    }

    #[test]
    fn test_display() {
        let expr = Expr::binary(
            BinOp::Add,
            Expr::var("a"),
            Expr::binary(BinOp::Shr, Expr::var("b"), int(2)),
        );
        assert_eq!(expr.to_string(), "a + (b >> 2)");
    }
}
