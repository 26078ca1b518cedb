//! Three-address intermediate representation.
//!
//! Every instruction has at most one operator and three operands; nested
//! expressions are gone by the time a tree reaches this form. Control flow
//! is explicit through labels and jumps, and every destination is a
//! variable (α-renamed user local or `tmp.N` temporary).

pub mod build;

use std::fmt;

#[derive(Clone, Debug, PartialEq)]
pub struct Program {
    pub functions: Vec<Function>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub instructions: Vec<Instruction>,
}

/// An IR operand: a constant or a named variable.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Constant(i64),
    Var(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOp {
    Complement,
    Negate,
    Not,
}

/// Binary IR operators. `&&` and `||` never reach the IR; the builder
/// lowers them to branches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl BinaryOp {
    /// True for `== != < <= > >=`, which lower to `Cmp` + `SetCC`.
    pub fn is_relational(&self) -> bool {
        matches!(
            self,
            BinaryOp::Equal
                | BinaryOp::NotEqual
                | BinaryOp::LessThan
                | BinaryOp::LessOrEqual
                | BinaryOp::GreaterThan
                | BinaryOp::GreaterOrEqual
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Return(Option<Value>),
    Unary {
        op: UnaryOp,
        src: Value,
        dst: Value,
    },
    Binary {
        op: BinaryOp,
        src1: Value,
        src2: Value,
        dst: Value,
    },
    Copy {
        src: Value,
        dst: Value,
    },
    Jump(String),
    JumpIfZero {
        cond: Value,
        target: String,
    },
    JumpIfNotZero {
        cond: Value,
        target: String,
    },
    Label(String),
    Call {
        name: String,
        args: Vec<Value>,
        dst: Value,
    },
}

impl Instruction {
    /// The destination variable written by this instruction, if any.
    pub fn dst(&self) -> Option<&Value> {
        match self {
            Instruction::Unary { dst, .. }
            | Instruction::Binary { dst, .. }
            | Instruction::Copy { dst, .. }
            | Instruction::Call { dst, .. } => Some(dst),
            _ => None,
        }
    }
}

// ─── Display (the `--tacky` dump format) ─────────────────────────

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Constant(n) => write!(f, "{}", n),
            Value::Var(name) => write!(f, "{}", name),
        }
    }
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnaryOp::Complement => "comp",
            UnaryOp::Negate => "neg",
            UnaryOp::Not => "not",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "add",
            BinaryOp::Subtract => "sub",
            BinaryOp::Multiply => "mul",
            BinaryOp::Divide => "div",
            BinaryOp::Remainder => "rem",
            BinaryOp::Equal => "eq",
            BinaryOp::NotEqual => "ne",
            BinaryOp::LessThan => "lt",
            BinaryOp::LessOrEqual => "le",
            BinaryOp::GreaterThan => "gt",
            BinaryOp::GreaterOrEqual => "ge",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Return(Some(v)) => write!(f, "ret {}", v),
            Instruction::Return(None) => write!(f, "ret"),
            Instruction::Unary { op, src, dst } => write!(f, "{} = {} {}", dst, op, src),
            Instruction::Binary {
                op,
                src1,
                src2,
                dst,
            } => write!(f, "{} = {} {}, {}", dst, op, src1, src2),
            Instruction::Copy { src, dst } => write!(f, "{} = {}", dst, src),
            Instruction::Jump(target) => write!(f, "jmp {}", target),
            Instruction::JumpIfZero { cond, target } => write!(f, "jz {}, {}", cond, target),
            Instruction::JumpIfNotZero { cond, target } => write!(f, "jnz {}, {}", cond, target),
            Instruction::Label(name) => write!(f, "{}:", name),
            Instruction::Call { name, args, dst } => {
                let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{} = call {}({})", dst, name, rendered.join(", "))
            }
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "fn {}({}):", self.name, self.params.join(", "))?;
        for instr in &self.instructions {
            match instr {
                Instruction::Label(_) => writeln!(f, "{}", instr)?,
                _ => writeln!(f, "  {}", instr)?,
            }
        }
        Ok(())
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for func in &self.functions {
            writeln!(f, "{}", func)?;
        }
        Ok(())
    }
}
