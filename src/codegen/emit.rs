//! AT&T-syntax text emission (pass 9).
//!
//! Output contract: instructions are indented four spaces, code labels
//! two, function labels and directives none. Immediates print as
//! `$<decimal>`, registers as `%<name>`, stack slots as `<offset>(%rbp)`
//! with signed offsets. Calls to functions the program never defines are
//! suffixed `@PLT` for the dynamic linker.

use crate::sema::{Symbol, SymbolTable};

use super::{AsmFunction, AsmInstruction, AsmProgram, Operand};

pub struct Emitter<'a> {
    symbols: &'a SymbolTable,
    output: Vec<String>,
}

impl<'a> Emitter<'a> {
    pub fn new(symbols: &'a SymbolTable) -> Self {
        Self {
            symbols,
            output: Vec::new(),
        }
    }

    pub fn emit_program(mut self, program: &AsmProgram) -> String {
        for func in &program.functions {
            self.emit_function(func);
        }
        // Mark the stack non-executable.
        self.raw(".section .note.GNU-stack,\"\",@progbits");
        let mut text = self.output.join("\n");
        text.push('\n');
        text
    }

    fn emit_function(&mut self, func: &AsmFunction) {
        self.raw(&format!(".globl {}", func.name));
        self.raw(&format!("{}:", func.name));
        self.inst("pushq %rbp");
        self.inst("movq %rsp, %rbp");
        for instr in &func.instructions {
            self.emit_instruction(instr);
        }
    }

    fn emit_instruction(&mut self, instr: &AsmInstruction) {
        match instr {
            AsmInstruction::Mov { src, dst } => {
                self.inst(&format!("movl {}, {}", op32(src), op32(dst)));
            }
            AsmInstruction::Unary { op, operand } => {
                self.inst(&format!("{} {}", op.mnemonic(), op32(operand)));
            }
            AsmInstruction::Binary { op, src, dst } => {
                self.inst(&format!("{} {}, {}", op.mnemonic(), op32(src), op32(dst)));
            }
            AsmInstruction::Cmp { lhs, rhs } => {
                self.inst(&format!("cmpl {}, {}", op32(lhs), op32(rhs)));
            }
            AsmInstruction::Idiv(divisor) => {
                self.inst(&format!("idivl {}", op32(divisor)));
            }
            AsmInstruction::Cdq => self.inst("cdq"),
            AsmInstruction::Jmp(target) => self.inst(&format!("jmp {}", target)),
            AsmInstruction::JmpCC { cc, target } => {
                self.inst(&format!("j{} {}", cc.as_str(), target));
            }
            AsmInstruction::SetCC { cc, dst } => {
                self.inst(&format!("set{} {}", cc.as_str(), op8(dst)));
            }
            AsmInstruction::Label(name) => {
                self.output.push(format!("  {}:", name));
            }
            AsmInstruction::AllocateStack(bytes) => {
                self.inst(&format!("subq ${}, %rsp", bytes));
            }
            AsmInstruction::DeallocateStack(bytes) => {
                self.inst(&format!("addq ${}, %rsp", bytes));
            }
            AsmInstruction::Push(operand) => {
                self.inst(&format!("pushq {}", op64(operand)));
            }
            AsmInstruction::Call(name) => {
                let external = matches!(
                    self.symbols.get(name),
                    Some(Symbol::Func { defined: false, .. })
                );
                if external {
                    self.inst(&format!("call {}@PLT", name));
                } else {
                    self.inst(&format!("call {}", name));
                }
            }
            AsmInstruction::Ret => {
                self.inst("movq %rbp, %rsp");
                self.inst("popq %rbp");
                self.inst("ret");
                self.raw("");
            }
        }
    }

    fn inst(&mut self, text: &str) {
        self.output.push(format!("    {}", text));
    }

    fn raw(&mut self, line: &str) {
        self.output.push(line.to_string());
    }
}

fn op32(operand: &Operand) -> String {
    match operand {
        Operand::Imm(n) => format!("${}", n),
        Operand::Reg(reg) => reg.name32().to_string(),
        Operand::Stack(offset) => format!("{}(%rbp)", offset),
        Operand::Pseudo(name) => unreachable!("pseudo operand '{}' survived fixup", name),
    }
}

fn op8(operand: &Operand) -> String {
    match operand {
        Operand::Reg(reg) => reg.name8().to_string(),
        other => op32(other),
    }
}

fn op64(operand: &Operand) -> String {
    match operand {
        Operand::Reg(reg) => reg.name64().to_string(),
        other => op32(other),
    }
}
