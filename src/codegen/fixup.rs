//! Backend stage B: pseudo lowering and instruction fixup (pass 8).
//!
//! First every `Pseudo` operand gets a 4-byte stack slot (negative offsets
//! from `%rbp`, first-seen order). Then the instruction list is rewritten
//! to respect x86 operand rules, with `%r10d` as the generic scratch
//! register and `%r11d` reserved for `imul` destinations. The function's
//! frame allocation is prepended, rounded up to a multiple of 16 so calls
//! only need the 8-byte padding stage A already inserted.

use std::collections::HashMap;

use super::{AsmBinaryOp, AsmFunction, AsmInstruction, AsmProgram, Operand, Reg};

pub fn fix_program(program: &mut AsmProgram) {
    for func in &mut program.functions {
        fix_function(func);
    }
}

fn fix_function(func: &mut AsmFunction) {
    let raw_size = replace_pseudos(func);

    let mut fixed = Vec::with_capacity(func.instructions.len() + 1);
    fixed.push(AsmInstruction::AllocateStack(round_up_16(raw_size)));
    for instr in func.instructions.drain(..) {
        fix_instruction(instr, &mut fixed);
    }
    func.instructions = fixed;
}

/// Round a frame size up to the next multiple of 16 bytes.
pub fn round_up_16(size: i64) -> i64 {
    if size > 0 {
        (size + 15) & !15
    } else {
        0
    }
}

/// Assign each pseudo register a stack slot and return the raw frame size.
fn replace_pseudos(func: &mut AsmFunction) -> i64 {
    let mut slots: HashMap<String, i64> = HashMap::new();
    let mut frame_size: i64 = 0;

    {
        let mut resolve = |op: &mut Operand| {
            if let Operand::Pseudo(name) = op {
                let offset = *slots.entry(std::mem::take(name)).or_insert_with(|| {
                    frame_size += 4;
                    frame_size
                });
                *op = Operand::Stack(-offset);
            }
        };

        for instr in &mut func.instructions {
            match instr {
                AsmInstruction::Mov { src, dst }
                | AsmInstruction::Binary { src, dst, .. } => {
                    resolve(src);
                    resolve(dst);
                }
                AsmInstruction::Cmp { lhs, rhs } => {
                    resolve(lhs);
                    resolve(rhs);
                }
                AsmInstruction::Unary { operand, .. }
                | AsmInstruction::Idiv(operand)
                | AsmInstruction::Push(operand) => resolve(operand),
                AsmInstruction::SetCC { dst, .. } => resolve(dst),
                AsmInstruction::Cdq
                | AsmInstruction::Jmp(_)
                | AsmInstruction::JmpCC { .. }
                | AsmInstruction::Label(_)
                | AsmInstruction::AllocateStack(_)
                | AsmInstruction::DeallocateStack(_)
                | AsmInstruction::Call(_)
                | AsmInstruction::Ret => {}
            }
        }
    }

    frame_size
}

/// Rewrite operand combinations the hardware rejects.
fn fix_instruction(instr: AsmInstruction, out: &mut Vec<AsmInstruction>) {
    let r10 = Operand::Reg(Reg::R10);
    let r11 = Operand::Reg(Reg::R11);

    match instr {
        // mov cannot copy memory to memory.
        AsmInstruction::Mov { src, dst } if src.is_memory() && dst.is_memory() => {
            out.push(AsmInstruction::Mov {
                src,
                dst: r10.clone(),
            });
            out.push(AsmInstruction::Mov { src: r10, dst });
        }
        // add/sub cannot take two memory operands.
        AsmInstruction::Binary {
            op: op @ (AsmBinaryOp::Add | AsmBinaryOp::Sub),
            src,
            dst,
        } if src.is_memory() && dst.is_memory() => {
            out.push(AsmInstruction::Mov {
                src,
                dst: r10.clone(),
            });
            out.push(AsmInstruction::Binary { op, src: r10, dst });
        }
        // imul cannot target memory.
        AsmInstruction::Binary {
            op: AsmBinaryOp::Mult,
            src,
            dst,
        } if dst.is_memory() => {
            out.push(AsmInstruction::Mov {
                src: dst.clone(),
                dst: r11.clone(),
            });
            out.push(AsmInstruction::Binary {
                op: AsmBinaryOp::Mult,
                src,
                dst: r11.clone(),
            });
            out.push(AsmInstruction::Mov { src: r11, dst });
        }
        // idiv cannot divide by an immediate.
        AsmInstruction::Idiv(divisor) if divisor.is_immediate() => {
            out.push(AsmInstruction::Mov {
                src: divisor,
                dst: r10.clone(),
            });
            out.push(AsmInstruction::Idiv(r10));
        }
        // cmp cannot take two memory operands...
        AsmInstruction::Cmp { lhs, rhs } if lhs.is_memory() && rhs.is_memory() => {
            out.push(AsmInstruction::Mov {
                src: lhs,
                dst: r10.clone(),
            });
            out.push(AsmInstruction::Cmp { lhs: r10, rhs });
        }
        // ...nor an immediate second operand.
        AsmInstruction::Cmp { lhs, rhs } if rhs.is_immediate() => {
            out.push(AsmInstruction::Mov {
                src: rhs,
                dst: r10.clone(),
            });
            out.push(AsmInstruction::Cmp { lhs, rhs: r10 });
        }
        other => out.push(other),
    }
}
