//! Backend stage A: IR → pseudo-asm (pass 7).
//!
//! Operands stay abstract (`Pseudo` for every IR variable); stage B picks
//! the stack layout. The calling convention is System V AMD64: first six
//! integer arguments in registers, the rest on the stack in 8-byte slots,
//! stack 16-byte aligned at every `call`.

use crate::ir;

use super::{
    AsmBinaryOp, AsmFunction, AsmInstruction, AsmProgram, AsmUnaryOp, CondCode, Operand, Reg,
};

/// Integer argument registers, in ABI order.
pub const ARG_REGISTERS: [Reg; 6] = [Reg::Di, Reg::Si, Reg::Dx, Reg::Cx, Reg::R8, Reg::R9];

pub fn lower_program(ir: &ir::Program) -> AsmProgram {
    AsmProgram {
        functions: ir.functions.iter().map(lower_function).collect(),
    }
}

fn lower_function(func: &ir::Function) -> AsmFunction {
    let mut instructions = Vec::new();

    // Copy incoming arguments into pseudo registers so the argument
    // registers are free for calls made by this function.
    for (i, param) in func.params.iter().enumerate() {
        let src = if i < ARG_REGISTERS.len() {
            Operand::Reg(ARG_REGISTERS[i])
        } else {
            // 0(%rbp) holds the saved %rbp and 8(%rbp) the return address,
            // so the 7th argument lives at 16(%rbp), the 8th at 24(%rbp)...
            Operand::Stack(16 + 8 * (i as i64 - 6))
        };
        instructions.push(AsmInstruction::Mov {
            src,
            dst: Operand::Pseudo(param.clone()),
        });
    }

    for instr in &func.instructions {
        lower_instruction(instr, &mut instructions);
    }

    AsmFunction {
        name: func.name.clone(),
        instructions,
    }
}

fn operand(value: &ir::Value) -> Operand {
    match value {
        ir::Value::Constant(n) => Operand::Imm(*n),
        ir::Value::Var(name) => Operand::Pseudo(name.clone()),
    }
}

fn lower_instruction(instr: &ir::Instruction, out: &mut Vec<AsmInstruction>) {
    match instr {
        ir::Instruction::Return(value) => {
            if let Some(value) = value {
                out.push(AsmInstruction::Mov {
                    src: operand(value),
                    dst: Operand::Reg(Reg::Ax),
                });
            }
            out.push(AsmInstruction::Ret);
        }
        ir::Instruction::Unary {
            op: ir::UnaryOp::Not,
            src,
            dst,
        } => {
            // `!x` is a comparison in disguise.
            let dst = operand(dst);
            out.push(AsmInstruction::Cmp {
                lhs: Operand::Imm(0),
                rhs: operand(src),
            });
            out.push(AsmInstruction::Mov {
                src: Operand::Imm(0),
                dst: dst.clone(),
            });
            out.push(AsmInstruction::SetCC {
                cc: CondCode::E,
                dst,
            });
        }
        ir::Instruction::Unary { op, src, dst } => {
            let dst = operand(dst);
            out.push(AsmInstruction::Mov {
                src: operand(src),
                dst: dst.clone(),
            });
            out.push(AsmInstruction::Unary {
                op: match op {
                    ir::UnaryOp::Negate => AsmUnaryOp::Neg,
                    ir::UnaryOp::Complement => AsmUnaryOp::Not,
                    ir::UnaryOp::Not => unreachable!("handled above"),
                },
                operand: dst,
            });
        }
        ir::Instruction::Binary {
            op: op @ (ir::BinaryOp::Divide | ir::BinaryOp::Remainder),
            src1,
            src2,
            dst,
        } => {
            // idiv divides the 64-bit value in edx:eax; cdq sign-extends
            // eax into edx first. Quotient lands in eax, remainder in edx.
            out.push(AsmInstruction::Mov {
                src: operand(src1),
                dst: Operand::Reg(Reg::Ax),
            });
            out.push(AsmInstruction::Cdq);
            out.push(AsmInstruction::Idiv(operand(src2)));
            let result = if *op == ir::BinaryOp::Divide {
                Reg::Ax
            } else {
                Reg::Dx
            };
            out.push(AsmInstruction::Mov {
                src: Operand::Reg(result),
                dst: operand(dst),
            });
        }
        ir::Instruction::Binary { op, src1, src2, dst } if op.is_relational() => {
            out.push(AsmInstruction::Cmp {
                lhs: operand(src2),
                rhs: operand(src1),
            });
            let dst = operand(dst);
            out.push(AsmInstruction::Mov {
                src: Operand::Imm(0),
                dst: dst.clone(),
            });
            out.push(AsmInstruction::SetCC {
                cc: cond_code(*op),
                dst,
            });
        }
        ir::Instruction::Binary { op, src1, src2, dst } => {
            let dst = operand(dst);
            out.push(AsmInstruction::Mov {
                src: operand(src1),
                dst: dst.clone(),
            });
            out.push(AsmInstruction::Binary {
                op: match op {
                    ir::BinaryOp::Add => AsmBinaryOp::Add,
                    ir::BinaryOp::Subtract => AsmBinaryOp::Sub,
                    ir::BinaryOp::Multiply => AsmBinaryOp::Mult,
                    _ => unreachable!("division and relationals handled above"),
                },
                src: operand(src2),
                dst,
            });
        }
        ir::Instruction::Copy { src, dst } => {
            out.push(AsmInstruction::Mov {
                src: operand(src),
                dst: operand(dst),
            });
        }
        ir::Instruction::Jump(target) => {
            out.push(AsmInstruction::Jmp(target.clone()));
        }
        ir::Instruction::JumpIfZero { cond, target } => {
            lower_branch(CondCode::E, cond, target, out);
        }
        ir::Instruction::JumpIfNotZero { cond, target } => {
            lower_branch(CondCode::Ne, cond, target, out);
        }
        ir::Instruction::Label(name) => {
            out.push(AsmInstruction::Label(name.clone()));
        }
        ir::Instruction::Call { name, args, dst } => {
            lower_call(name, args, dst, out);
        }
    }
}

fn lower_branch(cc: CondCode, cond: &ir::Value, target: &str, out: &mut Vec<AsmInstruction>) {
    out.push(AsmInstruction::Cmp {
        lhs: Operand::Imm(0),
        rhs: operand(cond),
    });
    out.push(AsmInstruction::JmpCC {
        cc,
        target: target.to_string(),
    });
}

fn lower_call(name: &str, args: &[ir::Value], dst: &ir::Value, out: &mut Vec<AsmInstruction>) {
    let register_args = &args[..args.len().min(6)];
    let stack_args = if args.len() > 6 { &args[6..] } else { &[][..] };

    // Each stack argument occupies 8 bytes; with an odd count the stack
    // would be 8 off from 16-byte alignment at the call, so pad first.
    let padding = if stack_args.len() % 2 == 1 { 8 } else { 0 };
    if padding != 0 {
        out.push(AsmInstruction::AllocateStack(padding));
    }

    for (i, arg) in register_args.iter().enumerate() {
        out.push(AsmInstruction::Mov {
            src: operand(arg),
            dst: Operand::Reg(ARG_REGISTERS[i]),
        });
    }

    // Stack arguments are pushed in reverse so the 7th ends up lowest.
    for arg in stack_args.iter().rev() {
        let arg = operand(arg);
        if arg.is_immediate() || matches!(arg, Operand::Reg(_)) {
            out.push(AsmInstruction::Push(arg));
        } else {
            // push cannot take a memory operand in our instruction subset;
            // stage a copy through %eax and push the full register.
            out.push(AsmInstruction::Mov {
                src: arg,
                dst: Operand::Reg(Reg::Ax),
            });
            out.push(AsmInstruction::Push(Operand::Reg(Reg::Ax)));
        }
    }

    out.push(AsmInstruction::Call(name.to_string()));

    let teardown = 8 * stack_args.len() as i64 + padding;
    if teardown > 0 {
        out.push(AsmInstruction::DeallocateStack(teardown));
    }

    out.push(AsmInstruction::Mov {
        src: Operand::Reg(Reg::Ax),
        dst: operand(dst),
    });
}

fn cond_code(op: ir::BinaryOp) -> CondCode {
    match op {
        ir::BinaryOp::Equal => CondCode::E,
        ir::BinaryOp::NotEqual => CondCode::Ne,
        ir::BinaryOp::LessThan => CondCode::L,
        ir::BinaryOp::LessOrEqual => CondCode::Le,
        ir::BinaryOp::GreaterThan => CondCode::G,
        ir::BinaryOp::GreaterOrEqual => CondCode::Ge,
        _ => unreachable!("not a relational operator"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, Function, Instruction, Program, UnaryOp, Value};

    fn lower_one(instructions: Vec<Instruction>) -> Vec<AsmInstruction> {
        let program = Program {
            functions: vec![Function {
                name: "f".into(),
                params: vec![],
                instructions,
            }],
        };
        lower_program(&program).functions.remove(0).instructions
    }

    fn tmp(n: u32) -> Value {
        Value::Var(format!("tmp.{}", n))
    }

    #[test]
    fn test_return_moves_through_eax() {
        let asm = lower_one(vec![Instruction::Return(Some(Value::Constant(2)))]);
        assert_eq!(
            asm,
            vec![
                AsmInstruction::Mov {
                    src: Operand::Imm(2),
                    dst: Operand::Reg(Reg::Ax),
                },
                AsmInstruction::Ret,
            ]
        );
    }

    #[test]
    fn test_not_lowers_to_cmp_setcc() {
        let asm = lower_one(vec![Instruction::Unary {
            op: UnaryOp::Not,
            src: Value::Constant(5),
            dst: tmp(0),
        }]);
        assert_eq!(
            asm,
            vec![
                AsmInstruction::Cmp {
                    lhs: Operand::Imm(0),
                    rhs: Operand::Imm(5),
                },
                AsmInstruction::Mov {
                    src: Operand::Imm(0),
                    dst: Operand::Pseudo("tmp.0".into()),
                },
                AsmInstruction::SetCC {
                    cc: CondCode::E,
                    dst: Operand::Pseudo("tmp.0".into()),
                },
            ]
        );
    }

    #[test]
    fn test_division_uses_cdq_idiv() {
        let asm = lower_one(vec![Instruction::Binary {
            op: BinaryOp::Divide,
            src1: tmp(0),
            src2: Value::Constant(4),
            dst: tmp(1),
        }]);
        assert_eq!(asm[0], AsmInstruction::Mov {
            src: Operand::Pseudo("tmp.0".into()),
            dst: Operand::Reg(Reg::Ax),
        });
        assert_eq!(asm[1], AsmInstruction::Cdq);
        assert_eq!(asm[2], AsmInstruction::Idiv(Operand::Imm(4)));
        assert_eq!(asm[3], AsmInstruction::Mov {
            src: Operand::Reg(Reg::Ax),
            dst: Operand::Pseudo("tmp.1".into()),
        });
    }

    #[test]
    fn test_remainder_reads_edx() {
        let asm = lower_one(vec![Instruction::Binary {
            op: BinaryOp::Remainder,
            src1: tmp(0),
            src2: tmp(1),
            dst: tmp(2),
        }]);
        assert_eq!(
            asm[3],
            AsmInstruction::Mov {
                src: Operand::Reg(Reg::Dx),
                dst: Operand::Pseudo("tmp.2".into()),
            }
        );
    }

    #[test]
    fn test_relational_swaps_cmp_operands() {
        // IR `lt a, b` compares with `cmpl b, a` so the flags describe a-b.
        let asm = lower_one(vec![Instruction::Binary {
            op: BinaryOp::LessThan,
            src1: Value::Var("a.0".into()),
            src2: Value::Var("b.1".into()),
            dst: tmp(0),
        }]);
        assert_eq!(
            asm[0],
            AsmInstruction::Cmp {
                lhs: Operand::Pseudo("b.1".into()),
                rhs: Operand::Pseudo("a.0".into()),
            }
        );
        assert_eq!(
            asm[2],
            AsmInstruction::SetCC {
                cc: CondCode::L,
                dst: Operand::Pseudo("tmp.0".into()),
            }
        );
    }

    #[test]
    fn test_register_params_copied_to_pseudos() {
        let program = Program {
            functions: vec![Function {
                name: "f".into(),
                params: vec!["a.0".into(), "b.1".into()],
                instructions: vec![Instruction::Return(Some(Value::Constant(0)))],
            }],
        };
        let asm = lower_program(&program).functions.remove(0).instructions;
        assert_eq!(
            asm[0],
            AsmInstruction::Mov {
                src: Operand::Reg(Reg::Di),
                dst: Operand::Pseudo("a.0".into()),
            }
        );
        assert_eq!(
            asm[1],
            AsmInstruction::Mov {
                src: Operand::Reg(Reg::Si),
                dst: Operand::Pseudo("b.1".into()),
            }
        );
    }

    #[test]
    fn test_seventh_param_comes_from_stack() {
        let params: Vec<String> = (0..8).map(|i| format!("p{}.{}", i, i)).collect();
        let program = Program {
            functions: vec![Function {
                name: "f".into(),
                params,
                instructions: vec![],
            }],
        };
        let asm = lower_program(&program).functions.remove(0).instructions;
        assert_eq!(
            asm[6],
            AsmInstruction::Mov {
                src: Operand::Stack(16),
                dst: Operand::Pseudo("p6.6".into()),
            }
        );
        assert_eq!(
            asm[7],
            AsmInstruction::Mov {
                src: Operand::Stack(24),
                dst: Operand::Pseudo("p7.7".into()),
            }
        );
    }

    #[test]
    fn test_call_with_register_args_only() {
        let asm = lower_one(vec![Instruction::Call {
            name: "foo".into(),
            args: vec![Value::Constant(3)],
            dst: tmp(0),
        }]);
        assert_eq!(
            asm,
            vec![
                AsmInstruction::Mov {
                    src: Operand::Imm(3),
                    dst: Operand::Reg(Reg::Di),
                },
                AsmInstruction::Call("foo".into()),
                AsmInstruction::Mov {
                    src: Operand::Reg(Reg::Ax),
                    dst: Operand::Pseudo("tmp.0".into()),
                },
            ]
        );
    }

    #[test]
    fn test_call_with_odd_stack_args_pads() {
        // 7 args: one on the stack, so 8 bytes of padding restore
        // 16-byte alignment, and teardown removes both.
        let args: Vec<Value> = (0..7).map(Value::Constant).collect();
        let asm = lower_one(vec![Instruction::Call {
            name: "foo".into(),
            args,
            dst: tmp(0),
        }]);
        assert_eq!(asm[0], AsmInstruction::AllocateStack(8));
        assert_eq!(asm[7], AsmInstruction::Push(Operand::Imm(6)));
        assert_eq!(asm[8], AsmInstruction::Call("foo".into()));
        assert_eq!(asm[9], AsmInstruction::DeallocateStack(16));
    }

    #[test]
    fn test_call_with_even_stack_args_no_padding() {
        let args: Vec<Value> = (0..8).map(Value::Constant).collect();
        let asm = lower_one(vec![Instruction::Call {
            name: "foo".into(),
            args,
            dst: tmp(0),
        }]);
        assert!(!asm.iter().any(|i| *i == AsmInstruction::AllocateStack(8)));
        // Stack args pushed in reverse: 7 then 6
        assert_eq!(asm[6], AsmInstruction::Push(Operand::Imm(7)));
        assert_eq!(asm[7], AsmInstruction::Push(Operand::Imm(6)));
        assert!(asm.contains(&AsmInstruction::DeallocateStack(16)));
    }

    #[test]
    fn test_memory_stack_arg_goes_through_rax() {
        let args: Vec<Value> = (0..6)
            .map(Value::Constant)
            .chain([Value::Var("x.0".into())])
            .collect();
        let asm = lower_one(vec![Instruction::Call {
            name: "foo".into(),
            args,
            dst: tmp(0),
        }]);
        let pos = asm
            .iter()
            .position(|i| {
                *i == AsmInstruction::Mov {
                    src: Operand::Pseudo("x.0".into()),
                    dst: Operand::Reg(Reg::Ax),
                }
            })
            .expect("stack arg must be staged through %eax");
        assert_eq!(asm[pos + 1], AsmInstruction::Push(Operand::Reg(Reg::Ax)));
    }
}
