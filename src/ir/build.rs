//! AST → IR lowering (pass 6).
//!
//! Each expression lowers to an instruction list plus a result value.
//! `&&`/`||` become branches to preserve short-circuit evaluation, loops
//! expand around their `start_`/`continue_`/`break_` label triples, and
//! every function body ends with a synthetic `Return 0`.

use crate::ast;
use crate::context::Context;

use super::{BinaryOp, Function, Instruction, Program, UnaryOp, Value};

pub fn build_program(program: &ast::Program, ctx: &mut Context) -> Program {
    let functions = program
        .functions
        .iter()
        .filter(|f| f.body.is_some())
        .map(|f| build_function(f, ctx))
        .collect();
    Program { functions }
}

fn build_function(func: &ast::FunctionDecl, ctx: &mut Context) -> Function {
    let mut builder = Builder {
        ctx,
        instructions: Vec::new(),
    };
    if let Some(body) = &func.body {
        builder.emit_block(body);
    }
    // Control may fall off the end of the body; C says main-like functions
    // then return 0.
    builder
        .instructions
        .push(Instruction::Return(Some(Value::Constant(0))));

    Function {
        name: func.name.node.clone(),
        params: func.params.iter().map(|p| p.node.clone()).collect(),
        instructions: builder.instructions,
    }
}

struct Builder<'a> {
    ctx: &'a mut Context,
    instructions: Vec<Instruction>,
}

impl Builder<'_> {
    fn push(&mut self, instr: Instruction) {
        self.instructions.push(instr);
    }

    fn fresh_temp(&mut self) -> Value {
        Value::Var(self.ctx.fresh_name("tmp"))
    }

    fn emit_block(&mut self, block: &ast::Block) {
        for item in &block.items {
            match item {
                ast::BlockItem::Declaration(ast::Declaration::Var(decl)) => {
                    self.emit_var_decl(decl);
                }
                // Nested prototypes produce no code.
                ast::BlockItem::Declaration(ast::Declaration::Func(_)) => {}
                ast::BlockItem::Statement(stmt) => self.emit_statement(&stmt.node),
            }
        }
    }

    fn emit_var_decl(&mut self, decl: &ast::VarDecl) {
        // Uninitialized declarations reserve no instructions; the slot
        // appears when the variable is first written.
        if let Some(init) = &decl.init {
            let value = self.emit_expr(&init.node);
            self.push(Instruction::Copy {
                src: value,
                dst: Value::Var(decl.name.node.clone()),
            });
        }
    }

    fn emit_statement(&mut self, stmt: &ast::Stmt) {
        match stmt {
            ast::Stmt::Return(expr) => {
                let value = self.emit_expr(&expr.node);
                self.push(Instruction::Return(Some(value)));
            }
            ast::Stmt::Expression(expr) => {
                // Evaluate for effect, discard the result.
                self.emit_expr(&expr.node);
            }
            ast::Stmt::If {
                cond,
                then_stmt,
                else_stmt,
            } => self.emit_if(cond, then_stmt, else_stmt.as_deref()),
            ast::Stmt::Compound(block) => self.emit_block(block),
            ast::Stmt::Break { label } => {
                let label = loop_label(label);
                self.push(Instruction::Jump(format!("break_{}", label)));
            }
            ast::Stmt::Continue { label } => {
                let label = loop_label(label);
                self.push(Instruction::Jump(format!("continue_{}", label)));
            }
            ast::Stmt::While { cond, body, label } => {
                let label = loop_label(label);
                // `continue` re-tests the condition, so the condition check
                // doubles as the continue target.
                let continue_label = format!("continue_{}", label);
                let break_label = format!("break_{}", label);

                self.push(Instruction::Label(continue_label.clone()));
                let cond_value = self.emit_expr(&cond.node);
                self.push(Instruction::JumpIfZero {
                    cond: cond_value,
                    target: break_label.clone(),
                });
                self.emit_statement(&body.node);
                self.push(Instruction::Jump(continue_label));
                self.push(Instruction::Label(break_label));
            }
            ast::Stmt::DoWhile { body, cond, label } => {
                let label = loop_label(label);
                let start_label = format!("start_{}", label);
                let continue_label = format!("continue_{}", label);
                let break_label = format!("break_{}", label);

                self.push(Instruction::Label(start_label.clone()));
                self.emit_statement(&body.node);
                self.push(Instruction::Label(continue_label));
                let cond_value = self.emit_expr(&cond.node);
                self.push(Instruction::JumpIfNotZero {
                    cond: cond_value,
                    target: start_label,
                });
                self.push(Instruction::Label(break_label));
            }
            ast::Stmt::For {
                init,
                cond,
                post,
                body,
                label,
            } => {
                let label = loop_label(label);
                let start_label = format!("start_{}", label);
                let continue_label = format!("continue_{}", label);
                let break_label = format!("break_{}", label);

                match init {
                    ast::ForInit::Declaration(decl) => self.emit_var_decl(decl),
                    ast::ForInit::Expression(Some(expr)) => {
                        self.emit_expr(&expr.node);
                    }
                    ast::ForInit::Expression(None) => {}
                }

                self.push(Instruction::Label(start_label.clone()));
                // A missing condition is always true: fall straight through.
                if let Some(cond) = cond {
                    let cond_value = self.emit_expr(&cond.node);
                    self.push(Instruction::JumpIfZero {
                        cond: cond_value,
                        target: break_label.clone(),
                    });
                }
                self.emit_statement(&body.node);
                // `continue` lands here so the post-step still runs.
                self.push(Instruction::Label(continue_label));
                if let Some(post) = post {
                    self.emit_expr(&post.node);
                }
                self.push(Instruction::Jump(start_label));
                self.push(Instruction::Label(break_label));
            }
            ast::Stmt::Null => {}
        }
    }

    fn emit_if(
        &mut self,
        cond: &crate::span::Spanned<ast::Expr>,
        then_stmt: &crate::span::Spanned<ast::Stmt>,
        else_stmt: Option<&crate::span::Spanned<ast::Stmt>>,
    ) {
        let cond_value = self.emit_expr(&cond.node);
        match else_stmt {
            None => {
                let end_label = self.ctx.fresh_label("end");
                self.push(Instruction::JumpIfZero {
                    cond: cond_value,
                    target: end_label.clone(),
                });
                self.emit_statement(&then_stmt.node);
                self.push(Instruction::Label(end_label));
            }
            Some(else_stmt) => {
                let else_label = self.ctx.fresh_label("else");
                self.push(Instruction::JumpIfZero {
                    cond: cond_value,
                    target: else_label.clone(),
                });
                self.emit_statement(&then_stmt.node);
                let end_label = self.ctx.fresh_label("end");
                self.push(Instruction::Jump(end_label.clone()));
                self.push(Instruction::Label(else_label));
                self.emit_statement(&else_stmt.node);
                self.push(Instruction::Label(end_label));
            }
        }
    }

    fn emit_expr(&mut self, expr: &ast::Expr) -> Value {
        match expr {
            ast::Expr::Constant(n) => Value::Constant(*n),
            ast::Expr::Var(name) => Value::Var(name.node.clone()),
            ast::Expr::Unary { op, operand } => {
                let src = self.emit_expr(&operand.node);
                let dst = self.fresh_temp();
                self.push(Instruction::Unary {
                    op: lower_unary_op(*op),
                    src,
                    dst: dst.clone(),
                });
                dst
            }
            ast::Expr::Binary { op, lhs, rhs } if op.is_short_circuit() => {
                self.emit_short_circuit(*op, lhs, rhs)
            }
            ast::Expr::Binary { op, lhs, rhs } => {
                let src1 = self.emit_expr(&lhs.node);
                let src2 = self.emit_expr(&rhs.node);
                let dst = self.fresh_temp();
                self.push(Instruction::Binary {
                    op: lower_binary_op(*op),
                    src1,
                    src2,
                    dst: dst.clone(),
                });
                dst
            }
            ast::Expr::Assignment { lhs, rhs } => {
                let value = self.emit_expr(&rhs.node);
                let dst = self.emit_expr(&lhs.node);
                self.push(Instruction::Copy {
                    src: value,
                    dst: dst.clone(),
                });
                dst
            }
            ast::Expr::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                let result = self.fresh_temp();

                let cond_value = self.emit_expr(&cond.node);
                let else_label = self.ctx.fresh_label("else_branch");
                self.push(Instruction::JumpIfZero {
                    cond: cond_value,
                    target: else_label.clone(),
                });

                let then_value = self.emit_expr(&then_expr.node);
                self.push(Instruction::Copy {
                    src: then_value,
                    dst: result.clone(),
                });
                let end_label = self.ctx.fresh_label("end");
                self.push(Instruction::Jump(end_label.clone()));

                self.push(Instruction::Label(else_label));
                let else_value = self.emit_expr(&else_expr.node);
                self.push(Instruction::Copy {
                    src: else_value,
                    dst: result.clone(),
                });

                self.push(Instruction::Label(end_label));
                result
            }
            ast::Expr::Call { name, args } => {
                let arg_values = args.iter().map(|a| self.emit_expr(&a.node)).collect();
                let dst = self.fresh_temp();
                self.push(Instruction::Call {
                    name: name.node.clone(),
                    args: arg_values,
                    dst: dst.clone(),
                });
                dst
            }
        }
    }

    /// `&&` and `||` evaluate the right operand only when the left does not
    /// already determine the result.
    fn emit_short_circuit(
        &mut self,
        op: ast::BinaryOp,
        lhs: &crate::span::Spanned<ast::Expr>,
        rhs: &crate::span::Spanned<ast::Expr>,
    ) -> Value {
        let is_and = op == ast::BinaryOp::And;
        let result = self.fresh_temp();
        let short_label = self.ctx.fresh_label("short");
        let end_label = self.ctx.fresh_label("end");

        let lhs_value = self.emit_expr(&lhs.node);
        self.push(short_circuit_branch(is_and, lhs_value, &short_label));

        let rhs_value = self.emit_expr(&rhs.node);
        self.push(short_circuit_branch(is_and, rhs_value, &short_label));

        // Fall-through: AND is true, OR is false.
        self.push(Instruction::Copy {
            src: Value::Constant(if is_and { 1 } else { 0 }),
            dst: result.clone(),
        });
        self.push(Instruction::Jump(end_label.clone()));

        self.push(Instruction::Label(short_label));
        self.push(Instruction::Copy {
            src: Value::Constant(if is_and { 0 } else { 1 }),
            dst: result.clone(),
        });

        self.push(Instruction::Label(end_label));
        result
    }
}

fn short_circuit_branch(is_and: bool, cond: Value, target: &str) -> Instruction {
    if is_and {
        Instruction::JumpIfZero {
            cond,
            target: target.to_string(),
        }
    } else {
        Instruction::JumpIfNotZero {
            cond,
            target: target.to_string(),
        }
    }
}

fn loop_label(label: &Option<String>) -> &str {
    label
        .as_deref()
        .expect("loop labelling pass must run before IR generation")
}

fn lower_unary_op(op: ast::UnaryOp) -> UnaryOp {
    match op {
        ast::UnaryOp::Complement => UnaryOp::Complement,
        ast::UnaryOp::Negate => UnaryOp::Negate,
        ast::UnaryOp::Not => UnaryOp::Not,
    }
}

fn lower_binary_op(op: ast::BinaryOp) -> BinaryOp {
    match op {
        ast::BinaryOp::Add => BinaryOp::Add,
        ast::BinaryOp::Subtract => BinaryOp::Subtract,
        ast::BinaryOp::Multiply => BinaryOp::Multiply,
        ast::BinaryOp::Divide => BinaryOp::Divide,
        ast::BinaryOp::Remainder => BinaryOp::Remainder,
        ast::BinaryOp::Equal => BinaryOp::Equal,
        ast::BinaryOp::NotEqual => BinaryOp::NotEqual,
        ast::BinaryOp::LessThan => BinaryOp::LessThan,
        ast::BinaryOp::LessOrEqual => BinaryOp::LessOrEqual,
        ast::BinaryOp::GreaterThan => BinaryOp::GreaterThan,
        ast::BinaryOp::GreaterOrEqual => BinaryOp::GreaterOrEqual,
        ast::BinaryOp::And | ast::BinaryOp::Or => {
            unreachable!("short-circuit operators lower through control flow")
        }
    }
}
