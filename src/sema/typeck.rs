//! Type checking (pass 4).
//!
//! Populates the process-wide symbol table keyed by unique name. Each node
//! is checked before its children so redefinitions and arity conflicts are
//! reported at the offending declaration.

use std::collections::HashMap;

use crate::ast::*;
use crate::diagnostic::Diagnostic;

/// What a name denotes. Only two shapes exist in this language: `int`
/// values and functions over `int`s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Symbol {
    Int,
    Func { param_count: usize, defined: bool },
}

/// Unique name → symbol. Built here, read again by the emitter to decide
/// which calls need the `@PLT` suffix.
pub type SymbolTable = HashMap<String, Symbol>;

pub fn check_program(program: &Program) -> Result<SymbolTable, Diagnostic> {
    let mut symbols = SymbolTable::new();
    for func in &program.functions {
        check_function_decl(func, &mut symbols)?;
    }
    Ok(symbols)
}

fn check_function_decl(func: &FunctionDecl, symbols: &mut SymbolTable) -> Result<(), Diagnostic> {
    let has_body = func.body.is_some();
    let mut already_defined = false;

    match symbols.get(&func.name.node) {
        Some(Symbol::Func {
            param_count,
            defined,
        }) => {
            already_defined = *defined;
            if has_body && already_defined {
                return Err(Diagnostic::error(
                    format!("redefinition of function '{}'", func.name.node),
                    func.name.span,
                ));
            }
            if *param_count != func.params.len() {
                return Err(Diagnostic::error(
                    format!(
                        "conflicting declarations of '{}': previously {} parameter{}, now {}",
                        func.name.node,
                        param_count,
                        if *param_count == 1 { "" } else { "s" },
                        func.params.len()
                    ),
                    func.name.span,
                ));
            }
        }
        Some(Symbol::Int) => {
            return Err(Diagnostic::error(
                format!("'{}' redeclared as a function", func.name.node),
                func.name.span,
            ));
        }
        None => {}
    }

    symbols.insert(
        func.name.node.clone(),
        Symbol::Func {
            param_count: func.params.len(),
            defined: has_body || already_defined,
        },
    );

    if let Some(body) = &func.body {
        for param in &func.params {
            symbols.insert(param.node.clone(), Symbol::Int);
        }
        check_block(body, symbols)?;
    }
    Ok(())
}

fn check_block(block: &Block, symbols: &mut SymbolTable) -> Result<(), Diagnostic> {
    for item in &block.items {
        match item {
            BlockItem::Declaration(Declaration::Var(decl)) => {
                symbols.insert(decl.name.node.clone(), Symbol::Int);
                if let Some(init) = &decl.init {
                    check_expr(init, symbols)?;
                }
            }
            BlockItem::Declaration(Declaration::Func(func)) => {
                check_function_decl(func, symbols)?;
            }
            BlockItem::Statement(stmt) => check_statement(stmt, symbols)?,
        }
    }
    Ok(())
}

fn check_statement(
    stmt: &crate::span::Spanned<Stmt>,
    symbols: &mut SymbolTable,
) -> Result<(), Diagnostic> {
    match &stmt.node {
        Stmt::Return(expr) | Stmt::Expression(expr) => check_expr(expr, symbols),
        Stmt::If {
            cond,
            then_stmt,
            else_stmt,
        } => {
            check_expr(cond, symbols)?;
            check_statement(then_stmt, symbols)?;
            if let Some(else_stmt) = else_stmt {
                check_statement(else_stmt, symbols)?;
            }
            Ok(())
        }
        Stmt::Compound(block) => check_block(block, symbols),
        Stmt::While { cond, body, .. } => {
            check_expr(cond, symbols)?;
            check_statement(body, symbols)
        }
        Stmt::DoWhile { body, cond, .. } => {
            check_statement(body, symbols)?;
            check_expr(cond, symbols)
        }
        Stmt::For {
            init,
            cond,
            post,
            body,
            ..
        } => {
            match init {
                ForInit::Declaration(decl) => {
                    symbols.insert(decl.name.node.clone(), Symbol::Int);
                    if let Some(expr) = &decl.init {
                        check_expr(expr, symbols)?;
                    }
                }
                ForInit::Expression(Some(expr)) => check_expr(expr, symbols)?,
                ForInit::Expression(None) => {}
            }
            if let Some(cond) = cond {
                check_expr(cond, symbols)?;
            }
            if let Some(post) = post {
                check_expr(post, symbols)?;
            }
            check_statement(body, symbols)
        }
        Stmt::Break { .. } | Stmt::Continue { .. } | Stmt::Null => Ok(()),
    }
}

fn check_expr(
    expr: &crate::span::Spanned<Expr>,
    symbols: &mut SymbolTable,
) -> Result<(), Diagnostic> {
    match &expr.node {
        Expr::Constant(_) => Ok(()),
        Expr::Var(name) => match symbols.get(&name.node) {
            Some(Symbol::Int) => Ok(()),
            Some(Symbol::Func { .. }) => Err(Diagnostic::error(
                format!("function '{}' used as a variable", name.node),
                name.span,
            )),
            None => Err(Diagnostic::error(
                format!("undeclared variable '{}'", name.node),
                name.span,
            )),
        },
        Expr::Unary { operand, .. } => check_expr(operand, symbols),
        Expr::Binary { lhs, rhs, .. } | Expr::Assignment { lhs, rhs } => {
            check_expr(lhs, symbols)?;
            check_expr(rhs, symbols)
        }
        Expr::Conditional {
            cond,
            then_expr,
            else_expr,
        } => {
            check_expr(cond, symbols)?;
            check_expr(then_expr, symbols)?;
            check_expr(else_expr, symbols)
        }
        Expr::Call { name, args } => {
            match symbols.get(&name.node) {
                Some(Symbol::Func { param_count, .. }) => {
                    if *param_count != args.len() {
                        return Err(Diagnostic::error(
                            format!(
                                "function '{}' expects {} argument{} but {} {} provided",
                                name.node,
                                param_count,
                                if *param_count == 1 { "" } else { "s" },
                                args.len(),
                                if args.len() == 1 { "was" } else { "were" }
                            ),
                            name.span,
                        ));
                    }
                }
                Some(Symbol::Int) => {
                    return Err(Diagnostic::error(
                        format!("'{}' is a variable, not a function", name.node),
                        name.span,
                    ));
                }
                None => {
                    return Err(Diagnostic::error(
                        format!("call to undeclared function '{}'", name.node),
                        name.span,
                    ));
                }
            }
            for arg in args {
                check_expr(arg, symbols)?;
            }
            Ok(())
        }
    }
}
