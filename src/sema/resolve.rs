//! Identifier resolution (pass 3).
//!
//! Walks the AST with lexically scoped identifier maps. Entering a scope
//! copies the parent map with `from_current_scope` cleared, so shadowing
//! is legal across scopes and redeclaration is detected within one.

use std::collections::HashMap;

use crate::ast::*;
use crate::context::Context;
use crate::diagnostic::Diagnostic;
use crate::span::{Span, Spanned};

#[derive(Clone, Debug)]
struct ScopeEntry {
    unique_name: String,
    from_current_scope: bool,
    external_linkage: bool,
}

type ScopeMap = HashMap<String, ScopeEntry>;

/// Copy the parent scope, marking every inherited entry as not from the
/// current scope.
fn new_scope(parent: &ScopeMap) -> ScopeMap {
    let mut map = parent.clone();
    for entry in map.values_mut() {
        entry.from_current_scope = false;
    }
    map
}

pub fn resolve_program(program: Program, ctx: &mut Context) -> Result<Program, Diagnostic> {
    let mut map = ScopeMap::new();
    let functions = program
        .functions
        .into_iter()
        .map(|f| resolve_function_decl(f, &mut map, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Program { functions })
}

/// Function names have external linkage: they are never renamed, and
/// redeclaring one in the same scope is legal as long as the prior entry
/// also had external linkage.
fn resolve_function_decl(
    func: FunctionDecl,
    map: &mut ScopeMap,
    ctx: &mut Context,
) -> Result<FunctionDecl, Diagnostic> {
    if let Some(prev) = map.get(&func.name.node) {
        if prev.from_current_scope && !prev.external_linkage {
            return Err(Diagnostic::error(
                format!("redeclaration of '{}' as a function", func.name.node),
                func.name.span,
            )
            .with_note("the previous declaration in this scope was a variable".to_string()));
        }
    }
    map.insert(
        func.name.node.clone(),
        ScopeEntry {
            unique_name: func.name.node.clone(),
            from_current_scope: true,
            external_linkage: true,
        },
    );

    // Parameters and the body share one scope, so a top-level local that
    // clashes with a parameter is a redeclaration.
    let mut body_scope = new_scope(map);
    let params = func
        .params
        .into_iter()
        .map(|p| declare_variable(p, &mut body_scope, ctx))
        .collect::<Result<Vec<_>, _>>()?;

    let body = match func.body {
        Some(block) => Some(resolve_block(block, &mut body_scope, ctx)?),
        None => None,
    };

    Ok(FunctionDecl {
        name: func.name,
        params,
        body,
    })
}

/// α-rename a declared variable and record the mapping.
fn declare_variable(
    name: Spanned<String>,
    map: &mut ScopeMap,
    ctx: &mut Context,
) -> Result<Spanned<String>, Diagnostic> {
    if let Some(prev) = map.get(&name.node) {
        if prev.from_current_scope {
            return Err(Diagnostic::error(
                format!("redeclaration of '{}' in the same scope", name.node),
                name.span,
            )
            .with_help("shadowing is only allowed in a nested block".to_string()));
        }
    }
    let unique = ctx.fresh_name(&name.node);
    map.insert(
        name.node,
        ScopeEntry {
            unique_name: unique.clone(),
            from_current_scope: true,
            external_linkage: false,
        },
    );
    Ok(Spanned::new(unique, name.span))
}

fn resolve_block(block: Block, map: &mut ScopeMap, ctx: &mut Context) -> Result<Block, Diagnostic> {
    let items = block
        .items
        .into_iter()
        .map(|item| resolve_block_item(item, map, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Block { items })
}

fn resolve_block_item(
    item: BlockItem,
    map: &mut ScopeMap,
    ctx: &mut Context,
) -> Result<BlockItem, Diagnostic> {
    match item {
        BlockItem::Declaration(Declaration::Var(decl)) => Ok(BlockItem::Declaration(
            Declaration::Var(resolve_var_decl(decl, map, ctx)?),
        )),
        BlockItem::Declaration(Declaration::Func(func)) => {
            if func.body.is_some() {
                return Err(Diagnostic::error(
                    format!(
                        "function '{}' defined inside a block",
                        func.name.node
                    ),
                    func.name.span,
                )
                .with_help("move the definition to the top level; only prototypes may appear in blocks".to_string()));
            }
            Ok(BlockItem::Declaration(Declaration::Func(
                resolve_function_decl(func, map, ctx)?,
            )))
        }
        BlockItem::Statement(stmt) => Ok(BlockItem::Statement(resolve_statement(stmt, map, ctx)?)),
    }
}

fn resolve_var_decl(
    decl: VarDecl,
    map: &mut ScopeMap,
    ctx: &mut Context,
) -> Result<VarDecl, Diagnostic> {
    let name = declare_variable(decl.name, map, ctx)?;
    let init = match decl.init {
        Some(expr) => Some(resolve_expr(expr, map)?),
        None => None,
    };
    Ok(VarDecl { name, init })
}

fn resolve_statement(
    stmt: Spanned<Stmt>,
    map: &mut ScopeMap,
    ctx: &mut Context,
) -> Result<Spanned<Stmt>, Diagnostic> {
    let span = stmt.span;
    let node = match stmt.node {
        Stmt::Return(expr) => Stmt::Return(resolve_expr(expr, map)?),
        Stmt::Expression(expr) => Stmt::Expression(resolve_expr(expr, map)?),
        Stmt::If {
            cond,
            then_stmt,
            else_stmt,
        } => Stmt::If {
            cond: resolve_expr(cond, map)?,
            then_stmt: Box::new(resolve_statement(*then_stmt, map, ctx)?),
            else_stmt: match else_stmt {
                Some(s) => Some(Box::new(resolve_statement(*s, map, ctx)?)),
                None => None,
            },
        },
        Stmt::Compound(block) => {
            let mut inner = new_scope(map);
            Stmt::Compound(resolve_block(block, &mut inner, ctx)?)
        }
        Stmt::Break { label } => Stmt::Break { label },
        Stmt::Continue { label } => Stmt::Continue { label },
        Stmt::While { cond, body, label } => Stmt::While {
            cond: resolve_expr(cond, map)?,
            body: Box::new(resolve_statement(*body, map, ctx)?),
            label,
        },
        Stmt::DoWhile { body, cond, label } => Stmt::DoWhile {
            body: Box::new(resolve_statement(*body, map, ctx)?),
            cond: resolve_expr(cond, map)?,
            label,
        },
        Stmt::For {
            init,
            cond,
            post,
            body,
            label,
        } => {
            // The for header opens its own scope; a compound body opens
            // another one below it.
            let mut header = new_scope(map);
            let init = match init {
                ForInit::Declaration(decl) => {
                    ForInit::Declaration(resolve_var_decl(decl, &mut header, ctx)?)
                }
                ForInit::Expression(Some(expr)) => {
                    ForInit::Expression(Some(resolve_expr(expr, &mut header)?))
                }
                ForInit::Expression(None) => ForInit::Expression(None),
            };
            let cond = match cond {
                Some(expr) => Some(resolve_expr(expr, &mut header)?),
                None => None,
            };
            let post = match post {
                Some(expr) => Some(resolve_expr(expr, &mut header)?),
                None => None,
            };
            let body = Box::new(resolve_statement(*body, &mut header, ctx)?);
            Stmt::For {
                init,
                cond,
                post,
                body,
                label,
            }
        }
        Stmt::Null => Stmt::Null,
    };
    Ok(Spanned::new(node, span))
}

fn resolve_expr(expr: Spanned<Expr>, map: &mut ScopeMap) -> Result<Spanned<Expr>, Diagnostic> {
    let span = expr.span;
    let node = match expr.node {
        Expr::Constant(n) => Expr::Constant(n),
        Expr::Var(name) => match map.get(&name.node) {
            Some(entry) => Expr::Var(Spanned::new(entry.unique_name.clone(), name.span)),
            None => {
                return Err(Diagnostic::error(
                    format!("undeclared variable '{}'", name.node),
                    name.span,
                ))
            }
        },
        Expr::Unary { op, operand } => {
            // `!(a = 3)` and friends: the operand of a unary cannot be an
            // assignment.
            if matches!(operand.node, Expr::Assignment { .. }) {
                return Err(invalid_lvalue(
                    "cannot apply a unary operator to an assignment",
                    operand.span,
                ));
            }
            Expr::Unary {
                op,
                operand: Box::new(resolve_expr(*operand, map)?),
            }
        }
        Expr::Binary { op, lhs, rhs } => Expr::Binary {
            op,
            lhs: Box::new(resolve_expr(*lhs, map)?),
            rhs: Box::new(resolve_expr(*rhs, map)?),
        },
        Expr::Assignment { lhs, rhs } => {
            if !matches!(lhs.node, Expr::Var(_)) {
                return Err(invalid_lvalue(
                    "left-hand side of assignment must be a variable",
                    lhs.span,
                ));
            }
            Expr::Assignment {
                lhs: Box::new(resolve_expr(*lhs, map)?),
                rhs: Box::new(resolve_expr(*rhs, map)?),
            }
        }
        Expr::Conditional {
            cond,
            then_expr,
            else_expr,
        } => Expr::Conditional {
            cond: Box::new(resolve_expr(*cond, map)?),
            then_expr: Box::new(resolve_expr(*then_expr, map)?),
            else_expr: Box::new(resolve_expr(*else_expr, map)?),
        },
        Expr::Call { name, args } => {
            let resolved_name = match map.get(&name.node) {
                Some(entry) => Spanned::new(entry.unique_name.clone(), name.span),
                None => {
                    return Err(Diagnostic::error(
                        format!("call to undeclared function '{}'", name.node),
                        name.span,
                    ))
                }
            };
            Expr::Call {
                name: resolved_name,
                args: args
                    .into_iter()
                    .map(|a| resolve_expr(a, map))
                    .collect::<Result<Vec<_>, _>>()?,
            }
        }
    };
    Ok(Spanned::new(node, span))
}

fn invalid_lvalue(detail: &str, span: Span) -> Diagnostic {
    Diagnostic::error(format!("invalid lvalue: {}", detail), span)
}
