//! Loop labelling (pass 5).
//!
//! Each loop mints a fresh label (`while.N`, `do_while.N`, `for.N`) and
//! recurses into its body with that label as the enclosing one. `break`
//! and `continue` record the innermost enclosing label; outside any loop
//! they are errors.

use crate::ast::*;
use crate::context::Context;
use crate::diagnostic::Diagnostic;
use crate::span::{Span, Spanned};

pub fn label_program(program: Program, ctx: &mut Context) -> Result<Program, Diagnostic> {
    let functions = program
        .functions
        .into_iter()
        .map(|f| label_function_decl(f, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Program { functions })
}

fn label_function_decl(
    func: FunctionDecl,
    ctx: &mut Context,
) -> Result<FunctionDecl, Diagnostic> {
    let FunctionDecl { name, params, body } = func;
    let body = match body {
        Some(block) => Some(label_block(block, None, ctx)?),
        None => None,
    };
    Ok(FunctionDecl { name, params, body })
}

fn label_block(
    block: Block,
    enclosing: Option<&str>,
    ctx: &mut Context,
) -> Result<Block, Diagnostic> {
    let items = block
        .items
        .into_iter()
        .map(|item| match item {
            BlockItem::Statement(stmt) => {
                Ok(BlockItem::Statement(label_statement(stmt, enclosing, ctx)?))
            }
            decl => Ok(decl),
        })
        .collect::<Result<Vec<_>, Diagnostic>>()?;
    Ok(Block { items })
}

fn label_statement(
    stmt: Spanned<Stmt>,
    enclosing: Option<&str>,
    ctx: &mut Context,
) -> Result<Spanned<Stmt>, Diagnostic> {
    let span = stmt.span;
    let node = match stmt.node {
        Stmt::Break { .. } => Stmt::Break {
            label: Some(enclosing_or_orphan("break", enclosing, span)?),
        },
        Stmt::Continue { .. } => Stmt::Continue {
            label: Some(enclosing_or_orphan("continue", enclosing, span)?),
        },
        Stmt::While { cond, body, .. } => {
            let label = ctx.fresh_label("while");
            let body = Box::new(label_statement(*body, Some(&label), ctx)?);
            Stmt::While {
                cond,
                body,
                label: Some(label),
            }
        }
        Stmt::DoWhile { body, cond, .. } => {
            let label = ctx.fresh_label("do_while");
            let body = Box::new(label_statement(*body, Some(&label), ctx)?);
            Stmt::DoWhile {
                body,
                cond,
                label: Some(label),
            }
        }
        Stmt::For {
            init,
            cond,
            post,
            body,
            ..
        } => {
            let label = ctx.fresh_label("for");
            let body = Box::new(label_statement(*body, Some(&label), ctx)?);
            Stmt::For {
                init,
                cond,
                post,
                body,
                label: Some(label),
            }
        }
        Stmt::If {
            cond,
            then_stmt,
            else_stmt,
        } => Stmt::If {
            cond,
            then_stmt: Box::new(label_statement(*then_stmt, enclosing, ctx)?),
            else_stmt: match else_stmt {
                Some(s) => Some(Box::new(label_statement(*s, enclosing, ctx)?)),
                None => None,
            },
        },
        Stmt::Compound(block) => Stmt::Compound(label_block(block, enclosing, ctx)?),
        other => other,
    };
    Ok(Spanned::new(node, span))
}

fn enclosing_or_orphan(
    which: &str,
    enclosing: Option<&str>,
    span: Span,
) -> Result<String, Diagnostic> {
    match enclosing {
        Some(label) => Ok(label.to_string()),
        None => Err(Diagnostic::error(
            format!("'{}' used outside of a loop", which),
            span,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::Parser;

    fn label(source: &str) -> Result<Program, Diagnostic> {
        let tokens = Lexer::new(source).tokenize().expect("lex error");
        let program = Parser::new(tokens).parse_program().expect("parse error");
        label_program(program, &mut Context::new())
    }

    fn first_stmt(program: &Program) -> &Stmt {
        let body = program.functions[0].body.as_ref().unwrap();
        match &body.items[0] {
            BlockItem::Statement(s) => &s.node,
            other => panic!("expected statement, got {:?}", other),
        }
    }

    #[test]
    fn test_while_gets_label() {
        let program = label("int main(void) { while (1) break; return 0; }").unwrap();
        match first_stmt(&program) {
            Stmt::While { label, body, .. } => {
                assert_eq!(label.as_deref(), Some("while.0"));
                match &body.node {
                    Stmt::Break { label } => assert_eq!(label.as_deref(), Some("while.0")),
                    other => panic!("expected break, got {:?}", other),
                }
            }
            other => panic!("expected while, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_loops_get_distinct_labels() {
        let program =
            label("int main(void) { while (1) { do { continue; } while (0); break; } return 0; }")
                .unwrap();
        match first_stmt(&program) {
            Stmt::While { label, body, .. } => {
                assert_eq!(label.as_deref(), Some("while.0"));
                // The do-while inside gets its own label, and its continue
                // binds to it, not to the outer while.
                match &body.node {
                    Stmt::Compound(block) => {
                        match &block.items[0] {
                            BlockItem::Statement(s) => match &s.node {
                                Stmt::DoWhile { label, body, .. } => {
                                    assert_eq!(label.as_deref(), Some("do_while.1"));
                                    match &body.node {
                                        Stmt::Compound(inner) => match &inner.items[0] {
                                            BlockItem::Statement(s) => match &s.node {
                                                Stmt::Continue { label } => assert_eq!(
                                                    label.as_deref(),
                                                    Some("do_while.1")
                                                ),
                                                other => {
                                                    panic!("expected continue, got {:?}", other)
                                                }
                                            },
                                            other => panic!("expected statement, got {:?}", other),
                                        },
                                        other => panic!("expected compound, got {:?}", other),
                                    }
                                }
                                other => panic!("expected do-while, got {:?}", other),
                            },
                            other => panic!("expected statement, got {:?}", other),
                        }
                        match &block.items[1] {
                            BlockItem::Statement(s) => match &s.node {
                                Stmt::Break { label } => {
                                    assert_eq!(label.as_deref(), Some("while.0"))
                                }
                                other => panic!("expected break, got {:?}", other),
                            },
                            other => panic!("expected statement, got {:?}", other),
                        }
                    }
                    other => panic!("expected compound, got {:?}", other),
                }
            }
            other => panic!("expected while, got {:?}", other),
        }
    }

    #[test]
    fn test_for_label_prefix() {
        let program =
            label("int main(void) { for (;;) break; return 0; }").unwrap();
        match first_stmt(&program) {
            Stmt::For { label, .. } => assert_eq!(label.as_deref(), Some("for.0")),
            other => panic!("expected for, got {:?}", other),
        }
    }

    // --- Error path tests ---

    #[test]
    fn test_error_orphan_break() {
        let err = label("int main(void) { break; return 0; }").unwrap_err();
        assert!(
            err.message.contains("'break' used outside of a loop"),
            "got: {}",
            err.message
        );
    }

    #[test]
    fn test_error_orphan_continue() {
        let err = label("int main(void) { if (1) continue; return 0; }").unwrap_err();
        assert!(err.message.contains("'continue' used outside of a loop"));
    }

    #[test]
    fn test_break_in_if_inside_loop_is_fine() {
        assert!(label("int main(void) { while (1) if (1) break; return 0; }").is_ok());
    }
}
