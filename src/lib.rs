pub mod ast;
pub mod codegen;
pub mod context;
pub mod diagnostic;
pub mod ir;
pub mod lexeme;
pub mod lexer;
pub mod parser;
pub mod preprocess;
pub mod sema;
pub mod span;

use context::Context;
use diagnostic::Diagnostic;
use lexeme::Lexeme;
use lexer::Lexer;
use parser::Parser;
use span::Spanned;

/// Compile preprocessed C source to x86-64 assembly text.
///
/// The whole pipeline: lex → parse → resolve → typecheck → label loops →
/// IR → pseudo-asm → fixup → emit. Aborts at the first error; nothing is
/// written anywhere on failure.
pub fn compile_source(source: &str) -> Result<String, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    let program = Parser::new(tokens).parse_program()?;
    let mut ctx = Context::new();
    let (program, symbols) = sema::analyze(program, &mut ctx)?;
    let ir = ir::build::build_program(&program, &mut ctx);
    let mut asm = codegen::lower::lower_program(&ir);
    codegen::fixup::fix_program(&mut asm);
    Ok(codegen::emit::Emitter::new(&symbols).emit_program(&asm))
}

// Stage-level entry points for the CLI dump flags.

/// Stop after lexing.
pub fn lex_source(source: &str) -> Result<Vec<Spanned<Lexeme>>, Diagnostic> {
    Lexer::new(source).tokenize()
}

/// Stop after parsing.
pub fn parse_source(source: &str) -> Result<ast::Program, Diagnostic> {
    let tokens = Lexer::new(source).tokenize()?;
    Parser::new(tokens).parse_program()
}

/// Stop after semantic analysis. Returns the resolved, labelled AST.
pub fn analyze_source(source: &str) -> Result<ast::Program, Diagnostic> {
    let program = parse_source(source)?;
    let mut ctx = Context::new();
    let (program, _symbols) = sema::analyze(program, &mut ctx)?;
    Ok(program)
}

/// Stop after IR generation.
pub fn lower_to_ir(source: &str) -> Result<ir::Program, Diagnostic> {
    let program = parse_source(source)?;
    let mut ctx = Context::new();
    let (program, _symbols) = sema::analyze(program, &mut ctx)?;
    Ok(ir::build::build_program(&program, &mut ctx))
}

/// Stop after the backend, before emission. Returns the fixed ASM tree and
/// the symbol table the emitter would use.
pub fn lower_to_asm(source: &str) -> Result<(codegen::AsmProgram, sema::SymbolTable), Diagnostic> {
    let program = parse_source(source)?;
    let mut ctx = Context::new();
    let (program, symbols) = sema::analyze(program, &mut ctx)?;
    let ir = ir::build::build_program(&program, &mut ctx);
    let mut asm = codegen::lower::lower_program(&ir);
    codegen::fixup::fix_program(&mut asm);
    Ok((asm, symbols))
}
