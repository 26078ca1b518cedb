//! Semantic analysis: three passes over the AST.
//!
//! 1. `resolve`: identifier resolution. α-renames every local to a
//!    globally unique name and rejects redeclarations, references to
//!    undeclared names, and non-variable assignment targets.
//! 2. `typeck`: type checking. Builds the process-wide symbol table and
//!    rejects arity conflicts, redefinitions, and function/variable
//!    confusion. The table survives into the emitter so calls to external
//!    functions can be tagged for PLT linkage.
//! 3. `loops`: loop labelling. Mints a fresh label per loop and attaches
//!    the innermost enclosing label to every `break`/`continue`.

pub mod loops;
pub mod resolve;
pub mod typeck;

pub use typeck::{Symbol, SymbolTable};

use crate::ast::Program;
use crate::context::Context;
use crate::diagnostic::Diagnostic;

/// Run all three semantic passes. Returns the rewritten AST and the symbol
/// table needed later by the emitter.
pub fn analyze(program: Program, ctx: &mut Context) -> Result<(Program, SymbolTable), Diagnostic> {
    let program = resolve::resolve_program(program, ctx)?;
    let symbols = typeck::check_program(&program)?;
    let program = loops::label_program(program, ctx)?;
    Ok((program, symbols))
}
