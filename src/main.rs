use std::path::PathBuf;
use std::process;

use clap::Parser;

use nanocc::diagnostic::Diagnostic;

#[derive(Parser)]
#[command(
    name = "nanocc",
    version,
    about = "A small C compiler emitting x86-64 assembly (System V AMD64)"
)]
struct Cli {
    /// Input C source file
    input: PathBuf,
    /// Emit an assembly file (the only supported compilation mode)
    #[arg(short = 'S')]
    emit_asm: bool,
    /// Output .s file (default: <input>.s)
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Stop after lexing and print the token stream
    #[arg(long)]
    lex: bool,
    /// Stop after parsing and print the AST
    #[arg(long)]
    parse: bool,
    /// Stop after semantic analysis
    #[arg(long)]
    validate: bool,
    /// Stop after IR generation and print the IR
    #[arg(long)]
    tacky: bool,
    /// Stop after the backend and print the assembly tree
    #[arg(long)]
    codegen: bool,
}

fn main() {
    let cli = Cli::parse();
    let filename = cli.input.display().to_string();

    let source = match nanocc::preprocess::preprocess_file(&cli.input) {
        Ok(source) => source,
        Err(diag) => {
            diag.render(&filename, "");
            process::exit(1);
        }
    };

    if cli.lex {
        let tokens = ok_or_exit(nanocc::lex_source(&source), &filename, &source);
        for token in &tokens {
            println!("{:?}", token.node);
        }
        return;
    }
    if cli.parse {
        let program = ok_or_exit(nanocc::parse_source(&source), &filename, &source);
        println!("{:#?}", program);
        return;
    }
    if cli.validate {
        ok_or_exit(nanocc::analyze_source(&source), &filename, &source);
        return;
    }
    if cli.tacky {
        let ir = ok_or_exit(nanocc::lower_to_ir(&source), &filename, &source);
        print!("{}", ir);
        return;
    }
    if cli.codegen {
        let (asm, _symbols) = ok_or_exit(nanocc::lower_to_asm(&source), &filename, &source);
        println!("{:#?}", asm);
        return;
    }

    if !cli.emit_asm {
        eprintln!("error: nothing to do (pass -S to emit assembly)");
        process::exit(1);
    }

    let asm_text = ok_or_exit(nanocc::compile_source(&source), &filename, &source);

    let out_path = cli
        .output
        .unwrap_or_else(|| cli.input.with_extension("s"));
    if let Err(e) = std::fs::write(&out_path, &asm_text) {
        eprintln!("error: cannot write '{}': {}", out_path.display(), e);
        process::exit(1);
    }
    eprintln!("Compiled -> {}", out_path.display());
}

fn ok_or_exit<T>(result: Result<T, Diagnostic>, filename: &str, source: &str) -> T {
    match result {
        Ok(value) => value,
        Err(diag) => {
            diag.render(filename, source);
            process::exit(1);
        }
    }
}
