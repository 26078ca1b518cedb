//! External preprocessor collaborator.
//!
//! The compiler proper only ever sees preprocessed text; comments,
//! `#include` and macros are handled by the system C compiler in `-E -P`
//! mode before the lexer runs.

use std::path::Path;
use std::process::Command;

use crate::diagnostic::Diagnostic;
use crate::span::Span;

pub fn preprocess_file(path: &Path) -> Result<String, Diagnostic> {
    let output = Command::new("cc")
        .args(["-E", "-P"])
        .arg(path)
        .output()
        .map_err(|e| {
            Diagnostic::error(
                format!("cannot run the C preprocessor: {}", e),
                Span::dummy(),
            )
            .with_help("a C compiler (`cc`) must be installed and on PATH".to_string())
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Diagnostic::error(
            format!(
                "preprocessing '{}' failed:\n{}",
                path.display(),
                stderr.trim_end()
            ),
            Span::dummy(),
        ));
    }

    String::from_utf8(output.stdout).map_err(|_| {
        Diagnostic::error(
            "preprocessor produced non-UTF-8 output".to_string(),
            Span::dummy(),
        )
    })
}
