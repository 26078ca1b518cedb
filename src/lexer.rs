use crate::diagnostic::Diagnostic;
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

pub struct Lexer<'src> {
    source: &'src [u8],
    pos: usize,
}

impl<'src> Lexer<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
        }
    }

    /// Tokenize the whole source. Stops at the first unrecognized input.
    pub fn tokenize(mut self) -> Result<Vec<Spanned<Lexeme>>, Diagnostic> {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token()?;
            let is_eof = tok.node == Lexeme::Eof;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Spanned<Lexeme>, Diagnostic> {
        self.skip_whitespace_and_comments()?;

        if self.pos >= self.source.len() {
            return Ok(self.make_token(Lexeme::Eof, self.pos, self.pos));
        }

        let start = self.pos;
        let ch = self.source[self.pos];

        // Identifiers and keywords (max munch makes `intx` an identifier,
        // never `int` + `x`)
        if is_ident_start(ch) {
            return Ok(self.scan_ident_or_keyword());
        }

        // Integer constants
        if ch.is_ascii_digit() {
            return self.scan_constant();
        }

        self.scan_symbol(start)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), Diagnostic> {
        loop {
            while self.pos < self.source.len() && self.source[self.pos].is_ascii_whitespace() {
                self.pos += 1;
            }

            // Line comments
            if self.pos + 1 < self.source.len()
                && self.source[self.pos] == b'/'
                && self.source[self.pos + 1] == b'/'
            {
                while self.pos < self.source.len() && self.source[self.pos] != b'\n' {
                    self.pos += 1;
                }
                continue;
            }

            // Block comments
            if self.pos + 1 < self.source.len()
                && self.source[self.pos] == b'/'
                && self.source[self.pos + 1] == b'*'
            {
                let start = self.pos;
                self.pos += 2;
                loop {
                    if self.pos + 1 >= self.source.len() {
                        return Err(Diagnostic::error(
                            "unterminated block comment".to_string(),
                            Span::new(start as u32, self.source.len() as u32),
                        )
                        .with_help("close the comment with `*/`".to_string()));
                    }
                    if self.source[self.pos] == b'*' && self.source[self.pos + 1] == b'/' {
                        self.pos += 2;
                        break;
                    }
                    self.pos += 1;
                }
                continue;
            }

            break;
        }
        Ok(())
    }

    fn scan_ident_or_keyword(&mut self) -> Spanned<Lexeme> {
        let start = self.pos;
        while self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("");
        let token = Lexeme::from_keyword(text).unwrap_or_else(|| Lexeme::Ident(text.to_string()));
        self.make_token(token, start, self.pos)
    }

    fn scan_constant(&mut self) -> Result<Spanned<Lexeme>, Diagnostic> {
        let start = self.pos;
        while self.pos < self.source.len() && self.source[self.pos].is_ascii_digit() {
            self.pos += 1;
        }

        // A constant must end at a word break: `123abc` is a single bad
        // token, not `123` followed by `abc`.
        if self.pos < self.source.len() && is_ident_continue(self.source[self.pos]) {
            let bad_end = self.pos;
            return Err(Diagnostic::error(
                format!(
                    "invalid integer constant starting at position {}",
                    start
                ),
                Span::new(start as u32, bad_end as u32 + 1),
            )
            .with_help("integer constants cannot be immediately followed by letters".to_string()));
        }

        let text = std::str::from_utf8(&self.source[start..self.pos]).unwrap_or("");
        match text.parse::<i64>() {
            Ok(n) => Ok(self.make_token(Lexeme::Constant(n), start, self.pos)),
            Err(_) => Err(Diagnostic::error(
                format!("integer constant '{}' is too large", text),
                Span::new(start as u32, self.pos as u32),
            )),
        }
    }

    fn scan_symbol(&mut self, start: usize) -> Result<Spanned<Lexeme>, Diagnostic> {
        let ch = self.source[self.pos];
        self.pos += 1;

        // Two-character operators win over their one-character prefixes.
        let token = match ch {
            b'(' => Lexeme::LParen,
            b')' => Lexeme::RParen,
            b'{' => Lexeme::LBrace,
            b'}' => Lexeme::RBrace,
            b';' => Lexeme::Semicolon,
            b',' => Lexeme::Comma,
            b'?' => Lexeme::Question,
            b':' => Lexeme::Colon,
            b'~' => Lexeme::Tilde,
            b'+' => Lexeme::Plus,
            b'*' => Lexeme::Star,
            b'/' => Lexeme::Slash,
            b'%' => Lexeme::Percent,
            b'-' => {
                if self.peek() == Some(b'-') {
                    self.pos += 1;
                    Lexeme::MinusMinus
                } else {
                    Lexeme::Minus
                }
            }
            b'!' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Lexeme::BangEq
                } else {
                    Lexeme::Bang
                }
            }
            b'=' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Lexeme::EqEq
                } else {
                    Lexeme::Eq
                }
            }
            b'<' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Lexeme::LtEq
                } else {
                    Lexeme::Lt
                }
            }
            b'>' => {
                if self.peek() == Some(b'=') {
                    self.pos += 1;
                    Lexeme::GtEq
                } else {
                    Lexeme::Gt
                }
            }
            b'&' => {
                if self.peek() == Some(b'&') {
                    self.pos += 1;
                    Lexeme::AmpAmp
                } else {
                    return Err(self.unexpected_char(b'&', start).with_help(
                        "bitwise '&' is not supported; did you mean '&&'?".to_string(),
                    ));
                }
            }
            b'|' => {
                if self.peek() == Some(b'|') {
                    self.pos += 1;
                    Lexeme::PipePipe
                } else {
                    return Err(self.unexpected_char(b'|', start).with_help(
                        "bitwise '|' is not supported; did you mean '||'?".to_string(),
                    ));
                }
            }
            _ => return Err(self.unexpected_char(ch, start)),
        };

        Ok(self.make_token(token, start, self.pos))
    }

    fn unexpected_char(&self, ch: u8, start: usize) -> Diagnostic {
        Diagnostic::error(
            format!(
                "unexpected character '{}' (U+{:04X}) at position {}",
                ch as char, ch, start
            ),
            Span::new(start as u32, self.pos as u32),
        )
    }

    fn peek(&self) -> Option<u8> {
        if self.pos < self.source.len() {
            Some(self.source[self.pos])
        } else {
            None
        }
    }

    fn make_token(&self, token: Lexeme, start: usize, end: usize) -> Spanned<Lexeme> {
        Spanned::new(token, Span::new(start as u32, end as u32))
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Lexeme> {
        Lexer::new(source)
            .tokenize()
            .expect("unexpected lex error")
            .into_iter()
            .map(|t| t.node)
            .collect()
    }

    #[test]
    fn test_keywords() {
        let tokens = lex("int void return if else do while for break continue");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Int,
                Lexeme::Void,
                Lexeme::Return,
                Lexeme::If,
                Lexeme::Else,
                Lexeme::Do,
                Lexeme::While,
                Lexeme::For,
                Lexeme::Break,
                Lexeme::Continue,
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_keyword_needs_word_break() {
        // `intx` must lex as one identifier, not `int` + `x`
        let tokens = lex("intx returnvalue int2");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Ident("intx".into()),
                Lexeme::Ident("returnvalue".into()),
                Lexeme::Ident("int2".into()),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_symbols() {
        let tokens = lex("( ) { } ; , ? : ~ ! - + * / % && || == != < <= > >= = --");
        assert_eq!(
            tokens,
            vec![
                Lexeme::LParen,
                Lexeme::RParen,
                Lexeme::LBrace,
                Lexeme::RBrace,
                Lexeme::Semicolon,
                Lexeme::Comma,
                Lexeme::Question,
                Lexeme::Colon,
                Lexeme::Tilde,
                Lexeme::Bang,
                Lexeme::Minus,
                Lexeme::Plus,
                Lexeme::Star,
                Lexeme::Slash,
                Lexeme::Percent,
                Lexeme::AmpAmp,
                Lexeme::PipePipe,
                Lexeme::EqEq,
                Lexeme::BangEq,
                Lexeme::Lt,
                Lexeme::LtEq,
                Lexeme::Gt,
                Lexeme::GtEq,
                Lexeme::Eq,
                Lexeme::MinusMinus,
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_multichar_beats_prefix() {
        // No spaces: the two-character operators must still win
        let tokens = lex("a<=b==c&&d");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Ident("a".into()),
                Lexeme::LtEq,
                Lexeme::Ident("b".into()),
                Lexeme::EqEq,
                Lexeme::Ident("c".into()),
                Lexeme::AmpAmp,
                Lexeme::Ident("d".into()),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_decrement_is_one_token() {
        let tokens = lex("a--b");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Ident("a".into()),
                Lexeme::MinusMinus,
                Lexeme::Ident("b".into()),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_constants() {
        let tokens = lex("0 1 42 2147483647");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Constant(0),
                Lexeme::Constant(1),
                Lexeme::Constant(42),
                Lexeme::Constant(2147483647),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_comments() {
        let tokens = lex("foo // line comment\nbar /* block\ncomment */ baz");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Ident("foo".into()),
                Lexeme::Ident("bar".into()),
                Lexeme::Ident("baz".into()),
                Lexeme::Eof,
            ]
        );
    }

    #[test]
    fn test_small_program() {
        let tokens = lex("int main(void) { return 2; }");
        assert_eq!(
            tokens,
            vec![
                Lexeme::Int,
                Lexeme::Ident("main".into()),
                Lexeme::LParen,
                Lexeme::Void,
                Lexeme::RParen,
                Lexeme::LBrace,
                Lexeme::Return,
                Lexeme::Constant(2),
                Lexeme::Semicolon,
                Lexeme::RBrace,
                Lexeme::Eof,
            ]
        );
    }

    // --- Error path tests ---

    #[test]
    fn test_error_unexpected_character() {
        let err = Lexer::new("int main(void) { return @; }")
            .tokenize()
            .unwrap_err();
        assert!(
            err.message.contains("unexpected character '@'"),
            "error should name the character, got: {}",
            err.message
        );
    }

    #[test]
    fn test_error_constant_without_word_break() {
        let err = Lexer::new("int x = 123abc;").tokenize().unwrap_err();
        assert!(
            err.message.contains("invalid integer constant"),
            "got: {}",
            err.message
        );
    }

    #[test]
    fn test_error_lone_ampersand() {
        let err = Lexer::new("a & b").tokenize().unwrap_err();
        assert!(err.help.as_deref().unwrap().contains("&&"));
    }

    #[test]
    fn test_error_unterminated_block_comment() {
        let err = Lexer::new("int main /* oops").tokenize().unwrap_err();
        assert!(err.message.contains("unterminated block comment"));
    }

    #[test]
    fn test_error_position_reported() {
        let err = Lexer::new("int x = $;").tokenize().unwrap_err();
        assert_eq!(err.span.start, 8);
    }
}
