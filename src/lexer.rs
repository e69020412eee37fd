use std::io::{self, BufRead};

use thiserror::Error;

use crate::token::Token;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexerError {
    #[error("Parsing error: indentation")]
    Indentation,
    #[error("String parsing error")]
    UnterminatedString,
    #[error("Unexpected end of line")]
    UnexpectedEndOfLine,
    #[error("Unrecognized escape sequence \\{0}")]
    UnrecognizedEscape(char),
    #[error("Invalid integer literal '{0}'")]
    InvalidNumber(String),
    #[error("Expected {expected}, found {found}")]
    UnexpectedToken { expected: String, found: String },
    #[error("Reading source input: {0}")]
    Io(String),
}

impl From<io::Error> for LexerError {
    fn from(error: io::Error) -> Self {
        LexerError::Io(error.to_string())
    }
}

pub type LexResult<T> = Result<T, LexerError>;

/// Tokens of one physical line, with its measured indentation.
struct LineTokens {
    indent: usize,
    tokens: Vec<Token>,
}

impl LineTokens {
    fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Streaming tokenizer with one-token lookahead.
///
/// One logical line at a time is materialized into an internal buffer
/// (leading `Indent`/`Dedent` tokens, the line's substantive tokens, one
/// `Newline`) and `next_token` serves tokens from that buffer. Blank lines
/// and comment-only lines produce no tokens at all. After the source is
/// exhausted every call keeps returning `Eof`.
pub struct Lexer<R> {
    input: R,
    line: Vec<Token>,
    position: usize,
    current_indent: usize,
}

impl<R: BufRead> Lexer<R> {
    /// Reads enough of `input` to expose the first token.
    pub fn new(input: R) -> LexResult<Self> {
        let mut lexer = Self {
            input,
            line: Vec::new(),
            position: 0,
            current_indent: 0,
        };
        lexer.refill()?;
        Ok(lexer)
    }

    /// The token most recently produced; stable until [`Self::next_token`].
    pub fn current(&self) -> &Token {
        &self.line[self.position]
    }

    /// Advances the stream and returns the new current token.
    pub fn next_token(&mut self) -> LexResult<&Token> {
        if self.position + 1 >= self.line.len() {
            self.refill()?;
        } else {
            self.position += 1;
        }
        Ok(self.current())
    }

    /// Requires the current token to equal `expected`, tag and payload.
    pub fn expect(&self, expected: &Token) -> LexResult<()> {
        if self.current() == expected {
            Ok(())
        } else {
            Err(self.mismatch(expected.to_string()))
        }
    }

    /// Requires the current token to have the same tag as `expected`.
    pub fn expect_kind(&self, expected: &Token) -> LexResult<&Token> {
        if self.current().same_kind(expected) {
            Ok(self.current())
        } else {
            Err(self.mismatch(expected.tag_name().to_string()))
        }
    }

    pub fn expect_id(&self) -> LexResult<&str> {
        match self.current() {
            Token::Id(name) => Ok(name),
            _ => Err(self.mismatch("Id".to_string())),
        }
    }

    pub fn expect_number(&self) -> LexResult<i32> {
        match self.current() {
            Token::Number(value) => Ok(*value),
            _ => Err(self.mismatch("Number".to_string())),
        }
    }

    pub fn expect_string(&self) -> LexResult<&str> {
        match self.current() {
            Token::String(value) => Ok(value),
            _ => Err(self.mismatch("String".to_string())),
        }
    }

    pub fn expect_char(&self) -> LexResult<u8> {
        match self.current() {
            Token::Char(byte) => Ok(*byte),
            _ => Err(self.mismatch("Char".to_string())),
        }
    }

    /// Advances, then requires tag-and-payload equality with `expected`.
    pub fn expect_next(&mut self, expected: &Token) -> LexResult<()> {
        self.next_token()?;
        self.expect(expected)
    }

    /// Advances, then requires the same tag as `expected`.
    pub fn expect_next_kind(&mut self, expected: &Token) -> LexResult<&Token> {
        self.next_token()?;
        self.expect_kind(expected)
    }

    pub fn expect_next_id(&mut self) -> LexResult<&str> {
        self.next_token()?;
        self.expect_id()
    }

    pub fn expect_next_number(&mut self) -> LexResult<i32> {
        self.next_token()?;
        self.expect_number()
    }

    pub fn expect_next_string(&mut self) -> LexResult<&str> {
        self.next_token()?;
        self.expect_string()
    }

    pub fn expect_next_char(&mut self) -> LexResult<u8> {
        self.next_token()?;
        self.expect_char()
    }

    fn mismatch(&self, expected: String) -> LexerError {
        LexerError::UnexpectedToken {
            expected,
            found: self.current().to_string(),
        }
    }

    /// Replaces the buffer with the next logical line's tokens, skipping
    /// blank and comment-only physical lines.
    fn refill(&mut self) -> LexResult<()> {
        loop {
            let Some(raw) = self.read_physical_line()? else {
                // End of input: close open blocks, then report Eof forever.
                let mut tokens = Vec::with_capacity(self.current_indent / 2 + 1);
                while self.current_indent > 0 {
                    tokens.push(Token::Dedent);
                    self.current_indent -= 2;
                }
                tokens.push(Token::Eof);
                self.line = tokens;
                self.position = 0;
                return Ok(());
            };

            let terminated = raw.ends_with('\n');
            let text = raw.trim_end_matches('\n').trim_end_matches('\r');
            let line = tokenize_line(text, terminated)?;
            if line.is_empty() {
                continue;
            }
            if line.indent % 2 != 0 {
                return Err(LexerError::Indentation);
            }

            let mut tokens = Vec::with_capacity(line.tokens.len() + 2);
            if line.indent > self.current_indent {
                for _ in 0..(line.indent - self.current_indent) / 2 {
                    tokens.push(Token::Indent);
                }
            } else if line.indent < self.current_indent {
                for _ in 0..(self.current_indent - line.indent) / 2 {
                    tokens.push(Token::Dedent);
                }
            }
            self.current_indent = line.indent;
            tokens.extend(line.tokens);
            tokens.push(Token::Newline);
            self.line = tokens;
            self.position = 0;
            return Ok(());
        }
    }

    fn read_physical_line(&mut self) -> LexResult<Option<String>> {
        let mut buffer = String::new();
        let read = self.input.read_line(&mut buffer)?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(buffer))
    }
}

/// Drains a lexer over `input` into the full token sequence, `Eof` included.
pub fn tokenize<R: BufRead>(input: R) -> LexResult<Vec<Token>> {
    let mut lexer = Lexer::new(input)?;
    let mut tokens = vec![lexer.current().clone()];
    while *lexer.current() != Token::Eof {
        tokens.push(lexer.next_token()?.clone());
    }
    Ok(tokens)
}

/// Scans one physical line (newline already stripped). `terminated` tells
/// whether the line ended with a newline in the source, which decides how an
/// open string literal fails.
fn tokenize_line(text: &str, terminated: bool) -> LexResult<LineTokens> {
    let bytes = text.as_bytes();
    let mut position = 0;
    while position < bytes.len() && bytes[position] == b' ' {
        position += 1;
    }
    let indent = position;

    let mut tokens = Vec::new();
    while position < bytes.len() {
        match bytes[position] {
            b' ' => position += 1,
            b'#' => break,
            b'"' | b'\'' => {
                let (token, next) = scan_string(bytes, position, terminated)?;
                tokens.push(token);
                position = next;
            }
            byte if byte.is_ascii_digit() => {
                let (token, next) = scan_number(text, position)?;
                tokens.push(token);
                position = next;
            }
            byte if byte.is_ascii_alphabetic() || byte == b'_' => {
                let (token, next) = scan_word(text, position);
                tokens.push(token);
                position = next;
            }
            _ => {
                let (token, next) = scan_operator_or_char(bytes, position);
                tokens.push(token);
                position = next;
            }
        }
    }

    Ok(LineTokens { indent, tokens })
}

fn scan_string(bytes: &[u8], start: usize, terminated: bool) -> LexResult<(Token, usize)> {
    let quote = bytes[start];
    let mut value = Vec::new();
    let mut position = start + 1;
    loop {
        let Some(&byte) = bytes.get(position) else {
            // The closing quote never came before the physical line ended.
            return Err(if terminated {
                LexerError::UnexpectedEndOfLine
            } else {
                LexerError::UnterminatedString
            });
        };
        position += 1;
        if byte == quote {
            break;
        }
        match byte {
            b'\\' => {
                let Some(&escaped) = bytes.get(position) else {
                    return Err(if terminated {
                        LexerError::UnexpectedEndOfLine
                    } else {
                        LexerError::UnterminatedString
                    });
                };
                position += 1;
                let resolved = match escaped {
                    b'n' => b'\n',
                    b't' => b'\t',
                    b'r' => b'\r',
                    b'"' => b'"',
                    b'\'' => b'\'',
                    b'\\' => b'\\',
                    other => return Err(LexerError::UnrecognizedEscape(other as char)),
                };
                value.push(resolved);
            }
            b'\r' => return Err(LexerError::UnexpectedEndOfLine),
            _ => value.push(byte),
        }
    }
    let value = String::from_utf8(value).map_err(|error| LexerError::Io(error.to_string()))?;
    Ok((Token::String(value), position))
}

fn scan_number(text: &str, start: usize) -> LexResult<(Token, usize)> {
    let bytes = text.as_bytes();
    let mut end = start;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let lexeme = &text[start..end];
    let value = lexeme
        .parse::<i32>()
        .map_err(|_| LexerError::InvalidNumber(lexeme.to_string()))?;
    Ok((Token::Number(value), end))
}

fn scan_word(text: &str, start: usize) -> (Token, usize) {
    let bytes = text.as_bytes();
    let mut end = start;
    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
        end += 1;
    }
    let lexeme = &text[start..end];
    let token = Token::keyword_for(lexeme).unwrap_or_else(|| Token::Id(lexeme.to_string()));
    (token, end)
}

fn scan_operator_or_char(bytes: &[u8], start: usize) -> (Token, usize) {
    if let Some(&second) = bytes.get(start + 1) {
        let operator = match (bytes[start], second) {
            (b'=', b'=') => Some(Token::Eq),
            (b'!', b'=') => Some(Token::NotEq),
            (b'<', b'=') => Some(Token::LessOrEq),
            (b'>', b'=') => Some(Token::GreaterOrEq),
            _ => None,
        };
        if let Some(token) = operator {
            return (token, start + 2);
        }
    }
    (Token::Char(bytes[start]), start + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn id(name: &str) -> Token {
        Token::Id(name.to_string())
    }

    #[test]
    fn tokenizes_assignment_line() {
        let tokens = tokenize("x = 42\n".as_bytes()).expect("tokenize should succeed");
        assert_eq!(
            tokens,
            vec![
                id("x"),
                Token::Char(b'='),
                Token::Number(42),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn tokenizes_nested_blocks_with_indent_and_dedent() {
        let input = "if x:\n  y = 1\n  if z:\n    w = 2\n  q = 3\n";
        let tokens = tokenize(input.as_bytes()).expect("tokenize should succeed");
        assert_eq!(
            tokens,
            vec![
                Token::If,
                id("x"),
                Token::Char(b':'),
                Token::Newline,
                Token::Indent,
                id("y"),
                Token::Char(b'='),
                Token::Number(1),
                Token::Newline,
                Token::If,
                id("z"),
                Token::Char(b':'),
                Token::Newline,
                Token::Indent,
                id("w"),
                Token::Char(b'='),
                Token::Number(2),
                Token::Newline,
                Token::Dedent,
                id("q"),
                Token::Char(b'='),
                Token::Number(3),
                Token::Newline,
                Token::Dedent,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn multi_level_dedent_emits_one_token_per_level() {
        let input = indoc! {"
            class A:
              def f(self):
                return 1
            x = 2
        "};
        let tokens = tokenize(input.as_bytes()).expect("tokenize should succeed");
        let dedents = tokens.iter().filter(|t| **t == Token::Dedent).count();
        let indents = tokens.iter().filter(|t| **t == Token::Indent).count();
        assert_eq!(indents, 2);
        assert_eq!(dedents, 2);
        let dedent_run = tokens
            .windows(2)
            .any(|pair| pair[0] == Token::Dedent && pair[1] == Token::Dedent);
        assert!(dedent_run, "both dedents must precede the next line");
    }

    #[test]
    fn indent_and_dedent_balance_before_eof() {
        let input = indoc! {"
            class A:
              def f(self):
                if x:
                  return 1
        "};
        let tokens = tokenize(input.as_bytes()).expect("tokenize should succeed");
        let indents = tokens.iter().filter(|t| **t == Token::Indent).count();
        let dedents = tokens.iter().filter(|t| **t == Token::Dedent).count();
        assert_eq!(indents, dedents);
        assert_eq!(tokens.last(), Some(&Token::Eof));
    }

    #[test]
    fn newline_count_matches_logical_lines() {
        let input = "a = 1\nb = 2\nc = 3\n";
        let tokens = tokenize(input.as_bytes()).expect("tokenize should succeed");
        let newlines = tokens.iter().filter(|t| **t == Token::Newline).count();
        assert_eq!(newlines, 3);
    }

    #[test]
    fn string_escapes_are_decoded() {
        let tokens = tokenize("s = 'a\\nb\\t\\'c'\n".as_bytes()).expect("tokenize should succeed");
        assert_eq!(
            tokens,
            vec![
                id("s"),
                Token::Char(b'='),
                Token::String("a\nb\t'c".to_string()),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn double_and_single_quotes_terminate_their_own_kind() {
        let tokens =
            tokenize("a = \"it's\"\nb = '\"x\"'\n".as_bytes()).expect("tokenize should succeed");
        assert_eq!(tokens[2], Token::String("it's".to_string()));
        assert_eq!(tokens[6], Token::String("\"x\"".to_string()));
    }

    #[test]
    fn errors_on_unrecognized_escape() {
        let err = tokenize("s = 'a\\x'\n".as_bytes()).expect_err("expected escape failure");
        assert_eq!(err, LexerError::UnrecognizedEscape('x'));
        assert!(err.to_string().contains("Unrecognized escape sequence \\x"));
    }

    #[test]
    fn errors_on_string_hitting_end_of_line() {
        let err = tokenize("s = 'abc\n".as_bytes()).expect_err("expected open string failure");
        assert_eq!(err, LexerError::UnexpectedEndOfLine);
    }

    #[test]
    fn errors_on_string_hitting_end_of_input() {
        let err = tokenize("s = 'abc".as_bytes()).expect_err("expected open string failure");
        assert_eq!(err, LexerError::UnterminatedString);
    }

    #[test]
    fn errors_on_odd_indentation() {
        let err = tokenize("if x:\n   y = 1\n".as_bytes()).expect_err("expected indent failure");
        assert_eq!(err, LexerError::Indentation);
        assert!(err.to_string().contains("indentation"));
    }

    #[test]
    fn errors_on_number_overflow() {
        let err =
            tokenize("n = 99999999999\n".as_bytes()).expect_err("expected overflow failure");
        assert_eq!(err, LexerError::InvalidNumber("99999999999".to_string()));
    }

    #[test]
    fn keywords_and_identifiers() {
        let input = "class Foo:\n  def bar(self):\n    return None and True or not False\n";
        let tokens = tokenize(input.as_bytes()).expect("tokenize should succeed");
        assert_eq!(tokens[0], Token::Class);
        assert_eq!(tokens[1], id("Foo"));
        assert!(tokens.contains(&Token::Def));
        assert!(tokens.contains(&id("bar")));
        assert!(tokens.contains(&id("self")));
        assert!(tokens.contains(&Token::Return));
        assert!(tokens.contains(&Token::None));
        assert!(tokens.contains(&Token::And));
        assert!(tokens.contains(&Token::True));
        assert!(tokens.contains(&Token::Or));
        assert!(tokens.contains(&Token::Not));
        assert!(tokens.contains(&Token::False));
    }

    #[test]
    fn identifier_may_start_with_underscore_and_carry_digits() {
        let tokens = tokenize("_x1 = x2y\n".as_bytes()).expect("tokenize should succeed");
        assert_eq!(tokens[0], id("_x1"));
        assert_eq!(tokens[2], id("x2y"));
    }

    #[test]
    fn two_character_operators_and_char_fallback() {
        let input = "a == b != c <= d >= e < f > g\n";
        let tokens = tokenize(input.as_bytes()).expect("tokenize should succeed");
        assert_eq!(
            tokens,
            vec![
                id("a"),
                Token::Eq,
                id("b"),
                Token::NotEq,
                id("c"),
                Token::LessOrEq,
                id("d"),
                Token::GreaterOrEq,
                id("e"),
                Token::Char(b'<'),
                id("f"),
                Token::Char(b'>'),
                id("g"),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn operator_at_line_end_falls_back_to_char() {
        let tokens = tokenize("x <\n".as_bytes()).expect("tokenize should succeed");
        assert_eq!(tokens[1], Token::Char(b'<'));
    }

    #[test]
    fn comments_are_stripped() {
        let input = indoc! {"
            # leading comment
            x = 1  # trailing comment
               # comment-only line, odd indent is fine here
            y = 2
        "};
        let tokens = tokenize(input.as_bytes()).expect("tokenize should succeed");
        assert_eq!(
            tokens,
            vec![
                id("x"),
                Token::Char(b'='),
                Token::Number(1),
                Token::Newline,
                id("y"),
                Token::Char(b'='),
                Token::Number(2),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn blank_lines_emit_nothing_and_keep_indent() {
        let input = "if x:\n  y = 1\n\n  z = 2\n";
        let tokens = tokenize(input.as_bytes()).expect("tokenize should succeed");
        assert_eq!(
            tokens,
            vec![
                Token::If,
                id("x"),
                Token::Char(b':'),
                Token::Newline,
                Token::Indent,
                id("y"),
                Token::Char(b'='),
                Token::Number(1),
                Token::Newline,
                id("z"),
                Token::Char(b'='),
                Token::Number(2),
                Token::Newline,
                Token::Dedent,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn blank_and_comment_only_source_is_eof_only() {
        let tokens =
            tokenize("\n\n# nothing here\n   \n".as_bytes()).expect("tokenize should succeed");
        assert_eq!(tokens, vec![Token::Eof]);
        let tokens = tokenize("".as_bytes()).expect("tokenize should succeed");
        assert_eq!(tokens, vec![Token::Eof]);
    }

    #[test]
    fn missing_trailing_newline_still_ends_the_line() {
        let tokens = tokenize("x = 1".as_bytes()).expect("tokenize should succeed");
        assert_eq!(
            tokens,
            vec![
                id("x"),
                Token::Char(b'='),
                Token::Number(1),
                Token::Newline,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn missing_trailing_newline_with_open_block_dedents_before_eof() {
        let tokens = tokenize("if x:\n  y = 1".as_bytes()).expect("tokenize should succeed");
        assert_eq!(
            &tokens[tokens.len() - 3..],
            &[Token::Newline, Token::Dedent, Token::Eof]
        );
    }

    #[test]
    fn crlf_lines_are_accepted() {
        let tokens = tokenize("x = 1\r\ny = 2\r\n".as_bytes()).expect("tokenize should succeed");
        let newlines = tokens.iter().filter(|t| **t == Token::Newline).count();
        assert_eq!(newlines, 2);
        assert_eq!(tokens[0], id("x"));
        assert_eq!(tokens[4], id("y"));
    }

    #[test]
    fn eof_repeats_after_stream_end() {
        let mut lexer = Lexer::new("x\n".as_bytes()).expect("lexer should build");
        while *lexer.current() != Token::Eof {
            lexer.next_token().expect("next_token should succeed");
        }
        assert_eq!(*lexer.next_token().expect("past eof"), Token::Eof);
        assert_eq!(*lexer.next_token().expect("past eof"), Token::Eof);
    }

    #[test]
    fn current_is_stable_between_advances() {
        let lexer = Lexer::new("x = 1\n".as_bytes()).expect("lexer should build");
        assert_eq!(*lexer.current(), id("x"));
        assert_eq!(*lexer.current(), id("x"));
    }

    #[test]
    fn expectations_match_tag_and_payload() {
        let mut lexer = Lexer::new("x = 'hi'\n".as_bytes()).expect("lexer should build");
        assert_eq!(lexer.expect_id().expect("id"), "x");
        lexer.expect(&id("x")).expect("exact id");
        lexer
            .expect_next(&Token::Char(b'='))
            .expect("assignment sign");
        assert_eq!(lexer.expect_char().expect("char"), b'=');
        assert_eq!(lexer.expect_next_string().expect("string"), "hi");
        lexer.expect_next(&Token::Newline).expect("newline");
        lexer.expect_next(&Token::Eof).expect("eof");
    }

    #[test]
    fn expectations_read_number_payloads() {
        let mut lexer = Lexer::new("n = 1\n".as_bytes()).expect("lexer should build");
        assert_eq!(lexer.expect_next_id().expect_err("not an id").to_string(),
            "Expected Id, found Char{=}");
        assert_eq!(lexer.expect_next_number().expect("number"), 1);
        assert_eq!(lexer.expect_number().expect("stable"), 1);
    }

    #[test]
    fn expectation_mismatch_is_a_lexer_error() {
        let lexer = Lexer::new("x = 1\n".as_bytes()).expect("lexer should build");
        let err = lexer.expect_number().expect_err("expected mismatch");
        assert_eq!(
            err,
            LexerError::UnexpectedToken {
                expected: "Number".to_string(),
                found: "Id{x}".to_string(),
            }
        );
        let err = lexer
            .expect(&id("y"))
            .expect_err("expected payload mismatch");
        assert!(matches!(err, LexerError::UnexpectedToken { .. }));
        lexer
            .expect_kind(&id("anything"))
            .expect("tag-only expectation ignores payload");
    }

    #[test]
    fn expect_next_kind_advances_first() {
        let mut lexer = Lexer::new("x y\n".as_bytes()).expect("lexer should build");
        let token = lexer
            .expect_next_kind(&id(""))
            .expect("second id")
            .clone();
        assert_eq!(token, id("y"));
    }

    #[test]
    fn reads_from_any_buffered_reader() {
        let cursor = std::io::Cursor::new(b"x = 1\n".to_vec());
        let tokens = tokenize(cursor).expect("tokenize should succeed");
        assert_eq!(tokens.len(), 5);
    }
}
