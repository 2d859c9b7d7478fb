use logos::{Lexer as LogosLexer, Logos};

use crate::error::SyntaxError;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\f\x{FEFF}]+")]
enum RawTok {
    // Kept as a token so semicolons can be inserted.
    #[regex(r"\r\n|\n|\r")]
    Newline,

    #[regex(r"//[^\n\r]*")]
    LineComment,

    #[token("/*", block_comment)]
    BlockComment,

    #[regex(r"[_\p{L}][_\p{L}\p{Nd}]*")]
    Ident,

    // Loose on purpose: literals are only inspected for array lengths.
    #[regex(r"[0-9][0-9A-Za-z_]*(\.[0-9A-Za-z_]*)?")]
    Number,

    #[regex(r#""([^"\\\n\r]|\\.)*""#)]
    String,

    #[regex(r"`[^`]*`")]
    RawString,

    #[regex(r"'([^'\\\n\r]|\\.)+'")]
    Rune,

    #[token("...")]
    Ellipsis,
    #[token("++")]
    Inc,
    #[token("--")]
    Dec,
    #[token("<-")]
    Arrow,
    #[token("=")]
    Assign,
    #[token("*")]
    Star,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBrack,
    #[token("]")]
    RBrack,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,

    // Operators the declaration parser never inspects.
    #[regex(r"[^\p{L}\p{Nd}_ \t\f\r\n\x{FEFF}]", priority = 0)]
    Other,
}

fn block_comment(lex: &mut LogosLexer<'_, RawTok>) -> bool {
    match lex.remainder().find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            true
        }
        None => false,
    }
}

/// Tokens handed to the declaration parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tok {
    Ident(String),
    Int(String),
    Str(String),
    Rune(String),

    KwBreak,
    KwChan,
    KwConst,
    KwContinue,
    KwFallthrough,
    KwFunc,
    KwImport,
    KwInterface,
    KwMap,
    KwPackage,
    KwReturn,
    KwStruct,
    KwType,
    KwVar,

    Ellipsis,
    Inc,
    Dec,
    Arrow,
    Assign,
    Star,
    LParen,
    RParen,
    LBrack,
    RBrack,
    LBrace,
    RBrace,
    Comma,
    Semi,
    Colon,
    Dot,
    Other(String),

    Eof,
}

impl Tok {
    fn from_raw(raw: RawTok, text: &str) -> Tok {
        match raw {
            RawTok::Ident => keyword_or_ident(text),
            RawTok::Number => Tok::Int(text.to_string()),
            RawTok::String | RawTok::RawString => Tok::Str(text.to_string()),
            RawTok::Rune => Tok::Rune(text.to_string()),
            RawTok::Ellipsis => Tok::Ellipsis,
            RawTok::Inc => Tok::Inc,
            RawTok::Dec => Tok::Dec,
            RawTok::Arrow => Tok::Arrow,
            RawTok::Assign => Tok::Assign,
            RawTok::Star => Tok::Star,
            RawTok::LParen => Tok::LParen,
            RawTok::RParen => Tok::RParen,
            RawTok::LBrack => Tok::LBrack,
            RawTok::RBrack => Tok::RBrack,
            RawTok::LBrace => Tok::LBrace,
            RawTok::RBrace => Tok::RBrace,
            RawTok::Comma => Tok::Comma,
            RawTok::Semi => Tok::Semi,
            RawTok::Colon => Tok::Colon,
            RawTok::Dot => Tok::Dot,
            RawTok::Newline | RawTok::LineComment | RawTok::BlockComment | RawTok::Other => {
                Tok::Other(text.to_string())
            }
        }
    }

    /// Go's automatic semicolon rule: a newline after one of these ends the statement.
    fn ends_statement(&self) -> bool {
        matches!(
            self,
            Tok::Ident(_)
                | Tok::Int(_)
                | Tok::Str(_)
                | Tok::Rune(_)
                | Tok::KwBreak
                | Tok::KwContinue
                | Tok::KwFallthrough
                | Tok::KwReturn
                | Tok::Inc
                | Tok::Dec
                | Tok::RParen
                | Tok::RBrack
                | Tok::RBrace
        )
    }
}

fn keyword_or_ident(s: &str) -> Tok {
    match s {
        "break" => Tok::KwBreak,
        "chan" => Tok::KwChan,
        "const" => Tok::KwConst,
        "continue" => Tok::KwContinue,
        "fallthrough" => Tok::KwFallthrough,
        "func" => Tok::KwFunc,
        "import" => Tok::KwImport,
        "interface" => Tok::KwInterface,
        "map" => Tok::KwMap,
        "package" => Tok::KwPackage,
        "return" => Tok::KwReturn,
        "struct" => Tok::KwStruct,
        "type" => Tok::KwType,
        "var" => Tok::KwVar,
        _ => Tok::Ident(s.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub tok: Tok,
    pub line: usize,
    pub column: usize,
}

/// A comment with its raw text (markers included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub line: usize,
    pub end_line: usize,
    /// Shares its first line with a preceding token
    pub trailing: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub comments: Vec<Comment>,
}

struct LineIndex<'src> {
    src: &'src str,
    starts: Vec<usize>,
}

impl<'src> LineIndex<'src> {
    fn new(src: &'src str) -> Self {
        let bytes = src.as_bytes();
        let mut starts = vec![0];
        for (i, b) in bytes.iter().enumerate() {
            match b {
                b'\n' => starts.push(i + 1),
                b'\r' if bytes.get(i + 1) != Some(&b'\n') => starts.push(i + 1),
                _ => {}
            }
        }
        Self { src, starts }
    }

    /// 1-based line and column (in characters) of a byte offset.
    fn position(&self, offset: usize) -> (usize, usize) {
        let idx = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let start = self.starts[idx];
        let column = self.src.get(start..offset).map_or(0, |s| s.chars().count());
        (idx + 1, column + 1)
    }
}

/// Tokenizes a whole Go source file, inserting semicolons and setting
/// comments aside for doc lookup.
pub fn tokenize(src: &str) -> Result<Lexed, SyntaxError> {
    let lines = LineIndex::new(src);
    let mut raw = RawTok::lexer(src);
    let mut out = Lexed::default();
    let mut last_token_line = 0;
    let mut pending_semi = false;

    while let Some(next) = raw.next() {
        let span = raw.span();
        let (line, column) = lines.position(span.start);
        let Ok(kind) = next else {
            let message = if raw.slice().starts_with("/*") {
                "comment not terminated".to_string()
            } else {
                format!("invalid token {:?}", raw.slice())
            };
            return Err(SyntaxError::new(line, column, message));
        };

        match kind {
            RawTok::Newline => {
                if pending_semi {
                    out.push(Tok::Semi, line, column);
                    pending_semi = false;
                }
            }
            RawTok::LineComment | RawTok::BlockComment => {
                let text = raw.slice();
                let end_line = lines.position(span.end.saturating_sub(1)).0;
                out.comments.push(Comment {
                    text: text.to_string(),
                    line,
                    end_line,
                    trailing: last_token_line == line,
                });
                // A multi-line block comment acts like a newline.
                if kind == RawTok::BlockComment && end_line > line && pending_semi {
                    out.push(Tok::Semi, line, column);
                    pending_semi = false;
                }
            }
            other => {
                let tok = Tok::from_raw(other, raw.slice());
                pending_semi = tok.ends_statement();
                last_token_line = line;
                out.push(tok, line, column);
            }
        }
    }

    let (line, column) = lines.position(src.len());
    if pending_semi {
        out.push(Tok::Semi, line, column);
    }
    out.push(Tok::Eof, line, column);
    Ok(out)
}

impl Lexed {
    fn push(&mut self, tok: Tok, line: usize, column: usize) {
        self.tokens.push(Token { tok, line, column });
    }
}

/// Text of the doc comment group ending on the line directly above `line`.
///
/// Mirrors Go's `CommentGroup.Text`: comment markers are stripped, directive
/// lines (`//go:generate`, `//export`, ...) are dropped, blank runs collapse
/// and the result is newline-terminated unless empty.
pub fn doc_comment(comments: &[Comment], line: usize) -> String {
    let Some(last) = comments
        .iter()
        .rposition(|c| !c.trailing && c.end_line + 1 == line)
    else {
        return String::new();
    };

    let mut first = last;
    while first > 0 {
        let prev = &comments[first - 1];
        if prev.trailing || prev.end_line + 1 < comments[first].line {
            break;
        }
        first -= 1;
    }

    let mut lines: Vec<String> = Vec::new();
    for comment in &comments[first..=last] {
        let text = comment.text.as_str();
        if let Some(body) = text.strip_prefix("//") {
            if is_directive(body) {
                continue;
            }
            lines.push(body.strip_prefix(' ').unwrap_or(body).to_string());
        } else {
            let body = text
                .strip_prefix("/*")
                .and_then(|t| t.strip_suffix("*/"))
                .unwrap_or(text);
            lines.extend(body.lines().map(str::to_string));
        }
    }

    let mut out: Vec<&str> = Vec::new();
    for line in &lines {
        let line = line.trim_end();
        if line.is_empty() && out.last().map_or(true, |l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }

    if out.is_empty() {
        String::new()
    } else {
        let mut text = out.join("\n");
        text.push('\n');
        text
    }
}

fn is_directive(body: &str) -> bool {
    if body.starts_with("line ") || body.starts_with("extern ") || body.starts_with("export ") {
        return true;
    }
    // `//tool:directive` with no space after the slashes
    match body.split_once(':') {
        Some((tool, rest)) => {
            !tool.is_empty()
                && tool.bytes().all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
                && rest.bytes().next().is_some_and(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        }
        None => false,
    }
}
