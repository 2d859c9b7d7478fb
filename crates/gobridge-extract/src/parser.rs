use crate::error::SyntaxError;
use crate::lexer::{doc_comment, tokenize, Comment, Tok, Token};
use crate::syntax::{ChanDir, Decl, Field, FuncDecl, SourceFile, TypeDecl, TypeExpr, TypeSpec};

type PResult<T> = Result<T, SyntaxError>;

/// Parse one Go source file down to its top-level declarations.
///
/// Function bodies and `import`/`const`/`var` declarations are skipped by
/// delimiter matching, so only declaration syntax is validated.
pub fn parse_file(src: &str) -> PResult<SourceFile> {
    let lexed = tokenize(src)?;
    Parser {
        tokens: lexed.tokens,
        comments: lexed.comments,
        pos: 0,
    }
    .source_file()
}

/// One comma-separated entry of a parameter list before grouping.
enum Entry {
    Bare(String),
    Named(String, TypeExpr),
    Type(TypeExpr),
}

struct Parser {
    tokens: Vec<Token>,
    comments: Vec<Comment>,
    pos: usize,
}

impl Parser {
    // --- cursor ---

    fn current(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.pos.min(last)]
    }

    fn peek(&self) -> &Tok {
        &self.current().tok
    }

    fn peek_at(&self, n: usize) -> &Tok {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)].tok
    }

    fn bump(&mut self) -> Tok {
        let tok = self.current().tok.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, tok: &Tok) -> bool {
        self.peek() == tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.at(tok) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok, what: &str) -> PResult<()> {
        if self.eat(&tok) {
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn expect_semi(&mut self) -> PResult<()> {
        if self.at(&Tok::Eof) {
            return Ok(());
        }
        self.expect(Tok::Semi, "';' or newline")
    }

    fn ident(&mut self, what: &str) -> PResult<String> {
        if let Tok::Ident(name) = self.peek() {
            let name = name.clone();
            self.bump();
            Ok(name)
        } else {
            Err(self.unexpected(what))
        }
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        let tok = self.current();
        SyntaxError::new(tok.line, tok.column, message)
    }

    fn unexpected(&self, what: &str) -> SyntaxError {
        self.error(format!("expected {what}, found {}", describe(self.peek())))
    }

    fn doc_for(&self, line: usize) -> String {
        doc_comment(&self.comments, line)
    }

    /// Consume a bracketed group starting at the current opening token.
    fn skip_group(&mut self) -> PResult<()> {
        let (line, column) = (self.current().line, self.current().column);
        let mut depth = 0usize;
        loop {
            match self.bump() {
                Tok::LParen | Tok::LBrack | Tok::LBrace => depth += 1,
                Tok::RParen | Tok::RBrack | Tok::RBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(());
                    }
                }
                Tok::Eof => return Err(SyntaxError::new(line, column, "unclosed delimiter")),
                _ => {}
            }
        }
    }

    /// Index of the bracket closing the one at `open`.
    fn matching(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for (i, token) in self.tokens.iter().enumerate().skip(open) {
            match token.tok {
                Tok::LParen | Tok::LBrack | Tok::LBrace => depth += 1,
                Tok::RParen | Tok::RBrack | Tok::RBrace => {
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                Tok::Eof => return None,
                _ => {}
            }
        }
        None
    }

    /// With an identifier at the cursor and `[` after it, decide whether the
    /// brackets open an array/slice type (`a []int`, `buf [4]byte`) rather
    /// than instantiate a generic (`List[int]`).
    fn brackets_start_type(&self) -> bool {
        let open = self.pos + 1;
        let Some(close) = self.matching(open) else {
            return false;
        };
        close == open + 1 || self.tokens.get(close + 1).is_some_and(|t| starts_type(&t.tok))
    }

    // --- declarations ---

    fn source_file(mut self) -> PResult<SourceFile> {
        while self.eat(&Tok::Semi) {}
        self.expect(Tok::KwPackage, "'package'")?;
        let package = self.ident("package name")?;
        self.expect_semi()?;

        let mut decls = Vec::new();
        loop {
            match self.peek() {
                Tok::Eof => break,
                Tok::Semi => {
                    self.bump();
                }
                Tok::KwImport | Tok::KwConst | Tok::KwVar => {
                    self.bump();
                    self.skip_value_decl()?;
                }
                Tok::KwFunc => decls.push(Decl::Func(self.func_decl()?)),
                Tok::KwType => decls.push(Decl::Type(self.type_decl()?)),
                other => {
                    return Err(self.error(format!(
                        "non-declaration statement outside function body: {}",
                        describe(other)
                    )))
                }
            }
        }

        Ok(SourceFile { package, decls })
    }

    fn skip_value_decl(&mut self) -> PResult<()> {
        if self.at(&Tok::LParen) {
            self.skip_group()?;
        } else {
            loop {
                match self.peek() {
                    Tok::Semi | Tok::Eof => break,
                    Tok::LParen | Tok::LBrack | Tok::LBrace => self.skip_group()?,
                    Tok::RParen | Tok::RBrack | Tok::RBrace => {
                        return Err(self.unexpected("';' or newline"))
                    }
                    _ => {
                        self.bump();
                    }
                }
            }
        }
        self.expect_semi()
    }

    fn func_decl(&mut self) -> PResult<FuncDecl> {
        let line = self.current().line;
        let doc = self.doc_for(line);
        self.bump();

        let recv = if self.at(&Tok::LParen) {
            let mut fields = self.parameters()?;
            if fields.len() != 1 {
                return Err(self.error("method must have exactly one receiver"));
            }
            Some(fields.remove(0))
        } else {
            None
        };

        let name = self.ident("function name")?;
        let generic = self.at(&Tok::LBrack);
        if generic {
            self.skip_group()?;
        }
        let params = self.parameters()?;
        let results = self.results()?;
        if self.at(&Tok::LBrace) {
            self.skip_group()?;
        }
        self.expect_semi()?;

        Ok(FuncDecl {
            doc,
            line,
            recv,
            name,
            generic,
            params,
            results,
        })
    }

    fn type_decl(&mut self) -> PResult<TypeDecl> {
        let doc = self.doc_for(self.current().line);
        self.bump();

        let mut specs = Vec::new();
        if self.eat(&Tok::LParen) {
            loop {
                while self.eat(&Tok::Semi) {}
                if self.eat(&Tok::RParen) {
                    break;
                }
                let spec_doc = self.doc_for(self.current().line);
                let mut spec = self.type_spec()?;
                spec.doc = spec_doc;
                specs.push(spec);
                if !self.at(&Tok::RParen) {
                    self.expect(Tok::Semi, "';' or newline")?;
                }
            }
        } else {
            specs.push(self.type_spec()?);
        }
        self.expect_semi()?;

        Ok(TypeDecl { doc, specs })
    }

    fn type_spec(&mut self) -> PResult<TypeSpec> {
        let name = self.ident("type name")?;
        let generic = self.at(&Tok::LBrack) && self.opens_type_params();
        if generic {
            self.skip_group()?;
        }
        let alias = self.eat(&Tok::Assign);
        let ty = self.parse_type()?;
        Ok(TypeSpec {
            doc: String::new(),
            name,
            generic,
            alias,
            ty,
        })
    }

    /// `type G[T any] ...` versus `type A [N]int`.
    fn opens_type_params(&self) -> bool {
        if !matches!(self.peek_at(1), Tok::Ident(_)) {
            return false;
        }
        match self.peek_at(2) {
            Tok::RBrack | Tok::Star | Tok::Dot => false,
            Tok::Other(op) => op == "~",
            _ => true,
        }
    }

    // --- signatures ---

    fn parameters(&mut self) -> PResult<Vec<Field>> {
        self.expect(Tok::LParen, "'('")?;
        let mut entries = Vec::new();
        while !self.at(&Tok::RParen) {
            entries.push(self.param_entry()?);
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::RParen, "')'")?;
        group_params(entries).map_err(|msg| self.error(msg))
    }

    fn param_entry(&mut self) -> PResult<Entry> {
        let name = match self.peek() {
            Tok::Ident(name) => name.clone(),
            _ => return Ok(Entry::Type(self.parse_type()?)),
        };
        match self.peek_at(1) {
            Tok::Dot => Ok(Entry::Type(self.parse_type()?)),
            Tok::Comma | Tok::RParen => {
                self.bump();
                Ok(Entry::Bare(name))
            }
            Tok::LBrack if !self.brackets_start_type() => Ok(Entry::Type(self.parse_type()?)),
            _ => {
                self.bump();
                Ok(Entry::Named(name, self.parse_type()?))
            }
        }
    }

    fn results(&mut self) -> PResult<Vec<Field>> {
        if self.at(&Tok::LParen) {
            return self.parameters();
        }
        if starts_type(self.peek()) {
            return Ok(vec![Field::unnamed(self.parse_type()?)]);
        }
        Ok(Vec::new())
    }

    // --- types ---

    fn parse_type(&mut self) -> PResult<TypeExpr> {
        match self.peek().clone() {
            Tok::Ident(name) => {
                self.bump();
                let mut ty = if self.eat(&Tok::Dot) {
                    let sel = self.ident("type name after '.'")?;
                    TypeExpr::Selector {
                        package: name,
                        name: sel,
                    }
                } else {
                    TypeExpr::Ident(name)
                };
                if self.at(&Tok::LBrack) {
                    ty = TypeExpr::Generic {
                        base: Box::new(ty),
                        args: self.type_args()?,
                    };
                }
                Ok(ty)
            }
            Tok::Star => {
                self.bump();
                Ok(TypeExpr::Pointer(Box::new(self.parse_type()?)))
            }
            Tok::LBrack => {
                self.bump();
                if self.eat(&Tok::RBrack) {
                    return Ok(TypeExpr::Slice(Box::new(self.parse_type()?)));
                }
                let len = self.array_len()?;
                Ok(TypeExpr::Array {
                    len,
                    elem: Box::new(self.parse_type()?),
                })
            }
            Tok::KwMap => {
                self.bump();
                self.expect(Tok::LBrack, "'['")?;
                let key = self.parse_type()?;
                self.expect(Tok::RBrack, "']'")?;
                let value = self.parse_type()?;
                Ok(TypeExpr::Map {
                    key: Box::new(key),
                    value: Box::new(value),
                })
            }
            Tok::KwChan => {
                self.bump();
                let dir = if self.eat(&Tok::Arrow) {
                    ChanDir::Send
                } else {
                    ChanDir::Both
                };
                Ok(TypeExpr::Chan {
                    dir,
                    elem: Box::new(self.parse_type()?),
                })
            }
            Tok::Arrow => {
                self.bump();
                self.expect(Tok::KwChan, "'chan'")?;
                Ok(TypeExpr::Chan {
                    dir: ChanDir::Recv,
                    elem: Box::new(self.parse_type()?),
                })
            }
            Tok::KwFunc => {
                self.bump();
                let params = self.parameters()?;
                let results = self.results()?;
                Ok(TypeExpr::Func { params, results })
            }
            Tok::KwInterface => {
                self.bump();
                self.interface_body()
            }
            Tok::KwStruct => {
                self.bump();
                Ok(TypeExpr::Struct(self.struct_body()?))
            }
            Tok::Ellipsis => {
                self.bump();
                Ok(TypeExpr::Ellipsis(Box::new(self.parse_type()?)))
            }
            Tok::LParen => {
                self.bump();
                let ty = self.parse_type()?;
                self.expect(Tok::RParen, "')'")?;
                Ok(ty)
            }
            _ => Err(self.unexpected("type")),
        }
    }

    fn type_args(&mut self) -> PResult<Vec<TypeExpr>> {
        self.expect(Tok::LBrack, "'['")?;
        let mut args = Vec::new();
        while !self.at(&Tok::RBrack) {
            args.push(self.parse_type()?);
            if !self.eat(&Tok::Comma) {
                break;
            }
        }
        self.expect(Tok::RBrack, "']'")?;
        Ok(args)
    }

    /// Length of an array type, the opening `[` already consumed. Only a
    /// plain decimal literal yields a length; constant expressions give `None`.
    fn array_len(&mut self) -> PResult<Option<usize>> {
        let literal = match (self.peek(), self.peek_at(1)) {
            (Tok::Int(text), Tok::RBrack) => Some(text.parse::<usize>().ok()),
            _ => None,
        };
        if let Some(len) = literal {
            self.bump();
            self.bump();
            return Ok(len);
        }

        let mut depth = 0usize;
        loop {
            match self.bump() {
                Tok::LParen | Tok::LBrack | Tok::LBrace => depth += 1,
                Tok::RBrack if depth == 0 => return Ok(None),
                Tok::RParen | Tok::RBrack | Tok::RBrace => depth = depth.saturating_sub(1),
                Tok::Eof => return Err(self.error("unterminated array length")),
                _ => {}
            }
        }
    }

    fn interface_body(&mut self) -> PResult<TypeExpr> {
        self.expect(Tok::LBrace, "'{'")?;
        let mut depth = 1usize;
        let mut empty = true;
        loop {
            match self.bump() {
                Tok::LParen | Tok::LBrack | Tok::LBrace => {
                    depth += 1;
                    empty = false;
                }
                Tok::RParen | Tok::RBrack | Tok::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(TypeExpr::Interface { empty });
                    }
                }
                Tok::Semi => {}
                Tok::Eof => return Err(self.error("unterminated interface type")),
                _ => empty = false,
            }
        }
    }

    fn struct_body(&mut self) -> PResult<Vec<Field>> {
        self.expect(Tok::LBrace, "'{'")?;
        let mut fields = Vec::new();
        loop {
            while self.eat(&Tok::Semi) {}
            if self.eat(&Tok::RBrace) {
                break;
            }
            let mut field = self.struct_field()?;
            if let Tok::Str(tag) = self.peek() {
                let tag = tag.clone();
                self.bump();
                field.tag = Some(tag);
            }
            fields.push(field);
            if !self.at(&Tok::RBrace) {
                self.expect(Tok::Semi, "';' or newline")?;
            }
        }
        Ok(fields)
    }

    fn struct_field(&mut self) -> PResult<Field> {
        match self.peek() {
            Tok::Star => return Ok(Field::unnamed(self.parse_type()?)),
            Tok::Ident(_) => {}
            _ => return Err(self.unexpected("field name or embedded type")),
        }

        let embedded = match self.peek_at(1) {
            Tok::Dot | Tok::Semi | Tok::RBrace | Tok::Str(_) => true,
            Tok::LBrack => !self.brackets_start_type(),
            _ => false,
        };
        if embedded {
            return Ok(Field::unnamed(self.parse_type()?));
        }

        let mut names = vec![self.ident("field name")?];
        while self.eat(&Tok::Comma) {
            names.push(self.ident("field name")?);
        }
        let ty = self.parse_type()?;
        Ok(Field::named(names, ty))
    }
}

/// Apply Go's grouping rule: either every entry is a type, or names run
/// until the next type (`a, b int, s string`).
fn group_params(entries: Vec<Entry>) -> Result<Vec<Field>, String> {
    let named = entries.iter().any(|e| matches!(e, Entry::Named(..)));
    if !named {
        return Ok(entries
            .into_iter()
            .map(|entry| match entry {
                Entry::Bare(name) => Field::unnamed(TypeExpr::Ident(name)),
                Entry::Type(ty) | Entry::Named(_, ty) => Field::unnamed(ty),
            })
            .collect());
    }

    let mut fields = Vec::new();
    let mut pending = Vec::new();
    for entry in entries {
        match entry {
            Entry::Bare(name) => pending.push(name),
            Entry::Named(name, ty) => {
                pending.push(name);
                fields.push(Field::named(std::mem::take(&mut pending), ty));
            }
            Entry::Type(_) => return Err("mixed named and unnamed parameters".to_string()),
        }
    }
    if !pending.is_empty() {
        return Err("mixed named and unnamed parameters".to_string());
    }
    Ok(fields)
}

fn starts_type(tok: &Tok) -> bool {
    matches!(
        tok,
        Tok::Ident(_)
            | Tok::Star
            | Tok::LBrack
            | Tok::LParen
            | Tok::KwMap
            | Tok::KwChan
            | Tok::KwFunc
            | Tok::KwInterface
            | Tok::KwStruct
            | Tok::Arrow
    )
}

fn describe(tok: &Tok) -> String {
    let text = match tok {
        Tok::Ident(s) | Tok::Int(s) | Tok::Str(s) | Tok::Rune(s) | Tok::Other(s) => s.as_str(),
        Tok::KwBreak => "break",
        Tok::KwChan => "chan",
        Tok::KwConst => "const",
        Tok::KwContinue => "continue",
        Tok::KwFallthrough => "fallthrough",
        Tok::KwFunc => "func",
        Tok::KwImport => "import",
        Tok::KwInterface => "interface",
        Tok::KwMap => "map",
        Tok::KwPackage => "package",
        Tok::KwReturn => "return",
        Tok::KwStruct => "struct",
        Tok::KwType => "type",
        Tok::KwVar => "var",
        Tok::Ellipsis => "...",
        Tok::Inc => "++",
        Tok::Dec => "--",
        Tok::Arrow => "<-",
        Tok::Assign => "=",
        Tok::Star => "*",
        Tok::LParen => "(",
        Tok::RParen => ")",
        Tok::LBrack => "[",
        Tok::RBrack => "]",
        Tok::LBrace => "{",
        Tok::RBrace => "}",
        Tok::Comma => ",",
        Tok::Semi => return "newline".to_string(),
        Tok::Colon => ":",
        Tok::Dot => ".",
        Tok::Eof => return "EOF".to_string(),
    };
    format!("'{text}'")
}
