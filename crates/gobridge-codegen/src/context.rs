use indexmap::IndexSet;

/// Tracks state during code emission: the output buffer, indentation and
/// collected imports.
#[derive(Debug, Clone)]
pub struct EmitContext {
    /// Current indentation level
    indent_level: usize,
    /// Characters per indent (e.g., 4 spaces)
    indent_width: usize,
    /// Whether to use tabs
    use_tabs: bool,
    /// Collected imports (deduped, insertion-ordered)
    imports: IndexSet<ImportIR>,
    /// Emitted text
    out: String,
}

/// Represents a single import to be collected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportIR {
    /// Local name (Go alias, or the imported Python symbol). Empty for a
    /// plain Go import.
    pub names: String,
    /// Module path (e.g., "example.com/geo", "ctypes")
    pub from: String,
}

/// Indentation style configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndentStyle {
    Spaces(usize),
    Tabs,
}

impl EmitContext {
    pub fn new(style: IndentStyle) -> Self {
        let (use_tabs, indent_width) = match style {
            IndentStyle::Spaces(n) => (false, n),
            IndentStyle::Tabs => (true, 1),
        };
        Self {
            indent_level: 0,
            indent_width,
            use_tabs,
            imports: IndexSet::new(),
            out: String::new(),
        }
    }

    /// Get the current indentation string.
    pub fn indent(&self) -> String {
        let unit = if self.use_tabs { "\t" } else { " " };
        unit.repeat(self.indent_level * self.indent_width)
    }

    /// Increase indentation by one level.
    pub fn push_indent(&mut self) {
        self.indent_level += 1;
    }

    /// Decrease indentation by one level.
    pub fn pop_indent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    /// Write one line at the current indentation. Empty text writes a bare
    /// newline with no trailing whitespace.
    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            self.out.push_str(&self.indent());
            self.out.push_str(text);
        }
        self.out.push('\n');
    }

    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Append pre-formatted text verbatim.
    pub fn raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    /// Write `header`, run `body` one level deeper, then write `footer`.
    pub fn block(&mut self, header: impl AsRef<str>, footer: &str, body: impl FnOnce(&mut Self)) {
        self.line(header);
        self.push_indent();
        body(self);
        self.pop_indent();
        if !footer.is_empty() {
            self.line(footer);
        }
    }

    /// Add an import to the collection (deduped).
    pub fn add_import(&mut self, names: impl Into<String>, from: impl Into<String>) {
        self.imports.insert(ImportIR {
            names: names.into(),
            from: from.into(),
        });
    }

    /// Get all collected imports.
    pub fn imports(&self) -> &IndexSet<ImportIR> {
        &self.imports
    }

    /// Drain and return all collected imports.
    pub fn take_imports(&mut self) -> IndexSet<ImportIR> {
        std::mem::take(&mut self.imports)
    }

    /// Current indent level.
    pub fn indent_level(&self) -> usize {
        self.indent_level
    }

    pub fn output(&self) -> &str {
        &self.out
    }

    /// Consume the context, returning the emitted text.
    pub fn finish(self) -> String {
        self.out
    }
}
