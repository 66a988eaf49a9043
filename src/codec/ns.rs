//! Namespace extraction from a source file's first top-level form.
//!
//! This is a heuristic, not a reader: it scans just far enough to find
//! `(<head> <name> ...)` at the top of the file and returns `<name>`.
//! Anything unexpected yields `None`.

use std::fs;
use std::iter::Peekable;
use std::path::Path;
use std::str::Chars;

/// Derive the namespace identifier of a source file.
///
/// Returns `None` when the file cannot be read or its first form does not
/// look like a namespace declaration.
pub fn derive_namespace(path: &Path) -> Option<String> {
    let source = fs::read_to_string(path).ok()?;
    read_namespace(&source)
}

/// Extract the munged namespace name from source text.
pub fn read_namespace(source: &str) -> Option<String> {
    let mut reader = FormReader::new(source);
    let name = reader.first_form_name()?;
    Some(munge(&name))
}

/// Convert a namespace name into its identifier form (`-` becomes `_`).
pub fn munge(name: &str) -> String {
    name.replace('-', "_")
}

struct FormReader<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> FormReader<'a> {
    fn new(source: &'a str) -> Self {
        // editors on Windows like to prepend a byte order mark
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        Self {
            chars: source.chars().peekable(),
        }
    }

    /// Second element of the first top-level list, if it is a symbol.
    fn first_form_name(&mut self) -> Option<String> {
        self.skip_ignorable();
        if self.chars.next()? != '(' {
            return None;
        }

        self.skip_ignorable();
        let _head = self.read_symbol()?;

        self.skip_ignorable_and_meta()?;
        self.read_symbol()
    }

    /// Skip whitespace, commas and line comments.
    fn skip_ignorable(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || c == ',' {
                self.chars.next();
            } else if c == ';' {
                for c in self.chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    /// Skip ignorable input plus any `^meta` annotations before a name.
    fn skip_ignorable_and_meta(&mut self) -> Option<()> {
        loop {
            self.skip_ignorable();
            if self.chars.peek() != Some(&'^') {
                return Some(());
            }
            self.chars.next();
            self.skip_form()?;
        }
    }

    /// Skip one form: a balanced collection, a string or a bare token.
    fn skip_form(&mut self) -> Option<()> {
        match *self.chars.peek()? {
            '(' | '[' | '{' => self.skip_balanced(),
            '"' => self.skip_string(),
            _ => self.read_token().map(|_| ()),
        }
    }

    fn skip_balanced(&mut self) -> Option<()> {
        let mut depth = 0usize;
        loop {
            match *self.chars.peek()? {
                '(' | '[' | '{' => {
                    depth += 1;
                    self.chars.next();
                }
                ')' | ']' | '}' => {
                    self.chars.next();
                    depth = depth.checked_sub(1)?;
                    if depth == 0 {
                        return Some(());
                    }
                }
                '"' => self.skip_string()?,
                ';' => self.skip_ignorable(),
                // character literal: `\)` does not close anything
                '\\' => {
                    self.chars.next();
                    self.chars.next()?;
                }
                _ => {
                    self.chars.next();
                }
            }
        }
    }

    fn skip_string(&mut self) -> Option<()> {
        self.chars.next(); // opening quote
        loop {
            match self.chars.next()? {
                '\\' => {
                    self.chars.next()?;
                }
                '"' => return Some(()),
                _ => {}
            }
        }
    }

    fn read_token(&mut self) -> Option<String> {
        let mut token = String::new();
        while let Some(&c) = self.chars.peek() {
            if c == '\\' {
                token.push(c);
                self.chars.next();
                token.push(self.chars.next()?);
                continue;
            }
            if c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '"' | ';' | ',')
            {
                break;
            }
            token.push(c);
            self.chars.next();
        }
        (!token.is_empty()).then_some(token)
    }

    fn read_symbol(&mut self) -> Option<String> {
        let token = self.read_token()?;
        is_symbol(&token).then_some(token)
    }
}

/// Keywords, numbers, characters and reader macros are not symbols.
fn is_symbol(token: &str) -> bool {
    let Some(first) = token.chars().next() else {
        return false;
    };
    !(first.is_ascii_digit() || matches!(first, ':' | '\\' | '#' | '\'' | '@' | '~' | '`' | '^'))
}
