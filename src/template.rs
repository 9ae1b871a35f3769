// src/template.rs
//! `{name}` placeholder scanning for evaluation messages.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece<'a> {
    Literal(&'a str),
    /// `{{` or `}}`.
    Brace(char),
    Placeholder(&'a str),
}

pub struct Parser<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> Parser<'a> {
    pub fn new(s: &'a str) -> Self {
        Self { s, i: 0 }
    }

    /// Split the template into literal runs, escaped braces and
    /// placeholders. A `{` without a matching `}` or with a non-name body is
    /// literal text.
    pub fn pieces(mut self) -> Vec<Piece<'a>> {
        let mut out = Vec::new();
        let mut start = self.i;
        while let Some(c) = self.peek_char() {
            if (c == '{' && self.peek_str("{{")) || (c == '}' && self.peek_str("}}")) {
                self.flush(&mut out, start);
                self.i += 2;
                out.push(Piece::Brace(c));
                start = self.i;
                continue;
            }
            if c == '{' {
                let open = self.i;
                self.i += 1;
                match self.capture_until('}') {
                    Some(name) if is_name(name) => {
                        self.i = open;
                        self.flush(&mut out, start);
                        self.i = open + 1 + name.len();
                        self.expect('}');
                        out.push(Piece::Placeholder(name));
                        start = self.i;
                    }
                    _ => self.i = open + 1,
                }
                continue;
            }
            self.i += c.len_utf8();
        }
        self.flush(&mut out, start);
        out
    }

    fn flush(&self, out: &mut Vec<Piece<'a>>, start: usize) {
        if self.i > start {
            out.push(Piece::Literal(&self.s[start..self.i]));
        }
    }

    fn capture_until(&mut self, end: char) -> Option<&'a str> {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if c == end {
                return Some(&self.s[start..self.i]);
            }
            self.i += c.len_utf8();
        }
        None
    }

    fn expect(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.i += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    fn peek_str(&self, lit: &str) -> bool {
        self.s[self.i..].starts_with(lit)
    }
}

fn is_name(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c == '_' || c == '.' || c.is_ascii_alphanumeric())
}

/// Substitute placeholders. `resolve` returns `None` for names it does not
/// know; those are left as written.
pub fn render<F>(template: &str, mut resolve: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    let mut out = String::with_capacity(template.len());
    for piece in Parser::new(template).pieces() {
        match piece {
            Piece::Literal(s) => out.push_str(s),
            Piece::Brace(c) => out.push(c),
            Piece::Placeholder(name) => match resolve(name) {
                Some(v) => out.push_str(&v),
                None => {
                    out.push('{');
                    out.push_str(name);
                    out.push('}');
                }
            },
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn splits_placeholders_and_literals() {
        let pieces = Parser::new("expected {value} to be {arg0}!").pieces();
        assert_eq!(
            pieces,
            vec![
                Piece::Literal("expected "),
                Piece::Placeholder("value"),
                Piece::Literal(" to be "),
                Piece::Placeholder("arg0"),
                Piece::Literal("!"),
            ]
        );
    }

    #[test]
    fn escaped_and_malformed_braces_are_literal() {
        let out = render("{{value}} {not a name} {open", |_| Some("X".into()));
        assert_eq!(out, "{value} {not a name} {open");
    }

    #[test]
    fn unknown_names_are_kept() {
        let out = render("{value} vs {other}", |n| (n == "value").then(|| "1".to_string()));
        assert_eq!(out, "1 vs {other}");
    }

    #[test]
    fn multibyte_text_is_preserved() {
        let out = render("é{value}ü", |_| Some("→".into()));
        assert_eq!(out, "é→ü");
    }
}
