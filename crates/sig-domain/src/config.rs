//! Configuration Language & Parser.
//!
//! Recursive-descent parser over a hand-rolled lexer, per the REDESIGN
//! FLAG replacing the source's parser-generator tooling. The grammar has
//! no ambiguity:
//!
//! ```text
//! config      := signature*
//! signature   := "signature" STRING "plate" N "visit" visitRange
//!                "fields" range "{" plateDefn+ "}"
//! plateDefn   := "plate" N ignoreFields ";"
//! ignoreFields:= ("ignore" "fields" range)?
//! visitRange  := "*" | range
//! range       := element ("," element)*
//! element     := N | N "-" N
//! ```

use crate::range_set::RangeSet;

/// One flattened configuration record — one per `plateDefn` entry, with
/// the enclosing `signature` header's fields deep-copied in, per
/// the same record-flattening semantics.
#[derive(Debug, Clone)]
pub struct SignatureConfig {
    pub name: String,
    pub sig_plate: i64,
    pub visits: RangeSet,
    pub sig_fields: RangeSet,
    pub n_sig_fields: i64,
    pub plate: i64,
    pub ignore_fields: RangeSet,
    pub serial: u64,
}

/// A configuration syntax error, reported with enough context (line
/// number) for the CLI to print it per the error-handling design.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// Parse a whole configuration source, returning every successfully
/// flattened record plus every syntax error encountered. A
/// a syntax error resynchronises to the next `}` and discards the
/// signature block currently being parsed; parsing continues with the
/// next `signature` keyword. The caller (CLI) aborts the run if
/// `errors` is non-empty.
pub fn parse_config(source: &str) -> (Vec<SignatureConfig>, Vec<ConfigError>) {
    let tokens = lex(source);
    let mut parser = Parser {
        tokens,
        pos: 0,
        serial: 0,
    };
    let mut configs = Vec::new();
    let mut errors = Vec::new();

    while !parser.at_eof() {
        match parser.parse_signature() {
            Ok(mut block) => configs.append(&mut block),
            Err(e) => {
                errors.push(e);
                parser.resync_to_close_brace();
            }
        }
    }

    (configs, errors)
}

// ---------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    Number(i64),
    Str(String),
    LBrace,
    RBrace,
    Semi,
    Comma,
    Dash,
    Star,
}

#[derive(Debug, Clone)]
struct Token {
    tok: Tok,
    line: usize,
}

fn lex(source: &str) -> Vec<Token> {
    let mut out = Vec::new();
    let mut line = 1usize;
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                i += 1;
            }
            c if c.is_whitespace() => {
                i += 1;
            }
            '{' => {
                out.push(Token { tok: Tok::LBrace, line });
                i += 1;
            }
            '}' => {
                out.push(Token { tok: Tok::RBrace, line });
                i += 1;
            }
            ';' => {
                out.push(Token { tok: Tok::Semi, line });
                i += 1;
            }
            ',' => {
                out.push(Token { tok: Tok::Comma, line });
                i += 1;
            }
            '-' => {
                out.push(Token { tok: Tok::Dash, line });
                i += 1;
            }
            '*' => {
                out.push(Token { tok: Tok::Star, line });
                i += 1;
            }
            '"' => {
                let start_line = line;
                i += 1;
                let mut s = String::new();
                while i < chars.len() && chars[i] != '"' {
                    if chars[i] == '\n' {
                        line += 1;
                    }
                    s.push(chars[i]);
                    i += 1;
                }
                // Unterminated strings lex to whatever was collected; the
                // parser will fail on the missing closing token downstream.
                i += 1;
                out.push(Token { tok: Tok::Str(s), line: start_line });
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                out.push(Token {
                    tok: Tok::Number(text.parse().unwrap_or(0)),
                    line,
                });
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                out.push(Token { tok: Tok::Ident(text), line });
            }
            _ => {
                // Unrecognised character: skip it. It will surface as a
                // missing-expected-token syntax error at the parser layer.
                i += 1;
            }
        }
    }

    out
}

// ---------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    serial: u64,
}

type PResult<T> = Result<T, ConfigError>;

impl Parser {
    fn at_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) -> Option<Tok> {
        let t = self.tokens.get(self.pos).map(|t| t.tok.clone());
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn err(&self, message: impl Into<String>) -> ConfigError {
        ConfigError {
            line: self.line(),
            message: message.into(),
        }
    }

    fn expect_ident(&mut self, keyword: &str) -> PResult<()> {
        match self.advance() {
            Some(Tok::Ident(s)) if s == keyword => Ok(()),
            other => Err(self.err(format!("expected `{keyword}`, found {other:?}"))),
        }
    }

    fn expect_number(&mut self) -> PResult<i64> {
        match self.advance() {
            Some(Tok::Number(n)) => Ok(n),
            other => Err(self.err(format!("expected a number, found {other:?}"))),
        }
    }

    fn expect_string(&mut self) -> PResult<String> {
        match self.advance() {
            Some(Tok::Str(s)) => Ok(s),
            other => Err(self.err(format!("expected a quoted string, found {other:?}"))),
        }
    }

    fn expect(&mut self, tok: Tok) -> PResult<()> {
        match self.advance() {
            Some(t) if t == tok => Ok(()),
            other => Err(self.err(format!("expected {tok:?}, found {other:?}"))),
        }
    }

    fn check_ident(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Tok::Ident(s)) if s == keyword)
    }

    /// `range := element ("," element)*`, `element := N | N "-" N`.
    fn parse_range(&mut self) -> PResult<RangeSet> {
        let mut parsed = Vec::new();
        loop {
            let lo = self.expect_number()?;
            if matches!(self.peek(), Some(Tok::Dash)) {
                self.advance();
                let hi = self.expect_number()?;
                parsed.push((lo, hi));
            } else {
                parsed.push((lo, lo));
            }
            if matches!(self.peek(), Some(Tok::Comma)) {
                self.advance();
                continue;
            }
            break;
        }
        let mut set = RangeSet::new();
        for (min, max) in parsed.into_iter().rev() {
            set.prepend(min, max);
        }
        Ok(set)
    }

    /// `visitRange := "*" | range`
    fn parse_visit_range(&mut self) -> PResult<RangeSet> {
        if matches!(self.peek(), Some(Tok::Star)) {
            self.advance();
            let mut set = RangeSet::new();
            set.prepend(0, (1i64 << 31) - 1);
            Ok(set)
        } else {
            self.parse_range()
        }
    }

    /// `ignoreFields := ("ignore" "fields" range)?`
    fn parse_ignore_fields(&mut self) -> PResult<RangeSet> {
        if self.check_ident("ignore") {
            self.advance();
            self.expect_ident("fields")?;
            self.parse_range()
        } else {
            Ok(RangeSet::new())
        }
    }

    /// `plateDefn := "plate" N ignoreFields ";"`
    fn parse_plate_defn(&mut self) -> PResult<(i64, RangeSet)> {
        self.expect_ident("plate")?;
        let plate = self.expect_number()?;
        let ignore = self.parse_ignore_fields()?;
        self.expect(Tok::Semi)?;
        Ok((plate, ignore))
    }

    /// `signature := "signature" STRING "plate" N "visit" visitRange
    ///               "fields" range "{" plateDefn+ "}"`
    ///
    /// Returns the flattened records for this block (deep-copying the
    /// header fields into each).
    fn parse_signature(&mut self) -> PResult<Vec<SignatureConfig>> {
        self.expect_ident("signature")?;
        let name = self.expect_string()?;
        self.expect_ident("plate")?;
        let sig_plate = self.expect_number()?;
        self.expect_ident("visit")?;
        let visits = self.parse_visit_range()?;
        self.expect_ident("fields")?;
        let sig_fields = self.parse_range()?;
        let n_sig_fields = sig_fields.width();
        self.expect(Tok::LBrace)?;

        let mut records = Vec::new();
        loop {
            let (plate, ignore_fields) = self.parse_plate_defn()?;
            self.serial += 1;
            records.push(SignatureConfig {
                name: name.clone(),
                sig_plate,
                visits: visits.duplicate(),
                sig_fields: sig_fields.duplicate(),
                n_sig_fields,
                plate,
                ignore_fields,
                serial: self.serial,
            });
            if matches!(self.peek(), Some(Tok::RBrace)) {
                break;
            }
            if self.at_eof() {
                return Err(self.err("unexpected end of input inside signature block"));
            }
        }
        self.expect(Tok::RBrace)?;
        Ok(records)
    }

    /// Skip tokens until one `}` has been consumed (or input ends),
    /// per the parser's resynchronisation rule.
    fn resync_to_close_brace(&mut self) {
        while let Some(tok) = self.advance() {
            if tok == Tok::RBrace {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_signature_two_plates() {
        let src = r#"signature "A" plate 10 visit * fields 5 { plate 10; plate 11; }"#;
        let (configs, errors) = parse_config(src);
        assert!(errors.is_empty());
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].name, "A");
        assert_eq!(configs[0].sig_plate, 10);
        assert_eq!(configs[0].plate, 10);
        assert_eq!(configs[1].plate, 11);
        assert_eq!(configs[0].n_sig_fields, 1);
        assert_eq!(configs[0].serial, 1);
        assert_eq!(configs[1].serial, 2);
    }

    #[test]
    fn parses_ignore_fields() {
        let src = r#"signature "A" plate 10 visit 1-3 fields 5-6 { plate 11 ignore fields 12,14-16; }"#;
        let (configs, errors) = parse_config(src);
        assert!(errors.is_empty());
        assert_eq!(configs.len(), 1);
        assert!(configs[0].ignore_fields.contains(12));
        assert!(configs[0].ignore_fields.contains(15));
        assert!(!configs[0].ignore_fields.contains(13));
        assert!(configs[0].visits.contains(2));
        assert!(!configs[0].visits.contains(4));
    }

    #[test]
    fn syntax_error_resyncs_and_continues() {
        let src = r#"
            signature "Bad" plate bogus visit * fields 1 { plate 1; }
            signature "Good" plate 20 visit * fields 2 { plate 20; }
        "#;
        let (configs, errors) = parse_config(src);
        assert_eq!(errors.len(), 1);
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].name, "Good");
    }

    #[test]
    fn serial_is_global_and_monotonic() {
        let src = r#"
            signature "A" plate 10 visit * fields 1 { plate 10; plate 11; }
            signature "B" plate 20 visit * fields 2 { plate 20; }
        "#;
        let (configs, errors) = parse_config(src);
        assert!(errors.is_empty());
        let serials: Vec<u64> = configs.iter().map(|c| c.serial).collect();
        assert_eq!(serials, vec![1, 2, 3]);
    }
}
