//! Date filter expressions.
//!
//! A date filter is a boolean expression over the publication year, bound to
//! the variable `x`:
//!
//! ```text
//! 2017 < x <= 2024
//! x in {2017, 2019, 2023}
//! ([x] <= 2017) or ([x] >= 2020)
//! not x == 2021
//! ```
//!
//! Expressions are tokenized and parsed into an AST once; evaluation is a pure
//! walk over that tree.

use crate::error::FilterError;

/// Maximum accepted length of a filter expression, in characters.
pub const MAX_EXPRESSION_LEN: usize = 100;

/// A parsed date filter.
#[derive(Debug, Clone, PartialEq)]
pub struct DateFilter {
    source: String,
    expr: Expr,
}

impl DateFilter {
    /// Parse an expression. An empty (or blank) expression means "no filter".
    pub fn parse(source: &str) -> Result<Option<Self>, FilterError> {
        let len = source.chars().count();
        if len > MAX_EXPRESSION_LEN {
            return Err(FilterError::TooLong {
                len,
                max: MAX_EXPRESSION_LEN,
            });
        }
        if source.trim().is_empty() {
            return Ok(None);
        }

        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            end: source.len(),
        };
        let expr = parser.parse_or()?;
        if let Some(tok) = parser.peek() {
            return Err(parser.error_at(tok.pos, "unexpected trailing input"));
        }

        Ok(Some(Self {
            source: source.trim().to_string(),
            expr,
        }))
    }

    /// Evaluate the filter for a publication year.
    pub fn matches(&self, year: i32) -> bool {
        self.expr.eval(year)
    }

    /// The expression as written.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl std::fmt::Display for DateFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    /// `a op b op c ...`, true when every adjacent pair holds.
    Compare {
        first: Operand,
        rest: Vec<(CmpOp, Operand)>,
    },
    Member {
        operand: Operand,
        set: Vec<i32>,
        negated: bool,
    },
}

impl Expr {
    fn eval(&self, year: i32) -> bool {
        match self {
            Expr::Or(a, b) => a.eval(year) || b.eval(year),
            Expr::And(a, b) => a.eval(year) && b.eval(year),
            Expr::Not(e) => !e.eval(year),
            Expr::Compare { first, rest } => {
                let mut left = first.value(year);
                for (op, operand) in rest {
                    let right = operand.value(year);
                    if !op.apply(left, right) {
                        return false;
                    }
                    left = right;
                }
                true
            }
            Expr::Member {
                operand,
                set,
                negated,
            } => set.contains(&operand.value(year)) != *negated,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Operand {
    Year,
    Literal(i32),
}

impl Operand {
    fn value(self, year: i32) -> i32 {
        match self {
            Operand::Year => year,
            Operand::Literal(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl CmpOp {
    fn apply(self, a: i32, b: i32) -> bool {
        match self {
            CmpOp::Lt => a < b,
            CmpOp::Le => a <= b,
            CmpOp::Gt => a > b,
            CmpOp::Ge => a >= b,
            CmpOp::Eq => a == b,
            CmpOp::Ne => a != b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TokenKind {
    Int(i32),
    Year,
    Cmp(CmpOp),
    Bang,
    And,
    Or,
    Not,
    In,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: TokenKind,
    pos: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>, FilterError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        let start = i;

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        let two = bytes.get(i..i + 2);
        let kind = match (c, two) {
            (_, Some(b"<=")) => Some((TokenKind::Cmp(CmpOp::Le), 2)),
            (_, Some(b">=")) => Some((TokenKind::Cmp(CmpOp::Ge), 2)),
            (_, Some(b"==")) => Some((TokenKind::Cmp(CmpOp::Eq), 2)),
            (_, Some(b"!=")) => Some((TokenKind::Cmp(CmpOp::Ne), 2)),
            (b'<', _) => Some((TokenKind::Cmp(CmpOp::Lt), 1)),
            (b'>', _) => Some((TokenKind::Cmp(CmpOp::Gt), 1)),
            (b'!', _) => Some((TokenKind::Bang, 1)),
            (b'(', _) => Some((TokenKind::LParen, 1)),
            (b')', _) => Some((TokenKind::RParen, 1)),
            (b'{', _) => Some((TokenKind::LBrace, 1)),
            (b'}', _) => Some((TokenKind::RBrace, 1)),
            (b'[', _) => Some((TokenKind::LBracket, 1)),
            (b']', _) => Some((TokenKind::RBracket, 1)),
            (b',', _) => Some((TokenKind::Comma, 1)),
            _ => None,
        };

        if let Some((kind, width)) = kind {
            tokens.push(Token { kind, pos: start });
            i += width;
            continue;
        }

        if c.is_ascii_digit() {
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            let value = source[start..i].parse::<i32>().map_err(|_| FilterError::Expression {
                pos: start,
                message: format!("number out of range: {}", &source[start..i]),
            })?;
            tokens.push(Token {
                kind: TokenKind::Int(value),
                pos: start,
            });
            continue;
        }

        if c.is_ascii_alphabetic() {
            while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
                i += 1;
            }
            let word = source[start..i].to_ascii_lowercase();
            let kind = match word.as_str() {
                "x" => TokenKind::Year,
                "and" => TokenKind::And,
                "or" => TokenKind::Or,
                "not" => TokenKind::Not,
                "in" => TokenKind::In,
                _ => {
                    return Err(FilterError::Expression {
                        pos: start,
                        message: format!("unknown word '{}' (only x, and, or, not, in)", word),
                    })
                }
            };
            tokens.push(Token { kind, pos: start });
            continue;
        }

        let ch = source[start..].chars().next().unwrap_or('?');
        return Err(FilterError::Expression {
            pos: start,
            message: format!("invalid character '{}'", ch),
        });
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    end: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn peek_kind(&self) -> Option<TokenKind> {
        self.peek().map(|t| t.kind)
    }

    fn peek_kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| t.kind)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn here(&self) -> usize {
        self.peek().map(|t| t.pos).unwrap_or(self.end)
    }

    fn error_at(&self, pos: usize, message: &str) -> FilterError {
        FilterError::Expression {
            pos,
            message: message.to_string(),
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<(), FilterError> {
        match self.next() {
            Some(tok) if tok.kind == kind => Ok(()),
            Some(tok) => Err(self.error_at(tok.pos, &format!("expected {}", what))),
            None => Err(self.error_at(self.end, &format!("expected {}, found end of input", what))),
        }
    }

    fn parse_or(&mut self) -> Result<Expr, FilterError> {
        let mut left = self.parse_and()?;
        while self.peek_kind() == Some(TokenKind::Or) {
            self.next();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, FilterError> {
        let mut left = self.parse_not()?;
        while self.peek_kind() == Some(TokenKind::And) {
            self.next();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, FilterError> {
        match self.peek_kind() {
            Some(TokenKind::Not) | Some(TokenKind::Bang) => {
                self.next();
                Ok(Expr::Not(Box::new(self.parse_not()?)))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, FilterError> {
        if self.peek_kind() == Some(TokenKind::LParen) {
            self.next();
            let inner = self.parse_or()?;
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(inner);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Expr, FilterError> {
        let first = self.parse_operand()?;

        match self.peek_kind() {
            Some(TokenKind::Cmp(_)) => {
                let mut rest = Vec::new();
                while let Some(TokenKind::Cmp(op)) = self.peek_kind() {
                    self.next();
                    rest.push((op, self.parse_operand()?));
                }
                Ok(Expr::Compare { first, rest })
            }
            Some(TokenKind::In) => {
                self.next();
                Ok(Expr::Member {
                    operand: first,
                    set: self.parse_set()?,
                    negated: false,
                })
            }
            Some(TokenKind::Not) if self.peek_kind_at(1) == Some(TokenKind::In) => {
                self.next();
                self.next();
                Ok(Expr::Member {
                    operand: first,
                    set: self.parse_set()?,
                    negated: true,
                })
            }
            _ => Err(self.error_at(self.here(), "expected a comparison or 'in'")),
        }
    }

    fn parse_operand(&mut self) -> Result<Operand, FilterError> {
        let pos = self.here();
        match self.next().map(|t| t.kind) {
            Some(TokenKind::Year) => Ok(Operand::Year),
            Some(TokenKind::Int(v)) => Ok(Operand::Literal(v)),
            Some(TokenKind::LBracket) => {
                self.expect(TokenKind::Year, "'x' inside '[ ]'")?;
                self.expect(TokenKind::RBracket, "']'")?;
                Ok(Operand::Year)
            }
            Some(_) => Err(self.error_at(pos, "expected 'x' or a year")),
            None => Err(self.error_at(pos, "expected 'x' or a year, found end of input")),
        }
    }

    fn parse_set(&mut self) -> Result<Vec<i32>, FilterError> {
        let pos = self.here();
        let close = match self.next().map(|t| t.kind) {
            Some(TokenKind::LBrace) => TokenKind::RBrace,
            Some(TokenKind::LBracket) => TokenKind::RBracket,
            Some(TokenKind::LParen) => TokenKind::RParen,
            _ => return Err(self.error_at(pos, "expected a set such as {2019, 2020}")),
        };

        let mut values = Vec::new();
        loop {
            let pos = self.here();
            match self.next().map(|t| t.kind) {
                Some(TokenKind::Int(v)) => values.push(v),
                Some(k) if k == close && values.is_empty() => return Ok(values),
                _ => return Err(self.error_at(pos, "expected a year in set")),
            }
            match self.next().map(|t| t.kind) {
                Some(TokenKind::Comma) => continue,
                Some(k) if k == close => return Ok(values),
                _ => return Err(self.error_at(self.here(), "expected ',' or end of set")),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(src: &str) -> DateFilter {
        DateFilter::parse(src).unwrap().unwrap()
    }

    #[test]
    fn test_valid_filters() {
        assert!(DateFilter::parse("2017 < x <= 2024").unwrap().is_some());
        assert!(DateFilter::parse("x == 2020").unwrap().is_some());
        assert!(DateFilter::parse("x in {2017, 2019, 2023}").unwrap().is_some());
        assert!(DateFilter::parse("(2017 < x) or (x == 2020)").unwrap().is_some());
        assert!(DateFilter::parse("[x] in {2017, 2019}").unwrap().is_some());
    }

    #[test]
    fn test_empty_filter_is_none() {
        assert!(DateFilter::parse("").unwrap().is_none());
        assert!(DateFilter::parse("   ").unwrap().is_none());
    }

    #[test]
    fn test_invalid_characters() {
        assert!(DateFilter::parse("2017 < y <= 2024").is_err());
        assert!(DateFilter::parse("2017 < x < 2024#").is_err());
        assert!(DateFilter::parse("2017 < x < 2024$").is_err());
        assert!(DateFilter::parse("__import__('os')").is_err());
    }

    #[test]
    fn test_invalid_syntax() {
        assert!(DateFilter::parse("2017 < x <=").is_err());
        assert!(DateFilter::parse("x ==").is_err());
        assert!(DateFilter::parse("in {2017, 2019}").is_err());
        assert!(DateFilter::parse("(x > 2017").is_err());
        assert!(DateFilter::parse("x > 2017 2018").is_err());
        assert!(DateFilter::parse("x").is_err());
    }

    #[test]
    fn test_filter_too_long() {
        let long_filter = format!("x == 2020{}", " and x == 2020".repeat(20));
        assert!(matches!(
            DateFilter::parse(&long_filter),
            Err(FilterError::TooLong { .. })
        ));
    }

    #[test]
    fn test_case_insensitivity() {
        let f = filter("x In {2017, 2019, 2023}");
        assert!(f.matches(2019));
        let f = filter("(2017 < X) OR (x == 2020)");
        assert!(f.matches(2018));
    }

    #[test]
    fn test_chained_comparison() {
        let f = filter("2017 < x <= 2024");
        assert!(!f.matches(2017));
        assert!(f.matches(2018));
        assert!(f.matches(2024));
        assert!(!f.matches(2025));
    }

    #[test]
    fn test_membership_and_negation() {
        let f = filter("x not in {2019, 2020}");
        assert!(f.matches(2018));
        assert!(!f.matches(2019));

        let f = filter("!(x == 2020)");
        assert!(!f.matches(2020));
        assert!(f.matches(2021));
    }

    #[test]
    fn test_precedence_and_binds_tighter() {
        // x == 2010 or (x > 2020 and x < 2023)
        let f = filter("x == 2010 or x > 2020 and x < 2023");
        assert!(f.matches(2010));
        assert!(f.matches(2021));
        assert!(!f.matches(2024));
    }

    #[test]
    fn test_error_reports_position() {
        match DateFilter::parse("x == 2020 #") {
            Err(FilterError::Expression { pos, .. }) => assert_eq!(pos, 10),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
