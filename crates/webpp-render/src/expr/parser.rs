//! Recursive-descent parser for the expression grammar.

use crate::error::{Error, Result};
use crate::expr::ast::{Expr, Operand};

/// Internal parse result: the error side is the byte offset where
/// parsing stopped.
type PResult<T> = std::result::Result<T, usize>;

/// Parse an expression, requiring the whole input to be consumed.
pub fn parse(input: &str) -> Result<Expr> {
    let mut parser = Parser { input, pos: 0 };
    match parser.parse_expression() {
        Ok(expr) => Ok(expr),
        Err(stop) => Err(Error::new(format!(
            "Parse failed, stopped at character {}: {}",
            stop,
            &input[stop..]
        ))),
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn parse_expression(&mut self) -> PResult<Expr> {
        self.skip_space();
        let expr = self.parse_or()?;
        self.skip_space();
        if self.pos < self.input.len() {
            Err(self.pos)
        } else {
            Ok(expr)
        }
    }

    fn parse_or(&mut self) -> PResult<Expr> {
        let mut left = self.parse_and()?;
        while self.keyword_sep("or") {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> PResult<Expr> {
        let mut left = self.parse_atom_expr()?;
        while self.keyword_sep("and") {
            let right = self.parse_atom_expr()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_atom_expr(&mut self) -> PResult<Expr> {
        self.skip_space();

        let save = self.pos;
        if self.consume_word("not") {
            self.skip_space();
            if self.consume("(") {
                let inner = self.parse_or()?;
                self.skip_space();
                if !self.consume(")") {
                    return Err(self.pos);
                }
                return Ok(Expr::Not(Box::new(inner)));
            }
            self.pos = save;
        }

        if self.consume("(") {
            let inner = self.parse_or()?;
            self.skip_space();
            if !self.consume(")") {
                return Err(self.pos);
            }
            return Ok(inner);
        }

        let atom = self.parse_atom()?;

        // `atom SPACE+ unary_op`
        let save = self.pos;
        if self.skip_space() > 0 {
            if let Some(op) = self.parse_unary_op() {
                return Ok(Expr::Unary {
                    op,
                    operand: Box::new(atom),
                });
            }
        }
        self.pos = save;

        // `atom binary_op atom` — a bare atom is not an expression.
        self.skip_space();
        let op = match self.parse_binary_op() {
            Some(op) => op,
            None => return Err(self.pos),
        };
        self.skip_space();
        let rhs = self.parse_atom()?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(atom),
            rhs: Box::new(rhs),
        })
    }

    fn parse_atom(&mut self) -> PResult<Expr> {
        self.skip_space();
        match self.peek() {
            Some('\'') => self.parse_string_literal(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let identifier = self.consume_identifier();
                if self.consume("()") {
                    Ok(Expr::function(identifier))
                } else {
                    Ok(Expr::Variable(identifier.to_string()))
                }
            }
            Some(_) => self.parse_number(),
            None => Err(self.pos),
        }
    }

    fn parse_string_literal(&mut self) -> PResult<Expr> {
        let start = self.pos;
        if !self.consume("'") {
            return Err(start);
        }
        let mut value = String::new();
        loop {
            match self.next_char() {
                Some('\'') => return Ok(Expr::Literal(value)),
                Some('\\') => match self.next_char() {
                    Some('a') => value.push('\u{7}'),
                    Some('b') => value.push('\u{8}'),
                    Some('f') => value.push('\u{c}'),
                    Some('n') => value.push('\n'),
                    Some('r') => value.push('\r'),
                    Some('t') => value.push('\t'),
                    Some('v') => value.push('\u{b}'),
                    Some('\\') => value.push('\\'),
                    Some('\'') => value.push('\''),
                    Some('"') => value.push('"'),
                    Some('x') => {
                        let mut code = 0u32;
                        let mut digits = 0;
                        while digits < 2 {
                            match self.peek().and_then(|c| c.to_digit(16)) {
                                Some(d) => {
                                    code = code * 16 + d;
                                    self.pos += 1;
                                    digits += 1;
                                }
                                None => break,
                            }
                        }
                        if digits == 0 {
                            return Err(self.pos);
                        }
                        match char::from_u32(code) {
                            Some(c) => value.push(c),
                            None => return Err(self.pos),
                        }
                    }
                    _ => return Err(self.pos),
                },
                Some(c) => value.push(c),
                None => return Err(start),
            }
        }
    }

    fn parse_number(&mut self) -> PResult<Expr> {
        let start = self.pos;
        if matches!(self.peek(), Some('+') | Some('-')) {
            self.pos += 1;
        }

        let digits_start = self.pos;
        self.consume_digits();
        if self.pos == digits_start {
            self.pos = start;
            return Err(start);
        }

        let mut is_real = false;
        // a real requires a dot followed by digits
        if self.peek() == Some('.') {
            let after_dot = self.pos + 1;
            if self
                .input
                .as_bytes()
                .get(after_dot)
                .is_some_and(|b| b.is_ascii_digit())
            {
                self.pos = after_dot;
                self.consume_digits();
                is_real = true;
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let save = self.pos;
            self.pos += 1;
            if matches!(self.peek(), Some('+') | Some('-')) {
                self.pos += 1;
            }
            let exponent_start = self.pos;
            self.consume_digits();
            if self.pos == exponent_start {
                self.pos = save;
            } else {
                is_real = true;
            }
        }

        let text = &self.input[start..self.pos];
        if is_real {
            text.parse::<f64>().map(Expr::Real).map_err(|_| start)
        } else {
            text.parse::<i64>().map(Expr::Int).map_err(|_| start)
        }
    }

    fn parse_unary_op(&mut self) -> Option<Operand> {
        let save = self.pos;
        if !self.consume_word("is") || self.skip_space() == 0 {
            self.pos = save;
            return None;
        }

        if self.consume_word("not") {
            if self.skip_space() == 0 {
                self.pos = save;
                return None;
            }
            let op = if self.consume_word("true") {
                Some(Operand::IsNotTrue)
            } else if self.consume_word("empty") {
                Some(Operand::IsNotEmpty)
            } else if self.consume_word("null") {
                Some(Operand::IsNotNull)
            } else {
                None
            };
            if op.is_none() {
                self.pos = save;
            }
            return op;
        }

        let op = if self.consume_word("true") {
            Some(Operand::IsTrue)
        } else if self.consume_word("false") {
            // synonym of "is not true"
            Some(Operand::IsNotTrue)
        } else if self.consume_word("empty") {
            Some(Operand::IsEmpty)
        } else if self.consume_word("null") {
            Some(Operand::IsNull)
        } else {
            None
        };
        if op.is_none() {
            self.pos = save;
        }
        op
    }

    fn parse_binary_op(&mut self) -> Option<Operand> {
        for (token, op) in [
            ("!=", Operand::Ne),
            ("<=", Operand::Le),
            (">=", Operand::Ge),
            ("=", Operand::Eq),
            ("<", Operand::Lt),
            (">", Operand::Gt),
        ] {
            if self.consume(token) {
                return Some(op);
            }
        }
        None
    }

    /// Consume `SPACE+ keyword SPACE+`, restoring the position when any
    /// part is missing.
    fn keyword_sep(&mut self, keyword: &str) -> bool {
        let save = self.pos;
        if self.skip_space() == 0 || !self.consume_word(keyword) || self.skip_space() == 0 {
            self.pos = save;
            return false;
        }
        true
    }

    fn skip_space(&mut self) -> usize {
        let start = self.pos;
        while self
            .input
            .as_bytes()
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_whitespace())
        {
            self.pos += 1;
        }
        self.pos - start
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn next_char(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn consume(&mut self, token: &str) -> bool {
        if self.input[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    /// Consume `word` only when it is not a prefix of a longer
    /// identifier.
    fn consume_word(&mut self, word: &str) -> bool {
        if !self.input[self.pos..].starts_with(word) {
            return false;
        }
        let next = self.input[self.pos + word.len()..].chars().next();
        if next.is_some_and(is_identifier_char) {
            return false;
        }
        self.pos += word.len();
        true
    }

    fn consume_identifier(&mut self) -> &'a str {
        let start = self.pos;
        while self.peek().is_some_and(is_identifier_char) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn consume_digits(&mut self) {
        while self
            .input
            .as_bytes()
            .get(self.pos)
            .is_some_and(|b| b.is_ascii_digit())
        {
            self.pos += 1;
        }
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.'
}
