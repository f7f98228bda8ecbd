//! Recursive-descent parser (spec §4.2).
//!
//! Three levels — statements, expr, term — exactly as spec'd, grounded on
//! the teacher's own hand-written recursive-descent shape (`parser.rs`'s
//! `parse_expr`/`parse_term` ladder) rather than a parser-generator crate:
//! the teacher reaches for `lalrpop` only in the unrelated `emdash-udashboard`
//! example, and Blocks' single flat precedence level (spec §4.2 "Key rules")
//! makes a hand-rolled descent simpler than configuring a generator for it.

use std::rc::Rc;

use crate::ast::Expr;
use crate::error::ParseError;
use crate::lexer::{Token, TokenKind};

pub fn parse(tokens: Vec<Token>) -> Result<Vec<Expr>, ParseError> {
    let mut parser = Parser { tokens, pos: 0 };
    parser.parse_program()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn line(&self) -> u32 {
        self.peek().line
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn is_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn ident_value(&self) -> Option<&str> {
        match &self.peek().kind {
            TokenKind::Ident(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    fn is_keyword(&self, word: &str) -> bool {
        self.ident_value() == Some(word)
    }

    fn expect(&mut self, expected_desc: &str, matches: impl FnOnce(&TokenKind) -> bool) -> Result<Token, ParseError> {
        if matches(&self.peek().kind) {
            Ok(self.advance())
        } else {
            Err(self.error(expected_desc))
        }
    }

    fn error(&self, expected: &str) -> ParseError {
        ParseError {
            line: self.line(),
            expected: expected.to_string(),
            actual: describe(&self.peek().kind),
        }
    }

    fn parse_program(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut stmts = Vec::new();
        while !self.is_eof() {
            stmts.push(self.parse_expr()?);
        }
        Ok(stmts)
    }

    /// `expr := IDENT '=' expr | 'if' expr ['then'] expr ['else' expr] | term (OP term)*`
    fn parse_expr(&mut self) -> Result<Expr, ParseError> {
        if let TokenKind::Ident(name) = &self.peek().kind {
            let name = name.clone();
            if matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokenKind::Equals)) {
                let line = self.line();
                self.advance(); // name
                self.advance(); // '='
                let value = self.parse_expr()?;
                return Ok(Expr::Assign {
                    name,
                    value: Box::new(value),
                    line,
                });
            }
        }

        if self.is_keyword("if") {
            return self.parse_if();
        }

        self.parse_binops()
    }

    fn parse_if(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        self.advance(); // 'if'
        let cond = self.parse_expr()?;
        if self.is_keyword("then") {
            self.advance();
        }
        let then_branch = self.parse_expr()?;
        let else_branch = if self.is_keyword("else") {
            self.advance();
            self.parse_expr()?
        } else {
            Expr::Int(0, line)
        };
        Ok(Expr::If {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
            line,
        })
    }

    /// `term (OP term)*` — one flat, left-associative precedence level
    /// (spec §4.2, §9): implementations must not introduce precedence
    /// climbing here even though that's the more common textbook shape.
    fn parse_binops(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_term()?;
        while let TokenKind::Op(sym) = self.peek().kind.clone() {
            let line = self.line();
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Expr::BinOp {
                op: Rc::from(sym),
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                line,
            };
        }
        Ok(lhs)
    }

    /// `'(' expr ')' | NUMBER | STRING | IDENT | block`, then zero or more
    /// `'(' args ')'` call-postfix chains (spec §4.2: `f(a)(b)` parses as
    /// `Call(Call(f,[a]),[b])`).
    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let mut base = self.parse_primary()?;
        while matches!(self.peek().kind, TokenKind::LParen) {
            let line = self.line();
            self.advance(); // '('
            let args = self.parse_args()?;
            self.expect("')'", |k| matches!(k, TokenKind::RParen))?;
            base = Expr::Call {
                callee: Box::new(base),
                args,
                line,
            };
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        match self.peek().kind.clone() {
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect("')'", |k| matches!(k, TokenKind::RParen))?;
                Ok(inner)
            }
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Int(n, line))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s, line))
            }
            TokenKind::Ident(name) => {
                self.advance();
                Ok(Expr::Var(name, line))
            }
            TokenKind::LBracket => self.parse_block(),
            _ => Err(self.error("an expression")),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if matches!(self.peek().kind, TokenKind::RParen) {
            return Ok(args);
        }
        args.push(self.parse_expr()?);
        while matches!(self.peek().kind, TokenKind::Comma) {
            self.advance();
            args.push(self.parse_expr()?);
        }
        Ok(args)
    }

    /// `'[' ( '$' IDENT (',')? )* ( expr (',')? )* ']'` — param declarations
    /// and body expressions may interleave freely (spec §4.2 "Key rules");
    /// any identifier token whose raw value begins with `$`, wherever it
    /// appears, is a parameter declaration rather than a body expression.
    fn parse_block(&mut self) -> Result<Expr, ParseError> {
        let line = self.line();
        self.advance(); // '['
        let mut params = Vec::new();
        let mut body = Vec::new();
        loop {
            while matches!(self.peek().kind, TokenKind::Comma) {
                self.advance();
            }
            if matches!(self.peek().kind, TokenKind::RBracket) {
                break;
            }
            if let TokenKind::Ident(name) = &self.peek().kind {
                if let Some(stripped) = name.strip_prefix('$') {
                    params.push(Rc::from(stripped));
                    self.advance();
                    continue;
                }
            }
            body.push(self.parse_expr()?);
        }
        self.expect("']'", |k| matches!(k, TokenKind::RBracket))?;
        Ok(Expr::Block { params, body, line })
    }
}

fn describe(kind: &TokenKind) -> String {
    match kind {
        TokenKind::Number(n) => format!("number '{n}'"),
        TokenKind::Str(s) => format!("string \"{s}\""),
        TokenKind::Ident(s) => format!("identifier '{s}'"),
        TokenKind::Op(s) => format!("operator '{s}'"),
        TokenKind::LBracket => "'['".to_string(),
        TokenKind::RBracket => "']'".to_string(),
        TokenKind::LParen => "'('".to_string(),
        TokenKind::RParen => "')'".to_string(),
        TokenKind::Comma => "','".to_string(),
        TokenKind::Equals => "'='".to_string(),
        TokenKind::Eof => "end of input".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_src(src: &str) -> Vec<Expr> {
        parse(tokenize(src).unwrap()).unwrap()
    }

    #[test]
    fn call_postfix_chains_left_to_right() {
        let prog = parse_src("f(a)(b)");
        match &prog[0] {
            Expr::Call { callee, args, .. } => {
                assert_eq!(args.len(), 1);
                match callee.as_ref() {
                    Expr::Call { args: inner_args, .. } => assert_eq!(inner_args.len(), 1),
                    other => panic!("expected nested call, got {other:?}"),
                }
            }
            other => panic!("expected call, got {other:?}"),
        }
    }

    #[test]
    fn missing_else_synthesizes_int_zero() {
        let prog = parse_src("if 1 then 2");
        match &prog[0] {
            Expr::If { else_branch, .. } => {
                assert_eq!(**else_branch, Expr::Int(0, 1));
            }
            other => panic!("expected if, got {other:?}"),
        }
    }

    #[test]
    fn block_params_are_dollar_prefixed_idents() {
        let prog = parse_src("[ $n, n ]");
        match &prog[0] {
            Expr::Block { params, body, .. } => {
                assert_eq!(params.as_slice(), [Rc::from("n")]);
                assert_eq!(body.len(), 1);
            }
            other => panic!("expected block, got {other:?}"),
        }
    }

    #[test]
    fn flat_precedence_left_associates() {
        // `a + b * c` must parse as `(a + b) * c`, not `a + (b * c)`.
        let prog = parse_src("1 + 2 * 3");
        match &prog[0] {
            Expr::BinOp { op, lhs, .. } => {
                assert_eq!(&**op, "*");
                assert!(matches!(**lhs, Expr::BinOp { .. }));
            }
            other => panic!("expected binop, got {other:?}"),
        }
    }

    #[test]
    fn two_adjacent_number_tokens_is_a_parse_error() {
        let err = parse(tokenize("1-1").unwrap()).unwrap_err();
        assert_eq!(err.line, 1);
    }
}
