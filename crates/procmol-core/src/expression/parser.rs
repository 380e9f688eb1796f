use super::ast::{BinaryOp, ExprNode, UnaryOp};
use super::error::ExpressionError;
use super::functions::{Function, constant};
use super::lexer::{Token, TokenKind, tokenize};
use super::value::ExpressionValue;

pub(crate) fn parse(source: &str) -> Result<ExprNode, ExpressionError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, index: 0 };
    if parser.check(&TokenKind::Eof) {
        return Err(ExpressionError::syntax(0, "empty expression"));
    }
    let root = parser.parse_expression()?;
    if !parser.check(&TokenKind::Eof) {
        let token = parser.peek();
        return Err(ExpressionError::syntax(
            token.position,
            format!("unexpected {:?}", token.kind),
        ));
    }
    Ok(root)
}

struct Parser {
    tokens: Vec<Token>,
    index: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    fn check(&self, kind: &TokenKind) -> bool {
        &self.peek().kind == kind
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.index < self.tokens.len() - 1 {
            self.index += 1;
        }
        token
    }

    fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, message: &str) -> Result<(), ExpressionError> {
        if self.match_kind(&kind) {
            Ok(())
        } else {
            Err(ExpressionError::syntax(self.peek().position, message))
        }
    }

    fn binary(lhs: ExprNode, op: BinaryOp, rhs: ExprNode) -> ExprNode {
        ExprNode::Binary {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        }
    }

    fn parse_expression(&mut self) -> Result<ExprNode, ExpressionError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<ExprNode, ExpressionError> {
        let mut expr = self.parse_and()?;
        while self.match_kind(&TokenKind::OrOr) {
            let rhs = self.parse_and()?;
            expr = Self::binary(expr, BinaryOp::Or, rhs);
        }
        Ok(expr)
    }

    fn parse_and(&mut self) -> Result<ExprNode, ExpressionError> {
        let mut expr = self.parse_equality()?;
        while self.match_kind(&TokenKind::AndAnd) {
            let rhs = self.parse_equality()?;
            expr = Self::binary(expr, BinaryOp::And, rhs);
        }
        Ok(expr)
    }

    fn parse_equality(&mut self) -> Result<ExprNode, ExpressionError> {
        let mut expr = self.parse_comparison()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqualEqual => BinaryOp::Equal,
                TokenKind::NotEqual => BinaryOp::NotEqual,
                _ => return Ok(expr),
            };
            self.advance();
            let rhs = self.parse_comparison()?;
            expr = Self::binary(expr, op, rhs);
        }
    }

    fn parse_comparison(&mut self) -> Result<ExprNode, ExpressionError> {
        let mut expr = self.parse_add_sub()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessEqual => BinaryOp::LessEqual,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                _ => return Ok(expr),
            };
            self.advance();
            let rhs = self.parse_add_sub()?;
            expr = Self::binary(expr, op, rhs);
        }
    }

    fn parse_add_sub(&mut self) -> Result<ExprNode, ExpressionError> {
        let mut expr = self.parse_mul_div()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Subtract,
                _ => return Ok(expr),
            };
            self.advance();
            let rhs = self.parse_mul_div()?;
            expr = Self::binary(expr, op, rhs);
        }
    }

    fn parse_mul_div(&mut self) -> Result<ExprNode, ExpressionError> {
        let mut expr = self.parse_unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Multiply,
                TokenKind::Slash => BinaryOp::Divide,
                TokenKind::Percent => BinaryOp::Modulo,
                _ => return Ok(expr),
            };
            self.advance();
            let rhs = self.parse_unary()?;
            expr = Self::binary(expr, op, rhs);
        }
    }

    fn parse_unary(&mut self) -> Result<ExprNode, ExpressionError> {
        if self.match_kind(&TokenKind::Minus) {
            let operand = self.parse_unary()?;
            return Ok(ExprNode::Unary {
                op: UnaryOp::Negate,
                operand: Box::new(operand),
            });
        }
        if self.match_kind(&TokenKind::Bang) {
            let operand = self.parse_unary()?;
            return Ok(ExprNode::Unary {
                op: UnaryOp::Not,
                operand: Box::new(operand),
            });
        }
        if self.match_kind(&TokenKind::Plus) {
            return self.parse_unary();
        }
        self.parse_power()
    }

    /// `^` binds tighter than unary minus and associates to the right.
    fn parse_power(&mut self) -> Result<ExprNode, ExpressionError> {
        let base = self.parse_primary()?;
        if self.match_kind(&TokenKind::Caret) {
            let exponent = self.parse_unary()?;
            return Ok(Self::binary(base, BinaryOp::Power, exponent));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<ExprNode, ExpressionError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Integer(i) => Ok(ExprNode::Constant(ExpressionValue::Integer(i))),
            TokenKind::Double(d) => Ok(ExprNode::Constant(ExpressionValue::Double(d))),
            TokenKind::LParen => {
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen, "expected ')'")?;
                Ok(inner)
            }
            TokenKind::Identifier(name) => {
                if self.match_kind(&TokenKind::LParen) {
                    let function = Function::lookup(&name)
                        .ok_or_else(|| ExpressionError::UnknownFunction(name.clone()))?;
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expression()?);
                            if !self.match_kind(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen, "expected ')' after function arguments")?;
                    function.check_arity(args.len())?;
                    Ok(ExprNode::Call { function, args })
                } else if let Some(value) = constant(&name) {
                    Ok(ExprNode::Constant(ExpressionValue::Double(value)))
                } else {
                    Ok(ExprNode::Variable(name))
                }
            }
            TokenKind::Eof => Err(ExpressionError::syntax(
                token.position,
                "unexpected end of expression",
            )),
            other => Err(ExpressionError::syntax(
                token.position,
                format!("unexpected {other:?}"),
            )),
        }
    }
}
