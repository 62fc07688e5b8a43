use thiserror::Error;
use tq_types::Literal;

use crate::SyntaxError;
use crate::ast::{Argument, Operation};
use crate::cond;
use crate::token::{Token, TokenKind, tokenize};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("expression contains no operations")]
    EmptyChain,
    #[error("expected {expected} at position {position} but found {found}")]
    UnexpectedToken {
        position: usize,
        expected: String,
        found: String,
    },
    #[error("expected {expected} but the expression ended at position {position}")]
    UnexpectedEnd { position: usize, expected: String },
}

impl ParseError {
    #[must_use]
    pub fn position(&self) -> usize {
        match self {
            Self::EmptyChain => 0,
            Self::UnexpectedToken { position, .. } | Self::UnexpectedEnd { position, .. } => {
                *position
            }
        }
    }
}

/// Parse an expression string into its operation chain.
///
/// Syntax:
///   chain     → operation ( '.' operation )*
///   operation → IDENT '(' arguments? ')'
///   arguments → argument ( ',' argument )*
///   argument  → IDENT | NUMBER | STRING | 'true' | 'false'
///
/// The `where` operation is special-cased: everything between its
/// parentheses is handed to the condition parser instead of the argument
/// rules above, so `where(age > 30 & dept == 'IT')` yields a single
/// [`Argument::Condition`].
pub fn parse(input: &str) -> Result<Vec<Operation>, SyntaxError> {
    let tokens = tokenize(input)?;
    parse_chain(input, &tokens)
}

/// Parse an already-tokenized expression. `input` must be the string the
/// tokens were produced from; their byte offsets index into it.
pub fn parse_chain(input: &str, tokens: &[Token]) -> Result<Vec<Operation>, SyntaxError> {
    ChainParser {
        input,
        tokens,
        pos: 0,
    }
    .parse_operations()
}

struct ChainParser<'a> {
    input: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> ChainParser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn ended(&self, expected: &str) -> SyntaxError {
        ParseError::UnexpectedEnd {
            position: self.input.len(),
            expected: expected.to_owned(),
        }
        .into()
    }

    fn parse_operations(mut self) -> Result<Vec<Operation>, SyntaxError> {
        if self.tokens.is_empty() {
            return Err(ParseError::EmptyChain.into());
        }
        let mut operations = vec![self.parse_operation()?];
        while let Some(token) = self.advance() {
            if token.kind != TokenKind::Dot {
                return Err(unexpected(token, "'.' or the end of the expression"));
            }
            operations.push(self.parse_operation()?);
        }
        Ok(operations)
    }

    fn parse_operation(&mut self) -> Result<Operation, SyntaxError> {
        let name = match self.advance() {
            Some(token) => match &token.kind {
                TokenKind::Ident(name) => name.clone(),
                _ => return Err(unexpected(token, "an operation name")),
            },
            None => return Err(self.ended("an operation name")),
        };
        let lparen = match self.advance() {
            Some(token) if token.kind == TokenKind::LParen => token,
            Some(token) => return Err(unexpected(token, "'('")),
            None => return Err(self.ended("'('")),
        };
        let args = if name == "where" {
            self.parse_where_argument(lparen)?
        } else {
            self.parse_arguments()?
        };
        Ok(Operation { name, args })
    }

    fn parse_arguments(&mut self) -> Result<Vec<Argument>, SyntaxError> {
        if self
            .peek()
            .is_some_and(|token| token.kind == TokenKind::RParen)
        {
            self.pos += 1;
            return Ok(Vec::new());
        }
        let mut args = Vec::new();
        loop {
            let token = match self.advance() {
                Some(token) => token,
                None => return Err(self.ended("an argument")),
            };
            args.push(classify_argument(token)?);
            match self.advance() {
                Some(token) if token.kind == TokenKind::Comma => {}
                Some(token) if token.kind == TokenKind::RParen => return Ok(args),
                Some(token) => return Err(unexpected(token, "',' or ')'")),
                None => return Err(self.ended("',' or ')'")),
            }
        }
    }

    /// Slice the raw text between `where`'s parentheses out of the input and
    /// run the condition parser over it. The matching `)` is found by depth
    /// counting, so parenthesized sub-conditions stay inside the body, and
    /// condition error positions are rebased onto the full expression.
    fn parse_where_argument(&mut self, lparen: &Token) -> Result<Vec<Argument>, SyntaxError> {
        let mut depth = 0usize;
        let mut end = self.pos;
        let closer = loop {
            match self.tokens.get(end) {
                Some(token) if token.kind == TokenKind::LParen => depth += 1,
                Some(token) if token.kind == TokenKind::RParen => {
                    if depth == 0 {
                        break token;
                    }
                    depth -= 1;
                }
                Some(_) => {}
                None => return Err(self.ended("')'")),
            }
            end += 1;
        };
        let body_start = lparen.pos + lparen.len;
        let body = &self.input[body_start..closer.pos];
        let condition = cond::parse_condition(body).map_err(|error| error.at_offset(body_start))?;
        self.pos = end + 1;
        Ok(vec![Argument::Condition(condition)])
    }
}

fn classify_argument(token: &Token) -> Result<Argument, SyntaxError> {
    match &token.kind {
        TokenKind::Ident(name) if name == "true" => Ok(Argument::Literal(Literal::Bool(true))),
        TokenKind::Ident(name) if name == "false" => Ok(Argument::Literal(Literal::Bool(false))),
        TokenKind::Ident(name) => Ok(Argument::Ident(name.clone())),
        TokenKind::Number(value) => Ok(Argument::Literal(Literal::Number(*value))),
        TokenKind::Str(value) => Ok(Argument::Literal(Literal::Str(value.clone()))),
        _ => Err(unexpected(token, "an argument")),
    }
}

fn unexpected(token: &Token, expected: &str) -> SyntaxError {
    ParseError::UnexpectedToken {
        position: token.pos,
        expected: expected.to_owned(),
        found: token.kind.describe(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use tq_types::Literal;

    use super::{ParseError, parse};
    use crate::SyntaxError;
    use crate::ast::{Argument, CompareOp, Condition, Operation};

    fn parse_err(input: &str) -> SyntaxError {
        parse(input).expect_err("expression should be rejected")
    }

    fn ident(name: &str) -> Argument {
        Argument::Ident(name.to_owned())
    }

    #[test]
    fn parses_a_single_operation() {
        let ops = parse("count()").expect("parse");
        assert_eq!(
            ops,
            vec![Operation {
                name: "count".to_owned(),
                args: Vec::new(),
            }]
        );
    }

    #[test]
    fn parses_a_chain_of_operations() {
        let ops =
            parse("where(age > 30 & dept == 'IT').select(name, salary).sortby(salary)")
                .expect("parse");
        assert_eq!(ops.len(), 3);
        assert_eq!(ops[0].name, "where");
        assert_eq!(
            ops[1],
            Operation {
                name: "select".to_owned(),
                args: vec![ident("name"), ident("salary")],
            }
        );
        assert_eq!(
            ops[2],
            Operation {
                name: "sortby".to_owned(),
                args: vec![ident("salary")],
            }
        );
        assert_eq!(
            ops[0].args,
            vec![Argument::Condition(Condition::And {
                left: Box::new(Condition::Compare {
                    column: "age".to_owned(),
                    op: CompareOp::Gt,
                    value: Literal::Number(30.0),
                }),
                right: Box::new(Condition::Compare {
                    column: "dept".to_owned(),
                    op: CompareOp::Eq,
                    value: Literal::Str("IT".to_owned()),
                }),
            })]
        );
    }

    #[test]
    fn classifies_literal_arguments() {
        let ops = parse("round(price, 2).sortby(salary, true).strjoin(name, ', ')")
            .expect("parse");
        assert_eq!(ops[0].args, vec![ident("price"), Argument::Literal(Literal::Number(2.0))]);
        assert_eq!(
            ops[1].args,
            vec![ident("salary"), Argument::Literal(Literal::Bool(true))]
        );
        assert_eq!(
            ops[2].args,
            vec![
                ident("name"),
                Argument::Literal(Literal::Str(", ".to_owned()))
            ]
        );
    }

    #[test]
    fn empty_expression_is_rejected() {
        assert_eq!(
            parse_err(""),
            SyntaxError::Parse(ParseError::EmptyChain)
        );
        assert_eq!(
            parse_err("   "),
            SyntaxError::Parse(ParseError::EmptyChain)
        );
    }

    #[test]
    fn operation_without_parentheses_is_rejected() {
        assert_eq!(
            parse_err("count"),
            SyntaxError::Parse(ParseError::UnexpectedEnd {
                position: 5,
                expected: "'('".to_owned(),
            })
        );
    }

    #[test]
    fn trailing_dot_is_rejected() {
        assert_eq!(
            parse_err("select(name)."),
            SyntaxError::Parse(ParseError::UnexpectedEnd {
                position: 13,
                expected: "an operation name".to_owned(),
            })
        );
    }

    #[test]
    fn missing_dot_between_operations_is_rejected() {
        assert_eq!(
            parse_err("select(name)count()"),
            SyntaxError::Parse(ParseError::UnexpectedToken {
                position: 12,
                expected: "'.' or the end of the expression".to_owned(),
                found: "identifier \"count\"".to_owned(),
            })
        );
    }

    #[test]
    fn comma_between_operations_is_rejected() {
        assert_eq!(
            parse_err("select(name),count()"),
            SyntaxError::Parse(ParseError::UnexpectedToken {
                position: 12,
                expected: "'.' or the end of the expression".to_owned(),
                found: "','".to_owned(),
            })
        );
    }

    #[test]
    fn trailing_comma_in_arguments_is_rejected() {
        assert_eq!(
            parse_err("select(name,)"),
            SyntaxError::Parse(ParseError::UnexpectedToken {
                position: 12,
                expected: "an argument".to_owned(),
                found: "')'".to_owned(),
            })
        );
    }

    #[test]
    fn unclosed_argument_list_is_rejected() {
        assert_eq!(
            parse_err("select(name"),
            SyntaxError::Parse(ParseError::UnexpectedEnd {
                position: 11,
                expected: "',' or ')'".to_owned(),
            })
        );
    }

    #[test]
    fn where_body_keeps_raw_string_contents() {
        let ops = parse("where(dept == 'a, (b)')").expect("parse");
        assert_eq!(
            ops[0].args,
            vec![Argument::Condition(Condition::Compare {
                column: "dept".to_owned(),
                op: CompareOp::Eq,
                value: Literal::Str("a, (b)".to_owned()),
            })]
        );
    }

    #[test]
    fn where_body_spans_nested_parentheses() {
        let ops = parse("where((a > 1 | b > 2) & c == 'x').count()").expect("parse");
        assert_eq!(ops.len(), 2);
        assert!(matches!(
            &ops[0].args[0],
            Argument::Condition(Condition::And { left, .. })
                if matches!(**left, Condition::Or { .. })
        ));
    }

    #[test]
    fn where_errors_point_into_the_full_expression() {
        let err = parse_err("select(name).where(age >)");
        match err {
            SyntaxError::Condition(inner) => assert_eq!(inner.position(), 24),
            other => panic!("expected a condition error, got {other:?}"),
        }
    }

    #[test]
    fn unclosed_where_is_rejected() {
        assert_eq!(
            parse_err("where(age > 30"),
            SyntaxError::Parse(ParseError::UnexpectedEnd {
                position: 14,
                expected: "')'".to_owned(),
            })
        );
    }

    #[test]
    fn empty_where_is_rejected() {
        let err = parse_err("where()");
        match err {
            SyntaxError::Condition(inner) => assert_eq!(inner.position(), 6),
            other => panic!("expected a condition error, got {other:?}"),
        }
    }

    #[test]
    fn multiple_conditions_in_where_are_rejected() {
        let err = parse_err("where(a > 1, b > 2)");
        assert!(matches!(err, SyntaxError::Condition(_)));
    }
}
