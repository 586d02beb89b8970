//! Recursive descent parser producing the AST

use core_types::{ScriptError, SourcePosition};

use crate::ast::*;
use crate::error::{syntax_error, unexpected_token};
use crate::lexer::{Keyword, Lexer, Punctuator, Token};

/// Parser over one source text
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    next_binding: BindingId,
    next_ref: RefId,
    loop_depth: usize,
    function_depth: usize,
}

impl<'a> Parser<'a> {
    /// Create a parser for the given source
    pub fn new(source: &'a str) -> Self {
        Self {
            lexer: Lexer::new(source),
            next_binding: 0,
            next_ref: 0,
            loop_depth: 0,
            function_depth: 0,
        }
    }

    /// Parse a complete script
    pub fn parse(&mut self) -> Result<Program, ScriptError> {
        let mut body = Vec::new();
        while !self.is_at_end()? {
            body.push(self.parse_statement()?);
        }
        Ok(Program { body })
    }

    fn parse_statement(&mut self) -> Result<Statement, ScriptError> {
        let token = self.lexer.peek_token()?.clone();
        match token {
            Token::Keyword(Keyword::Let) => {
                let statement = self.parse_let_declaration()?;
                self.consume_semicolon()?;
                Ok(statement)
            }
            Token::Keyword(Keyword::Function) => self.parse_function_declaration(),
            Token::Keyword(Keyword::Return) => self.parse_return_statement(),
            Token::Keyword(Keyword::If) => self.parse_if_statement(),
            Token::Keyword(Keyword::While) => self.parse_while_statement(),
            Token::Keyword(Keyword::Do) => self.parse_do_while_statement(),
            Token::Keyword(Keyword::For) => self.parse_for_statement(),
            Token::Keyword(Keyword::Break) => self.parse_break_continue(true),
            Token::Keyword(Keyword::Continue) => self.parse_break_continue(false),
            Token::Keyword(Keyword::Throw) => self.parse_throw_statement(),
            Token::Keyword(Keyword::Try) => self.parse_try_statement(),
            Token::Keyword(Keyword::Delete) => self.parse_delete_statement(),
            Token::Punctuator(Punctuator::LBrace) => {
                let position = self.lexer.peek_position()?;
                let body = self.parse_block()?;
                Ok(Statement::Block { body, position })
            }
            Token::Punctuator(Punctuator::Semicolon) => {
                self.lexer.next_token()?;
                Ok(Statement::Empty)
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_let_declaration(&mut self) -> Result<Statement, ScriptError> {
        self.expect_keyword(Keyword::Let)?;
        let position = self.lexer.token_position();
        let mut declarations = Vec::new();
        loop {
            let binding = self.parse_binding()?;
            let init = if self.check_punctuator(Punctuator::Assign)? {
                self.lexer.next_token()?;
                Some(self.parse_assignment_expression()?)
            } else {
                None
            };
            declarations.push(Declarator { binding, init });
            if !self.check_punctuator(Punctuator::Comma)? {
                break;
            }
            self.lexer.next_token()?;
        }
        Ok(Statement::LetDeclaration {
            declarations,
            position,
        })
    }

    fn parse_function_declaration(&mut self) -> Result<Statement, ScriptError> {
        self.expect_keyword(Keyword::Function)?;
        let position = self.lexer.token_position();
        let binding = self.parse_binding()?;
        let function = self.parse_function_rest(Some(binding.name.clone()), position)?;
        Ok(Statement::FunctionDeclaration { binding, function })
    }

    /// Parameters and body, after `function [name]`
    fn parse_function_rest(
        &mut self,
        name: Option<String>,
        position: SourcePosition,
    ) -> Result<FunctionNode, ScriptError> {
        self.expect_punctuator(Punctuator::LParen)?;
        let mut params: Vec<ParamNode> = Vec::new();
        while !self.check_punctuator(Punctuator::RParen)? {
            if params.last().map_or(false, |p| p.rest) {
                return Err(syntax_error(
                    "Rest parameter must be last",
                    Some(self.lexer.peek_position()?),
                ));
            }
            let rest = if self.check_punctuator(Punctuator::Spread)? {
                self.lexer.next_token()?;
                true
            } else {
                false
            };
            let binding = self.parse_binding()?;
            let default = if !rest && self.check_punctuator(Punctuator::Assign)? {
                self.lexer.next_token()?;
                Some(self.parse_assignment_expression()?)
            } else {
                None
            };
            params.push(ParamNode {
                binding,
                default,
                rest,
            });
            if !self.check_punctuator(Punctuator::Comma)? {
                break;
            }
            self.lexer.next_token()?;
        }
        self.expect_punctuator(Punctuator::RParen)?;

        let saved_loop_depth = std::mem::replace(&mut self.loop_depth, 0);
        self.function_depth += 1;
        let body = self.parse_block();
        self.function_depth -= 1;
        self.loop_depth = saved_loop_depth;

        Ok(FunctionNode {
            name,
            params,
            body: body?,
            position,
        })
    }

    fn parse_block(&mut self) -> Result<Vec<Statement>, ScriptError> {
        self.expect_punctuator(Punctuator::LBrace)?;
        let mut body = Vec::new();
        while !self.check_punctuator(Punctuator::RBrace)? {
            if self.is_at_end()? {
                return Err(syntax_error("Unexpected end of input", Some(self.lexer.peek_position()?)));
            }
            body.push(self.parse_statement()?);
        }
        self.expect_punctuator(Punctuator::RBrace)?;
        Ok(body)
    }

    fn parse_return_statement(&mut self) -> Result<Statement, ScriptError> {
        self.expect_keyword(Keyword::Return)?;
        let position = self.lexer.token_position();
        let argument = if self.at_statement_end()? {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.consume_semicolon()?;
        Ok(Statement::Return { argument, position })
    }

    fn parse_if_statement(&mut self) -> Result<Statement, ScriptError> {
        self.expect_keyword(Keyword::If)?;
        let position = self.lexer.token_position();
        self.expect_punctuator(Punctuator::LParen)?;
        let test = self.parse_expression()?;
        self.expect_punctuator(Punctuator::RParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.check_keyword(Keyword::Else)? {
            self.lexer.next_token()?;
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Statement::If {
            test,
            consequent,
            alternate,
            position,
        })
    }

    fn parse_while_statement(&mut self) -> Result<Statement, ScriptError> {
        self.expect_keyword(Keyword::While)?;
        let position = self.lexer.token_position();
        self.expect_punctuator(Punctuator::LParen)?;
        let test = self.parse_expression()?;
        self.expect_punctuator(Punctuator::RParen)?;
        let body = Box::new(self.parse_loop_body()?);
        Ok(Statement::While {
            test,
            body,
            position,
        })
    }

    fn parse_do_while_statement(&mut self) -> Result<Statement, ScriptError> {
        self.expect_keyword(Keyword::Do)?;
        let position = self.lexer.token_position();
        let body = Box::new(self.parse_loop_body()?);
        self.expect_keyword(Keyword::While)?;
        self.expect_punctuator(Punctuator::LParen)?;
        let test = self.parse_expression()?;
        self.expect_punctuator(Punctuator::RParen)?;
        if self.check_punctuator(Punctuator::Semicolon)? {
            self.lexer.next_token()?;
        }
        Ok(Statement::DoWhile {
            body,
            test,
            position,
        })
    }

    fn parse_for_statement(&mut self) -> Result<Statement, ScriptError> {
        self.expect_keyword(Keyword::For)?;
        let position = self.lexer.token_position();
        self.expect_punctuator(Punctuator::LParen)?;

        let init = if self.check_punctuator(Punctuator::Semicolon)? {
            None
        } else if self.check_keyword(Keyword::Let)? {
            let declaration = self.parse_let_declaration()?;
            if let Some(kind) = self.peek_for_each_kind()? {
                return self.parse_for_each_rest(kind, declaration, position);
            }
            Some(Box::new(declaration))
        } else {
            let expression = self.parse_expression()?;
            let position = expression.position();
            Some(Box::new(Statement::ExpressionStatement {
                expression,
                position,
            }))
        };
        self.expect_punctuator(Punctuator::Semicolon)?;

        let test = if self.check_punctuator(Punctuator::Semicolon)? {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punctuator(Punctuator::Semicolon)?;

        let update = if self.check_punctuator(Punctuator::RParen)? {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_punctuator(Punctuator::RParen)?;

        let body = Box::new(self.parse_loop_body()?);
        Ok(Statement::For {
            init,
            test,
            update,
            body,
            position,
        })
    }

    fn peek_for_each_kind(&mut self) -> Result<Option<ForKind>, ScriptError> {
        Ok(match self.lexer.peek_token()? {
            Token::Keyword(Keyword::In) => Some(ForKind::In),
            Token::Keyword(Keyword::Of) => Some(ForKind::Of),
            _ => None,
        })
    }

    fn parse_for_each_rest(
        &mut self,
        kind: ForKind,
        declaration: Statement,
        position: SourcePosition,
    ) -> Result<Statement, ScriptError> {
        self.lexer.next_token()?;
        let binding = match declaration {
            Statement::LetDeclaration {
                mut declarations, ..
            } if declarations.len() == 1 && declarations[0].init.is_none() => declarations.remove(0).binding,
            _ => {
                return Err(syntax_error(
                    "for-in/of loop requires a single uninitialized binding",
                    Some(position),
                ))
            }
        };
        let iterable = self.parse_expression()?;
        self.expect_punctuator(Punctuator::RParen)?;
        let body = Box::new(self.parse_loop_body()?);
        Ok(Statement::ForEach {
            kind,
            binding,
            iterable,
            body,
            position,
        })
    }

    fn parse_loop_body(&mut self) -> Result<Statement, ScriptError> {
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        body
    }

    fn parse_break_continue(&mut self, is_break: bool) -> Result<Statement, ScriptError> {
        self.lexer.next_token()?;
        let position = self.lexer.token_position();
        if self.loop_depth == 0 {
            let word = if is_break { "break" } else { "continue" };
            return Err(syntax_error(format!("Illegal {} statement", word), Some(position)));
        }
        self.consume_semicolon()?;
        Ok(if is_break {
            Statement::Break { position }
        } else {
            Statement::Continue { position }
        })
    }

    fn parse_throw_statement(&mut self) -> Result<Statement, ScriptError> {
        self.expect_keyword(Keyword::Throw)?;
        let position = self.lexer.token_position();
        let argument = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Statement::Throw { argument, position })
    }

    fn parse_try_statement(&mut self) -> Result<Statement, ScriptError> {
        self.expect_keyword(Keyword::Try)?;
        let position = self.lexer.token_position();
        let block = self.parse_block()?;

        let handler = if self.check_keyword(Keyword::Catch)? {
            self.lexer.next_token()?;
            self.expect_punctuator(Punctuator::LParen)?;
            let param = self.parse_binding()?;
            self.expect_punctuator(Punctuator::RParen)?;
            let body = self.parse_block()?;
            Some(CatchClause { param, body })
        } else {
            None
        };

        let finalizer = if self.check_keyword(Keyword::Finally)? {
            self.lexer.next_token()?;
            Some(self.parse_block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(syntax_error("Missing catch or finally after try", Some(position)));
        }
        Ok(Statement::Try {
            block,
            handler,
            finalizer,
            position,
        })
    }

    fn parse_delete_statement(&mut self) -> Result<Statement, ScriptError> {
        self.expect_keyword(Keyword::Delete)?;
        let position = self.lexer.token_position();
        let target = self.parse_call_member_expression()?;
        match &target {
            Expression::Identifier(_) => {}
            Expression::Member { optional: false, .. } if !target.has_optional_link() => {}
            _ => return Err(syntax_error("Invalid delete target", Some(position))),
        }
        self.consume_semicolon()?;
        Ok(Statement::Delete { target, position })
    }

    fn parse_expression_statement(&mut self) -> Result<Statement, ScriptError> {
        let position = self.lexer.peek_position()?;
        let expression = self.parse_expression()?;
        self.consume_semicolon()?;
        Ok(Statement::ExpressionStatement {
            expression,
            position,
        })
    }

    /// Parse an expression
    pub fn parse_expression(&mut self) -> Result<Expression, ScriptError> {
        self.parse_assignment_expression()
    }

    fn parse_assignment_expression(&mut self) -> Result<Expression, ScriptError> {
        let target = self.parse_conditional_expression()?;
        let operator = match self.lexer.peek_token()? {
            Token::Punctuator(Punctuator::Assign) => AssignmentOperator::Assign,
            Token::Punctuator(Punctuator::PlusAssign) => AssignmentOperator::Compound(BinaryOperator::Add),
            Token::Punctuator(Punctuator::MinusAssign) => AssignmentOperator::Compound(BinaryOperator::Sub),
            Token::Punctuator(Punctuator::StarAssign) => AssignmentOperator::Compound(BinaryOperator::Mul),
            Token::Punctuator(Punctuator::SlashAssign) => AssignmentOperator::Compound(BinaryOperator::Div),
            Token::Punctuator(Punctuator::PercentAssign) => AssignmentOperator::Compound(BinaryOperator::Mod),
            Token::Punctuator(Punctuator::StarStarAssign) => AssignmentOperator::Compound(BinaryOperator::Pow),
            _ => return Ok(target),
        };
        self.lexer.next_token()?;
        let position = self.lexer.token_position();
        self.check_assignable(&target)?;
        let value = self.parse_assignment_expression()?;
        Ok(Expression::Assignment {
            operator,
            target: Box::new(target),
            value: Box::new(value),
            position,
        })
    }

    fn check_assignable(&self, target: &Expression) -> Result<(), ScriptError> {
        match target {
            Expression::Identifier(_) => Ok(()),
            Expression::Member { .. } if !target.has_optional_link() => Ok(()),
            _ => Err(syntax_error("Invalid assignment target", Some(target.position()))),
        }
    }

    fn parse_conditional_expression(&mut self) -> Result<Expression, ScriptError> {
        let test = self.parse_logical_or_expression()?;
        if !self.check_punctuator(Punctuator::Question)? {
            return Ok(test);
        }
        self.lexer.next_token()?;
        let position = self.lexer.token_position();
        let consequent = self.parse_assignment_expression()?;
        self.expect_punctuator(Punctuator::Colon)?;
        let alternate = self.parse_assignment_expression()?;
        Ok(Expression::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
            position,
        })
    }

    fn parse_logical_or_expression(&mut self) -> Result<Expression, ScriptError> {
        let mut left = self.parse_logical_and_expression()?;
        while self.check_punctuator(Punctuator::OrOr)? {
            self.lexer.next_token()?;
            let position = self.lexer.token_position();
            let right = self.parse_logical_and_expression()?;
            left = Expression::Logical {
                operator: LogicalOperator::Or,
                left: Box::new(left),
                right: Box::new(right),
                position,
            };
        }
        Ok(left)
    }

    fn parse_logical_and_expression(&mut self) -> Result<Expression, ScriptError> {
        let mut left = self.parse_equality_expression()?;
        while self.check_punctuator(Punctuator::AndAnd)? {
            self.lexer.next_token()?;
            let position = self.lexer.token_position();
            let right = self.parse_equality_expression()?;
            left = Expression::Logical {
                operator: LogicalOperator::And,
                left: Box::new(left),
                right: Box::new(right),
                position,
            };
        }
        Ok(left)
    }

    fn parse_equality_expression(&mut self) -> Result<Expression, ScriptError> {
        let mut left = self.parse_relational_expression()?;

        loop {
            let op = match self.lexer.peek_token()? {
                Token::Punctuator(Punctuator::EqEq) => BinaryOperator::Eq,
                Token::Punctuator(Punctuator::NotEq) => BinaryOperator::NotEq,
                _ => break,
            };
            self.lexer.next_token()?;
            let position = self.lexer.token_position();
            let right = self.parse_relational_expression()?;
            left = binary(op, left, right, position);
        }

        Ok(left)
    }

    fn parse_relational_expression(&mut self) -> Result<Expression, ScriptError> {
        let mut left = self.parse_additive_expression()?;

        loop {
            let op = match self.lexer.peek_token()? {
                Token::Punctuator(Punctuator::Lt) => BinaryOperator::Lt,
                Token::Punctuator(Punctuator::LtEq) => BinaryOperator::LtEq,
                Token::Punctuator(Punctuator::Gt) => BinaryOperator::Gt,
                Token::Punctuator(Punctuator::GtEq) => BinaryOperator::GtEq,
                _ => break,
            };
            self.lexer.next_token()?;
            let position = self.lexer.token_position();
            let right = self.parse_additive_expression()?;
            left = binary(op, left, right, position);
        }

        Ok(left)
    }

    fn parse_additive_expression(&mut self) -> Result<Expression, ScriptError> {
        let mut left = self.parse_multiplicative_expression()?;

        loop {
            let op = match self.lexer.peek_token()? {
                Token::Punctuator(Punctuator::Plus) => BinaryOperator::Add,
                Token::Punctuator(Punctuator::Minus) => BinaryOperator::Sub,
                _ => break,
            };
            self.lexer.next_token()?;
            let position = self.lexer.token_position();
            let right = self.parse_multiplicative_expression()?;
            left = binary(op, left, right, position);
        }

        Ok(left)
    }

    fn parse_multiplicative_expression(&mut self) -> Result<Expression, ScriptError> {
        let mut left = self.parse_exponent_expression()?;

        loop {
            let op = match self.lexer.peek_token()? {
                Token::Punctuator(Punctuator::Star) => BinaryOperator::Mul,
                Token::Punctuator(Punctuator::Slash) => BinaryOperator::Div,
                Token::Punctuator(Punctuator::Percent) => BinaryOperator::Mod,
                _ => break,
            };
            self.lexer.next_token()?;
            let position = self.lexer.token_position();
            let right = self.parse_exponent_expression()?;
            left = binary(op, left, right, position);
        }

        Ok(left)
    }

    fn parse_exponent_expression(&mut self) -> Result<Expression, ScriptError> {
        let base = self.parse_prefix_expression()?;
        if !self.check_punctuator(Punctuator::StarStar)? {
            return Ok(base);
        }
        self.lexer.next_token()?;
        let position = self.lexer.token_position();
        let exponent = self.parse_exponent_expression()?;
        Ok(binary(BinaryOperator::Pow, base, exponent, position))
    }

    fn parse_prefix_expression(&mut self) -> Result<Expression, ScriptError> {
        let operator = match self.lexer.peek_token()? {
            Token::Punctuator(Punctuator::Bang) => UnaryOperator::Not,
            Token::Punctuator(Punctuator::Minus) => UnaryOperator::Minus,
            Token::Punctuator(Punctuator::Plus) => UnaryOperator::Plus,
            Token::Keyword(Keyword::Typeof) => UnaryOperator::Typeof,
            Token::Punctuator(Punctuator::PlusPlus) | Token::Punctuator(Punctuator::MinusMinus) => {
                return self.parse_prefix_update();
            }
            _ => return self.parse_postfix_expression(),
        };
        self.lexer.next_token()?;
        let position = self.lexer.token_position();
        let argument = self.parse_prefix_expression()?;
        Ok(Expression::Unary {
            operator,
            argument: Box::new(argument),
            position,
        })
    }

    fn parse_prefix_update(&mut self) -> Result<Expression, ScriptError> {
        let operator = match self.lexer.next_token()? {
            Token::Punctuator(Punctuator::PlusPlus) => UpdateOperator::Increment,
            _ => UpdateOperator::Decrement,
        };
        let position = self.lexer.token_position();
        let target = self.parse_prefix_expression()?;
        self.check_assignable(&target)?;
        Ok(Expression::Update {
            operator,
            prefix: true,
            target: Box::new(target),
            position,
        })
    }

    fn parse_postfix_expression(&mut self) -> Result<Expression, ScriptError> {
        let expression = self.parse_call_member_expression()?;
        let operator = match self.lexer.peek_token()? {
            Token::Punctuator(Punctuator::PlusPlus) => UpdateOperator::Increment,
            Token::Punctuator(Punctuator::MinusMinus) => UpdateOperator::Decrement,
            _ => return Ok(expression),
        };
        // `a\n++b` is two statements
        if self.lexer.peek_position()?.line != self.lexer.token_position().line {
            return Ok(expression);
        }
        self.lexer.next_token()?;
        let position = self.lexer.token_position();
        self.check_assignable(&expression)?;
        Ok(Expression::Update {
            operator,
            prefix: false,
            target: Box::new(expression),
            position,
        })
    }

    fn parse_call_member_expression(&mut self) -> Result<Expression, ScriptError> {
        let mut expression = self.parse_primary_expression()?;
        loop {
            let token = self.lexer.peek_token()?.clone();
            match token {
                Token::Punctuator(Punctuator::Dot) => {
                    self.lexer.next_token()?;
                    expression = self.parse_dot_member(expression, false)?;
                }
                Token::Punctuator(Punctuator::LBracket) => {
                    expression = self.parse_computed_member(expression, false)?;
                }
                Token::Punctuator(Punctuator::LParen) => {
                    expression = self.parse_call(expression, false, Vec::new())?;
                }
                Token::Punctuator(Punctuator::OptionalChain) => {
                    self.lexer.next_token()?;
                    expression = match self.lexer.peek_token()? {
                        Token::Punctuator(Punctuator::LBracket) => self.parse_computed_member(expression, true)?,
                        Token::Punctuator(Punctuator::LParen) => self.parse_call(expression, true, Vec::new())?,
                        _ => self.parse_dot_member(expression, true)?,
                    };
                }
                Token::Punctuator(Punctuator::Bind) => {
                    self.lexer.next_token()?;
                    let callee = self.parse_bind_callee()?;
                    expression = self.parse_call(callee, false, vec![ListElement::Single(expression)])?;
                }
                _ => break,
            }
        }
        Ok(expression)
    }

    /// Callee of `x::callee(args)`: a primary with member accesses, no calls
    fn parse_bind_callee(&mut self) -> Result<Expression, ScriptError> {
        let mut callee = self.parse_primary_expression()?;
        loop {
            match self.lexer.peek_token()? {
                Token::Punctuator(Punctuator::Dot) => {
                    self.lexer.next_token()?;
                    callee = self.parse_dot_member(callee, false)?;
                }
                Token::Punctuator(Punctuator::LBracket) => {
                    callee = self.parse_computed_member(callee, false)?;
                }
                Token::Punctuator(Punctuator::LParen) => return Ok(callee),
                _ => {
                    return Err(syntax_error(
                        "Bind operator requires a call",
                        Some(self.lexer.peek_position()?),
                    ))
                }
            }
        }
    }

    fn parse_dot_member(&mut self, object: Expression, optional: bool) -> Result<Expression, ScriptError> {
        let token = self.lexer.next_token()?;
        let position = self.lexer.token_position();
        let name = match token {
            Token::Identifier(name) => name,
            Token::Keyword(keyword) => format!("{:?}", keyword).to_lowercase(),
            other => return Err(unexpected_token("property name", &format!("{:?}", other), Some(position))),
        };
        Ok(Expression::Member {
            object: Box::new(object),
            property: Box::new(Expression::Literal {
                value: Literal::String(name),
                position,
            }),
            optional,
            position,
        })
    }

    fn parse_computed_member(&mut self, object: Expression, optional: bool) -> Result<Expression, ScriptError> {
        self.expect_punctuator(Punctuator::LBracket)?;
        let position = self.lexer.token_position();
        let property = self.parse_expression()?;
        self.expect_punctuator(Punctuator::RBracket)?;
        Ok(Expression::Member {
            object: Box::new(object),
            property: Box::new(property),
            optional,
            position,
        })
    }

    fn parse_call(
        &mut self,
        callee: Expression,
        optional: bool,
        mut arguments: Vec<ListElement>,
    ) -> Result<Expression, ScriptError> {
        self.expect_punctuator(Punctuator::LParen)?;
        let position = self.lexer.token_position();
        arguments.extend(self.parse_list(Punctuator::RParen)?);
        Ok(Expression::Call {
            callee: Box::new(callee),
            arguments,
            optional,
            position,
        })
    }

    /// Comma-separated elements with optional spread, up to `close`
    fn parse_list(&mut self, close: Punctuator) -> Result<Vec<ListElement>, ScriptError> {
        let mut elements = Vec::new();
        while !self.check_punctuator(close)? {
            if self.check_punctuator(Punctuator::Spread)? {
                self.lexer.next_token()?;
                elements.push(ListElement::Spread(self.parse_assignment_expression()?));
            } else {
                elements.push(ListElement::Single(self.parse_assignment_expression()?));
            }
            if !self.check_punctuator(Punctuator::Comma)? {
                break;
            }
            self.lexer.next_token()?;
        }
        self.expect_punctuator(close)?;
        Ok(elements)
    }

    fn parse_primary_expression(&mut self) -> Result<Expression, ScriptError> {
        let token = self.lexer.next_token()?;
        let position = self.lexer.token_position();
        let literal = |value| Expression::Literal { value, position };
        match token {
            Token::Number(n) => Ok(literal(Literal::Number(n))),
            Token::String(s) => Ok(literal(Literal::String(s))),
            Token::Keyword(Keyword::Null) => Ok(literal(Literal::Null)),
            Token::Keyword(Keyword::True) => Ok(literal(Literal::Boolean(true))),
            Token::Keyword(Keyword::False) => Ok(literal(Literal::Boolean(false))),
            Token::Identifier(name) => {
                let ref_id = self.next_ref;
                self.next_ref += 1;
                Ok(Expression::Identifier(Identifier {
                    name,
                    ref_id,
                    position,
                }))
            }
            Token::Punctuator(Punctuator::LParen) => {
                let expression = self.parse_expression()?;
                self.expect_punctuator(Punctuator::RParen)?;
                Ok(expression)
            }
            Token::Punctuator(Punctuator::LBracket) => {
                let elements = self.parse_list(Punctuator::RBracket)?;
                Ok(Expression::Array { elements, position })
            }
            Token::Punctuator(Punctuator::LBrace) => self.parse_object_literal(position),
            Token::Keyword(Keyword::Function) => {
                let name = match self.lexer.peek_token()? {
                    Token::Identifier(name) => Some(name.clone()),
                    _ => None,
                };
                if name.is_some() {
                    self.lexer.next_token()?;
                }
                let function = self.parse_function_rest(name, position)?;
                Ok(Expression::Function(Box::new(function)))
            }
            Token::EOF => Err(syntax_error("Unexpected end of input", Some(position))),
            other => Err(unexpected_token("expression", &format!("{:?}", other), Some(position))),
        }
    }

    fn parse_object_literal(&mut self, position: SourcePosition) -> Result<Expression, ScriptError> {
        let mut properties = Vec::new();
        while !self.check_punctuator(Punctuator::RBrace)? {
            let key = match self.lexer.next_token()? {
                Token::Identifier(name) => name,
                Token::String(s) => s,
                Token::Number(n) => core_types::format_number(n),
                Token::Keyword(keyword) => format!("{:?}", keyword).to_lowercase(),
                other => {
                    return Err(unexpected_token(
                        "property key",
                        &format!("{:?}", other),
                        Some(self.lexer.token_position()),
                    ))
                }
            };
            self.expect_punctuator(Punctuator::Colon)?;
            let value = self.parse_assignment_expression()?;
            properties.push((key, value));
            if !self.check_punctuator(Punctuator::Comma)? {
                break;
            }
            self.lexer.next_token()?;
        }
        self.expect_punctuator(Punctuator::RBrace)?;
        Ok(Expression::Object {
            properties,
            position,
        })
    }

    fn parse_binding(&mut self) -> Result<Binding, ScriptError> {
        let token = self.lexer.next_token()?;
        let position = self.lexer.token_position();
        match token {
            Token::Identifier(name) => {
                let id = self.next_binding;
                self.next_binding += 1;
                Ok(Binding { name, id, position })
            }
            other => Err(unexpected_token("identifier", &format!("{:?}", other), Some(position))),
        }
    }

    fn check_punctuator(&mut self, p: Punctuator) -> Result<bool, ScriptError> {
        Ok(matches!(self.lexer.peek_token()?, Token::Punctuator(x) if *x == p))
    }

    fn check_keyword(&mut self, k: Keyword) -> Result<bool, ScriptError> {
        Ok(matches!(self.lexer.peek_token()?, Token::Keyword(x) if *x == k))
    }

    fn expect_punctuator(&mut self, p: Punctuator) -> Result<(), ScriptError> {
        let token = self.lexer.next_token()?;
        if token == Token::Punctuator(p) {
            return Ok(());
        }
        Err(unexpected_token(
            &format!("{:?}", p),
            &format!("{:?}", token),
            Some(self.lexer.token_position()),
        ))
    }

    fn expect_keyword(&mut self, k: Keyword) -> Result<(), ScriptError> {
        let token = self.lexer.next_token()?;
        if token == Token::Keyword(k) {
            return Ok(());
        }
        Err(unexpected_token(
            &format!("{:?}", k),
            &format!("{:?}", token),
            Some(self.lexer.token_position()),
        ))
    }

    fn is_at_end(&mut self) -> Result<bool, ScriptError> {
        Ok(matches!(self.lexer.peek_token()?, Token::EOF))
    }

    fn at_statement_end(&mut self) -> Result<bool, ScriptError> {
        if matches!(
            self.lexer.peek_token()?,
            Token::EOF | Token::Punctuator(Punctuator::Semicolon) | Token::Punctuator(Punctuator::RBrace)
        ) {
            return Ok(true);
        }
        Ok(self.lexer.peek_position()?.line != self.lexer.token_position().line)
    }

    fn consume_semicolon(&mut self) -> Result<(), ScriptError> {
        if self.check_punctuator(Punctuator::Semicolon)? {
            self.lexer.next_token()?;
            return Ok(());
        }
        if self.at_statement_end()? {
            return Ok(());
        }
        let position = self.lexer.peek_position()?;
        let token = self.lexer.peek_token()?.clone();
        Err(unexpected_token("';'", &format!("{:?}", token), Some(position)))
    }
}

fn binary(operator: BinaryOperator, left: Expression, right: Expression, position: SourcePosition) -> Expression {
    Expression::Binary {
        operator,
        left: Box::new(left),
        right: Box::new(right),
        position,
    }
}
