//! Parser for the script language.
//!
//! Source text is parsed with PEST and converted into the AST in
//! [`super::ast`].

use pest::iterators::Pair;
use pest::Parser;
use std::sync::Arc;

use super::ast::{
    Accessor, AssignOperator, AssignTarget, Expression, FunctionDecl, Operator, Program,
    Statement, UnaryOperator,
};
use super::error::ScriptError;
use super::value::ScriptValue;

mod grammar;
mod helpers;

pub use grammar::ScriptParser;
use grammar::Rule;

type ParseResult<T> = Result<T, ScriptError>;

fn missing(what: &str) -> ScriptError {
    ScriptError::Parse(format!("Missing {what}"))
}

/// Keyword tokens carry no information beyond their position.
fn is_keyword(rule: Rule) -> bool {
    matches!(
        rule,
        Rule::function_kw
            | Rule::return_kw
            | Rule::if_kw
            | Rule::else_kw
            | Rule::for_kw
            | Rule::of_kw
            | Rule::new_kw
            | Rule::decl_kind
    )
}

fn significant(pair: Pair<Rule>) -> impl Iterator<Item = Pair<Rule>> {
    pair.into_inner().filter(|p| !is_keyword(p.as_rule()))
}

impl ScriptParser {
    /// Creates a new parser.
    pub fn new() -> Self {
        Self
    }

    /// Parses a complete script.
    pub fn parse_program(&self, input: &str) -> ParseResult<Program> {
        let program = Self::parse(Rule::program, input)
            .map_err(|e| ScriptError::Parse(e.to_string()))?
            .next()
            .ok_or_else(|| missing("program"))?;

        let mut body = Vec::new();
        for pair in program.into_inner() {
            if pair.as_rule() != Rule::EOI {
                body.push(self.build_statement(pair)?);
            }
        }
        Ok(Program { body })
    }

    fn build_statement(&self, pair: Pair<Rule>) -> ParseResult<Statement> {
        match pair.as_rule() {
            Rule::function_decl => self.build_function(pair),
            Rule::var_decl => {
                let mut inner = significant(pair);
                let name = inner.next().ok_or_else(|| missing("variable name"))?;
                let value = inner.next().map(|p| self.build_expression(p)).transpose()?;
                Ok(Statement::Declare {
                    name: name.as_str().to_string(),
                    value,
                })
            }
            Rule::return_stmt => {
                let value = significant(pair)
                    .next()
                    .map(|p| self.build_expression(p))
                    .transpose()?;
                Ok(Statement::Return(value))
            }
            Rule::if_stmt => {
                let mut inner = significant(pair);
                let condition = self.build_expression(inner.next().ok_or_else(|| missing("condition"))?)?;
                let then_branch = self.build_statement(inner.next().ok_or_else(|| missing("if body"))?)?;
                let else_branch = inner
                    .next()
                    .map(|p| self.build_statement(p).map(Box::new))
                    .transpose()?;
                Ok(Statement::If {
                    condition,
                    then_branch: Box::new(then_branch),
                    else_branch,
                })
            }
            Rule::for_of_stmt => {
                let mut inner = significant(pair);
                let binding = inner.next().ok_or_else(|| missing("loop variable"))?;
                let iterable = self.build_expression(inner.next().ok_or_else(|| missing("iterable"))?)?;
                let body = self.build_statement(inner.next().ok_or_else(|| missing("loop body"))?)?;
                Ok(Statement::ForOf {
                    binding: binding.as_str().to_string(),
                    iterable,
                    body: Box::new(body),
                })
            }
            Rule::block => Ok(Statement::Block(self.build_block(pair)?)),
            Rule::assign_stmt => self.build_assignment(pair),
            Rule::expr_stmt => {
                let expression = pair.into_inner().next().ok_or_else(|| missing("expression"))?;
                Ok(Statement::Expression(self.build_expression(expression)?))
            }
            Rule::empty_stmt => Ok(Statement::Empty),
            rule => Err(ScriptError::Parse(format!("Unexpected statement: {rule:?}"))),
        }
    }

    fn build_block(&self, pair: Pair<Rule>) -> ParseResult<Vec<Statement>> {
        pair.into_inner().map(|p| self.build_statement(p)).collect()
    }

    fn build_function(&self, pair: Pair<Rule>) -> ParseResult<Statement> {
        let mut inner = significant(pair);
        let name = inner.next().ok_or_else(|| missing("function name"))?;
        let params = inner
            .next()
            .ok_or_else(|| missing("parameter list"))?
            .into_inner()
            .map(|p| p.as_str().to_string())
            .collect();
        let body = self.build_block(inner.next().ok_or_else(|| missing("function body"))?)?;

        Ok(Statement::Function(Arc::new(FunctionDecl {
            name: name.as_str().to_string(),
            params,
            body,
        })))
    }

    fn build_assignment(&self, pair: Pair<Rule>) -> ParseResult<Statement> {
        let mut inner = pair.into_inner();
        let target_pair = inner.next().ok_or_else(|| missing("assignment target"))?;
        let operator = match inner.next().ok_or_else(|| missing("assignment operator"))?.as_str() {
            "+=" => AssignOperator::AddAssign,
            "-=" => AssignOperator::SubtractAssign,
            _ => AssignOperator::Assign,
        };
        let value = self.build_expression(inner.next().ok_or_else(|| missing("assigned value"))?)?;

        let mut target_parts = target_pair.into_inner();
        let root = target_parts
            .next()
            .ok_or_else(|| missing("assignment root"))?
            .as_str()
            .to_string();
        let mut path = Vec::new();
        for accessor in target_parts {
            path.push(self.build_accessor(accessor)?);
        }

        Ok(Statement::Assign {
            target: AssignTarget { root, path },
            operator,
            value,
        })
    }

    fn build_accessor(&self, pair: Pair<Rule>) -> ParseResult<Accessor> {
        let rule = pair.as_rule();
        let inner = pair.into_inner().next().ok_or_else(|| missing("accessor"))?;
        match rule {
            Rule::member => Ok(Accessor::Member(inner.as_str().to_string())),
            Rule::index => Ok(Accessor::Index(self.build_expression(inner)?)),
            other => Err(ScriptError::Parse(format!("Unexpected accessor: {other:?}"))),
        }
    }

    /// Builds an expression AST from a parse tree.
    fn build_expression(&self, pair: Pair<Rule>) -> ParseResult<Expression> {
        match pair.as_rule() {
            Rule::expression | Rule::paren => {
                let inner = pair.into_inner().next().ok_or_else(|| missing("expression"))?;
                self.build_expression(inner)
            }
            Rule::ternary => self.build_ternary(pair),
            Rule::logic_or
            | Rule::logic_and
            | Rule::equality
            | Rule::comparison
            | Rule::additive
            | Rule::multiplicative => self.build_binary_chain(pair),
            Rule::unary => self.build_unary(pair),
            Rule::postfix => self.build_postfix(pair),
            Rule::number => Ok(Expression::Literal(Self::parse_number(pair.as_str())?)),
            Rule::string => {
                let raw = pair.into_inner().next().map(|p| p.as_str()).unwrap_or("");
                Ok(Expression::Literal(ScriptValue::String(Self::unescape(raw))))
            }
            Rule::boolean => Ok(Expression::Literal(ScriptValue::Bool(pair.as_str() == "true"))),
            Rule::null_lit => Ok(Expression::Literal(ScriptValue::Null)),
            Rule::undefined_lit => Ok(Expression::Literal(ScriptValue::Undefined)),
            Rule::identifier => Ok(Expression::Variable(pair.as_str().to_string())),
            Rule::new_expr => self.build_new(pair),
            Rule::object_lit => self.build_object(pair),
            Rule::array_lit => {
                let items = pair
                    .into_inner()
                    .map(|p| self.build_expression(p))
                    .collect::<ParseResult<Vec<_>>>()?;
                Ok(Expression::Array(items))
            }
            rule => Err(ScriptError::Parse(format!("Unexpected expression: {rule:?}"))),
        }
    }

    fn build_ternary(&self, pair: Pair<Rule>) -> ParseResult<Expression> {
        let mut inner = pair.into_inner();
        let condition = self.build_expression(inner.next().ok_or_else(|| missing("condition"))?)?;
        let Some(then_pair) = inner.next() else {
            return Ok(condition);
        };
        let then_branch = self.build_expression(then_pair)?;
        let else_branch = self.build_expression(inner.next().ok_or_else(|| missing("else branch"))?)?;

        Ok(Expression::Conditional {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    /// Folds `operand (op operand)*` left to right.
    fn build_binary_chain(&self, pair: Pair<Rule>) -> ParseResult<Expression> {
        let mut inner = pair.into_inner();
        let first = inner.next().ok_or_else(|| missing("operand"))?;
        let mut expr = self.build_expression(first)?;

        while let Some(op_pair) = inner.next() {
            let operator = Self::parse_operator(op_pair.as_str())?;
            let right = self.build_expression(inner.next().ok_or_else(|| missing("right operand"))?)?;
            expr = Expression::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn parse_operator(text: &str) -> ParseResult<Operator> {
        let operator = match text {
            "+" => Operator::Add,
            "-" => Operator::Subtract,
            "*" => Operator::Multiply,
            "/" => Operator::Divide,
            "%" => Operator::Modulo,
            "==" => Operator::Equal,
            "!=" => Operator::NotEqual,
            "===" => Operator::StrictEqual,
            "!==" => Operator::StrictNotEqual,
            "<" => Operator::LessThan,
            "<=" => Operator::LessThanOrEqual,
            ">" => Operator::GreaterThan,
            ">=" => Operator::GreaterThanOrEqual,
            "&&" => Operator::And,
            "||" => Operator::Or,
            other => return Err(ScriptError::Parse(format!("Unknown operator: {other}"))),
        };
        Ok(operator)
    }

    fn build_unary(&self, pair: Pair<Rule>) -> ParseResult<Expression> {
        let mut operators = Vec::new();
        let mut operand = None;

        for inner in pair.into_inner() {
            if inner.as_rule() == Rule::unary_op {
                let operator = match inner.as_str() {
                    "!" => UnaryOperator::Not,
                    "-" => UnaryOperator::Negate,
                    "+" => UnaryOperator::Plus,
                    _ => UnaryOperator::TypeOf,
                };
                operators.push(operator);
            } else {
                operand = Some(self.build_expression(inner)?);
            }
        }

        let mut expr = operand.ok_or_else(|| missing("unary operand"))?;
        for operator in operators.into_iter().rev() {
            expr = Expression::Unary {
                operator,
                operand: Box::new(expr),
            };
        }
        Ok(expr)
    }

    fn build_postfix(&self, pair: Pair<Rule>) -> ParseResult<Expression> {
        let mut inner = pair.into_inner();
        let mut expr = self.build_expression(inner.next().ok_or_else(|| missing("operand"))?)?;

        for suffix in inner {
            expr = match suffix.as_rule() {
                Rule::call_args => Expression::Call {
                    callee: Box::new(expr),
                    args: self.build_arguments(suffix)?,
                },
                _ => match self.build_accessor(suffix)? {
                    Accessor::Member(property) => Expression::Member {
                        object: Box::new(expr),
                        property,
                    },
                    Accessor::Index(index) => Expression::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                },
            };
        }

        Ok(expr)
    }

    fn build_arguments(&self, pair: Pair<Rule>) -> ParseResult<Vec<Expression>> {
        pair.into_inner().map(|p| self.build_expression(p)).collect()
    }

    fn build_new(&self, pair: Pair<Rule>) -> ParseResult<Expression> {
        let mut inner = significant(pair);
        let constructor = inner
            .next()
            .ok_or_else(|| missing("constructor"))?
            .as_str()
            .to_string();
        let args = match inner.next() {
            Some(args) => self.build_arguments(args)?,
            None => Vec::new(),
        };
        Ok(Expression::New { constructor, args })
    }

    fn build_object(&self, pair: Pair<Rule>) -> ParseResult<Expression> {
        let mut properties = Vec::new();

        for property in pair.into_inner() {
            let mut inner = property.into_inner();
            let key_pair = inner.next().ok_or_else(|| missing("property key"))?;
            let key = match key_pair.as_rule() {
                Rule::string => {
                    Self::unescape(key_pair.into_inner().next().map(|p| p.as_str()).unwrap_or(""))
                }
                _ => key_pair.as_str().to_string(),
            };
            let value = match inner.next() {
                Some(value) => self.build_expression(value)?,
                // shorthand `{ name }`
                None => Expression::Variable(key.clone()),
            };
            properties.push((key, value));
        }

        Ok(Expression::Object(properties))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Program {
        ScriptParser::new().parse_program(source).unwrap()
    }

    #[test]
    fn test_parse_function_and_return() {
        let program = parse("function main() { return source; }");
        let function = program.functions().next().unwrap();
        assert_eq!(function.name, "main");
        assert_eq!(
            function.body,
            vec![Statement::Return(Some(Expression::Variable("source".to_string())))]
        );
    }

    #[test]
    fn test_operator_precedence() {
        let program = parse("let x = 1 + 2 * 3;");
        let Statement::Declare { value: Some(expr), .. } = &program.body[0] else {
            panic!("expected declaration");
        };
        assert_eq!(
            *expr,
            Expression::Binary {
                left: Box::new(Expression::Literal(ScriptValue::Int(1))),
                operator: Operator::Add,
                right: Box::new(Expression::Binary {
                    left: Box::new(Expression::Literal(ScriptValue::Int(2))),
                    operator: Operator::Multiply,
                    right: Box::new(Expression::Literal(ScriptValue::Int(3))),
                }),
            }
        );
    }

    #[test]
    fn test_member_assignment() {
        let program = parse("out.items[0] += 2");
        assert!(matches!(
            &program.body[0],
            Statement::Assign {
                operator: AssignOperator::AddAssign,
                target: AssignTarget { root, path },
                ..
            } if root == "out" && path.len() == 2
        ));
    }

    #[test]
    fn test_keywords_are_not_identifiers() {
        let program = parse("let offset = 1; let returned = offset;");
        assert_eq!(program.body.len(), 2);
        assert!(ScriptParser::new().parse_program("let return = 1;").is_err());
    }

    #[test]
    fn test_object_literal_and_comments() {
        let program = parse(
            "// leading comment\nreturn { id: source.id, 'display name': \"a\\nb\", tags };",
        );
        let Statement::Return(Some(Expression::Object(properties))) = &program.body[0] else {
            panic!("expected object literal");
        };
        assert_eq!(properties.len(), 3);
        assert_eq!(properties[1].0, "display name");
        assert_eq!(
            properties[1].1,
            Expression::Literal(ScriptValue::String("a\nb".to_string()))
        );
        assert_eq!(properties[2].1, Expression::Variable("tags".to_string()));
    }

    #[test]
    fn test_for_of_and_if_else() {
        let program = parse(
            "for (const item of source.items) { if (item.ok) { n += 1 } else n -= 1; }",
        );
        assert!(matches!(&program.body[0], Statement::ForOf { binding, .. } if binding == "item"));
    }

    #[test]
    fn test_syntax_error() {
        let result = ScriptParser::new().parse_program("return {");
        assert!(matches!(result, Err(ScriptError::Parse(_))));
    }
}
