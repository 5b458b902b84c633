//! Abstract Syntax Tree (AST) definitions for the script language.

use std::sync::Arc;

use super::value::ScriptValue;

/// A compiled script: the top-level statements in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Statement>,
}

impl Program {
    pub fn functions(&self) -> impl Iterator<Item = &Arc<FunctionDecl>> {
        self.body.iter().filter_map(|statement| match statement {
            Statement::Function(function) => Some(function),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Function(Arc<FunctionDecl>),
    /// `let`, `const` and `var` are all block scoped.
    Declare {
        name: String,
        value: Option<Expression>,
    },
    Assign {
        target: AssignTarget,
        operator: AssignOperator,
        value: Expression,
    },
    Return(Option<Expression>),
    If {
        condition: Expression,
        then_branch: Box<Statement>,
        else_branch: Option<Box<Statement>>,
    },
    ForOf {
        binding: String,
        iterable: Expression,
        body: Box<Statement>,
    },
    Block(Vec<Statement>),
    Expression(Expression),
    Empty,
}

/// Left-hand side of an assignment: a variable followed by member and index
/// accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignTarget {
    pub root: String,
    pub path: Vec<Accessor>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Accessor {
    Member(String),
    Index(Expression),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOperator {
    Assign,
    AddAssign,
    SubtractAssign,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(ScriptValue),
    Variable(String),
    Member {
        object: Box<Expression>,
        property: String,
    },
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
    },
    Call {
        callee: Box<Expression>,
        args: Vec<Expression>,
    },
    New {
        constructor: String,
        args: Vec<Expression>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    Binary {
        left: Box<Expression>,
        operator: Operator,
        right: Box<Expression>,
    },
    Conditional {
        condition: Box<Expression>,
        then_branch: Box<Expression>,
        else_branch: Box<Expression>,
    },
    Object(Vec<(String, Expression)>),
    Array(Vec<Expression>),
}

impl Expression {
    /// Dotted name of a member chain rooted at a variable, such as
    /// `Math.floor`.
    pub fn dotted_name(&self) -> Option<String> {
        match self {
            Expression::Variable(name) => Some(name.clone()),
            Expression::Member { object, property } => object
                .dotted_name()
                .map(|prefix| format!("{prefix}.{property}")),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    Plus,
    TypeOf,
}
