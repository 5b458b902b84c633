//! Core interpreter engine.
//!
//! Statements are executed against a stack of call frames. Each frame holds
//! its block scopes and the functions declared inside it; anything not found
//! in the current frame resolves against the engine's globals.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use super::methods::{call_method, get_property, set_path};
use super::operators::{binary, unary};
use crate::script::ast::{
    Accessor, AssignOperator, AssignTarget, Expression, FunctionDecl, Operator, Statement,
    UnaryOperator,
};
use crate::script::error::ScriptError;
use crate::script::value::{ScriptObject, ScriptValue};
use crate::script::NativeFunction;

type Scope = HashMap<String, ScriptValue>;

/// Control flow out of a statement.
pub enum Flow {
    Normal,
    Return(ScriptValue),
}

#[derive(Default)]
struct Frame {
    scopes: Vec<Scope>,
    functions: HashMap<String, Arc<FunctionDecl>>,
}

/// Interpreter for the script language.
pub struct Interpreter<'e> {
    globals: &'e mut HashMap<String, ScriptValue>,
    functions: &'e HashMap<String, Arc<FunctionDecl>>,
    natives: &'e HashMap<String, NativeFunction<ScriptValue>>,
    frames: Vec<Frame>,
    max_call_depth: usize,
}

impl<'e> Interpreter<'e> {
    pub fn new(
        globals: &'e mut HashMap<String, ScriptValue>,
        functions: &'e HashMap<String, Arc<FunctionDecl>>,
        natives: &'e HashMap<String, NativeFunction<ScriptValue>>,
        max_call_depth: usize,
    ) -> Self {
        Self {
            globals,
            functions,
            natives,
            // top-level frame: declarations without a block scope go to globals
            frames: vec![Frame::default()],
            max_call_depth,
        }
    }

    /// Runs top-level statements. Function declarations are expected to be
    /// registered by the caller already.
    pub fn run(&mut self, body: &[Statement]) -> Result<(), ScriptError> {
        for statement in body {
            if let Flow::Return(_) = self.execute(statement)? {
                break;
            }
        }
        Ok(())
    }

    /// Calls a user-defined function by name.
    pub fn call(&mut self, name: &str, args: Vec<ScriptValue>) -> Result<ScriptValue, ScriptError> {
        let function = self
            .find_function(name)
            .ok_or_else(|| ScriptError::UndefinedFunction(name.to_string()))?;
        self.call_function(&function, args)
    }

    fn call_function(
        &mut self,
        function: &Arc<FunctionDecl>,
        args: Vec<ScriptValue>,
    ) -> Result<ScriptValue, ScriptError> {
        if self.frames.len() > self.max_call_depth {
            return Err(ScriptError::CallDepthExceeded(self.max_call_depth));
        }

        let mut scope = Scope::new();
        let mut args = args.into_iter();
        for param in &function.params {
            scope.insert(param.clone(), args.next().unwrap_or(ScriptValue::Undefined));
        }

        // nested functions can see their siblings and themselves
        let mut functions = self
            .frames
            .last()
            .map(|frame| frame.functions.clone())
            .unwrap_or_default();
        Self::hoist(&function.body, &mut functions);

        self.frames.push(Frame {
            scopes: vec![scope],
            functions,
        });
        let result = self.execute_all(&function.body);
        self.frames.pop();

        match result? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(ScriptValue::Undefined),
        }
    }

    fn hoist(body: &[Statement], functions: &mut HashMap<String, Arc<FunctionDecl>>) {
        for statement in body {
            if let Statement::Function(function) = statement {
                functions.insert(function.name.clone(), Arc::clone(function));
            }
        }
    }

    fn find_function(&self, name: &str) -> Option<Arc<FunctionDecl>> {
        self.frames
            .last()
            .and_then(|frame| frame.functions.get(name))
            .or_else(|| self.functions.get(name))
            .cloned()
    }

    fn frame_mut(&mut self) -> Result<&mut Frame, ScriptError> {
        self.frames
            .last_mut()
            .ok_or_else(|| ScriptError::runtime("No active call frame"))
    }

    fn execute_all(&mut self, statements: &[Statement]) -> Result<Flow, ScriptError> {
        for statement in statements {
            if let Flow::Return(value) = self.execute(statement)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn execute_scoped(&mut self, statements: &[Statement], scope: Scope) -> Result<Flow, ScriptError> {
        self.frame_mut()?.scopes.push(scope);
        let result = self.execute_all(statements);
        self.frame_mut()?.scopes.pop();
        result
    }

    fn execute(&mut self, statement: &Statement) -> Result<Flow, ScriptError> {
        match statement {
            Statement::Function(function) => {
                // top-level functions are registered by the engine
                if self.frames.len() > 1 {
                    self.frame_mut()?
                        .functions
                        .insert(function.name.clone(), Arc::clone(function));
                }
                Ok(Flow::Normal)
            }
            Statement::Declare { name, value } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => ScriptValue::Undefined,
                };
                self.declare(name, value)?;
                Ok(Flow::Normal)
            }
            Statement::Assign {
                target,
                operator,
                value,
            } => {
                self.assign(target, *operator, value)?;
                Ok(Flow::Normal)
            }
            Statement::Return(value) => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => ScriptValue::Undefined,
                };
                Ok(Flow::Return(value))
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Flow::Normal)
                }
            }
            Statement::ForOf {
                binding,
                iterable,
                body,
            } => self.execute_for_of(binding, iterable, body),
            Statement::Block(statements) => self.execute_scoped(statements, Scope::new()),
            Statement::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Flow::Normal)
            }
            Statement::Empty => Ok(Flow::Normal),
        }
    }

    fn execute_for_of(
        &mut self,
        binding: &str,
        iterable: &Expression,
        body: &Statement,
    ) -> Result<Flow, ScriptError> {
        // iterates a snapshot; elements pushed inside the loop are not visited
        let items: Vec<ScriptValue> = match self.evaluate(iterable)? {
            ScriptValue::Array(items) => {
                let snapshot = items.read().clone();
                snapshot
            }
            ScriptValue::String(s) => s.chars().map(|c| ScriptValue::String(c.to_string())).collect(),
            ScriptValue::Bytes(bytes) => bytes.into_iter().map(|b| ScriptValue::UInt(u64::from(b))).collect(),
            other => {
                return Err(ScriptError::runtime(format!(
                    "{} is not iterable",
                    other.type_of()
                )));
            }
        };

        for item in items {
            let mut scope = Scope::new();
            scope.insert(binding.to_string(), item);
            let flow = self.execute_scoped(std::slice::from_ref(body), scope)?;
            if let Flow::Return(value) = flow {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn declare(&mut self, name: &str, value: ScriptValue) -> Result<(), ScriptError> {
        match self.frame_mut()?.scopes.last_mut() {
            Some(scope) => {
                scope.insert(name.to_string(), value);
            }
            None => {
                self.globals.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    fn lookup(&self, name: &str) -> Option<&ScriptValue> {
        self.frames
            .last()
            .and_then(|frame| frame.scopes.iter().rev().find_map(|scope| scope.get(name)))
            .or_else(|| self.globals.get(name))
    }

    /// Mutable slot for `name`. Assigning to an undeclared name creates a
    /// global.
    fn slot_mut(&mut self, name: &str) -> &mut ScriptValue {
        if let Some(frame) = self.frames.last_mut() {
            if let Some(index) = frame.scopes.iter().rposition(|scope| scope.contains_key(name)) {
                if let Some(slot) = frame.scopes[index].get_mut(name) {
                    return slot;
                }
            }
        }
        self.globals
            .entry(name.to_string())
            .or_insert(ScriptValue::Undefined)
    }

    fn evaluate_keys(&mut self, path: &[Accessor]) -> Result<Vec<ScriptValue>, ScriptError> {
        path.iter()
            .map(|accessor| match accessor {
                Accessor::Member(name) => Ok(ScriptValue::String(name.clone())),
                Accessor::Index(expr) => self.evaluate(expr),
            })
            .collect()
    }

    fn assign(
        &mut self,
        target: &AssignTarget,
        operator: AssignOperator,
        value: &Expression,
    ) -> Result<(), ScriptError> {
        let keys = self.evaluate_keys(&target.path)?;
        let value = self.evaluate(value)?;

        let value = match operator {
            AssignOperator::Assign => value,
            AssignOperator::AddAssign | AssignOperator::SubtractAssign => {
                let mut current = self
                    .lookup(&target.root)
                    .cloned()
                    .ok_or_else(|| ScriptError::runtime(format!("{} is not defined", target.root)))?;
                for key in &keys {
                    current = get_property(&current, key)?;
                }
                let operator = if operator == AssignOperator::AddAssign {
                    Operator::Add
                } else {
                    Operator::Subtract
                };
                binary(operator, &current, &value)
            }
        };

        if keys.is_empty() {
            *self.slot_mut(&target.root) = value;
            return Ok(());
        }
        let root = self
            .lookup(&target.root)
            .cloned()
            .ok_or_else(|| ScriptError::runtime(format!("{} is not defined", target.root)))?;
        set_path(&root, &keys, value)
    }

    /// Evaluates an expression.
    pub fn evaluate(&mut self, expr: &Expression) -> Result<ScriptValue, ScriptError> {
        match expr {
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Variable(name) => self
                .lookup(name)
                .cloned()
                .ok_or_else(|| ScriptError::runtime(format!("{name} is not defined"))),
            Expression::Member { object, property } => {
                let object = self.evaluate(object)?;
                get_property(&object, &ScriptValue::String(property.clone()))
            }
            Expression::Index { object, index } => {
                let object = self.evaluate(object)?;
                let index = self.evaluate(index)?;
                get_property(&object, &index)
            }
            Expression::Call { callee, args } => self.evaluate_call(callee, args),
            Expression::New { constructor, args } => {
                let args = self.evaluate_args(args)?;
                construct(constructor, &args)
            }
            Expression::Unary {
                operator: UnaryOperator::TypeOf,
                operand,
            } => match operand.as_ref() {
                Expression::Variable(name) if self.lookup(name).is_none() => {
                    Ok(ScriptValue::String("undefined".to_string()))
                }
                other => Ok(unary(UnaryOperator::TypeOf, &self.evaluate(other)?)),
            },
            Expression::Unary { operator, operand } => {
                let operand = self.evaluate(operand)?;
                Ok(unary(*operator, &operand))
            }
            Expression::Binary {
                left,
                operator: Operator::And,
                right,
            } => {
                let left = self.evaluate(left)?;
                if left.truthy() {
                    self.evaluate(right)
                } else {
                    Ok(left)
                }
            }
            Expression::Binary {
                left,
                operator: Operator::Or,
                right,
            } => {
                let left = self.evaluate(left)?;
                if left.truthy() {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }
            Expression::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                Ok(binary(*operator, &left, &right))
            }
            Expression::Conditional {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }
            Expression::Object(properties) => {
                let mut object = ScriptObject::new();
                for (key, value) in properties {
                    let value = self.evaluate(value)?;
                    object.insert(key.clone(), value);
                }
                Ok(ScriptValue::object(object))
            }
            Expression::Array(items) => Ok(ScriptValue::array(self.evaluate_args(items)?)),
        }
    }

    fn evaluate_args(&mut self, args: &[Expression]) -> Result<Vec<ScriptValue>, ScriptError> {
        args.iter().map(|arg| self.evaluate(arg)).collect()
    }

    /// Resolves a call: user functions first, then natives by name, then
    /// methods on the receiver.
    fn evaluate_call(
        &mut self,
        callee: &Expression,
        args: &[Expression],
    ) -> Result<ScriptValue, ScriptError> {
        match callee {
            Expression::Variable(name) => {
                let args = self.evaluate_args(args)?;
                if let Some(function) = self.find_function(name) {
                    return self.call_function(&function, args);
                }
                self.call_native(name, &args)
            }
            Expression::Member { object, property } => {
                if let Some(name) = callee.dotted_name() {
                    let root = name.split('.').next().unwrap_or_default();
                    if self.lookup(root).is_none() && self.natives.contains_key(&name) {
                        let args = self.evaluate_args(args)?;
                        return self.call_native(&name, &args);
                    }
                }
                let receiver = self.evaluate(object)?;
                let args = self.evaluate_args(args)?;
                call_method(&receiver, property, &args)
            }
            _ => Err(ScriptError::runtime("Expression is not a function")),
        }
    }

    fn call_native(&self, name: &str, args: &[ScriptValue]) -> Result<ScriptValue, ScriptError> {
        let native = self
            .natives
            .get(name)
            .ok_or_else(|| ScriptError::UndefinedFunction(name.to_string()))?;
        native(args).map_err(ScriptError::Runtime)
    }
}

/// `new Name(args)`.
fn construct(constructor: &str, args: &[ScriptValue]) -> Result<ScriptValue, ScriptError> {
    match constructor {
        "Date" => match args.first() {
            None => Ok(ScriptValue::Date(Utc::now().timestamp_millis())),
            Some(ScriptValue::Date(ms)) => Ok(ScriptValue::Date(*ms)),
            Some(ScriptValue::Timestamp(t)) => Ok(ScriptValue::Date(t.timestamp_millis())),
            Some(ScriptValue::String(s)) => DateTime::parse_from_rfc3339(s)
                .map(|t| ScriptValue::Date(t.timestamp_millis()))
                .map_err(|_| ScriptError::runtime(format!("Invalid Date: {s}"))),
            Some(value) => {
                let ms = value.to_number();
                if ms.is_finite() {
                    Ok(ScriptValue::Date(ms.trunc() as i64))
                } else {
                    Err(ScriptError::runtime("Invalid Date"))
                }
            }
        },
        "Object" => Ok(ScriptValue::object(ScriptObject::new())),
        "Array" => Ok(ScriptValue::array(Vec::new())),
        other => Err(ScriptError::runtime(format!("{other} is not a constructor"))),
    }
}
