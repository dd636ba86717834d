//! Tree‑walking evaluator.
//!
//! The interpreter owns the *current environment* pointer and swaps it in
//! [`Interpreter::execute_block`], restoring the previous one on every exit
//! path.  Variable access uses the resolver's distances; anything the
//! resolver left out is looked up in the globals table only.

use std::collections::HashMap;
use std::io::Write;
use std::mem;
use std::rc::Rc;

use chrono::Utc;
use log::{debug, info};

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::callable::{Callable, Class, Function, Instance, NativeFunction, INITIALIZER};
use crate::environment::{EnvRef, Environment};
use crate::error::{MochaError, Result};
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Deepest chain of nested calls before a program fails with
/// `Stack overflow.`.
pub const MAX_CALL_DEPTH: usize = 4096;

/// Native stack kept free before entering a call (100KB red zone).
const RED_ZONE: usize = 100 * 1024;

/// Stack segment allocated when the red zone is reached (1MB).
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// How a statement finished.  `Return` travels up to the nearest call.
#[derive(Debug)]
pub enum Flow<'a> {
    Normal,
    Return(Value<'a>),
}

pub struct Interpreter<'a, W: Write> {
    globals: EnvRef<'a>,
    environment: EnvRef<'a>,
    locals: Locals,
    call_depth: usize,
    out: W,
}

/// Seconds since the Unix epoch.
fn clock<'v>(_args: &[Value<'v>]) -> std::result::Result<Value<'v>, String> {
    let timestamp: f64 = Utc::now().timestamp_millis() as f64 / 1000.0;

    debug!("Native function 'clock' returned: {}", timestamp);

    Ok(Value::Number(timestamp))
}

impl<'a, W: Write> Interpreter<'a, W> {
    /// Creates a new Interpreter writing `print` output to `out`, with the
    /// native `clock` defined.
    pub fn new(out: W) -> Self {
        info!("Initializing Interpreter");

        let globals = Environment::new().into_ref();

        globals.borrow_mut().define(
            "clock",
            Value::Callable(Callable::Native(Rc::new(NativeFunction {
                name: "clock",
                arity: 0,
                func: clock,
            }))),
        );

        Self {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            call_depth: 0,
            out,
        }
    }

    /// Give the output sink back.
    pub fn into_output(self) -> W {
        self.out
    }

    /// Runs a resolved program.  Stops at, and returns, the first runtime
    /// error.  `locals` are merged with those of earlier calls, so one
    /// interpreter can run successive REPL lines.
    pub fn interpret(&mut self, statements: &'a [Stmt<'a>], locals: Locals) -> Result<()> {
        debug!(
            "Interpreting {} statements with {} resolved locals",
            statements.len(),
            locals.len()
        );

        self.locals.extend(locals);

        // Output written before a runtime error must still reach the sink.
        let result = statements
            .iter()
            .try_for_each(|stmt| self.execute(stmt).map(|_| ()));

        self.out.flush()?;
        result?;

        info!("Interpretation completed successfully");

        Ok(())
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &'a Stmt<'a>) -> Result<Flow<'a>> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
                debug!("Printed value: {}", value);
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.borrow_mut().define(name.lexeme, value);
            }

            Stmt::Block(statements) => {
                debug!("Entering block with {} statements", statements.len());
                let environment =
                    Environment::with_enclosing(Rc::clone(&self.environment)).into_ref();
                return self.execute_block(statements, environment);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                } else if let Some(else_stmt) = else_branch {
                    return self.execute(else_stmt);
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }

            Stmt::Function(declaration) => {
                debug!("Defining function '{}'", declaration.name.lexeme);
                let function = Function::new(declaration, Rc::clone(&self.environment), false);
                self.environment.borrow_mut().define(
                    declaration.name.lexeme,
                    Value::Callable(Callable::Function(Rc::new(function))),
                );
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(e) => self.evaluate(e)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                return Ok(Flow::Return(value));
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                debug!("Defining class '{}'", name.lexeme);

                // Defined first so methods can refer to the class.
                self.environment.borrow_mut().define(name.lexeme, Value::Nil);

                let superclass: Option<Rc<Class<'a>>> = match superclass {
                    Some(expr) => match self.evaluate(expr)? {
                        Value::Callable(Callable::Class(class)) => Some(class),
                        _ => {
                            let token = match expr {
                                Expr::Variable { name: super_name, .. } => *super_name,
                                _ => *name,
                            };
                            return Err(MochaError::runtime(token, "Superclass must be a class."));
                        }
                    },
                    None => None,
                };

                let previous: Option<EnvRef<'a>> = superclass.as_ref().map(|superclass| {
                    let environment =
                        Environment::with_enclosing(Rc::clone(&self.environment)).into_ref();
                    environment
                        .borrow_mut()
                        .define("super", Value::Callable(Callable::Class(Rc::clone(superclass))));
                    mem::replace(&mut self.environment, environment)
                });

                let methods = methods
                    .iter()
                    .map(|method| {
                        let function = Function::new(
                            method,
                            Rc::clone(&self.environment),
                            method.name.lexeme == INITIALIZER,
                        );
                        (method.name.lexeme.to_string(), Rc::new(function))
                    })
                    .collect();

                let class = Class::new(name.lexeme, superclass, methods);

                if let Some(previous) = previous {
                    self.environment = previous;
                }

                self.environment
                    .borrow_mut()
                    .assign(name, Value::Callable(Callable::Class(Rc::new(class))))?;
            }
        }

        Ok(Flow::Normal)
    }

    /// Runs `statements` with `environment` as the current environment, then
    /// puts the previous one back, whether the block finished, returned or
    /// failed.
    pub fn execute_block(
        &mut self,
        statements: &'a [Stmt<'a>],
        environment: EnvRef<'a>,
    ) -> Result<Flow<'a>> {
        let previous = mem::replace(&mut self.environment, environment);

        let result = self.execute_all(statements);

        self.environment = previous;

        result
    }

    fn execute_all(&mut self, statements: &'a [Stmt<'a>]) -> Result<Flow<'a>> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }

        Ok(Flow::Normal)
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr<'a>) -> Result<Value<'a>> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_val = self.evaluate(left)?;

                // The deciding operand itself is the result, not a boolean.
                let short_circuit = if operator.token_type == TokenType::OR {
                    left_val.is_truthy()
                } else {
                    !left_val.is_truthy()
                };

                if short_circuit {
                    Ok(left_val)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(&self.environment, distance, name, value.clone())
                    }
                    None => self.globals.borrow_mut().assign(name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee_val = self.evaluate(callee)?;

                let mut arg_values = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    arg_values.push(self.evaluate(arg)?);
                }

                let Value::Callable(callable) = callee_val else {
                    return Err(MochaError::runtime(
                        paren,
                        "Can only call functions and classes.",
                    ));
                };

                if arg_values.len() != callable.arity() {
                    return Err(MochaError::runtime(
                        paren,
                        format!(
                            "Expected {} arguments but got {}.",
                            callable.arity(),
                            arg_values.len()
                        ),
                    ));
                }

                if self.call_depth >= MAX_CALL_DEPTH {
                    return Err(MochaError::runtime(paren, "Stack overflow."));
                }

                debug!("Calling {} with {} argument(s)", callable, arg_values.len());

                self.call_depth += 1;
                let result = stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, || {
                    callable.call(self, paren, arg_values)
                });
                self.call_depth -= 1;

                result
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Instance::get(&instance, name),
                _ => Err(MochaError::runtime(name, "Only instances have properties.")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(MochaError::runtime(name, "Only instances have fields."));
                };

                let value = self.evaluate(value)?;
                instance.set(name, value.clone());

                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token<'_>, right: &Expr<'a>) -> Result<Value<'a>> {
        let right_val = self.evaluate(right)?;

        match (&operator.token_type, right_val) {
            (TokenType::MINUS, Value::Number(n)) => Ok(Value::Number(-n)),
            (TokenType::MINUS, _) => Err(MochaError::runtime(operator, "Operand must be a number.")),
            (_, value) => Ok(Value::Bool(!value.is_truthy())),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr<'a>,
        operator: &Token<'_>,
        right: &Expr<'a>,
    ) -> Result<Value<'a>> {
        let left_val = self.evaluate(left)?;
        let right_val = self.evaluate(right)?;

        debug!(
            "Binary '{}': left={}, right={}",
            operator.lexeme, left_val, right_val
        );

        match operator.token_type {
            TokenType::EQUAL_EQUAL => return Ok(Value::Bool(left_val == right_val)),
            TokenType::BANG_EQUAL => return Ok(Value::Bool(left_val != right_val)),
            TokenType::PLUS => {
                return match (left_val, right_val) {
                    (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                    (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                    _ => Err(MochaError::runtime(
                        operator,
                        "Operands must be two numbers or two strings.",
                    )),
                };
            }
            _ => {}
        }

        let (Value::Number(a), Value::Number(b)) = (left_val, right_val) else {
            return Err(MochaError::runtime(operator, "Operands must be numbers."));
        };

        let value = match operator.token_type {
            TokenType::MINUS => Value::Number(a - b),
            TokenType::STAR => Value::Number(a * b),
            TokenType::SLASH => Value::Number(a / b),
            TokenType::GREATER => Value::Bool(a > b),
            TokenType::GREATER_EQUAL => Value::Bool(a >= b),
            TokenType::LESS => Value::Bool(a < b),
            TokenType::LESS_EQUAL => Value::Bool(a <= b),
            _ => {
                return Err(MochaError::runtime(
                    operator,
                    format!("Invalid binary operator '{}'.", operator.lexeme),
                ))
            }
        };

        Ok(value)
    }

    fn look_up_variable(&self, id: ExprId, name: &Token<'_>) -> Result<Value<'a>> {
        match self.locals.get(&id) {
            Some(&distance) => Environment::get_at(&self.environment, distance, name.lexeme)
                .ok_or_else(|| {
                    MochaError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
                }),
            None => self.globals.borrow().get(name),
        }
    }

    /// `super.method`: the method comes from the superclass bound `distance`
    /// scopes out, `this` from the scope just inside it.
    fn evaluate_super(
        &mut self,
        id: ExprId,
        keyword: &Token<'_>,
        method: &Token<'_>,
    ) -> Result<Value<'a>> {
        let Some(&distance) = self.locals.get(&id) else {
            return Err(MochaError::runtime(keyword, "Can't use 'super' outside of a class."));
        };

        let superclass = match Environment::get_at(&self.environment, distance, "super") {
            Some(Value::Callable(Callable::Class(class))) => class,
            _ => return Err(MochaError::runtime(keyword, "Superclass must be a class.")),
        };

        let instance = match distance
            .checked_sub(1)
            .and_then(|d| Environment::get_at(&self.environment, d, "this"))
        {
            Some(Value::Instance(instance)) => instance,
            _ => return Err(MochaError::runtime(keyword, "Can't use 'super' outside of a method.")),
        };

        let bound = superclass
            .find_method(method.lexeme)
            .map(|found| found.bind(instance))
            .ok_or_else(|| {
                MochaError::runtime(method, format!("Undefined property '{}'.", method.lexeme))
            })?;

        Ok(Value::Callable(Callable::Function(Rc::new(bound))))
    }
}
