//! Object model: native functions, user functions (closures), classes and
//! instances.
//!
//! Calls are dispatched through [`Callable`]; user code runs through the
//! interpreter's [`execute_block`](Interpreter::execute_block), which is why
//! every `call` takes the interpreter.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::FunctionDecl;
use crate::environment::{EnvRef, Environment};
use crate::error::{MochaError, Result};
use crate::interpreter::{Flow, Interpreter};
use crate::token::Token;
use crate::value::Value;

/// Name of the method run when a class is called.
pub const INITIALIZER: &str = "init";

/// Signature of a host function.  An `Err` becomes a runtime error at the
/// call site.
pub type NativeFn = for<'v> fn(&[Value<'v>]) -> std::result::Result<Value<'v>, String>;

/// A function implemented by the host.
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub func: NativeFn,
}

/// Anything that can appear before `(...)`.
#[derive(Clone)]
pub enum Callable<'a> {
    Native(Rc<NativeFunction>),
    Function(Rc<Function<'a>>),
    Class(Rc<Class<'a>>),
}

impl<'a> Callable<'a> {
    pub fn arity(&self) -> usize {
        match self {
            Callable::Native(native) => native.arity,
            Callable::Function(function) => function.arity(),
            Callable::Class(class) => class.arity(),
        }
    }

    /// Invoke with already‑checked arity.  `paren` locates errors raised by
    /// native functions.
    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<'a, W>,
        paren: &Token<'_>,
        arguments: Vec<Value<'a>>,
    ) -> Result<Value<'a>> {
        match self {
            Callable::Native(native) => {
                debug!("Calling native function '{}'", native.name);

                (native.func)(&arguments).map_err(|msg| MochaError::runtime(paren, msg))
            }

            Callable::Function(function) => function.call(interpreter, arguments),

            Callable::Class(class) => Class::instantiate(class, interpreter, arguments),
        }
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Class(a), Callable::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Callable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(_) => write!(f, "<native fn>"),
            Callable::Function(function) => write!(f, "<fn {}>", function.name()),
            Callable::Class(class) => write!(f, "{}", class.name),
        }
    }
}

impl fmt::Debug for Callable<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callable({})", self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// User functions
// ─────────────────────────────────────────────────────────────────────────────

/// A declared function paired with the environment it closed over.
pub struct Function<'a> {
    declaration: &'a FunctionDecl<'a>,
    closure: EnvRef<'a>,
    is_initializer: bool,
}

impl<'a> Function<'a> {
    pub fn new(declaration: &'a FunctionDecl<'a>, closure: EnvRef<'a>, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &'a str {
        self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Same declaration, closure extended with `this` = `instance`.
    pub fn bind(&self, instance: Rc<Instance<'a>>) -> Function<'a> {
        debug!("Binding '{}' to {}", self.name(), instance);

        let environment = Environment::with_enclosing(Rc::clone(&self.closure)).into_ref();
        environment
            .borrow_mut()
            .define("this", Value::Instance(instance));

        Function::new(self.declaration, environment, self.is_initializer)
    }

    pub fn call<W: Write>(
        &self,
        interpreter: &mut Interpreter<'a, W>,
        arguments: Vec<Value<'a>>,
    ) -> Result<Value<'a>> {
        debug!("Calling user-defined function '{}'", self.name());

        let declaration: &'a FunctionDecl<'a> = self.declaration;
        let environment = Environment::with_enclosing(Rc::clone(&self.closure)).into_ref();

        for (param, argument) in declaration.params.iter().zip(arguments) {
            environment.borrow_mut().define(param.lexeme, argument);
        }

        let flow = interpreter.execute_block(&declaration.body, environment)?;

        // Initializers hand back the instance, whatever the body returned.
        if self.is_initializer {
            return Ok(Environment::get_at(&self.closure, 0, "this").unwrap_or(Value::Nil));
        }

        let value = match flow {
            Flow::Return(value) => value,
            Flow::Normal => Value::Nil,
        };

        info!("Function '{}' returned: {}", self.name(), value);

        Ok(value)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Classes and instances
// ─────────────────────────────────────────────────────────────────────────────

pub struct Class<'a> {
    pub name: String,
    pub superclass: Option<Rc<Class<'a>>>,
    methods: HashMap<String, Rc<Function<'a>>>,
}

impl<'a> Class<'a> {
    pub fn new(
        name: &str,
        superclass: Option<Rc<Class<'a>>>,
        methods: HashMap<String, Rc<Function<'a>>>,
    ) -> Self {
        Self {
            name: name.to_string(),
            superclass,
            methods,
        }
    }

    /// Own methods first, then up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function<'a>>> {
        self.methods.get(name).cloned().or_else(|| {
            self.superclass
                .as_ref()
                .and_then(|superclass| superclass.find_method(name))
        })
    }

    /// The initializer's arity, or zero without one.
    pub fn arity(&self) -> usize {
        self.find_method(INITIALIZER)
            .map_or(0, |initializer| initializer.arity())
    }

    /// Create an instance and run the bound initializer, if any.
    pub fn instantiate<W: Write>(
        class: &Rc<Class<'a>>,
        interpreter: &mut Interpreter<'a, W>,
        arguments: Vec<Value<'a>>,
    ) -> Result<Value<'a>> {
        debug!("Instantiating class '{}'", class.name);

        let instance = Rc::new(Instance::new(Rc::clone(class)));

        if let Some(initializer) = class.find_method(INITIALIZER) {
            initializer
                .bind(Rc::clone(&instance))
                .call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

pub struct Instance<'a> {
    class: Rc<Class<'a>>,
    fields: RefCell<HashMap<String, Value<'a>>>,
}

impl<'a> Instance<'a> {
    pub fn new(class: Rc<Class<'a>>) -> Self {
        Self {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    /// Field first, then a method bound to `instance`.
    pub fn get(instance: &Rc<Instance<'a>>, name: &Token<'_>) -> Result<Value<'a>> {
        if let Some(value) = instance.fields.borrow().get(name.lexeme) {
            return Ok(value.clone());
        }

        if let Some(method) = instance.class.find_method(name.lexeme) {
            let bound = method.bind(Rc::clone(instance));
            return Ok(Value::Callable(Callable::Function(Rc::new(bound))));
        }

        Err(MochaError::runtime(
            name,
            format!("Undefined property '{}'.", name.lexeme),
        ))
    }

    pub fn set(&self, name: &Token<'_>, value: Value<'a>) {
        self.fields
            .borrow_mut()
            .insert(name.lexeme.to_string(), value);
    }
}

impl fmt::Display for Instance<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class.name)
    }
}

impl fmt::Debug for Instance<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Instance({})", self.class.name)
    }
}
