pub mod ast;
pub mod ast_printer;
pub mod callable;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

use std::io::Write;

use log::info;

use error::{Failure, MochaError};
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;

/// Scan, parse, resolve and run `source`, writing program output to `out`.
///
/// Lex and parse errors are gathered together; resolution only runs on a
/// tree that parsed cleanly, and nothing executes unless resolution did too.
pub fn run<W: Write>(source: &str, out: W) -> Result<(), Failure> {
    let (tokens, mut errors): (_, Vec<MochaError>) = Scanner::new(source).scan_all();

    let statements = match Parser::new(&tokens).parse() {
        Ok(statements) => statements,
        Err(parse_errors) => {
            errors.extend(parse_errors);
            return Err(Failure::Static(errors));
        }
    };

    if !errors.is_empty() {
        return Err(Failure::Static(errors));
    }

    let resolution = Resolver::new().resolve(&statements);
    if resolution.had_error() {
        return Err(Failure::Static(resolution.errors));
    }

    info!("Program resolved, executing");

    let mut interpreter = Interpreter::new(out);
    interpreter
        .interpret(&statements, resolution.locals)
        .map_err(Failure::Runtime)
}
