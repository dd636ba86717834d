use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};

use mocha::ast::Stmt;
use mocha::error::{Failure, MochaError};
use mocha::interpreter::Interpreter;
use mocha::parser::Parser;
use mocha::resolver::Resolver;
use mocha::scanner::Scanner;
use mocha::token::Token;

use mocha::ast_printer::AstPrinter;

#[derive(ClapParser, Debug)]
#[command(version, about = "Mocha language interpreter", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log (filter with RUST_LOG)
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input from a file, printing each token
    Tokenize {
        filename: PathBuf,

        /// Print one JSON object per token instead
        #[arg(long)]
        json: bool,
    },

    /// Parses input from a file as a single expression and prints its AST
    Parse { filename: PathBuf },

    /// Evaluates input from a file as a single expression and prints the result
    Evaluate { filename: PathBuf },

    /// Runs input from a file as a Mocha program
    Run { filename: PathBuf },

    /// Reads programs line by line from standard input
    Repl,
}

/// Reads the contents of a file into a String
fn read_file(filename: &PathBuf) -> Result<String> {
    info!("Reading file: {:?}", filename);
    let file = File::open(filename).context(format!("Failed to open file {:?}", filename))?;
    let mut reader = BufReader::new(file);
    let mut buf = String::new();

    let bytes = reader
        .read_to_string(&mut buf)
        .context(format!("Failed to read file {:?}", filename))?;

    info!("Read {} bytes from {:?}", bytes, filename);

    Ok(buf)
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    // One record per line: [module:line] - message
    Builder::new()
        .format(|buf, record| {
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("mocha::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "[{}:{}] - {}",
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug)
        .parse_default_env()
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn report(errors: &[MochaError]) {
    for e in errors {
        eprintln!("{}", e);
    }
}

/// Scan the whole file, reporting lex errors.  Exits 65 if there were any.
fn scan_or_exit(source: &str) -> Vec<Token<'_>> {
    let (tokens, errors) = Scanner::new(source).scan_all();

    if !errors.is_empty() {
        report(&errors);
        std::process::exit(65);
    }

    tokens
}

fn tokenize(source: &str, json: bool) -> Result<()> {
    let mut tokenized = true;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    for token in Scanner::new(source) {
        match token {
            Ok(token) if json => {
                writeln!(out, "{}", serde_json::to_string(&token)?)?;
            }

            Ok(token) => {
                writeln!(out, "{}", token)?;
            }

            Err(e) => {
                tokenized = false;
                debug!("Tokenization debug: {}", e);
                eprintln!("{}", e);
            }
        }
    }

    if !tokenized {
        debug!("Tokenization failed, exiting with code 65");
        std::process::exit(65);
    }

    Ok(())
}

fn parse(source: &str) {
    let tokens = scan_or_exit(source);

    match Parser::new(&tokens).parse_expression() {
        Ok(expr) => {
            let ast_str = AstPrinter::print(&expr);
            debug!("AST: {}", ast_str);
            println!("{}", ast_str);
        }

        Err(errors) => {
            report(&errors);
            std::process::exit(65);
        }
    }
}

fn evaluate(source: &str) {
    let tokens = scan_or_exit(source);

    let expr = match Parser::new(&tokens).parse_expression() {
        Ok(expr) => expr,
        Err(errors) => {
            report(&errors);
            std::process::exit(65);
        }
    };

    let mut interpreter = Interpreter::new(io::stdout());

    match interpreter.evaluate(&expr) {
        Ok(value) => {
            debug!("Evaluated to: {}", value);
            println!("{}", value);
        }

        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(70);
        }
    }
}

fn run(source: &str) {
    if let Err(failure) = mocha::run(source, io::stdout()) {
        match &failure {
            Failure::Static(errors) => report(errors),
            Failure::Runtime(e) => eprintln!("{}", e),
        }

        debug!("Run failed: {}", failure);
        std::process::exit(failure.exit_code());
    }

    info!("Program executed successfully");
}

/// One interpreter for the whole session.  Each line's source, tokens and
/// tree are leaked: functions defined on a line keep borrowing its tree for
/// as long as the session's globals can reach them.
fn repl() -> Result<()> {
    let mut interpreter: Interpreter<'static, io::Stdout> = Interpreter::new(io::stdout());
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = lines.next() else {
            break;
        };
        let line = line.context("Failed to read line")?;
        let source: &'static str = Box::leak(line.into_boxed_str());

        let (tokens, mut errors) = Scanner::new(source).scan_all();
        let tokens: &'static [Token<'static>] = Box::leak(tokens.into_boxed_slice());

        let statements = match Parser::new(tokens).parse() {
            Ok(statements) if errors.is_empty() => statements,
            Ok(_) => {
                report(&errors);
                continue;
            }
            Err(parse_errors) => {
                errors.extend(parse_errors);
                report(&errors);
                continue;
            }
        };
        let statements: &'static [Stmt<'static>] = Box::leak(statements.into_boxed_slice());

        let resolution = Resolver::new().resolve(statements);
        if resolution.had_error() {
            report(&resolution.errors);
            continue;
        }

        if let Err(e) = interpreter.interpret(statements, resolution.locals) {
            eprintln!("{}", e);
        }
    }

    println!();
    Ok(())
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    if args.log {
        init_logger()?;
    } else {
        // Minimal logger so the library's records go nowhere.
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename, json } => {
            info!("Running Tokenize subcommand");
            let source = read_file(&filename)?;
            tokenize(&source, json)?;
        }

        Commands::Parse { filename } => {
            info!("Running Parse subcommand");
            let source = read_file(&filename)?;
            parse(&source);
        }

        Commands::Evaluate { filename } => {
            info!("Running Evaluate subcommand");
            let source = read_file(&filename)?;
            evaluate(&source);
        }

        Commands::Run { filename } => {
            info!("Running Run subcommand");
            let source = read_file(&filename)?;
            run(&source);
        }

        Commands::Repl => {
            info!("Running Repl subcommand");
            repl()?;
        }
    }

    Ok(())
}
