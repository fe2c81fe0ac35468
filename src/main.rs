use std::io::{self, Read};
use std::path::PathBuf;

use clap::Parser as ClapParser;
use log::{debug, error};

use lumen_lang::interpreter::Interpreter;
use lumen_lang::lexer::Lexer;
use lumen_lang::parser::Parser;
use lumen_lang::typechecker::Typechecker;

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

#[derive(ClapParser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Source file to run; reads from standard input when omitted.
    source: Option<PathBuf>,

    #[arg(short, long, value_enum, default_value = "warn")]
    verbosity: LogLevel,
}

fn main() {
    let args = Cli::parse();
    simple_logger::init_with_level(args.verbosity.into()).unwrap();

    let source = match &args.source {
        Some(path) => std::fs::read_to_string(path).unwrap_or_else(|e| {
            error!("could not read '{}': {e}", path.to_string_lossy());
            std::process::exit(1);
        }),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .expect("failed to read source from standard input");
            buf
        }
    };

    let tokens = match Lexer::new(&source).tokenize() {
        Ok(tokens) => tokens,
        Err(e) => fail("Lexer", &e.message, e.position),
    };
    debug!("lexed {} tokens", tokens.len());

    let program = match Parser::new(tokens).parse_program() {
        Ok(program) => program,
        Err(e) => fail("Parser", &e.message, e.position),
    };
    debug!("parsed {} top-level declarations", program.decls.len());

    if let Err(e) = Typechecker::new().check_program(&program) {
        fail("Type", &e.message, e.position)
    }

    let stdin = io::BufReader::new(io::stdin());
    let stdout = io::stdout();
    let mut interpreter = Interpreter::new(&program, stdin, stdout.lock());

    match interpreter.run() {
        Ok(code) => std::process::exit(code as i32),
        Err(flow) => {
            let err = flow.into_runtime_error();
            fail("Runtime", &err.message, err.position)
        }
    }
}

fn fail(stage: &str, message: &str, position: lumen_lang::token::Position) -> ! {
    println!("{stage} Error: {message} [at {position}]");
    std::process::exit(1)
}
