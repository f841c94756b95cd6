use std::{fs, path::PathBuf, process::ExitCode};

use clap::{Args, Parser, Subcommand};

use numfu::{
    ast::{ImportNames, Stmt, StmtKind},
    diagnostics::SourceSpan,
    number, parser, treefile, Interpreter, NumFuError, Repl,
};

/// Deep non-tail recursion runs on the host stack, so the interpreter gets a
/// thread with plenty of it.
const STACK_SIZE: usize = 256 * 1024 * 1024;

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Interpreter for the NumFu programming language",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    /// Source file (.nfu) or serialized tree (.nfut) to evaluate
    file: Option<PathBuf>,

    #[command(flatten)]
    limits: Limits,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Clone)]
struct Limits {
    /// Decimal precision for calculations
    #[arg(short = 'p', long, default_value_t = 15)]
    precision: usize,

    /// Maximum recursion depth during evaluation
    #[arg(short = 'r', long, default_value_t = 10000)]
    rec_depth: usize,

    /// Maximum iterations of tail-call optimized recursion (unlimited when
    /// omitted)
    #[arg(long)]
    iter_depth: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a NumFu source file
    Run {
        file: PathBuf,
        #[command(flatten)]
        limits: Limits,
    },
    /// Start an interactive REPL session
    Repl {
        #[command(flatten)]
        limits: Limits,
    },
    /// Parse a file and report syntax errors
    Parse { file: PathBuf },
    /// Parse a file and save the serialized syntax tree
    Ast {
        file: PathBuf,
        /// Output path, defaulting to the input with a .nfut extension
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Modules to star-import ahead of the file's own statements
        #[arg(long, value_delimiter = ',')]
        imports: Vec<String>,
    },
    /// Evaluate an inline snippet
    Eval {
        source: String,
        #[command(flatten)]
        limits: Limits,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let handle = std::thread::Builder::new()
        .stack_size(STACK_SIZE)
        .spawn(move || dispatch(cli));
    match handle {
        Ok(handle) => handle.join().unwrap_or(ExitCode::FAILURE),
        Err(err) => {
            eprintln!("error: failed to start interpreter thread: {err}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> ExitCode {
    match cli.command {
        Some(Command::Run { file, limits }) => run_file(&file, &limits),
        Some(Command::Repl { limits }) => run_repl(&limits),
        Some(Command::Parse { file }) => parse_file(&file),
        Some(Command::Ast {
            file,
            output,
            imports,
        }) => write_ast(&file, output, &imports),
        Some(Command::Eval { source, limits }) => eval_snippet(&source, &limits),
        None => match cli.file {
            Some(file) => run_file(&file, &cli.limits),
            None => run_repl(&cli.limits),
        },
    }
}

fn build_interpreter(limits: &Limits) -> Result<Interpreter, NumFuError> {
    number::set_precision(limits.precision);
    let mut interpreter = Interpreter::new()?;
    interpreter.set_rec_depth(limits.rec_depth);
    interpreter.set_iter_depth(limits.iter_depth);
    Ok(interpreter)
}

fn run_file(file: &PathBuf, limits: &Limits) -> ExitCode {
    let mut interpreter = match build_interpreter(limits) {
        Ok(interpreter) => interpreter,
        Err(err) => return report(err),
    };
    match interpreter.run_file(file) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => report(err),
    }
}

fn run_repl(limits: &Limits) -> ExitCode {
    let interpreter = match build_interpreter(limits) {
        Ok(interpreter) => interpreter,
        Err(err) => return report(err),
    };
    let mut repl = Repl::new(interpreter);
    match repl.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report(err),
    }
}

fn eval_snippet(source: &str, limits: &Limits) -> ExitCode {
    let mut interpreter = match build_interpreter(limits) {
        Ok(interpreter) => interpreter,
        Err(err) => return report(err),
    };
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    match interpreter.run_source(source, &cwd) {
        Ok(_) => ExitCode::SUCCESS,
        Err(NumFuError::Diagnostic(diag)) => {
            eprintln!("{}", diag.render(Some(source)));
            ExitCode::from(diag.kind.exit_code())
        }
        Err(err) => report(err),
    }
}

fn parse_file(file: &PathBuf) -> ExitCode {
    let source = match fs::read_to_string(file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: cannot read {}: {err}", file.display());
            return ExitCode::FAILURE;
        }
    };
    match parser::parse_program(&source) {
        Ok(stmts) => {
            println!(
                "{}: {} statement{}",
                file.display(),
                stmts.len(),
                if stmts.len() == 1 { "" } else { "s" }
            );
            ExitCode::SUCCESS
        }
        Err(diag) => {
            eprintln!("{}", diag.with_file(file).render(Some(&source)));
            ExitCode::from(2)
        }
    }
}

fn write_ast(file: &PathBuf, output: Option<PathBuf>, imports: &[String]) -> ExitCode {
    let source = match fs::read_to_string(file) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("error: cannot read {}: {err}", file.display());
            return ExitCode::FAILURE;
        }
    };
    let mut stmts: Vec<Stmt> = imports
        .iter()
        .filter(|name| !name.is_empty())
        .map(|name| Stmt {
            kind: StmtKind::Import {
                names: ImportNames::Star,
                path: name.clone(),
            },
            span: SourceSpan::new(0, 0),
        })
        .collect();
    match parser::parse_program(&source) {
        Ok(parsed) => stmts.extend(parsed),
        Err(diag) => {
            eprintln!("{}", diag.with_file(file).render(Some(&source)));
            return ExitCode::from(2);
        }
    }
    let output = output.unwrap_or_else(|| file.with_extension("nfut"));
    match treefile::write(&output, &stmts) {
        Ok(()) => {
            println!("Parsed tree saved to {}", output.display());
            ExitCode::SUCCESS
        }
        Err(err) => report(err),
    }
}

fn report(err: NumFuError) -> ExitCode {
    match err {
        NumFuError::Exit(code) => ExitCode::from(code.clamp(0, 255) as u8),
        NumFuError::Diagnostic(diag) => {
            let source = diag
                .file
                .as_ref()
                .and_then(|path| fs::read_to_string(path).ok());
            eprintln!("{}", diag.render(source.as_deref()));
            ExitCode::from(diag.kind.exit_code())
        }
        other => {
            eprintln!("error: {other}");
            ExitCode::FAILURE
        }
    }
}
