use std::io;
use std::thread;

use interp::diagnostics::{self, Diagnostic};
use interp::logging;
use interp::{Interpreter, InterpreterConfig, SourceError, parse_pipelined, parse_source};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

/// Native stack for the evaluator thread; deep Elara recursion walks the tree
/// recursively.
const EVAL_STACK_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct CliConfig {
    source: Option<String>,
    repl: bool,
    parse_only: bool,
    json: bool,
    no_pipeline: bool,
    max_depth: Option<usize>,
    help: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli_args(&args).map_err(io::Error::other)?;
    if cli.help {
        print_usage();
        return Ok(());
    }
    logging::init()?;

    // statements already run on the large-stack worker below
    let mut config = InterpreterConfig::default().with_eval_stack_size(0);
    if let Some(depth) = cli.max_depth {
        config = config.with_max_call_depth(depth);
    }

    let worker = thread::Builder::new()
        .name("elara-eval".to_string())
        .stack_size(EVAL_STACK_BYTES)
        .spawn(move || -> Result<bool, String> {
            if cli.repl {
                run_repl(config).map(|()| true).map_err(|err| err.to_string())
            } else {
                run_file(&cli, config).map_err(|err| err.to_string())
            }
        })?;
    let succeeded = worker
        .join()
        .map_err(|_| io::Error::other("evaluator thread panicked"))?
        .map_err(io::Error::other)?;
    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

fn parse_cli_args(args: &[String]) -> Result<CliConfig, String> {
    let mut cfg = CliConfig::default();
    if args.is_empty() {
        cfg.repl = true;
        return Ok(cfg);
    }
    let mut index = 0usize;

    if let Some(first) = args.first()
        && first == "repl"
    {
        cfg.repl = true;
        index = 1;
    }

    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => {
                cfg.help = true;
                index += 1;
            }
            "--repl" => {
                cfg.repl = true;
                index += 1;
            }
            "--parse-only" => {
                cfg.parse_only = true;
                index += 1;
            }
            "--json" => {
                cfg.json = true;
                index += 1;
            }
            "--no-pipeline" => {
                cfg.no_pipeline = true;
                index += 1;
            }
            "--max-depth" => {
                let raw = args
                    .get(index + 1)
                    .ok_or_else(|| "missing value for --max-depth".to_string())?;
                let value = raw
                    .parse::<usize>()
                    .ok()
                    .filter(|depth| *depth > 0)
                    .ok_or_else(|| format!("invalid --max-depth value '{raw}'"))?;
                cfg.max_depth = Some(value);
                index += 2;
            }
            value if value.starts_with('-') => {
                return Err(format!("unknown flag '{value}'"));
            }
            path => {
                if cfg.source.is_some() {
                    return Err("multiple source paths provided".to_string());
                }
                cfg.source = Some(path.to_string());
                index += 1;
            }
        }
    }

    if cfg.repl {
        if cfg.source.is_some() {
            return Err("repl mode does not accept a source path".to_string());
        }
        if cfg.parse_only || cfg.json || cfg.no_pipeline {
            return Err(
                "repl mode cannot be combined with --parse-only/--json/--no-pipeline".to_string(),
            );
        }
    } else if cfg.source.is_none() && !cfg.help {
        if cfg.parse_only || cfg.json || cfg.no_pipeline || cfg.max_depth.is_some() {
            return Err("missing source path".to_string());
        }
        cfg.repl = true;
    }

    Ok(cfg)
}

fn print_usage() {
    println!("Usage:");
    println!("  elara-run                  (defaults to REPL)");
    println!("  elara-run [source_path]");
    println!("  elara-run --repl");
    println!("  elara-run repl");
    println!("  elara-run --parse-only [--json] [--no-pipeline] <source_path>");
    println!("  elara-run [--json] [--no-pipeline] [--max-depth <n>] <source_path>");
}

/// Returns whether the run finished without diagnostics.
fn run_file(cli: &CliConfig, config: InterpreterConfig) -> io::Result<bool> {
    let path = cli
        .source
        .as_deref()
        .ok_or_else(|| io::Error::other("missing source path"))?;
    let source = std::fs::read_to_string(path)?;

    if cli.parse_only {
        let output = if cli.no_pipeline {
            parse_source(&source)
        } else {
            parse_pipelined(&source, &config)?
        };
        if output.is_ok() {
            if cli.json {
                println!("{}", diagnostics::to_json(&[]));
            } else {
                println!("parsed {} statement(s)", output.statements.len());
            }
            return Ok(true);
        }
        report(cli, path, &source, &SourceError::Parse(output.errors));
        return Ok(false);
    }

    let mut interpreter = Interpreter::with_config(config);
    let result = if cli.no_pipeline {
        interpreter.eval_source(&source)
    } else {
        interpreter.run_pipelined(&source)
    };
    match result {
        Ok(value) => {
            debug!("program finished with {value}");
            if cli.json {
                println!("{}", diagnostics::to_json(&[]));
            }
            Ok(true)
        }
        Err(err) => {
            report(cli, path, &source, &err);
            Ok(false)
        }
    }
}

fn report(cli: &CliConfig, path: &str, source: &str, err: &SourceError) {
    if cli.json {
        let collected: Vec<Diagnostic> = diagnostics::collect(err);
        println!("{}", diagnostics::to_json(&collected));
    } else {
        eprintln!(
            "{}",
            diagnostics::render_all(path, source, err, logging::ansi_enabled())
        );
    }
}

fn run_repl(config: InterpreterConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("elara REPL");
    println!("history: up/down arrows, commands: .help, .quit");
    println!("state: bindings persist across entries");
    let mut editor = DefaultEditor::new()?;
    let mut interpreter = Interpreter::with_config(config);
    loop {
        match editor.readline("elara> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Some(action) = handle_repl_command(line) {
                    if action == ReplAction::Break {
                        break;
                    }
                    continue;
                }
                let _ = editor.add_history_entry(line);
                match interpreter.eval_source(line) {
                    Ok(value) => println!("{} {value}", logging::result_label()),
                    Err(err) if err.is_fatal() => {
                        println!("{}: {err}", logging::error_label());
                        break;
                    }
                    Err(err) => println!(
                        "{}",
                        diagnostics::render_all("<repl>", line, &err, logging::ansi_enabled())
                    ),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("bye");
                break;
            }
            Err(err) => {
                return Err(Box::new(io::Error::other(err.to_string())));
            }
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReplAction {
    Continue,
    Break,
}

fn handle_repl_command(line: &str) -> Option<ReplAction> {
    match line {
        ".quit" | ".exit" => Some(ReplAction::Break),
        ".help" => {
            println!("enter Elara statements; bindings persist between entries");
            println!("commands: .help, .quit");
            Some(ReplAction::Continue)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::parse_cli_args;

    fn s(value: &str) -> String {
        value.to_string()
    }

    #[test]
    fn parse_cli_defaults() {
        let cfg = parse_cli_args(&[]).expect("parse should succeed");
        assert!(cfg.repl);
        assert!(cfg.source.is_none());
        assert!(!cfg.parse_only);
        assert!(!cfg.json);
        assert!(!cfg.no_pipeline);
        assert!(cfg.max_depth.is_none());
    }

    #[test]
    fn parse_cli_repl_command() {
        let cfg = parse_cli_args(&[s("repl")]).expect("parse should succeed");
        assert!(cfg.repl);
    }

    #[test]
    fn parse_cli_source_with_flags() {
        let cfg = parse_cli_args(&[
            s("--parse-only"),
            s("--json"),
            s("--no-pipeline"),
            s("demo.elara"),
        ])
        .expect("parse should succeed");
        assert!(!cfg.repl);
        assert!(cfg.parse_only);
        assert!(cfg.json);
        assert!(cfg.no_pipeline);
        assert_eq!(cfg.source.as_deref(), Some("demo.elara"));
    }

    #[test]
    fn parse_cli_max_depth() {
        let cfg = parse_cli_args(&[s("--max-depth"), s("64"), s("demo.elara")])
            .expect("parse should succeed");
        assert_eq!(cfg.max_depth, Some(64));
    }

    #[test]
    fn parse_cli_rejects_bad_max_depth() {
        let err = parse_cli_args(&[s("--max-depth"), s("zero"), s("demo.elara")])
            .expect_err("parse should fail");
        assert!(err.contains("invalid --max-depth"));
        let err = parse_cli_args(&[s("--max-depth"), s("0"), s("demo.elara")])
            .expect_err("parse should fail");
        assert!(err.contains("invalid --max-depth"));
        let err = parse_cli_args(&[s("demo.elara"), s("--max-depth")]).expect_err("parse should fail");
        assert!(err.contains("missing value"));
    }

    #[test]
    fn parse_cli_rejects_multiple_sources() {
        let err = parse_cli_args(&[s("a.elara"), s("b.elara")]).expect_err("parse should fail");
        assert!(err.contains("multiple source paths"));
    }

    #[test]
    fn parse_cli_rejects_unknown_flag() {
        let err = parse_cli_args(&[s("--jit")]).expect_err("parse should fail");
        assert!(err.contains("unknown flag"));
    }

    #[test]
    fn parse_cli_repl_rejects_source() {
        let err = parse_cli_args(&[s("--repl"), s("demo.elara")]).expect_err("parse should fail");
        assert!(err.contains("does not accept a source path"));
    }

    #[test]
    fn parse_cli_flags_need_source() {
        let err = parse_cli_args(&[s("--parse-only")]).expect_err("parse should fail");
        assert!(err.contains("missing source path"));
    }

    #[test]
    fn parse_cli_help() {
        let cfg = parse_cli_args(&[s("--help")]).expect("parse should succeed");
        assert!(cfg.help);
    }
}
