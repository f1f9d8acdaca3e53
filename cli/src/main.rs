use std::io::{BufRead, BufReader, IsTerminal};
use std::path::PathBuf;

use celrt::render::{render_error_to, render_issues_to_writer};
use celrt::types::{describe, parse_short};
use celrt::values::infer_type;
use celrt::{EnvId, Error, Issue, OptionConfig, Runtime, RuntimeConfig, VariableDecl};
use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result, miette};
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};
use serde_json::{Map, Value as Json};

/// celrt - evaluate CEL expressions
#[derive(Parser, Debug)]
#[command(name = "celrt")]
#[command(about = "Evaluate CEL expressions", long_about = None)]
struct Cli {
    /// Runtime configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate an expression (if not provided, reads from stdin)
    Eval {
        #[command(flatten)]
        env: EnvArgs,

        /// Variable values as a JSON object; undeclared ones get an inferred type
        #[arg(long = "vars", value_name = "JSON", value_parser = parse_object)]
        values: Option<Map<String, Json>>,

        expression: Option<String>,
    },
    /// Type-check an expression and report every issue
    Check {
        #[command(flatten)]
        env: EnvArgs,

        expression: String,
    },
    /// List the available environment options
    Options,
}

#[derive(Args, Debug)]
struct EnvArgs {
    /// Declare a variable, e.g. `--var 'tags:list(string)'`
    #[arg(long = "var", value_name = "NAME:TYPE", value_parser = parse_var)]
    declarations: Vec<VariableDecl>,

    /// Enable an environment option, e.g. `--option '{"type": "OptionalTypes"}'`
    #[arg(long = "option", value_name = "JSON", value_parser = parse_option)]
    options: Vec<OptionConfig>,
}

fn parse_var(text: &str) -> Result<VariableDecl, String> {
    let (name, ty) = text
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:TYPE, got '{}'", text))?;
    let ty = parse_short(ty).map_err(|e| e.to_string())?;
    Ok(VariableDecl::new(name.trim(), describe(&ty)))
}

fn parse_object(text: &str) -> Result<Map<String, Json>, String> {
    match serde_json::from_str(text).map_err(|e| e.to_string())? {
        Json::Object(map) => Ok(map),
        _ => Err("expected a JSON object".to_string()),
    }
}

fn parse_option(text: &str) -> Result<OptionConfig, String> {
    serde_json::from_str(text).map_err(|e| e.to_string())
}

struct Session {
    runtime: Runtime,
    env: EnvId,
    values: Map<String, Json>,
}

impl Session {
    fn new(runtime: Runtime, args: EnvArgs, values: Map<String, Json>) -> Result<Self> {
        let mut declarations = args.declarations;
        for (name, value) in &values {
            if !declarations.iter().any(|decl| &decl.name == name) {
                declarations.push(VariableDecl::new(name.clone(), describe(&infer_type(value))));
            }
        }
        let env = runtime
            .create_env(&declarations, &[], &args.options)
            .into_diagnostic()?;
        Ok(Self {
            runtime,
            env,
            values,
        })
    }

    fn interpret(&self, input: &str) {
        let input = input.trim();
        if input.is_empty() {
            return;
        }

        let outcome = self.runtime.compile_detailed(self.env, input);
        report_issues(input, &outcome.issues);
        if let Some(error) = &outcome.error {
            if outcome.issues.is_empty() {
                report_error(input, error);
            }
            return;
        }
        let Some(program) = outcome.program_id else {
            return;
        };

        match self.runtime.eval(program, &self.values) {
            Ok(value) => println!("{}", value),
            Err(e) => report_error(input, &e),
        }
        if let Err(e) = self.runtime.destroy_program(program) {
            tracing::warn!(%program, error = %e, "failed to release program");
        }
    }

    fn check(&self, input: &str) -> Result<()> {
        let outcome = self.runtime.compile_detailed(self.env, input);
        report_issues(input, &outcome.issues);
        if let Some(error) = outcome.error {
            if outcome.issues.is_empty() {
                report_error(input, &error);
            }
            return Err(miette!("check failed"));
        }
        let ty = self.runtime.typecheck(self.env, input).into_diagnostic()?;
        println!("{}", ty);
        Ok(())
    }
}

fn report_issues(input: &str, issues: &[Issue]) {
    let mut stderr = std::io::stderr();
    let color = stderr.is_terminal();
    render_issues_to_writer(input, issues, &mut stderr, color).ok();
}

fn report_error(input: &str, error: &Error) {
    let mut stderr = std::io::stderr();
    let color = stderr.is_terminal();
    render_error_to(input, error, &mut stderr, color).ok();
}

fn run_interactive(session: &Session) {
    let mut line_editor = Reedline::create();
    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic("cel".to_string()),
        DefaultPromptSegment::Empty,
    );

    println!("celrt REPL - Type expressions to evaluate (Ctrl+D or Ctrl+C to exit)");

    loop {
        let sig = match line_editor.read_line(&prompt) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Reedline error: {e}");
                return;
            }
        };

        match sig {
            Signal::Success(buffer) => session.interpret(&buffer),
            Signal::CtrlD | Signal::CtrlC => {
                println!("\nGoodbye!");
                return;
            }
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging subscriber
    use tracing_subscriber::{EnvFilter, fmt};

    // Use RUST_LOG environment variable to control log level
    // Default to WARN if not set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => RuntimeConfig::from_file(path).into_diagnostic()?,
        None => RuntimeConfig::default(),
    };
    let runtime = Runtime::with_config(config);

    match cli.command {
        Command::Options => {
            for option in runtime.options() {
                println!("{:<28} {}", option.name, option.description);
            }
        }
        Command::Check { env, expression } => {
            Session::new(runtime, env, Map::new())?.check(&expression)?;
        }
        Command::Eval {
            env,
            values,
            expression,
        } => {
            let session = Session::new(runtime, env, values.unwrap_or_default())?;
            if let Some(expr) = expression {
                session.interpret(&expr);
            } else if std::io::stdin().is_terminal() {
                run_interactive(&session);
            } else {
                // Pipe/stdin mode
                let stdin = std::io::stdin();
                let reader = BufReader::new(stdin.lock());
                for line in reader.lines() {
                    session.interpret(&line.into_diagnostic()?);
                }
            }
        }
    }

    Ok(())
}
