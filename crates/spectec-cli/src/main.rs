use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use spectec_il::{emit_spec, load_spec_str, Spec};
use spectec_interp::{
    call_rel, invoke_function, value_from_json, Ctx, EvalError, RunReport, SpecEnv, Value,
};
use tracing_subscriber::EnvFilter;

/// Exit code for a specification that could not be loaded
const EXIT_LOAD: u8 = 1;
/// Exit code for an evaluation that failed
const EXIT_INTERP: u8 = 2;

/// Output format for run results
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output (default)
    #[default]
    Human,
    /// Structured JSON run report
    Json,
}

#[derive(Parser)]
#[command(name = "spectec", version, about = "SpecTec IL driver")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load and validate an IL tree, then re-emit its canonical serialization.
    Il {
        /// Serialized IL file (`-` reads stdin).
        file: PathBuf,
    },
    /// Run a definition from a loaded IL tree and emit the phantom log.
    Run {
        /// Serialized IL file (`-` reads stdin).
        file: PathBuf,
        /// Function or relation to invoke.
        #[arg(short, long)]
        invoke: String,
        /// JSON-encoded argument value, one flag per input position.
        #[arg(short, long = "arg")]
        args: Vec<String>,
        /// Recursion depth bound.
        #[arg(long, default_value = "1000")]
        max_depth: usize,
        /// Evaluation timeout in seconds (0 = none).
        #[arg(long, default_value = "0")]
        timeout: u64,
        /// Output format: human (default) or json.
        #[arg(long, value_enum, default_value = "human")]
        output: OutputFormat,
        /// Also write the JSON run report to this file.
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },
}

/// A failure carrying the exit code the driver contract prescribes
struct CliError {
    code: u8,
    source: anyhow::Error,
}

fn load_failure(source: anyhow::Error) -> CliError {
    CliError {
        code: EXIT_LOAD,
        source,
    }
}

fn interp_failure(source: anyhow::Error) -> CliError {
    CliError {
        code: EXIT_INTERP,
        source,
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Il { file } => cmd_il(&file),
        Command::Run {
            file,
            invoke,
            args,
            max_depth,
            timeout,
            output,
            report,
        } => cmd_run(
            &file,
            &invoke,
            &args,
            max_depth,
            timeout,
            output,
            report.as_deref(),
        ),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err.source);
            ExitCode::from(err.code)
        }
    }
}

fn read_source(file: &Path) -> Result<String> {
    if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read stdin")?;
        Ok(buf)
    } else {
        std::fs::read_to_string(file).with_context(|| format!("read {}", file.display()))
    }
}

fn load_or_fail(file: &Path) -> Result<Spec, CliError> {
    let source = read_source(file).map_err(load_failure)?;
    load_spec_str(&source).map_err(|e| load_failure(anyhow!("{e}")))
}

fn cmd_il(file: &Path) -> Result<(), CliError> {
    let spec = load_or_fail(file)?;
    let emitted = emit_spec(&spec).map_err(|e| load_failure(anyhow!("{e}")))?;
    println!("{emitted}");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn cmd_run(
    file: &Path,
    invoke: &str,
    args: &[String],
    max_depth: usize,
    timeout: u64,
    output: OutputFormat,
    report_path: Option<&Path>,
) -> Result<(), CliError> {
    let spec = load_or_fail(file)?;
    let env = std::sync::Arc::new(SpecEnv::new(&spec));

    let mut ctx = Ctx::new(env.clone());
    ctx.set_max_depth(max_depth);
    if timeout > 0 {
        ctx.set_timeout(Duration::from_secs(timeout));
    }

    let raw_args: Vec<serde_json::Value> = args
        .iter()
        .map(|s| serde_json::from_str(s).with_context(|| format!("argument `{s}` is not JSON")))
        .collect::<Result<_>>()
        .map_err(interp_failure)?;

    let start = Instant::now();
    let outcome = evaluate(&mut ctx, &env, invoke, &raw_args);
    let elapsed = start.elapsed();

    // the phantom log is observational: it is emitted even when the
    // evaluation failed
    match outcome {
        Ok(results) => {
            let report = RunReport::ok(&ctx, invoke, &results, elapsed);
            write_report(&report, report_path).map_err(interp_failure)?;
            match output {
                OutputFormat::Human => print_human(&ctx, invoke, &results),
                OutputFormat::Json => print_json(&report).map_err(interp_failure)?,
            }
            Ok(())
        }
        Err(err) => {
            let report = RunReport::error(&ctx, invoke, &err, elapsed);
            write_report(&report, report_path).map_err(interp_failure)?;
            if matches!(output, OutputFormat::Json) {
                print_json(&report).map_err(interp_failure)?;
            }
            Err(interp_failure(anyhow!("{}", err.diagnostic())))
        }
    }
}

/// Invoke the named function or relation with decoded arguments
fn evaluate(
    ctx: &mut Ctx,
    env: &SpecEnv,
    invoke: &str,
    raw_args: &[serde_json::Value],
) -> Result<Vec<Value>, EvalError> {
    if let Some(func) = env.func(invoke) {
        let param_typs: Vec<_> = func.params.iter().map(|p| p.typ.clone()).collect();
        let values = decode_args(ctx, invoke, raw_args, &param_typs)?;
        let result = invoke_function(ctx, invoke, values)?;
        Ok(vec![result])
    } else if let Some(rel) = env.rel(invoke).cloned() {
        let input_typs: Vec<_> = rel
            .input_indices
            .iter()
            .map(|&i| rel.args[i].typ.clone())
            .collect();
        let values = decode_args(ctx, invoke, raw_args, &input_typs)?;
        call_rel(ctx, &rel, values, &spectec_il::Region::dummy())
    } else {
        Err(EvalError::unbound(invoke))
    }
}

fn decode_args(
    ctx: &mut Ctx,
    invoke: &str,
    raw_args: &[serde_json::Value],
    typs: &[spectec_il::Typ],
) -> Result<Vec<Value>, EvalError> {
    if raw_args.len() != typs.len() {
        return Err(EvalError::BuiltinError {
            msg: format!(
                "`{invoke}` takes {} argument(s), got {}",
                typs.len(),
                raw_args.len()
            ),
            region: None,
        });
    }
    raw_args
        .iter()
        .zip(typs)
        .map(|(raw, typ)| value_from_json(ctx, raw, typ))
        .collect()
}

fn print_human(ctx: &Ctx, invoke: &str, results: &[Value]) {
    match results {
        [single] => println!("{invoke} = {single}"),
        many => {
            for (i, v) in many.iter().enumerate() {
                println!("{invoke}.{i} = {v}");
            }
        }
    }
    let hits = ctx.phantoms.hits();
    if hits.is_empty() {
        println!("phantoms: none missed");
    } else {
        println!("phantoms: {} missed", hits.len());
        for hit in hits {
            let path: Vec<String> = hit.path.iter().map(|p| p.to_string()).collect();
            if path.is_empty() {
                println!("  pid {}", hit.pid);
            } else {
                println!("  pid {} under {}", hit.pid, path.join(" /\\ "));
            }
        }
    }
}

fn print_json(report: &RunReport) -> Result<()> {
    let rendered = report.to_json().context("serialize run report")?;
    println!("{rendered}");
    Ok(())
}

fn write_report(report: &RunReport, path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let rendered = report.to_json().context("serialize run report")?;
    std::fs::write(path, rendered).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
