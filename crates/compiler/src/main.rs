//! RRVM CLI
//!
//! Runs `.rr` programs under the interpreter, or lowers them to TAC and
//! dumps the clause form for the downstream optimizer.
//!
//! Exit codes: 0 on success, 1 on a parse (or I/O) failure, 2 on bad
//! arguments.

use clap::{CommandFactory, Parser as ClapParser};
use clap_complete::{Shell, generate};
use rr_runtime::RunConfig;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use tracing::debug;

/// Default dump directory for raw lowered programs; the optimizer picks
/// them up from here.
const RAW_TAC_DIR: &str = "opt/tmp/raw";

#[derive(ClapParser)]
#[command(name = "rrvm")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "RRVM - execute .rr programs or lower them to TAC", long_about = None)]
struct Cli {
    /// Input .rr source file, or '-' for standard input
    #[arg(required_unless_present = "completions")]
    input: Option<PathBuf>,

    /// Lower to TAC and dump the clause form instead of executing
    #[arg(long)]
    tac: bool,

    /// Override the TAC dump path (default: opt/tmp/raw/<basename>.pl)
    #[arg(long, value_name = "PATH", requires = "tac")]
    out: Option<PathBuf>,

    /// Disassemble the parsed bytecode to stdout instead of executing
    #[arg(long)]
    dump_bytecode: bool,

    /// Runtime configuration file (TOML)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Generate shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "rrvm", &mut io::stdout());
        return;
    }

    let input = cli.input.expect("clap enforces the input argument");
    let source = read_source(&input);
    let config = load_config(cli.config.as_deref());

    let mut vm = match rrc::assemble_with_config(&source, config) {
        Ok(vm) => vm,
        Err(e) => {
            eprintln!("{}: {}", display_name(&input), e);
            process::exit(1);
        }
    };
    debug!(words = vm.code.len(), "assembled");

    if cli.dump_bytecode {
        print!("{}", rr_core::disasm(&vm.code));
        return;
    }

    if cli.tac {
        let tac = rrc::lower(&mut vm);
        let text = rrc::serialize(&tac);
        let out_path = cli
            .out
            .unwrap_or_else(|| default_dump_path(&input));
        if let Some(dir) = out_path.parent()
            && !dir.as_os_str().is_empty()
            && let Err(e) = fs::create_dir_all(dir)
        {
            eprintln!("Error creating {}: {}", dir.display(), e);
            process::exit(1);
        }
        if let Err(e) = fs::write(&out_path, &text) {
            eprintln!("Error writing {}: {}", out_path.display(), e);
            process::exit(1);
        }
        println!(
            "Lowered {} -> {}",
            display_name(&input),
            out_path.display()
        );
        return;
    }

    let mut interp = rr_runtime::Interp::new();
    rr_runtime::run(&mut vm, &mut interp);
}

fn read_source(input: &Path) -> String {
    if input.as_os_str() == "-" {
        let mut source = String::new();
        if let Err(e) = io::stdin().read_to_string(&mut source) {
            eprintln!("Error reading standard input: {}", e);
            process::exit(1);
        }
        return source;
    }
    match fs::read_to_string(input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading {}: {}", input.display(), e);
            process::exit(1);
        }
    }
}

fn load_config(path: Option<&Path>) -> RunConfig {
    let Some(path) = path else {
        return RunConfig::default();
    };
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error reading {}: {}", path.display(), e);
            process::exit(2);
        }
    };
    match RunConfig::from_toml(&content) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            process::exit(2);
        }
    }
}

/// `opt/tmp/raw/<basename>.pl`, with `stdin` standing in for `-`.
fn default_dump_path(input: &Path) -> PathBuf {
    let stem = if input.as_os_str() == "-" {
        "stdin".into()
    } else {
        input.file_stem().unwrap_or_default().to_os_string()
    };
    Path::new(RAW_TAC_DIR).join(stem).with_extension("pl")
}

fn display_name(input: &Path) -> String {
    if input.as_os_str() == "-" {
        "<stdin>".to_string()
    } else {
        input.display().to_string()
    }
}
