//! Ordo server binary.

use std::process::ExitCode;

use tracing::error;
use tracing_subscriber::EnvFilter;

use ordo::{DEFAULT_PORT, VERSION};

struct Cli {
    bind: String,
    port: u16,
    help: bool,
    version: bool,
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut cli = Cli {
        bind: "0.0.0.0".to_string(),
        port: DEFAULT_PORT,
        help: false,
        version: false,
    };
    let mut it = args.iter().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--bind" | "-b" => {
                cli.bind = it
                    .next()
                    .ok_or_else(|| "--bind requires an address".to_string())?
                    .clone();
            }
            "--port" | "-p" => {
                let raw = it.next().ok_or_else(|| "--port requires a number".to_string())?;
                cli.port = raw
                    .parse()
                    .map_err(|_| format!("invalid port: {raw}"))?;
            }
            "--help" | "-h" => cli.help = true,
            "--version" | "-V" => cli.version = true,
            other => return Err(format!("unknown argument: {other}")),
        }
    }
    Ok(cli)
}

fn print_help() {
    println!(
        "ordo {VERSION} - in-memory key-value server\n\
         \n\
         USAGE:\n\
         \x20   ordo [--bind <addr>] [--port <port>]\n\
         \n\
         OPTIONS:\n\
         \x20   -b, --bind <addr>    Listen address [default: 0.0.0.0]\n\
         \x20   -p, --port <port>    Listen port [default: {DEFAULT_PORT}]\n\
         \x20   -h, --help           Print help\n\
         \x20   -V, --version        Print version"
    );
}

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(msg) => {
            eprintln!("error: {msg}");
            return ExitCode::FAILURE;
        }
    };
    if cli.help {
        print_help();
        return ExitCode::SUCCESS;
    }
    if cli.version {
        println!("ordo {VERSION}");
        return ExitCode::SUCCESS;
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = ordo::serve(&cli.bind, cli.port) {
        error!(error = %e, "server exited");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
