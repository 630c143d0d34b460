use std::ffi::OsString;
use std::path::Path;

use clap::Parser;
use wsl_core::ScriptError;

mod cli_args;
mod console_host;
mod error_map;
mod logging;
mod session;
mod source_loader;
mod state_store;

pub(crate) use cli_args::{CheckArgs, Cli, Mode, RunArgs};
pub(crate) use error_map::{
    emit_error, map_cli_config_invalid, map_cli_config_read, map_cli_io, map_cli_source_read,
    map_cli_source_scan, map_cli_state_invalid, map_cli_state_read, map_cli_state_write,
};
pub use logging::init_logging;
pub(crate) use source_loader::{collect_script_files, load_script, resolve_script_path};

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> Result<i32, ScriptError> {
    match cli.command {
        Mode::Run(args) => session::run_session(args),
        Mode::Check(args) => run_check(args),
    }
}

fn run_check(args: CheckArgs) -> Result<i32, ScriptError> {
    let scripts = collect_script_files(Path::new(&args.path))?
        .iter()
        .map(|path| load_script(path))
        .collect::<Result<Vec<_>, _>>()?;
    println!("RESULT:OK");
    for loaded in scripts {
        let path = loaded.path.display();
        println!(
            "SCRIPT:{}|labels={}|commands={}|warnings={}",
            path,
            loaded.program.labels.len(),
            loaded.program.executable_count(),
            loaded.program.warnings.len()
        );
        for warning in &loaded.program.warnings {
            println!(
                "WARNING:{}:{}:{}|{}",
                path,
                warning.line.unwrap_or(0),
                warning.code,
                serde_json::to_string(&warning.message).expect("string json")
            );
        }
    }
    Ok(0)
}
