use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "wsl")]
#[command(about = "Run WSL game scripts against a console game stream")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    /// Run a script, reading game output from stdin. Once stdin ends,
    /// scripts blocked on game output without a timeout are stopped.
    Run(RunArgs),
    /// Parse scripts and report labels, commands and warnings.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub(crate) struct RunArgs {
    /// JSON file holding global variables across runs.
    #[arg(long = "globals")]
    pub(crate) globals: Option<String>,
    #[arg(long = "config")]
    pub(crate) config: Option<String>,
    #[arg(long = "prefix")]
    pub(crate) prefix: Option<String>,
    #[arg(long = "debug")]
    pub(crate) debug: bool,
    #[arg(long = "seed")]
    pub(crate) seed: Option<u32>,
    pub(crate) script: String,
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub(crate) args: Vec<String>,
}

#[derive(Debug, Args)]
pub(crate) struct CheckArgs {
    pub(crate) path: String,
}
