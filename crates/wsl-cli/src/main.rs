fn main() {
    wsl_cli::init_logging();
    std::process::exit(wsl_cli::run_cli_from_args(std::env::args_os()));
}
