use std::process::ExitCode;

use liblipsync::{
    cli::{self, Args},
    Logger,
};

fn main() -> ExitCode {
    let args: Args = argh::from_env();

    Logger::init(args.log_level());

    match cli::run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
