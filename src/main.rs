use std::process::ExitCode;

use pxpl::cli::{self, AppError};

fn main() -> ExitCode
{
    match cli::run()
    {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::Arguments(err)) =>
        {
            // clap formats its own usage errors
            let _ = err.print();
            ExitCode::from(cli::EXIT_ARGUMENTS)
        },
        Err(err) =>
        {
            eprintln!("Error: {err}");
            ExitCode::from(err.exit_code())
        },
    }
}
