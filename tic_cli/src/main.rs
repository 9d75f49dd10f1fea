use std::{
    env::current_dir,
    fs::{write, File},
    path::PathBuf,
    process::exit,
};

use anyhow::{Context, Result};
use clap::Parser;
use tic_core::{converter, ical::generator::Emitter};

static OUTPUT_FILE_NAME: &str = "timetable.ics";

#[derive(Debug, Parser)]
pub struct Arguments {
    /// the timetable CSV file
    pub csv_file: PathBuf,
}

/// Get the exit code for a failed argument parse.
///
/// Wrong usage exits with 1, help and version output exit with 0.
fn usage_exit_code(error: &clap::Error) -> i32 {
    if error.use_stderr() {
        1
    } else {
        0
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = match Arguments::try_parse() {
        Ok(args) => args,
        Err(error) => {
            let code = usage_exit_code(&error);
            error.print()?;
            exit(code);
        }
    };
    let file = File::open(&args.csv_file)
        .with_context(|| format!("cannot open `{}`", args.csv_file.display()))?;
    let calendar = converter::convert(file)?;
    log::info!("converted `{}`", args.csv_file.display());
    let mut path = current_dir()?;
    path.push(OUTPUT_FILE_NAME);
    write(&path, calendar.generate())?;
    println!("calendar written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use crate::{usage_exit_code, Arguments};

    /// Test that a wrong argument count exits with code 1 while help exits
    /// with code 0.
    #[test]
    fn test_usage_exit_code() {
        let error = Arguments::try_parse_from(["tic_cli"]).unwrap_err();
        assert_eq!(usage_exit_code(&error), 1);
        let error = Arguments::try_parse_from(["tic_cli", "a.csv", "b.csv"]).unwrap_err();
        assert_eq!(usage_exit_code(&error), 1);
        let error = Arguments::try_parse_from(["tic_cli", "--help"]).unwrap_err();
        assert_eq!(usage_exit_code(&error), 0);
    }
}
