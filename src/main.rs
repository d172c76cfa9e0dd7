use std::env;
use std::io::{self, Write};
use std::process::ExitCode;

use git_fat_rs::opts;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    let command = match opts::parse(&args) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("{}", message);
            eprintln!("{}", opts::USAGE);
            return ExitCode::FAILURE;
        }
    };

    let cwd = match env::current_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("git-fat: {}", err);
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    let stdout = io::stdout();
    let result = git_fat_rs::run(&cwd, command, stdin.lock(), stdout.lock());

    match result {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => exit_code(code),
        Err(err) => {
            let _ = io::stderr().flush();
            eprintln!("git-fat: {}", err);
            ExitCode::FAILURE
        }
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(code.clamp(0, 255) as u8)
}
