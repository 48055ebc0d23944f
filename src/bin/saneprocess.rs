use saneprocess::app::cli::{parse_cli_verb, CliVerb};
use saneprocess::app::command_handlers;
use saneprocess::config::RuntimeEnv;
use std::io::Read;

fn run_hook(args: &[String]) -> Result<i32, String> {
    let mut stdin = String::new();
    std::io::stdin()
        .read_to_string(&mut stdin)
        .map_err(|e| format!("failed to read hook payload from stdin: {e}"))?;
    let response = command_handlers::hook::cmd_hook(args, &stdin, RuntimeEnv::from_process())?;
    if let Some(stdout) = &response.stdout {
        println!("{stdout}");
    }
    if let Some(stderr) = &response.stderr {
        eprintln!("{stderr}");
    }
    Ok(response.exit_code)
}

fn run() -> Result<i32, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(|verb| parse_cli_verb(verb)) == Some(CliVerb::Hook) {
        return run_hook(&args[1..]);
    }
    let output = command_handlers::run_cli(args)?;
    println!("{output}");
    Ok(0)
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    }
}
