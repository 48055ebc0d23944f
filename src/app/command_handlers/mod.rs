use crate::app::cli::{help_text, parse_cli_verb, CliVerb};
use crate::config::RuntimeEnv;

pub mod hook;
pub mod inspect;
pub mod state;

pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    run_cli_with_env(args, &RuntimeEnv::from_process())
}

pub fn run_cli_with_env(args: Vec<String>, env: &RuntimeEnv) -> Result<String, String> {
    if args.is_empty() {
        return Ok(help_text());
    }

    match parse_cli_verb(args[0].as_str()) {
        CliVerb::Hook => Err("`hook <event>` reads its payload from stdin; invoke it through the saneprocess binary".to_string()),
        CliVerb::Status => state::cmd_status(env),
        CliVerb::ResetBreaker => state::cmd_reset_breaker(env),
        CliVerb::ResetSession => state::cmd_reset_session(env),
        CliVerb::Require => state::cmd_require(&args[1..], env),
        CliVerb::Classify => inspect::cmd_classify(&args[1..]),
        CliVerb::CheckPath => inspect::cmd_check_path(&args[1..], env),
        CliVerb::CheckCommand => inspect::cmd_check_command(&args[1..], env),
        CliVerb::Help => Ok(help_text()),
        CliVerb::Unknown => Err(format!("unknown command `{}`", args[0])),
    }
}
