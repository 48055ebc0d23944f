use crate::app::command_support::required_arg;
use crate::config::RuntimeEnv;
use crate::hooks::{run_hook, HookEvent, HookResponse};

pub fn cmd_hook(args: &[String], stdin: &str, env: RuntimeEnv) -> Result<HookResponse, String> {
    let event = required_arg(args, "hook <session-start|prompt|pre-tool|post-tool|stop>")?;
    let event = HookEvent::parse(event).map_err(|e| e.to_string())?;
    Ok(run_hook(event, stdin, env))
}
