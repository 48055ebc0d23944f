use crate::config::{load_settings, HookPaths, RuntimeEnv, Settings};
use crate::hooks::HookContext;

pub fn open_context(env: &RuntimeEnv) -> Result<HookContext, String> {
    HookContext::prepare(env.clone(), None).map_err(|e| e.to_string())
}

pub fn load_inspection_settings(env: &RuntimeEnv) -> Result<Settings, String> {
    let paths = HookPaths::resolve(env, None).map_err(|e| e.to_string())?;
    load_settings(&paths).map_err(|e| e.to_string())
}

pub fn required_arg<'a>(args: &'a [String], usage: &str) -> Result<&'a str, String> {
    match args.first() {
        Some(value) if !value.trim().is_empty() => Ok(value.as_str()),
        _ => Err(format!("usage: {usage}")),
    }
}

pub fn joined_args(args: &[String], usage: &str) -> Result<String, String> {
    let joined = args.join(" ");
    if joined.trim().is_empty() {
        return Err(format!("usage: {usage}"));
    }
    Ok(joined)
}
