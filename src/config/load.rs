use super::{ConfigError, HookPaths, Settings};

pub fn load_settings(paths: &HookPaths) -> Result<Settings, ConfigError> {
    let path = paths.settings_file();
    if !path.exists() {
        return Ok(Settings::default());
    }
    let settings = Settings::from_path(&path)?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn missing_settings_file_yields_defaults() {
        let dir = tempdir().expect("tempdir");
        let paths = HookPaths::new(dir.path().join(".saneprocess"), dir.path().join("secret"));
        assert_eq!(load_settings(&paths).expect("load"), Settings::default());
    }

    #[test]
    fn invalid_settings_file_is_an_error() {
        let dir = tempdir().expect("tempdir");
        let paths = HookPaths::new(dir.path().join(".saneprocess"), dir.path().join("secret"));
        fs::create_dir_all(&paths.root).expect("mkdir");
        fs::write(paths.settings_file(), "breaker:\n  threshold: 1\n").expect("write");
        let err = load_settings(&paths).expect_err("threshold too low");
        assert!(matches!(err, ConfigError::Settings(_)));

        fs::write(paths.settings_file(), "breaker: [").expect("write");
        assert!(matches!(
            load_settings(&paths),
            Err(ConfigError::Parse { .. })
        ));
    }
}
