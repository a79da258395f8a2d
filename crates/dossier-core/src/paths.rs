use std::env;
use std::path::PathBuf;

/// Environment variable that overrides the config directory.
pub const CONFIG_DIR_ENV: &str = "DOSSIER_CONFIG_DIR";

/// Return the user's home directory path.
///
/// Uses HOME on Unix-like systems and USERPROFILE on Windows.
pub fn get_home_dir() -> Result<String, String> {
    if let Ok(home) = env::var("HOME") {
        if !home.is_empty() {
            return Ok(home);
        }
    }

    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.is_empty() {
            return Ok(profile);
        }
    }

    Err("Home directory not set".to_string())
}

/// Resolve the config directory.
///
/// `DOSSIER_CONFIG_DIR` wins when set, otherwise `~/.config/dossier`.
pub fn default_config_dir() -> Result<PathBuf, String> {
    if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = get_home_dir()?;
    Ok(PathBuf::from(home).join(".config").join("dossier"))
}

#[cfg(test)]
mod tests {
    use super::{default_config_dir, get_home_dir, CONFIG_DIR_ENV};
    use std::path::PathBuf;
    use std::env;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<F: FnOnce()>(home: Option<&str>, userprofile: Option<&str>, f: F) {
        with_full_env(home, userprofile, None, f)
    }

    fn with_full_env<F: FnOnce()>(
        home: Option<&str>,
        userprofile: Option<&str>,
        config_dir: Option<&str>,
        f: F,
    ) {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner());
        let prev_home = env::var("HOME").ok();
        let prev_userprofile = env::var("USERPROFILE").ok();
        let prev_config_dir = env::var(CONFIG_DIR_ENV).ok();

        match home {
            Some(value) => env::set_var("HOME", value),
            None => env::remove_var("HOME"),
        }
        match userprofile {
            Some(value) => env::set_var("USERPROFILE", value),
            None => env::remove_var("USERPROFILE"),
        }
        match config_dir {
            Some(value) => env::set_var(CONFIG_DIR_ENV, value),
            None => env::remove_var(CONFIG_DIR_ENV),
        }

        f();

        match prev_home {
            Some(value) => env::set_var("HOME", value),
            None => env::remove_var("HOME"),
        }
        match prev_userprofile {
            Some(value) => env::set_var("USERPROFILE", value),
            None => env::remove_var("USERPROFILE"),
        }
        match prev_config_dir {
            Some(value) => env::set_var(CONFIG_DIR_ENV, value),
            None => env::remove_var(CONFIG_DIR_ENV),
        }
    }

    #[test]
    fn get_home_dir_prefers_home() {
        with_env(Some("/tmp/home"), Some("/tmp/profile"), || {
            let home = get_home_dir().expect("home dir");
            assert_eq!(home, "/tmp/home");
        });
    }

    #[test]
    fn get_home_dir_falls_back_to_userprofile() {
        with_env(None, Some("/tmp/profile"), || {
            let home = get_home_dir().expect("home dir");
            assert_eq!(home, "/tmp/profile");
        });
    }

    #[test]
    fn config_dir_defaults_under_home() {
        with_full_env(Some("/tmp/home"), None, None, || {
            assert_eq!(
                default_config_dir().unwrap(),
                PathBuf::from("/tmp/home/.config/dossier")
            );
        });
    }

    #[test]
    fn config_dir_env_overrides_home() {
        with_full_env(Some("/tmp/home"), None, Some("/srv/dossier"), || {
            assert_eq!(default_config_dir().unwrap(), PathBuf::from("/srv/dossier"));
        });
    }

    #[test]
    fn config_dir_errors_without_home() {
        with_full_env(None, None, None, || {
            assert!(default_config_dir().is_err());
        });
    }
}
