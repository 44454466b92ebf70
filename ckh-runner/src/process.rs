// Process environment assembly and executable resolution

use ckh_core::{CkhError, Invocation, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Environment a child would inherit from sourcing the virtualenv
/// activation script: `VIRTUAL_ENV` set, the venv `bin` first on PATH.
pub fn activated_env(venv_dir: &Path) -> Vec<(String, OsString)> {
    let bin = venv_dir.join("bin");

    let mut paths: Vec<PathBuf> = vec![bin.clone()];
    if let Some(current) = std::env::var_os("PATH") {
        // keep the venv bin unique on the final PATH
        paths.extend(std::env::split_paths(&current).filter(|p| *p != bin));
    }
    let path_value =
        std::env::join_paths(paths).unwrap_or_else(|_| bin.clone().into_os_string());

    vec![
        (
            "VIRTUAL_ENV".to_string(),
            venv_dir.as_os_str().to_os_string(),
        ),
        ("PATH".to_string(), path_value),
    ]
}

/// Resolve the invocation's program against its own PATH.
///
/// Programs given as paths are used as-is; bare names are looked up on the
/// PATH assembled for the child, so a `paster` inside the virtualenv wins
/// over one on the system PATH.
pub fn resolve_program(invocation: &Invocation) -> Result<PathBuf> {
    if invocation.program.contains(std::path::MAIN_SEPARATOR) {
        return Ok(PathBuf::from(&invocation.program));
    }

    let path_var = invocation
        .env
        .iter()
        .find(|(key, _)| key == "PATH")
        .map(|(_, value)| value.clone());
    let cwd = invocation
        .working_directory
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));

    which::which_in(&invocation.program, path_var, cwd)
        .map_err(|_| CkhError::ExecutableNotFound(invocation.program.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activated_env_sets_virtual_env() {
        let env = activated_env(Path::new("/usr/lib/ckan/default"));
        let virtual_env = env
            .iter()
            .find(|(key, _)| key == "VIRTUAL_ENV")
            .map(|(_, value)| value.clone())
            .unwrap();
        assert_eq!(virtual_env, OsString::from("/usr/lib/ckan/default"));
    }

    #[test]
    fn test_activated_env_prepends_venv_bin_once() {
        let venv = Path::new("/usr/lib/ckan/default");
        let env = activated_env(venv);
        let path_value = env
            .iter()
            .find(|(key, _)| key == "PATH")
            .map(|(_, value)| value.clone())
            .unwrap();

        let entries: Vec<PathBuf> = std::env::split_paths(&path_value).collect();
        assert_eq!(entries[0], venv.join("bin"));
        assert_eq!(
            entries.iter().filter(|p| **p == venv.join("bin")).count(),
            1
        );
    }

    #[test]
    fn test_resolve_program_keeps_explicit_path() {
        let invocation = Invocation {
            program: "/bin/sh".to_string(),
            args: vec![],
            env: vec![],
            working_directory: None,
        };
        assert_eq!(resolve_program(&invocation).unwrap(), PathBuf::from("/bin/sh"));
    }

    #[test]
    fn test_resolve_program_searches_invocation_path() {
        let invocation = Invocation {
            program: "sh".to_string(),
            args: vec![],
            env: activated_env(Path::new("/usr/lib/ckan/default")),
            working_directory: None,
        };
        assert!(resolve_program(&invocation).is_ok());
    }

    #[test]
    fn test_resolve_program_missing_is_an_error() {
        let invocation = Invocation {
            program: "ckh-no-such-program".to_string(),
            args: vec![],
            env: activated_env(Path::new("/usr/lib/ckan/default")),
            working_directory: None,
        };
        assert!(matches!(
            resolve_program(&invocation),
            Err(CkhError::ExecutableNotFound(_))
        ));
    }
}
