//! Loading run specifications from YAML

use std::fs;
use std::path::{Path, PathBuf};

use super::schema::RunSpec;
use super::validate::{validate_config, ValidationError};

/// Errors raised while loading a run specification
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config: {0}")]
    Invalid(#[from] ValidationError),
}

/// Parse a YAML file into a [`RunSpec`] without validating it
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<RunSpec, ConfigError> {
    let path = path.as_ref();
    let yaml = fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    Ok(serde_yaml::from_str(&yaml)?)
}

/// Parse and validate a YAML file
///
/// # Example
///
/// ```no_run
/// use corredor::config::load_and_validate;
///
/// let spec = load_and_validate("run.yaml")?;
/// println!("{} epochs over {} batches", spec.max_epoch, spec.batches.len());
/// # Ok::<(), corredor::config::ConfigError>(())
/// ```
pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<RunSpec, ConfigError> {
    let spec = load_config(path)?;
    validate_config(&spec)?;
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(yaml: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file should be created");
        file.write_all(yaml.as_bytes()).expect("write should succeed");
        file
    }

    #[test]
    fn test_load_valid_config() {
        let file = write_config("max_epoch: 4\nbatches: [3.0, 1.0]\ndecay: 0.5\n");
        let spec = load_and_validate(file.path()).unwrap();
        assert_eq!(spec.max_epoch, 4);
        assert_eq!(spec.batches, vec![3.0, 1.0]);
    }

    #[test]
    fn test_missing_file() {
        let err = load_config("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/definitely/not/here.yaml"));
    }

    #[test]
    fn test_malformed_yaml() {
        let file = write_config("max_epoch: [oops\n");
        assert!(matches!(load_config(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_invalid_values_fail_validation_only() {
        let file = write_config("max_epoch: 0\nbatches: [1.0]\n");
        assert!(load_config(file.path()).is_ok());
        let err = load_and_validate(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ValidationError::InvalidEpochs(0))));
    }
}
