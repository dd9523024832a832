//! 应用配置
//!
//! 查找顺序：命令行 `--config`，环境变量 `ZSEQ_CONFIG`，`./config/default.toml`，
//! 最后是内置默认值。

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::Level;
use zseq_core::diagram::DiagramConfig;

/// 配置根结构
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub editor: DiagramConfig,
}

impl AppConfig {
    /// 从显式路径加载
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 按查找顺序加载；默认文件缺失时返回默认配置
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = env::var_os("ZSEQ_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "Failed to resolve current directory".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }

    /// 解析日志等级，`verbose` 每多一级提高一档
    pub fn max_level(&self, verbose: u8) -> Result<Level, ConfigError> {
        let configured: Level = self
            .level
            .parse()
            .map_err(|_| ConfigError::InvalidLevel(self.level.clone()))?;
        let boosted = match verbose {
            0 => configured,
            1 => configured.max(Level::DEBUG),
            _ => Level::TRACE,
        };
        Ok(boosted)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid log level: {0}")]
    InvalidLevel(String),
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.editor.history_depth, 100);
        assert_eq!(cfg.editor.snap_threshold, 15.0);
        assert_eq!(cfg.editor.canvas_height, 800.0);
    }

    #[test]
    fn test_load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [editor]
            canvas_height = 1000.0
            history_depth = 20
            "#
        )
        .unwrap();

        let cfg = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.editor.canvas_height, 1000.0);
        assert_eq!(cfg.editor.history_depth, 20);
        assert_eq!(cfg.editor.snap_threshold, 15.0);
        assert!(cfg.editor.snapping);
    }

    #[test]
    fn test_parse_error_names_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[editor]\nhistory_depth = \"many\"").unwrap();
        assert!(matches!(
            AppConfig::from_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_verbose_raises_level() {
        let logging = LoggingConfig::default();
        assert_eq!(logging.max_level(0).unwrap(), Level::INFO);
        assert_eq!(logging.max_level(1).unwrap(), Level::DEBUG);
        assert_eq!(logging.max_level(3).unwrap(), Level::TRACE);

        let bad = LoggingConfig {
            level: "loud".to_string(),
        };
        assert!(matches!(bad.max_level(0), Err(ConfigError::InvalidLevel(_))));
    }
}
