//! Startup configuration.
//!
//! Settings come from command-line flags, then `NDTOOLS_*` environment
//! variables, then defaults. The environment is passed in as a lookup
//! function so parsing never touches process state.

use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

use crate::content::{ContentProvider, DirectoryContent, EmbeddedContent, LayeredContent};
use crate::nexus;
use crate::wire::DEFAULT_MAX_FRAME_BYTES;

pub const ENV_CONTENT_DIR: &str = "NDTOOLS_CONTENT_DIR";
pub const ENV_MAX_FRAME_BYTES: &str = "NDTOOLS_MAX_FRAME_BYTES";
pub const ENV_SERVER_NAME: &str = "NDTOOLS_SERVER_NAME";

/// Invalid flags, environment or content directory. Always a startup failure.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown option {0}")]
    UnknownOption(String),
    #[error("option {0} requires a value")]
    MissingValue(String),
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidNumber { name: String, value: String },
    #[error("{name} must not be empty")]
    Empty { name: String },
    #[error("unexpected argument '{0}'")]
    UnexpectedArgument(String),
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("call requires a tool name")]
    MissingTool,
    #[error("tool arguments must be a JSON object: {0}")]
    InvalidArguments(String),
    #[error("content directory {0} does not exist or is not a directory")]
    ContentDir(PathBuf),
}

/// Settings resolved from flags, then environment, then defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Files here take precedence over the embedded content.
    pub content_dir: Option<PathBuf>,
    /// Longest accepted input line, in bytes.
    pub max_frame_bytes: usize,
    /// Name reported by `initialize`.
    pub server_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            content_dir: None,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            server_name: nexus::SERVER_NAME.to_string(),
        }
    }
}

impl Config {
    /// Embedded content, overlaid by the content directory when one is set.
    pub fn content_provider(&self) -> Result<Arc<dyn ContentProvider>, ConfigError> {
        match &self.content_dir {
            None => Ok(Arc::new(EmbeddedContent)),
            Some(dir) if dir.is_dir() => Ok(Arc::new(LayeredContent::new(vec![
                Box::new(DirectoryContent::new(dir.clone())),
                Box::new(EmbeddedContent),
            ]))),
            Some(dir) => Err(ConfigError::ContentDir(dir.clone())),
        }
    }
}

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Serve MCP on stdio. The default.
    Serve,
    /// Print the tool catalog.
    List,
    /// Run one tool in-process.
    Call {
        tool: String,
        arguments: Map<String, Value>,
    },
    Help,
}

/// A parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Launch {
    pub command: Command,
    pub config: Config,
}

fn parse_limit(name: &str, value: &str) -> Result<usize, ConfigError> {
    match value.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidNumber {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn non_empty(name: &str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Empty {
            name: name.to_string(),
        });
    }
    Ok(value)
}

impl Launch {
    /// Parses arguments (without the program name).
    pub fn parse<I, E>(args: I, env: E) -> Result<Launch, ConfigError>
    where
        I: IntoIterator<Item = String>,
        E: Fn(&str) -> Option<String>,
    {
        let mut content_dir = None;
        let mut max_frame_bytes = None;
        let mut server_name = None;
        let mut positional = Vec::new();

        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
                _ => (arg.clone(), None),
            };
            let mut value = |flag: &str| {
                inline
                    .clone()
                    .or_else(|| args.next())
                    .ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
            };
            match flag.as_str() {
                "-h" | "--help" => {
                    return Ok(Launch {
                        command: Command::Help,
                        config: Config::default(),
                    });
                }
                "--content-dir" => content_dir = Some(PathBuf::from(value(&flag)?)),
                "--max-frame-bytes" => {
                    max_frame_bytes = Some(parse_limit(&flag, &value(&flag)?)?);
                }
                "--server-name" => server_name = Some(non_empty(&flag, value(&flag)?)?),
                other if other.starts_with('-') && other.len() > 1 => {
                    return Err(ConfigError::UnknownOption(other.to_string()));
                }
                _ => positional.push(arg),
            }
        }

        let mut config = Config::default();
        config.content_dir = match content_dir {
            Some(dir) => Some(dir),
            None => env(ENV_CONTENT_DIR)
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
        };
        config.max_frame_bytes = match max_frame_bytes {
            Some(n) => n,
            None => match env(ENV_MAX_FRAME_BYTES) {
                Some(raw) => parse_limit(ENV_MAX_FRAME_BYTES, &raw)?,
                None => config.max_frame_bytes,
            },
        };
        config.server_name = match server_name {
            Some(name) => name,
            None => match env(ENV_SERVER_NAME) {
                Some(raw) => non_empty(ENV_SERVER_NAME, raw)?,
                None => config.server_name,
            },
        };

        let mut positional = positional.into_iter();
        let command = match positional.next().as_deref() {
            None | Some("serve") => Command::Serve,
            Some("list") => Command::List,
            Some("help") => Command::Help,
            Some("call") => {
                let tool = positional.next().ok_or(ConfigError::MissingTool)?;
                let arguments = match positional.next() {
                    None => Map::new(),
                    Some(raw) => match serde_json::from_str::<Value>(&raw) {
                        Ok(Value::Object(map)) => map,
                        Ok(_) => {
                            return Err(ConfigError::InvalidArguments(
                                "expected an object".to_string(),
                            ));
                        }
                        Err(e) => return Err(ConfigError::InvalidArguments(e.to_string())),
                    },
                };
                Command::Call { tool, arguments }
            }
            Some(other) => return Err(ConfigError::UnknownCommand(other.to_string())),
        };
        if let Some(extra) = positional.next() {
            return Err(ConfigError::UnexpectedArgument(extra));
        }
        Ok(Launch { command, config })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn parse(args: &[&str], env: &[(&str, &str)]) -> Result<Launch, ConfigError> {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Launch::parse(args.iter().map(|a| a.to_string()), |key| env.get(key).cloned())
    }

    #[test]
    fn defaults_serve() {
        let launch = parse(&[], &[]).unwrap();
        assert_eq!(launch.command, Command::Serve);
        assert_eq!(launch.config, Config::default());
        assert_eq!(launch.config.server_name, "NexusDashboardDeveloperTools");
    }

    #[test]
    fn flags_override_environment() {
        let launch = parse(
            &["serve", "--max-frame-bytes", "1024", "--server-name=nd"],
            &[(ENV_MAX_FRAME_BYTES, "99"), (ENV_CONTENT_DIR, "/srv/nd")],
        )
        .unwrap();
        assert_eq!(launch.config.max_frame_bytes, 1024);
        assert_eq!(launch.config.server_name, "nd");
        assert_eq!(launch.config.content_dir, Some(PathBuf::from("/srv/nd")));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            parse(&["--max-frame-bytes", "lots"], &[]).unwrap_err(),
            ConfigError::InvalidNumber { .. }
        ));
        assert!(matches!(
            parse(&[], &[(ENV_MAX_FRAME_BYTES, "0")]).unwrap_err(),
            ConfigError::InvalidNumber { .. }
        ));
        assert_eq!(
            parse(&["--content-dir"], &[]).unwrap_err(),
            ConfigError::MissingValue("--content-dir".to_string())
        );
        assert_eq!(
            parse(&["--verbose"], &[]).unwrap_err(),
            ConfigError::UnknownOption("--verbose".to_string())
        );
        assert_eq!(
            parse(&["launch"], &[]).unwrap_err(),
            ConfigError::UnknownCommand("launch".to_string())
        );
    }

    #[test]
    fn call_takes_tool_and_json_arguments() {
        let launch = parse(&["call", "vrf_attachments_query", r#"{"limit":1}"#], &[]).unwrap();
        assert_eq!(
            launch.command,
            Command::Call {
                tool: "vrf_attachments_query".to_string(),
                arguments: json!({ "limit": 1 }).as_object().cloned().unwrap(),
            }
        );
        assert_eq!(parse(&["call"], &[]).unwrap_err(), ConfigError::MissingTool);
        assert!(matches!(
            parse(&["call", "x", "[1]"], &[]).unwrap_err(),
            ConfigError::InvalidArguments(_)
        ));
    }

    #[test]
    fn help_forms() {
        assert_eq!(parse(&["help"], &[]).unwrap().command, Command::Help);
        assert_eq!(parse(&["-h"], &[]).unwrap().command, Command::Help);
        assert_eq!(parse(&["list", "--help"], &[]).unwrap().command, Command::Help);
    }

    #[test]
    fn missing_content_dir_is_a_config_error() {
        let config = Config {
            content_dir: Some(PathBuf::from("/definitely/not/here")),
            ..Config::default()
        };
        assert!(matches!(
            config.content_provider().err(),
            Some(ConfigError::ContentDir(_))
        ));
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            content_dir: Some(dir.path().to_path_buf()),
            ..Config::default()
        };
        let provider = config.content_provider().unwrap();
        assert!(provider.get("payloads/v3/vrf.json").is_ok());
    }
}
