use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::ConfigError;

/// Default location of the optional TOML config, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".pagesmith/config.toml";

/// How the build service turns a brief into files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorMode {
    /// Ask the generative model.
    Model,
    /// Emit a minimal page echoing the brief; no model call.
    Placeholder,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub evaluator_port: u16,
}

#[derive(Debug, Clone)]
pub struct GitHubSettings {
    pub api_url: String,
    pub user: String,
    pub token: Option<String>,
    /// Static-hosting domain suffix; pages live at `https://<user>.<pages_host>/<task>/`.
    pub pages_host: String,
    pub default_branch: String,
    pub request_timeout: Duration,
}

impl GitHubSettings {
    /// Conventional hosting URL for a task's repository.
    pub fn pages_url(&self, task: &str) -> String {
        format!("https://{}.{}/{}/", self.user, self.pages_host, task)
    }
}

#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub api_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub mode: GeneratorMode,
    /// Generation of a whole app can take a while; this bounds one call.
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct NotifySettings {
    /// Total attempts, not additional retries.
    pub max_retries: u32,
    pub initial_delay: Duration,
    /// Per attempt. A timed-out attempt counts as a failed one.
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct EvaluatorSettings {
    pub db_path: PathBuf,
    pub navigation_timeout: Duration,
    pub screenshot_dir: PathBuf,
    pub chrome_executable: Option<PathBuf>,
}

/// Runtime configuration shared by both services.
///
/// Built once at startup and handed to each component at construction time.
/// Precedence: defaults, then the TOML file, then environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub student_secret: Option<String>,
    pub server: ServerSettings,
    pub github: GitHubSettings,
    pub llm: LlmSettings,
    pub notify: NotifySettings,
    pub evaluator: EvaluatorSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            student_secret: None,
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8000,
                evaluator_port: 8001,
            },
            github: GitHubSettings {
                api_url: "https://api.github.com".to_string(),
                user: String::new(),
                token: None,
                pages_host: "github.io".to_string(),
                default_branch: "main".to_string(),
                request_timeout: Duration::from_secs(30),
            },
            llm: LlmSettings {
                api_url: "https://generativelanguage.googleapis.com".to_string(),
                model: "gemini-2.0-flash".to_string(),
                api_key: None,
                mode: GeneratorMode::Model,
                request_timeout: Duration::from_secs(60),
            },
            notify: NotifySettings {
                max_retries: 5,
                initial_delay: Duration::from_secs(1),
                request_timeout: Duration::from_secs(120),
            },
            evaluator: EvaluatorSettings {
                db_path: PathBuf::from(".pagesmith/evaluations.db"),
                navigation_timeout: Duration::from_secs(15),
                screenshot_dir: std::env::temp_dir().join("pagesmith-screenshots"),
                chrome_executable: None,
            },
        }
    }
}

/// Raw TOML structure for the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    server: Option<ServerSection>,
    github: Option<GitHubSection>,
    llm: Option<LlmSection>,
    notify: Option<NotifySection>,
    evaluator: Option<EvaluatorSection>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    host: Option<String>,
    port: Option<u16>,
    evaluator_port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct GitHubSection {
    api_url: Option<String>,
    user: Option<String>,
    pages_host: Option<String>,
    default_branch: Option<String>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LlmSection {
    api_url: Option<String>,
    model: Option<String>,
    mode: Option<GeneratorMode>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct NotifySection {
    max_retries: Option<u32>,
    initial_delay_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EvaluatorSection {
    db_path: Option<PathBuf>,
    navigation_timeout_secs: Option<u64>,
    screenshot_dir: Option<PathBuf>,
    chrome_executable: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from a TOML file (if present) and the process environment.
    ///
    /// An explicitly requested file must exist; the default location is optional.
    /// A `.env` file in the working directory is loaded before reading the environment.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_file(path)?
                } else {
                    Self::default()
                }
            }
        };
        let _ = dotenvy::dotenv();
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file on top of the defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let raw: ConfigToml = toml::from_str(content)?;
        let mut config = Self::default();

        if let Some(section) = raw.server {
            if let Some(host) = section.host {
                config.server.host = host;
            }
            if let Some(port) = section.port {
                config.server.port = port;
            }
            if let Some(port) = section.evaluator_port {
                config.server.evaluator_port = port;
            }
        }
        if let Some(section) = raw.github {
            if let Some(api_url) = section.api_url {
                config.github.api_url = api_url;
            }
            if let Some(user) = section.user {
                config.github.user = user;
            }
            if let Some(pages_host) = section.pages_host {
                config.github.pages_host = pages_host;
            }
            if let Some(branch) = section.default_branch {
                config.github.default_branch = branch;
            }
            if let Some(secs) = section.request_timeout_secs {
                config.github.request_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(section) = raw.llm {
            if let Some(api_url) = section.api_url {
                config.llm.api_url = api_url;
            }
            if let Some(model) = section.model {
                config.llm.model = model;
            }
            if let Some(mode) = section.mode {
                config.llm.mode = mode;
            }
            if let Some(secs) = section.request_timeout_secs {
                config.llm.request_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(section) = raw.notify {
            if let Some(max_retries) = section.max_retries {
                config.notify.max_retries = max_retries;
            }
            if let Some(secs) = section.initial_delay_secs {
                config.notify.initial_delay = Duration::from_secs(secs);
            }
            if let Some(secs) = section.request_timeout_secs {
                config.notify.request_timeout = Duration::from_secs(secs);
            }
        }
        if let Some(section) = raw.evaluator {
            if let Some(db_path) = section.db_path {
                config.evaluator.db_path = db_path;
            }
            if let Some(secs) = section.navigation_timeout_secs {
                config.evaluator.navigation_timeout = Duration::from_secs(secs);
            }
            if let Some(dir) = section.screenshot_dir {
                config.evaluator.screenshot_dir = dir;
            }
            if let Some(exe) = section.chrome_executable {
                config.evaluator.chrome_executable = Some(exe);
            }
        }

        Ok(config)
    }

    /// Overlay secrets and per-deployment values from environment variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(secret) = non_empty("STUDENT_SECRET") {
            self.student_secret = Some(secret);
        }
        if let Some(token) = non_empty("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(user) = non_empty("GITHUB_USER") {
            self.github.user = user;
        }
        if let Some(key) = non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY")) {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = non_empty("GEMINI_MODEL") {
            self.llm.model = model;
        }
        if let Some(path) = non_empty("PAGESMITH_DB_PATH") {
            self.evaluator.db_path = PathBuf::from(path);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.notify.max_retries == 0 {
            return Err(ConfigError::Invalid {
                key: "notify.max_retries",
                message: "must be at least 1".to_string(),
            });
        }
        let timeouts = [
            ("github.request_timeout_secs", self.github.request_timeout),
            ("llm.request_timeout_secs", self.llm.request_timeout),
            ("notify.request_timeout_secs", self.notify.request_timeout),
            ("evaluator.navigation_timeout_secs", self.evaluator.navigation_timeout),
        ];
        for (key, timeout) in timeouts {
            if timeout.is_zero() {
                return Err(ConfigError::Invalid {
                    key,
                    message: "must be positive".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Generator mode after accounting for a missing model key.
    pub fn effective_generator_mode(&self) -> GeneratorMode {
        match (self.llm.mode, &self.llm.api_key) {
            (GeneratorMode::Model, None) => GeneratorMode::Placeholder,
            (mode, _) => mode,
        }
    }
}
