use crate::errors::MockError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub type EnvMap = BTreeMap<String, String>;

pub const DEFAULT_ROUNDS: usize = 65;
pub const ENV_ROUNDS: &str = "MIMIC_ROUNDS";
pub const ENV_ANSWER_PRIORITY: &str = "MIMIC_ANSWER_PRIORITY";
pub const ENV_LOG_PATH: &str = "MIMIC_LOG_PATH";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MockConfig {
    pub recording: RecordingConfig,
    pub answers: AnswersConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordingConfig {
    /// Executions per stub/verify block, i.e. R + 1.
    pub rounds: usize,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnswersConfig {
    pub priority: AnswerPriority,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    pub path: Option<PathBuf>,
    pub max_payload_bytes: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnswerPriority {
    #[default]
    FirstRegistered,
    MostRecent,
}

impl AnswerPriority {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "first_registered" => Some(Self::FirstRegistered),
            "most_recent" => Some(Self::MostRecent),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::FirstRegistered => "first_registered",
            Self::MostRecent => "most_recent",
        }
    }
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            recording: RecordingConfig {
                rounds: DEFAULT_ROUNDS,
                seed: None,
            },
            answers: AnswersConfig {
                priority: AnswerPriority::FirstRegistered,
            },
            logging: LoggingConfig {
                path: None,
                max_payload_bytes: 4096,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialMockConfig {
    recording: Option<PartialRecordingConfig>,
    answers: Option<PartialAnswersConfig>,
    logging: Option<PartialLoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialRecordingConfig {
    rounds: Option<usize>,
    seed: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialAnswersConfig {
    priority: Option<AnswerPriority>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialLoggingConfig {
    path: Option<PathBuf>,
    max_payload_bytes: Option<usize>,
}

/// Defaults, then the TOML file at `path`, then environment overrides.
pub fn load_config(path: Option<&Path>, env: &EnvMap) -> Result<MockConfig, MockError> {
    let mut cfg = MockConfig::default();

    if let Some(path) = path {
        let contents =
            std::fs::read_to_string(path).map_err(|e| MockError::Io(e.to_string()))?;
        merge_partial_config(&mut cfg, parse_partial(&contents)?);
    }

    apply_env_overrides(&mut cfg, env)?;
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn parse_config(contents: &str) -> Result<MockConfig, MockError> {
    let mut cfg = MockConfig::default();
    merge_partial_config(&mut cfg, parse_partial(contents)?);
    validate_config(&cfg)?;
    Ok(cfg)
}

pub fn process_env() -> EnvMap {
    std::env::vars().collect()
}

fn parse_partial(contents: &str) -> Result<PartialMockConfig, MockError> {
    toml::from_str(contents).map_err(|e| MockError::ConfigParse(e.to_string()))
}

fn merge_partial_config(cfg: &mut MockConfig, partial: PartialMockConfig) {
    if let Some(recording) = partial.recording {
        if let Some(rounds) = recording.rounds {
            cfg.recording.rounds = rounds;
        }
        if let Some(seed) = recording.seed {
            cfg.recording.seed = Some(seed);
        }
    }

    if let Some(answers) = partial.answers {
        if let Some(priority) = answers.priority {
            cfg.answers.priority = priority;
        }
    }

    if let Some(logging) = partial.logging {
        if let Some(path) = logging.path {
            cfg.logging.path = Some(path);
        }
        if let Some(value) = logging.max_payload_bytes {
            cfg.logging.max_payload_bytes = value;
        }
    }
}

fn apply_env_overrides(cfg: &mut MockConfig, env: &EnvMap) -> Result<(), MockError> {
    if let Some(raw) = env.get(ENV_ROUNDS) {
        cfg.recording.rounds = raw.trim().parse().map_err(|_| {
            MockError::InvalidConfig(format!("{ENV_ROUNDS} must be an integer, got {raw:?}"))
        })?;
    }
    if let Some(raw) = env.get(ENV_ANSWER_PRIORITY) {
        cfg.answers.priority = AnswerPriority::parse(raw.trim()).ok_or_else(|| {
            MockError::InvalidConfig(format!(
                "{ENV_ANSWER_PRIORITY} must be first_registered or most_recent, got {raw:?}"
            ))
        })?;
    }
    if let Some(raw) = env.get(ENV_LOG_PATH) {
        if !raw.trim().is_empty() {
            cfg.logging.path = Some(PathBuf::from(raw.trim()));
        }
    }
    Ok(())
}

fn validate_config(cfg: &MockConfig) -> Result<(), MockError> {
    if cfg.recording.rounds < 2 {
        return Err(MockError::InvalidConfig(
            "recording.rounds must be at least 2".to_string(),
        ));
    }

    if cfg.logging.max_payload_bytes < 16 {
        return Err(MockError::InvalidConfig(
            "logging.max_payload_bytes must be at least 16".to_string(),
        ));
    }

    Ok(())
}
