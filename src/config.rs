use std::fs::File;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::otp::DEFAULT_RESEND_COOLDOWN_SECS;
use crate::quiz::navigator::StepFlow;
use crate::quiz::steps;

/// Settings read from the environment (and `.env`). The bot token itself is
/// picked up by `Bot::from_env` from `TELOXIDE_TOKEN`.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub flags_path: PathBuf,
    pub quiz_file: Option<PathBuf>,
    pub otp_resend_secs: u64,
    pub tutor_delay: Duration,
    pub openai_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "db.sqlite".to_string(),
            flags_path: PathBuf::from("flags.json"),
            quiz_file: None,
            otp_resend_secs: DEFAULT_RESEND_COOLDOWN_SECS,
            tutor_delay: Duration::from_millis(800),
            openai_api_key: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            db_path: non_empty("STUDY_BOT_DB").unwrap_or(defaults.db_path),
            flags_path: non_empty("STUDY_BOT_FLAGS")
                .map(PathBuf::from)
                .unwrap_or(defaults.flags_path),
            quiz_file: non_empty("STUDY_BOT_QUIZ_FILE").map(PathBuf::from),
            otp_resend_secs: parse_or("OTP_RESEND_SECS", non_empty("OTP_RESEND_SECS"), defaults.otp_resend_secs)?,
            tutor_delay: Duration::from_millis(parse_or(
                "TUTOR_DELAY_MS",
                non_empty("TUTOR_DELAY_MS"),
                defaults.tutor_delay.as_millis() as u64,
            )?),
            openai_api_key: non_empty("OPENAI_API_KEY"),
        })
    }

    /// The quiz from `STUDY_BOT_QUIZ_FILE`, or the built-in one.
    pub fn load_quiz(&self) -> Result<StepFlow, ConfigError> {
        let Some(path) = &self.quiz_file else {
            return Ok(steps::default_quiz());
        };
        let file = File::open(path).map_err(|source| ConfigError::QuizFile {
            path: path.clone(),
            source,
        })?;
        steps::load_steps(file).map_err(|e| ConfigError::QuizDefinition {
            path: path.clone(),
            message: e.to_string(),
        })
    }
}

fn parse_or<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}
