use std::env;
use std::fs::File;
use std::str::FromStr;

use dotenv::dotenv;
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, SharedLogger, TermLogger, TerminalMode, WriteLogger};

pub mod memory;

type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Env {
    Local,
    Dev,
    Stage,
    Production,
}

impl FromStr for Env {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(Self::Local),
            "dev" => Ok(Self::Dev),
            "stg" => Ok(Self::Stage),
            "prod" => Ok(Self::Production),
            _ => Err(Error::InvalidEnv(s.to_owned())),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub env: Env,
    pub log_level: LevelFilter,
    pub log_file: Option<String>,

    pub memory: memory::Config,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            env: Env::Local,
            log_level: LevelFilter::Info,
            log_file: None,
            memory: memory::Config::default(),
        }
    }
}

impl Config {
    /// Reads the process environment, after loading `.env` if present.
    pub fn env() -> Result<Self> {
        dotenv().ok();

        let env = match env::var("ENV") {
            Ok(env) => env.parse()?,
            Err(_) => Env::Local,
        };

        let log_level = parse_log_level(env::var("RUST_LOG").ok())?;

        // local runs log to the terminal only unless asked otherwise
        let log_file = match env::var("SERVICE_NAME") {
            Ok(name) => Some(format!("{name}.log")),
            Err(_) if env == Env::Local => None,
            Err(_) => Some("service.log".to_owned()),
        };

        Ok(Self {
            env,
            log_level,
            log_file,
            memory: memory::Config::env()?,
        })
    }
}

fn parse_log_level(value: Option<String>) -> Result<LevelFilter> {
    let Some(value) = value else {
        return Ok(LevelFilter::Info);
    };

    LevelFilter::from_str(&value).map_err(|_| Error::InvalidVar {
        name: "RUST_LOG",
        value,
    })
}

pub fn init_logger(config: &Config) -> Result<()> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        config.log_level,
        simplelog::Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    if let Some(path) = &config.log_file {
        loggers.push(WriteLogger::new(
            config.log_level,
            simplelog::Config::default(),
            File::create(path)?,
        ));
    }

    CombinedLogger::init(loggers)?;
    Ok(())
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid environment: {0}")]
    InvalidEnv(String),
    #[error("invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },

    #[error(transparent)]
    _Io(#[from] std::io::Error),
    #[error(transparent)]
    _Logger(#[from] log::SetLoggerError),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_parse_env() {
        assert_eq!("local".parse::<Env>().unwrap(), Env::Local);
        assert_eq!("dev".parse::<Env>().unwrap(), Env::Dev);
        assert_eq!("stg".parse::<Env>().unwrap(), Env::Stage);
        assert_eq!("prod".parse::<Env>().unwrap(), Env::Production);
    }

    #[test]
    fn should_reject_unknown_env() {
        let err = "staging".parse::<Env>().unwrap_err();

        assert!(matches!(err, Error::InvalidEnv(ref env) if env == "staging"));
    }

    #[test]
    fn should_parse_log_level() {
        assert_eq!(parse_log_level(None).unwrap(), LevelFilter::Info);
        assert_eq!(parse_log_level(Some("debug".into())).unwrap(), LevelFilter::Debug);
        assert_eq!(parse_log_level(Some("WARN".into())).unwrap(), LevelFilter::Warn);
    }

    #[test]
    fn should_reject_unknown_log_level() {
        let err = parse_log_level(Some("verbose".into())).unwrap_err();

        assert!(matches!(
            err,
            Error::InvalidVar { name: "RUST_LOG", ref value } if value == "verbose"
        ));
    }

    #[test]
    fn default_config_should_log_to_terminal_only() {
        let config = Config::default();

        assert_eq!(config.env, Env::Local);
        assert_eq!(config.log_level, LevelFilter::Info);
        assert!(config.log_file.is_none());
    }
}
