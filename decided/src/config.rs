use anyhow::{anyhow, bail, Context};
use decide::AuthorityRef;
use std::env::var;
use std::time::Duration;

pub struct Config {
    pub db_path: String,
    pub users_path: Option<String>,
    pub authority_url: String,
    pub authority_name: String,
    pub authority_token: Option<String>,
    pub authority_timeout: Duration,
    pub log_level: String,
    pub log_json: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Config::from_lookup(|key| var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let db_path = lookup("DECIDE_DB_PATH").unwrap_or_else(|| "./decide.sqlite.db".to_owned());
        let users_path = lookup("DECIDE_USERS_PATH").filter(|p| !p.is_empty());

        let authority_url =
            lookup("DECIDE_AUTHORITY_URL").unwrap_or_else(|| "http://localhost:8000".to_owned());
        let authority_name = lookup("DECIDE_AUTHORITY_NAME").unwrap_or_else(|| "decide".to_owned());
        let authority_token = lookup("DECIDE_AUTHORITY_TOKEN").filter(|t| !t.is_empty());

        let authority_timeout = match lookup("DECIDE_AUTHORITY_TIMEOUT_SECS") {
            Some(secs) => {
                let secs: u64 = secs
                    .trim()
                    .parse()
                    .with_context(|| format!("DECIDE_AUTHORITY_TIMEOUT_SECS: invalid value {:?}", secs))?;
                if secs == 0 {
                    bail!("DECIDE_AUTHORITY_TIMEOUT_SECS must be at least 1");
                }
                Duration::from_secs(secs)
            }
            None => decide::DEFAULT_AUTHORITY_TIMEOUT,
        };

        let log_level = lookup("DECIDE_LOG").unwrap_or_else(|| "info".to_owned());
        let log_json = match lookup("DECIDE_LOG_JSON") {
            Some(val) => parse_flag(&val)
                .ok_or_else(|| anyhow!("DECIDE_LOG_JSON: expected true or false, got {:?}", val))?,
            None => false,
        };

        Ok(Config {
            db_path,
            users_path,
            authority_url,
            authority_name,
            authority_token,
            authority_timeout,
            log_level,
            log_json,
        })
    }

    /// The authority attached to votings created without one
    pub fn default_authority(&self) -> AuthorityRef {
        AuthorityRef {
            name: self.authority_name.clone(),
            url: self.authority_url.clone(),
            me: true,
        }
    }
}

fn parse_flag(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
