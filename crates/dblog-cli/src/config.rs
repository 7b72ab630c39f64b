use crate::cli::ConnectArgs;
use dblog::LogSettings;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = "dblog.toml";

/// Contents of `dblog.toml`.
///
/// ```toml
/// [database]
/// url = "postgres://${PGUSER}@localhost/app"
///
/// [log]
/// cursors = false
/// prefix = "sql"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    #[serde(default)]
    pub log: LogSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

impl ConfigFile {
    /// Load the explicit config, or `dblog.toml` when it exists, or defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG);
                if !default.exists() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let raw = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
        let mut file = Self::parse(&raw)
            .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e:#}", path.display()))?;
        file.expand_env()?;
        tracing::debug!(target: "dblog", path = %path.display(), "loaded config");
        Ok(file)
    }

    fn parse(raw: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    fn expand_env(&mut self) -> anyhow::Result<()> {
        if let Some(db) = self.database.as_mut() {
            db.url = expand_env_vars(&db.url)?;
        }
        self.log.prefix = expand_env_vars(&self.log.prefix)?;
        Ok(())
    }

    /// `--database`, then `[database] url`, then `DATABASE_URL` (a `.env`
    /// file is honored).
    pub fn database_url(&self, args: &ConnectArgs) -> anyhow::Result<String> {
        if let Some(url) = &args.database {
            return Ok(url.clone());
        }
        if let Some(db) = &self.database {
            return Ok(db.url.clone());
        }
        dotenvy::dotenv().ok();
        std::env::var("DATABASE_URL").map_err(|_| {
            anyhow::anyhow!("no database configured: pass --database, set [database] url, or set DATABASE_URL")
        })
    }
}

fn expand_env_vars(input: &str) -> anyhow::Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                anyhow::bail!("unterminated env var reference: ${{{key}}}");
            }
            if key.is_empty() {
                anyhow::bail!("invalid env var reference: ${{}}");
            }

            let v = std::env::var(&key)
                .map_err(|_| anyhow::anyhow!("missing env var for config expansion: {key}"))?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}
