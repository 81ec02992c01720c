use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context as _, Result, anyhow};
use channel_core::{ChannelOptions, RoleConfig};
use serde::Deserialize;

/// Contents of the YAML file passed with `--config`.
///
/// ```yaml
/// channels: ["#general:example.org"]
/// prefixes: ["!", "@bot "]   # defaults to "!" and a mention of the bot
/// roles: [admins, mods]
/// role_levels: { admins: 100, mods: 50 }
/// store:
///   dir: ./channels
///   poll_interval_ms: 2000
/// ```
#[derive(Debug, Deserialize, Clone)]
pub(crate) struct BotConfig {
    pub(crate) channels: Vec<String>,
    #[serde(default)]
    pub(crate) prefixes: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) roles: RoleConfig,
    /// Minimum room power level that grants each role.
    #[serde(default)]
    pub(crate) role_levels: BTreeMap<String, i64>,
    #[serde(default)]
    pub(crate) store: StoreSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub(crate) struct StoreSettings {
    #[serde(default = "default_store_dir")]
    pub(crate) dir: PathBuf,
    #[serde(default = "default_poll_interval_ms")]
    pub(crate) poll_interval_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./channels")
}

const fn default_poll_interval_ms() -> u64 {
    2000
}

impl BotConfig {
    /// `bot_name` is what the built-in mention prefix addresses.
    pub(crate) fn channel_options(&self, name: &str, bot_name: &str) -> ChannelOptions {
        let options = ChannelOptions::new(name)
            .with_bot_name(bot_name)
            .with_roles(self.roles.clone());
        match &self.prefixes {
            Some(prefixes) => options.with_prefixes(prefixes.iter().cloned()),
            None => options,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.channels.is_empty() {
            return Err(anyhow!("config lists no channels to monitor"));
        }
        if self
            .prefixes
            .as_ref()
            .is_some_and(|prefixes| prefixes.iter().all(String::is_empty))
        {
            return Err(anyhow!("prefixes must name at least one token"));
        }
        if self.store.poll_interval_ms == 0 {
            return Err(anyhow!("store.poll_interval_ms must be greater than zero"));
        }
        for role in self.role_levels.keys() {
            if !self.roles.recognizes(role) {
                tracing::warn!(role = %role, "role_levels names a role missing from roles");
            }
        }
        Ok(())
    }
}

pub(crate) fn parse_config(yaml: &str) -> Result<BotConfig> {
    let cfg: BotConfig = serde_yaml::from_str(yaml).context("parsing YAML config")?;
    cfg.validate()?;
    Ok(cfg)
}

pub(crate) fn load_config(path: &Path) -> Result<BotConfig> {
    if !path.exists() {
        return Err(anyhow!(
            "config file not found at {}. Create one or set --config",
            path.display()
        ));
    }
    let yaml = fs::read_to_string(path)
        .with_context(|| format!("reading config file at {}", path.display()))?;
    parse_config(&yaml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use channel_core::PrefixSet;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg = parse_config("channels: ['#foo:example.org']").unwrap();
        assert_eq!(cfg.channels, vec!["#foo:example.org".to_owned()]);
        assert!(cfg.prefixes.is_none());
        assert_eq!(cfg.store.dir, PathBuf::from("./channels"));
        assert_eq!(cfg.store.poll_interval_ms, 2000);
        assert!(cfg.role_levels.is_empty());
    }

    #[test]
    fn full_config_feeds_channel_options() {
        let cfg = parse_config(
            r##"
channels: ["#foo:example.org", "!abc:example.org"]
prefixes: ["?", "@bot "]
roles: [admins, mods]
role_levels:
  admins: 100
  mods: 50
store:
  dir: /var/lib/bot/channels
  poll_interval_ms: 500
"##,
        )
        .unwrap();
        assert_eq!(cfg.role_levels.get("mods"), Some(&50));
        assert_eq!(cfg.store.poll_interval_ms, 500);

        let options = cfg.channel_options("#foo:example.org", "toastr");
        assert_eq!(options.name, "#foo:example.org");
        assert_eq!(options.prefix_set(), PrefixSet::new(["?", "@bot "]));
        assert!(options.roles.recognizes("mods"));
        assert!(!options.roles.recognizes("viewer"));
    }

    #[test]
    fn rejects_config_without_channels() {
        assert!(parse_config("channels: []").is_err());
        assert!(parse_config("prefixes: ['!']").is_err());
    }

    #[test]
    fn unset_prefixes_default_to_bang_and_mention() {
        let cfg = parse_config("channels: ['#foo:example.org']").unwrap();
        let options = cfg.channel_options("#foo:example.org", "toastr");
        assert_eq!(options.prefix_set(), PrefixSet::new(["!", "@toastr "]));
    }

    #[test]
    fn rejects_empty_prefix_list() {
        let err = parse_config("channels: ['#a:b']\nprefixes: []").unwrap_err();
        assert!(err.to_string().contains("at least one token"));
        assert!(parse_config("channels: ['#a:b']\nprefixes: ['', '']").is_err());
        assert!(parse_config("channels: ['#a:b']\nprefixes: ['', '?']").is_ok());
    }

    #[test]
    fn rejects_zero_poll_interval() {
        let err = parse_config("channels: ['#a:b']\nstore: { poll_interval_ms: 0 }").unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = load_config(Path::new("/nonexistent/bot.yaml")).unwrap_err();
        assert!(err.to_string().contains("config file not found"));
    }
}
