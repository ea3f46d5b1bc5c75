//! Profile configuration for machdesk.
//!
//! TOML profiles, secret resolution (env + keyring + plaintext), and
//! translation to `machdesk_core::ClientConfig`. The CLI layers its
//! `GlobalOpts` overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use machdesk_core::{
    ClientConfig, FetchPolicy, InitMode, InitOptions, PageParams, PatchMissPolicy,
    ProviderConfig, ResourceEndpoint, TlsVerification,
};

/// Keyring service name under which secrets are stored.
pub const KEYRING_SERVICE: &str = "machdesk";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String, available: Vec<String> },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Name of the profile to use, preferring an explicit choice.
    pub fn active_profile_name(&self, explicit: Option<&str>) -> String {
        explicit
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    /// Look up a profile. The implicit `default` profile falls back to
    /// built-in values when absent from the file.
    pub fn profile(&self, name: &str) -> Result<Profile, ConfigError> {
        match self.profiles.get(name) {
            Some(profile) => Ok(profile.clone()),
            None if name == "default" => Ok(Profile::default()),
            None => {
                let mut available: Vec<String> = self.profiles.keys().cloned().collect();
                available.sort();
                Err(ConfigError::ProfileNotFound {
                    name: name.into(),
                    available,
                })
            }
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default)]
    pub insecure: bool,

    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named deployment: identity provider plus resource API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Identity provider root (e.g. "http://localhost:8080").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    /// Startup mode: "silent-check" or "require-login".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Plaintext password. Prefer the keyring or `MACHDESK_PASSWORD`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Plaintext refresh token for the silent check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Resource API root (e.g. "http://127.0.0.1:5000").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insecure: Option<bool>,

    /// Per-request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Provider initialization bound in seconds. 0 waits indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_miss: Option<PatchMissPolicy>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_policy: Option<FetchPolicy>,

    /// Re-fetch interval in seconds for `machines watch`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "machdesk", "machdesk").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("machdesk");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load defaults < `path` < `MACHDESK_*` environment.
///
/// Nested keys use a double underscore, e.g.
/// `MACHDESK_PROFILES__LOCAL__API_URL`. A missing file is not an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("MACHDESK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Secret resolution ───────────────────────────────────────────────

fn keyring_entry(profile_name: &str, kind: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/{kind}"),
    )?)
}

/// Env var, then system keyring, then plaintext in the profile.
fn resolve_secret(
    env_var: &str,
    profile_name: &str,
    kind: &str,
    plaintext: Option<&str>,
) -> Option<SecretString> {
    if let Ok(val) = std::env::var(env_var) {
        return Some(SecretString::from(val));
    }

    if let Ok(entry) = keyring_entry(profile_name, kind) {
        if let Ok(secret) = entry.get_password() {
            return Some(SecretString::from(secret));
        }
    }

    plaintext.map(|s| SecretString::from(s.to_owned()))
}

/// Resolve the login password for a profile.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    resolve_secret(
        "MACHDESK_PASSWORD",
        profile_name,
        "password",
        profile.password.as_deref(),
    )
}

/// Resolve a remembered refresh token for the silent check.
pub fn resolve_refresh_token(profile: &Profile, profile_name: &str) -> Option<SecretString> {
    resolve_secret(
        "MACHDESK_REFRESH_TOKEN",
        profile_name,
        "refresh-token",
        profile.refresh_token.as_deref(),
    )
}

/// Store a secret in the system keyring.
pub fn store_secret(profile_name: &str, kind: &str, secret: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name, kind)?.set_password(secret)?;
    Ok(())
}

/// Remove a secret from the system keyring. Missing entries are fine.
pub fn forget_secret(profile_name: &str, kind: &str) -> Result<(), ConfigError> {
    match keyring_entry(profile_name, kind)?.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ── Translation ─────────────────────────────────────────────────────

/// Build a `ClientConfig` from a profile, resolving secrets.
pub fn profile_to_client_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<ClientConfig, ConfigError> {
    build_client_config(
        profile,
        resolve_password(profile, profile_name),
        resolve_refresh_token(profile, profile_name),
    )
}

/// Build a `ClientConfig` from a profile and already-resolved secrets.
pub fn build_client_config(
    profile: &Profile,
    password: Option<SecretString>,
    refresh_token: Option<SecretString>,
) -> Result<ClientConfig, ConfigError> {
    let defaults = ClientConfig::default();

    let provider_url = match &profile.provider_url {
        Some(raw) => parse_url("provider_url", raw)?,
        None => defaults.provider.url.clone(),
    };
    let base_url = match &profile.api_url {
        Some(raw) => parse_url("api_url", raw)?,
        None => defaults.resources.base_url.clone(),
    };

    let mode = match &profile.mode {
        Some(raw) => raw
            .parse::<InitMode>()
            .map_err(|_| ConfigError::Validation {
                field: "mode".into(),
                reason: format!("expected 'silent-check' or 'require-login', got '{raw}'"),
            })?,
        None => InitMode::default(),
    };

    let per_page = profile.per_page.unwrap_or(defaults.page.per_page);
    if per_page == 0 {
        return Err(ConfigError::Validation {
            field: "per_page".into(),
            reason: "must be at least 1".into(),
        });
    }

    let tls = if profile.insecure.unwrap_or(false) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    Ok(ClientConfig {
        provider: ProviderConfig {
            url: provider_url,
            realm: profile
                .realm
                .clone()
                .unwrap_or(defaults.provider.realm),
            client_id: profile
                .client_id
                .clone()
                .unwrap_or(defaults.provider.client_id),
            username: profile.username.clone(),
            password,
            refresh_token,
        },
        resources: ResourceEndpoint {
            base_url,
            path: profile
                .resource_path
                .clone()
                .unwrap_or(defaults.resources.path),
            collection_field: profile
                .collection_field
                .clone()
                .unwrap_or(defaults.resources.collection_field),
        },
        init: InitOptions {
            mode,
            ..InitOptions::default()
        },
        init_timeout: profile
            .init_timeout
            .map_or(defaults.init_timeout, Duration::from_secs),
        tls,
        timeout: profile.timeout.map_or(defaults.timeout, Duration::from_secs),
        refresh_interval_secs: profile.refresh_interval.unwrap_or(0),
        page: PageParams::new(1, per_page),
        patch_miss: profile.patch_miss.unwrap_or(defaults.patch_miss),
        fetch_policy: profile.fetch_policy.unwrap_or(defaults.fetch_policy),
        token_min_validity: defaults.token_min_validity,
    })
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    fn write(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert_eq!(cfg.defaults.timeout, 30);
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"
default_profile = "plant"

[defaults]
output = "json"

[profiles.plant]
provider_url = "https://sso.plant.example"
api_url = "https://api.plant.example"
mode = "require-login"
username = "operator"
patch_miss = "reject"
fetch_policy = "supersede"
per_page = 20
"#,
        );

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.defaults.output, "json");
        assert_eq!(cfg.defaults.timeout, 30);
        assert_eq!(cfg.active_profile_name(None), "plant");

        let profile = cfg.profile("plant").unwrap();
        assert_eq!(profile.patch_miss, Some(PatchMissPolicy::Reject));
        assert_eq!(profile.fetch_policy, Some(FetchPolicy::Supersede));
        assert_eq!(profile.per_page, Some(20));
    }

    #[test]
    fn explicit_profile_wins_over_default() {
        let cfg = Config::default();
        assert_eq!(cfg.active_profile_name(Some("lab")), "lab");
        assert_eq!(cfg.active_profile_name(None), "default");
    }

    #[test]
    fn unknown_profile_lists_available() {
        let mut cfg = Config::default();
        cfg.profiles.insert("b".into(), Profile::default());
        cfg.profiles.insert("a".into(), Profile::default());

        match cfg.profile("nope").unwrap_err() {
            ConfigError::ProfileNotFound { name, available } => {
                assert_eq!(name, "nope");
                assert_eq!(available, vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(cfg.profile("default").unwrap(), Profile::default());
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles.insert(
            "local".into(),
            Profile {
                api_url: Some("http://127.0.0.1:5000".into()),
                refresh_interval: Some(15),
                ..Profile::default()
            },
        );
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profiles["local"], cfg.profiles["local"]);
    }

    #[test]
    fn empty_profile_maps_to_client_defaults() {
        let cfg = build_client_config(&Profile::default(), None, None).unwrap();
        let defaults = ClientConfig::default();

        assert_eq!(cfg.provider.url, defaults.provider.url);
        assert_eq!(cfg.provider.realm, "machine_management");
        assert_eq!(cfg.resources, defaults.resources);
        assert_eq!(cfg.init.mode, InitMode::SilentCheck);
        assert_eq!(cfg.tls, TlsVerification::SystemDefaults);
        assert_eq!(cfg.page, PageParams::default());
        assert_eq!(cfg.refresh_interval_secs, 0);
    }

    #[test]
    fn profile_fields_flow_into_client_config() {
        let profile = Profile {
            provider_url: Some("https://sso.example".into()),
            realm: Some("plant".into()),
            mode: Some("require-login".into()),
            username: Some("operator".into()),
            api_url: Some("https://api.example".into()),
            resource_path: Some("v2/machines".into()),
            collection_field: Some("items".into()),
            insecure: Some(true),
            init_timeout: Some(0),
            patch_miss: Some(PatchMissPolicy::Insert),
            ..Profile::default()
        };
        let cfg = build_client_config(
            &profile,
            Some(SecretString::from("pw".to_string())),
            None,
        )
        .unwrap();

        assert_eq!(cfg.provider.url.as_str(), "https://sso.example/");
        assert_eq!(cfg.provider.realm, "plant");
        assert_eq!(cfg.provider.username.as_deref(), Some("operator"));
        assert_eq!(cfg.provider.password.unwrap().expose_secret(), "pw");
        assert_eq!(cfg.resources.path, "v2/machines");
        assert_eq!(cfg.resources.collection_field, "items");
        assert_eq!(cfg.init.mode, InitMode::RequireLogin);
        assert_eq!(cfg.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(cfg.init_timeout, Duration::ZERO);
        assert_eq!(cfg.patch_miss, PatchMissPolicy::Insert);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let bad_url = Profile {
            api_url: Some("not a url".into()),
            ..Profile::default()
        };
        assert!(matches!(
            build_client_config(&bad_url, None, None),
            Err(ConfigError::Validation { field, .. }) if field == "api_url"
        ));

        let bad_mode = Profile {
            mode: Some("eager".into()),
            ..Profile::default()
        };
        assert!(matches!(
            build_client_config(&bad_mode, None, None),
            Err(ConfigError::Validation { field, .. }) if field == "mode"
        ));

        let zero_page = Profile {
            per_page: Some(0),
            ..Profile::default()
        };
        assert!(build_client_config(&zero_page, None, None).is_err());
    }
}
