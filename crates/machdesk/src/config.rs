//! CLI configuration: a thin wrapper around `machdesk_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--provider-url, --api-url, --username, --insecure, --timeout).

use machdesk_core::ClientConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use machdesk_config::{
    Config, Defaults, Profile, config_path, forget_secret, load_config, save_config, store_secret,
};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.active_profile_name(global.profile.as_deref())
}

/// Layer global flags over a profile. Flags win; file-level defaults
/// fill what the profile leaves unset.
pub fn apply_overrides(profile: &mut Profile, global: &GlobalOpts, defaults: &Defaults) {
    if let Some(ref url) = global.provider_url {
        profile.provider_url = Some(url.clone());
    }
    if let Some(ref url) = global.api_url {
        profile.api_url = Some(url.clone());
    }
    if let Some(ref user) = global.username {
        profile.username = Some(user.clone());
    }
    if global.insecure {
        profile.insecure = Some(true);
    } else if profile.insecure.is_none() && defaults.insecure {
        profile.insecure = Some(true);
    }
    profile.timeout = global
        .timeout
        .or(profile.timeout)
        .or(Some(defaults.timeout));
}

/// The active profile after overrides, with its name.
pub fn resolve_profile(global: &GlobalOpts) -> Result<(String, Profile), CliError> {
    let cfg = load_config()?;
    let name = active_profile_name(global, &cfg);
    let mut profile = cfg.profile(&name)?;
    apply_overrides(&mut profile, global, &cfg.defaults);
    Ok((name, profile))
}

/// Build a `ClientConfig` from the config file, profile, and CLI overrides.
pub fn build_client_config(global: &GlobalOpts) -> Result<(String, ClientConfig), CliError> {
    let (name, profile) = resolve_profile(global)?;
    let config = machdesk_config::profile_to_client_config(&profile, &name)?;
    tracing::debug!(
        profile = %name,
        provider = %config.provider.url,
        api = %config.resources.base_url,
        "resolved client config"
    );
    Ok((name, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["machdesk"];
        argv.extend_from_slice(args);
        argv.extend_from_slice(&["routes", "list"]);
        Cli::parse_from(argv).global
    }

    #[test]
    fn flags_override_profile_values() {
        let mut profile = Profile {
            api_url: Some("http://file.example".into()),
            timeout: Some(5),
            ..Profile::default()
        };
        let opts = global(&["--api-url", "http://flag.example", "--timeout", "9", "-k"]);

        apply_overrides(&mut profile, &opts, &Defaults::default());

        assert_eq!(profile.api_url.as_deref(), Some("http://flag.example"));
        assert_eq!(profile.timeout, Some(9));
        assert_eq!(profile.insecure, Some(true));
    }

    #[test]
    fn file_defaults_fill_gaps() {
        let mut profile = Profile::default();
        let defaults = Defaults {
            output: "table".into(),
            insecure: true,
            timeout: 12,
        };

        apply_overrides(&mut profile, &global(&[]), &defaults);

        assert_eq!(profile.timeout, Some(12));
        assert_eq!(profile.insecure, Some(true));
        assert_eq!(profile.api_url, None);
    }
}
