//! CLI command implementations

pub mod daemon;
pub mod review;
pub mod status;

pub use review::ReviewArgs;

use revd_core::{Config, Secrets};
use tracing::warn;

/// GitHub token from the environment or the secrets file
pub fn github_token() -> Option<String> {
    let secrets = Secrets::load().unwrap_or_else(|e| {
        warn!(error = %e, "Ignoring secrets file");
        Secrets::default()
    });
    secrets.github_token()
}

/// Effective configuration as TOML, with the webhook URL hidden
pub fn render_config(config: &Config) -> anyhow::Result<String> {
    let mut shown = config.clone();
    if shown.notify.slack_webhook_url.is_some() {
        shown.notify.slack_webhook_url = Some("[REDACTED]".to_string());
    }
    Ok(toml::to_string_pretty(&shown)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_config_hides_webhook() {
        let config = Config::parse(
            r#"
            [notify]
            slack_webhook_url = "https://hooks.slack.com/services/secret"

            [[repos]]
            name = "acme/widget"
            "#,
        )
        .unwrap();

        let rendered = render_config(&config).unwrap();
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("services/secret"));
        assert!(rendered.contains("acme/widget"));
        assert!(rendered.contains("review_timeout = \"1h\""));
    }
}
