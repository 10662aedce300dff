//! Map validated CLI matches to a server action.

use crate::cli::actions::{Action, ServerArgs};
use anyhow::{Context, Result};
use secrecy::SecretString;
use url::Url;

/// # Errors
/// Returns an error if required arguments are missing or malformed.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let secret = matches
        .get_one::<String>("secret")
        .cloned()
        .map(SecretString::from)
        .context("missing required argument: --secret")?;

    let base_url = match matches.get_one::<String>("base-url") {
        Some(url) => {
            Url::parse(url).with_context(|| format!("invalid base URL: {url}"))?;
            url.trim_end_matches('/').to_string()
        }
        None => format!("http://localhost:{port}"),
    };

    Ok(Action::Server(ServerArgs {
        port,
        dsn: matches.get_one::<String>("dsn").cloned(),
        secret,
        base_url,
        admin_email: matches.get_one::<String>("admin-email").cloned(),
        admin_password: matches
            .get_one::<String>("admin-password")
            .cloned()
            .map(SecretString::from),
        mail_endpoint: matches.get_one::<String>("mail-endpoint").cloned(),
        mail_api_key: matches
            .get_one::<String>("mail-api-key")
            .cloned()
            .map(SecretString::from),
        mail_from: matches.get_one::<String>("mail-from").cloned(),
        session_ttl_seconds: matches
            .get_one::<i64>("session-ttl-seconds")
            .copied()
            .unwrap_or(3600),
        reset_ttl_seconds: matches
            .get_one::<i64>("reset-ttl-seconds")
            .copied()
            .unwrap_or(3600),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;
    use secrecy::ExposeSecret;

    #[test]
    fn base_url_defaults_to_localhost_with_port() -> Result<()> {
        let matches = commands::new().get_matches_from(vec![
            "autogate", "--secret", "sekret", "--port", "9000",
        ]);
        let Action::Server(args) = handler(&matches)?;
        assert_eq!(args.base_url, "http://localhost:9000");
        assert_eq!(args.secret.expose_secret(), "sekret");
        assert!(args.dsn.is_none());
        Ok(())
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() -> Result<()> {
        let matches = commands::new().get_matches_from(vec![
            "autogate",
            "--secret",
            "sekret",
            "--base-url",
            "https://cars.example.com/",
        ]);
        let Action::Server(args) = handler(&matches)?;
        assert_eq!(args.base_url, "https://cars.example.com");
        Ok(())
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let matches = commands::new().get_matches_from(vec![
            "autogate",
            "--secret",
            "sekret",
            "--base-url",
            "not a url",
        ]);
        assert!(handler(&matches).is_err());
    }
}
