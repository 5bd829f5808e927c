use crate::config::types::{ApiConfig, ApiMode, Config, CrawlConfig, OutputConfig, UserAgentConfig};
use crate::ConfigError;
use url::Url;

/// Upper bound on pages fetched concurrently
const MAX_CONCURRENT_PAGES: u32 = 16;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_crawl_config(&config.crawl)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates API selection
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    if config.mode == ApiMode::Json && config.api_key.trim().is_empty() {
        return Err(ConfigError::Validation(
            "api-key is required when mode = \"json\"".to_string(),
        ));
    }

    if let Some(endpoint) = &config.endpoint {
        let url = Url::parse(endpoint)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid endpoint '{}': {}", endpoint, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Endpoint '{}' must use http or https",
                endpoint
            )));
        }
    }

    Ok(())
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_pages < 1 || config.max_concurrent_pages > MAX_CONCURRENT_PAGES {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-pages must be between 1 and {}, got {}",
            MAX_CONCURRENT_PAGES, config.max_concurrent_pages
        )));
    }

    Ok(())
}

/// The `User-Agent` sent to the API must identify the tool and how to reach
/// whoever runs it
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    let is_token = |s: &str| {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    };

    if !is_token(&config.crawler_name) {
        return Err(ConfigError::Validation(format!(
            "crawler-name must be a non-empty product token (letters, digits, '-', '_', '.'), got '{}'",
            config.crawler_name
        )));
    }
    if !is_token(&config.crawler_version) {
        return Err(ConfigError::Validation(format!(
            "crawler-version must be a non-empty version token, got '{}'",
            config.crawler_version
        )));
    }

    let contact = Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("contact-url: {}", e)))?;
    if !matches!(contact.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "contact-url must be a web page, got '{}'",
            config.contact_url
        )));
    }

    validate_email(&config.contact_email)
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "output.database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// `local@domain.tld`, nothing stricter
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let well_formed = email
        .split_once('@')
        .map(|(local, domain)| {
            !local.is_empty()
                && !domain.contains('@')
                && domain.split('.').count() > 1
                && domain.split('.').all(|label| !label.is_empty())
        })
        .unwrap_or(false);

    if well_formed {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "contact-email is not an address: '{}'",
            email
        )))
    }
}
