use std::{env, sync::Arc, time::Duration};

use checkout_common::helpers::{env_millis_or_default, parse_boolean_flag};
use log::*;
use reqwest::{Client, StatusCode};

use crate::{
    db_types::PriceSettings,
    traits::{PricingError, PricingService},
};

const DEFAULT_SITE_URL: &str = "http://localhost:8080";
const DEFAULT_SETTINGS_PATH: &str = "/commerce/settings.json";
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5_000);

#[derive(Debug, Clone)]
pub struct SitePricingConfig {
    /// Base URL of the shop's public site, without a trailing slash.
    pub site_url: String,
    pub settings_path: String,
    pub timeout: Duration,
    /// Whether catalogue prices include tax when the site publishes no settings at all.
    pub prices_include_taxes: bool,
}

impl Default for SitePricingConfig {
    fn default() -> Self {
        Self {
            site_url: DEFAULT_SITE_URL.to_string(),
            settings_path: DEFAULT_SETTINGS_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
            prices_include_taxes: false,
        }
    }
}

impl SitePricingConfig {
    pub fn new<S: Into<String>>(site_url: S) -> Self {
        Self { site_url: site_url.into(), ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let site_url = env::var("CHECKOUT_SITE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ CHECKOUT_SITE_URL is not set. Price settings will be fetched from {DEFAULT_SITE_URL}.");
            DEFAULT_SITE_URL.to_string()
        });
        let settings_path = env::var("CHECKOUT_SETTINGS_PATH").unwrap_or_else(|_| DEFAULT_SETTINGS_PATH.to_string());
        let timeout = env_millis_or_default("CHECKOUT_PRICING_TIMEOUT_MS", DEFAULT_TIMEOUT);
        let prices_include_taxes = parse_boolean_flag(env::var("CHECKOUT_PRICES_INCLUDE_TAXES").ok(), false);
        Self { site_url, settings_path, timeout, prices_include_taxes }
    }

    pub fn settings_url(&self) -> String {
        let base = self.site_url.trim_end_matches('/');
        let path = self.settings_path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}

/// Fetches the settings document that the shop publishes on its site.
#[derive(Clone)]
pub struct SitePricing {
    config: SitePricingConfig,
    client: Arc<Client>,
}

impl SitePricing {
    pub fn new(config: SitePricingConfig) -> Result<Self, PricingError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PricingError::Unreachable(format!("Could not build the HTTP client. {e}")))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &SitePricingConfig {
        &self.config
    }

    fn fallback_settings(&self) -> PriceSettings {
        PriceSettings { prices_include_taxes: self.config.prices_include_taxes, taxes: Vec::new() }
    }
}

impl PricingService for SitePricing {
    async fn fetch_settings(&self) -> Result<PriceSettings, PricingError> {
        let url = self.config.settings_url();
        trace!("🏷️ Fetching price settings from {url}");
        let response = self.client.get(&url).send().await.map_err(|e| PricingError::Unreachable(e.to_string()))?;
        match response.status() {
            s if s.is_success() => {
                let settings =
                    response.json::<PriceSettings>().await.map_err(|e| PricingError::Malformed(e.to_string()))?;
                debug!("🏷️ Price settings loaded. {} tax rules.", settings.taxes.len());
                Ok(settings)
            },
            StatusCode::NOT_FOUND => {
                debug!("🏷️ No price settings published at {url}. Using defaults.");
                Ok(self.fallback_settings())
            },
            s => {
                warn!("🏷️ Price settings request to {url} failed with {s}");
                Err(PricingError::UnexpectedStatus(s.as_u16()))
            },
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn settings_url_joins_cleanly() {
        let mut config = SitePricingConfig::new("https://shop.example.com/");
        assert_eq!(config.settings_url(), "https://shop.example.com/commerce/settings.json");
        config.settings_path = "settings.json".into();
        assert_eq!(config.settings_url(), "https://shop.example.com/settings.json");
    }

    #[test]
    fn settings_document_fields_are_optional() {
        let settings: PriceSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings, PriceSettings::default());
        let settings: PriceSettings =
            serde_json::from_str(r#"{"prices_include_taxes": true, "taxes": [{"percentage": 21, "countries": ["NL"]}]}"#)
                .unwrap();
        assert!(settings.prices_include_taxes);
        assert_eq!(settings.taxes[0].percentage, 21);
        assert!(settings.taxes[0].product_types.is_empty());
    }

    #[tokio::test]
    async fn unreachable_site_is_an_error() {
        let config = SitePricingConfig {
            site_url: "http://127.0.0.1:9".into(),
            settings_path: "/settings.json".into(),
            timeout: Duration::from_millis(500),
            prices_include_taxes: false,
        };
        let pricing = SitePricing::new(config).unwrap();
        let err = pricing.fetch_settings().await.unwrap_err();
        assert!(matches!(err, PricingError::Unreachable(_)));
    }
}
