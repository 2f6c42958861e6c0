use crate::traits::BatchConfiguration;
use crate::types::{BatchTestError, Result};
use std::env;
use url::Url;

pub const USE_BATCH_KEY: &str = "LUIS_USE_BATCH";
pub const APP_ID_KEY: &str = "LUIS_APP_ID";
pub const VERSION_ID_KEY: &str = "LUIS_VERSION_ID";
pub const SLOT_NAME_KEY: &str = "LUIS_SLOT_NAME";
pub const IS_STAGING_KEY: &str = "LUIS_IS_STAGING";
pub const DIRECT_VERSION_PUBLISH_KEY: &str = "LUIS_DIRECT_VERSION_PUBLISH";
pub const BATCH_ENDPOINT_KEY: &str = "LUIS_BATCH_ENDPOINT";
pub const PREDICTION_RESOURCE_NAME_KEY: &str = "LUIS_PREDICTION_RESOURCE_NAME";
pub const AUTHORING_RESOURCE_NAME_KEY: &str = "LUIS_AUTHORING_RESOURCE_NAME";
pub const ENDPOINT_REGION_KEY: &str = "LUIS_ENDPOINT_REGION";
pub const AUTHORING_REGION_KEY: &str = "LUIS_AUTHORING_REGION";
pub const ENDPOINT_KEY_KEY: &str = "LUIS_ENDPOINT_KEY";
pub const AUTHORING_KEY_KEY: &str = "LUIS_AUTHORING_KEY";

const DEFAULT_VERSION_ID: &str = "0.1.1";
const BATCH_API_PATH: &str = "luis/v3.0-preview/apps/";

/// LUIS settings for batch evaluation, resolved from key/value pairs named
/// like environment variables.
#[derive(Debug, Clone, Default)]
pub struct LuisConfiguration {
    pub use_batch: bool,
    pub app_id: Option<String>,
    pub version_id: Option<String>,
    pub slot_name: Option<String>,
    pub is_staging: bool,
    pub direct_version_publish: bool,
    pub batch_endpoint: Option<String>,
    pub prediction_resource_name: Option<String>,
    pub authoring_resource_name: Option<String>,
    pub endpoint_region: Option<String>,
    pub authoring_region: Option<String>,
    pub endpoint_key: Option<String>,
    pub authoring_key: Option<String>,
}

impl LuisConfiguration {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let boolean = |key: &str| -> Result<bool> {
            match lookup(key) {
                None => Ok(false),
                Some(value) => value.trim().to_ascii_lowercase().parse::<bool>().map_err(|_| {
                    BatchTestError::Configuration(format!(
                        "Configuration value for '{}' must be a valid boolean, got '{}'.",
                        key, value
                    ))
                }),
            }
        };

        Ok(Self {
            use_batch: boolean(USE_BATCH_KEY)?,
            app_id: lookup(APP_ID_KEY),
            version_id: lookup(VERSION_ID_KEY),
            slot_name: lookup(SLOT_NAME_KEY),
            is_staging: boolean(IS_STAGING_KEY)?,
            direct_version_publish: boolean(DIRECT_VERSION_PUBLISH_KEY)?,
            batch_endpoint: lookup(BATCH_ENDPOINT_KEY),
            prediction_resource_name: lookup(PREDICTION_RESOURCE_NAME_KEY),
            authoring_resource_name: lookup(AUTHORING_RESOURCE_NAME_KEY),
            endpoint_region: lookup(ENDPOINT_REGION_KEY),
            authoring_region: lookup(AUTHORING_REGION_KEY),
            endpoint_key: lookup(ENDPOINT_KEY_KEY),
            authoring_key: lookup(AUTHORING_KEY_KEY),
        })
    }

    pub fn slot_name(&self) -> &str {
        match &self.slot_name {
            Some(slot) => slot,
            None if self.is_staging => "Staging",
            None => "Production",
        }
    }

    pub fn version_id(&self) -> &str {
        self.version_id.as_deref().unwrap_or(DEFAULT_VERSION_ID)
    }

    /// Base URL that app ids are appended to. Always ends with `/`.
    pub fn batch_endpoint_base(&self) -> Result<String> {
        let base = if let Some(endpoint) = &self.batch_endpoint {
            endpoint.clone()
        } else if let Some(resource) = self
            .prediction_resource_name
            .as_ref()
            .or(self.authoring_resource_name.as_ref())
        {
            format!("https://{}.cognitiveservices.azure.com/{}", resource, BATCH_API_PATH)
        } else if let Some(region) = self.endpoint_region.as_ref().or(self.authoring_region.as_ref()) {
            format!("https://{}.api.cognitive.microsoft.com/{}", region, BATCH_API_PATH)
        } else {
            return Err(missing_one_of(&[
                BATCH_ENDPOINT_KEY,
                PREDICTION_RESOURCE_NAME_KEY,
                AUTHORING_RESOURCE_NAME_KEY,
                ENDPOINT_REGION_KEY,
                AUTHORING_REGION_KEY,
            ]));
        };

        Url::parse(&base)?;
        if base.ends_with('/') {
            Ok(base)
        } else {
            Ok(format!("{}/", base))
        }
    }
}

impl BatchConfiguration for LuisConfiguration {
    fn is_batch_enabled(&self) -> bool {
        self.use_batch
    }

    fn evaluation_endpoint(&self) -> Result<String> {
        let app_id = self
            .app_id
            .as_deref()
            .ok_or_else(|| missing_one_of(&[APP_ID_KEY]))?;
        let base = self.batch_endpoint_base()?;

        let endpoint = if self.direct_version_publish {
            format!("{}{}/versions/{}/evaluations", base, app_id, self.version_id())
        } else {
            format!("{}{}/slots/{}/evaluations", base, app_id, self.slot_name())
        };

        Url::parse(&endpoint)?;
        Ok(endpoint)
    }

    fn credential(&self) -> Result<String> {
        self.endpoint_key
            .clone()
            .or_else(|| self.authoring_key.clone())
            .ok_or_else(|| missing_one_of(&[ENDPOINT_KEY_KEY, AUTHORING_KEY_KEY]))
    }
}

fn missing_one_of(keys: &[&str]) -> BatchTestError {
    let message = match keys {
        [key] => format!("Configuration value for '{}' must be supplied.", key),
        [rest @ .., last] => format!(
            "Configuration value for one of '{}' or '{}' must be supplied.",
            rest.join("', '"),
            last
        ),
        [] => "Configuration value must be supplied.".to_string(),
    };
    BatchTestError::Configuration(message)
}
