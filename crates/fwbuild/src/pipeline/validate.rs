//! Environment validation.
//!
//! Production images built without credentials are unusable, so a missing
//! variable stops the build before any artifact is written.

use crate::context::Profile;
use anyhow::{bail, Result};

/// An external variable a profile may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredVar {
    WifiSsid,
    WifiPassword,
    OtaPassword,
    DeviceId,
}

impl RequiredVar {
    pub fn env_name(self) -> &'static str {
        match self {
            Self::WifiSsid => "PROD_WIFI_SSID",
            Self::WifiPassword => "PROD_WIFI_PASS",
            Self::OtaPassword => "PROD_OTA_PASS",
            Self::DeviceId => "DEVICE_ID",
        }
    }
}

const PRODUCTION_VARS: &[RequiredVar] = &[
    RequiredVar::WifiSsid,
    RequiredVar::WifiPassword,
    RequiredVar::OtaPassword,
    RequiredVar::DeviceId,
];
const STAGING_VARS: &[RequiredVar] = &[RequiredVar::DeviceId];

pub fn required_vars(profile: Profile) -> &'static [RequiredVar] {
    match profile {
        Profile::Production => PRODUCTION_VARS,
        Profile::Staging => STAGING_VARS,
        Profile::Development => &[],
    }
}

/// Credentials and device identity supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub wifi_ssid: Option<String>,
    pub wifi_password: Option<String>,
    pub ota_password: Option<String>,
    pub device_id: Option<String>,
}

impl Credentials {
    pub fn get(&self, var: RequiredVar) -> Option<&str> {
        let value = match var {
            RequiredVar::WifiSsid => &self.wifi_ssid,
            RequiredVar::WifiPassword => &self.wifi_password,
            RequiredVar::OtaPassword => &self.ota_password,
            RequiredVar::DeviceId => &self.device_id,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }

    /// Names of every variable `profile` requires that is absent or empty,
    /// in rule order.
    pub fn missing(&self, profile: Profile) -> Vec<&'static str> {
        required_vars(profile)
            .iter()
            .filter(|var| self.get(**var).is_none())
            .map(|var| var.env_name())
            .collect()
    }
}

/// Fail with the full list of missing variables if `profile` is not satisfied.
pub fn validate(profile: Profile, credentials: &Credentials) -> Result<()> {
    let missing = credentials.missing(profile);
    if !missing.is_empty() {
        let names = missing.join(", ");
        bail!("Missing required environment variables: {names}");
    }
    tracing::debug!(%profile, "environment validated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> Credentials {
        Credentials {
            wifi_ssid: Some("factory".into()),
            wifi_password: Some("hunter2".into()),
            ota_password: Some("ota-secret".into()),
            device_id: Some("dev-0042".into()),
        }
    }

    #[test]
    fn test_production_all_present() {
        assert!(validate(Profile::Production, &full()).is_ok());
    }

    #[test]
    fn test_production_each_missing_is_named() {
        for var in PRODUCTION_VARS {
            let mut creds = full();
            match var {
                RequiredVar::WifiSsid => creds.wifi_ssid = None,
                RequiredVar::WifiPassword => creds.wifi_password = Some(String::new()),
                RequiredVar::OtaPassword => creds.ota_password = None,
                RequiredVar::DeviceId => creds.device_id = Some(String::new()),
            }
            let err = validate(Profile::Production, &creds).unwrap_err();
            let msg = err.to_string();
            assert!(msg.contains(var.env_name()), "{msg}");
            assert_eq!(creds.missing(Profile::Production), vec![var.env_name()]);
        }
    }

    #[test]
    fn test_production_reports_all_missing_in_one_message() {
        let err = validate(Profile::Production, &Credentials::default()).unwrap_err();
        assert_eq!(
            err.to_string(),
            concat!(
                "Missing required environment variables: ",
                "PROD_WIFI_SSID, PROD_WIFI_PASS, PROD_OTA_PASS, DEVICE_ID",
            )
        );
    }

    #[test]
    fn test_staging_needs_only_device_id() {
        let creds = Credentials {
            device_id: Some("lab-7".into()),
            ..Credentials::default()
        };
        assert!(validate(Profile::Staging, &creds).is_ok());
        assert!(validate(Profile::Staging, &Credentials::default()).is_err());
    }

    #[test]
    fn test_development_needs_nothing() {
        assert!(validate(Profile::Development, &Credentials::default()).is_ok());
    }
}
