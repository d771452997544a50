//! Device attributes reported as config data

use std::collections::BTreeMap;

use sysinfo::System;

use crate::ddi::config_data::ConfigDataPayload;
use crate::errors::DdiError;
use crate::utils::version_info;

/// Attributes describing this host
pub fn host_attributes() -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();
    let unknown = || "unknown".to_string();

    attributes.insert(
        "hostname".to_string(),
        System::host_name().unwrap_or_else(unknown),
    );
    attributes.insert("os".to_string(), System::name().unwrap_or_else(unknown));
    attributes.insert(
        "os_version".to_string(),
        System::os_version().unwrap_or_else(unknown),
    );
    attributes.insert(
        "kernel".to_string(),
        System::kernel_version().unwrap_or_else(unknown),
    );
    attributes.insert("arch".to_string(), std::env::consts::ARCH.to_string());
    attributes.insert("agent_version".to_string(), version_info().version);
    attributes
}

/// Host attributes overlaid with `extra`; configured values win
pub fn device_attributes(extra: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    let mut attributes = host_attributes();
    attributes.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    attributes
}

/// Config data payload for the device
pub fn config_data(extra: &BTreeMap<String, String>) -> Result<ConfigDataPayload, DdiError> {
    ConfigDataPayload::from_value(&device_attributes(extra))
}
