//! JSON shapes of gateway, device, group and scene objects.
//!
//! The gateway keys every attribute by a numeric code (`"9001"` is a name,
//! `"9003"` an id, ...). Reads are lenient: missing attributes fall back to
//! their defaults. Settings sent to the gateway use `Option` fields that are
//! skipped when unset, so a partial update never touches other attributes.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

fn epoch_to_time(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}

/// Defines an integer-coded enum with an `Unknown` catch-all.
macro_rules! define_coded_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident = $code:literal),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(from = "i64", into = "i64")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)*
            Unknown(i64),
        }

        impl From<i64> for $name {
            fn from(code: i64) -> Self {
                match code {
                    $($code => $name::$variant,)*
                    other => $name::Unknown(other),
                }
            }
        }

        impl From<$name> for i64 {
            fn from(value: $name) -> i64 {
                match value {
                    $($name::$variant => $code,)*
                    $name::Unknown(other) => other,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                $name::Unknown(-1)
            }
        }
    };
}

define_coded_enum! {
    /// Application type of a device (`"5750"`).
    DeviceType {
        Remote = 0,
        /// A remote paired with another remote
        SlaveRemote = 1,
        Light = 2,
        ControlOutlet = 3,
        Sensor = 4,
        SignalRepeater = 6,
        Blind = 7,
        SoundRemote = 8,
        AirPurifier = 9,
    }
}

define_coded_enum! {
    PowerSource {
        Dc = 0,
        InternalBattery = 1,
        ExternalBattery = 2,
        Battery = 3,
        PowerOverEthernet = 4,
        Usb = 5,
        Ac = 6,
        Solar = 7,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayInfo {
    #[serde(rename = "9081")]
    pub id: String,
    #[serde(rename = "9029")]
    pub firmware: String,
    /// ISO 8601 timestamp as reported by the gateway
    #[serde(rename = "9060")]
    pub time: String,
    #[serde(rename = "9023")]
    pub time_server: String,
    #[serde(rename = "9059")]
    pub epoch_now: i64,
    #[serde(rename = "9069")]
    pub epoch_created: i64,
}

impl GatewayInfo {
    pub fn now(&self) -> SystemTime {
        epoch_to_time(self.epoch_now)
    }

    pub fn created_at(&self) -> SystemTime {
        epoch_to_time(self.epoch_created)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceMetadata {
    #[serde(rename = "0")]
    pub manufacturer: String,
    #[serde(rename = "1")]
    pub model: String,
    #[serde(rename = "2")]
    pub serial: String,
    #[serde(rename = "3")]
    pub firmware: String,
    #[serde(rename = "6")]
    pub power_source: PowerSource,
    #[serde(rename = "9")]
    pub battery: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Speaker {
    #[serde(rename = "9115")]
    pub devices: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sensor {
    #[serde(rename = "5750")]
    pub app_type: Option<serde_json::Value>,
    #[serde(rename = "5751")]
    pub sensor_type: Option<serde_json::Value>,
    #[serde(rename = "5601")]
    pub min_measured_value: f64,
    #[serde(rename = "5602")]
    pub max_measured_value: f64,
    #[serde(rename = "5603")]
    pub min_range_value: f64,
    #[serde(rename = "5604")]
    pub max_range_value: f64,
    #[serde(rename = "5605")]
    pub reset_min_max_measure_value: Option<serde_json::Value>,
    #[serde(rename = "5700")]
    pub sensor_value: f64,
    #[serde(rename = "5701")]
    pub unit: String,
}

/// Light attributes. Used both when reading devices/scenes and when updating.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightSettings {
    #[serde(rename = "5850", default, skip_serializing_if = "Option::is_none")]
    pub power: Option<i32>,
    #[serde(rename = "5851", default, skip_serializing_if = "Option::is_none")]
    pub dimmer: Option<i32>,
    #[serde(rename = "5707", default, skip_serializing_if = "Option::is_none")]
    pub color_hue: Option<i32>,
    #[serde(rename = "5708", default, skip_serializing_if = "Option::is_none")]
    pub color_saturation: Option<i32>,
    #[serde(rename = "5709", default, skip_serializing_if = "Option::is_none")]
    pub color_x: Option<i32>,
    #[serde(rename = "5710", default, skip_serializing_if = "Option::is_none")]
    pub color_y: Option<i32>,
    /// Hex RGB preset, e.g. `"f1e0b5"`
    #[serde(rename = "5706", default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(rename = "5711", default, skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<i32>,
    /// Transition time in tenths of a second
    #[serde(rename = "5712", default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(rename = "9003", default, skip_serializing_if = "Option::is_none")]
    pub device: Option<u32>,
}

impl LightSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn power(mut self, on: bool) -> Self {
        self.power = Some(on as i32);
        self
    }

    pub fn dimmer(mut self, level: u8) -> Self {
        self.dimmer = Some(level as i32);
        self
    }

    pub fn color(mut self, hex: impl Into<String>) -> Self {
        self.color = Some(hex.into());
        self
    }

    pub fn duration(mut self, tenths: i32) -> Self {
        self.duration = Some(tenths);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutletSettings {
    #[serde(rename = "5850", default, skip_serializing_if = "Option::is_none")]
    pub power: Option<i32>,
    #[serde(rename = "5851", default, skip_serializing_if = "Option::is_none")]
    pub dimmer: Option<i32>,
    #[serde(rename = "9003", default, skip_serializing_if = "Option::is_none")]
    pub device: Option<u32>,
}

impl OutletSettings {
    pub fn power(on: bool) -> Self {
        Self {
            power: Some(on as i32),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchSettings {
    #[serde(rename = "9003", default, skip_serializing_if = "Option::is_none")]
    pub device: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeakerSettings {
    #[serde(rename = "9003", default, skip_serializing_if = "Option::is_none")]
    pub device: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceInfo {
    #[serde(rename = "9003")]
    pub id: u32,
    #[serde(rename = "9001")]
    pub name: String,
    #[serde(rename = "5750")]
    pub device_type: DeviceType,
    #[serde(rename = "3")]
    pub metadata: DeviceMetadata,
    #[serde(rename = "15017")]
    pub speaker: Option<Speaker>,
    #[serde(rename = "3311")]
    pub light_settings: Vec<LightSettings>,
    #[serde(rename = "3312")]
    pub outlet_settings: Vec<OutletSettings>,
    #[serde(rename = "15009")]
    pub switch_settings: Vec<SwitchSettings>,
    #[serde(rename = "15018")]
    pub speaker_settings: Vec<SpeakerSettings>,
    #[serde(rename = "3300")]
    pub sensors: Vec<Sensor>,
    #[serde(rename = "9002")]
    pub epoch_created: i64,
    /// Last time the gateway heard from the device
    #[serde(rename = "9020")]
    pub epoch_updated: i64,
    #[serde(rename = "9019")]
    pub alive: i32,
    #[serde(rename = "9054")]
    pub ota_update_state: i32,
}

impl DeviceInfo {
    pub fn created_at(&self) -> SystemTime {
        epoch_to_time(self.epoch_created)
    }

    pub fn updated_at(&self) -> SystemTime {
        epoch_to_time(self.epoch_updated)
    }

    pub fn is_alive(&self) -> bool {
        self.alive == 1
    }
}

/// Partial device update; only the lists that are set are sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(rename = "3311", default, skip_serializing_if = "Option::is_none")]
    pub light_settings: Option<Vec<LightSettings>>,
    #[serde(rename = "3312", default, skip_serializing_if = "Option::is_none")]
    pub outlet_settings: Option<Vec<OutletSettings>>,
}

impl DeviceSettings {
    pub fn light(settings: LightSettings) -> Self {
        Self {
            light_settings: Some(vec![settings]),
            ..Default::default()
        }
    }

    pub fn outlet(settings: OutletSettings) -> Self {
        Self {
            outlet_settings: Some(vec![settings]),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupInfo {
    #[serde(rename = "9003")]
    pub id: u32,
    #[serde(rename = "9001")]
    pub name: String,
    #[serde(rename = "9002")]
    pub epoch_created: i64,
}

impl GroupInfo {
    pub fn created_at(&self) -> SystemTime {
        epoch_to_time(self.epoch_created)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneInfo {
    #[serde(rename = "9003")]
    pub id: u32,
    #[serde(rename = "9001")]
    pub name: String,
    #[serde(rename = "9002")]
    pub epoch_created: i64,
    #[serde(rename = "15013")]
    pub light_settings: Vec<LightSettings>,
}

impl SceneInfo {
    pub fn created_at(&self) -> SystemTime {
        epoch_to_time(self.epoch_created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_light_update_sends_only_set_fields() {
        let settings = DeviceSettings::light(LightSettings::new().power(true).duration(10));
        let encoded = serde_json::to_value(&settings).unwrap();
        assert_eq!(encoded, json!({"3311": [{"5850": 1, "5712": 10}]}));

        let decoded: DeviceSettings = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, settings);
        let light = &decoded.light_settings.unwrap()[0];
        assert_eq!(light.dimmer, None);
        assert_eq!(light.color, None);
    }

    #[test]
    fn zero_values_are_still_sent() {
        let settings = DeviceSettings::light(LightSettings::new().power(false).dimmer(0));
        assert_eq!(
            serde_json::to_string(&settings).unwrap(),
            r#"{"3311":[{"5850":0,"5851":0}]}"#
        );
    }

    #[test]
    fn empty_settings_encode_as_empty_object() {
        assert_eq!(serde_json::to_string(&DeviceSettings::default()).unwrap(), "{}");
    }

    #[test]
    fn device_decodes_with_missing_attributes() {
        let device: DeviceInfo =
            serde_json::from_value(json!({"9001": "Lamp", "9003": 65536})).unwrap();
        assert_eq!(device.name, "Lamp");
        assert_eq!(device.id, 65536);
        assert!(device.light_settings.is_empty());
    }

    #[test]
    fn device_decodes_full_light() {
        let device: DeviceInfo = serde_json::from_value(json!({
            "9001": "Kitchen",
            "9003": 65540,
            "5750": 2,
            "9019": 1,
            "9002": 1_600_000_000,
            "3": {"0": "IKEA of Sweden", "1": "TRADFRI bulb E27 WS opal 980lm", "6": 1},
            "3311": [{"5850": 1, "5851": 254, "5706": "f1e0b5", "9003": 0}]
        }))
        .unwrap();

        assert_eq!(device.device_type, DeviceType::Light);
        assert_eq!(device.metadata.power_source, PowerSource::InternalBattery);
        assert!(device.is_alive());
        assert_eq!(device.light_settings[0].dimmer, Some(254));
        assert_eq!(
            device.created_at(),
            UNIX_EPOCH + Duration::from_secs(1_600_000_000)
        );
    }

    #[test]
    fn unknown_device_type_is_preserved() {
        let t: DeviceType = serde_json::from_value(json!(42)).unwrap();
        assert_eq!(t, DeviceType::Unknown(42));
        assert_eq!(serde_json::to_value(t).unwrap(), json!(42));
    }

    #[test]
    fn scene_carries_light_settings() {
        let scene: SceneInfo = serde_json::from_value(json!({
            "9003": 196608,
            "9001": "Relax",
            "15013": [{"5850": 1, "9003": 65536}]
        }))
        .unwrap();
        assert_eq!(scene.light_settings[0].device, Some(65536));
    }
}
