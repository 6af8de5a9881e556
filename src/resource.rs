//! Resource paths of the gateway's CoAP tree.
//!
//! Paths are plain concatenations of fixed numeric codes and caller-supplied
//! ids; whether an id exists is only known to the gateway.

pub const ROOT_DEVICES: u32 = 15001;
pub const ROOT_GROUPS: u32 = 15004;
pub const ROOT_SCENES: u32 = 15005;
pub const ROOT_GATEWAY: u32 = 15011;
pub const GATEWAY_DETAILS: u32 = 15012;
pub const GATEWAY_AUTH: u32 = 9063;

pub fn gateway_info() -> String {
    format!("/{}/{}", ROOT_GATEWAY, GATEWAY_DETAILS)
}

pub fn devices() -> String {
    format!("/{}", ROOT_DEVICES)
}

pub fn device(id: u32) -> String {
    format!("/{}/{}", ROOT_DEVICES, id)
}

pub fn groups() -> String {
    format!("/{}", ROOT_GROUPS)
}

pub fn group(id: u32) -> String {
    format!("/{}/{}", ROOT_GROUPS, id)
}

/// Scenes are scoped under a group.
pub fn scenes(group_id: u32) -> String {
    format!("/{}/{}", ROOT_SCENES, group_id)
}

pub fn scene(group_id: u32, scene_id: u32) -> String {
    format!("/{}/{}/{}", ROOT_SCENES, group_id, scene_id)
}

pub fn provisioning() -> String {
    format!("/{}/{}", ROOT_GATEWAY, GATEWAY_AUTH)
}

/// Canonical decimal strings for a list of ids.
pub fn format_ids(ids: &[u32]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}
