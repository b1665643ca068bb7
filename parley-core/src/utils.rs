pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_2: &str = "stun:stun1.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_3: &str = "stun:stun2.l.google.com:19302";
pub const DEFAULT_STUN_ADDR_4: &str = "stun:stun3.l.google.com:19302";

/// Labels starting with this prefix are reserved for control channels.
pub const CONTROL_CHANNEL_PREFIX: &str = "parley-control-";

pub fn is_control_label(label: &str) -> bool {
    label.starts_with(CONTROL_CHANNEL_PREFIX)
}
