//! Coarse device-class detection. The result picks which submission path runs first;
//! it is a heuristic, so every path keeps a fallback.

use crate::core::signer::WalletCapabilities;
use serde::{Deserialize, Serialize};
use std::fmt;

const MOBILE_UA_MARKERS: &[&str] = &[
    "android",
    "iphone",
    "ipad",
    "ipod",
    "mobile",
    "blackberry",
    "iemobile",
    "opera mini",
];

const MOBILE_MAX_VIEWPORT_WIDTH: u32 = 768;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Desktop,
    Mobile,
}

impl DeviceClass {
    pub fn is_mobile(self) -> bool {
        self == DeviceClass::Mobile
    }

    /// Classify a session from client hints and the connected agent's capabilities.
    pub fn detect(hints: &ClientHints, capabilities: WalletCapabilities) -> Self {
        let sign_only_agent = !capabilities.can_sign_and_send && capabilities.can_sign_only;
        if hints.looks_mobile() || sign_only_agent {
            DeviceClass::Mobile
        } else {
            DeviceClass::Desktop
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceClass::Desktop => f.write_str("desktop"),
            DeviceClass::Mobile => f.write_str("mobile"),
        }
    }
}

/// Whatever the presentation layer knows about the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientHints {
    pub user_agent: Option<String>,
    pub touch_primary: bool,
    pub viewport_width: Option<u32>,
}

impl ClientHints {
    pub fn looks_mobile(&self) -> bool {
        let ua_mobile = self.user_agent.as_deref().is_some_and(|ua| {
            let ua = ua.to_ascii_lowercase();
            MOBILE_UA_MARKERS.iter().any(|marker| ua.contains(marker))
        });
        let small_touch = self.touch_primary
            && self
                .viewport_width
                .is_some_and(|width| width <= MOBILE_MAX_VIEWPORT_WIDTH);
        ua_mobile || small_touch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOTH: WalletCapabilities = WalletCapabilities {
        can_sign_and_send: true,
        can_sign_only: true,
    };

    #[test]
    fn desktop_browser_with_full_wallet() {
        let hints = ClientHints {
            user_agent: Some("Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0".into()),
            touch_primary: false,
            viewport_width: Some(1440),
        };
        assert_eq!(DeviceClass::detect(&hints, BOTH), DeviceClass::Desktop);
    }

    #[test]
    fn phone_user_agent_is_mobile() {
        let hints = ClientHints {
            user_agent: Some("Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)".into()),
            ..ClientHints::default()
        };
        assert_eq!(DeviceClass::detect(&hints, BOTH), DeviceClass::Mobile);
    }

    #[test]
    fn small_touch_viewport_is_mobile() {
        let hints = ClientHints {
            user_agent: None,
            touch_primary: true,
            viewport_width: Some(390),
        };
        assert!(hints.looks_mobile());

        let tablet_landscape = ClientHints {
            viewport_width: Some(1024),
            ..hints
        };
        assert!(!tablet_landscape.looks_mobile());
    }

    #[test]
    fn sign_only_agent_forces_mobile() {
        let caps = WalletCapabilities {
            can_sign_and_send: false,
            can_sign_only: true,
        };
        assert_eq!(
            DeviceClass::detect(&ClientHints::default(), caps),
            DeviceClass::Mobile
        );
    }
}
