// SPDX-License-Identifier: Apache-2.0

//! Heuristic device/browser/OS labelling for reporting dashboards.
//!
//! Browser rules run in the order Chrome, Firefox, Safari, Edge. Chromium
//! Edge agents carry a `Chrome/` token (and only `Edg/`, not `Edge`), so they
//! are labelled "Chrome". The Edge rule only fires for agents without a
//! Chrome, Firefox or Safari token. Callers that need a finer split can plug
//! their own [`UserAgentClassifier`] into the server state.

use folio_model::{ClientProfile, DeviceClass, UNKNOWN_LABEL};

pub trait UserAgentClassifier: Send + Sync {
    fn classify(&self, user_agent: &str) -> ClientProfile;
}

/// Ordered, case-insensitive substring rules. The first matching rule wins,
/// so rule order decides overlapping tokens.
#[derive(Debug, Clone)]
pub struct SubstringClassifier {
    device_rules: Vec<(Vec<&'static str>, DeviceClass)>,
    browser_rules: Vec<(&'static str, &'static str)>,
    os_rules: Vec<(&'static str, &'static str)>,
}

impl Default for SubstringClassifier {
    fn default() -> Self {
        Self {
            device_rules: vec![
                (vec!["tablet", "ipad"], DeviceClass::Tablet),
                (
                    vec!["mobile", "android", "iphone", "ipad"],
                    DeviceClass::Mobile,
                ),
            ],
            browser_rules: vec![
                ("chrome", "Chrome"),
                ("firefox", "Firefox"),
                ("safari", "Safari"),
                ("edge", "Edge"),
            ],
            os_rules: vec![
                ("windows", "Windows"),
                ("mac", "Mac"),
                ("linux", "Linux"),
                ("android", "Android"),
                ("ios", "iOS"),
            ],
        }
    }
}

fn first_label(haystack: &str, rules: &[(&'static str, &'static str)]) -> String {
    rules
        .iter()
        .find(|(needle, _)| haystack.contains(needle))
        .map_or(UNKNOWN_LABEL, |(_, label)| label)
        .to_string()
}

impl UserAgentClassifier for SubstringClassifier {
    fn classify(&self, user_agent: &str) -> ClientProfile {
        let ua = user_agent.to_ascii_lowercase();
        let device = self
            .device_rules
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| ua.contains(n)))
            .map_or(DeviceClass::Desktop, |(_, class)| *class);
        ClientProfile {
            device,
            browser: first_label(&ua, &self.browser_rules),
            os: first_label(&ua, &self.os_rules),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Mobile/15E148 Safari/604.1";
    const PIXEL: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Mobile Safari/537.36";
    const FIREFOX_WIN: &str =
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0";

    #[test]
    fn ipad_is_tablet_before_mobile() {
        let profile = SubstringClassifier::default().classify(IPAD);
        assert_eq!(profile.device, DeviceClass::Tablet);
        assert_eq!(profile.browser, "Safari");
        assert_eq!(profile.os, "Mac");
    }

    #[test]
    fn android_phone_follows_rule_order() {
        let profile = SubstringClassifier::default().classify(PIXEL);
        assert_eq!(profile.device, DeviceClass::Mobile);
        assert_eq!(profile.browser, "Chrome");
        assert_eq!(profile.os, "Linux");
    }

    #[test]
    fn desktop_firefox_on_windows() {
        let profile = SubstringClassifier::default().classify(FIREFOX_WIN);
        assert_eq!(profile.device, DeviceClass::Desktop);
        assert_eq!(profile.browser, "Firefox");
        assert_eq!(profile.os, "Windows");
    }

    #[test]
    fn chromium_edge_is_labelled_chrome() {
        let edge = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91";
        let profile = SubstringClassifier::default().classify(edge);
        assert_eq!(profile.browser, "Chrome");
        assert_eq!(profile.os, "Windows");

        let bare = SubstringClassifier::default().classify("SomeShell/1.0 Edge/18.0");
        assert_eq!(bare.browser, "Edge");
    }

    #[test]
    fn unrecognised_agent_is_unknown_desktop() {
        let profile = SubstringClassifier::default().classify("curl/8.4.0");
        assert_eq!(profile, ClientProfile::default());
    }
}
