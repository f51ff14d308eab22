//! Free/pro capability flag
//!
//! Resolved once per session and handed to whatever needs it, so every
//! component sees the same answer for the whole session.

use log::info;

/// Environment variable that forces the pro or free variant
pub const PRO_ENV_VAR: &str = "PDF_GALLERY_PRO";

/// Gallery items allowed in the free variant
pub const FREE_ITEM_LIMIT: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapabilitySource {
    Override,
    Environment,
    Settings,
    Default,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub pro: bool,
    pub source: CapabilitySource,
}

impl Capabilities {
    #[must_use]
    pub const fn free() -> Self {
        Self {
            pro: false,
            source: CapabilitySource::Default,
        }
    }

    #[must_use]
    pub const fn pro() -> Self {
        Self {
            pro: true,
            source: CapabilitySource::Override,
        }
    }

    /// Resolve the variant: explicit override, then environment, then the
    /// persisted flag. No signal means free.
    #[must_use]
    pub fn resolve(explicit: Option<bool>, env: Option<&str>, persisted: Option<bool>) -> Self {
        let resolved = if let Some(pro) = explicit {
            Self {
                pro,
                source: CapabilitySource::Override,
            }
        } else if let Some(pro) = env.and_then(parse_flag) {
            Self {
                pro,
                source: CapabilitySource::Environment,
            }
        } else if let Some(pro) = persisted {
            Self {
                pro,
                source: CapabilitySource::Settings,
            }
        } else {
            Self::free()
        };

        info!(
            "Resolved {} variant from {:?}",
            if resolved.pro { "pro" } else { "free" },
            resolved.source
        );
        resolved
    }

    /// Resolve from the process environment and the process-wide settings
    #[must_use]
    pub fn resolve_for_process(explicit: Option<bool>) -> Self {
        let env = std::env::var(PRO_ENV_VAR).ok();
        Self::resolve(explicit, env.as_deref(), Some(crate::settings::is_pro()))
    }

    /// Maximum gallery items, `None` when unlimited
    #[must_use]
    pub fn item_limit(&self) -> Option<usize> {
        if self.pro { None } else { Some(FREE_ITEM_LIMIT) }
    }

    #[must_use]
    pub fn ratings_enabled(&self) -> bool {
        self.pro
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "pro" => Some(true),
        "0" | "false" | "no" | "off" | "free" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_override_wins() {
        let caps = Capabilities::resolve(Some(false), Some("1"), Some(true));
        assert!(!caps.pro);
        assert_eq!(caps.source, CapabilitySource::Override);
    }

    #[test]
    fn environment_beats_settings() {
        let caps = Capabilities::resolve(None, Some("yes"), Some(false));
        assert!(caps.pro);
        assert_eq!(caps.source, CapabilitySource::Environment);
    }

    #[test]
    fn garbage_environment_falls_through_to_settings() {
        let caps = Capabilities::resolve(None, Some("maybe"), Some(true));
        assert!(caps.pro);
        assert_eq!(caps.source, CapabilitySource::Settings);
    }

    #[test]
    fn no_signal_is_free() {
        let caps = Capabilities::resolve(None, None, None);
        assert_eq!(caps, Capabilities::free());
        assert_eq!(caps.item_limit(), Some(FREE_ITEM_LIMIT));
        assert!(!caps.ratings_enabled());
    }

    #[test]
    fn pro_is_unlimited() {
        assert_eq!(Capabilities::pro().item_limit(), None);
        assert!(Capabilities::pro().ratings_enabled());
    }
}
