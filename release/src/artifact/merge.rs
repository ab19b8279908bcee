//! Shallow channel configuration merge.
//!
//! Each tier replaces whole values key by key: a nested record re-specified
//! in a higher tier replaces the lower tier's record outright. Keys a higher
//! tier does not mention are kept.

use crate::manifest::{ChannelMap, DeploymentConfig};

/// Merge `overrides` over `base`, one channel at a time.
///
/// Channels named only in `overrides` are added as-is. Neither input is
/// modified.
///
/// # Examples
///
/// ```
/// use otaship_release::artifact::merge_channels;
/// use otaship_release::manifest::ChannelMap;
/// use serde_json::json;
///
/// let base: ChannelMap = serde_json::from_value(json!({"mqtt": {"qos": 1, "topic": "a"}}))
///     .expect("channel map");
/// let overrides: ChannelMap = serde_json::from_value(json!({"mqtt": {"qos": 2}}))
///     .expect("channel map");
///
/// let merged = merge_channels(&base, &overrides);
/// assert_eq!(merged["mqtt"]["qos"], 2);
/// assert_eq!(merged["mqtt"]["topic"], "a");
/// ```
#[must_use]
pub fn merge_channels(base: &ChannelMap, overrides: &ChannelMap) -> ChannelMap {
    let mut merged = base.clone();
    for (name, config) in overrides {
        let target = merged.entry(name.clone()).or_default();
        for (key, value) in config {
            target.insert(key.clone(), value.clone());
        }
    }
    merged
}

impl DeploymentConfig {
    /// Merge `overrides` over a copy of the default channel configurations.
    #[must_use]
    pub fn merge_channels(&self, overrides: &ChannelMap) -> ChannelMap {
        merge_channels(&self.channel_configs(), overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Channel;
    use serde_json::{Value, json};
    use std::collections::BTreeMap;

    fn channels(value: Value) -> ChannelMap {
        serde_json::from_value(value).expect("channel map")
    }

    fn deployment(value: Value) -> DeploymentConfig {
        let channels = channels(value)
            .into_iter()
            .map(|(name, config)| (name.clone(), Channel::new(name, config)))
            .collect::<BTreeMap<_, _>>();
        DeploymentConfig::new(channels, vec!["mqtt".to_owned()])
    }

    #[test]
    fn three_tiers_resolve_highest_precedence() {
        let defaults = deployment(json!({"mqtt": {"qos": 1}}));
        let version = defaults.merge_channels(&channels(json!({"mqtt": {"topic": "x"}})));
        let artifact = merge_channels(&version, &channels(json!({"mqtt": {"qos": 2}})));

        assert_eq!(artifact, channels(json!({"mqtt": {"qos": 2, "topic": "x"}})));
    }

    #[test]
    fn nested_values_are_replaced_wholesale() {
        let base = channels(json!({"https": {"headers": {"A": "1", "B": "2"}, "url": "u"}}));
        let overrides = channels(json!({"https": {"headers": {"C": "3"}}}));

        let merged = merge_channels(&base, &overrides);
        assert_eq!(merged["https"]["headers"], json!({"C": "3"}));
        assert_eq!(merged["https"]["url"], "u");
    }

    #[test]
    fn unknown_override_channels_are_added() {
        let base = channels(json!({"mqtt": {"qos": 1}}));
        let merged = merge_channels(&base, &channels(json!({"https": {"url": "u"}})));

        assert_eq!(merged.len(), 2);
        assert_eq!(merged["mqtt"], base["mqtt"]);
        assert_eq!(merged["https"]["url"], "u");
    }

    #[test]
    fn defaults_are_not_mutated() {
        let defaults = deployment(json!({"mqtt": {"qos": 1}}));
        let merged = defaults.merge_channels(&channels(json!({"mqtt": {"qos": 0}})));

        assert_eq!(merged["mqtt"]["qos"], 0);
        assert_eq!(defaults.channel_configs(), channels(json!({"mqtt": {"qos": 1}})));
    }

    #[test]
    fn empty_overrides_return_the_base() {
        let base = channels(json!({"mqtt": {"qos": 1}, "https": {"url": "u"}}));
        assert_eq!(merge_channels(&base, &ChannelMap::new()), base);
    }
}
