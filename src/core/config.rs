//! Compilation configuration.
//!
//! Defaults match the VideoCore IV target; every knob can be overridden through
//! `QPUC_*` environment variables (see [`Configuration::from_env`]).

use std::env;

/// Knobs read by the lowering pass and the module layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Configuration {
    /// Upper bound on the number of provenance links followed when looking for
    /// the base of a local. The reference relation is acyclic by construction,
    /// the bound only keeps a malformed input from looping forever.
    pub max_reference_depth: usize,
    /// Alignment (in bytes) of the total size of the global-data segment.
    pub global_segment_alignment: u32,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            max_reference_depth: 8,
            global_segment_alignment: 8,
        }
    }
}

impl Configuration {
    /// Build a configuration from the defaults, overridden by
    /// `QPUC_MAX_REFERENCE_DEPTH` and `QPUC_GLOBAL_ALIGNMENT` when set.
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Like [`Configuration::from_env`], with variables looked up through `lookup`.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(depth) = read_var(&lookup, "QPUC_MAX_REFERENCE_DEPTH") {
            config.max_reference_depth = depth;
        }
        if let Some(alignment) = read_var::<u32>(&lookup, "QPUC_GLOBAL_ALIGNMENT") {
            if alignment.is_power_of_two() {
                config.global_segment_alignment = alignment;
            } else {
                log::warn!("Ignoring QPUC_GLOBAL_ALIGNMENT={alignment}, not a power of two");
            }
        }
        config
    }
}

fn read_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("Ignoring {name}={raw}, not a number");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Configuration::default();
        assert_eq!(config.max_reference_depth, 8);
        assert_eq!(config.global_segment_alignment, 8);
    }

    fn vars(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            pairs
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn test_overrides() {
        let config = Configuration::from_vars(vars(&[
            ("QPUC_MAX_REFERENCE_DEPTH", " 3 "),
            ("QPUC_GLOBAL_ALIGNMENT", "16"),
        ]));
        assert_eq!(config.max_reference_depth, 3);
        assert_eq!(config.global_segment_alignment, 16);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = Configuration::from_vars(vars(&[
            ("QPUC_MAX_REFERENCE_DEPTH", "deep"),
            ("QPUC_GLOBAL_ALIGNMENT", "12"),
        ]));
        assert_eq!(config, Configuration::default());
    }

    #[test]
    fn test_from_env() {
        env::set_var("QPUC_GLOBAL_ALIGNMENT", "32");
        assert_eq!(Configuration::from_env().global_segment_alignment, 32);
        env::set_var("QPUC_GLOBAL_ALIGNMENT", "24");
        assert_eq!(Configuration::from_env().global_segment_alignment, 8);
        env::remove_var("QPUC_GLOBAL_ALIGNMENT");
    }
}
