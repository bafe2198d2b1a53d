//! Environment variables read once, at boot, and carried down as plain
//! fields — never re-read ad hoc deep in the core, per the "singleton to
//! explicit dependency" redesign flag.

use std::path::PathBuf;

/// The variable name the resource directory is read from. Exposed so a
/// host can document/override it without the core hard-coding string
/// literals at multiple call sites.
pub const RESOURCE_DIR_VAR: &str = "PANEHUB_RESOURCE_DIR";

#[derive(Clone, Debug, Default)]
pub struct BootEnv {
    /// `NO_COLOR` as seen by the process. The core never sets or unsets
    /// this itself — child PTYs need it absent to receive color — but it
    /// records whether the host's launch environment left it set, so a
    /// misconfigured launcher is visible in the boot trace rather than
    /// silently producing monochrome terminals.
    pub no_color_set: bool,
    pub resource_dir: Option<PathBuf>,
}

impl BootEnv {
    pub fn from_process_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Testable constructor: takes a lookup function instead of reading
    /// `std::env` directly.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            no_color_set: lookup("NO_COLOR").is_some(),
            resource_dir: lookup(RESOURCE_DIR_VAR).map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn reads_no_color_and_resource_dir_from_injected_vars() {
        let mut vars = HashMap::new();
        vars.insert("NO_COLOR".to_string(), "1".to_string());
        vars.insert(RESOURCE_DIR_VAR.to_string(), "/opt/panehub/resources".to_string());
        let env = BootEnv::from_vars(|key| vars.get(key).cloned());
        assert!(env.no_color_set);
        assert_eq!(env.resource_dir, Some(PathBuf::from("/opt/panehub/resources")));
    }

    #[test]
    fn absent_vars_yield_defaults() {
        let env = BootEnv::from_vars(|_| None);
        assert!(!env.no_color_set);
        assert_eq!(env.resource_dir, None);
    }
}
