//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// Project-manager persona for the chat agent
pub const SYSTEM: &str = include_str!("../../prompts/system.pmt");

/// One-shot task decomposition prompt
pub const DECOMPOSE: &str = include_str!("../../prompts/decompose.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "system" => Some(SYSTEM),
        "decompose" => Some(DECOMPOSE),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_embedded_system() {
        let system = get_embedded("system").unwrap();
        assert!(system.contains("MoSCoW"));
        assert!(system.contains("{{company}}"));
        assert!(system.trim_end().ends_with("The current date is: {{today}}"));
    }

    #[test]
    fn test_get_embedded_decompose() {
        let decompose = get_embedded("decompose").unwrap();
        assert!(decompose.contains("submit_tasks"));
        assert!(decompose.contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("unknown-template").is_none());
    }
}
