/// Console-level configuration for routing, registry upkeep and the
/// affinity delegate.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Type whose members page `/` redirects to.
    pub root_type: String,
    /// Interval between registry sweeps in milliseconds.
    pub sweep_interval_ms: u64,
    /// Whether calls run on a single designated thread instead of inline.
    pub affinity: bool,
    /// Bounded queue capacity in front of the designated thread.
    pub affinity_queue_capacity: usize,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            root_type: "System".to_string(),
            sweep_interval_ms: 60_000,
            affinity: false,
            affinity_queue_capacity: 64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_config_defaults() {
        let config = ConsoleConfig::default();
        assert_eq!(config.root_type, "System");
        assert_eq!(config.sweep_interval_ms, 60_000);
        assert!(!config.affinity);
        assert_eq!(config.affinity_queue_capacity, 64);
    }
}
