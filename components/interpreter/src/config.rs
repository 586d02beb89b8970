//! VM configuration

use memory_manager::GcConfig;

/// Runtime limits and collector pacing for a [`Vm`](crate::Vm)
#[derive(Debug, Clone, PartialEq)]
pub struct VmConfig {
    /// Maximum number of nested script frames before a RangeError
    pub max_call_depth: usize,
    /// Largest run of null slots a single array write may create
    pub max_array_gap: usize,
    /// Collector pacing
    pub gc: GcConfig,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 512,
            max_array_gap: 1 << 20,
            gc: GcConfig::default(),
        }
    }
}

impl VmConfig {
    /// Set the call depth limit
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Set how far past the end an array write may land
    pub fn with_max_array_gap(mut self, gap: usize) -> Self {
        self.max_array_gap = gap;
        self
    }

    /// Set the collector configuration
    pub fn with_gc(mut self, gc: GcConfig) -> Self {
        self.gc = gc;
        self
    }
}
