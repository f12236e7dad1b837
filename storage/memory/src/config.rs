/// Configuration for a [`MemoryEngine`](crate::MemoryEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Name of the thread that runs requests and their callbacks.
    pub thread_name: String,
    /// Reported by the availability probe. Turning it off emulates a runtime
    /// without the engine.
    pub available: bool,
}

impl Default for MemoryConfig {
    fn default() -> Self { Self { thread_name: "shelf-memory".to_owned(), available: true } }
}

impl MemoryConfig {
    pub fn builder() -> MemoryConfigBuilder { MemoryConfigBuilder::default() }
}

#[derive(Debug, Default)]
pub struct MemoryConfigBuilder {
    config: MemoryConfig,
}

impl MemoryConfigBuilder {
    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.thread_name = name.into();
        self
    }

    pub fn available(mut self, available: bool) -> Self {
        self.config.available = available;
        self
    }

    pub fn build(self) -> MemoryConfig { self.config }
}
