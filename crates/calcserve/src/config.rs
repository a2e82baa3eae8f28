use serde::Deserialize;

use crate::{Error, Result};

const MIN_STACK_SIZE: usize = 16 * 1024;

/// Worker thread settings for a [`crate::ComputeServer`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Name given to the worker thread
    pub thread_name: String,
    /// Worker stack size in bytes, platform default when `None`
    pub stack_size: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            thread_name: "calcserve-worker".to_string(),
            stack_size: None,
        }
    }
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if self.thread_name.trim().is_empty() {
            return Err(Error::InvalidConfig("thread_name must not be empty"));
        }
        if self.thread_name.contains('\0') {
            return Err(Error::InvalidConfig("thread_name must not contain NUL"));
        }
        if let Some(size) = self.stack_size {
            if size < MIN_STACK_SIZE {
                return Err(Error::InvalidConfig("stack_size must be at least 16 KiB"));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    pub fn thread_name<S: Into<String>>(mut self, name: S) -> Self {
        self.config.thread_name = name.into();
        self
    }

    pub fn stack_size(mut self, size: usize) -> Self {
        self.config.stack_size = Some(size);
        self
    }

    pub fn build(self) -> Result<ServerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
