//! Runtime configuration
//!
//! All VM state containers have fixed bounds. The defaults below match the
//! constants the VM was designed around; a TOML file can override any subset
//! of them for unusually deep or shallow programs.
//!
//! ```toml
//! stack_size = 8192
//! tape_size = 65536
//! ```

use serde::Deserialize;

/// Default value-stack depth, in cells.
pub const DEFAULT_STACK_SIZE: usize = 4096;
/// Default tape length, in cells.
pub const DEFAULT_TAPE_SIZE: usize = 4096;
/// Default call-stack depth, in frames.
pub const DEFAULT_CALL_STACK_SIZE: usize = 256;
/// Default block-stack depth.
pub const DEFAULT_BLOCK_STACK_SIZE: usize = 256;
/// Default pointer-history depth.
pub const DEFAULT_PTR_STACK_SIZE: usize = 256;
/// Default function-table size.
pub const DEFAULT_FUNCTION_TABLE_SIZE: usize = 256;

/// Sizes for every bounded piece of VM state.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub stack_size: usize,
    pub tape_size: usize,
    pub call_stack_size: usize,
    pub block_stack_size: usize,
    pub ptr_stack_size: usize,
    pub function_table_size: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            stack_size: DEFAULT_STACK_SIZE,
            tape_size: DEFAULT_TAPE_SIZE,
            call_stack_size: DEFAULT_CALL_STACK_SIZE,
            block_stack_size: DEFAULT_BLOCK_STACK_SIZE,
            ptr_stack_size: DEFAULT_PTR_STACK_SIZE,
            function_table_size: DEFAULT_FUNCTION_TABLE_SIZE,
        }
    }
}

impl RunConfig {
    /// Parse a configuration from TOML text. Absent keys keep their
    /// defaults; unknown keys are an error.
    pub fn from_toml(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("invalid runtime config: {}", e))
    }
}
