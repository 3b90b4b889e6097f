use std::path::Path;

use crate::config::extension::EXTENSION_KEY;
use crate::error::{ProvisionError, ProvisionResult};

/// Block appended by [`init`].
pub const DEFAULT_BLOCK: &str = "\nx-provision:\n  keys:\n    - ~/.ssh/id_rsa.pub\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    Added,
    AlreadyPresent,
}

/// Append the default `x-provision` block to the config file at
/// `path` unless a top-level `x-provision:` key is already there.
pub fn init(path: &Path) -> ProvisionResult<InitOutcome> {
    if !path.exists() {
        return Err(ProvisionError::ConfigNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)?;
    if has_extension_block(&content) {
        return Ok(InitOutcome::AlreadyPresent);
    }

    let mut updated = content;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(DEFAULT_BLOCK);
    std::fs::write(path, updated)?;

    Ok(InitOutcome::Added)
}

#[must_use]
pub fn has_extension_block(content: &str) -> bool {
    let header = format!("{EXTENSION_KEY}:");
    content.lines().any(|line| line.starts_with(&header))
}
