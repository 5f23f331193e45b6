//! Network namespace handle of the current process.
//!
//! The local NSM programs the workload's data plane inside this namespace,
//! so it travels with every admission request.

use crate::{NsmError, Result};
use std::path::Path;

/// Where the kernel exposes the network namespace of the calling process.
pub const SELF_NETNS_PATH: &str = "/proc/self/ns/net";

/// Resolve the network namespace of the current process.
///
/// Returns the namespace inode number, e.g. `"4026531993"`.
pub fn current_netns() -> Result<String> {
    netns_at(Path::new(SELF_NETNS_PATH))
}

/// Resolve the network namespace behind an `ns/net` link.
pub fn netns_at(link: &Path) -> Result<String> {
    let target = std::fs::read_link(link).map_err(|e| NsmError::io_with_path(e, link))?;
    let target = target.to_string_lossy();
    parse_netns_link(&target).ok_or_else(|| NsmError::Validation {
        field: "linux_namespace".to_string(),
        message: format!("unexpected namespace link target '{}'", target),
    })
}

/// Extract the inode from a `net:[<inode>]` link target.
pub fn parse_netns_link(target: &str) -> Option<String> {
    let inode = target.strip_prefix("net:[")?.strip_suffix(']')?;
    if inode.is_empty() || !inode.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(inode.to_string())
}
