//! Compilation options.
//!
//! Deserializable so a front-end can carry them in its config file.

use serde::{Deserialize, Serialize};

/// The platform the policy database targets.
///
/// Xen adds the pirq/iomem/ioport/pcidevice object-context kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetPlatform {
    Selinux,
    Xen,
}

/// Options for one compilation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileOptions {
    /// Emit levels, ranges, and MLS constraints.
    pub mls: bool,
    /// Drop dontaudit rules instead of emitting audit-deny masks.
    pub disable_dontaudit: bool,
    /// Which ocontext kinds to emit.
    pub target_platform: TargetPlatform,
}

impl Default for CompileOptions {
    fn default() -> Self {
        CompileOptions {
            mls: false,
            disable_dontaudit: false,
            target_platform: TargetPlatform::Selinux,
        }
    }
}
