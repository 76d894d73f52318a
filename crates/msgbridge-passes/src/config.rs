//! Transform configuration.

use msgbridge_core::{PointerWidth, TargetInfo};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Width used for machine-sized values in generated type encodings.
    pub pointer_width: PointerWidth,
    /// Route eligible sends through the shared trampolines.
    pub generic_dispatch: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            pointer_width: PointerWidth::U64,
            generic_dispatch: true,
        }
    }
}

impl BridgeConfig {
    pub fn for_target(target: &TargetInfo) -> Self {
        BridgeConfig {
            pointer_width: target.pointer_width,
            ..Default::default()
        }
    }

    pub fn with_generic_dispatch(mut self, enabled: bool) -> Self {
        self.generic_dispatch = enabled;
        self
    }
}
