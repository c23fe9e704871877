use serde::{Deserialize, Serialize};

use crate::view::SortMethod;

/// Magic bytes for preference file identification
pub const PREFS_MAGIC: [u8; 4] = *b"SVPF";

/// Current preference format version
pub const PREFS_VERSION: u32 = 1;

/// The subset of view options that outlives a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StoredPrefs {
    pub show_details: bool,
    pub sort_method: SortMethod,
    pub pin_filter: bool,
}
