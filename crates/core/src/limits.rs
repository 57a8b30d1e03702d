//! Size limits for incoming events.
//!
//! Limits bound memory per event and keep dimension keys small enough
//! to live inside a single stats document.
//!
//! The `#[validate]` derive macro requires literal values in attributes,
//! so field limits are duplicated there. Keep both in sync when modifying.

/// Event type name max length.
pub const MAX_EVENT_TYPE_LEN: usize = 100;

/// Tracked path max length.
pub const MAX_PATH_LEN: usize = 2000;

/// Session / visitor identifier max length.
/// UUIDs=36, emails=~50, custom IDs up to 128.
pub const MAX_ID_LEN: usize = 128;

/// Referrer URL max length.
/// Matches HTTP Referer header limit.
pub const MAX_REFERRER_LEN: usize = 2048;

/// User agent string max length.
/// Browser UAs: 100-300 typical, 500+ with extensions.
pub const MAX_USER_AGENT_LEN: usize = 512;

/// Device / browser / OS dimension value max length.
pub const MAX_DIMENSION_LEN: usize = 64;

/// Screen or viewport dimension string max length ("1920x1080").
pub const MAX_RESOLUTION_LEN: usize = 32;

/// Maximum serialized size of the open user_props / metadata maps (16KB).
/// Most real-world payloads are under 1KB.
pub const MAX_PROPS_BYTES: usize = 16 * 1024;
