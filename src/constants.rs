// -
// Backoff

/// Delay before the second attempt of any backoff loop
pub(crate) const BACKOFF_STARTING_DELAY_MS: u64 = 100;

/// Growth factor applied to the delay after every failed attempt
pub(crate) const BACKOFF_TIME_MULTIPLE: u32 = 2;

// -
// Engine feed events

pub const CHANGE_EVENT: &str = "change";
pub const RENAME_EVENT: &str = "rename";
pub const WATCH_EVENT: &str = "watch_";
pub const CLOSE_EVENT: &str = "close";

/// Wildcard accepted by `unwatch_file`
pub const UNWATCH_ALL: &str = "*";

/// Prefix of generated emitter names
pub(crate) const ANONYMOUS_EMITTER_PREFIX: &str = "anonymous-";
