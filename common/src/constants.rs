pub const DEFAULT_REFRESH_SECS: u64 = 60;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

// Unchanged-timestamp observations tolerated before a server is excluded.
pub const DEFAULT_STALE_TOLERANCE: u32 = 5;

pub const LINK_PAIR_SEP: char = ':';
pub const PATH_SEP: char = '/';
pub const SCHEME_SEP: &str = "://";

pub const FS_STAT_PREFIX: &str = "/fs/stat";
pub const FS_LS_PREFIX: &str = "/fs/ls";
pub const FS_READ_PREFIX: &str = "/fs/read";
pub const FS_WRITE_PREFIX: &str = "/fs/write";
pub const CALL_PREFIX: &str = "/call";
pub const CALL_ASYNC_PREFIX: &str = "/call/async";

pub const WRITE_FILE_FIELD: &str = "file";
pub const CALL_ARGS_FIELD: &str = "args";

pub const STATE_OK: i32 = 0;
