use hsk_core::constants::DEFAULT_MAX_FILE_LENGTH;
use std::path::PathBuf;

/// Explicit configuration struct for the BlockStore (design note §9).
/// Unknown fields are rejected by callers that deserialize this from a
/// config file (see `hsknoded`'s config loader), matching the "unknown
/// fields at load time are an error" rule.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub dir: PathBuf,
    pub max_file_length: u32,
}

impl StoreOptions {
    pub fn new(dir: impl Into<PathBuf>) -> StoreOptions {
        StoreOptions { dir: dir.into(), max_file_length: DEFAULT_MAX_FILE_LENGTH }
    }
}
