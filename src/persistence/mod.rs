//! On-disk persistence: the newline-delimited JSON item format and the
//! backup file that is loaded at start and rewritten at shutdown.

pub mod backup_file;
pub mod snapshot;
