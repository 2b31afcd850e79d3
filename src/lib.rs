pub mod backup;
pub mod db;
pub mod diagnostics;
pub mod ipc;
pub mod legacy;
pub mod merge;
pub mod migrate;
pub mod recover;
pub mod shape;
pub mod store;
