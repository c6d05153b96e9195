pub mod cache;
pub mod connectivity;
pub mod logging;
pub mod remote;
pub mod storage;
