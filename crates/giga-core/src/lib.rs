pub mod config;
pub mod logging;

pub mod control;
pub mod http;
pub mod ledger;
pub mod mission;
pub mod postprocess;
pub mod probe;
pub mod retry;
pub mod safe_resume;
pub mod scheduler;
pub mod segmenter;
pub mod selection;
pub mod storage;
