pub mod convert_handler;
pub mod job_handler;
pub mod response;
pub mod upload;
pub mod utils;
