pub mod api_error;
pub mod constants;
pub mod schemas;
pub mod telemetry;
pub mod time_utils;
pub mod trace_context;
pub mod url_utils;
