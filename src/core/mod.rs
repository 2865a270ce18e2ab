pub mod detector;
pub mod engine;
pub mod error;
pub mod formatter;
pub mod listener;
pub mod notify;
pub mod registry;
pub mod render_loop;
pub mod snapshot;
pub mod source;
pub mod status;
pub mod tracker;
