//! Output sinks for encoded markup.

mod sink;

pub use sink::EncodedSink;
