//! On-disk WAL file and record framing.

pub mod record;
