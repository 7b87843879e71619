// The device-side protocol stack, bottom up: byte transport, outer
// frame link, embedded record layer, and the query session on top.
pub mod address;
pub mod catalog;
pub mod checksum;
pub mod decode;
pub mod frame;
pub mod link;
pub mod query;
pub mod record;
pub mod snapshot;
pub mod stuffing;
pub mod transport;
