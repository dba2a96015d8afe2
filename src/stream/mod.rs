mod server;
mod slot;

pub use server::serve;
pub use slot::{EncodedFrame, JpegSink, LatestFrame, encode_jpeg};
