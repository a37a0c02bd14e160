pub mod edns;
pub mod envelope;
pub mod wire;

pub use edns::{EdnsSection, OptRecordAppender};
pub use envelope::EnvelopeOverhead;
