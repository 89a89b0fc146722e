//! IO modules - side effects (network, filesystem)

pub mod checksum;
pub mod transport;
