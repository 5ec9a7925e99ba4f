use rand::RngCore;

use crate::stratum::protocol::NotifyBody;

/// Size of a serialized mineable header
pub const HEADER_SIZE: usize = 180;

/// Proof-of-work template offered to miners.
///
/// The request id and header only ever travel together, so a notify can
/// never be built for half a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub mining_request_id: u64,
    pub header: Vec<u8>,
}

impl Job {
    pub fn new(mining_request_id: u64, header: Vec<u8>) -> Self {
        Self { mining_request_id, header }
    }

    /// Random header for running the server without a node attached
    pub fn placeholder(mining_request_id: u64) -> Self {
        let mut header = vec![0u8; HEADER_SIZE];
        rand::thread_rng().fill_bytes(&mut header);
        Self::new(mining_request_id, header)
    }

    pub fn header_hex(&self) -> String {
        hex::encode(&self.header)
    }

    pub fn notify_body(&self) -> NotifyBody {
        NotifyBody {
            mining_request_id: self.mining_request_id,
            header: self.header_hex(),
        }
    }
}
