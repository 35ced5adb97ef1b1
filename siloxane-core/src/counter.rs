//! CRDT counters.
//!
//! Counters converge by summing per-replica deltas. They carry no vector
//! clock and are never "not found": the first update creates the counter and
//! a read of one never updated returns zero.

use tracing::instrument;

use crate::client::Client;
use crate::codec::{CounterGetReq, CounterUpdateReq};
use crate::error::Error;
use crate::options::QuorumOptions;
use crate::transport::Transport;

impl<T: Transport> Client<T> {
    /// Adds `delta` (possibly negative) to the counter at `bucket/key`.
    ///
    /// Recognized options: `w`, `dw`, `pw`.
    #[instrument(level = "debug", skip(self, options))]
    pub fn counter_update(
        &mut self,
        bucket: &str,
        key: &str,
        delta: i64,
        options: &QuorumOptions,
    ) -> Result<(), Error> {
        let quorum = options.write_quorum();
        let request = CounterUpdateReq {
            bucket: bucket.as_bytes().to_vec(),
            key: key.as_bytes().to_vec(),
            amount: delta,
            w: quorum.w,
            dw: quorum.dw,
            pw: quorum.pw,
            return_value: true,
        };
        self.round_trip(&request)?;
        Ok(())
    }

    /// Returns the converged value of the counter at `bucket/key`.
    ///
    /// Recognized options: `r`, `pr`.
    #[instrument(level = "debug", skip(self, options))]
    pub fn counter_get(
        &mut self,
        bucket: &str,
        key: &str,
        options: &QuorumOptions,
    ) -> Result<i64, Error> {
        let quorum = options.read_quorum();
        let request = CounterGetReq {
            bucket: bucket.as_bytes().to_vec(),
            key: key.as_bytes().to_vec(),
            r: quorum.r,
            pr: quorum.pr,
        };
        let response = self.round_trip(&request)?;
        Ok(response.value.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryCluster;

    #[test]
    fn counter_accumulates() {
        let cluster = MemoryCluster::new();
        let mut client = Client::new(cluster.connect());
        let none = QuorumOptions::default();

        client.counter_update("counters", "hits", 10, &none).unwrap();
        client.counter_update("counters", "hits", 1, &none).unwrap();
        assert_eq!(client.counter_get("counters", "hits", &none).unwrap(), 11);
    }

    #[test]
    fn fresh_counter_reads_zero() {
        let cluster = MemoryCluster::new();
        let mut client = Client::new(cluster.connect());
        let value = client
            .counter_get("counters", "never", &QuorumOptions::default())
            .unwrap();
        assert_eq!(value, 0);
    }

    #[test]
    fn negative_deltas_and_replicas_sum() {
        let cluster = MemoryCluster::new();
        let mut a = Client::new(cluster.connect());
        let mut b = Client::new(cluster.connect());
        let none = QuorumOptions::default();

        a.counter_update("counters", "stock", 5, &none).unwrap();
        b.counter_update("counters", "stock", -2, &none).unwrap();
        a.counter_update("counters", "stock", 4, &none).unwrap();

        assert_eq!(a.counter_get("counters", "stock", &none).unwrap(), 7);
        assert_eq!(b.counter_get("counters", "stock", &none).unwrap(), 7);
    }

    #[test]
    fn quorum_overrides_reach_the_store() {
        let cluster = MemoryCluster::new();
        let mut client = Client::new(cluster.connect());

        let ok = QuorumOptions::from([("w", 2), ("dw", 1), ("bogus", 99)]);
        client.counter_update("counters", "q", 1, &ok).unwrap();

        let too_many = QuorumOptions::from([("pr", 7)]);
        let err = client.counter_get("counters", "q", &too_many).unwrap_err();
        assert!(matches!(err, Error::Server { .. }));
    }
}
