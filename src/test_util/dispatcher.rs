use std::sync::Arc;
use async_trait::async_trait;
use tokio::sync::RwLock;
use crate::listeners::DataDispatcher;
use crate::peer::MulticastPeer;
use crate::sequence_number::SequenceNumber;

/// Records all delivered data as `(source, sequence, payload)`
#[derive(Default)]
pub struct CollectingDataDispatcher {
    delivered: RwLock<Vec<(MulticastPeer, SequenceNumber, Vec<u8>)>>,
}

impl CollectingDataDispatcher {
    pub fn new() -> Arc<CollectingDataDispatcher> {
        Default::default()
    }

    pub async fn delivered(&self) -> Vec<(u64, u64, Vec<u8>)> {
        self.delivered.read().await
            .iter()
            .map(|(source, sequence, payload)| (source.to_raw(), sequence.to_raw(), payload.clone()))
            .collect()
    }

    /// the sequence numbers of all delivered data, in ascending order
    pub async fn delivered_sequences(&self) -> Vec<u64> {
        let mut result = self.delivered().await
            .into_iter()
            .map(|(_, sequence, _)| sequence)
            .collect::<Vec<_>>();
        result.sort();
        result
    }
}

#[async_trait]
impl DataDispatcher for CollectingDataDispatcher {
    async fn on_data(&self, source: MulticastPeer, sequence: SequenceNumber, payload: &[u8]) {
        self.delivered.write().await.push((source, sequence, payload.to_vec()));
    }
}
