//! Contains the [PipelineBuilder] used to construct a full
//! [DerivationPipeline].

use super::DerivationPipeline;
use crate::{
    stages::{
        AttributesQueue, BatchProvider, BatchStream, ChannelProvider, ChannelReader, FrameQueue,
        L1Retrieval, L1Traversal, StatefulAttributesBuilder,
    },
    traits::{ChainProvider, DataAvailabilityProvider, L2ChainProvider},
    types::RollupConfig,
};
use alloc::sync::Arc;
use core::fmt::Debug;

/// The full stage stack of the derivation pipeline, composed bottom-up.
type PipelineStack<L1, L2, DAP> = AttributesQueue<
    BatchProvider<
        BatchStream<ChannelReader<ChannelProvider<FrameQueue<L1Retrieval<DAP, L1Traversal<L1>>>>>>,
        L2,
    >,
    StatefulAttributesBuilder<L1, L2>,
>;

/// The [PipelineBuilder] constructs a [DerivationPipeline] from its external
/// collaborators: the L1 chain provider, the L2 chain provider, and the data
/// availability provider.
#[derive(Debug)]
pub struct PipelineBuilder<L1, L2, DAP>
where
    L1: ChainProvider + Clone + Send + Sync + Debug,
    L2: L2ChainProvider + Clone + Send + Sync + Debug,
    DAP: DataAvailabilityProvider + Send + Sync + Debug,
{
    chain_provider: Option<L1>,
    l2_chain_provider: Option<L2>,
    dap_source: Option<DAP>,
    rollup_config: Option<Arc<RollupConfig>>,
}

impl<L1, L2, DAP> Default for PipelineBuilder<L1, L2, DAP>
where
    L1: ChainProvider + Clone + Send + Sync + Debug,
    L2: L2ChainProvider + Clone + Send + Sync + Debug,
    DAP: DataAvailabilityProvider + Send + Sync + Debug,
{
    fn default() -> Self {
        Self {
            chain_provider: None,
            l2_chain_provider: None,
            dap_source: None,
            rollup_config: None,
        }
    }
}

impl<L1, L2, DAP> PipelineBuilder<L1, L2, DAP>
where
    L1: ChainProvider + Clone + Send + Sync + Debug,
    L2: L2ChainProvider + Clone + Send + Sync + Debug,
    DAP: DataAvailabilityProvider + Send + Sync + Debug,
{
    /// Creates a new pipeline builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rollup config for the pipeline.
    pub fn rollup_config(mut self, rollup_config: Arc<RollupConfig>) -> Self {
        self.rollup_config = Some(rollup_config);
        self
    }

    /// Sets the L1 chain provider for the pipeline.
    pub fn chain_provider(mut self, chain_provider: L1) -> Self {
        self.chain_provider = Some(chain_provider);
        self
    }

    /// Sets the L2 chain provider for the pipeline.
    pub fn l2_chain_provider(mut self, l2_chain_provider: L2) -> Self {
        self.l2_chain_provider = Some(l2_chain_provider);
        self
    }

    /// Sets the data availability provider for the pipeline.
    pub fn dap_source(mut self, dap_source: DAP) -> Self {
        self.dap_source = Some(dap_source);
        self
    }

    /// Builds the pipeline, linking all stages bottom-up.
    pub fn build(self) -> DerivationPipeline<PipelineStack<L1, L2, DAP>, L2> {
        self.into()
    }
}

impl<L1, L2, DAP> From<PipelineBuilder<L1, L2, DAP>>
    for DerivationPipeline<PipelineStack<L1, L2, DAP>, L2>
where
    L1: ChainProvider + Clone + Send + Sync + Debug,
    L2: L2ChainProvider + Clone + Send + Sync + Debug,
    DAP: DataAvailabilityProvider + Send + Sync + Debug,
{
    fn from(builder: PipelineBuilder<L1, L2, DAP>) -> Self {
        let rollup_config = builder.rollup_config.expect("rollup config must be set");
        let chain_provider = builder.chain_provider.expect("chain provider must be set");
        let l2_chain_provider =
            builder.l2_chain_provider.expect("l2 chain provider must be set");
        let dap_source = builder.dap_source.expect("dap source must be set");

        let attributes_builder = StatefulAttributesBuilder::new(
            Arc::clone(&rollup_config),
            chain_provider.clone(),
            l2_chain_provider.clone(),
        );

        // Instantiate and link all the stages.
        let l1_traversal = L1Traversal::new(chain_provider, Arc::clone(&rollup_config));
        let l1_retrieval = L1Retrieval::new(l1_traversal, dap_source);
        let frame_queue = FrameQueue::new(l1_retrieval);
        let channel_provider = ChannelProvider::new(Arc::clone(&rollup_config), frame_queue);
        let channel_reader = ChannelReader::new(channel_provider, Arc::clone(&rollup_config));
        let batch_stream = BatchStream::new(channel_reader, Arc::clone(&rollup_config));
        let batch_provider = BatchProvider::new(
            Arc::clone(&rollup_config),
            batch_stream,
            l2_chain_provider.clone(),
        );
        let attributes =
            AttributesQueue::new(Arc::clone(&rollup_config), batch_provider, attributes_builder);

        DerivationPipeline::new(attributes, rollup_config, l2_chain_provider)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        sources::EthereumDataSource,
        test_utils::{TestBlobProvider, TestChainProvider, TestL2ChainProvider, TestTxBuilder},
        traits::{Pipeline, SignalReceiver},
        types::{
            BlockID, BlockInfo, ChainGenesis, Frame, L2BlockInfo, RawTransaction, ResetSignal,
            SingleBatch, StepResult, SystemConfig,
        },
    };
    use alloc::{vec, vec::Vec};
    use alloy_consensus::{Header, TxEnvelope};
    use alloy_primitives::{address, b256, hex, Address, Bytes};
    use alloy_rlp::Encodable;
    use miniz_oxide::deflate::compress_to_vec_zlib;

    const INBOX: Address = address!("ff00000000000000000000000000000000000010");

    /// Encodes a batch into a single-frame channel inside one batcher
    /// transaction payload.
    fn batcher_payload(batch: &SingleBatch) -> Vec<u8> {
        let mut content = Vec::new();
        batch.encode(&mut content);
        let mut versioned = vec![0x00];
        versioned.extend_from_slice(&content);

        let mut rlp_wrapped = Vec::new();
        Bytes::from(versioned).encode(&mut rlp_wrapped);
        let compressed = compress_to_vec_zlib(&rlp_wrapped, 6);

        let frame =
            Frame { id: [0xAB; 16], number: 0, data: compressed, is_last: true };
        let mut payload = vec![crate::params::DERIVATION_VERSION_0];
        payload.extend_from_slice(&frame.encode());
        payload
    }

    struct Scenario {
        pipeline: DerivationPipeline<
            PipelineStack<
                TestChainProvider,
                TestL2ChainProvider,
                EthereumDataSource<TestChainProvider, TestBlobProvider>,
            >,
            TestL2ChainProvider,
        >,
        safe_head: L2BlockInfo,
    }

    /// Builds a pipeline over a single L1 block carrying the given batcher
    /// transaction, reset to that block.
    async fn scenario_with_tx(tx: TxEnvelope, batcher: Address) -> Scenario {
        let l1_hash =
            b256!("aaaa000000000000000000000000000000000000000000000000000000000000");
        let safe_hash =
            b256!("bbbb000000000000000000000000000000000000000000000000000000000000");
        let l1_block = BlockInfo { hash: l1_hash, number: 10, timestamp: 100, ..Default::default() };
        let safe_head = L2BlockInfo {
            block_info: BlockInfo {
                hash: safe_hash,
                number: 40,
                timestamp: 100,
                ..Default::default()
            },
            l1_origin: BlockID { hash: l1_hash, number: 10 },
            seq_num: 0,
        };

        let cfg = Arc::new(RollupConfig {
            block_time: 2,
            max_sequencer_drift: 600,
            seq_window_size: 100,
            channel_timeout: 10,
            batch_inbox_address: INBOX,
            genesis: ChainGenesis { l2_time: 0, ..Default::default() },
            ..Default::default()
        });

        let mut l1_provider = TestChainProvider::default();
        l1_provider.insert_block_with_transactions(10, l1_block, vec![tx]);
        l1_provider
            .insert_header(l1_hash, Header { number: 10, timestamp: 100, ..Default::default() });

        let mut l2_provider = TestL2ChainProvider::default();
        let system_config =
            SystemConfig { batcher_address: batcher, gas_limit: 30_000_000, ..Default::default() };
        l2_provider.system_configs.push((safe_head.block_info.number, system_config));

        let dap =
            EthereumDataSource::new(l1_provider.clone(), TestBlobProvider::default(), &cfg);

        let mut pipeline = PipelineBuilder::new()
            .rollup_config(cfg)
            .chain_provider(l1_provider)
            .l2_chain_provider(l2_provider)
            .dap_source(dap)
            .build();
        pipeline
            .signal(ResetSignal { l1_origin: l1_block, l2_safe_head: safe_head, ..Default::default() }.signal())
            .await
            .unwrap();

        Scenario { pipeline, safe_head }
    }

    #[tokio::test]
    async fn test_calldata_batch_to_attributes() {
        let builder = TestTxBuilder::default();
        let batch = SingleBatch {
            parent_hash: b256!("bbbb000000000000000000000000000000000000000000000000000000000000"),
            epoch_num: 10,
            epoch_hash: b256!("aaaa000000000000000000000000000000000000000000000000000000000000"),
            timestamp: 102,
            transactions: vec![RawTransaction(hex!("02aabb").into())],
        };
        let tx = builder.signed_calldata_tx(INBOX, &batcher_payload(&batch));
        let Scenario { mut pipeline, safe_head } =
            scenario_with_tx(tx, builder.batcher_address()).await;

        // Step the pipeline until attributes are produced; the data
        // percolates up one stage per step.
        let mut produced = false;
        for _ in 0..16 {
            match pipeline.step(safe_head).await {
                StepResult::PreparedAttributes => {
                    produced = true;
                    break;
                }
                StepResult::AdvancedOrigin |
                StepResult::StepFailed(_) |
                StepResult::OriginAdvanceErr(_) => {}
            }
        }
        assert!(produced, "pipeline did not produce attributes");

        let attributes = pipeline.next().unwrap();
        assert_eq!(attributes.parent, safe_head);
        assert_eq!(attributes.attributes.timestamp, 102);
        assert!(attributes.attributes.no_tx_pool);
        assert_eq!(attributes.derived_from.number, 10);
        // The L1 info deposit leads, followed by the batch transactions in
        // order.
        assert_eq!(attributes.attributes.transactions.len(), 2);
        assert!(attributes.attributes.transactions[0].is_deposit());
        assert_eq!(
            attributes.attributes.transactions[1],
            RawTransaction(hex!("02aabb").into())
        );
    }

    #[tokio::test]
    async fn test_unauthorized_batcher_produces_nothing() {
        // The transaction is signed by an unrelated key: the configured
        // batcher address never signed it, so no frames are extracted and no
        // batches are produced from the block.
        let unrelated = TestTxBuilder::random_key();
        let batch = SingleBatch {
            parent_hash: b256!("bbbb000000000000000000000000000000000000000000000000000000000000"),
            epoch_num: 10,
            epoch_hash: b256!("aaaa000000000000000000000000000000000000000000000000000000000000"),
            timestamp: 102,
            transactions: vec![],
        };
        let tx = unrelated.signed_calldata_tx(INBOX, &batcher_payload(&batch));
        let authorized = TestTxBuilder::default().batcher_address();
        let Scenario { mut pipeline, safe_head } = scenario_with_tx(tx, authorized).await;

        for _ in 0..16 {
            match pipeline.step(safe_head).await {
                StepResult::PreparedAttributes => panic!("unauthorized data was derived"),
                StepResult::OriginAdvanceErr(_) => break,
                _ => {}
            }
        }
        assert!(pipeline.peek().is_none());
    }

    #[tokio::test]
    async fn test_determinism_across_instances() {
        // Two pipelines over identical L1 data produce identical attributes.
        let builder = TestTxBuilder::default();
        let batch = SingleBatch {
            parent_hash: b256!("bbbb000000000000000000000000000000000000000000000000000000000000"),
            epoch_num: 10,
            epoch_hash: b256!("aaaa000000000000000000000000000000000000000000000000000000000000"),
            timestamp: 102,
            transactions: vec![RawTransaction(hex!("02aabb").into())],
        };

        let mut results = Vec::new();
        for _ in 0..2 {
            let tx = builder.signed_calldata_tx(INBOX, &batcher_payload(&batch));
            let Scenario { mut pipeline, safe_head } =
                scenario_with_tx(tx, builder.batcher_address()).await;
            for _ in 0..16 {
                if matches!(pipeline.step(safe_head).await, StepResult::PreparedAttributes) {
                    break;
                }
            }
            results.push(pipeline.next().unwrap());
        }
        assert_eq!(results[0], results[1]);
    }
}
