//! This module contains the [ChannelReader] stage.

use crate::{
    errors::PipelineError,
    params::{MAX_RLP_BYTES_PER_CHANNEL, MAX_RLP_BYTES_PER_CHANNEL_FJORD},
    stages::BatchStreamProvider,
    traits::{ChannelReaderProvider, OriginAdvancer, OriginProvider, SignalReceiver},
    types::{Batch, BlockInfo, PipelineResult, RollupConfig, Signal},
};
use alloc::{boxed::Box, sync::Arc, vec, vec::Vec};
use alloy_primitives::Bytes;
use alloy_rlp::Decodable;
use async_trait::async_trait;
use brotli::{enc::StandardAlloc, BrotliDecompressStream, BrotliResult, BrotliState};
use core::fmt::Debug;
use miniz_oxide::inflate::decompress_to_vec_zlib_with_limit;
use tracing::{debug, warn};

/// The channel version byte marking a brotli-compressed channel.
const CHANNEL_VERSION_BROTLI: u8 = 0x01;

/// [ChannelReader] is a stateful stage that reads [Batch]es from completed
/// channels.
///
/// The channel reader pulls raw channel data from the channel stage and
/// pipes it into a [BatchReader], which decompresses it (the first byte
/// selects the compression algorithm) and decodes one batch at a time.
#[derive(Debug)]
pub struct ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// The previous stage of the derivation pipeline.
    prev: P,
    /// The current batch reader.
    next_batch: Option<BatchReader>,
    /// The rollup configuration.
    cfg: Arc<RollupConfig>,
}

impl<P> ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    /// Create a new [ChannelReader] stage.
    pub const fn new(prev: P, cfg: Arc<RollupConfig>) -> Self {
        Self { prev, next_batch: None, cfg }
    }

    /// Creates the batch reader from available channel data.
    async fn set_batch_reader(&mut self) -> PipelineResult<()> {
        if self.next_batch.is_none() {
            let channel =
                self.prev.next_data().await?.ok_or(PipelineError::ChannelReaderEmpty.temp())?;
            let origin = self.prev.origin().ok_or(PipelineError::MissingOrigin.crit())?;
            let fjord = self.cfg.is_fjord_active(origin.timestamp);
            let max_rlp_bytes_per_channel = if fjord {
                MAX_RLP_BYTES_PER_CHANNEL_FJORD
            } else {
                MAX_RLP_BYTES_PER_CHANNEL
            } as usize;

            self.next_batch =
                Some(BatchReader::new(channel.to_vec(), max_rlp_bytes_per_channel, fjord));
        }
        Ok(())
    }

    /// Forces the read to continue with the next channel, resetting any
    /// decompression state to a fresh start.
    pub fn next_channel(&mut self) {
        self.next_batch = None;
    }
}

#[async_trait]
impl<P> BatchStreamProvider for ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    /// Drops the current channel. Invoked when an invalid batch is found
    /// post-Holocene: the rest of the channel is forwards-invalidated.
    fn flush(&mut self) {
        debug!(target: "channel-reader", "Flushing channel");
        self.next_channel();
    }

    async fn next_batch(&mut self) -> PipelineResult<Batch> {
        if let Err(e) = self.set_batch_reader().await {
            debug!(target: "channel-reader", "Failed to set batch reader: {:?}", e);
            self.next_channel();
            return Err(e);
        }
        match self
            .next_batch
            .as_mut()
            .expect("Cannot be None")
            .next_batch(self.cfg.as_ref())
            .ok_or(PipelineError::NotEnoughData.temp())
        {
            Ok(batch) => Ok(batch),
            Err(e) => {
                self.next_channel();
                Err(e)
            }
        }
    }
}

#[async_trait]
impl<P> OriginAdvancer for ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn advance_origin(&mut self) -> PipelineResult<()> {
        self.prev.advance_origin().await
    }
}

impl<P> OriginProvider for ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + SignalReceiver,
{
    fn origin(&self) -> Option<BlockInfo> {
        self.prev.origin()
    }
}

#[async_trait]
impl<P> SignalReceiver for ChannelReader<P>
where
    P: ChannelReaderProvider + OriginAdvancer + OriginProvider + SignalReceiver + Send,
{
    async fn signal(&mut self, signal: Signal) -> PipelineResult<()> {
        match signal {
            Signal::FlushChannel => {
                // Drop the current in-progress channel.
                warn!(target: "channel-reader", "Flushed channel");
                self.next_batch = None;
            }
            s => {
                self.prev.signal(s).await?;
                self.next_channel();
            }
        }
        Ok(())
    }
}

/// [BatchReader] provides a function to iterate over the batches of a
/// channel. The raw channel data is decompressed on the first read; the
/// first byte selects the compression algorithm (zlib, or brotli behind a
/// version byte post-Fjord).
#[derive(Debug)]
pub struct BatchReader {
    /// The raw channel data, decompressed on first read.
    data: Option<Vec<u8>>,
    /// The decompressed channel contents.
    decompressed: Vec<u8>,
    /// The current read cursor within the decompressed data.
    cursor: usize,
    /// The maximum number of bytes to read out of the channel.
    max_rlp_bytes_per_channel: usize,
    /// Whether the brotli channel version is accepted.
    fjord: bool,
}

impl BatchReader {
    /// Creates a new [BatchReader] from the given raw channel data.
    pub fn new(data: Vec<u8>, max_rlp_bytes_per_channel: usize, fjord: bool) -> Self {
        Self {
            data: Some(data),
            decompressed: Vec::new(),
            cursor: 0,
            max_rlp_bytes_per_channel,
            fjord,
        }
    }

    /// Pulls out the next batch from the channel, decompressing the channel
    /// data if it has not been yet. Returns [None] once the channel is
    /// exhausted or found to be invalid.
    pub fn next_batch(&mut self, cfg: &RollupConfig) -> Option<Batch> {
        if let Some(data) = self.data.take() {
            let first = *data.first()?;
            if (first & 0x0F) == 8 {
                // zlib-compressed channel data.
                self.decompressed =
                    decompress_to_vec_zlib_with_limit(&data, self.max_rlp_bytes_per_channel)
                        .ok()?;
            } else if first == CHANNEL_VERSION_BROTLI && self.fjord {
                self.decompressed =
                    decompress_brotli(&data[1..], self.max_rlp_bytes_per_channel).ok()?;
            } else {
                warn!(target: "batch-reader", "Unsupported channel compression format: {first:#04x}");
                return None;
            }
        }

        // Decode the next RLP string from the decompressed channel and parse
        // a batch out of it.
        let mut raw = &self.decompressed[self.cursor..];
        let bytes = Bytes::decode(&mut raw).ok()?;
        let batch = Batch::decode(&mut bytes.as_ref(), cfg).ok()?;
        self.cursor = self.decompressed.len() - raw.len();
        Some(batch)
    }
}

/// Decompresses a brotli stream, growing the output buffer until the stream
/// completes or the size limit is exceeded.
fn decompress_brotli(data: &[u8], max_size: usize) -> Result<Vec<u8>, PipelineError> {
    let mut state = BrotliState::new(
        StandardAlloc::default(),
        StandardAlloc::default(),
        StandardAlloc::default(),
    );

    let mut output = vec![0u8; 4096];
    let mut available_in = data.len();
    let mut input_offset = 0;
    let mut available_out = output.len();
    let mut output_offset = 0;
    let mut written = 0;

    loop {
        match BrotliDecompressStream(
            &mut available_in,
            &mut input_offset,
            data,
            &mut available_out,
            &mut output_offset,
            &mut output,
            &mut written,
            &mut state,
        ) {
            BrotliResult::ResultSuccess => break,
            BrotliResult::NeedsMoreOutput => {
                if output.len() >= max_size {
                    return Err(PipelineError::BadEncoding(
                        crate::errors::PipelineEncodingError::EmptyBuffer,
                    ));
                }
                let current_len = output.len();
                output.resize(current_len * 2, 0);
                available_out = output.len() - output_offset;
            }
            _ => {
                return Err(PipelineError::BadEncoding(
                    crate::errors::PipelineEncodingError::EmptyBuffer,
                ))
            }
        }
    }

    output.truncate(output_offset);
    Ok(output)
}
