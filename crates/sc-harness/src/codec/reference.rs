//! Reference block codec
//!
//! A compact lossless/hybrid codec used to exercise the harness end to end.
//! Each channel of a block is coded with a fixed polynomial predictor of order
//! 0 to 3 followed by zig-zag varint residuals. In hybrid mode the primary
//! stream carries `x >> shift` and a parallel correction block with the same
//! index carries the low bits.

use super::block::{
    frame, put_varint, unzigzag, varint_len, zigzag, Block, BlockHeader, BlockKind, BlockReader,
    Checksum, NextBlock, PayloadReader, FLAG_CORRECTION_BLOCK, FLAG_FLOAT, FLAG_HAS_CORRECTION,
    FLAG_HYBRID, MAGIC,
};
use super::{
    BlockSink, ByteSource, Codec, CodecError, Decoder, Encoder, EncoderConfig, SpeedMode,
};
use crate::packer::{store_samples, PackFormat};
use md5::{Digest, Md5};

/// Frames per encoded block
pub const BLOCK_FRAMES: usize = 4096;

const MAX_ORDER: usize = 3;

/// Bits dropped from the primary stream of a hybrid encode
pub fn hybrid_shift(bits: u32, bitrate: f32) -> u32 {
    let keep = (bitrate as f64 * 2.0).round().max(1.0) as u32;
    bits.saturating_sub(keep).min(bits.saturating_sub(1))
}

// ============================================================================
// Prediction
// ============================================================================

fn predict(history: &[i64], i: usize, order: usize) -> i64 {
    match order.min(i) {
        0 => 0,
        1 => history[i - 1],
        2 => history[i - 1].wrapping_mul(2).wrapping_sub(history[i - 2]),
        _ => history[i - 1]
            .wrapping_sub(history[i - 2])
            .wrapping_mul(3)
            .wrapping_add(history[i - 3]),
    }
}

fn residuals(values: &[i64], order: usize) -> impl Iterator<Item = i64> + '_ {
    (0..values.len()).map(move |i| values[i].wrapping_sub(predict(values, i, order)))
}

fn cost(values: &[i64], order: usize) -> usize {
    residuals(values, order).map(|r| varint_len(zigzag(r))).sum()
}

/// Rebuild a channel from its residuals
fn reconstruct(residuals: &[i64], order: usize) -> Vec<i64> {
    let mut values = Vec::with_capacity(residuals.len());

    for (i, &r) in residuals.iter().enumerate() {
        let value = predict(&values, i, order).wrapping_add(r);
        values.push(value);
    }

    values
}

fn default_order(speed: SpeedMode) -> usize {
    match speed {
        SpeedMode::Fast => 1,
        SpeedMode::Normal => 2,
        SpeedMode::High | SpeedMode::VeryHigh => 3,
    }
}

fn column(samples: &[i32], channel: usize, channels: usize) -> Vec<i64> {
    samples
        .iter()
        .skip(channel)
        .step_by(channels)
        .map(|&s| s as i64)
        .collect()
}

// ============================================================================
// Encoder
// ============================================================================

/// Encoder half of the reference codec
pub struct ReferenceEncoder<'a> {
    template: BlockHeader,
    channels: usize,
    order: usize,
    search: bool,
    main: &'a dyn BlockSink,
    correction: Option<&'a dyn BlockSink>,
    pending: Vec<i32>,
    closed: bool,
}

impl<'a> ReferenceEncoder<'a> {
    pub fn new(
        config: &EncoderConfig,
        main: &'a dyn BlockSink,
        correction: Option<&'a dyn BlockSink>,
    ) -> Result<Self, CodecError> {
        config.validate()?;

        if config.creates_correction() && correction.is_none() {
            return Err(CodecError::InvalidConfig(
                "correction stream requested without a sink".into(),
            ));
        }

        let mut flags = 0;
        if config.float_data {
            flags |= FLAG_FLOAT;
        }
        let shift = match &config.hybrid {
            Some(hybrid) => {
                flags |= FLAG_HYBRID;
                if hybrid.create_correction {
                    flags |= FLAG_HAS_CORRECTION;
                }
                hybrid_shift(config.bits_per_sample, hybrid.bitrate)
            }
            None => 0,
        };

        Ok(Self {
            template: BlockHeader {
                kind: BlockKind::Audio,
                flags,
                channels: config.num_channels as u8,
                bits: config.bits_per_sample as u8,
                bytes_per_sample: config.bytes_per_sample as u8,
                shift: shift as u8,
                sample_rate: config.sample_rate,
                channel_mask: config.channel_mask,
                index: 0,
                frames: 0,
                payload_len: 0,
            },
            channels: config.num_channels,
            order: default_order(config.speed),
            search: config.extra > 0,
            main,
            correction: if config.creates_correction() {
                correction
            } else {
                None
            },
            pending: Vec::with_capacity(BLOCK_FRAMES * config.num_channels),
            closed: false,
        })
    }

    fn choose_order(&self, values: &[i64]) -> usize {
        if !self.search {
            return self.order;
        }

        (0..=MAX_ORDER)
            .min_by_key(|&order| cost(values, order))
            .unwrap_or(self.order)
    }

    fn send(sink: &dyn BlockSink, mut block: Vec<u8>) -> Result<(), CodecError> {
        if sink.write_block(&mut block) {
            Ok(())
        } else {
            Err(CodecError::SinkRejected(block.len()))
        }
    }

    fn emit(&mut self, frames: usize) -> Result<(), CodecError> {
        if frames == 0 {
            return Ok(());
        }

        let samples: Vec<i32> = self.pending.drain(..frames * self.channels).collect();
        let shift = self.template.shift as u32;
        let hybrid = self.template.flags & FLAG_HYBRID != 0;

        let primary: Vec<i32> = if hybrid {
            samples.iter().map(|&s| s >> shift).collect()
        } else {
            samples.clone()
        };

        let mut header = self.template;
        header.frames = frames as u32;

        let mut payload = Vec::new();
        for channel in 0..self.channels {
            let values = column(&primary, channel, self.channels);
            let order = self.choose_order(&values);
            payload.push(order as u8);
            for r in residuals(&values, order) {
                put_varint(&mut payload, zigzag(r));
            }
        }

        let mut check = Checksum::default();
        check.update_samples(&primary);
        Self::send(self.main, frame(header, &payload, check.value()))?;

        if let Some(sink) = self.correction {
            let low: Vec<i32> = samples
                .iter()
                .zip(&primary)
                .map(|(&s, &q)| s.wrapping_sub(q.wrapping_shl(shift)))
                .collect();

            let mut payload = Vec::new();
            for channel in 0..self.channels {
                for value in column(&low, channel, self.channels) {
                    put_varint(&mut payload, value as u32 as u64);
                }
            }

            let mut check = Checksum::default();
            check.update_samples(&low);

            let mut correction_header = header;
            correction_header.flags |= FLAG_CORRECTION_BLOCK;
            Self::send(sink, frame(correction_header, &payload, check.value()))?;
        }

        self.template.index = self.template.index.wrapping_add(1);
        Ok(())
    }
}

impl Encoder for ReferenceEncoder<'_> {
    fn pack_samples(&mut self, samples: &[i32]) -> Result<(), CodecError> {
        if self.closed {
            return Err(CodecError::Closed);
        }
        if samples.len() % self.channels != 0 {
            return Err(CodecError::PartialFrame {
                samples: samples.len(),
                channels: self.channels,
            });
        }

        self.pending.extend_from_slice(samples);

        while self.pending.len() >= BLOCK_FRAMES * self.channels {
            self.emit(BLOCK_FRAMES)?;
        }

        Ok(())
    }

    fn flush(&mut self) -> Result<(), CodecError> {
        if self.closed {
            return Err(CodecError::Closed);
        }

        let frames = self.pending.len() / self.channels;
        self.emit(frames)
    }

    fn store_checksum(&mut self, digest: [u8; 16]) -> Result<(), CodecError> {
        if self.closed {
            return Err(CodecError::Closed);
        }

        let mut header = self.template;
        header.kind = BlockKind::Checksum;

        let mut check = Checksum::default();
        check.update_bytes(&digest);
        Self::send(self.main, frame(header, &digest, check.value()))
    }

    fn close(mut self: Box<Self>) -> Result<(), CodecError> {
        self.flush()?;
        self.closed = true;
        Ok(())
    }
}

// ============================================================================
// Decoder
// ============================================================================

/// Decoder half of the reference codec
pub struct ReferenceDecoder<'a> {
    format: BlockHeader,
    main: BlockReader<'a>,
    correction: Option<BlockReader<'a>>,
    use_correction: bool,
    first: Option<Block>,
    held_correction: Option<Block>,
    output: Vec<i32>,
    cursor: usize,
    md5: Md5,
    errors: u32,
    finished: bool,
}

impl<'a> ReferenceDecoder<'a> {
    /// Open a stream at its first block.
    ///
    /// The first byte is examined and returned to the source when it may start
    /// a block. Anything else fails with [`CodecError::NotAStream`] after
    /// consuming the bytes examined, so repeated attempts walk forward.
    pub fn open(
        main: &'a dyn ByteSource,
        correction: Option<&'a dyn ByteSource>,
    ) -> Result<Self, CodecError> {
        let mut first = [0u8; 1];
        if main.read(&mut first) == 0 || first[0] != MAGIC[0] {
            return Err(CodecError::NotAStream);
        }
        main.push_back(first[0])?;

        let mut reader = BlockReader::new(main);
        let header = reader.read_header().ok_or(CodecError::NotAStream)?;

        if header.kind != BlockKind::Audio || header.is_correction() {
            return Err(CodecError::NotAStream);
        }

        let block = match reader.read_body(header) {
            NextBlock::Block(block) => block,
            NextBlock::End => return Err(CodecError::NotAStream),
        };

        let use_correction = header.is_hybrid() && header.has_correction() && correction.is_some();
        log::debug!(
            "opened stream: {} channels, {} bits, shift {}, correction {}",
            header.channels,
            header.bits,
            header.shift,
            use_correction
        );

        Ok(Self {
            format: header,
            main: reader,
            correction: correction.map(BlockReader::new),
            use_correction,
            first: Some(block),
            held_correction: None,
            output: Vec::new(),
            cursor: 0,
            md5: Md5::new(),
            errors: 0,
            finished: false,
        })
    }

    /// Whether the output is expected to match the input exactly
    pub fn is_lossless(&self) -> bool {
        !self.format.is_hybrid() || self.use_correction
    }

    fn compatible(&self, header: &BlockHeader) -> bool {
        header.flags & !FLAG_CORRECTION_BLOCK == self.format.flags
            && header.channels == self.format.channels
            && header.bits == self.format.bits
            && header.bytes_per_sample == self.format.bytes_per_sample
            && header.shift == self.format.shift
    }

    /// Correction block carrying `index`, skipping stale ones
    fn correction_for(&mut self, index: u32) -> Option<Block> {
        let reader = self.correction.as_mut()?;

        loop {
            let block = match self.held_correction.take() {
                Some(block) => block,
                None => match reader.next_block() {
                    NextBlock::Block(block) => block,
                    NextBlock::End => return None,
                },
            };

            if block.header.index < index {
                continue;
            }
            if block.header.index > index {
                self.held_correction = Some(block);
                return None;
            }
            return Some(block);
        }
    }

    fn decode_primary(&self, block: &Block) -> Option<Vec<i32>> {
        let channels = self.format.channels as usize;
        let frames = block.header.frames as usize;
        let mut reader = PayloadReader::new(&block.payload);
        let mut samples = vec![0i32; frames * channels];

        for channel in 0..channels {
            let order = reader.byte()? as usize;
            if order > MAX_ORDER {
                return None;
            }

            let residuals = (0..frames)
                .map(|_| reader.varint().map(unzigzag))
                .collect::<Option<Vec<i64>>>()?;

            for (i, value) in reconstruct(&residuals, order).into_iter().enumerate() {
                samples[i * channels + channel] = value as i32;
            }
        }

        let mut check = Checksum::default();
        check.update_samples(&samples);
        (reader.is_exhausted() && check.value() == block.check).then_some(samples)
    }

    fn decode_low_bits(&self, block: &Block, frames: usize) -> Option<Vec<i32>> {
        let channels = self.format.channels as usize;
        if block.header.frames as usize != frames {
            return None;
        }

        let mut reader = PayloadReader::new(&block.payload);
        let mut low = vec![0i32; frames * channels];

        for channel in 0..channels {
            for i in 0..frames {
                low[i * channels + channel] = reader.varint()? as u32 as i32;
            }
        }

        let mut check = Checksum::default();
        check.update_samples(&low);
        (reader.is_exhausted() && check.value() == block.check).then_some(low)
    }

    fn decode_audio(&mut self, block: &Block) -> Vec<i32> {
        let channels = self.format.channels as usize;
        let frames = block.header.frames as usize;
        let shift = self.format.shift as u32;

        let primary = match self.decode_primary(block) {
            Some(samples) => samples,
            None => {
                log::debug!("block {} damaged, substituting silence", block.header.index);
                self.errors += 1;
                vec![0; frames * channels]
            }
        };

        if !self.format.is_hybrid() {
            return primary;
        }

        let low = if self.use_correction {
            let low = self
                .correction_for(block.header.index)
                .and_then(|c| self.decode_low_bits(&c, frames));
            if low.is_none() {
                log::debug!("no usable correction for block {}", block.header.index);
                self.errors += 1;
            }
            low
        } else {
            None
        };

        match low {
            Some(low) => primary
                .iter()
                .zip(&low)
                .map(|(&q, &r)| q.wrapping_shl(shift).wrapping_add(r))
                .collect(),
            None => primary.iter().map(|&q| q.wrapping_shl(shift)).collect(),
        }
    }

    fn verify_checksum(&mut self, block: &Block) {
        let mut check = Checksum::default();
        check.update_bytes(&block.payload);

        if block.payload.len() != 16 || check.value() != block.check {
            self.errors += 1;
            return;
        }

        if self.is_lossless() {
            let digest = self.md5.clone().finalize();
            if digest.as_slice() != block.payload.as_slice() {
                log::debug!("embedded checksum does not match decoded audio");
                self.errors += 1;
            }
        }
    }

    /// Decode blocks until new samples are available or the stream ends
    fn refill(&mut self) -> bool {
        if self.finished {
            return false;
        }

        let block = match self.first.take() {
            Some(block) => block,
            None => match self.main.next_block() {
                NextBlock::Block(block) => block,
                NextBlock::End => {
                    self.finished = true;
                    if let Some(correction) = self.correction.as_mut() {
                        correction.drain();
                    }
                    return false;
                }
            },
        };

        self.output.clear();
        self.cursor = 0;

        if block.header.is_correction() || !self.compatible(&block.header) {
            self.errors += 1;
            return true;
        }

        match block.header.kind {
            BlockKind::Checksum => self.verify_checksum(&block),
            BlockKind::Audio => {
                self.output = self.decode_audio(&block);
                let mut canonical = Vec::with_capacity(self.output.len() * 4);
                let format = PackFormat::canonical(self.format.bytes_per_sample as usize);
                if store_samples(&mut canonical, &self.output, format).is_ok() {
                    self.md5.update(&canonical);
                }
            }
        }

        true
    }
}

impl Decoder for ReferenceDecoder<'_> {
    fn num_channels(&self) -> usize {
        self.format.channels as usize
    }

    fn bytes_per_sample(&self) -> usize {
        self.format.bytes_per_sample as usize
    }

    fn unpack_samples(&mut self, out: &mut [i32], frames: usize) -> usize {
        let channels = self.num_channels();
        let wanted = frames.min(out.len() / channels);
        let mut filled = 0;

        while filled < wanted {
            if self.cursor == self.output.len() {
                if !self.refill() {
                    break;
                }
                continue;
            }

            let available = (self.output.len() - self.cursor) / channels;
            let count = available.min(wanted - filled);
            let src = &self.output[self.cursor..self.cursor + count * channels];
            out[filled * channels..(filled + count) * channels].copy_from_slice(src);

            self.cursor += count * channels;
            filled += count;
        }

        filled
    }

    fn num_errors(&self) -> u32 {
        self.errors
            + self.main.errors()
            + self.correction.as_ref().map_or(0, |c| c.errors())
    }
}

/// The reference codec
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceCodec;

impl Codec for ReferenceCodec {
    fn name(&self) -> &str {
        "reference"
    }

    fn file_extension(&self) -> &str {
        "rts"
    }

    fn create_encoder<'a>(
        &self,
        config: &EncoderConfig,
        main: &'a dyn BlockSink,
        correction: Option<&'a dyn BlockSink>,
    ) -> Result<Box<dyn Encoder + 'a>, CodecError> {
        Ok(Box::new(ReferenceEncoder::new(config, main, correction)?))
    }

    fn open_decoder<'a>(
        &self,
        main: &'a dyn ByteSource,
        correction: Option<&'a dyn ByteSource>,
    ) -> Result<Box<dyn Decoder + 'a>, CodecError> {
        Ok(Box::new(ReferenceDecoder::open(main, correction)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::VirtualStream;

    fn ramp(frames: usize, channels: usize) -> Vec<i32> {
        (0..frames * channels)
            .map(|i| ((i as i32 * 37) % 2000) - 1000)
            .collect()
    }

    fn encode(
        config: &EncoderConfig,
        samples: &[i32],
        main: &VirtualStream,
        corr: Option<&VirtualStream>,
    ) {
        let codec = ReferenceCodec;
        let mut encoder = codec
            .create_encoder(config, main, corr.map(|c| c as &dyn BlockSink))
            .unwrap();
        encoder.pack_samples(samples).unwrap();
        encoder.close().unwrap();
        main.mark_done();
        if let Some(c) = corr {
            c.mark_done();
        }
    }

    fn decode_all(main: &VirtualStream, corr: Option<&VirtualStream>) -> (Vec<i32>, u32) {
        let mut decoder = ReferenceCodec
            .open_decoder(main, corr.map(|c| c as &dyn ByteSource))
            .unwrap();
        let channels = decoder.num_channels();
        let mut out = Vec::new();
        let mut buf = vec![0i32; 1000 * channels];

        loop {
            let n = decoder.unpack_samples(&mut buf, 1000);
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n * channels]);
        }

        (out, decoder.num_errors())
    }

    #[test]
    fn test_hybrid_shift() {
        assert_eq!(hybrid_shift(16, 3.0), 10);
        assert_eq!(hybrid_shift(16, 5.0), 6);
        assert_eq!(hybrid_shift(8, 5.0), 0);
        assert_eq!(hybrid_shift(32, 4.0), 24);
        assert_eq!(hybrid_shift(1, 3.0), 0);
    }

    #[test]
    fn test_predictor_inverts() {
        let values: Vec<i64> = vec![5, -3, 1000, i32::MAX as i64, i32::MIN as i64, 0, 7];
        for order in 0..=MAX_ORDER {
            let res: Vec<i64> = residuals(&values, order).collect();
            assert_eq!(reconstruct(&res, order), values, "order {}", order);
        }
    }

    #[test]
    fn test_search_prefers_higher_order_for_ramps() {
        let values: Vec<i64> = (0..500).map(|i| i * 100).collect();
        assert!(cost(&values, 2) < cost(&values, 0));
    }

    #[test]
    fn test_lossless_round_trip() {
        let config = EncoderConfig::default();
        let samples = ramp(10_000, 2);
        let main = VirtualStream::new(1 << 20);

        encode(&config, &samples, &main, None);
        let (decoded, errors) = decode_all(&main, None);

        assert_eq!(errors, 0);
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_extra_and_checksum_round_trip() {
        let config = EncoderConfig::default()
            .with_speed(SpeedMode::Fast)
            .with_extra(3);
        let samples = ramp(5000, 2);
        let main = VirtualStream::new(1 << 20);

        let codec = ReferenceCodec;
        let mut encoder = codec.create_encoder(&config, &main, None).unwrap();
        encoder.pack_samples(&samples).unwrap();
        encoder.flush().unwrap();

        let mut canonical = Vec::new();
        store_samples(&mut canonical, &samples, PackFormat::canonical(2)).unwrap();
        let mut digest = [0u8; 16];
        digest.copy_from_slice(&Md5::digest(&canonical));
        encoder.store_checksum(digest).unwrap();
        encoder.close().unwrap();
        main.mark_done();

        let (decoded, errors) = decode_all(&main, None);
        assert_eq!(errors, 0);
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_wrong_checksum_counts_error() {
        let config = EncoderConfig::default();
        let samples = ramp(100, 2);
        let main = VirtualStream::new(1 << 16);

        let mut encoder = ReferenceCodec.create_encoder(&config, &main, None).unwrap();
        encoder.pack_samples(&samples).unwrap();
        encoder.flush().unwrap();
        encoder.store_checksum([0u8; 16]).unwrap();
        encoder.close().unwrap();
        main.mark_done();

        let (decoded, errors) = decode_all(&main, None);
        assert_eq!(decoded, samples);
        assert_eq!(errors, 1);
    }

    #[test]
    fn test_hybrid_with_correction_is_exact() {
        let config = EncoderConfig::default().with_hybrid(3.0, true);
        let samples = ramp(9000, 2);
        let main = VirtualStream::new(1 << 20);
        let corr = VirtualStream::new(1 << 20);

        encode(&config, &samples, &main, Some(&corr));
        let (decoded, errors) = decode_all(&main, Some(&corr));

        assert_eq!(errors, 0);
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_hybrid_without_correction_is_close() {
        let config = EncoderConfig::default().with_hybrid(5.0, false);
        let samples = ramp(3000, 2);
        let main = VirtualStream::new(1 << 20);

        encode(&config, &samples, &main, None);
        let (decoded, errors) = decode_all(&main, None);

        let shift = hybrid_shift(16, 5.0);
        assert_eq!(errors, 0);
        assert_eq!(decoded.len(), samples.len());
        for (d, s) in decoded.iter().zip(&samples) {
            assert!((s - d) >= 0 && (s - d) < (1 << shift));
        }
    }

    #[test]
    fn test_open_rejects_garbage() {
        let main = VirtualStream::new(64);
        main.write(&mut [0x00, 0x01, 0x02]);
        main.mark_done();

        assert!(matches!(
            ReferenceCodec.open_decoder(&main, None),
            Err(CodecError::NotAStream)
        ));
        assert!(main.stats().bytes_read >= 1);
    }

    #[test]
    fn test_damaged_payload_becomes_silence() {
        let config = EncoderConfig {
            num_channels: 1,
            channel_mask: 0x4,
            ..EncoderConfig::default()
        };
        let samples = ramp(BLOCK_FRAMES * 3, 1);

        let mut bytes = Vec::new();
        {
            let sink = VirtualStream::new(1 << 20);
            encode(&config, &samples, &sink, None);
            let mut buf = vec![0u8; 1 << 20];
            let n = sink.read(&mut buf);
            bytes.extend_from_slice(&buf[..n]);
        }

        // corrupt the second block's payload
        let second = bytes.len() / 2;
        bytes[second] ^= 0xFF;

        let main = VirtualStream::new(1 << 20);
        main.write(&mut bytes);
        main.mark_done();

        let (decoded, errors) = decode_all(&main, None);
        assert_eq!(decoded.len(), samples.len());
        assert!(errors >= 1);
    }

    #[test]
    fn test_damaged_header_resyncs() {
        let config = EncoderConfig {
            num_channels: 1,
            channel_mask: 0x4,
            ..EncoderConfig::default()
        };
        let samples = ramp(BLOCK_FRAMES * 3, 1);

        let sink = VirtualStream::new(1 << 20);
        encode(&config, &samples, &sink, None);
        let mut bytes = vec![0u8; 1 << 20];
        let n = sink.read(&mut bytes);
        bytes.truncate(n);

        let second = bytes
            .windows(4)
            .enumerate()
            .skip(1)
            .find(|(_, w)| *w == MAGIC)
            .map(|(i, _)| i)
            .unwrap();
        bytes[second + 12] ^= 0x01;

        let main = VirtualStream::new(1 << 20);
        main.write(&mut bytes);
        main.mark_done();

        let (decoded, errors) = decode_all(&main, None);
        assert_eq!(decoded.len(), BLOCK_FRAMES * 2);
        assert_eq!(errors, 1);
        assert_eq!(&decoded[..BLOCK_FRAMES], &samples[..BLOCK_FRAMES]);
        assert_eq!(&decoded[BLOCK_FRAMES..], &samples[BLOCK_FRAMES * 2..]);
    }

    #[test]
    fn test_partial_frame_rejected() {
        let main = VirtualStream::sink();
        let mut encoder = ReferenceCodec
            .create_encoder(&EncoderConfig::default(), &main, None)
            .unwrap();
        assert!(matches!(
            encoder.pack_samples(&[1, 2, 3]),
            Err(CodecError::PartialFrame { samples: 3, channels: 2 })
        ));
    }
}
