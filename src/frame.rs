//! Measurement buffer wire layout.
//!
//! A buffer is a header (2 bytes up to four nodes, 4 bytes above) followed by
//! one 6-byte block per node in scan order. The first header byte is the status
//! returned by the first node during initialisation; the rest is reserved and
//! zero. Each block holds the first six bytes of the node's raw reply. The
//! 32-node layout ends with two reserved zero bytes after the last block.

use crate::acquisition::topology::{NODE_BLOCK_LEN, Topology};
use crate::error::ReportError;
use crate::sensors::{AxisMask, Channel, SampleEncoding, SensorSettings};

/// Caller-owned storage refilled by every scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementBuffer {
    topology: Topology,
    bytes: Vec<u8>,
}

impl MeasurementBuffer {
    pub fn new(topology: Topology) -> Self {
        Self {
            topology,
            bytes: vec![0; topology.buffer_len()],
        }
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Initialisation status stored in the header.
    pub fn status(&self) -> u8 {
        self.bytes[0]
    }

    pub fn node_block(&self, index: usize) -> Option<&[u8]> {
        if index >= self.topology.node_count() {
            return None;
        }
        let start = self.topology.block_offset(index);
        Some(&self.bytes[start..start + NODE_BLOCK_LEN])
    }

    pub(crate) fn write_header(&mut self, status: u8) {
        let header_len = self.topology.header_len();
        self.bytes[..header_len].fill(0);
        self.bytes[0] = status;
    }

    pub(crate) fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// Which channels the sample bytes of a block carry, and how to read them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLayout {
    channels: Vec<(Channel, SampleEncoding)>,
}

impl ChannelLayout {
    pub fn new(mask: AxisMask, settings: &SensorSettings) -> Self {
        Self {
            channels: mask
                .channels()
                .map(|c| (c, settings.encoding(c)))
                .collect(),
        }
    }
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self::new(AxisMask::XYZ, &SensorSettings::default())
    }
}

/// One decoded sample. `partial` is set when only the high byte survived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample {
    pub channel: Channel,
    pub value: i32,
    pub partial: bool,
}

/// One node's block, decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeReading {
    pub status: u8,
    pub data: [u8; NODE_BLOCK_LEN - 1],
}

impl NodeReading {
    fn from_block(block: &[u8]) -> Self {
        let mut data = [0u8; NODE_BLOCK_LEN - 1];
        data.copy_from_slice(&block[1..NODE_BLOCK_LEN]);
        Self {
            status: block[0],
            data,
        }
    }

    /// Samples carried by this block, in reply order.
    pub fn samples(&self, layout: &ChannelLayout) -> Vec<Sample> {
        layout
            .channels
            .iter()
            .enumerate()
            .filter_map(|(i, (channel, encoding))| {
                let msb = *self.data.get(2 * i)?;
                let (lsb, partial) = match self.data.get(2 * i + 1) {
                    Some(lsb) => (*lsb, false),
                    None => (0, true),
                };
                let word = u16::from_be_bytes([msb, lsb]);
                let value = match encoding {
                    SampleEncoding::Signed => word as i16 as i32,
                    SampleEncoding::Unsigned => word as i32,
                };
                Some(Sample {
                    channel: *channel,
                    value,
                    partial,
                })
            })
            .collect()
    }
}

/// A buffer as a tagged structure: header, ordered node readings and any
/// reserved trailing bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub topology: Topology,
    pub header: Vec<u8>,
    pub readings: Vec<NodeReading>,
    pub trailer: Vec<u8>,
}

impl Frame {
    pub fn decode(bytes: &[u8]) -> Result<Self, ReportError> {
        let topology =
            Topology::from_buffer_len(bytes.len()).ok_or(ReportError::UnknownLayout(bytes.len()))?;
        let header_len = topology.header_len();
        let blocks_end = header_len + topology.blocks_len();
        let readings = bytes[header_len..blocks_end]
            .chunks_exact(NODE_BLOCK_LEN)
            .map(NodeReading::from_block)
            .collect();
        Ok(Self {
            topology,
            header: bytes[..header_len].to_vec(),
            readings,
            trailer: bytes[blocks_end..].to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.topology.buffer_len());
        bytes.extend_from_slice(&self.header);
        for reading in &self.readings {
            bytes.push(reading.status);
            bytes.extend_from_slice(&reading.data);
        }
        bytes.extend_from_slice(&self.trailer);
        bytes
    }

    pub fn status(&self) -> u8 {
        self.header[0]
    }
}
