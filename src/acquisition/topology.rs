use std::fmt;

use crate::error::AcquisitionError;

/// Bytes per node block: status plus five sample bytes.
///
/// A reply with three channels is seven bytes long, so the block keeps only
/// the high byte of the third word and its low byte is lost.
pub const NODE_BLOCK_LEN: usize = 6;

pub const NODE_SINGLE: usize = 8; // 2 + 6
pub const NODE_FOUR: usize = 26; // 2 + 6*4
pub const NODE_16: usize = 100; // 4 + 6*16
pub const NODE_32: usize = 198; // 4 + 6*32 + 2 reserved
pub const NODE_64: usize = 388; // 4 + 6*64

/// Devices addressable on one sub-bus (four distinct I2C addresses).
pub const DEVICES_PER_GROUP: usize = 4;
/// Groups reachable through the two select lines.
pub const GROUPS_PER_BANK: usize = 4;

/// Count and arrangement of sensor nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Single,
    Four,
    Sixteen,
    ThirtyTwo,
    SixtyFour,
}

/// Physical route to one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeRoute {
    /// Position of the node's block in the buffer.
    pub index: usize,
    /// I2C line carrying the node.
    pub bank: usize,
    /// Multiplexer group, `None` when the topology has no multiplexer.
    pub group: Option<u8>,
    /// Device pool slot, i.e. which of the four addresses.
    pub slot: usize,
}

impl Topology {
    pub const ALL: [Topology; 5] = [
        Topology::Single,
        Topology::Four,
        Topology::Sixteen,
        Topology::ThirtyTwo,
        Topology::SixtyFour,
    ];

    pub fn from_node_count(nodes: u32) -> Result<Self, AcquisitionError> {
        match nodes {
            1 => Ok(Topology::Single),
            4 => Ok(Topology::Four),
            16 => Ok(Topology::Sixteen),
            32 => Ok(Topology::ThirtyTwo),
            64 => Ok(Topology::SixtyFour),
            other => Err(AcquisitionError::UnsupportedTopology(other)),
        }
    }

    /// Infer the topology from a buffer length.
    pub fn from_buffer_len(len: usize) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.buffer_len() == len)
    }

    pub fn node_count(&self) -> usize {
        match self {
            Topology::Single => 1,
            Topology::Four => 4,
            Topology::Sixteen => 16,
            Topology::ThirtyTwo => 32,
            Topology::SixtyFour => 64,
        }
    }

    pub fn header_len(&self) -> usize {
        if self.is_multiplexed() { 4 } else { 2 }
    }

    /// Reserved zero bytes after the last node block.
    pub fn trailer_len(&self) -> usize {
        match self {
            Topology::ThirtyTwo => 2,
            _ => 0,
        }
    }

    /// Bytes taken by the node blocks.
    pub fn blocks_len(&self) -> usize {
        self.node_count() * NODE_BLOCK_LEN
    }

    pub fn buffer_len(&self) -> usize {
        match self {
            Topology::Single => NODE_SINGLE,
            Topology::Four => NODE_FOUR,
            Topology::Sixteen => NODE_16,
            Topology::ThirtyTwo => NODE_32,
            Topology::SixtyFour => NODE_64,
        }
    }

    pub fn is_multiplexed(&self) -> bool {
        self.node_count() > DEVICES_PER_GROUP
    }

    /// Number of I2C lines the topology spans.
    pub fn banks(&self) -> usize {
        self.node_count().div_ceil(DEVICES_PER_GROUP * GROUPS_PER_BANK)
    }

    /// Byte offset of node `index`'s block.
    pub fn block_offset(&self, index: usize) -> usize {
        self.header_len() + index * NODE_BLOCK_LEN
    }

    /// Every node in buffer order: bank, then group, then device slot.
    pub fn routes(&self) -> impl Iterator<Item = NodeRoute> {
        let multiplexed = self.is_multiplexed();
        let per_bank = if multiplexed {
            DEVICES_PER_GROUP * GROUPS_PER_BANK
        } else {
            self.node_count()
        };
        (0..self.node_count()).map(move |index| {
            let within = index % per_bank;
            NodeRoute {
                index,
                bank: index / per_bank,
                group: multiplexed.then_some((within / DEVICES_PER_GROUP) as u8),
                slot: within % DEVICES_PER_GROUP,
            }
        })
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-node topology", self.node_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_len_is_header_blocks_and_trailer() {
        for topology in Topology::ALL {
            assert_eq!(
                topology.buffer_len(),
                topology.header_len() + topology.blocks_len() + topology.trailer_len(),
                "{}",
                topology
            );
        }
        assert_eq!(Topology::Four.buffer_len(), 26);
        assert_eq!(Topology::SixtyFour.buffer_len(), 388);
        assert_eq!(Topology::ThirtyTwo.trailer_len(), 2);
        assert_eq!(Topology::SixtyFour.trailer_len(), 0);
    }

    #[test]
    fn test_from_node_count() {
        assert_eq!(Topology::from_node_count(16).unwrap(), Topology::Sixteen);
        assert!(matches!(
            Topology::from_node_count(8),
            Err(AcquisitionError::UnsupportedTopology(8))
        ));
    }

    #[test]
    fn test_from_buffer_len() {
        assert_eq!(Topology::from_buffer_len(198), Some(Topology::ThirtyTwo));
        assert_eq!(Topology::from_buffer_len(27), None);
    }

    #[test]
    fn test_banks() {
        assert_eq!(Topology::Single.banks(), 1);
        assert_eq!(Topology::Sixteen.banks(), 1);
        assert_eq!(Topology::ThirtyTwo.banks(), 2);
        assert_eq!(Topology::SixtyFour.banks(), 4);
    }

    #[test]
    fn test_four_node_routes_have_no_group() {
        let routes: Vec<_> = Topology::Four.routes().collect();
        assert_eq!(routes.len(), 4);
        assert!(routes.iter().all(|r| r.group.is_none() && r.bank == 0));
        assert_eq!(routes.iter().map(|r| r.slot).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_sixteen_node_routes_are_group_major() {
        let routes: Vec<_> = Topology::Sixteen
            .routes()
            .map(|r| (r.group.unwrap(), r.slot))
            .collect();
        let expected: Vec<_> = (0..4u8)
            .flat_map(|g| (0..4usize).map(move |d| (g, d)))
            .collect();
        assert_eq!(routes, expected);
    }

    #[test]
    fn test_sixty_four_node_routes_are_bank_major() {
        let routes: Vec<_> = Topology::SixtyFour.routes().collect();
        assert_eq!(routes[15].bank, 0);
        assert_eq!(routes[16].bank, 1);
        assert_eq!(routes[16].group, Some(0));
        assert_eq!(routes[63].bank, 3);
        assert_eq!(routes[63].group, Some(3));
        assert_eq!(routes[63].slot, 3);
        assert_eq!(Topology::SixtyFour.block_offset(63), 4 + 63 * 6);
    }
}
