/// Payload capacity of a single message.
pub const MAX_DATA_LENGTH: usize = 244;
/// Header plus payload must fit in one UDP datagram of this size.
pub const MAX_PAYLOAD_LENGTH: usize = 256;

pub(crate) const HEADER_LENGTH: usize = 12;

/// Message types below 16 are reserved for ring maintenance; user
/// defined types must be >= 16.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MsgType(pub u32);

impl MsgType {
    /// Announce that a node is ready to connect.
    pub const BROADCAST: MsgType = MsgType(0x0);
    /// Reply to a broadcasting node with new possible links.
    pub const HELLO: MsgType = MsgType(0x1);
    /// Update links on a neighbouring node.
    pub const UPDATE: MsgType = MsgType(0x2);
    /// Request an UPDATE naming the receiver's left node.
    pub const GET: MsgType = MsgType(0x3);
    /// Liveness probe.
    pub const PING: MsgType = MsgType(0x4);
    /// Reply to PING.
    pub const ALIVE: MsgType = MsgType(0x5);
    /// Inform the ring that a node has been kicked.
    pub const KICK: MsgType = MsgType(0x6);

    pub fn is_user(self) -> bool {
        self.0 >= 16
    }
}

/// What is packed into a UDP datagram and sent around the ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u32,
    pub mtype: MsgType,
    pub read_count: u32,
    data: Vec<u8>,
}

impl Message {
    /// Allocate a message with a random id, copying from `data`. Data
    /// beyond the payload capacity is cut off.
    pub fn new(mtype: MsgType, data: &[u8]) -> Message {
        let n = data.len().min(MAX_DATA_LENGTH);
        Message {
            id: rand::random::<u32>(),
            mtype,
            read_count: 0,
            data: data[..n].to_vec(),
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Replace the payload in place, keeping id and read count. Used by
    /// nodes that rewrite a message before forwarding it.
    pub fn set_data(&mut self, data: &[u8]) {
        let n = data.len().min(MAX_DATA_LENGTH);
        self.data = data[..n].to_vec();
    }

    pub fn pack(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(HEADER_LENGTH + self.data.len());
        payload.extend_from_slice(&self.id.to_be_bytes());
        payload.extend_from_slice(&self.mtype.0.to_be_bytes());
        payload.extend_from_slice(&self.read_count.to_be_bytes());
        payload.extend_from_slice(&self.data);
        payload
    }

    /// Parse a datagram. Returns `None` for payloads that cannot hold a
    /// header or exceed the datagram size; such datagrams are dropped.
    pub fn unpack(payload: &[u8]) -> Option<Message> {
        if payload.len() < HEADER_LENGTH || payload.len() > MAX_PAYLOAD_LENGTH {
            return None;
        }
        let id = u32::from_be_bytes(payload[0..4].try_into().unwrap());
        let mtype = u32::from_be_bytes(payload[4..8].try_into().unwrap());
        let read_count = u32::from_be_bytes(payload[8..12].try_into().unwrap());
        Some(Message {
            id,
            mtype: MsgType(mtype),
            read_count,
            data: payload[HEADER_LENGTH..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_unpack_round_trip() {
        let msg = Message::new(MsgType(0x10), &[1, 2, 3, 4]);
        let unpacked = Message::unpack(&msg.pack()).unwrap();
        assert_eq!(unpacked, msg);
    }

    #[test]
    fn header_is_big_endian() {
        let mut msg = Message::new(MsgType::KICK, &[]);
        msg.id = 0x01020304;
        msg.read_count = 5;
        let payload = msg.pack();
        assert_eq!(&payload[0..4], &[1, 2, 3, 4]);
        assert_eq!(&payload[4..8], &[0, 0, 0, 6]);
        assert_eq!(&payload[8..12], &[0, 0, 0, 5]);
    }

    #[test]
    fn short_datagrams_are_dropped() {
        assert!(Message::unpack(&[0; 11]).is_none());
        assert!(Message::unpack(&[0; 12]).is_some());
        assert!(Message::unpack(&vec![0; MAX_PAYLOAD_LENGTH + 1]).is_none());
    }

    #[test]
    fn oversized_data_is_cut_off() {
        let msg = Message::new(MsgType(0x20), &[0xab; 400]);
        assert_eq!(msg.data().len(), MAX_DATA_LENGTH);
        let mut msg = Message::new(MsgType(0x20), &[]);
        msg.set_data(&[0xcd; 400]);
        assert_eq!(msg.data().len(), MAX_DATA_LENGTH);
    }

    #[test]
    fn reserved_types_are_not_user_types() {
        assert!(!MsgType::KICK.is_user());
        assert!(!MsgType(0xf).is_user());
        assert!(MsgType(0x10).is_user());
    }
}
