//! Payload formats for the fleet protocol on top of the overlay. All
//! integers are big endian; the cost travels as the raw bit pattern of
//! an f64 so that no rounding ever changes a bid in transit.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use overlay::{Addr, Message, MsgType, Node};
use shared_resources::call::Direction;
use shared_resources::request::Request;
use shared_resources::NUM_FLOORS;

pub const COST: MsgType = MsgType(0x10);
pub const ASSIGN: MsgType = MsgType(0x11);
pub const BACKUP: MsgType = MsgType(0x12);
pub const SYNC: MsgType = MsgType(0x13);

const COST_LENGTH: usize = 32;
const ASSIGN_LENGTH: usize = 28;
pub const BACKUP_LENGTH: usize = 34 + 3 * NUM_FLOORS;
const SYNC_LENGTH: usize = 3 * NUM_FLOORS;

#[derive(Debug)]
pub enum DecodeError {
    Length { expected: usize, got: usize },
    Direction(u32),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Length { expected, got } => {
                write!(f, "payload is {} bytes, expected {}", got, expected)
            }
            DecodeError::Direction(wire) => write!(f, "no direction encodes as {}", wire),
        }
    }
}

impl std::error::Error for DecodeError {}

fn check_length(p: &[u8], expected: usize) -> Result<(), DecodeError> {
    if p.len() != expected {
        return Err(DecodeError::Length {
            expected,
            got: p.len(),
        });
    }
    Ok(())
}

fn unpack_addr(p: &[u8]) -> Addr {
    let mut addr = Addr::zero();
    addr.0.copy_from_slice(&p[..16]);
    addr
}

/// Wrap an encoded payload in a fresh message and put it on the ring.
/// Returns the message id.
pub fn send_data(node: &Node, mtype: MsgType, data: &[u8]) -> u32 {
    let msg = Message::new(mtype, data);
    let id = msg.id;
    node.send_message(msg);
    id
}

/// A bid in flight. Every car that sees the message lowers `elevator`
/// and `cost` to its own if it can do better.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostData {
    pub elevator: Addr,
    pub req: Request,
    pub cost: f64,
}

impl CostData {
    pub fn encode(&self) -> [u8; COST_LENGTH] {
        let mut p = [0; COST_LENGTH];
        p[..16].copy_from_slice(&self.elevator.0);
        p[16..20].copy_from_slice(&(self.req.floor as u32).to_be_bytes());
        p[20..24].copy_from_slice(&self.req.direction.to_wire().to_be_bytes());
        p[24..32].copy_from_slice(&self.cost.to_bits().to_be_bytes());
        p
    }

    pub fn decode(p: &[u8]) -> Result<CostData, DecodeError> {
        check_length(p, COST_LENGTH)?;
        let wire = u32::from_be_bytes(p[20..24].try_into().unwrap());
        let direction = Direction::from_wire(wire).ok_or(DecodeError::Direction(wire))?;
        Ok(CostData {
            elevator: unpack_addr(p),
            req: Request {
                floor: u32::from_be_bytes(p[16..20].try_into().unwrap()) as u8,
                direction,
            },
            cost: f64::from_bits(u64::from_be_bytes(p[24..32].try_into().unwrap())),
        })
    }
}

/// Awards a request to the winning car, which flips `taken` before
/// forwarding. The originator reads `taken` on return to learn whether
/// the winner is still alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignData {
    pub elevator: Addr,
    pub req: Request,
    pub taken: bool,
}

impl AssignData {
    pub fn encode(&self) -> [u8; ASSIGN_LENGTH] {
        let mut p = [0; ASSIGN_LENGTH];
        p[..16].copy_from_slice(&self.elevator.0);
        p[16..20].copy_from_slice(&(self.req.floor as u32).to_be_bytes());
        p[20..24].copy_from_slice(&self.req.direction.to_wire().to_be_bytes());
        p[24..28].copy_from_slice(&(self.taken as u32).to_be_bytes());
        p
    }

    pub fn decode(p: &[u8]) -> Result<AssignData, DecodeError> {
        check_length(p, ASSIGN_LENGTH)?;
        let wire = u32::from_be_bytes(p[20..24].try_into().unwrap());
        let direction = Direction::from_wire(wire).ok_or(DecodeError::Direction(wire))?;
        Ok(AssignData {
            elevator: unpack_addr(p),
            req: Request {
                floor: u32::from_be_bytes(p[16..20].try_into().unwrap()) as u8,
                direction,
            },
            taken: u32::from_be_bytes(p[24..28].try_into().unwrap()) == 1,
        })
    }
}

/// Snapshot of one car's pending work, stamped with its owner and
/// creation time. Replicated to every peer and to the watchdog.
///
/// Layout: owner (16) | timestamp (15 + 1 pad) | floor | direction |
/// then per floor the triple (hall down, hall up, cab destination).
/// The direction byte uses 255/0/1, unlike the +1 encoding in COST and
/// ASSIGN; both encodings are load bearing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackupData {
    pub elevator: Addr,
    pub created: SystemTime,
    pub floor: u8,
    pub direction: Direction,
    pub hall_reqs: [[bool; 2]; NUM_FLOORS],
    pub dests: [bool; NUM_FLOORS],
}

impl Default for BackupData {
    fn default() -> Self {
        BackupData {
            elevator: Addr::zero(),
            created: UNIX_EPOCH,
            floor: 0,
            direction: Direction::Stop,
            hall_reqs: [[false; 2]; NUM_FLOORS],
            dests: [false; NUM_FLOORS],
        }
    }
}

impl BackupData {
    pub fn encode(&self) -> [u8; BACKUP_LENGTH] {
        let mut p = [0; BACKUP_LENGTH];
        p[..16].copy_from_slice(&self.elevator.0);

        let since_epoch = self
            .created
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        p[16..24].copy_from_slice(&since_epoch.as_secs().to_be_bytes());
        p[24..28].copy_from_slice(&since_epoch.subsec_nanos().to_be_bytes());
        // Bytes 28..32 stay zero: the tail of the timestamp field plus
        // one byte of padding.

        p[32] = self.floor;
        p[33] = self.direction.to_backup_byte();

        for floor in 0..NUM_FLOORS {
            let triple = 34 + 3 * floor;
            p[triple] = self.hall_reqs[floor][0] as u8;
            p[triple + 1] = self.hall_reqs[floor][1] as u8;
            p[triple + 2] = self.dests[floor] as u8;
        }
        p
    }

    pub fn decode(p: &[u8]) -> Result<BackupData, DecodeError> {
        check_length(p, BACKUP_LENGTH)?;

        let secs = u64::from_be_bytes(p[16..24].try_into().unwrap());
        let nanos = u32::from_be_bytes(p[24..28].try_into().unwrap());
        let direction = Direction::from_backup_byte(p[33])
            .ok_or(DecodeError::Direction(p[33] as u32))?;

        let mut backup = BackupData {
            elevator: unpack_addr(p),
            created: UNIX_EPOCH + Duration::new(secs, nanos),
            floor: p[32],
            direction,
            hall_reqs: [[false; 2]; NUM_FLOORS],
            dests: [false; NUM_FLOORS],
        };
        for floor in 0..NUM_FLOORS {
            let triple = 34 + 3 * floor;
            backup.hall_reqs[floor][0] = p[triple] == 1;
            backup.hall_reqs[floor][1] = p[triple + 1] == 1;
            backup.dests[floor] = p[triple + 2] == 1;
        }
        Ok(backup)
    }

    /// The hall calls in this backup as plain requests, bottom floor
    /// first, down before up.
    pub fn requests(&self) -> Vec<Request> {
        let mut requests = Vec::new();
        for floor in 0..NUM_FLOORS {
            for index in 0..2 {
                if self.hall_reqs[floor][index] {
                    requests.push(Request::new(
                        floor as u8,
                        Direction::from_hall_index(index).unwrap(),
                    ));
                }
            }
        }
        requests
    }
}

/// One-shot OR-merge of hall calls across the fleet. The originator
/// sends it empty; every receiver merges its own state in before
/// forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncData {
    pub latest: [[bool; 2]; NUM_FLOORS],
}

impl SyncData {
    pub fn encode(&self) -> [u8; SYNC_LENGTH] {
        let mut p = [0; SYNC_LENGTH];
        for floor in 0..NUM_FLOORS {
            let triple = 3 * floor;
            p[triple] = self.latest[floor][0] as u8;
            p[triple + 1] = self.latest[floor][1] as u8;
            // Cab slot of the triple is always zero: cab calls are
            // private to their car and never synchronized.
        }
        p
    }

    pub fn decode(p: &[u8]) -> Result<SyncData, DecodeError> {
        check_length(p, SYNC_LENGTH)?;
        let mut sync = SyncData::default();
        for floor in 0..NUM_FLOORS {
            let triple = 3 * floor;
            sync.latest[floor][0] = p[triple] == 1;
            sync.latest[floor][1] = p[triple + 1] == 1;
        }
        Ok(sync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn some_addr() -> Addr {
        Addr::from(Ipv4Addr::new(10, 100, 23, 7))
    }

    #[test]
    fn cost_data_round_trips() {
        let cd = CostData {
            elevator: some_addr(),
            req: Request::new(2, Direction::Down),
            cost: 7.5,
        };
        assert_eq!(CostData::decode(&cd.encode()).unwrap(), cd);
    }

    #[test]
    fn cost_direction_uses_plus_one_encoding() {
        let cd = CostData {
            elevator: some_addr(),
            req: Request::new(1, Direction::Down),
            cost: 0.0,
        };
        let p = cd.encode();
        assert_eq!(&p[20..24], &[0, 0, 0, 0]);

        let cd = CostData {
            req: Request::new(1, Direction::Up),
            ..cd
        };
        assert_eq!(&cd.encode()[20..24], &[0, 0, 0, 2]);
    }

    #[test]
    fn cost_is_transmitted_bit_exactly() {
        let cd = CostData {
            elevator: some_addr(),
            req: Request::new(0, Direction::Up),
            cost: 0.1 + 0.2, // not representable exactly; bits must survive
        };
        let decoded = CostData::decode(&cd.encode()).unwrap();
        assert_eq!(decoded.cost.to_bits(), cd.cost.to_bits());
    }

    #[test]
    fn assign_data_round_trips() {
        for taken in [false, true] {
            let ad = AssignData {
                elevator: some_addr(),
                req: Request::new(3, Direction::Down),
                taken,
            };
            assert_eq!(AssignData::decode(&ad.encode()).unwrap(), ad);
        }
    }

    #[test]
    fn backup_data_round_trips() {
        let mut bd = BackupData {
            elevator: some_addr(),
            created: UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789),
            floor: 2,
            direction: Direction::Down,
            ..BackupData::default()
        };
        bd.hall_reqs[1] = [true, false];
        bd.hall_reqs[2] = [false, true];
        bd.dests[3] = true;
        assert_eq!(BackupData::decode(&bd.encode()).unwrap(), bd);
    }

    #[test]
    fn backup_direction_byte_differs_from_wire_encoding() {
        let bd = BackupData {
            direction: Direction::Down,
            ..BackupData::default()
        };
        assert_eq!(bd.encode()[33], 255);
        let bd = BackupData {
            direction: Direction::Up,
            ..BackupData::default()
        };
        assert_eq!(bd.encode()[33], 1);
    }

    #[test]
    fn all_zero_backup_decodes_as_empty() {
        let bd = BackupData::decode(&[0; BACKUP_LENGTH]).unwrap();
        assert_eq!(bd, BackupData::default());
        assert!(bd.requests().is_empty());
    }

    #[test]
    fn backup_requests_come_out_in_floor_order() {
        let mut bd = BackupData::default();
        bd.hall_reqs[3] = [true, false];
        bd.hall_reqs[0] = [false, true];
        assert_eq!(
            bd.requests(),
            vec![
                Request::new(0, Direction::Up),
                Request::new(3, Direction::Down),
            ]
        );
    }

    #[test]
    fn sync_data_round_trips_and_skips_cab_slots() {
        let mut sd = SyncData::default();
        sd.latest[0][1] = true;
        sd.latest[2][0] = true;
        let p = sd.encode();
        assert_eq!(SyncData::decode(&p).unwrap(), sd);
        for floor in 0..NUM_FLOORS {
            assert_eq!(p[3 * floor + 2], 0);
        }
    }

    #[test]
    fn truncated_payloads_are_refused() {
        assert!(matches!(
            CostData::decode(&[0; COST_LENGTH - 1]),
            Err(DecodeError::Length { .. })
        ));
        assert!(matches!(
            AssignData::decode(&[0; ASSIGN_LENGTH + 1]),
            Err(DecodeError::Length { .. })
        ));
        assert!(BackupData::decode(&[0; 10]).is_err());
        assert!(SyncData::decode(&[]).is_err());
    }

    #[test]
    fn unknown_direction_bytes_are_refused() {
        let mut p = [0; BACKUP_LENGTH];
        p[33] = 7;
        assert!(matches!(
            BackupData::decode(&p),
            Err(DecodeError::Direction(7))
        ));

        let mut p = [0; COST_LENGTH];
        p[23] = 3;
        assert!(matches!(
            CostData::decode(&p),
            Err(DecodeError::Direction(3))
        ));
    }
}
