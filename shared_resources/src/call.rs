use elevio::elev;

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Down,
    Stop,
    Up,
}

impl Direction {
    pub fn from_elev_constant(elev_constant: u8) -> Option<Self> {
        match elev_constant {
            elev::DIRN_DOWN => Some(Direction::Down),
            elev::DIRN_STOP => Some(Direction::Stop),
            elev::DIRN_UP => Some(Direction::Up),
            _ => None,
        }
    }

    pub fn as_elev_constant(self) -> u8 {
        match self {
            Direction::Down => elev::DIRN_DOWN,
            Direction::Stop => elev::DIRN_STOP,
            Direction::Up => elev::DIRN_UP,
        }
    }

    /// Signed floor increment of one movement step.
    pub fn offset(self) -> i8 {
        match self {
            Direction::Down => -1,
            Direction::Stop => 0,
            Direction::Up => 1,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Down => Direction::Up,
            Direction::Up => Direction::Down,
            Direction::Stop => Direction::Stop,
        }
    }

    /// Index into the per-floor hall request pair: Down = 0, Up = 1.
    pub fn hall_index(self) -> Option<usize> {
        match self {
            Direction::Down => Some(0),
            Direction::Up => Some(1),
            Direction::Stop => None,
        }
    }

    pub fn from_hall_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Direction::Down),
            1 => Some(Direction::Up),
            _ => None,
        }
    }

    /// Encoding used in COST and ASSIGN payloads: the direction offset
    /// plus one, stored as a u32.
    pub fn to_wire(self) -> u32 {
        (self.offset() + 1) as u32
    }

    pub fn from_wire(wire: u32) -> Option<Self> {
        match wire {
            0 => Some(Direction::Down),
            1 => Some(Direction::Stop),
            2 => Some(Direction::Up),
            _ => None,
        }
    }

    /// Encoding used in the BACKUP payload: 255 = Down, 0 = Stop, 1 = Up.
    /// Kept distinct from `to_wire` on purpose; both are part of the
    /// peer-facing format.
    pub fn to_backup_byte(self) -> u8 {
        self.as_elev_constant()
    }

    pub fn from_backup_byte(byte: u8) -> Option<Self> {
        Self::from_elev_constant(byte)
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    HallUp = 0,
    HallDown = 1,
    Cab = 2,
}

impl Call {
    pub fn from_elev_constant(elev_constant: u8) -> Option<Self> {
        match elev_constant {
            elev::HALL_UP => Some(Call::HallUp),
            elev::HALL_DOWN => Some(Call::HallDown),
            elev::CAB => Some(Call::Cab),
            _ => None,
        }
    }

    pub fn as_elev_constant(self) -> u8 {
        match self {
            Call::HallUp => elev::HALL_UP,
            Call::HallDown => elev::HALL_DOWN,
            Call::Cab => elev::CAB,
        }
    }

    pub fn from_direction(direction: Direction) -> Option<Self> {
        match direction {
            Direction::Up => Some(Call::HallUp),
            Direction::Down => Some(Call::HallDown),
            Direction::Stop => None,
        }
    }

    pub fn iter() -> impl Iterator<Item = Call> {
        [Call::HallUp, Call::HallDown, Call::Cab].iter().copied()
    }

    pub fn iter_hall() -> impl Iterator<Item = Call> {
        [Call::HallUp, Call::HallDown].iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_encoding_is_offset_plus_one() {
        assert_eq!(Direction::Down.to_wire(), 0);
        assert_eq!(Direction::Stop.to_wire(), 1);
        assert_eq!(Direction::Up.to_wire(), 2);
        for dir in [Direction::Down, Direction::Stop, Direction::Up] {
            assert_eq!(Direction::from_wire(dir.to_wire()), Some(dir));
        }
        assert_eq!(Direction::from_wire(3), None);
    }

    #[test]
    fn backup_encoding_matches_driver_constants() {
        assert_eq!(Direction::Down.to_backup_byte(), 255);
        assert_eq!(Direction::Stop.to_backup_byte(), 0);
        assert_eq!(Direction::Up.to_backup_byte(), 1);
        assert_eq!(Direction::from_backup_byte(255), Some(Direction::Down));
        assert_eq!(Direction::from_backup_byte(2), None);
    }

    #[test]
    fn hall_index_covers_both_hall_directions() {
        assert_eq!(Direction::Down.hall_index(), Some(0));
        assert_eq!(Direction::Up.hall_index(), Some(1));
        assert_eq!(Direction::Stop.hall_index(), None);
        assert_eq!(Direction::from_hall_index(0), Some(Direction::Down));
        assert_eq!(Direction::from_hall_index(1), Some(Direction::Up));
    }

    #[test]
    fn call_from_direction() {
        assert_eq!(Call::from_direction(Direction::Up), Some(Call::HallUp));
        assert_eq!(Call::from_direction(Direction::Down), Some(Call::HallDown));
        assert_eq!(Call::from_direction(Direction::Stop), None);
    }
}
