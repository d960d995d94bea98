use super::call::{Call, Direction};
use super::NUM_FLOORS;

/// A hall call: somebody at `floor` wants to travel in `direction`.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub floor: u8,
    pub direction: Direction,
}

impl Request {
    pub fn new(floor: u8, direction: Direction) -> Self {
        Request { floor, direction }
    }

    /// The bottom floor has no down call and the top floor has no up
    /// call; those two combinations are refused at every ingress point.
    pub fn is_valid(&self) -> bool {
        if (self.floor as usize) >= NUM_FLOORS {
            return false;
        }
        match self.direction {
            Direction::Down => self.floor > 0,
            Direction::Up => (self.floor as usize) < NUM_FLOORS - 1,
            Direction::Stop => false,
        }
    }

    /// The hall button that registers this request.
    pub fn button(&self) -> Call {
        match self.direction {
            Direction::Up => Call::HallUp,
            _ => Call::HallDown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_requests_are_invalid() {
        assert!(!Request::new(0, Direction::Down).is_valid());
        assert!(!Request::new((NUM_FLOORS - 1) as u8, Direction::Up).is_valid());
        assert!(!Request::new(NUM_FLOORS as u8, Direction::Up).is_valid());
        assert!(!Request::new(1, Direction::Stop).is_valid());
    }

    #[test]
    fn interior_requests_are_valid() {
        assert!(Request::new(0, Direction::Up).is_valid());
        assert!(Request::new(1, Direction::Down).is_valid());
        assert!(Request::new((NUM_FLOORS - 1) as u8, Direction::Down).is_valid());
    }
}
