use std::sync::Arc;
use std::thread::{self, spawn};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use log::warn;
use parking_lot::Mutex;

use elevio::elev;
use shared_resources::call::{Call, Direction};
use shared_resources::request::Request;
use shared_resources::NUM_FLOORS;

use crate::messages::BackupData;
use crate::panel::Panel;

const MOTION_TIMEOUT: Duration = Duration::from_secs(2);
const DOOR_OPEN_TIME: Duration = Duration::from_secs(3);
const SENSOR_POLL: Duration = Duration::from_millis(100);
const IDLE_POLL: Duration = Duration::from_millis(25);
const AT_FLOOR_WAIT: Duration = Duration::from_secs(1);

/// Car state as seen from outside the state machine. Other tasks set
/// request bits in here; the state machine copies the struct by value
/// at the top of every step and so never observes a torn update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarState {
    pub floor: u8,
    pub direction: Direction,
    pub dests: [bool; NUM_FLOORS],
    pub hall_reqs: [[bool; 2]; NUM_FLOORS],
    pub stopped: bool,
}

impl CarState {
    fn new() -> CarState {
        CarState {
            floor: 0,
            direction: Direction::Stop,
            dests: [false; NUM_FLOORS],
            hall_reqs: [[false; 2]; NUM_FLOORS],
            stopped: false,
        }
    }
}

/// Handle to the running car.
#[derive(Clone)]
pub struct Car {
    shared: Arc<Mutex<CarState>>,
}

impl Car {
    pub fn snapshot(&self) -> CarState {
        *self.shared.lock()
    }

    /// False while the motion watchdog considers the car stuck.
    pub fn is_running(&self) -> bool {
        !self.shared.lock().stopped
    }

    /// Hand the car a hall call it is now responsible for. Invalid
    /// requests are refused.
    pub fn add_request(&self, request: Request) {
        if !request.is_valid() {
            return;
        }
        let index = request.direction.hall_index().unwrap();
        self.shared.lock().hall_reqs[request.floor as usize][index] = true;
    }

    /// Merge pending work from a restored backup.
    pub fn load_backup(&self, backup: &BackupData) {
        let mut shared = self.shared.lock();
        for floor in 0..NUM_FLOORS {
            shared.dests[floor] |= backup.dests[floor];
            shared.hall_reqs[floor][0] |= backup.hall_reqs[floor][0];
            shared.hall_reqs[floor][1] |= backup.hall_reqs[floor][1];
        }
    }
}

pub fn init(elevator: elev::Elevator, panel: Panel, commands_rx: Receiver<u8>) -> Car {
    let car = Car {
        shared: Arc::new(Mutex::new(CarState::new())),
    };

    {
        let fsm = Fsm {
            elevator,
            panel,
            commands_rx,
            shared: car.shared.clone(),
            floor: 0,
            direction: Direction::Stop,
            dests: [false; NUM_FLOORS],
            hall_reqs: [[false; 2]; NUM_FLOORS],
        };
        spawn(move || fsm.run());
    }

    car
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Moving,
    AtFloor,
    DoorsOpen,
    GotoFloor,
    Idle,
}

struct Fsm {
    elevator: elev::Elevator,
    panel: Panel,
    commands_rx: Receiver<u8>,
    shared: Arc<Mutex<CarState>>,

    // Working copies, refreshed from `shared` at the top of each step.
    floor: u8,
    direction: Direction,
    dests: [bool; NUM_FLOORS],
    hall_reqs: [[bool; 2]; NUM_FLOORS],
}

impl Fsm {
    fn run(mut self) {
        let mut state = State::Start;
        loop {
            self.sync();
            state = match state {
                State::Start => self.start(),
                State::Moving => self.moving(),
                State::AtFloor => self.at_floor(),
                State::DoorsOpen => self.doors_open(),
                State::GotoFloor => self.goto_floor(),
                State::Idle => self.idle(),
            };
        }
    }

    fn sync(&mut self) {
        let shared = self.shared.lock();
        self.dests = shared.dests;
        self.hall_reqs = shared.hall_reqs;
    }

    fn start(&mut self) -> State {
        match self.elevator.floor_sensor() {
            None => {
                let direction = match self.direction {
                    Direction::Stop => Direction::Down,
                    dir => dir,
                };
                self.set_direction(direction);
                self.set_motor(direction);
                State::Moving
            }
            Some(floor) => {
                self.set_floor(floor);
                State::Idle
            }
        }
    }

    fn moving(&mut self) -> State {
        let deadline = Instant::now() + MOTION_TIMEOUT;
        let mut reported = false;
        loop {
            if let Some(floor) = self.elevator.floor_sensor() {
                self.set_stopped(false);
                self.set_floor(floor);
                return State::AtFloor;
            }
            if !reported && Instant::now() > deadline {
                warn!(
                    "no floor reached within {:?}, assuming the motor is stuck",
                    MOTION_TIMEOUT
                );
                self.set_stopped(true);
                reported = true;
            }
            thread::sleep(SENSOR_POLL);
        }
    }

    fn at_floor(&mut self) -> State {
        let floor = self.floor as usize;

        if self.dests[floor] {
            self.set_motor(Direction::Stop);
            self.clear_dest(self.floor);
            // A stop serves the floor in both directions; a waiting
            // passenger takes a short ride the wrong way over watching
            // the car leave without them.
            self.clear_request(self.floor, Direction::Up);
            self.clear_request(self.floor, Direction::Down);
            return State::DoorsOpen;
        }

        let towards = self
            .direction
            .hall_index()
            .map_or(false, |index| self.hall_reqs[floor][index]);
        if towards {
            self.set_motor(Direction::Stop);
            self.clear_request(self.floor, Direction::Up);
            self.clear_request(self.floor, Direction::Down);
            return State::DoorsOpen;
        }

        if !has_dest(&self.dests) && !has_work(&self.hall_reqs, self.floor, self.direction) {
            self.set_motor(Direction::Stop);
            self.set_direction(Direction::Stop);
            return State::Idle;
        }

        // Fail safe; should never be true.
        if (self.direction == Direction::Up && floor == NUM_FLOORS - 1)
            || (self.direction == Direction::Down && self.floor == 0)
        {
            self.set_motor(Direction::Stop);
            self.set_direction(Direction::Stop);
            return State::Idle;
        }

        // Wait until the floor is passed.
        let deadline = Instant::now() + AT_FLOOR_WAIT;
        while self.elevator.floor_sensor().is_some() && Instant::now() < deadline {
            thread::sleep(SENSOR_POLL);
        }
        State::Moving
    }

    fn doors_open(&mut self) -> State {
        self.elevator.door_light(true);

        // The doors stay open for the full dwell. This is the only
        // place cab presses are taken in: passengers choose their
        // destination while boarding.
        let deadline = Instant::now() + DOOR_OPEN_TIME;
        while let Ok(floor) = self.commands_rx.recv_deadline(deadline) {
            self.add_dest(floor);
        }

        self.elevator.door_light(false);
        State::GotoFloor
    }

    fn goto_floor(&mut self) -> State {
        // The motor is stopped here; direction still holds the previous
        // direction of motion.
        if has_dest(&self.dests) {
            for floor in 0..NUM_FLOORS {
                if !self.dests[floor] {
                    continue;
                }
                if floor > self.floor as usize && self.direction == Direction::Up {
                    self.set_motor(Direction::Up);
                    return State::Moving;
                }
                if floor < self.floor as usize && self.direction == Direction::Down {
                    self.set_motor(Direction::Down);
                    return State::Moving;
                }
            }

            if self.dests[self.floor as usize] {
                // Someone wants this very floor.
                return State::AtFloor;
            }

            // No destination in the direction of motion; turn around.
            let flipped = match self.direction {
                Direction::Stop => Direction::Up,
                dir => dir.opposite(),
            };
            self.set_direction(flipped);
            return State::GotoFloor;
        }

        if has_work(&self.hall_reqs, self.floor, self.direction) {
            self.set_motor(self.direction);
            return State::Moving;
        }

        self.set_motor(Direction::Stop);
        self.set_direction(Direction::Stop);
        State::Idle
    }

    fn idle(&mut self) -> State {
        if has_dest(&self.dests) {
            self.set_direction(Direction::Up);
            return State::GotoFloor;
        }

        for floor in 0..NUM_FLOORS {
            if !self.hall_reqs[floor][0] && !self.hall_reqs[floor][1] {
                continue;
            }

            if floor == self.floor as usize {
                let direction = if self.hall_reqs[floor][1] {
                    Direction::Up
                } else {
                    Direction::Down
                };
                self.clear_request(self.floor, Direction::Up);
                self.clear_request(self.floor, Direction::Down);
                self.set_direction(direction);
                return State::DoorsOpen;
            }

            let direction = if floor > self.floor as usize {
                Direction::Up
            } else {
                Direction::Down
            };
            self.set_direction(direction);
            return State::GotoFloor;
        }

        thread::sleep(IDLE_POLL);
        State::Idle
    }

    fn set_motor(&self, direction: Direction) {
        self.elevator.motor_direction(direction.as_elev_constant());
    }

    fn set_floor(&mut self, floor: u8) {
        self.floor = floor;
        self.shared.lock().floor = floor;
        self.elevator.floor_indicator(floor);
    }

    fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
        self.shared.lock().direction = direction;
    }

    fn set_stopped(&mut self, stopped: bool) {
        self.shared.lock().stopped = stopped;
    }

    fn add_dest(&mut self, floor: u8) {
        if floor as usize >= NUM_FLOORS {
            return;
        }
        self.dests[floor as usize] = true;
        self.shared.lock().dests[floor as usize] = true;
    }

    fn clear_dest(&mut self, floor: u8) {
        self.dests[floor as usize] = false;
        self.shared.lock().dests[floor as usize] = false;
        self.panel.set_lamp(Call::Cab, floor, false);
    }

    /// Clears the request and its panel lamp. The two impossible
    /// boundary requests are ignored.
    fn clear_request(&mut self, floor: u8, direction: Direction) {
        let request = Request::new(floor, direction);
        if !request.is_valid() {
            return;
        }
        let index = direction.hall_index().unwrap();
        self.hall_reqs[floor as usize][index] = false;
        self.shared.lock().hall_reqs[floor as usize][index] = false;
        self.panel.set_lamp(request.button(), floor, false);
    }
}

pub(crate) fn has_dest(dests: &[bool; NUM_FLOORS]) -> bool {
    dests.iter().any(|&d| d)
}

/// Whether any hall request lies beyond `floor` in the direction of
/// motion.
pub(crate) fn has_work(
    hall_reqs: &[[bool; 2]; NUM_FLOORS],
    floor: u8,
    direction: Direction,
) -> bool {
    for f in 0..NUM_FLOORS {
        if !hall_reqs[f][0] && !hall_reqs[f][1] {
            continue;
        }
        if (direction == Direction::Up && f > floor as usize)
            || (direction == Direction::Down && f < floor as usize)
        {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn has_dest_scans_the_whole_array() {
        assert!(!has_dest(&[false; NUM_FLOORS]));
        let mut dests = [false; NUM_FLOORS];
        dests[NUM_FLOORS - 1] = true;
        assert!(has_dest(&dests));
    }

    #[test]
    fn has_work_respects_direction() {
        let mut hall_reqs = [[false; 2]; NUM_FLOORS];
        hall_reqs[2][0] = true; // down call at floor 2

        assert!(has_work(&hall_reqs, 0, Direction::Up));
        assert!(has_work(&hall_reqs, 3, Direction::Down));
        assert!(!has_work(&hall_reqs, 2, Direction::Up));
        assert!(!has_work(&hall_reqs, 2, Direction::Down));
        assert!(!has_work(&hall_reqs, 0, Direction::Down));
    }

    #[test]
    fn stopped_direction_never_has_work() {
        let mut hall_reqs = [[false; 2]; NUM_FLOORS];
        hall_reqs[1][1] = true;
        assert!(!has_work(&hall_reqs, 0, Direction::Stop));
    }
}
