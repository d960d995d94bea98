//! A side-effect-free copy of the car state machine, used to estimate
//! what serving one more hall call would cost this car. The virtual
//! car replays the same decisions the real one would make, adding a
//! fixed amount per movement and per door opening, until it first
//! stops at the requested floor.

use shared_resources::call::Direction;
use shared_resources::request::Request;
use shared_resources::NUM_FLOORS;

use crate::fsm::CarState;

/// Bid placed by a car whose motion watchdog has tripped. Loses
/// against any live bid.
pub const STUCK_COST: f64 = 9000.0;

const MOVE_COST: f64 = 3.0;
const DOOR_COST: f64 = 4.0;
const COMEBACK_COST: f64 = 3.0;

// Pathological inputs return the cost accumulated so far instead of
// looping.
const MAX_SIMULATION_STEPS: u32 = 64;

/// Cost for this car to serve `request` on top of its current plan.
/// Deterministic: equal inputs always give equal cost.
pub fn cost(state: &CarState, request: Request) -> f64 {
    if state.stopped {
        return STUCK_COST;
    }

    let mut sim = Simulator {
        floor: state.floor as i32,
        direction: state.direction,
        cost: 0.0,
        dests: state.dests,
        hall_reqs: state.hall_reqs,
        virtual_req: request,
    };
    if let Some(index) = request.direction.hall_index() {
        sim.hall_reqs[request.floor as usize][index] = true;
    }
    sim.run()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SimState {
    Moving,
    AtFloor,
    DoorsOpen,
    GotoFloor,
    Idle,
    Done,
}

struct Simulator {
    floor: i32,
    direction: Direction,
    cost: f64,
    dests: [bool; NUM_FLOORS],
    hall_reqs: [[bool; 2]; NUM_FLOORS],
    virtual_req: Request,
}

impl Simulator {
    fn run(&mut self) -> f64 {
        let mut state = SimState::GotoFloor;
        for _ in 0..MAX_SIMULATION_STEPS {
            state = match state {
                SimState::Moving => self.moving(),
                SimState::AtFloor => self.at_floor(),
                SimState::DoorsOpen => self.doors_open(),
                SimState::GotoFloor => self.goto_floor(),
                SimState::Idle => self.idle(),
                SimState::Done => return self.cost,
            };
        }
        self.cost
    }

    /// The stop that serves the virtual request still opens the doors.
    fn serve_virtual(&mut self) -> SimState {
        self.cost += DOOR_COST;
        SimState::Done
    }

    fn moving(&mut self) -> SimState {
        self.floor += self.direction.offset() as i32;
        self.cost += MOVE_COST;
        SimState::AtFloor
    }

    fn at_floor(&mut self) -> SimState {
        let floor = self.floor as usize;

        if self.dests[floor] {
            self.dests[floor] = false;
            if self.floor == self.virtual_req.floor as i32 {
                return self.serve_virtual();
            }
            self.clear_request(Direction::Up);
            self.clear_request(Direction::Down);
            return SimState::DoorsOpen;
        }

        let towards = self
            .direction
            .hall_index()
            .map_or(false, |index| self.hall_reqs[floor][index]);
        if towards {
            if self.floor == self.virtual_req.floor as i32 {
                return self.serve_virtual();
            }
            self.clear_request(Direction::Up);
            self.clear_request(Direction::Down);
            return SimState::DoorsOpen;
        }

        if !self.has_dest() && !self.has_work() {
            self.direction = Direction::Stop;
            return SimState::Idle;
        }

        if (self.direction == Direction::Up && floor == NUM_FLOORS - 1)
            || (self.direction == Direction::Down && self.floor == 0)
        {
            self.direction = Direction::Stop;
            return SimState::Idle;
        }

        SimState::Moving
    }

    fn doors_open(&mut self) -> SimState {
        self.cost += DOOR_COST;

        // A stop past the requested floor means the car has to come
        // back for it; charge the detour.
        let req_floor = self.virtual_req.floor as i32;
        if (self.direction == Direction::Up && req_floor < self.floor)
            || (self.direction == Direction::Down && req_floor > self.floor)
        {
            self.cost += COMEBACK_COST;
        }

        SimState::GotoFloor
    }

    fn goto_floor(&mut self) -> SimState {
        if self.has_dest() {
            for floor in 0..NUM_FLOORS {
                if !self.dests[floor] {
                    continue;
                }
                if (floor as i32) > self.floor && self.direction == Direction::Up {
                    return SimState::Moving;
                }
                if (floor as i32) < self.floor && self.direction == Direction::Down {
                    return SimState::Moving;
                }
            }

            if self.dests[self.floor as usize] {
                return SimState::AtFloor;
            }

            self.direction = match self.direction {
                Direction::Stop => Direction::Up,
                dir => dir.opposite(),
            };
            return SimState::GotoFloor;
        }

        if self.has_work() {
            return SimState::Moving;
        }

        self.direction = Direction::Stop;
        SimState::Idle
    }

    fn idle(&mut self) -> SimState {
        for floor in 0..NUM_FLOORS {
            if !self.hall_reqs[floor][0] && !self.hall_reqs[floor][1] {
                continue;
            }

            if floor as i32 == self.floor {
                if floor == self.virtual_req.floor as usize {
                    return self.serve_virtual();
                }
                continue;
            }

            self.direction = if (floor as i32) > self.floor {
                Direction::Up
            } else {
                Direction::Down
            };
            return SimState::GotoFloor;
        }
        SimState::Idle
    }

    fn has_dest(&self) -> bool {
        self.dests.iter().any(|&d| d)
    }

    fn has_work(&self) -> bool {
        for floor in 0..NUM_FLOORS {
            if !self.hall_reqs[floor][0] && !self.hall_reqs[floor][1] {
                continue;
            }
            if (self.direction == Direction::Up && (floor as i32) > self.floor)
                || (self.direction == Direction::Down && (floor as i32) < self.floor)
            {
                return true;
            }
        }
        false
    }

    fn clear_request(&mut self, direction: Direction) {
        let request = Request::new(self.floor as u8, direction);
        if !request.is_valid() {
            return;
        }
        let index = direction.hall_index().unwrap();
        self.hall_reqs[self.floor as usize][index] = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idle_car_at(floor: u8) -> CarState {
        CarState {
            floor,
            direction: Direction::Stop,
            dests: [false; NUM_FLOORS],
            hall_reqs: [[false; 2]; NUM_FLOORS],
            stopped: false,
        }
    }

    #[test]
    fn closer_car_bids_lower() {
        // Down call at floor 2: the car at floor 0 needs two moves and
        // a door opening, the car at floor 3 one move and a door
        // opening.
        let request = Request::new(2, Direction::Down);
        let far = cost(&idle_car_at(0), request);
        let near = cost(&idle_car_at(3), request);
        assert_eq!(far, 2.0 * MOVE_COST + DOOR_COST);
        assert_eq!(near, MOVE_COST + DOOR_COST);
        assert!(near < far);
    }

    #[test]
    fn serving_in_place_costs_one_door_opening() {
        let request = Request::new(2, Direction::Up);
        assert_eq!(cost(&idle_car_at(2), request), DOOR_COST);
    }

    #[test]
    fn detour_past_the_request_is_surcharged() {
        // Car at floor 0 with a cab destination at the top; the down
        // call at floor 1 is served only on the way back.
        let mut state = idle_car_at(0);
        state.direction = Direction::Up;
        state.dests[3] = true;
        let request = Request::new(1, Direction::Down);

        let expected = 3.0 * MOVE_COST            // up to the destination
            + DOOR_COST + COMEBACK_COST           // drop-off past the request
            + 2.0 * MOVE_COST                     // back down
            + DOOR_COST;                          // serve the request
        assert_eq!(cost(&state, request), expected);
    }

    #[test]
    fn stuck_car_always_bids_the_same_large_constant() {
        let mut state = idle_car_at(1);
        state.stopped = true;
        assert_eq!(cost(&state, Request::new(2, Direction::Up)), STUCK_COST);
    }

    #[test]
    fn simulation_is_deterministic() {
        let mut state = idle_car_at(1);
        state.dests[0] = true;
        state.hall_reqs[3][0] = true;
        let request = Request::new(2, Direction::Down);
        assert_eq!(cost(&state, request), cost(&state, request));
    }

    #[test]
    fn unreachable_request_terminates_within_the_step_bound() {
        // A request with no hall direction never enters the queue, so
        // the virtual car has nothing to chase.
        let result = cost(&idle_car_at(0), Request::new(2, Direction::Stop));
        assert_eq!(result, 0.0);
    }
}
