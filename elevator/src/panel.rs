use std::sync::Arc;
use std::thread::spawn;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

use elevio::elev;
use shared_resources::call::{Call, Direction};
use shared_resources::request::Request;
use shared_resources::NUM_FLOORS;

use crate::messages::BackupData;

const POLL_INTERVAL: Duration = Duration::from_millis(25);
const MAX_REQUESTS: usize = 2 * NUM_FLOORS;

/// The button panel: polls all buttons, debounces them against the
/// lamp state, and owns the button lamps.
#[derive(Clone)]
pub struct Panel {
    elevator: elev::Elevator,
    lamps: Arc<Mutex<[[bool; 3]; NUM_FLOORS]>>,
}

/// Spawns the poller. Hall presses come out as requests, cab presses
/// as floor numbers on the commands channel.
pub fn init(elevator: elev::Elevator) -> (Panel, Receiver<Request>, Receiver<u8>) {
    let panel = Panel {
        elevator,
        lamps: Arc::new(Mutex::new([[false; 3]; NUM_FLOORS])),
    };

    let (requests_tx, requests_rx) = bounded(MAX_REQUESTS);
    // Rendezvous channel: a cab press is dropped unless somebody is
    // ready to take it right now.
    let (commands_tx, commands_rx) = bounded(0);

    {
        let panel = panel.clone();
        spawn(move || panel.poll(requests_tx, commands_tx));
    }

    (panel, requests_rx, commands_rx)
}

impl Panel {
    pub fn set_lamp(&self, call: Call, floor: u8, on: bool) {
        let mut lamps = self.lamps.lock();
        lamps[floor as usize][call.as_elev_constant() as usize] = on;
        self.elevator
            .call_button_light(floor, call.as_elev_constant(), on);
    }

    fn is_lit(&self, call: Call, floor: u8) -> bool {
        self.lamps.lock()[floor as usize][call.as_elev_constant() as usize]
    }

    /// Relight lamps from a restored backup. May be called with an
    /// empty backup.
    pub fn load_backup(&self, backup: &BackupData) {
        for floor in 0..NUM_FLOORS {
            self.set_lamp(Call::Cab, floor as u8, backup.dests[floor]);
            self.set_lamp(Call::HallDown, floor as u8, backup.hall_reqs[floor][0]);
            self.set_lamp(Call::HallUp, floor as u8, backup.hall_reqs[floor][1]);
        }
    }

    fn poll(&self, requests_tx: Sender<Request>, commands_tx: Sender<u8>) {
        let mut prev = [[false; 3]; NUM_FLOORS];

        loop {
            for floor in 0..NUM_FLOORS as u8 {
                for call in Call::iter() {
                    let index = call.as_elev_constant() as usize;
                    let pressed = self.elevator.call_button(floor, call.as_elev_constant());
                    let edge = pressed && !prev[floor as usize][index];
                    prev[floor as usize][index] = pressed;

                    // A lit lamp means the press is already registered.
                    if !edge || self.is_lit(call, floor) {
                        continue;
                    }

                    match call {
                        Call::Cab => {
                            if commands_tx.try_send(floor).is_ok() {
                                self.set_lamp(call, floor, true);
                            }
                        }
                        Call::HallUp | Call::HallDown => {
                            let direction = match call {
                                Call::HallUp => Direction::Up,
                                _ => Direction::Down,
                            };
                            let request = Request::new(floor, direction);
                            if request.is_valid() {
                                requests_tx.send(request).unwrap();
                                self.set_lamp(call, floor, true);
                            }
                        }
                    }
                }
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}
