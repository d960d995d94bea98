use std::process;
use std::time::Duration;

use crossbeam_channel::{bounded, never, select, tick, Sender};
use log::{debug, error, info, warn};
use signal_hook::consts::SIGINT;
use signal_hook::iterator::Signals;

use elevio::elev;
use overlay::Node;
use shared_resources::call::Call;
use shared_resources::config::ControllerConfig;
use shared_resources::request::Request;
use shared_resources::NUM_FLOORS;

mod backup;
mod debug;
mod fsm;
mod messages;
mod panel;
mod simulator;

use backup::{BackupHandler, WatchdogLink, WATCHDOG_RESEND_INTERVAL};
use messages::{AssignData, BackupData, CostData, SyncData};
use panel::Panel;

const MAX_UNASSIGNED: usize = 32;
const LOOP_TICK: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServiceMode {
    /// In the ring and healthy: hall calls go through the auction.
    Online,
    /// No ring: serve this panel alone.
    Local,
    /// In the ring but mechanically stuck: forward traffic, win nothing.
    Stopped,
}

impl ServiceMode {
    fn name(self) -> &'static str {
        match self {
            ServiceMode::Online => "online",
            ServiceMode::Local => "local",
            ServiceMode::Stopped => "stopped",
        }
    }
}

fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = ControllerConfig::get();
    if config.network.protocol != "udp" {
        error!("unsupported network protocol {:?}", config.network.protocol);
        process::exit(1);
    }

    // Handshake first: without a watchdog (and without the flag saying
    // we may run bare) there is no point touching the hardware.
    let (watchdog, seed) = WatchdogLink::start(&config.watchdog, config.nowatchdog)?;

    let elevator = elev::Elevator::init(&config.elevator.server_addr(), NUM_FLOORS as u8)?;
    info!("elevator started: {}", elevator);

    let (node, my_msgs_rx, other_msgs_rx, dead_nodes_rx) =
        Node::init(&config.network.interface, config.network.port)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    let (panel, requests_rx, commands_rx) = panel::init(elevator.clone());
    let car = fsm::init(elevator.clone(), panel.clone(), commands_rx);

    // Work we were holding when we last went down.
    car.load_backup(&seed);
    panel.load_backup(&seed);

    let backup_invalid_rx = backup::watch(car.clone());
    let status_tx = debug::init();
    let sigint_rx = sigint_channel()?;
    let watchdog_ticker = tick(WATCHDOG_RESEND_INTERVAL);

    let mut backups = BackupHandler::new(node.addr());
    backups.create(&car.snapshot());

    // Hall calls waiting for an auction. Only one auction runs at a
    // time: while one is in flight the queue arm is suspended.
    let (unassigned_tx, unassigned_rx) = bounded::<Request>(MAX_UNASSIGNED);
    let suspended = never::<Request>();
    let mut in_flight: Option<Request> = None;

    let mut mode = ServiceMode::Local;
    let mut last_status: Option<debug::Status> = None;

    loop {
        let connected = node.is_connected();
        let new_mode = match (connected, car.is_running()) {
            (true, true) => ServiceMode::Online,
            (true, false) => ServiceMode::Stopped,
            (false, _) => ServiceMode::Local,
        };

        if new_mode != mode {
            match new_mode {
                ServiceMode::Online => {
                    if mode == ServiceMode::Local {
                        join_fleet(&node, &backups);
                    }
                }
                ServiceMode::Stopped => match mode {
                    // Re-auction our own hall calls; we cannot move.
                    ServiceMode::Online => {
                        enqueue_requests(&unassigned_tx, &backups.get());
                    }
                    ServiceMode::Local => {
                        join_fleet(&node, &backups);
                    }
                    ServiceMode::Stopped => {}
                },
                ServiceMode::Local => {
                    // On our own now: only this panel's requests matter,
                    // and a half-finished auction rolls back.
                    light_panel(&panel, &backups.get(), None);
                    if let Some(request) = in_flight.take() {
                        unassigned_tx.try_send(request).ok();
                    }
                }
            }
            info!("service mode: {}", new_mode.name());
            mode = new_mode;
        }

        let status = debug::Status {
            mode: mode.name(),
            connected,
            car: car.snapshot(),
        };
        if last_status.as_ref() != Some(&status) {
            status_tx.try_send(status.clone()).ok();
            last_status = Some(status);
        }

        let reqch = if in_flight.is_some() {
            suspended.clone()
        } else {
            unassigned_rx.clone()
        };

        select! {
            recv(watchdog_ticker) -> _ => {
                watchdog.write_backup(&backups.get());
            },

            recv(backup_invalid_rx) -> _ => {
                let published = backups.create(&car.snapshot());
                watchdog.write_backup(&published);
                if mode != ServiceMode::Local {
                    messages::send_data(&node, messages::BACKUP, &published.encode());
                    debug!("sent backup message: {:?}", published);
                }
            },

            recv(requests_rx) -> request => {
                if unassigned_tx.try_send(request.unwrap()).is_err() {
                    warn!("unassigned queue is full, dropping hall call");
                }
            },

            recv(reqch) -> request => {
                let request = request.unwrap();
                match mode {
                    ServiceMode::Online => {
                        let cd = CostData {
                            elevator: node.addr(),
                            req: request,
                            cost: simulator::cost(&car.snapshot(), request),
                        };
                        messages::send_data(&node, messages::COST, &cd.encode());
                        debug!("sent cost message: {:?}", cd);
                        in_flight = Some(request);
                    }
                    ServiceMode::Stopped => {
                        let cd = CostData {
                            elevator: node.addr(),
                            req: request,
                            cost: simulator::STUCK_COST,
                        };
                        messages::send_data(&node, messages::COST, &cd.encode());
                        in_flight = Some(request);
                    }
                    ServiceMode::Local => car.add_request(request),
                }
            },

            recv(other_msgs_rx) -> msg => {
                let mut msg = msg.unwrap();
                if mode == ServiceMode::Local {
                    // Not part of the ring's data path right now.
                } else {
                    match msg.mtype {
                        messages::COST => match CostData::decode(msg.data()) {
                            Ok(mut cd) => {
                                let cost = match mode {
                                    ServiceMode::Stopped => simulator::STUCK_COST,
                                    _ => simulator::cost(&car.snapshot(), cd.req),
                                };
                                if cost < cd.cost {
                                    cd.elevator = node.addr();
                                    cd.cost = cost;
                                    msg.set_data(&cd.encode());
                                }
                                debug!("forwarded cost message: {:?}", cd);
                                node.forward_message(msg);
                            }
                            Err(e) => warn!("dropping cost message: {}", e),
                        },
                        messages::ASSIGN => match AssignData::decode(msg.data()) {
                            Ok(mut ad) => {
                                if mode != ServiceMode::Stopped && ad.elevator == node.addr() {
                                    info!("won hall call at floor {}", ad.req.floor);
                                    car.add_request(ad.req);
                                    panel.set_lamp(ad.req.button(), ad.req.floor, true);
                                    ad.taken = true;
                                    msg.set_data(&ad.encode());
                                }
                                node.forward_message(msg);
                            }
                            Err(e) => warn!("dropping assign message: {}", e),
                        },
                        messages::BACKUP => match BackupData::decode(msg.data()) {
                            Ok(bd) => {
                                let old = backups.lookup(bd.elevator);
                                if backups.update(bd) {
                                    light_panel(&panel, &bd, old.as_ref());
                                }
                                node.forward_message(msg);
                            }
                            Err(e) => warn!("dropping backup message: {}", e),
                        },
                        messages::SYNC => match SyncData::decode(msg.data()) {
                            Ok(mut sd) => {
                                let own = backups.get();
                                for floor in 0..NUM_FLOORS {
                                    for index in 0..2 {
                                        sd.latest[floor][index] |= own.hall_reqs[floor][index];
                                    }
                                }
                                msg.set_data(&sd.encode());
                                node.forward_message(msg);
                            }
                            Err(e) => warn!("dropping sync message: {}", e),
                        },
                        _ => node.forward_message(msg),
                    }
                }
            },

            recv(my_msgs_rx) -> msg => {
                let msg = msg.unwrap();
                if mode == ServiceMode::Local {
                    // A lap that completed after we fell out of the ring.
                } else {
                    match msg.mtype {
                        messages::COST => match CostData::decode(msg.data()) {
                            Ok(cd) => {
                                debug!("cost message returned: {:?}", cd);
                                let ad = AssignData {
                                    elevator: cd.elevator,
                                    req: cd.req,
                                    taken: false,
                                };
                                messages::send_data(&node, messages::ASSIGN, &ad.encode());
                                debug!("sent assign message: {:?}", ad);
                            }
                            Err(e) => {
                                warn!("own cost message came back broken: {}", e);
                                if let Some(request) = in_flight.take() {
                                    car.add_request(request);
                                }
                            }
                        },
                        messages::ASSIGN => match AssignData::decode(msg.data()) {
                            Ok(ad) => {
                                debug!("assign message returned: {:?}", ad);
                                let request = in_flight.take();
                                if !ad.taken {
                                    // The winner vanished mid-transaction.
                                    if mode != ServiceMode::Stopped {
                                        car.add_request(ad.req);
                                        panel.set_lamp(ad.req.button(), ad.req.floor, true);
                                    } else if let Some(request) = request {
                                        unassigned_tx.try_send(request).ok();
                                    }
                                }
                            }
                            Err(e) => {
                                warn!("own assign message came back broken: {}", e);
                                if let Some(request) = in_flight.take() {
                                    car.add_request(request);
                                }
                            }
                        },
                        messages::SYNC => {
                            if let Ok(sd) = SyncData::decode(msg.data()) {
                                for floor in 0..NUM_FLOORS {
                                    for index in 0..2 {
                                        if sd.latest[floor][index] {
                                            let call = if index == 1 { Call::HallUp } else { Call::HallDown };
                                            panel.set_lamp(call, floor as u8, true);
                                        }
                                    }
                                }
                            }
                        }
                        _ => {}
                    }
                }
            },

            recv(dead_nodes_rx) -> dead => {
                let dead = dead.unwrap();
                info!("{} has been disconnected, looking for its backup", dead);
                if let Some(bd) = backups.lookup(dead) {
                    // Its hall calls go back up for auction. Cab calls
                    // stay with the dead car; they come back with it.
                    enqueue_requests(&unassigned_tx, &bd);
                }
            },

            recv(sigint_rx) -> _ => {
                elevator.motor_direction(elev::DIRN_STOP);
                process::exit(0);
            },

            default(LOOP_TICK) => {}
        }
    }
}

/// Rejoining the fleet: ask everyone for their hall calls, and tell
/// everyone about ours. The SYNC comes back as the OR of the other
/// panels; the backup carries our local state the other way.
fn join_fleet(node: &Node, backups: &BackupHandler) {
    messages::send_data(node, messages::SYNC, &SyncData::default().encode());
    messages::send_data(node, messages::BACKUP, &backups.get().encode());
}

fn enqueue_requests(unassigned_tx: &Sender<Request>, backup: &BackupData) {
    for request in backup.requests() {
        if unassigned_tx.try_send(request).is_err() {
            warn!("unassigned queue is full, dropping hall call");
        }
    }
}

/// Reconcile this panel's hall lamps with a backup, relative to the
/// previous backup from the same node.
fn light_panel(panel: &Panel, new: &BackupData, old: Option<&BackupData>) {
    let empty = BackupData::default();
    let old = old.unwrap_or(&empty);

    for floor in 0..NUM_FLOORS {
        for index in 0..2 {
            let call = if index == 1 { Call::HallUp } else { Call::HallDown };
            if !old.hall_reqs[floor][index] && new.hall_reqs[floor][index] {
                panel.set_lamp(call, floor as u8, true);
            } else if old.hall_reqs[floor][index] && !new.hall_reqs[floor][index] {
                panel.set_lamp(call, floor as u8, false);
            }
        }
    }
}

fn sigint_channel() -> std::io::Result<crossbeam_channel::Receiver<()>> {
    let (sigint_tx, sigint_rx) = bounded(1);
    let mut signals = Signals::new([SIGINT])?;
    std::thread::spawn(move || {
        for _ in signals.forever() {
            if sigint_tx.try_send(()).is_err() {
                return;
            }
        }
    });
    Ok(sigint_rx)
}
