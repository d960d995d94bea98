use std::collections::HashMap;
use std::io;
use std::os::unix::net::UnixDatagram;
use std::thread::spawn;
use std::time::{Duration, SystemTime};

use crossbeam_channel::{bounded, tick, Receiver};
use log::warn;

use overlay::Addr;
use shared_resources::config::WatchdogSection;
use shared_resources::NUM_FLOORS;

use crate::fsm::{Car, CarState};
use crate::messages::BackupData;

/// The watchdog wants a sign of life well inside its 250 ms window.
pub const WATCHDOG_RESEND_INTERVAL: Duration = Duration::from_millis(150);

const WATCH_INTERVAL: Duration = Duration::from_millis(50);

/// Latest known backup for every car this node has heard of, keyed by
/// node address. Owned by the coordinator alone.
pub struct BackupHandler {
    backups: HashMap<Addr, BackupData>,
    addr: Addr,
}

impl BackupHandler {
    pub fn new(addr: Addr) -> BackupHandler {
        BackupHandler {
            backups: HashMap::new(),
            addr,
        }
    }

    /// Snapshot the car into a fresh backup for this node and store it.
    pub fn create(&mut self, state: &CarState) -> BackupData {
        let backup = BackupData {
            elevator: self.addr,
            created: SystemTime::now(),
            floor: state.floor,
            direction: state.direction,
            hall_reqs: state.hall_reqs,
            dests: state.dests,
        };
        self.backups.insert(self.addr, backup);
        backup
    }

    /// Latest backup of this node.
    pub fn get(&self) -> BackupData {
        self.backups.get(&self.addr).copied().unwrap_or_default()
    }

    pub fn lookup(&self, addr: Addr) -> Option<BackupData> {
        self.backups.get(&addr).copied()
    }

    /// Store a backup received from a peer. Returns false when a newer
    /// backup from the same node is already present; applying the same
    /// backup twice is a no-op.
    pub fn update(&mut self, backup: BackupData) -> bool {
        if let Some(old) = self.backups.get(&backup.elevator) {
            if old.created > backup.created {
                return false;
            }
        }
        self.backups.insert(backup.elevator, backup);
        true
    }
}

/// Watch the car for request state that has drifted from the last
/// published backup. Fires once immediately so the initial backup gets
/// published too.
pub fn watch(car: Car) -> Receiver<()> {
    let (invalid_tx, invalid_rx) = bounded(1);

    spawn(move || {
        let mut published: Option<([bool; NUM_FLOORS], [[bool; 2]; NUM_FLOORS])> = None;
        let ticker = tick(WATCH_INTERVAL);
        loop {
            let state = car.snapshot();
            let current = (state.dests, state.hall_reqs);
            if published != Some(current) {
                if invalid_tx.send(()).is_err() {
                    return;
                }
                published = Some(current);
            }
            if ticker.recv().is_err() {
                return;
            }
        }
    });

    invalid_rx
}

/// Datagram link to the watchdog process on this machine.
pub struct WatchdogLink {
    conn: Option<UnixDatagram>,
    watchdog_path: String,
}

impl WatchdogLink {
    /// Announce ourselves to the watchdog and fetch the backup it has
    /// persisted for us. With `nowatchdog` the link is inert and the
    /// returned backup is empty.
    pub fn start(
        config: &WatchdogSection,
        nowatchdog: bool,
    ) -> io::Result<(WatchdogLink, BackupData)> {
        if nowatchdog {
            let link = WatchdogLink {
                conn: None,
                watchdog_path: String::new(),
            };
            return Ok((link, BackupData::default()));
        }

        let _ = std::fs::remove_file(&config.elev_socket);
        let conn = UnixDatagram::bind(&config.elev_socket)?;
        conn.send_to(b"ready", &config.socket)?;

        let mut buf = [0; 256];
        let n = conn.recv(&mut buf)?;
        let backup = match BackupData::decode(&buf[..n]) {
            Ok(backup) => backup,
            Err(e) => {
                warn!("discarding unusable persisted backup: {}", e);
                BackupData::default()
            }
        };

        let link = WatchdogLink {
            conn: Some(conn),
            watchdog_path: config.socket.clone(),
        };
        Ok((link, backup))
    }

    /// Best effort: if the watchdog is gone it will restart us soon
    /// enough anyway.
    pub fn write_backup(&self, backup: &BackupData) {
        if let Some(conn) = &self.conn {
            if let Err(e) = conn.send_to(&backup.encode(), &self.watchdog_path) {
                warn!("backup send to watchdog failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_resources::call::Direction;
    use std::net::Ipv4Addr;
    use std::time::UNIX_EPOCH;

    fn addr(last: u8) -> Addr {
        Addr::from(Ipv4Addr::new(10, 0, 0, last))
    }

    fn backup_from(addr: Addr, secs: u64) -> BackupData {
        BackupData {
            elevator: addr,
            created: UNIX_EPOCH + Duration::from_secs(secs),
            ..BackupData::default()
        }
    }

    #[test]
    fn create_stores_and_get_returns_own_backup() {
        let mut handler = BackupHandler::new(addr(1));
        assert_eq!(handler.get(), BackupData::default());

        let state = CarState {
            floor: 2,
            direction: Direction::Up,
            dests: [false, true, false, false],
            hall_reqs: [[false; 2]; NUM_FLOORS],
            stopped: false,
        };
        let created = handler.create(&state);
        assert_eq!(handler.get(), created);
        assert_eq!(created.elevator, addr(1));
        assert_eq!(created.floor, 2);
    }

    #[test]
    fn newer_backups_supersede_older_ones() {
        let mut handler = BackupHandler::new(addr(1));
        let old = backup_from(addr(2), 100);
        let new = backup_from(addr(2), 200);

        assert!(handler.update(new));
        assert!(!handler.update(old));
        assert_eq!(handler.lookup(addr(2)), Some(new));
    }

    #[test]
    fn applying_a_backup_twice_changes_nothing() {
        let mut handler = BackupHandler::new(addr(1));
        let mut backup = backup_from(addr(3), 100);
        backup.hall_reqs[1][0] = true;

        assert!(handler.update(backup));
        assert!(handler.update(backup));
        assert_eq!(handler.lookup(addr(3)), Some(backup));
    }

    #[test]
    fn backups_are_kept_per_node() {
        let mut handler = BackupHandler::new(addr(1));
        handler.update(backup_from(addr(2), 50));
        handler.update(backup_from(addr(3), 60));
        assert!(handler.lookup(addr(2)).is_some());
        assert!(handler.lookup(addr(3)).is_some());
        assert!(handler.lookup(addr(4)).is_none());
    }
}
