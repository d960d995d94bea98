//! Watchdog process: monitors the controller over a Unix datagram
//! socket, keeps the most recent backup in a single-slot file, and
//! restarts the controller when it goes silent. The controller gets
//! the persisted backup handed back on every restart.

use std::env;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::net::UnixDatagram;
use std::process::{Child, Command};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver};
use log::{info, warn};
use signal_hook::consts::{SIGINT, SIGQUIT};
use signal_hook::iterator::Signals;

use shared_resources::config::WatchdogConfig;
use shared_resources::NUM_FLOORS;

/// How long the controller may stay silent before it is presumed dead.
const ALIVE_TIME: Duration = Duration::from_millis(250);

const BACKUP_SIZE: usize = 34 + 3 * NUM_FLOORS;
const DEFAULT_CONTROLLER: &str = "./target/debug/elevator";

struct Watchdog {
    conn: UnixDatagram,
    controller_path: String,
    elev_socket: String,
    backup: [u8; BACKUP_SIZE],
    backupfile: File,
    child: Option<Child>,
}

fn main() -> io::Result<()> {
    env_logger::init();

    let config = WatchdogConfig::get();
    let controller_path = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONTROLLER.to_string());

    let _ = std::fs::remove_file(&config.watchdog.socket);
    let conn = UnixDatagram::bind(&config.watchdog.socket)?;

    let mut backupfile = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(&config.watchdog.backupfile)?;

    let mut backup = [0; BACKUP_SIZE];
    if backupfile.metadata()?.len() as usize >= BACKUP_SIZE {
        backupfile.read_exact(&mut backup)?;
    } else if backupfile.metadata()?.len() != 0 {
        warn!("backup file is truncated, starting from scratch");
    }

    let (sigint_rx, sigquit_rx) = signal_channels()?;

    let mut wd = Watchdog {
        conn,
        controller_path,
        elev_socket: config.watchdog.elev_socket.clone(),
        backup,
        backupfile,
        child: None,
    };
    wd.restart()?;

    let mut buf = [0; BACKUP_SIZE];
    loop {
        if sigint_rx.try_recv().is_ok() {
            // Forward the interrupt; the silence that follows makes the
            // main loop restart the controller.
            wd.interrupt_controller();
        }
        if sigquit_rx.try_recv().is_ok() {
            info!("shutting down");
            wd.interrupt_controller();
            wd.flush()?;
            return Ok(());
        }

        wd.conn.set_read_timeout(Some(ALIVE_TIME))?;
        match wd.conn.recv(&mut buf) {
            Ok(n) if n == BACKUP_SIZE => {
                // Persist only when the state portion changed; the
                // first 32 bytes are just the owner and the timestamp.
                if buf[32..] != wd.backup[32..] {
                    wd.backup = buf;
                    wd.flush()?;
                }
            }
            Ok(_) => {}
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                info!("controller has crashed");
                wd.interrupt_controller();
                wd.restart()?;
            }
            Err(e) => return Err(e),
        }
    }
}

impl Watchdog {
    /// Start a fresh controller, wait for its ready message, and hand
    /// it the persisted backup.
    fn restart(&mut self) -> io::Result<()> {
        let child = Command::new(&self.controller_path).spawn()?;
        info!("controller pid is {}", child.id());
        self.child = Some(child);

        self.conn.set_read_timeout(None)?;
        let mut buf = [0; 16];
        let n = self.conn.recv(&mut buf)?;
        if &buf[..n] != b"ready" {
            warn!("unexpected handshake from controller");
        }

        self.conn.send_to(&self.backup, &self.elev_socket)?;
        Ok(())
    }

    fn interrupt_controller(&mut self) {
        if let Some(mut child) = self.child.take() {
            let pid = child.id();
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGINT);
            }
            child.wait().ok();
            info!("sent SIGINT to controller process {}", pid);
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.backupfile.seek(SeekFrom::Start(0))?;
        self.backupfile.write_all(&self.backup)?;
        self.backupfile.sync_all()?;
        Ok(())
    }
}

fn signal_channels() -> io::Result<(Receiver<()>, Receiver<()>)> {
    let (sigint_tx, sigint_rx) = bounded(4);
    let (sigquit_tx, sigquit_rx) = bounded(4);

    let mut signals = Signals::new([SIGINT, SIGQUIT])?;
    std::thread::spawn(move || {
        for signal in signals.forever() {
            match signal {
                SIGINT => {
                    sigint_tx.try_send(()).ok();
                }
                SIGQUIT => {
                    sigquit_tx.try_send(()).ok();
                }
                _ => {}
            }
        }
    });

    Ok((sigint_rx, sigquit_rx))
}
