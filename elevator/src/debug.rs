use std::io::{stdout, Stdout, Write};
use std::thread::spawn;

use crossbeam_channel::{bounded, Receiver, Sender};
use crossterm::{cursor, terminal, ExecutableCommand};

use shared_resources::NUM_FLOORS;

use crate::fsm::CarState;

// Total number of lines printstatus writes; MoveUp depends on it.
const STATUS_SIZE: u16 = 17;

#[derive(Debug, Clone, PartialEq)]
pub struct Status {
    pub mode: &'static str,
    pub connected: bool,
    pub car: CarState,
}

pub fn init() -> Sender<Status> {
    let (status_tx, status_rx) = bounded(8);
    spawn(move || {
        let _ = main(status_rx);
    });
    status_tx
}

fn main(status_rx: Receiver<Status>) -> crossterm::Result<()> {
    let mut stdout = stdout();

    for _ in 0..STATUS_SIZE {
        writeln!(stdout)?;
    }

    loop {
        match status_rx.recv() {
            Ok(status) => printstatus(&mut stdout, &status)?,
            Err(_) => return Ok(()),
        }
    }
}

fn printstatus(stdout: &mut Stdout, status: &Status) -> crossterm::Result<()> {
    stdout.execute(cursor::MoveUp(STATUS_SIZE))?;
    stdout.execute(terminal::Clear(terminal::ClearType::FromCursorDown))?;

    writeln!(stdout, "+------------+------------+------------+------------+")?;
    writeln!(stdout, "| {0:<10} | {1:<10} | {2:<10} | {3:<10} |", "FLOOR", "HALL UP", "HALL DOWN", "CAB")?;
    for floor in (0..NUM_FLOORS).rev() {
        writeln!(stdout, "+------------+------------+------------+------------+")?;
        writeln!(
            stdout,
            "| {0:<10} | {1:<10} | {2:<10} | {3:<10} |",
            floor,
            status.car.hall_reqs[floor][1],
            status.car.hall_reqs[floor][0],
            status.car.dests[floor],
        )?;
    }
    writeln!(stdout, "+------------+------------+------------+------------+")?;
    writeln!(stdout)?;

    let direction = match status.car.direction {
        shared_resources::call::Direction::Up => "up",
        shared_resources::call::Direction::Down => "down",
        shared_resources::call::Direction::Stop => "none",
    };
    writeln!(stdout, "{0:<12} {1}", "MODE", status.mode)?;
    writeln!(stdout, "{0:<12} {1}", "CONNECTED", status.connected)?;
    writeln!(stdout, "{0:<12} {1}", "FLOOR", status.car.floor)?;
    writeln!(stdout, "{0:<12} {1}", "DIRECTION", direction)?;
    writeln!(stdout, "{0:<12} {1}", "STOPPED", status.car.stopped)?;

    Ok(())
}
