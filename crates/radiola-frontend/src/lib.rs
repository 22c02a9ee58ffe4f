//! Terminal frontend: renders the station listing and the status updates the
//! backend publishes while a station plays.

use std::io::{self, Write};

use radiola_bridge::{Station, StatusUpdate};
use tokio::sync::mpsc;

pub mod formatting;

/// Prints the station table to stdout.
pub fn list_stations(stations: &[Station]) -> anyhow::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(formatting::format_station_table(stations).as_bytes())?;
    stdout.flush()?;
    Ok(())
}

/// Renders status updates until the backend reports it has stopped or drops
/// its sender. Blocks the calling thread.
pub fn run(mut rx: mpsc::Receiver<StatusUpdate>) -> anyhow::Result<()> {
    let stdout = io::stdout();
    render(&mut rx, &mut stdout.lock())
}

fn render(rx: &mut mpsc::Receiver<StatusUpdate>, out: &mut impl Write) -> anyhow::Result<()> {
    while let Some(update) = rx.blocking_recv() {
        out.write_all(formatting::format_status(&update).as_bytes())?;
        out.flush()?;
        if update == StatusUpdate::Stopped {
            break;
        }
    }
    Ok(())
}
