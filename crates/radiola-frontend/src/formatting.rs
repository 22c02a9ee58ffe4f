use radiola_bridge::notification::NotificationType;
use radiola_bridge::{Station, StatusUpdate};

/// Line ending used while playing. The terminal is in raw mode, where a bare
/// `\n` does not return the cursor.
const EOL: &str = "\r\n";

/// Pads `text` with spaces up to `width` characters.
fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    let mut out = String::with_capacity(text.len() + width.saturating_sub(len));
    out.push_str(text);
    out.extend(std::iter::repeat_n(' ', width.saturating_sub(len)));
    out
}

fn border(widths: &[usize; 2]) -> String {
    let mut out = String::from("+");
    for width in widths {
        out.extend(std::iter::repeat_n('-', width + 2));
        out.push('+');
    }
    out.push('\n');
    out
}

fn row(cells: [&str; 2], widths: &[usize; 2]) -> String {
    format!(
        "| {} | {} |\n",
        pad(cells[0], widths[0]),
        pad(cells[1], widths[1])
    )
}

/// Renders the station listing as a bordered two-column table with a total
/// in the footer.
pub fn format_station_table(stations: &[Station]) -> String {
    let total = format!("{} station(s)", stations.len());
    let header = ["NAME", "DESCRIPTION"];
    let footer = ["TOTAL", total.as_str()];

    let mut widths = [header[0].len(), header[1].len()];
    for cells in stations
        .iter()
        .map(|station| [station.name.as_str(), station.description.as_str()])
        .chain([footer])
    {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = border(&widths);
    out.push_str(&row(header, &widths));
    out.push_str(&border(&widths));
    for station in stations {
        out.push_str(&row([&station.name, &station.description], &widths));
    }
    out.push_str(&border(&widths));
    out.push_str(&row(footer, &widths));
    out.push_str(&border(&widths));
    out
}

/// Text written to the terminal for a status update. Pause and resume
/// rewrite the current line in place.
pub fn format_status(update: &StatusUpdate) -> String {
    match update {
        StatusUpdate::Tuning(station) => {
            format!("🎵 Playing {}...{EOL}", station.display_name())
        }
        StatusUpdate::ControlsReady => {
            format!("Controls: [Space/P] Pause/Resume | [Ctrl+C] Exit{EOL}")
        }
        StatusUpdate::KeyboardUnavailable(reason) => {
            format!(
                "Warning: keyboard input unavailable: {reason}{EOL}{EOL}Press Ctrl+C to stop{EOL}"
            )
        }
        StatusUpdate::Paused => "\r⏸ Stream paused (press Space/P to resume)".to_string(),
        StatusUpdate::Resumed => "\r⏯ Resuming stream...                    ".to_string(),
        StatusUpdate::Stopping => format!("{EOL}{EOL}⏹ Stopping stream...{EOL}"),
        StatusUpdate::Stopped => format!("Stream stopped.{EOL}"),
        StatusUpdate::Notification(notification) => {
            let prefix = match notification.notification_type {
                NotificationType::Info => "",
                NotificationType::Warning => "Warning: ",
                // error messages already say what failed
                NotificationType::Error => "",
            };
            format!("{EOL}{prefix}{}{EOL}", notification.message)
        }
    }
}
