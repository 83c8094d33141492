//! Renderers and the record carousel.
//!
//! The consumer loop never talks to an output device directly: it hands the
//! current snapshot to a `Carousel`, which decides what to show this tick
//! and calls into a `Renderer`. Renderers must tolerate being called ten
//! times a second with the same content.

use std::io::Write;
use std::time::{Duration, Instant};

use flight_core::format::{
    format_altitude, format_distance, format_heading, format_route, format_speed,
    format_vertical_rate,
};
use flight_core::{FlightRecord, Snapshot};

pub const STATUS_SCANNING: &str = "Scanning...";
pub const STATUS_EMPTY: &str = "No flights nearby";
pub const STATUS_SHUTTING_DOWN: &str = "Shutting down...";
pub const STATUS_GOODBYE: &str = "Goodbye!";

/// Characters per text row.
pub const LINE_WIDTH: usize = 32;

pub trait Renderer {
    fn show_status(&mut self, text: &str);

    /// `index` is zero-based; `total` is the snapshot length.
    fn show_record(&mut self, record: &FlightRecord, index: usize, total: usize);

    fn clear(&mut self);
}

/// Show the farewell status, leave it up for `hold`, then blank the display.
pub async fn sign_off<R: Renderer + ?Sized>(renderer: &mut R, hold: Duration) {
    renderer.show_status(STATUS_GOODBYE);
    if !hold.is_zero() {
        tokio::time::sleep(hold).await;
    }
    renderer.clear();
}

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// The four (left, right) rows shown for one record.
///
/// ```text
/// BAW117 B77W            G-STBA
/// FL350 480kt           -640fpm
/// EGLL > KJFK             W270
/// 12km                [2/5] UN
/// ```
pub fn record_rows(record: &FlightRecord, index: usize, total: usize) -> [(String, String); 4] {
    let title = match &record.aircraft_type {
        Some(t) => format!("{} {}", record.label(), t),
        None => record.label().to_string(),
    };
    let registration = record.registration.clone().unwrap_or_default();

    let performance = format!(
        "{} {}",
        format_altitude(record.baro_altitude_m),
        format_speed(record.velocity_mps)
    );

    let route = format_route(
        record.origin_airport.as_deref(),
        record.destination_airport.as_deref(),
    );

    let position = format!("[{}/{}]", index + 1, total);
    let country: String = record
        .origin_country
        .as_deref()
        .map(|c| c.chars().take(2).collect::<String>().to_uppercase())
        .unwrap_or_default();
    let footer = if country.is_empty() {
        position
    } else {
        format!("{position} {country}")
    };

    [
        (title, registration),
        (performance, format_vertical_rate(record.vertical_rate_mps)),
        (route, format_heading(record.true_track_deg)),
        (format_distance(record.distance_km), footer),
    ]
}

/// Left text flush left, right text flush right, both clipped to `width`.
/// The left side gives way when they collide.
pub fn compose_line(left: &str, right: &str, width: usize) -> String {
    let right: String = right.chars().take(width).collect();
    let right_len = right.chars().count();
    let room = if right_len == 0 {
        width
    } else {
        width.saturating_sub(right_len + 1)
    };
    let left: String = left.chars().take(room).collect();
    let pad = width - left.chars().count() - right_len;
    format!("{left}{}{right}", " ".repeat(pad))
        .trim_end()
        .to_string()
}

// ---------------------------------------------------------------------------
// Terminal renderer
// ---------------------------------------------------------------------------

/// Writes frames of text rows to any `Write`. A frame is only emitted when
/// it differs from the previous one.
pub struct TerminalRenderer<W: Write> {
    out: W,
    width: usize,
    ansi: bool,
    last_frame: Option<Vec<String>>,
    write_failed: bool,
}

impl<W: Write> TerminalRenderer<W> {
    /// `ansi` clears the screen before each frame; otherwise frames are
    /// separated by a blank line.
    pub fn new(out: W, ansi: bool) -> Self {
        TerminalRenderer {
            out,
            width: LINE_WIDTH,
            ansi,
            last_frame: None,
            write_failed: false,
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, frame: Vec<String>) {
        if self.last_frame.as_ref() == Some(&frame) {
            return;
        }
        if let Err(e) = self.write_frame(&frame) {
            if !self.write_failed {
                tracing::warn!(error = %e, "terminal write failed");
                self.write_failed = true;
            }
        }
        self.last_frame = Some(frame);
    }

    fn write_frame(&mut self, frame: &[String]) -> std::io::Result<()> {
        if self.ansi {
            write!(self.out, "\x1b[2J\x1b[H")?;
        } else if self.last_frame.is_some() {
            writeln!(self.out)?;
        }
        for line in frame {
            writeln!(self.out, "{line}")?;
        }
        self.out.flush()
    }
}

impl<W: Write> Renderer for TerminalRenderer<W> {
    fn show_status(&mut self, text: &str) {
        let line = compose_line(text, "", self.width);
        self.draw(vec![String::new(), line, String::new(), String::new()]);
    }

    fn show_record(&mut self, record: &FlightRecord, index: usize, total: usize) {
        let frame = record_rows(record, index, total)
            .iter()
            .map(|(left, right)| compose_line(left, right, self.width))
            .collect();
        self.draw(frame);
    }

    fn clear(&mut self) {
        if self.ansi {
            let _ = write!(self.out, "\x1b[2J\x1b[H").and_then(|_| self.out.flush());
        }
        self.last_frame = None;
    }
}

/// For runs without any output device.
#[derive(Debug, Default)]
pub struct HeadlessRenderer;

impl Renderer for HeadlessRenderer {
    fn show_status(&mut self, _text: &str) {}
    fn show_record(&mut self, _record: &FlightRecord, _index: usize, _total: usize) {}
    fn clear(&mut self) {}
}

// ---------------------------------------------------------------------------
// Carousel
// ---------------------------------------------------------------------------

/// Picks which record of the snapshot to show, advancing every `interval`.
#[derive(Debug)]
pub struct Carousel {
    index: usize,
    last_advance: Option<Instant>,
    interval: Duration,
}

impl Carousel {
    pub fn new(interval: Duration) -> Self {
        Carousel {
            index: 0,
            last_advance: None,
            interval,
        }
    }

    #[cfg(test)]
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn show<R: Renderer + ?Sized>(&mut self, renderer: &mut R, snapshot: &Snapshot) {
        self.show_at(renderer, snapshot, Instant::now());
    }

    pub fn show_at<R: Renderer + ?Sized>(
        &mut self,
        renderer: &mut R,
        snapshot: &Snapshot,
        now: Instant,
    ) {
        let records = snapshot.records();
        if records.is_empty() {
            // Nothing published yet vs. a cycle that found nothing.
            let status = if snapshot.cycle() == 0 {
                STATUS_SCANNING
            } else {
                STATUS_EMPTY
            };
            renderer.show_status(status);
            self.index = 0;
            self.last_advance = Some(now);
            return;
        }

        match self.last_advance {
            None => self.last_advance = Some(now),
            Some(last) if now.duration_since(last) >= self.interval => {
                self.index = (self.index + 1) % records.len();
                self.last_advance = Some(now);
            }
            Some(_) => {}
        }

        if self.index >= records.len() {
            self.index = 0;
        }

        renderer.show_record(&records[self.index], self.index, records.len());
    }
}

// ---------------------------------------------------------------------------
// Recording renderer
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
