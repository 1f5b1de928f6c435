use std::{
    io::{self, BufRead, BufReader, Write},
    net::TcpStream,
    path::Path,
    time::Duration,
};

use log::{debug, info};

use crate::GpsLoggerError;

use super::GpsReport;

pub const DEFAULT_GPSD_ADDRESS: &str = "127.0.0.1:2947";
const WATCH_COMMAND: &str = "?WATCH={\"enable\":true,\"json\":true}\n";
pub const READ_TIMEOUT_MS: u64 = 500;

/// A source of gpsd-style reports.
///
/// The stream is lazy and never ends on its own. Reports queue up while nobody
/// is reading, so callers that only sample occasionally must `reset()` before
/// each sample to avoid acting on a stale position.
///
/// # Lifecycle
///
/// 1. Call `reset()` to open (or reopen) the stream
/// 2. Call `next_report()` until the reports needed have been seen. `Ok(None)`
///    means nothing arrived within the read timeout, so the caller gets a chance
///    to check for shutdown before asking again.
pub trait GpsReportProducer {
    /// Open a fresh handle on the stream, discarding anything buffered on the old one.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream cannot be (re)opened.
    fn reset(&mut self) -> Result<(), GpsLoggerError>;

    /// Wait for the next report, giving up with `Ok(None)` once the read timeout
    /// expires.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream was never opened, was closed by the
    /// other end, or cannot be read.
    fn next_report(&mut self) -> Result<Option<GpsReport>, GpsLoggerError>;
}

/// Reads reports from a gpsd daemon over its JSON socket protocol.
pub struct GpsdReportProducer {
    address: String,
    read_timeout: Duration,
    reader: Option<BufReader<TcpStream>>,
    // a line cut short by the read timeout is completed on the next call
    pending: String,
}

impl Default for GpsdReportProducer {
    fn default() -> Self {
        GpsdReportProducer::new(DEFAULT_GPSD_ADDRESS)
    }
}

impl GpsdReportProducer {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            read_timeout: Duration::from_millis(READ_TIMEOUT_MS),
            reader: None,
            pending: String::new(),
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }
}

impl GpsReportProducer for GpsdReportProducer {
    fn reset(&mut self) -> Result<(), GpsLoggerError> {
        // drop the old connection first so gpsd stops queueing for it
        self.reader = None;
        self.pending.clear();

        let mut stream =
            TcpStream::connect(&self.address).map_err(|e| GpsLoggerError::GpsdConnection {
                address: self.address.clone(),
                source: e,
            })?;
        stream
            .set_read_timeout(Some(self.read_timeout))
            .and_then(|_| stream.write_all(WATCH_COMMAND.as_bytes()))
            .map_err(|e| GpsLoggerError::GpsdConnection {
                address: self.address.clone(),
                source: e,
            })?;
        debug!("gpsd: watching {}", self.address);

        self.reader = Some(BufReader::new(stream));
        Ok(())
    }

    fn next_report(&mut self) -> Result<Option<GpsReport>, GpsLoggerError> {
        let reader = self
            .reader
            .as_mut()
            .ok_or(GpsLoggerError::GpsStreamClosed)?;

        loop {
            match reader.read_line(&mut self.pending) {
                Ok(0) => {
                    self.reader = None;
                    return Err(GpsLoggerError::GpsStreamClosed);
                }
                Ok(_) => {}
                Err(e)
                    if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) =>
                {
                    return Ok(None);
                }
                Err(e) => return Err(GpsLoggerError::GpsStreamRead { source: e }),
            }

            let line = std::mem::take(&mut self.pending);
            match serde_json::from_str::<GpsReport>(line.trim()) {
                Ok(report) => return Ok(Some(report)),
                Err(e) => debug!("gpsd: skipping unparseable report ({}): {}", e, line.trim()),
            }
        }
    }
}

/// A replaying report producer for tests and offline runs.
///
/// Reports are grouped into cycles. Each `reset()` moves to the next cycle, the
/// same way reopening a live stream only ever shows reports produced after the
/// reopen.
#[derive(Default)]
pub struct MockReportProducer {
    cycles: Vec<Vec<GpsReport>>,
    cur_cycle: Option<usize>,
    cur_tick: usize,
    resets: usize,
}

impl MockReportProducer {
    /// One cycle per inner vector.
    pub fn from_cycles(cycles: Vec<Vec<GpsReport>>) -> Self {
        Self {
            cycles,
            ..Default::default()
        }
    }

    /// Every report in a single cycle.
    pub fn from_reports(reports: Vec<GpsReport>) -> Self {
        Self::from_cycles(vec![reports])
    }

    /// Load a recording made with `gpspipe -w`. Blank lines separate cycles;
    /// lines that are not gpsd JSON are skipped.
    pub fn from_file(file: &Path) -> Result<Self, GpsLoggerError> {
        let file = std::fs::File::open(file).map_err(|e| GpsLoggerError::GpsStreamRead { source: e })?;
        let reader = BufReader::new(file);

        let mut cycles = vec![Vec::new()];
        for line in reader.lines() {
            let line = line.map_err(|e| GpsLoggerError::GpsStreamRead { source: e })?;
            let line = line.trim();
            if line.is_empty() {
                if cycles.last().is_some_and(|c| !c.is_empty()) {
                    cycles.push(Vec::new());
                }
                continue;
            }
            match serde_json::from_str::<GpsReport>(line) {
                Ok(report) => {
                    if let Some(cycle) = cycles.last_mut() {
                        cycle.push(report);
                    }
                }
                Err(e) => debug!("Skipping unparseable recorded report: {}", e),
            }
        }
        cycles.retain(|c| !c.is_empty());

        info!("Loaded {} recorded report cycles", cycles.len());
        Ok(Self::from_cycles(cycles))
    }

    /// Number of times the stream has been reopened.
    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl GpsReportProducer for MockReportProducer {
    fn reset(&mut self) -> Result<(), GpsLoggerError> {
        self.resets += 1;
        self.cur_cycle = Some(self.cur_cycle.map_or(0, |c| c + 1));
        self.cur_tick = 0;
        Ok(())
    }

    fn next_report(&mut self) -> Result<Option<GpsReport>, GpsLoggerError> {
        let report = self
            .cur_cycle
            .and_then(|c| self.cycles.get(c))
            .and_then(|cycle| cycle.get(self.cur_tick))
            .cloned()
            .ok_or(GpsLoggerError::GpsStreamClosed)?;
        self.cur_tick += 1;

        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gps::{SkyReport, TpvReport};
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;
    use tempfile::NamedTempFile;

    #[test]
    fn test_mock_producer_requires_reset() {
        let mut producer = MockReportProducer::from_reports(vec![GpsReport::Other]);
        assert!(matches!(
            producer.next_report(),
            Err(GpsLoggerError::GpsStreamClosed)
        ));

        producer.reset().unwrap();
        assert_eq!(producer.next_report().unwrap().unwrap(), GpsReport::Other);
        assert!(producer.next_report().is_err());
    }

    #[test]
    fn test_mock_producer_reset_discards_remaining_reports() {
        let mut producer = MockReportProducer::from_cycles(vec![
            vec![
                GpsReport::SkyView(SkyReport::default()),
                GpsReport::Other,
            ],
            vec![GpsReport::Position(TpvReport::default())],
        ]);

        producer.reset().unwrap();
        assert!(matches!(producer.next_report().unwrap().unwrap(), GpsReport::SkyView(_)));

        producer.reset().unwrap();
        assert!(matches!(producer.next_report().unwrap().unwrap(), GpsReport::Position(_)));
        assert_eq!(producer.resets(), 2);
    }

    #[test]
    fn test_mock_producer_from_file() {
        let mut recording = NamedTempFile::new().unwrap();
        writeln!(recording, r#"{{"class":"VERSION","release":"3.25"}}"#).unwrap();
        writeln!(recording, r#"{{"class":"SKY","nSat":4}}"#).unwrap();
        writeln!(recording, "not json").unwrap();
        writeln!(recording).unwrap();
        writeln!(
            recording,
            r#"{{"class":"TPV","mode":3,"time":"2024-01-15T17:30:00Z","lat":40.0,"lon":-74.0}}"#
        )
        .unwrap();
        recording.flush().unwrap();

        let mut producer = MockReportProducer::from_file(recording.path()).unwrap();
        producer.reset().unwrap();
        assert_eq!(producer.next_report().unwrap().unwrap(), GpsReport::Other);
        assert!(matches!(producer.next_report().unwrap().unwrap(), GpsReport::SkyView(_)));
        assert!(producer.next_report().is_err());

        producer.reset().unwrap();
        assert!(matches!(producer.next_report().unwrap().unwrap(), GpsReport::Position(_)));
    }

    #[test]
    fn test_gpsd_producer_reads_reports() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let server = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut watch = String::new();
            BufReader::new(socket.try_clone().unwrap())
                .read_line(&mut watch)
                .unwrap();
            socket
                .write_all(b"{\"class\":\"VERSION\"}\ngarbage\n{\"class\":\"SKY\",\"nSat\":6}\n")
                .unwrap();
            watch
        });

        let mut producer =
            GpsdReportProducer::new(address).with_read_timeout(Duration::from_secs(5));
        assert!(producer.next_report().is_err());

        producer.reset().unwrap();
        assert_eq!(producer.next_report().unwrap().unwrap(), GpsReport::Other);
        let GpsReport::SkyView(sky) = producer.next_report().unwrap().unwrap() else {
            panic!("Expected a SKY report");
        };
        assert_eq!(sky.satellite_count(), Some(6));

        let watch = server.join().unwrap();
        assert!(watch.starts_with("?WATCH="));

        // server hung up
        assert!(matches!(
            producer.next_report(),
            Err(GpsLoggerError::GpsStreamClosed)
        ));
    }

    #[test]
    fn test_gpsd_producer_times_out_on_silent_stream() {
        // the kernel completes the handshake, nobody ever answers
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let mut producer =
            GpsdReportProducer::new(address).with_read_timeout(Duration::from_millis(50));
        producer.reset().unwrap();
        assert_eq!(producer.next_report().unwrap(), None);
        assert_eq!(producer.next_report().unwrap(), None);
        drop(listener);
    }

    #[test]
    fn test_gpsd_producer_completes_line_split_by_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let mut producer =
            GpsdReportProducer::new(address).with_read_timeout(Duration::from_millis(100));
        producer.reset().unwrap();
        let (mut socket, _) = listener.accept().unwrap();

        socket.write_all(b"{\"class\":\"SKY\",").unwrap();
        socket.flush().unwrap();
        assert_eq!(producer.next_report().unwrap(), None);

        socket.write_all(b"\"nSat\":9}\n").unwrap();
        socket.flush().unwrap();
        let GpsReport::SkyView(sky) = producer.next_report().unwrap().unwrap() else {
            panic!("Expected a SKY report");
        };
        assert_eq!(sky.satellite_count(), Some(9));
    }
}
