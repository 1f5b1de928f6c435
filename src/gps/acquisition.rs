use std::{thread, time::Duration};

use log::{debug, trace};

use crate::{GpsLoggerError, event_loop::ShutdownSignal};

use super::{GpsFix, GpsReport, GpsReportProducer, SkyView};

pub const UNFIXED_BACKOFF_MS: u64 = 500;

#[derive(Clone, Copy, Debug)]
pub struct AcquisitionSettings {
    /// Pause after a position report that has no satellite fix.
    pub unfixed_backoff: Duration,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            unfixed_backoff: Duration::from_millis(UNFIXED_BACKOFF_MS),
        }
    }
}

/// Block until the stream has produced both a satellite count and a usable
/// position, starting from a freshly reset stream.
///
/// There is no overall timeout: with no sky in view this waits forever. Only a
/// shutdown request or a stream error ends it early. The shutdown flag is
/// checked between reports and whenever the producer's read times out.
pub fn acquire_fix(
    producer: &mut impl GpsReportProducer,
    settings: &AcquisitionSettings,
    shutdown: &ShutdownSignal,
) -> Result<(GpsFix, SkyView), GpsLoggerError> {
    producer.reset()?;

    let mut sky: Option<SkyView> = None;
    let mut fix: Option<GpsFix> = None;
    let mut reports = 0usize;

    loop {
        if let (Some(fix), Some(sky)) = (&fix, sky) {
            debug!(
                "Acquired {:?} fix at {:?} with {} satellites after {} reports",
                fix.mode, fix.position, sky.satellites, reports
            );
            return Ok((fix.clone(), sky));
        }
        if shutdown.is_requested() {
            return Err(GpsLoggerError::ShutdownRequested);
        }

        let Some(report) = producer.next_report()? else {
            // read timed out, go around so a shutdown request is noticed
            continue;
        };
        reports += 1;

        match report {
            GpsReport::SkyView(report) if sky.is_none() => {
                if let Some(satellites) = report.satellite_count() {
                    sky = Some(SkyView { satellites });
                }
            }
            GpsReport::Position(report) if fix.is_none() => match report.to_fix()? {
                Some(accepted) => fix = Some(accepted),
                None if !report.fix_mode().has_fix() => {
                    trace!("No satellite fix yet ({:?})", report.fix_mode());
                    thread::sleep(settings.unfixed_backoff);
                }
                None => {}
            },
            _ => {}
        }
    }
}
