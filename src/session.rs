use std::{
    fs,
    path::{Path, PathBuf},
};

use jiff::Zoned;

use crate::{GpsLoggerError, gps::LatLon};

pub const DEFAULT_OUTPUT_PATH: &str = "/usr/local/gpsdata";

/// Where one run of the logger writes its data. Derived once from the start
/// time and never changed afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionPaths {
    /// `YYMMDD.HHMMSS` of the run start, names the directory, the CSV and every photo
    pub label: String,
    pub dir: PathBuf,
    pub csv_path: PathBuf,
    pub started_at: Zoned,
}

impl SessionPaths {
    pub fn new(root: &Path, started_at: Zoned) -> Self {
        let label = started_at.strftime("%y%m%d.%H%M%S").to_string();
        let dir = root.join(&label);
        let csv_path = dir.join(format!("gpsdata.{label}.csv"));

        Self {
            label,
            dir,
            csv_path,
            started_at,
        }
    }

    pub fn photo_name(&self, index: u32) -> String {
        format!("{}-{}.jpg", self.label, index)
    }

    pub fn photo_path(&self, index: u32) -> PathBuf {
        self.dir.join(self.photo_name(index))
    }

    pub fn create_dir(&self) -> Result<(), GpsLoggerError> {
        fs::create_dir_all(&self.dir).map_err(|e| GpsLoggerError::OutputDirectory {
            path: self.dir.clone(),
            source: e,
        })
    }
}

/// State carried from one logging event to the next.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    /// Position of the last row written, not the last fix seen
    pub last_position: LatLon,
    /// Index of the last photo taken, 0 before the first one
    pub photo_index: u32,
    pub paths: SessionPaths,
}

impl SessionState {
    pub fn new(paths: SessionPaths) -> Self {
        Self {
            last_position: LatLon::ORIGIN,
            photo_index: 0,
            paths,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::civil::date;
    use tempfile::TempDir;

    fn started_at() -> Zoned {
        date(2024, 3, 9).at(7, 5, 3, 0).in_tz("America/Chicago").unwrap()
    }

    #[test]
    fn test_session_names() {
        let paths = SessionPaths::new(Path::new("/usr/local/gpsdata"), started_at());

        assert_eq!(paths.label, "240309.070503");
        assert_eq!(paths.dir, PathBuf::from("/usr/local/gpsdata/240309.070503"));
        assert_eq!(
            paths.csv_path,
            PathBuf::from("/usr/local/gpsdata/240309.070503/gpsdata.240309.070503.csv")
        );
        assert_eq!(paths.photo_name(12), "240309.070503-12.jpg");
        assert_eq!(
            paths.photo_path(1),
            PathBuf::from("/usr/local/gpsdata/240309.070503/240309.070503-1.jpg")
        );
    }

    #[test]
    fn test_new_session_starts_at_origin() {
        let state = SessionState::new(SessionPaths::new(Path::new("/tmp"), started_at()));
        assert_eq!(state.last_position, LatLon::ORIGIN);
        assert_eq!(state.photo_index, 0);
    }

    #[test]
    fn test_create_dir() {
        let root = TempDir::new().unwrap();
        let paths = SessionPaths::new(&root.path().join("gpsdata"), started_at());
        paths.create_dir().unwrap();
        assert!(paths.dir.is_dir());
    }
}
