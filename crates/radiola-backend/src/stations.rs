//! The station directory: built-in stations plus the ones from the config.

use radiola_bridge::{Station, StationError};

/// Stations shipped with the application, in listing order.
const BUILTIN_STATIONS: &[(&str, &str, &str)] = &[
    (
        "reso",
        "Resonance FM - London-based art radio station",
        "https://stream.resonance.fm/resonance",
    ),
    (
        "rese",
        "Resonance Extra - Alternative Resonance FM stream",
        "https://stream.resonance.fm/resonance-extra",
    ),
    (
        "ntso",
        "NTS Radio 1 - Global online radio station",
        "https://streams.radiomast.io/nts1/hls.m3u8",
    ),
    (
        "ntst",
        "NTS Radio 2 - Global online radio station",
        "https://streams.radiomast.io/nts2/hls.m3u8",
    ),
    (
        "lyll",
        "LYL Radio - Community radio from London",
        "https://radio.lyl.live/hls/aac_hifi.m3u8",
    ),
    (
        "cash",
        "Cashmere Radio - Berlin-based online radio",
        "https://cashmereradio.out.airtime.pro/cashmereradio_b",
    ),
    (
        "lake",
        "The Lake Radio - Online radio station",
        "http://hyades.shoutca.st:8627/stream",
    ),
    (
        "alha",
        "Radio Alhara - Palestinian online radio",
        "https://stream.radiojar.com/78cxy6wkxtzuv",
    ),
];

/// Immutable lookup table of stations, built once at startup and passed to
/// whoever needs it.
#[derive(Debug, Clone)]
pub struct StationDirectory {
    stations: Vec<Station>,
}

impl StationDirectory {
    /// The built-in stations only.
    pub fn builtin() -> Self {
        Self {
            stations: BUILTIN_STATIONS
                .iter()
                .map(|(name, description, url)| Station::new(*name, *description, *url))
                .collect(),
        }
    }

    /// The built-in stations with `extra` merged in. An extra station whose
    /// code is already taken replaces the existing entry in place; new codes
    /// are appended.
    pub fn with_extra(extra: &[Station]) -> Result<Self, StationError> {
        let mut directory = Self::builtin();
        for station in extra {
            station.validate()?;
            match directory
                .stations
                .iter_mut()
                .find(|existing| existing.name == station.name)
            {
                Some(existing) => *existing = station.clone(),
                None => directory.stations.push(station.clone()),
            }
        }
        Ok(directory)
    }

    /// Looks a station up by its exact code.
    pub fn by_code(&self, code: &str) -> Result<&Station, StationError> {
        if code.trim().is_empty() {
            return Err(StationError::Invalid(
                "station name cannot be empty".to_string(),
            ));
        }
        self.stations
            .iter()
            .find(|station| station.name == code)
            .ok_or_else(|| StationError::NotFound(code.to_string()))
    }

    /// All stations in listing order.
    pub fn all(&self) -> &[Station] {
        &self.stations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_lookup() {
        let directory = StationDirectory::builtin();
        assert_eq!(directory.all().len(), 8);
        assert_eq!(directory.all()[0].name, "reso");

        let station = directory.by_code("ntso").unwrap();
        assert_eq!(station.url, "https://streams.radiomast.io/nts1/hls.m3u8");
        assert!(directory.all().iter().all(|station| station.validate().is_ok()));
    }

    #[test]
    fn lookup_errors() {
        let directory = StationDirectory::builtin();
        assert_eq!(
            directory.by_code("nope"),
            Err(StationError::NotFound("nope".to_string()))
        );
        assert!(matches!(directory.by_code(""), Err(StationError::Invalid(_))));
        // codes are matched exactly
        assert!(directory.by_code("RESO").is_err());
    }

    #[test]
    fn extra_stations_override_and_append() {
        let directory = StationDirectory::with_extra(&[
            Station::new("reso", "Resonance mirror", "http://mirror.local/reso"),
            Station::new("home", "Home stream", "http://localhost:8000/live"),
        ])
        .unwrap();

        assert_eq!(directory.all().len(), 9);
        assert_eq!(directory.all()[0].url, "http://mirror.local/reso");
        assert_eq!(directory.all()[8].name, "home");
    }

    #[test]
    fn invalid_extra_station_is_rejected() {
        let result = StationDirectory::with_extra(&[Station::new("broken", "", "")]);
        assert!(matches!(result, Err(StationError::Invalid(_))));
    }
}
