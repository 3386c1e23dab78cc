use std::fs::File;
use std::io::Read;
use std::path::Path;

use fxhash::FxHashMap;

use super::error::CalibrationError;
use super::hardware_id::generate_uuid;

const ENTRIES_PER_LINE: usize = 5; // sfp, board, channel, gain, offset

#[derive(Debug, Clone, Copy)]
struct Coefficients {
    gain: f64,
    offset: f64,
}

/// EnergyCalibration maps each channel's raw ADC value to a physical energy.
///
/// Calibrations change between experiments, so the coefficients are read from
/// a CSV file where each row holds the hardware identifiers (sfp, board,
/// channel) followed by the linear gain and offset for that channel. Channels
/// missing from the file, or all channels when no file is given, fall back to
/// the identity calibration so uncalibrated data still flows through.
#[derive(Debug, Clone, Default)]
pub struct EnergyCalibration {
    map: FxHashMap<u64, Coefficients>,
}

impl EnergyCalibration {
    /// Create a new EnergyCalibration.
    /// If the path is None, the identity calibration is used for every channel
    pub fn new(path: Option<&Path>) -> Result<Self, CalibrationError> {
        let Some(path) = path else {
            return Ok(EnergyCalibration::default());
        };
        let mut contents = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut contents)?;
        EnergyCalibration::parse(&contents)
    }

    fn parse(contents: &str) -> Result<Self, CalibrationError> {
        let mut calibration = EnergyCalibration::default();
        let mut lines = contents.lines();
        lines.next(); // Skip the header
        for line in lines {
            let entries: Vec<&str> = line.split_terminator(",").collect();
            if entries.len() != ENTRIES_PER_LINE {
                return Err(CalibrationError::BadFileFormat);
            }

            let sfp: u8 = entries[0].parse()?;
            let board: u8 = entries[1].parse()?;
            let channel: u8 = entries[2].parse()?;
            let coefficients = Coefficients {
                gain: entries[3].parse()?,
                offset: entries[4].parse()?,
            };
            calibration
                .map
                .insert(generate_uuid(sfp, board, channel), coefficients);
        }

        Ok(calibration)
    }

    /// Calibrated energy for a channel uuid, identity when unmapped.
    pub fn energy(&self, uuid: u64, adc_value: u16) -> f64 {
        match self.map.get(&uuid) {
            Some(coefficients) => coefficients.gain * (adc_value as f64) + coefficients.offset,
            None => adc_value as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_apply() {
        let contents = "sfp,board,channel,gain,offset\n0,1,2,0.5,100.0\n1,3,0,2.0,-4.0\n";
        let calibration = EnergyCalibration::parse(contents).unwrap();
        assert_eq!(calibration.energy(generate_uuid(0, 1, 2), 1000), 600.0);
        assert_eq!(calibration.energy(generate_uuid(1, 3, 0), 10), 16.0);
        // A channel absent from the file keeps its raw value
        assert_eq!(calibration.energy(generate_uuid(2, 0, 0), 533), 533.0);
    }

    #[test]
    fn test_identity_without_file() {
        let calibration = EnergyCalibration::new(None).unwrap();
        assert_eq!(calibration.energy(generate_uuid(0, 0, 0), 1234), 1234.0);
    }

    #[test]
    fn test_wrong_column_count_rejected() {
        let contents = "sfp,board,channel,gain,offset\n0,1,2,0.5\n";
        assert!(matches!(
            EnergyCalibration::parse(contents),
            Err(CalibrationError::BadFileFormat)
        ));
    }

    #[test]
    fn test_bad_coefficient_rejected() {
        let contents = "sfp,board,channel,gain,offset\n0,1,2,gain,0.0\n";
        assert!(matches!(
            EnergyCalibration::parse(contents),
            Err(CalibrationError::BadCoefficient(_))
        ));
    }
}
