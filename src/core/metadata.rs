// Header + parameter directory, with typed lookup and consistency checks

use crate::core::directory::ParameterDirectory;
use crate::core::error::{C3dError, Result};
use crate::core::group::Group;
use crate::core::header::HeaderRecord;
use crate::core::parameter::{Element, Parameter};
use std::fmt;
use tracing::warn;

// Parameters whose absence is reported but tolerated.
const EXPECTED_PARAMETERS: [&str; 5] = [
    "POINT:LABELS",
    "POINT:DESCRIPTIONS",
    "ANALOG:USED",
    "ANALOG:LABELS",
    "ANALOG:DESCRIPTIONS",
];

/// Result of resolving a lookup key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Entry<'a> {
    Group(&'a Group),
    Parameter(&'a Parameter),
}

/// Non-fatal finding of [`MetadataStore::check_metadata`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingParameter {
    pub key: &'static str,
}

impl fmt::Display for MissingParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "missing parameter {}", self.key)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    pub header: HeaderRecord,
    pub directory: ParameterDirectory,
}

impl MetadataStore {
    pub fn new(header: HeaderRecord, directory: ParameterDirectory) -> Self {
        Self { header, directory }
    }

    /// Resolve `"GROUP.PARAM"`, `"GROUP:PARAM"`, a bare group name, or a numeric group id.
    pub fn lookup(&self, key: &str) -> Option<Entry<'_>> {
        let key = key.trim();
        if let Ok(id) = key.parse::<u8>() {
            return self.directory.group(id).map(Entry::Group);
        }
        match key.split_once(['.', ':']) {
            Some((group, param)) => self
                .directory
                .group_by_name(group)?
                .get(param)
                .map(Entry::Parameter),
            None => self.directory.group_by_name(key).map(Entry::Group),
        }
    }

    pub fn group(&self, id: u8) -> Option<&Group> {
        self.directory.group(id)
    }

    pub fn group_by_name(&self, name: &str) -> Option<&Group> {
        self.directory.group_by_name(name)
    }

    pub fn parameter(&self, key: &str) -> Option<&Parameter> {
        match self.lookup(key)? {
            Entry::Parameter(param) => Some(param),
            Entry::Group(_) => None,
        }
    }

    pub fn add_group(&mut self, id: u8, name: &str, description: &str) -> Result<&mut Group> {
        self.directory.add_group(id, name, description)
    }

    pub fn get<T: Element>(&self, key: &str) -> Result<T> {
        self.parameter(key)
            .ok_or_else(|| C3dError::NotFound(key.to_uppercase()))?
            .get::<T>()
    }

    /// `default` when the parameter is absent; a present but malformed parameter still fails.
    pub fn get_or<T: Element>(&self, key: &str, default: T) -> Result<T> {
        match self.parameter(key) {
            Some(param) => param.get::<T>(),
            None => Ok(default),
        }
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.parameter(key)
            .ok_or_else(|| C3dError::NotFound(key.to_uppercase()))?
            .as_string()
    }

    pub fn frame_rate(&self) -> Result<f32> {
        self.get("POINT:RATE")
    }

    pub fn scale_factor(&self) -> Result<f32> {
        self.get("POINT:SCALE")
    }

    pub fn point_count(&self) -> Result<u16> {
        self.get("POINT:USED")
    }

    pub fn analog_channels(&self) -> Result<u16> {
        self.get_or("ANALOG:USED", 0)
    }

    pub fn analog_rate(&self) -> Result<f32> {
        self.get_or("ANALOG:RATE", 0.0)
    }

    pub fn point_labels(&self) -> Result<Vec<String>> {
        self.labels("POINT:LABELS")
    }

    pub fn analog_labels(&self) -> Result<Vec<String>> {
        self.labels("ANALOG:LABELS")
    }

    fn labels(&self, key: &str) -> Result<Vec<String>> {
        let labels = self
            .parameter(key)
            .ok_or_else(|| C3dError::NotFound(key.to_string()))?
            .string_array()?;
        Ok(labels.into_iter().map(|l| l.trim_end().to_string()).collect())
    }

    /// Vendor files may keep the effective range in TRIAL instead of the header.
    pub fn first_frame(&self) -> Result<i32> {
        match self.parameter("TRIAL:ACTUAL_START_FIELD") {
            Some(param) => param.get::<i32>(),
            None => Ok(i32::from(self.header.first_frame)),
        }
    }

    pub fn last_frame(&self) -> Result<i32> {
        match self.parameter("TRIAL:ACTUAL_END_FIELD") {
            Some(param) => param.get::<i32>(),
            None => Ok(i32::from(self.header.last_frame)),
        }
    }

    pub fn parameter_blocks(&self) -> usize {
        self.directory.parameter_blocks()
    }

    /// Cross-check header fields against the directory.
    ///
    /// Mismatches fail; missing descriptive parameters are logged and returned.
    pub fn check_metadata(&self) -> Result<Vec<MissingParameter>> {
        let point_count = self.point_count()?;
        if self.header.point_count != point_count {
            return Err(inconsistent("point count", self.header.point_count, point_count));
        }

        let scale = self.scale_factor()?;
        if self.header.scale_factor != scale {
            return Err(inconsistent("scale factor", self.header.scale_factor, scale));
        }

        let rate = self.frame_rate()?;
        if self.header.frame_rate != rate {
            return Err(inconsistent("frame rate", self.header.frame_rate, rate));
        }

        let channels = self.analog_channels()?;
        let expected = if channels == 0 {
            0.0
        } else {
            f64::from(channels) * (f64::from(self.analog_rate()?) / f64::from(rate))
        };
        let actual = f64::from(self.header.analog_count);
        // a zero point rate gives a non-finite count that never matches
        if actual != expected {
            return Err(inconsistent("analog count", actual, expected));
        }

        let start: u16 = self.get("POINT:DATA_START")?;
        if self.header.data_block != start {
            return Err(inconsistent("data block", self.header.data_block, start));
        }

        let missing: Vec<MissingParameter> = EXPECTED_PARAMETERS
            .iter()
            .copied()
            .filter(|key| self.parameter(key).is_none())
            .map(|key| MissingParameter { key })
            .collect();
        for finding in &missing {
            warn!("{}", finding);
        }
        Ok(missing)
    }
}

fn inconsistent<H: Into<f64>, P: Into<f64>>(field: &'static str, header: H, parameter: P) -> C3dError {
    C3dError::InconsistentMetadata {
        field,
        header: header.into(),
        parameter: parameter.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MetadataStore {
        let header = HeaderRecord {
            point_count: 2,
            analog_count: 6,
            scale_factor: -1.0,
            frame_rate: 100.0,
            data_block: 3,
            ..HeaderRecord::default()
        };
        let mut meta = MetadataStore::new(header, ParameterDirectory::new());

        let point = meta.add_group(1, "POINT", "").unwrap();
        point.add_param(Parameter::from_scalar("USED", "", 2u16));
        point.add_param(Parameter::from_scalar("SCALE", "", -1.0f32));
        point.add_param(Parameter::from_scalar("RATE", "", 100.0f32));
        point.add_param(Parameter::from_scalar("DATA_START", "", 3u16));
        point.add_param(Parameter::from_text_array("LABELS", "", 5, &["LHEE", "RHEE"]).unwrap());
        point.add_param(Parameter::from_text_array("DESCRIPTIONS", "", 1, &["", ""]).unwrap());

        let analog = meta.add_group(2, "ANALOG", "").unwrap();
        analog.add_param(Parameter::from_scalar("USED", "", 3u16));
        analog.add_param(Parameter::from_scalar("RATE", "", 200.0f32));
        analog.add_param(Parameter::from_text_array("LABELS", "", 2, &["F1", "F2", "F3"]).unwrap());
        analog.add_param(Parameter::from_text_array("DESCRIPTIONS", "", 1, &["", "", ""]).unwrap());
        meta
    }

    #[test]
    fn test_lookup_forms() {
        let meta = store();
        assert!(matches!(meta.lookup("point.used"), Some(Entry::Parameter(p)) if p.name == "USED"));
        assert!(matches!(meta.lookup("POINT:RATE"), Some(Entry::Parameter(p)) if p.name == "RATE"));
        assert!(matches!(meta.lookup("analog"), Some(Entry::Group(g)) if g.id == 2));
        assert!(matches!(meta.lookup("1"), Some(Entry::Group(g)) if g.name == "POINT"));
        assert!(meta.lookup("POINT:NOPE").is_none());
        assert!(meta.lookup("NOPE").is_none());
        assert!(meta.lookup("9").is_none());
    }

    #[test]
    fn test_typed_access() {
        let meta = store();
        assert_eq!(meta.get::<u16>("POINT:USED").unwrap(), 2);
        assert_eq!(meta.get_or::<f32>("ANALOG:GEN_SCALE", 1.0).unwrap(), 1.0);
        assert!(matches!(meta.get::<f32>("ANALOG:GEN_SCALE"), Err(C3dError::NotFound(_))));
        assert_eq!(meta.point_labels().unwrap(), vec!["LHEE", "RHEE"]);
        assert_eq!(meta.analog_labels().unwrap(), vec!["F1", "F2", "F3"]);
        assert_eq!(meta.first_frame().unwrap(), 1);
        assert_eq!(meta.last_frame().unwrap(), 1);
    }

    #[test]
    fn test_trial_range_overrides_header() {
        let mut meta = store();
        let trial = meta.add_group(3, "TRIAL", "").unwrap();
        trial.add_param(Parameter::from_array("ACTUAL_START_FIELD", "", vec![2], &[5u16, 0]).unwrap());
        trial.add_param(Parameter::from_array("ACTUAL_END_FIELD", "", vec![2], &[4u16, 1]).unwrap());
        assert_eq!(meta.first_frame().unwrap(), 5);
        assert_eq!(meta.last_frame().unwrap(), 65536 + 4);
    }

    #[test]
    fn test_consistent_metadata() {
        let meta = store();
        assert!(meta.check_metadata().unwrap().is_empty());
    }

    #[test]
    fn test_inconsistent_point_count() {
        let mut meta = store();
        meta.header.point_count = 3;
        match meta.check_metadata().unwrap_err() {
            C3dError::InconsistentMetadata { field, header, parameter } => {
                assert_eq!(field, "point count");
                assert_eq!(header, 3.0);
                assert_eq!(parameter, 2.0);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_inconsistent_analog_count() {
        let mut meta = store();
        meta.header.analog_count = 3;
        let err = meta.check_metadata().unwrap_err();
        assert!(matches!(err, C3dError::InconsistentMetadata { field: "analog count", .. }));
    }

    #[test]
    fn test_analog_count_is_exact() {
        let mut meta = store();
        meta.directory
            .group_by_name_mut("ANALOG")
            .unwrap()
            .add_param(Parameter::from_scalar("RATE", "", 200.03f32));
        let err = meta.check_metadata().unwrap_err();
        assert!(matches!(err, C3dError::InconsistentMetadata { field: "analog count", .. }));
    }

    #[test]
    fn test_zero_point_rate_rejects_analog() {
        let mut meta = store();
        meta.header.frame_rate = 0.0;
        meta.directory
            .group_by_name_mut("POINT")
            .unwrap()
            .add_param(Parameter::from_scalar("RATE", "", 0.0f32));
        let err = meta.check_metadata().unwrap_err();
        assert!(matches!(err, C3dError::InconsistentMetadata { field: "analog count", .. }));
    }

    #[test]
    fn test_inconsistent_data_block() {
        let mut meta = store();
        meta.header.data_block = 7;
        let err = meta.check_metadata().unwrap_err();
        assert!(matches!(err, C3dError::InconsistentMetadata { field: "data block", .. }));
    }

    #[test]
    fn test_missing_parameters_warn() {
        let mut meta = MetadataStore::new(
            HeaderRecord {
                point_count: 0,
                frame_rate: 30.0,
                ..HeaderRecord::default()
            },
            ParameterDirectory::new(),
        );
        let point = meta.add_group(1, "POINT", "").unwrap();
        point.add_param(Parameter::from_scalar("USED", "", 0u16));
        point.add_param(Parameter::from_scalar("SCALE", "", -1.0f32));
        point.add_param(Parameter::from_scalar("RATE", "", 30.0f32));
        point.add_param(Parameter::from_scalar("DATA_START", "", 3u16));

        let missing = meta.check_metadata().unwrap();
        let keys: Vec<_> = missing.iter().map(|m| m.key).collect();
        assert_eq!(keys, EXPECTED_PARAMETERS.to_vec());
        assert_eq!(missing[0].to_string(), "missing parameter POINT:LABELS");
    }
}
