// Parameter groups

use crate::core::error::{C3dError, Result};
use crate::core::parameter::{description_length, name_length, Element, Parameter};
use byteorder::{LittleEndian, WriteBytesExt};
use serde::Serialize;
use std::io::Write;

/// A named, numbered collection of parameters.
///
/// A group created for a parameter record that arrived before its group
/// header has an empty name until that header is seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Group {
    pub id: u8,
    pub name: String,
    pub description: String,
    params: Vec<Parameter>,
}

impl Group {
    pub fn new(id: u8, name: &str, description: &str) -> Self {
        Self {
            id,
            name: name.to_uppercase(),
            description: description.to_string(),
            params: Vec::new(),
        }
    }

    pub(crate) fn placeholder(id: u8) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.name.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        let key = name.to_uppercase();
        self.params.iter().find(|p| p.name == key)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        let key = name.to_uppercase();
        self.params.iter_mut().find(|p| p.name == key)
    }

    /// Insert `param`, replacing any parameter of the same name in place.
    pub fn add_param(&mut self, mut param: Parameter) {
        param.name = param.name.to_uppercase();
        match self.params.iter_mut().find(|p| p.name == param.name) {
            Some(slot) => *slot = param,
            None => self.params.push(param),
        }
    }

    /// Parameters in insertion order.
    pub fn params(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get_value<T: Element>(&self, name: &str) -> Result<T> {
        self.get(name)
            .ok_or_else(|| C3dError::NotFound(format!("{}:{}", self.name, name.to_uppercase())))?
            .get::<T>()
    }

    pub fn get_string(&self, name: &str) -> Result<String> {
        self.get(name)
            .ok_or_else(|| C3dError::NotFound(format!("{}:{}", self.name, name.to_uppercase())))?
            .as_string()
    }

    fn header_size(&self) -> usize {
        1 + // id
        1 + self.name.len() +
        2 + // offset to next record
        1 + self.description.len()
    }

    /// Bytes needed to store this group's header and all its parameters.
    pub fn binary_size(&self) -> usize {
        self.header_size() + self.params.iter().map(Parameter::binary_size).sum::<usize>()
    }

    pub(crate) fn write_records<W: Write>(&self, out: &mut W) -> Result<()> {
        if self.id == 0 || self.id > i8::MAX as u8 {
            return Err(C3dError::Format(format!(
                "{}: group id {} outside 1..=127",
                self.name, self.id
            )));
        }
        let name_len = name_length(&self.name)?;
        let desc_len = description_length(&self.name, &self.description)?;

        out.write_i8(name_len)?;
        out.write_i8(-(self.id as i8))?;
        out.write_all(self.name.as_bytes())?;
        out.write_i16::<LittleEndian>(3 + i16::from(desc_len))?;
        out.write_u8(desc_len)?;
        out.write_all(self.description.as_bytes())?;

        for param in &self.params {
            param.write_record(self.id, out)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_insensitive_lookup() {
        let mut group = Group::new(1, "point", "POINT group");
        group.add_param(Parameter::from_scalar("Used", "", 2u16));
        assert_eq!(group.name, "POINT");
        assert!(group.get("used").is_some());
        assert_eq!(group.get_value::<u16>("USED").unwrap(), 2);
        assert!(matches!(group.get_value::<u16>("RATE"), Err(C3dError::NotFound(ref k)) if k == "POINT:RATE"));
    }

    #[test]
    fn test_get_mut_edits_in_place() {
        let mut group = Group::new(1, "POINT", "");
        group.add_param(Parameter::from_scalar("RATE", "", 50.0f32));
        group.get_mut("rate").unwrap().description = "capture rate".to_string();
        assert_eq!(group.get("RATE").unwrap().description, "capture rate");
        assert!(group.get_mut("USED").is_none());
    }

    #[test]
    fn test_placeholder_has_no_name() {
        let group = Group::placeholder(4);
        assert_eq!(group.id, 4);
        assert!(group.is_placeholder());
        assert!(!Group::new(4, "FORCE", "").is_placeholder());
    }

    #[test]
    fn test_replace_keeps_order() {
        let mut group = Group::new(2, "ANALOG", "");
        group.add_param(Parameter::from_scalar("USED", "", 1u16));
        group.add_param(Parameter::from_scalar("RATE", "", 10.0f32));
        group.add_param(Parameter::from_scalar("USED", "", 4u16));
        let names: Vec<_> = group.params().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["USED", "RATE"]);
        assert_eq!(group.get_value::<u16>("USED").unwrap(), 4);
    }

    #[test]
    fn test_header_record() {
        let group = Group::new(3, "TRIAL", "TRIAL group");
        let mut out = Vec::new();
        group.write_records(&mut out).unwrap();

        assert_eq!(out.len(), group.binary_size());
        assert_eq!(out[0], 5);
        assert_eq!(out[1] as i8, -3);
        assert_eq!(&out[2..7], b"TRIAL");
        assert_eq!(i16::from_le_bytes([out[7], out[8]]), 3 + 11);
        assert_eq!(out[9], 11);
        assert_eq!(&out[10..], b"TRIAL group");
    }

    #[test]
    fn test_binary_size_sums_params() {
        let mut group = Group::new(1, "POINT", "d");
        let used = Parameter::from_scalar("USED", "n", 2u16);
        let size = used.binary_size();
        group.add_param(used);
        assert_eq!(group.binary_size(), 1 + 6 + 2 + 2 + size);
    }

    #[test]
    fn test_invalid_id_rejected() {
        let group = Group::new(0, "BAD", "");
        assert!(group.write_records(&mut Vec::new()).is_err());
    }
}
