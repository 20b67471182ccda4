// Chained group/parameter directory

use crate::core::constants::*;
use crate::core::error::{C3dError, Result};
use crate::core::group::Group;
use crate::core::parameter::Parameter;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use tracing::{debug, trace};

/// All groups of a file, stored once and indexed by both id and name.
#[derive(Debug, Clone, Default)]
pub struct ParameterDirectory {
    groups: Vec<Group>,
    by_id: HashMap<u8, usize>,
    by_name: HashMap<String, usize>,
}

impl ParameterDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_group(&mut self, id: u8, name: &str, description: &str) -> Result<&mut Group> {
        let name = name.to_uppercase();
        if self.by_id.contains_key(&id) {
            return Err(C3dError::DuplicateGroup(id.to_string()));
        }
        if self.by_name.contains_key(&name) {
            return Err(C3dError::DuplicateGroup(name));
        }
        let handle = self.groups.len();
        self.groups.push(Group::new(id, &name, description));
        self.by_id.insert(id, handle);
        self.by_name.insert(name, handle);
        Ok(&mut self.groups[handle])
    }

    pub fn group(&self, id: u8) -> Option<&Group> {
        self.by_id.get(&id).map(|h| &self.groups[*h])
    }

    pub fn group_by_name(&self, name: &str) -> Option<&Group> {
        self.by_name.get(&name.to_uppercase()).map(|h| &self.groups[*h])
    }

    pub fn group_by_name_mut(&mut self, name: &str) -> Option<&mut Group> {
        let handle = *self.by_name.get(&name.to_uppercase())?;
        Some(&mut self.groups[handle])
    }

    /// Groups ordered by ascending id.
    pub fn groups(&self) -> Vec<&Group> {
        let mut groups: Vec<&Group> = self.groups.iter().collect();
        groups.sort_by_key(|g| g.id);
        groups
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Exact byte size of the preamble plus every record.
    pub fn binary_size(&self) -> usize {
        PREAMBLE_SIZE + self.groups.iter().map(Group::binary_size).sum::<usize>()
    }

    pub fn parameter_blocks(&self) -> usize {
        blocks_for(self.binary_size())
    }

    /// Read the preamble and the directory blocks it announces.
    pub fn read_from<R: Read>(handle: &mut R) -> Result<Self> {
        let mut preamble = [0u8; PREAMBLE_SIZE];
        handle.read_exact(&mut preamble)?;
        let blocks = preamble[2] as usize;
        let processor = Processor::from_u8(preamble[3]);
        if processor != Processor::Intel {
            return Err(C3dError::UnsupportedProcessor(processor));
        }

        // Whole section in one buffer so records may straddle block boundaries.
        let len = (BLOCK_SIZE * blocks).saturating_sub(PREAMBLE_SIZE);
        let mut records = Vec::with_capacity(len);
        handle.by_ref().take(len as u64).read_to_end(&mut records)?;
        debug!("Parameter directory: {} blocks, {} bytes read", blocks, records.len());

        Self::decode(&records)
    }

    /// Decode the record stream that follows the preamble.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut dir = Self::new();
        let mut start = 0usize;

        while start + 2 <= bytes.len() {
            let name_len = bytes[start] as i8;
            let group_id = bytes[start + 1] as i8;
            if group_id == 0 || name_len == 0 {
                break;
            }

            let name_len = name_len.unsigned_abs() as usize;
            let mut cursor = Cursor::new(&bytes[start + 2..]);
            let mut name = vec![0u8; name_len];
            cursor.read_exact(&mut name)?;
            let name = String::from_utf8_lossy(&name).to_uppercase();
            let next_offset = cursor.read_i16::<LittleEndian>()?;

            if group_id > 0 {
                trace!("Parameter record {} in group {}", name, group_id);
                let param = Parameter::read_body(name, &mut cursor)?;
                dir.attach(group_id as u8, param);
            } else {
                trace!("Group record {} with id {}", name, group_id.unsigned_abs());
                let desc_len = cursor.read_u8()?;
                let mut desc = vec![0u8; desc_len as usize];
                cursor.read_exact(&mut desc)?;
                let desc = String::from_utf8_lossy(&desc).into_owned();
                dir.name_group(group_id.unsigned_abs(), name, desc)?;
            }

            // The offset field, not the parsed length, locates the next record.
            let next = start as i64 + 2 + name_len as i64 + i64::from(next_offset);
            if next <= start as i64 {
                break;
            }
            start = next as usize;
        }

        Ok(dir)
    }

    fn attach(&mut self, id: u8, param: Parameter) {
        let handle = match self.by_id.get(&id) {
            Some(handle) => *handle,
            None => {
                self.groups.push(Group::placeholder(id));
                self.by_id.insert(id, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        self.groups[handle].add_param(param);
    }

    fn name_group(&mut self, id: u8, name: String, description: String) -> Result<()> {
        match self.by_id.get(&id) {
            Some(handle) => {
                let handle = *handle;
                let group = &mut self.groups[handle];
                group.name = name.clone();
                group.description = description;
                self.by_name.insert(name, handle);
            }
            None => {
                self.add_group(id, &name, &description)?;
            }
        }
        Ok(())
    }

    /// Preamble and records, zero padded to whole blocks.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let blocks = u8::try_from(self.parameter_blocks()).map_err(|_| {
            C3dError::Format(format!("directory needs {} blocks", self.parameter_blocks()))
        })?;

        let mut out = Vec::with_capacity(blocks as usize * BLOCK_SIZE);
        out.write_u8(0)?;
        out.write_u8(0)?;
        out.write_u8(blocks)?;
        out.write_u8(PROCESSOR_INTEL)?;
        for group in self.groups() {
            group.write_records(&mut out)?;
        }
        out.resize(blocks as usize * BLOCK_SIZE, 0);
        Ok(out)
    }

    pub fn write_to<W: Write>(&self, handle: &mut W) -> Result<()> {
        handle.write_all(&self.encode()?)?;
        Ok(())
    }
}
