// Named, typed, possibly multi-dimensional parameter records

use crate::core::constants::CHAR_ELEMENT;
use crate::core::error::{C3dError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;
use std::io::{Read, Write};

/// Fixed-width little-endian element that a parameter payload can be viewed as.
pub trait Element: Copy + Sized {
    const WIDTH: usize;
    const NAME: &'static str;

    /// `bytes` holds at least `WIDTH` bytes.
    fn read_le(bytes: &[u8]) -> Self;
    fn write_le(self, out: &mut Vec<u8>);
}

macro_rules! le_element {
    ($($t:ty => $name:literal),* $(,)?) => {$(
        impl Element for $t {
            const WIDTH: usize = std::mem::size_of::<$t>();
            const NAME: &'static str = $name;

            fn read_le(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(&bytes[..Self::WIDTH]);
                <$t>::from_le_bytes(raw)
            }

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    )*};
}

le_element!(
    i8 => "int8",
    u8 => "uint8",
    i16 => "int16",
    u16 => "uint16",
    i32 => "int32",
    u32 => "uint32",
    f32 => "float32",
);

/// Column-major array view of a parameter payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamArray<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

impl<T> ParamArray<T> {
    /// Element at `index`, first axis varying fastest.
    pub fn get(&self, index: &[usize]) -> Option<&T> {
        if index.len() != self.shape.len() {
            return None;
        }
        let mut offset = 0;
        let mut stride = 1;
        for (i, extent) in index.iter().zip(&self.shape) {
            if i >= extent {
                return None;
            }
            offset += i * stride;
            stride *= extent;
        }
        self.data.get(offset)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Typed value of a parameter, chosen from its element width.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ParamValue {
    Text(String),
    TextArray(Vec<String>),
    Byte(Vec<i8>),
    Int16(Vec<i16>),
    Float(Vec<f32>),
    Raw(Vec<u8>),
}

impl ParamValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParamValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn to_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            ParamValue::Byte(v) => Some(v.iter().map(|x| f64::from(*x)).collect()),
            ParamValue::Int16(v) => Some(v.iter().map(|x| f64::from(*x)).collect()),
            ParamValue::Float(v) => Some(v.iter().map(|x| f64::from(*x)).collect()),
            _ => None,
        }
    }
}

/// A single parameter owned by a [`Group`](crate::Group).
///
/// Names are stored upper-cased. `element_size` is the byte width of one
/// element, or -1 for character data. The payload always holds
/// `product(dimensions) * |element_size|` bytes; no dimensions means a scalar.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub description: String,
    pub element_size: i8,
    pub dimensions: Vec<u8>,
    pub data: Vec<u8>,
}

impl Parameter {
    pub fn new(
        name: &str,
        description: &str,
        element_size: i8,
        dimensions: Vec<u8>,
        data: Vec<u8>,
    ) -> Result<Self> {
        let param = Self {
            name: name.to_uppercase(),
            description: description.to_string(),
            element_size,
            dimensions,
            data,
        };
        if param.data.len() != param.payload_len() {
            return Err(C3dError::Format(format!(
                "{}: payload holds {} bytes, shape needs {}",
                param.name,
                param.data.len(),
                param.payload_len()
            )));
        }
        Ok(param)
    }

    pub fn from_scalar<T: Element>(name: &str, description: &str, value: T) -> Self {
        let mut data = Vec::with_capacity(T::WIDTH);
        value.write_le(&mut data);
        Self {
            name: name.to_uppercase(),
            description: description.to_string(),
            element_size: T::WIDTH as i8,
            dimensions: Vec::new(),
            data,
        }
    }

    pub fn from_array<T: Element>(
        name: &str,
        description: &str,
        dimensions: Vec<u8>,
        values: &[T],
    ) -> Result<Self> {
        let mut data = Vec::with_capacity(values.len() * T::WIDTH);
        for value in values {
            value.write_le(&mut data);
        }
        Self::new(name, description, T::WIDTH as i8, dimensions, data)
    }

    pub fn from_text(name: &str, description: &str, value: &str) -> Result<Self> {
        let len = dimension(name, value.len())?;
        Self::new(name, description, CHAR_ELEMENT, vec![len], value.as_bytes().to_vec())
    }

    /// Fixed-width strings, space padded or truncated to `width` bytes.
    pub fn from_text_array<S: AsRef<str>>(
        name: &str,
        description: &str,
        width: u8,
        items: &[S],
    ) -> Result<Self> {
        let count = dimension(name, items.len())?;
        let width_usize = width as usize;
        let mut data = Vec::with_capacity(width_usize * items.len());
        for item in items {
            let bytes = item.as_ref().as_bytes();
            let take = bytes.len().min(width_usize);
            data.extend_from_slice(&bytes[..take]);
            data.resize(data.len() + width_usize - take, b' ');
        }
        Self::new(name, description, CHAR_ELEMENT, vec![width, count], data)
    }

    pub fn element_count(&self) -> usize {
        self.dimensions.iter().map(|d| *d as usize).product()
    }

    pub fn payload_len(&self) -> usize {
        self.element_count() * self.element_size.unsigned_abs() as usize
    }

    pub fn is_scalar(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Bytes needed to store this parameter's record.
    pub fn binary_size(&self) -> usize {
        1 + // group id
        2 + // offset to next record
        1 + self.name.len() +
        1 + // element size
        1 + self.dimensions.len() +
        self.payload_len() +
        1 + self.description.len()
    }

    /// Parse the record body that follows the offset field.
    pub(crate) fn read_body<R: Read>(name: String, reader: &mut R) -> Result<Self> {
        let element_size = reader.read_i8()?;
        let dim_count = reader.read_u8()?;
        let mut dimensions = vec![0u8; dim_count as usize];
        reader.read_exact(&mut dimensions)?;

        let mut param = Self {
            name,
            description: String::new(),
            element_size,
            dimensions,
            data: Vec::new(),
        };
        let len = param.payload_len();
        if len > 0 {
            param.data = vec![0u8; len];
            reader.read_exact(&mut param.data)?;
        }

        let desc_len = reader.read_u8()?;
        let mut desc = vec![0u8; desc_len as usize];
        reader.read_exact(&mut desc)?;
        param.description = String::from_utf8_lossy(&desc).into_owned();
        Ok(param)
    }

    pub(crate) fn write_record<W: Write>(&self, group_id: u8, out: &mut W) -> Result<()> {
        let name = self.name.as_bytes();
        let name_len = name_length(&self.name)?;
        let desc_len = description_length(&self.name, &self.description)?;
        let dim_count = dimension(&self.name, self.dimensions.len())?;
        let next = i16::try_from(self.binary_size() - 2 - name.len()).map_err(|_| {
            C3dError::Format(format!("{}: record too large for offset field", self.name))
        })?;

        out.write_i8(name_len)?;
        out.write_i8(group_id as i8)?;
        out.write_all(name)?;
        out.write_i16::<LittleEndian>(next)?;
        out.write_i8(self.element_size)?;
        out.write_u8(dim_count)?;
        out.write_all(&self.dimensions)?;
        out.write_all(&self.data)?;
        out.write_u8(desc_len)?;
        out.write_all(self.description.as_bytes())?;
        Ok(())
    }

    /// First element of the payload.
    pub fn get<T: Element>(&self) -> Result<T> {
        if self.data.len() < T::WIDTH {
            return Err(self.shape_error(T::NAME));
        }
        Ok(T::read_le(&self.data))
    }

    /// Whole payload as a flat sequence, ignoring dimensions.
    pub fn values<T: Element>(&self) -> Vec<T> {
        self.data.chunks_exact(T::WIDTH).map(T::read_le).collect()
    }

    pub fn array<T: Element>(&self) -> Result<ParamArray<T>> {
        if self.dimensions.is_empty() {
            return Err(self.shape_error("array"));
        }
        let data = self.values::<T>();
        if data.len() != self.element_count() {
            return Err(self.shape_error(T::NAME));
        }
        Ok(ParamArray {
            shape: self.dimensions.iter().map(|d| *d as usize).collect(),
            data,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn as_string(&self) -> Result<String> {
        Ok(String::from_utf8(self.data.clone())?)
    }

    /// First dimension is the string length, second the string count.
    pub fn bytes_array(&self) -> Result<Vec<&[u8]>> {
        let &[len, count] = self.dimensions.as_slice() else {
            return Err(self.shape_error("bytes array"));
        };
        let (len, count) = (len as usize, count as usize);
        Ok((0..count)
            .map(|i| self.data.get(i * len..(i + 1) * len).unwrap_or(&[]))
            .collect())
    }

    pub fn string_array(&self) -> Result<Vec<String>> {
        if self.dimensions.len() != 2 {
            return Err(self.shape_error("string array"));
        }
        self.bytes_array()?
            .into_iter()
            .map(|raw| Ok(String::from_utf8(raw.to_vec())?))
            .collect()
    }

    pub fn value(&self) -> Result<ParamValue> {
        Ok(match self.element_size {
            CHAR_ELEMENT if self.dimensions.len() == 2 => ParamValue::TextArray(self.string_array()?),
            CHAR_ELEMENT => ParamValue::Text(self.as_string()?),
            1 => ParamValue::Byte(self.values()),
            2 => ParamValue::Int16(self.values()),
            4 => ParamValue::Float(self.values()),
            _ => ParamValue::Raw(self.data.clone()),
        })
    }

    fn shape_error(&self, view: &'static str) -> C3dError {
        C3dError::Shape {
            name: self.name.clone(),
            view,
        }
    }
}

pub(crate) fn name_length(name: &str) -> Result<i8> {
    i8::try_from(name.len())
        .map_err(|_| C3dError::Format(format!("{}: name longer than 127 bytes", name)))
}

pub(crate) fn description_length(name: &str, description: &str) -> Result<u8> {
    u8::try_from(description.len())
        .map_err(|_| C3dError::Format(format!("{}: description longer than 255 bytes", name)))
}

fn dimension(name: &str, extent: usize) -> Result<u8> {
    u8::try_from(extent)
        .map_err(|_| C3dError::Format(format!("{}: extent {} exceeds 255", name, extent)))
}
