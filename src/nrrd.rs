//! Reading and writing NRRD ("Nearly Raw Raster Data") volumes.
//!
//! NRRD lists the fastest-varying axis first.
//! Volumes are exposed in C order instead, so their shape is the reversed `sizes` field;
//! the data itself is never reordered.
use std::{
    collections::BTreeMap,
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use bytes::{Buf, BufMut, Bytes};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};

use crate::{Error, Result, format::VolumeFormat, volume::Volume};

inventory::submit! {
    VolumeFormat::new("nrrd", &["nrrd", "nhdr"], read_volume)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NrrdType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
}

impl NrrdType {
    /// Element size in bytes.
    pub fn size(&self) -> usize {
        match self {
            NrrdType::Int8 | NrrdType::UInt8 => 1,
            NrrdType::Int16 | NrrdType::UInt16 => 2,
            NrrdType::Int32 | NrrdType::UInt32 | NrrdType::Float32 => 4,
            NrrdType::Int64 | NrrdType::UInt64 | NrrdType::Float64 => 8,
        }
    }

    /// Canonical name written to headers.
    pub fn name(&self) -> &'static str {
        match self {
            NrrdType::Int8 => "int8",
            NrrdType::UInt8 => "uint8",
            NrrdType::Int16 => "int16",
            NrrdType::UInt16 => "uint16",
            NrrdType::Int32 => "int32",
            NrrdType::UInt32 => "uint32",
            NrrdType::Int64 => "int64",
            NrrdType::UInt64 => "uint64",
            NrrdType::Float32 => "float",
            NrrdType::Float64 => "double",
        }
    }

    fn from_alias(s: &str) -> Result<Self> {
        let t = match s {
            "signed char" | "int8" | "int8_t" => NrrdType::Int8,
            "uchar" | "unsigned char" | "uint8" | "uint8_t" => NrrdType::UInt8,
            "short" | "short int" | "signed short" | "signed short int" | "int16" | "int16_t" => {
                NrrdType::Int16
            }
            "ushort" | "unsigned short" | "unsigned short int" | "uint16" | "uint16_t" => {
                NrrdType::UInt16
            }
            "int" | "signed int" | "int32" | "int32_t" => NrrdType::Int32,
            "uint" | "unsigned int" | "uint32" | "uint32_t" => NrrdType::UInt32,
            "longlong" | "long long" | "long long int" | "signed long long"
            | "signed long long int" | "int64" | "int64_t" => NrrdType::Int64,
            "ulonglong" | "unsigned long long" | "unsigned long long int" | "uint64"
            | "uint64_t" => NrrdType::UInt64,
            "float" => NrrdType::Float32,
            "double" => NrrdType::Float64,
            "block" => return Err(Error::nrrd("block type is not supported")),
            other => return Err(Error::nrrd(format!("unknown type '{other}'"))),
        };
        Ok(t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Raw,
    Text,
    Gzip,
}

impl Encoding {
    fn from_alias(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(Encoding::Raw),
            "txt" | "text" | "ascii" => Ok(Encoding::Text),
            "gzip" | "gz" => Ok(Encoding::Gzip),
            other => Err(Error::nrrd(format!("unsupported encoding '{other}'"))),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Encoding::Raw => "raw",
            Encoding::Text => "ascii",
            Encoding::Gzip => "gzip",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Parsed NRRD header.
#[derive(Debug, Clone, PartialEq)]
pub struct NrrdHeader {
    pub version: u8,
    pub data_type: NrrdType,
    pub dimension: usize,
    /// Axis lengths, fastest axis first.
    pub sizes: Vec<usize>,
    pub encoding: Encoding,
    pub endian: Option<Endian>,
    pub line_skip: usize,
    /// `-1` means the data occupies the last bytes of a raw payload.
    pub byte_skip: i64,
    pub data_file: Option<String>,
    pub space: Option<String>,
    pub space_dimension: Option<usize>,
    pub space_directions: Option<Vec<Option<Vec<f64>>>>,
    pub space_origin: Option<Vec<f64>>,
    pub spacings: Option<Vec<f64>>,
    pub kinds: Option<Vec<String>>,
    /// Fields without dedicated handling, verbatim.
    pub fields: BTreeMap<String, String>,
    pub key_values: BTreeMap<String, String>,
}

impl NrrdHeader {
    /// Parse header text, from the magic line up to (not including) the blank separator line.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let magic = lines
            .next()
            .ok_or_else(|| Error::nrrd("empty header"))?
            .trim_end();
        let version = magic
            .strip_prefix("NRRD000")
            .and_then(|v| v.parse::<u8>().ok())
            .filter(|v| (1..=5).contains(v))
            .ok_or_else(|| Error::nrrd(format!("bad magic line '{magic}'")))?;

        let mut raw_fields: BTreeMap<String, String> = BTreeMap::new();
        let mut key_values = BTreeMap::new();
        for line in lines {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                break;
            }
            if line.starts_with('#') {
                continue;
            }
            let field_at = line.find(": ");
            let kv_at = line.find(":=");
            match (field_at, kv_at) {
                (Some(f), kv) if kv.is_none_or(|k| f < k) => {
                    let (name, value) = (line[..f].trim(), line[f + 2..].trim());
                    if raw_fields
                        .insert(name.to_string(), value.to_string())
                        .is_some()
                    {
                        return Err(Error::nrrd(format!("duplicate field '{name}'")));
                    }
                }
                (_, Some(k)) => {
                    key_values.insert(line[..k].to_string(), line[k + 2..].to_string());
                }
                _ => return Err(Error::nrrd(format!("malformed header line '{line}'"))),
            }
        }

        let mut take = |names: &[&str]| -> Option<String> {
            names.iter().find_map(|n| raw_fields.remove(*n))
        };
        let required = |value: Option<String>, name: &str| -> Result<String> {
            value.ok_or_else(|| Error::nrrd(format!("missing required field '{name}'")))
        };

        let data_type = NrrdType::from_alias(&required(take(&["type"]), "type")?)?;
        let dimension: usize = parse_number(&required(take(&["dimension"]), "dimension")?)?;
        let sizes = parse_list::<usize>(&required(take(&["sizes"]), "sizes")?)?;
        let encoding = Encoding::from_alias(&required(take(&["encoding"]), "encoding")?)?;
        let endian = take(&["endian"])
            .map(|e| match e.as_str() {
                "little" => Ok(Endian::Little),
                "big" => Ok(Endian::Big),
                other => Err(Error::nrrd(format!("unknown endian '{other}'"))),
            })
            .transpose()?;
        let line_skip = take(&["line skip", "lineskip"])
            .map(|s| parse_number::<usize>(&s))
            .transpose()?
            .unwrap_or(0);
        let byte_skip = take(&["byte skip", "byteskip"])
            .map(|s| parse_number::<i64>(&s))
            .transpose()?
            .unwrap_or(0);
        let data_file = take(&["data file", "datafile"]);
        let space = take(&["space"]);
        let space_dimension = take(&["space dimension"])
            .map(|s| parse_number::<usize>(&s))
            .transpose()?;
        let space_directions = take(&["space directions"])
            .map(|s| parse_directions(&s))
            .transpose()?;
        let space_origin = take(&["space origin"])
            .map(|s| parse_vector(&s))
            .transpose()?;
        let spacings = take(&["spacings"])
            .map(|s| parse_list::<f64>(&s))
            .transpose()?;
        let kinds = take(&["kinds"]).map(|s| s.split_whitespace().map(String::from).collect());

        let header = Self {
            version,
            data_type,
            dimension,
            sizes,
            encoding,
            endian,
            line_skip,
            byte_skip,
            data_file,
            space,
            space_dimension,
            space_directions,
            space_origin,
            spacings,
            kinds,
            fields: raw_fields,
            key_values,
        };
        header.validate()?;
        Ok(header)
    }

    fn validate(&self) -> Result<()> {
        if self.sizes.len() != self.dimension {
            return Err(Error::nrrd(format!(
                "dimension is {} but {} sizes were given",
                self.dimension,
                self.sizes.len()
            )));
        }
        if self.data_type.size() > 1 && self.encoding != Encoding::Text && self.endian.is_none()
        {
            return Err(Error::nrrd("missing required field 'endian'"));
        }
        self.byte_len()?;
        if self.byte_skip < -1 {
            return Err(Error::nrrd(format!("invalid byte skip {}", self.byte_skip)));
        }
        if self.byte_skip == -1 && self.encoding != Encoding::Raw {
            return Err(Error::nrrd("byte skip -1 is only valid for raw encoding"));
        }
        if let Some(file) = &self.data_file
            && (file.starts_with("LIST") || file.split_whitespace().count() > 1)
        {
            return Err(Error::nrrd(format!("multi-file data '{file}' is not supported")));
        }
        Ok(())
    }

    /// Shape in C order (slowest axis first).
    pub fn shape(&self) -> Vec<usize> {
        self.sizes.iter().rev().copied().collect()
    }

    /// Number of elements; sizes whose product overflows are invalid.
    pub fn numel(&self) -> Result<usize> {
        self.sizes
            .iter()
            .try_fold(1usize, |acc, &n| acc.checked_mul(n))
            .ok_or_else(|| self.overflow())
    }

    fn byte_len(&self) -> Result<usize> {
        self.numel()?
            .checked_mul(self.data_type.size())
            .ok_or_else(|| self.overflow())
    }

    fn overflow(&self) -> Error {
        Error::nrrd(format!("sizes {:?} exceed the addressable size", self.sizes))
    }

    /// Decode the payload that follows the header (or the detached data file contents).
    pub fn decode(&self, mut payload: Bytes) -> Result<Vec<f64>> {
        for _ in 0..self.line_skip {
            let Some(newline) = payload.iter().position(|&b| b == b'\n') else {
                return Err(Error::nrrd("line skip beyond end of data"));
            };
            payload.advance(newline + 1);
        }

        match self.encoding {
            Encoding::Raw => {
                if self.byte_skip == -1 {
                    let need = self.byte_len()?;
                    if payload.len() < need {
                        return Err(self.too_short(need, payload.len()));
                    }
                    payload.advance(payload.len() - need);
                } else {
                    skip_bytes(&mut payload, self.byte_skip as usize)?;
                }
                self.decode_binary(payload)
            }
            Encoding::Gzip => {
                let mut inflated = Vec::new();
                GzDecoder::new(payload.as_ref()).read_to_end(&mut inflated)?;
                let mut inflated = Bytes::from(inflated);
                skip_bytes(&mut inflated, self.byte_skip as usize)?;
                self.decode_binary(inflated)
            }
            Encoding::Text => {
                skip_bytes(&mut payload, self.byte_skip as usize)?;
                self.decode_text(&payload)
            }
        }
    }

    fn too_short(&self, need: usize, have: usize) -> Error {
        Error::nrrd(format!(
            "expected {need} bytes of {} data, found {have}",
            self.data_type.name()
        ))
    }

    fn decode_binary(&self, mut data: Bytes) -> Result<Vec<f64>> {
        let numel = self.numel()?;
        let need = self.byte_len()?;
        if data.len() < need {
            return Err(self.too_short(need, data.len()));
        }
        if data.len() > need {
            log::warn!(
                "ignoring {} trailing bytes after NRRD data",
                data.len() - need
            );
        }
        let endian = self.endian.unwrap_or(Endian::Little);

        let read: fn(&mut Bytes, Endian) -> f64 = match self.data_type {
            NrrdType::Int8 => |b, _| f64::from(b.get_i8()),
            NrrdType::UInt8 => |b, _| f64::from(b.get_u8()),
            NrrdType::Int16 => |b, e| match e {
                Endian::Little => f64::from(b.get_i16_le()),
                Endian::Big => f64::from(b.get_i16()),
            },
            NrrdType::UInt16 => |b, e| match e {
                Endian::Little => f64::from(b.get_u16_le()),
                Endian::Big => f64::from(b.get_u16()),
            },
            NrrdType::Int32 => |b, e| match e {
                Endian::Little => f64::from(b.get_i32_le()),
                Endian::Big => f64::from(b.get_i32()),
            },
            NrrdType::UInt32 => |b, e| match e {
                Endian::Little => f64::from(b.get_u32_le()),
                Endian::Big => f64::from(b.get_u32()),
            },
            NrrdType::Int64 => |b, e| match e {
                Endian::Little => b.get_i64_le() as f64,
                Endian::Big => b.get_i64() as f64,
            },
            NrrdType::UInt64 => |b, e| match e {
                Endian::Little => b.get_u64_le() as f64,
                Endian::Big => b.get_u64() as f64,
            },
            NrrdType::Float32 => |b, e| match e {
                Endian::Little => f64::from(b.get_f32_le()),
                Endian::Big => f64::from(b.get_f32()),
            },
            NrrdType::Float64 => |b, e| match e {
                Endian::Little => b.get_f64_le(),
                Endian::Big => b.get_f64(),
            },
        };

        let mut out = Vec::with_capacity(numel);
        for _ in 0..numel {
            out.push(read(&mut data, endian));
        }
        Ok(out)
    }

    fn decode_text(&self, payload: &[u8]) -> Result<Vec<f64>> {
        let text = std::str::from_utf8(payload)
            .map_err(|e| Error::nrrd(format!("text data is not valid UTF-8: {e}")))?;
        let numel = self.numel()?;
        let mut tokens = text
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty());
        let values = tokens
            .by_ref()
            .take(numel)
            .map(parse_number::<f64>)
            .collect::<Result<Vec<_>>>()?;
        let extra = tokens.count();
        if extra > 0 {
            log::warn!("ignoring {extra} trailing values after NRRD text data");
        }
        if values.len() < numel {
            return Err(Error::nrrd(format!(
                "expected {numel} text values, found {}",
                values.len()
            )));
        }
        Ok(values)
    }
}

fn skip_bytes(payload: &mut Bytes, n: usize) -> Result<()> {
    if n > payload.len() {
        return Err(Error::nrrd("byte skip beyond end of data"));
    }
    payload.advance(n);
    Ok(())
}

fn parse_number<T: std::str::FromStr>(s: &str) -> Result<T> {
    s.trim()
        .parse()
        .map_err(|_| Error::nrrd(format!("could not parse number '{s}'")))
}

fn parse_list<T: std::str::FromStr>(s: &str) -> Result<Vec<T>> {
    s.split_whitespace().map(parse_number).collect()
}

/// Parse `(x,y,z)`.
fn parse_vector(s: &str) -> Result<Vec<f64>> {
    let inner = s
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| Error::nrrd(format!("malformed vector '{s}'")))?;
    inner.split(',').map(parse_number).collect()
}

/// Parse a sequence of vectors or `none`, e.g. `(1,0,0) (0,1,0) none`.
fn parse_directions(s: &str) -> Result<Vec<Option<Vec<f64>>>> {
    let mut out = Vec::new();
    let mut rest = s.trim();
    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("none") {
            out.push(None);
            rest = after.trim_start();
        } else if rest.starts_with('(') {
            let end = rest
                .find(')')
                .ok_or_else(|| Error::nrrd(format!("unterminated vector in '{s}'")))?;
            out.push(Some(parse_vector(&rest[..=end])?));
            rest = rest[end + 1..].trim_start();
        } else {
            return Err(Error::nrrd(format!("malformed space directions '{s}'")));
        }
    }
    Ok(out)
}

/// Split file contents into header text and attached payload.
///
/// The header ends at the first empty line; without one the whole file is a detached header.
fn split_header(bytes: &[u8]) -> Result<(&str, &[u8])> {
    let mut pos = 0;
    let mut header_end = bytes.len();
    let mut data_start = bytes.len();
    while let Some(nl) = bytes[pos..].iter().position(|&b| b == b'\n') {
        let line = &bytes[pos..pos + nl];
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() && pos > 0 {
            header_end = pos;
            data_start = pos + nl + 1;
            break;
        }
        pos += nl + 1;
    }
    let header = std::str::from_utf8(&bytes[..header_end])
        .map_err(|e| Error::nrrd(format!("header is not valid UTF-8: {e}")))?;
    Ok((header, &bytes[data_start..]))
}

/// Read an NRRD file (attached or detached) into a header and a C-order volume.
pub fn read(path: &Path) -> Result<(NrrdHeader, Volume<f64>)> {
    let bytes = fs::read(path)?;
    let (header_text, attached) = split_header(&bytes)?;
    let header = NrrdHeader::parse(header_text)?;
    let payload = match &header.data_file {
        Some(name) => {
            let data_path = detached_path(path, name);
            log::debug!("reading detached NRRD data from {}", data_path.display());
            Bytes::from(fs::read(&data_path)?)
        }
        None => Bytes::copy_from_slice(attached),
    };
    let data = header.decode(payload)?;
    let volume = Volume::new(header.shape(), data)?;
    log::debug!(
        "read NRRD {} of shape {:?} ({})",
        path.display(),
        volume.shape(),
        header.data_type.name()
    );
    Ok((header, volume))
}

fn detached_path(header_path: &Path, name: &str) -> PathBuf {
    let name = Path::new(name);
    if name.is_absolute() {
        return name.to_path_buf();
    }
    header_path
        .parent()
        .map_or_else(|| name.to_path_buf(), |dir| dir.join(name))
}

pub fn read_volume(path: &Path) -> Result<Volume<f64>> {
    read(path).map(|(_, volume)| volume)
}

/// Element types that can be written to NRRD.
pub trait NrrdElement: Copy {
    const TYPE: NrrdType;
    fn put(self, out: &mut impl BufMut);
}

macro_rules! impl_nrrd_element {
    ($($t:ty => $variant:ident, $put:ident;)*) => {
        $(
            impl NrrdElement for $t {
                const TYPE: NrrdType = NrrdType::$variant;
                fn put(self, out: &mut impl BufMut) {
                    out.$put(self);
                }
            }
        )*
    };
}

impl_nrrd_element! {
    i8 => Int8, put_i8;
    u8 => UInt8, put_u8;
    i16 => Int16, put_i16_le;
    u16 => UInt16, put_u16_le;
    i32 => Int32, put_i32_le;
    u32 => UInt32, put_u32_le;
    f32 => Float32, put_f32_le;
    f64 => Float64, put_f64_le;
}

/// Options for [write]. Text encoding is read-only.
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    pub encoding: Encoding,
    pub key_values: Vec<(String, String)>,
}

/// Write a little-endian NRRD file with attached data.
pub fn write<T: NrrdElement>(
    path: &Path,
    volume: &Volume<T>,
    options: &WriteOptions,
) -> Result<()> {
    let sizes: Vec<String> = volume.shape().iter().rev().map(|n| n.to_string()).collect();
    let mut header = String::from("NRRD0004\n");
    header.push_str(&format!("type: {}\n", T::TYPE.name()));
    header.push_str(&format!("dimension: {}\n", sizes.len()));
    header.push_str(&format!("sizes: {}\n", sizes.join(" ")));
    header.push_str(&format!("encoding: {}\n", options.encoding.name()));
    if T::TYPE.size() > 1 {
        header.push_str("endian: little\n");
    }
    for (key, value) in &options.key_values {
        header.push_str(&format!("{key}:={value}\n"));
    }
    header.push('\n');

    let mut body = Vec::with_capacity(volume.len() * T::TYPE.size());
    for &v in volume.as_slice() {
        v.put(&mut body);
    }
    let body = match options.encoding {
        Encoding::Raw => body,
        Encoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&body)?;
            encoder.finish()?
        }
        Encoding::Text => return Err(Error::nrrd("writing text encoding is not supported")),
    };

    let mut file = fs::File::create(path)?;
    file.write_all(header.as_bytes())?;
    file.write_all(&body)?;
    log::debug!("wrote NRRD {} of shape {:?}", path.display(), volume.shape());
    Ok(())
}
