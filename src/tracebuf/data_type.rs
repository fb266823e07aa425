//! On-wire sample type codes.
//!
//! A TraceBuf2 header carries a two-character `data_type` code that describes
//! both the sample representation and the byte order of the whole packet:
//! the first character selects integer/float and the sender's endianness
//! (`i`/`f` little-endian, `s`/`t` big-endian), the second the sample width
//! in bytes. Decoding dispatches on the parsed variant rather than on raw
//! byte comparisons.

use crate::{GatewayError, Result};

/// Byte order a sender wrote its packet in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    /// The byte order of the machine this gateway runs on.
    pub const HOST: ByteOrder =
        if cfg!(target_endian = "big") { ByteOrder::Big } else { ByteOrder::Little };

    /// Returns whether values in this order must be byte-swapped on the host.
    pub fn needs_swap(self) -> bool {
        self != Self::HOST
    }
}

/// Sample representation plus sender byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    /// `i` — integer samples, little-endian packet.
    IntLe,
    /// `f` — IEEE float samples, little-endian packet.
    FloatLe,
    /// `s` — integer samples, big-endian packet.
    IntBe,
    /// `t` — IEEE float samples, big-endian packet.
    FloatBe,
}

/// Bytes per sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleWidth {
    W2,
    W4,
    W8,
}

impl SampleWidth {
    /// Width in bytes.
    pub fn bytes(self) -> usize {
        match self {
            SampleWidth::W2 => 2,
            SampleWidth::W4 => 4,
            SampleWidth::W8 => 8,
        }
    }
}

/// Parsed `data_type` header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataType {
    pub encoding: SampleEncoding,
    pub width: SampleWidth,
}

impl DataType {
    /// Parse the two wire characters of the `data_type` field.
    ///
    /// Fails on unknown characters and on the `f2`/`t2` combination: there is
    /// no 16-bit float sample representation in the format.
    pub fn from_wire(code: [u8; 2]) -> Result<Self> {
        let encoding = match code[0] {
            b'i' => SampleEncoding::IntLe,
            b'f' => SampleEncoding::FloatLe,
            b's' => SampleEncoding::IntBe,
            b't' => SampleEncoding::FloatBe,
            other => {
                return Err(GatewayError::decode(
                    "data_type",
                    format!("unknown sample encoding character {:?}", other as char),
                ));
            }
        };
        let width = match code[1] {
            b'2' => SampleWidth::W2,
            b'4' => SampleWidth::W4,
            b'8' => SampleWidth::W8,
            other => {
                return Err(GatewayError::decode(
                    "data_type",
                    format!("unknown sample width character {:?}", other as char),
                ));
            }
        };
        let data_type = DataType { encoding, width };
        if data_type.is_float() && width == SampleWidth::W2 {
            return Err(GatewayError::decode("data_type", "16-bit float samples are unsupported"));
        }
        Ok(data_type)
    }

    /// The byte order the sender wrote the header and payload in.
    pub fn byte_order(self) -> ByteOrder {
        match self.encoding {
            SampleEncoding::IntLe | SampleEncoding::FloatLe => ByteOrder::Little,
            SampleEncoding::IntBe | SampleEncoding::FloatBe => ByteOrder::Big,
        }
    }

    /// Returns whether samples are IEEE floats rather than integers.
    pub fn is_float(self) -> bool {
        matches!(self.encoding, SampleEncoding::FloatLe | SampleEncoding::FloatBe)
    }

    /// The two wire characters for this variant.
    pub fn code(self) -> [u8; 2] {
        let first = match self.encoding {
            SampleEncoding::IntLe => b'i',
            SampleEncoding::FloatLe => b'f',
            SampleEncoding::IntBe => b's',
            SampleEncoding::FloatBe => b't',
        };
        let second = match self.width {
            SampleWidth::W2 => b'2',
            SampleWidth::W4 => b'4',
            SampleWidth::W8 => b'8',
        };
        [first, second]
    }
}

impl Default for DataType {
    /// Native 32-bit integer samples, matching the host byte order.
    fn default() -> Self {
        let encoding = match ByteOrder::HOST {
            ByteOrder::Little => SampleEncoding::IntLe,
            ByteOrder::Big => SampleEncoding::IntBe,
        };
        DataType { encoding, width: SampleWidth::W4 }
    }
}
