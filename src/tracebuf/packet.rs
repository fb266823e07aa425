//! TraceBuf2 packet parsing and field access.
//!
//! A TraceBuf2 message is a 64-byte fixed-offset header followed by an opaque
//! sample payload. The header is written in the *sender's* byte order, which
//! the `data_type` field self-describes (see [`DataType`]). The decoder
//! parses the logical header fields and retains the received bytes verbatim,
//! because publication must re-emit the exact wire image.
//!
//! ## Wire layout
//!
//! | Bytes  | Field         | Type                          |
//! |--------|---------------|-------------------------------|
//! | 0–3    | pin number    | i32                           |
//! | 4–7    | n_samples     | i32                           |
//! | 8–15   | start_time    | f64, seconds since the epoch  |
//! | 16–23  | end_time      | f64, ignored and recomputed   |
//! | 24–31  | sampling_rate | f64, Hz                       |
//! | 32–38  | station       | NUL-terminated, max 6 chars   |
//! | 39–47  | network       | NUL-terminated, max 8 chars   |
//! | 48–51  | channel       | NUL-terminated, max 3 chars   |
//! | 52–54  | location      | NUL-terminated, max 2 chars   |
//! | 55–56  | version       | two chars                     |
//! | 57–59  | data_type     | two chars plus a pad byte     |
//! | 60–61  | quality       | i16 bitmask                   |
//! | 62–63  | pad           | unused                        |
//! | 64–    | samples       | opaque                        |

use crate::tracebuf::{ByteOrder, DataType};
use crate::{GatewayError, Result};

/// Largest message the transport will carry, header included.
pub const MAX_TRACEBUF_SIZE: usize = 4096;

/// Fixed header length preceding the sample payload.
pub const HEADER_SIZE: usize = 64;

const PIN_OFFSET: usize = 0;
const NSAMP_OFFSET: usize = 4;
const START_TIME_OFFSET: usize = 8;
const SAMPLING_RATE_OFFSET: usize = 24;
const STATION_OFFSET: usize = 32;
const NETWORK_OFFSET: usize = 39;
const CHANNEL_OFFSET: usize = 48;
const LOCATION_OFFSET: usize = 52;
const VERSION_OFFSET: usize = 55;
const DATA_TYPE_OFFSET: usize = 57;
const QUALITY_OFFSET: usize = 60;

const STATION_WINDOW: usize = 7;
const NETWORK_WINDOW: usize = 9;
const CHANNEL_WINDOW: usize = 4;
const LOCATION_WINDOW: usize = 3;

/// One contiguous run of samples for one channel, plus the wire image it
/// arrived in.
///
/// The raw buffer is a fixed-size inline array so that no per-packet heap
/// allocation is needed for it; decoded header fields live alongside it.
/// `end_time` is never read off the wire — it is recomputed from start time,
/// sample count, and sampling rate, and every setter that touches one of
/// those keeps it coherent.
#[derive(Clone)]
pub struct TraceBuf2 {
    raw: [u8; MAX_TRACEBUF_SIZE],
    raw_len: usize,
    network: String,
    station: String,
    channel: String,
    location: String,
    version: String,
    data_type: DataType,
    start_time: f64,
    end_time: f64,
    sampling_rate: f64,
    n_samples: i32,
    pin_number: i32,
    quality: i16,
}

impl Default for TraceBuf2 {
    fn default() -> Self {
        Self {
            raw: [0; MAX_TRACEBUF_SIZE],
            raw_len: 0,
            network: String::new(),
            station: String::new(),
            channel: String::new(),
            location: String::new(),
            version: "20".to_string(),
            data_type: DataType::default(),
            start_time: 0.0,
            end_time: 0.0,
            sampling_rate: 0.0,
            n_samples: 0,
            pin_number: 0,
            quality: 0,
        }
    }
}

impl std::fmt::Debug for TraceBuf2 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceBuf2")
            .field("channel", &self.channel_name())
            .field("start_time", &self.start_time)
            .field("sampling_rate", &self.sampling_rate)
            .field("n_samples", &self.n_samples)
            .field("pin_number", &self.pin_number)
            .field("data_type", &self.data_type)
            .field("quality", &self.quality)
            .field("message_length", &self.raw_len)
            .finish()
    }
}

impl TraceBuf2 {
    pub const MAX_NETWORK_LEN: usize = 8;
    pub const MAX_STATION_LEN: usize = 6;
    pub const MAX_CHANNEL_LEN: usize = 3;
    pub const MAX_LOCATION_LEN: usize = 2;

    // Header quality bits.
    pub const AMPLIFIER_SATURATED: i16 = 0x01;
    pub const DIGITIZER_CLIPPED: i16 = 0x02;
    pub const SPIKES_DETECTED: i16 = 0x04;
    pub const GLITCHES_DETECTED: i16 = 0x08;
    pub const MISSING_DATA_PRESENT: i16 = 0x10;
    pub const TELEMETRY_SYNCH_ERROR: i16 = 0x20;
    pub const FILTER_CHARGING: i16 = 0x40;
    pub const TIME_TAG_QUESTIONABLE: i16 = 0x80;

    /// Decode a TraceBuf2 message as received from a ring.
    ///
    /// `bytes` must be the full message as reported by the transport,
    /// header included. The sender's byte order is taken from the
    /// `data_type` field; the sample payload is not materialized, only the
    /// header is parsed. The received bytes are retained verbatim for
    /// re-emission, zero-padded up to [`MAX_TRACEBUF_SIZE`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(GatewayError::decode(
                "header",
                format!("message is {} bytes, need at least {}", bytes.len(), HEADER_SIZE),
            ));
        }
        let data_type =
            DataType::from_wire([bytes[DATA_TYPE_OFFSET], bytes[DATA_TYPE_OFFSET + 1]])?;
        let order = data_type.byte_order();

        let pin_number = read_i32(bytes, PIN_OFFSET, order)?;
        let n_samples = read_i32(bytes, NSAMP_OFFSET, order)?;
        let start_time = read_f64(bytes, START_TIME_OFFSET, order)?;
        let sampling_rate = read_f64(bytes, SAMPLING_RATE_OFFSET, order)?;
        let quality = read_i16(bytes, QUALITY_OFFSET, order)?;

        let mut packet = TraceBuf2 { data_type, ..Default::default() };
        packet.set_station(&field_string(&bytes[STATION_OFFSET..STATION_OFFSET + STATION_WINDOW]));
        packet.set_network(&field_string(&bytes[NETWORK_OFFSET..NETWORK_OFFSET + NETWORK_WINDOW]));
        packet.set_channel(&field_string(&bytes[CHANNEL_OFFSET..CHANNEL_OFFSET + CHANNEL_WINDOW]));
        packet.set_location(&field_string(
            &bytes[LOCATION_OFFSET..LOCATION_OFFSET + LOCATION_WINDOW],
        ));
        packet.version =
            String::from_utf8_lossy(&bytes[VERSION_OFFSET..VERSION_OFFSET + 2]).into_owned();
        packet.set_pin_number(pin_number);
        packet.set_quality(quality);
        packet.set_n_samples(n_samples)?;
        packet.set_start_time(start_time);
        packet.set_sampling_rate(sampling_rate)?;
        packet.set_raw(bytes)?;
        Ok(packet)
    }

    /// Store a wire image, zero-padding the tail of the inline buffer.
    pub fn set_raw(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() > MAX_TRACEBUF_SIZE {
            return Err(GatewayError::invalid_argument(format!(
                "message is {} bytes, maximum is {}",
                bytes.len(),
                MAX_TRACEBUF_SIZE
            )));
        }
        self.raw[..bytes.len()].copy_from_slice(bytes);
        self.raw[bytes.len()..].fill(0);
        self.raw_len = bytes.len();
        Ok(())
    }

    /// The received bytes, exactly as long as the transport reported them.
    pub fn raw(&self) -> &[u8] {
        &self.raw[..self.raw_len]
    }

    /// The full inline buffer: the received bytes followed by zero padding.
    pub fn padded(&self) -> &[u8; MAX_TRACEBUF_SIZE] {
        &self.raw
    }

    /// Length of the message as reported by the transport on read.
    pub fn message_length(&self) -> usize {
        self.raw_len
    }

    /// Canonical channel identifier: `NET.STA.CHA`, with `.LOC` appended
    /// when the location code is non-empty.
    pub fn channel_name(&self) -> String {
        let mut name =
            format!("{}.{}.{}", self.network, self.station, self.channel);
        if !self.location.is_empty() {
            name.push('.');
            name.push_str(&self.location);
        }
        name
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn set_network(&mut self, network: &str) {
        self.network = truncated(network, Self::MAX_NETWORK_LEN);
    }

    pub fn station(&self) -> &str {
        &self.station
    }

    pub fn set_station(&mut self, station: &str) {
        self.station = truncated(station, Self::MAX_STATION_LEN);
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn set_channel(&mut self, channel: &str) {
        self.channel = truncated(channel, Self::MAX_CHANNEL_LEN);
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn set_location(&mut self, location: &str) {
        self.location = truncated(location, Self::MAX_LOCATION_LEN);
    }

    /// Format version tag, `"20"` unless the sender said otherwise.
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// UTC time of the first sample, seconds since the epoch.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn set_start_time(&mut self, start_time: f64) {
        self.start_time = start_time;
        self.update_end_time();
    }

    /// UTC time of the last sample.
    ///
    /// Fails with a precondition error until the sampling rate is set and
    /// the packet holds at least one sample.
    pub fn end_time(&self) -> Result<f64> {
        if !self.have_sampling_rate() {
            return Err(GatewayError::NotSet { field: "sampling rate" });
        }
        if self.n_samples < 1 {
            return Err(GatewayError::NotSet { field: "samples" });
        }
        Ok(self.end_time)
    }

    /// Sampling rate in Hz. Fails with a precondition error until set.
    pub fn sampling_rate(&self) -> Result<f64> {
        if !self.have_sampling_rate() {
            return Err(GatewayError::NotSet { field: "sampling rate" });
        }
        Ok(self.sampling_rate)
    }

    pub fn have_sampling_rate(&self) -> bool {
        self.sampling_rate > 0.0
    }

    /// Set the sampling rate. Must be strictly positive.
    pub fn set_sampling_rate(&mut self, sampling_rate: f64) -> Result<()> {
        if !(sampling_rate > 0.0) {
            return Err(GatewayError::invalid_argument(format!(
                "sampling rate {sampling_rate} must be positive"
            )));
        }
        self.sampling_rate = sampling_rate;
        self.update_end_time();
        Ok(())
    }

    pub fn n_samples(&self) -> i32 {
        self.n_samples
    }

    /// Set the sample count. Must be non-negative.
    pub fn set_n_samples(&mut self, n_samples: i32) -> Result<()> {
        if n_samples < 0 {
            return Err(GatewayError::invalid_argument(format!(
                "sample count {n_samples} must be non-negative"
            )));
        }
        self.n_samples = n_samples;
        self.update_end_time();
        Ok(())
    }

    pub fn pin_number(&self) -> i32 {
        self.pin_number
    }

    pub fn set_pin_number(&mut self, pin_number: i32) {
        self.pin_number = pin_number;
    }

    pub fn quality(&self) -> i16 {
        self.quality
    }

    pub fn set_quality(&mut self, quality: i16) {
        self.quality = quality;
    }

    /// Test a quality bit, e.g. [`TraceBuf2::MISSING_DATA_PRESENT`].
    pub fn has_quality_flag(&self, flag: i16) -> bool {
        self.quality & flag != 0
    }

    fn update_end_time(&mut self) {
        self.end_time = self.start_time;
        if self.n_samples > 0 && self.sampling_rate > 0.0 {
            self.end_time =
                self.start_time + f64::from(self.n_samples - 1) / self.sampling_rate;
        }
    }
}

/// Byte parsing helpers with bounds checking. The wire order comes from the
/// packet's `data_type` field, so these take it as a parameter instead of
/// hard-coding one endianness.
fn read_i32(data: &[u8], offset: usize, order: ByteOrder) -> Result<i32> {
    let bytes = field_bytes::<4>(data, offset, "i32")?;
    Ok(match order {
        ByteOrder::Little => i32::from_le_bytes(bytes),
        ByteOrder::Big => i32::from_be_bytes(bytes),
    })
}

fn read_i16(data: &[u8], offset: usize, order: ByteOrder) -> Result<i16> {
    let bytes = field_bytes::<2>(data, offset, "i16")?;
    Ok(match order {
        ByteOrder::Little => i16::from_le_bytes(bytes),
        ByteOrder::Big => i16::from_be_bytes(bytes),
    })
}

fn read_f64(data: &[u8], offset: usize, order: ByteOrder) -> Result<f64> {
    let bytes = field_bytes::<8>(data, offset, "f64")?;
    Ok(match order {
        ByteOrder::Little => f64::from_le_bytes(bytes),
        ByteOrder::Big => f64::from_be_bytes(bytes),
    })
}

fn field_bytes<const N: usize>(data: &[u8], offset: usize, kind: &str) -> Result<[u8; N]> {
    let end = offset + N;
    let slice = data.get(offset..end).ok_or_else(|| {
        GatewayError::decode(
            "header",
            format!("insufficient data for {kind} at offset {offset} (need {N} bytes)"),
        )
    })?;
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(slice);
    Ok(bytes)
}

/// Extract a NUL-terminated string from its header window.
fn field_string(window: &[u8]) -> String {
    let nul = window.iter().position(|&b| b == 0).unwrap_or(window.len());
    String::from_utf8_lossy(&window[..nul]).into_owned()
}

fn truncated(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracebuf::SampleEncoding;
    use proptest::prelude::*;

    /// Build a wire message in the given order with an `n_bytes`-long payload
    /// of incrementing bytes.
    fn build_message(
        code: &[u8; 2],
        pin: i32,
        n_samples: i32,
        start: f64,
        rate: f64,
        net: &str,
        sta: &str,
        cha: &str,
        loc: &str,
        payload_len: usize,
    ) -> Vec<u8> {
        let big = matches!(code[0], b's' | b't');
        let mut message = vec![0u8; HEADER_SIZE + payload_len];
        let put_i32 = |buf: &mut [u8], offset: usize, value: i32| {
            let bytes = if big { value.to_be_bytes() } else { value.to_le_bytes() };
            buf[offset..offset + 4].copy_from_slice(&bytes);
        };
        let put_f64 = |buf: &mut [u8], offset: usize, value: f64| {
            let bytes = if big { value.to_be_bytes() } else { value.to_le_bytes() };
            buf[offset..offset + 8].copy_from_slice(&bytes);
        };
        put_i32(&mut message, PIN_OFFSET, pin);
        put_i32(&mut message, NSAMP_OFFSET, n_samples);
        put_f64(&mut message, START_TIME_OFFSET, start);
        // A bogus wire end time: the decoder must ignore it.
        put_f64(&mut message, 16, -1.0);
        put_f64(&mut message, SAMPLING_RATE_OFFSET, rate);
        message[STATION_OFFSET..STATION_OFFSET + sta.len()].copy_from_slice(sta.as_bytes());
        message[NETWORK_OFFSET..NETWORK_OFFSET + net.len()].copy_from_slice(net.as_bytes());
        message[CHANNEL_OFFSET..CHANNEL_OFFSET + cha.len()].copy_from_slice(cha.as_bytes());
        message[LOCATION_OFFSET..LOCATION_OFFSET + loc.len()].copy_from_slice(loc.as_bytes());
        message[VERSION_OFFSET..VERSION_OFFSET + 2].copy_from_slice(b"20");
        message[DATA_TYPE_OFFSET..DATA_TYPE_OFFSET + 2].copy_from_slice(code);
        let quality = if big { 0x10i16.to_be_bytes() } else { 0x10i16.to_le_bytes() };
        message[QUALITY_OFFSET..QUALITY_OFFSET + 2].copy_from_slice(&quality);
        for (i, byte) in message[HEADER_SIZE..].iter_mut().enumerate() {
            *byte = i as u8;
        }
        message
    }

    #[test]
    fn decodes_little_endian_message() {
        let message = build_message(
            b"i4",
            17,
            100,
            1_700_000_000.0,
            100.0,
            "UU",
            "MPU",
            "HHZ",
            "",
            400,
        );
        let packet = TraceBuf2::decode(&message).unwrap();
        assert_eq!(packet.pin_number(), 17);
        assert_eq!(packet.n_samples(), 100);
        assert_eq!(packet.start_time(), 1_700_000_000.0);
        assert_eq!(packet.sampling_rate().unwrap(), 100.0);
        assert_eq!(packet.network(), "UU");
        assert_eq!(packet.station(), "MPU");
        assert_eq!(packet.channel(), "HHZ");
        assert_eq!(packet.location(), "");
        assert_eq!(packet.version(), "20");
        assert_eq!(packet.channel_name(), "UU.MPU.HHZ");
        assert!(packet.has_quality_flag(TraceBuf2::MISSING_DATA_PRESENT));
        assert!(!packet.has_quality_flag(TraceBuf2::DIGITIZER_CLIPPED));
        assert_eq!(packet.message_length(), message.len());
    }

    #[test]
    fn decodes_big_endian_message() {
        let message = build_message(
            b"s4",
            3,
            200,
            1_700_000_000.5,
            40.0,
            "UW",
            "OSD",
            "EHZ",
            "01",
            800,
        );
        let packet = TraceBuf2::decode(&message).unwrap();
        assert_eq!(packet.data_type().encoding, SampleEncoding::IntBe);
        assert_eq!(packet.pin_number(), 3);
        assert_eq!(packet.n_samples(), 200);
        assert_eq!(packet.start_time(), 1_700_000_000.5);
        assert_eq!(packet.sampling_rate().unwrap(), 40.0);
        assert_eq!(packet.channel_name(), "UW.OSD.EHZ.01");
    }

    #[test]
    fn end_time_ignores_wire_value() {
        let message =
            build_message(b"i4", 0, 100, 1_700_000_000.0, 100.0, "UU", "MPU", "HHZ", "", 400);
        let packet = TraceBuf2::decode(&message).unwrap();
        // 99 samples after the first at 100 Hz.
        assert_eq!(packet.end_time().unwrap(), 1_700_000_000.0 + 99.0 / 100.0);
    }

    #[test]
    fn raw_bytes_are_retained_and_padded() {
        let message =
            build_message(b"i4", 0, 10, 1_700_000_000.0, 100.0, "UU", "MPU", "HHZ", "", 40);
        let packet = TraceBuf2::decode(&message).unwrap();
        assert_eq!(packet.raw(), &message[..]);
        assert!(packet.padded()[message.len()..].iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_short_messages() {
        let message = vec![0u8; HEADER_SIZE - 1];
        assert!(TraceBuf2::decode(&message).is_err());
    }

    #[test]
    fn rejects_unsupported_data_types() {
        let mut message =
            build_message(b"i4", 0, 10, 1_700_000_000.0, 100.0, "UU", "MPU", "HHZ", "", 0);
        message[DATA_TYPE_OFFSET] = b'x';
        assert!(TraceBuf2::decode(&message).is_err());
        message[DATA_TYPE_OFFSET] = b'f';
        message[DATA_TYPE_OFFSET + 1] = b'2';
        assert!(TraceBuf2::decode(&message).is_err());
    }

    #[test]
    fn rejects_negative_sample_count() {
        let message =
            build_message(b"i4", 0, -5, 1_700_000_000.0, 100.0, "UU", "MPU", "HHZ", "", 0);
        assert!(TraceBuf2::decode(&message).is_err());
    }

    #[test]
    fn rejects_non_positive_sampling_rate() {
        let message = build_message(b"i4", 0, 10, 1_700_000_000.0, 0.0, "UU", "MPU", "HHZ", "", 0);
        assert!(TraceBuf2::decode(&message).is_err());
        let message =
            build_message(b"i4", 0, 10, 1_700_000_000.0, -50.0, "UU", "MPU", "HHZ", "", 0);
        assert!(TraceBuf2::decode(&message).is_err());
    }

    #[test]
    fn setters_enforce_contracts() {
        let mut packet = TraceBuf2::default();
        assert!(packet.set_sampling_rate(0.0).is_err());
        assert!(packet.set_sampling_rate(f64::NAN).is_err());
        assert!(packet.set_n_samples(-1).is_err());
        assert!(packet.sampling_rate().is_err());
        assert!(packet.end_time().is_err());

        packet.set_sampling_rate(100.0).unwrap();
        assert_eq!(packet.sampling_rate().unwrap(), 100.0);
        // Still no samples, so no end time.
        assert!(packet.end_time().is_err());
        packet.set_n_samples(100).unwrap();
        packet.set_start_time(10.0);
        assert_eq!(packet.end_time().unwrap(), 10.0 + 99.0 / 100.0);
    }

    #[test]
    fn string_setters_truncate() {
        let mut packet = TraceBuf2::default();
        packet.set_network("ABCDEFGHIJ");
        packet.set_station("ABCDEFGHIJ");
        packet.set_channel("ABCDEFGHIJ");
        packet.set_location("ABCDEFGHIJ");
        assert_eq!(packet.network(), "ABCDEFGH");
        assert_eq!(packet.station(), "ABCDEF");
        assert_eq!(packet.channel(), "ABC");
        assert_eq!(packet.location(), "AB");
    }

    #[test]
    fn oversized_raw_message_is_rejected() {
        let mut packet = TraceBuf2::default();
        let too_big = vec![0u8; MAX_TRACEBUF_SIZE + 1];
        assert!(packet.set_raw(&too_big).is_err());
    }

    proptest! {
        #[test]
        fn decode_preserves_wire_image(
            pin in any::<i32>(),
            n_samples in 1..1000i32,
            start in 0.0..2_000_000_000.0f64,
            rate in 1.0..1000.0f64,
            payload_len in 0..1024usize,
            big in any::<bool>(),
        ) {
            let code = if big { b"s4" } else { b"i4" };
            let message = build_message(
                code, pin, n_samples, start, rate, "UU", "MPU", "HHZ", "01", payload_len,
            );
            let packet = TraceBuf2::decode(&message).unwrap();
            // Raw-byte fidelity: the first L bytes are the wire image,
            // everything after is zero.
            prop_assert_eq!(packet.raw(), &message[..]);
            prop_assert!(packet.padded()[message.len()..].iter().all(|&b| b == 0));
            prop_assert_eq!(packet.pin_number(), pin);
            prop_assert_eq!(packet.n_samples(), n_samples);
        }

        #[test]
        fn end_time_stays_coherent(
            n_samples in 1..100_000i32,
            start in -1.0e9..2.0e9f64,
            rate in 0.01..10_000.0f64,
        ) {
            let mut packet = TraceBuf2::default();
            packet.set_n_samples(n_samples).unwrap();
            packet.set_sampling_rate(rate).unwrap();
            packet.set_start_time(start);
            let expected = start + f64::from(n_samples - 1) / rate;
            prop_assert_eq!(packet.end_time().unwrap(), expected);
        }
    }
}
