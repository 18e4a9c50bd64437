use crate::error::{Fault, SensorReadError};

pub type Address = [u8; 8];

/// Length of the scratchpad frame, the last byte being the CRC of the rest.
pub const FRAME_LEN: usize = 9;

const FAMILY_DS18B20: u8 = 0x28;
const FAMILY_DS18S20: u8 = 0x10;

/// Dallas/Maxim CRC-8 (poly 0x31, reflected), table driven.
const CRC8_TABLE: [u8; 256] = build_crc8_table();

const fn build_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x01 != 0 {
                (crc >> 1) ^ 0x8C
            } else {
                crc >> 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

pub fn crc8(data: &[u8]) -> u8 {
    data.iter()
        .fold(0u8, |crc, byte| CRC8_TABLE[(crc ^ byte) as usize])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorClass {
    /// 12-bit sensor, 1/16 °C per LSB.
    Ds18b20,
    /// 9-bit sensor, 1/2 °C per LSB.
    Ds18s20,
}

impl SensorClass {
    pub fn from_address(address: &Address) -> Option<Self> {
        match address[0] {
            FAMILY_DS18B20 => Some(Self::Ds18b20),
            FAMILY_DS18S20 => Some(Self::Ds18s20),
            _ => None,
        }
    }

    fn scale(self) -> f64 {
        match self {
            Self::Ds18b20 => 0.0625,
            Self::Ds18s20 => 0.5,
        }
    }

    pub fn decode(self, frame: &[u8; FRAME_LEN]) -> f64 {
        let raw = i16::from_le_bytes([frame[0], frame[1]]);
        f64::from(raw) * self.scale()
    }
}

/// Blocking access to the shared temperature bus. Implementations must not
/// wait for the conversion themselves; the engine schedules that wait.
pub trait SensorBus {
    fn start_conversion(&mut self) -> Result<(), SensorReadError>;
    fn read_scratchpad(&mut self, address: &Address) -> Result<[u8; FRAME_LEN], SensorReadError>;
}

#[derive(Debug, Clone)]
pub struct SensorChannel {
    label: &'static str,
    address: Address,
    class: SensorClass,
    value_c: Option<f64>,
    last_valid_ms: u64,
    error_count: u32,
}

impl SensorChannel {
    pub fn new(label: &'static str, address: Address, now_ms: u64) -> Self {
        Self {
            label,
            address,
            class: SensorClass::from_address(&address).unwrap_or(SensorClass::Ds18b20),
            value_c: None,
            // Counting from boot avoids a timeout alert on the first bad frame.
            last_valid_ms: now_ms,
            error_count: 0,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn class(&self) -> SensorClass {
        self.class
    }

    /// Last value that passed checksum validation.
    pub fn value_c(&self) -> Option<f64> {
        self.value_c
    }

    pub fn last_valid_ms(&self) -> u64 {
        self.last_valid_ms
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Whether the ROM address itself carries a valid CRC.
    pub fn address_valid(&self) -> bool {
        crc8(&self.address[..7]) == self.address[7]
    }
}

/// Sensor labels in bus order: six per boiler, top to bottom.
pub const CHANNEL_LABELS: [&str; 12] = [
    "KSTopH", "KSTopL", "KSMidH", "KSMidL", "KSBotH", "KSBotL", "KWTopH", "KWTopL", "KWMidH",
    "KWMidL", "KWBotH", "KWBotL",
];

pub const CHANNEL_ADDRESSES: [Address; 12] = [
    [0x28, 0xDB, 0xB5, 0x03, 0x00, 0x00, 0x80, 0xBB],
    [0x28, 0x7C, 0xF0, 0x03, 0x00, 0x00, 0x80, 0x59],
    [0x28, 0x72, 0xDB, 0x03, 0x00, 0x00, 0x80, 0xC2],
    [0x28, 0xAA, 0xFB, 0x03, 0x00, 0x00, 0x80, 0x5F],
    [0x28, 0x49, 0xDD, 0x03, 0x00, 0x00, 0x80, 0x4B],
    [0x28, 0xC3, 0xD6, 0x03, 0x00, 0x00, 0x80, 0x1E],
    [0x28, 0x3A, 0xBC, 0x07, 0x00, 0x00, 0x80, 0x58],
    [0x28, 0x72, 0x03, 0x04, 0x00, 0x00, 0x80, 0x24],
    [0x28, 0xD4, 0xE7, 0x03, 0x00, 0x00, 0x80, 0x89],
    [0x28, 0x78, 0xF9, 0x03, 0x00, 0x00, 0x80, 0x76],
    [0x28, 0x70, 0xAD, 0x07, 0x00, 0x00, 0x80, 0x53],
    [0x28, 0x40, 0xE1, 0x03, 0x00, 0x00, 0x80, 0x78],
];

/// Fixed, ordered table of bus channels. The index of a channel never changes.
#[derive(Debug, Clone)]
pub struct SensorTable {
    channels: Vec<SensorChannel>,
    stale_timeout_ms: u64,
}

impl SensorTable {
    pub fn new(stale_timeout_ms: u64, now_ms: u64) -> Self {
        let channels = CHANNEL_LABELS
            .iter()
            .zip(CHANNEL_ADDRESSES.iter())
            .map(|(label, address)| SensorChannel::new(*label, *address, now_ms))
            .collect();
        Self {
            channels,
            stale_timeout_ms,
        }
    }

    pub fn channels(&self) -> &[SensorChannel] {
        &self.channels
    }

    pub fn value_c(&self, index: usize) -> Option<f64> {
        self.channels.get(index).and_then(SensorChannel::value_c)
    }

    /// Six consecutive channel values starting at `first`.
    pub fn block(&self, first: usize) -> [Option<f64>; 6] {
        std::array::from_fn(|offset| self.value_c(first + offset))
    }

    pub fn error_counts(&self) -> Vec<u32> {
        self.channels.iter().map(SensorChannel::error_count).collect()
    }

    /// Validates one frame for channel `index`. A frame that fails the
    /// checksum leaves the published value untouched.
    pub fn ingest(
        &mut self,
        index: usize,
        frame: Result<[u8; FRAME_LEN], SensorReadError>,
        now_ms: u64,
    ) -> Result<f64, Fault> {
        let stale_timeout_ms = self.stale_timeout_ms;
        let Some(channel) = self.channels.get_mut(index) else {
            return Err(Fault::SensorChecksum {
                channel: index,
                label: "unknown",
            });
        };

        let valid = match &frame {
            Ok(frame) => crc8(&frame[..FRAME_LEN - 1]) == frame[FRAME_LEN - 1],
            Err(_) => false,
        };

        match frame {
            Ok(frame) if valid => {
                let value = channel.class.decode(&frame);
                channel.value_c = Some(value);
                channel.last_valid_ms = now_ms;
                Ok(value)
            }
            _ => {
                channel.error_count = channel.error_count.saturating_add(1);
                if now_ms.saturating_sub(channel.last_valid_ms) > stale_timeout_ms {
                    Err(Fault::SensorTimeout {
                        channel: index,
                        label: channel.label,
                    })
                } else {
                    Err(Fault::SensorChecksum {
                        channel: index,
                        label: channel.label,
                    })
                }
            }
        }
    }

    /// Reads every channel in order after a completed conversion.
    pub fn acquire<B: SensorBus + ?Sized>(&mut self, bus: &mut B, now_ms: u64) -> Vec<Fault> {
        let mut faults = Vec::new();
        for index in 0..self.channels.len() {
            let address = self.channels[index].address;
            let frame = bus.read_scratchpad(&address);
            if let Err(fault) = self.ingest(index, frame, now_ms) {
                faults.push(fault);
            }
        }
        faults
    }
}

/// Builds a scratchpad frame with a valid checksum for the given raw reading.
pub fn encode_frame(raw: i16) -> [u8; FRAME_LEN] {
    let [lo, hi] = raw.to_le_bytes();
    let mut frame = [lo, hi, 0x4B, 0x46, 0x7F, 0xFF, 0x0C, 0x10, 0x00];
    frame[FRAME_LEN - 1] = crc8(&frame[..FRAME_LEN - 1]);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedBus {
        frames: Vec<Result<[u8; FRAME_LEN], SensorReadError>>,
        reads: usize,
    }

    impl SensorBus for ScriptedBus {
        fn start_conversion(&mut self) -> Result<(), SensorReadError> {
            Ok(())
        }

        fn read_scratchpad(
            &mut self,
            _address: &Address,
        ) -> Result<[u8; FRAME_LEN], SensorReadError> {
            let frame = self.frames[self.reads % self.frames.len()].clone();
            self.reads += 1;
            frame
        }
    }

    #[test]
    fn crc8_matches_maxim_check_value() {
        assert_eq!(crc8(b"123456789"), 0xA1);
        assert_eq!(crc8(&[]), 0);
    }

    #[test]
    fn valid_frame_updates_value_and_timestamp() {
        let mut table = SensorTable::new(3_600_000, 0);
        // 0x0191 = 401 * 0.0625 = 25.0625 C
        let value = table.ingest(3, Ok(encode_frame(0x0191)), 5_000).unwrap();

        assert_eq!(value, 25.0625);
        assert_eq!(table.value_c(3), Some(25.0625));
        assert_eq!(table.channels()[3].last_valid_ms(), 5_000);
    }

    #[test]
    fn negative_readings_decode_with_sign() {
        let mut table = SensorTable::new(3_600_000, 0);
        let value = table.ingest(0, Ok(encode_frame(-160)), 1_000).unwrap();
        assert_eq!(value, -10.0);
    }

    #[test]
    fn corrupted_checksum_keeps_value_and_counts_once() {
        let mut table = SensorTable::new(3_600_000, 0);
        table.ingest(1, Ok(encode_frame(800)), 1_000).unwrap();

        let mut frame = encode_frame(900);
        frame[FRAME_LEN - 1] ^= 0xFF;
        let result = table.ingest(1, Ok(frame), 2_000);

        assert!(matches!(result, Err(Fault::SensorChecksum { channel: 1, .. })));
        assert_eq!(table.value_c(1), Some(50.0));
        assert_eq!(table.channels()[1].error_count(), 1);
        assert_eq!(table.channels()[1].last_valid_ms(), 1_000);
    }

    #[test]
    fn read_failure_counts_as_bad_reading() {
        let mut table = SensorTable::new(3_600_000, 0);
        let result = table.ingest(2, Err(SensorReadError::NoPresence), 10);

        assert!(matches!(result, Err(Fault::SensorChecksum { channel: 2, .. })));
        assert_eq!(table.value_c(2), None);
    }

    #[test]
    fn stale_channel_raises_timeout_not_bad_reading() {
        let mut table = SensorTable::new(3_600_000, 0);
        table.ingest(4, Ok(encode_frame(640)), 1_000).unwrap();

        let mut frame = encode_frame(640);
        frame[0] ^= 0x01;

        let at_limit = table.ingest(4, Ok(frame), 3_601_000);
        assert!(matches!(at_limit, Err(Fault::SensorChecksum { .. })));

        let beyond = table.ingest(4, Ok(frame), 3_601_001);
        assert!(matches!(
            beyond,
            Err(Fault::SensorTimeout {
                channel: 4,
                label: "KSBotH"
            })
        ));
        assert_eq!(table.value_c(4), Some(40.0));
    }

    #[test]
    fn acquire_reads_channels_in_order_and_reports_faults() {
        let mut table = SensorTable::new(3_600_000, 0);
        let mut bad = encode_frame(0);
        bad[FRAME_LEN - 1] ^= 0x55;
        let mut bus = ScriptedBus {
            frames: vec![Ok(encode_frame(480)), Ok(bad)],
            reads: 0,
        };

        let faults = table.acquire(&mut bus, 1_000);

        assert_eq!(bus.reads, 12);
        assert_eq!(faults.len(), 6);
        assert_eq!(table.value_c(0), Some(30.0));
        assert_eq!(table.value_c(1), None);
        assert_eq!(table.error_counts(), vec![0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn class_follows_family_code() {
        assert_eq!(
            SensorClass::from_address(&CHANNEL_ADDRESSES[0]),
            Some(SensorClass::Ds18b20)
        );
        assert_eq!(
            SensorClass::from_address(&[0x10, 0, 0, 0, 0, 0, 0, 0]),
            Some(SensorClass::Ds18s20)
        );
        assert_eq!(SensorClass::Ds18s20.decode(&encode_frame(50)), 25.0);
    }
}
