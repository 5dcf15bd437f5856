//! Typed views of the fixed payload layouts.
//!
//! All multi-byte fields are little-endian and bit fields are packed LSB
//! first. Reserved bits and bytes are kept on decode and written back
//! unchanged on encode, so a decode/encode pass over an unmodified payload
//! reproduces it byte for byte.

use bytes::{Buf, BufMut};

use crate::catalog::MessageType;
use crate::error::{FrameError, Result};

/// Battery and charger volts per ADC count.
pub const VOLTS_PER_COUNT: f32 = 0.001_367_19;

pub const MOTOR_COUNT: usize = 4;
pub const CLIFF_SENSOR_COUNT: usize = 4;
pub const MIC_CHANNELS: usize = 4;
pub const MIC_SAMPLES_PER_CHANNEL: usize = 80;
pub const MIC_SAMPLE_COUNT: usize = MIC_CHANNELS * MIC_SAMPLES_PER_CHANNEL;

/// A payload with a fixed wire layout.
pub trait PayloadLayout: Sized {
    /// Exact payload size in bytes.
    const SIZE: usize;
    /// Type code this layout is carried under.
    const MESSAGE_TYPE: MessageType;

    /// Parse from exactly [`SIZE`](Self::SIZE) bytes.
    fn decode(src: &[u8]) -> Result<Self>;

    /// Serialize into exactly [`SIZE`](Self::SIZE) bytes.
    fn encode(&self, dst: &mut [u8]) -> Result<()>;
}

fn check_len(len: usize, expected: usize) -> Result<()> {
    if len != expected {
        return Err(FrameError::PayloadSize {
            size: len,
            expected,
        });
    }
    Ok(())
}

/// Body board acknowledgement carrying a signed result code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ack {
    pub result: i32,
}

impl PayloadLayout for Ack {
    const SIZE: usize = 4;
    const MESSAGE_TYPE: MessageType = MessageType::Ack;

    fn decode(src: &[u8]) -> Result<Self> {
        check_len(src.len(), Self::SIZE)?;
        let mut src = src;
        Ok(Self {
            result: src.get_i32_le(),
        })
    }

    fn encode(&self, dst: &mut [u8]) -> Result<()> {
        check_len(dst.len(), Self::SIZE)?;
        let mut dst = dst;
        dst.put_i32_le(self.result);
        Ok(())
    }
}

/// Fixed 32-byte text field, NUL-terminated when shorter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataCharacter {
    pub text: [u8; 32],
}

impl DataCharacter {
    /// Bytes up to the first NUL, or the whole field if there is none.
    pub fn text(&self) -> &[u8] {
        let end = self
            .text
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.text.len());
        &self.text[..end]
    }
}

impl PayloadLayout for DataCharacter {
    const SIZE: usize = 32;
    const MESSAGE_TYPE: MessageType = MessageType::DataCharacter;

    fn decode(src: &[u8]) -> Result<Self> {
        check_len(src.len(), Self::SIZE)?;
        let mut text = [0u8; 32];
        text.copy_from_slice(src);
        Ok(Self { text })
    }

    fn encode(&self, dst: &mut [u8]) -> Result<()> {
        check_len(dst.len(), Self::SIZE)?;
        dst.copy_from_slice(&self.text);
        Ok(())
    }
}

/// Index into [`BodyDataFrame::motors`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motor {
    LeftWheel = 0,
    RightWheel = 1,
    Lift = 2,
    Head = 3,
}

/// Index into [`BodyDataFrame::cliff_sense`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliffSensor {
    FrontLeft = 0,
    FrontRight = 1,
    BackLeft = 2,
    BackRight = 3,
}

/// Device reported in [`BodyDataFrame::i2c_fault`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cAddress {
    None = 0x00,
    TimeOfFlight = 0x52,
    Cliff = 0xA6,
}

impl I2cAddress {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(I2cAddress::None),
            0x52 => Some(I2cAddress::TimeOfFlight),
            0xA6 => Some(I2cAddress::Cliff),
            _ => None,
        }
    }
}

/// Encoder reading for one motor: 12 bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotorState {
    pub position: i32,
    pub delta: i32,
    pub time: u32,
}

impl MotorState {
    pub const SIZE: usize = 12;

    fn read(src: &mut &[u8]) -> Self {
        Self {
            position: src.get_i32_le(),
            delta: src.get_i32_le(),
            time: src.get_u32_le(),
        }
    }

    fn write(&self, dst: &mut &mut [u8]) {
        dst.put_i32_le(self.position);
        dst.put_i32_le(self.delta);
        dst.put_u32_le(self.time);
    }
}

/// Sensor status bits at offset 4 of the telemetry record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorFlags {
    pub sensors_on: bool,
    pub encoders_off: bool,
    pub head_encoder_changed: bool,
    pub lift_encoder_changed: bool,
    /// Upper four bits, unused.
    pub spare: u8,
}

impl SensorFlags {
    pub fn from_byte(byte: u8) -> Self {
        Self {
            sensors_on: byte & 0x01 != 0,
            encoders_off: byte & 0x02 != 0,
            head_encoder_changed: byte & 0x04 != 0,
            lift_encoder_changed: byte & 0x08 != 0,
            spare: byte >> 4,
        }
    }

    pub fn to_byte(self) -> u8 {
        u8::from(self.sensors_on)
            | u8::from(self.encoders_off) << 1
            | u8::from(self.head_encoder_changed) << 2
            | u8::from(self.lift_encoder_changed) << 3
            | (self.spare & 0x0F) << 4
    }
}

/// Battery condition bits at offset 70 of the telemetry record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatteryFlags {
    pub on_charger: bool,
    pub charging: bool,
    pub disconnected: bool,
    pub overheated: bool,
    pub reserved1: bool,
    pub voltage_low: bool,
    pub shutdown: bool,
    /// Bits 7 to 15, unused.
    pub reserved: u16,
}

impl BatteryFlags {
    pub fn from_bits(bits: u16) -> Self {
        Self {
            on_charger: bits & 0x0001 != 0,
            charging: bits & 0x0002 != 0,
            disconnected: bits & 0x0004 != 0,
            overheated: bits & 0x0008 != 0,
            reserved1: bits & 0x0010 != 0,
            voltage_low: bits & 0x0020 != 0,
            shutdown: bits & 0x0040 != 0,
            reserved: bits >> 7,
        }
    }

    pub fn to_bits(self) -> u16 {
        u16::from(self.on_charger)
            | u16::from(self.charging) << 1
            | u16::from(self.disconnected) << 2
            | u16::from(self.overheated) << 3
            | u16::from(self.reserved1) << 4
            | u16::from(self.voltage_low) << 5
            | u16::from(self.shutdown) << 6
            | (self.reserved & 0x01FF) << 7
    }
}

/// Time-of-flight range sensor block, offsets 76 to 91.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Proximity {
    pub status: u8,
    pub sigma_mm: u8,
    pub range_mm: u16,
    pub signal_rate_mcps: u16,
    pub ambient: u16,
    pub spad_count: u16,
    pub sample_count: u16,
    pub calibration_result: u32,
}

/// The 768-byte body-to-head telemetry record (`dataFrame`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyDataFrame {
    pub sequence: u32,
    pub flags: SensorFlags,
    pub temperature_status: u8,
    pub i2c_fault: u8,
    pub i2c_fault_index: u8,
    pub motors: [MotorState; MOTOR_COUNT],
    pub cliff_sense: [u16; CLIFF_SENSOR_COUNT],
    pub battery_volt: i16,
    pub charger_volt: i16,
    pub temperature: i16,
    pub battery_flags: BatteryFlags,
    pub unknown: u32,
    pub proximity: Proximity,
    pub touch_level: [u16; 2],
    pub mic_error: [u16; 2],
    pub touch_level2: [u16; 2],
    pub reserved: [u8; 24],
    /// Four microphones, 80 samples each, channel-major.
    pub mic_samples: [i16; MIC_SAMPLE_COUNT],
}

impl Default for BodyDataFrame {
    fn default() -> Self {
        Self {
            sequence: 0,
            flags: SensorFlags::default(),
            temperature_status: 0,
            i2c_fault: 0,
            i2c_fault_index: 0,
            motors: [MotorState::default(); MOTOR_COUNT],
            cliff_sense: [0; CLIFF_SENSOR_COUNT],
            battery_volt: 0,
            charger_volt: 0,
            temperature: 0,
            battery_flags: BatteryFlags::default(),
            unknown: 0,
            proximity: Proximity::default(),
            touch_level: [0; 2],
            mic_error: [0; 2],
            touch_level2: [0; 2],
            reserved: [0; 24],
            mic_samples: [0; MIC_SAMPLE_COUNT],
        }
    }
}

impl BodyDataFrame {
    pub fn motor(&self, motor: Motor) -> &MotorState {
        &self.motors[motor as usize]
    }

    pub fn cliff(&self, sensor: CliffSensor) -> u16 {
        self.cliff_sense[sensor as usize]
    }

    pub fn battery_volts(&self) -> f32 {
        f32::from(self.battery_volt) * VOLTS_PER_COUNT
    }

    pub fn charger_volts(&self) -> f32 {
        f32::from(self.charger_volt) * VOLTS_PER_COUNT
    }

    /// Samples for one microphone channel.
    pub fn mic_channel(&self, channel: usize) -> Option<&[i16]> {
        if channel >= MIC_CHANNELS {
            return None;
        }
        let start = channel * MIC_SAMPLES_PER_CHANNEL;
        self.mic_samples.get(start..start + MIC_SAMPLES_PER_CHANNEL)
    }
}

impl PayloadLayout for BodyDataFrame {
    const SIZE: usize = 768;
    const MESSAGE_TYPE: MessageType = MessageType::DataFrame;

    fn decode(src: &[u8]) -> Result<Self> {
        check_len(src.len(), Self::SIZE)?;
        let mut src = src;
        let mut frame = BodyDataFrame {
            sequence: src.get_u32_le(),
            flags: SensorFlags::from_byte(src.get_u8()),
            temperature_status: src.get_u8(),
            i2c_fault: src.get_u8(),
            i2c_fault_index: src.get_u8(),
            ..BodyDataFrame::default()
        };
        for motor in &mut frame.motors {
            *motor = MotorState::read(&mut src);
        }
        for cliff in &mut frame.cliff_sense {
            *cliff = src.get_u16_le();
        }
        frame.battery_volt = src.get_i16_le();
        frame.charger_volt = src.get_i16_le();
        frame.temperature = src.get_i16_le();
        frame.battery_flags = BatteryFlags::from_bits(src.get_u16_le());
        frame.unknown = src.get_u32_le();
        frame.proximity = Proximity {
            status: src.get_u8(),
            sigma_mm: src.get_u8(),
            range_mm: src.get_u16_le(),
            signal_rate_mcps: src.get_u16_le(),
            ambient: src.get_u16_le(),
            spad_count: src.get_u16_le(),
            sample_count: src.get_u16_le(),
            calibration_result: src.get_u32_le(),
        };
        for value in frame
            .touch_level
            .iter_mut()
            .chain(frame.mic_error.iter_mut())
            .chain(frame.touch_level2.iter_mut())
        {
            *value = src.get_u16_le();
        }
        src.copy_to_slice(&mut frame.reserved);
        for sample in &mut frame.mic_samples {
            *sample = src.get_i16_le();
        }
        Ok(frame)
    }

    fn encode(&self, dst: &mut [u8]) -> Result<()> {
        check_len(dst.len(), Self::SIZE)?;
        let mut dst = dst;
        dst.put_u32_le(self.sequence);
        dst.put_u8(self.flags.to_byte());
        dst.put_u8(self.temperature_status);
        dst.put_u8(self.i2c_fault);
        dst.put_u8(self.i2c_fault_index);
        for motor in &self.motors {
            motor.write(&mut dst);
        }
        for cliff in self.cliff_sense {
            dst.put_u16_le(cliff);
        }
        dst.put_i16_le(self.battery_volt);
        dst.put_i16_le(self.charger_volt);
        dst.put_i16_le(self.temperature);
        dst.put_u16_le(self.battery_flags.to_bits());
        dst.put_u32_le(self.unknown);
        let p = &self.proximity;
        dst.put_u8(p.status);
        dst.put_u8(p.sigma_mm);
        dst.put_u16_le(p.range_mm);
        dst.put_u16_le(p.signal_rate_mcps);
        dst.put_u16_le(p.ambient);
        dst.put_u16_le(p.spad_count);
        dst.put_u16_le(p.sample_count);
        dst.put_u32_le(p.calibration_result);
        for value in self
            .touch_level
            .iter()
            .chain(self.mic_error.iter())
            .chain(self.touch_level2.iter())
        {
            dst.put_u16_le(*value);
        }
        dst.put_slice(&self.reserved);
        for sample in self.mic_samples {
            dst.put_i16_le(sample);
        }
        Ok(())
    }
}
