//! Keyframe curve encodings used by animation chunks.
//!
//! Every curve format fixes three things: whether frames are stored per key (as `i32`, or `i16`
//! for [`EAnmCurveFormat::Vector3I16Linear`]) or synthesized as `index * frame_size`, the storage
//! type of the value components, and the divisor quantized components are scaled by.
use anyhow::Result;
use binrw::binrw;
use serde_derive::Serialize;
use strum::{Display, FromRepr};

use crate::{error::XfbinError, util::binary::BinaryCursor};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, FromRepr, Display, Serialize)]
#[repr(u16)]
pub enum EAnmCurveFormat {
    #[strum(serialize = "VECTOR3FIXED")]
    Vector3Fixed = 0x05,
    #[strum(serialize = "VECTOR3LINEAR")]
    Vector3Linear = 0x06,
    #[strum(serialize = "VECTOR3BEZIER")]
    Vector3Bezier = 0x07,
    #[strum(serialize = "EULERXYZFIXED")]
    EulerXyzFixed = 0x08,
    #[strum(serialize = "EULERINTERPOLATE")]
    EulerInterpolate = 0x09,
    #[strum(serialize = "QUATERNIONLINEAR")]
    QuaternionLinear = 0x0A,
    #[strum(serialize = "FLOATFIXED")]
    FloatFixed = 0x0B,
    #[strum(serialize = "FLOATLINEAR")]
    FloatLinear = 0x0C,
    #[strum(serialize = "VECTOR2FIXED")]
    Vector2Fixed = 0x0D,
    #[strum(serialize = "VECTOR2LINEAR")]
    Vector2Linear = 0x0E,
    #[strum(serialize = "OPACITYSHORTTBL")]
    OpacityShortTbl = 0x0F,
    #[strum(serialize = "SCALESHORTTBL")]
    ScaleShortTbl = 0x10,
    #[strum(serialize = "QUATERNIONSHORTTBL")]
    QuaternionShortTbl = 0x11,
    #[strum(serialize = "COLORRGBTBL")]
    ColorRgbTbl = 0x14,
    #[strum(serialize = "VECTOR3TBL")]
    Vector3Tbl = 0x15,
    #[strum(serialize = "FLOATTBL")]
    FloatTbl = 0x16,
    #[strum(serialize = "QUATERNIONTBL")]
    QuaternionTbl = 0x17,
    #[strum(serialize = "FLOATTBLNOINTERP")]
    FloatTblNoInterp = 0x18,
    #[strum(serialize = "VECTOR3I16LINEAR")]
    Vector3I16Linear = 0x19,
    #[strum(serialize = "VECTOR3TBLNOINTERP")]
    Vector3TblNoInterp = 0x1A,
    #[strum(serialize = "QUATERNIONSHORTTBLNOINTERP")]
    QuaternionShortTblNoInterp = 0x1B,
    #[strum(serialize = "OPACITYSHORTTBLNOINTERP")]
    OpacityShortTblNoInterp = 0x1D,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameStorage {
    /// Frame is `index * frame_size`.
    Implicit,
    I32,
    I16,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ValueStorage {
    F32,
    I16,
    U8,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CurveLayout {
    pub frames: FrameStorage,
    pub values: ValueStorage,
    pub components: usize,
    /// Stored integer = value * divisor.
    pub divisor: f32,
}

const K_DIV_UNIT: f32 = 0x8000 as f32;
const K_DIV_SCALE: f32 = 0x1000 as f32;
const K_DIV_COLOR: f32 = 0xFF as f32;

impl EAnmCurveFormat {
    pub fn from_u16(value: u16) -> Result<Self> {
        Self::from_repr(value)
            .ok_or_else(|| XfbinError::unsupported("curve format", format!("{value:#x}")).into())
    }

    pub fn layout(self) -> CurveLayout {
        use EAnmCurveFormat::*;
        let (frames, values, components, divisor) = match self {
            Vector3Fixed | EulerXyzFixed | Vector3Tbl | Vector3TblNoInterp => {
                (FrameStorage::Implicit, ValueStorage::F32, 3, 1.0)
            }
            Vector3Linear | Vector3Bezier | EulerInterpolate => {
                (FrameStorage::I32, ValueStorage::F32, 3, 1.0)
            }
            QuaternionLinear => (FrameStorage::I32, ValueStorage::F32, 4, 1.0),
            QuaternionTbl => (FrameStorage::Implicit, ValueStorage::F32, 4, 1.0),
            FloatFixed | FloatTbl | FloatTblNoInterp => {
                (FrameStorage::Implicit, ValueStorage::F32, 1, 1.0)
            }
            FloatLinear => (FrameStorage::I32, ValueStorage::F32, 1, 1.0),
            Vector2Fixed => (FrameStorage::Implicit, ValueStorage::F32, 2, 1.0),
            Vector2Linear => (FrameStorage::I32, ValueStorage::F32, 2, 1.0),
            OpacityShortTbl | OpacityShortTblNoInterp => {
                (FrameStorage::Implicit, ValueStorage::I16, 1, K_DIV_UNIT)
            }
            ScaleShortTbl => (FrameStorage::Implicit, ValueStorage::I16, 3, K_DIV_SCALE),
            QuaternionShortTbl | QuaternionShortTblNoInterp => {
                (FrameStorage::Implicit, ValueStorage::I16, 4, K_DIV_UNIT)
            }
            ColorRgbTbl => (FrameStorage::Implicit, ValueStorage::U8, 3, K_DIV_COLOR),
            Vector3I16Linear => (FrameStorage::I16, ValueStorage::I16, 3, K_DIV_UNIT),
        };
        CurveLayout { frames, values, components, divisor }
    }

    #[inline]
    pub fn has_explicit_frames(self) -> bool { self.layout().frames != FrameStorage::Implicit }
}

/// One decoded keyframe value.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
}

impl Value {
    pub fn components(&self) -> &[f32] {
        match self {
            Value::Scalar(v) => std::slice::from_ref(v),
            Value::Vec2(v) => v,
            Value::Vec3(v) => v,
            Value::Vec4(v) => v,
        }
    }

    pub fn from_components(c: &[f32]) -> Option<Self> {
        match *c {
            [x] => Some(Value::Scalar(x)),
            [x, y] => Some(Value::Vec2([x, y])),
            [x, y, z] => Some(Value::Vec3([x, y, z])),
            [x, y, z, w] => Some(Value::Vec4([x, y, z, w])),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct Sample {
    pub frame: i32,
    pub value: Value,
}

/// Stored components of every key, flattened.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum CurveValues {
    F32(Vec<f32>),
    I16(Vec<i16>),
    U8(Vec<u8>),
}

impl CurveValues {
    pub fn len(&self) -> usize {
        match self {
            CurveValues::F32(v) => v.len(),
            CurveValues::I16(v) => v.len(),
            CurveValues::U8(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn storage(&self) -> ValueStorage {
        match self {
            CurveValues::F32(_) => ValueStorage::F32,
            CurveValues::I16(_) => ValueStorage::I16,
            CurveValues::U8(_) => ValueStorage::U8,
        }
    }

    fn dequantize(&self, i: usize, divisor: f32) -> f32 {
        match self {
            CurveValues::F32(v) => v[i],
            CurveValues::I16(v) => v[i] as f32 / divisor,
            CurveValues::U8(v) => v[i] as f32 / divisor,
        }
    }
}

/// Frame of key `key` in a fixed-interval curve.
pub fn fixed_frame(key: usize, frame_size: u32) -> Result<i32> {
    i32::try_from(key as i64 * frame_size as i64).map_err(|_| {
        XfbinError::Value(format!("key {key} at frame size {frame_size} overflows a frame"))
            .into()
    })
}

pub fn quantize_i16(value: f32, divisor: f32) -> i16 {
    (value * divisor).round().clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

pub fn quantize_u8(value: f32, divisor: f32) -> u8 {
    (value * divisor).round().clamp(0.0, u8::MAX as f32) as u8
}

#[binrw]
#[derive(Copy, Clone, Debug, Default)]
pub struct SAnmCurveHeader {
    pub index: u16,
    pub format: u16,
    pub key_count: u16,
    pub flags: i16,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnmCurve {
    /// Target property within the owning entry.
    pub index: u16,
    pub format: EAnmCurveFormat,
    pub flags: i16,
    /// Stored frame numbers; empty for implicit-frame formats.
    pub frames: Vec<i32>,
    pub values: CurveValues,
}

impl AnmCurve {
    pub fn new(
        index: u16,
        format: EAnmCurveFormat,
        frames: Vec<i32>,
        values: CurveValues,
    ) -> Result<Self> {
        let curve = Self { index, format, flags: 0, frames, values };
        curve.validate()?;
        Ok(curve)
    }

    fn validate(&self) -> Result<()> {
        let layout = self.format.layout();
        if self.values.storage() != layout.values {
            return Err(XfbinError::Value(format!(
                "{} stores {:?} components, got {:?}",
                self.format,
                layout.values,
                self.values.storage()
            ))
            .into());
        }
        if self.values.len() % layout.components != 0 {
            return Err(XfbinError::Value(format!(
                "{} values is not a multiple of {} components",
                self.values.len(),
                layout.components
            ))
            .into());
        }
        let keys = self.values.len() / layout.components;
        let frames_ok = match layout.frames {
            FrameStorage::Implicit => self.frames.is_empty(),
            FrameStorage::I32 => self.frames.len() == keys,
            FrameStorage::I16 => {
                self.frames.len() == keys
                    && self.frames.iter().all(|&f| i16::try_from(f).is_ok())
            }
        };
        if !frames_ok {
            return Err(XfbinError::Value(format!(
                "{} frames do not match {} keys of {}",
                self.frames.len(),
                keys,
                self.format
            ))
            .into());
        }
        if keys > u16::MAX as usize {
            return Err(XfbinError::Value(format!("{keys} keys do not fit a curve")).into());
        }
        Ok(())
    }

    #[inline]
    pub fn key_count(&self) -> usize { self.values.len() / self.format.layout().components }

    /// Decodes every key into a frame and a dequantized value.
    pub fn samples(&self, frame_size: u32) -> Result<Vec<Sample>> {
        let layout = self.format.layout();
        let mut components = [0f32; 4];
        (0..self.key_count())
            .map(|key| -> Result<Sample> {
                let frame = match layout.frames {
                    FrameStorage::Implicit => fixed_frame(key, frame_size)?,
                    _ => self.frames[key],
                };
                for (c, out) in components[..layout.components].iter_mut().enumerate() {
                    *out = self.values.dequantize(key * layout.components + c, layout.divisor);
                }
                let value = match Value::from_components(&components[..layout.components]) {
                    Some(v) => v,
                    None => Value::Scalar(components[0]),
                };
                Ok(Sample { frame, value })
            })
            .collect()
    }

    /// Quantizes uniform samples into `format`. Implicit-frame formats require the samples to
    /// sit exactly on `index * frame_size`.
    pub fn from_samples(
        index: u16,
        format: EAnmCurveFormat,
        frame_size: u32,
        samples: &[Sample],
    ) -> Result<Self> {
        let layout = format.layout();
        let mut frames = Vec::new();
        let mut flat = Vec::with_capacity(samples.len() * layout.components);
        for (i, sample) in samples.iter().enumerate() {
            let components = sample.value.components();
            if components.len() != layout.components {
                return Err(XfbinError::Value(format!(
                    "{format} expects {} components, sample {i} has {}",
                    layout.components,
                    components.len()
                ))
                .into());
            }
            match layout.frames {
                FrameStorage::Implicit => {
                    let expected = i as i64 * frame_size as i64;
                    if sample.frame as i64 != expected {
                        return Err(XfbinError::Value(format!(
                            "{format} sample {i} is at frame {}, expected {expected}",
                            sample.frame
                        ))
                        .into());
                    }
                }
                _ => frames.push(sample.frame),
            }
            flat.extend_from_slice(components);
        }
        let values = match layout.values {
            ValueStorage::F32 => CurveValues::F32(flat),
            ValueStorage::I16 => {
                CurveValues::I16(flat.iter().map(|&v| quantize_i16(v, layout.divisor)).collect())
            }
            ValueStorage::U8 => {
                CurveValues::U8(flat.iter().map(|&v| quantize_u8(v, layout.divisor)).collect())
            }
        };
        Self::new(index, format, frames, values)
    }

    pub fn header(&self) -> SAnmCurveHeader {
        SAnmCurveHeader {
            index: self.index,
            format: self.format as u16,
            key_count: self.key_count() as u16,
            flags: self.flags,
        }
    }

    /// Reads the keys described by `header`, then skips to the next 4-byte boundary. The cursor
    /// is expected to start at the beginning of the animation payload.
    pub fn read(cursor: &mut BinaryCursor, header: &SAnmCurveHeader) -> Result<Self> {
        let format = EAnmCurveFormat::from_u16(header.format)?;
        let layout = format.layout();
        let keys = header.key_count as usize;
        let mut frames = Vec::new();
        let mut values = match layout.values {
            ValueStorage::F32 => CurveValues::F32(Vec::with_capacity(keys * layout.components)),
            ValueStorage::I16 => CurveValues::I16(Vec::with_capacity(keys * layout.components)),
            ValueStorage::U8 => CurveValues::U8(Vec::with_capacity(keys * layout.components)),
        };
        for _ in 0..keys {
            match layout.frames {
                FrameStorage::Implicit => {}
                FrameStorage::I32 => frames.push(cursor.read::<i32>()?),
                FrameStorage::I16 => frames.push(cursor.read::<i16>()? as i32),
            }
            match &mut values {
                CurveValues::F32(v) => v.extend(cursor.read_vec::<f32>(layout.components)?),
                CurveValues::I16(v) => v.extend(cursor.read_vec::<i16>(layout.components)?),
                CurveValues::U8(v) => v.extend(cursor.read_vec::<u8>(layout.components)?),
            }
        }
        cursor.align_pos(4)?;
        Ok(Self { index: header.index, format, flags: header.flags, frames, values })
    }

    pub fn write(&self, cursor: &mut BinaryCursor) -> Result<()> {
        self.validate()?;
        let layout = self.format.layout();
        let n = layout.components;
        for key in 0..self.key_count() {
            match layout.frames {
                FrameStorage::Implicit => {}
                FrameStorage::I32 => cursor.write(self.frames[key])?,
                FrameStorage::I16 => cursor.write(self.frames[key] as i16)?,
            }
            match &self.values {
                CurveValues::F32(v) => cursor.write_slice(&v[key * n..(key + 1) * n])?,
                CurveValues::I16(v) => cursor.write_slice(&v[key * n..(key + 1) * n])?,
                CurveValues::U8(v) => cursor.write_slice(&v[key * n..(key + 1) * n])?,
            }
        }
        cursor.align(4)?;
        Ok(())
    }
}

/// Kind of track an animation entry holds.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, FromRepr, Display, Serialize)]
#[repr(u16)]
pub enum EAnmEntryFormat {
    Bone = 1,
    Camera = 2,
    Material = 4,
    LightDirc = 5,
    LightPoint = 6,
    Ambient = 8,
}

impl EAnmEntryFormat {
    pub fn from_u16(value: u16) -> Result<Self> {
        Self::from_repr(value)
            .ok_or_else(|| XfbinError::unsupported("animation entry format", value).into())
    }
}

/// Material property addressed by a material curve slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum MaterialProperty {
    UvOffsetU(u8),
    UvOffsetV(u8),
    UvScaleU(u8),
    UvScaleV(u8),
    BlendRate(u8),
    Falloff,
    Glare,
    Alpha,
    OutlineId,
    Reserved,
}

impl MaterialProperty {
    pub const SLOT_COUNT: u16 = 23;

    pub fn from_slot(slot: u16) -> Option<Self> {
        Some(match slot {
            0..=15 => {
                let set = (slot / 4) as u8;
                match slot % 4 {
                    0 => MaterialProperty::UvOffsetU(set),
                    1 => MaterialProperty::UvOffsetV(set),
                    2 => MaterialProperty::UvScaleU(set),
                    _ => MaterialProperty::UvScaleV(set),
                }
            }
            16 | 17 => MaterialProperty::BlendRate((slot - 16) as u8),
            18 => MaterialProperty::Falloff,
            19 => MaterialProperty::Glare,
            20 => MaterialProperty::Alpha,
            21 => MaterialProperty::OutlineId,
            22 => MaterialProperty::Reserved,
            _ => return None,
        })
    }

    pub fn slot(self) -> u16 {
        match self {
            MaterialProperty::UvOffsetU(n) => n as u16 * 4,
            MaterialProperty::UvOffsetV(n) => n as u16 * 4 + 1,
            MaterialProperty::UvScaleU(n) => n as u16 * 4 + 2,
            MaterialProperty::UvScaleV(n) => n as u16 * 4 + 3,
            MaterialProperty::BlendRate(n) => 16 + n as u16,
            MaterialProperty::Falloff => 18,
            MaterialProperty::Glare => 19,
            MaterialProperty::Alpha => 20,
            MaterialProperty::OutlineId => 21,
            MaterialProperty::Reserved => 22,
        }
    }
}

/// Property a curve animates.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum CurveTarget {
    Location,
    /// Quaternion rotation.
    Rotation,
    /// Euler rotation in degrees.
    RotationEuler,
    Scale,
    Opacity,
    Fov,
    Color,
    Energy,
    Radius,
    Cutoff,
    Material(MaterialProperty),
}

fn rotation_target(format: EAnmCurveFormat) -> CurveTarget {
    if format.layout().components == 3 {
        CurveTarget::RotationEuler
    } else {
        CurveTarget::Rotation
    }
}

/// Maps a curve to the property it animates, or `None` for indices the entry kind does not use.
pub fn curve_target(
    entry: EAnmEntryFormat,
    index: u16,
    format: EAnmCurveFormat,
) -> Option<CurveTarget> {
    match (entry, index) {
        (EAnmEntryFormat::Bone, 0) | (EAnmEntryFormat::Camera, 0) => Some(CurveTarget::Location),
        (EAnmEntryFormat::Bone, 1) | (EAnmEntryFormat::Camera, 1) => Some(rotation_target(format)),
        (EAnmEntryFormat::Bone, 2) => Some(CurveTarget::Scale),
        (EAnmEntryFormat::Bone, 3) => Some(CurveTarget::Opacity),
        (EAnmEntryFormat::Camera, 2) => Some(CurveTarget::Fov),
        (EAnmEntryFormat::LightDirc | EAnmEntryFormat::LightPoint | EAnmEntryFormat::Ambient, n)
            if n < 2 =>
        {
            Some(if n == 0 { CurveTarget::Color } else { CurveTarget::Energy })
        }
        (EAnmEntryFormat::LightPoint, 2) => Some(CurveTarget::Radius),
        (EAnmEntryFormat::LightPoint, 3) => Some(CurveTarget::Cutoff),
        (EAnmEntryFormat::Material, slot) => {
            MaterialProperty::from_slot(slot).map(CurveTarget::Material)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use binrw::Endian;

    use super::*;
    use crate::error::{error_kind, ErrorKind};

    fn decode(header: SAnmCurveHeader, data: Vec<u8>) -> Result<AnmCurve> {
        let mut cursor = BinaryCursor::new(data, Endian::Big);
        AnmCurve::read(&mut cursor, &header)
    }

    #[test]
    fn fixed_frames_are_synthesized() {
        let mut data = Vec::new();
        for v in [1.0f32, 2.0, 3.0] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        let header = SAnmCurveHeader {
            index: 0,
            format: EAnmCurveFormat::FloatFixed as u16,
            key_count: 3,
            flags: 0,
        };
        let curve = decode(header, data).unwrap();
        let samples = curve.samples(100).unwrap();
        let frames: Vec<i32> = samples.iter().map(|s| s.frame).collect();
        assert_eq!(frames, vec![0, 100, 200]);
        assert_eq!(samples[2].value, Value::Scalar(3.0));
    }

    #[test]
    fn fixed_frames_must_fit() {
        let values = CurveValues::F32(vec![1.0, 2.0, 3.0]);
        let curve = AnmCurve::new(0, EAnmCurveFormat::FloatFixed, vec![], values).unwrap();
        let err = curve.samples(0x4000_0000).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Value));
        let err = curve.samples(0x9000_0000).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Value));

        let frames: Vec<i32> =
            curve.samples(0x3FFF_FFFF).unwrap().iter().map(|s| s.frame).collect();
        assert_eq!(frames, vec![0, 0x3FFF_FFFF, 0x7FFF_FFFE]);
    }

    #[test]
    fn opacity_quantization() {
        let curve = AnmCurve::new(
            3,
            EAnmCurveFormat::OpacityShortTbl,
            vec![],
            CurveValues::I16(vec![0x4000]),
        )
        .unwrap();
        let samples = curve.samples(100).unwrap();
        assert_eq!(samples[0].value, Value::Scalar(0.5));
        let requantized =
            AnmCurve::from_samples(3, EAnmCurveFormat::OpacityShortTbl, 100, &samples).unwrap();
        assert_eq!(requantized.values, CurveValues::I16(vec![0x4000]));
    }

    #[test]
    fn quantized_tables_round_trip() {
        let cases = [
            (EAnmCurveFormat::ScaleShortTbl, CurveValues::I16(vec![0x1000, 0x0800, -0x2000])),
            (
                EAnmCurveFormat::QuaternionShortTblNoInterp,
                CurveValues::I16(vec![0, 0x5A82, 0, 0x5A82]),
            ),
            (EAnmCurveFormat::ColorRgbTbl, CurveValues::U8(vec![0, 128, 255])),
            (EAnmCurveFormat::OpacityShortTblNoInterp, CurveValues::I16(vec![i16::MIN])),
        ];
        for (format, values) in cases {
            let curve = AnmCurve::new(0, format, vec![], values.clone()).unwrap();
            let back = AnmCurve::from_samples(0, format, 1, &curve.samples(1).unwrap()).unwrap();
            assert_eq!(back.values, values, "{format}");
        }
    }

    #[test]
    fn quantizers_clamp() {
        assert_eq!(quantize_i16(1.0, K_DIV_UNIT), i16::MAX);
        assert_eq!(quantize_i16(-2.0, K_DIV_UNIT), i16::MIN);
        assert_eq!(quantize_u8(1.5, K_DIV_COLOR), 255);
        assert_eq!(quantize_u8(-0.1, K_DIV_COLOR), 0);
    }

    #[test]
    fn vector3_i16_linear_keeps_integer_frames() {
        let mut data = Vec::new();
        for v in [12i16, 0x4000, -0x4000, 0, 30, 0, 0, 0x2000] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        let header = SAnmCurveHeader {
            index: 0,
            format: EAnmCurveFormat::Vector3I16Linear as u16,
            key_count: 2,
            flags: -1,
        };
        let curve = decode(header, data.clone()).unwrap();
        let samples = curve.samples(100).unwrap();
        assert_eq!(samples[0], Sample { frame: 12, value: Value::Vec3([0.5, -0.5, 0.0]) });
        assert_eq!(samples[1], Sample { frame: 30, value: Value::Vec3([0.0, 0.0, 0.25]) });

        let mut cursor = BinaryCursor::default();
        curve.write(&mut cursor).unwrap();
        assert_eq!(cursor.into_inner(), data);
    }

    #[test]
    fn explicit_frames_need_not_be_ordered() {
        let samples = [
            Sample { frame: 40, value: Value::Vec4([0.0, 0.0, 0.0, 1.0]) },
            Sample { frame: 7, value: Value::Vec4([1.0, 0.0, 0.0, 0.0]) },
        ];
        let curve =
            AnmCurve::from_samples(1, EAnmCurveFormat::QuaternionLinear, 100, &samples).unwrap();
        assert_eq!(curve.frames, vec![40, 7]);
        assert_eq!(curve.samples(100).unwrap(), samples.to_vec());
    }

    #[test]
    fn curve_data_is_padded() {
        let curve = AnmCurve::new(
            0,
            EAnmCurveFormat::ColorRgbTbl,
            vec![],
            CurveValues::U8(vec![1, 2, 3]),
        )
        .unwrap();
        let mut cursor = BinaryCursor::default();
        curve.write(&mut cursor).unwrap();
        assert_eq!(cursor.buffer(), &[1, 2, 3, 0]);
    }

    #[test]
    fn rejects_bad_samples() {
        let off_grid = [
            Sample { frame: 0, value: Value::Scalar(1.0) },
            Sample { frame: 50, value: Value::Scalar(1.0) },
        ];
        let err = AnmCurve::from_samples(0, EAnmCurveFormat::FloatTbl, 100, &off_grid).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Value));

        let wrong_shape = [Sample { frame: 0, value: Value::Vec2([1.0, 2.0]) }];
        let err =
            AnmCurve::from_samples(0, EAnmCurveFormat::Vector3Linear, 1, &wrong_shape).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Value));

        let values = CurveValues::F32(vec![1.0]);
        let err = AnmCurve::new(0, EAnmCurveFormat::FloatLinear, vec![], values).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Value));
    }

    #[test]
    fn unknown_format() {
        let header = SAnmCurveHeader { index: 0, format: 0x12, key_count: 0, flags: 0 };
        let err = decode(header, vec![]).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::UnsupportedFormat));
    }

    #[test]
    fn targets() {
        use EAnmCurveFormat::*;
        let bone = EAnmEntryFormat::Bone;
        assert_eq!(curve_target(bone, 0, Vector3Linear), Some(CurveTarget::Location));
        assert_eq!(curve_target(bone, 1, EulerXyzFixed), Some(CurveTarget::RotationEuler));
        assert_eq!(curve_target(bone, 1, QuaternionShortTbl), Some(CurveTarget::Rotation));
        assert_eq!(curve_target(bone, 3, OpacityShortTbl), Some(CurveTarget::Opacity));
        assert_eq!(curve_target(bone, 4, FloatFixed), None);
        assert_eq!(curve_target(EAnmEntryFormat::Camera, 2, FloatLinear), Some(CurveTarget::Fov));
        assert_eq!(curve_target(EAnmEntryFormat::LightDirc, 2, FloatFixed), None);
        assert_eq!(
            curve_target(EAnmEntryFormat::LightPoint, 3, FloatFixed),
            Some(CurveTarget::Cutoff)
        );
        assert_eq!(
            curve_target(EAnmEntryFormat::Material, 14, FloatFixed),
            Some(CurveTarget::Material(MaterialProperty::UvScaleU(3)))
        );
        assert_eq!(curve_target(EAnmEntryFormat::Material, 23, FloatFixed), None);
        for slot in 0..MaterialProperty::SLOT_COUNT {
            assert_eq!(MaterialProperty::from_slot(slot).map(MaterialProperty::slot), Some(slot));
        }
    }
}
