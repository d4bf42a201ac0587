//! 定点缩放
//!
//! 角度 ×100 传输，速度/加速度/减速度 ×10 传输。编码和解码必须使用同一组系数，
//! 系数错一个数量级不会报错，只会让运动幅度差 10 倍。

use crate::ProtocolError;

/// 角度缩放系数（0.01°）
pub const ANGLE_SCALE: f32 = 100.0;

/// 速度/加速度缩放系数（0.1°/s, 0.1°/s²）
pub const RATE_SCALE: f32 = 10.0;

fn scale_value(
    field: &'static str,
    value: f32,
    scale: f32,
    min: f64,
    max: f64,
) -> Result<f64, ProtocolError> {
    let scaled = (value as f64 * scale as f64).round();
    if !scaled.is_finite() || scaled < min || scaled > max {
        return Err(ProtocolError::ValueOutOfRange {
            field,
            value: value as f64,
        });
    }
    Ok(scaled)
}

/// 有符号角度 → `i16`（×100，四舍五入）
pub fn angle_to_raw(field: &'static str, degrees: f32) -> Result<i16, ProtocolError> {
    scale_value(field, degrees, ANGLE_SCALE, i16::MIN as f64, i16::MAX as f64).map(|v| v as i16)
}

pub fn angle_from_raw(raw: i16) -> f32 {
    raw as f32 / ANGLE_SCALE
}

/// 非负角度 → `u16`（×100），用于起始位置和查询应答
pub fn unsigned_angle_to_raw(field: &'static str, degrees: f32) -> Result<u16, ProtocolError> {
    scale_value(field, degrees, ANGLE_SCALE, 0.0, u16::MAX as f64).map(|v| v as u16)
}

pub fn unsigned_angle_from_raw(raw: u16) -> f32 {
    raw as f32 / ANGLE_SCALE
}

/// 速度/加速度 → `u16`（×10）
pub fn rate_to_raw(field: &'static str, rate: f32) -> Result<u16, ProtocolError> {
    scale_value(field, rate, RATE_SCALE, 0.0, u16::MAX as f64).map(|v| v as u16)
}

pub fn rate_from_raw(raw: u16) -> f32 {
    raw as f32 / RATE_SCALE
}
