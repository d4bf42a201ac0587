//! CRC-16/CCITT-FALSE 校验
//!
//! 参数：初值 `0xFFFF`，多项式 `0x1021`，高位先行，无输入/输出反转，无最终异或。
//! 控制板固件使用同一算法，任何其他 CRC-16 变体都会让每一帧都校验失败。

/// 初始寄存器值
pub const CRC_INIT: u16 = 0xFFFF;

/// 生成多项式
pub const CRC_POLY: u16 = 0x1021;

const CRC_TABLE: [u16; 256] = build_table();

const fn build_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ CRC_POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// 计算校验值
///
/// 帧校验覆盖 `device_id..payload`（不含两个帧头字节）。
///
/// # 示例
///
/// ```rust
/// use rig_protocol::checksum;
///
/// assert_eq!(checksum(b"123456789"), 0x29B1);
/// assert_eq!(checksum(&[0x00, 0x20, 0x01, 0x00]), 0x3137);
/// ```
pub fn checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(CRC_INIT, |crc, &byte| {
        let index = ((crc >> 8) as u8 ^ byte) as usize;
        (crc << 8) ^ CRC_TABLE[index]
    })
}
