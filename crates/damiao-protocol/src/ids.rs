//! CAN ID 与标记字节常量
//!
//! 达妙电机的控制帧以电机的命令 ID（ESC_ID）为基址，
//! 不同控制模式使用不同的 ID 偏移。

// ============================================================================
// 控制帧 ID 偏移
// ============================================================================

/// MIT 模式控制帧（ID = 命令 ID）
pub const MIT_ID_OFFSET: u16 = 0x000;

/// 位置速度模式控制帧（ID = 0x100 + 命令 ID）
pub const POS_VEL_ID_OFFSET: u16 = 0x100;

/// 速度模式控制帧（ID = 0x200 + 命令 ID）
pub const VEL_ID_OFFSET: u16 = 0x200;

/// 力位混合模式控制帧（ID = 0x300 + 命令 ID）
pub const FORCE_POS_ID_OFFSET: u16 = 0x300;

/// 寄存器读写 / 参数保存使用的广播 ID
pub const ID_REGISTER: u16 = 0x7FF;

/// 标准帧 ID 的有效范围（11 位）
pub const MAX_STANDARD_ID: u16 = 0x7FF;

// ============================================================================
// 寄存器子协议标记字节（Byte 2）
// ============================================================================

/// 读寄存器请求 / 读应答
pub const TAG_REGISTER_READ: u8 = 0x33;

/// 写寄存器请求 / 写应答
pub const TAG_REGISTER_WRITE: u8 = 0x55;

/// 保存参数到 Flash
pub const TAG_REGISTER_SAVE: u8 = 0xAA;

/// 判断 Byte 2 是否为寄存器应答标记
pub fn is_register_reply_tag(tag: u8) -> bool {
    matches!(tag, TAG_REGISTER_READ | TAG_REGISTER_WRITE)
}

// ============================================================================
// 特殊指令（Byte 0-6 = 0xFF，Byte 7 为指令码）
// ============================================================================

/// 使能电机
pub const CMD_ENABLE: u8 = 0xFC;

/// 失能电机
pub const CMD_DISABLE: u8 = 0xFD;

/// 保存当前位置为零点
pub const CMD_SAVE_ZERO: u8 = 0xFE;

/// 清除错误
pub const CMD_CLEAR_ERROR: u8 = 0xFB;

/// 反馈帧 Byte 0 中逻辑 ID 的掩码（低 4 位）
pub const FEEDBACK_ID_MASK: u8 = 0x0F;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_reply_tags() {
        assert!(is_register_reply_tag(TAG_REGISTER_READ));
        assert!(is_register_reply_tag(TAG_REGISTER_WRITE));
        assert!(!is_register_reply_tag(TAG_REGISTER_SAVE));
        assert!(!is_register_reply_tag(0x00));
    }
}
