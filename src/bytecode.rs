//! JVM opcodes understood by the interpreter.
use std::fmt;

/// Instruction mnemonics, decoded from their one-byte encoding. Opcodes the
/// interpreter does not implement decode to `Unknown`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum OPCode {
    NOP,
    IconstM1,
    Iconst0,
    Iconst1,
    Iconst2,
    Iconst3,
    Iconst4,
    Iconst5,
    BiPush,
    SiPush,
    Ldc,
    LdcW,
    ILoad,
    ALoad,
    ILoad0,
    ILoad1,
    ILoad2,
    ILoad3,
    ALoad0,
    ALoad1,
    ALoad2,
    ALoad3,
    IALoad,
    IStore,
    AStore,
    IStore0,
    IStore1,
    IStore2,
    IStore3,
    AStore0,
    AStore1,
    AStore2,
    AStore3,
    IAStore,
    Pop,
    Dup,
    IAdd,
    ISub,
    IMul,
    IDiv,
    IRem,
    INeg,
    IInc,
    IfEq,
    IfNe,
    IfLt,
    IfGe,
    IfGt,
    IfLe,
    IfICmpEq,
    IfICmpNe,
    IfICmpLt,
    IfICmpGe,
    IfICmpGt,
    IfICmpLe,
    Goto,
    IReturn,
    Return,
    GetStatic,
    PutStatic,
    InvokeStatic,
    NewArray,
    ArrayLength,
    Unknown(u8),
}

impl OPCode {
    /// Number of operand bytes following the opcode byte.
    pub const fn operand_bytes(self) -> usize {
        match self {
            Self::BiPush
            | Self::Ldc
            | Self::ILoad
            | Self::ALoad
            | Self::IStore
            | Self::AStore
            | Self::NewArray => 1,
            Self::SiPush
            | Self::LdcW
            | Self::IInc
            | Self::IfEq
            | Self::IfNe
            | Self::IfLt
            | Self::IfGe
            | Self::IfGt
            | Self::IfLe
            | Self::IfICmpEq
            | Self::IfICmpNe
            | Self::IfICmpLt
            | Self::IfICmpGe
            | Self::IfICmpGt
            | Self::IfICmpLe
            | Self::Goto
            | Self::GetStatic
            | Self::PutStatic
            | Self::InvokeStatic => 2,
            _ => 0,
        }
    }
}

impl From<u8> for OPCode {
    fn from(byte: u8) -> Self {
        match byte {
            0x00 => Self::NOP,
            0x02 => Self::IconstM1,
            0x03 => Self::Iconst0,
            0x04 => Self::Iconst1,
            0x05 => Self::Iconst2,
            0x06 => Self::Iconst3,
            0x07 => Self::Iconst4,
            0x08 => Self::Iconst5,
            0x10 => Self::BiPush,
            0x11 => Self::SiPush,
            0x12 => Self::Ldc,
            0x13 => Self::LdcW,
            0x15 => Self::ILoad,
            0x19 => Self::ALoad,
            0x1a => Self::ILoad0,
            0x1b => Self::ILoad1,
            0x1c => Self::ILoad2,
            0x1d => Self::ILoad3,
            0x2a => Self::ALoad0,
            0x2b => Self::ALoad1,
            0x2c => Self::ALoad2,
            0x2d => Self::ALoad3,
            0x2e => Self::IALoad,
            0x36 => Self::IStore,
            0x3a => Self::AStore,
            0x3b => Self::IStore0,
            0x3c => Self::IStore1,
            0x3d => Self::IStore2,
            0x3e => Self::IStore3,
            0x4b => Self::AStore0,
            0x4c => Self::AStore1,
            0x4d => Self::AStore2,
            0x4e => Self::AStore3,
            0x4f => Self::IAStore,
            0x57 => Self::Pop,
            0x59 => Self::Dup,
            0x60 => Self::IAdd,
            0x64 => Self::ISub,
            0x68 => Self::IMul,
            0x6c => Self::IDiv,
            0x70 => Self::IRem,
            0x74 => Self::INeg,
            0x84 => Self::IInc,
            0x99 => Self::IfEq,
            0x9a => Self::IfNe,
            0x9b => Self::IfLt,
            0x9c => Self::IfGe,
            0x9d => Self::IfGt,
            0x9e => Self::IfLe,
            0x9f => Self::IfICmpEq,
            0xa0 => Self::IfICmpNe,
            0xa1 => Self::IfICmpLt,
            0xa2 => Self::IfICmpGe,
            0xa3 => Self::IfICmpGt,
            0xa4 => Self::IfICmpLe,
            0xa7 => Self::Goto,
            0xac => Self::IReturn,
            0xb1 => Self::Return,
            0xb2 => Self::GetStatic,
            0xb3 => Self::PutStatic,
            0xb8 => Self::InvokeStatic,
            0xbc => Self::NewArray,
            0xbe => Self::ArrayLength,
            other => Self::Unknown(other),
        }
    }
}

impl fmt::Display for OPCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Unknown(byte) => write!(f, "opcode 0x{byte:02x}"),
            known => write!(f, "{known:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_standard_encodings() {
        assert_eq!(OPCode::from(0x00), OPCode::NOP);
        assert_eq!(OPCode::from(0x05), OPCode::Iconst2);
        assert_eq!(OPCode::from(0x60), OPCode::IAdd);
        assert_eq!(OPCode::from(0xac), OPCode::IReturn);
        assert_eq!(OPCode::from(0xb8), OPCode::InvokeStatic);
        assert_eq!(OPCode::from(0xba), OPCode::Unknown(0xba));
    }

    #[test]
    fn operand_widths() {
        assert_eq!(OPCode::BiPush.operand_bytes(), 1);
        assert_eq!(OPCode::IInc.operand_bytes(), 2);
        assert_eq!(OPCode::Goto.operand_bytes(), 2);
        assert_eq!(OPCode::IAdd.operand_bytes(), 0);
        assert_eq!(OPCode::Unknown(0xba).to_string(), "opcode 0xba");
    }
}
