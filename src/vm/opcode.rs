//! The NeoVM instruction set.

use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Layout of the operand that follows an opcode byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    None,
    /// A fixed number of operand bytes.
    Fixed(usize),
    /// A little-endian length prefix of this many bytes, followed by the data.
    Prefixed(usize),
}

macro_rules! opcodes {
    (@operand) => { Operand::None };
    (@operand $operand:expr) => { $operand };
    ($($name:ident = $byte:literal $(, $operand:expr)?;)*) => {
        /// NeoVM opcode mnemonics.
        #[allow(non_camel_case_types, clippy::upper_case_acronyms)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u8)]
        pub enum OpCode {
            $($name = $byte,)*
        }

        impl OpCode {
            pub const ALL: &'static [OpCode] = &[$(OpCode::$name,)*];

            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(OpCode::$name => stringify!($name),)*
                }
            }

            pub fn operand(self) -> Operand {
                match self {
                    $(OpCode::$name => opcodes!(@operand $($operand)?),)*
                }
            }

            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(OpCode::$name),)*
                    _ => None,
                }
            }
        }

        impl FromStr for OpCode {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $(stringify!($name) => Ok(OpCode::$name),)*
                    _ => Err(s.to_string()),
                }
            }
        }
    };
}

opcodes! {
    PUSHINT8 = 0x00, Operand::Fixed(1);
    PUSHINT16 = 0x01, Operand::Fixed(2);
    PUSHINT32 = 0x02, Operand::Fixed(4);
    PUSHINT64 = 0x03, Operand::Fixed(8);
    PUSHINT128 = 0x04, Operand::Fixed(16);
    PUSHINT256 = 0x05, Operand::Fixed(32);
    PUSHT = 0x08;
    PUSHF = 0x09;
    PUSHA = 0x0A, Operand::Fixed(4);
    PUSHNULL = 0x0B;
    PUSHDATA1 = 0x0C, Operand::Prefixed(1);
    PUSHDATA2 = 0x0D, Operand::Prefixed(2);
    PUSHDATA4 = 0x0E, Operand::Prefixed(4);
    PUSHM1 = 0x0F;
    PUSH0 = 0x10;
    PUSH1 = 0x11;
    PUSH2 = 0x12;
    PUSH3 = 0x13;
    PUSH4 = 0x14;
    PUSH5 = 0x15;
    PUSH6 = 0x16;
    PUSH7 = 0x17;
    PUSH8 = 0x18;
    PUSH9 = 0x19;
    PUSH10 = 0x1A;
    PUSH11 = 0x1B;
    PUSH12 = 0x1C;
    PUSH13 = 0x1D;
    PUSH14 = 0x1E;
    PUSH15 = 0x1F;
    PUSH16 = 0x20;
    NOP = 0x21;
    JMP = 0x22, Operand::Fixed(1);
    JMP_L = 0x23, Operand::Fixed(4);
    JMPIF = 0x24, Operand::Fixed(1);
    JMPIF_L = 0x25, Operand::Fixed(4);
    JMPIFNOT = 0x26, Operand::Fixed(1);
    JMPIFNOT_L = 0x27, Operand::Fixed(4);
    JMPEQ = 0x28, Operand::Fixed(1);
    JMPEQ_L = 0x29, Operand::Fixed(4);
    JMPNE = 0x2A, Operand::Fixed(1);
    JMPNE_L = 0x2B, Operand::Fixed(4);
    JMPGT = 0x2C, Operand::Fixed(1);
    JMPGT_L = 0x2D, Operand::Fixed(4);
    JMPGE = 0x2E, Operand::Fixed(1);
    JMPGE_L = 0x2F, Operand::Fixed(4);
    JMPLT = 0x30, Operand::Fixed(1);
    JMPLT_L = 0x31, Operand::Fixed(4);
    JMPLE = 0x32, Operand::Fixed(1);
    JMPLE_L = 0x33, Operand::Fixed(4);
    CALL = 0x34, Operand::Fixed(1);
    CALL_L = 0x35, Operand::Fixed(4);
    CALLA = 0x36;
    CALLT = 0x37, Operand::Fixed(2);
    ABORT = 0x38;
    ASSERT = 0x39;
    THROW = 0x3A;
    TRY = 0x3B, Operand::Fixed(2);
    TRY_L = 0x3C, Operand::Fixed(8);
    ENDTRY = 0x3D, Operand::Fixed(1);
    ENDTRY_L = 0x3E, Operand::Fixed(4);
    ENDFINALLY = 0x3F;
    RET = 0x40;
    SYSCALL = 0x41, Operand::Fixed(4);
    DEPTH = 0x43;
    DROP = 0x45;
    NIP = 0x46;
    XDROP = 0x48;
    CLEAR = 0x49;
    DUP = 0x4A;
    OVER = 0x4B;
    PICK = 0x4D;
    TUCK = 0x4E;
    SWAP = 0x50;
    ROT = 0x51;
    ROLL = 0x52;
    REVERSE3 = 0x53;
    REVERSE4 = 0x54;
    REVERSEN = 0x55;
    INITSSLOT = 0x56, Operand::Fixed(1);
    INITSLOT = 0x57, Operand::Fixed(2);
    LDSFLD0 = 0x58;
    LDSFLD1 = 0x59;
    LDSFLD2 = 0x5A;
    LDSFLD3 = 0x5B;
    LDSFLD4 = 0x5C;
    LDSFLD5 = 0x5D;
    LDSFLD6 = 0x5E;
    LDSFLD = 0x5F, Operand::Fixed(1);
    STSFLD0 = 0x60;
    STSFLD1 = 0x61;
    STSFLD2 = 0x62;
    STSFLD3 = 0x63;
    STSFLD4 = 0x64;
    STSFLD5 = 0x65;
    STSFLD6 = 0x66;
    STSFLD = 0x67, Operand::Fixed(1);
    LDLOC0 = 0x68;
    LDLOC1 = 0x69;
    LDLOC2 = 0x6A;
    LDLOC3 = 0x6B;
    LDLOC4 = 0x6C;
    LDLOC5 = 0x6D;
    LDLOC6 = 0x6E;
    LDLOC = 0x6F, Operand::Fixed(1);
    STLOC0 = 0x70;
    STLOC1 = 0x71;
    STLOC2 = 0x72;
    STLOC3 = 0x73;
    STLOC4 = 0x74;
    STLOC5 = 0x75;
    STLOC6 = 0x76;
    STLOC = 0x77, Operand::Fixed(1);
    LDARG0 = 0x78;
    LDARG1 = 0x79;
    LDARG2 = 0x7A;
    LDARG3 = 0x7B;
    LDARG4 = 0x7C;
    LDARG5 = 0x7D;
    LDARG6 = 0x7E;
    LDARG = 0x7F, Operand::Fixed(1);
    STARG0 = 0x80;
    STARG1 = 0x81;
    STARG2 = 0x82;
    STARG3 = 0x83;
    STARG4 = 0x84;
    STARG5 = 0x85;
    STARG6 = 0x86;
    STARG = 0x87, Operand::Fixed(1);
    NEWBUFFER = 0x88;
    MEMCPY = 0x89;
    CAT = 0x8B;
    SUBSTR = 0x8C;
    LEFT = 0x8D;
    RIGHT = 0x8E;
    INVERT = 0x90;
    AND = 0x91;
    OR = 0x92;
    XOR = 0x93;
    EQUAL = 0x97;
    NOTEQUAL = 0x98;
    SIGN = 0x99;
    ABS = 0x9A;
    NEGATE = 0x9B;
    INC = 0x9C;
    DEC = 0x9D;
    ADD = 0x9E;
    SUB = 0x9F;
    MUL = 0xA0;
    DIV = 0xA1;
    MOD = 0xA2;
    POW = 0xA3;
    SQRT = 0xA4;
    MODMUL = 0xA5;
    MODPOW = 0xA6;
    SHL = 0xA8;
    SHR = 0xA9;
    NOT = 0xAA;
    BOOLAND = 0xAB;
    BOOLOR = 0xAC;
    NZ = 0xB1;
    NUMEQUAL = 0xB3;
    NUMNOTEQUAL = 0xB4;
    LT = 0xB5;
    LE = 0xB6;
    GT = 0xB7;
    GE = 0xB8;
    MIN = 0xB9;
    MAX = 0xBA;
    WITHIN = 0xBB;
    PACKMAP = 0xBE;
    PACKSTRUCT = 0xBF;
    PACK = 0xC0;
    UNPACK = 0xC1;
    NEWARRAY0 = 0xC2;
    NEWARRAY = 0xC3;
    NEWARRAY_T = 0xC4, Operand::Fixed(1);
    NEWSTRUCT0 = 0xC5;
    NEWSTRUCT = 0xC6;
    NEWMAP = 0xC8;
    SIZE = 0xCA;
    HASKEY = 0xCB;
    KEYS = 0xCC;
    VALUES = 0xCD;
    PICKITEM = 0xCE;
    APPEND = 0xCF;
    SETITEM = 0xD0;
    REVERSEITEMS = 0xD1;
    REMOVE = 0xD2;
    CLEARITEMS = 0xD3;
    POPITEM = 0xD4;
    ISNULL = 0xD8;
    ISTYPE = 0xD9, Operand::Fixed(1);
    CONVERT = 0xDB, Operand::Fixed(1);
    ABORTMSG = 0xE0;
    ASSERTMSG = 0xE1;
}

impl OpCode {
    /// Instructions that push a new frame of the same script.
    pub fn is_call(self) -> bool {
        matches!(
            self,
            OpCode::CALL | OpCode::CALL_L | OpCode::CALLA | OpCode::CALLT
        )
    }

    /// Size of the encoded instruction given the bytes of the script that follow the opcode.
    ///
    /// Returns `None` when a length prefix runs past the end of `rest`.
    pub fn encoded_len(self, rest: &[u8]) -> Option<usize> {
        match self.operand() {
            Operand::None => Some(1),
            Operand::Fixed(n) => Some(1 + n),
            Operand::Prefixed(prefix) => {
                let raw = rest.get(..prefix)?;
                let mut len = [0u8; 8];
                len[..prefix].copy_from_slice(raw);
                let data = usize::try_from(u64::from_le_bytes(len)).ok()?;
                Some(1 + prefix + data)
            }
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl Serialize for OpCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.mnemonic())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnemonics_round_trip_through_bytes() {
        for &op in OpCode::ALL {
            assert_eq!(OpCode::from_byte(op as u8), Some(op));
            assert_eq!(op.mnemonic().parse::<OpCode>(), Ok(op));
        }
    }

    #[test]
    fn unknown_mnemonic_is_rejected() {
        assert_eq!("PUSHX".parse::<OpCode>(), Err("PUSHX".to_string()));
        assert_eq!(OpCode::from_byte(0x06), None);
    }

    #[test]
    fn encoded_len_reads_length_prefix() {
        assert_eq!(OpCode::PUSHDATA1.encoded_len(&[3, 1, 2, 3]), Some(5));
        assert_eq!(OpCode::PUSHDATA2.encoded_len(&[1]), None);
        assert_eq!(OpCode::SYSCALL.encoded_len(&[]), Some(5));
        assert_eq!(OpCode::RET.encoded_len(&[]), Some(1));
    }
}
