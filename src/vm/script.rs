//! NeoVM bytecode emission for invocation scripts.

use sha2::{Digest, Sha256};

use super::OpCode;
use crate::types::ContractHash;

/// Interop hash of `System.Contract.Call`.
pub const CONTRACT_CALL: u32 = 0x525b_7d62;

/// `CallFlags::All`.
pub const CALL_FLAGS_ALL: i128 = 0x0f;

/// Interop service hash: the first four bytes of SHA-256 over the name, little-endian.
pub fn interop_hash(name: &str) -> u32 {
    let digest = Sha256::digest(name.as_bytes());
    u32::from_le_bytes([digest[0], digest[1], digest[2], digest[3]])
}

/// A typed invocation argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractParameter {
    Any,
    Boolean(bool),
    Integer(i128),
    ByteArray(Vec<u8>),
    String(String),
    Hash160(ContractHash),
    Array(Vec<ContractParameter>),
}

/// Appends NeoVM instructions to a script buffer.
#[derive(Debug, Default)]
pub struct ScriptBuilder {
    script: Vec<u8>,
}

impl ScriptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }

    pub fn emit(&mut self, opcode: OpCode) -> &mut Self {
        self.script.push(opcode as u8);
        self
    }

    pub fn emit_with(&mut self, opcode: OpCode, operand: &[u8]) -> &mut Self {
        self.script.push(opcode as u8);
        self.script.extend_from_slice(operand);
        self
    }

    pub fn emit_push_int(&mut self, value: i128) -> &mut Self {
        if (-1..=16).contains(&value) {
            // PUSHM1 precedes PUSH0 directly, so the small constants are contiguous.
            let byte = (OpCode::PUSH0 as u8 as i128 + value) as u8;
            self.script.push(byte);
            return self;
        }
        let bytes = value.to_le_bytes();
        let (opcode, width) = match minimal_width(value) {
            1 => (OpCode::PUSHINT8, 1),
            2 => (OpCode::PUSHINT16, 2),
            3 | 4 => (OpCode::PUSHINT32, 4),
            5..=8 => (OpCode::PUSHINT64, 8),
            _ => (OpCode::PUSHINT128, 16),
        };
        self.emit_with(opcode, &bytes[..width])
    }

    pub fn emit_push_bool(&mut self, value: bool) -> &mut Self {
        self.emit(if value { OpCode::PUSHT } else { OpCode::PUSHF })
    }

    pub fn emit_push_data(&mut self, data: &[u8]) -> &mut Self {
        let len = data.len();
        if let Ok(len) = u8::try_from(len) {
            self.emit_with(OpCode::PUSHDATA1, &[len]);
        } else if let Ok(len) = u16::try_from(len) {
            self.emit_with(OpCode::PUSHDATA2, &len.to_le_bytes());
        } else {
            let len = u32::try_from(len).unwrap_or(u32::MAX);
            self.emit_with(OpCode::PUSHDATA4, &len.to_le_bytes());
        }
        self.script.extend_from_slice(data);
        self
    }

    pub fn emit_push_string(&mut self, value: &str) -> &mut Self {
        self.emit_push_data(value.as_bytes())
    }

    pub fn emit_parameter(&mut self, parameter: &ContractParameter) -> &mut Self {
        match parameter {
            ContractParameter::Any => self.emit(OpCode::PUSHNULL),
            ContractParameter::Boolean(b) => self.emit_push_bool(*b),
            ContractParameter::Integer(i) => self.emit_push_int(*i),
            ContractParameter::ByteArray(bytes) => self.emit_push_data(bytes),
            ContractParameter::String(s) => self.emit_push_string(s),
            ContractParameter::Hash160(hash) => self.emit_push_data(hash.as_bytes()),
            ContractParameter::Array(items) => self.emit_array(items),
        }
    }

    /// Push `items` as an array: elements in reverse, the count, then `PACK`.
    pub fn emit_array(&mut self, items: &[ContractParameter]) -> &mut Self {
        if items.is_empty() {
            return self.emit(OpCode::NEWARRAY0);
        }
        for item in items.iter().rev() {
            self.emit_parameter(item);
        }
        self.emit_push_int(items.len() as i128);
        self.emit(OpCode::PACK)
    }

    pub fn emit_syscall(&mut self, hash: u32) -> &mut Self {
        self.emit_with(OpCode::SYSCALL, &hash.to_le_bytes())
    }

    /// `System.Contract.Call(contract, method, CallFlags::All, args)`.
    pub fn emit_dynamic_call(
        &mut self,
        contract: &ContractHash,
        method: &str,
        args: &[ContractParameter],
    ) -> &mut Self {
        self.emit_array(args);
        self.emit_push_int(CALL_FLAGS_ALL);
        self.emit_push_string(method);
        self.emit_push_data(contract.as_bytes());
        self.emit_syscall(CONTRACT_CALL)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.script.clone()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.script
    }
}

/// Number of bytes needed to hold `value` in two's complement.
fn minimal_width(value: i128) -> usize {
    let bytes = value.to_le_bytes();
    let fill = if value < 0 { 0xff } else { 0x00 };
    let mut width = bytes.len();
    while width > 1 && bytes[width - 1] == fill && (bytes[width - 2] & 0x80 == fill & 0x80) {
        width -= 1;
    }
    width
}
