//! The Bitcoin transaction wire codec and derived byte-length metrics.
//!
//! [Transaction] is built once from wire bytes ([Transaction::parse_wire])
//! or an explorer JSON document (see the `json` module) and re-serialized
//! bit exactly with [Transaction::serialize]. The per-field byte-length
//! accessors always agree with the corresponding slice of the serialized
//! form; downstream circuit generators size their fixed buffers from them.

use crate::compact_size::{self, CompactSizeError};
use std::{error, fmt};

#[derive(Clone, Debug, PartialEq)]
pub enum TxError {
    /// The wire buffer ended while the named field was being read.
    UnexpectedEnd(&'static str),
    /// The buffer contains bytes after the lock time.
    TrailingBytes(usize),
    /// A CompactSize count or length prefix was invalid.
    CompactSize(CompactSizeError),
    /// A hex transaction string could not be decoded.
    Hex(hex::FromHexError),
    /// The explorer JSON document is missing a field or carries a
    /// malformed value.
    UnsupportedShape(String),
}

impl fmt::Display for TxError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TxError::UnexpectedEnd(field) => {
                write!(f, "transaction buffer ended while reading {}", field)
            }
            TxError::TrailingBytes(n) => {
                write!(f, "{} trailing bytes after the lock time", n)
            }
            TxError::CompactSize(e) => write!(f, "transaction length field: {}", e),
            TxError::Hex(e) => write!(f, "transaction hex: {}", e),
            TxError::UnsupportedShape(what) => write!(f, "explorer document: {}", what),
        }
    }
}

impl error::Error for TxError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            TxError::CompactSize(ref e) => Some(e),
            TxError::Hex(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<CompactSizeError> for TxError {
    fn from(e: CompactSizeError) -> Self {
        TxError::CompactSize(e)
    }
}

impl From<hex::FromHexError> for TxError {
    fn from(e: hex::FromHexError) -> Self {
        TxError::Hex(e)
    }
}

/// A transaction input. The previous-output txid is kept in wire byte
/// order, not the reversed order block explorers display.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Input {
    pub txid: [u8; 32],
    pub vout: u32,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
}

impl Input {
    /// Serialized length: txid, vout, scriptSig length prefix, scriptSig,
    /// sequence.
    pub fn byte_len(&self) -> usize {
        32 + 4
            + compact_size::encoded_size(self.script_sig.len() as u64)
            + self.script_sig.len()
            + 4
    }
}

/// A transaction output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

impl Output {
    /// Serialized length: value, scriptPubKey length prefix, scriptPubKey.
    pub fn byte_len(&self) -> usize {
        8 + compact_size::encoded_size(self.script_pubkey.len() as u64) + self.script_pubkey.len()
    }
}

/// The ordered witness stack of one input.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Witness {
    pub items: Vec<Vec<u8>>,
}

impl Witness {
    /// Serialized length: item count prefix plus each item's length
    /// prefix and bytes.
    pub fn byte_len(&self) -> usize {
        compact_size::encoded_size(self.items.len() as u64)
            + self
                .items
                .iter()
                .map(|item| compact_size::encoded_size(item.len() as u64) + item.len())
                .sum::<usize>()
    }
}

/// An in-memory Bitcoin transaction, mirroring the wire layout.
///
/// When `segwit_flag` is set, `witnesses` holds exactly one stack per
/// input; otherwise it is empty. The raw flag byte following the zero
/// marker is preserved so that [Transaction::serialize] reproduces the
/// input bytes exactly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub version: u32,
    pub segwit_flag: Option<u8>,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub witnesses: Vec<Witness>,
    pub lock_time: u32,
}

impl Transaction {
    /// Parses a wire-format transaction. The whole buffer must be
    /// consumed; CompactSize fields must be minimally encoded.
    pub fn parse_wire(bytes: &[u8]) -> Result<Transaction, TxError> {
        let mut cursor = Cursor::new(bytes);

        let version = cursor.read_u32_le("version")?;

        // A zero byte where the input count belongs is the segwit marker;
        // a transaction can't have zero inputs on the wire. The flag byte
        // after it announces the witness section.
        let segwit_flag = if cursor.peek() == Some(0) {
            cursor.take(1, "segwit marker")?;
            let flag = cursor.take(1, "segwit flag")?[0];
            Some(flag)
        } else {
            None
        };

        // Counts are attacker controlled; cap every preallocation at the
        // bytes actually left so an oversized count runs into the
        // truncation error instead of aborting on allocation.
        let input_count = cursor.read_compact_size()? as usize;
        let mut inputs = Vec::with_capacity(input_count.min(cursor.remaining()));
        for _ in 0..input_count {
            let mut txid = [0u8; 32];
            txid.copy_from_slice(cursor.take(32, "input txid")?);
            let vout = cursor.read_u32_le("input vout")?;
            let script_sig_len = cursor.read_compact_size()? as usize;
            let script_sig = cursor.take(script_sig_len, "input scriptSig")?.to_vec();
            let sequence = cursor.read_u32_le("input sequence")?;
            inputs.push(Input {
                txid,
                vout,
                script_sig,
                sequence,
            });
        }

        let output_count = cursor.read_compact_size()? as usize;
        let mut outputs = Vec::with_capacity(output_count.min(cursor.remaining()));
        for _ in 0..output_count {
            let value = cursor.read_u64_le("output value")?;
            let script_pubkey_len = cursor.read_compact_size()? as usize;
            let script_pubkey = cursor
                .take(script_pubkey_len, "output scriptPubKey")?
                .to_vec();
            outputs.push(Output {
                value,
                script_pubkey,
            });
        }

        let mut witnesses = Vec::new();
        if segwit_flag.is_some() {
            witnesses.reserve(input_count.min(cursor.remaining()));
            for _ in 0..input_count {
                let item_count = cursor.read_compact_size()? as usize;
                let mut items = Vec::with_capacity(item_count.min(cursor.remaining()));
                for _ in 0..item_count {
                    let item_len = cursor.read_compact_size()? as usize;
                    items.push(cursor.take(item_len, "witness item")?.to_vec());
                }
                witnesses.push(Witness { items });
            }
        }

        let lock_time = cursor.read_u32_le("lock time")?;

        if cursor.pos != bytes.len() {
            return Err(TxError::TrailingBytes(bytes.len() - cursor.pos));
        }

        Ok(Transaction {
            version,
            segwit_flag,
            inputs,
            outputs,
            witnesses,
            lock_time,
        })
    }

    /// Parses a wire-format transaction from its hex representation.
    pub fn from_hex(hex_tx: &str) -> Result<Transaction, TxError> {
        let bytes = hex::decode(hex_tx)?;
        Transaction::parse_wire(&bytes)
    }

    /// Serializes the transaction back to wire format. The exact inverse
    /// of [Transaction::parse_wire].
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_len());
        out.extend_from_slice(&self.version.to_le_bytes());

        if let Some(flag) = self.segwit_flag {
            out.push(0x00);
            out.push(flag);
        }

        compact_size::encode_into(self.inputs.len() as u64, &mut out);
        for input in self.inputs.iter() {
            out.extend_from_slice(&input.txid);
            out.extend_from_slice(&input.vout.to_le_bytes());
            compact_size::encode_into(input.script_sig.len() as u64, &mut out);
            out.extend_from_slice(&input.script_sig);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }

        compact_size::encode_into(self.outputs.len() as u64, &mut out);
        for output in self.outputs.iter() {
            out.extend_from_slice(&output.value.to_le_bytes());
            compact_size::encode_into(output.script_pubkey.len() as u64, &mut out);
            out.extend_from_slice(&output.script_pubkey);
        }

        if self.segwit_flag.is_some() {
            for witness in self.witnesses.iter() {
                compact_size::encode_into(witness.items.len() as u64, &mut out);
                for item in witness.items.iter() {
                    compact_size::encode_into(item.len() as u64, &mut out);
                    out.extend_from_slice(item);
                }
            }
        }

        out.extend_from_slice(&self.lock_time.to_le_bytes());
        out
    }

    /// Serializes the transaction to its hex representation.
    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    /// Empties every input's scriptSig in place, producing the canonical
    /// presigning variant. Idempotent; the serialized length shrinks by
    /// exactly the removed scriptSig bytes plus the shrunk length
    /// prefixes.
    pub fn strip_input_scripts(&mut self) {
        for input in self.inputs.iter_mut() {
            input.script_sig.clear();
        }
    }

    /// Returns true if the transaction carries a witness section.
    pub fn is_segwit(&self) -> bool {
        self.segwit_flag.is_some()
    }

    /// Total serialized length.
    pub fn byte_len(&self) -> usize {
        let marker_and_flag = if self.is_segwit() { 2 } else { 0 };
        4 + marker_and_flag
            + self.input_section_byte_len()
            + self.output_section_byte_len()
            + self.witness_section_byte_len()
            + 4
    }

    /// Serialized length of the input count prefix plus all inputs.
    pub fn input_section_byte_len(&self) -> usize {
        compact_size::encoded_size(self.inputs.len() as u64)
            + self.inputs.iter().map(Input::byte_len).sum::<usize>()
    }

    /// Serialized length of the output count prefix plus all outputs.
    pub fn output_section_byte_len(&self) -> usize {
        compact_size::encoded_size(self.outputs.len() as u64)
            + self.outputs.iter().map(Output::byte_len).sum::<usize>()
    }

    /// Serialized length of the witness section; 0 for legacy
    /// transactions.
    pub fn witness_section_byte_len(&self) -> usize {
        self.witnesses.iter().map(Witness::byte_len).sum()
    }

    /// The largest witness stack item count across all inputs; 0 for
    /// legacy transactions.
    pub fn max_witness_items(&self) -> usize {
        self.witnesses
            .iter()
            .map(|w| w.items.len())
            .max()
            .unwrap_or(0)
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize, field: &'static str) -> Result<&'a [u8], TxError> {
        let slice = self
            .buf
            .get(self.pos..)
            .and_then(|rest| rest.get(..n))
            .ok_or(TxError::UnexpectedEnd(field))?;
        self.pos += n;
        Ok(slice)
    }

    fn read_u32_le(&mut self, field: &'static str) -> Result<u32, TxError> {
        let mut le = [0u8; 4];
        le.copy_from_slice(self.take(4, field)?);
        Ok(u32::from_le_bytes(le))
    }

    fn read_u64_le(&mut self, field: &'static str) -> Result<u64, TxError> {
        let mut le = [0u8; 8];
        le.copy_from_slice(self.take(8, field)?);
        Ok(u64::from_le_bytes(le))
    }

    fn read_compact_size(&mut self) -> Result<u64, TxError> {
        let (value, new_pos) = compact_size::decode(self.buf, self.pos)?;
        self.pos = new_pos;
        Ok(value)
    }
}
