//! Re-encoding of segwit witness stacks as legacy-style script bytes.
//!
//! The script analyzer only understands script byte strings. A witness
//! stack is turned into the scriptSig it is equivalent to by prefixing
//! every item with the standard push encoding its length calls for, so a
//! P2WSH witness can be analyzed exactly like a P2SH scriptSig.

use crate::tx::{Transaction, Witness};

const OP_PUSHDATA1: u8 = 0x4c;
const OP_PUSHDATA2: u8 = 0x4d;
const OP_PUSHDATA4: u8 = 0x4e;

impl Witness {
    /// Concatenates the stack items as push-prefixed script bytes,
    /// leaving out the last `trailing_skip` items (used to drop a
    /// taproot control block and leaf script before analysis).
    pub fn as_script_bytes(&self, trailing_skip: usize) -> Vec<u8> {
        let keep = self.items.len().saturating_sub(trailing_skip);
        let mut out = Vec::new();
        for item in self.items[..keep].iter() {
            push_prefixed(item, &mut out);
        }
        out
    }
}

impl Transaction {
    /// The witness stack of `input_index` as an equivalent script byte
    /// string, or `None` when the transaction carries no witness data
    /// for that input.
    pub fn witness_as_script(&self, input_index: usize, trailing_skip: usize) -> Option<Vec<u8>> {
        self.witnesses
            .get(input_index)
            .map(|witness| witness.as_script_bytes(trailing_skip))
    }
}

// Push encoding by item length: a bare length byte for 1..=75,
// PUSHDATA1/2/4 above that.
fn push_prefixed(item: &[u8], out: &mut Vec<u8>) {
    let len = item.len();
    if (1..=75).contains(&len) {
        out.push(len as u8);
    } else if len <= 0xff {
        out.push(OP_PUSHDATA1);
        out.push(len as u8);
    } else if len <= 0xffff {
        out.push(OP_PUSHDATA2);
        out.extend_from_slice(&(len as u16).to_le_bytes());
    } else {
        out.push(OP_PUSHDATA4);
        out.extend_from_slice(&(len as u32).to_le_bytes());
    }
    out.extend_from_slice(item);
}
