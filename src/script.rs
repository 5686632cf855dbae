//! Static size analysis of Bitcoin Script byte strings.
//!
//! The analyzer walks a script linearly and derives the worst-case
//! sizing a fixed-capacity stack machine needs to execute it: opcode
//! count, required stack depth, the largest pushed element, and the
//! exact byte lengths flowing into hash opcodes. It deliberately does
//! not model Script semantics beyond per-opcode stack-depth effects;
//! where runtime state is unavoidable (hash preimage lengths, which
//! depend on prior stack shuffling), execution is delegated to a
//! [ScriptExecutionOracle].
//!
//! The depth classification overestimates true Script semantics for
//! some opcodes on purpose: the result sizes fixed buffers downstream
//! and must stay an upper bound, never an exact trace.

use crate::tx::Transaction;
use std::collections::HashSet;
use std::{error, fmt};

const OP_PUSHDATA1: u8 = 76;
const OP_PUSHDATA2: u8 = 77;
const OP_PUSHDATA4: u8 = 78;
const OP_1: u8 = 81;
const OP_16: u8 = 96;
const OP_TOALTSTACK: u8 = 107;
const OP_FROMALTSTACK: u8 = 108;
const OP_CODESEPARATOR: u8 = 171;
const OP_RIPEMD160: u8 = 166;
const OP_HASH256: u8 = 170;
const OP_CHECKMULTISIG: u8 = 174;
const OP_CHECKMULTISIGVERIFY: u8 = 175;

/// Extra stack slots added on top of the simulated high-water mark;
/// headroom required by the fixed-capacity stack machine consuming the
/// analysis.
pub const STACK_HEADROOM: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OracleError {
    /// The interpreter rejected or aborted on the element sequence.
    ExecutionFailed(String),
    /// The interpreter finished with no element left to measure.
    EmptyStack,
}

impl fmt::Display for OracleError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OracleError::ExecutionFailed(why) => write!(f, "script execution failed: {}", why),
            OracleError::EmptyStack => write!(f, "script execution left an empty stack"),
        }
    }
}

impl error::Error for OracleError {}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScriptError {
    /// A push at `position` declared `wanted` data bytes but only
    /// `available` remain in the script.
    TruncatedPush {
        position: usize,
        wanted: usize,
        available: usize,
    },
    /// A multisig opcode at byte `position` had no decodable count
    /// operands at the expected stack positions.
    MultisigOperand { position: usize },
    /// The delegated script execution failed.
    Oracle(OracleError),
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScriptError::TruncatedPush {
                position,
                wanted,
                available,
            } => write!(
                f,
                "push at byte {} declares {} bytes but {} remain",
                position, wanted, available
            ),
            ScriptError::MultisigOperand { position } => {
                write!(f, "multisig opcode at byte {} has no count operands", position)
            }
            ScriptError::Oracle(e) => write!(f, "execution oracle: {}", e),
        }
    }
}

impl error::Error for ScriptError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            ScriptError::Oracle(ref e) => Some(e),
            _ => None,
        }
    }
}

impl From<OracleError> for ScriptError {
    fn from(e: OracleError) -> Self {
        ScriptError::Oracle(e)
    }
}

/// One parsed script element: a bare opcode or a data push with its
/// payload.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ScriptElement {
    Op(u8),
    Push(Vec<u8>),
}

/// Verification flags forwarded verbatim to the execution oracle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExecutionFlag {
    P2sh,
    StrictDer,
    NullDummy,
    Witness,
    Taproot,
}

/// A consensus Script interpreter the analyzer delegates to whenever a
/// data length can only be known at runtime.
///
/// Implementations interpret `elements` under full Script semantics
/// against the given transaction input and return the resulting data
/// stack, bottom first. The analyzer only ever reads the byte length of
/// the top element.
pub trait ScriptExecutionOracle {
    fn execute(
        &self,
        elements: &[ScriptElement],
        tx: &Transaction,
        input_index: usize,
        flags: &[ExecutionFlag],
    ) -> Result<Vec<Vec<u8>>, OracleError>;
}

/// Records the operand size of one hash opcode or the counts of one
/// multisig opcode, for sizing a fixed-capacity circuit buffer.
///
/// Hash opcodes carry `data_len` (the exact preimage length) with
/// `n == m == 0`; multisig opcodes carry `n` (public key count) and `m`
/// (signature threshold) with `data_len == 0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SizeDescriptor {
    pub opcode: u8,
    pub data_len: usize,
    pub n: u8,
    pub m: u8,
}

/// The sizing derived from one script fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisResult {
    /// Number of opcodes scanned (a data push counts as one).
    pub opcodes: usize,
    /// Simulated stack high-water mark (alt stack folded in) plus
    /// [STACK_HEADROOM].
    pub required_stack_depth: usize,
    /// Largest data push in bytes.
    pub max_element_size: usize,
    /// Deduplicated hash and multisig operand records.
    pub size_descriptors: HashSet<SizeDescriptor>,
    /// This fragment's parsed elements, in order, without the prefix it
    /// was analyzed under. Feed a slice of these as the prefix of the
    /// next fragment when chaining scriptSig, redeemScript and
    /// witnessScript.
    pub elements: Vec<ScriptElement>,
    /// Byte length of the script after the last OP_CODESEPARATOR; the
    /// whole script length when none is present. This is the portion a
    /// signature check covers.
    pub script_code_len: usize,
}

impl AnalysisResult {
    /// Combines two fragments that execute on separate stacks (or with
    /// the stack cleared in between): sizes do not add up, so each
    /// metric is the pairwise maximum and the descriptor sets are
    /// unioned.
    pub fn combine_independent(&self, other: &AnalysisResult) -> AnalysisResult {
        self.combine(other, false)
    }

    /// Combines two fragments that execute back to back onto one
    /// continuous stack: their depth requirements (each already carrying
    /// its own headroom) and opcode counts add up.
    pub fn combine_stacked(&self, other: &AnalysisResult) -> AnalysisResult {
        self.combine(other, true)
    }

    fn combine(&self, other: &AnalysisResult, stacked: bool) -> AnalysisResult {
        let mut size_descriptors = self.size_descriptors.clone();
        size_descriptors.extend(other.size_descriptors.iter().cloned());
        let mut elements = self.elements.clone();
        elements.extend(other.elements.iter().cloned());
        AnalysisResult {
            opcodes: if stacked {
                self.opcodes + other.opcodes
            } else {
                self.opcodes.max(other.opcodes)
            },
            required_stack_depth: if stacked {
                self.required_stack_depth + other.required_stack_depth
            } else {
                self.required_stack_depth.max(other.required_stack_depth)
            },
            max_element_size: self.max_element_size.max(other.max_element_size),
            size_descriptors,
            elements,
            script_code_len: self.script_code_len.max(other.script_code_len),
        }
    }
}

// Net stack-depth effect of a non-push opcode. The classification is a
// worst-case sizing table, not Script semantics; unlisted opcodes
// (flow control, no-ops, hash and multisig opcodes) are depth neutral.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StackEffect {
    Push1,
    Push2,
    Push3,
    Pop1,
    Pop2,
    AltPush,
    AltPop,
    Neutral,
}

fn stack_effect(opcode: u8) -> StackEffect {
    match opcode {
        OP_TOALTSTACK => StackEffect::AltPush,
        OP_FROMALTSTACK => StackEffect::AltPop,
        0 | 79 | 81..=96 | 115 | 116 | 118 | 120 | 125 | 130 => StackEffect::Push1,
        110 | 112 => StackEffect::Push2,
        111 => StackEffect::Push3,
        105 | 117 | 119 | 122 | 135 | 147 | 148 | 154..=164 | 172 => StackEffect::Pop1,
        109 | 136 | 165 | 173 | 186 => StackEffect::Pop2,
        _ => StackEffect::Neutral,
    }
}

/// Analyzes script fragments in the context of one transaction input.
///
/// The analyzer itself is stateless; each call to [ScriptAnalyzer::analyze]
/// or [ScriptAnalyzer::analyze_with_prefix] is an independent pass.
pub struct ScriptAnalyzer<'a> {
    tx: &'a Transaction,
    input_index: usize,
    oracle: &'a dyn ScriptExecutionOracle,
    flags: &'a [ExecutionFlag],
}

impl<'a> ScriptAnalyzer<'a> {
    pub fn new(
        tx: &'a Transaction,
        input_index: usize,
        oracle: &'a dyn ScriptExecutionOracle,
    ) -> Self {
        ScriptAnalyzer {
            tx,
            input_index,
            oracle,
            flags: &[],
        }
    }

    pub fn with_flags(mut self, flags: &'a [ExecutionFlag]) -> Self {
        self.flags = flags;
        self
    }

    /// Analyzes a stand-alone script fragment.
    pub fn analyze(&self, script: &[u8]) -> Result<AnalysisResult, ScriptError> {
        self.analyze_with_prefix(script, &[])
    }

    /// Analyzes a script fragment that executes after `prefix` elements
    /// have already been materialized (a redeemScript after its
    /// scriptSig, a witnessScript after the witness items). The prefix
    /// takes part in hash-opcode delegation and multisig operand
    /// lookbehind but is not re-counted in the fragment's own metrics.
    pub fn analyze_with_prefix(
        &self,
        script: &[u8],
        prefix: &[ScriptElement],
    ) -> Result<AnalysisResult, ScriptError> {
        let mut elements: Vec<ScriptElement> = prefix.to_vec();
        let prefix_len = elements.len();

        let mut opcodes = 0usize;
        let mut depth: i64 = 0;
        let mut max_depth: i64 = 0;
        let mut alt_depth: i64 = 0;
        let mut max_alt_depth: i64 = 0;
        let mut max_element_size = 0usize;
        let mut size_descriptors = HashSet::new();
        let mut code_sep_end = 0usize;

        let mut i = 0usize;
        while i < script.len() {
            let opcode = script[i];
            opcodes += 1;

            if let Some((data, next)) = read_push(script, i)? {
                if data.len() > max_element_size {
                    max_element_size = data.len();
                }
                depth += 1;
                elements.push(ScriptElement::Push(data.to_vec()));
                i = next;
            } else {
                match opcode {
                    OP_RIPEMD160..=OP_HASH256 => {
                        // Exactly how many bytes this opcode will hash is
                        // runtime state; run everything before it through
                        // the oracle and measure the top of the stack.
                        let stack = self
                            .oracle
                            .execute(&elements, self.tx, self.input_index, self.flags)
                            .map_err(ScriptError::Oracle)?;
                        let top = stack.last().ok_or(ScriptError::Oracle(OracleError::EmptyStack))?;
                        size_descriptors.insert(SizeDescriptor {
                            opcode,
                            data_len: top.len(),
                            n: 0,
                            m: 0,
                        });
                    }
                    OP_CHECKMULTISIG | OP_CHECKMULTISIGVERIFY => {
                        let (n, m) = multisig_operands(&elements, i)?;
                        size_descriptors.insert(SizeDescriptor {
                            opcode,
                            data_len: 0,
                            n,
                            m,
                        });
                    }
                    OP_CODESEPARATOR => {
                        code_sep_end = i + 1;
                    }
                    _ => {}
                }

                match stack_effect(opcode) {
                    StackEffect::Push1 => depth += 1,
                    StackEffect::Push2 => depth += 2,
                    StackEffect::Push3 => depth += 3,
                    StackEffect::Pop1 => depth -= 1,
                    StackEffect::Pop2 => depth -= 2,
                    StackEffect::AltPush => {
                        depth -= 1;
                        alt_depth += 1;
                    }
                    StackEffect::AltPop => {
                        depth += 1;
                        alt_depth -= 1;
                    }
                    StackEffect::Neutral => {}
                }

                elements.push(ScriptElement::Op(opcode));
                i += 1;
            }

            if depth > max_depth {
                max_depth = depth;
            }
            if alt_depth > max_alt_depth {
                max_alt_depth = alt_depth;
            }
        }

        let high_water = max_depth.max(max_alt_depth).max(0) as usize;
        Ok(AnalysisResult {
            opcodes,
            required_stack_depth: high_water + STACK_HEADROOM,
            max_element_size,
            size_descriptors,
            elements: elements.split_off(prefix_len),
            script_code_len: script.len() - code_sep_end,
        })
    }
}

// Reads the push starting at `pos`, if `script[pos]` is a push opcode.
// Returns the payload and the position after it.
fn read_push(script: &[u8], pos: usize) -> Result<Option<(&[u8], usize)>, ScriptError> {
    let opcode = script[pos];
    let (len, data_start) = match opcode {
        1..=75 => (opcode as usize, pos + 1),
        OP_PUSHDATA1 => {
            let field = length_field(script, pos, 1)?;
            (field[0] as usize, pos + 2)
        }
        OP_PUSHDATA2 => {
            let field = length_field(script, pos, 2)?;
            (u16::from_le_bytes([field[0], field[1]]) as usize, pos + 3)
        }
        OP_PUSHDATA4 => {
            let field = length_field(script, pos, 4)?;
            (
                u32::from_le_bytes([field[0], field[1], field[2], field[3]]) as usize,
                pos + 5,
            )
        }
        _ => return Ok(None),
    };
    let data = script
        .get(data_start..)
        .and_then(|rest| rest.get(..len))
        .ok_or(ScriptError::TruncatedPush {
            position: pos,
            wanted: len,
            available: script.len().saturating_sub(data_start),
        })?;
    Ok(Some((data, data_start + len)))
}

fn length_field(script: &[u8], pos: usize, width: usize) -> Result<&[u8], ScriptError> {
    script
        .get(pos + 1..pos + 1 + width)
        .ok_or(ScriptError::TruncatedPush {
            position: pos,
            wanted: width,
            available: script.len().saturating_sub(pos + 1),
        })
}

// CHECKMULTISIG stack layout looking back from the opcode: the element
// right before it is n (public key count), the element n positions
// behind that is m (signature threshold). Both may live in an earlier
// fragment, which is why lookbehind runs over the full element
// sequence.
fn multisig_operands(elements: &[ScriptElement], byte_pos: usize) -> Result<(u8, u8), ScriptError> {
    let missing = ScriptError::MultisigOperand { position: byte_pos };
    let last = elements.len().checked_sub(1).ok_or_else(|| missing.clone())?;
    let n = operand_value(&elements[last]).ok_or_else(|| missing.clone())?;
    let m_index = last
        .checked_sub(1 + n as usize)
        .ok_or_else(|| missing.clone())?;
    let m = operand_value(&elements[m_index]).ok_or(missing)?;
    Ok((n, m))
}

// Decodes a count operand: OP_0, OP_1..OP_16, or a small little-endian
// data push.
fn operand_value(element: &ScriptElement) -> Option<u8> {
    match element {
        ScriptElement::Op(0) => Some(0),
        ScriptElement::Op(op) if (OP_1..=OP_16).contains(op) => Some(op - OP_1 + 1),
        ScriptElement::Push(bytes) if bytes.len() <= 4 => {
            let value = bytes
                .iter()
                .rev()
                .fold(0u32, |acc, &b| (acc << 8) | u32::from(b));
            if value <= u32::from(u8::MAX) {
                Some(value as u8)
            } else {
                None
            }
        }
        _ => None,
    }
}
