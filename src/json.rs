//! Mapping of explorer-style JSON transaction documents onto the wire
//! model.
//!
//! Block explorers describe the same logical transaction as the wire
//! format but with display conventions: txids are byte-reversed, scripts
//! and witness items are hex strings, and the segwit marker/flag pair is
//! implied by the presence of witness data. [Transaction::from_explorer_json]
//! produces the identical model shape as [Transaction::parse_wire] would
//! for the equivalent wire bytes.

use crate::tx::{Input, Output, Transaction, TxError, Witness};
use serde::Deserialize;

#[derive(Deserialize)]
struct ExplorerTransaction {
    version: u32,
    inputs: Vec<ExplorerInput>,
    outputs: Vec<ExplorerOutput>,
    locktime: u32,
}

#[derive(Deserialize)]
struct ExplorerInput {
    /// Display byte order; reversed into wire order during mapping.
    txid: String,
    /// The spent output's index.
    output: u32,
    sigscript: String,
    sequence: u32,
    #[serde(default)]
    witness: Vec<String>,
}

#[derive(Deserialize)]
struct ExplorerOutput {
    value: u64,
    pkscript: String,
}

impl Transaction {
    /// Parses an explorer JSON document (fields `version`, `inputs`,
    /// `outputs`, `locktime`) into the same model [Transaction::parse_wire]
    /// builds from wire bytes. A missing or malformed field is reported
    /// as [TxError::UnsupportedShape].
    pub fn from_explorer_json(doc: &str) -> Result<Transaction, TxError> {
        let parsed: ExplorerTransaction =
            serde_json::from_str(doc).map_err(|e| TxError::UnsupportedShape(e.to_string()))?;
        build(parsed)
    }

    /// Like [Transaction::from_explorer_json] for an already-parsed
    /// [serde_json::Value].
    pub fn from_explorer_value(doc: serde_json::Value) -> Result<Transaction, TxError> {
        let parsed: ExplorerTransaction =
            serde_json::from_value(doc).map_err(|e| TxError::UnsupportedShape(e.to_string()))?;
        build(parsed)
    }
}

fn build(doc: ExplorerTransaction) -> Result<Transaction, TxError> {
    // Any input carrying witness data makes the whole transaction
    // segwit: marker 0, flag 1 on the wire.
    let segwit = doc.inputs.iter().any(|inp| !inp.witness.is_empty());

    let mut inputs = Vec::with_capacity(doc.inputs.len());
    let mut witnesses = Vec::new();
    for inp in doc.inputs.iter() {
        inputs.push(Input {
            txid: wire_order_txid(&inp.txid)?,
            vout: inp.output,
            script_sig: hex_field(&inp.sigscript, "sigscript")?,
            sequence: inp.sequence,
        });
        if segwit {
            let mut items = Vec::with_capacity(inp.witness.len());
            for item in inp.witness.iter() {
                items.push(hex_field(item, "witness")?);
            }
            witnesses.push(Witness { items });
        }
    }

    let mut outputs = Vec::with_capacity(doc.outputs.len());
    for out in doc.outputs.iter() {
        outputs.push(Output {
            value: out.value,
            script_pubkey: hex_field(&out.pkscript, "pkscript")?,
        });
    }

    Ok(Transaction {
        version: doc.version,
        segwit_flag: if segwit { Some(1) } else { None },
        inputs,
        outputs,
        witnesses,
        lock_time: doc.locktime,
    })
}

fn wire_order_txid(display_hex: &str) -> Result<[u8; 32], TxError> {
    let mut bytes = hex_field(display_hex, "txid")?;
    if bytes.len() != 32 {
        return Err(TxError::UnsupportedShape(format!(
            "txid is {} bytes, expected 32",
            bytes.len()
        )));
    }
    bytes.reverse();
    let mut txid = [0u8; 32];
    txid.copy_from_slice(&bytes);
    Ok(txid)
}

fn hex_field(value: &str, field: &str) -> Result<Vec<u8>, TxError> {
    hex::decode(value).map_err(|e| TxError::UnsupportedShape(format!("{}: {}", field, e)))
}

#[cfg(test)]
mod tests {
    use crate::tx::tests::{LEGACY_TX_HEX, SEGWIT_TX_HEX};
    use crate::tx::{Transaction, TxError};
    use serde_json::json;

    // Rebuilds the explorer document a block explorer would serve for a
    // wire-parsed transaction: reversed txids, hex scripts, witness hex
    // items.
    fn explorer_doc(tx: &Transaction) -> serde_json::Value {
        let inputs: Vec<serde_json::Value> = tx
            .inputs
            .iter()
            .enumerate()
            .map(|(i, inp)| {
                let mut display_txid = inp.txid;
                display_txid.reverse();
                let witness: Vec<String> = tx
                    .witnesses
                    .get(i)
                    .map(|w| w.items.iter().map(hex::encode).collect())
                    .unwrap_or_default();
                json!({
                    "txid": hex::encode(display_txid),
                    "output": inp.vout,
                    "sigscript": hex::encode(&inp.script_sig),
                    "sequence": inp.sequence,
                    "witness": witness,
                })
            })
            .collect();
        let outputs: Vec<serde_json::Value> = tx
            .outputs
            .iter()
            .map(|out| {
                json!({
                    "value": out.value,
                    "pkscript": hex::encode(&out.script_pubkey),
                })
            })
            .collect();
        json!({
            "version": tx.version,
            "inputs": inputs,
            "outputs": outputs,
            "locktime": tx.lock_time,
        })
    }

    #[test]
    fn explorer_document_matches_wire_parse() {
        for raw in [LEGACY_TX_HEX, SEGWIT_TX_HEX].iter() {
            let from_wire = Transaction::from_hex(raw).unwrap();
            let from_json =
                Transaction::from_explorer_value(explorer_doc(&from_wire)).unwrap();
            assert_eq!(from_json, from_wire);
            assert_eq!(from_json.serialize(), hex::decode(raw).unwrap());
            assert_eq!(from_json.is_segwit(), from_wire.is_segwit());
            assert_eq!(from_json.byte_len(), from_wire.byte_len());
            assert_eq!(
                from_json.input_section_byte_len(),
                from_wire.input_section_byte_len()
            );
            assert_eq!(
                from_json.output_section_byte_len(),
                from_wire.output_section_byte_len()
            );
        }
    }

    #[test]
    fn from_explorer_json_str() {
        let from_wire = Transaction::from_hex(SEGWIT_TX_HEX).unwrap();
        let doc = explorer_doc(&from_wire).to_string();
        let from_json = Transaction::from_explorer_json(&doc).unwrap();
        assert_eq!(from_json, from_wire);
    }

    #[test]
    fn missing_witness_field_means_legacy() {
        let doc = json!({
            "version": 1,
            "inputs": [{
                "txid": "00".repeat(32),
                "output": 0,
                "sigscript": "51",
                "sequence": 0xffffffffu32,
            }],
            "outputs": [{ "value": 1000, "pkscript": "51" }],
            "locktime": 0,
        });
        let tx = Transaction::from_explorer_value(doc).unwrap();
        assert!(!tx.is_segwit());
        assert!(tx.witnesses.is_empty());
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let doc = json!({
            "version": 1,
            "inputs": [{
                "txid": "00".repeat(32),
                "output": 0,
                // no sigscript
                "sequence": 0u32,
            }],
            "outputs": [],
            "locktime": 0,
        });
        match Transaction::from_explorer_value(doc) {
            Err(TxError::UnsupportedShape(_)) => {}
            other => panic!("expected UnsupportedShape, got {:?}", other),
        }
    }

    #[test]
    fn bad_txid_is_rejected() {
        let doc = json!({
            "version": 1,
            "inputs": [{
                "txid": "abcd",
                "output": 0,
                "sigscript": "",
                "sequence": 0u32,
            }],
            "outputs": [],
            "locktime": 0,
        });
        match Transaction::from_explorer_value(doc) {
            Err(TxError::UnsupportedShape(_)) => {}
            other => panic!("expected UnsupportedShape, got {:?}", other),
        }
    }
}
