//! txsize-rs derives byte-layout and stack-usage metrics from raw
//! Bitcoin transactions and scripts.
//!
//! Transactions are parsed from wire bytes (or explorer JSON) into a
//! model whose per-section byte lengths always agree with the
//! serialized form, witness stacks can be re-encoded as legacy-style
//! script bytes, and script fragments are statically analyzed for the
//! worst-case stack depth, element size and hash-preimage lengths a
//! fixed-capacity executor needs.
//!
//! # Examples
//!
//! ```
//! # use txsize_rs::tx::Transaction;
//! // The first Bitcoin mainnet transaction between Satoshi and Hal,
//! // f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16.
//! # let raw = "0100000001c997a5e56e104102fa209c6a852dd90660a20b2d9c352423edce25857fcd3704000000004847304402204e45e16932b8af514961a1d3a1a25fdf3f4f7732e9d624c6c61548ab5fb8cd410220181522ec8eca07de4860a4acdd12909d831cc56cbbac4622082221a8768d1d0901ffffffff0200ca9a3b00000000434104ae1a62fe09c5f51b13905f07f06b99a2f7159b2225f374cd378d71302fa28414e7aab37397f554a7df5f142c21c1b7303b8a0626f1baded5c72a704f7e6cd84cac00286bee0000000043410411db93e1dcdb8a016b49840f8c53bc1eb68a382e97b1482ecad7b148a6909a5cb2e0eaddfb84ccf9744464f82e160bfa9b8b64f9d4c03f999b8643f656b412a3ac00000000";
//! let tx = Transaction::from_hex(raw).unwrap();
//!
//! assert!(!tx.is_segwit());
//! assert_eq!(tx.byte_len(), 275);
//! assert_eq!(tx.input_section_byte_len(), 114);
//! assert_eq!(tx.output_section_byte_len(), 153);
//! assert_eq!(tx.to_hex(), raw);
//! ```
//!
//! ```
//! # use txsize_rs::tx::Transaction;
//! // Mainnet P2WPKH spend
//! // 3d896cc02c6be867c1619bfcce8c96284f2fd17b34f070ab4b307b56edcf1a12.
//! # let raw = "02000000000101f795ab70b2c98c1b97fdbd1e98a238bdbc4336362099ea2d07fd7b5db7c48aa72500000000ffffffff01236500000000000017a914f73d4190dba76f89573d8ecca6cd49c7ca9e852b870247304402202f95f204b7663a61f8d8a8b6691562d23f6774b3ed64b3d993233fa1ed6c6c98022005723fe5c98182aca858dfab50ea4e68103ddfd83ca10480c825169897fff42901210201fe8351e1908fc82cb314ca4a532d7a9d81726d9fd60df0487ff7dd4235c4e300000000";
//! let tx = Transaction::from_hex(raw).unwrap();
//!
//! assert!(tx.is_segwit());
//! assert_eq!(tx.max_witness_items(), 2);
//! assert_eq!(tx.witness_section_byte_len(), 107);
//!
//! // The witness stack as the scriptSig it is equivalent to: a 71-byte
//! // signature push followed by a 33-byte pubkey push.
//! let script = tx.witness_as_script(0, 0).unwrap();
//! assert_eq!(script[0], 0x47);
//! assert_eq!(script[72], 0x21);
//! ```

pub mod compact_size;
pub mod json;
pub mod script;
pub mod tx;
pub mod witness;
