//! Formula data: from extraction sidecars to a counted set of encoded
//! formula token sequences.
//!
//! - [`reader`]: validates one sidecar and encodes its valid formulas
//! - [`encode`]: the packed 16-bit token code and its decoding
//! - [`trie`]: distinct code sequences with occurrence counts
//! - [`store`]: binary persistence and the text dump
//! - [`processor`]: many files, sequentially or split across a thread pool

pub mod encode;
pub mod error;
pub mod processor;
pub mod reader;
pub mod store;
pub mod trie;

pub use encode::{decode_token, decode_tokens, encode_function, encode_operator, encode_simple};
pub use error::DataError;
pub use processor::{
    FileOutcome, FormulaDataProcessor, ProcessorOptions, ProcessorReport, ThreadPolicy,
    QUEUE_DEPTH, TOKENS_FILENAME,
};
pub use reader::{FileReport, FormulaXmlReader};
pub use store::{dump, load, load_file, save, save_file};
pub use trie::FormulaTrie;
