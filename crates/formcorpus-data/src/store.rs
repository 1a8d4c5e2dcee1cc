//! Binary persistence of a [`FormulaTrie`].
//!
//! ```text
//! magic    8 bytes   "FCTRIE01"
//! count    u32 LE    number of entries
//! entry*   u16 LE    sequence length n
//!          n × u16 LE token codes
//!          u32 LE    occurrence count
//! ```
//!
//! Entries are written in sequence order.

use crate::encode::decode_tokens;
use crate::error::DataError;
use crate::trie::FormulaTrie;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

pub const MAGIC: &[u8; 8] = b"FCTRIE01";

fn io_err(path: &Path) -> impl FnOnce(io::Error) -> DataError + '_ {
    move |source| DataError::Io {
        path: path.to_path_buf(),
        source,
    }
}

pub fn save<W: Write>(trie: &FormulaTrie, mut out: W) -> io::Result<()> {
    let count = u32::try_from(trie.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many entries"))?;
    out.write_all(MAGIC)?;
    out.write_all(&count.to_le_bytes())?;
    for (tokens, occurrences) in trie.iter() {
        let len = u16::try_from(tokens.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "token sequence too long"))?;
        out.write_all(&len.to_le_bytes())?;
        for code in tokens {
            out.write_all(&code.to_le_bytes())?;
        }
        out.write_all(&occurrences.to_le_bytes())?;
    }
    out.flush()
}

pub fn save_file(trie: &FormulaTrie, path: impl AsRef<Path>) -> Result<(), DataError> {
    let path = path.as_ref();
    let file = File::create(path).map_err(io_err(path))?;
    save(trie, BufWriter::new(file)).map_err(io_err(path))
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], DataError> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.bytes.len());
        let Some(end) = end else {
            return Err(DataError::InvalidStore(format!(
                "truncated at byte {} (wanted {n} more)",
                self.pos
            )));
        };
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u16(&mut self) -> Result<u16, DataError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, DataError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

/// Parse a store from bytes.
pub fn load_bytes(bytes: &[u8]) -> Result<FormulaTrie, DataError> {
    let mut cur = Cursor { bytes, pos: 0 };
    if cur.take(MAGIC.len()).ok() != Some(&MAGIC[..]) {
        return Err(DataError::InvalidStore("bad magic".to_string()));
    }
    let count = cur.u32()?;
    let mut trie = FormulaTrie::new();
    for _ in 0..count {
        let len = cur.u16()? as usize;
        let mut tokens = Vec::with_capacity(len);
        for _ in 0..len {
            tokens.push(cur.u16()?);
        }
        let occurrences = cur.u32()?;
        trie.insert_count(&tokens, occurrences);
    }
    if cur.pos != bytes.len() {
        return Err(DataError::InvalidStore(format!(
            "{} trailing bytes",
            bytes.len() - cur.pos
        )));
    }
    Ok(trie)
}

pub fn load<R: Read>(mut input: R) -> Result<FormulaTrie, DataError> {
    let mut bytes = Vec::new();
    input
        .read_to_end(&mut bytes)
        .map_err(|e| DataError::InvalidStore(e.to_string()))?;
    load_bytes(&bytes)
}

pub fn load_file(path: impl AsRef<Path>) -> Result<FormulaTrie, DataError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(io_err(path))?;
    load_bytes(&bytes)
}

/// One line per entry: each decoded token followed by a space, then `(count)`.
pub fn dump<W: Write>(trie: &FormulaTrie, mut out: W) -> Result<(), DataError> {
    let io = |source| DataError::Io {
        path: "<dump>".into(),
        source,
    };
    for (tokens, occurrences) in trie.iter() {
        for token in decode_tokens(tokens)? {
            write!(out, "{token} ").map_err(io)?;
        }
        writeln!(out, "({occurrences})").map_err(io)?;
    }
    out.flush().map_err(io)
}
