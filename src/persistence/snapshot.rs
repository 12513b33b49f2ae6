use crate::error::KvResult;
use crate::store::item::Item;

/// Encode one item as a JSON line, newline included.
pub fn encode_item(item: &Item) -> KvResult<Vec<u8>> {
    let mut line = serde_json::to_vec(item)?;
    line.push(b'\n');
    Ok(line)
}

/// Decode one raw line of a backup stream. Blank lines yield `None`.
///
/// Bytes that are not valid UTF-8 fail like any other malformed record.
pub fn decode_line(line: &[u8]) -> KvResult<Option<Item>> {
    if line.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(None);
    }
    Ok(Some(serde_json::from_slice(line)?))
}
