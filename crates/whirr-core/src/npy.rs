//! Minimal NPY v1.0 encoding for the two arrays the index persists.
//!
//! The on-disk archive holds exactly two members: a 2-D `<f2` matrix of
//! vectors and a 1-D `|S{w}` array of zero-padded UTF-8 document ids. Only
//! those two dtypes are implemented; anything else in a header is rejected
//! with a descriptive message that the caller wraps into a corruption error.

use half::f16;

const MAGIC: &[u8] = b"\x93NUMPY";
const HEADER_ALIGN: usize = 64;

/// Encodes a row-major f16 matrix as a little-endian `<f2` NPY buffer.
pub(crate) fn encode_f16_2d(rows: usize, cols: usize, data: &[f16]) -> Vec<u8> {
    debug_assert_eq!(data.len(), rows * cols);
    let header = format!(
        "{{'descr': '<f2', 'fortran_order': False, 'shape': ({rows}, {cols}), }}"
    );
    let mut out = encode_header(&header);
    out.reserve(data.len() * 2);
    for value in data {
        out.extend_from_slice(&value.to_bits().to_le_bytes());
    }
    out
}

/// Decodes a `<f2` NPY buffer back into `(rows, cols, data)`.
pub(crate) fn decode_f16_2d(bytes: &[u8]) -> Result<(usize, usize, Vec<f16>), String> {
    let (header, payload) = split_header(bytes)?;
    if !header.contains("'<f2'") {
        return Err(format!("expected '<f2' dtype in header: {header}"));
    }
    let dims = parse_shape(&header)?;
    let (rows, cols) = match dims.as_slice() {
        [rows, cols] => (*rows, *cols),
        other => return Err(format!("expected 2-D shape, got {other:?}")),
    };
    let expected = rows * cols * 2;
    if payload.len() != expected {
        return Err(format!(
            "payload is {} bytes, shape ({rows}, {cols}) needs {expected}",
            payload.len()
        ));
    }
    let data = payload
        .chunks_exact(2)
        .map(|pair| f16::from_bits(u16::from_le_bytes([pair[0], pair[1]])))
        .collect();
    Ok((rows, cols, data))
}

/// Encodes UTF-8 strings as a fixed-width `|S{w}` NPY buffer.
///
/// Each entry is zero-padded to the longest id; the width is at least one
/// byte so an empty array still has a valid dtype.
pub(crate) fn encode_bytes_1d(items: &[&str]) -> Vec<u8> {
    let width = items.iter().map(|s| s.len()).max().unwrap_or(0).max(1);
    let header = format!(
        "{{'descr': '|S{width}', 'fortran_order': False, 'shape': ({},), }}",
        items.len()
    );
    let mut out = encode_header(&header);
    out.reserve(items.len() * width);
    for item in items {
        out.extend_from_slice(item.as_bytes());
        out.extend(std::iter::repeat(0u8).take(width - item.len()));
    }
    out
}

/// Decodes a `|S{w}` NPY buffer into UTF-8 strings, trailing NULs stripped.
pub(crate) fn decode_bytes_1d(bytes: &[u8]) -> Result<Vec<String>, String> {
    let (header, payload) = split_header(bytes)?;
    let width_start = header
        .find("|S")
        .ok_or_else(|| format!("expected '|S' dtype in header: {header}"))?;
    let width: usize = header[width_start + 2..]
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>()
        .parse()
        .map_err(|_| format!("bad string width in header: {header}"))?;
    let dims = parse_shape(&header)?;
    let count = match dims.as_slice() {
        [count] => *count,
        other => return Err(format!("expected 1-D shape, got {other:?}")),
    };
    if payload.len() != count * width {
        return Err(format!(
            "payload is {} bytes, shape ({count},) with width {width} needs {}",
            payload.len(),
            count * width
        ));
    }
    payload
        .chunks_exact(width)
        .map(|chunk| {
            let trimmed = chunk.iter().rposition(|b| *b != 0).map_or(0, |p| p + 1);
            String::from_utf8(chunk[..trimmed].to_vec())
                .map_err(|_| "document id is not valid UTF-8".to_string())
        })
        .collect()
}

fn encode_header(dict: &str) -> Vec<u8> {
    // Pad with spaces so magic + version + length + header is a multiple of
    // 64 bytes, newline terminated, matching the NPY v1.0 layout.
    let prefix = MAGIC.len() + 2 + 2;
    let unpadded = prefix + dict.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    let header_len = dict.len() + padding + 1;

    let mut out = Vec::with_capacity(prefix + header_len);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&u16::try_from(header_len).unwrap_or(u16::MAX).to_le_bytes());
    out.extend_from_slice(dict.as_bytes());
    out.extend(std::iter::repeat(b' ').take(padding));
    out.push(b'\n');
    out
}

fn split_header(bytes: &[u8]) -> Result<(String, &[u8]), String> {
    if bytes.len() < MAGIC.len() + 4 || &bytes[..MAGIC.len()] != MAGIC {
        return Err("missing NPY magic".to_string());
    }
    let major = bytes[MAGIC.len()];
    if major != 1 {
        return Err(format!("unsupported NPY version {major}"));
    }
    let len_start = MAGIC.len() + 2;
    let header_len = u16::from_le_bytes([bytes[len_start], bytes[len_start + 1]]) as usize;
    let data_start = len_start + 2 + header_len;
    if bytes.len() < data_start {
        return Err("truncated NPY header".to_string());
    }
    let header = String::from_utf8_lossy(&bytes[len_start + 2..data_start]).into_owned();
    Ok((header, &bytes[data_start..]))
}

fn parse_shape(header: &str) -> Result<Vec<usize>, String> {
    let open = header
        .find("'shape':")
        .and_then(|at| header[at..].find('(').map(|p| at + p))
        .ok_or_else(|| format!("no shape in header: {header}"))?;
    let close = header[open..]
        .find(')')
        .map(|p| open + p)
        .ok_or_else(|| format!("unterminated shape in header: {header}"))?;
    header[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<usize>()
                .map_err(|_| format!("bad shape element '{part}'"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f16_matrix_round_trip() {
        let data: Vec<f16> = (0..12).map(|i| f16::from_f32(i as f32 * 0.25)).collect();
        let encoded = encode_f16_2d(3, 4, &data);
        let (rows, cols, decoded) = decode_f16_2d(&encoded).unwrap();
        assert_eq!((rows, cols), (3, 4));
        assert_eq!(decoded, data);
    }

    #[test]
    fn empty_matrix_round_trip() {
        let encoded = encode_f16_2d(0, 384, &[]);
        let (rows, cols, decoded) = decode_f16_2d(&encoded).unwrap();
        assert_eq!((rows, cols), (0, 384));
        assert!(decoded.is_empty());
    }

    #[test]
    fn doc_ids_round_trip_with_mixed_lengths() {
        let ids = ["a", "doc-10", "long-document-identifier"];
        let encoded = encode_bytes_1d(&ids);
        let decoded = decode_bytes_1d(&encoded).unwrap();
        assert_eq!(decoded, ids);
    }

    #[test]
    fn empty_id_array_round_trip() {
        let encoded = encode_bytes_1d(&[]);
        assert_eq!(decode_bytes_1d(&encoded).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn header_is_64_byte_aligned() {
        let encoded = encode_f16_2d(1, 1, &[f16::from_f32(1.0)]);
        let header_len = u16::from_le_bytes([encoded[8], encoded[9]]) as usize;
        assert_eq!((10 + header_len) % 64, 0);
        assert_eq!(encoded[10 + header_len - 1], b'\n');
    }

    #[test]
    fn rejects_foreign_payloads() {
        assert!(decode_f16_2d(b"not an npy file").is_err());
        let wrong_dtype = encode_bytes_1d(&["x"]);
        assert!(decode_f16_2d(&wrong_dtype).is_err());
    }

    #[test]
    fn rejects_truncated_payload() {
        let mut encoded = encode_f16_2d(2, 2, &[f16::ZERO; 4]);
        encoded.truncate(encoded.len() - 2);
        assert!(decode_f16_2d(&encoded).is_err());
    }
}
