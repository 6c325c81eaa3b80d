/// Drop every byte below 0x20 except tab, LF and CR.
///
/// These control characters are illegal in XML 1.0, and a single stray
/// U+0008 is enough to make an otherwise valid feed unparseable.
pub fn sanitize(raw: &[u8]) -> Vec<u8> {
    raw.iter()
        .copied()
        .filter(|&b| b >= 0x20 || matches!(b, b'\t' | b'\n' | b'\r'))
        .collect()
}
