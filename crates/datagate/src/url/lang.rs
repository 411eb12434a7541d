/// Parses an `Accept-Language` header into primary language tags ordered
/// by preference.
///
/// Only the first `limit` bytes are read. Wildcards and `q=0` entries are
/// skipped, duplicates keep their first position.
pub(super) fn accept_language(header: &str, limit: usize) -> Vec<String> {
    let mut end = header.len().min(limit);
    while !header.is_char_boundary(end) {
        end -= 1;
    }

    let mut tags: Vec<(String, f32)> = header[..end]
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';').map(str::trim);
            let tag = parts.next()?;
            let quality = parts
                .find_map(|param| param.strip_prefix("q="))
                .map(|q| q.parse::<f32>().unwrap_or(0.0))
                .unwrap_or(1.0);
            let primary = tag.split('-').next()?.to_ascii_lowercase();
            let valid = !primary.is_empty() && primary.chars().all(|c| c.is_ascii_alphabetic());
            (valid && quality > 0.0).then_some((primary, quality))
        })
        .collect();
    tags.sort_by(|(_, lhs), (_, rhs)| rhs.total_cmp(lhs));

    let mut langs: Vec<String> = vec![];
    for (tag, _) in tags {
        if !langs.contains(&tag) {
            langs.push(tag);
        }
    }
    langs
}
