// Naming of files linked from chat responses. Download links carry the
// original name inside an encoded `content-disposition` style parameter
// (`attachment; filename=...`), which is where the name is taken from.

use reqwest::Url;
use std::time::{SystemTime, UNIX_EPOCH};

/// Build the local name for a download link:
/// `<prefix>_<id>_<pid>_<nanos>_<filename>`. Returns `None` when the link
/// carries no file name.
pub fn download_file_name(url: &str, prefix: &str, id: &str, pid: &str, nanos: u128) -> Option<String> {
    let decoded = urlencoding::decode(url).ok()?;
    let normalized = decoded.replace("&amp;", "&").replace(';', "&");
    let parsed = Url::parse(&normalized).ok()?;

    let filename = parsed
        .query_pairs()
        .find(|(k, _)| k == " filename")
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())?;

    Some([prefix, id, pid, &nanos.to_string(), &filename].join("_"))
}

/// Nanoseconds since the unix epoch, used to keep download names unique.
pub fn now_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default()
}
