//! JSON parsing for upstream payloads.

use anyhow::Result;

/// Parse JSON and, on failure, report the serde path and location of the
/// offending value rather than just the raw serde message.
pub fn parse_json_with_context<T: serde::de::DeserializeOwned>(body: &str) -> Result<T> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(jd).map_err(|err| {
        let inner = err.inner();
        let (line, column) = (inner.line(), inner.column());
        let path = err.path().to_string();

        let msg = inner.to_string();
        let loc = format!(" at line {line} column {column}");
        let msg = msg.strip_suffix(&loc).unwrap_or(&msg);

        if path.is_empty() || path == "." {
            anyhow::anyhow!("{msg} (line {line} col {column})")
        } else {
            anyhow::anyhow!("at path '{path}': {msg} (line {line} col {column})")
        }
    })
}
