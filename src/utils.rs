use anyhow::Result;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Create an OSC8 hyperlink for terminal output
pub fn osc8_link(url: &str, text: &str) -> String {
    format!("\x1b]8;;{}\x1b\\{}\x1b]8;;\x1b\\", url, text)
}

/// HTTP client shared by every request of a run
pub fn http_client() -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

    let client = Client::builder()
        .user_agent(concat!("cardsheets/", env!("CARGO_PKG_VERSION")))
        .default_headers(headers)
        .build()?;
    Ok(client)
}

/// Delete a file, logging instead of failing. Returns whether the file was removed.
pub fn try_remove_file(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            log::warn!("Could not remove {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_osc8_link() {
        assert_eq!(
            osc8_link("https://example.com", "sheet"),
            "\x1b]8;;https://example.com\x1b\\sheet\x1b]8;;\x1b\\"
        );
    }

    #[test]
    fn test_try_remove_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("download.json");
        fs::write(&path, "[]").unwrap();

        assert!(try_remove_file(&path));
        assert!(!path.exists());
        assert!(!try_remove_file(&path));
    }
}
