use crate::config::EngineConfig;
use ignore::WalkBuilder;
use std::fs;
use std::hash::Hasher;
use std::io;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::Xxh3;

/// Build output and tool directories never hold project sources.
const SKIPPED_DIRS: &[&str] = &["target", "build", "out", "node_modules", ".weavescope"];

/// Single-byte encodings whose bytes map one-to-one onto the first 256
/// code points.
const LATIN1_NAMES: &[&str] = &["iso-8859-1", "iso8859-1", "latin1", "latin-1"];

/// Decoded content of one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceText {
    pub content: String,
    /// xxh3 of the raw bytes.
    pub hash: u64,
    /// Set when undecodable bytes were replaced with U+FFFD.
    pub lossy: bool,
}

pub struct Scanner;

impl Scanner {
    /// Relevant resources under `root`, honoring ignore files.
    pub fn collect_paths(root: &Path, config: &EngineConfig) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = WalkBuilder::new(root)
            .filter_entry(|entry| {
                !(entry.file_type().is_some_and(|t| t.is_dir())
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
            })
            .build()
            .filter_map(|entry| {
                let entry = entry.ok()?;
                let path = entry.path();
                if path.is_file() && config.is_relevant(path) {
                    return Some(path.to_path_buf());
                }
                None
            })
            .collect();
        paths.sort();
        paths
    }

    /// Reads and decodes `path`. Content that is not UTF-8 is decoded as
    /// Latin-1 when an XML prolog declares it, and lossily otherwise.
    pub fn read(path: &Path) -> io::Result<SourceText> {
        let bytes = fs::read(path)?;
        let hash = content_hash(&bytes);
        let (content, lossy) = decode(bytes);
        Ok(SourceText {
            content,
            hash,
            lossy,
        })
    }
}

pub fn content_hash(content: &[u8]) -> u64 {
    let mut hasher = Xxh3::new();
    hasher.write(content);
    hasher.finish()
}

fn decode(bytes: Vec<u8>) -> (String, bool) {
    match String::from_utf8(bytes) {
        Ok(content) => (content, false),
        Err(e) => {
            let bytes = e.into_bytes();
            if declares_latin1(&bytes) {
                (bytes.iter().map(|&b| char::from(b)).collect(), false)
            } else {
                (String::from_utf8_lossy(&bytes).into_owned(), true)
            }
        }
    }
}

fn declares_latin1(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(200)];
    let Some(end) = head.windows(2).position(|w| w == b"?>") else {
        return false;
    };
    let prolog = String::from_utf8_lossy(&head[..end]).to_ascii_lowercase();
    prolog.trim_start().starts_with("<?xml")
        && LATIN1_NAMES.iter().any(|name| {
            prolog.contains(&format!("\"{}\"", name)) || prolog.contains(&format!("'{}'", name))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_build_output_and_irrelevant_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/com/acme")).unwrap();
        fs::create_dir_all(root.join("target/classes")).unwrap();
        fs::write(root.join("src/com/acme/Service.java"), "class Service {}").unwrap();
        fs::write(root.join("src/aop.xml"), "<beans/>").unwrap();
        fs::write(root.join("target/classes/Copy.java"), "class Copy {}").unwrap();
        fs::write(root.join("README.md"), "docs").unwrap();

        let paths = Scanner::collect_paths(root, &EngineConfig::default());
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| !p.starts_with(root.join("target"))));

        let text = Scanner::read(&root.join("src/aop.xml")).unwrap();
        assert_eq!(text.content, "<beans/>");
        assert_eq!(text.hash, content_hash(b"<beans/>"));
        assert!(!text.lossy);
    }

    #[test]
    fn decodes_declared_latin1_and_replaces_stray_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let latin1 = dir.path().join("latin1.xml");
        let content = b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\n<beans caf\xe9=\"\"/>";
        fs::write(&latin1, content).unwrap();
        let text = Scanner::read(&latin1).unwrap();
        assert!(text.content.ends_with("<beans caf\u{e9}=\"\"/>"));
        assert!(!text.lossy);

        let stray = dir.path().join("stray.xml");
        fs::write(&stray, b"<beans>\xff</beans>").unwrap();
        let text = Scanner::read(&stray).unwrap();
        assert_eq!(text.content, "<beans>\u{fffd}</beans>");
        assert!(text.lossy);

        assert!(Scanner::read(&dir.path().join("missing.xml")).is_err());
    }
}
