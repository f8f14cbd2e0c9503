//! Baseline system for hold-the-line analysis
//!
//! Allows adopting frost without fixing legacy code first. A baseline file
//! records the ids of accepted findings; later runs drop findings whose id is
//! recorded, so only new issues are reported.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <Baseline>
//!   <ManuallySuppressedIssues>
//!     <ID>LongMethod:Legacy.kt:Legacy.run()</ID>
//!   </ManuallySuppressedIssues>
//!   <CurrentIssues>
//!     <ID>LargeClass:Foo.kt:Foo</ID>
//!   </CurrentIssues>
//! </Baseline>
//! ```
//!
//! Manually suppressed ids are curated by hand and survive every update;
//! current ids are replaced wholesale whenever the baseline is recreated.

use crate::diagnostic::Finding;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

const ROOT: &str = "Baseline";
const MANUAL: &str = "ManuallySuppressedIssues";
const CURRENT: &str = "CurrentIssues";
const ID: &str = "ID";

/// Error reading or writing a baseline
#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed baseline {file}: {message}")]
    Malformed { file: String, message: String },

    #[error("Unexpected baseline structure in {file}: {message}")]
    Structure { file: String, message: String },
}

/// Result of [`Baseline::create_or_update`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file was written
    Written,
    /// The file already had exactly this content
    Unchanged,
    /// Nothing to record and no existing file
    Skipped,
}

/// Accepted finding ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Baseline {
    pub manually_suppressed: BTreeSet<String>,
    pub current: BTreeSet<String>,
}

impl Baseline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a baseline; a missing file is an empty baseline
    pub fn load(path: &Path) -> Result<Self, BaselineError> {
        if !path.exists() {
            log::debug!("No baseline at {}, using an empty one", path.display());
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse baseline XML; `origin` names the source in errors
    pub fn parse(content: &str, origin: &str) -> Result<Self, BaselineError> {
        #[derive(Clone, Copy, PartialEq)]
        enum Section {
            None,
            Manual,
            Current,
        }

        let malformed = |reader: &Reader<&[u8]>, e: &dyn std::fmt::Display| BaselineError::Malformed {
            file: origin.to_string(),
            message: format!("{} at byte {}", e, reader.buffer_position()),
        };
        let structure = |message: String| BaselineError::Structure {
            file: origin.to_string(),
            message,
        };

        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(true);

        let mut baseline = Self::new();
        let mut stack: Vec<String> = Vec::new();
        let mut section = Section::None;
        let mut id = String::new();
        let mut seen_root = false;

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    match (stack.len(), name.as_str()) {
                        (0, ROOT) if !seen_root => seen_root = true,
                        (0, other) => return Err(structure(format!("unexpected root element <{}>", other))),
                        (1, MANUAL) => section = Section::Manual,
                        (1, CURRENT) => section = Section::Current,
                        (2, ID) if section != Section::None => id.clear(),
                        (_, other) => return Err(structure(format!("unexpected element <{}>", other))),
                    }
                    stack.push(name);
                }
                Ok(Event::Empty(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    match (stack.len(), name.as_str()) {
                        (0, ROOT) if !seen_root => seen_root = true,
                        (1, MANUAL | CURRENT) | (2, ID) => {}
                        (_, other) => return Err(structure(format!("unexpected element <{}>", other))),
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(|err| malformed(&reader, &err))?;
                    if stack.len() == 3 {
                        id.push_str(&text);
                    } else if !text.trim().is_empty() {
                        return Err(structure(format!("unexpected text '{}'", text.trim())));
                    }
                }
                Ok(Event::End(_)) => {
                    let closed = stack.pop();
                    match (stack.len(), closed.as_deref()) {
                        (2, Some(ID)) => {
                            let value = id.trim();
                            if !value.is_empty() {
                                match section {
                                    Section::Manual => baseline.manually_suppressed.insert(value.to_string()),
                                    Section::Current => baseline.current.insert(value.to_string()),
                                    Section::None => false,
                                };
                            }
                        }
                        (1, _) => section = Section::None,
                        _ => {}
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(malformed(&reader, &e)),
            }
        }

        if !seen_root {
            return Err(structure(format!("missing <{}> root element", ROOT)));
        }
        if !stack.is_empty() {
            return Err(BaselineError::Malformed {
                file: origin.to_string(),
                message: format!("unclosed element <{}>", stack.join("> <")),
            });
        }

        Ok(baseline)
    }

    /// Whether `id` is in either set
    pub fn contains(&self, id: &str) -> bool {
        self.current.contains(id) || self.manually_suppressed.contains(id)
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.manually_suppressed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.current.len() + self.manually_suppressed.len()
    }

    /// Drop every suppressible finding whose baseline id is recorded
    pub fn filter(&self, findings: Vec<Finding>) -> Vec<Finding> {
        findings
            .into_iter()
            .filter(|f| !f.suppressible || !self.contains(&f.baseline_id()))
            .collect()
    }

    /// Recorded findings the baseline is not allowed to drop
    pub fn blocked<'a>(&self, findings: &'a [Finding]) -> Vec<&'a Finding> {
        findings
            .iter()
            .filter(|f| !f.suppressible && self.contains(&f.baseline_id()))
            .collect()
    }

    /// This baseline with `current` replaced by the ids of `findings`
    ///
    /// Ids that are manually suppressed stay out of `current`.
    pub fn with_findings(&self, findings: &[Finding]) -> Self {
        let current = findings
            .iter()
            .map(Finding::baseline_id)
            .filter(|id| !self.manually_suppressed.contains(id))
            .collect();
        Self {
            manually_suppressed: self.manually_suppressed.clone(),
            current,
        }
    }

    /// Render the baseline document
    pub fn to_xml(&self) -> Result<String, BaselineError> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        writer.write_event(Event::Start(BytesStart::new(ROOT)))?;
        write_ids(&mut writer, MANUAL, &self.manually_suppressed)?;
        write_ids(&mut writer, CURRENT, &self.current)?;
        writer.write_event(Event::End(BytesEnd::new(ROOT)))?;

        let mut xml = String::from_utf8(writer.into_inner()).map_err(|e| BaselineError::Malformed {
            file: "<generated>".to_string(),
            message: e.to_string(),
        })?;
        xml.push('\n');
        Ok(xml)
    }

    /// Write the baseline for `findings` to `path`
    ///
    /// Manually suppressed ids of an existing baseline are kept. Nothing is
    /// written when the rendered document equals the file on disk, or when
    /// there is nothing to record and no file exists yet.
    pub fn create_or_update(path: &Path, findings: &[Finding]) -> Result<WriteOutcome, BaselineError> {
        let existing = path.exists();
        if !existing && findings.is_empty() {
            log::debug!("No findings, not creating baseline {}", path.display());
            return Ok(WriteOutcome::Skipped);
        }

        let old = Self::load(path)?;
        let rendered = old.with_findings(findings).to_xml()?;

        if existing && std::fs::read(path)? == rendered.as_bytes() {
            log::debug!("Baseline {} is up to date", path.display());
            return Ok(WriteOutcome::Unchanged);
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, rendered)?;
        log::info!("Wrote baseline {}", path.display());
        Ok(WriteOutcome::Written)
    }
}

fn write_ids(writer: &mut Writer<Vec<u8>>, section: &str, ids: &BTreeSet<String>) -> std::io::Result<()> {
    if ids.is_empty() {
        return writer.write_event(Event::Empty(BytesStart::new(section)));
    }
    writer.write_event(Event::Start(BytesStart::new(section)))?;
    for id in ids {
        writer.write_event(Event::Start(BytesStart::new(ID)))?;
        writer.write_event(Event::Text(BytesText::new(id)))?;
        writer.write_event(Event::End(BytesEnd::new(ID)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(section)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::{Entity, Location, Severity};
    use crate::tree::Span;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn finding(rule: &str, file: &str, signature: &str) -> Finding {
        let entity = Entity {
            name: signature.to_string(),
            signature: signature.to_string(),
            location: Location::new(PathBuf::from(file), Span::lines(1, 1)),
            node: None,
        };
        Finding::new(rule, "test", Severity::Warning, "msg", entity)
    }

    fn set(ids: &[&str]) -> BTreeSet<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let baseline = Baseline::load(&temp.path().join("missing.xml")).unwrap();
        assert!(baseline.is_empty());
    }

    #[test]
    fn test_parse() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Baseline>
  <ManuallySuppressedIssues>
    <ID>A:Foo.kt:Foo</ID>
  </ManuallySuppressedIssues>
  <CurrentIssues>
    <ID>B:Foo.kt:Foo.bar()</ID>
    <ID>C:Bar.kt:Bar &amp; co</ID>
  </CurrentIssues>
</Baseline>
"#;
        let baseline = Baseline::parse(xml, "test").unwrap();
        assert_eq!(baseline.manually_suppressed, set(&["A:Foo.kt:Foo"]));
        assert_eq!(baseline.current, set(&["B:Foo.kt:Foo.bar()", "C:Bar.kt:Bar & co"]));
        assert!(baseline.contains("A:Foo.kt:Foo"));
        assert!(baseline.contains("B:Foo.kt:Foo.bar()"));
        assert!(!baseline.contains("D:Foo.kt:Foo"));
    }

    #[test]
    fn test_parse_empty_sections() {
        let xml = "<Baseline><ManuallySuppressedIssues/><CurrentIssues/></Baseline>";
        assert!(Baseline::parse(xml, "test").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_baseline_is_an_error() {
        assert!(matches!(
            Baseline::parse("<Baseline><CurrentIssues><ID>x</CurrentIssues>", "b.xml"),
            Err(BaselineError::Malformed { .. })
        ));
        assert!(matches!(
            Baseline::parse("<Other/>", "b.xml"),
            Err(BaselineError::Structure { .. })
        ));
        assert!(matches!(
            Baseline::parse("", "b.xml"),
            Err(BaselineError::Structure { .. })
        ));
    }

    #[test]
    fn test_render_and_parse_back() {
        let baseline = Baseline {
            manually_suppressed: set(&["M:a.kt:x"]),
            current: set(&["B:b.kt:<anonymous#0>", "A:a.kt:y"]),
        };
        let xml = baseline.to_xml().unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.ends_with("</Baseline>\n"));
        assert!(xml.contains("&lt;anonymous#0&gt;"));
        assert!(xml.find("A:a.kt:y").unwrap() < xml.find("B:b.kt").unwrap());
        assert_eq!(Baseline::parse(&xml, "rendered").unwrap(), baseline);
    }

    #[test]
    fn test_filter() {
        let a = finding("A", "src/a.kt", "Foo");
        let b = finding("B", "src/a.kt", "Foo.bar()");
        let c = finding("C", "src/c.kt", "Baz");
        let baseline = Baseline {
            manually_suppressed: BTreeSet::new(),
            current: set(&[a.baseline_id().as_str(), b.baseline_id().as_str()]),
        };

        let remaining = baseline.filter(vec![a, b, c.clone()]);
        assert_eq!(remaining, vec![c]);
    }

    #[test]
    fn test_filter_keeps_unsuppressible() {
        let guarded = finding("G", "src/a.kt", "Foo").unsuppressible();
        let plain = finding("A", "src/a.kt", "Foo");
        let baseline = Baseline::new().with_findings(&[guarded.clone(), plain.clone()]);

        let findings = vec![guarded.clone(), plain];
        assert_eq!(baseline.blocked(&findings), vec![&guarded]);
        assert_eq!(baseline.filter(findings), vec![guarded]);
    }

    #[test]
    fn test_create_skips_when_nothing_to_record() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("baseline.xml");
        assert_eq!(Baseline::create_or_update(&path, &[]).unwrap(), WriteOutcome::Skipped);
        assert!(!path.exists());
    }

    #[test]
    fn test_create_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("dir").join("baseline.xml");
        let findings = vec![finding("B", "b.kt", "B"), finding("A", "a.kt", "A"), finding("A", "a.kt", "A")];

        assert_eq!(Baseline::create_or_update(&path, &findings).unwrap(), WriteOutcome::Written);
        let first = std::fs::read(&path).unwrap();

        assert_eq!(Baseline::create_or_update(&path, &findings).unwrap(), WriteOutcome::Unchanged);
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);

        let loaded = Baseline::load(&path).unwrap();
        assert_eq!(loaded.current, set(&["A:a.kt:A", "B:b.kt:B"]));
    }

    #[test]
    fn test_update_preserves_manual_ids() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("baseline.xml");
        std::fs::write(
            &path,
            "<Baseline><ManuallySuppressedIssues><ID>M:m.kt:M</ID></ManuallySuppressedIssues>\
             <CurrentIssues><ID>Old:o.kt:O</ID></CurrentIssues></Baseline>",
        )
        .unwrap();

        let findings = vec![finding("New", "n.kt", "N"), finding("M", "m.kt", "M")];
        assert_eq!(Baseline::create_or_update(&path, &findings).unwrap(), WriteOutcome::Written);

        let loaded = Baseline::load(&path).unwrap();
        assert_eq!(loaded.manually_suppressed, set(&["M:m.kt:M"]));
        assert_eq!(loaded.current, set(&["New:n.kt:N"]));
    }

    #[test]
    fn test_existing_baseline_updated_to_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("baseline.xml");
        Baseline::create_or_update(&path, &[finding("A", "a.kt", "A")]).unwrap();

        assert_eq!(Baseline::create_or_update(&path, &[]).unwrap(), WriteOutcome::Written);
        assert!(Baseline::load(&path).unwrap().is_empty());
    }
}
