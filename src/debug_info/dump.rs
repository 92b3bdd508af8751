//! Line classification for compiler instruction dumps.
//!
//! A dump looks like:
//!
//! ```text
//! # Method Start Demo.Contract.main
//! # Code Contract.cs line 12: "int a = 1;"
//! 0000 INITSLOT 01-00 # 1 local variables, 0 arguments
//! 0003 PUSH1
//! # Method End Demo.Contract.main
//! ```

use regex::Regex;
use std::sync::OnceLock;

/// One meaningful line of an instruction dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpLine<'a> {
    OpCode {
        offset: u32,
        mnemonic: &'a str,
        operand: Option<&'a str>,
    },
    Source {
        file: &'a str,
        line: u32,
        text: &'a str,
    },
    MethodStart(&'a str),
    MethodEnd(&'a str),
}

fn opcode_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(\d+)\s+([A-Z][A-Z0-9_]*)(?:\s+([^#]*?))?\s*(?:#\s.*)?$")
            .expect("static regex")
    })
}

fn source_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^#\s+Code\s+(.+?)\s+line\s+(\d+):\s+"(.*)"\s*$"#).expect("static regex")
    })
}

fn method_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^#\s+Method\s+(Start|End)\s+(.+?)\s*$").expect("static regex")
    })
}

impl<'a> DumpLine<'a> {
    /// Classify a line; `None` for anything the patterns do not recognise.
    pub fn parse(line: &'a str) -> Option<Self> {
        let line = line.trim();
        if let Some(caps) = opcode_pattern().captures(line) {
            let offset = caps.get(1)?.as_str().parse().ok()?;
            let mnemonic = caps.get(2)?.as_str();
            let operand = caps
                .get(3)
                .map(|m| m.as_str().trim())
                .filter(|s| !s.is_empty());
            return Some(DumpLine::OpCode {
                offset,
                mnemonic,
                operand,
            });
        }
        if let Some(caps) = source_pattern().captures(line) {
            return Some(DumpLine::Source {
                file: caps.get(1)?.as_str(),
                line: caps.get(2)?.as_str().parse().ok()?,
                text: caps.get(3)?.as_str(),
            });
        }
        if let Some(caps) = method_pattern().captures(line) {
            let name = caps.get(2)?.as_str();
            return Some(match caps.get(1)?.as_str() {
                "Start" => DumpLine::MethodStart(name),
                _ => DumpLine::MethodEnd(name),
            });
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_opcode_with_operand_and_comment() {
        assert_eq!(
            DumpLine::parse("0000 INITSLOT 01-00 # 1 local variables, 0 arguments"),
            Some(DumpLine::OpCode {
                offset: 0,
                mnemonic: "INITSLOT",
                operand: Some("01-00"),
            })
        );
        assert_eq!(
            DumpLine::parse("0012 RET"),
            Some(DumpLine::OpCode {
                offset: 12,
                mnemonic: "RET",
                operand: None,
            })
        );
    }

    #[test]
    fn parses_source_annotation() {
        assert_eq!(
            DumpLine::parse(r#"# Code Contract.cs line 12: "int a = 1;""#),
            Some(DumpLine::Source {
                file: "Contract.cs",
                line: 12,
                text: "int a = 1;",
            })
        );
        assert_eq!(
            DumpLine::parse(r#"# Code My Folder/Contract.cs line 3: """#),
            Some(DumpLine::Source {
                file: "My Folder/Contract.cs",
                line: 3,
                text: "",
            })
        );
    }

    #[test]
    fn parses_method_markers() {
        assert_eq!(
            DumpLine::parse("# Method Start Demo.Contract.main"),
            Some(DumpLine::MethodStart("Demo.Contract.main"))
        );
        assert_eq!(
            DumpLine::parse("# Method End Demo.Contract.main"),
            Some(DumpLine::MethodEnd("Demo.Contract.main"))
        );
    }

    #[test]
    fn unknown_lines_are_skipped() {
        assert_eq!(DumpLine::parse(""), None);
        assert_eq!(DumpLine::parse("# just a comment"), None);
        assert_eq!(DumpLine::parse("garbage line"), None);
    }

    #[test]
    fn lowercase_mnemonic_is_not_an_opcode_line() {
        assert_eq!(DumpLine::parse("0001 push1"), None);
    }
}
