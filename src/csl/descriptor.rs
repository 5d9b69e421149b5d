//! Package descriptor tokenizer and command parser

use thiserror::Error;

use crate::csl::package::AttachmentRole;

/// Characters separating tokens on a descriptor line
const SEPARATORS: &[char] = &[' ', '\t', '\r', '\n'];

/// A non-blank, non-comment descriptor line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line<'a> {
    /// 1-based line number
    pub number: usize,
    pub text: &'a str,
    pub tokens: Vec<&'a str>,
}

/// Split descriptor content into tokenized lines, skipping blanks and `#` comments.
pub fn lines(content: &str) -> impl Iterator<Item = Line<'_>> {
    content.split('\n').enumerate().filter_map(|(i, text)| {
        let tokens: Vec<&str> = text.split(SEPARATORS).filter(|t| !t.is_empty()).collect();
        match tokens.first() {
            None => None,
            Some(first) if first.starts_with('#') => None,
            Some(_) => Some(Line {
                number: i + 1,
                text: text.trim_end_matches('\r'),
                tokens,
            }),
        }
    })
}

/// One parsed descriptor command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    ExportName(&'a str),
    Dependency(&'a str),
    Object(&'a str),
    Texture(&'a str),
    Aircraft { min: i32, max: i32, path: &'a str },
    Obj8Aircraft(&'a str),
    Obj8 { role: AttachmentRole, animate: bool, path: &'a str },
    HasGear(bool),
    Icao(&'a str),
    Airline { icao: &'a str, airline: &'a str },
    Livery { icao: &'a str, airline: &'a str, livery: &'a str },
}

/// Why a line could not be turned into a command
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("{command} takes {expected} argument(s), got {got}")]
    ArgumentCount {
        command: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("{command}: invalid value '{value}'")]
    BadValue { command: &'static str, value: String },
    #[error("unrecognized command '{0}'")]
    Unknown(String),
}

impl DescriptorError {
    /// Unknown commands stop processing of the whole file
    pub fn aborts_file(&self) -> bool {
        matches!(self, DescriptorError::Unknown(_))
    }
}

fn expect_args<'a>(
    tokens: &[&'a str],
    command: &'static str,
    expected: usize,
) -> Result<(), DescriptorError> {
    if tokens.len() != expected + 1 {
        return Err(DescriptorError::ArgumentCount {
            command,
            expected,
            got: tokens.len().saturating_sub(1),
        });
    }
    Ok(())
}

fn parse_yes_no(command: &'static str, token: &str) -> Result<bool, DescriptorError> {
    match token {
        "YES" => Ok(true),
        "NO" => Ok(false),
        other => Err(DescriptorError::BadValue {
            command,
            value: other.to_string(),
        }),
    }
}

fn parse_version(command: &'static str, token: &str) -> Result<i32, DescriptorError> {
    token.parse::<i32>().map_err(|_| DescriptorError::BadValue {
        command,
        value: token.to_string(),
    })
}

/// Parse a tokenized line into a command.
pub fn parse_command<'a>(tokens: &[&'a str]) -> Result<Command<'a>, DescriptorError> {
    let Some(&name) = tokens.first() else {
        return Err(DescriptorError::Unknown(String::new()));
    };

    match name {
        "EXPORT_NAME" => {
            expect_args(tokens, "EXPORT_NAME", 1)?;
            Ok(Command::ExportName(tokens[1]))
        }
        "DEPENDENCY" => {
            expect_args(tokens, "DEPENDENCY", 1)?;
            Ok(Command::Dependency(tokens[1]))
        }
        "OBJECT" => {
            expect_args(tokens, "OBJECT", 1)?;
            Ok(Command::Object(tokens[1]))
        }
        "TEXTURE" => {
            expect_args(tokens, "TEXTURE", 1)?;
            Ok(Command::Texture(tokens[1]))
        }
        "AIRCRAFT" => {
            expect_args(tokens, "AIRCRAFT", 3)?;
            Ok(Command::Aircraft {
                min: parse_version("AIRCRAFT", tokens[1])?,
                max: parse_version("AIRCRAFT", tokens[2])?,
                path: tokens[3],
            })
        }
        "OBJ8_AIRCRAFT" => {
            expect_args(tokens, "OBJ8_AIRCRAFT", 1)?;
            Ok(Command::Obj8Aircraft(tokens[1]))
        }
        "OBJ8" => {
            expect_args(tokens, "OBJ8", 3)?;
            let role = AttachmentRole::parse(tokens[1]).ok_or_else(|| DescriptorError::BadValue {
                command: "OBJ8",
                value: tokens[1].to_string(),
            })?;
            Ok(Command::Obj8 {
                role,
                animate: parse_yes_no("OBJ8", tokens[2])?,
                path: tokens[3],
            })
        }
        "HASGEAR" => {
            expect_args(tokens, "HASGEAR", 1)?;
            Ok(Command::HasGear(parse_yes_no("HASGEAR", tokens[1])?))
        }
        "ICAO" => {
            expect_args(tokens, "ICAO", 1)?;
            Ok(Command::Icao(tokens[1]))
        }
        "AIRLINE" => {
            expect_args(tokens, "AIRLINE", 2)?;
            Ok(Command::Airline {
                icao: tokens[1],
                airline: tokens[2],
            })
        }
        "LIVERY" => {
            expect_args(tokens, "LIVERY", 3)?;
            Ok(Command::Livery {
                icao: tokens[1],
                airline: tokens[2],
                livery: tokens[3],
            })
        }
        other => Err(DescriptorError::Unknown(other.to_string())),
    }
}

/// Find the export name, reading only as far as the first valid `EXPORT_NAME`.
pub fn find_export_name(content: &str) -> Option<&str> {
    lines(content)
        .filter(|line| line.tokens[0] == "EXPORT_NAME")
        .find_map(|line| match parse_command(&line.tokens) {
            Ok(Command::ExportName(name)) => Some(name),
            _ => None,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_skip_comments_and_blanks() {
        let content = "# comment\n\nEXPORT_NAME  PKG\r\n\t  \nICAO\tB738\n";
        let lines: Vec<_> = lines(content).collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].number, 3);
        assert_eq!(lines[0].tokens, vec!["EXPORT_NAME", "PKG"]);
        assert_eq!(lines[1].number, 5);
        assert_eq!(lines[1].tokens, vec!["ICAO", "B738"]);
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            parse_command(&["AIRCRAFT", "6", "11", "PKG:a.acf"]),
            Ok(Command::Aircraft { min: 6, max: 11, path: "PKG:a.acf" })
        );
        assert_eq!(
            parse_command(&["OBJ8", "LOW_LOD", "YES", "x.obj"]),
            Ok(Command::Obj8 { role: AttachmentRole::LowLod, animate: true, path: "x.obj" })
        );
        assert_eq!(parse_command(&["HASGEAR", "NO"]), Ok(Command::HasGear(false)));
        assert_eq!(
            parse_command(&["LIVERY", "B738", "DAL", "N1"]),
            Ok(Command::Livery { icao: "B738", airline: "DAL", livery: "N1" })
        );
    }

    #[test]
    fn test_argument_errors() {
        assert!(matches!(
            parse_command(&["ICAO"]),
            Err(DescriptorError::ArgumentCount { command: "ICAO", expected: 1, got: 0 })
        ));
        assert!(matches!(
            parse_command(&["AIRLINE", "B738"]),
            Err(DescriptorError::ArgumentCount { .. })
        ));
        assert!(matches!(
            parse_command(&["HASGEAR", "MAYBE"]),
            Err(DescriptorError::BadValue { command: "HASGEAR", .. })
        ));
        assert!(matches!(
            parse_command(&["AIRCRAFT", "six", "11", "a.acf"]),
            Err(DescriptorError::BadValue { .. })
        ));
        assert!(!parse_command(&["ICAO"]).unwrap_err().aborts_file());
    }

    #[test]
    fn test_unknown_aborts() {
        let err = parse_command(&["VERT_OFFSET", "1"]).unwrap_err();
        assert!(err.aborts_file());
    }

    #[test]
    fn test_find_export_name() {
        assert_eq!(find_export_name("# x\nEXPORT_NAME\nEXPORT_NAME ABC\n"), Some("ABC"));
        assert_eq!(find_export_name("ICAO B738\n"), None);
    }
}
