//! Job-line parsing: `[.]child auth1 auth2 …`, one job per line. A leading
//! `.` on the child token switches that job to NSEC-walk mode with `child`
//! treated as the ancestor rather than a delegation to bootstrap.

use hickory_proto::rr::Name;

#[derive(Debug, Clone)]
pub enum Job {
    Bootstrap { child: Name, auths: Vec<Name> },
    Walk { ancestor: Name, auths: Vec<Name> },
}

#[derive(Debug)]
pub struct ParseError {
    pub line: String,
    pub reason: String,
}

pub fn parse_line(line: &str) -> Result<Option<Job>, ParseError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut tokens = line.split_whitespace();
    let first = tokens.next().ok_or_else(|| ParseError {
        line: line.to_string(),
        reason: "empty job line".to_string(),
    })?;

    let auths: Vec<Name> = tokens
        .map(parse_name)
        .collect::<Result<_, _>>()
        .map_err(|reason| ParseError {
            line: line.to_string(),
            reason,
        })?;

    if let Some(ancestor_text) = first.strip_prefix('.') {
        let ancestor = parse_name(ancestor_text).map_err(|reason| ParseError {
            line: line.to_string(),
            reason,
        })?;
        Ok(Some(Job::Walk { ancestor, auths }))
    } else {
        let child = parse_name(first).map_err(|reason| ParseError {
            line: line.to_string(),
            reason,
        })?;
        Ok(Some(Job::Bootstrap { child, auths }))
    }
}

fn parse_name(text: &str) -> Result<Name, String> {
    Name::from_ascii(text).map_err(|e| format!("invalid name {text:?}: {e}"))
}
