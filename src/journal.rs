//! Lease journal parsing.
//!
//! The DHCP daemon keeps its lease database as an append-only text file
//! (`dhcpd.leases`). Every grant, renewal and state change appends a new
//! block, so the file is effectively a time-ordered event log:
//!
//! ```text
//! lease 192.0.2.10 {
//!   starts 3 2024/05/01 10:00:00;
//!   ends 3 2024/05/01 11:00:00;
//!   cltt 3 2024/05/01 10:00:00;
//!   binding state active;
//!   next binding state free;
//!   hardware ethernet 00:11:22:33:44:55;
//!   set shared-networkname = "LAN";
//!   client-hostname "laptop";
//! }
//! ```
//!
//! IPv6 journals nest addresses inside identity associations:
//!
//! ```text
//! ia-na "\001\000\000\000..." {
//!   cltt 3 2024/05/01 10:00:00;
//!   iaaddr 2001:db8::10 {
//!     binding state active;
//!     ends 3 2024/05/01 11:00:00;
//!   }
//! }
//! ```
//!
//! Parsing is lenient. The daemon may be halfway through writing the last
//! block when the file is read, so a truncated trailing block is dropped
//! rather than failing the whole journal. Blocks that are complete but
//! unusable (bad address, unknown binding state) are skipped one by one.

use std::collections::BTreeMap;
use std::iter::Peekable;
use std::mem;
use std::net::IpAddr;
use std::path::Path;
use std::str::Chars;

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, warn};

use crate::error::Result;
use crate::lease::{BindingState, LeaseRecord};

/// Format of `starts`/`ends` values after the leading weekday number.
const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

/// Reads and parses a lease journal from disk.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if the file is missing or cannot
/// be read. A readable journal with no leases yields an empty vector.
pub async fn load_journal<P: AsRef<Path>>(path: P) -> Result<Vec<LeaseRecord>> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    let content = String::from_utf8_lossy(&bytes);
    let records = parse_journal(&content);
    debug!("Parsed {} lease records from {}", records.len(), path.display());
    Ok(records)
}

/// Parses journal text into lease records, in file order.
pub fn parse_journal(content: &str) -> Vec<LeaseRecord> {
    let mut records = Vec::new();

    for statement in parse_statements(Tokens::new(content)) {
        let Some(block) = &statement.block else {
            continue;
        };

        match statement.words.first().map(String::as_str) {
            Some("lease") => {
                if let Some(record) = lease_from_block(&statement.words, block) {
                    records.push(record);
                }
            }
            Some("ia-na") | Some("ia-ta") => {
                records.extend(leases_from_identity_association(block));
            }
            Some(other) => debug!("Skipping '{}' block", other),
            None => debug!("Skipping anonymous block"),
        }
    }

    records
}

/// Parses a journal timestamp.
///
/// Accepts `<weekday> YYYY/MM/DD HH:MM:SS` (UTC) and `epoch <seconds>`.
/// Returns `None` for `never` and for anything unparsable.
pub fn parse_timestamp(words: &[String]) -> Option<DateTime<Utc>> {
    match words {
        [epoch, seconds, ..] if epoch == "epoch" => seconds
            .parse::<i64>()
            .ok()
            .and_then(|seconds| DateTime::from_timestamp(seconds, 0)),
        [_weekday, date, time] => {
            NaiveDateTime::parse_from_str(&format!("{} {}", date, time), TIMESTAMP_FORMAT)
                .ok()
                .map(|naive| naive.and_utc())
        }
        _ => None,
    }
}

fn lease_from_block(header: &[String], body: &[Statement]) -> Option<LeaseRecord> {
    let Some(address) = parse_address(header) else {
        warn!("Skipping lease block with invalid address: {:?}", header);
        return None;
    };

    let mut fields = RecordFields::default();
    for statement in body {
        fields.apply(&statement.words);
    }
    fields.build(address)
}

fn leases_from_identity_association(body: &[Statement]) -> Vec<LeaseRecord> {
    let cltt_words = body
        .iter()
        .find(|statement| statement.block.is_none() && statement.keyword() == Some("cltt"))
        .map(|statement| &statement.words[1..]);

    let mut records = Vec::new();
    for statement in body {
        let (Some("iaaddr"), Some(block)) = (statement.keyword(), &statement.block) else {
            continue;
        };
        let Some(address) = parse_address(&statement.words) else {
            warn!("Skipping iaaddr with invalid address: {:?}", statement.words);
            continue;
        };

        // IPv6 addresses carry no `starts`; the association's last
        // transaction time is when the binding began.
        let mut fields = RecordFields::default();
        if let Some(words) = cltt_words {
            fields.start = parse_timestamp(words);
            fields.cltt = words.join(" ");
        }
        for inner in block {
            fields.apply(&inner.words);
        }
        if let Some(record) = fields.build(address) {
            records.push(record);
        }
    }
    records
}

fn parse_address(header: &[String]) -> Option<IpAddr> {
    header.get(1).and_then(|address| address.parse().ok())
}

/// Lease fields collected while walking a block's statements.
#[derive(Debug, Default)]
struct RecordFields {
    hardware_address: Option<String>,
    hostname: Option<String>,
    binding_state: Option<String>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    sets: BTreeMap<String, String>,
    tstp: String,
    tsfp: String,
    atsfp: String,
    cltt: String,
}

impl RecordFields {
    fn apply(&mut self, words: &[String]) {
        let Some((keyword, rest)) = words.split_first() else {
            return;
        };

        match keyword.as_str() {
            "starts" => self.start = parse_timestamp(rest),
            "ends" => self.end = parse_timestamp(rest),
            "tstp" => self.tstp = rest.join(" "),
            "tsfp" => self.tsfp = rest.join(" "),
            "atsfp" => self.atsfp = rest.join(" "),
            "cltt" => self.cltt = rest.join(" "),
            "binding" => {
                if let [state_keyword, state] = rest
                    && state_keyword == "state"
                {
                    self.binding_state = Some(state.clone());
                }
            }
            "hardware" => self.hardware_address = rest.get(1).cloned(),
            "client-hostname" => self.hostname = rest.first().cloned(),
            "set" => {
                if let [key, equals, value] = rest
                    && equals == "="
                {
                    self.sets.insert(key.clone(), value.clone());
                }
            }
            _ => {}
        }
    }

    fn build(self, address: IpAddr) -> Option<LeaseRecord> {
        let binding_state = match self.binding_state.as_deref().map(BindingState::try_from) {
            Some(Ok(state)) => state,
            Some(Err(state)) => {
                warn!("Skipping lease {} with unknown binding state '{}'", address, state);
                return None;
            }
            None => {
                warn!("Skipping lease {} without a binding state", address);
                return None;
            }
        };

        Some(LeaseRecord {
            address,
            hardware_address: self.hardware_address,
            hostname: self.hostname,
            binding_state,
            start: self.start,
            end: self.end,
            sets: self.sets,
            tstp: self.tstp,
            tsfp: self.tsfp,
            atsfp: self.atsfp,
            cltt: self.cltt,
        })
    }
}

/// A `;`-terminated statement or a `{ }` block with its header words.
#[derive(Debug, Clone, PartialEq)]
struct Statement {
    words: Vec<String>,
    block: Option<Vec<Statement>>,
}

impl Statement {
    fn keyword(&self) -> Option<&str> {
        self.words.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Word(String),
    Open,
    Close,
    Semicolon,
}

/// Builds the statement tree, dropping anything left unterminated at the end.
fn parse_statements(tokens: impl Iterator<Item = Token>) -> Vec<Statement> {
    // Each open block saves its header words and the enclosing body.
    let mut stack: Vec<(Vec<String>, Vec<Statement>)> = Vec::new();
    let mut body = Vec::new();
    let mut words = Vec::new();

    for token in tokens {
        match token {
            Token::Word(word) => words.push(word),
            Token::Semicolon => {
                if !words.is_empty() {
                    body.push(Statement {
                        words: mem::take(&mut words),
                        block: None,
                    });
                }
            }
            Token::Open => stack.push((mem::take(&mut words), mem::take(&mut body))),
            Token::Close => {
                if !words.is_empty() {
                    debug!("Discarding unterminated statement {:?}", words);
                    words.clear();
                }
                match stack.pop() {
                    Some((header, outer)) => {
                        let inner = mem::replace(&mut body, outer);
                        body.push(Statement {
                            words: header,
                            block: Some(inner),
                        });
                    }
                    None => debug!("Ignoring unbalanced closing brace"),
                }
            }
        }
    }

    if !stack.is_empty() {
        let (header, outer) = stack.swap_remove(0);
        warn!("Dropping truncated trailing block {:?}", header);
        return outer;
    }
    if !words.is_empty() {
        warn!("Dropping unterminated trailing statement {:?}", words);
    }
    body
}

/// Splits journal text into words, quoted strings, braces and semicolons.
struct Tokens<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Tokens<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            chars: content.chars().peekable(),
        }
    }

    /// Reads a quoted string. Octal escapes are raw bytes, so the text is
    /// collected as bytes and decoded once the closing quote is reached.
    fn quoted(&mut self) -> Option<String> {
        let mut bytes = Vec::new();
        let mut buf = [0u8; 4];
        while let Some(c) = self.chars.next() {
            let c = match c {
                '"' => return Some(String::from_utf8_lossy(&bytes).into_owned()),
                '\\' => match self.chars.next()? {
                    digit @ '0'..='7' => {
                        let mut value = digit.to_digit(8).unwrap_or(0);
                        for _ in 0..2 {
                            match self.chars.peek().and_then(|c| c.to_digit(8)) {
                                Some(next) => {
                                    value = value * 8 + next;
                                    self.chars.next();
                                }
                                None => break,
                            }
                        }
                        bytes.push((value & 0xff) as u8);
                        continue;
                    }
                    escaped => escaped,
                },
                other => other,
            };
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
        // Unterminated string: the file ends mid-write.
        None
    }
}

impl Iterator for Tokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let c = self.chars.next()?;
            match c {
                '{' => return Some(Token::Open),
                '}' => return Some(Token::Close),
                ';' => return Some(Token::Semicolon),
                '"' => return self.quoted().map(Token::Word),
                '#' => {
                    for c in self.chars.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                c if c.is_whitespace() => {}
                c => {
                    let mut word = String::from(c);
                    while let Some(&next) = self.chars.peek() {
                        if next.is_whitespace() || matches!(next, '{' | '}' | ';' | '"' | '#') {
                            break;
                        }
                        word.push(next);
                        self.chars.next();
                    }
                    return Some(Token::Word(word));
                }
            }
        }
    }
}
