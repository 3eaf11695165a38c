//! Header directives.
//!
//! Each header line has the shape `<Name>:<value>\n`. `Status` and
//! `Error-Message` carry a literal value; every other directive carries an
//! inclusive byte range `<from>-<to>` into the data segment.
//!
//! ```text
//! RETURN MaBoSS-2.0
//! Status:0
//! Stationary-Distribution:0-1023
//! Run-Log:1024-1100
//!
//! <data segment>
//! ```

use crate::error::ProtocolError;
use bytes::{BufMut, BytesMut};
use std::fmt;

/// Directive names known to the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    // Request payload (echoed back by some servers)
    Network,
    Configuration,

    // Literal values
    Status,
    ErrorMessage,

    // Result sections
    StationaryDistribution,
    TrajectoryProbability,
    Trajectories,
    FixedPoints,
    RunLog,
}

impl Directive {
    pub const ALL: [Directive; 9] = [
        Directive::Network,
        Directive::Configuration,
        Directive::Status,
        Directive::ErrorMessage,
        Directive::StationaryDistribution,
        Directive::TrajectoryProbability,
        Directive::Trajectories,
        Directive::FixedPoints,
        Directive::RunLog,
    ];

    /// Returns the name as written on the wire, without the trailing colon.
    pub fn name(&self) -> &'static str {
        match self {
            Directive::Network => "Network",
            Directive::Configuration => "Configuration",
            Directive::Status => "Status",
            Directive::ErrorMessage => "Error-Message",
            Directive::StationaryDistribution => "Stationary-Distribution",
            Directive::TrajectoryProbability => "Trajectory-Probability",
            Directive::Trajectories => "Trajectories",
            Directive::FixedPoints => "Fixed-Points",
            Directive::RunLog => "Run-Log",
        }
    }

    /// Looks up a directive by its exact wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.name() == name)
    }

    /// Returns whether the directive carries a literal value rather than a range.
    pub fn is_literal(&self) -> bool {
        matches!(self, Directive::Status | Directive::ErrorMessage)
    }

    /// Returns the result section this directive locates, if any.
    pub fn section(&self) -> Option<Section> {
        match self {
            Directive::StationaryDistribution => Some(Section::StationaryDistribution),
            Directive::TrajectoryProbability => Some(Section::TrajectoryProbability),
            Directive::Trajectories => Some(Section::Trajectories),
            Directive::FixedPoints => Some(Section::FixedPoints),
            Directive::RunLog => Some(Section::RunLog),
            _ => None,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result sections a response can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Section {
    StationaryDistribution,
    TrajectoryProbability,
    Trajectories,
    FixedPoints,
    RunLog,
}

impl Section {
    /// Sections in the order a server writes them.
    pub const ALL: [Section; 5] = [
        Section::StationaryDistribution,
        Section::TrajectoryProbability,
        Section::Trajectories,
        Section::FixedPoints,
        Section::RunLog,
    ];

    /// Returns the lowercase key used to name the section.
    pub fn key(&self) -> &'static str {
        match self {
            Section::StationaryDistribution => "stationary-distribution",
            Section::TrajectoryProbability => "trajectory-probability",
            Section::Trajectories => "trajectories",
            Section::FixedPoints => "fixed-points",
            Section::RunLog => "run-log",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.key() == key)
    }

    pub fn directive(&self) -> Directive {
        match self {
            Section::StationaryDistribution => Directive::StationaryDistribution,
            Section::TrajectoryProbability => Directive::TrajectoryProbability,
            Section::Trajectories => Directive::Trajectories,
            Section::FixedPoints => Directive::FixedPoints,
            Section::RunLog => Directive::RunLog,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Inclusive byte range into a data segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub from: usize,
    pub to: usize,
}

impl ByteRange {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    /// Builds the range covering `start..end` (exclusive end), or `None` when
    /// the span is empty.
    pub fn spanning(start: usize, end: usize) -> Option<Self> {
        if end > start {
            Some(Self::new(start, end - 1))
        } else {
            None
        }
    }

    /// Number of bytes covered. Zero for an inverted range.
    pub fn len(&self) -> usize {
        if self.to < self.from {
            0
        } else {
            (self.to - self.from).saturating_add(1)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `data[from..=to]`, or `None` if the range is inverted or runs
    /// past the end of `data`.
    pub fn slice<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        if self.to < self.from || self.to >= data.len() {
            return None;
        }
        Some(&data[self.from..=self.to])
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

/// Value carried by a header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveValue {
    Literal(String),
    Range(ByteRange),
}

/// One parsed header line.
///
/// The name is kept verbatim so that unknown directives can be reported; use
/// [`HeaderDirective::directive`] to resolve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderDirective {
    pub name: String,
    pub value: DirectiveValue,
}

impl HeaderDirective {
    pub fn literal(directive: Directive, value: impl Into<String>) -> Self {
        Self {
            name: directive.name().to_string(),
            value: DirectiveValue::Literal(value.into()),
        }
    }

    pub fn range(directive: Directive, range: ByteRange) -> Self {
        Self {
            name: directive.name().to_string(),
            value: DirectiveValue::Range(range),
        }
    }

    /// Parses the value of a header line.
    ///
    /// Whether the value is a literal or a range depends only on the name;
    /// unknown names are parsed as ranges and rejected later.
    pub fn parse(name: String, value: String) -> Result<Self, ProtocolError> {
        let literal = Directive::from_name(&name).is_some_and(|d| d.is_literal());
        if literal {
            return Ok(Self {
                name,
                value: DirectiveValue::Literal(value),
            });
        }

        let Some((from, to)) = value.split_once('-') else {
            return Err(ProtocolError::MissingDash {
                directive: name,
                value,
            });
        };
        let from = parse_offset(&name, from)?;
        let to = parse_offset(&name, to)?;

        Ok(Self {
            name,
            value: DirectiveValue::Range(ByteRange::new(from, to)),
        })
    }

    /// Resolves the name against the known vocabulary.
    pub fn directive(&self) -> Option<Directive> {
        Directive::from_name(&self.name)
    }

    /// Appends the line, newline included, to `buf`.
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_slice(self.name.as_bytes());
        buf.put_u8(b':');
        match &self.value {
            DirectiveValue::Literal(value) => buf.put_slice(value.as_bytes()),
            DirectiveValue::Range(range) => buf.put_slice(range.to_string().as_bytes()),
        }
        buf.put_u8(b'\n');
    }
}

fn parse_offset(directive: &str, value: &str) -> Result<usize, ProtocolError> {
    value
        .trim()
        .parse()
        .map_err(|_| ProtocolError::InvalidInteger {
            directive: directive.to_string(),
            value: value.to_string(),
        })
}
