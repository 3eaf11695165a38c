//! Request and response envelopes.

use crate::directive::Section;
use crate::error::{DecodeStatus, ProtocolError};
use bytes::Bytes;
use std::collections::BTreeMap;

/// A simulation request: a model definition plus its configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestEnvelope {
    network: Bytes,
    config: Bytes,
}

impl RequestEnvelope {
    pub fn new(network: impl Into<Bytes>, config: impl Into<Bytes>) -> Self {
        Self {
            network: network.into(),
            config: config.into(),
        }
    }

    /// Model definition text (`.bnd`).
    pub fn network(&self) -> &Bytes {
        &self.network
    }

    /// Configuration text (`.cfg`).
    pub fn config(&self) -> &Bytes {
        &self.config
    }

    /// Returns whether both parts are present. An incomplete request still
    /// encodes, but a server will reject it.
    pub fn is_complete(&self) -> bool {
        !self.network.is_empty() && !self.config.is_empty()
    }
}

/// A decoded simulation response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseEnvelope {
    /// 0 on success. Decoder failures use the `DecodeStatus` codes; any other
    /// value was reported by the server.
    pub status: i32,
    /// Empty unless the server or the decoder reported a problem.
    pub error_message: String,
    /// Extracted result sections.
    pub sections: BTreeMap<Section, Bytes>,
}

impl ResponseEnvelope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the envelope reported for a decode failure. No sections survive.
    pub fn failed(err: &ProtocolError) -> Self {
        Self {
            status: err.status().code(),
            error_message: err.to_string(),
            sections: BTreeMap::new(),
        }
    }

    pub fn with_status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = message.into();
        self
    }

    pub fn with_section(mut self, section: Section, data: impl Into<Bytes>) -> Self {
        self.sections.insert(section, data.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == 0
    }

    /// Interprets `status` as a decoder status code.
    pub fn decode_status(&self) -> Option<DecodeStatus> {
        DecodeStatus::from_code(self.status)
    }

    pub fn section(&self, section: Section) -> Option<&Bytes> {
        self.sections.get(&section)
    }

    pub fn stationary_distribution(&self) -> Option<&Bytes> {
        self.section(Section::StationaryDistribution)
    }

    pub fn trajectory_probability(&self) -> Option<&Bytes> {
        self.section(Section::TrajectoryProbability)
    }

    pub fn trajectories(&self) -> Option<&Bytes> {
        self.section(Section::Trajectories)
    }

    pub fn fixed_points(&self) -> Option<&Bytes> {
        self.section(Section::FixedPoints)
    }

    pub fn run_log(&self) -> Option<&Bytes> {
        self.section(Section::RunLog)
    }
}
