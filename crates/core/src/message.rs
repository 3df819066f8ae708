//! Transport-agnostic message payloads exchanged between agents.

use crate::action::ObservationAction;
use crate::bid::Bid;
use crate::error::CoreResult;
use crate::request::MeasurementRequest;
use crate::types::AgentId;
use serde::{Deserialize, Serialize};

/// Announces a new measurement request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRequestMessage {
    /// Sending agent
    pub src: AgentId,
    /// Request being announced
    pub req: MeasurementRequest,
}

/// Carries the sender's view of one or more bids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementBidMessage {
    /// Sending agent
    pub src: AgentId,
    /// Bids in the sender's table
    pub bids: Vec<Bid>,
    /// Requests the bids refer to, so receivers can build bid tables lazily
    #[serde(default)]
    pub requests: Vec<MeasurementRequest>,
}

/// Shares an agent's planned observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanMessage {
    /// Sending agent
    pub src: AgentId,
    /// Planned observations, in execution order
    pub observations: Vec<ObservationAction>,
    /// Time at which the plan was made [s]
    pub t_plan: f64,
}

/// Reports that an observation was carried out
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservationPerformedMessage {
    /// Sending agent
    pub src: AgentId,
    /// Observation performed
    pub observation: ObservationAction,
}

/// Any message an agent can send or receive
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "msg_type", rename_all = "snake_case")]
pub enum Message {
    /// New measurement request
    MeasurementRequest(MeasurementRequestMessage),
    /// Bid update
    MeasurementBid(MeasurementBidMessage),
    /// Plan announcement
    Plan(PlanMessage),
    /// Observation report
    ObservationPerformed(ObservationPerformedMessage),
}

impl Message {
    /// Agent that authored the payload
    pub fn src(&self) -> &str {
        match self {
            Message::MeasurementRequest(msg) => &msg.src,
            Message::MeasurementBid(msg) => &msg.src,
            Message::Plan(msg) => &msg.src,
            Message::ObservationPerformed(msg) => &msg.src,
        }
    }

    /// Content-derived identifier (BLAKE3 of the JSON encoding, hex)
    pub fn id(&self) -> CoreResult<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
    }

    /// Short message name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Message::MeasurementRequest(_) => "measurement_request",
            Message::MeasurementBid(_) => "measurement_bid",
            Message::Plan(_) => "plan",
            Message::ObservationPerformed(_) => "observation_performed",
        }
    }
}

/// A message in flight, with the relay hops it still has to take
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Content-derived message identifier
    pub id: String,
    /// Agent that last transmitted the envelope
    pub sender: AgentId,
    /// Remaining relay hops; the first entry forwards next
    pub path: Vec<AgentId>,
    /// Payload
    pub message: Message,
}

impl Envelope {
    /// Wrap a message for transmission by `sender` along `path`
    pub fn new(sender: impl Into<AgentId>, path: Vec<AgentId>, message: Message) -> CoreResult<Self> {
        Ok(Self {
            id: message.id()?,
            sender: sender.into(),
            path,
            message,
        })
    }
}
