//! Shared response types not already defined alongside engine state.

use serde::{Deserialize, Serialize};

/// Body returned when a route is refused because a gate check failed
/// (§7 "typed refusal, never a silent no-op").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRefusedResponse {
    pub error: String,
    pub gate: String,
}
