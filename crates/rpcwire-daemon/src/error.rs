//! Failure classification shared by assembly and logging

use std::fmt;

use rpcwire_core::DecodeError;

/// Where in the pipeline a message failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Malformed or incomplete wire input; never reaches application code.
    TransportShape,
    /// Unknown method.
    Routing,
    /// Parameter missing, malformed or zero-valued.
    ParamBinding,
    /// Handler-returned failure.
    Application,
    /// Success result could not be serialized.
    Encoding,
}

impl FaultKind {
    /// Whether a failure of this kind is kept off the wire for notifications.
    pub fn suppressed_for_notifications(self) -> bool {
        matches!(
            self,
            FaultKind::ParamBinding | FaultKind::Application | FaultKind::Encoding
        )
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultKind::TransportShape => "transport_shape",
            FaultKind::Routing => "routing",
            FaultKind::ParamBinding => "param_binding",
            FaultKind::Application => "application",
            FaultKind::Encoding => "encoding",
        };
        f.write_str(name)
    }
}

impl From<&DecodeError> for FaultKind {
    fn from(_: &DecodeError) -> Self {
        FaultKind::TransportShape
    }
}
