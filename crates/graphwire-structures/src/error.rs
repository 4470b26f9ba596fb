use thiserror::Error;

/// Common error type for graphwire operations.
///
/// One taxonomy is shared by classification, graph collection and the wire
/// codec. Any error aborts the whole serialize or deserialize call; partial
/// node maps and partially populated graphs are never surfaced.
///
/// # Examples
/// ```
/// use graphwire_structures::GraphWireError;
///
/// fn require_name(name: &str) -> Result<(), GraphWireError> {
///     if name.is_empty() {
///         return Err(GraphWireError::BadArgument("type name must not be empty".into()));
///     }
///     Ok(())
/// }
///
/// assert!(require_name("").is_err());
/// assert!(require_name("Person").is_ok());
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphWireError {
    /// No serialization strategy applies to the encountered type
    #[error("Unsupported type: no serialization strategy applies to '{0}'")]
    UnsupportedType(String),

    /// A self-describing type registered a collect hook but no reconstruction entry point
    #[error("Missing construction path: type '{0}' collects state but has no reconstruction entry point")]
    MissingConstructionPath(String),

    /// A declared-contract member is not both readable and writable, or a
    /// required declared field is absent from decoded data
    #[error("Contract violation: {0}")]
    ContractViolation(String),

    /// Bad magic, truncated stream, inconsistent part id/count, or any other
    /// structurally invalid frame
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// Frame header protocol version differs from the codec's supported version
    #[error("Protocol version mismatch: frame carries {found} but this codec supports {supported}")]
    ProtocolVersionMismatch { found: String, supported: String },

    /// Null or otherwise invalid argument handed to the public API
    #[error("Bad argument: {0}")]
    BadArgument(String),

    /// The caller's stream failed while writing or reading a frame
    #[error("Stream failure: {0}")]
    StreamFailure(String),
}

/// Result type for graphwire operations
pub type GraphWireResult<T> = Result<T, GraphWireError>;
