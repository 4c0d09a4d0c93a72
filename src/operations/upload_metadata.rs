//! Upload blob metadata operation.
//!
//! Attaches (replaces) user metadata on an existing blob in an
//! existing container.  The controller is a plain function returning a
//! tagged outcome; [`connect`] is the thin adapter that translates the
//! outcome into the host's context conventions.
//!
//! Control flow: validate inputs -> resolve named connection -> check
//! container -> check blob -> sanitize and submit metadata.  Absent
//! container or blob are normal outcomes, not errors; everything else
//! that goes wrong is classified into one error descriptor.

use tracing::{debug, warn};

use crate::connection::{ConnectionHandler, CONNECTOR_NAME};
use crate::context::{self, HostError, MessageContext};
use crate::errors::{ConnectorError, ErrorDescriptor};
use crate::metadata::parse_metadata;
use crate::xml;

/// Diagnostic prefix on the recoverable host signal.
pub const ERROR_LOG_PREFIX: &str = "Error occurred while uploading blob metadata: ";

/// Detail token reported when the target container is absent.
pub const CONTAINER_DOES_NOT_EXIST: &str = "container-does-not-exist";

/// Detail token reported when the target blob is absent.
pub const BLOB_DOES_NOT_EXIST: &str = "blob-does-not-exist";

const MANDATORY_PARAMETERS_MESSAGE: &str =
    "Mandatory parameters [containerName], [fileName] and [metadata] cannot be empty.";

/// The outcome of one invocation.  Exactly one is produced per call;
/// it is the sole input to response generation.
#[derive(Debug)]
pub enum OperationOutcome {
    /// Metadata was replaced on the blob.
    Success,
    /// The target container does not exist (normal outcome).
    ContainerNotFound,
    /// The target blob does not exist (normal outcome).
    BlobNotFound,
    /// A classified failure.
    Failed(ErrorDescriptor),
}

impl OperationOutcome {
    /// Whether the mutation was applied.
    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Success)
    }

    /// The detail token carried in the failure payload; empty on
    /// success.
    pub fn detail(&self) -> &str {
        match self {
            OperationOutcome::Success => "",
            OperationOutcome::ContainerNotFound => CONTAINER_DOES_NOT_EXIST,
            OperationOutcome::BlobNotFound => BLOB_DOES_NOT_EXIST,
            OperationOutcome::Failed(descriptor) => descriptor.code(),
        }
    }
}

/// Run the operation against the context's parameters and return its
/// outcome.  Never panics and never leaks an unclassified error.
pub async fn execute(handler: &ConnectionHandler, ctx: &MessageContext) -> OperationOutcome {
    let container = ctx.get_property(context::CONTAINER_NAME);
    let blob = ctx.get_property(context::FILE_NAME);
    let metadata = ctx.get_property(context::METADATA);

    let (Some(container), Some(blob), Some(metadata)) = (container, blob, metadata) else {
        let err = ConnectorError::MissingParameters {
            message: MANDATORY_PARAMETERS_MESSAGE.to_string(),
        };
        return OperationOutcome::Failed(err.descriptor());
    };

    match run(handler, ctx, container, blob, metadata).await {
        Ok(outcome) => outcome,
        Err(err) => {
            warn!(code = err.code(), "upload metadata failed: {}", err);
            OperationOutcome::Failed(err.descriptor())
        }
    }
}

/// The fallible part of the operation, after input validation.
async fn run(
    handler: &ConnectionHandler,
    ctx: &MessageContext,
    container: &str,
    blob: &str,
    metadata_json: &str,
) -> Result<OperationOutcome, ConnectorError> {
    let connection_name = ctx.get_property(context::CONNECTION_NAME).ok_or_else(|| {
        ConnectorError::InvalidConfiguration {
            message: "Connection name is not set on the message context".to_string(),
        }
    })?;

    let connection = handler.get_connection(CONNECTOR_NAME, connection_name)?;
    let client = connection.blob_service_client()?;

    if !client.container_exists(container).await? {
        debug!("container absent: {}", container);
        return Ok(OperationOutcome::ContainerNotFound);
    }

    if !client.blob_exists(container, blob).await? {
        debug!("blob absent: {}/{}", container, blob);
        return Ok(OperationOutcome::BlobNotFound);
    }

    let metadata = parse_metadata(metadata_json)?;
    client.set_blob_metadata(container, blob, &metadata).await?;

    debug!(
        "metadata replaced: {}/{} entries={}",
        container,
        blob,
        metadata.len()
    );
    Ok(OperationOutcome::Success)
}

/// Host adapter: run the operation and report through the context.
///
/// The structured result payload is attached exactly once on every
/// path.  Failures additionally set the error properties and surface as
/// the recoverable signal; a payload that cannot be rendered is the one
/// fatal case.
pub async fn connect(
    handler: &ConnectionHandler,
    ctx: &mut MessageContext,
) -> Result<(), HostError> {
    let outcome = execute(handler, ctx).await;

    if let OperationOutcome::Failed(descriptor) = &outcome {
        ctx.set_error_properties(descriptor);
    }

    let payload = xml::render_result(outcome.is_success(), outcome.detail())
        .map_err(|_| HostError::Fatal("Unable to build the message.".to_string()))?;
    ctx.set_payload(payload);

    match outcome {
        OperationOutcome::Failed(descriptor) => Err(HostError::Recoverable(format!(
            "{}{}",
            ERROR_LOG_PREFIX,
            descriptor.detail()
        ))),
        _ => Ok(()),
    }
}
