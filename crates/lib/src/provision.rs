//! One-time assistant provisioning, run at gateway startup.
//!
//! Check-then-create: reuse the pinned assistant id, else an assistant with the configured
//! name, else create one. Reused assistants are updated so model, instructions, and the
//! vector store binding always match the current config.

use crate::llm::{AssistantBackend, AssistantSpec, AssistantsError};

/// The assistant every conversation runs against. Immutable after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantContext {
    pub assistant_id: String,
    pub spec: AssistantSpec,
}

pub async fn provision_assistant(
    backend: &dyn AssistantBackend,
    pinned_id: Option<&str>,
    spec: AssistantSpec,
) -> Result<AssistantContext, AssistantsError> {
    let existing = match pinned_id {
        Some(id) => Some(id.to_string()),
        None => backend
            .find_assistant_by_name(&spec.name)
            .await?
            .map(|a| a.id),
    };

    let assistant_id = match existing {
        Some(id) => {
            backend.update_assistant(&id, &spec).await?;
            log::info!(
                "reusing assistant {} ({}), bound to vector store {}",
                id,
                spec.model,
                spec.vector_store_id
            );
            id
        }
        None => {
            let created = backend.create_assistant(&spec).await?;
            log::info!(
                "created assistant {} ({}), bound to vector store {}",
                created.id,
                spec.model,
                spec.vector_store_id
            );
            created.id
        }
    };

    Ok(AssistantContext { assistant_id, spec })
}
