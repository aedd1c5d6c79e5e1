//! Boundary towards the emulation platform that actually configures the nodes

use crate::planner::action::ProvisioningAction;
use thiserror::Error;
use tracing::{info, trace};

/// Executes provisioning actions against emulated nodes
///
/// Errors are handed to the caller untouched.
#[allow(async_fn_in_trait)]
pub trait EmulatorAdapter {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn execute(&mut self, action: &ProvisioningAction) -> Result<(), Self::Error>;
}

#[derive(Error, Debug)]
#[error("provisioning step {step} failed ({action})")]
pub struct ProvisionError<E> {
    /// Zero-based position of the failed action
    pub step: usize,
    pub action: ProvisioningAction,
    #[source]
    pub source: E,
}

/// Executes the actions in order, stopping at the first failure
///
/// Returns the number of executed actions. Nothing is retried or rolled back.
pub async fn provision<'a, A>(
    actions: impl IntoIterator<Item = &'a ProvisioningAction>,
    adapter: &mut A,
) -> Result<usize, ProvisionError<A::Error>>
where
    A: EmulatorAdapter,
{
    let mut executed = 0;
    for (step, action) in actions.into_iter().enumerate() {
        trace!(step, node_id = %action.target(), %action, "executing provisioning action");
        adapter
            .execute(action)
            .await
            .map_err(|source| ProvisionError {
                step,
                action: action.clone(),
                source,
            })?;
        executed += 1;
    }

    info!(executed, "provisioning finished");
    Ok(executed)
}
