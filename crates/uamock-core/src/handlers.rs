//! Canonical method handlers of the test server.

use std::time::Duration;

use async_trait::async_trait;

use crate::{
    HandlerError, MethodContext, MethodHandler, MethodSignature, NodeId, Value, ValueType,
    env::Environment,
};

/// Status written while a reboot is in progress.
pub const REBOOTING_STATUS: &str = "Rebooting";

/// Status written once a reboot completes.
pub const RUNNING_STATUS: &str = "Running";

/// Result string returned by ResetCounter.
pub const COUNTER_RESET_MESSAGE: &str = "Counter reset to 0";

/// Default simulated restart latency of Reboot.
pub const DEFAULT_REBOOT_DELAY: Duration = Duration::from_secs(1);

/// `Reboot() -> ()`
///
/// Writes `Status = "Rebooting"`, waits out the restart delay, then writes
/// `Status = "Running"`. The registry lock is only taken for the two writes,
/// never across the wait.
pub struct Reboot<E> {
    env: E,
    status: Option<NodeId>,
    delay: Duration,
}

impl<E: Environment> Reboot<E> {
    /// Reboot handler driving the given Status variable (if any).
    pub fn new(env: E, status: Option<NodeId>, delay: Duration) -> Self {
        Self { env, status, delay }
    }

    /// Signature: no inputs, no outputs.
    pub fn signature() -> MethodSignature {
        MethodSignature::default()
    }
}

#[async_trait]
impl<E: Environment> MethodHandler for Reboot<E> {
    async fn call(
        &self,
        ctx: MethodContext<'_>,
        _args: Vec<Value>,
    ) -> Result<Vec<Value>, HandlerError> {
        tracing::info!("Reboot called on {}, simulating restart", ctx.object);

        if let Some(status) = &self.status {
            ctx.registry.update_value(status, Value::from(REBOOTING_STATUS))?;
        }

        self.env.sleep(self.delay).await;

        if let Some(status) = &self.status {
            ctx.registry.update_value(status, Value::from(RUNNING_STATUS))?;
        }

        tracing::info!("Reboot complete");
        Ok(Vec::new())
    }
}

/// `AddNumbers(a: Int32, b: Int32) -> (Int32)`
///
/// Overflow is reported as a handler failure rather than wrapped.
pub struct AddNumbers;

impl AddNumbers {
    /// Signature: two `Int32` inputs, one `Int32` output.
    pub fn signature() -> MethodSignature {
        MethodSignature::new([ValueType::Int32, ValueType::Int32], [ValueType::Int32])
    }
}

#[async_trait]
impl MethodHandler for AddNumbers {
    async fn call(
        &self,
        _ctx: MethodContext<'_>,
        args: Vec<Value>,
    ) -> Result<Vec<Value>, HandlerError> {
        let (Some(a), Some(b)) =
            (args.first().and_then(Value::as_i32), args.get(1).and_then(Value::as_i32))
        else {
            return Err(HandlerError::Failed("AddNumbers expects two Int32 arguments".to_string()));
        };

        let sum = a
            .checked_add(b)
            .ok_or_else(|| HandlerError::Failed(format!("{a} + {b} overflows Int32")))?;

        tracing::info!("AddNumbers called: {} + {} = {}", a, b, sum);
        Ok(vec![Value::Int32(sum)])
    }
}

/// `ResetCounter() -> (String)`
///
/// Writes the Counter variable to 0. The simulator resumes from its own tick
/// on the next cycle.
pub struct ResetCounter {
    counter: NodeId,
}

impl ResetCounter {
    /// Reset handler for the given Counter variable.
    pub fn new(counter: NodeId) -> Self {
        Self { counter }
    }

    /// Signature: no inputs, one `String` output.
    pub fn signature() -> MethodSignature {
        MethodSignature { inputs: Vec::new(), outputs: vec![ValueType::String] }
    }
}

#[async_trait]
impl MethodHandler for ResetCounter {
    async fn call(
        &self,
        ctx: MethodContext<'_>,
        _args: Vec<Value>,
    ) -> Result<Vec<Value>, HandlerError> {
        tracing::info!("ResetCounter called");
        ctx.registry.update_value(&self.counter, Value::Int32(0))?;
        Ok(vec![Value::from(COUNTER_RESET_MESSAGE)])
    }
}
