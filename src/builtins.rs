//! Built-in capabilities used by the demo command and the tests.
//!
//! - `echo`: returns `args.message`, or the whole argument bag when absent
//! - `sleep`: sleeps `args.secs` seconds (fractions allowed), stopping early on cancel
//! - `fail`: always fails with `args.message`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eyre::eyre;
use serde_json::{Value, json};

use crate::domain::TaskArgs;
use crate::registry::{CancelSignal, Capability};
use crate::scheduler::Scheduler;

pub const ECHO: &str = "echo";
pub const SLEEP: &str = "sleep";
pub const FAIL: &str = "fail";

pub struct Echo;

#[async_trait]
impl Capability for Echo {
    async fn call(&self, args: TaskArgs, _cancel: CancelSignal) -> eyre::Result<Value> {
        match args.get("message") {
            Some(message) => Ok(message.clone()),
            None => Ok(Value::Object(args)),
        }
    }
}

pub struct Sleep;

#[async_trait]
impl Capability for Sleep {
    async fn call(&self, args: TaskArgs, cancel: CancelSignal) -> eyre::Result<Value> {
        let secs = match args.get("secs") {
            None => 0.0,
            Some(v) => v.as_f64().ok_or_else(|| eyre!("secs must be a number, got {}", v))?,
        };
        let duration = Duration::try_from_secs_f64(secs).map_err(|e| eyre!("invalid secs {}: {}", secs, e))?;

        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(json!({ "slept_secs": secs })),
            _ = cancel.cancelled() => Err(eyre!("sleep cancelled")),
        }
    }
}

pub struct Fail;

#[async_trait]
impl Capability for Fail {
    async fn call(&self, args: TaskArgs, _cancel: CancelSignal) -> eyre::Result<Value> {
        let message = args.get("message").and_then(Value::as_str).unwrap_or("intentional failure");
        Err(eyre!("{}", message))
    }
}

/// Register `echo`, `sleep` and `fail` on the scheduler.
pub fn register_builtins(scheduler: &Scheduler) {
    scheduler.register(ECHO, Arc::new(Echo));
    scheduler.register(SLEEP, Arc::new(Sleep));
    scheduler.register(FAIL, Arc::new(Fail));
}
