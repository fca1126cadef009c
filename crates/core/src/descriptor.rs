// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Jobsworth Contributors

//! Job descriptors: a serializable reference to "what to call" (§4.3).
//!
//! Rather than capturing a lambda's bytecode (the source system's approach,
//! see Design Notes in the spec this crate implements), a descriptor is built
//! explicitly at the call site: the target type, the method name, and the
//! already-serialized argument values. Two enqueues of an identical call
//! produce structurally-equal descriptors but distinct [`crate::job::JobId`]s
//! — descriptor equality never implies job identity.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::job::JobId;

/// A serializable reference to a target callable and its arguments.
///
/// `job_type` and `method` identify the callable by name (the systems-level
/// stand-in for a fully-qualified type + reflective method lookup);
/// `parameter_types` names each parameter's type for the benefit of a
/// [`JobHandlerRegistry`]-style activator; `args` holds the already-serialized
/// parameter values in declaration order.
///
/// [`JobHandlerRegistry`]: https://docs.rs/jobsworth-server (see `jobsworth_server::handler`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub job_type: String,
    pub method: String,
    pub parameter_types: Vec<String>,
    pub args: Vec<serde_json::Value>,
}

impl JobDescriptor {
    pub fn new(job_type: impl Into<String>, method: impl Into<String>) -> JobDescriptorBuilder {
        JobDescriptorBuilder {
            job_type: job_type.into(),
            method: method.into(),
            parameter_types: Vec::new(),
            args: Vec::new(),
        }
    }

    /// Human-readable `Type.method(args)` form used in logs and error
    /// messages; never used for equality or routing.
    pub fn display_name(&self) -> String {
        format!("{}.{}", self.job_type, self.method)
    }
}

/// Builder for [`JobDescriptor`], appending one typed argument at a time.
pub struct JobDescriptorBuilder {
    job_type: String,
    method: String,
    parameter_types: Vec<String>,
    args: Vec<serde_json::Value>,
}

impl JobDescriptorBuilder {
    /// Append a parameter. `type_name` is a descriptive label (e.g.
    /// `"java.time.Instant"`-style fully qualified name, or just a Rust type
    /// name) used by the activator to validate/route, not for serialization.
    pub fn arg<T: Serialize>(
        mut self,
        type_name: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        self.parameter_types.push(type_name.into());
        self.args.push(serde_json::to_value(value)?);
        Ok(self)
    }

    pub fn build(self) -> JobDescriptor {
        JobDescriptor {
            job_type: self.job_type,
            method: self.method,
            parameter_types: self.parameter_types,
            args: self.args,
        }
    }
}

/// Runtime context injected into a running job body: the equivalent of the
/// special `JobContext` parameter slot described in §4.3.
///
/// Cloning a `JobContext` is cheap and shares the same underlying metadata
/// map and cancellation flag — the worker pool clones one into the task that
/// runs the job body while keeping a handle for heartbeat/cancellation
/// bookkeeping.
#[derive(Clone)]
pub struct JobContext {
    job_id: JobId,
    metadata: Arc<Mutex<HashMap<String, String>>>,
    cancelled: Arc<AtomicBool>,
}

impl JobContext {
    pub fn new(job_id: JobId) -> Self {
        Self {
            job_id,
            metadata: Arc::new(Mutex::new(HashMap::new())),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Write (or overwrite) a progress/metadata note. Flushed into the
    /// persisted `Job.metadata` map by the worker pool after each run.
    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.lock().insert(key.into(), value.into());
    }

    /// Convenience wrapper over `set_metadata("progress", ...)`.
    pub fn report_progress(&self, note: impl Into<String>) {
        self.set_metadata("progress", note);
    }

    pub fn metadata_snapshot(&self) -> HashMap<String, String> {
        self.metadata.lock().clone()
    }

    /// True once the owning server has requested cooperative cancellation
    /// (graceful shutdown, or an explicit `delete` on an in-flight job).
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Called by the worker pool's stop signal; never by job bodies.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod proptest_roundtrip {
    use super::*;
    use crate::test_support::strategies::arb_job_descriptor;
    use proptest::prelude::*;

    proptest! {
        /// §8 property 5: encode/decode of a job descriptor with any
        /// supported parameter type preserves equality.
        #[test]
        fn descriptor_round_trips_through_json(descriptor in arb_job_descriptor()) {
            let encoded = serde_json::to_string(&descriptor).unwrap();
            let decoded: JobDescriptor = serde_json::from_str(&encoded).unwrap();
            prop_assert_eq!(decoded, descriptor);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_serializes_args_in_order() {
        let descriptor = JobDescriptor::new("billing.Invoicer", "charge")
            .arg("i64", &42i64)
            .unwrap()
            .arg("String", &"acct-1".to_string())
            .unwrap()
            .build();
        assert_eq!(descriptor.parameter_types, vec!["i64", "String"]);
        assert_eq!(descriptor.args, vec![serde_json::json!(42), serde_json::json!("acct-1")]);
    }

    #[test]
    fn descriptor_equality_is_structural() {
        let a = JobDescriptor::new("t", "m").arg("i64", &1i64).unwrap().build();
        let b = JobDescriptor::new("t", "m").arg("i64", &1i64).unwrap().build();
        assert_eq!(a, b);
    }

    #[test]
    fn display_name_combines_type_and_method() {
        let d = JobDescriptor::new("billing.Invoicer", "charge").build();
        assert_eq!(d.display_name(), "billing.Invoicer.charge");
    }

    #[test]
    fn context_cancellation_is_observable_after_clone() {
        let ctx = JobContext::new(JobId::new());
        let clone = ctx.clone();
        assert!(!clone.is_cancelled());
        ctx.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn context_metadata_round_trips() {
        let ctx = JobContext::new(JobId::new());
        ctx.set_metadata("stage", "downloading");
        ctx.report_progress("50%");
        let snapshot = ctx.metadata_snapshot();
        assert_eq!(snapshot.get("stage"), Some(&"downloading".to_string()));
        assert_eq!(snapshot.get("progress"), Some(&"50%".to_string()));
    }
}
