//! Canonical logging macros
//!
//! Every store operation brackets its work with a start event and exactly one
//! of an end or end_error event.

/// Log the start of an operation
///
/// # Example
///
/// ```
/// # use strata_core::log_op_start;
/// log_op_start!("append");
/// log_op_start!("append", stream_id = "Order-1");
/// ```
#[macro_export]
macro_rules! log_op_start {
    ($op:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::types::schema::EVENT_START,
        );
    };
    ($op:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::types::schema::EVENT_START,
            $($field)*
        );
    };
}

/// Log the successful end of an operation
///
/// # Example
///
/// ```
/// # use strata_core::log_op_end;
/// log_op_end!("append", duration_ms = 42);
/// ```
#[macro_export]
macro_rules! log_op_end {
    ($op:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::types::schema::EVENT_END,
            duration_ms = $duration,
        );
    };
    ($op:expr, duration_ms = $duration:expr, $($field:tt)*) => {
        tracing::info!(
            component = module_path!(),
            op = $op,
            event = $crate::types::schema::EVENT_END,
            duration_ms = $duration,
            $($field)*
        );
    };
}

/// Log an operation error
///
/// Concurrency conflicts are expected under contention and are logged at
/// `warn`; every other kind is logged at `error`.
///
/// # Example
///
/// ```
/// # use strata_core::{log_op_error, StrataError};
/// let err = StrataError::TenantNotFound { tenant: "t1".to_string() };
/// log_op_error!("get_store", err, duration_ms = 10);
/// ```
#[macro_export]
macro_rules! log_op_error {
    ($op:expr, $err:expr, duration_ms = $duration:expr) => {
        $crate::log_op_error!($op, $err, duration_ms = $duration,)
    };
    ($op:expr, $err:expr, duration_ms = $duration:expr, $($field:tt)*) => {{
        let strata_err: &$crate::errors::StrataError = &$err;
        if strata_err.is_concurrency_conflict() {
            tracing::warn!(
                component = module_path!(),
                op = $op,
                event = $crate::types::schema::EVENT_END_ERROR,
                duration_ms = $duration,
                err.kind = ?strata_err.kind(),
                err.code = strata_err.code(),
                $($field)*
            );
        } else {
            tracing::error!(
                component = module_path!(),
                op = $op,
                event = $crate::types::schema::EVENT_END_ERROR,
                duration_ms = $duration,
                err.kind = ?strata_err.kind(),
                err.code = strata_err.code(),
                error = %strata_err,
                $($field)*
            );
        }
    }};
}
