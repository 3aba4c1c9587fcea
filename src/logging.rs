// Macros file - tracing macros are imported within the macro definitions

/// Standardized logging macros so handlers and upstream clients emit the
/// same field names (`operation`, `request_id`, `upstream`, `attempt`, ...).

// ============================================================================
// API Operation Logging Macros
// ============================================================================

/// Log the start of an API operation with consistent fields
#[macro_export]
macro_rules! log_api_start {
    ($operation:expr, request_id = $request_id:expr, page = $page:expr) => {
        tracing::debug!(
            operation = $operation,
            request_id = %$request_id,
            page = %$page,
            "API operation started"
        );
    };
    ($operation:expr, request_id = $request_id:expr) => {
        tracing::debug!(
            operation = $operation,
            request_id = %$request_id,
            "API operation started"
        );
    };
    ($operation:expr) => {
        tracing::debug!(operation = $operation, "API operation started");
    };
}

/// Log successful completion of an API operation
#[macro_export]
macro_rules! log_api_success {
    ($operation:expr, request_id = $request_id:expr, duration_ms = $duration:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            request_id = %$request_id,
            duration_ms = $duration,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, request_id = $request_id:expr, $msg:expr) => {
        tracing::info!(
            operation = $operation,
            request_id = %$request_id,
            "API operation completed: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::info!(operation = $operation, "API operation completed: {}", $msg);
    };
}

/// Log API operation errors with consistent structure
#[macro_export]
macro_rules! log_api_error {
    ($operation:expr, request_id = $request_id:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            request_id = %$request_id,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
    ($operation:expr, error = $error:expr, $msg:expr) => {
        tracing::error!(
            operation = $operation,
            error = %$error,
            "API operation failed: {}", $msg
        );
    };
}

/// Log API warnings with context
#[macro_export]
macro_rules! log_api_warn {
    ($operation:expr, request_id = $request_id:expr, $msg:expr) => {
        tracing::warn!(
            operation = $operation,
            request_id = %$request_id,
            "API operation warning: {}", $msg
        );
    };
    ($operation:expr, $msg:expr) => {
        tracing::warn!(operation = $operation, "API operation warning: {}", $msg);
    };
}

// ============================================================================
// Service Layer Logging Macros
// ============================================================================

/// Log service operation start with context
#[macro_export]
macro_rules! log_service_start {
    ($service:expr, $operation:expr, question_count = $count:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            question_count = $count,
            "Service operation started"
        );
    };
    ($service:expr, $operation:expr) => {
        tracing::info!(
            service = $service,
            operation = $operation,
            "Service operation started"
        );
    };
}

// ============================================================================
// Upstream (OCR.Space / OpenRouter) Logging Macros
// ============================================================================

/// Log calls against third-party upstreams
#[macro_export]
macro_rules! log_upstream {
    (start, $upstream:expr, endpoint = $endpoint:expr, attempt = $attempt:expr) => {
        tracing::debug!(
            component = "upstream",
            upstream = $upstream,
            endpoint = %$endpoint,
            attempt = $attempt,
            "Upstream request started"
        );
    };
    (success, $upstream:expr, endpoint = $endpoint:expr, duration_ms = $duration:expr) => {
        tracing::info!(
            component = "upstream",
            upstream = $upstream,
            endpoint = %$endpoint,
            duration_ms = $duration,
            "Upstream request completed"
        );
    };
    (retry, $upstream:expr, endpoint = $endpoint:expr, attempt = $attempt:expr, error = $error:expr) => {
        tracing::warn!(
            component = "upstream",
            upstream = $upstream,
            endpoint = %$endpoint,
            attempt = $attempt,
            error = %$error,
            "Upstream attempt failed, retrying"
        );
    };
    (error, $upstream:expr, endpoint = $endpoint:expr, error = $error:expr) => {
        tracing::error!(
            component = "upstream",
            upstream = $upstream,
            endpoint = %$endpoint,
            error = %$error,
            "Upstream request failed"
        );
    };
}

// ============================================================================
// System Event Logging Macros
// ============================================================================

/// Log system startup and shutdown events
#[macro_export]
macro_rules! log_system_event {
    (startup, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "startup",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (shutdown, component = $component:expr, $msg:expr) => {
        tracing::info!(
            event_type = "shutdown",
            component = $component,
            "System event: {}",
            $msg
        );
    };
    (config, $msg:expr) => {
        tracing::info!(event_type = "configuration", "System event: {}", $msg);
    };
}

// ============================================================================
// Performance Logging Macros
// ============================================================================

#[macro_export]
macro_rules! log_performance {
    ($operation:expr, duration_ms = $duration:expr, count = $count:expr) => {
        tracing::debug!(
            event_type = "performance",
            operation = $operation,
            duration_ms = $duration,
            item_count = $count,
            "Performance metrics"
        );
    };
    ($operation:expr, duration_ms = $duration:expr) => {
        tracing::debug!(
            event_type = "performance",
            operation = $operation,
            duration_ms = $duration,
            "Performance metrics"
        );
    };
}

// ============================================================================
// Validation Logging Macros
// ============================================================================

/// Log validation results consistently
#[macro_export]
macro_rules! log_validation {
    (success, $component:expr, $msg:expr) => {
        tracing::debug!(
            event_type = "validation",
            component = $component,
            result = "success",
            "Validation completed: {}", $msg
        );
    };
    (failure, $component:expr, error = $error:expr) => {
        tracing::warn!(
            event_type = "validation",
            component = $component,
            result = "failure",
            error = %$error,
            "Validation failed"
        );
    };
}
